pub mod batch;
pub mod inference;
pub mod notifier;
pub mod storage;

pub use crate::domain::model::{BatchJob, InferenceRequest, JobState, ObjectHandle};
pub use crate::domain::ports::{JobStatusSource, ObjectStore};
pub use crate::utils::error::Result;
