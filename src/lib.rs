pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::CliConfig;

pub use adapters::{GcsObjectStore, MemoryObjectStore};
pub use app::{BatchPipeline, BatchRunResult};
pub use config::{AppConfig, InferenceConfig, NotificationConfig, StorageConfig};
pub use core::{
    batch::PollOptions, inference::InferenceClient, notifier::SlackNotifier, storage::Bucket,
};
pub use utils::error::{CloudError, Result};
