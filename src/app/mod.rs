pub mod pipelines;

pub use pipelines::batch_pipeline::{BatchPipeline, BatchRunResult};
