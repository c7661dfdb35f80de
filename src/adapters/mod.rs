// Adapters layer: concrete object-store backends behind `domain::ports::ObjectStore`.

pub mod gcs;
pub mod memory;
#[cfg(feature = "s3")]
pub mod s3;

pub use gcs::GcsObjectStore;
pub use memory::MemoryObjectStore;
#[cfg(feature = "s3")]
pub use s3::S3ObjectStore;

use crate::config::{StorageBackend, StorageConfig};
use crate::domain::ports::ObjectStore;
use crate::utils::error::Result;

/// 依設定建立對應的 object store backend
pub async fn object_store_from_config(config: &StorageConfig) -> Result<Box<dyn ObjectStore>> {
    match config.backend {
        StorageBackend::Gcs => Ok(Box::new(GcsObjectStore::from_config(config)?)),
        #[cfg(feature = "s3")]
        StorageBackend::S3 => Ok(Box::new(S3ObjectStore::from_config(config).await)),
        #[cfg(not(feature = "s3"))]
        StorageBackend::S3 => Err(crate::utils::error::CloudError::ConfigError {
            message: "storage.backend = \"s3\" requires the `s3` feature".to_string(),
        }),
    }
}
