use crate::domain::model::{BatchJob, ObjectInfo};
use crate::utils::error::Result;
use async_trait::async_trait;

/// Bucket-scoped blob backend. The bucket is fixed when the backend is built.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    fn bucket(&self) -> &str;

    /// Every object whose key starts with `prefix`, across all pages.
    async fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectInfo>>;

    /// Fails with `CloudError::NotFound` when `key` does not exist.
    async fn read_object(&self, key: &str) -> Result<Vec<u8>>;

    /// Overwrites any existing object at `key`.
    async fn write_object(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<()>;
}

#[async_trait]
impl<T: ObjectStore + ?Sized> ObjectStore for Box<T> {
    fn bucket(&self) -> &str {
        (**self).bucket()
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectInfo>> {
        (**self).list_objects(prefix).await
    }

    async fn read_object(&self, key: &str) -> Result<Vec<u8>> {
        (**self).read_object(key).await
    }

    async fn write_object(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<()> {
        (**self).write_object(key, data, content_type).await
    }
}

/// Anything that can report the current state of a batch job.
#[async_trait]
pub trait JobStatusSource: Send + Sync {
    async fn get_job_status(&self, job_name: &str) -> Result<BatchJob>;
}
