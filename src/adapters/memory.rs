use crate::domain::model::ObjectInfo;
use crate::domain::ports::ObjectStore;
use crate::utils::error::{CloudError, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// In-process object store, mainly for tests and dry runs.
#[derive(Debug, Clone)]
pub struct MemoryObjectStore {
    bucket: String,
    objects: Arc<Mutex<BTreeMap<String, StoredObject>>>,
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    content_type: String,
}

impl MemoryObjectStore {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            objects: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    pub async fn insert(&self, key: &str, data: impl Into<Vec<u8>>) {
        let mut objects = self.objects.lock().await;
        objects.insert(
            key.to_string(),
            StoredObject {
                data: data.into(),
                content_type: "application/octet-stream".to_string(),
            },
        );
    }

    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        let objects = self.objects.lock().await;
        objects.get(key).map(|o| o.data.clone())
    }

    pub async fn content_type(&self, key: &str) -> Option<String> {
        let objects = self.objects.lock().await;
        objects.get(key).map(|o| o.content_type.clone())
    }

    pub async fn len(&self) -> usize {
        self.objects.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.lock().await.is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectInfo>> {
        let objects = self.objects.lock().await;
        Ok(objects
            .iter()
            .filter(|(name, _)| name.starts_with(prefix))
            .map(|(name, object)| ObjectInfo {
                name: name.clone(),
                size: Some(object.data.len() as u64),
                updated: None,
            })
            .collect())
    }

    async fn read_object(&self, key: &str) -> Result<Vec<u8>> {
        self.get(key).await.ok_or_else(|| CloudError::NotFound {
            bucket: self.bucket.clone(),
            key: key.to_string(),
        })
    }

    async fn write_object(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<()> {
        let mut objects = self.objects.lock().await;
        objects.insert(
            key.to_string(),
            StoredObject {
                data,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }
}
