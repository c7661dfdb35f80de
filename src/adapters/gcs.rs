use crate::config::StorageConfig;
use crate::domain::model::ObjectInfo;
use crate::domain::ports::ObjectStore;
use crate::utils::error::{CloudError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use url::Url;

const DEFAULT_ENDPOINT: &str = "https://storage.googleapis.com";
const SERVICE: &str = "cloud-storage";

/// Google Cloud Storage through the JSON API.
#[derive(Debug, Clone)]
pub struct GcsObjectStore {
    client: Client,
    bucket: String,
    endpoint: Url,
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    #[serde(default)]
    items: Vec<ObjectResource>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObjectResource {
    name: String,
    // GCS 回傳的 size 是字串
    size: Option<String>,
    updated: Option<DateTime<Utc>>,
}

impl From<ObjectResource> for ObjectInfo {
    fn from(resource: ObjectResource) -> Self {
        Self {
            name: resource.name,
            size: resource.size.and_then(|s| s.parse().ok()),
            updated: resource.updated,
        }
    }
}

impl GcsObjectStore {
    pub fn new(bucket: impl Into<String>) -> Result<Self> {
        Self::with_endpoint(bucket, DEFAULT_ENDPOINT, None)
    }

    pub fn with_endpoint(
        bucket: impl Into<String>,
        endpoint: &str,
        access_token: Option<String>,
    ) -> Result<Self> {
        let endpoint = Url::parse(endpoint).map_err(|e| CloudError::InvalidConfigValueError {
            field: "storage.endpoint".to_string(),
            value: endpoint.to_string(),
            reason: format!("Invalid URL format: {}", e),
        })?;

        Ok(Self {
            client: Client::new(),
            bucket: bucket.into(),
            endpoint,
            access_token,
        })
    }

    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        Self::with_endpoint(
            config.bucket.clone(),
            config.endpoint.as_deref().unwrap_or(DEFAULT_ENDPOINT),
            config.access_token.clone(),
        )
    }

    /// Builds `{endpoint}/{segments...}` with every segment percent-encoded,
    /// so `/` inside an object key becomes `%2F`.
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| CloudError::ConfigError {
                message: format!("Storage endpoint cannot be a base URL: {}", self.endpoint),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn check(&self, response: Response, key: Option<&str>) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if let (reqwest::StatusCode::NOT_FOUND, Some(key)) = (status, key) {
            return Err(CloudError::NotFound {
                bucket: self.bucket.clone(),
                key: key.to_string(),
            });
        }

        let body = response.text().await.unwrap_or_default();
        Err(CloudError::UpstreamError {
            service: SERVICE,
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl ObjectStore for GcsObjectStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectInfo>> {
        let url = self.url(&["storage", "v1", "b", &self.bucket, "o"])?;
        let mut objects = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![("prefix", prefix.to_string())];
            if let Some(token) = &page_token {
                query.push(("pageToken", token.clone()));
            }

            tracing::debug!("Listing gs://{}/{} (page token: {:?})", self.bucket, prefix, page_token);
            let request = self.authorize(self.client.get(url.clone()).query(&query));
            let response = self.check(request.send().await?, None).await?;
            let page: ListResponse = response.json().await?;

            objects.extend(page.items.into_iter().map(ObjectInfo::from));

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(objects)
    }

    async fn read_object(&self, key: &str) -> Result<Vec<u8>> {
        let url = self.url(&["storage", "v1", "b", &self.bucket, "o", key])?;

        tracing::debug!("Downloading gs://{}/{}", self.bucket, key);
        let request = self.authorize(self.client.get(url).query(&[("alt", "media")]));
        let response = self.check(request.send().await?, Some(key)).await?;

        Ok(response.bytes().await?.to_vec())
    }

    async fn write_object(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<()> {
        let url = self.url(&["upload", "storage", "v1", "b", &self.bucket, "o"])?;

        tracing::debug!("Uploading {} bytes to gs://{}/{}", data.len(), self.bucket, key);
        let request = self.authorize(
            self.client
                .post(url)
                .query(&[("uploadType", "media"), ("name", key)])
                .header(reqwest::header::CONTENT_TYPE, content_type)
                .body(data),
        );
        self.check(request.send().await?, None).await?;

        Ok(())
    }
}
