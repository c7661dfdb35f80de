use crate::config::StorageConfig;
use crate::domain::model::ObjectInfo;
use crate::domain::ports::ObjectStore;
use crate::utils::error::{CloudError, Result};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use chrono::{DateTime, Utc};

const SERVICE: &str = "s3";

#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: S3Client,
    bucket: String,
}

impl S3ObjectStore {
    pub fn new(client: S3Client, bucket: String) -> Self {
        Self { client, bucket }
    }

    /// 使用預設的 AWS 憑證鏈建立 client，可覆寫 region 與 endpoint
    pub async fn from_config(config: &StorageConfig) -> Self {
        let shared = aws_config::load_defaults(BehaviorVersion::latest()).await;
        let mut builder = aws_sdk_s3::config::Builder::from(&shared);

        if let Some(region) = &config.region {
            builder = builder.region(Region::new(region.clone()));
        }
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Self::new(S3Client::from_conf(builder.build()), config.bucket.clone())
    }
}

fn upstream<E>(err: SdkError<E, HttpResponse>) -> CloudError
where
    E: std::error::Error + Send + Sync + 'static,
{
    let status = err.raw_response().map(|r| r.status().as_u16()).unwrap_or(0);

    CloudError::UpstreamError {
        service: SERVICE,
        status,
        body: DisplayErrorContext(&err).to_string(),
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectInfo>> {
        let mut objects = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let resp = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(upstream)?;

            for object in resp.contents() {
                let Some(key) = object.key() else { continue };
                objects.push(ObjectInfo {
                    name: key.to_string(),
                    size: object.size().and_then(|s| u64::try_from(s).ok()),
                    updated: object
                        .last_modified()
                        .and_then(|t| DateTime::<Utc>::from_timestamp(t.secs(), t.subsec_nanos())),
                });
            }

            match resp.next_continuation_token() {
                Some(token) if resp.is_truncated().unwrap_or(false) => {
                    continuation = Some(token.to_string());
                }
                _ => break,
            }
        }

        Ok(objects)
    }

    async fn read_object(&self, key: &str) -> Result<Vec<u8>> {
        let resp = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(SdkError::ServiceError(service))
                if matches!(service.err(), GetObjectError::NoSuchKey(_)) =>
            {
                return Err(CloudError::NotFound {
                    bucket: self.bucket.clone(),
                    key: key.to_string(),
                });
            }
            Err(err) => return Err(upstream(err)),
        };

        let data = resp
            .body
            .collect()
            .await
            .map_err(|e| CloudError::IoError(std::io::Error::other(e)))?;

        Ok(data.into_bytes().to_vec())
    }

    async fn write_object(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(upstream)?;

        Ok(())
    }
}
