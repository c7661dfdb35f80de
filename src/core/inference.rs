//! Vertex AI Gemini client.
//!
//! Online prediction goes through `generateContent`; batch prediction through
//! `batchPredictionJobs`, whose input is a JSONL file of [`BatchRequestLine`]s
//! staged in Cloud Storage (or a BigQuery table).

use crate::config::InferenceConfig;
use crate::core::batch::{self, PollOptions};
use crate::domain::model::{
    BatchJob, BatchRequestLine, Content, FileData, GenerateContentRequest, GenerationConfig,
    InferenceRequest, JobError, JobState, Part,
};
use crate::domain::ports::JobStatusSource;
use crate::utils::error::{CloudError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};

const SERVICE: &str = "vertex-ai";
const JSON_MIME_TYPE: &str = "application/json";

pub struct InferenceClient {
    client: Client,
    base_url: String,
    api_version: String,
    project: String,
    location: String,
    model: String,
    max_output_tokens: u32,
    temperature: f32,
    access_token: Option<String>,
    response_schema: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateBatchJobRequest {
    display_name: String,
    model: String,
    input_config: InputConfig,
    output_config: OutputConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InputConfig {
    instances_format: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    gcs_source: Option<GcsSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bigquery_source: Option<BigQueryLocation>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OutputConfig {
    predictions_format: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    gcs_destination: Option<GcsDestination>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bigquery_destination: Option<BigQueryLocation>,
}

#[derive(Debug, Serialize)]
struct GcsSource {
    uris: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GcsDestination {
    output_uri_prefix: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BigQueryLocation {
    #[serde(skip_serializing_if = "Option::is_none")]
    input_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_uri: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchJobResource {
    name: String,
    display_name: Option<String>,
    model: Option<String>,
    #[serde(default)]
    state: JobState,
    output_info: Option<OutputInfo>,
    error: Option<JobError>,
    create_time: Option<DateTime<Utc>>,
    update_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OutputInfo {
    gcs_output_directory: Option<String>,
    bigquery_output_table: Option<String>,
    bigquery_output_dataset: Option<String>,
}

impl From<BatchJobResource> for BatchJob {
    fn from(resource: BatchJobResource) -> Self {
        let output_uri = resource.output_info.and_then(|info| {
            info.gcs_output_directory
                .or(info.bigquery_output_table)
                .or(info.bigquery_output_dataset)
        });

        Self {
            name: resource.name,
            display_name: resource.display_name,
            model: resource.model,
            state: resource.state,
            output_uri,
            error: resource.error,
            create_time: resource.create_time,
            update_time: resource.update_time,
        }
    }
}

impl InferenceClient {
    pub fn from_config(config: &InferenceConfig) -> Result<Self> {
        Ok(Self {
            client: Client::new(),
            base_url: config.base_url(),
            api_version: config.api_version.clone(),
            project: config.project.clone(),
            location: config.location.clone(),
            model: config.model.clone(),
            max_output_tokens: config.max_output_tokens,
            temperature: config.temperature,
            access_token: config.access_token.clone(),
            response_schema: config.load_response_schema()?,
        })
    }

    /// 設定結構化輸出的 JSON schema
    pub fn with_response_schema(mut self, schema: serde_json::Value) -> Self {
        self.response_schema = Some(schema);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn location_path(&self) -> String {
        format!("projects/{}/locations/{}", self.project, self.location)
    }

    fn publisher_model(&self) -> String {
        format!("publishers/google/models/{}", self.model)
    }

    fn api_url(&self, resource: &str) -> String {
        format!("{}/{}/{}", self.base_url, self.api_version, resource)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(CloudError::UpstreamError {
            service: SERVICE,
            status: status.as_u16(),
            body,
        })
    }

    fn contents(request: &InferenceRequest) -> Vec<Content> {
        let mut parts = vec![Part::Text {
            text: request.prompt.clone(),
        }];
        if let Some(image_uri) = request.image_uri.as_deref().filter(|uri| !uri.is_empty()) {
            parts.push(Part::FileData {
                file_data: FileData {
                    file_uri: image_uri.to_string(),
                    mime_type: request.image_mime_type().to_string(),
                },
            });
        }

        vec![Content {
            role: "user".to_string(),
            parts,
        }]
    }

    fn generation_config(&self, max_output_tokens: Option<u32>) -> GenerationConfig {
        GenerationConfig {
            max_output_tokens,
            temperature: self.temperature,
            response_mime_type: JSON_MIME_TYPE.to_string(),
            response_schema: self.response_schema.clone(),
        }
    }

    /// 線上推論：送出單一請求並回傳模型輸出的原始 JSON 文字。
    /// 回傳值的 schema 驗證由呼叫端負責。
    pub async fn predict(&self, request: &InferenceRequest) -> Result<String> {
        if request.prompt.is_empty() {
            return Err(CloudError::validation("prompt is required"));
        }

        let body = GenerateContentRequest {
            contents: Self::contents(request),
            generation_config: self.generation_config(Some(self.max_output_tokens)),
        };
        let url = self.api_url(&format!(
            "{}/{}:generateContent",
            self.location_path(),
            self.publisher_model()
        ));

        tracing::debug!("Calling generateContent on {}", self.model);
        let response = self.authorize(self.client.post(&url).json(&body)).send().await?;
        let response: GenerateContentResponse = Self::check(response).await?.json().await?;

        let candidate = response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| CloudError::UpstreamError {
                service: SERVICE,
                status: 200,
                body: "response contained no candidates".to_string(),
            })?;

        Ok(candidate
            .content
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default())
    }

    /// 產生批次推論的輸入，每筆資料都必須有 prompt 與圖片 URI，順序與輸入相同
    pub fn build_batch_input(&self, records: &[InferenceRequest]) -> Result<Vec<BatchRequestLine>> {
        records
            .iter()
            .enumerate()
            .map(|(index, record)| {
                let label = record
                    .key
                    .as_deref()
                    .map(|key| format!("record '{}'", key))
                    .unwrap_or_else(|| format!("record #{}", index));

                if record.prompt.is_empty() {
                    return Err(CloudError::validation(format!("{}: prompt is required", label)));
                }
                if record.image_uri.as_deref().map_or(true, str::is_empty) {
                    return Err(CloudError::validation(format!(
                        "{}: image URI is required",
                        label
                    )));
                }

                Ok(BatchRequestLine {
                    key: record.key.clone(),
                    request: GenerateContentRequest {
                        contents: Self::contents(record),
                        generation_config: self.generation_config(None),
                    },
                })
            })
            .collect()
    }

    /// 提交批次推論作業。`gs://` 與 `bq://` 的 URI 分別對應 Cloud Storage 與 BigQuery。
    pub async fn submit_batch_job(&self, input_uri: &str, output_uri: &str) -> Result<BatchJob> {
        let input_config = if input_uri.starts_with("bq://") {
            InputConfig {
                instances_format: "bigquery",
                gcs_source: None,
                bigquery_source: Some(BigQueryLocation {
                    input_uri: Some(input_uri.to_string()),
                    output_uri: None,
                }),
            }
        } else {
            InputConfig {
                instances_format: "jsonl",
                gcs_source: Some(GcsSource {
                    uris: vec![input_uri.to_string()],
                }),
                bigquery_source: None,
            }
        };

        let output_config = if output_uri.starts_with("bq://") {
            OutputConfig {
                predictions_format: "bigquery",
                gcs_destination: None,
                bigquery_destination: Some(BigQueryLocation {
                    input_uri: None,
                    output_uri: Some(output_uri.to_string()),
                }),
            }
        } else {
            OutputConfig {
                predictions_format: "jsonl",
                gcs_destination: Some(GcsDestination {
                    output_uri_prefix: output_uri.to_string(),
                }),
                bigquery_destination: None,
            }
        };

        let body = CreateBatchJobRequest {
            display_name: format!("cloud-glue-{}", Utc::now().format("%Y%m%d-%H%M%S")),
            model: self.publisher_model(),
            input_config,
            output_config,
        };
        let url = self.api_url(&format!("{}/batchPredictionJobs", self.location_path()));

        let response = self.authorize(self.client.post(&url).json(&body)).send().await?;
        let resource: BatchJobResource = Self::check(response).await?.json().await?;
        let job = BatchJob::from(resource);

        tracing::info!("Submitted batch job {} ({} -> {})", job.name, input_uri, output_uri);
        Ok(job)
    }

    /// `job_name` is the full resource name returned at submission.
    pub async fn get_job_status(&self, job_name: &str) -> Result<BatchJob> {
        let response = self
            .authorize(self.client.get(self.api_url(job_name)))
            .send()
            .await?;
        let resource: BatchJobResource = Self::check(response).await?.json().await?;
        Ok(BatchJob::from(resource))
    }

    pub async fn cancel_batch_job(&self, job_name: &str) -> Result<()> {
        let url = format!("{}:cancel", self.api_url(job_name));
        let response = self
            .authorize(self.client.post(&url).json(&serde_json::json!({})))
            .send()
            .await?;
        Self::check(response).await?;
        tracing::info!("Requested cancellation of batch job {}", job_name);
        Ok(())
    }

    pub async fn wait_for_batch_job(&self, job_name: &str, options: &PollOptions) -> Result<BatchJob> {
        batch::wait_for_job(self, job_name, options).await
    }

    pub async fn await_batch_job(&self, job_name: &str, options: &PollOptions) -> Result<bool> {
        batch::await_job(self, job_name, options).await
    }
}

#[async_trait]
impl JobStatusSource for InferenceClient {
    async fn get_job_status(&self, job_name: &str) -> Result<BatchJob> {
        InferenceClient::get_job_status(self, job_name).await
    }
}

/// 每行一個 JSON 物件，結尾帶換行
pub fn to_jsonl(lines: &[BatchRequestLine]) -> Result<String> {
    let mut output = String::new();
    for line in lines {
        output.push_str(&serde_json::to_string(line)?);
        output.push('\n');
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> InferenceClient {
        InferenceClient::from_config(&InferenceConfig::new("my-project"))
            .unwrap()
            .with_response_schema(serde_json::json!({
                "type": "object",
                "properties": {"label": {"type": "string"}}
            }))
    }

    fn record(key: &str, prompt: &str, image: Option<&str>) -> InferenceRequest {
        let mut record = InferenceRequest::new(prompt).with_key(key);
        record.image_uri = image.map(str::to_string);
        record
    }

    #[test]
    fn test_build_batch_input_preserves_order() {
        let records = vec![
            record("1", "Hello, world!", Some("gs://bucket/a.jpg")),
            record("2", "Second", Some("gs://bucket/b.png")).with_mime_type("image/png"),
        ];

        let lines = client().build_batch_input(&records).unwrap();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].key.as_deref(), Some("1"));
        assert_eq!(lines[1].key.as_deref(), Some("2"));

        let json = serde_json::to_value(&lines[1]).unwrap();
        let parts = &json["request"]["contents"][0]["parts"];
        assert_eq!(json["request"]["contents"][0]["role"], "user");
        assert_eq!(parts[0]["text"], "Second");
        assert_eq!(parts[1]["fileData"]["fileUri"], "gs://bucket/b.png");
        assert_eq!(parts[1]["fileData"]["mimeType"], "image/png");

        let generation = &json["request"]["generationConfig"];
        assert_eq!(generation["temperature"], 0.0);
        assert_eq!(generation["responseMimeType"], "application/json");
        assert_eq!(generation["responseSchema"]["type"], "object");
        assert!(generation.get("maxOutputTokens").is_none());
    }

    #[test]
    fn test_build_batch_input_requires_prompt_and_image() {
        let client = client();

        let err = client
            .build_batch_input(&[
                record("1", "ok", Some("gs://bucket/a.jpg")),
                record("2", "", Some("gs://bucket/b.jpg")),
            ])
            .unwrap_err();
        assert!(matches!(err, CloudError::ValidationError { ref message } if message.contains("'2'")));

        let err = client
            .build_batch_input(&[record("3", "prompt", None)])
            .unwrap_err();
        assert!(matches!(err, CloudError::ValidationError { .. }));

        let err = client
            .build_batch_input(&[record("4", "prompt", Some(""))])
            .unwrap_err();
        assert!(matches!(err, CloudError::ValidationError { .. }));
    }

    #[test]
    fn test_build_batch_input_accepts_whitespace_prompt() {
        let lines = client()
            .build_batch_input(&[record("1", " ", Some("gs://b/a.jpg"))])
            .unwrap();

        assert_eq!(lines.len(), 1);
        let json = serde_json::to_value(&lines[0]).unwrap();
        assert_eq!(json["request"]["contents"][0]["parts"][0]["text"], " ");
    }

    #[test]
    fn test_build_batch_input_empty() {
        assert!(client().build_batch_input(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_to_jsonl() {
        let lines = client()
            .build_batch_input(&[
                record("1", "a", Some("gs://bucket/a.jpg")),
                record("2", "b", Some("gs://bucket/b.jpg")),
            ])
            .unwrap();

        let jsonl = to_jsonl(&lines).unwrap();
        let rows: Vec<&str> = jsonl.lines().collect();

        assert_eq!(rows.len(), 2);
        assert!(jsonl.ends_with('\n'));
        let first: serde_json::Value = serde_json::from_str(rows[0]).unwrap();
        assert_eq!(first["key"], "1");
    }

    #[test]
    fn test_batch_job_resource_mapping() {
        let resource: BatchJobResource = serde_json::from_str(
            r#"{
                "name": "projects/p/locations/global/batchPredictionJobs/123",
                "displayName": "cloud-glue-20250101-000000",
                "model": "publishers/google/models/gemini-2.5-flash",
                "state": "JOB_STATE_SUCCEEDED",
                "outputInfo": {"gcsOutputDirectory": "gs://bucket/output/prediction-1"},
                "createTime": "2025-01-01T00:00:00Z"
            }"#,
        )
        .unwrap();

        let job = BatchJob::from(resource);
        assert_eq!(job.state, JobState::Succeeded);
        assert_eq!(job.output_uri.as_deref(), Some("gs://bucket/output/prediction-1"));
        assert!(job.error.is_none());
        assert!(job.create_time.is_some());
    }

    #[test]
    fn test_urls() {
        let client = client();
        assert_eq!(
            client.api_url(&format!(
                "{}/{}:generateContent",
                client.location_path(),
                client.publisher_model()
            )),
            "https://aiplatform.googleapis.com/v1/projects/my-project/locations/global/publishers/google/models/gemini-2.5-flash:generateContent"
        );
    }
}
