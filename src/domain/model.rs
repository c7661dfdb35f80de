use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_IMAGE_MIME_TYPE: &str = "image/jpeg";

/// Object listed from a bucket. Only `name` drives adapter behaviour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub name: String,
    pub size: Option<u64>,
    pub updated: Option<DateTime<Utc>>,
}

impl ObjectInfo {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size: None,
            updated: None,
        }
    }
}

/// Reference to an object. Holds no data and does not imply the object exists.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectHandle {
    pub bucket: String,
    pub key: String,
}

impl ObjectHandle {
    pub fn uri(&self, scheme: &str) -> String {
        format!("{}://{}/{}", scheme, self.bucket, self.key)
    }
}

/// Batch prediction job state as reported by Vertex AI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobState {
    #[default]
    #[serde(rename = "JOB_STATE_UNSPECIFIED")]
    Unspecified,
    #[serde(rename = "JOB_STATE_QUEUED")]
    Queued,
    #[serde(rename = "JOB_STATE_PENDING")]
    Pending,
    #[serde(rename = "JOB_STATE_RUNNING")]
    Running,
    #[serde(rename = "JOB_STATE_SUCCEEDED")]
    Succeeded,
    #[serde(rename = "JOB_STATE_FAILED")]
    Failed,
    #[serde(rename = "JOB_STATE_CANCELLING")]
    Cancelling,
    #[serde(rename = "JOB_STATE_CANCELLED")]
    Cancelled,
    #[serde(rename = "JOB_STATE_PAUSED")]
    Paused,
    #[serde(rename = "JOB_STATE_EXPIRED")]
    Expired,
    #[serde(rename = "JOB_STATE_UPDATING")]
    Updating,
    #[serde(rename = "JOB_STATE_PARTIALLY_SUCCEEDED")]
    PartiallySucceeded,
    #[serde(other)]
    Unknown,
}

impl JobState {
    /// Still waiting on the service. Every other state ends the poll loop.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Pending | Self::Queued | Self::Running)
    }

    pub fn is_success(self) -> bool {
        self == Self::Succeeded
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobError {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

impl std::fmt::Display for JobError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "code {}: {}", self.code, self.message)
    }
}

/// Snapshot of a batch job. `output_uri` is only populated once the job
/// succeeded; `error` only once it failed.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchJob {
    pub name: String,
    pub display_name: Option<String>,
    pub model: Option<String>,
    pub state: JobState,
    pub output_uri: Option<String>,
    pub error: Option<JobError>,
    pub create_time: Option<DateTime<Utc>>,
    pub update_time: Option<DateTime<Utc>>,
}

impl BatchJob {
    /// Converts a non-successful terminal snapshot into an error carrying its payload.
    pub fn into_result(self) -> crate::utils::error::Result<Self> {
        if self.state.is_success() {
            return Ok(self);
        }
        Err(crate::utils::error::CloudError::JobFailed {
            job_name: self.name,
            state: format!("{:?}", self.state),
            message: self.error.map(|e| e.to_string()).unwrap_or_default(),
        })
    }

    pub fn new(name: impl Into<String>, state: JobState) -> Self {
        Self {
            name: name.into(),
            display_name: None,
            model: None,
            state,
            output_uri: None,
            error: None,
            create_time: None,
            update_time: None,
        }
    }
}

/// A single inference input. `key` correlates batch output lines back to inputs.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InferenceRequest {
    #[serde(default)]
    pub key: Option<String>,
    pub prompt: String,
    #[serde(default, alias = "image_url")]
    pub image_uri: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
}

impl InferenceRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_image(mut self, image_uri: impl Into<String>) -> Self {
        self.image_uri = Some(image_uri.into());
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn image_mime_type(&self) -> &str {
        self.mime_type.as_deref().unwrap_or(DEFAULT_IMAGE_MIME_TYPE)
    }
}

// Gemini request body. Field names follow the REST API (camelCase).

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    pub role: String,
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Part {
    Text {
        text: String,
    },
    FileData {
        #[serde(rename = "fileData")]
        file_data: FileData,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileData {
    pub file_uri: String,
    pub mime_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    pub temperature: f32,
    pub response_mime_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    pub generation_config: GenerationConfig,
}

/// One line of batch-prediction input (JSONL).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRequestLine {
    pub key: Option<String>,
    pub request: GenerateContentRequest,
}

pub const SUCCESS_ICON: &str = ":white_check_mark:";

/// Slack incoming-webhook body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebhookPayload {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_emoji: Option<&'static str>,
}

impl WebhookPayload {
    pub fn new(message: impl Into<String>, is_error: bool) -> Self {
        Self {
            text: message.into(),
            icon_emoji: if is_error { None } else { Some(SUCCESS_ICON) },
        }
    }
}

/// Raw webhook response. Status is not checked on the caller's behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookResponse {
    pub status: u16,
    pub body: String,
}

impl WebhookResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn error_for_status(self) -> crate::utils::error::Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(crate::utils::error::CloudError::UpstreamError {
                service: "slack",
                status: self.status,
                body: self.body,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_state_parsing() {
        let state: JobState = serde_json::from_str(r#""JOB_STATE_RUNNING""#).unwrap();
        assert_eq!(state, JobState::Running);
        assert!(state.is_active());

        let state: JobState = serde_json::from_str(r#""JOB_STATE_SUCCEEDED""#).unwrap();
        assert!(state.is_success());
        assert!(!state.is_active());

        // 未知狀態視為非成功的終止狀態
        let state: JobState = serde_json::from_str(r#""JOB_STATE_SOMETHING_NEW""#).unwrap();
        assert_eq!(state, JobState::Unknown);
        assert!(!state.is_active());
        assert!(!state.is_success());
    }

    #[test]
    fn test_only_pending_queued_running_are_active() {
        let active: Vec<JobState> = [
            JobState::Unspecified,
            JobState::Queued,
            JobState::Pending,
            JobState::Running,
            JobState::Succeeded,
            JobState::Failed,
            JobState::Cancelling,
            JobState::Cancelled,
            JobState::Paused,
            JobState::Expired,
            JobState::Updating,
            JobState::PartiallySucceeded,
            JobState::Unknown,
        ]
        .into_iter()
        .filter(|s| s.is_active())
        .collect();

        assert_eq!(active, vec![JobState::Queued, JobState::Pending, JobState::Running]);
    }

    #[test]
    fn test_part_serialization() {
        let parts = vec![
            Part::Text {
                text: "describe".to_string(),
            },
            Part::FileData {
                file_data: FileData {
                    file_uri: "gs://bucket/image.jpg".to_string(),
                    mime_type: "image/jpeg".to_string(),
                },
            },
        ];

        let json = serde_json::to_value(&parts).unwrap();
        assert_eq!(json[0]["text"], "describe");
        assert_eq!(json[1]["fileData"]["fileUri"], "gs://bucket/image.jpg");
        assert_eq!(json[1]["fileData"]["mimeType"], "image/jpeg");
    }

    #[test]
    fn test_webhook_payload_icon() {
        let success = serde_json::to_value(WebhookPayload::new("done", false)).unwrap();
        assert_eq!(success["text"], "done");
        assert_eq!(success["icon_emoji"], ":white_check_mark:");

        let failure = serde_json::to_value(WebhookPayload::new("boom", true)).unwrap();
        assert_eq!(failure["text"], "boom");
        assert!(failure.get("icon_emoji").is_none());
    }

    #[test]
    fn test_inference_request_accepts_image_url_alias() {
        let request: InferenceRequest = serde_json::from_str(
            r#"{"key": "1", "prompt": "Hello", "image_url": "gs://bucket/a.png"}"#,
        )
        .unwrap();
        assert_eq!(request.image_uri.as_deref(), Some("gs://bucket/a.png"));
        assert_eq!(request.image_mime_type(), "image/jpeg");
    }

    #[test]
    fn test_webhook_response_error_for_status() {
        let ok = WebhookResponse {
            status: 200,
            body: "ok".to_string(),
        };
        assert!(ok.error_for_status().is_ok());

        let bad = WebhookResponse {
            status: 404,
            body: "no_service".to_string(),
        };
        assert!(bad.error_for_status().is_err());
    }
}
