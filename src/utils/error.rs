use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("{service} returned HTTP {status}: {body}")]
    UpstreamError {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Batch job {job_name} ended as {state}: {message}")]
    JobFailed {
        job_name: String,
        state: String,
        message: String,
    },

    #[error("Batch job {job_name} did not finish within {waited:?}")]
    Timeout { job_name: String, waited: Duration },

    #[error("Waiting for batch job {job_name} was cancelled")]
    Cancelled { job_name: String },
}

/// 錯誤分類，CLI 依此決定退出碼
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Validation,
    NotFound,
    Upstream,
    Network,
    Io,
    Interrupted,
}

impl CloudError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::ValidationError { .. } | Self::SerializationError(_) | Self::CsvError(_) => {
                ErrorCategory::Validation
            }
            Self::UpstreamError { .. } | Self::JobFailed { .. } => ErrorCategory::Upstream,
            Self::HttpError(_) => ErrorCategory::Network,
            Self::IoError(_) => ErrorCategory::Io,
            Self::ConfigError { .. }
            | Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. } => ErrorCategory::Configuration,
            Self::Timeout { .. } | Self::Cancelled { .. } => ErrorCategory::Interrupted,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Configuration => "Check the config file and environment variables",
            ErrorCategory::Validation => "Fix the input records and try again",
            ErrorCategory::NotFound => "Verify the bucket name and object key",
            ErrorCategory::Upstream => "Inspect the response body; the remote API rejected the call",
            ErrorCategory::Network => "Check network connectivity and the endpoint URL",
            ErrorCategory::Io => "Check local file permissions and free disk space",
            ErrorCategory::Interrupted => "The job keeps running remotely; query its status later",
        }
    }

    /// CLI 退出碼
    pub fn exit_code(&self) -> i32 {
        match self.category() {
            ErrorCategory::Configuration | ErrorCategory::Validation => 2,
            ErrorCategory::Interrupted => 4,
            ErrorCategory::NotFound
            | ErrorCategory::Upstream
            | ErrorCategory::Network
            | ErrorCategory::Io => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;
