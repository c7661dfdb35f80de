use crate::utils::error::{CloudError, Result};
use crate::utils::validation::{
    validate_bucket_name, validate_non_empty_string, validate_range, validate_uri_scheme,
    validate_url, Validate,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_LOCATION: &str = "global";
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 1024;

/// 整體設定，三個 adapter 各自獨立，缺少的區段代表不使用該 adapter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub storage: Option<StorageConfig>,
    pub inference: Option<InferenceConfig>,
    pub notification: Option<NotificationConfig>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Gcs,
    S3,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub bucket: String,
    #[serde(default)]
    pub backend: StorageBackend,
    /// Scheme used in `scheme://bucket/key` URIs. Defaults to the backend's own.
    pub uri_scheme: Option<String>,
    /// Overrides the backend endpoint (emulators, tests).
    pub endpoint: Option<String>,
    pub access_token: Option<String>,
    /// S3 only.
    pub region: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    pub project: String,
    #[serde(default = "default_location")]
    pub location: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    #[serde(default)]
    pub temperature: f32,
    pub endpoint: Option<String>,
    pub access_token: Option<String>,
    /// Inline JSON schema for structured responses.
    pub response_schema: Option<serde_json::Value>,
    /// Path to a JSON schema file; ignored when `response_schema` is set.
    pub response_schema_file: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    pub webhook_url: String,
}

fn default_location() -> String {
    DEFAULT_LOCATION.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_api_version() -> String {
    "v1".to_string()
}

fn default_max_output_tokens() -> u32 {
    DEFAULT_MAX_OUTPUT_TOKENS
}

impl AppConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(CloudError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| CloudError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${SLACK_WEBHOOK_URL})，找不到的變數保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| CloudError::ConfigError {
            message: format!("Invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// 從環境變數建立配置，未設定的 adapter 區段為 None
    pub fn from_env() -> Result<Self> {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());

        let storage = var("GCS_BUCKET").map(|bucket| StorageConfig {
            bucket,
            backend: StorageBackend::Gcs,
            uri_scheme: var("GCS_URI_SCHEME"),
            endpoint: var("GCS_ENDPOINT"),
            access_token: var("GOOGLE_ACCESS_TOKEN"),
            region: None,
        });

        let inference = match var("GCP_PROJECT") {
            Some(project) => Some(InferenceConfig {
                project,
                location: var("GCP_LOCATION").unwrap_or_else(default_location),
                model: var("GEMINI_MODEL").unwrap_or_else(default_model),
                api_version: default_api_version(),
                max_output_tokens: match var("GEMINI_MAX_OUTPUT_TOKENS") {
                    Some(raw) => raw.parse().map_err(|_| CloudError::InvalidConfigValueError {
                        field: "GEMINI_MAX_OUTPUT_TOKENS".to_string(),
                        value: raw.clone(),
                        reason: "Expected a positive integer".to_string(),
                    })?,
                    None => DEFAULT_MAX_OUTPUT_TOKENS,
                },
                temperature: 0.0,
                endpoint: var("VERTEX_ENDPOINT"),
                access_token: var("GOOGLE_ACCESS_TOKEN"),
                response_schema: None,
                response_schema_file: var("GEMINI_RESPONSE_SCHEMA_FILE"),
            }),
            None => None,
        };

        let notification = var("SLACK_WEBHOOK_URL").map(|webhook_url| NotificationConfig { webhook_url });

        Ok(Self {
            storage,
            inference,
            notification,
        })
    }

    pub fn storage(&self) -> Result<&StorageConfig> {
        self.storage.as_ref().ok_or_else(|| CloudError::MissingConfigError {
            field: "storage".to_string(),
        })
    }

    pub fn inference(&self) -> Result<&InferenceConfig> {
        self.inference.as_ref().ok_or_else(|| CloudError::MissingConfigError {
            field: "inference".to_string(),
        })
    }

    pub fn notification(&self) -> Result<&NotificationConfig> {
        self.notification
            .as_ref()
            .ok_or_else(|| CloudError::MissingConfigError {
                field: "notification".to_string(),
            })
    }
}

impl StorageConfig {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            backend: StorageBackend::Gcs,
            uri_scheme: None,
            endpoint: None,
            access_token: None,
            region: None,
        }
    }

    pub fn uri_scheme(&self) -> &str {
        match (&self.uri_scheme, self.backend) {
            (Some(scheme), _) => scheme,
            (None, StorageBackend::Gcs) => "gs",
            (None, StorageBackend::S3) => "s3",
        }
    }
}

impl InferenceConfig {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            location: default_location(),
            model: default_model(),
            api_version: default_api_version(),
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            temperature: 0.0,
            endpoint: None,
            access_token: None,
            response_schema: None,
            response_schema_file: None,
        }
    }

    /// Vertex AI 端點；`global` 位置沒有區域前綴
    pub fn base_url(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None if self.location == DEFAULT_LOCATION => {
                "https://aiplatform.googleapis.com".to_string()
            }
            None => format!("https://{}-aiplatform.googleapis.com", self.location),
        }
    }

    pub fn load_response_schema(&self) -> Result<Option<serde_json::Value>> {
        if let Some(schema) = &self.response_schema {
            return Ok(Some(schema.clone()));
        }
        match &self.response_schema_file {
            Some(path) => {
                let content = std::fs::read_to_string(path)?;
                Ok(Some(serde_json::from_str(&content)?))
            }
            None => Ok(None),
        }
    }
}

impl Validate for StorageConfig {
    fn validate(&self) -> Result<()> {
        validate_bucket_name("storage.bucket", &self.bucket)?;
        validate_uri_scheme("storage.uri_scheme", self.uri_scheme())?;
        if let Some(endpoint) = &self.endpoint {
            validate_url("storage.endpoint", endpoint)?;
        }
        if self.backend == StorageBackend::S3 {
            if let Some(region) = &self.region {
                validate_non_empty_string("storage.region", region)?;
            }
        }
        Ok(())
    }
}

impl Validate for InferenceConfig {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("inference.project", &self.project)?;
        validate_non_empty_string("inference.location", &self.location)?;
        validate_non_empty_string("inference.model", &self.model)?;
        validate_range("inference.max_output_tokens", self.max_output_tokens, 1, 65_535)?;
        validate_range("inference.temperature", self.temperature, 0.0, 2.0)?;
        if let Some(endpoint) = &self.endpoint {
            validate_url("inference.endpoint", endpoint)?;
        }
        Ok(())
    }
}

impl Validate for NotificationConfig {
    fn validate(&self) -> Result<()> {
        validate_url("notification.webhook_url", &self.webhook_url)
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        if let Some(storage) = &self.storage {
            storage.validate()?;
        }
        if let Some(inference) = &self.inference {
            inference.validate()?;
        }
        if let Some(notification) = &self.notification {
            notification.validate()?;
        }
        tracing::debug!("✅ Configuration validation passed");
        Ok(())
    }
}
