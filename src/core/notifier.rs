use crate::config::NotificationConfig;
use crate::domain::model::{WebhookPayload, WebhookResponse};
use crate::utils::error::Result;
use reqwest::Client;

/// Posts messages to a Slack incoming webhook.
#[derive(Debug, Clone)]
pub struct SlackNotifier {
    client: Client,
    webhook_url: String,
}

impl SlackNotifier {
    pub fn new(webhook_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            webhook_url: webhook_url.into(),
        }
    }

    pub fn from_config(config: &NotificationConfig) -> Self {
        Self::new(config.webhook_url.clone())
    }

    /// 發送通知。非錯誤訊息會加上 ✅ 圖示。
    ///
    /// 不重試也不檢查狀態碼，回應原樣交給呼叫端；
    /// 需要時可用 [`WebhookResponse::error_for_status`]。
    pub async fn send(&self, message: &str, is_error: bool) -> Result<WebhookResponse> {
        let payload = WebhookPayload::new(message, is_error);

        tracing::debug!("Posting Slack notification (error: {})", is_error);
        let response = self.client.post(&self.webhook_url).json(&payload).send().await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        if !(200..300).contains(&status) {
            tracing::warn!("Slack webhook responded with HTTP {}: {}", status, body);
        }

        Ok(WebhookResponse { status, body })
    }
}
