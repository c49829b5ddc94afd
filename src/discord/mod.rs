//! Outbound messages through a Discord webhook.
use data::{DiscordWebhookData, WebhookMessage};
use error::WebhookError;
use reqwest::Client;

pub mod data;
pub mod error;

#[derive(Clone)]
pub struct DiscordWebhook {
    url: String,
    http: Client,
}

impl DiscordWebhook {
    pub fn new(data: DiscordWebhookData) -> Self {
        DiscordWebhook {
            url: format!(
                "{}/webhooks/{}/{}",
                data.base_url, data.hook_id, data.token
            ),
            http: Client::new(),
        }
    }

    /// Executes the webhook with `message`.
    ///
    /// # Errors
    /// Returns `Err(WebhookError...)`:
    /// * `::Net` if the request could not be sent.
    /// * `::Rejected` if Discord answered with a non-2xx status.
    pub async fn send(&self, message: &WebhookMessage) -> Result<(), WebhookError> {
        let body = serde_json::to_string(message).expect("WebhookMessage is always serializable");
        let response = self
            .http
            .post(&self.url)
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await
            .map_err(WebhookError::Net)?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(WebhookError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

// The webhook URL carries its token.
impl std::fmt::Debug for DiscordWebhook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordWebhook").finish_non_exhaustive()
    }
}
