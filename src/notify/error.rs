use crate::discord::error::WebhookError;
use crate::twitch::HelixError;

#[derive(Debug)]
pub enum NotifyError {
    Helix(HelixError),
    Webhook(WebhookError),
}

impl std::fmt::Display for NotifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotifyError::Helix(err) => f.write_fmt(format_args!("{err}")),
            NotifyError::Webhook(err) => f.write_fmt(format_args!("{err}")),
        }
    }
}
impl std::error::Error for NotifyError {}

impl From<HelixError> for NotifyError {
    fn from(value: HelixError) -> Self {
        NotifyError::Helix(value)
    }
}
impl From<WebhookError> for NotifyError {
    fn from(value: WebhookError) -> Self {
        NotifyError::Webhook(value)
    }
}
