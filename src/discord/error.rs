#[derive(Debug)]
pub enum WebhookError {
    Net(reqwest::Error),
    /// Discord answered with a non-2xx status.
    Rejected { status: u16, body: String },
}

impl std::fmt::Display for WebhookError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WebhookError::Net(err) => f.write_fmt(format_args!(
                "Error sending a message to the Discord webhook: {err}"
            )),
            WebhookError::Rejected { status, body } => f.write_fmt(format_args!(
                "Discord rejected the webhook message with status {status}: {body}"
            )),
        }
    }
}
impl std::error::Error for WebhookError {}
