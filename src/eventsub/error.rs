/// Why an inbound webhook was not accepted as coming from Twitch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyError {
    MissingHeader(&'static str),
    BadTimestamp(String),
    /// The message is older (or newer) than the freshness window allows.
    Stale { age_secs: i64 },
    /// No signing secret is configured.
    NoSecret,
    Mismatch,
}

impl std::fmt::Display for VerifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerifyError::MissingHeader(header) => {
                f.write_fmt(format_args!("Verification failed: missing header {header}"))
            }
            VerifyError::BadTimestamp(timestamp) => f.write_fmt(format_args!(
                "Verification failed: invalid timestamp {timestamp:?}"
            )),
            VerifyError::Stale { age_secs } => f.write_fmt(format_args!(
                "Verification failed: message is {age_secs}s old, more than 10 minutes"
            )),
            VerifyError::NoSecret => f.write_str("Verification failed: signing secret is empty"),
            VerifyError::Mismatch => f.write_str("Verification failed: invalid signature"),
        }
    }
}
impl std::error::Error for VerifyError {}
