use std::time::Duration;

/// An app access token obtained through the client-credentials grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub access_token: String,
    pub expires_in: Duration,
}

impl AccessToken {
    /// How long to wait before asking for the next token. Refreshes a
    /// little before the token actually expires.
    pub fn refresh_after(&self) -> Duration {
        let margin = (self.expires_in / 10).min(Duration::from_secs(600));
        (self.expires_in - margin).max(Duration::from_secs(1))
    }
}
