use crate::twitch::TwitchError;

/// An Error returned by an [AccessTokenManager](super::access::AccessTokenManager).
#[derive(Debug)]
pub enum AccessTokenManagerError {
    /// An error returned while sending the token request.
    Net(reqwest::Error),
    /// An error returned if the data from Twitch could not be deserialized.
    BadData(serde_json::Error),
    /// An error returned if Twitch refused to hand out an App Access Token.
    OnRequest(TwitchError),
    /// An error returned if no App Access Token was ever acquired.
    NoToken,
}

impl std::fmt::Display for AccessTokenManagerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccessTokenManagerError::Net(err) => {
                f.write_fmt(format_args!("Error sending a request to Twitch: {err}"))
            }
            AccessTokenManagerError::BadData(err) => {
                f.write_fmt(format_args!("Error parsing a response from Twitch: {err}"))
            }
            AccessTokenManagerError::OnRequest(err) => f.write_fmt(format_args!(
                "Error {} requesting an Access Token from Twitch: {}",
                err.status, err.message
            )),
            AccessTokenManagerError::NoToken => {
                f.write_str("No Access Token has been acquired yet.")
            }
        }
    }
}
impl std::error::Error for AccessTokenManagerError {}
