use serde::Deserialize;

/// The `event` of a `stream.online` notification.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct LiveEvent {
    #[serde(default)]
    pub id: Option<String>,
    pub broadcaster_user_id: String,
    pub broadcaster_user_login: String,
    pub broadcaster_user_name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub started_at: String,
}
