use serde::Deserialize;

pub const MESSAGE_ID: &str = "Twitch-Eventsub-Message-Id";
pub const MESSAGE_TIMESTAMP: &str = "Twitch-Eventsub-Message-Timestamp";
pub const MESSAGE_SIGNATURE: &str = "Twitch-Eventsub-Message-Signature";
pub const MESSAGE_TYPE: &str = "Twitch-Eventsub-Message-Type";

pub const STREAM_ONLINE: &str = "stream.online";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Verification,
    Notification,
    Revocation,
}

impl MessageType {
    pub fn from_header(value: &str) -> Option<Self> {
        match value {
            "webhook_callback_verification" => Some(MessageType::Verification),
            "notification" => Some(MessageType::Notification),
            "revocation" => Some(MessageType::Revocation),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct VerificationMessage {
    pub challenge: String,
}

/// The event is kept as JSON until the subscription type says what it is.
#[derive(Debug, Deserialize)]
pub struct NotificationMessage {
    pub subscription: Subscription,
    pub event: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct RevocationMessage {
    pub subscription: Subscription,
}

#[derive(Debug, Deserialize)]
pub struct Subscription {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub status: Option<String>,
}
