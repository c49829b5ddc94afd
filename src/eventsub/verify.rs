//! HMAC-SHA256 verification of EventSub webhook deliveries.
//!
//! Twitch signs `message id || timestamp || raw body` with the subscription's
//! secret and sends `sha256=<hex digest>` in the signature header.
use super::data::{MESSAGE_ID, MESSAGE_SIGNATURE, MESSAGE_TIMESTAMP};
use super::error::VerifyError;
use chrono::{DateTime, TimeZone, Utc};
use ring::hmac;

/// Messages further than this from the local clock are refused.
pub const FRESHNESS_WINDOW_SECS: i64 = 600;

/// The signature headers of one delivery.
#[derive(Debug, Clone, Copy)]
pub struct SignedMessage<'a> {
    pub message_id: &'a str,
    pub timestamp: &'a str,
    pub signature: &'a str,
}

impl<'a> SignedMessage<'a> {
    /// Collects the three signature headers with `lookup`, which must match
    /// header names case-insensitively.
    pub fn from_headers(
        lookup: impl Fn(&'static str) -> Option<&'a str>,
    ) -> Result<Self, VerifyError> {
        let get = |name: &'static str| lookup(name).ok_or(VerifyError::MissingHeader(name));
        Ok(SignedMessage {
            message_id: get(MESSAGE_ID)?,
            timestamp: get(MESSAGE_TIMESTAMP)?,
            signature: get(MESSAGE_SIGNATURE)?,
        })
    }
}

pub fn compute_signature(secret: &str, message_id: &str, timestamp: &str, body: &[u8]) -> String {
    let key = hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes());
    let mut context = hmac::Context::with_key(&key);
    context.update(message_id.as_bytes());
    context.update(timestamp.as_bytes());
    context.update(body);
    format!("sha256={}", hex::encode(context.sign().as_ref()))
}

/// Twitch sends RFC 3339 timestamps; plain Unix seconds are accepted too.
pub fn parse_timestamp(timestamp: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|time| time.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            timestamp
                .parse::<i64>()
                .ok()
                .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        })
}

/// Checks freshness, then the signature. `secret` is `None` or empty when
/// none is configured, which refuses every message.
pub fn verify(
    message: &SignedMessage<'_>,
    body: &[u8],
    secret: Option<&str>,
    now: DateTime<Utc>,
) -> Result<(), VerifyError> {
    let sent_at = parse_timestamp(message.timestamp)
        .ok_or_else(|| VerifyError::BadTimestamp(message.timestamp.to_owned()))?;
    let age = now - sent_at;
    if age.abs() > chrono::Duration::seconds(FRESHNESS_WINDOW_SECS) {
        return Err(VerifyError::Stale {
            age_secs: age.num_seconds(),
        });
    }

    let secret = match secret {
        Some(secret) if !secret.is_empty() => secret,
        _ => return Err(VerifyError::NoSecret),
    };

    let computed = compute_signature(secret, message.message_id, message.timestamp, body);
    ring::constant_time::verify_slices_are_equal(computed.as_bytes(), message.signature.as_bytes())
        .map_err(|_| VerifyError::Mismatch)
}
