//! Announces live streams on Discord.
use crate::discord::DiscordWebhook;
use crate::eventsub::event::LiveEvent;
use crate::options::{Announcement, Notify};
use crate::twitch::HelixClient;
use error::NotifyError;
use ring::rand::SecureRandom;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub mod announce;
pub mod error;

#[derive(Debug)]
pub struct NotifierData {
    pub helix: HelixClient,
    pub webhook: DiscordWebhook,
    pub announcement: Announcement,
    pub policy: Notify,
    /// Cancels pending "not live yet" retries.
    pub cancel: CancellationToken,
}

/// Can be reused by cloning.
#[derive(Debug, Clone)]
pub struct Notifier(Arc<NotifierData>);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Delivered,
    /// The stream never showed up as live within the allowed attempts.
    GaveUp,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    Delivered,
    NotLive,
}

impl Notifier {
    pub fn new(data: NotifierData) -> Self {
        Notifier(Arc::new(data))
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.0.policy.retry_delay_secs)
    }

    /// Runs [notify](Notifier::notify) in the background and logs how it ended.
    pub fn spawn(&self, event: LiveEvent) -> JoinHandle<()> {
        let notifier = self.clone();
        tokio::spawn(async move {
            let broadcaster = event.broadcaster_user_login.as_str();
            debug!(
                broadcaster,
                event_id = event.id.as_deref().unwrap_or_default(),
                kind = event.kind.as_str(),
                "Announcing stream"
            );
            match notifier.notify(&event).await {
                Ok(Outcome::Delivered) => info!(broadcaster, "Announced stream"),
                Ok(Outcome::GaveUp) => warn!(
                    broadcaster,
                    attempts = notifier.0.policy.max_attempts,
                    "Stream never showed up as live, giving up"
                ),
                Ok(Outcome::Cancelled) => debug!(broadcaster, "Announcement cancelled"),
                Err(err) => error!(broadcaster, "Could not announce stream: {err}"),
            }
        })
    }

    /// Announces `event` once Helix reports the stream as live. Twitch can
    /// deliver `stream.online` before the stream is visible, so the lookup is
    /// repeated every retry delay, up to the configured number of attempts.
    ///
    /// # Errors
    /// Returns `Err(NotifyError...)`:
    /// * `::Helix` if the stream or user lookup failed.
    /// * `::Webhook` if Discord did not take the message.
    pub async fn notify(&self, event: &LiveEvent) -> Result<Outcome, NotifyError> {
        let max_attempts = self.0.policy.max_attempts.max(1);
        let mut attempts = 0;
        loop {
            attempts += 1;
            if self.attempt(event).await? == Attempt::Delivered {
                return Ok(Outcome::Delivered);
            }
            if attempts >= max_attempts {
                return Ok(Outcome::GaveUp);
            }
            debug!(
                broadcaster = event.broadcaster_user_login.as_str(),
                attempts,
                "Stream not live yet, retrying in {:?}",
                self.retry_delay()
            );
            tokio::select! {
                () = self.0.cancel.cancelled() => return Ok(Outcome::Cancelled),
                () = tokio::time::sleep(self.retry_delay()) => {}
            }
        }
    }

    async fn attempt(&self, event: &LiveEvent) -> Result<Attempt, NotifyError> {
        let helix = &self.0.helix;
        let user_id = event.broadcaster_user_id.as_str();
        let (stream, user) = tokio::try_join!(helix.get_stream(user_id), helix.get_user(user_id))?;
        let Some(stream) = stream else {
            return Ok(Attempt::NotLive);
        };
        debug!(
            stream_id = stream.id.as_str(),
            user = stream.user_name.as_str(),
            viewers = stream.viewer_count,
            started_at = stream.started_at.as_str(),
            "Stream is live"
        );
        match &user {
            Some(user) => debug!(display_name = user.display_name.as_str(), "Found user profile"),
            None => warn!(user_id, "Broadcaster has no user profile"),
        }

        let game = match helix.get_game(&stream.game_id).await {
            Ok(Some(game)) => {
                debug!(game = game.name.as_str(), "Found game");
                Some(game)
            }
            Ok(None) => None,
            Err(err) => {
                warn!(game_id = stream.game_id.as_str(), "Could not fetch game: {err}");
                None
            }
        };

        let message = announce::compose(
            announce::Enriched {
                event,
                stream: &stream,
                user: user.as_ref(),
                game: game.as_ref(),
            },
            &self.0.announcement,
            cache_buster(),
            chrono::Utc::now(),
        );
        self.0.webhook.send(&message).await?;
        Ok(Attempt::Delivered)
    }
}

fn cache_buster() -> u16 {
    let mut buf = [0; 2];
    match ring::rand::SystemRandom::new().fill(&mut buf) {
        Ok(()) => u16::from_le_bytes(buf) % 1000,
        Err(_) => 0,
    }
}
