//! Turns a live event and its Helix data into a Discord message.
use crate::discord::data::{Embed, EmbedAuthor, EmbedField, EmbedImage, WebhookMessage};
use crate::eventsub::event::LiveEvent;
use crate::options::Announcement;
use crate::twitch::{GameMetadata, StreamSnapshot, UserProfile};
use chrono::{DateTime, SecondsFormat, Utc};

const PREVIEW_SIZE: (u32, u32) = (480, 270);
const BOX_ART_SIZE: (u32, u32) = (232, 320);

/// Everything known about a stream once it is confirmed live.
#[derive(Debug, Clone, Copy)]
pub struct Enriched<'a> {
    pub event: &'a LiveEvent,
    pub stream: &'a StreamSnapshot,
    pub user: Option<&'a UserProfile>,
    pub game: Option<&'a GameMetadata>,
}

pub fn channel_url(stream: &StreamSnapshot) -> String {
    format!("https://www.twitch.tv/{}", stream.user_login)
}

/// Fills a Twitch image template (`...-{width}x{height}.jpg`).
pub fn sized(template: &str, (width, height): (u32, u32)) -> String {
    template
        .replace("{width}", &width.to_string())
        .replace("{height}", &height.to_string())
}

/// `cache_buster` is appended to the preview URL so Discord fetches a new
/// frame instead of reusing one from an earlier stream.
pub fn compose(
    enriched: Enriched<'_>,
    appearance: &Announcement,
    cache_buster: u16,
    now: DateTime<Utc>,
) -> WebhookMessage {
    let Enriched {
        event,
        stream,
        user,
        game,
    } = enriched;
    let name = &event.broadcaster_user_name;
    let url = channel_url(stream);
    // Discord refuses embed fields with an empty name.
    let field_name = if stream.title.trim().is_empty() {
        name.clone()
    } else {
        stream.title.clone()
    };

    let embed = Embed {
        title: appearance.title.replace("{name}", name),
        color: appearance.color,
        url: url.clone(),
        description: stream.game_name.clone(),
        timestamp: now.to_rfc3339_opts(SecondsFormat::Secs, true),
        author: EmbedAuthor {
            name: name.clone(),
            url: url.clone(),
            icon_url: user.map(|user| user.profile_image_url.clone()),
        },
        image: Some(EmbedImage {
            url: format!(
                "{}?rand={cache_buster}",
                sized(&stream.thumbnail_url, PREVIEW_SIZE)
            ),
        }),
        thumbnail: game.map(|game| EmbedImage {
            url: sized(&game.box_art_url, BOX_ART_SIZE),
        }),
        fields: vec![EmbedField {
            name: field_name,
            value: url,
        }],
    };

    WebhookMessage {
        username: appearance.username.clone(),
        avatar_url: appearance.avatar_url.clone(),
        embeds: vec![embed],
    }
}
