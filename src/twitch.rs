use crate::auth::access::AccessTokenManager;
use crate::auth::error::AccessTokenManagerError;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct HelixClient {
    access: AccessTokenManager,
    base_url: String,
    http: Client,
}

#[derive(Debug, Deserialize)]
pub struct TwitchError {
    pub error: Option<String>,
    pub status: u16,
    pub message: String,
}

#[derive(Debug)]
pub enum HelixError {
    Access(AccessTokenManagerError),
    Net(reqwest::Error),
    BadData(serde_json::Error),
    Twitch(TwitchError),
}

/// A live stream, as returned by `GET /streams`.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamSnapshot {
    pub id: String,
    pub user_login: String,
    pub user_name: String,
    pub game_id: String,
    pub game_name: String,
    pub title: String,
    pub thumbnail_url: String,
    #[serde(default)]
    pub viewer_count: u64,
    pub started_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserProfile {
    pub display_name: String,
    pub profile_image_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GameMetadata {
    pub name: String,
    pub box_art_url: String,
}

#[derive(Debug, Deserialize)]
struct HelixData<T> {
    data: Vec<T>,
}

/// Parses a Twitch response body. Error bodies (`{status, message}`) and
/// non-2xx statuses go through `on_twitch`, anything else that doesn't parse
/// through `on_bad_data`.
pub fn parse_twitch<T: DeserializeOwned, E>(
    status: StatusCode,
    data: &str,
    on_twitch: impl FnOnce(TwitchError) -> E,
    on_bad_data: impl FnOnce(serde_json::Error) -> E,
) -> Result<T, E> {
    if !status.is_success() {
        let error = serde_json::from_str::<TwitchError>(data).unwrap_or_else(|_| TwitchError {
            error: status.canonical_reason().map(String::from),
            status: status.as_u16(),
            message: data.to_owned(),
        });
        return Err(on_twitch(error));
    }
    match serde_json::from_str(data) {
        Ok(data) => Ok(data),
        Err(err) => match serde_json::from_str::<TwitchError>(data) {
            Ok(error) => Err(on_twitch(error)),
            Err(_) => Err(on_bad_data(err)),
        },
    }
}

impl HelixClient {
    pub fn new<S: Into<String>>(access: AccessTokenManager, base_url: S) -> Self {
        HelixClient {
            access,
            base_url: base_url.into(),
            http: Client::new(),
        }
    }

    /// The stream of `user_id`, or `None` if the channel is not live.
    pub async fn get_stream(&self, user_id: &str) -> Result<Option<StreamSnapshot>, HelixError> {
        self.get_first("streams", "user_id", user_id).await
    }

    pub async fn get_user(&self, user_id: &str) -> Result<Option<UserProfile>, HelixError> {
        self.get_first("users", "id", user_id).await
    }

    /// The game (category) with `game_id`. Streams without a category have
    /// an empty game id, which is `None` without asking Twitch.
    pub async fn get_game(&self, game_id: &str) -> Result<Option<GameMetadata>, HelixError> {
        if game_id.is_empty() {
            return Ok(None);
        }
        self.get_first("games", "id", game_id).await
    }

    async fn get_first<T: DeserializeOwned>(
        &self,
        resource: &str,
        key: &str,
        value: &str,
    ) -> Result<Option<T>, HelixError> {
        let url = format!(
            "{}/{resource}?{key}={}",
            self.base_url,
            urlencoding::encode(value)
        );
        let data = match self.get::<HelixData<T>>(&url).await {
            Err(HelixError::Twitch(TwitchError { status: 401, .. })) => {
                warn!(resource, "Helix rejected the App Access Token, acquiring a new one");
                self.access.acquire().await.map_err(HelixError::Access)?;
                self.get::<HelixData<T>>(&url).await?
            }
            result => result?,
        };
        debug!(resource, value, found = data.data.len(), "Helix request");
        Ok(data.data.into_iter().next())
    }

    async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T, HelixError> {
        let response = self
            .http
            .get(url)
            .header("Client-Id", self.access.client_id())
            .header(
                "Authorization",
                format!(
                    "Bearer {}",
                    self.access.bearer().await.map_err(HelixError::Access)?
                ),
            )
            .send()
            .await
            .map_err(HelixError::Net)?;
        let status = response.status();
        let response = response.text().await.map_err(HelixError::Net)?;
        parse_twitch(status, &response, HelixError::Twitch, HelixError::BadData)
    }
}

impl std::fmt::Display for TwitchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let error = if let Some(error) = &self.error {
            format!(" {error}")
        } else {
            String::new()
        };
        f.write_fmt(format_args!(
            "Twitch error {}{}: {}",
            self.status, error, self.message,
        ))
    }
}
impl std::error::Error for TwitchError {}

impl std::fmt::Display for HelixError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HelixError::Access(err) => f.write_fmt(format_args!(
                "Helix error while trying to get an Access Token: {err}"
            )),
            HelixError::Net(err) => {
                f.write_fmt(format_args!("Helix error while sending a request: {err}"))
            }
            HelixError::BadData(err) => {
                f.write_fmt(format_args!("Helix error while parsing a response: {err}"))
            }
            HelixError::Twitch(err) => f.write_fmt(format_args!("{err}")),
        }
    }
}
impl std::error::Error for HelixError {}
