use crate::retry::RetryPolicy;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
#[serde(deny_unknown_fields)]
pub struct Options {
    pub announcement: Announcement,
    pub notify: Notify,
    pub token: RetryPolicy,
    pub endpoints: Endpoints,
}

/// Base URLs of the services the relay talks to.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
#[serde(deny_unknown_fields)]
pub struct Endpoints {
    pub oauth_token: String,
    pub helix: String,
    pub discord: String,
}

/// How the Discord message looks.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
#[serde(deny_unknown_fields)]
pub struct Announcement {
    pub username: String,
    pub avatar_url: String,
    /// `{name}` is replaced by the broadcaster's display name.
    pub title: String,
    pub color: u32,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
#[serde(default)]
#[serde(deny_unknown_fields)]
pub struct Notify {
    /// Seconds between two checks of a stream that is not live yet.
    pub retry_delay_secs: u64,
    pub max_attempts: u32,
}

#[derive(Debug)]
pub enum OptionsError {
    IO(std::io::Error),
    Parse(toml::de::Error),
}

impl Options {
    /// Reads an options file. Missing sections and keys keep their defaults.
    ///
    /// # Errors
    /// Returns `Err(OptionsError...)`:
    /// * `::IO` if the file could not be read.
    /// * `::Parse` if the file is not valid TOML or has unknown keys.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, OptionsError> {
        let text = std::fs::read_to_string(path).map_err(OptionsError::IO)?;
        Options::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, OptionsError> {
        toml::from_str(text).map_err(OptionsError::Parse)
    }
}

impl Default for Announcement {
    fn default() -> Self {
        Self {
            username: String::from("M. Frog"),
            avatar_url: String::from("https://media.discordapp.net/attachments/473452865138982944/816014015318065182/Sticker_Gregre_business_frog.png"),
            title: String::from("{name} est en Live !"),
            color: 0x0099ff,
        }
    }
}
impl Default for Endpoints {
    fn default() -> Self {
        Self {
            oauth_token: String::from("https://id.twitch.tv/oauth2/token"),
            helix: String::from("https://api.twitch.tv/helix"),
            discord: String::from("https://discord.com/api"),
        }
    }
}
impl Default for Notify {
    fn default() -> Self {
        Self {
            retry_delay_secs: 5,
            max_attempts: 60,
        }
    }
}

impl std::fmt::Display for OptionsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OptionsError::IO(err) => {
                f.write_fmt(format_args!("Error reading the options file: {err}"))
            }
            OptionsError::Parse(err) => {
                f.write_fmt(format_args!("Error parsing the options file: {err}"))
            }
        }
    }
}
impl std::error::Error for OptionsError {}
