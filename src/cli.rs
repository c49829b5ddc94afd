use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "streamhook")]
#[command(author, version)]
#[command(about = "Announces Twitch streams going live on a Discord webhook.")]
pub struct Cli {
    /// Secret the EventSub subscription was created with.
    #[arg(long = "webhook-secret", env = "TWITCH_WEBHOOK_SECRET", hide_env_values = true)]
    pub webhook_secret: Option<String>,
    #[arg(short = 'i', long, env = "TWITCH_APP_ID")]
    pub clientid: String,
    #[arg(short = 's', long, env = "TWITCH_APP_SECRET", hide_env_values = true)]
    pub clientsecret: String,
    #[arg(long = "discord-hook-id", env = "DISCORD_HOOKID")]
    pub discord_hook_id: String,
    #[arg(long = "discord-hook-token", env = "DISCORD_WEBHOOK_SECRET", hide_env_values = true)]
    pub discord_hook_token: String,
    #[arg(short = 'p', long, env = "PORT", default_value_t = 8000)]
    pub port: u16,
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,
    #[arg(short = 'o', long = "options-file", env = "STREAMHOOK_OPTIONS")]
    pub options_file: Option<PathBuf>,
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long)]
    pub verbose: bool,
}
