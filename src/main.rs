use auth::access::AccessTokenManager;
use clap::Parser;
use discord::DiscordWebhook;
use notify::Notifier;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

mod auth;
mod cli;
mod discord;
mod eventsub;
mod notify;
mod options;
mod retry;
mod server;
#[cfg(test)]
mod testing;
mod twitch;

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose {
            "streamhook=debug"
        } else {
            "streamhook=info"
        })
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn run(args: cli::Cli) -> Result<(), Box<dyn std::error::Error>> {
    let options = match &args.options_file {
        Some(path) => options::Options::load(path)?,
        None => options::Options::default(),
    };

    let secret = args.webhook_secret.filter(|secret| !secret.is_empty());
    if secret.is_none() {
        warn!("Twitch signing secret is empty, every callback will be refused.");
    }

    let access = AccessTokenManager::new(auth::AccessTokenManagerData {
        client_id: args.clientid,
        client_secret: args.clientsecret,
        token_url: options.endpoints.oauth_token.clone(),
    });
    access.acquire_with_retry(&options.token).await?;

    let cancel = CancellationToken::new();
    let refresh = access.spawn_refresh(options.token, cancel.clone());

    let notifier = Notifier::new(notify::NotifierData {
        helix: twitch::HelixClient::new(access, options.endpoints.helix.clone()),
        webhook: DiscordWebhook::new(discord::data::DiscordWebhookData {
            base_url: options.endpoints.discord.clone(),
            hook_id: args.discord_hook_id,
            token: args.discord_hook_token,
        }),
        announcement: options.announcement.clone(),
        policy: options.notify,
        cancel: cancel.clone(),
    });

    let server = server::Server::start(server::ServerData {
        address: format!("{}:{}", args.host, args.port),
        secret,
        notifier,
        runtime: tokio::runtime::Handle::current(),
    })?;
    info!(
        "Your app is listening on port {}",
        server.local_addr().map_or(args.port, |address| address.port())
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    cancel.cancel();
    tokio::task::spawn_blocking(move || server.shutdown()).await?;
    refresh.await?;

    Ok(())
}

fn main() -> ExitCode {
    // A missing .env file is fine, the environment may already be set.
    let _ = dotenvy::dotenv();
    let args = cli::Cli::parse();
    init_tracing(args.verbose);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}
