use std::sync::Arc;

use anyhow::{Context, anyhow};
use clap::Parser;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use cup_bot::config::BotConfig;
use cup_bot::engine::cup_engine::CupEngine;
use cup_bot::engine::dispatch::{EVENT_QUEUE_CAPACITY, run_dispatcher};
use cup_bot::platform::discord::DiscordRest;
use cup_bot::web::app_state::AppState;
use cup_bot::web::router::build_router;

/// Reaction-driven team signup bot for Discord.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Path to the TOML config file.
    #[arg(short, long, default_value = "cupbot.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = BotConfig::load(&args.config).map_err(|e| anyhow!(e))?;
    config.validate().map_err(|e| anyhow!(e))?;

    let discord = Arc::new(DiscordRest::new(&config.discord));
    let presence = discord.presence();
    let engine = Arc::new(CupEngine::new(discord, &config));

    let cancel = CancellationToken::new();
    let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);

    let dispatcher = tokio::spawn(run_dispatcher(
        engine.clone(),
        events_rx,
        cancel.clone(),
    ));

    let app_state = Arc::new(AppState {
        engine,
        events: events_tx,
        relay_token: config.relay.token.clone(),
        presence,
        presence_config: config.presence.clone(),
    });
    let app = build_router(app_state);

    let listener = tokio::net::TcpListener::bind(&config.relay.listen_address)
        .await
        .with_context(|| format!("failed to bind {}", config.relay.listen_address))?;

    info!(
        address = %config.relay.listen_address,
        guild_id = config.cup.guild_id,
        channel_id = config.cup.channel_id,
        team_size = config.cup.team_size,
        "cup bot starting"
    );

    let shutdown = cancel.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "failed to listen for shutdown signal");
            }
            info!("shutdown requested");
            shutdown.cancel();
        })
        .await
        .context("relay server error")?;

    cancel.cancel();
    if let Err(e) = dispatcher.await {
        error!(error = %e, "dispatcher task failed");
    }
    info!("cup bot stopped");
    Ok(())
}
