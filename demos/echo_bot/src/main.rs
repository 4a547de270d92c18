//! Echo Bot Example
//!
//! A small bot showing the pieces of Courier working together:
//!
//! - an `update` handler that logs every incoming update
//! - `/echo <text>` replies with the text
//! - `/setLoc <lat> <lon>` sends the point back as a location
//! - `/ping` replies with `Pong!`
//!
//! # Usage
//!
//! ```bash
//! COURIER_BOT__TOKEN=123456:ABC cargo run --package echo-bot
//! cargo run --package echo-bot -- --config courier.toml --profile production
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use courier::prelude::*;
use courier::runtime::RuntimeBuilder;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "echo-bot", about = "A small echo bot built on Courier")]
struct Args {
    /// Configuration file; by default `courier.toml` is searched for.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Configuration profile (development, production, ...).
    #[arg(short, long)]
    profile: Option<String>,

    /// Bot token, overriding the configuration.
    #[arg(long)]
    token: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

async fn on_ready(ctx: HandlerContext) {
    info!(
        username = ctx.bot().username().unwrap_or("unknown"),
        "Echo bot is up"
    );
}

/// Logs every update and lets the others run.
async fn log_update(ctx: HandlerContext) {
    let Some(update) = ctx.update() else {
        return;
    };
    match update.message.as_ref() {
        Some(message) => info!(
            update_id = update.update_id,
            chat = message.chat.id,
            from = message.from.as_ref().and_then(|u| u.username.as_deref()).unwrap_or(""),
            text = message.text.as_deref().unwrap_or(""),
            "Update received"
        ),
        None => info!(update_id = update.update_id, "Update without a message"),
    }
}

async fn echo(ctx: HandlerContext) -> Result<Flow, ApiError> {
    let text = ctx.arg("text").unwrap_or_default().to_string();
    ctx.reply(&text).await?;
    Ok(Flow::Stop)
}

async fn set_location(ctx: HandlerContext) -> Result<Flow, ApiError> {
    let (Some(lat), Some(lon)) = (ctx.arg("lat"), ctx.arg("lon")) else {
        return Ok(Flow::Continue);
    };
    let (Ok(lat), Ok(lon)) = (lat.parse::<f64>(), lon.parse::<f64>()) else {
        warn!(lat, lon, "Coordinates did not parse");
        return Ok(Flow::Continue);
    };
    let Some(message) = ctx.message() else {
        return Ok(Flow::Continue);
    };

    ctx.bot()
        .send_location(message.chat.id, lat, lon, None)
        .await?;
    Ok(Flow::Stop)
}

async fn ping(ctx: HandlerContext) -> Result<Flow, ApiError> {
    ctx.reply("Pong!").await?;
    Ok(Flow::Stop)
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut builder = RuntimeBuilder::new();
    if let Some(path) = &args.config {
        builder = builder.config_file(path);
    }
    if let Some(profile) = args.profile {
        builder = builder.profile(profile);
    }
    if let Some(token) = args.token {
        builder = builder.token(token);
    }

    let dispatcher = Dispatcher::new()
        .with(EventKind::Ready, on_ready)
        .with(EventKind::Update, log_update);
    let runtime = builder.dispatcher(dispatcher).build()?;

    runtime
        .on_command(
            CommandSpec::new("echo").named("text", patterns::REST),
            echo,
        )
        .await?;
    runtime
        .on_command(
            CommandSpec::new("setLoc")
                .named("lat", patterns::NUM)
                .named("lon", patterns::NUM),
            set_location,
        )
        .await?;
    runtime.on_command(CommandSpec::new("ping"), ping).await?;

    runtime.run().await?;
    Ok(())
}
