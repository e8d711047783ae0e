//! chatmood-bot - YouTube live chat poller
//!
//! Registers a new stream session with chatmood-srv, records the dataset path
//! in the session pointer file, then forwards live chat messages until the
//! chat ends or Ctrl+C.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chatmood_bot::{IntakeClient, Poller, YouTubeClient};
use chatmood_common::config::{load_toml_config, BotSection, BotSettings};
use chatmood_common::{pointer, video};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for chatmood-bot
#[derive(Parser, Debug)]
#[command(name = "chatmood-bot")]
#[command(about = "Forward a YouTube live chat to chatmood-srv")]
#[command(version)]
struct Args {
    /// Live stream URL (prompted for when omitted)
    url: Option<String>,

    /// YouTube Data API key
    #[arg(long, env = "YOUTUBE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Config file (TOML)
    #[arg(short, long, env = "CHATMOOD_CONFIG")]
    config: Option<PathBuf>,

    /// Base URL of chatmood-srv
    #[arg(short, long, env = "CHATMOOD_SERVER_URL")]
    server_url: Option<String>,

    /// File receiving the active dataset path
    #[arg(long, env = "CHATMOOD_POINTER_FILE")]
    pointer_file: Option<PathBuf>,

    /// YouTube Data API base URL
    #[arg(long, env = "CHATMOOD_API_BASE")]
    api_base: Option<String>,
}

impl Args {
    fn section(&self) -> BotSection {
        BotSection {
            server_url: self.server_url.clone(),
            pointer_file: self.pointer_file.clone(),
            api_base: self.api_base.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env first so clap sees YOUTUBE_API_KEY
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chatmood_bot=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "chatmood-bot v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();

    let toml = load_toml_config(args.config.as_deref()).context("Failed to load config")?;
    let settings = BotSettings::from_section(args.section().or(toml.bot))
        .context("Invalid bot configuration")?;

    let api_key = match args.api_key.as_deref().map(str::trim) {
        Some(key) if !key.is_empty() => key.to_string(),
        _ => bail!("YOUTUBE_API_KEY is not set (use --api-key, the environment or a .env file)"),
    };

    let url = match args.url.clone() {
        Some(url) => url,
        None => prompt("Enter YouTube live URL: ").await?,
    };
    let video_id = video::require_video_id(&url).context("Invalid YouTube URL format")?;

    // Register the session with the server
    info!("Telling server about new stream: {}...", video_id);
    let intake = IntakeClient::new(&settings.server_url).context("Failed to create HTTP client")?;
    let dataset = intake.set_stream(&url).await.with_context(|| {
        format!(
            "Could not set new stream in backend at {} (is chatmood-srv running?)",
            settings.server_url
        )
    })?;
    info!("Backend set to save data to: {}", dataset);

    pointer::write_pointer(&settings.pointer_file, &dataset).with_context(|| {
        format!("Failed to write {}", settings.pointer_file.display())
    })?;
    info!("Wrote filename to {}", settings.pointer_file.display());

    // Find the chat to poll
    let youtube = YouTubeClient::new(&settings.api_base, api_key)
        .context("Failed to create YouTube client")?;
    let live_chat_id = youtube
        .resolve_live_chat_id(&video_id)
        .await
        .context("Could not find the live chat")?;

    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_ctrl_c(shutdown.clone()));

    let poller = Poller::new(youtube.live_chat(live_chat_id), intake);
    poller.run(shutdown).await;

    info!("Bot stopped");
    Ok(())
}

/// Read one trimmed line from stdin
async fn prompt(question: &str) -> Result<String> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(question.as_bytes()).await?;
    stdout.flush().await?;

    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .context("Failed to read URL from stdin")?;
    Ok(line.trim().to_string())
}

async fn cancel_on_ctrl_c(shutdown: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("Received Ctrl+C, shutting down");
            shutdown.cancel();
        }
        Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
    }
}
