//! Feed Ticker - Remote Feeds on a Character Display
//!
//! Scrolls the entries of one feed at a time across a small character
//! display. Three buttons switch to the next or previous feed and shut the
//! device down.
//!
//! # Usage
//!
//! ```bash
//! # Start with the default feed list (~/.config/feedticker/feeds.toml)
//! feedticker
//!
//! # Custom feed list, starting on the third feed
//! feedticker --config /etc/feedticker/feeds.toml --initial-feed 2
//!
//! # Exit instead of powering off when the shutdown button is pressed
//! feedticker --no-poweroff
//!
//! # Verbose logging (written to stderr)
//! RUST_LOG=debug feedticker 2> ticker.log
//! ```
//!
//! # Buttons
//!
//! The terminal keyboard stands in for the hardware buttons. By default
//! Right/`n` selects the next feed, Left/`p` the previous one, and
//! `q`/Esc starts the shutdown sequence (notice, then poweroff).
//!
//! # Signals
//!
//! - `SIGTERM` / `SIGINT` / Ctrl+C: Blank the panel and exit. The machine
//!   keeps running, so `systemctl stop` or `restart` is safe.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use ticker_core::{
    load_config, load_config_from_path, ConfigOverrides, ConsoleDisplay, Control, Controller,
    Display, HttpFeedSource, KeyboardButtons, ShutdownRendezvous, ShutdownSequence,
    SwitchListener, TickerConfig, Viewer,
};

/// Feed Ticker - scrolls remote feeds on a character display
#[derive(Parser, Debug)]
#[command(name = "feedticker")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Feed list file (TOML, or a JSON array with a .json/.txt extension)
    #[arg(short = 'c', long, env = "TICKER_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Index of the feed shown at startup
    #[arg(short = 'i', long, value_name = "INDEX")]
    initial_feed: Option<usize>,

    /// Seconds each entry stays on screen
    #[arg(long, value_name = "SECS")]
    dwell_secs: Option<u64>,

    /// Display width in characters
    #[arg(long, value_name = "COLS")]
    cols: Option<u16>,

    /// Display height in rows
    #[arg(long, value_name = "ROWS")]
    rows: Option<u16>,

    /// Exit instead of powering off after the shutdown notice
    #[arg(long)]
    no_poweroff: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, env = "TICKER_LOG_LEVEL", default_value = "warn")]
    log_level: String,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            initial_feed: self.initial_feed,
            dwell_secs: self.dwell_secs,
            cols: self.cols,
            rows: self.rows,
            poweroff: self.no_poweroff.then_some(false),
        }
    }
}

/// Initialize logging with the specified level
///
/// Logs go to stderr so they do not overwrite the panel on stdout.
fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("ticker_daemon={level},ticker_core={level}"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(true)
        .init();
}

/// Load the configuration file, then apply CLI overrides and validate
fn resolve_config(args: &Args) -> Result<TickerConfig> {
    let mut config = match &args.config {
        Some(path) => load_config_from_path(Some(path.clone())),
        None => load_config(),
    }
    .context("Failed to load configuration")?;

    args.overrides().apply(&mut config);
    config.validate().context("Invalid configuration")?;

    info!(
        source = %config.source(),
        path = ?config.config_file_path,
        feeds = config.feeds.len(),
        "Configuration resolved"
    );
    Ok(config)
}

/// Cancel `interrupt` on SIGTERM or SIGINT
fn spawn_signal_handler(interrupt: CancellationToken) -> Result<()> {
    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
    let mut sigint =
        signal(SignalKind::interrupt()).context("Failed to install SIGINT handler")?;

    tokio::spawn(async move {
        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM"),
            _ = sigint.recv() => info!("Received SIGINT"),
        }
        interrupt.cancel();
    });
    Ok(())
}

/// Register the three button handlers
fn register_buttons(
    listener: &mut SwitchListener,
    controller: &Arc<Controller>,
    rendezvous: &Arc<ShutdownRendezvous>,
) {
    let next = Arc::clone(controller);
    listener.register(Control::Next, move || {
        let controller = Arc::clone(&next);
        async move {
            if let Err(e) = controller.next_feed().await {
                warn!(error = %e, "Next feed failed");
            }
        }
    });

    let previous = Arc::clone(controller);
    listener.register(Control::Previous, move || {
        let controller = Arc::clone(&previous);
        async move {
            if let Err(e) = controller.previous_feed().await {
                warn!(error = %e, "Previous feed failed");
            }
        }
    });

    let shutdown = Arc::clone(rendezvous);
    listener.register(Control::Shutdown, move || {
        let rendezvous = Arc::clone(&shutdown);
        async move { rendezvous.request().await }
    });
}

async fn run(config: TickerConfig) -> Result<()> {
    let feeds = config.feed_list()?;
    let cols = u16::try_from(config.viewer.width).unwrap_or(u16::MAX);

    let display: Arc<dyn Display> = Arc::new(ConsoleDisplay::new(cols, config.rows));
    let source = Arc::new(
        HttpFeedSource::new(config.fetch_timeout).context("Failed to build HTTP client")?,
    );
    let viewer = Viewer::new(Arc::clone(&display), source, config.viewer)
        .context("Failed to prepare display")?;
    let controller = Arc::new(Controller::launch(viewer, feeds, config.initial_feed).await?);

    let rendezvous = Arc::new(ShutdownRendezvous::new());
    let mut listener = SwitchListener::new();
    register_buttons(&mut listener, &controller, &rendezvous);

    let interrupt = CancellationToken::new();
    match KeyboardButtons::new(config.buttons.clone(), interrupt.clone()) {
        Ok(keyboard) => listener.activate(keyboard)?,
        Err(e) => warn!(
            error = %e,
            "Keyboard buttons unavailable; only signals can stop the ticker"
        ),
    }
    spawn_signal_handler(interrupt.clone())?;

    let sequence = ShutdownSequence::new(display, config.shutdown.action())
        .with_notice(config.shutdown.notice.clone())
        .with_delay(config.shutdown.delay);

    info!("Ticker running");
    sequence
        .run_until(&rendezvous, &mut listener, &controller, interrupt.cancelled())
        .await
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging first
    init_logging(&args.log_level);

    info!("Feed ticker starting");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = resolve_config(&args)?;
    run(config).await
}
