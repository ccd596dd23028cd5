//! framecast command-line entry point.
//!
//! ```text
//! framecast                          Stream with the saved settings
//! framecast stream --target h:p      Save a new listener and stream
//! framecast connect <host[:port]>    Save the streaming target
//! framecast displays                 List capturable displays
//! framecast select-display <N>       Save the display to capture
//! framecast listen --out-dir frames  Receive frames (for testing)
//! framecast --gen-config             Write default config to stdout
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use framecast_client::config::{ClientConfig, SharedConfig, TargetConfig};
use framecast_client::listener;
use framecast_client::service::StreamService;
use framecast_core::{CaptureSource, DisplaySettings, ScrapSource};

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "framecast", version, about = "Stream your screen to a remote listener")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "framecast.toml", global = true)]
    config: PathBuf,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Stream the selected display until Ctrl-C.
    Stream {
        /// Listener address (host or host:port); saved for later runs.
        #[arg(short, long)]
        target: Option<String>,

        /// Display to capture; saved for later runs.
        #[arg(short, long)]
        display: Option<usize>,
    },

    /// Save the listener address (host or host:port).
    Connect { target: String },

    /// List the displays that can be captured.
    Displays,

    /// Save the display to capture.
    SelectDisplay { index: usize },

    /// Receive a stream and optionally store each frame as a JPEG.
    Listen {
        /// Address to bind to.
        #[arg(short, long, default_value = "0.0.0.0:56565")]
        bind: String,

        /// Directory for received frames.
        #[arg(short, long)]
        out_dir: Option<PathBuf>,
    },
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // --gen-config: dump defaults and exit.
    if cli.gen_config {
        let text = toml::to_string_pretty(&ClientConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    // First run: bootstrap the config file so later edits have a template.
    let bootstrapped = !cli.config.exists();
    if bootstrapped {
        ClientConfig::write_default(&cli.config)?;
    }
    let config = Arc::new(SharedConfig::load(&cli.config));

    // Init tracing.
    let level = config.snapshot().logging.level;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("framecast v{}", env!("CARGO_PKG_VERSION"));
    if bootstrapped {
        info!("wrote default config to {}", cli.config.display());
    }

    match cli.command.unwrap_or(Command::Stream {
        target: None,
        display: None,
    }) {
        Command::Stream { target, display } => stream(config, target, display).await?,
        Command::Connect { target } => {
            let target = TargetConfig::parse(&target)?;
            info!("saving target {}", target.connection());
            config.update(|c| c.target = target)?;
            println!("Target saved to {}.", config.path().display());
        }
        Command::Displays => list_displays(&config)?,
        Command::SelectDisplay { index } => {
            let active = ScrapSource::new().active_display_count()?;
            if index >= active {
                return Err(format!("display {index} is not active ({active} active)").into());
            }
            config.update(|c| c.capture.display = index)?;
            println!("Display {index} selected.");
        }
        Command::Listen { bind, out_dir } => {
            let shutdown = CancellationToken::new();
            spawn_ctrl_c({
                let shutdown = shutdown.clone();
                move || shutdown.cancel()
            });
            listener::listen(&bind, out_dir, shutdown).await?;
        }
    }

    Ok(())
}

async fn stream(
    config: Arc<SharedConfig>,
    target: Option<String>,
    display: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(target) = target {
        let target = TargetConfig::parse(&target)?;
        config.update(|c| c.target = target)?;
    }
    if let Some(display) = display {
        config.update(|c| c.capture.display = display)?;
    }

    let snapshot = config.snapshot();
    info!("target: {}", snapshot.target.address());
    info!("display: {}", snapshot.capture.display);

    let service = StreamService::new(ScrapSource::new(), config);
    let stop = service.stop_handle();
    spawn_ctrl_c(move || stop.stop());

    match service.run().await {
        Ok(()) => {
            info!("stopped streaming");
            Ok(())
        }
        Err(e) => {
            error!("streaming failed ({}): {e}", e.reason());
            Err(e.into())
        }
    }
}

fn list_displays(config: &SharedConfig) -> Result<(), Box<dyn std::error::Error>> {
    let active = ScrapSource::new().active_display_count()?;
    if active == 0 {
        println!("No capturable displays.");
        return Ok(());
    }
    let selected = config.display_index();
    for i in 0..active {
        let mark = if i == selected { "x" } else { " " };
        println!("[{mark}] Display {i}");
    }
    Ok(())
}

/// Run `on_signal` once Ctrl-C is received.
fn spawn_ctrl_c<F>(on_signal: F)
where
    F: FnOnce() + Send + 'static,
{
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received; shutting down");
        on_signal();
    });
}
