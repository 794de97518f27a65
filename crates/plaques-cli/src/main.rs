use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use plaques_cli::args::{parse_bbox, parse_confidence, StoreOverrides};
use plaques_cli::output::OutputFormat;
use plaques_lib::GeoBounds;
use plaques_service_shared::{init_logging, port_from_env, LoggingConfig, MAX_LIMIT};

mod commands;

use commands::query::{handle_detail, handle_list, handle_search, WindowArgs};
use commands::serve::handle_serve;

#[derive(Parser, Debug)]
#[command(author, version, about = "Query historical plaque observations")]
struct Cli {
    /// SQLite database file (overrides PLAQUES_DB_PATH).
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Table holding the plaque rows (overrides PLAQUES_TABLE).
    #[arg(long, global = true)]
    table: Option<String>,

    /// Store backend: sqlite or bigquery (overrides PLAQUES_BACKEND).
    #[arg(long, global = true)]
    backend: Option<String>,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Json, global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args, Debug, Clone)]
struct Window {
    /// Maximum plaques to return.
    #[arg(
        long,
        default_value_t = 100,
        value_parser = clap::value_parser!(u32).range(1..=MAX_LIMIT as i64)
    )]
    limit: u32,

    /// Plaques to skip before the first result.
    #[arg(long, default_value_t = 0)]
    offset: u32,

    /// Only plaques with at least this confidence (0 to 1).
    #[arg(long, value_parser = parse_confidence)]
    min_confidence: Option<f64>,

    /// Bounding box as north,south,east,west.
    #[arg(long, value_parser = parse_bbox, allow_hyphen_values = true)]
    bbox: Option<GeoBounds>,
}

impl From<Window> for WindowArgs {
    fn from(window: Window) -> Self {
        WindowArgs {
            limit: window.limit,
            offset: window.offset,
            min_confidence: window.min_confidence,
            bbox: window.bbox,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show a single plaque by id.
    Detail {
        /// Plaque identifier.
        id: String,
    },
    /// Page through plaques by descending confidence.
    List {
        #[command(flatten)]
        window: Window,
    },
    /// Case-insensitive substring search over plaque text.
    Search {
        /// Text to look for.
        text: String,
        #[command(flatten)]
        window: Window,
    },
    /// Serve the detail, list and search endpoints on one port.
    Serve {
        /// Listening port (defaults to SERVICE_PORT, then 8080).
        #[arg(long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let overrides = StoreOverrides {
        db: cli.db,
        table: cli.table,
        backend: cli.backend,
    };

    if let Command::Serve { .. } = cli.command {
        init_logging(&LoggingConfig::from_env().with_service("plaques"));
    } else {
        init_tracing();
    }

    let config = overrides
        .resolve(|key| std::env::var(key).ok())
        .context("invalid store configuration")?;

    match cli.command {
        Command::Detail { id } => handle_detail(&config, &id, cli.format).await,
        Command::List { window } => handle_list(&config, &window.into(), cli.format).await,
        Command::Search { text, window } => {
            handle_search(&config, &text, &window.into(), cli.format).await
        }
        Command::Serve { port } => handle_serve(&config, port.unwrap_or_else(port_from_env)).await,
    }
}

/// Diagnostics go to stderr so stdout stays parseable.
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}
