//! stockq - cancellable stock price search.

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::time::Duration;
use stockq_app::{AppConfig, Application, OutputFormat};
use stockq_core::RecordLayout;
use stockq_telemetry::Metrics;
use tracing::info;

/// Search stock price lines by ticker, with cancellation.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via STOCKQ_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,

    /// Override the source location (file path or URL)
    #[arg(short, long)]
    source: Option<String>,

    /// Override the column layout (compact or quote)
    #[arg(short, long)]
    layout: Option<RecordLayout>,

    /// Match tickers ignoring case
    #[arg(short = 'i', long)]
    ignore_case: bool,

    /// Write JSON lines instead of text
    #[arg(long)]
    json: bool,

    /// Print Prometheus metrics to stderr on exit
    #[arg(long)]
    metrics: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a single search
    Search {
        /// Ticker to search for
        identifier: String,

        /// Request cancellation after this many milliseconds
        #[arg(long)]
        cancel_after_ms: Option<u64>,
    },
    /// Read tickers from stdin and toggle searches (default)
    Interactive,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config path: CLI arg > STOCKQ_CONFIG env var > default (optional)
    let config_path = args.config.clone().or_else(|| std::env::var("STOCKQ_CONFIG").ok());
    let mut config = AppConfig::load(config_path.as_deref())?;

    if let Some(source) = args.source {
        config.source.location = source;
    }
    if let Some(layout) = args.layout {
        config.source.layout = layout;
    }
    if args.ignore_case {
        config.search.case_insensitive = true;
    }
    config.validate()?;

    config.logging.init()?;

    info!("Starting stockq v{}", env!("CARGO_PKG_VERSION"));
    info!(
        config_path = config_path.as_deref().unwrap_or("<default>"),
        location = %config.source.location,
        "Configuration loaded"
    );

    let format = if args.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };
    let mut app = Application::new(config)?.with_format(format);
    let mut stdout = std::io::stdout();

    let failed = match args.command.unwrap_or(Command::Interactive) {
        Command::Search {
            identifier,
            cancel_after_ms,
        } => {
            let report = app
                .search(
                    &identifier,
                    cancel_after_ms.map(Duration::from_millis),
                    &mut stdout,
                )
                .await?;
            report.outcome.error().map(|e| e.to_string())
        }
        Command::Interactive => {
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            app.run_interactive(stdin, &mut stdout).await?;
            None
        }
    };

    if args.metrics {
        eprintln!("{}", Metrics::gather_text()?);
    }

    info!("Shutting down");

    if let Some(error) = failed {
        bail!("search failed: {error}");
    }
    Ok(())
}
