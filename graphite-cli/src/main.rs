use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, TimeZone, Utc};
use clap::{Parser, Subcommand};
use graphite_client::{ClientConfig, GraphiteClient, Request};
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "graphite")]
#[command(version)]
#[command(about = "Fetch series from a Graphite server, sharding large queries", long_about = None)]
struct Cli {
    /// Graphite base URL (falls back to GRAPHITE_URL)
    #[arg(short, long, global = true)]
    url: Option<String>,

    /// Per-request HTTP timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render series for one or more targets as JSON
    Query {
        /// Target to fetch (repeatable)
        #[arg(short, long = "target")]
        targets: Vec<String>,

        /// File with one target per line
        #[arg(long)]
        targets_file: Option<PathBuf>,

        /// Start of the window (RFC 3339 or unix seconds)
        #[arg(long, value_parser = parse_time)]
        from: Option<DateTime<Utc>>,

        /// End of the window (RFC 3339 or unix seconds)
        #[arg(long, value_parser = parse_time)]
        until: Option<DateTime<Utc>>,

        /// Maximum targets per render call
        #[arg(long)]
        shard_size: Option<usize>,

        /// Concurrent render calls for large queries
        #[arg(long)]
        workers: Option<usize>,
    },

    /// List metric names known to the server
    Metrics {
        /// Print as a JSON array instead of one name per line
        #[arg(long)]
        json: bool,
    },
}

/// Accept RFC 3339 timestamps or plain unix seconds
fn parse_time(s: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(secs) = s.parse::<i64>() {
        return Utc
            .timestamp_opt(secs, 0)
            .single()
            .ok_or_else(|| format!("timestamp out of range: {}", s));
    }
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("invalid time '{}': {}", s, e))
}

/// Targets from flags and the optional file, flags first; blank lines and
/// `#` comments in the file are skipped
fn collect_targets(mut targets: Vec<String>, file: Option<&PathBuf>) -> anyhow::Result<Vec<String>> {
    if let Some(path) = file {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read targets from {}", path.display()))?;
        targets.extend(
            contents
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty() && !l.starts_with('#'))
                .map(String::from),
        );
    }
    Ok(targets)
}

fn init_logging(verbose: bool) {
    let default = if verbose { "graphite=debug,graphite_client=debug" } else { "graphite=info,graphite_client=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = ClientConfig::from_env();
    if let Some(url) = cli.url {
        config.base_url = url;
    }
    if let Some(secs) = cli.timeout {
        config.timeout = Some(Duration::from_secs(secs));
    }

    match cli.command {
        Commands::Query { targets, targets_file, from, until, shard_size, workers } => {
            if let Some(n) = shard_size {
                config.dispatch.shard_size = n;
            }
            if let Some(n) = workers {
                config.dispatch.max_workers = n;
            }

            let targets = collect_targets(targets, targets_file.as_ref())?;
            if targets.is_empty() {
                anyhow::bail!("No targets given. Use -t <target> or --targets-file <path>.");
            }

            let client = GraphiteClient::new(config).context("Failed to create Graphite client")?;
            let mut request = Request::new(targets);
            request.range.from = from;
            request.range.until = until;

            info!(url = %client.base_url(), targets = request.len(), "Querying Graphite");
            let series = client
                .query(&request)
                .await
                .with_context(|| format!("Render query against {} failed", client.base_url()))?;

            debug!(metrics = ?client.dispatch_metrics(), "Query finished");
            println!("{}", serde_json::to_string_pretty(&series)?);
        }

        Commands::Metrics { json } => {
            let client = GraphiteClient::new(config).context("Failed to create Graphite client")?;
            let metrics = client
                .metrics()
                .await
                .with_context(|| format!("Metrics listing from {} failed", client.base_url()))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&metrics)?);
            } else {
                for name in &metrics {
                    println!("{}", name);
                }
            }
        }
    }

    Ok(())
}
