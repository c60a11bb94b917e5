//! live-status - probe channel broadcast status from the command line

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use futures::future::join_all;
use std::path::PathBuf;

use live_status::status::{
    ChannelKey, ChannelStatus, EngineConfig, FailureKind, LiveStatusService, StatusSource,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Strategy {
    /// Adaptive routing with fallback
    Auto,
    /// Primary channel-page fetch only
    Primary,
    /// Backup fetch only
    Backup,
}

#[derive(Parser)]
#[command(name = "live-status")]
#[command(about = "Check whether streaming channels are live", long_about = None)]
struct Args {
    /// Config file (TOML); defaults to $LIVE_STATUS_CONFIG or the user config dir
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Strategy used by `check` and `roster`
    #[arg(long, value_enum, default_value = "auto", global = true)]
    strategy: Strategy,

    /// Print JSON instead of a table
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve one channel id or URL
    Check { reference: String },

    /// Resolve several channels with bounded concurrency
    Roster {
        #[arg(required = true)]
        references: Vec<String>,

        /// Resolutions in flight per chunk (overrides config)
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// List every channel currently live
    Listing {
        /// Channels to check one by one if the listing is empty
        #[arg(long = "fallback")]
        fallback: Vec<String>,
    },

    /// Run Primary and Backup side by side
    Compare {
        #[arg(required = true)]
        references: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    live_status::init_logging("live_status=info");
    let args = Args::parse();

    let mut config = EngineConfig::load(args.config.as_deref()).context("loading configuration")?;
    if let Command::Roster {
        concurrency: Some(n),
        ..
    } = &args.command
    {
        config = config.with_concurrency(*n);
        config.validate()?;
    }

    let service = LiveStatusService::from_config(&config).context("building HTTP fetchers")?;

    match &args.command {
        Command::Check { reference } => {
            let key = parse_reference(reference)?;
            let status = resolve(&service, args.strategy, &key).await;
            print_statuses(&[status], args.json)?;
        }
        Command::Roster { references, .. } => {
            let statuses: Vec<ChannelStatus> = match args.strategy {
                Strategy::Auto => service
                    .check_many(references)
                    .await
                    .into_iter()
                    .filter_map(|r| {
                        if r.status.is_none() {
                            eprintln!("skipping unrecognized reference: {}", r.reference);
                        }
                        r.status
                    })
                    .collect(),
                strategy => {
                    let keys = references
                        .iter()
                        .map(|r| parse_reference(r))
                        .collect::<Result<Vec<_>>>()?;
                    join_all(keys.iter().map(|k| resolve(&service, strategy, k))).await
                }
            };
            print_statuses(&statuses, args.json)?;
        }
        Command::Listing { fallback } => {
            let statuses = service.active_listing(fallback).await;
            print_statuses(&statuses, args.json)?;
        }
        Command::Compare { references } => {
            let router = service.router();
            let mut rows = Vec::new();
            for reference in references {
                let key = parse_reference(reference)?;
                let (primary, backup) = tokio::join!(
                    router.fetch_with(StatusSource::Primary, &key),
                    router.fetch_with(StatusSource::Backup, &key)
                );
                rows.push(primary);
                rows.push(backup);
            }
            print_statuses(&rows, args.json)?;
        }
    }

    let snapshot = service.router().snapshot();
    if args.json {
        eprintln!("{}", serde_json::to_string(&snapshot)?);
    } else {
        eprintln!(
            "router: preferred={} last_successful={} primary_failures={} backup_failures={}",
            snapshot.preferred,
            snapshot.last_successful,
            snapshot.primary_failures,
            snapshot.backup_failures
        );
        print_failure("primary", snapshot.last_primary_failure);
        print_failure("backup", snapshot.last_backup_failure);
    }
    Ok(())
}

fn print_failure(strategy: &str, kind: Option<FailureKind>) {
    if let Some(kind) = kind {
        let retry = if kind.is_transient() { "transient" } else { "persistent" };
        eprintln!("  last {} failure: {} ({})", strategy, kind.description(), retry);
    }
}

fn parse_reference(reference: &str) -> Result<ChannelKey> {
    match ChannelKey::parse(reference) {
        Some(key) => Ok(key),
        None => bail!("not a channel id or channel URL: {}", reference),
    }
}

async fn resolve(service: &LiveStatusService, strategy: Strategy, key: &ChannelKey) -> ChannelStatus {
    let router = service.router();
    match strategy {
        Strategy::Auto => router.resolve(key).await,
        Strategy::Primary => router.fetch_with(StatusSource::Primary, key).await,
        Strategy::Backup => router.fetch_with(StatusSource::Backup, key).await,
    }
}

fn print_statuses(statuses: &[ChannelStatus], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(statuses)?);
        return Ok(());
    }

    println!(
        "{:<16} {:<8} {:<7} {:>7}  {}",
        "CHANNEL", "STATE", "SOURCE", "VIEWERS", "TITLE / ERROR"
    );
    for status in statuses {
        let state = match (status.is_live, status.is_error()) {
            (_, true) => "unknown",
            (true, false) => "LIVE",
            (false, false) => "offline",
        };
        let viewers = status
            .viewer_count
            .map(|v| v.to_string())
            .unwrap_or_else(|| "-".to_string());
        let detail = status
            .error_message
            .as_deref()
            .or(status.title.as_deref())
            .unwrap_or("");
        println!(
            "{:<16} {:<8} {:<7} {:>7}  {}",
            status.channel_key.as_str(),
            state,
            status.source.to_string(),
            viewers,
            detail
        );
    }
    Ok(())
}
