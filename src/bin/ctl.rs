use std::path::PathBuf;

use activity_monitor::{
    Monitor, ObservationFilter,
    config::load_config,
    storage::backup_files,
    util::get_config_path,
};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{level_filters::LevelFilter, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file (falls back to $ACTIVITY_MONITOR_CONFIG, then defaults)
    #[arg(short)]
    file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// List tracked hosts
    Hosts,

    /// Start tracking a host
    Register { host: String },

    /// Stop tracking a host
    Remove { host: String },

    /// Query recorded observations, grouped by host
    Query {
        #[arg(long)]
        host: Option<String>,

        /// Lower bound on record creation time (yyyy-MM-ddTHH:mm:ss)
        #[arg(long)]
        from: Option<String>,

        /// Upper bound on record creation time (yyyy-MM-ddTHH:mm:ss)
        #[arg(long)]
        to: Option<String>,

        /// Keep at most this many records per host (0 = all)
        #[arg(long, default_value_t = 0)]
        max_data_points: usize,
    },

    /// Show the most recent observation for a host
    Last { host: String },

    /// Show host and observation counts
    Stats,

    /// Copy both data files to their .bak siblings
    Backup,
}

fn init() {
    let filter = filter::Targets::new().with_targets(vec![
        ("activity_monitor", LevelFilter::INFO),
        ("activity_ctl", LevelFilter::INFO),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init();
    let args = Args::parse();
    trace!("started with args: {args:?}");

    let config_path = args.file.or_else(get_config_path);
    let config = load_config(config_path.as_deref())?;
    let monitor = Monitor::from_config(&config.storage);

    match args.command {
        Command::Hosts => print_json(&monitor.list_hosts()?)?,

        Command::Register { host } => monitor.register_host(&host)?,

        Command::Remove { host } => {
            if !monitor.remove_host(&host)? {
                anyhow::bail!("{host} is not tracked");
            }
        }

        Command::Query {
            host,
            from,
            to,
            max_data_points,
        } => {
            let filter =
                ObservationFilter::parse(from.as_deref(), to.as_deref(), host.as_deref())?;
            print_json(&monitor.observations_by_host(&filter, max_data_points)?)?;
        }

        Command::Last { host } => match monitor.last_observation(&host)? {
            Some(observation) => print_json(&observation)?,
            None => anyhow::bail!("no observation recorded for {host}"),
        },

        Command::Stats => print_json(&monitor.counts()?)?,

        Command::Backup => {
            let report = backup_files(&[
                config.storage.activity_log.as_path(),
                config.storage.host_registry.as_path(),
            ]);
            for path in &report.copied {
                println!("wrote {}", path.display());
            }
            if !report.is_complete() {
                anyhow::bail!("{} files could not be backed up", report.failed.len());
            }
        }
    }

    Ok(())
}
