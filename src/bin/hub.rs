use std::path::PathBuf;
use std::sync::Arc;

use activity_monitor::{
    Monitor,
    actors::scheduler::SchedulerHandle,
    config::load_config,
    poll::PollCycle,
    probe::{McStatusProbe, StatusProbe},
    util::get_config_path,
};
use clap::Parser;
use tracing::{debug, info, level_filters::LevelFilter, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file (falls back to $ACTIVITY_MONITOR_CONFIG, then defaults)
    #[arg(short)]
    file: Option<PathBuf>,
}

fn init() {
    let filter = filter::Targets::new().with_targets(vec![
        ("activity_monitor", LevelFilter::DEBUG),
        ("activity_hub", LevelFilter::TRACE),
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

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init();
    let args = Args::parse();
    trace!("started with args: {args:?}");

    let config_path = args.file.or_else(get_config_path);
    let config = load_config(config_path.as_deref())?;

    let monitor = Monitor::from_config(&config.storage);
    let probe: Arc<dyn StatusProbe> = Arc::new(McStatusProbe::new(&config.probe)?);

    let poll = Arc::new(PollCycle::new(
        monitor.registry().clone(),
        monitor.activity_log().clone(),
        probe,
        config.scheduler.staleness(),
        config.scheduler.rate_cap,
    ));

    let counts = monitor.counts()?;
    info!(
        "tracking {} hosts, {} observations recorded",
        counts.host_count, counts.observation_count
    );

    let scheduler = SchedulerHandle::spawn(
        poll,
        vec![
            config.storage.activity_log.clone(),
            config.storage.host_registry.clone(),
        ],
        &config.scheduler,
    );

    tokio::signal::ctrl_c().await?;
    debug!("received ctrl-c, shutting down");

    let stats = scheduler.stats().await?;
    info!(
        "ran {} cycles ({} skipped), wrote {} observations, {} probe failures, {} write failures",
        stats.cycles_completed,
        stats.cycles_skipped,
        stats.observations_written,
        stats.probe_failures,
        stats.write_failures
    );

    scheduler.shutdown().await?;

    Ok(())
}
