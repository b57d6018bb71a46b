//! Poll cycle - one pass over the hosts that are due for a check
//!
//! ## Cycle
//!
//! ```text
//! registry.list → select_due (stale, oldest first, ≤ rate cap) → probe each, in order
//!     → last_fetch_time = now for every selected host still tracked → append observations
//! ```
//!
//! A failed probe produces no observation but still advances the host's
//! `last_fetch_time`, so a dead host cannot hog the rate-limited queue.
//!
//! Cycles never overlap: [`PollCycle::run`] returns [`CycleOutcome::Skipped`]
//! straight away while another cycle is in flight.

use std::sync::{Arc, Mutex};

use chrono::NaiveDateTime;
use tracing::{debug, error, info, instrument, warn};

use crate::probe::{ProbeStatus, StatusProbe};
use crate::storage::schema::{local_from_millis, local_now};
use crate::storage::{ActivityLog, HostRegistry, Observation, StorageResult, TrackedHost};

/// Hosts due for a check at `now`, oldest-checked first, at most `cap`
///
/// A host is due when its last fetch is strictly older than `now - staleness`.
pub fn select_due(
    hosts: Vec<TrackedHost>,
    now: NaiveDateTime,
    staleness: chrono::Duration,
    cap: usize,
) -> Vec<TrackedHost> {
    let due_before = now - staleness;

    let mut due: Vec<TrackedHost> = hosts
        .into_iter()
        .filter(|host| host.last_fetch_time < due_before)
        .collect();

    due.sort_by(|a, b| a.last_fetch_time.cmp(&b.last_fetch_time));
    due.truncate(cap);
    due
}

/// Build the observation for a successful probe
pub fn observation_from(host: &str, status: ProbeStatus, created: NaiveDateTime) -> Observation {
    Observation {
        record_creation_time: Some(created),
        data_retrieval_time: local_from_millis(status.retrieved_at_millis),
        online: status.online,
        host: host.to_string(),
        player_count: if status.online { status.player_count } else { 0 },
    }
}

/// What a single cycle did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Hosts picked for probing
    pub selected: Vec<String>,

    /// Observations handed to the activity log
    pub observations: usize,

    pub probe_failures: usize,

    /// Registry or activity log writes that failed
    pub write_failures: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Completed(CycleReport),

    /// Another cycle was still running
    Skipped,

    /// The host registry could not be read
    Failed(String),
}

/// Cumulative counters across cycles
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollerStats {
    pub cycles_completed: u64,
    pub cycles_skipped: u64,
    pub cycles_failed: u64,
    pub hosts_probed: u64,
    pub observations_written: u64,
    pub probe_failures: u64,
    pub write_failures: u64,
    pub last_cycle: Option<NaiveDateTime>,
}

/// Run blocking file I/O off the async workers
async fn blocking<T, F>(f: F) -> StorageResult<T>
where
    F: FnOnce() -> StorageResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await?
}

pub struct PollCycle {
    registry: Arc<HostRegistry>,
    log: Arc<ActivityLog>,
    probe: Arc<dyn StatusProbe>,
    staleness: chrono::Duration,
    rate_cap: usize,

    /// Held for the duration of a cycle
    in_flight: tokio::sync::Mutex<()>,

    stats: Mutex<PollerStats>,
}

impl PollCycle {
    pub fn new(
        registry: Arc<HostRegistry>,
        log: Arc<ActivityLog>,
        probe: Arc<dyn StatusProbe>,
        staleness: chrono::Duration,
        rate_cap: usize,
    ) -> Self {
        debug!("poll cycle: staleness {staleness}, rate cap {rate_cap}");

        Self {
            registry,
            log,
            probe,
            staleness,
            rate_cap,
            in_flight: tokio::sync::Mutex::new(()),
            stats: Mutex::new(PollerStats::default()),
        }
    }

    pub fn stats(&self) -> PollerStats {
        self.stats
            .lock()
            .map(|stats| stats.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    fn record(&self, outcome: &CycleOutcome, now: NaiveDateTime) {
        let mut stats = self.stats.lock().unwrap_or_else(|p| p.into_inner());
        match outcome {
            CycleOutcome::Completed(report) => {
                stats.cycles_completed += 1;
                stats.hosts_probed += report.selected.len() as u64;
                stats.observations_written += report.observations as u64;
                stats.probe_failures += report.probe_failures as u64;
                stats.write_failures += report.write_failures as u64;
                stats.last_cycle = Some(now);
            }
            CycleOutcome::Skipped => stats.cycles_skipped += 1,
            CycleOutcome::Failed(_) => stats.cycles_failed += 1,
        }
    }

    /// Run one cycle at the current wall-clock time, unless one is in flight
    pub async fn run(&self) -> CycleOutcome {
        self.run_at(local_now()).await
    }

    /// Run one cycle treating `now` as the current time
    #[instrument(skip(self))]
    pub async fn run_at(&self, now: NaiveDateTime) -> CycleOutcome {
        let Ok(_guard) = self.in_flight.try_lock() else {
            debug!("previous poll cycle still running, skipping");
            let outcome = CycleOutcome::Skipped;
            self.record(&outcome, now);
            return outcome;
        };

        let outcome = self.cycle(now).await;
        self.record(&outcome, now);
        outcome
    }

    async fn cycle(&self, now: NaiveDateTime) -> CycleOutcome {
        let registry = self.registry.clone();
        let hosts = match blocking(move || registry.list()).await {
            Ok(hosts) => hosts,
            Err(e) => {
                error!("failed to read host registry: {e}");
                return CycleOutcome::Failed(e.to_string());
            }
        };

        let selected = select_due(hosts, now, self.staleness, self.rate_cap);
        info!("checking {} hosts", selected.len());

        let mut report = CycleReport {
            selected: selected.iter().map(|h| h.host.clone()).collect(),
            ..Default::default()
        };

        if selected.is_empty() {
            return CycleOutcome::Completed(report);
        }

        // sequential on purpose: the upstream provider rate-limits per client
        let mut observations = Vec::with_capacity(selected.len());
        for host in &selected {
            match self.probe.probe(&host.host).await {
                Ok(status) => {
                    if status.online {
                        info!("{} is online with {} players", host.host, status.player_count);
                    } else {
                        info!("{} is offline", host.host);
                    }
                    observations.push(observation_from(&host.host, status, local_now()));
                }
                Err(e) => {
                    warn!("error checking {}: {e:#}", host.host);
                    report.probe_failures += 1;
                }
            }
        }

        // hosts removed while probing stay removed
        let registry = self.registry.clone();
        let checked = report.selected.clone();
        if let Err(e) = blocking(move || registry.mark_fetched(&checked, now)).await {
            error!("failed to update last fetch times: {e}");
            report.write_failures += 1;
        }

        report.observations = observations.len();
        let log = self.log.clone();
        if let Err(e) = blocking(move || log.append(&observations)).await {
            error!("failed to append {} observations: {e}", report.observations);
            report.write_failures += 1;
        }

        CycleOutcome::Completed(report)
    }
}
