//! SchedulerActor - drives poll cycles and backups on timers
//!
//! ## Message Flow
//!
//! ```text
//! poll tick   → spawn PollCycle::run (skipped inside if one is in flight)
//! backup tick → spawn_blocking backup_files(activity log, host registry)
//!     ↑
//!     └─── Commands (PollNow, BackupNow, GetStats, Shutdown)
//! ```
//!
//! Cycles run on their own tasks, so a slow probe never delays the actor's
//! timers or commands. Overlap is handled by [`PollCycle`] itself.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, error, info, instrument, trace, warn};

use crate::config::SchedulerConfig;
use crate::poll::{CycleOutcome, PollCycle, PollerStats};
use crate::storage::{BackupReport, backup_files};

use super::messages::SchedulerCommand;

/// Actor owning the poll and backup timers
pub struct SchedulerActor {
    poll: Arc<PollCycle>,

    /// Files copied on each backup run
    backup_paths: Vec<PathBuf>,

    poll_interval: Duration,

    backup_interval: Duration,

    /// Command receiver for control messages
    command_rx: mpsc::Receiver<SchedulerCommand>,
}

async fn run_backup(paths: Vec<PathBuf>) -> BackupReport {
    info!("backing up {} files", paths.len());

    let report = match tokio::task::spawn_blocking(move || backup_files(&paths)).await {
        Ok(report) => report,
        Err(e) => {
            error!("backup task failed: {e}");
            return BackupReport::default();
        }
    };

    if !report.is_complete() {
        warn!("backup incomplete: {} files failed", report.failed.len());
    }

    report
}

fn log_outcome(outcome: &CycleOutcome) {
    match outcome {
        CycleOutcome::Completed(report) => debug!(
            "poll cycle done: {} selected, {} observations, {} probe failures, {} write failures",
            report.selected.len(),
            report.observations,
            report.probe_failures,
            report.write_failures
        ),
        CycleOutcome::Skipped => debug!("poll cycle skipped"),
        CycleOutcome::Failed(e) => error!("poll cycle failed: {e}"),
    }
}

impl SchedulerActor {
    pub fn new(
        poll: Arc<PollCycle>,
        backup_paths: Vec<PathBuf>,
        config: &SchedulerConfig,
        command_rx: mpsc::Receiver<SchedulerCommand>,
    ) -> Self {
        Self {
            poll,
            backup_paths,
            poll_interval: config.poll_interval(),
            backup_interval: config.backup_interval(),
            command_rx,
        }
    }

    /// Run the actor's main loop until Shutdown or until all handles are dropped
    #[instrument(skip(self))]
    pub async fn run(mut self) {
        debug!(
            "starting scheduler actor (poll every {:?}, backup every {:?})",
            self.poll_interval, self.backup_interval
        );

        // first cycle one interval after startup, like the backup timer
        let mut poll_ticker = interval_at(Instant::now() + self.poll_interval, self.poll_interval);
        poll_ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut backup_ticker = interval_at(
            Instant::now() + self.backup_interval,
            self.backup_interval,
        );
        backup_ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = poll_ticker.tick() => {
                    trace!("poll tick");
                    let poll = self.poll.clone();
                    tokio::spawn(async move {
                        log_outcome(&poll.run().await);
                    });
                }

                _ = backup_ticker.tick() => {
                    tokio::spawn(run_backup(self.backup_paths.clone()));
                }

                cmd = self.command_rx.recv() => {
                    let Some(cmd) = cmd else {
                        warn!("command channel closed, shutting down");
                        break;
                    };

                    match cmd {
                        SchedulerCommand::PollNow { respond_to } => {
                            debug!("received PollNow command");
                            let poll = self.poll.clone();
                            tokio::spawn(async move {
                                let outcome = poll.run().await;
                                log_outcome(&outcome);
                                let _ = respond_to.send(outcome);
                            });
                        }

                        SchedulerCommand::BackupNow { respond_to } => {
                            debug!("received BackupNow command");
                            let paths = self.backup_paths.clone();
                            tokio::spawn(async move {
                                let _ = respond_to.send(run_backup(paths).await);
                            });
                        }

                        SchedulerCommand::GetStats { respond_to } => {
                            let _ = respond_to.send(self.poll.stats());
                        }

                        SchedulerCommand::Shutdown => {
                            debug!("received shutdown command");
                            break;
                        }
                    }
                }
            }
        }

        debug!("scheduler actor stopped");
    }
}

/// Handle for controlling a SchedulerActor
///
/// Cloneable; the actor stops once every handle is dropped.
#[derive(Clone)]
pub struct SchedulerHandle {
    sender: mpsc::Sender<SchedulerCommand>,
}

impl SchedulerHandle {
    /// Spawn a new scheduler actor as a tokio task
    pub fn spawn(poll: Arc<PollCycle>, backup_paths: Vec<PathBuf>, config: &SchedulerConfig) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);

        let actor = SchedulerActor::new(poll, backup_paths, config, cmd_rx);
        tokio::spawn(actor.run());

        Self { sender: cmd_tx }
    }

    /// Run a poll cycle immediately and wait for its outcome
    pub async fn poll_now(&self) -> Result<CycleOutcome> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SchedulerCommand::PollNow { respond_to: tx })
            .await
            .context("failed to send PollNow command")?;

        rx.await.context("failed to receive response")
    }

    /// Back up the data files immediately
    pub async fn backup_now(&self) -> Result<BackupReport> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SchedulerCommand::BackupNow { respond_to: tx })
            .await
            .context("failed to send BackupNow command")?;

        rx.await.context("failed to receive response")
    }

    pub async fn stats(&self) -> Result<PollerStats> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SchedulerCommand::GetStats { respond_to: tx })
            .await
            .context("failed to send GetStats command")?;

        rx.await.context("failed to receive response")
    }

    /// Gracefully shut down the scheduler
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(SchedulerCommand::Shutdown)
            .await
            .context("failed to send Shutdown command")?;
        Ok(())
    }
}
