//! Message types for actor communication
//!
//! Commands are request/response messages sent to a specific actor via mpsc,
//! with a oneshot channel for the reply where one is expected.

use tokio::sync::oneshot;

use crate::poll::{CycleOutcome, PollerStats};
use crate::storage::BackupReport;

/// Commands that can be sent to the SchedulerActor
#[derive(Debug)]
pub enum SchedulerCommand {
    /// Run a poll cycle now (bypassing the interval timer)
    ///
    /// Skipped like any other cycle if one is already running.
    PollNow {
        respond_to: oneshot::Sender<CycleOutcome>,
    },

    /// Copy the data files to their `.bak` siblings now
    BackupNow {
        respond_to: oneshot::Sender<BackupReport>,
    },

    /// Get cumulative poll statistics
    GetStats {
        respond_to: oneshot::Sender<PollerStats>,
    },

    /// Gracefully shut down the scheduler
    ///
    /// A cycle already running on its own task is allowed to finish.
    Shutdown,
}
