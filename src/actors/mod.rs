//! Actor-based scheduling
//!
//! The hub runs a single scheduler actor as an independent tokio task. It owns
//! the timers for poll cycles and backups and is controlled through a cloneable
//! handle.
//!
//! ```text
//!   poll tick ──► spawn(PollCycle::run) ──► registry / probe / activity log
//! backup tick ──► spawn_blocking(backup_files)
//!     handle  ──► SchedulerCommand (PollNow, BackupNow, GetStats, Shutdown)
//! ```

pub mod messages;
pub mod scheduler;
