//! File-backed persistence for observations and tracked hosts
//!
//! Two plain-text files, one record per line (see [`codec`]):
//!
//! - **Activity log**: append-only observations, queried by linear scan or by
//!   a backward scan for the latest record of a host
//! - **Host registry**: small mutable set of tracked hosts, rewritten on every
//!   change and cached in memory until the file's modification time moves
//!
//! ## Usage
//!
//! ```no_run
//! use activity_monitor::storage::{ActivityLog, HostRegistry, ObservationFilter};
//!
//! fn main() -> anyhow::Result<()> {
//!     let registry = HostRegistry::new("data/servers.csv");
//!     registry.register("play.example.net")?;
//!
//!     let log = ActivityLog::new("data/activity-records.csv");
//!     let latest = log.last_record_for("play.example.net")?;
//!     let all = log.scan(&ObservationFilter::for_host("play.example.net"))?;
//!     println!("{latest:?} / {} records", all.len());
//!     Ok(())
//! }
//! ```

pub mod activity_log;
pub mod backup;
pub mod codec;
pub mod error;
pub mod registry;
pub mod reverse;
pub mod schema;

pub use activity_log::ActivityLog;
pub use backup::{BackupReport, backup_files};
pub use error::{StorageError, StorageResult};
pub use registry::HostRegistry;
pub use schema::{Observation, ObservationFilter, TrackedHost};
