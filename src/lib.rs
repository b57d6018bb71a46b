pub mod actors;
pub mod config;
pub mod monitor;
pub mod poll;
pub mod probe;
pub mod storage;
pub mod util;

pub use monitor::{Counts, Monitor};
pub use storage::{Observation, ObservationFilter, TrackedHost};
