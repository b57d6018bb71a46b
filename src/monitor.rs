//! Read/write surface for an API or UI layer
//!
//! Hosts can be registered and removed here; observations are only ever
//! written by the poll cycle.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::StorageConfig;
use crate::storage::schema::validate_host;
use crate::storage::{
    ActivityLog, HostRegistry, Observation, ObservationFilter, StorageResult, TrackedHost,
};

/// Compact overview for dashboards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Counts {
    /// Number of tracked hosts
    #[serde(rename = "serverCount")]
    pub host_count: usize,

    /// Number of records in the activity log
    #[serde(rename = "recordedActivitiesCount")]
    pub observation_count: u64,
}

#[derive(Debug, Clone)]
pub struct Monitor {
    registry: Arc<HostRegistry>,
    log: Arc<ActivityLog>,
}

impl Monitor {
    pub fn new(registry: Arc<HostRegistry>, log: Arc<ActivityLog>) -> Self {
        Self { registry, log }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(
            Arc::new(HostRegistry::new(&config.host_registry)),
            Arc::new(ActivityLog::new(&config.activity_log)),
        )
    }

    pub fn registry(&self) -> &Arc<HostRegistry> {
        &self.registry
    }

    pub fn activity_log(&self) -> &Arc<ActivityLog> {
        &self.log
    }

    pub fn list_hosts(&self) -> StorageResult<Vec<TrackedHost>> {
        self.registry.list()
    }

    /// Start tracking `name`; it becomes due on the next cycle
    pub fn register_host(&self, name: &str) -> StorageResult<()> {
        let name = name.trim();
        validate_host(name)?;

        self.registry.register(name)?;
        info!("registered {name}");
        Ok(())
    }

    /// Stop tracking `name`; `false` if it was not tracked
    pub fn remove_host(&self, name: &str) -> StorageResult<bool> {
        let removed = self.registry.remove(name.trim())?;
        if removed {
            info!("removed {}", name.trim());
        }
        Ok(removed)
    }

    /// Matching observations, ascending by creation time
    pub fn query_observations(&self, filter: &ObservationFilter) -> StorageResult<Vec<Observation>> {
        self.log.scan(filter)
    }

    /// Matching observations grouped by host
    ///
    /// Each group is ascending by creation time. With `max_data_points > 0`
    /// every group is cut to its first `max_data_points` entries.
    pub fn observations_by_host(
        &self,
        filter: &ObservationFilter,
        max_data_points: usize,
    ) -> StorageResult<BTreeMap<String, Vec<Observation>>> {
        let mut grouped: BTreeMap<String, Vec<Observation>> = BTreeMap::new();
        for observation in self.log.scan(filter)? {
            grouped
                .entry(observation.host.clone())
                .or_default()
                .push(observation);
        }

        if max_data_points > 0 {
            for records in grouped.values_mut() {
                records.truncate(max_data_points);
            }
        }

        debug!("found observations for {} hosts", grouped.len());
        Ok(grouped)
    }

    /// Most recently written observation for `host`
    pub fn last_observation(&self, host: &str) -> StorageResult<Option<Observation>> {
        self.log.last_record_for(host.trim())
    }

    pub fn counts(&self) -> StorageResult<Counts> {
        Ok(Counts {
            host_count: self.registry.len()?,
            observation_count: self.log.count()?,
        })
    }
}
