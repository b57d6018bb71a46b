//! Helper functions for integration tests

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use activity_monitor::{
    Monitor, Observation,
    config::StorageConfig,
    poll::PollCycle,
    probe::{ProbeStatus, StatusProbe},
    storage::schema::parse_timestamp,
};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use tempfile::{TempDir, tempdir};

pub fn ts(value: &str) -> NaiveDateTime {
    parse_timestamp(value).unwrap()
}

pub fn create_observation(host: &str, created: &str, online: bool, players: u32) -> Observation {
    Observation {
        record_creation_time: Some(ts(created)),
        data_retrieval_time: Some(ts(created)),
        online,
        host: host.to_string(),
        player_count: players,
    }
}

/// Scripted probe: fails for configured hosts, records every call
#[derive(Default)]
pub struct MockProbe {
    failing: HashSet<String>,
    offline: HashSet<String>,
    delay: Option<Duration>,
    calls: Mutex<Vec<String>>,
}

impl MockProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, host: &str) -> Self {
        self.failing.insert(host.to_string());
        self
    }

    pub fn offline(mut self, host: &str) -> Self {
        self.offline.insert(host.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl StatusProbe for MockProbe {
    async fn probe(&self, host: &str) -> anyhow::Result<ProbeStatus> {
        self.calls.lock().unwrap().push(host.to_string());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing.contains(host) {
            anyhow::bail!("connection refused");
        }

        let online = !self.offline.contains(host);
        Ok(ProbeStatus {
            online,
            retrieved_at_millis: 1_736_512_496_000,
            player_count: if online { 7 } else { 0 },
        })
    }
}

pub struct TestEnv {
    // Keeps the scratch directory alive for the duration of the test
    pub dir: TempDir,
    pub monitor: Monitor,
}

pub fn create_test_env() -> TestEnv {
    let dir = tempdir().unwrap();
    let monitor = Monitor::from_config(&StorageConfig {
        activity_log: dir.path().join("data/activity-records.csv"),
        host_registry: dir.path().join("data/servers.csv"),
    });

    TestEnv { dir, monitor }
}

pub fn create_poll_cycle(env: &TestEnv, probe: Arc<MockProbe>, rate_cap: usize) -> PollCycle {
    PollCycle::new(
        env.monitor.registry().clone(),
        env.monitor.activity_log().clone(),
        probe,
        chrono::Duration::minutes(5),
        rate_cap,
    )
}
