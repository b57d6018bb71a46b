//! Concurrency tests
//!
//! - Overlapping poll cycles are skipped, never queued
//! - Registrations racing a poll cycle are not lost
//! - Removals racing a poll cycle are not undone

use std::sync::Arc;
use std::time::Duration;

use activity_monitor::{
    actors::scheduler::SchedulerHandle,
    config::SchedulerConfig,
    poll::CycleOutcome,
};
use assert_matches::assert_matches;

use super::helpers::{MockProbe, create_poll_cycle, create_test_env};

#[tokio::test]
async fn test_overlapping_cycle_is_skipped() {
    let env = create_test_env();
    env.monitor.register_host("slow").unwrap();

    let probe = Arc::new(MockProbe::new().with_delay(Duration::from_millis(300)));
    let cycle = Arc::new(create_poll_cycle(&env, probe.clone(), 5));

    let first = tokio::spawn({
        let cycle = cycle.clone();
        async move { cycle.run().await }
    });

    // let the first cycle reach the probe
    tokio::time::sleep(Duration::from_millis(100)).await;
    let second = cycle.run().await;

    assert_matches!(second, CycleOutcome::Skipped);
    assert_matches!(first.await.unwrap(), CycleOutcome::Completed(report) if report.observations == 1);
    assert_eq!(probe.calls().len(), 1);

    let stats = cycle.stats();
    assert_eq!(stats.cycles_completed, 1);
    assert_eq!(stats.cycles_skipped, 1);
}

#[tokio::test]
async fn test_scheduler_poll_now_skips_while_running() {
    let env = create_test_env();
    env.monitor.register_host("slow").unwrap();

    let probe = Arc::new(MockProbe::new().with_delay(Duration::from_millis(300)));
    let cycle = Arc::new(create_poll_cycle(&env, probe.clone(), 5));
    let handle = SchedulerHandle::spawn(
        cycle,
        vec![],
        &SchedulerConfig {
            poll_interval_secs: 3600,
            ..Default::default()
        },
    );

    let first = tokio::spawn({
        let handle = handle.clone();
        async move { handle.poll_now().await }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_matches!(handle.poll_now().await.unwrap(), CycleOutcome::Skipped);
    assert_matches!(first.await.unwrap().unwrap(), CycleOutcome::Completed(_));
    assert_eq!(probe.calls(), vec!["slow"]);

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_registrations_during_cycle_are_kept() {
    let env = create_test_env();
    for i in 0..5 {
        env.monitor.register_host(&format!("polled-{i}")).unwrap();
    }

    let probe = Arc::new(MockProbe::new().with_delay(Duration::from_millis(20)));
    let cycle = Arc::new(create_poll_cycle(&env, probe.clone(), 5));

    let poll = tokio::spawn({
        let cycle = cycle.clone();
        async move { cycle.run().await }
    });

    // wait until the cycle has made its selection
    while probe.calls().is_empty() {
        tokio::time::sleep(Duration::from_millis(2)).await;
    }

    let mut registrations = vec![];
    for i in 0..10 {
        let monitor = env.monitor.clone();
        registrations.push(tokio::task::spawn_blocking(move || {
            monitor.register_host(&format!("added-{i}"))
        }));
    }

    for registration in registrations {
        registration.await.unwrap().unwrap();
    }
    assert_matches!(poll.await.unwrap(), CycleOutcome::Completed(_));

    let hosts = env.monitor.list_hosts().unwrap();
    assert_eq!(hosts.len(), 15);

    let polled: Vec<_> = hosts
        .iter()
        .filter(|h| h.host.starts_with("polled-"))
        .collect();
    assert!(polled.iter().all(|h| !h.never_fetched()));
    assert!(
        hosts
            .iter()
            .filter(|h| h.host.starts_with("added-"))
            .all(|h| h.never_fetched())
    );
}

#[tokio::test]
async fn test_host_removed_during_cycle_stays_removed() {
    let env = create_test_env();
    env.monitor.register_host("gone").unwrap();
    env.monitor.register_host("kept").unwrap();

    let probe = Arc::new(MockProbe::new().with_delay(Duration::from_millis(300)));
    let cycle = Arc::new(create_poll_cycle(&env, probe.clone(), 5));

    let poll = tokio::spawn({
        let cycle = cycle.clone();
        async move { cycle.run().await }
    });

    // the cycle has selected both hosts and is waiting on the first
    while probe.calls().is_empty() {
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    assert!(env.monitor.remove_host("gone").unwrap());

    assert_matches!(
        poll.await.unwrap(),
        CycleOutcome::Completed(report) if report.selected == vec!["gone", "kept"]
    );

    let hosts = env.monitor.list_hosts().unwrap();
    assert_eq!(hosts.len(), 1);
    assert_eq!(hosts[0].host, "kept");
    assert!(!hosts[0].never_fetched());
}
