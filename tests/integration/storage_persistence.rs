//! Integration tests for the activity log and host registry files
//!
//! These tests verify that:
//! - Filtered scans match on host and inclusive creation time bounds
//! - The latest record lookup returns the last written entry
//! - Registry writes are visible to a fresh process
//! - Removing an untracked host does not touch the file

use std::fs;

use activity_monitor::{
    Monitor, ObservationFilter, TrackedHost,
    config::StorageConfig,
    storage::{
        StorageError,
        codec::{OBSERVATION_HEADER, TRACKED_HOST_HEADER},
    },
};
use assert_matches::assert_matches;
use pretty_assertions::assert_eq;

use super::helpers::{create_observation, create_test_env, ts};

#[test]
fn test_filtered_scan_by_host_and_time() {
    let env = create_test_env();
    let x = create_observation("x", "2025-01-01T00:00:00", true, 10);
    let y = create_observation("y", "2025-01-02T00:00:00", false, 0);
    env.monitor
        .activity_log()
        .append(&[x.clone(), y.clone()])
        .unwrap();

    let by_host = env
        .monitor
        .query_observations(&ObservationFilter::for_host("x"))
        .unwrap();
    assert_eq!(by_host, vec![x]);

    let from = ObservationFilter::parse(Some("2025-01-02T00:00:00"), None, None).unwrap();
    assert_eq!(env.monitor.query_observations(&from).unwrap(), vec![y]);
}

#[test]
fn test_invalid_filter_is_rejected() {
    assert_matches!(
        ObservationFilter::parse(Some("2025-13-45"), None, None),
        Err(StorageError::InvalidFilter(_))
    );
}

#[test]
fn test_last_observation_scans_from_the_end() {
    let env = create_test_env();
    let log = env.monitor.activity_log();

    log.append(&[create_observation("a", "2025-01-01T01:00:00", true, 1)])
        .unwrap();
    log.append(&[create_observation("b", "2025-01-01T03:00:00", true, 3)])
        .unwrap();
    log.append(&[create_observation("a", "2025-01-01T02:00:00", true, 2)])
        .unwrap();

    let last = env.monitor.last_observation("a").unwrap().unwrap();
    assert_eq!(last.record_creation_time, Some(ts("2025-01-01T02:00:00")));

    // written out of timestamp order: position decides, not time
    log.append(&[create_observation("a", "2024-12-31T00:00:00", true, 0)])
        .unwrap();
    let last = env.monitor.last_observation("a").unwrap().unwrap();
    assert_eq!(last.record_creation_time, Some(ts("2024-12-31T00:00:00")));
}

#[test]
fn test_last_observation_in_large_log() {
    let env = create_test_env();
    let log = env.monitor.activity_log();

    log.append(&[create_observation("rare", "2025-01-01T00:00:00", true, 42)])
        .unwrap();
    let filler: Vec<_> = (0..2_000)
        .map(|i| create_observation(&format!("host-{}", i % 7), "2025-01-02T00:00:00", true, i))
        .collect();
    log.append(&filler).unwrap();

    let rare = env.monitor.last_observation("rare").unwrap().unwrap();
    assert_eq!(rare.player_count, 42);

    let frequent = env.monitor.last_observation("host-3").unwrap().unwrap();
    assert_eq!(frequent.player_count, 1_998);

    assert_eq!(env.monitor.last_observation("never").unwrap(), None);
}

#[test]
fn test_hand_edited_log_is_tolerated() {
    let env = create_test_env();
    let path = env.monitor.activity_log().path().to_path_buf();
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(
        &path,
        format!(
            "{OBSERVATION_HEADER}\r\n2025-01-01T00:00:00;;TRUE;a;5\r\nhalf;a;line\r\n2025-01-01T00:05;;false;a;x"
        ),
    )
    .unwrap();

    let records = env
        .monitor
        .query_observations(&ObservationFilter::default())
        .unwrap();
    assert_eq!(records.len(), 2);
    assert!(records[0].online);
    assert_eq!(records[1].record_creation_time, Some(ts("2025-01-01T00:05:00")));
    assert_eq!(records[1].player_count, 0);

    let last = env.monitor.last_observation("a").unwrap().unwrap();
    assert!(!last.online);
}

#[test]
fn test_registry_survives_restart() {
    let env = create_test_env();
    env.monitor.register_host("a.example.net").unwrap();
    env.monitor.register_host("b.example.net").unwrap();
    env.monitor
        .registry()
        .upsert(TrackedHost {
            host: "a.example.net".to_string(),
            last_fetch_time: ts("2025-01-01T12:00:00"),
        })
        .unwrap();

    let restarted = Monitor::from_config(&StorageConfig {
        activity_log: env.monitor.activity_log().path().to_path_buf(),
        host_registry: env.monitor.registry().path().to_path_buf(),
    });

    let hosts = restarted.list_hosts().unwrap();
    assert_eq!(hosts.len(), 2);
    assert_eq!(hosts[0].last_fetch_time, ts("2025-01-01T12:00:00"));
    assert!(hosts[1].never_fetched());

    let content = fs::read_to_string(restarted.registry().path()).unwrap();
    assert!(content.starts_with(TRACKED_HOST_HEADER));
}

#[test]
fn test_remove_unknown_host_keeps_file() {
    let env = create_test_env();
    env.monitor.register_host("a").unwrap();
    let path = env.monitor.registry().path().to_path_buf();

    let content = fs::read(&path).unwrap();
    let modified = fs::metadata(&path).unwrap().modified().unwrap();

    assert!(!env.monitor.remove_host("nonexistent").unwrap());

    assert_eq!(fs::read(&path).unwrap(), content);
    assert_eq!(fs::metadata(&path).unwrap().modified().unwrap(), modified);
}

#[test]
fn test_counts_track_both_files() {
    let env = create_test_env();
    assert_eq!(env.monitor.counts().unwrap().host_count, 0);
    assert_eq!(env.monitor.counts().unwrap().observation_count, 0);

    env.monitor.register_host("a").unwrap();
    env.monitor
        .activity_log()
        .append(&[
            create_observation("a", "2025-01-01T00:00:00", true, 1),
            create_observation("a", "2025-01-01T00:05:00", true, 2),
        ])
        .unwrap();

    let counts = env.monitor.counts().unwrap();
    assert_eq!(counts.host_count, 1);
    assert_eq!(counts.observation_count, 2);
}
