//! Record definitions for the activity log and the host registry
//!
//! Both files store local date-times without a timezone, so all timestamps
//! here are [`NaiveDateTime`] values in the local clock of the process that
//! wrote them.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::error::{StorageError, StorageResult};

/// Format used when writing timestamps; the fraction is only printed when non-zero
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Minute-precision form, accepted on read only
const TIMESTAMP_FORMAT_MINUTES: &str = "%Y-%m-%dT%H:%M";

/// "Never fetched" marker for [`TrackedHost::last_fetch_time`]
pub fn epoch() -> NaiveDateTime {
    DateTime::<Utc>::UNIX_EPOCH.naive_utc()
}

/// Current wall-clock time in the local timezone
pub fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Convert epoch milliseconds (as reported by a status provider) to local time
pub fn local_from_millis(millis: i64) -> Option<NaiveDateTime> {
    Local
        .timestamp_millis_opt(millis)
        .earliest()
        .map(|dt| dt.naive_local())
}

pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a stored or user-supplied timestamp
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT_MINUTES))
        .ok()
}

/// One liveness/occupancy observation of a host
///
/// Immutable once appended to the activity log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    /// When the record was persisted
    pub record_creation_time: Option<NaiveDateTime>,

    /// When the status provider took the sample
    pub data_retrieval_time: Option<NaiveDateTime>,

    pub online: bool,

    /// Host the observation belongs to
    #[serde(rename = "server")]
    pub host: String,

    /// Players online; only meaningful when `online` is set
    pub player_count: u32,
}

/// One entry in the set of periodically checked hosts
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedHost {
    /// Unique key of the registry
    #[serde(rename = "server")]
    pub host: String,

    /// Last attempted check; [`epoch`] means never checked
    pub last_fetch_time: NaiveDateTime,
}

impl TrackedHost {
    /// A host that has never been checked and is therefore due immediately
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            last_fetch_time: epoch(),
        }
    }

    pub fn never_fetched(&self) -> bool {
        self.last_fetch_time == epoch()
    }
}

/// Reject host names the line format cannot represent
pub fn validate_host(host: &str) -> StorageResult<()> {
    if host.trim().is_empty() {
        return Err(StorageError::InvalidRecord("host must not be empty".to_string()));
    }

    if host.trim() != host {
        return Err(StorageError::InvalidRecord(format!(
            "host '{}' has surrounding whitespace",
            host.escape_debug()
        )));
    }

    // ';' and line breaks would split the record, the rest would change the status URL
    if host.contains([';', '\n', '\r', '/', '?', '#']) {
        return Err(StorageError::InvalidRecord(format!(
            "host '{}' contains a reserved character",
            host.escape_debug()
        )));
    }

    Ok(())
}

/// Predicates for a filtered activity log scan
///
/// All supplied predicates must match. Time bounds apply to
/// `record_creation_time` and are inclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObservationFilter {
    pub from: Option<NaiveDateTime>,
    pub to: Option<NaiveDateTime>,
    pub host: Option<String>,
}

impl ObservationFilter {
    pub fn for_host(host: impl Into<String>) -> Self {
        Self {
            host: Some(host.into()),
            ..Default::default()
        }
    }

    /// Build a filter from raw query parameters
    ///
    /// Blank parameters are treated as absent. Timestamps that do not parse
    /// are rejected rather than ignored.
    pub fn parse(from: Option<&str>, to: Option<&str>, host: Option<&str>) -> StorageResult<Self> {
        fn bound(name: &str, raw: Option<&str>) -> StorageResult<Option<NaiveDateTime>> {
            match raw.map(str::trim).filter(|s| !s.is_empty()) {
                None => Ok(None),
                Some(value) => parse_timestamp(value).map(Some).ok_or_else(|| {
                    StorageError::InvalidFilter(format!(
                        "invalid '{name}' date format '{value}', expected yyyy-MM-ddTHH:mm:ss"
                    ))
                }),
            }
        }

        Ok(Self {
            from: bound("from", from)?,
            to: bound("to", to)?,
            host: host
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        })
    }

    pub fn matches(&self, observation: &Observation) -> bool {
        if let Some(host) = &self.host {
            if &observation.host != host {
                return false;
            }
        }

        if self.from.is_none() && self.to.is_none() {
            return true;
        }

        let Some(created) = observation.record_creation_time else {
            return false;
        };

        self.from.is_none_or(|from| created >= from) && self.to.is_none_or(|to| created <= to)
    }
}
