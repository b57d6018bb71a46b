//! Append-only activity log
//!
//! Observations are appended one per line in the order they are written and
//! the file is never rewritten. Queries are linear scans; the "latest record
//! for a host" lookup walks the file backwards so the typical query only
//! touches the tail.
//!
//! There is no internal locking. Appends go through a single `write_all` per
//! batch on a file opened in append mode, which is sufficient for one writer
//! per process.

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, instrument, trace};

use super::codec::{LineRecord, read_lines};
use super::error::StorageResult;
use super::reverse::ReverseLines;
use super::schema::{Observation, ObservationFilter};

#[derive(Debug, Clone)]
pub struct ActivityLog {
    path: PathBuf,
}

impl ActivityLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open the log for reading; `None` if it does not exist yet
    fn open(&self) -> StorageResult<Option<File>> {
        match File::open(&self.path) {
            Ok(file) => Ok(Some(file)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Append observations in input order
    ///
    /// Creates the parent directories and the header line when the file is
    /// new. An empty batch does not touch the file.
    #[instrument(skip_all, fields(path = %self.path.display(), count = observations.len()))]
    pub fn append(&self, observations: &[Observation]) -> StorageResult<()> {
        if observations.is_empty() {
            return Ok(());
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let mut buffer = String::new();
        if file.metadata()?.len() == 0 {
            buffer.push_str(Observation::HEADER);
            buffer.push('\n');
        }

        for observation in observations {
            buffer.push_str(&observation.encode());
            buffer.push('\n');
        }

        file.write_all(buffer.as_bytes())?;
        file.flush()?;

        debug!("appended {} observations", observations.len());
        Ok(())
    }

    /// All decodable records matching `filter`, ascending by creation time
    ///
    /// The sort is stable, so records with equal creation times keep their
    /// on-disk order.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn scan(&self, filter: &ObservationFilter) -> StorageResult<Vec<Observation>> {
        let Some(file) = self.open()? else {
            return Ok(Vec::new());
        };

        let mut records = Vec::new();
        for line in read_lines(BufReader::new(file)) {
            if let Some(record) = Observation::decode(&line?) {
                if filter.matches(&record) {
                    records.push(record);
                }
            }
        }

        records.sort_by_key(|r| r.record_creation_time);

        trace!("scan matched {} records", records.len());
        Ok(records)
    }

    /// Number of decodable records in the log
    pub fn count(&self) -> StorageResult<u64> {
        let Some(file) = self.open()? else {
            return Ok(0);
        };

        let mut count = 0;
        for line in read_lines(BufReader::new(file)) {
            if Observation::decode(&line?).is_some() {
                count += 1;
            }
        }

        Ok(count)
    }

    /// The most recently written record for `host`
    ///
    /// "Most recent" is by position in the file, not by timestamp.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn last_record_for(&self, host: &str) -> StorageResult<Option<Observation>> {
        let Some(file) = self.open()? else {
            return Ok(None);
        };

        if file.metadata()?.len() == 0 {
            return Ok(None);
        }

        for line in ReverseLines::new(file)? {
            let line = line?;
            if let Some(record) = Observation::decode(&line) {
                if record.host == host {
                    return Ok(Some(record));
                }
            }
        }

        trace!("no record for {host}");
        Ok(None)
    }
}
