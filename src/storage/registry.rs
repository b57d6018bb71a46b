//! Host registry backed by a fully rewritten file
//!
//! The registry keeps an in-memory snapshot of the file together with the
//! file's modification time. The snapshot is reused while the modification
//! time is unchanged and rebuilt from disk otherwise. Every change rewrites the
//! whole file into a temporary sibling that is renamed over the file, so a
//! failed write leaves both the file and the snapshot untouched.
//!
//! All operations run under one mutex, so registrations cannot race the poll
//! cycle's `last_fetch_time` updates.

use std::collections::HashMap;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::SystemTime;

use chrono::NaiveDateTime;
use tracing::{debug, instrument, trace, warn};

use super::codec::{LineRecord, read_lines};
use super::error::StorageResult;
use super::schema::{TrackedHost, validate_host};

#[derive(Debug, Default)]
struct RegistryCache {
    hosts: HashMap<String, TrackedHost>,

    /// Modification time the snapshot was taken at; `None` when the file was missing
    modified: Option<SystemTime>,

    loaded: bool,

    /// Number of times the snapshot was rebuilt from disk
    reloads: u64,
}

#[derive(Debug)]
pub struct HostRegistry {
    path: PathBuf,
    cache: Mutex<RegistryCache>,
}

impl HostRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: Mutex::new(RegistryCache::default()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, RegistryCache> {
        // The snapshot is only replaced wholesale, so a poisoned guard still
        // holds a consistent value.
        self.cache.lock().unwrap_or_else(|poisoned| {
            warn!("registry lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Number of times the snapshot was rebuilt from disk
    pub fn cache_reloads(&self) -> u64 {
        self.lock().reloads
    }

    fn modified_time(&self) -> StorageResult<Option<SystemTime>> {
        match fs::metadata(&self.path) {
            Ok(meta) => Ok(Some(meta.modified()?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn read_hosts(&self) -> StorageResult<HashMap<String, TrackedHost>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => return Err(e.into()),
        };

        let mut hosts = HashMap::new();
        for line in read_lines(BufReader::new(file)) {
            // later lines for the same host win
            if let Some(host) = TrackedHost::decode(&line?) {
                hosts.insert(host.host.clone(), host);
            }
        }

        Ok(hosts)
    }

    /// Bring the snapshot in line with the file if its modification time moved
    fn refresh(&self, cache: &mut RegistryCache) -> StorageResult<()> {
        let modified = self.modified_time()?;
        if cache.loaded && cache.modified == modified {
            trace!("registry snapshot is current");
            return Ok(());
        }

        let hosts = self.read_hosts()?;
        debug!("reloaded {} hosts from {}", hosts.len(), self.path.display());

        cache.hosts = hosts;
        cache.modified = modified;
        cache.loaded = true;
        cache.reloads += 1;
        Ok(())
    }

    /// Rewrite the file with `hosts` and adopt them as the snapshot
    fn persist(&self, cache: &mut RegistryCache, hosts: HashMap<String, TrackedHost>) -> StorageResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut sorted: Vec<&TrackedHost> = hosts.values().collect();
        sorted.sort_by(|a, b| a.host.cmp(&b.host));

        let mut content = String::from(TrackedHost::HEADER);
        content.push('\n');
        for host in sorted {
            content.push_str(&host.encode());
            content.push('\n');
        }

        let mut tmp_path = OsString::from(self.path.as_os_str());
        tmp_path.push(".tmp");
        let tmp_path = PathBuf::from(tmp_path);

        let result = (|| -> StorageResult<()> {
            let mut file = File::create(&tmp_path)?;
            file.write_all(content.as_bytes())?;
            file.sync_all()?;
            fs::rename(&tmp_path, &self.path)?;
            Ok(())
        })();

        if let Err(e) = result {
            let _ = fs::remove_file(&tmp_path);
            return Err(e);
        }

        // The snapshot comes from memory, not from a re-read, so two rewrites
        // within one mtime tick stay coherent.
        cache.modified = self.modified_time()?;
        cache.hosts = hosts;
        cache.loaded = true;

        debug!("wrote {} hosts to {}", cache.hosts.len(), self.path.display());
        Ok(())
    }

    /// All tracked hosts, sorted by host name
    pub fn list(&self) -> StorageResult<Vec<TrackedHost>> {
        let mut cache = self.lock();
        self.refresh(&mut cache)?;

        let mut hosts: Vec<TrackedHost> = cache.hosts.values().cloned().collect();
        hosts.sort_by(|a, b| a.host.cmp(&b.host));
        Ok(hosts)
    }

    /// Insert or replace the entry keyed by `record.host`
    #[instrument(skip(self), fields(host = %record.host))]
    pub fn upsert(&self, record: TrackedHost) -> StorageResult<()> {
        self.upsert_many(vec![record])
    }

    /// Insert or replace several entries with a single rewrite
    pub fn upsert_many(&self, records: Vec<TrackedHost>) -> StorageResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        for record in &records {
            validate_host(&record.host)?;
        }

        let mut cache = self.lock();
        self.refresh(&mut cache)?;

        let mut hosts = cache.hosts.clone();
        for record in records {
            hosts.insert(record.host.clone(), record);
        }

        self.persist(&mut cache, hosts)
    }

    /// Set `last_fetch_time = at` for each of `hosts` that is still tracked
    ///
    /// Hosts removed since they were selected stay removed. Returns the
    /// number of entries updated; the file is untouched when that is zero.
    #[instrument(skip(self, hosts), fields(count = hosts.len()))]
    pub fn mark_fetched(&self, hosts: &[String], at: NaiveDateTime) -> StorageResult<usize> {
        let mut cache = self.lock();
        self.refresh(&mut cache)?;

        let mut updated = cache.hosts.clone();
        let mut count = 0;
        for host in hosts {
            match updated.get_mut(host) {
                Some(entry) => {
                    entry.last_fetch_time = at;
                    count += 1;
                }
                None => debug!("{host} was removed during the cycle, not re-adding it"),
            }
        }

        if count > 0 {
            self.persist(&mut cache, updated)?;
        }
        Ok(count)
    }

    /// Track `host`, marking it as due immediately
    ///
    /// Registering an already tracked host resets its last fetch time.
    pub fn register(&self, host: &str) -> StorageResult<()> {
        self.upsert(TrackedHost::new(host))
    }

    /// Stop tracking `host`; the file is untouched when it was not tracked
    #[instrument(skip(self))]
    pub fn remove(&self, host: &str) -> StorageResult<bool> {
        let mut cache = self.lock();
        self.refresh(&mut cache)?;

        if !cache.hosts.contains_key(host) {
            trace!("{host} is not tracked");
            return Ok(false);
        }

        let mut hosts = cache.hosts.clone();
        hosts.remove(host);
        self.persist(&mut cache, hosts)?;
        Ok(true)
    }

    /// Number of tracked hosts
    pub fn len(&self) -> StorageResult<usize> {
        let mut cache = self.lock();
        self.refresh(&mut cache)?;
        Ok(cache.hosts.len())
    }

    pub fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.len()? == 0)
    }
}
