//! Best-effort `.bak` copies of the data files

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, error, instrument};

/// Sibling backup path: the source path with `.bak` appended
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".bak");
    PathBuf::from(name)
}

/// Outcome of one backup run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackupReport {
    /// Backup files that were written
    pub copied: Vec<PathBuf>,

    /// Source files that could not be copied, with the reason
    pub failed: Vec<(PathBuf, String)>,
}

impl BackupReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Copy each file over its `.bak` sibling
///
/// A failure on one file does not stop the others. Nothing is verified and
/// no history is kept.
#[instrument(skip_all)]
pub fn backup_files<P: AsRef<Path>>(paths: &[P]) -> BackupReport {
    let mut report = BackupReport::default();

    for path in paths {
        let path = path.as_ref();
        let target = backup_path(path);

        match fs::copy(path, &target) {
            Ok(bytes) => {
                debug!("backed up {} ({bytes} bytes)", path.display());
                report.copied.push(target);
            }
            Err(e) => {
                error!("failed to back up {}: {e}", path.display());
                report.failed.push((path.to_path_buf(), e.to_string()));
            }
        }
    }

    report
}
