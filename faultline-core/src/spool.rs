//! Durable on-disk records for queued reports.
//!
//! Each queued entry is one JSON file named after its [`ReportId`], so the
//! directory listing of a spool is the queue in capture order. Records are
//! written before the first delivery attempt, rewritten when retry state
//! changes, and removed when the entry reaches a terminal outcome.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::protocol::{DeliveryQueueEntry, DeliveryState, ReportId};

/// Failure while reading or writing spool records.
#[derive(Debug, Error)]
pub(crate) enum SpoolError {
    /// Filesystem access failed.
    #[error("spool io: {0}")]
    Io(#[from] io::Error),
    /// A record could not be serialized.
    #[error("spool record: {0}")]
    Record(#[from] serde_json::Error),
}

pub(crate) struct Spool {
    dir: PathBuf,
}

impl Spool {
    pub fn new(dir: &Path) -> Result<Spool, SpoolError> {
        fs::create_dir_all(dir)?;
        Ok(Spool {
            dir: dir.to_path_buf(),
        })
    }

    fn record_path(&self, id: ReportId) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    /// Writes or rewrites the record for this entry.
    ///
    /// The write goes through a temporary file so a crash mid-write never
    /// leaves a truncated record in place of a good one.
    pub fn store(&self, entry: &DeliveryQueueEntry) -> Result<(), SpoolError> {
        let body = serde_json::to_vec(entry)?;
        let path = self.record_path(entry.id());
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, body)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Removes the record for this id. Missing records are not an error.
    pub fn remove(&self, id: ReportId) -> Result<(), SpoolError> {
        match fs::remove_file(self.record_path(id)) {
            Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err.into()),
            _ => Ok(()),
        }
    }

    /// Loads every spooled entry, re-staged as pending, in capture order.
    ///
    /// An in-flight record belongs to a process that died mid-attempt and
    /// never survives a restart as anything but pending. Records in terminal
    /// states and records that no longer parse are removed from the
    /// directory.
    pub fn load_all(&self) -> Result<Vec<DeliveryQueueEntry>, SpoolError> {
        let mut entries = Vec::new();
        for dirent in fs::read_dir(&self.dir)? {
            let path = dirent?.path();
            if path.extension().map_or(true, |ext| ext != "json") {
                continue;
            }
            let record = fs::read(&path)
                .map_err(SpoolError::from)
                .and_then(|raw| Ok(serde_json::from_slice::<DeliveryQueueEntry>(&raw)?));
            match record {
                Ok(mut entry) if !entry.report.delivery.is_terminal() => {
                    entry.report.delivery = DeliveryState::Pending;
                    entries.push(entry);
                }
                Ok(entry) => {
                    faultline_debug!("dropping terminal spool record {}", entry.id());
                    fs::remove_file(&path).ok();
                }
                Err(err) => {
                    faultline_debug!("dropping malformed spool record {:?}: {}", path, err);
                    fs::remove_file(&path).ok();
                }
            }
        }
        entries.sort_by_key(|entry| entry.id());
        Ok(entries)
    }
}
