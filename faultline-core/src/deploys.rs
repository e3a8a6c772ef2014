use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwapOption;
use thiserror::Error;

use crate::protocol::DeployRecord;

/// Errors surfaced by deploy registration.
///
/// Registration is the only deploy operation that can fail, and it fails
/// synchronously, before anything is appended.
#[derive(Debug, Error)]
pub enum DeployError {
    /// No access token is configured, so there is no credential scope to
    /// register the deploy under.
    #[error("no access token configured for deploy registration")]
    MissingCredential,
    /// A required deploy field was empty or malformed.
    #[error("invalid value for deploy field `{0}`")]
    InvalidArgument(&'static str),
}

/// What the application wants to register as a deploy.
///
/// The environment defaults to the configured one when unset; revision is
/// mandatory.
#[derive(Clone, Debug, Default)]
pub struct DeployInfo {
    /// The deployed revision, such as a commit hash or build number.
    pub revision: String,
    /// The environment the revision was deployed to. Defaults to the
    /// configured environment.
    pub environment: Option<String>,
    /// Freeform deploy comment.
    pub comment: Option<String>,
    /// The user who performed the deploy.
    pub local_username: Option<String>,
}

impl DeployInfo {
    /// Creates a registration for the given revision.
    pub fn new(revision: impl Into<String>) -> DeployInfo {
        DeployInfo {
            revision: revision.into(),
            ..Default::default()
        }
    }
}

/// The append-only deploy log.
///
/// Writers serialize on the log mutex; the current record is published
/// through an `ArcSwapOption` so readers on the capture path never take a
/// lock and never observe a torn record.
pub(crate) struct DeployLog {
    records: Mutex<Vec<Arc<DeployRecord>>>,
    current: ArcSwapOption<DeployRecord>,
}

impl DeployLog {
    pub fn new() -> DeployLog {
        DeployLog {
            records: Mutex::new(Vec::new()),
            current: ArcSwapOption::empty(),
        }
    }

    /// Validates and appends a record, making it the current deploy.
    pub fn register(&self, record: DeployRecord) -> Result<Arc<DeployRecord>, DeployError> {
        if record.access_token.is_empty() {
            return Err(DeployError::MissingCredential);
        }
        if record.revision.trim().is_empty() {
            return Err(DeployError::InvalidArgument("revision"));
        }
        if record.environment.trim().is_empty() {
            return Err(DeployError::InvalidArgument("environment"));
        }

        let record = Arc::new(record);
        // Publishing under the lock keeps `current` equal to the most
        // recently appended record even under concurrent registrations.
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        records.push(Arc::clone(&record));
        self.current.store(Some(Arc::clone(&record)));
        Ok(record)
    }

    /// The record registered most recently, read without locking.
    pub fn current(&self) -> Option<Arc<DeployRecord>> {
        self.current.load_full()
    }

    /// Snapshot of the whole log, oldest registration first.
    pub fn records(&self) -> Vec<Arc<DeployRecord>> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
