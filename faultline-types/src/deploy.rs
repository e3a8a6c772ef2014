//! Deploy correlation records.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::utils::ts_seconds_float;

/// One registered deploy.
///
/// Records are append-only: once registered they are never edited or
/// removed, and the most recently registered record is the current one.
/// Reports embed a [`DeploySnapshot`] value copy, never a reference, so a
/// report keeps describing the deploy that was current at capture time no
/// matter what is registered later.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeployRecord {
    /// The deployed revision, such as a commit hash or build number.
    pub revision: String,
    /// The environment the revision was deployed to.
    pub environment: String,
    /// Freeform deploy comment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// The user who performed the deploy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_username: Option<String>,
    /// The credential scope the deploy was registered under. Never
    /// serialized.
    #[serde(skip_serializing, default)]
    pub access_token: String,
    /// When the deploy was registered.
    #[serde(with = "ts_seconds_float")]
    pub registered_at: SystemTime,
}

impl DeployRecord {
    /// Returns the value copy of this record that gets embedded in reports.
    pub fn snapshot(&self) -> DeploySnapshot {
        DeploySnapshot {
            revision: self.revision.clone(),
            environment: self.environment.clone(),
            registered_at: self.registered_at,
        }
    }
}

/// The value copy of a [`DeployRecord`] embedded in reports.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeploySnapshot {
    /// The deployed revision.
    pub revision: String,
    /// The environment the revision was deployed to.
    pub environment: String,
    /// When the deploy was registered.
    #[serde(with = "ts_seconds_float")]
    pub registered_at: SystemTime,
}

impl From<&DeployRecord> for DeploySnapshot {
    fn from(record: &DeployRecord) -> DeploySnapshot {
        record.snapshot()
    }
}
