//! Backup set manifests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vigil_common::{Artifact, BackendKind};

/// Manifest file name inside each backup set directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// The manifest enumerating one backup set.
///
/// A set is offered for restore only when it is `verified` and has no
/// failed kinds; anything else is excluded from the restorable catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupManifest {
    /// Timestamp-derived set identifier, unique within the catalog
    pub id: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Platform version running when the set was taken
    pub platform_version: Option<String>,
    /// One entry per successfully produced artifact, in kind order
    pub artifacts: Vec<Artifact>,
    /// True only after every requested artifact passed verification
    pub verified: bool,
    /// Kinds whose snapshot or verification failed
    pub failed_kinds: Vec<BackendKind>,
    /// True only after the cold archive confirmed receipt
    pub uploaded: bool,
}

impl BackupManifest {
    /// Whether this set may be offered as a restore candidate.
    pub fn is_restorable(&self) -> bool {
        self.verified && self.failed_kinds.is_empty()
    }

    /// Artifact entry for a backend kind, if present.
    pub fn artifact(&self, kind: BackendKind) -> Option<&Artifact> {
        self.artifacts.iter().find(|a| a.kind == kind)
    }

    /// Total size of all artifacts in bytes.
    pub fn total_size(&self) -> u64 {
        self.artifacts.iter().map(|a| a.size_bytes).sum()
    }
}
