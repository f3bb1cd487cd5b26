//! Selective restore from a backup set.
//!
//! Re-verifies the scoped artifacts against the manifest, then restores
//! one backend at a time: quiesce, restore, resume. A failure on one
//! kind is recorded and the remaining kinds are still attempted. A
//! scoped post-restore probe closes the run.

use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};
use vigil_backends::BackendConnector;
use vigil_backup::{BackupCatalog, BackupManifest, IntegrityVerifier};
use vigil_common::{BackendKind, Error, Result};
use vigil_health::{ProbeReport, Prober};

/// What one restore run did.
#[derive(Debug, serde::Serialize)]
pub struct RestoreReport {
    pub backup_id: String,
    pub restored: Vec<BackendKind>,
    pub failed: Vec<(BackendKind, String)>,
    pub probe: ProbeReport,
}

impl RestoreReport {
    pub fn succeeded(&self) -> bool {
        self.failed.is_empty() && self.probe.passed
    }
}

pub struct RestoreCoordinator {
    catalog: BackupCatalog,
    connectors: Vec<Arc<dyn BackendConnector>>,
    verifier: IntegrityVerifier,
    prober: Arc<dyn Prober>,
}

impl RestoreCoordinator {
    pub fn new(
        catalog: BackupCatalog,
        connectors: Vec<Arc<dyn BackendConnector>>,
        prober: Arc<dyn Prober>,
    ) -> Self {
        Self {
            catalog,
            connectors,
            verifier: IntegrityVerifier,
            prober,
        }
    }

    pub fn catalog(&self) -> &BackupCatalog {
        &self.catalog
    }

    /// Restore `kinds` (or every kind in the set) from backup `id`.
    ///
    /// Locking is the caller's job; the deployment controller invokes
    /// this while already holding the ops lock during a rollback.
    pub async fn restore(
        &self,
        id: &str,
        kinds: Option<&[BackendKind]>,
    ) -> Result<RestoreReport> {
        let manifest = self.catalog.load_manifest(id).await?;
        if !manifest.is_restorable() {
            return Err(Error::IntegrityFailure {
                item: format!("backup set {}", id),
                reason: "set is not verified; refusing to restore from it".to_string(),
            });
        }

        let scope: Vec<BackendKind> = match kinds {
            Some(kinds) => kinds.to_vec(),
            None => manifest.artifacts.iter().map(|a| a.kind).collect(),
        };
        self.reverify(&manifest, &scope).await?;

        let set_dir = self.catalog.set_dir(id);
        let mut restored = Vec::new();
        let mut failed = Vec::new();
        for kind in &scope {
            match self.restore_kind(&set_dir, &manifest, *kind).await {
                Ok(()) => restored.push(*kind),
                Err(e) => {
                    error!(kind = %kind, "restore failed: {}", e);
                    failed.push((*kind, e.to_string()));
                }
            }
        }

        let probe = self.prober.probe_scoped(&scope).await;
        info!(
            "restore of set {} finished: {} restored, {} failed, probe {}",
            id,
            restored.len(),
            failed.len(),
            if probe.passed { "passed" } else { "failed" }
        );
        Ok(RestoreReport {
            backup_id: id.to_string(),
            restored,
            failed,
            probe,
        })
    }

    /// Artifacts are re-checked against their recorded digests right
    /// before use; a set verified at creation may have rotted on disk
    /// since. A mismatch marks the whole set failed so it is never
    /// offered again.
    async fn reverify(&self, manifest: &BackupManifest, scope: &[BackendKind]) -> Result<()> {
        let set_dir = self.catalog.set_dir(&manifest.id);
        for kind in scope {
            let artifact = manifest.artifact(*kind).ok_or_else(|| {
                Error::NotFound(format!("backup set {} has no {} artifact", manifest.id, kind))
            })?;
            if !self.verifier.verify_artifact(&set_dir, artifact).await? {
                let mut updated = manifest.clone();
                updated.verified = false;
                if !updated.failed_kinds.contains(kind) {
                    updated.failed_kinds.push(*kind);
                }
                self.catalog.save_manifest(&updated).await?;
                return Err(Error::IntegrityFailure {
                    item: format!("{}/{}", manifest.id, artifact.file_name),
                    reason: "digest mismatch on pre-restore verification".to_string(),
                });
            }
        }
        Ok(())
    }

    async fn restore_kind(
        &self,
        set_dir: &Path,
        manifest: &BackupManifest,
        kind: BackendKind,
    ) -> Result<()> {
        let connector = self
            .connectors
            .iter()
            .find(|c| c.kind() == kind)
            .ok_or_else(|| {
                Error::Configuration(format!("no connector configured for backend {}", kind))
            })?;
        let artifact = manifest.artifact(kind).ok_or_else(|| {
            Error::NotFound(format!("backup set {} has no {} artifact", manifest.id, kind))
        })?;
        let path = set_dir.join(&artifact.file_name);

        if let Err(e) = connector.quiesce().await {
            warn!(kind = %kind, "quiesce failed, restoring anyway: {}", e);
        }
        let result = connector.restore(&path).await;
        // Resume even when the restore itself failed.
        if let Err(e) = connector.resume().await {
            warn!(kind = %kind, "resume failed: {}", e);
        }
        result
    }
}
