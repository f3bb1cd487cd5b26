//! Backup coordinator.
//!
//! Produces a timestamped, checksummed backup set with a manifest. A
//! failed snapshot of one backend never aborts the remaining backends:
//! every requested kind is attempted, completeness is evaluated at the
//! end, and a partial set is marked failed rather than restorable.

use crate::{
    archive::ColdArchive,
    catalog::BackupCatalog,
    manifest::BackupManifest,
    retention::{PruneReport, RetentionPolicy},
    verifier::IntegrityVerifier,
};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};
use vigil_backends::BackendConnector;
use vigil_common::{Artifact, BackendKind, Error, Result};

/// Options for one backup run.
#[derive(Debug, Clone, Default)]
pub struct BackupOptions {
    /// Backend kinds to back up; `None` means every configured backend
    pub kinds: Option<Vec<BackendKind>>,
    /// Additionally smoke-test every artifact before marking the set usable
    pub smoke_test: bool,
    /// Push the set to the cold archive after verification
    pub upload: bool,
    /// Platform version recorded in the manifest
    pub platform_version: Option<String>,
}

/// Result of one backup run.
#[derive(Debug)]
pub struct BackupOutcome {
    pub manifest: BackupManifest,
    /// Per-kind failure reasons (snapshot, digest or smoke failures)
    pub failures: Vec<(BackendKind, String)>,
    pub pruned: PruneReport,
}

impl BackupOutcome {
    /// Whether every requested backend was backed up and verified.
    pub fn succeeded(&self) -> bool {
        self.failures.is_empty() && self.manifest.is_restorable()
    }
}

pub struct BackupCoordinator {
    connectors: Vec<Arc<dyn BackendConnector>>,
    catalog: BackupCatalog,
    verifier: IntegrityVerifier,
    archive: Option<Arc<dyn ColdArchive>>,
    retention: RetentionPolicy,
    semaphore: Arc<Semaphore>,
}

impl BackupCoordinator {
    pub fn new(
        connectors: Vec<Arc<dyn BackendConnector>>,
        catalog: BackupCatalog,
        archive: Option<Arc<dyn ColdArchive>>,
        retention: RetentionPolicy,
        parallel_snapshots: usize,
    ) -> Self {
        Self {
            connectors,
            catalog,
            verifier: IntegrityVerifier,
            archive,
            retention,
            semaphore: Arc::new(Semaphore::new(parallel_snapshots.max(1))),
        }
    }

    pub fn catalog(&self) -> &BackupCatalog {
        &self.catalog
    }

    /// Create a new backup set.
    ///
    /// `protected` are set ids referenced by in-flight deployments; they
    /// are handed to the retention pass that runs after the backup.
    pub async fn create_backup_set(
        &self,
        options: &BackupOptions,
        protected: &HashSet<String>,
    ) -> Result<BackupOutcome> {
        let requested: Vec<Arc<dyn BackendConnector>> = match &options.kinds {
            Some(kinds) => self
                .connectors
                .iter()
                .filter(|c| kinds.contains(&c.kind()))
                .cloned()
                .collect(),
            None => self.connectors.clone(),
        };

        let id = self.catalog.allocate_id().await?;
        let set_dir = self.catalog.set_dir(&id);
        info!(
            "starting backup set {} ({} backends)",
            id,
            requested.len()
        );

        // Attempt all snapshots; collect per-kind results instead of
        // bailing on the first failure.
        let snapshot_futures = requested.iter().map(|connector| {
            let connector = connector.clone();
            let semaphore = self.semaphore.clone();
            let set_dir = set_dir.clone();
            async move {
                let _permit = match semaphore.acquire().await {
                    Ok(permit) => permit,
                    Err(e) => {
                        let err = Error::Internal(format!("snapshot scheduling: {}", e));
                        return (connector, Err(err));
                    }
                };
                let result = connector.snapshot(&set_dir).await;
                (connector, result)
            }
        });
        let snapshots = futures::future::join_all(snapshot_futures).await;

        let mut artifacts = Vec::new();
        let mut failures = Vec::new();
        for (connector, result) in snapshots {
            let kind = connector.kind();
            match result {
                Ok(path) => {
                    // A snapshot that cannot be read back (vanished file,
                    // io error during the digest) fails its kind, not the
                    // whole run.
                    let described: Result<(u64, String)> = async {
                        let size_bytes = tokio::fs::metadata(&path).await?.len();
                        let sha256 = self.verifier.digest_file(&path).await?;
                        Ok((size_bytes, sha256))
                    }
                    .await;
                    let (size_bytes, sha256) = match described {
                        Ok(pair) => pair,
                        Err(e) => {
                            error!(kind = %kind, "artifact unreadable after snapshot: {}", e);
                            failures.push((kind, format!("artifact unreadable: {}", e)));
                            continue;
                        }
                    };
                    let file_name = path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default();

                    if options.smoke_test {
                        if let Err(e) = connector.smoke_test(&path).await {
                            warn!(kind = %kind, "artifact failed smoke test: {}", e);
                            failures.push((kind, e.to_string()));
                        }
                    }
                    artifacts.push(Artifact {
                        kind,
                        file_name,
                        size_bytes,
                        sha256,
                    });
                }
                Err(e) => {
                    error!(kind = %kind, "snapshot failed: {}", e);
                    failures.push((kind, e.to_string()));
                }
            }
        }
        artifacts.sort_by_key(|a| a.kind);

        let mut manifest = BackupManifest {
            id: id.clone(),
            created_at: Utc::now(),
            platform_version: options.platform_version.clone(),
            artifacts,
            verified: failures.is_empty(),
            failed_kinds: failures.iter().map(|(kind, _)| *kind).collect(),
            uploaded: false,
        };
        if let Err(e) = self.catalog.save_manifest(&manifest).await {
            // A set directory without a manifest is invisible to the
            // catalog and would never be pruned; remove it before bailing.
            if let Err(cleanup) = self.catalog.delete_set(&id).await {
                warn!(
                    "could not remove set {} after manifest write failure: {}",
                    id, cleanup
                );
            }
            return Err(e);
        }

        if manifest.verified {
            info!(
                "backup set {} complete: {} artifacts, {} bytes",
                id,
                manifest.artifacts.len(),
                manifest.total_size()
            );
        } else {
            error!(
                "backup set {} marked failed (kinds: {})",
                id,
                manifest
                    .failed_kinds
                    .iter()
                    .map(|k| k.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }

        if options.upload && manifest.verified {
            self.upload_set(&set_dir, &mut manifest).await?;
        }

        let pruned = self.retention.prune(&self.catalog, protected).await?;

        Ok(BackupOutcome {
            manifest,
            failures,
            pruned,
        })
    }

    async fn upload_set(
        &self,
        set_dir: &std::path::Path,
        manifest: &mut BackupManifest,
    ) -> Result<()> {
        let Some(archive) = &self.archive else {
            warn!("upload requested but no cold archive is configured");
            return Ok(());
        };
        archive.store_set(set_dir, manifest).await?;
        // `uploaded` flips only on a positive receipt from the archive.
        if archive.confirm(&manifest.id).await? {
            manifest.uploaded = true;
            self.catalog.save_manifest(manifest).await?;
        } else {
            warn!(
                "cold archive did not confirm receipt of set {}",
                manifest.id
            );
        }
        Ok(())
    }
}
