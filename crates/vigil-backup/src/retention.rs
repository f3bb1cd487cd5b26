//! Retention pruning.

use crate::catalog::BackupCatalog;
use chrono::Utc;
use std::collections::HashSet;
use tracing::{debug, info, warn};
use vigil_common::Result;

/// Retention policy for the backup catalog.
#[derive(Debug, Clone)]
pub struct RetentionPolicy {
    /// Sets older than this many days become eligible for deletion
    pub retention_days: u32,
    /// Never prune below this many restorable sets
    pub minimum_sets: usize,
    /// Refuse to delete sets not yet confirmed by the cold archive
    pub require_uploaded: bool,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            retention_days: 30,
            minimum_sets: 1,
            require_uploaded: false,
        }
    }
}

/// What a pruning pass did.
#[derive(Debug, Clone, Default)]
pub struct PruneReport {
    pub deleted: Vec<String>,
    pub kept: usize,
}

impl RetentionPolicy {
    /// Delete sets past the retention window.
    ///
    /// `protected` holds ids referenced by non-finalized deployment
    /// records; those are never deleted regardless of age. The most
    /// recent `minimum_sets` restorable sets are likewise always kept.
    /// Idempotent: a second pass with no new sets deletes nothing.
    pub async fn prune(
        &self,
        catalog: &BackupCatalog,
        protected: &HashSet<String>,
    ) -> Result<PruneReport> {
        let cutoff = Utc::now() - chrono::Duration::days(self.retention_days as i64);
        let sets = catalog.list().await?;

        let keep_recent: HashSet<String> = sets
            .iter()
            .filter(|m| m.is_restorable())
            .take(self.minimum_sets)
            .map(|m| m.id.clone())
            .collect();

        let mut report = PruneReport::default();
        for manifest in &sets {
            let mut reason = None;
            if manifest.created_at >= cutoff {
                reason = Some("within retention window");
            } else if protected.contains(&manifest.id) {
                reason = Some("referenced by in-flight deployment");
            } else if keep_recent.contains(&manifest.id) {
                reason = Some("minimum restorable set");
            } else if self.require_uploaded && !manifest.uploaded {
                reason = Some("not yet confirmed by cold archive");
            }

            if let Some(reason) = reason {
                debug!("keeping backup set {} ({})", manifest.id, reason);
                report.kept += 1;
                continue;
            }

            match catalog.delete_set(&manifest.id).await {
                Ok(()) => {
                    info!(
                        "deleted backup set {} (created {})",
                        manifest.id, manifest.created_at
                    );
                    report.deleted.push(manifest.id.clone());
                }
                Err(e) => {
                    warn!("failed to delete backup set {}: {}", manifest.id, e);
                    report.kept += 1;
                }
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::BackupManifest;
    use tempfile::TempDir;

    async fn seed(catalog: &BackupCatalog, id: &str, age_days: i64, uploaded: bool) {
        let manifest = BackupManifest {
            id: id.to_string(),
            created_at: Utc::now() - chrono::Duration::days(age_days),
            platform_version: None,
            artifacts: Vec::new(),
            verified: true,
            failed_kinds: Vec::new(),
            uploaded,
        };
        tokio::fs::create_dir(catalog.set_dir(id)).await.unwrap();
        catalog.save_manifest(&manifest).await.unwrap();
    }

    fn policy(days: u32) -> RetentionPolicy {
        RetentionPolicy {
            retention_days: days,
            minimum_sets: 1,
            require_uploaded: false,
        }
    }

    #[tokio::test]
    async fn prunes_only_past_the_window() {
        let dir = TempDir::new().unwrap();
        let catalog = BackupCatalog::open(dir.path()).unwrap();
        seed(&catalog, "old", 40, false).await;
        seed(&catalog, "older", 60, false).await;
        seed(&catalog, "fresh", 1, false).await;

        let report = policy(30).prune(&catalog, &HashSet::new()).await.unwrap();
        let mut deleted = report.deleted.clone();
        deleted.sort();
        assert_eq!(deleted, vec!["old", "older"]);
        assert!(catalog.load_manifest("fresh").await.is_ok());
    }

    #[tokio::test]
    async fn second_pass_deletes_nothing() {
        let dir = TempDir::new().unwrap();
        let catalog = BackupCatalog::open(dir.path()).unwrap();
        seed(&catalog, "old", 45, false).await;
        seed(&catalog, "fresh", 1, false).await;

        let first = policy(30).prune(&catalog, &HashSet::new()).await.unwrap();
        assert_eq!(first.deleted, vec!["old"]);

        let second = policy(30).prune(&catalog, &HashSet::new()).await.unwrap();
        assert!(second.deleted.is_empty());
    }

    #[tokio::test]
    async fn in_flight_reference_protects_a_set() {
        let dir = TempDir::new().unwrap();
        let catalog = BackupCatalog::open(dir.path()).unwrap();
        seed(&catalog, "old-referenced", 45, false).await;
        seed(&catalog, "fresh", 1, false).await;

        let protected: HashSet<String> = ["old-referenced".to_string()].into();
        let report = policy(30).prune(&catalog, &protected).await.unwrap();
        assert!(report.deleted.is_empty());
        assert!(catalog.load_manifest("old-referenced").await.is_ok());
    }

    #[tokio::test]
    async fn unuploaded_sets_survive_when_durability_required() {
        let dir = TempDir::new().unwrap();
        let catalog = BackupCatalog::open(dir.path()).unwrap();
        seed(&catalog, "old-local-only", 45, false).await;
        seed(&catalog, "old-archived", 45, true).await;
        seed(&catalog, "fresh", 1, true).await;

        let mut policy = policy(30);
        policy.require_uploaded = true;
        let report = policy.prune(&catalog, &HashSet::new()).await.unwrap();
        assert_eq!(report.deleted, vec!["old-archived"]);
    }
}
