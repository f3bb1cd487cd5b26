//! On-disk backup catalog.
//!
//! Layout: one subdirectory per backup set id under the catalog root,
//! holding the artifact files plus `manifest.json`.

use crate::manifest::{BackupManifest, MANIFEST_FILE};
use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use vigil_common::{Error, Result};

#[derive(Debug, Clone)]
pub struct BackupCatalog {
    root: PathBuf,
}

impl BackupCatalog {
    /// Open (and create if missing) the catalog at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of one backup set.
    pub fn set_dir(&self, id: &str) -> PathBuf {
        self.root.join(id)
    }

    /// Allocate a fresh timestamp-derived set id and create its directory.
    ///
    /// On collision (clock skew, rapid re-invocation) a monotonic `-N`
    /// suffix is probed against the directory on disk.
    pub async fn allocate_id(&self) -> Result<String> {
        let base = Utc::now().format("%Y%m%dT%H%M%S").to_string();
        let mut candidate = base.clone();
        let mut suffix = 0u32;
        loop {
            match tokio::fs::create_dir(self.set_dir(&candidate)).await {
                Ok(()) => return Ok(candidate),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    suffix += 1;
                    candidate = format!("{}-{}", base, suffix);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Persist a manifest into its set directory (atomic write).
    pub async fn save_manifest(&self, manifest: &BackupManifest) -> Result<()> {
        let data = serde_json::to_vec_pretty(manifest)?;
        let path = self.set_dir(&manifest.id).join(MANIFEST_FILE);
        vigil_backends::write_atomic(&path, &data).await
    }

    /// Load one set's manifest.
    pub async fn load_manifest(&self, id: &str) -> Result<BackupManifest> {
        let path = self.set_dir(id).join(MANIFEST_FILE);
        let data = tokio::fs::read(&path)
            .await
            .map_err(|_| Error::NotFound(format!("backup set {}", id)))?;
        Ok(serde_json::from_slice(&data)?)
    }

    /// List every set in the catalog, newest first.
    ///
    /// Directories without a readable manifest are reported and skipped,
    /// never offered for restore.
    pub async fn list(&self) -> Result<Vec<BackupManifest>> {
        let mut sets = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let id = entry.file_name().to_string_lossy().into_owned();
            match self.load_manifest(&id).await {
                Ok(manifest) => sets.push(manifest),
                Err(e) => warn!("skipping catalog entry {}: {}", id, e),
            }
        }
        sets.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sets)
    }

    /// The most recent restorable set, if any.
    pub async fn latest_restorable(&self) -> Result<BackupManifest> {
        self.list()
            .await?
            .into_iter()
            .find(BackupManifest::is_restorable)
            .ok_or(Error::NoRestorableBackup)
    }

    /// Remove a set and all of its artifacts.
    pub async fn delete_set(&self, id: &str) -> Result<()> {
        debug!("deleting backup set {}", id);
        tokio::fs::remove_dir_all(self.set_dir(id)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use vigil_common::BackendKind;

    fn manifest(id: &str, restorable: bool) -> BackupManifest {
        BackupManifest {
            id: id.to_string(),
            created_at: Utc::now(),
            platform_version: None,
            artifacts: Vec::new(),
            verified: restorable,
            failed_kinds: if restorable {
                Vec::new()
            } else {
                vec![BackendKind::SearchIndex]
            },
            uploaded: false,
        }
    }

    #[tokio::test]
    async fn allocate_id_disambiguates_collisions() {
        let dir = TempDir::new().unwrap();
        let catalog = BackupCatalog::open(dir.path()).unwrap();

        let first = catalog.allocate_id().await.unwrap();
        let second = catalog.allocate_id().await.unwrap();
        assert_ne!(first, second);
        assert!(second.starts_with(&first[..8]));
        assert!(catalog.set_dir(&second).is_dir());
    }

    #[tokio::test]
    async fn latest_restorable_skips_failed_sets() {
        let dir = TempDir::new().unwrap();
        let catalog = BackupCatalog::open(dir.path()).unwrap();

        let mut old = manifest("20260101T000000", true);
        old.created_at = Utc::now() - chrono::Duration::days(2);
        tokio::fs::create_dir(catalog.set_dir(&old.id)).await.unwrap();
        catalog.save_manifest(&old).await.unwrap();

        let bad = manifest("20260825T000000", false);
        tokio::fs::create_dir(catalog.set_dir(&bad.id)).await.unwrap();
        catalog.save_manifest(&bad).await.unwrap();

        let latest = catalog.latest_restorable().await.unwrap();
        assert_eq!(latest.id, old.id);
    }

    #[tokio::test]
    async fn empty_catalog_has_no_restorable_sets() {
        let dir = TempDir::new().unwrap();
        let catalog = BackupCatalog::open(dir.path()).unwrap();
        assert!(matches!(
            catalog.latest_restorable().await,
            Err(Error::NoRestorableBackup)
        ));
    }
}
