//! Directory-backed connectors (config store, log archive).
//!
//! Both backends are plain directory trees; snapshot and restore go
//! through the shared [`bundle`](crate::bundle) codec. Quiesce is a no-op:
//! nothing accepts connections here, and log writers append through the
//! platform's logging pipeline which tolerates file replacement.

use crate::{bundle, write_atomic, BackendConnector};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::info;
use vigil_common::{BackendKind, Error, Result};

pub struct BundleConnector {
    kind: BackendKind,
    source_dir: PathBuf,
    artifact_name: &'static str,
}

impl BundleConnector {
    /// Connector for the service configuration bundle.
    pub fn config_store(source_dir: PathBuf) -> Self {
        Self {
            kind: BackendKind::Config,
            source_dir,
            artifact_name: "config.bundle.gz",
        }
    }

    /// Connector for the JSON-lines application log archive.
    pub fn log_archive(source_dir: PathBuf) -> Self {
        Self {
            kind: BackendKind::LogArchive,
            source_dir,
            artifact_name: "logs.bundle.gz",
        }
    }
}

#[async_trait]
impl BackendConnector for BundleConnector {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    async fn snapshot(&self, dest_dir: &Path) -> Result<PathBuf> {
        if !self.source_dir.is_dir() {
            return Err(Error::BackendUnreachable {
                kind: self.kind,
                reason: format!("{} is not a directory", self.source_dir.display()),
            });
        }
        info!(kind = %self.kind, dir = %self.source_dir.display(), "bundling directory");

        let source = self.source_dir.clone();
        let blob = tokio::task::spawn_blocking(move || bundle::pack_dir(&source))
            .await
            .map_err(|e| Error::Internal(format!("bundling task panicked: {}", e)))?
            .map_err(|e| Error::SnapshotFailed {
                kind: self.kind,
                reason: e.to_string(),
            })?;

        let final_path = dest_dir.join(self.artifact_name);
        write_atomic(&final_path, &blob).await?;
        Ok(final_path)
    }

    async fn restore(&self, artifact_path: &Path) -> Result<()> {
        info!(kind = %self.kind, dir = %self.source_dir.display(), "restoring directory bundle");
        let blob = tokio::fs::read(artifact_path).await?;
        let target = self.source_dir.clone();
        tokio::task::spawn_blocking(move || bundle::unpack_to(&target, &blob))
            .await
            .map_err(|e| Error::Internal(format!("restore task panicked: {}", e)))?
            .map_err(|e| match e {
                Error::Serialization(reason) => Error::IncompatibleFormat {
                    kind: self.kind,
                    reason,
                },
                other => Error::RestoreFailed {
                    kind: self.kind,
                    reason: other.to_string(),
                },
            })
    }

    async fn is_healthy(&self) -> bool {
        tokio::fs::read_dir(&self.source_dir).await.is_ok()
    }

    async fn smoke_test(&self, artifact_path: &Path) -> Result<()> {
        let blob = tokio::fs::read(artifact_path).await?;
        bundle::check_header(&blob)
    }
}
