//! Backend connectors for the Vigil platform's stateful stores.
//!
//! One connector per backend kind (relational DB, search index, config
//! bundle, log archive), each exposing the same snapshot/restore/health
//! contract. New backend types are added by implementing
//! [`BackendConnector`], not by extending the coordinators.

pub mod bundle;
pub mod dir;
pub mod elastic;
pub mod net;
pub mod postgres;

pub use dir::BundleConnector;
pub use elastic::ElasticsearchConnector;
pub use postgres::PostgresConnector;

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use vigil_common::{BackendKind, Result};
use vigil_config::BackendsConfig;

/// Capability contract of one stateful backend.
///
/// `snapshot` must never leave a partially-written artifact behind:
/// implementations write to a temporary path and atomically rename only
/// on success. `is_healthy` is bounded by the connector's timeout and a
/// timeout counts as unhealthy.
#[async_trait]
pub trait BackendConnector: Send + Sync {
    /// Which backend this connector drives.
    fn kind(&self) -> BackendKind;

    /// Export the backend's data into `dest_dir`, returning the artifact path.
    async fn snapshot(&self, dest_dir: &Path) -> Result<PathBuf>;

    /// Replace the backend's data with the given artifact's contents.
    async fn restore(&self, artifact_path: &Path) -> Result<()>;

    /// Liveness check under a bounded timeout; a timeout is unhealthy.
    async fn is_healthy(&self) -> bool;

    /// Best-effort pause of write traffic before snapshot/restore.
    async fn quiesce(&self) -> Result<()> {
        Ok(())
    }

    /// Resume accepting writes after a quiesce.
    async fn resume(&self) -> Result<()> {
        Ok(())
    }

    /// Shallow parse of an artifact, catching truncation without a full
    /// restore.
    async fn smoke_test(&self, artifact_path: &Path) -> Result<()>;
}

/// Build the full connector set from configuration.
pub fn build_connectors(config: &BackendsConfig) -> Result<Vec<Arc<dyn BackendConnector>>> {
    Ok(vec![
        Arc::new(PostgresConnector::new(config.relational.clone())),
        Arc::new(ElasticsearchConnector::new(config.search.clone())?),
        Arc::new(BundleConnector::config_store(
            config.config_store.path.clone(),
        )),
        Arc::new(BundleConnector::log_archive(
            config.log_archive.path.clone(),
        )),
    ])
}

/// Write `data` to `path` via a temporary sibling file and an atomic rename.
pub async fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let tmp = tmp_path(path);
    tokio::fs::write(&tmp, data).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

/// Temporary sibling path used before the atomic rename.
pub fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
