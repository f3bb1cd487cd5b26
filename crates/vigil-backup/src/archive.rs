//! Cold-archive upload.
//!
//! A backup set is only marked `uploaded` after the remote store confirms
//! receipt of the manifest, not merely after the transfer calls return.

use crate::manifest::{BackupManifest, MANIFEST_FILE};
use async_trait::async_trait;
use reqwest::Client;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};
use vigil_common::{Error, Result};
use vigil_config::ArchiveConfig;

/// Remote, durable off-site storage for backup sets.
#[async_trait]
pub trait ColdArchive: Send + Sync {
    /// Push every file of a set to the archive.
    async fn store_set(&self, set_dir: &Path, manifest: &BackupManifest) -> Result<()>;

    /// Whether the archive confirms holding the set's manifest.
    async fn confirm(&self, id: &str) -> Result<bool>;
}

/// HTTP cold archive (PUT per file, GET manifest as the receipt).
pub struct HttpColdArchive {
    client: Client,
    endpoint: String,
    token: Option<String>,
}

impl HttpColdArchive {
    pub fn new(config: &ArchiveConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| Error::Internal(format!("http client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    fn auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn object_url(&self, id: &str, file: &str) -> String {
        format!("{}/sets/{}/{}", self.endpoint, id, file)
    }
}

#[async_trait]
impl ColdArchive for HttpColdArchive {
    async fn store_set(&self, set_dir: &Path, manifest: &BackupManifest) -> Result<()> {
        // Artifacts first; the manifest last, so a confirmed manifest
        // implies the artifacts were accepted before it.
        for artifact in &manifest.artifacts {
            let data = tokio::fs::read(set_dir.join(&artifact.file_name)).await?;
            debug!(file = %artifact.file_name, "uploading artifact to cold archive");
            let request = self
                .client
                .put(self.object_url(&manifest.id, &artifact.file_name))
                .body(data);
            let response = self
                .auth(request)
                .send()
                .await
                .map_err(|e| Error::Internal(format!("archive upload: {}", e)))?;
            if !response.status().is_success() {
                return Err(Error::Internal(format!(
                    "archive rejected {}: {}",
                    artifact.file_name,
                    response.status()
                )));
            }
        }

        let manifest_data = serde_json::to_vec_pretty(manifest)?;
        let request = self
            .client
            .put(self.object_url(&manifest.id, MANIFEST_FILE))
            .body(manifest_data);
        let response = self
            .auth(request)
            .send()
            .await
            .map_err(|e| Error::Internal(format!("archive upload: {}", e)))?;
        if !response.status().is_success() {
            return Err(Error::Internal(format!(
                "archive rejected manifest: {}",
                response.status()
            )));
        }
        info!("backup set {} transferred to cold archive", manifest.id);
        Ok(())
    }

    async fn confirm(&self, id: &str) -> Result<bool> {
        let request = self.client.get(self.object_url(id, MANIFEST_FILE));
        let response = self
            .auth(request)
            .send()
            .await
            .map_err(|e| Error::Internal(format!("archive receipt check: {}", e)))?;
        Ok(response.status().is_success())
    }
}
