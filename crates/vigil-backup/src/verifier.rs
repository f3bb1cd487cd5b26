//! Artifact integrity verification.
//!
//! Digest verification catches transport/storage corruption after the
//! artifact was taken; the connector smoke test additionally catches
//! corruption introduced before the digest existed (a silently failed
//! source export).

use crate::manifest::BackupManifest;
use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};
use vigil_backends::BackendConnector;
use vigil_common::{Artifact, BackendKind, Result};

/// Outcome of verifying one backup set.
#[derive(Debug, Clone, Default)]
pub struct VerificationReport {
    /// Kinds that failed, with the reason
    pub failures: Vec<(BackendKind, String)>,
}

impl VerificationReport {
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IntegrityVerifier;

impl IntegrityVerifier {
    /// Streaming SHA-256 of a file, as lowercase hex.
    pub async fn digest_file(&self, path: &Path) -> Result<String> {
        let mut file = tokio::fs::File::open(path).await?;
        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; 64 * 1024];
        loop {
            let n = file.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(hex_encode(&hasher.finalize()))
    }

    /// Recompute one artifact's digest and compare with the manifest entry.
    pub async fn verify_artifact(&self, set_dir: &Path, artifact: &Artifact) -> Result<bool> {
        let path = set_dir.join(&artifact.file_name);
        let actual = self.digest_file(&path).await?;
        if actual != artifact.sha256 {
            warn!(
                kind = %artifact.kind,
                file = %artifact.file_name,
                "digest mismatch: expected {}, got {}",
                artifact.sha256,
                actual
            );
            return Ok(false);
        }
        debug!(kind = %artifact.kind, "digest verified");
        Ok(true)
    }

    /// Verify every artifact of a set; optionally run the per-backend
    /// smoke tests too. Smoke failure is treated identically to a digest
    /// mismatch.
    pub async fn verify_set(
        &self,
        set_dir: &Path,
        manifest: &BackupManifest,
        connectors: &[std::sync::Arc<dyn BackendConnector>],
        smoke: bool,
    ) -> VerificationReport {
        let mut report = VerificationReport::default();
        for artifact in &manifest.artifacts {
            match self.verify_artifact(set_dir, artifact).await {
                Ok(true) => {}
                Ok(false) => {
                    report
                        .failures
                        .push((artifact.kind, "digest mismatch".to_string()));
                    continue;
                }
                Err(e) => {
                    report.failures.push((artifact.kind, e.to_string()));
                    continue;
                }
            }
            if smoke {
                let Some(connector) = connectors.iter().find(|c| c.kind() == artifact.kind) else {
                    continue;
                };
                let path = set_dir.join(&artifact.file_name);
                if let Err(e) = connector.smoke_test(&path).await {
                    warn!(kind = %artifact.kind, "smoke test failed: {}", e);
                    report.failures.push((artifact.kind, e.to_string()));
                }
            }
        }
        report
    }
}

fn hex_encode(data: &[u8]) -> String {
    data.iter().map(|byte| format!("{:02x}", byte)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn digest_is_stable_and_sensitive() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("artifact");
        tokio::fs::write(&path, b"contents").await.unwrap();

        let verifier = IntegrityVerifier;
        let first = verifier.digest_file(&path).await.unwrap();
        let second = verifier.digest_file(&path).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);

        tokio::fs::write(&path, b"Contents").await.unwrap();
        let changed = verifier.digest_file(&path).await.unwrap();
        assert_ne!(first, changed);
    }

    #[tokio::test]
    async fn single_byte_flip_fails_verification() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("db.dump");
        tokio::fs::write(&path, b"PGDMP-payload").await.unwrap();

        let verifier = IntegrityVerifier;
        let artifact = Artifact {
            kind: BackendKind::Relational,
            file_name: "db.dump".to_string(),
            size_bytes: 13,
            sha256: verifier.digest_file(&path).await.unwrap(),
        };
        assert!(verifier.verify_artifact(dir.path(), &artifact).await.unwrap());

        let mut data = tokio::fs::read(&path).await.unwrap();
        data[6] ^= 0x01;
        tokio::fs::write(&path, &data).await.unwrap();
        assert!(!verifier.verify_artifact(dir.path(), &artifact).await.unwrap());
    }
}
