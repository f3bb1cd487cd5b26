//! Orchestration runtime seam.

use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::info;
use vigil_common::{Error, Result};
use vigil_config::RuntimeConfig;

/// The part of a deployment that actually moves the platform between
/// versions.
#[async_trait]
pub trait Orchestrator: Send + Sync {
    /// Version currently recorded as running, if known.
    async fn current_version(&self) -> Result<Option<String>>;

    /// Bring the platform up at `version`.
    async fn apply_version(&self, version: &str) -> Result<()>;
}

/// docker compose implementation. The target version reaches the
/// compose file through the `PLATFORM_VERSION` environment variable and
/// is recorded in the version file once the stack is up.
pub struct ComposeOrchestrator {
    runtime: RuntimeConfig,
}

impl ComposeOrchestrator {
    pub fn new(runtime: RuntimeConfig) -> Self {
        Self { runtime }
    }
}

#[async_trait]
impl Orchestrator for ComposeOrchestrator {
    async fn current_version(&self) -> Result<Option<String>> {
        match tokio::fs::read_to_string(&self.runtime.version_file).await {
            Ok(contents) => {
                let version = contents.trim().to_string();
                Ok((!version.is_empty()).then_some(version))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn apply_version(&self, version: &str) -> Result<()> {
        info!(version, "applying platform version");
        let output = Command::new(&self.runtime.docker_bin)
            .arg("compose")
            .arg("-f")
            .arg(&self.runtime.compose_file)
            .arg("-p")
            .arg(&self.runtime.project)
            .args(["up", "-d", "--remove-orphans"])
            .env("PLATFORM_VERSION", version)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;
        if !output.status.success() {
            return Err(Error::Orchestration(format!(
                "compose up for {} failed: {}",
                version,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        vigil_backends::write_atomic(&self.runtime.version_file, version.as_bytes()).await?;
        Ok(())
    }
}
