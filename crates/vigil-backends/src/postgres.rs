//! PostgreSQL connector.
//!
//! Drives `pg_dump`/`pg_restore` for snapshot and restore; health is a
//! bounded TCP reachability check against the server port. Dumps use the
//! custom archive format, whose leading `PGDMP` magic doubles as the
//! smoke-test marker.

use crate::{net, tmp_path, BackendConnector};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};
use vigil_common::{BackendKind, Error, Result};
use vigil_config::RelationalConfig;

const DUMP_FILE: &str = "db.dump";
const PGDMP_MAGIC: &[u8] = b"PGDMP";

pub struct PostgresConnector {
    config: RelationalConfig,
    health_timeout: Duration,
}

impl PostgresConnector {
    pub fn new(config: RelationalConfig) -> Self {
        Self {
            config,
            health_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_health_timeout(mut self, timeout: Duration) -> Self {
        self.health_timeout = timeout;
        self
    }

    fn command(&self, program: &str) -> Command {
        let mut cmd = Command::new(program);
        cmd.arg("-h")
            .arg(&self.config.host)
            .arg("-p")
            .arg(self.config.port.to_string())
            .arg("-U")
            .arg(&self.config.user)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(password) = &self.config.password {
            cmd.env("PGPASSWORD", password);
        }
        cmd
    }

    async fn run(&self, mut cmd: Command, action: &str) -> Result<Vec<u8>> {
        let output = cmd.output().await.map_err(|e| Error::BackendUnreachable {
            kind: BackendKind::Relational,
            reason: format!("{} could not start: {}", action, e),
        })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(Error::SnapshotFailed {
                kind: BackendKind::Relational,
                reason: format!("{} exited with {}: {}", action, output.status, stderr),
            });
        }
        Ok(output.stdout)
    }

    /// Terminate other client sessions so restore gets exclusive access.
    async fn terminate_sessions(&self) -> Result<()> {
        let sql = format!(
            "SELECT pg_terminate_backend(pid) FROM pg_stat_activity \
             WHERE datname = '{}' AND pid <> pg_backend_pid();",
            self.config.database
        );
        let mut cmd = self.command("psql");
        cmd.arg("-d").arg(&self.config.database).arg("-c").arg(sql);
        self.run(cmd, "psql session termination").await?;
        Ok(())
    }
}

#[async_trait]
impl BackendConnector for PostgresConnector {
    fn kind(&self) -> BackendKind {
        BackendKind::Relational
    }

    async fn snapshot(&self, dest_dir: &Path) -> Result<PathBuf> {
        let final_path = dest_dir.join(DUMP_FILE);
        let tmp = tmp_path(&final_path);

        info!(database = %self.config.database, "dumping relational backend");
        let mut cmd = self.command("pg_dump");
        cmd.arg("--format=custom")
            .arg("--file")
            .arg(&tmp)
            .arg(&self.config.database);

        match self.run(cmd, "pg_dump").await {
            Ok(_) => {
                tokio::fs::rename(&tmp, &final_path).await?;
                Ok(final_path)
            }
            Err(e) => {
                // Never leave a half-written dump next to the manifest.
                let _ = tokio::fs::remove_file(&tmp).await;
                Err(e)
            }
        }
    }

    async fn restore(&self, artifact_path: &Path) -> Result<()> {
        info!(database = %self.config.database, artifact = %artifact_path.display(),
              "restoring relational backend");
        let mut cmd = self.command("pg_restore");
        cmd.arg("--clean")
            .arg("--if-exists")
            .arg("-d")
            .arg(&self.config.database)
            .arg(artifact_path);

        self.run(cmd, "pg_restore")
            .await
            .map_err(|e| match e {
                Error::SnapshotFailed { kind, reason } => Error::RestoreFailed { kind, reason },
                other => other,
            })?;
        Ok(())
    }

    async fn is_healthy(&self) -> bool {
        net::tcp_ping(&self.config.host, self.config.port, self.health_timeout).await
    }

    async fn quiesce(&self) -> Result<()> {
        debug!("terminating active database sessions");
        if let Err(e) = self.terminate_sessions().await {
            // Best effort: a failed quiesce degrades to a non-exclusive restore.
            warn!("session termination failed: {}", e);
        }
        Ok(())
    }

    async fn smoke_test(&self, artifact_path: &Path) -> Result<()> {
        use tokio::io::AsyncReadExt;
        let mut file = tokio::fs::File::open(artifact_path).await?;
        let mut magic = [0u8; 5];
        let n = file.read(&mut magic).await?;
        if n < PGDMP_MAGIC.len() || &magic[..PGDMP_MAGIC.len()] != PGDMP_MAGIC {
            return Err(Error::IntegrityFailure {
                item: artifact_path.display().to_string(),
                reason: "missing PGDMP header".to_string(),
            });
        }
        Ok(())
    }
}
