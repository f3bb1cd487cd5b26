//! Backup command.

use crate::{context::OpsContext, output, OutputFormat};
use clap::Parser;
use tabled::Tabled;
use vigil_backup::BackupOptions;
use vigil_common::{Error, Result};

/// Create a verified backup set
#[derive(Debug, Parser)]
pub struct BackupCommand {
    /// Comma-separated backend scope (db,search,config,logs); all by default
    #[arg(long)]
    scope: Option<String>,

    /// Additionally smoke-test every artifact
    #[arg(long)]
    verify: bool,

    /// Upload the set to the cold archive after verification
    #[arg(long)]
    upload: bool,
}

#[derive(Tabled)]
struct ArtifactRow {
    #[tabled(rename = "Backend")]
    backend: String,
    #[tabled(rename = "File")]
    file: String,
    #[tabled(rename = "Size (bytes)")]
    size: u64,
    #[tabled(rename = "SHA-256")]
    sha256: String,
}

impl BackupCommand {
    pub async fn execute(&self, ctx: &OpsContext, format: OutputFormat) -> Result<()> {
        let kinds = super::parse_scope_arg(self.scope.as_deref())?;

        // Catalog writes share the ops lock with deploy/restore runs.
        let guard = ctx.lock.acquire("backup")?;
        let protected = ctx.history.in_flight_backup_ids()?;
        let options = BackupOptions {
            kinds,
            smoke_test: self.verify,
            upload: self.upload,
            platform_version: ctx.orchestrator.current_version().await?,
        };
        let outcome = ctx.backup.create_backup_set(&options, &protected).await?;
        guard.release()?;

        match format {
            OutputFormat::Json => {
                output::print_json(&serde_json::json!({
                    "manifest": outcome.manifest,
                    "failures": outcome.failures,
                    "pruned": outcome.pruned.deleted,
                }))?;
            }
            OutputFormat::Table => {
                let rows: Vec<ArtifactRow> = outcome
                    .manifest
                    .artifacts
                    .iter()
                    .map(|a| ArtifactRow {
                        backend: a.kind.to_string(),
                        file: a.file_name.clone(),
                        size: a.size_bytes,
                        sha256: a.sha256[..12].to_string(),
                    })
                    .collect();
                output::print_table(rows);
                for (kind, reason) in &outcome.failures {
                    output::print_error(&format!("{}: {}", kind, reason));
                }
                if !outcome.pruned.deleted.is_empty() {
                    output::print_info(&format!(
                        "retention pruned {} set(s): {}",
                        outcome.pruned.deleted.len(),
                        outcome.pruned.deleted.join(", ")
                    ));
                }
                if outcome.manifest.uploaded {
                    output::print_info("cold archive confirmed receipt");
                }
            }
        }

        if outcome.succeeded() {
            output::print_success(&format!("backup set {} is restorable", outcome.manifest.id));
            Ok(())
        } else {
            Err(Error::IntegrityFailure {
                item: format!("backup set {}", outcome.manifest.id),
                reason: format!("{} backend(s) failed", outcome.failures.len()),
            })
        }
    }
}
