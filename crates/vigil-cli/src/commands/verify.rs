//! On-demand backup set verification.

use crate::{context::OpsContext, output, OutputFormat};
use clap::Parser;
use tabled::Tabled;
use vigil_common::{Error, Result};

/// Re-verify a backup set against its manifest
#[derive(Debug, Parser)]
pub struct VerifyCommand {
    /// Backup set id; the most recent restorable set by default
    #[arg(long)]
    backup: Option<String>,

    /// Additionally run the per-backend smoke tests
    #[arg(long)]
    smoke: bool,
}

#[derive(Tabled)]
struct VerifyRow {
    #[tabled(rename = "")]
    status: String,
    #[tabled(rename = "Backend")]
    backend: String,
    #[tabled(rename = "Detail")]
    detail: String,
}

impl VerifyCommand {
    pub async fn execute(&self, ctx: &OpsContext, format: OutputFormat) -> Result<()> {
        // May rewrite the manifest, so it shares the ops lock.
        let guard = ctx.lock.acquire("verify")?;
        let mut manifest = match &self.backup {
            Some(id) => ctx.catalog.load_manifest(id).await?,
            None => ctx.catalog.latest_restorable().await?,
        };
        let set_dir = ctx.catalog.set_dir(&manifest.id);
        let report = ctx
            .verifier
            .verify_set(&set_dir, &manifest, &ctx.connectors, self.smoke)
            .await;

        // A set that no longer verifies is withdrawn from the catalog's
        // restorable candidates.
        if !report.passed() {
            manifest.verified = false;
            for (kind, _) in &report.failures {
                if !manifest.failed_kinds.contains(kind) {
                    manifest.failed_kinds.push(*kind);
                }
            }
            ctx.catalog.save_manifest(&manifest).await?;
        }
        guard.release()?;

        match format {
            OutputFormat::Json => output::print_json(&serde_json::json!({
                "backup_id": manifest.id,
                "passed": report.passed(),
                "failures": report.failures,
            }))?,
            OutputFormat::Table => {
                let rows: Vec<VerifyRow> = manifest
                    .artifacts
                    .iter()
                    .map(|a| {
                        let failure = report.failures.iter().find(|(k, _)| *k == a.kind);
                        VerifyRow {
                            status: output::status_glyph(failure.is_none()),
                            backend: a.kind.to_string(),
                            detail: match failure {
                                Some((_, reason)) => reason.clone(),
                                None => "verified".to_string(),
                            },
                        }
                    })
                    .collect();
                output::print_table(rows);
            }
        }

        if report.passed() {
            output::print_success(&format!("backup set {} verified", manifest.id));
            Ok(())
        } else {
            Err(Error::IntegrityFailure {
                item: format!("backup set {}", manifest.id),
                reason: format!("{} artifact(s) failed verification", report.failures.len()),
            })
        }
    }
}
