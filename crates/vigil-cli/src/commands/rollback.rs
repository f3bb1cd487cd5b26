//! Rollback command.

use crate::{context::OpsContext, output, OutputFormat};
use clap::Parser;
use vigil_common::{Error, Result};

/// Roll back data and runtime to a backup set
#[derive(Debug, Parser)]
pub struct RollbackCommand {
    /// Backup set id; the most recent restorable set by default
    #[arg(long)]
    to_backup: Option<String>,
}

impl RollbackCommand {
    pub async fn execute(&self, ctx: &OpsContext, format: OutputFormat) -> Result<()> {
        let report = ctx.controller.rollback(self.to_backup.as_deref()).await?;

        match format {
            OutputFormat::Json => output::print_json(&report)?,
            OutputFormat::Table => {
                for (kind, reason) in &report.failed {
                    output::print_error(&format!("{}: {}", kind, reason));
                }
                for check in report.probe.results.iter().filter(|c| !c.passed) {
                    output::print_warning(&format!("{}: {}", check.name, check.detail));
                }
            }
        }

        if report.succeeded() {
            output::print_success(&format!("rolled back to backup set {}", report.backup_id));
            Ok(())
        } else {
            Err(Error::Orchestration(format!(
                "rollback to {} did not produce a healthy platform",
                report.backup_id
            )))
        }
    }
}
