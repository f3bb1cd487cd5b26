//! Restore command.

use crate::{context::OpsContext, output, OutputFormat};
use clap::Parser;
use vigil_common::{Error, Result};

/// Restore backends from a backup set
#[derive(Debug, Parser)]
pub struct RestoreCommand {
    /// Backup set id; the most recent restorable set by default
    #[arg(long)]
    backup: Option<String>,

    /// Comma-separated backend scope (db,search,config,logs); the whole
    /// set by default
    #[arg(long)]
    scope: Option<String>,
}

impl RestoreCommand {
    pub async fn execute(&self, ctx: &OpsContext, format: OutputFormat) -> Result<()> {
        let kinds = super::parse_scope_arg(self.scope.as_deref())?;
        let report = ctx
            .controller
            .restore_scoped(self.backup.as_deref(), kinds.as_deref())
            .await?;

        match format {
            OutputFormat::Json => output::print_json(&report)?,
            OutputFormat::Table => {
                for kind in &report.restored {
                    output::print_success(&format!("{} restored", kind));
                }
                for (kind, reason) in &report.failed {
                    output::print_error(&format!("{}: {}", kind, reason));
                }
                for check in report.probe.results.iter().filter(|c| !c.passed) {
                    output::print_warning(&format!("{}: {}", check.name, check.detail));
                }
            }
        }

        if report.succeeded() {
            output::print_success(&format!(
                "restore from backup set {} complete",
                report.backup_id
            ));
            Ok(())
        } else {
            Err(Error::Orchestration(format!(
                "restore from {} finished with failures",
                report.backup_id
            )))
        }
    }
}
