//! Deploy command.

use crate::{context::OpsContext, output, OutputFormat};
use clap::Parser;
use vigil_common::{Error, Result};
use vigil_deploy::DeploymentOutcome;

/// Deploy a platform version behind backup and health gates
#[derive(Debug, Parser)]
pub struct DeployCommand {
    /// Target platform version
    #[arg(long)]
    version: String,
}

impl DeployCommand {
    pub async fn execute(&self, ctx: &OpsContext, format: OutputFormat) -> Result<()> {
        let record = ctx.controller.deploy(&self.version).await?;

        match format {
            OutputFormat::Json => output::print_json(&record)?,
            OutputFormat::Table => {
                for check in record.health_checks.iter().filter(|c| !c.passed) {
                    output::print_warning(&format!("{}: {}", check.name, check.detail));
                }
                if let Some(id) = &record.pre_deploy_backup_id {
                    output::print_info(&format!("safety backup: {}", id));
                }
            }
        }

        match record.outcome {
            Some(DeploymentOutcome::Committed) => {
                output::print_success(&format!("deployed {}", self.version));
                Ok(())
            }
            Some(DeploymentOutcome::RolledBack) => Err(Error::Orchestration(format!(
                "deployment of {} failed its health gate; platform rolled back to {}",
                self.version,
                record.previous_version.as_deref().unwrap_or("the safety backup")
            ))),
            _ if record.manual_intervention_required => Err(Error::Orchestration(format!(
                "deployment of {} failed and rollback did not recover a healthy platform; manual intervention required",
                self.version
            ))),
            _ => Err(Error::Orchestration(format!(
                "deployment of {} aborted before the platform was touched",
                self.version
            ))),
        }
    }
}
