//! Health command.

use crate::{context::OpsContext, output, OutputFormat};
use clap::Parser;
use tabled::Tabled;
use vigil_common::{Error, Result};
use vigil_health::ProbeMode;

/// Which probe battery to run
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum ModeArg {
    /// Runtime and resource floors only
    Pre,
    /// Full battery including services, ports and backends
    Post,
}

/// Probe platform health
#[derive(Debug, Parser)]
pub struct HealthCommand {
    /// Probe battery
    #[arg(long, value_enum, default_value = "post")]
    mode: ModeArg,
}

#[derive(Tabled)]
struct CheckRow {
    #[tabled(rename = "")]
    status: String,
    #[tabled(rename = "Check")]
    name: String,
    #[tabled(rename = "Detail")]
    detail: String,
}

impl HealthCommand {
    pub async fn execute(&self, ctx: &OpsContext, format: OutputFormat) -> Result<()> {
        let mode = match self.mode {
            ModeArg::Pre => ProbeMode::PreDeploy,
            ModeArg::Post => ProbeMode::PostDeploy,
        };
        let report = ctx.prober.run(mode).await;

        match format {
            OutputFormat::Json => output::print_json(&report)?,
            OutputFormat::Table => {
                let rows: Vec<CheckRow> = report
                    .results
                    .iter()
                    .map(|r| CheckRow {
                        status: output::status_glyph(r.passed),
                        name: r.name.clone(),
                        detail: r.detail.clone(),
                    })
                    .collect();
                output::print_table(rows);
            }
        }

        if report.passed {
            output::print_success(&format!("{} probe passed", report.mode));
            Ok(())
        } else {
            Err(Error::Internal(format!(
                "{} probe failed: {}",
                report.mode,
                report.failed_checks().join(", ")
            )))
        }
    }
}
