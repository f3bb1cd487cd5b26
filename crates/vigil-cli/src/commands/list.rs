//! Catalog listing command.

use crate::{context::OpsContext, output, OutputFormat};
use clap::Parser;
use tabled::Tabled;
use vigil_common::Result;

/// List backup sets, newest first
#[derive(Debug, Parser)]
pub struct ListCommand {
    /// Only show sets that can be restored from
    #[arg(long)]
    restorable: bool,
}

#[derive(Tabled)]
struct SetRow {
    #[tabled(rename = "Id")]
    id: String,
    #[tabled(rename = "Created")]
    created: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "Artifacts")]
    artifacts: usize,
    #[tabled(rename = "Size (MB)")]
    size_mb: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Uploaded")]
    uploaded: String,
}

impl ListCommand {
    pub async fn execute(&self, ctx: &OpsContext, format: OutputFormat) -> Result<()> {
        let mut sets = ctx.catalog.list().await?;
        if self.restorable {
            sets.retain(|m| m.is_restorable());
        }

        match format {
            OutputFormat::Json => output::print_json(&sets)?,
            OutputFormat::Table => {
                let rows: Vec<SetRow> = sets
                    .iter()
                    .map(|m| SetRow {
                        id: m.id.clone(),
                        created: m.created_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
                        version: m.platform_version.clone().unwrap_or_else(|| "-".into()),
                        artifacts: m.artifacts.len(),
                        size_mb: format!("{:.1}", m.total_size() as f64 / 1_048_576.0),
                        status: if m.is_restorable() {
                            "restorable".to_string()
                        } else {
                            format!(
                                "failed ({})",
                                m.failed_kinds
                                    .iter()
                                    .map(|k| k.to_string())
                                    .collect::<Vec<_>>()
                                    .join(", ")
                            )
                        },
                        uploaded: if m.uploaded { "yes".into() } else { "no".into() },
                    })
                    .collect();
                output::print_table(rows);
            }
        }
        Ok(())
    }
}
