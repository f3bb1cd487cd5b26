//! Probe report types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which battery of checks to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProbeMode {
    /// Orchestration runtime + resource floors only; the target version
    /// is not running yet.
    PreDeploy,
    /// Full battery.
    PostDeploy,
}

impl fmt::Display for ProbeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeMode::PreDeploy => f.write_str("pre-deploy"),
            ProbeMode::PostDeploy => f.write_str("post-deploy"),
        }
    }
}

/// Outcome of a single check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub name: String,
    pub passed: bool,
    pub detail: String,
    pub timestamp: DateTime<Utc>,
}

impl HealthCheckResult {
    pub fn new(name: impl Into<String>, passed: bool, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed,
            detail: detail.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Joined verdict of one probe run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeReport {
    pub mode: ProbeMode,
    pub passed: bool,
    pub results: Vec<HealthCheckResult>,
    pub finished_at: DateTime<Utc>,
}

impl ProbeReport {
    pub fn from_results(mode: ProbeMode, results: Vec<HealthCheckResult>) -> Self {
        Self {
            mode,
            passed: results.iter().all(|r| r.passed),
            results,
            finished_at: Utc::now(),
        }
    }

    /// Names of the checks that failed.
    pub fn failed_checks(&self) -> Vec<&str> {
        self.results
            .iter()
            .filter(|r| !r.passed)
            .map(|r| r.name.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_failing_check_fails_the_report() {
        let report = ProbeReport::from_results(
            ProbeMode::PostDeploy,
            vec![
                HealthCheckResult::new("runtime", true, "ok"),
                HealthCheckResult::new("port:web", false, "connection refused"),
                HealthCheckResult::new("disk", true, "34.0% used"),
            ],
        );
        assert!(!report.passed);
        assert_eq!(report.failed_checks(), vec!["port:web"]);
    }
}
