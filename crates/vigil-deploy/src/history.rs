//! Append-only deployment history.
//!
//! One JSON line per event. A record is appended when an attempt starts
//! (no outcome yet) and appended again as it progresses and finishes;
//! readers keep the last line per attempt. The log is never rewritten
//! in place, so a crash mid-deployment leaves an in-flight record
//! behind as evidence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::io::Write;
use std::path::PathBuf;
use tracing::warn;
use vigil_common::Result;
use vigil_health::HealthCheckResult;

/// Terminal outcome of a deployment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeploymentOutcome {
    Committed,
    RolledBack,
    Aborted,
}

impl fmt::Display for DeploymentOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeploymentOutcome::Committed => f.write_str("committed"),
            DeploymentOutcome::RolledBack => f.write_str("rolled-back"),
            DeploymentOutcome::Aborted => f.write_str("aborted"),
        }
    }
}

/// Everything recorded about one deployment attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub attempt_id: String,
    pub target_version: String,
    pub previous_version: Option<String>,
    /// Safety backup taken before the apply, once it exists
    pub pre_deploy_backup_id: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// `None` while the attempt is still in flight
    pub outcome: Option<DeploymentOutcome>,
    pub health_checks: Vec<HealthCheckResult>,
    /// Set when an automatic rollback also failed to produce a healthy
    /// platform
    pub manual_intervention_required: bool,
}

impl DeploymentRecord {
    pub fn in_flight(&self) -> bool {
        self.outcome.is_none()
    }
}

/// The JSONL history file.
#[derive(Debug, Clone)]
pub struct DeploymentHistory {
    path: PathBuf,
}

impl DeploymentHistory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Append one record as a JSON line.
    pub fn append(&self, record: &DeploymentRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(&line)?;
        file.sync_all()?;
        Ok(())
    }

    /// Latest state of every attempt, in first-seen order. Malformed
    /// lines are reported and skipped.
    pub fn load(&self) -> Result<Vec<DeploymentRecord>> {
        let data = match std::fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut latest: HashMap<String, DeploymentRecord> = HashMap::new();
        let mut order: Vec<String> = Vec::new();
        for (number, line) in data.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<DeploymentRecord>(line) {
                Ok(record) => {
                    if !latest.contains_key(&record.attempt_id) {
                        order.push(record.attempt_id.clone());
                    }
                    latest.insert(record.attempt_id.clone(), record);
                }
                Err(e) => warn!("skipping malformed history line {}: {}", number + 1, e),
            }
        }
        Ok(order
            .into_iter()
            .filter_map(|id| latest.remove(&id))
            .collect())
    }

    /// Backup sets referenced by attempts that never finished. A deploy
    /// that crashed mid-flight must not have its safety backup pruned
    /// out from under a manual recovery.
    pub fn in_flight_backup_ids(&self) -> Result<HashSet<String>> {
        Ok(self
            .load()?
            .into_iter()
            .filter(DeploymentRecord::in_flight)
            .filter_map(|r| r.pre_deploy_backup_id)
            .collect())
    }

    /// The most recently finished attempt, if any.
    pub fn last_finished(&self) -> Result<Option<DeploymentRecord>> {
        Ok(self
            .load()?
            .into_iter()
            .rev()
            .find(|r| !r.in_flight()))
    }
}
