//! The deployment controller.
//!
//! Drives one deployment attempt through the state machine:
//! idle, pre-checking, backing-up, applying, health-gating, ending
//! committed, rolled-back or aborted. A safety backup that cannot be
//! verified aborts the deployment before the platform is touched; a
//! failed post-deploy gate triggers an automatic rollback to that
//! backup.

use crate::history::{DeploymentHistory, DeploymentOutcome, DeploymentRecord};
use crate::lock::{LockGuard, OpsLock};
use crate::orchestrator::Orchestrator;
use crate::restore::{RestoreCoordinator, RestoreReport};
use crate::state::{transition, DeployState};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use vigil_backup::{BackupCoordinator, BackupOptions};
use vigil_common::{BackendKind, Result};
use vigil_config::DeploySettings;
use vigil_health::{HealthCheckResult, ProbeMode, Prober};

pub struct DeploymentController {
    settings: DeploySettings,
    backup: Arc<BackupCoordinator>,
    restore: Arc<RestoreCoordinator>,
    orchestrator: Arc<dyn Orchestrator>,
    prober: Arc<dyn Prober>,
    history: DeploymentHistory,
    lock: OpsLock,
}

impl DeploymentController {
    pub fn new(
        settings: DeploySettings,
        backup: Arc<BackupCoordinator>,
        restore: Arc<RestoreCoordinator>,
        orchestrator: Arc<dyn Orchestrator>,
        prober: Arc<dyn Prober>,
    ) -> Self {
        let history = DeploymentHistory::new(settings.history_path.clone());
        let lock = OpsLock::new(
            settings.lock_path.clone(),
            Duration::from_secs(settings.lock_stale_secs),
        );
        Self {
            settings,
            backup,
            restore,
            orchestrator,
            prober,
            history,
            lock,
        }
    }

    pub fn history(&self) -> &DeploymentHistory {
        &self.history
    }

    pub fn lock(&self) -> &OpsLock {
        &self.lock
    }

    /// Deploy `target_version`; returns the finalized history record.
    pub async fn deploy(&self, target_version: &str) -> Result<DeploymentRecord> {
        let guard = self.lock.acquire("deploy")?;
        let started_at = Utc::now();
        let mut record = DeploymentRecord {
            attempt_id: format!("deploy-{}", started_at.format("%Y%m%dT%H%M%S%.3f")),
            target_version: target_version.to_string(),
            previous_version: None,
            pre_deploy_backup_id: None,
            started_at,
            finished_at: None,
            outcome: None,
            health_checks: Vec::new(),
            manual_intervention_required: false,
        };
        self.history.append(&record)?;
        let mut state = DeployState::Idle;

        // Pre-flight: the platform is not touched unless it is healthy
        // enough to deploy onto.
        transition(&mut state, DeployState::PreChecking);
        let pre = self.prober.probe(ProbeMode::PreDeploy).await;
        record.health_checks.extend(pre.results.iter().cloned());
        if !pre.passed {
            warn!(
                "pre-deploy checks failed: {}",
                pre.failed_checks().join(", ")
            );
            return self.finalize(record, &mut state, DeploymentOutcome::Aborted, guard);
        }

        transition(&mut state, DeployState::BackingUp);
        record.previous_version = self.orchestrator.current_version().await?;
        let protected = self.history.in_flight_backup_ids()?;
        let options = BackupOptions {
            kinds: None,
            smoke_test: true,
            upload: false,
            platform_version: record.previous_version.clone(),
        };
        let backup = self.backup.create_backup_set(&options, &protected).await?;
        if !backup.succeeded() {
            error!(
                "safety backup {} is not restorable, aborting deployment",
                backup.manifest.id
            );
            for (kind, reason) in &backup.failures {
                record.health_checks.push(HealthCheckResult::new(
                    format!("backup:{}", kind),
                    false,
                    reason.clone(),
                ));
            }
            return self.finalize(record, &mut state, DeploymentOutcome::Aborted, guard);
        }
        record.pre_deploy_backup_id = Some(backup.manifest.id.clone());
        // Re-append so a crash from here on leaves the backup id on an
        // in-flight record, shielding the set from retention.
        self.history.append(&record)?;

        transition(&mut state, DeployState::Applying);
        let applied = self.orchestrator.apply_version(target_version).await;

        transition(&mut state, DeployState::HealthGating);
        let gate_passed = match applied {
            Ok(()) => {
                info!(
                    "waiting {}s for the platform to settle",
                    self.settings.settle_secs
                );
                tokio::time::sleep(Duration::from_secs(self.settings.settle_secs)).await;
                let gate = self.prober.probe(ProbeMode::PostDeploy).await;
                record.health_checks.extend(gate.results.iter().cloned());
                gate.passed
            }
            Err(e) => {
                error!("apply of {} failed: {}", target_version, e);
                record
                    .health_checks
                    .push(HealthCheckResult::new("apply", false, e.to_string()));
                false
            }
        };

        if gate_passed {
            info!("deployment of {} committed", target_version);
            return self.finalize(record, &mut state, DeploymentOutcome::Committed, guard);
        }

        warn!(
            "health gate failed, rolling back to backup {}",
            backup.manifest.id
        );
        let rollback_ok = self.roll_back(&mut record, &backup.manifest.id).await;
        let outcome = if rollback_ok {
            info!("platform rolled back to backup {}", backup.manifest.id);
            DeploymentOutcome::RolledBack
        } else {
            record.manual_intervention_required = true;
            error!(
                "rollback after failed deployment of {} did not restore a healthy platform; manual intervention required",
                target_version
            );
            DeploymentOutcome::Aborted
        };
        self.finalize(record, &mut state, outcome, guard)
    }

    /// Manual rollback to a chosen (or the most recent restorable)
    /// backup set, reverting the runtime to the version the set was
    /// taken under.
    pub async fn rollback(&self, to_backup: Option<&str>) -> Result<RestoreReport> {
        let guard = self.lock.acquire("rollback")?;
        let manifest = match to_backup {
            Some(id) => self.restore.catalog().load_manifest(id).await?,
            None => self.restore.catalog().latest_restorable().await?,
        };
        info!("rolling back to backup set {}", manifest.id);

        let mut report = self.restore.restore(&manifest.id, None).await?;
        match &manifest.platform_version {
            Some(version) => self.orchestrator.apply_version(version).await?,
            None => warn!(
                "backup set {} records no platform version; runtime left as is",
                manifest.id
            ),
        }
        report.probe = self.prober.probe(ProbeMode::PostDeploy).await;
        guard.release()?;
        Ok(report)
    }

    /// Selective restore under the ops lock. Defaults to the most
    /// recent restorable set when no id is given.
    pub async fn restore_scoped(
        &self,
        id: Option<&str>,
        kinds: Option<&[BackendKind]>,
    ) -> Result<RestoreReport> {
        let guard = self.lock.acquire("restore")?;
        let id = match id {
            Some(id) => id.to_string(),
            None => self.restore.catalog().latest_restorable().await?.id,
        };
        let report = self.restore.restore(&id, kinds).await?;
        guard.release()?;
        Ok(report)
    }

    /// Restore data from the safety backup, revert the runtime to the
    /// previous version, then re-gate. Returns whether the platform is
    /// demonstrably healthy again.
    async fn roll_back(&self, record: &mut DeploymentRecord, backup_id: &str) -> bool {
        let restore_ok = match self.restore.restore(backup_id, None).await {
            Ok(report) => {
                for (kind, reason) in &report.failed {
                    record.health_checks.push(HealthCheckResult::new(
                        format!("rollback-restore:{}", kind),
                        false,
                        reason.clone(),
                    ));
                }
                report.failed.is_empty()
            }
            Err(e) => {
                record
                    .health_checks
                    .push(HealthCheckResult::new("rollback-restore", false, e.to_string()));
                false
            }
        };

        let revert_ok = match &record.previous_version {
            Some(previous) => match self.orchestrator.apply_version(previous).await {
                Ok(()) => true,
                Err(e) => {
                    record.health_checks.push(HealthCheckResult::new(
                        "rollback-apply",
                        false,
                        e.to_string(),
                    ));
                    false
                }
            },
            // First-ever deployment: no previous version to revert to.
            None => true,
        };

        let probe = self.prober.probe(ProbeMode::PostDeploy).await;
        record.health_checks.extend(probe.results.iter().cloned());
        restore_ok && revert_ok && probe.passed
    }

    fn finalize(
        &self,
        mut record: DeploymentRecord,
        state: &mut DeployState,
        outcome: DeploymentOutcome,
        guard: LockGuard,
    ) -> Result<DeploymentRecord> {
        let terminal = match outcome {
            DeploymentOutcome::Committed => DeployState::Committed,
            DeploymentOutcome::RolledBack => DeployState::RolledBack,
            DeploymentOutcome::Aborted => DeployState::Aborted,
        };
        transition(state, terminal);
        record.outcome = Some(outcome);
        record.finished_at = Some(Utc::now());
        self.history.append(&record)?;
        guard.release()?;
        Ok(record)
    }
}
