//! End-to-end deployment controller scenarios over mock backends.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use vigil_backends::BackendConnector;
use vigil_backup::{BackupCatalog, BackupCoordinator, RetentionPolicy};
use vigil_common::{BackendKind, Error, Result};
use vigil_config::DeploySettings;
use vigil_deploy::{
    DeploymentController, DeploymentOutcome, Orchestrator, RestoreCoordinator,
};
use vigil_health::{HealthCheckResult, ProbeMode, ProbeReport, Prober};

struct MockConnector {
    kind: BackendKind,
    snapshot_ok: bool,
    restores: AtomicUsize,
}

impl MockConnector {
    fn new(kind: BackendKind) -> Arc<Self> {
        Arc::new(Self {
            kind,
            snapshot_ok: true,
            restores: AtomicUsize::new(0),
        })
    }

    fn broken(kind: BackendKind) -> Arc<Self> {
        Arc::new(Self {
            kind,
            snapshot_ok: false,
            restores: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl BackendConnector for MockConnector {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    async fn snapshot(&self, dest_dir: &Path) -> Result<PathBuf> {
        if !self.snapshot_ok {
            return Err(Error::BackendUnreachable {
                kind: self.kind,
                reason: "connection refused".to_string(),
            });
        }
        let path = dest_dir.join(format!("{}.snap", self.kind));
        tokio::fs::write(&path, format!("payload-{}", self.kind)).await?;
        Ok(path)
    }

    async fn restore(&self, _artifact_path: &Path) -> Result<()> {
        self.restores.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn is_healthy(&self) -> bool {
        true
    }

    async fn smoke_test(&self, _artifact_path: &Path) -> Result<()> {
        Ok(())
    }
}

struct MockOrchestrator {
    current: Mutex<Option<String>>,
    applied: Mutex<Vec<String>>,
    apply_delay: Duration,
}

impl MockOrchestrator {
    fn new(current: Option<&str>) -> Arc<Self> {
        Arc::new(Self {
            current: Mutex::new(current.map(String::from)),
            applied: Mutex::new(Vec::new()),
            apply_delay: Duration::ZERO,
        })
    }

    fn slow(current: Option<&str>, apply_delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            current: Mutex::new(current.map(String::from)),
            applied: Mutex::new(Vec::new()),
            apply_delay,
        })
    }

    fn applied(&self) -> Vec<String> {
        self.applied.lock().unwrap().clone()
    }
}

#[async_trait]
impl Orchestrator for MockOrchestrator {
    async fn current_version(&self) -> Result<Option<String>> {
        Ok(self.current.lock().unwrap().clone())
    }

    async fn apply_version(&self, version: &str) -> Result<()> {
        tokio::time::sleep(self.apply_delay).await;
        self.applied.lock().unwrap().push(version.to_string());
        *self.current.lock().unwrap() = Some(version.to_string());
        Ok(())
    }
}

/// Prober whose next N post-deploy probes fail; everything else passes.
struct ScriptedProber {
    pre_deploy_passes: bool,
    post_deploy_failures: AtomicUsize,
}

impl ScriptedProber {
    fn passing() -> Arc<Self> {
        Arc::new(Self {
            pre_deploy_passes: true,
            post_deploy_failures: AtomicUsize::new(0),
        })
    }

    fn failing_gates(count: usize) -> Arc<Self> {
        Arc::new(Self {
            pre_deploy_passes: true,
            post_deploy_failures: AtomicUsize::new(count),
        })
    }

    fn failing_pre_deploy() -> Arc<Self> {
        Arc::new(Self {
            pre_deploy_passes: false,
            post_deploy_failures: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Prober for ScriptedProber {
    async fn probe(&self, mode: ProbeMode) -> ProbeReport {
        let passed = match mode {
            ProbeMode::PreDeploy => self.pre_deploy_passes,
            ProbeMode::PostDeploy => {
                if self.post_deploy_failures.load(Ordering::SeqCst) > 0 {
                    self.post_deploy_failures.fetch_sub(1, Ordering::SeqCst);
                    false
                } else {
                    true
                }
            }
        };
        ProbeReport::from_results(
            mode,
            vec![HealthCheckResult::new("scripted", passed, "scripted")],
        )
    }

    async fn probe_scoped(&self, _kinds: &[BackendKind]) -> ProbeReport {
        ProbeReport::from_results(
            ProbeMode::PostDeploy,
            vec![HealthCheckResult::new("scripted", true, "scripted")],
        )
    }
}

struct Harness {
    controller: DeploymentController,
    catalog: BackupCatalog,
    _dir: TempDir,
}

fn harness(
    connectors: Vec<Arc<dyn BackendConnector>>,
    orchestrator: Arc<dyn Orchestrator>,
    prober: Arc<dyn Prober>,
) -> Harness {
    let dir = TempDir::new().unwrap();
    let catalog = BackupCatalog::open(dir.path().join("backups")).unwrap();
    let backup = Arc::new(BackupCoordinator::new(
        connectors.clone(),
        catalog.clone(),
        None,
        RetentionPolicy::default(),
        2,
    ));
    let restore = Arc::new(RestoreCoordinator::new(
        catalog.clone(),
        connectors,
        prober.clone(),
    ));
    let settings = DeploySettings {
        settle_secs: 0,
        lock_path: dir.path().join("ops.lock"),
        history_path: dir.path().join("history.jsonl"),
        lock_stale_secs: 3600,
    };
    let controller =
        DeploymentController::new(settings, backup, restore, orchestrator, prober);
    Harness {
        controller,
        catalog,
        _dir: dir,
    }
}

#[tokio::test]
async fn healthy_deploy_commits() {
    let db = MockConnector::new(BackendKind::Relational);
    let search = MockConnector::new(BackendKind::SearchIndex);
    let orchestrator = MockOrchestrator::new(Some("2.0.0"));
    let h = harness(
        vec![db.clone(), search.clone()],
        orchestrator.clone(),
        ScriptedProber::passing(),
    );

    let record = h.controller.deploy("2.1.0").await.unwrap();
    assert_eq!(record.outcome, Some(DeploymentOutcome::Committed));
    assert_eq!(record.previous_version.as_deref(), Some("2.0.0"));
    assert_eq!(orchestrator.applied(), vec!["2.1.0"]);
    assert!(!record.manual_intervention_required);

    // The safety backup exists and is restorable.
    let backup_id = record.pre_deploy_backup_id.unwrap();
    let manifest = h.catalog.load_manifest(&backup_id).await.unwrap();
    assert!(manifest.is_restorable());
    assert_eq!(manifest.platform_version.as_deref(), Some("2.0.0"));

    // History carries the finalized record and the lock is free again.
    let last = h.controller.history().last_finished().unwrap().unwrap();
    assert_eq!(last.outcome, Some(DeploymentOutcome::Committed));
    assert!(h.controller.history().in_flight_backup_ids().unwrap().is_empty());
    h.controller.lock().acquire("test").unwrap().release().unwrap();
}

#[tokio::test]
async fn failed_gate_rolls_back_to_the_safety_backup() {
    let db = MockConnector::new(BackendKind::Relational);
    let search = MockConnector::new(BackendKind::SearchIndex);
    let orchestrator = MockOrchestrator::new(Some("2.0.0"));
    let h = harness(
        vec![db.clone(), search.clone()],
        orchestrator.clone(),
        ScriptedProber::failing_gates(1),
    );

    let record = h.controller.deploy("2.1.0").await.unwrap();
    assert_eq!(record.outcome, Some(DeploymentOutcome::RolledBack));
    assert!(!record.manual_intervention_required);

    // Target applied, then reverted to the previous version.
    assert_eq!(orchestrator.applied(), vec!["2.1.0", "2.0.0"]);

    // Every kind in the safety backup was restored.
    assert_eq!(db.restores.load(Ordering::SeqCst), 1);
    assert_eq!(search.restores.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unhealthy_rollback_requires_manual_intervention() {
    let db = MockConnector::new(BackendKind::Relational);
    let orchestrator = MockOrchestrator::new(Some("2.0.0"));
    // Gate fails and so does every probe after the rollback.
    let h = harness(
        vec![db],
        orchestrator.clone(),
        ScriptedProber::failing_gates(10),
    );

    let record = h.controller.deploy("2.1.0").await.unwrap();
    assert_eq!(record.outcome, Some(DeploymentOutcome::Aborted));
    assert!(record.manual_intervention_required);
}

#[tokio::test]
async fn unrestorable_backup_aborts_before_the_platform_is_touched() {
    let db = MockConnector::new(BackendKind::Relational);
    let search = MockConnector::broken(BackendKind::SearchIndex);
    let orchestrator = MockOrchestrator::new(Some("2.0.0"));
    let h = harness(
        vec![db, search],
        orchestrator.clone(),
        ScriptedProber::passing(),
    );

    let record = h.controller.deploy("2.1.0").await.unwrap();
    assert_eq!(record.outcome, Some(DeploymentOutcome::Aborted));
    assert!(orchestrator.applied().is_empty());
}

#[tokio::test]
async fn failed_pre_checks_abort_without_side_effects() {
    let db = MockConnector::new(BackendKind::Relational);
    let orchestrator = MockOrchestrator::new(Some("2.0.0"));
    let h = harness(
        vec![db],
        orchestrator.clone(),
        ScriptedProber::failing_pre_deploy(),
    );

    let record = h.controller.deploy("2.1.0").await.unwrap();
    assert_eq!(record.outcome, Some(DeploymentOutcome::Aborted));
    assert!(record.pre_deploy_backup_id.is_none());
    assert!(orchestrator.applied().is_empty());
    assert!(h.catalog.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn concurrent_deploys_are_mutually_exclusive() {
    let db = MockConnector::new(BackendKind::Relational);
    let orchestrator = MockOrchestrator::slow(Some("2.0.0"), Duration::from_millis(100));
    let h = harness(vec![db], orchestrator, ScriptedProber::passing());

    let (first, second) =
        tokio::join!(h.controller.deploy("2.1.0"), h.controller.deploy("2.2.0"));

    // The first future acquires the lock before its first await point,
    // so the second must be refused while it runs.
    let record = first.unwrap();
    assert_eq!(record.outcome, Some(DeploymentOutcome::Committed));
    match second {
        Err(Error::Busy(_)) => {}
        other => panic!("expected Busy, got {:?}", other),
    }
}

#[tokio::test]
async fn manual_rollback_reverts_to_the_backup_version() {
    let db = MockConnector::new(BackendKind::Relational);
    let orchestrator = MockOrchestrator::new(Some("2.0.0"));
    let h = harness(
        vec![db.clone()],
        orchestrator.clone(),
        ScriptedProber::passing(),
    );

    // Commit a deployment of 2.1.0 first, leaving a backup taken at 2.0.0.
    let record = h.controller.deploy("2.1.0").await.unwrap();
    let backup_id = record.pre_deploy_backup_id.unwrap();

    let report = h.controller.rollback(Some(&backup_id)).await.unwrap();
    assert!(report.succeeded());
    assert_eq!(db.restores.load(Ordering::SeqCst), 1);
    assert_eq!(orchestrator.applied(), vec!["2.1.0", "2.0.0"]);
}

#[tokio::test]
async fn scoped_restore_touches_only_the_requested_kind() {
    let db = MockConnector::new(BackendKind::Relational);
    let search = MockConnector::new(BackendKind::SearchIndex);
    let orchestrator = MockOrchestrator::new(Some("2.0.0"));
    let h = harness(
        vec![db.clone(), search.clone()],
        orchestrator,
        ScriptedProber::passing(),
    );

    let record = h.controller.deploy("2.1.0").await.unwrap();
    let backup_id = record.pre_deploy_backup_id.unwrap();

    let report = h
        .controller
        .restore_scoped(Some(&backup_id), Some(&[BackendKind::SearchIndex]))
        .await
        .unwrap();
    assert_eq!(report.restored, vec![BackendKind::SearchIndex]);
    assert_eq!(db.restores.load(Ordering::SeqCst), 0);
    assert_eq!(search.restores.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn restore_refuses_an_unverified_set() {
    let db = MockConnector::new(BackendKind::Relational);
    let orchestrator = MockOrchestrator::new(Some("2.0.0"));
    let h = harness(vec![db], orchestrator, ScriptedProber::failing_gates(10));

    // An aborted deploy leaves a backup set behind; corrupt its artifact
    // so pre-restore verification rejects it.
    let record = h.controller.deploy("2.1.0").await.unwrap();
    let backup_id = record.pre_deploy_backup_id.unwrap();
    let artifact = h.catalog.set_dir(&backup_id).join("db.snap");
    tokio::fs::write(&artifact, b"tampered").await.unwrap();

    match h.controller.restore_scoped(Some(&backup_id), None).await {
        Err(Error::IntegrityFailure { .. }) => {}
        other => panic!("expected IntegrityFailure, got {:?}", other.map(|_| ())),
    }
    // The set is now marked failed and never offered again.
    let manifest = h.catalog.load_manifest(&backup_id).await.unwrap();
    assert!(!manifest.is_restorable());
}
