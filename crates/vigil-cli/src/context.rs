//! Shared command context: configuration plus the wired-up coordinators.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use vigil_backends::{build_connectors, BackendConnector};
use vigil_backup::{
    BackupCatalog, BackupCoordinator, ColdArchive, HttpColdArchive, IntegrityVerifier,
    RetentionPolicy,
};
use vigil_common::Result;
use vigil_config::PlatformConfig;
use vigil_deploy::{
    ComposeOrchestrator, DeploymentController, DeploymentHistory, OpsLock, Orchestrator,
    RestoreCoordinator,
};
use vigil_health::HealthProber;

pub struct OpsContext {
    pub config: PlatformConfig,
    pub backup: Arc<BackupCoordinator>,
    pub controller: DeploymentController,
    pub orchestrator: Arc<dyn Orchestrator>,
    pub prober: Arc<HealthProber>,
    pub catalog: BackupCatalog,
    pub connectors: Vec<Arc<dyn BackendConnector>>,
    pub verifier: IntegrityVerifier,
    pub history: DeploymentHistory,
    pub lock: OpsLock,
}

impl OpsContext {
    pub fn build(config_path: Option<&Path>) -> Result<Self> {
        let config = PlatformConfig::load(config_path)?;
        let connectors = build_connectors(&config.backends)?;
        let catalog = BackupCatalog::open(&config.backup.root_dir)?;
        let archive: Option<Arc<dyn ColdArchive>> = match &config.archive {
            Some(cfg) => Some(Arc::new(HttpColdArchive::new(cfg)?)),
            None => None,
        };
        let retention = RetentionPolicy {
            retention_days: config.backup.retention_days,
            minimum_sets: config.backup.minimum_sets,
            require_uploaded: config.archive.is_some(),
        };

        let prober = Arc::new(HealthProber::new(
            config.health.clone(),
            config.runtime.clone(),
            connectors.clone(),
        ));
        let backup = Arc::new(BackupCoordinator::new(
            connectors.clone(),
            catalog.clone(),
            archive,
            retention,
            config.backup.parallel_snapshots,
        ));
        let restore = Arc::new(RestoreCoordinator::new(
            catalog.clone(),
            connectors.clone(),
            prober.clone(),
        ));
        let orchestrator: Arc<dyn Orchestrator> =
            Arc::new(ComposeOrchestrator::new(config.runtime.clone()));
        let controller = DeploymentController::new(
            config.deploy.clone(),
            backup.clone(),
            restore,
            orchestrator.clone(),
            prober.clone(),
        );
        let history = DeploymentHistory::new(config.deploy.history_path.clone());
        let lock = OpsLock::new(
            config.deploy.lock_path.clone(),
            Duration::from_secs(config.deploy.lock_stale_secs),
        );

        Ok(Self {
            config,
            backup,
            controller,
            orchestrator,
            prober,
            catalog,
            connectors,
            verifier: IntegrityVerifier,
            history,
            lock,
        })
    }
}
