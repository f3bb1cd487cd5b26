//! Battery composition tests for the health prober.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use vigil_backends::BackendConnector;
use vigil_common::{BackendKind, Result};
use vigil_config::{HealthSettings, RuntimeConfig};
use vigil_health::{HealthProber, ProbeMode};

struct StaticConnector {
    kind: BackendKind,
    healthy: bool,
}

#[async_trait]
impl BackendConnector for StaticConnector {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    async fn snapshot(&self, _dest_dir: &Path) -> Result<PathBuf> {
        unimplemented!("not exercised by probe tests")
    }

    async fn restore(&self, _artifact_path: &Path) -> Result<()> {
        Ok(())
    }

    async fn is_healthy(&self) -> bool {
        self.healthy
    }

    async fn smoke_test(&self, _artifact_path: &Path) -> Result<()> {
        Ok(())
    }
}

fn prober(connectors: Vec<Arc<dyn BackendConnector>>) -> HealthProber {
    HealthProber::new(HealthSettings::default(), RuntimeConfig::default(), connectors)
}

#[tokio::test]
async fn pre_deploy_mode_skips_backend_checks() {
    let prober = prober(vec![Arc::new(StaticConnector {
        kind: BackendKind::Relational,
        healthy: false,
    })]);

    let report = prober.run(ProbeMode::PreDeploy).await;
    let names: Vec<&str> = report.results.iter().map(|r| r.name.as_str()).collect();
    assert!(names.contains(&"runtime"));
    assert!(names.contains(&"disk"));
    assert!(names.contains(&"memory"));
    assert!(!names.iter().any(|n| n.starts_with("backend:")));
}

#[tokio::test]
async fn post_deploy_mode_probes_every_backend_without_short_circuit() {
    let prober = prober(vec![
        Arc::new(StaticConnector {
            kind: BackendKind::Relational,
            healthy: false,
        }),
        Arc::new(StaticConnector {
            kind: BackendKind::SearchIndex,
            healthy: true,
        }),
    ]);

    let report = prober.run(ProbeMode::PostDeploy).await;
    assert!(!report.passed);

    // Both backend checks ran even though the first one failed.
    let db = report.results.iter().find(|r| r.name == "backend:db").unwrap();
    let search = report
        .results
        .iter()
        .find(|r| r.name == "backend:search")
        .unwrap();
    assert!(!db.passed);
    assert!(search.passed);
}

#[tokio::test]
async fn scoped_probe_restricts_backend_checks_to_scope() {
    let prober = prober(vec![
        Arc::new(StaticConnector {
            kind: BackendKind::Relational,
            healthy: true,
        }),
        Arc::new(StaticConnector {
            kind: BackendKind::SearchIndex,
            healthy: true,
        }),
    ]);

    let report = prober.run_scoped(&[BackendKind::Relational]).await;
    let names: Vec<&str> = report.results.iter().map(|r| r.name.as_str()).collect();
    assert!(names.contains(&"backend:db"));
    assert!(!names.contains(&"backend:search"));
    // Global checks still present.
    assert!(names.contains(&"runtime"));
}
