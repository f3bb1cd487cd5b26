//! The health prober.

use crate::report::{HealthCheckResult, ProbeMode, ProbeReport};
use crate::resources;
use futures::future::{BoxFuture, FutureExt};
use std::future::Future;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};
use vigil_backends::{net, BackendConnector};
use vigil_common::BackendKind;
use vigil_config::{HealthSettings, RuntimeConfig};

pub struct HealthProber {
    settings: HealthSettings,
    runtime: RuntimeConfig,
    connectors: Vec<Arc<dyn BackendConnector>>,
}

impl HealthProber {
    pub fn new(
        settings: HealthSettings,
        runtime: RuntimeConfig,
        connectors: Vec<Arc<dyn BackendConnector>>,
    ) -> Self {
        Self {
            settings,
            runtime,
            connectors,
        }
    }

    fn check_timeout(&self) -> Duration {
        Duration::from_secs(self.settings.check_timeout_secs)
    }

    /// Run the battery for the given mode.
    pub async fn run(&self, mode: ProbeMode) -> ProbeReport {
        let kinds: Vec<BackendKind> = self.connectors.iter().map(|c| c.kind()).collect();
        self.run_battery(mode, &kinds).await
    }

    /// Post-restore probe: global checks plus the restored kinds only.
    pub async fn run_scoped(&self, kinds: &[BackendKind]) -> ProbeReport {
        self.run_battery(ProbeMode::PostDeploy, kinds).await
    }

    async fn run_battery(&self, mode: ProbeMode, kinds: &[BackendKind]) -> ProbeReport {
        let limit = self.check_timeout();
        let mut checks: Vec<BoxFuture<'_, HealthCheckResult>> = Vec::new();

        checks.push(timed("runtime", limit, self.runtime_reachable()).boxed());
        checks.push(timed("disk", limit, self.disk_headroom()).boxed());
        checks.push(timed("memory", limit, self.memory_headroom()).boxed());

        if mode == ProbeMode::PostDeploy {
            for service in &self.runtime.expected_services {
                checks.push(
                    timed(
                        format!("service:{}", service),
                        limit,
                        self.service_running(service),
                    )
                    .boxed(),
                );
            }
            for port in &self.settings.service_ports {
                checks.push(
                    timed(format!("port:{}", port.name), limit, self.port_open(port)).boxed(),
                );
            }
            for connector in &self.connectors {
                let kind = connector.kind();
                if !kinds.contains(&kind) {
                    continue;
                }
                checks.push(
                    timed(format!("backend:{}", kind), limit, async move {
                        if connector.is_healthy().await {
                            (true, "responding".to_string())
                        } else {
                            (false, "unreachable or unhealthy".to_string())
                        }
                    })
                    .boxed(),
                );
            }
        }

        debug!(mode = %mode, checks = checks.len(), "running health battery");
        // All checks run to completion; no short-circuit on first failure.
        let results = futures::future::join_all(checks).await;
        let report = ProbeReport::from_results(mode, results);

        if report.passed {
            info!(mode = %mode, "health probe passed");
        } else {
            warn!(
                mode = %mode,
                "health probe failed: {}",
                report.failed_checks().join(", ")
            );
        }
        report
    }

    /// Orchestration runtime reachable (`docker info`).
    async fn runtime_reachable(&self) -> (bool, String) {
        let output = Command::new(&self.runtime.docker_bin)
            .args(["info", "--format", "{{.ServerVersion}}"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await;
        match output {
            Ok(out) if out.status.success() => {
                let version = String::from_utf8_lossy(&out.stdout).trim().to_string();
                (true, format!("runtime {}", version))
            }
            Ok(out) => (
                false,
                String::from_utf8_lossy(&out.stderr).trim().to_string(),
            ),
            Err(e) => (false, e.to_string()),
        }
    }

    /// Expected service running under compose.
    async fn service_running(&self, service: &str) -> (bool, String) {
        let output = Command::new(&self.runtime.docker_bin)
            .arg("compose")
            .arg("-f")
            .arg(&self.runtime.compose_file)
            .arg("-p")
            .arg(&self.runtime.project)
            .args(["ps", "--services", "--filter", "status=running"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await;
        match output {
            Ok(out) if out.status.success() => {
                let running = String::from_utf8_lossy(&out.stdout);
                if running.lines().any(|line| line.trim() == service) {
                    (true, "running".to_string())
                } else {
                    (false, "not running".to_string())
                }
            }
            Ok(out) => (
                false,
                String::from_utf8_lossy(&out.stderr).trim().to_string(),
            ),
            Err(e) => (false, e.to_string()),
        }
    }

    async fn port_open(&self, port: &vigil_config::ServicePort) -> (bool, String) {
        if net::tcp_ping(&port.host, port.port, self.check_timeout()).await {
            (true, format!("{}:{} accepting", port.host, port.port))
        } else {
            (false, format!("{}:{} not accepting", port.host, port.port))
        }
    }

    async fn disk_headroom(&self) -> (bool, String) {
        match resources::disk_used_percent(&self.settings.disk_path) {
            Some(used) => (
                used < self.settings.disk_used_max_percent,
                format!(
                    "{:.1}% used (floor {:.0}%)",
                    used, self.settings.disk_used_max_percent
                ),
            ),
            None => (true, "reading unavailable on this platform".to_string()),
        }
    }

    async fn memory_headroom(&self) -> (bool, String) {
        match resources::memory_free_percent() {
            Some(free) => (
                free > self.settings.memory_free_min_percent,
                format!(
                    "{:.1}% free (floor {:.0}%)",
                    free, self.settings.memory_free_min_percent
                ),
            ),
            None => (true, "reading unavailable on this platform".to_string()),
        }
    }
}

/// Wrap a check with its own timeout; timing out counts as a failure.
async fn timed(
    name: impl Into<String>,
    limit: Duration,
    check: impl Future<Output = (bool, String)>,
) -> HealthCheckResult {
    let name = name.into();
    match tokio::time::timeout(limit, check).await {
        Ok((passed, detail)) => HealthCheckResult::new(name, passed, detail),
        Err(_) => HealthCheckResult::new(name, false, format!("timed out after {:?}", limit)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn timed_check_converts_timeout_to_failure() {
        let result = timed("slow", Duration::from_millis(50), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            (true, "never".to_string())
        })
        .await;
        assert!(!result.passed);
        assert!(result.detail.contains("timed out"));
    }

    #[tokio::test]
    async fn timed_check_passes_through_results() {
        let result = timed("fast", Duration::from_secs(1), async {
            (true, "ok".to_string())
        })
        .await;
        assert!(result.passed);
        assert_eq!(result.detail, "ok");
    }
}
