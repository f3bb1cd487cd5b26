//! Health probing for the Vigil platform.
//!
//! A fixed battery of independent liveness/readiness checks, each under
//! its own timeout, run concurrently and joined into a single verdict.
//! A single failing check fails the probe, but every check still runs so
//! the caller gets the complete diagnostic picture.

pub mod prober;
pub mod report;
pub mod resources;

pub use prober::HealthProber;
pub use report::{HealthCheckResult, ProbeMode, ProbeReport};

use async_trait::async_trait;
use vigil_common::BackendKind;

/// Probe interface consumed by the deployment and restore coordinators.
#[async_trait]
pub trait Prober: Send + Sync {
    /// Run the battery for a mode.
    async fn probe(&self, mode: ProbeMode) -> ProbeReport;

    /// Post-restore probe restricted to the given kinds plus global checks.
    async fn probe_scoped(&self, kinds: &[BackendKind]) -> ProbeReport;
}

#[async_trait]
impl Prober for HealthProber {
    async fn probe(&self, mode: ProbeMode) -> ProbeReport {
        self.run(mode).await
    }

    async fn probe_scoped(&self, kinds: &[BackendKind]) -> ProbeReport {
        self.run_scoped(kinds).await
    }
}
