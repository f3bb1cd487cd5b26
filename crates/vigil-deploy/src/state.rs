//! Deployment state machine.

use std::fmt;
use tracing::info;

/// States of one deployment attempt. Transitions are forward-only;
/// there is no retry loop inside a single attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployState {
    Idle,
    PreChecking,
    BackingUp,
    Applying,
    HealthGating,
    Committed,
    RolledBack,
    Aborted,
}

impl fmt::Display for DeployState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeployState::Idle => "idle",
            DeployState::PreChecking => "pre-checking",
            DeployState::BackingUp => "backing-up",
            DeployState::Applying => "applying",
            DeployState::HealthGating => "health-gating",
            DeployState::Committed => "committed",
            DeployState::RolledBack => "rolled-back",
            DeployState::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

pub(crate) fn transition(state: &mut DeployState, to: DeployState) {
    info!("deployment state: {} -> {}", state, to);
    *state = to;
}
