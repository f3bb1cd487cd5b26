//! Deployment lifecycle orchestration for the Vigil platform.
//!
//! The controller drives one deployment attempt through a forward-only
//! state machine (pre-checks, safety backup, apply, health gate),
//! committing on a green gate and rolling back to the safety backup
//! otherwise. Mutating operations are serialized by an exclusive
//! file-based ops lock, and every attempt leaves an append-only trail
//! in the deployment history.

pub mod controller;
pub mod history;
pub mod lock;
pub mod orchestrator;
pub mod restore;
pub mod state;

pub use controller::DeploymentController;
pub use history::{DeploymentHistory, DeploymentOutcome, DeploymentRecord};
pub use lock::{LockGuard, LockInfo, OpsLock};
pub use orchestrator::{ComposeOrchestrator, Orchestrator};
pub use restore::{RestoreCoordinator, RestoreReport};
pub use state::DeployState;
