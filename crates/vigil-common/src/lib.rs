//! Shared types and errors for the Vigil platform operations tooling.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{Artifact, BackendKind};
