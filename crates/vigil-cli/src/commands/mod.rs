//! CLI commands.

pub mod backup;
pub mod deploy;
pub mod health;
pub mod list;
pub mod restore;
pub mod rollback;
pub mod verify;

pub use backup::BackupCommand;
pub use deploy::DeployCommand;
pub use health::HealthCommand;
pub use list::ListCommand;
pub use restore::RestoreCommand;
pub use rollback::RollbackCommand;
pub use verify::VerifyCommand;

use vigil_common::{BackendKind, Error};

/// Parse an optional `--scope db,search,...` argument.
pub(crate) fn parse_scope_arg(
    scope: Option<&str>,
) -> vigil_common::Result<Option<Vec<BackendKind>>> {
    scope
        .map(|s| vigil_common::types::parse_scope(s).map_err(Error::InvalidInput))
        .transpose()
}
