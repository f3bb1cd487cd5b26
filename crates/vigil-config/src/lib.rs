//! Platform configuration.
//!
//! The configuration is constructed exactly once at process start (file +
//! environment overrides), validated, and then passed to every component
//! constructor. No component reads the environment after startup.

pub mod types;
pub mod validation;

pub use types::{
    ArchiveConfig, BackendsConfig, BackupSettings, DeploySettings, DirStoreConfig, HealthSettings,
    PlatformConfig, RelationalConfig, RuntimeConfig, SearchConfig, ServicePort,
};

use std::path::Path;
use vigil_common::{Error, Result};

impl PlatformConfig {
    /// Load configuration from an optional JSON file, apply `VIGIL_*`
    /// environment overrides, and validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let data = std::fs::read_to_string(path).map_err(|e| {
                    Error::Configuration(format!("cannot read {}: {}", path.display(), e))
                })?;
                serde_json::from_str(&data)
                    .map_err(|e| Error::Configuration(format!("invalid config file: {}", e)))?
            }
            None => PlatformConfig::default(),
        };

        config.apply_env_overrides();
        validation::validate(&config)?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(root) = std::env::var("VIGIL_BACKUP_ROOT") {
            self.backup.root_dir = root.into();
        }
        if let Ok(days) = std::env::var("VIGIL_RETENTION_DAYS") {
            if let Ok(days) = days.parse() {
                self.backup.retention_days = days;
            }
        }
        if let Ok(url) = std::env::var("VIGIL_ARCHIVE_URL") {
            let token = std::env::var("VIGIL_ARCHIVE_TOKEN").ok();
            self.archive = Some(ArchiveConfig { endpoint: url, token });
        }
        if let Ok(host) = std::env::var("VIGIL_DB_HOST") {
            self.backends.relational.host = host;
        }
        if let Ok(password) = std::env::var("VIGIL_DB_PASSWORD") {
            self.backends.relational.password = Some(password);
        }
        if let Ok(url) = std::env::var("VIGIL_SEARCH_URL") {
            self.backends.search.base_url = url;
        }
    }
}
