//! Configuration validation.

use crate::PlatformConfig;
use vigil_common::{Error, Result};

/// Validate a loaded configuration, rejecting values the pipeline cannot
/// operate with.
pub fn validate(config: &PlatformConfig) -> Result<()> {
    let mut problems = Vec::new();

    if config.backup.root_dir.as_os_str().is_empty() {
        problems.push("backup.root_dir is empty".to_string());
    }
    if config.backup.parallel_snapshots == 0 {
        problems.push("backup.parallel_snapshots must be at least 1".to_string());
    }
    if config.health.check_timeout_secs == 0 {
        problems.push("health.check_timeout_secs must be at least 1".to_string());
    }
    if !(0.0..=100.0).contains(&config.health.disk_used_max_percent) {
        problems.push("health.disk_used_max_percent must be within 0..=100".to_string());
    }
    if !(0.0..=100.0).contains(&config.health.memory_free_min_percent) {
        problems.push("health.memory_free_min_percent must be within 0..=100".to_string());
    }
    if let Some(archive) = &config.archive {
        if archive.endpoint.is_empty() {
            problems.push("archive.endpoint is empty".to_string());
        }
    }
    if config.backends.search.page_size == 0 {
        problems.push("backends.search.page_size must be at least 1".to_string());
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(Error::Configuration(problems.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate(&PlatformConfig::default()).is_ok());
    }

    #[test]
    fn zero_parallelism_is_rejected() {
        let mut config = PlatformConfig::default();
        config.backup.parallel_snapshots = 0;
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("parallel_snapshots"));
    }
}
