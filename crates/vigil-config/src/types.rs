//! Configuration types and structures.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level immutable platform configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    /// Backup catalog and retention settings
    pub backup: BackupSettings,
    /// Optional cold-archive target
    pub archive: Option<ArchiveConfig>,
    /// Per-backend connection parameters
    pub backends: BackendsConfig,
    /// Health probe settings
    pub health: HealthSettings,
    /// Deployment controller settings
    pub deploy: DeploySettings,
    /// Orchestration runtime settings (shared by health and deploy)
    pub runtime: RuntimeConfig,
}

/// Backup catalog and retention settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupSettings {
    /// Root directory of the backup catalog
    pub root_dir: PathBuf,
    /// Number of days to retain backup sets
    pub retention_days: u32,
    /// Never prune below this many restorable sets
    pub minimum_sets: usize,
    /// Bounded parallelism for per-backend snapshots (1 = sequential)
    pub parallel_snapshots: usize,
}

impl Default for BackupSettings {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("/var/lib/vigil/backups"),
            retention_days: 30,
            minimum_sets: 1,
            parallel_snapshots: 1,
        }
    }
}

/// Remote cold-archive target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Base URL of the archive store
    pub endpoint: String,
    /// Optional bearer token
    pub token: Option<String>,
}

/// Per-backend connection parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendsConfig {
    pub relational: RelationalConfig,
    pub search: SearchConfig,
    pub config_store: DirStoreConfig,
    pub log_archive: DirStoreConfig,
}

/// PostgreSQL connection parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelationalConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: Option<String>,
}

impl Default for RelationalConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            database: "vigil".to_string(),
            user: "vigil".to_string(),
            password: None,
        }
    }
}

/// Elasticsearch connection parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Base URL, e.g. `http://localhost:9200`
    pub base_url: String,
    /// Index pattern exported/restored by the connector
    pub index_pattern: String,
    /// Documents per scroll/bulk page
    pub page_size: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:9200".to_string(),
            index_pattern: "vigil-events-*".to_string(),
            page_size: 500,
        }
    }
}

/// A directory-backed store (config bundle, log archive).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DirStoreConfig {
    pub path: PathBuf,
}

impl Default for DirStoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/etc/vigil"),
        }
    }
}

/// A network-facing service port expected to accept connections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicePort {
    pub name: String,
    pub host: String,
    pub port: u16,
}

/// Health probe settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthSettings {
    /// Per-check timeout in seconds
    pub check_timeout_secs: u64,
    /// Fail the disk check when used% is at or above this floor
    pub disk_used_max_percent: f64,
    /// Fail the memory check when free% is at or below this floor
    pub memory_free_min_percent: f64,
    /// Mount point checked for disk headroom
    pub disk_path: PathBuf,
    /// Service ports expected to accept connections post-deploy
    pub service_ports: Vec<ServicePort>,
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            check_timeout_secs: 5,
            disk_used_max_percent: 80.0,
            memory_free_min_percent: 10.0,
            disk_path: PathBuf::from("/"),
            service_ports: Vec::new(),
        }
    }
}

/// Deployment controller settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploySettings {
    /// Seconds to wait after apply before the post-deploy probe
    pub settle_secs: u64,
    /// Path of the exclusive ops lock file
    pub lock_path: PathBuf,
    /// Path of the append-only deployment history log
    pub history_path: PathBuf,
    /// Stale-lock takeover threshold in seconds
    pub lock_stale_secs: u64,
}

impl Default for DeploySettings {
    fn default() -> Self {
        Self {
            settle_secs: 30,
            lock_path: PathBuf::from("/var/lib/vigil/ops.lock"),
            history_path: PathBuf::from("/var/lib/vigil/deploy-history.jsonl"),
            lock_stale_secs: 3600,
        }
    }
}

/// Orchestration runtime (docker compose) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Container runtime binary
    pub docker_bin: String,
    /// Compose file describing the platform services
    pub compose_file: PathBuf,
    /// Compose project name
    pub project: String,
    /// Services expected to be running
    pub expected_services: Vec<String>,
    /// File recording the currently deployed platform version
    pub version_file: PathBuf,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            docker_bin: "docker".to_string(),
            compose_file: PathBuf::from("docker-compose.yml"),
            project: "vigil".to_string(),
            expected_services: Vec::new(),
            version_file: PathBuf::from("/var/lib/vigil/current-version"),
        }
    }
}
