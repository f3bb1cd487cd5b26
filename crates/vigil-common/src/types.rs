//! Shared domain types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The stateful backends the platform runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// Relational database (PostgreSQL)
    Relational,
    /// Search index engine (Elasticsearch)
    SearchIndex,
    /// Configuration bundle (service config directory)
    Config,
    /// Application log archive (JSON-lines log directory)
    LogArchive,
}

impl BackendKind {
    /// All backend kinds, in the order artifacts appear in a manifest.
    pub const ALL: [BackendKind; 4] = [
        BackendKind::Relational,
        BackendKind::SearchIndex,
        BackendKind::Config,
        BackendKind::LogArchive,
    ];

    /// Short name used in CLI scopes and file names.
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Relational => "db",
            BackendKind::SearchIndex => "search",
            BackendKind::Config => "config",
            BackendKind::LogArchive => "logs",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "db" | "relational" | "postgres" => Ok(BackendKind::Relational),
            "search" | "elasticsearch" => Ok(BackendKind::SearchIndex),
            "config" => Ok(BackendKind::Config),
            "logs" | "log-archive" => Ok(BackendKind::LogArchive),
            other => Err(format!("unknown backend kind '{}'", other)),
        }
    }
}

/// Parse a comma-separated CLI scope into backend kinds.
pub fn parse_scope(scope: &str) -> std::result::Result<Vec<BackendKind>, String> {
    let mut kinds = Vec::new();
    for part in scope.split(',') {
        let kind = part.parse::<BackendKind>()?;
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }
    if kinds.is_empty() {
        return Err("empty backend scope".to_string());
    }
    Ok(kinds)
}

/// One backed-up artifact inside a Backup Set, as recorded in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Which backend produced this artifact
    pub kind: BackendKind,
    /// File name relative to the backup set directory
    pub file_name: String,
    /// Artifact size in bytes
    pub size_bytes: u64,
    /// Lowercase hex SHA-256 of the artifact contents
    pub sha256: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_kind_round_trips_through_str() {
        for kind in BackendKind::ALL {
            assert_eq!(kind.as_str().parse::<BackendKind>().unwrap(), kind);
        }
    }

    #[test]
    fn scope_parsing_dedups_and_rejects_unknown() {
        let kinds = parse_scope("db,search,db").unwrap();
        assert_eq!(kinds, vec![BackendKind::Relational, BackendKind::SearchIndex]);
        assert!(parse_scope("db,bogus").is_err());
        assert!(parse_scope("").is_err());
    }
}
