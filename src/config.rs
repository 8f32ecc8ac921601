// ⚙️ Configuration
// Optional JSON file, every field defaulted; DEMAND_TRIAGE_DB overrides the database path.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable that overrides `database_path`
pub const DB_ENV_VAR: &str = "DEMAND_TRIAGE_DB";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriageConfig {
    /// SQLite file holding snapshots and the audit trail
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Key the item collection is stored under
    #[serde(default = "default_snapshot_key")]
    pub snapshot_key: String,

    /// Default target of `export` when no file is given
    #[serde(default = "default_export_path")]
    pub export_path: PathBuf,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("triage.db")
}

fn default_snapshot_key() -> String {
    "priorizacao_state".to_string()
}

fn default_export_path() -> PathBuf {
    PathBuf::from("base_classificada.csv")
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            snapshot_key: default_snapshot_key(),
            export_path: default_export_path(),
        }
    }
}

impl TriageConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("Failed to parse config")
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("Invalid config: {}", path.display()))
    }

    /// File (if any) → defaults → environment override
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        Ok(config.with_env_override(std::env::var(DB_ENV_VAR).ok()))
    }

    pub fn with_env_override(mut self, database_path: Option<String>) -> Self {
        if let Some(db) = database_path.filter(|v| !v.trim().is_empty()) {
            debug!(database_path = %db, "database path overridden from environment");
            self.database_path = PathBuf::from(db);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = TriageConfig::default();
        assert_eq!(config.database_path, PathBuf::from("triage.db"));
        assert_eq!(config.snapshot_key, "priorizacao_state");
        assert_eq!(config.export_path, PathBuf::from("base_classificada.csv"));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = TriageConfig::from_json(r#"{"snapshot_key": "outro"}"#).unwrap();
        assert_eq!(config.snapshot_key, "outro");
        assert_eq!(config.database_path, PathBuf::from("triage.db"));
    }

    #[test]
    fn test_env_override() {
        let config = TriageConfig::default().with_env_override(Some("/tmp/x.db".into()));
        assert_eq!(config.database_path, PathBuf::from("/tmp/x.db"));

        let config = TriageConfig::default().with_env_override(Some("  ".into()));
        assert_eq!(config.database_path, PathBuf::from("triage.db"));
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"export_path": "saida.csv"}}"#).unwrap();

        let config = TriageConfig::from_file(file.path()).unwrap();
        assert_eq!(config.export_path, PathBuf::from("saida.csv"));
    }

    #[test]
    fn test_bad_file_is_an_error() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(TriageConfig::from_file(file.path()).is_err());
        assert!(TriageConfig::from_file(Path::new("/nope/config.json")).is_err());
    }
}
