//! Parley configuration management

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main Parley configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParleyConfig {
    /// Snapshot storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Learning and retrieval policy
    #[serde(default)]
    pub learning: LearningConfig,

    /// Response cache configuration
    #[serde(default)]
    pub cache: CacheConfig,

    /// Optional remote snapshot backends
    #[serde(default)]
    pub remote: RemoteConfig,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,
}

impl ParleyConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
    }

    /// Check cross-field constraints the type system cannot express
    pub fn validate(&self) -> Result<()> {
        if self.learning.cluster_capacity == 0 {
            return Err(Error::Config("learning.cluster_capacity must be > 0".into()));
        }
        if self.learning.context_capacity == 0 {
            return Err(Error::Config("learning.context_capacity must be > 0".into()));
        }
        if self.learning.context_quality_threshold > 100 {
            return Err(Error::Config(
                "learning.context_quality_threshold must be within 0-100".into(),
            ));
        }
        if self.storage.save_interval_secs == 0 {
            return Err(Error::Config("storage.save_interval_secs must be > 0".into()));
        }
        Ok(())
    }
}

/// Snapshot storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Primary snapshot path
    pub primary_path: PathBuf,

    /// Secondary mirror that survives ephemeral deployment resets
    pub durable_path: Option<PathBuf>,

    /// Directory for timestamped backup copies (None = next to the primary file)
    pub backup_dir: Option<PathBuf>,

    /// Number of backup copies to keep (0 disables rotation)
    pub backup_retention: usize,

    /// Periodic save interval in seconds
    pub save_interval_secs: u64,

    /// Delay between a save request and the save it triggers, in milliseconds
    pub debounce_ms: u64,

    /// Write the primary file synchronously after every learning event
    pub sync_after_learn: bool,
}

impl StorageConfig {
    /// Periodic save interval
    pub fn save_interval(&self) -> Duration {
        Duration::from_secs(self.save_interval_secs)
    }

    /// Debounce delay before a scheduled save runs
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Resolved backup directory
    pub fn backup_dir(&self) -> PathBuf {
        self.backup_dir.clone().unwrap_or_else(|| {
            self.primary_path
                .parent()
                .map(|p| p.join("backups"))
                .unwrap_or_else(|| PathBuf::from("backups"))
        })
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let base = dirs_next::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("parley");

        Self {
            primary_path: base.join("memory.json"),
            durable_path: None,
            backup_dir: None,
            backup_retention: 5,
            save_interval_secs: 300,
            debounce_ms: 100,
            sync_after_learn: false,
        }
    }
}

/// Learning and retrieval policy.
///
/// The numeric constants are tunable policy, not structural invariants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningConfig {
    /// Maximum entries per semantic cluster
    pub cluster_capacity: usize,

    /// Maximum number of context pairs
    pub context_capacity: usize,

    /// Minimum quality for an exchange to enter the context pairs
    pub context_quality_threshold: u8,

    /// A different response replaces an entry only if it beats its quality by more than this
    pub replace_margin: u8,

    /// Entries older than this many days can be replaced regardless of quality
    pub aging_days: i64,

    /// Quality gained on each reinforcement
    pub reinforce_bonus: u8,

    /// Minimum relevance for a cluster candidate to be returned
    pub relevance_threshold: f64,

    /// Minimum quality for a live exchange to be learned
    pub min_learn_quality: u8,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            cluster_capacity: 20,
            context_capacity: 1000,
            context_quality_threshold: 60,
            replace_margin: 10,
            aging_days: 30,
            reinforce_bonus: 2,
            relevance_threshold: 30.0,
            min_learn_quality: 40,
        }
    }
}

/// Response cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Enable the response cache
    pub enabled: bool,

    /// Entry time-to-live in seconds
    pub ttl_secs: u64,

    /// Maximum cached entries
    pub capacity: usize,
}

impl CacheConfig {
    /// Entry time-to-live
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: 60,
            capacity: 1000,
        }
    }
}

/// Optional remote snapshot backends
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Key-value store reached over HTTP
    pub kv: Option<KvConfig>,

    /// Relational store (requires the `postgres` feature)
    pub postgres: Option<PostgresConfig>,

    /// Upper bound on a single remote push, in seconds
    #[serde(default = "default_remote_timeout")]
    pub timeout_secs: u64,
}

fn default_remote_timeout() -> u64 {
    10
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            kv: None,
            postgres: None,
            timeout_secs: default_remote_timeout(),
        }
    }
}

impl RemoteConfig {
    /// Upper bound on a single remote push
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

/// Key-value backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KvConfig {
    /// Base URL; the blob lives at `{url}/{key}`
    pub url: String,

    /// Fixed identifier of the snapshot blob
    #[serde(default = "default_snapshot_key")]
    pub key: String,

    /// Bearer token sent with every request
    #[serde(default)]
    pub token: Option<String>,
}

/// Relational backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    /// Connection URL
    pub url: String,

    /// Table holding snapshot rows
    #[serde(default = "default_table")]
    pub table: String,

    /// Row id of the snapshot
    #[serde(default = "default_snapshot_key")]
    pub id: String,
}

fn default_snapshot_key() -> String {
    "parley-memory".to_string()
}

fn default_table() -> String {
    "parley_memory".to_string()
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 18791,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ParleyConfig::default();
        assert_eq!(config.learning.cluster_capacity, 20);
        assert_eq!(config.learning.context_capacity, 1000);
        assert_eq!(config.learning.context_quality_threshold, 60);
        assert_eq!(config.learning.aging_days, 30);
        assert!((config.learning.relevance_threshold - 30.0).abs() < f64::EPSILON);
        assert!(config.storage.primary_path.ends_with("memory.json"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: ParleyConfig = toml::from_str(
            r#"
            [learning]
            cluster_capacity = 5
            context_capacity = 50
            context_quality_threshold = 70
            replace_margin = 10
            aging_days = 7
            reinforce_bonus = 1
            relevance_threshold = 20.0
            min_learn_quality = 30

            [remote.kv]
            url = "http://localhost:8080/kv"
            "#,
        )
        .unwrap();

        assert_eq!(config.learning.cluster_capacity, 5);
        assert_eq!(config.storage.backup_retention, 5);
        let kv = config.remote.kv.unwrap();
        assert_eq!(kv.key, "parley-memory");
        assert!(kv.token.is_none());
        assert_eq!(config.remote.timeout_secs, 10);
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let mut config = ParleyConfig::default();
        config.learning.cluster_capacity = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_backup_dir_defaults_next_to_primary() {
        let storage = StorageConfig {
            primary_path: PathBuf::from("/data/parley/memory.json"),
            ..Default::default()
        };
        assert_eq!(storage.backup_dir(), PathBuf::from("/data/parley/backups"));
    }

    #[test]
    fn test_toml_round_trip() {
        let config = ParleyConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: ParleyConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.server.port, config.server.port);
        assert_eq!(parsed.cache.ttl_secs, config.cache.ttl_secs);
    }
}
