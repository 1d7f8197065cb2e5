//! Engine configuration.
//!
//! `StoreConfig` is a plain struct with sensible defaults: construct one
//! with `StoreConfig::new("/path/to/storage")` and the engine works without
//! any config file at all. `StoreConfig::load` reads an optional TOML file
//! for deployments that want the settings on disk.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{Result, TokenVaultError};

/// Configuration for a `TokenStore`.
///
/// The interval fields describe the cadence an external scheduler should
/// use when driving `backup()` and `verify_integrity()`; the engine itself
/// runs no timers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Root directory for record files, the index, and the key material.
    pub storage_dir: PathBuf,

    /// Directory for backup artifacts. Defaults to `{storage_dir}/backups`.
    #[serde(default)]
    pub backup_dir: Option<PathBuf>,

    /// Apply storage-layer AES-256-GCM encryption to record payloads.
    #[serde(default = "default_true")]
    pub encryption_enabled: bool,

    /// Apply LZ4 compression to record payloads before encryption.
    #[serde(default = "default_true")]
    pub compression_enabled: bool,

    /// Suggested seconds between scheduled backups.
    #[serde(default = "default_backup_interval")]
    pub backup_interval_secs: u64,

    /// Maximum number of backup artifacts retained; the oldest is deleted
    /// when a new backup would exceed this.
    #[serde(default = "default_max_backup_files")]
    pub max_backup_files: usize,

    /// Suggested seconds between scheduled integrity checks.
    #[serde(default = "default_integrity_interval")]
    pub integrity_check_interval_secs: u64,

    /// Sweep long-expired records automatically after a failed integrity
    /// check. Orphan files are never touched by the automatic pass; they
    /// are only deleted by an explicit `cleanup()` call.
    #[serde(default = "default_true")]
    pub auto_cleanup: bool,

    /// Storage budget in bytes. Writes that would push live usage past
    /// it fail with `StorageFull`; zero disables the check.
    #[serde(default = "default_max_storage_size")]
    pub max_storage_size: u64,
}

// ── Serde default helpers ────────────────────────────────────────────

fn default_true() -> bool {
    true
}

fn default_backup_interval() -> u64 {
    3_600
}

fn default_max_backup_files() -> usize {
    5
}

fn default_integrity_interval() -> u64 {
    86_400
}

fn default_max_storage_size() -> u64 {
    104_857_600 // 100 MB
}

// ── Implementation ───────────────────────────────────────────────────

impl StoreConfig {
    /// Build a config rooted at `storage_dir` with all defaults.
    pub fn new(storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            storage_dir: storage_dir.into(),
            backup_dir: None,
            encryption_enabled: true,
            compression_enabled: true,
            backup_interval_secs: default_backup_interval(),
            max_backup_files: default_max_backup_files(),
            integrity_check_interval_secs: default_integrity_interval(),
            auto_cleanup: true,
            max_storage_size: default_max_storage_size(),
        }
    }

    /// Load a config from a TOML file.
    ///
    /// Missing fields fall back to their defaults; a file that exists but
    /// cannot be parsed is an error.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents).map_err(|e| {
            TokenVaultError::ConfigError(format!("failed to parse {}: {e}", path.display()))
        })
    }

    /// Directory holding one `.dat` file per record.
    pub fn records_dir(&self) -> PathBuf {
        self.storage_dir.join("records")
    }

    /// Path of the persisted index document.
    pub fn index_path(&self) -> PathBuf {
        self.storage_dir.join("storage.index")
    }

    /// Path of the key material file.
    pub fn key_path(&self) -> PathBuf {
        self.storage_dir.join("storage.key")
    }

    /// Resolved backup directory (explicit or the default subdirectory).
    pub fn backup_dir(&self) -> PathBuf {
        self.backup_dir
            .clone()
            .unwrap_or_else(|| self.storage_dir.join("backups"))
    }

    /// Merge a partial patch into this config.
    pub fn apply(&mut self, patch: ConfigPatch) {
        if let Some(v) = patch.backup_dir {
            self.backup_dir = Some(v);
        }
        if let Some(v) = patch.encryption_enabled {
            self.encryption_enabled = v;
        }
        if let Some(v) = patch.compression_enabled {
            self.compression_enabled = v;
        }
        if let Some(v) = patch.backup_interval_secs {
            self.backup_interval_secs = v;
        }
        if let Some(v) = patch.max_backup_files {
            self.max_backup_files = v;
        }
        if let Some(v) = patch.integrity_check_interval_secs {
            self.integrity_check_interval_secs = v;
        }
        if let Some(v) = patch.auto_cleanup {
            self.auto_cleanup = v;
        }
        if let Some(v) = patch.max_storage_size {
            self.max_storage_size = v;
        }
    }
}

/// Partial config update applied at runtime via `TokenStore::update_config`.
///
/// `storage_dir` is deliberately absent: moving the storage root requires
/// re-initialization, not a live merge.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigPatch {
    pub backup_dir: Option<PathBuf>,
    pub encryption_enabled: Option<bool>,
    pub compression_enabled: Option<bool>,
    pub backup_interval_secs: Option<u64>,
    pub max_backup_files: Option<usize>,
    pub integrity_check_interval_secs: Option<u64>,
    pub auto_cleanup: Option<bool>,
    pub max_storage_size: Option<u64>,
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn default_config_is_sensible() {
        let c = StoreConfig::new("/tmp/tv");
        assert!(c.encryption_enabled);
        assert!(c.compression_enabled);
        assert_eq!(c.max_backup_files, 5);
        assert_eq!(c.max_storage_size, 104_857_600);
        assert_eq!(c.backup_dir(), PathBuf::from("/tmp/tv/backups"));
        assert_eq!(c.index_path(), PathBuf::from("/tmp/tv/storage.index"));
        assert_eq!(c.key_path(), PathBuf::from("/tmp/tv/storage.key"));
        assert_eq!(c.records_dir(), PathBuf::from("/tmp/tv/records"));
    }

    #[test]
    fn load_parses_toml_file() {
        let tmp = TempDir::new().unwrap();
        let config = r#"
storage_dir = "/data/tokens"
encryption_enabled = false
max_backup_files = 9
"#;
        let path = tmp.path().join("tokenvault.toml");
        fs::write(&path, config).unwrap();

        let c = StoreConfig::load(&path).unwrap();
        assert_eq!(c.storage_dir, PathBuf::from("/data/tokens"));
        assert!(!c.encryption_enabled);
        assert_eq!(c.max_backup_files, 9);
        // Rest should be defaults
        assert!(c.compression_enabled);
        assert_eq!(c.backup_interval_secs, 3_600);
    }

    #[test]
    fn load_errors_on_invalid_toml() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("tokenvault.toml");
        fs::write(&path, "not valid {{toml").unwrap();

        assert!(StoreConfig::load(&path).is_err());
    }

    #[test]
    fn apply_merges_only_present_fields() {
        let mut c = StoreConfig::new("/tmp/tv");
        c.apply(ConfigPatch {
            max_backup_files: Some(2),
            compression_enabled: Some(false),
            ..ConfigPatch::default()
        });

        assert_eq!(c.max_backup_files, 2);
        assert!(!c.compression_enabled);
        assert!(c.encryption_enabled);
        assert_eq!(c.storage_dir, PathBuf::from("/tmp/tv"));
    }
}
