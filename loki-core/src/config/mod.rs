//! Configuration types for Loki

use crate::system::paths;
use crate::LokiError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub update: UpdateConfig,
    #[serde(default)]
    pub liftover: LiftoverConfig,
    #[serde(default)]
    pub zones: ZoneConfig,
    /// Raw per-source option strings, keyed by source name
    #[serde(default)]
    pub sources: BTreeMap<String, BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: PathBuf,
    /// SQLite page cache, in KiB
    #[serde(default = "default_cache_size_kib")]
    pub cache_size_kib: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateConfig {
    /// Root of the per-source working directories
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
    #[serde(default)]
    pub cache_only: bool,
    #[serde(default)]
    pub force: bool,
    /// Rows per batch when rewriting large tables
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_parallel_downloads")]
    pub parallel_downloads: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiftoverConfig {
    /// Fraction of a region that must map for it to be lifted
    #[serde(default = "default_min_coverage")]
    pub min_coverage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ZoneConfig {
    /// Overrides the stored zone size; unset keeps whatever the store holds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone_size: Option<i64>,
}

fn default_database_path() -> PathBuf { PathBuf::from("loki.db") }
fn default_cache_size_kib() -> u32 { 32768 }
fn default_batch_size() -> usize { 2_500_000 }
fn default_parallel_downloads() -> bool { true }
fn default_min_coverage() -> f64 { 0.95 }

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            cache_size_kib: default_cache_size_kib(),
        }
    }
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            cache_only: false,
            force: false,
            batch_size: default_batch_size(),
            parallel_downloads: default_parallel_downloads(),
        }
    }
}

impl Default for LiftoverConfig {
    fn default() -> Self {
        Self {
            min_coverage: default_min_coverage(),
        }
    }
}

impl UpdateConfig {
    /// Resolved working directory root, falling back to the Loki cache dir
    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(paths::loki_cache_dir)
    }
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, LokiError> {
    let contents = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&contents)?;
    config.validate()?;
    Ok(config)
}

pub fn save_config<P: AsRef<Path>>(path: P, config: &Config) -> Result<(), LokiError> {
    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

impl Config {
    pub fn validate(&self) -> Result<(), LokiError> {
        if !(self.liftover.min_coverage > 0.0 && self.liftover.min_coverage <= 1.0) {
            return Err(LokiError::Configuration(format!(
                "liftover.min_coverage must be in (0, 1], got {}",
                self.liftover.min_coverage
            )));
        }
        if let Some(size) = self.zones.zone_size.filter(|size| *size <= 0) {
            return Err(LokiError::Configuration(format!(
                "zones.zone_size must be positive, got {}",
                size
            )));
        }
        if self.update.batch_size == 0 {
            return Err(LokiError::Configuration(
                "update.batch_size must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.database.path, PathBuf::from("loki.db"));
        assert_eq!(config.database.cache_size_kib, 32768);
        assert!(!config.update.cache_only);
        assert!(!config.update.force);
        assert_eq!(config.update.batch_size, 2_500_000);
        assert!(config.update.parallel_downloads);
        assert_eq!(config.liftover.min_coverage, 0.95);
        assert_eq!(config.zones.zone_size, None);
        assert!(config.sources.is_empty());
    }

    #[test]
    fn test_load_partial_config() {
        let toml_content = r#"
[database]
path = "/data/knowledge.db"

[update]
force = true

[sources.chainfiles]
mirror = "/mirror/goldenPath"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", toml_content).unwrap();

        let config = load_config(temp_file.path()).unwrap();

        assert_eq!(config.database.path, PathBuf::from("/data/knowledge.db"));
        assert!(config.update.force);
        assert_eq!(config.update.batch_size, 2_500_000);
        assert_eq!(
            config.sources["chainfiles"].get("mirror").map(String::as_str),
            Some("/mirror/goldenPath")
        );
    }

    #[test]
    fn test_load_invalid_config() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "this is not valid TOML {{").unwrap();

        match load_config(temp_file.path()).unwrap_err() {
            LokiError::Configuration(msg) => assert!(msg.contains("Failed to parse config")),
            other => panic!("Expected Configuration error, got {:?}", other),
        }
    }

    #[test]
    fn test_rejects_out_of_range_coverage() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "[liftover]\nmin_coverage = 1.5\n").unwrap();

        assert!(matches!(
            load_config(temp_file.path()),
            Err(LokiError::Configuration(_))
        ));
    }

    #[test]
    fn test_rejects_non_positive_zone_size() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "[zones]\nzone_size = 0\n").unwrap();

        assert!(matches!(
            load_config(temp_file.path()),
            Err(LokiError::Configuration(_))
        ));
    }

    #[test]
    fn test_load_nonexistent_file() {
        assert!(matches!(
            load_config("/nonexistent/path/to/loki.toml"),
            Err(LokiError::Io(_))
        ));
    }

    #[test]
    fn test_config_round_trip() {
        let mut config = Config::default();
        config.update.cache_only = true;
        config.zones.zone_size = Some(7);
        config
            .sources
            .entry("genes".to_string())
            .or_default()
            .insert("favor-primary".to_string(), "yes".to_string());

        let temp_file = NamedTempFile::new().unwrap();
        save_config(temp_file.path(), &config).unwrap();
        let loaded = load_config(temp_file.path()).unwrap();

        assert!(loaded.update.cache_only);
        assert_eq!(loaded.zones.zone_size, Some(7));
        assert_eq!(loaded.sources, config.sources);
    }
}
