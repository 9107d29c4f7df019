use std::path::{Path, PathBuf};
use std::sync::OnceLock;

static LOKI_HOME: OnceLock<PathBuf> = OnceLock::new();
static LOKI_CACHE_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Generate a UTC timestamp for `source.updated`
/// Returns format: YYYY-MM-DD HH:MM:SS
pub fn generate_utc_timestamp() -> String {
    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Get the Loki home directory
/// Checks LOKI_HOME environment variable, falls back to ${HOME}/.loki
pub fn loki_home() -> PathBuf {
    LOKI_HOME
        .get_or_init(|| {
            if let Ok(path) = std::env::var("LOKI_HOME") {
                PathBuf::from(path)
            } else {
                let home = std::env::var("HOME").unwrap_or_else(|_| {
                    std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string())
                });
                PathBuf::from(home).join(".loki")
            }
        })
        .clone()
}

/// Get the download cache directory
/// Checks LOKI_CACHE_DIR environment variable, falls back to LOKI_HOME/cache
pub fn loki_cache_dir() -> PathBuf {
    LOKI_CACHE_DIR
        .get_or_init(|| {
            if let Ok(path) = std::env::var("LOKI_CACHE_DIR") {
                PathBuf::from(path)
            } else {
                loki_home().join("cache")
            }
        })
        .clone()
}

/// Working directory for one source's downloaded files
pub fn source_work_dir(cache_root: &Path, source: &str) -> PathBuf {
    cache_root.join(format!("loki_{}", source))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_work_dir() {
        let dir = source_work_dir(Path::new("/tmp/cache"), "chainfiles");
        assert_eq!(dir, PathBuf::from("/tmp/cache/loki_chainfiles"));
    }

    #[test]
    fn test_timestamp_format() {
        let ts = generate_utc_timestamp();
        assert_eq!(ts.len(), 19);
        assert_eq!(&ts[4..5], "-");
        assert_eq!(&ts[10..11], " ");
    }
}
