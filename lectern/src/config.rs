//! Library configuration: defaults, `LECTERN_*` environment overrides, JSON files.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DB_PATH_VAR: &str = "LECTERN_DB_PATH";
pub const POOL_SIZE_VAR: &str = "LECTERN_POOL_SIZE";
pub const BUSY_TIMEOUT_VAR: &str = "LECTERN_BUSY_TIMEOUT_MS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// SQLite database file
    pub db_path: PathBuf,
    /// Maximum pooled connections
    pub pool_size: u32,
    /// How long a writer waits for the database lock before failing
    pub busy_timeout_ms: u64,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/library.sqlite"),
            pool_size: 8,
            busy_timeout_ms: 5_000,
        }
    }
}

impl LibraryConfig {
    /// Defaults for everything except the database location
    pub fn with_db_path(path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: path.into(),
            ..Self::default()
        }
    }

    /// Defaults overridden by `LECTERN_DB_PATH`, `LECTERN_POOL_SIZE` and
    /// `LECTERN_BUSY_TIMEOUT_MS`. Unparseable numbers are logged and ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(path) = lookup(DB_PATH_VAR) {
            config.db_path = PathBuf::from(path);
        }
        if let Some(v) = parse_var(POOL_SIZE_VAR, lookup(POOL_SIZE_VAR)) {
            config.pool_size = v;
        }
        if let Some(v) = parse_var(BUSY_TIMEOUT_VAR, lookup(BUSY_TIMEOUT_VAR)) {
            config.busy_timeout_ms = v;
        }

        config
    }

    /// Load from a JSON file. Missing keys take their default values.
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }
}

fn parse_var<T: FromStr>(key: &str, value: Option<String>) -> Option<T> {
    let value = value?;
    match value.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %value, "ignoring unparseable config value");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = LibraryConfig::default();
        assert_eq!(config.pool_size, 8);
        assert_eq!(config.busy_timeout_ms, 5_000);
        assert!(config.db_path.ends_with("library.sqlite"));
    }

    #[test]
    fn test_env_overrides() {
        let config = LibraryConfig::from_lookup(lookup_from(&[
            (DB_PATH_VAR, "/var/lib/lectern/books.sqlite"),
            (POOL_SIZE_VAR, "3"),
            (BUSY_TIMEOUT_VAR, " 250 "),
        ]));
        assert_eq!(config.db_path, PathBuf::from("/var/lib/lectern/books.sqlite"));
        assert_eq!(config.pool_size, 3);
        assert_eq!(config.busy_timeout_ms, 250);
    }

    #[test]
    fn test_env_invalid_numbers_keep_defaults() {
        let config = LibraryConfig::from_lookup(lookup_from(&[(POOL_SIZE_VAR, "many"), (BUSY_TIMEOUT_VAR, "-1")]));
        assert_eq!(config, LibraryConfig::default());
    }

    #[test]
    fn test_from_env_reads_process_environment() {
        // Only this test touches the process environment.
        std::env::set_var(DB_PATH_VAR, "/tmp/lectern-env.sqlite");
        std::env::set_var(POOL_SIZE_VAR, "not-a-number");
        std::env::set_var(BUSY_TIMEOUT_VAR, "1200");

        let config = LibraryConfig::from_env();

        std::env::remove_var(DB_PATH_VAR);
        std::env::remove_var(POOL_SIZE_VAR);
        std::env::remove_var(BUSY_TIMEOUT_VAR);

        assert_eq!(config.db_path, PathBuf::from("/tmp/lectern-env.sqlite"));
        assert_eq!(config.pool_size, 8);
        assert_eq!(config.busy_timeout_ms, 1200);
    }

    #[test]
    fn test_json_partial_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lectern.json");
        std::fs::write(&path, r#"{ "db_path": "/tmp/books.sqlite", "pool_size": 2 }"#).unwrap();

        let config = LibraryConfig::from_json_file(&path).unwrap();
        assert_eq!(config.db_path, PathBuf::from("/tmp/books.sqlite"));
        assert_eq!(config.pool_size, 2);
        assert_eq!(config.busy_timeout_ms, 5_000);
    }

    #[test]
    fn test_json_file_missing() {
        assert!(LibraryConfig::from_json_file(Path::new("/nonexistent/lectern.json")).is_err());
    }
}
