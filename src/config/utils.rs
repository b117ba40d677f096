use super::schemas::Config;
/// Configuration utilities - loading and access helpers
///
/// The global `CONFIG` is the single source of truth once loaded. Components
/// receive the values they need at construction time; `with_config` is for
/// the composition root and command glue.
use crate::logger::{self, LogTag};
use crate::paths;
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};

pub static CONFIG: OnceCell<RwLock<Config>> = OnceCell::new();

/// Parse and validate a config file without touching the global
pub fn read_config_file(path: &Path) -> Result<Config, String> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config file '{}': {}", path.display(), e))?;
    parse_config(&contents)
        .map_err(|e| format!("Invalid config file '{}': {}", path.display(), e))
}

pub fn parse_config(contents: &str) -> Result<Config, String> {
    let config =
        toml::from_str::<Config>(contents).map_err(|e| format!("Failed to parse TOML: {}", e))?;
    config.validate()?;
    Ok(config)
}

/// Load configuration from the default location (or `--config`)
pub fn load_config() -> Result<(), String> {
    let path = crate::arguments::config_path_override()
        .map(PathBuf::from)
        .unwrap_or_else(paths::get_config_path);
    load_config_from_path(&path)
}

/// Load configuration from a specific path; a missing file means defaults
pub fn load_config_from_path(path: &Path) -> Result<(), String> {
    let config = if path.exists() {
        let config = read_config_file(path)?;
        logger::info(
            LogTag::Config,
            &format!("Loaded configuration from {}", path.display()),
        );
        config
    } else {
        logger::warning(
            LogTag::Config,
            &format!("Config file '{}' not found, using default values", path.display()),
        );
        Config::default()
    };

    CONFIG
        .set(RwLock::new(config))
        .map_err(|_| "Config already initialized".to_string())
}

/// Read access to the configuration
///
/// Falls back to defaults when nothing was loaded (library use, tests).
pub fn with_config<F, R>(f: F) -> R
where
    F: FnOnce(&Config) -> R,
{
    match CONFIG.get() {
        Some(lock) => f(&lock.read()),
        None => f(&Config::default()),
    }
}

pub fn get_config_clone() -> Config {
    with_config(|cfg| cfg.clone())
}

/// Effective database path (`storage.database_path` or the data dir default)
pub fn database_path() -> PathBuf {
    with_config(|cfg| {
        if cfg.storage.database_path.trim().is_empty() {
            paths::get_database_path()
        } else {
            PathBuf::from(&cfg.storage.database_path)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = parse_config("").expect("empty config is valid");
        assert_eq!(config, Config::default());
        assert_eq!(config.feed.poll_interval_secs, 3);
        assert_eq!(config.feed.error_backoff_secs, 5);
        assert_eq!(config.enrichment.resolver_timeout_secs, 10);
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config = parse_config(
            r#"
            [feed]
            poll_interval_secs = 2

            [enrichment]
            max_concurrent = 32
            "#,
        )
        .expect("valid");
        assert_eq!(config.feed.poll_interval_secs, 2);
        assert_eq!(config.feed.request_timeout_secs, 10);
        assert_eq!(config.enrichment_concurrency(), 8);
    }

    #[test]
    fn test_zero_interval_rejected() {
        let err = parse_config("[feed]\npoll_interval_secs = 0\n").unwrap_err();
        assert!(err.contains("feed.poll_interval_secs"));
    }

    #[test]
    fn test_telegram_requires_token() {
        let err = parse_config("[telegram]\nenabled = true\n").unwrap_err();
        assert!(err.contains("bot_token"));
    }

    #[test]
    fn test_read_config_file_from_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[dispatch]\nmax_concurrent_deliveries = 2\n").expect("write");
        let config = read_config_file(&path).expect("load");
        assert_eq!(config.dispatch.max_concurrent_deliveries, 2);
        assert!(config.dispatch.console_subscriber);
    }
}
