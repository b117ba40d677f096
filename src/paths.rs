//! Centralized path resolution for tokenscout
//!
//! Everything lives under one platform-standard base directory:
//! - **macOS**: `~/Library/Application Support/TokenScout/`
//! - **Windows**: `%LOCALAPPDATA%\TokenScout\`
//! - **Linux**: `$XDG_DATA_HOME/TokenScout/` (fallback `~/.local/share/TokenScout/`)
//!
//! ```text
//! TokenScout/
//! ├── data/
//! │   ├── config.toml
//! │   └── tokenscout.db
//! └── logs/
//!     └── tokenscout_YYYY-MM-DD.log
//! ```
//!
//! `TOKENSCOUT_HOME` overrides the base directory.

use once_cell::sync::Lazy;
use std::path::PathBuf;

static BASE_DIRECTORY: Lazy<PathBuf> = Lazy::new(resolve_base_directory);

fn resolve_base_directory() -> PathBuf {
    const APP_DIR: &str = "TokenScout";

    if let Ok(custom) = std::env::var("TOKENSCOUT_HOME") {
        if !custom.trim().is_empty() {
            return PathBuf::from(custom);
        }
    }

    if let Some(dir) = dirs::data_local_dir() {
        return dir.join(APP_DIR);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(APP_DIR);
    }

    PathBuf::from(APP_DIR)
}

pub fn get_base_directory() -> PathBuf {
    BASE_DIRECTORY.clone()
}

/// Databases and the config file
pub fn get_data_directory() -> PathBuf {
    BASE_DIRECTORY.join("data")
}

/// Daily log files
pub fn get_logs_directory() -> PathBuf {
    BASE_DIRECTORY.join("logs")
}

pub fn get_config_path() -> PathBuf {
    get_data_directory().join("config.toml")
}

/// Default TokenLog / subscriber database
pub fn get_database_path() -> PathBuf {
    get_data_directory().join("tokenscout.db")
}

/// Create the data and logs directories if missing
pub fn ensure_all_directories() -> Result<(), String> {
    for dir in [get_data_directory(), get_logs_directory()] {
        std::fs::create_dir_all(&dir)
            .map_err(|e| format!("Failed to create directory {}: {}", dir.display(), e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_and_logs_are_subdirs() {
        let base = get_base_directory();
        assert!(get_data_directory().starts_with(&base));
        assert!(get_logs_directory().starts_with(&base));
    }

    #[test]
    fn test_files_in_data_dir() {
        let data = get_data_directory();
        assert!(get_config_path().starts_with(&data));
        assert!(get_database_path().starts_with(&data));
    }
}
