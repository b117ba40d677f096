//! Configuration system: TOML schema with embedded defaults and global access

pub mod macros;
pub mod schemas;
pub mod utils;

pub use schemas::*;
pub use utils::{
    database_path, get_config_clone, load_config, load_config_from_path, parse_config,
    read_config_file, with_config,
};
