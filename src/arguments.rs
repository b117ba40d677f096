/// Centralized command-line argument handling
///
/// Arguments are captured once into a global store so any module (logger,
/// config loader) can query flags without threading them through call sites.
/// Tests override the store with [`set_cmd_args`].
use once_cell::sync::Lazy;
use std::env;
use std::sync::Mutex;

pub static CMD_ARGS: Lazy<Mutex<Vec<String>>> = Lazy::new(|| Mutex::new(env::args().collect()));

pub fn set_cmd_args(args: Vec<String>) {
    if let Ok(mut cmd_args) = CMD_ARGS.lock() {
        *cmd_args = args;
    }
}

pub fn get_cmd_args() -> Vec<String> {
    match CMD_ARGS.lock() {
        Ok(args) => args.clone(),
        Err(_) => env::args().collect(),
    }
}

pub fn has_arg(arg: &str) -> bool {
    get_cmd_args().iter().any(|a| a == arg)
}

/// Value following a flag (`--config path`), or the `--flag=value` form
pub fn get_arg_value(flag: &str) -> Option<String> {
    let args = get_cmd_args();
    let prefix = format!("{}=", flag);
    for (i, arg) in args.iter().enumerate() {
        if arg == flag && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
        if let Some(value) = arg.strip_prefix(&prefix) {
            return Some(value.to_string());
        }
    }
    None
}

pub mod patterns {
    use super::has_arg;

    pub fn is_help_requested() -> bool {
        has_arg("--help") || has_arg("-h")
    }
}

/// Explicit config file path (`--config <path>`)
pub fn config_path_override() -> Option<String> {
    get_arg_value("--config")
}

/// Run exactly one poll cycle and exit (`--once`)
pub fn is_single_cycle_enabled() -> bool {
    has_arg("--once")
}

pub fn print_help() {
    println!("tokenscout - new token profile alerts with social metrics");
    println!();
    println!("USAGE:");
    println!("    tokenscout [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    --config <path>       Config file (default: <data dir>/config.toml)");
    println!("    --once                Run a single poll cycle and exit");
    println!("    --debug-<module>      Debug logs for one module");
    println!("                          (system, config, feed, discovery, enrichment,");
    println!("                           twitter, telegram, storage, subs, dispatch)");
    println!("    --verbose             Verbose logs for all modules");
    println!("    --quiet               Only warnings and errors");
    println!("    --no-log-file         Do not write the daily log file");
    println!("    -h, --help            Print this help");
}
