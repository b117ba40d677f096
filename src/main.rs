use tokenscout::{
    arguments::{is_single_cycle_enabled, patterns, print_help},
    config,
    logger::{self, LogTag},
    shutdown::{install_shutdown_handler, ShutdownSignal},
};

#[tokio::main]
async fn main() {
    // Logger needs the logs directory to exist
    if let Err(e) = tokenscout::paths::ensure_all_directories() {
        eprintln!("Failed to create required directories: {}", e);
        std::process::exit(1);
    }

    logger::init();

    if patterns::is_help_requested() {
        print_help();
        std::process::exit(0);
    }

    logger::info(
        LogTag::System,
        &format!("TokenScout {} starting up...", env!("CARGO_PKG_VERSION")),
    );

    if let Err(e) = config::load_config() {
        logger::error(LogTag::Config, &format!("Failed to load configuration: {}", e));
        logger::flush();
        std::process::exit(1);
    }

    let shutdown = ShutdownSignal::new();
    if let Err(e) = install_shutdown_handler(shutdown.clone()) {
        logger::warning(LogTag::System, &e);
    }

    let result = if is_single_cycle_enabled() {
        tokenscout::run::run_single_cycle().await
    } else {
        tokenscout::run::run(shutdown).await
    };

    match result {
        Ok(()) => {
            logger::info(LogTag::System, "TokenScout stopped");
            logger::flush();
        }
        Err(e) => {
            logger::error(LogTag::System, &format!("TokenScout failed: {}", e));
            logger::flush();
            std::process::exit(1);
        }
    }
}
