//! Telegram integration
//!
//! ```text
//! telegram/
//! ├── bot.rs        # token validation, getUpdates command loop
//! ├── commands/     # /start, /chain, /followers, /clear, /show, /status, /stop
//! ├── directory.rs  # member counts for the enrichment resolver
//! └── notifier.rs   # alert delivery sink
//! ```

pub mod bot;
pub mod commands;
pub mod directory;
pub mod notifier;

pub use bot::{run_command_loop, validate_bot};
pub use commands::{parse_command, Command, CommandContext};
pub use directory::BotDirectory;
pub use notifier::TelegramSink;
