//! Log formatting and output with ANSI colors
//!
//! Console lines are colorized and aligned; file lines are plain text with a
//! full timestamp. Broken pipes (e.g. `| head`) are ignored.

use super::file::write_to_file;
use super::levels::LogLevel;
use super::tags::LogTag;
use chrono::Local;
use colored::*;
use std::io::{stdout, ErrorKind, Write};

const TAG_WIDTH: usize = 10;
const LEVEL_WIDTH: usize = 7;

pub fn format_and_log(tag: LogTag, level: LogLevel, message: &str) {
    let now = Local::now();
    let time = now.format("%H:%M:%S").to_string().dimmed();

    for (index, line) in message.lines().enumerate() {
        let console_line = if index == 0 {
            format!("{} [{}] [{}] {}", time, format_tag(&tag), format_level(level), line)
        } else {
            format!("{}{}", " ".repeat(8 + TAG_WIDTH + LEVEL_WIDTH + 7), line)
        };
        print_stdout_safe(&console_line);

        write_to_file(&format!(
            "{} [{}] [{}] {}",
            now.format("%Y-%m-%d %H:%M:%S"),
            tag.to_plain_string(),
            level.as_str(),
            line
        ));
    }
}

fn format_tag(tag: &LogTag) -> ColoredString {
    let label = format!("{:<width$}", tag.to_plain_string(), width = TAG_WIDTH);
    match tag {
        LogTag::System => label.bright_yellow().bold(),
        LogTag::Config => label.yellow().bold(),
        LogTag::Feed => label.bright_blue().bold(),
        LogTag::Discovery => label.bright_magenta().bold(),
        LogTag::Enrichment => label.magenta().bold(),
        LogTag::Twitter => label.bright_cyan().bold(),
        LogTag::Telegram => label.cyan().bold(),
        LogTag::Storage => label.bright_white().bold(),
        LogTag::Subscriptions => label.green().bold(),
        LogTag::Dispatch => label.bright_green().bold(),
    }
}

fn format_level(level: LogLevel) -> ColoredString {
    let label = format!("{:<width$}", level.as_str(), width = LEVEL_WIDTH);
    match level {
        LogLevel::Error => label.bright_red().bold(),
        LogLevel::Warning => label.bright_yellow(),
        LogLevel::Info => label.normal(),
        LogLevel::Debug => label.dimmed(),
        LogLevel::Verbose => label.dimmed().italic(),
    }
}

fn print_stdout_safe(message: &str) {
    let mut out = stdout().lock();
    if let Err(e) = writeln!(out, "{}", message) {
        if e.kind() == ErrorKind::BrokenPipe {
            return;
        }
        eprintln!("{}", message);
    }
}
