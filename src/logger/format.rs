//! Log formatting and output
//!
//! Console lines get a dimmed time, a colored fixed-width tag and level, and are
//! wrapped at word boundaries. The file sink receives the same text uncolored
//! with a full timestamp.

use super::file::write_to_file;
use super::tags::LogTag;
use chrono::Local;
use colored::*;
use std::io::{stdout, ErrorKind, Write};

const TAG_WIDTH: usize = 10;
const LOG_TYPE_WIDTH: usize = 8;

/// Maximum line length before wrapping
const MAX_LINE_LENGTH: usize = 145;

pub fn format_and_log(tag: &LogTag, log_type: &str, message: &str) {
    let now = Local::now();
    let time = now.format("%H:%M:%S").to_string().dimmed();
    let base_line = format!("{} [{}] [{}] ", time, format_tag(tag), format_log_type(log_type));

    // time + two bracketed columns
    let prefix_width = 8 + 1 + TAG_WIDTH + 3 + LOG_TYPE_WIDTH + 3;
    let available = MAX_LINE_LENGTH.saturating_sub(prefix_width).max(50);
    let chunks = wrap_text(message, available);

    let timestamp = now.format("%Y-%m-%d %H:%M:%S").to_string();
    let tag_clean = tag.to_plain_string();

    for (i, chunk) in chunks.iter().enumerate() {
        if i == 0 {
            print_stdout_safe(&format!("{}{}", base_line, chunk));
        } else {
            print_stdout_safe(&format!("{}{}", " ".repeat(prefix_width), chunk));
        }
        write_to_file(&format!("{} [{}] [{}] {}", timestamp, tag_clean, log_type, chunk));
    }
}

/// The per-transaction line: `signature | amount SOL | kind`, amount to 4 decimals
pub fn format_transaction_line(signature: &str, amount: f64, kind: &str) -> String {
    format!("{} | {:.4} SOL | {}", signature, amount, kind)
}

fn format_tag(tag: &LogTag) -> ColoredString {
    let label = format!("{:<width$}", tag.to_plain_string(), width = TAG_WIDTH);
    match tag {
        LogTag::System => label.bright_yellow().bold(),
        LogTag::Monitor => label.bright_cyan().bold(),
        LogTag::Realtime => label.bright_green().bold(),
        LogTag::Historical => label.bright_blue().bold(),
        LogTag::Cache => label.cyan().bold(),
        LogTag::Queue => label.bright_white().bold(),
        LogTag::Rpc => label.bright_magenta().bold(),
        LogTag::Failover => label.bright_red().bold(),
        LogTag::Trader => label.green().bold(),
        LogTag::Transactions => label.bright_blue().bold(),
        LogTag::Other(_) => label.white().bold(),
    }
}

fn format_log_type(log_type: &str) -> ColoredString {
    let label = format!("{:<width$}", log_type, width = LOG_TYPE_WIDTH);
    match log_type {
        "ERROR" => label.bright_red().bold(),
        "WARNING" => label.bright_yellow().bold(),
        "TX" => label.bright_green().bold(),
        _ => label.white().bold(),
    }
}

/// Print to stdout but ignore broken pipe errors
fn print_stdout_safe(message: &str) {
    let mut out = stdout().lock();
    if let Err(e) = writeln!(out, "{}", message).and_then(|_| out.flush()) {
        if e.kind() == ErrorKind::BrokenPipe {
            std::process::exit(0);
        }
        let _ = writeln!(std::io::stderr(), "Logger stdout error: {}", e);
    }
}

/// Wrap text at word boundaries, respecting existing newlines.
/// Words longer than the width are split on char boundaries.
fn wrap_text(text: &str, max_width: usize) -> Vec<String> {
    let mut lines = Vec::new();

    for line in text.split('\n') {
        if line.chars().count() <= max_width {
            lines.push(line.to_string());
            continue;
        }

        let mut current = String::new();
        for word in line.split_whitespace() {
            let word_len = word.chars().count();
            let current_len = current.chars().count();

            if word_len > max_width {
                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
                let chars: Vec<char> = word.chars().collect();
                lines.extend(chars.chunks(max_width).map(|c| c.iter().collect::<String>()));
            } else if current.is_empty() {
                current = word.to_string();
            } else if current_len + 1 + word_len <= max_width {
                current.push(' ');
                current.push_str(word);
            } else {
                lines.push(std::mem::replace(&mut current, word.to_string()));
            }
        }
        if !current.is_empty() {
            lines.push(current);
        }
    }

    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_short_line_untouched() {
        assert_eq!(wrap_text("hello world", 50), vec!["hello world"]);
        assert_eq!(wrap_text("", 50), vec![""]);
    }

    #[test]
    fn test_wrap_at_word_boundaries() {
        assert_eq!(
            wrap_text("alpha beta gamma delta", 11),
            vec!["alpha beta", "gamma delta"]
        );
        assert_eq!(wrap_text("line one\nline two", 50), vec!["line one", "line two"]);
    }

    #[test]
    fn test_wrap_splits_long_words() {
        assert_eq!(wrap_text("abcdefghij", 4), vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn test_transaction_line() {
        assert_eq!(
            format_transaction_line("5VERv8", 1.5, "transfer"),
            "5VERv8 | 1.5000 SOL | transfer"
        );
    }
}
