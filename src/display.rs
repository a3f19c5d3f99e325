//! Colored terminal output for the CLI.

use std::io::{self, Write};

use chrono::Utc;
use owo_colors::OwoColorize;

use crate::config::RoovisionConfig;
use crate::extract::FinalRecord;
use crate::processor::ProcessorStats;

/// Get current timestamp in the same format as tracing.
fn timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// Truncate a string to at most `max_len` characters, adding an ellipsis if
/// truncated.
#[must_use]
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        "...".to_string()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{head}...")
    }
}

/// Print the startup banner.
pub fn print_banner() {
    let rule = "=".repeat(60);
    println!("{}", rule.dimmed());
    println!("  {}", "Roovision".cyan().bold());
    println!("  Automated changelog extraction for Roo Code");
    println!("{}", rule.dimmed());
    let _ = io::stdout().flush();
}

/// Print the effective configuration.
pub fn print_config(config: &RoovisionConfig) {
    let modes: Vec<&str> = config.skip_modes.iter().map(|m| m.as_str()).collect();
    let rows = [
        ("Tasks path", config.tasks_path.display().to_string()),
        ("Output path", config.output_path.display().to_string()),
        ("Ledger path", config.ledger_path.display().to_string()),
        ("Conversation file", config.conversation_filename.clone()),
        ("Max read bytes", config.max_read_bytes.to_string()),
        ("Look-ahead bytes", config.lookahead_bytes.to_string()),
        ("Look-behind bytes", config.lookbehind_bytes.to_string()),
        ("Debounce (ms)", config.debounce_ms.to_string()),
        ("Max file age (days)", config.max_file_age_days.to_string()),
        ("Ledger file size", config.max_log_file_size_bytes.to_string()),
        ("Ledger rotations", config.log_rotation_count.to_string()),
        ("Skip modes", modes.join(", ")),
    ];
    println!("{}", "[CONFIG]".blue().bold());
    for (label, value) in rows {
        println!("  {:<20} {}", format!("{label}:").dimmed(), value);
    }
    let _ = io::stdout().flush();
}

/// Print what startup discovery found.
pub fn print_startup(files: usize, skipped_old: usize, processed_ids: usize) {
    println!(
        "{} {} tracking {} file(s), {} older skipped, {} IDs already processed",
        timestamp().dimmed(),
        "[START]".green().bold(),
        files.to_string().cyan(),
        skipped_old,
        processed_ids
    );
    println!(
        "{} {} Watching for new subtask completions (Ctrl-C to stop)",
        timestamp().dimmed(),
        "[START]".green().bold()
    );
    let _ = io::stdout().flush();
}

/// Print session statistics.
pub fn print_stats(stats: &ProcessorStats) {
    let rows = [
        ("Files processed", stats.files_processed),
        ("Subtasks found", stats.records_found),
        ("Changelogs written", stats.changelogs_written),
        ("Duplicates skipped", stats.duplicates_skipped),
        ("Mode skipped", stats.mode_skipped),
        ("Unpaired dropped", stats.unpaired_dropped),
        ("Errors", stats.errors),
    ];
    println!("{}", "[STATS]".blue().bold());
    for (label, value) in rows {
        println!("  {:<20} {}", format!("{label}:").dimmed(), value);
    }
    let _ = io::stdout().flush();
}

/// Print one extracted record.
pub fn print_record(record: &FinalRecord, full: bool) {
    println!(
        "{} {} mode={} completed={}",
        "[SUBTASK]".magenta().bold(),
        record.id.cyan(),
        record.mode,
        record.timestamp.format("%Y-%m-%dT%H:%M:%S%.3fZ")
    );
    if full {
        println!("{}\n{}\n", "Instruction:".bold(), record.instruction);
        println!("{}\n{}\n", "Result:".bold(), record.result);
    } else {
        println!("  {} {}", "instruction:".dimmed(), truncate(&one_line(&record.instruction), 100));
        println!("  {} {}", "result:".dimmed(), truncate(&one_line(&record.result), 100));
    }
    let _ = io::stdout().flush();
}

fn one_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Print an error message.
pub fn print_error(message: &str) {
    eprintln!("{} {}", "[ERROR]".red().bold(), message);
}
