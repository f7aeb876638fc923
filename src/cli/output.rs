//! CLI output formatting

use crate::core::{Branch, ExecutionStatus, LogEntry, Severity};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "! ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Create a percentage progress bar
pub fn create_progress_bar() -> ProgressBar {
    let progress = ProgressBar::new(100);
    if let Ok(template) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% {msg}")
    {
        progress.set_style(template.progress_chars("#>-"));
    }
    progress.enable_steady_tick(Duration::from_millis(100));
    progress
}

/// Format a log event for display
pub fn format_log(entry: &LogEntry) -> String {
    let icon = match entry.severity {
        Severity::Info => INFO,
        Severity::Success => CHECK,
        Severity::Warning => WARN,
        Severity::Error => CROSS,
    };

    let message = match entry.severity {
        Severity::Info => style(&entry.message).to_string(),
        Severity::Success => style(&entry.message).green().to_string(),
        Severity::Warning => style(&entry.message).yellow().to_string(),
        Severity::Error => style(&entry.message).red().to_string(),
    };

    format!("{} {} {}", style(&entry.timestamp).dim(), icon, message)
}

/// Format a run status for display
pub fn format_status(status: ExecutionStatus) -> String {
    match status {
        ExecutionStatus::Pending => style("PENDING").dim().to_string(),
        ExecutionStatus::Running => style("RUNNING").yellow().to_string(),
        ExecutionStatus::Completed => style("COMPLETED").green().to_string(),
        ExecutionStatus::Failed => style("FAILED").red().to_string(),
        ExecutionStatus::Cancelled => style("CANCELLED").yellow().to_string(),
    }
}

/// Format one branch listing row
pub fn format_branch(branch: &Branch) -> String {
    let name = if branch.is_release {
        style(&branch.name).bold().cyan().to_string()
    } else {
        style(&branch.name).bold().to_string()
    };

    format!(
        "  {} {} {}",
        style(&branch.commit_hash).dim(),
        name,
        style(&branch.description).dim()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_log_keeps_message() {
        console::set_colors_enabled(false);
        let entry = LogEntry {
            timestamp: "10:00:00".to_string(),
            message: "Build script finished".to_string(),
            severity: Severity::Success,
        };
        let line = format_log(&entry);
        assert!(line.starts_with("10:00:00"));
        assert!(line.contains("Build script finished"));
    }

    #[test]
    fn test_format_branch() {
        console::set_colors_enabled(false);
        let branch = Branch::new("release/0804", "0123456789abcdef");
        let line = format_branch(&branch);
        assert!(line.contains("01234567"));
        assert!(line.contains("release/0804"));
        assert!(line.contains("Release branch"));
    }
}
