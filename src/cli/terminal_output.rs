//! Terminal sink for runs started from the command line
//!
//! Log events are printed above an `indicatif` progress bar; progress events
//! move the bar.

use crate::cli::output::{create_progress_bar, format_log};
use crate::core::RunEvent;
use crate::execution::EventSink;
use indicatif::ProgressBar;

/// Event sink that renders a run to the terminal
pub struct TerminalSink {
    bar: ProgressBar,
}

impl TerminalSink {
    pub fn new() -> Self {
        Self::with_bar(create_progress_bar())
    }

    /// Render into an existing bar (hidden bars are useful in tests)
    pub fn with_bar(bar: ProgressBar) -> Self {
        Self { bar }
    }

    /// Stop the spinner and leave the bar in place
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl Default for TerminalSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for TerminalSink {
    fn emit(&self, event: RunEvent) {
        match event {
            RunEvent::Log(entry) => {
                self.bar.set_message(entry.message.clone());
                self.bar.println(format_log(&entry));
            }
            RunEvent::Progress(update) => self.bar.set_position(u64::from(update.progress)),
        }
    }
}
