//! Styled terminal output for comparison results.

use console::{Term, style};
use std::fmt::Display;

/// Terminal output helper.
pub struct Output {
    term: Term,
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

impl Output {
    pub fn new() -> Self {
        Self {
            term: Term::stdout(),
        }
    }

    /// Green checkmark line.
    pub fn success(&self, message: impl Display) {
        drop(
            self.term
                .write_line(&format!("{} {}", style("✓").green().bold(), message)),
        );
    }

    /// Red cross line.
    pub fn error(&self, message: impl Display) {
        drop(
            self.term
                .write_line(&format!("{} {}", style("✗").red().bold(), message)),
        );
    }

    /// Yellow warning line.
    pub fn warning(&self, message: impl Display) {
        drop(
            self.term
                .write_line(&format!("{} {}", style("⚠").yellow().bold(), message)),
        );
    }

    pub fn info(&self, message: impl Display) {
        drop(
            self.term
                .write_line(&format!("{} {}", style("ℹ").blue().bold(), message)),
        );
    }

    /// Multi-line text, each line indented under the previous status line.
    pub fn block(&self, text: impl Display) {
        for line in text.to_string().lines() {
            drop(self.term.write_line(&format!("  {line}")));
        }
    }

    pub fn labeled(&self, label: impl Display, value: impl Display) {
        drop(
            self.term
                .write_line(&format!("{}: {}", style(label).dim(), value)),
        );
    }

    /// Print a percentage with two decimals, colored by whether it passed.
    pub fn rate(&self, label: impl Display, rate: f64, passed: bool) {
        let value = format!("{:.2}%", rate * 100.0);
        let value = if passed {
            style(value).green()
        } else {
            style(value).red().bold()
        };
        self.labeled(label, value);
    }
}
