//! Terminal output for the courier CLI

use colored::*;
use courier_core::EventKind;

/// Formats human-readable command output.
///
/// A quiet console (used when `--json` is active) drops everything except
/// warnings, so machine-readable output on stdout stays parseable.
pub struct CliConsole {
    quiet: bool,
}

impl CliConsole {
    pub const fn new(quiet: bool) -> Self {
        Self { quiet }
    }

    /// Progress note, dimmed
    pub fn note(&self, message: &str) {
        if !self.quiet {
            println!("{} {}", "·".dimmed(), message.dimmed());
        }
    }

    pub fn success(&self, message: &str) {
        if !self.quiet {
            println!("{} {}", "✓".green().bold(), message.green());
        }
    }

    /// Warnings go to stderr and are never suppressed
    pub fn warn(&self, message: &str) {
        eprintln!("{} {}", "⚠".yellow().bold(), message.yellow());
    }

    pub fn section(&self, title: &str) {
        if self.quiet {
            return;
        }
        println!();
        println!("{}", title.to_uppercase().bold());
    }

    /// One aligned `label  value` line
    pub fn field(&self, label: &str, value: impl std::fmt::Display) {
        if !self.quiet {
            println!("  {:<28} {}", label.dimmed(), value);
        }
    }

    /// Event counter, colored by how alarming the event kind is
    pub fn event_count(&self, kind: EventKind, count: u64) {
        let rendered = match kind {
            EventKind::Queued | EventKind::Executing => count.to_string().normal(),
            EventKind::Limited | EventKind::Retry if count > 0 => count.to_string().yellow(),
            EventKind::Failed if count > 0 => count.to_string().red().bold(),
            _ => count.to_string().dimmed(),
        };
        self.field(kind.as_str(), rendered);
    }

    pub fn rule(&self) {
        if !self.quiet {
            println!("{}", "─".repeat(48).dimmed());
        }
    }
}
