//! ConsoleShell - prints core events to the terminal

use std::io::Write;

use chrono::Local;
use contracts::{RunMode, ShellEvents};

/// Shell that writes each mode's log lines to stdout with a local timestamp
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleShell {
    quiet: bool,
}

impl ConsoleShell {
    /// `quiet` drops log lines; state changes are always shown
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }
}

pub fn format_line(timestamp: &str, mode: RunMode, line: &str) -> String {
    format!("{timestamp} [{:<9}] {line}", mode.as_str())
}

impl ShellEvents for ConsoleShell {
    fn on_log(&self, mode: RunMode, line: &str) {
        if self.quiet {
            return;
        }
        let timestamp = Local::now().format("%H:%M:%S%.3f").to_string();
        let mut out = std::io::stdout().lock();
        // a closed stdout must not take the worker down
        let _ = writeln!(out, "{}", format_line(&timestamp, mode, line));
    }

    fn on_mode_state_changed(&self, mode: RunMode, running: bool) {
        let state = if running { "running" } else { "stopped" };
        let _ = writeln!(std::io::stderr().lock(), "● {mode}: {state}");
    }
}
