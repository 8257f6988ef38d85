//! ShellEvents - core → shell callbacks
//!
//! The shell (GUI, CLI, test harness) receives log lines and run-state flips
//! through this trait. The core never touches a UI scheduling primitive.

use std::sync::{Arc, Mutex, PoisonError};

use crate::RunMode;

/// Callbacks from the core to the external shell
///
/// Implementations must be cheap and non-blocking; they are invoked from worker tasks.
pub trait ShellEvents: Send + Sync {
    /// One user-facing log line
    fn on_log(&self, mode: RunMode, line: &str);

    /// Mode started (`running = true`) or stopped
    fn on_mode_state_changed(&self, mode: RunMode, running: bool);
}

/// Shell that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullShell;

impl ShellEvents for NullShell {
    fn on_log(&self, _mode: RunMode, _line: &str) {}

    fn on_mode_state_changed(&self, _mode: RunMode, _running: bool) {}
}

/// Shell that records every event, for tests and previews
#[derive(Debug, Default)]
pub struct RecordingShell {
    lines: Mutex<Vec<(RunMode, String)>>,
    states: Mutex<Vec<(RunMode, bool)>>,
}

impl RecordingShell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log lines emitted for `mode`
    pub fn lines(&self, mode: RunMode) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(m, _)| *m == mode)
            .map(|(_, line)| line.clone())
            .collect()
    }

    /// `true` if any line for `mode` contains `needle`
    pub fn contains(&self, mode: RunMode, needle: &str) -> bool {
        self.lines(mode).iter().any(|line| line.contains(needle))
    }

    /// Running-state transitions in the order they were reported
    pub fn state_changes(&self) -> Vec<(RunMode, bool)> {
        self.states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ShellEvents for RecordingShell {
    fn on_log(&self, mode: RunMode, line: &str) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((mode, line.to_string()));
    }

    fn on_mode_state_changed(&self, mode: RunMode, running: bool) {
        self.states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((mode, running));
    }
}

/// Mode-tagged logger handed to scheduler components
///
/// Every line goes to `tracing` and to the shell.
#[derive(Clone)]
pub struct ModeLog {
    mode: RunMode,
    shell: Arc<dyn ShellEvents>,
}

impl ModeLog {
    pub fn new(mode: RunMode, shell: Arc<dyn ShellEvents>) -> Self {
        Self { mode, shell }
    }

    /// Logger that only traces
    pub fn detached(mode: RunMode) -> Self {
        Self::new(mode, Arc::new(NullShell))
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    pub fn info(&self, line: impl AsRef<str>) {
        let line = line.as_ref();
        tracing::info!(mode = %self.mode, "{line}");
        self.shell.on_log(self.mode, line);
    }

    pub fn warn(&self, line: impl AsRef<str>) {
        let line = line.as_ref();
        tracing::warn!(mode = %self.mode, "{line}");
        self.shell.on_log(self.mode, line);
    }

    pub fn error(&self, line: impl AsRef<str>) {
        let line = line.as_ref();
        tracing::error!(mode = %self.mode, "{line}");
        self.shell.on_log(self.mode, line);
    }

    /// Forward a running-state flip to the shell
    pub fn state_changed(&self, running: bool) {
        self.shell.on_mode_state_changed(self.mode, running);
    }
}

impl std::fmt::Debug for ModeLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModeLog").field("mode", &self.mode).finish()
    }
}
