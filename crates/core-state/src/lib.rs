//! Terminal session state: the line buffer, history, working directory and loop phase.
//!
//! `TerminalState` is the single aggregate mutated by the command loop in
//! `core-actions`. It carries no I/O beyond the history log; process
//! execution lives in `core-process` and is driven by `core-session`.
//!
//! Phase transitions:
//! - `Idle` → `Accumulating` when a submission ends with the continuation marker.
//! - `Accumulating` → `Idle` once a submission without the marker completes the command.
//! - `Idle` / `Accumulating` → `Executing` when a non-built-in command is dispatched.
//! - `Executing` → `Idle` after the output is written back and the prompt re-armed.

use core_config::Platform;
use core_history::HistoryStore;
use core_text::LineBuffer;
use std::path::{Path, PathBuf};
use tracing::trace;

/// Renders the prompt for the current working directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptFormatter {
    platform: Platform,
}

impl PromptFormatter {
    pub fn new(platform: Platform) -> Self {
        Self { platform }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// `"PS {cwd}>"` on Windows, `"{cwd}$ "` elsewhere.
    pub fn render(&self, cwd: &Path) -> String {
        let cwd = cwd.display();
        match self.platform {
            Platform::Windows => format!("PS {cwd}{}", self.platform.sign()),
            Platform::Posix => format!("{cwd}{}", self.platform.sign()),
        }
    }
}

/// Pending text of a command split across submissions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LongCommand {
    pending: String,
    active: bool,
}

impl LongCommand {
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn pending(&self) -> &str {
        &self.pending
    }

    /// Append a fragment and keep accumulating.
    pub fn push(&mut self, fragment: &str) {
        self.pending.push_str(fragment);
        self.active = true;
    }

    /// Take the accumulated text, leaving the accumulator empty and inactive.
    pub fn take(&mut self) -> String {
        self.active = false;
        std::mem::take(&mut self.pending)
    }
}

/// Command loop phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Accumulating,
    Executing,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Accumulating => "accumulating",
            Phase::Executing => "executing",
        }
    }
}

pub struct TerminalState {
    pub buffer: LineBuffer,
    pub history: HistoryStore,
    pub long_command: LongCommand,
    phase: Phase,
    cwd: PathBuf,
    prompt: PromptFormatter,
}

impl std::fmt::Debug for TerminalState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminalState")
            .field("buffer", &self.buffer)
            .field("history_len", &self.history.len())
            .field("long_command", &self.long_command.is_active())
            .field("phase", &self.phase)
            .field("cwd", &self.cwd)
            .finish()
    }
}

impl TerminalState {
    /// Build a state for `platform` rooted at `cwd`. The buffer starts empty; call
    /// [`TerminalState::prime`] to display the first prompt.
    pub fn new(platform: Platform, history: HistoryStore, cwd: PathBuf) -> Self {
        Self {
            buffer: LineBuffer::new(),
            history,
            long_command: LongCommand::default(),
            phase: Phase::Idle,
            cwd,
            prompt: PromptFormatter::new(platform),
        }
    }

    /// Insert the initial prompt.
    pub fn prime(&mut self) {
        self.insert_prompt();
    }

    pub fn platform(&self) -> Platform {
        self.prompt.platform()
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn set_cwd(&mut self, cwd: PathBuf) {
        trace!(target: "loop.submit", cwd = %cwd.display(), "cwd_changed");
        self.cwd = cwd;
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn set_phase(&mut self, phase: Phase) {
        if phase != self.phase {
            trace!(target: "loop.submit", from = self.phase.as_str(), to = phase.as_str(), "phase_changed");
        }
        self.phase = phase;
    }

    pub fn is_executing(&self) -> bool {
        self.phase == Phase::Executing
    }

    /// Prompt rendering for the current working directory.
    pub fn prompt(&self) -> String {
        self.prompt.render(&self.cwd)
    }

    /// Append a freshly rendered prompt; the cursor and latest mark land right after it.
    pub fn insert_prompt(&mut self) {
        let prompt = self.prompt();
        self.buffer.insert_prompt(&prompt);
    }

    /// Newline followed by a fresh prompt, returning to `Idle`.
    pub fn reprompt(&mut self) {
        self.buffer.newline();
        self.insert_prompt();
        self.set_phase(Phase::Idle);
    }
}
