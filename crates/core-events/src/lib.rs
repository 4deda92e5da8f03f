//! Core event types and channel helpers for shellpane.
//!
//! The command loop never sees host key names. Hosts translate whatever their
//! toolkit reports (crossterm keys in the reference binary, widget callbacks
//! elsewhere) into the closed `InputEvent` set below, and the loop dispatches
//! on that set only.

use std::sync::atomic::AtomicU64;

// -------------------------------------------------------------------------------------------------
// Channel Policy
// -------------------------------------------------------------------------------------------------
// One bounded mpsc channel carries every event to the session. The input task uses `send().await`
// so a slow consumer parks the producer instead of dropping keystrokes. The session is the single
// consumer; while a child process runs it keeps draining the channel so `CancelRequested` is seen
// promptly, deferring everything else until the loop is idle again.
// -------------------------------------------------------------------------------------------------
pub const EVENT_CHANNEL_CAP: usize = 1024;

// -------------------------------------------------------------------------------------------------
// Telemetry
// -------------------------------------------------------------------------------------------------
// Relaxed atomic counters, inspected by tests and logged at shutdown.
// -------------------------------------------------------------------------------------------------
pub static CHANNEL_SEND_FAILURES: AtomicU64 = AtomicU64::new(0);
pub static INPUT_EVENTS_TOTAL: AtomicU64 = AtomicU64::new(0);
pub static PASTE_BYTES: AtomicU64 = AtomicU64::new(0);
pub static COMMANDS_EXECUTED: AtomicU64 = AtomicU64::new(0);
pub static COMMANDS_CANCELLED: AtomicU64 = AtomicU64::new(0);
pub static EVENTS_DEFERRED: AtomicU64 = AtomicU64::new(0);

/// Top-level event enum consumed by the session loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Input(InputEvent),
    Command(CommandEvent),
    Shutdown,
}

/// Control requests that do not originate from the keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandEvent {
    /// The `exit` built-in ran; the embedding container should close the widget.
    RequestClose,
}

/// Normalized input events delivered by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    /// Enter. Carries no payload: the loop reads the live line from its own buffer.
    Submit,
    /// Up arrow: previous history entry.
    RecallOlder,
    /// Down arrow: next history entry, or a blank line past the newest one.
    RecallNewer,
    CursorLeft,
    CursorRight,
    Backspace,
    /// Click or selection change that moved the insertion cursor. Coordinates are buffer
    /// coordinates (line index, byte offset within the line); hosts map screen cells first.
    CursorMoved { line: usize, byte: usize },
    /// Interrupt key. Honored only while a command is executing.
    CancelRequested,
    /// Typed or pasted text. Never logged verbatim; log `len()` only.
    TextCommit(String),
    /// Host surface resized (columns, rows). The loop ignores it; renderers repaint.
    Resize(u16, u16),
}

impl InputEvent {
    /// Stable label for structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            InputEvent::Submit => "submit",
            InputEvent::RecallOlder => "recall_older",
            InputEvent::RecallNewer => "recall_newer",
            InputEvent::CursorLeft => "cursor_left",
            InputEvent::CursorRight => "cursor_right",
            InputEvent::Backspace => "backspace",
            InputEvent::CursorMoved { .. } => "cursor_moved",
            InputEvent::CancelRequested => "cancel_requested",
            InputEvent::TextCommit(_) => "text_commit",
            InputEvent::Resize(..) => "resize",
        }
    }
}
