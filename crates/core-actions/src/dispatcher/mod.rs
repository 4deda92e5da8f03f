//! Dispatcher applying `InputEvent`s to the terminal state.
//!
//! Sub-modules:
//! * `submit`  - submission transition, continuation handling, execution write-back
//! * `command` - built-ins handled in-process (`clear`, `cls`, `exit`, `cd`)
//! * `recall`  - history navigation
//! * `edit`    - live-line editing and cursor motion
//!
//! Dispatch never blocks. A shell command is handed back to the caller as an
//! [`ExecRequest`]; the caller runs it and reports back through
//! [`complete_execution`]. While the state is `Executing` only
//! `CancelRequested` has an effect.

use core_events::InputEvent;
use core_state::{Phase, TerminalState};
use std::path::PathBuf;
use tracing::trace;

mod command;
pub(crate) mod command_parser;
mod edit;
mod recall;
mod submit;

pub use command::{CdError, resolve_cd};
pub use submit::complete_execution;

/// Shell command the caller must run before the loop can accept another submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecRequest {
    pub command: String,
    pub cwd: PathBuf,
}

/// Result of dispatching a single event.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DispatchResult {
    pub dirty: bool,
    pub quit: bool,
    /// Set when a submission dispatched a shell command.
    pub execute: Option<ExecRequest>,
    /// Set when the in-flight command should be terminated.
    pub cancel: bool,
}

impl DispatchResult {
    pub fn dirty() -> Self {
        Self {
            dirty: true,
            ..Self::default()
        }
    }
    pub fn clean() -> Self {
        Self::default()
    }
    pub fn quit() -> Self {
        Self {
            dirty: true,
            quit: true,
            ..Self::default()
        }
    }
    pub fn execute(request: ExecRequest) -> Self {
        Self {
            dirty: true,
            execute: Some(request),
            ..Self::default()
        }
    }
    pub fn cancel() -> Self {
        Self {
            cancel: true,
            ..Self::default()
        }
    }
}

/// Apply an input event to the state.
pub fn dispatch(event: &InputEvent, state: &mut TerminalState) -> DispatchResult {
    if state.phase() == Phase::Executing {
        return match event {
            InputEvent::CancelRequested => DispatchResult::cancel(),
            other => {
                trace!(target: "loop.submit", kind = other.kind(), "ignored_while_executing");
                DispatchResult::clean()
            }
        };
    }

    match event {
        InputEvent::Submit => submit::handle_submit(state),
        InputEvent::RecallOlder => recall::handle_recall_older(state),
        InputEvent::RecallNewer => recall::handle_recall_newer(state),
        InputEvent::TextCommit(_)
        | InputEvent::Backspace
        | InputEvent::CursorLeft
        | InputEvent::CursorRight
        | InputEvent::CursorMoved { .. } => edit::handle_edit(event, state),
        InputEvent::CancelRequested => {
            trace!(target: "loop.submit", "cancel_ignored_idle");
            DispatchResult::clean()
        }
        InputEvent::Resize(_, _) => DispatchResult::dirty(),
    }
}
