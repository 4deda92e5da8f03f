//! Command loop transitions for the terminal widget.
//!
//! The host feeds [`core_events::InputEvent`]s into [`dispatch`]; the returned
//! [`DispatchResult`] tells it whether to repaint, close, run a shell command,
//! or cancel the one in flight.

pub mod dispatcher;

pub use dispatcher::command_parser::{CdTarget, CommandParser, ParsedCommand};
pub use dispatcher::{
    CdError, DispatchResult, ExecRequest, complete_execution, dispatch, resolve_cd,
};
