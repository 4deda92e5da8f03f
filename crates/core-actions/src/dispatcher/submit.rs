//! Submission transition and execution write-back.

use super::command::{handle_cd, handle_clear, handle_exit};
use super::command_parser::{CommandParser, ParsedCommand};
use super::{DispatchResult, ExecRequest};
use core_events::COMMANDS_EXECUTED;
use core_process::RunOutput;
use core_state::{Phase, TerminalState};
use core_text::normalize_line_endings;
use std::sync::atomic::Ordering;
use tracing::{debug, error, info};

pub(crate) fn handle_submit(state: &mut TerminalState) -> DispatchResult {
    let platform = state.platform();
    let extracted = state.buffer.extract_command(platform.sign());
    let accumulating = state.long_command.is_active();
    debug!(target: "loop.submit", len = extracted.len(), accumulating, "submit");

    let effective = if accumulating {
        let mut joined = state.long_command.take();
        joined.push_str(&extracted);
        joined
    } else {
        extracted
    };

    if let Some(head) = effective.strip_suffix(platform.continuation_marker()) {
        state.long_command.push(head);
        state.buffer.open_continuation_line();
        state.set_phase(Phase::Accumulating);
        debug!(target: "loop.submit", pending = state.long_command.pending().len(), "continuation_pending");
        return DispatchResult::dirty();
    }

    let parsed = CommandParser::parse(&effective);
    if parsed != ParsedCommand::Empty
        && let Err(e) = state.history.record(&effective)
    {
        error!(target: "history", error = %e, "history_append_failed");
    }

    match parsed {
        ParsedCommand::Empty => {
            state.reprompt();
            DispatchResult::dirty()
        }
        ParsedCommand::Clear => handle_clear(state),
        ParsedCommand::Exit => handle_exit(state),
        ParsedCommand::Cd(target) => handle_cd(target, state),
        ParsedCommand::Run(command) => {
            state.buffer.move_cursor_to_end();
            state.set_phase(Phase::Executing);
            COMMANDS_EXECUTED.fetch_add(1, Ordering::Relaxed);
            info!(target: "loop.exec", cmd_len = command.len(), cwd = %state.cwd().display(), "exec_dispatched");
            DispatchResult::execute(ExecRequest {
                command,
                cwd: state.cwd().to_path_buf(),
            })
        }
    }
}

/// Write a finished (or cancelled) run back into the buffer and re-arm the prompt.
pub fn complete_execution(state: &mut TerminalState, output: &RunOutput) -> DispatchResult {
    let combined = output.combined();
    let text = normalize_line_endings(&combined);
    state.buffer.newline();
    state.buffer.append_output(&text);
    if !text.is_empty() && !text.ends_with('\n') {
        state.buffer.newline();
    }
    state.insert_prompt();
    state.set_phase(Phase::Idle);
    info!(
        target: "loop.exec",
        exit_code = ?output.exit_code,
        cancelled = output.cancelled,
        output_len = text.len(),
        idx = state.buffer.idx(),
        "exec_completed"
    );
    DispatchResult::dirty()
}
