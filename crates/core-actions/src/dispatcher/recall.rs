//! History recall: swap the live region for an older or newer entry.

use super::DispatchResult;
use core_history::Recall;
use core_state::TerminalState;
use tracing::trace;

pub(crate) fn handle_recall_older(state: &mut TerminalState) -> DispatchResult {
    match state.history.recall_older() {
        Some(entry) => {
            trace!(target: "loop.submit", index = state.history.index(), "recall_older");
            replace_live(state, &entry);
            DispatchResult::dirty()
        }
        None => DispatchResult::clean(),
    }
}

pub(crate) fn handle_recall_newer(state: &mut TerminalState) -> DispatchResult {
    let entry = match state.history.recall_newer() {
        Recall::Entry(entry) => entry,
        Recall::Blank => String::new(),
    };
    trace!(target: "loop.submit", index = state.history.index(), blank = entry.is_empty(), "recall_newer");
    replace_live(state, &entry);
    DispatchResult::dirty()
}

// A continuation line carries no prompt, so the recalled text replaces it bare.
fn replace_live(state: &mut TerminalState, entry: &str) {
    let prefix = if state.long_command.is_active() {
        String::new()
    } else {
        state.prompt()
    };
    state.buffer.replace_live(&prefix, entry);
}
