//! Live-line editing and cursor motion.
//!
//! All guards live in `core_text::LineBuffer`: text insertion and backspace are
//! suppressed while the cursor sits before the latest mark, and left motion
//! or backspace at the first editable column is swallowed.

use super::DispatchResult;
use core_events::InputEvent;
use core_state::TerminalState;
use tracing::trace;

pub(crate) fn handle_edit(event: &InputEvent, state: &mut TerminalState) -> DispatchResult {
    let before = state.buffer.cursor();
    let changed = match event {
        InputEvent::TextCommit(text) => state.buffer.insert_text(text),
        InputEvent::Backspace => state.buffer.backspace(),
        InputEvent::CursorLeft => state.buffer.cursor_left(),
        InputEvent::CursorRight => state.buffer.cursor_right(),
        InputEvent::CursorMoved { line, byte } => {
            state.buffer.on_cursor_moved(*line, *byte);
            true
        }
        _ => false,
    };
    let after = state.buffer.cursor();
    trace!(
        target: "loop.edit",
        op = event.kind(),
        changed,
        line = before.line,
        byte = before.byte,
        to_line = after.line,
        to_byte = after.byte,
        locked = state.buffer.is_locked(),
        "edit"
    );
    if changed {
        DispatchResult::dirty()
    } else {
        DispatchResult::clean()
    }
}
