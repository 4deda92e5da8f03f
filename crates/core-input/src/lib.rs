//! Terminal input service: crossterm events in, `InputEvent`s out.
//!
//! Key bindings:
//! * Enter → `Submit`, Up/Down → history recall, Left/Right → cursor motion
//! * Backspace → `Backspace`, Ctrl-C → `CancelRequested`
//! * printable characters and bracketed paste → `TextCommit`
//! * left mouse press → `CursorMoved`, mapped through a [`ClickMapper`]

mod async_service;
pub use async_service::AsyncInputShutdown;

use async_service::spawn_async_event_task;

use core_events::{Event, InputEvent};
use crossterm::event::{KeyCode as CKeyCode, KeyEvent as CKeyEvent, KeyModifiers as CMods};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Translates a screen cell into a buffer position (line index, byte offset).
///
/// Implemented by the renderer, which is the only component that knows how
/// buffer lines are laid out on screen.
pub trait ClickMapper: Send + Sync {
    fn map_click(&self, column: u16, row: u16) -> Option<(usize, usize)>;
}

#[inline]
pub(crate) fn log_text_commit(text: &str) {
    tracing::trace!(target: "input.event", kind = "text_commit", len = text.len());
}

/// Spawn the async input service backed by `crossterm::EventStream`.
///
/// Returns the `JoinHandle` for the background task alongside a shutdown handle
/// that can be used to request immediate termination.
pub fn spawn_async_input(
    sender: tokio::sync::mpsc::Sender<Event>,
    clicks: Arc<dyn ClickMapper>,
) -> (JoinHandle<()>, AsyncInputShutdown) {
    spawn_async_event_task(sender, clicks)
}

/// Map a key press to an input event. Returns `None` for unbound keys.
pub fn map_key(key: &CKeyEvent) -> Option<InputEvent> {
    let ctrl = key.modifiers.contains(CMods::CONTROL);
    let alt = key.modifiers.contains(CMods::ALT);
    match key.code {
        CKeyCode::Char('c') | CKeyCode::Char('C') if ctrl => Some(InputEvent::CancelRequested),
        CKeyCode::Char(_) if ctrl || alt => None,
        CKeyCode::Char(ch) => Some(InputEvent::TextCommit(ch.to_string())),
        CKeyCode::Enter => Some(InputEvent::Submit),
        CKeyCode::Up => Some(InputEvent::RecallOlder),
        CKeyCode::Down => Some(InputEvent::RecallNewer),
        CKeyCode::Left => Some(InputEvent::CursorLeft),
        CKeyCode::Right => Some(InputEvent::CursorRight),
        CKeyCode::Backspace => Some(InputEvent::Backspace),
        _ => None,
    }
}
