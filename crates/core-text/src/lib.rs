//! Rope-backed line buffer for the terminal widget.
//!
//! The buffer is split into a frozen region (every line before the logical
//! line index `idx`: earlier prompts, commands and their output) and a live
//! region (line `idx` to the end: the prompt currently awaiting input).
//!
//! Invariants:
//! * `idx` only grows, one step per inserted `\n`; `clear` is the single reset.
//! * `latest` is the first editable column of the live region: the position
//!   just past the last prompt, or the start of a continuation line.
//! * While `cursor < latest` the buffer is locked: text insertion and
//!   backspace are suppressed until the cursor comes back.
//! * A cursor sitting exactly on `latest` cannot move left or delete left.
//! * Only `\n` breaks lines. Output is normalized with
//!   [`normalize_line_endings`] before it reaches the rope.
//!
//! Every mutation is mirrored as a [`BufferOp`] so hosts that keep their own
//! text widget can replay edits instead of repainting.

use ropey::Rope;
use std::borrow::Cow;
use tracing::trace;

/// A position inside the buffer expressed as (line index, byte offset within that line).
/// Ordering is lexicographic, which matches document order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Position {
    pub line: usize,
    pub byte: usize,
}

impl Position {
    pub fn new(line: usize, byte: usize) -> Self {
        Self { line, byte }
    }
    pub fn origin() -> Self {
        Self { line: 0, byte: 0 }
    }
}

/// Buffer mutation as seen by a rendering host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferOp {
    Insert { at: Position, text: String },
    Delete { start: Position, end: Position },
    SetCursor(Position),
    Clear,
}

#[derive(Clone)]
pub struct LineBuffer {
    rope: Rope,
    idx: usize,
    cursor: Position,
    latest: Position,
    locked: bool,
    ops: Vec<BufferOp>,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LineBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineBuffer")
            .field("lines", &self.rope.len_lines())
            .field("idx", &self.idx)
            .field("cursor", &self.cursor)
            .field("latest", &self.latest)
            .field("locked", &self.locked)
            .finish()
    }
}

impl LineBuffer {
    pub fn new() -> Self {
        Self {
            rope: Rope::new(),
            idx: 0,
            cursor: Position::origin(),
            latest: Position::origin(),
            locked: false,
            ops: Vec::new(),
        }
    }

    /// Total number of lines (an empty buffer has one empty line).
    pub fn line_count(&self) -> usize {
        self.rope.len_lines()
    }

    /// Line content without its trailing newline.
    pub fn line(&self, idx: usize) -> Option<String> {
        if idx < self.rope.len_lines() {
            Some(self.line_content(idx))
        } else {
            None
        }
    }

    /// Byte length of a line excluding the newline.
    pub fn line_byte_len(&self, idx: usize) -> usize {
        if idx >= self.rope.len_lines() {
            return 0;
        }
        let line = self.rope.line(idx);
        let len = line.len_bytes();
        if len > 0 && line.byte(len - 1) == b'\n' {
            len - 1
        } else {
            len
        }
    }

    pub fn text(&self) -> String {
        self.rope.to_string()
    }

    /// Everything from the start of line `idx` to the end of the buffer.
    pub fn live_text(&self) -> String {
        let start = self.rope.line_to_byte(self.idx.min(self.last_line()));
        self.rope.byte_slice(start..).to_string()
    }

    /// Logical line index of the first live line.
    pub fn idx(&self) -> usize {
        self.idx
    }

    pub fn cursor(&self) -> Position {
        self.cursor
    }

    /// First editable position of the live region.
    pub fn latest_mark(&self) -> Position {
        self.latest
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn end_position(&self) -> Position {
        let last = self.last_line();
        Position::new(last, self.line_byte_len(last))
    }

    /// Drain the mutations recorded since the previous call.
    pub fn take_ops(&mut self) -> Vec<BufferOp> {
        std::mem::take(&mut self.ops)
    }

    // ---------------------------------------------------------------------------------------------
    // Loop-driven mutations (always append at the end of the buffer)
    // ---------------------------------------------------------------------------------------------

    /// Append a prompt rendering and make the position after it the new latest mark.
    /// Does not advance `idx`.
    pub fn insert_prompt(&mut self, prompt: &str) {
        self.append(prompt);
        self.latest = self.cursor;
        self.locked = false;
        debug_assert_eq!(
            self.idx,
            self.last_line(),
            "prompt must land on the live line"
        );
    }

    /// Append a line break and advance the logical line index.
    pub fn newline(&mut self) {
        self.append("\n");
        self.idx += 1;
    }

    /// Line break for a pending continuation: no prompt follows, so the start
    /// of the new line becomes the first editable column.
    pub fn open_continuation_line(&mut self) {
        self.newline();
        self.latest = self.cursor;
        self.locked = false;
    }

    /// Append command output verbatim, advancing `idx` once per embedded newline.
    /// Callers normalize line endings first.
    pub fn append_output(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        self.append(text);
        self.idx += text.bytes().filter(|b| *b == b'\n').count();
    }

    /// Erase everything and reset the logical index to the start.
    pub fn clear(&mut self) {
        self.rope = Rope::new();
        self.idx = 0;
        self.cursor = Position::origin();
        self.latest = Position::origin();
        self.locked = false;
        self.ops.push(BufferOp::Clear);
    }

    /// Replace the live region with `prompt` followed by `text` (history recall).
    pub fn replace_live(&mut self, prompt: &str, text: &str) {
        let start = Position::new(self.idx.min(self.last_line()), 0);
        let end = self.end_position();
        self.delete_raw(start, end);
        self.set_cursor(start);
        self.insert_prompt(prompt);
        self.append(&single_line(text));
    }

    /// Move the insertion cursor to the end of the buffer (before dispatching a command).
    pub fn move_cursor_to_end(&mut self) {
        let end = self.end_position();
        if end != self.cursor {
            self.set_cursor(end);
        }
    }

    /// Raw text the user typed after the prompt: the live region with everything up to
    /// and including the last `sign` removed, then trimmed.
    pub fn extract_command(&self, sign: &str) -> String {
        let live = self.live_text();
        let tail = match live.rfind(sign) {
            Some(at) => &live[at + sign.len()..],
            None => live.as_str(),
        };
        tail.trim().to_string()
    }

    // ---------------------------------------------------------------------------------------------
    // User-driven edits and motions
    // ---------------------------------------------------------------------------------------------

    /// Cursor moved by a click or selection: clamp into the buffer and re-evaluate the lock.
    pub fn on_cursor_moved(&mut self, line: usize, byte: usize) {
        let pos = self.clamp(Position::new(line, byte));
        self.set_cursor(pos);
    }

    /// True when the cursor sits on the first editable column of the live region.
    pub fn guard_leftmost(&self) -> bool {
        self.cursor == self.latest
    }

    /// Insert typed or pasted text at the cursor. Line breaks inside pasted text are
    /// flattened to spaces; submitting is the loop's job. Returns false when suppressed.
    pub fn insert_text(&mut self, text: &str) -> bool {
        if self.locked {
            trace!(target: "buffer", len = text.len(), "insert_suppressed_locked");
            return false;
        }
        let text = single_line(text);
        if text.is_empty() {
            return false;
        }
        let end = self.insert_raw(self.cursor, &text);
        self.set_cursor(end);
        true
    }

    /// Delete the grapheme cluster before the cursor. Returns false when suppressed.
    pub fn backspace(&mut self) -> bool {
        if self.locked || self.guard_leftmost() || self.cursor.byte == 0 {
            return false;
        }
        let content = self.line_content(self.cursor.line);
        let mut start = Position::new(
            self.cursor.line,
            grapheme::prev_boundary(&content, self.cursor.byte),
        );
        if start < self.latest {
            start = self.latest;
        }
        let end = self.cursor;
        self.delete_raw(start, end);
        self.set_cursor(start);
        true
    }

    /// Move left one grapheme (wrapping to the previous line end). Returns false when swallowed.
    pub fn cursor_left(&mut self) -> bool {
        if self.guard_leftmost() {
            return false;
        }
        let target = if self.cursor.byte == 0 {
            if self.cursor.line == 0 {
                return false;
            }
            let prev = self.cursor.line - 1;
            Position::new(prev, self.line_byte_len(prev))
        } else {
            let content = self.line_content(self.cursor.line);
            let mut pos = Position::new(
                self.cursor.line,
                grapheme::prev_boundary(&content, self.cursor.byte),
            );
            if self.cursor > self.latest && pos < self.latest {
                pos = self.latest;
            }
            pos
        };
        self.set_cursor(target);
        true
    }

    /// Move right one grapheme (wrapping to the next line start).
    pub fn cursor_right(&mut self) -> bool {
        let len = self.line_byte_len(self.cursor.line);
        let target = if self.cursor.byte >= len {
            if self.cursor.line + 1 >= self.line_count() {
                return false;
            }
            Position::new(self.cursor.line + 1, 0)
        } else {
            let content = self.line_content(self.cursor.line);
            Position::new(
                self.cursor.line,
                grapheme::next_boundary(&content, self.cursor.byte),
            )
        };
        self.set_cursor(target);
        true
    }

    // ---------------------------------------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------------------------------------

    fn last_line(&self) -> usize {
        self.rope.len_lines().saturating_sub(1)
    }

    fn line_content(&self, idx: usize) -> String {
        let mut s = self.rope.line(idx).to_string();
        if s.ends_with('\n') {
            s.pop();
        }
        s
    }

    fn absolute_byte_index(&self, pos: Position) -> usize {
        self.rope.line_to_byte(pos.line) + pos.byte
    }

    fn position_of_byte(&self, abs: usize) -> Position {
        let line = self.rope.byte_to_line(abs);
        Position::new(line, abs - self.rope.line_to_byte(line))
    }

    fn clamp(&self, mut pos: Position) -> Position {
        pos.line = pos.line.min(self.last_line());
        let content = self.line_content(pos.line);
        pos.byte = pos.byte.min(content.len());
        while !content.is_char_boundary(pos.byte) {
            pos.byte -= 1;
        }
        pos
    }

    fn set_cursor(&mut self, pos: Position) {
        self.cursor = pos;
        let locked = pos < self.latest;
        if locked != self.locked {
            trace!(target: "buffer", locked, line = pos.line, byte = pos.byte, "lock_changed");
        }
        self.locked = locked;
        self.ops.push(BufferOp::SetCursor(pos));
    }

    fn append(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let end = self.end_position();
        let new_end = self.insert_raw(end, text);
        self.set_cursor(new_end);
    }

    /// Insert `text` at `at`, returning the position just past it.
    fn insert_raw(&mut self, at: Position, text: &str) -> Position {
        let abs = self.absolute_byte_index(at);
        let char_index = self.rope.byte_to_char(abs);
        self.rope.insert(char_index, text);
        self.ops.push(BufferOp::Insert {
            at,
            text: text.to_string(),
        });
        self.position_of_byte(abs + text.len())
    }

    fn delete_raw(&mut self, start: Position, end: Position) {
        let s = self.rope.byte_to_char(self.absolute_byte_index(start));
        let e = self.rope.byte_to_char(self.absolute_byte_index(end));
        if s >= e {
            return;
        }
        self.rope.remove(s..e);
        self.ops.push(BufferOp::Delete { start, end });
    }
}

/// Convert CRLF and lone CR to LF.
pub fn normalize_line_endings(input: &str) -> Cow<'_, str> {
    if !input.contains('\r') {
        return Cow::Borrowed(input);
    }
    Cow::Owned(input.replace("\r\n", "\n").replace('\r', "\n"))
}

/// Flatten line breaks to spaces so typed input stays on the live line.
fn single_line(input: &str) -> Cow<'_, str> {
    if !input.contains(['\n', '\r']) {
        return Cow::Borrowed(input);
    }
    Cow::Owned(input.replace("\r\n", " ").replace(['\r', '\n'], " "))
}

/// Grapheme and width utilities. Pure helpers operating on a single line.
pub mod grapheme {
    use unicode_segmentation::UnicodeSegmentation;
    use unicode_width::UnicodeWidthStr;

    /// Iterate grapheme clusters in a line.
    pub fn iter(line: &str) -> impl Iterator<Item = &str> {
        line.graphemes(true)
    }

    /// Previous grapheme boundary (returns 0 if already at or below 1st boundary).
    pub fn prev_boundary(line: &str, byte: usize) -> usize {
        if byte == 0 || byte > line.len() {
            return 0;
        }
        let mut last = 0;
        for (idx, _) in line.grapheme_indices(true) {
            if idx >= byte {
                break;
            }
            last = idx;
        }
        last
    }

    /// Next grapheme boundary (returns line.len() if at or beyond end).
    pub fn next_boundary(line: &str, byte: usize) -> usize {
        if byte >= line.len() {
            return line.len();
        }
        for (idx, _) in line.grapheme_indices(true) {
            if idx > byte {
                return idx;
            }
        }
        line.len()
    }

    /// Width in terminal cells of this grapheme cluster.
    pub fn cluster_width(g: &str) -> usize {
        g.width()
    }

    /// Compute visual column (terminal cells) up to (but not including) byte offset.
    pub fn visual_col(line: &str, byte: usize) -> usize {
        let mut col = 0;
        for (idx, g) in line.grapheme_indices(true) {
            if idx >= byte {
                break;
            }
            col += cluster_width(g);
        }
        col
    }

    /// Byte offset of the grapheme covering visual column `col` (line end when past it).
    pub fn byte_at_col(line: &str, col: usize) -> usize {
        let mut acc = 0;
        for (idx, g) in line.grapheme_indices(true) {
            let w = cluster_width(g);
            if acc + w > col {
                return idx;
            }
            acc += w;
        }
        line.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const PROMPT: &str = "/home/u$ ";

    fn primed() -> LineBuffer {
        let mut b = LineBuffer::new();
        b.insert_prompt(PROMPT);
        b.take_ops();
        b
    }

    #[test]
    fn prompt_sets_latest_mark_without_advancing_idx() {
        let b = primed();
        assert_eq!(b.idx(), 0);
        assert_eq!(b.latest_mark(), Position::new(0, PROMPT.len()));
        assert_eq!(b.cursor(), b.latest_mark());
        assert!(!b.is_locked());
    }

    #[test]
    fn newline_advances_idx() {
        let mut b = primed();
        b.newline();
        assert_eq!(b.idx(), 1);
        assert_eq!(b.line_count(), 2);
        assert_eq!(b.cursor(), Position::new(1, 0));
    }

    #[test]
    fn extract_command_takes_text_after_last_sign() {
        let mut b = primed();
        b.insert_text("  echo hi  ");
        assert_eq!(b.extract_command("$ "), "echo hi");
        // A pasted prompt lookalike is dropped along with the real prompt.
        b.insert_text("/tmp$ pwd");
        assert_eq!(b.extract_command("$ "), "pwd");
    }

    #[test]
    fn extract_command_ignores_frozen_lines() {
        let mut b = primed();
        b.insert_text("ls");
        b.newline();
        b.append_output("a.txt\nb.txt\n");
        b.insert_prompt(PROMPT);
        b.insert_text("pwd");
        assert_eq!(b.idx(), 3);
        assert_eq!(b.extract_command("$ "), "pwd");
    }

    #[test]
    fn output_advances_idx_per_newline() {
        let mut b = primed();
        b.newline();
        b.append_output("one\ntwo\nthree\n");
        assert_eq!(b.idx(), 4);
        b.insert_prompt(PROMPT);
        assert_eq!(b.line(4).unwrap(), PROMPT);
    }

    #[test]
    fn typing_before_latest_mark_is_suppressed() {
        let mut b = primed();
        b.insert_text("ls");
        b.on_cursor_moved(0, 2);
        assert!(b.is_locked());
        b.take_ops();
        assert!(!b.insert_text("x"));
        assert!(!b.backspace());
        assert!(b.take_ops().is_empty());
        assert_eq!(b.text(), format!("{PROMPT}ls"));
        // Returning to the live region unlocks.
        b.on_cursor_moved(0, PROMPT.len() + 2);
        assert!(!b.is_locked());
        assert!(b.insert_text("x"));
        assert_eq!(b.text(), format!("{PROMPT}lsx"));
    }

    #[test]
    fn left_and_backspace_swallowed_at_prompt_edge() {
        let mut b = primed();
        assert!(b.guard_leftmost());
        assert!(!b.cursor_left());
        assert!(!b.backspace());
        assert!(b.take_ops().is_empty());
        assert_eq!(b.cursor(), Position::new(0, PROMPT.len()));
    }

    #[test]
    fn backspace_removes_grapheme_cluster() {
        let mut b = primed();
        b.insert_text("ab😀");
        assert!(b.backspace());
        assert_eq!(b.text(), format!("{PROMPT}ab"));
        assert!(b.backspace());
        assert!(b.backspace());
        assert!(!b.backspace());
        assert_eq!(b.text(), PROMPT);
    }

    #[test]
    fn left_then_right_round_trips_within_live_line() {
        let mut b = primed();
        b.insert_text("abc");
        assert!(b.cursor_left());
        assert!(b.cursor_left());
        assert_eq!(b.cursor(), Position::new(0, PROMPT.len() + 1));
        assert!(b.insert_text("X"));
        assert_eq!(b.text(), format!("{PROMPT}aXbc"));
        assert!(b.cursor_right());
        assert!(b.cursor_right());
        assert!(!b.cursor_right());
    }

    #[test]
    fn replace_live_rewrites_only_live_region() {
        let mut b = primed();
        b.insert_text("ls");
        b.newline();
        b.append_output("x\n");
        b.insert_prompt(PROMPT);
        b.insert_text("partial");
        b.replace_live(PROMPT, "echo hi");
        assert_eq!(b.text(), format!("{PROMPT}ls\nx\n{PROMPT}echo hi"));
        assert_eq!(b.latest_mark(), Position::new(2, PROMPT.len()));
        b.replace_live(PROMPT, "");
        assert_eq!(b.line(2).unwrap(), PROMPT);
    }

    #[test]
    fn continuation_line_has_no_prompt_and_guards_column_zero() {
        let mut b = primed();
        b.insert_text("echo a \\");
        b.open_continuation_line();
        assert_eq!(b.idx(), 1);
        assert_eq!(b.latest_mark(), Position::new(1, 0));
        assert!(!b.backspace());
        assert!(!b.cursor_left());
        b.insert_text("echo b");
        assert_eq!(b.extract_command("$ "), "echo b");
    }

    #[test]
    fn clear_resets_everything() {
        let mut b = primed();
        b.insert_text("ls");
        b.newline();
        b.clear();
        assert_eq!(b.idx(), 0);
        assert_eq!(b.text(), "");
        assert_eq!(b.take_ops().last(), Some(&BufferOp::Clear));
    }

    #[test]
    fn pasted_newlines_are_flattened() {
        let mut b = primed();
        b.insert_text("echo a\r\necho b\n");
        assert_eq!(b.line_count(), 1);
        assert_eq!(b.extract_command("$ "), "echo a echo b");
    }

    #[test]
    fn click_positions_are_clamped_to_char_boundaries() {
        let mut b = primed();
        b.insert_text("é");
        b.on_cursor_moved(9, 999);
        assert_eq!(b.cursor(), b.end_position());
        b.on_cursor_moved(0, PROMPT.len() + 1);
        assert_eq!(b.cursor(), Position::new(0, PROMPT.len()));
    }

    #[test]
    fn ops_mirror_prompt_insertion() {
        let mut b = LineBuffer::new();
        b.insert_prompt(PROMPT);
        assert_eq!(
            b.take_ops(),
            vec![
                BufferOp::Insert {
                    at: Position::origin(),
                    text: PROMPT.to_string()
                },
                BufferOp::SetCursor(Position::new(0, PROMPT.len())),
            ]
        );
    }

    #[test]
    fn normalize_line_endings_variants() {
        assert_eq!(normalize_line_endings("a\r\nb\rc\n"), "a\nb\nc\n");
        assert!(matches!(normalize_line_endings("plain\n"), Cow::Borrowed(_)));
    }

    #[test]
    fn grapheme_boundaries_and_columns() {
        let s = "a😀b";
        let after_a = grapheme::next_boundary(s, 0);
        let after_emoji = grapheme::next_boundary(s, after_a);
        assert_eq!(grapheme::prev_boundary(s, after_emoji), after_a);
        assert_eq!(grapheme::visual_col(s, after_emoji), 3);
        assert_eq!(grapheme::byte_at_col(s, 2), after_a);
        assert_eq!(grapheme::byte_at_col(s, 3), after_emoji);
        assert_eq!(grapheme::byte_at_col(s, 50), s.len());
        assert_eq!(grapheme::iter(s).count(), 3);
    }
}
