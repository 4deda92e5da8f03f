//! Vertical window over the wrapped screen rows of the buffer.
//!
//! `first_row` indexes wrapped rows, not buffer lines. The viewport sticks to
//! the bottom of the buffer like a terminal does, and only scrolls up when
//! the cursor leaves the visible rows.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub first_row: usize,
    pub height: usize,
}

impl Viewport {
    pub fn new(first_row: usize, height: usize) -> Self {
        Self { first_row, height }
    }

    /// Reposition for a buffer of `total_rows` wrapped rows so that `cursor_row` is visible.
    /// Prefers showing the tail when the cursor is already inside it.
    pub fn follow(&mut self, cursor_row: usize, total_rows: usize) {
        if self.height == 0 {
            self.first_row = cursor_row;
            return;
        }
        let tail_start = total_rows.saturating_sub(self.height);
        if cursor_row >= tail_start {
            self.first_row = tail_start;
        } else if cursor_row < self.first_row || cursor_row >= self.first_row + self.height {
            self.first_row = cursor_row;
        }
    }

    pub fn contains(&self, row: usize) -> bool {
        row >= self.first_row && row < self.first_row + self.height
    }
}
