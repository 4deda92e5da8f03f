//! Screen row layout: which slice of which buffer line each visible row shows.
//!
//! Lines soft-wrap at the terminal width on grapheme boundaries. The layout of
//! the last painted frame is shared with the input task so mouse clicks can be
//! turned back into buffer positions.

use core_text::{Position, grapheme};
use std::sync::{Arc, Mutex};

/// One visible screen row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowSpan {
    pub line: usize,
    /// Byte range of the line shown on this row.
    pub start: usize,
    pub end: usize,
    pub text: String,
}

/// Split a line into row byte ranges no wider than `width` cells.
/// An empty line still occupies one row.
pub fn wrap_line(line: &str, width: usize) -> Vec<(usize, usize)> {
    let width = width.max(1);
    let mut rows = Vec::new();
    let mut start = 0;
    let mut acc = 0;
    let mut pos = 0;
    for g in grapheme::iter(line) {
        let w = grapheme::cluster_width(g);
        if acc > 0 && acc + w > width {
            rows.push((start, pos));
            start = pos;
            acc = 0;
        }
        acc += w;
        pos += g.len();
    }
    rows.push((start, line.len()));
    rows
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScreenLayout {
    pub width: usize,
    pub rows: Vec<RowSpan>,
}

impl ScreenLayout {
    /// Buffer (line, byte) under a screen cell. Cells right of the text map to the row end.
    pub fn position_at(&self, col: u16, row: u16) -> Option<Position> {
        let span = self.rows.get(row as usize)?;
        let byte = span.start + grapheme::byte_at_col(&span.text, col as usize);
        Some(Position::new(span.line, byte))
    }

    /// Screen cell (col, row) for a buffer position, when it is on screen.
    pub fn cell_of(&self, pos: Position) -> Option<(u16, u16)> {
        let mut found = None;
        for (i, span) in self.rows.iter().enumerate() {
            if span.line != pos.line || pos.byte < span.start || pos.byte > span.end {
                continue;
            }
            found = Some((i, span));
            if pos.byte < span.end {
                break;
            }
        }
        let (row, span) = found?;
        let col = grapheme::visual_col(&span.text, pos.byte - span.start);
        let col = col.min(self.width.saturating_sub(1));
        Some((col as u16, row as u16))
    }
}

/// Layout handle shared between the painter and the click mapper.
#[derive(Debug, Clone, Default)]
pub struct SharedLayout(Arc<Mutex<ScreenLayout>>);

impl SharedLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&self, layout: ScreenLayout) {
        if let Ok(mut guard) = self.0.lock() {
            *guard = layout;
        }
    }

    pub fn position_at(&self, col: u16, row: u16) -> Option<Position> {
        self.0.lock().ok()?.position_at(col, row)
    }

    pub fn snapshot(&self) -> ScreenLayout {
        self.0.lock().map(|g| g.clone()).unwrap_or_default()
    }
}
