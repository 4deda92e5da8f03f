//! Full-frame painter for the line buffer.
//!
//! Every frame repaints the visible rows: the tail of the buffer, or the rows
//! around the cursor when it was clicked into scrollback. Frame assembly is
//! pure ([`Renderer::compose`]) and the result is flushed through the batched
//! [`Writer`]. The layout of the painted rows is published through
//! [`SharedLayout`] for click mapping.

pub mod layout;
pub mod viewport;
pub mod writer;

use anyhow::Result;
use core_text::LineBuffer;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

pub use layout::{RowSpan, ScreenLayout, SharedLayout, wrap_line};
pub use viewport::Viewport;
pub use writer::{Command, Writer};

pub static FRAMES_RENDERED: AtomicU64 = AtomicU64::new(0);

pub struct Renderer {
    width: u16,
    height: u16,
    layout: SharedLayout,
}

impl Renderer {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            layout: SharedLayout::new(),
        }
    }

    pub fn resize(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
    }

    pub fn size(&self) -> (u16, u16) {
        (self.width, self.height)
    }

    /// Handle onto the layout of the last composed frame.
    pub fn layout(&self) -> SharedLayout {
        self.layout.clone()
    }

    /// Build the frame for `buffer` and publish its layout.
    pub fn compose(&self, buffer: &LineBuffer) -> Writer {
        let width = self.width.max(1) as usize;
        let height = self.height as usize;
        let cursor = buffer.cursor();

        // Start from whichever comes first: the cursor line or the first line of the tail.
        let last = buffer.line_count().saturating_sub(1);
        let mut tail_first = last;
        let mut tail_rows = 0;
        loop {
            tail_rows += wrap_line(&buffer.line(tail_first).unwrap_or_default(), width).len();
            if tail_rows >= height || tail_first == 0 {
                break;
            }
            tail_first -= 1;
        }
        let first_line = tail_first.min(cursor.line);

        let mut rows = Vec::new();
        let mut cursor_row = 0;
        for line in first_line..=last {
            let text = buffer.line(line).unwrap_or_default();
            for (start, end) in wrap_line(&text, width) {
                if line == cursor.line && cursor.byte >= start && cursor.byte <= end {
                    cursor_row = rows.len();
                }
                rows.push(RowSpan {
                    line,
                    start,
                    end,
                    text: text[start..end].to_string(),
                });
            }
            // rows past the screen below the cursor are never shown
            if line >= cursor.line && rows.len() >= cursor_row + height.max(1) {
                break;
            }
        }

        let mut vp = Viewport::new(0, height);
        vp.follow(cursor_row, rows.len());
        let visible: Vec<RowSpan> = rows.into_iter().skip(vp.first_row).take(height).collect();

        let mut w = Writer::new();
        for y in 0..height {
            w.clear_line(y as u16);
            if let Some(span) = visible.get(y) {
                w.print(span.text.as_str());
            }
        }
        let frame = ScreenLayout {
            width,
            rows: visible,
        };
        if let Some((x, y)) = frame.cell_of(cursor) {
            w.move_to(x, y);
        }
        trace!(
            target: "render",
            first_row = vp.first_row,
            rows = frame.rows.len(),
            cursor_line = cursor.line,
            "frame_composed"
        );
        self.layout.replace(frame);
        FRAMES_RENDERED.fetch_add(1, Ordering::Relaxed);
        w
    }

    pub fn render(&self, buffer: &LineBuffer) -> Result<()> {
        self.compose(buffer).flush()
    }
}
