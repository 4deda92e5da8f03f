//! Host terminal setup for the standalone binary: raw mode, alternate screen and mouse capture.

use anyhow::Result;
use crossterm::{
    cursor::{SetCursorStyle, Show},
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{
        EnterAlternateScreen, LeaveAlternateScreen, SetTitle, disable_raw_mode, enable_raw_mode,
    },
};
use std::io::stdout;
use tracing::debug;

pub trait TerminalBackend {
    fn enter(&mut self) -> Result<()>;
    fn leave(&mut self) -> Result<()>;
    fn set_title(&mut self, title: &str) -> Result<()>;
    /// Current size as (columns, rows).
    fn size(&self) -> Result<(u16, u16)>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalOptions {
    /// Forward mouse presses so clicks can move the cursor.
    pub mouse_capture: bool,
}

impl Default for TerminalOptions {
    fn default() -> Self {
        Self {
            mouse_capture: true,
        }
    }
}

pub struct CrosstermBackend {
    options: TerminalOptions,
    entered: bool,
}

/// RAII guard ensuring terminal state restoration even if caller early-returns or panics.
pub struct TerminalGuard<'a> {
    backend: &'a mut CrosstermBackend,
    active: bool,
}

impl Default for CrosstermBackend {
    fn default() -> Self {
        Self::new(TerminalOptions::default())
    }
}

impl CrosstermBackend {
    pub fn new(options: TerminalOptions) -> Self {
        Self {
            options,
            entered: false,
        }
    }

    pub fn is_entered(&self) -> bool {
        self.entered
    }

    /// Enter and return a guard that will leave on drop.
    pub fn enter_guard(&mut self) -> Result<TerminalGuard<'_>> {
        self.enter()?;
        Ok(TerminalGuard {
            backend: self,
            active: true,
        })
    }
}

impl TerminalGuard<'_> {
    pub fn backend(&mut self) -> &mut CrosstermBackend {
        self.backend
    }
}

impl TerminalBackend for CrosstermBackend {
    fn enter(&mut self) -> Result<()> {
        if !self.entered {
            enable_raw_mode()?;
            execute!(stdout(), EnterAlternateScreen, Show, SetCursorStyle::SteadyBar)?;
            if self.options.mouse_capture {
                execute!(stdout(), EnableMouseCapture)?;
            }
            self.entered = true;
            debug!(target: "runtime", mouse = self.options.mouse_capture, "terminal_entered");
        }
        Ok(())
    }

    fn leave(&mut self) -> Result<()> {
        if self.entered {
            if self.options.mouse_capture {
                execute!(stdout(), DisableMouseCapture)?;
            }
            execute!(stdout(), SetCursorStyle::DefaultUserShape, LeaveAlternateScreen, Show)?;
            disable_raw_mode()?;
            self.entered = false;
            debug!(target: "runtime", "terminal_left");
        }
        Ok(())
    }

    fn set_title(&mut self, title: &str) -> Result<()> {
        execute!(stdout(), SetTitle(title))?;
        Ok(())
    }

    fn size(&self) -> Result<(u16, u16)> {
        Ok(crossterm::terminal::size()?)
    }
}

impl Drop for CrosstermBackend {
    fn drop(&mut self) {
        let _ = self.leave();
    }
}

impl Drop for TerminalGuard<'_> {
    fn drop(&mut self) {
        if self.active {
            let _ = self.backend.leave();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mouse_capture_on_by_default() {
        assert!(TerminalOptions::default().mouse_capture);
    }

    #[test]
    fn leave_without_enter_is_noop() {
        let mut backend = CrosstermBackend::new(TerminalOptions {
            mouse_capture: false,
        });
        assert!(!backend.is_entered());
        assert!(backend.leave().is_ok());
        assert!(!backend.is_entered());
    }
}
