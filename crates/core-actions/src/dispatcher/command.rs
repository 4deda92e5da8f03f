//! Built-in commands handled without spawning a process (`clear`, `cls`, `exit`, `cd`).
//!
//! `cd` must run in-process: a child shell's directory change would not
//! persist into the next command.

use super::DispatchResult;
use super::command_parser::CdTarget;
use core_state::{Phase, TerminalState};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CdError {
    #[error("cd: no such file or directory: {0}")]
    NotFound(String),
    #[error("cd: not a directory: {0}")]
    NotADirectory(String),
    #[error("cd: home directory unavailable")]
    NoHome,
}

pub(crate) fn handle_clear(state: &mut TerminalState) -> DispatchResult {
    state.buffer.clear();
    state.insert_prompt();
    state.set_phase(Phase::Idle);
    debug!(target: "loop.submit", "buffer_cleared");
    DispatchResult::dirty()
}

pub(crate) fn handle_exit(state: &mut TerminalState) -> DispatchResult {
    info!(target: "loop.submit", cwd = %state.cwd().display(), "exit_requested");
    DispatchResult::quit()
}

pub(crate) fn handle_cd(target: CdTarget, state: &mut TerminalState) -> DispatchResult {
    match resolve_cd(&target, state.cwd()) {
        Ok(dir) => {
            info!(target: "loop.submit", cwd = %dir.display(), "cd_applied");
            state.set_cwd(dir);
            state.reprompt();
        }
        Err(e) => {
            debug!(target: "loop.submit", error = %e, "cd_failed");
            state.buffer.newline();
            state.buffer.append_output(&format!("{e}\n"));
            state.insert_prompt();
            state.set_phase(Phase::Idle);
        }
    }
    DispatchResult::dirty()
}

/// Resolve a `cd` target against `cwd` and check that it names a directory.
pub fn resolve_cd(target: &CdTarget, cwd: &Path) -> Result<PathBuf, CdError> {
    let (candidate, shown) = match target {
        CdTarget::Home => {
            let home = dirs::home_dir().ok_or(CdError::NoHome)?;
            let shown = home.display().to_string();
            (home, shown)
        }
        CdTarget::Parent => {
            let parent = cwd.parent().unwrap_or(cwd).to_path_buf();
            (parent, "..".to_string())
        }
        CdTarget::Path(dest) => (expand(dest, cwd)?, dest.clone()),
    };
    let resolved = normalize(&candidate);
    match std::fs::metadata(&resolved) {
        Ok(meta) if meta.is_dir() => Ok(resolved),
        Ok(_) => Err(CdError::NotADirectory(shown)),
        Err(_) => Err(CdError::NotFound(shown)),
    }
}

fn expand(dest: &str, cwd: &Path) -> Result<PathBuf, CdError> {
    if let Some(rest) = dest.strip_prefix("~/").or_else(|| dest.strip_prefix("~\\")) {
        let home = dirs::home_dir().ok_or(CdError::NoHome)?;
        return Ok(home.join(rest));
    }
    Ok(cwd.join(dest))
}

/// Lexically fold `.` and `..` components.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(comp);
                }
            }
            other => out.push(other),
        }
    }
    out
}
