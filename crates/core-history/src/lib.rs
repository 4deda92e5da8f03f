//! Persistent command history.
//!
//! Entries live in a newline-delimited plain text log, one command per line,
//! opened once and appended to on every recorded submission. No escaping is
//! applied: a command containing a literal newline does not round-trip.
//!
//! The recall index ranges over `-1..=len-1`. It starts at the newest entry,
//! walks backwards on [`HistoryStore::recall_older`] and forwards on
//! [`HistoryStore::recall_newer`]. Walking past the newest entry yields
//! [`Recall::Blank`] instead of wrapping.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("cannot create history directory {path}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },
    #[error("cannot read history file {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("cannot open history file {path} for append: {source}")]
    Open { path: PathBuf, source: io::Error },
    #[error("cannot append to history file {path}: {source}")]
    Append { path: PathBuf, source: io::Error },
}

/// Outcome of a recall-newer step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recall {
    Entry(String),
    /// Moved past the newest entry: the live line should be emptied.
    Blank,
}

#[derive(Debug)]
pub struct HistoryStore {
    path: PathBuf,
    file: File,
    entries: Vec<String>,
    index: isize,
}

impl HistoryStore {
    /// Ensure the log exists (creating parent directories and an empty file as needed),
    /// load it, and keep an append handle open for the store's lifetime.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, HistoryError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| HistoryError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| HistoryError::Open {
                path: path.clone(),
                source,
            })?;
        let content = fs::read_to_string(&path).map_err(|source| HistoryError::Read {
            path: path.clone(),
            source,
        })?;
        let entries: Vec<String> = content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();
        let index = entries.len() as isize - 1;
        info!(target: "history", path = %path.display(), entries = entries.len(), "history_loaded");
        Ok(Self {
            path,
            file,
            entries,
            index,
        })
    }

    /// Append a command. Blank input is ignored. Resets the recall index to the newest entry.
    pub fn record(&mut self, cmd: &str) -> Result<(), HistoryError> {
        let cmd = cmd.trim();
        if cmd.is_empty() {
            return Ok(());
        }
        writeln!(self.file, "{cmd}")
            .and_then(|_| self.file.flush())
            .map_err(|source| HistoryError::Append {
                path: self.path.clone(),
                source,
            })?;
        self.entries.push(cmd.to_string());
        self.index = self.entries.len() as isize - 1;
        debug!(target: "history", entries = self.entries.len(), "history_recorded");
        Ok(())
    }

    /// Entry at the recall index, then step towards older entries. `None` once past the oldest.
    pub fn recall_older(&mut self) -> Option<String> {
        if self.index < 0 {
            return None;
        }
        let entry = self.entries.get(self.index as usize).cloned();
        self.index -= 1;
        entry
    }

    /// Step towards newer entries and return that entry, or [`Recall::Blank`] at the end.
    pub fn recall_newer(&mut self) -> Recall {
        let last = self.entries.len() as isize - 1;
        if self.index < last {
            self.index += 1;
            match self.entries.get(self.index as usize) {
                Some(entry) => Recall::Entry(entry.clone()),
                None => Recall::Blank,
            }
        } else {
            Recall::Blank
        }
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn index(&self) -> isize {
        self.index
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
