#![allow(dead_code)] // Shared across integration tests; each test binary uses a subset of helpers.

use core_actions::{DispatchResult, dispatch};
use core_config::Platform;
use core_events::InputEvent;
use core_history::HistoryStore;
use core_state::TerminalState;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing_subscriber::fmt::MakeWriter;

pub fn primed_state(
    dir: &tempfile::TempDir,
    platform: Platform,
    cwd: impl Into<PathBuf>,
) -> TerminalState {
    let history = HistoryStore::open(dir.path().join("history.txt"))
        .expect("history store should open in a temp dir");
    let mut st = TerminalState::new(platform, history, cwd.into());
    st.prime();
    st
}

pub fn type_and_submit(st: &mut TerminalState, text: &str) -> DispatchResult {
    dispatch(&InputEvent::TextCommit(text.to_string()), st);
    dispatch(&InputEvent::Submit, st)
}

#[derive(Clone)]
pub struct BufferWriter {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl BufferWriter {
    pub fn new() -> (Self, Arc<Mutex<Vec<u8>>>) {
        let buf = Arc::new(Mutex::new(Vec::new()));
        (Self { inner: buf.clone() }, buf)
    }
}

pub struct LockedWriter<'a> {
    guard: MutexGuard<'a, Vec<u8>>,
}

impl Write for LockedWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.guard.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for BufferWriter {
    type Writer = LockedWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        LockedWriter {
            guard: self.inner.lock().expect("log buffer poisoned"),
        }
    }
}
