//! Async driver tying the event channel, the command loop and the process runner together.
//!
//! The session is the single consumer of the bounded event channel. Events are
//! dispatched one at a time; when a submission produces an
//! [`core_actions::ExecRequest`], the session awaits the run while still
//! listening on the channel, so a `CancelRequested` can reach the runner.
//! Any other input that arrives mid-run is queued and replayed, in order,
//! once the prompt is back.

use core_actions::{ExecRequest, complete_execution, dispatch};
use core_events::{CommandEvent, EVENTS_DEFERRED, Event, INPUT_EVENTS_TOTAL, InputEvent};
use core_process::ProcessRunner;
use core_state::TerminalState;
use core_text::{BufferOp, LineBuffer};
use std::collections::VecDeque;
use std::sync::atomic::Ordering;
use tokio::sync::mpsc::Receiver;
use tracing::{debug, info};

/// Rendering side of the widget: receives buffer mutations and the close request.
pub trait HostSurface {
    /// Replay `ops` (already applied to `buffer`) on the host's display.
    fn apply(&mut self, ops: &[BufferOp], buffer: &LineBuffer);
    /// The `exit` built-in (or an explicit close) asked the container to close.
    fn request_close(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionExit {
    RequestClose,
    Shutdown,
    ChannelClosed,
}

impl SessionExit {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionExit::RequestClose => "request_close",
            SessionExit::Shutdown => "shutdown",
            SessionExit::ChannelClosed => "channel_closed",
        }
    }
}

pub struct Session {
    state: TerminalState,
    runner: ProcessRunner,
    deferred: VecDeque<InputEvent>,
}

impl Session {
    pub fn new(state: TerminalState, runner: ProcessRunner) -> Self {
        Self {
            state,
            runner,
            deferred: VecDeque::new(),
        }
    }

    pub fn state(&self) -> &TerminalState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut TerminalState {
        &mut self.state
    }

    pub fn runner(&self) -> &ProcessRunner {
        &self.runner
    }

    /// Drive the loop until the host closes, a shutdown arrives, or the channel closes.
    pub async fn run<H: HostSurface>(
        &mut self,
        rx: &mut Receiver<Event>,
        host: &mut H,
    ) -> SessionExit {
        self.flush(host, true);
        let exit = loop {
            let event = match self.deferred.pop_front() {
                Some(input) => Event::Input(input),
                None => match rx.recv().await {
                    Some(event) => event,
                    None => break SessionExit::ChannelClosed,
                },
            };
            let input = match event {
                Event::Input(input) => input,
                Event::Command(CommandEvent::RequestClose) => break SessionExit::RequestClose,
                Event::Shutdown => break SessionExit::Shutdown,
            };
            INPUT_EVENTS_TOTAL.fetch_add(1, Ordering::Relaxed);
            let result = dispatch(&input, &mut self.state);
            self.flush(host, result.dirty);
            if result.quit {
                break SessionExit::RequestClose;
            }
            if let Some(request) = result.execute
                && let Some(exit) = self.execute(request, rx, host).await
            {
                break exit;
            }
        };
        if exit == SessionExit::RequestClose {
            host.request_close();
        }
        info!(
            target: "runtime.shutdown",
            reason = exit.as_str(),
            deferred = self.deferred.len(),
            pending_continuation = self.state.long_command.is_active(),
            "session_ended"
        );
        exit
    }

    /// Await one run while servicing the channel. Returns an exit reason when the
    /// session must end once the (cancelled) run has been written back.
    async fn execute<H: HostSurface>(
        &mut self,
        request: ExecRequest,
        rx: &mut Receiver<Event>,
        host: &mut H,
    ) -> Option<SessionExit> {
        let cancel = self.runner.cancel_handle();
        // Armed before the channel is read, so a cancel already queued behind the submit lands.
        let run = self.runner.start(&request.command, &request.cwd);
        tokio::pin!(run);

        let mut exit = None;
        let output = loop {
            tokio::select! {
                output = &mut run => break output,
                event = rx.recv(), if exit.is_none() => match event {
                    Some(Event::Input(input)) => {
                        if dispatch(&input, &mut self.state).cancel {
                            cancel.cancel();
                        } else {
                            EVENTS_DEFERRED.fetch_add(1, Ordering::Relaxed);
                            debug!(target: "loop.exec", kind = input.kind(), "event_deferred");
                            self.deferred.push_back(input);
                        }
                    }
                    Some(Event::Command(CommandEvent::RequestClose)) => {
                        cancel.cancel();
                        exit = Some(SessionExit::RequestClose);
                    }
                    Some(Event::Shutdown) => {
                        cancel.cancel();
                        exit = Some(SessionExit::Shutdown);
                    }
                    None => {
                        cancel.cancel();
                        exit = Some(SessionExit::ChannelClosed);
                    }
                },
            }
        };

        complete_execution(&mut self.state, &output);
        self.flush(host, true);
        exit
    }

    /// Hand pending ops to the host. `repaint` forces a call even without ops (resize).
    fn flush<H: HostSurface>(&mut self, host: &mut H, repaint: bool) {
        let ops = self.state.buffer.take_ops();
        if repaint || !ops.is_empty() {
            host.apply(&ops, &self.state.buffer);
        }
    }
}
