use crate::{ClickMapper, log_text_commit, map_key};
use core_events::{CHANNEL_SEND_FAILURES, Event, InputEvent, PASTE_BYTES};
use crossterm::event::{
    DisableBracketedPaste, EnableBracketedPaste, Event as CEvent, EventStream,
    KeyEvent as CKeyEvent, KeyEventKind as CKind, MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::execute;
use std::io;
use std::sync::Arc;
use tokio::sync::{Notify, mpsc::Sender};
use tokio::task;
use tokio_stream::StreamExt;
use tracing::{Instrument, debug, info, trace, warn};

/// Largest `TextCommit` produced from a single paste; longer pastes are split.
const PASTE_CHUNK_BYTES: usize = 4_096;

#[derive(Clone, Debug)]
pub struct AsyncInputShutdown {
    notify: Arc<Notify>,
}

impl AsyncInputShutdown {
    pub fn signal(&self) {
        self.notify.notify_one();
    }
}

#[derive(Clone, Debug)]
struct ShutdownListener {
    notify: Arc<Notify>,
}

impl ShutdownListener {
    fn new_pair() -> (AsyncInputShutdown, Self) {
        let notify = Arc::new(Notify::new());
        (
            AsyncInputShutdown {
                notify: notify.clone(),
            },
            ShutdownListener { notify },
        )
    }

    async fn wait(&self) {
        self.notify.notified().await;
    }
}

/// Spawn a Tokio task reading `EventStream` and forwarding mapped events.
pub(crate) fn spawn_async_event_task(
    sender: Sender<Event>,
    clicks: Arc<dyn ClickMapper>,
) -> (task::JoinHandle<()>, AsyncInputShutdown) {
    let (shutdown, listener) = ShutdownListener::new_pair();
    let span = tracing::debug_span!(target: "input.thread", "input_async_task");
    let handle = task::spawn(
        async move {
            if let Err(join_err) = task::spawn_blocking(enable_bracketed_paste).await {
                debug!(target: "input.paste", ?join_err, "enable_failed_join");
            }

            let stream = EventStream::new();
            AsyncEventStreamTask::new(sender, stream, listener, clicks)
                .run()
                .await;

            if let Err(join_err) = task::spawn_blocking(disable_bracketed_paste).await {
                debug!(target: "input.paste", ?join_err, "disable_failed_join");
            }
        }
        .instrument(span),
    );

    (handle, shutdown)
}

fn enable_bracketed_paste() {
    if let Err(e) = execute!(io::stdout(), EnableBracketedPaste) {
        debug!(target: "input.paste", ?e, "enable_failed");
    }
}

fn disable_bracketed_paste() {
    if let Err(e) = execute!(io::stdout(), DisableBracketedPaste) {
        debug!(target: "input.paste", ?e, "disable_failed");
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ExitReason {
    Running,
    ShutdownSignal,
    ChannelClosed,
    StreamEnded,
    StreamError,
}

impl ExitReason {
    fn as_str(&self) -> &'static str {
        match self {
            ExitReason::Running => "running",
            ExitReason::ShutdownSignal => "shutdown_signal",
            ExitReason::ChannelClosed => "channel_closed",
            ExitReason::StreamEnded => "stream_ended",
            ExitReason::StreamError => "stream_error",
        }
    }
}

struct AsyncEventStreamTask<S>
where
    S: tokio_stream::Stream<Item = io::Result<CEvent>> + Send + Unpin + 'static,
{
    sender: Sender<Event>,
    stream: S,
    shutdown: ShutdownListener,
    clicks: Arc<dyn ClickMapper>,
    exit_reason: ExitReason,
    stream_error: Option<io::ErrorKind>,
}

impl<S> AsyncEventStreamTask<S>
where
    S: tokio_stream::Stream<Item = io::Result<CEvent>> + Send + Unpin + 'static,
{
    fn new(
        sender: Sender<Event>,
        stream: S,
        shutdown: ShutdownListener,
        clicks: Arc<dyn ClickMapper>,
    ) -> Self {
        Self {
            sender,
            stream,
            shutdown,
            clicks,
            exit_reason: ExitReason::Running,
            stream_error: None,
        }
    }

    async fn run(mut self) {
        info!(target: "input.thread", "async_input_task_started");
        self.exit_reason = ExitReason::StreamEnded;
        loop {
            let maybe_result = tokio::select! {
                biased;
                _ = self.shutdown.wait() => {
                    self.exit_reason = ExitReason::ShutdownSignal;
                    break;
                }
                result = self.stream.next() => result,
            };

            let Some(result) = maybe_result else {
                break;
            };

            let keep_going = match result {
                Ok(CEvent::Key(key)) => self.handle_key_event(key).await,
                Ok(CEvent::Resize(w, h)) => {
                    trace!(target: "input.event", w, h, "resize");
                    self.send_input(InputEvent::Resize(w, h)).await
                }
                Ok(CEvent::Paste(data)) => self.handle_paste(data).await,
                Ok(CEvent::Mouse(mouse)) => self.handle_mouse_event(mouse).await,
                Ok(_) => true,
                Err(err) => {
                    self.exit_reason = ExitReason::StreamError;
                    self.stream_error = Some(err.kind());
                    false
                }
            };
            if !keep_going {
                break;
            }
        }

        if matches!(self.exit_reason, ExitReason::StreamError) {
            if let Some(kind) = self.stream_error {
                warn!(target: "input.thread", error_kind = ?kind, "async_input_task_stream_error");
            } else {
                warn!(target: "input.thread", "async_input_task_stream_error");
            }
        }

        info!(target: "input.thread", reason = self.exit_reason.as_str(), "async_input_task_stopped");
    }

    async fn handle_key_event(&mut self, key: CKeyEvent) -> bool {
        if !matches!(key.kind, CKind::Press | CKind::Repeat) {
            return true;
        }
        match map_key(&key) {
            Some(input) => {
                if let InputEvent::TextCommit(text) = &input {
                    log_text_commit(text);
                } else {
                    trace!(target: "input.event", kind = input.kind());
                }
                self.send_input(input).await
            }
            None => true,
        }
    }

    async fn handle_mouse_event(&mut self, mouse: MouseEvent) -> bool {
        if !matches!(mouse.kind, MouseEventKind::Down(MouseButton::Left)) {
            return true;
        }
        match self.clicks.map_click(mouse.column, mouse.row) {
            Some((line, byte)) => {
                trace!(target: "input.event", kind = "cursor_moved", line, byte);
                self.send_input(InputEvent::CursorMoved { line, byte })
                    .await
            }
            None => true,
        }
    }

    async fn handle_paste(&mut self, data: String) -> bool {
        trace!(target: "input.paste", len = data.len(), "paste_event");
        let mut remaining = data.as_str();
        while !remaining.is_empty() {
            let (chunk, rest) = split_utf8_chunk(remaining);
            log_text_commit(chunk);
            if !self
                .send_input(InputEvent::TextCommit(chunk.to_string()))
                .await
            {
                return false;
            }
            PASTE_BYTES.fetch_add(chunk.len() as u64, std::sync::atomic::Ordering::Relaxed);
            remaining = rest;
        }
        true
    }

    async fn send_input(&mut self, input: InputEvent) -> bool {
        match self.sender.send(Event::Input(input)).await {
            Ok(_) => true,
            Err(_) => {
                CHANNEL_SEND_FAILURES.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                if !matches!(self.exit_reason, ExitReason::ShutdownSignal) {
                    self.exit_reason = ExitReason::ChannelClosed;
                }
                false
            }
        }
    }
}

fn split_utf8_chunk(input: &str) -> (&str, &str) {
    if input.len() <= PASTE_CHUNK_BYTES {
        return (input, "");
    }

    let mut idx = PASTE_CHUNK_BYTES;
    while idx > 0 && !input.is_char_boundary(idx) {
        idx -= 1;
    }

    if idx == 0 {
        return (input, "");
    }

    input.split_at(idx)
}
