//! Standalone host for the shell pane: a full-screen terminal driving the command loop.
use anyhow::{Context, Result, bail};
use clap::Parser;
use core_config::{Config, Platform, load_from};
use core_events::{
    CHANNEL_SEND_FAILURES, COMMANDS_CANCELLED, COMMANDS_EXECUTED, EVENT_CHANNEL_CAP,
    EVENTS_DEFERRED, Event, INPUT_EVENTS_TOTAL, PASTE_BYTES,
};
use core_history::HistoryStore;
use core_input::{AsyncInputShutdown, ClickMapper};
use core_process::ProcessRunner;
use core_render::{Renderer, SharedLayout};
use core_session::{HostSurface, Session, SessionExit};
use core_state::TerminalState;
use core_terminal::{CrosstermBackend, TerminalBackend, TerminalOptions};
use core_text::{BufferOp, LineBuffer};
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Once};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};
use tracing_appender::non_blocking::WorkerGuard;

const INPUT_JOIN_TIMEOUT: Duration = Duration::from_millis(200);

#[derive(Parser, Debug)]
#[command(name = "shellpane", version, about = "Embeddable shell pane")]
struct Args {
    /// Configuration file path (overrides discovery of `shellpane.toml`).
    #[arg(long = "config")]
    pub config: Option<PathBuf>,
    /// History file path (overrides config and the cache-dir default).
    #[arg(long = "history")]
    pub history: Option<PathBuf>,
    /// Starting working directory. Defaults to the process working directory.
    #[arg(long = "cwd")]
    pub cwd: Option<PathBuf>,
}

struct AppStartup {
    backend: CrosstermBackend,
    log_guard: Option<WorkerGuard>,
}

struct Bootstrap {
    config: Config,
    platform: Platform,
    state: TerminalState,
}

impl AppStartup {
    fn new() -> Self {
        Self {
            backend: CrosstermBackend::new(TerminalOptions::default()),
            log_guard: None,
        }
    }

    fn configure_logging(&mut self) -> Result<()> {
        let log_dir = Path::new(".");
        let log_path = log_dir.join("shellpane.log");
        if log_path.exists() {
            let _ = std::fs::remove_file(&log_path);
        }

        let file_appender = tracing_appender::rolling::never(log_dir, "shellpane.log");
        let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);
        if tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_writer(nb_writer)
            .try_init()
            .is_ok()
        {
            self.log_guard = Some(guard);
        }
        Ok(())
    }

    fn install_panic_hook() {
        static HOOK: Once = Once::new();
        HOOK.call_once(|| {
            let default_panic = std::panic::take_hook();
            std::panic::set_hook(Box::new(move |info| {
                tracing::error!(target: "runtime.panic", ?info, "panic");
                default_panic(info);
            }));
        });
    }

    /// Everything that can fail before the terminal is taken over.
    fn bootstrap(args: &Args) -> Result<Bootstrap> {
        let config = load_from(args.config.clone())?;
        let platform = Platform::detect();
        let cwd = resolve_start_dir(args.cwd.as_deref())?;
        let history_path = config.history_path(args.history.clone());
        let history = HistoryStore::open(&history_path)
            .with_context(|| format!("opening history at {}", history_path.display()))?;
        let state = TerminalState::new(platform, history, cwd);
        info!(
            target: "runtime.startup",
            windows = platform.is_windows(),
            config_override = args.config.is_some(),
            history = %history_path.display(),
            "bootstrap_complete"
        );
        Ok(Bootstrap {
            config,
            platform,
            state,
        })
    }

    async fn run(&mut self, bootstrap: Bootstrap) -> Result<SessionExit> {
        self.backend.set_title("shellpane")?;
        let mut guard = self.backend.enter_guard()?;
        let (width, height) = guard.backend().size()?;

        let shell = bootstrap.config.shell(bootstrap.platform);
        debug!(target: "runtime", program = shell.program.as_str(), "shell_resolved");
        let mut state = bootstrap.state;
        state.prime();
        let mut session = Session::new(state, ProcessRunner::new(shell));

        let mut host = TerminalHost::new(Renderer::new(width, height));
        let clicks = Arc::new(LayoutClicks(host.renderer.layout()));
        let (tx, mut rx) = mpsc::channel::<Event>(EVENT_CHANNEL_CAP);
        let (input_task, input_shutdown) = core_input::spawn_async_input(tx, clicks);

        let exit = session.run(&mut rx, &mut host).await;
        debug!(
            target: "runtime",
            close_requested = host.close_requested,
            "session_returned"
        );
        rx.close();
        finalize_shutdown(exit, input_task, input_shutdown).await;
        drop(guard);
        Ok(exit)
    }
}

fn resolve_start_dir(requested: Option<&Path>) -> Result<PathBuf> {
    let dir = match requested {
        Some(dir) => dir.to_path_buf(),
        None => std::env::current_dir().context("reading current directory")?,
    };
    if !dir.is_dir() {
        bail!("not a directory: {}", dir.display());
    }
    Ok(dir)
}

/// Paints the buffer on the real terminal.
struct TerminalHost {
    renderer: Renderer,
    close_requested: bool,
}

impl TerminalHost {
    fn new(renderer: Renderer) -> Self {
        Self {
            renderer,
            close_requested: false,
        }
    }
}

impl HostSurface for TerminalHost {
    fn apply(&mut self, ops: &[BufferOp], buffer: &LineBuffer) {
        if let Ok((w, h)) = crossterm::terminal::size()
            && (w, h) != self.renderer.size()
        {
            self.renderer.resize(w, h);
        }
        trace!(target: "render", ops = ops.len(), "host_apply");
        if let Err(err) = self.renderer.render(buffer) {
            warn!(target: "render", ?err, "render_failed");
        }
    }

    fn request_close(&mut self) {
        self.close_requested = true;
        info!(target: "runtime", "close_requested");
    }
}

/// Maps clicks through the layout of the last painted frame.
struct LayoutClicks(SharedLayout);

impl ClickMapper for LayoutClicks {
    fn map_click(&self, column: u16, row: u16) -> Option<(usize, usize)> {
        self.0.position_at(column, row).map(|p| (p.line, p.byte))
    }
}

fn log_shutdown_stage(exit: SessionExit, stage: &'static str) {
    info!(
        target: "runtime.shutdown",
        reason = exit.as_str(),
        stage = stage,
        "shutdown_stage"
    );
}

async fn finalize_shutdown(
    exit: SessionExit,
    input_task: JoinHandle<()>,
    input_shutdown: AsyncInputShutdown,
) {
    log_shutdown_stage(exit, "begin");
    input_shutdown.signal();
    match tokio::time::timeout(INPUT_JOIN_TIMEOUT, input_task).await {
        Ok(Ok(())) => trace!(target: "runtime.shutdown", "input_task_joined"),
        Ok(Err(err)) if err.is_cancelled() => {
            trace!(target: "runtime.shutdown", "input_task_cancelled")
        }
        Ok(Err(err)) => error!(target: "runtime.shutdown", ?err, "input_task_join_failed"),
        Err(_) => warn!(target: "runtime.shutdown", "input_task_timeout"),
    }
    info!(
        target: "runtime.shutdown",
        input_events = INPUT_EVENTS_TOTAL.load(Ordering::Relaxed),
        commands = COMMANDS_EXECUTED.load(Ordering::Relaxed),
        cancelled = COMMANDS_CANCELLED.load(Ordering::Relaxed),
        deferred = EVENTS_DEFERRED.load(Ordering::Relaxed),
        paste_bytes = PASTE_BYTES.load(Ordering::Relaxed),
        send_failures = CHANNEL_SEND_FAILURES.load(Ordering::Relaxed),
        "session_counters"
    );
    log_shutdown_stage(exit, "complete");
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut startup = AppStartup::new();
    startup.configure_logging()?;
    AppStartup::install_panic_hook();
    info!(target: "runtime", "startup");

    let bootstrap = AppStartup::bootstrap(&args)?;
    let exit = startup.run(bootstrap).await?;
    info!(target: "runtime", reason = exit.as_str(), "exit");
    Ok(())
}
