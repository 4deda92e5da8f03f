mod support;
use support::*;

use core_actions::{complete_execution, dispatch};
use core_config::Platform;
use core_events::InputEvent;
use core_process::RunOutput;
use core_state::Phase;
use pretty_assertions::assert_eq;
use tracing::Level;
use tracing::subscriber::with_default;

#[test]
fn windows_continuation_uses_double_ampersand() {
    let dir = tempfile::tempdir().unwrap();
    let mut st = primed_state(&dir, Platform::Windows, r"C:\work");
    assert_eq!(st.buffer.text(), r"PS C:\work>");

    let first = type_and_submit(&mut st, "dir &&");
    assert_eq!(first.execute, None);
    assert_eq!(st.phase(), Phase::Accumulating);

    let second = type_and_submit(&mut st, " echo done");
    assert_eq!(second.execute.unwrap().command, "dir echo done");
}

#[test]
fn continuation_can_span_several_lines() {
    let dir = tempfile::tempdir().unwrap();
    let mut st = primed_state(&dir, Platform::Posix, "/srv");
    type_and_submit(&mut st, "printf '%s' \\");
    type_and_submit(&mut st, "a\\");
    let res = type_and_submit(&mut st, "b");
    assert_eq!(res.execute.unwrap().command, "printf '%s' ab");
    assert_eq!(st.buffer.idx(), 2);
}

#[test]
fn blank_continuation_tail_runs_accumulated_head() {
    let dir = tempfile::tempdir().unwrap();
    let mut st = primed_state(&dir, Platform::Posix, "/srv");
    type_and_submit(&mut st, "echo a \\");
    let res = dispatch(&InputEvent::Submit, &mut st);
    assert_eq!(res.execute.unwrap().command, "echo a");
}

#[test]
fn output_without_trailing_newline_keeps_prompt_on_own_line() {
    let dir = tempfile::tempdir().unwrap();
    let mut st = primed_state(&dir, Platform::Posix, "/srv");
    type_and_submit(&mut st, "printf x");
    let out = RunOutput {
        exit_code: Some(0),
        stdout: "x".into(),
        ..RunOutput::default()
    };
    complete_execution(&mut st, &out);
    assert_eq!(st.buffer.text(), "/srv$ printf x\nx\n/srv$ ");
    assert_eq!(st.buffer.idx(), 2);
}

#[test]
fn crlf_output_is_normalized() {
    let dir = tempfile::tempdir().unwrap();
    let mut st = primed_state(&dir, Platform::Posix, "/srv");
    type_and_submit(&mut st, "type f");
    let out = RunOutput {
        exit_code: Some(0),
        stdout: "a\r\nb\r\n".into(),
        ..RunOutput::default()
    };
    complete_execution(&mut st, &out);
    assert_eq!(st.buffer.text(), "/srv$ type f\na\nb\n/srv$ ");
    assert_eq!(st.buffer.idx(), 3);
}

#[test]
fn cancelled_run_flushes_partial_output() {
    let dir = tempfile::tempdir().unwrap();
    let mut st = primed_state(&dir, Platform::Posix, "/srv");
    type_and_submit(&mut st, "yes | head");
    assert!(dispatch(&InputEvent::CancelRequested, &mut st).cancel);
    let out = RunOutput {
        exit_code: None,
        stdout: "y\ny\n".into(),
        stderr: String::new(),
        cancelled: true,
    };
    complete_execution(&mut st, &out);
    assert_eq!(st.buffer.text(), "/srv$ yes | head\ny\ny\n/srv$ ");
    assert_eq!(st.phase(), Phase::Idle);
}

#[test]
fn edits_after_output_stay_in_live_region() {
    let dir = tempfile::tempdir().unwrap();
    let mut st = primed_state(&dir, Platform::Posix, "/srv");
    type_and_submit(&mut st, "ls");
    let out = RunOutput {
        exit_code: Some(0),
        stdout: "a\n".into(),
        ..RunOutput::default()
    };
    complete_execution(&mut st, &out);
    dispatch(&InputEvent::TextCommit("pwdx".into()), &mut st);
    dispatch(&InputEvent::Backspace, &mut st);
    for _ in 0..10 {
        dispatch(&InputEvent::CursorLeft, &mut st);
    }
    dispatch(&InputEvent::Backspace, &mut st);
    assert_eq!(st.buffer.text(), "/srv$ ls\na\n/srv$ pwd");
    assert_eq!(st.buffer.cursor(), st.buffer.latest_mark());
}

#[test]
fn command_text_is_not_logged() {
    let dir = tempfile::tempdir().unwrap();
    let mut st = primed_state(&dir, Platform::Posix, "/srv");
    let (writer, buffer) = BufferWriter::new();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(Level::TRACE)
        .with_target(true)
        .with_ansi(false)
        .without_time()
        .with_writer(writer)
        .finish();

    with_default(subscriber, || {
        type_and_submit(&mut st, "echo supersecret");
    });

    let log_output = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
    assert!(log_output.contains("loop.exec:"));
    assert!(log_output.contains("exec_dispatched"));
    assert!(log_output.contains("cmd_len=16"));
    assert!(!log_output.contains("supersecret"));
}
