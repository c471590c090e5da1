//! Contract Tests for the REPL Session Driver
//!
//! Drives [`Session`] against the scripted mock REPL and checks how each
//! prompt, interrupt, timeout and exit is classified.

#[path = "../test_utils/mod.rs"]
mod test_utils;

use smlnj_kernel::error::Error;
use smlnj_kernel::session::SessionState;
use smlnj_kernel::{ExecutionOutcome, Session};
use std::time::Duration;
use test_utils::{fast_config, MockLauncher, MockScript, Reply, BANNER};

fn script() -> MockScript {
    MockScript::new()
        .on("1 + 1;", Reply::output("val it = 2 : int"))
        .on("fun f x =", Reply::Continuation)
        .on("val x = 1;", Reply::output("val x = 1 : int"))
        .on("val big = 10;", Reply::chunked("val big = 10 : int"))
        .on("loop ();", Reply::Hang)
        .on("OS.Process.exit OS.Process.success;", Reply::exit("\n"))
}

#[tokio::test]
async fn test_open_consumes_banner() {
    let launcher = MockLauncher::new(script());
    let session = Session::open(&launcher, &fast_config()).await.unwrap();

    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(session.capture_buffer(), BANNER);
    assert_eq!(session.pid(), Some(4001));
    assert!(!session.id().is_empty());
}

#[tokio::test]
async fn test_open_without_prompt_fails() {
    let launcher = MockLauncher::new(script()).without_banner();
    let result = Session::open(&launcher, &fast_config()).await;

    assert!(matches!(result, Err(Error::ReplStartupFailed { .. })));
}

#[tokio::test]
async fn test_open_propagates_launch_failure() {
    let launcher = MockLauncher::new(script()).max_launches(0);
    let result = Session::open(&launcher, &fast_config()).await;

    assert!(matches!(result, Err(Error::CommandSpawnFailed { .. })));
}

#[tokio::test]
async fn test_submit_primary_prompt() {
    let launcher = MockLauncher::new(script());
    let state = launcher.state();
    let mut session = Session::open(&launcher, &fast_config()).await.unwrap();

    let result = session.submit("1 + 1;", None).await.unwrap();

    assert_eq!(result.outcome, ExecutionOutcome::Ok);
    assert!(result.is_ok());
    assert_eq!(result.output, "val it = 2 : int");
    assert!(result.diagnostic().is_none());
    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(session.capture_buffer(), "val it = 2 : int");
    assert_eq!(state.inputs(), vec!["1 + 1;"]);
}

#[tokio::test]
async fn test_continuation_prompt_is_incomplete_and_recovers() {
    let launcher = MockLauncher::new(script());
    let state = launcher.state();
    let mut session = Session::open(&launcher, &fast_config()).await.unwrap();

    let result = session.submit("fun f x =", None).await.unwrap();
    assert_eq!(result.outcome, ExecutionOutcome::Incomplete);
    assert_eq!(result.command, "fun f x =");
    assert_eq!(
        result.diagnostic().as_deref(),
        Some("Continuation prompt found - input was incomplete:\nfun f x =")
    );
    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(state.interrupts(), 1);

    // Pending input was aborted, so the next command starts fresh
    let result = session.submit("val x = 1;", None).await.unwrap();
    assert_eq!(result.outcome, ExecutionOutcome::Ok);
    assert_eq!(result.output, "val x = 1 : int");
}

#[tokio::test]
async fn test_interrupt_running_command() {
    let launcher = MockLauncher::new(script());
    let state = launcher.state();
    let mut session = Session::open(&launcher, &fast_config()).await.unwrap();
    let handle = session.interrupt_handle();

    let interrupter = {
        let state = state.clone();
        tokio::spawn(async move {
            state.wait_for_inputs(1).await;
            assert!(handle.interrupt());
        })
    };

    let result = session.submit("loop ();", None).await.unwrap();
    interrupter.await.unwrap();

    assert_eq!(result.outcome, ExecutionOutcome::Interrupted);
    assert!(result.output.contains("Interrupt"));
    assert_eq!(session.state(), SessionState::Idle);

    let result = session.submit("1 + 1;", None).await.unwrap();
    assert_eq!(result.outcome, ExecutionOutcome::Ok);
}

#[tokio::test]
async fn test_extra_interrupts_do_not_cancel_next_command() {
    let launcher = MockLauncher::new(script());
    let state = launcher.state();
    let mut session = Session::open(&launcher, &fast_config()).await.unwrap();
    let handle = session.interrupt_handle();

    let interrupter = {
        let state = state.clone();
        tokio::spawn(async move {
            state.wait_for_inputs(1).await;
            // A double Ctrl-C: the second arrives while the first is being handled
            handle.interrupt();
            handle.interrupt();
        })
    };
    let result = session.submit("loop ();", None).await.unwrap();
    interrupter.await.unwrap();
    assert_eq!(result.outcome, ExecutionOutcome::Interrupted);

    let result = session.submit("1 + 1;", None).await.unwrap();
    assert_eq!(result.outcome, ExecutionOutcome::Ok);
    assert_eq!(state.interrupts(), 1);
}

#[tokio::test]
async fn test_interrupt_sent_before_submit_cancels_it() {
    let launcher = MockLauncher::new(script());
    let mut session = Session::open(&launcher, &fast_config()).await.unwrap();

    // The request was already queued when the interrupt came in
    session.interrupt_handle().interrupt();
    let result = session.submit("loop ();", None).await.unwrap();

    assert_eq!(result.outcome, ExecutionOutcome::Interrupted);
    assert_eq!(session.state(), SessionState::Idle);
}

#[tokio::test]
async fn test_prompt_in_later_chunk_than_output() {
    let launcher = MockLauncher::new(script());
    let mut session = Session::open(&launcher, &fast_config()).await.unwrap();

    let result = session.submit("val big = 10;", None).await.unwrap();

    assert_eq!(result.outcome, ExecutionOutcome::Ok);
    assert_eq!(result.output, "val big = 10 : int");
    assert_eq!(session.state(), SessionState::Idle);
}

#[tokio::test]
async fn test_exit_terminates_session() {
    let launcher = MockLauncher::new(script());
    let mut session = Session::open(&launcher, &fast_config()).await.unwrap();

    let result = session
        .submit("OS.Process.exit OS.Process.success;", None)
        .await
        .unwrap();
    assert_eq!(result.outcome, ExecutionOutcome::Terminated);
    assert_eq!(result.output, "\n");
    assert_eq!(session.state(), SessionState::Terminated);

    let again = session.submit("1 + 1;", None).await;
    assert!(matches!(again, Err(Error::SessionTerminated)));
}

#[tokio::test]
async fn test_empty_command_rejected() {
    let launcher = MockLauncher::new(script());
    let state = launcher.state();
    let mut session = Session::open(&launcher, &fast_config()).await.unwrap();

    assert!(matches!(session.submit("", None).await, Err(Error::EmptyCommand)));
    assert!(state.inputs().is_empty());
}

#[tokio::test]
async fn test_prompt_timeout_resynchronizes() {
    let launcher = MockLauncher::new(script());
    let state = launcher.state();
    let mut session = Session::open(&launcher, &fast_config()).await.unwrap();

    let result = session
        .submit("loop ();", Some(Duration::from_millis(50)))
        .await;
    match result {
        Err(Error::PromptTimeout {
            command, duration, ..
        }) => {
            assert_eq!(command, "loop ();");
            assert_eq!(duration, Duration::from_millis(50));
        }
        other => panic!("expected a prompt timeout, got {:?}", other),
    }
    assert_eq!(state.interrupts(), 1);
    assert_eq!(session.state(), SessionState::Idle);

    let result = session.submit("1 + 1;", None).await.unwrap();
    assert_eq!(result.output, "val it = 2 : int");
}

#[tokio::test]
async fn test_unresponsive_repl_times_out() {
    let script = MockScript::new().on("hang;", Reply::Unresponsive);
    let launcher = MockLauncher::new(script);
    let mut session = Session::open(&launcher, &fast_config()).await.unwrap();

    let result = session.submit("hang;", Some(Duration::from_millis(50))).await;

    assert!(matches!(result, Err(Error::PromptTimeout { .. })));
    assert_eq!(session.state(), SessionState::Terminated);
    assert!(matches!(
        session.submit("1 + 1;", None).await,
        Err(Error::SessionTerminated)
    ));
}

#[tokio::test]
async fn test_late_interrupt_answer_abandons_session() {
    // fast_config resynchronizes for 200ms
    let launcher = MockLauncher::new(script()).slow_interrupts(Duration::from_millis(400));
    let state = launcher.state();
    let mut session = Session::open(&launcher, &fast_config()).await.unwrap();

    let result = session.submit("fun f x =", None).await.unwrap();

    assert_eq!(result.outcome, ExecutionOutcome::Incomplete);
    assert_eq!(state.interrupts(), 1);
    assert_eq!(session.state(), SessionState::Terminated);

    // The owed prompt must never be matched against a later command
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(matches!(
        session.submit("1 + 1;", None).await,
        Err(Error::SessionTerminated)
    ));
    assert_eq!(state.inputs(), vec!["fun f x ="]);
}
