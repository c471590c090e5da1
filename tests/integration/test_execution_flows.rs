//! Integration Tests for Notebook Execution Flows
//!
//! Runs several cells in a row through the kernel facade, the way a notebook
//! front-end would.

#[path = "../test_utils/mod.rs"]
mod test_utils;

use smlnj_kernel::kernel::protocol::{
    CompleteRequest, Completeness, ExecuteRequest, IsCompleteRequest, ReplyStatus,
};
use smlnj_kernel::{KernelConfig, PtyConfig, ReplConfig, SmlnjKernel};
use tokio::sync::mpsc::unbounded_channel;
use test_utils::{fast_config, stream_text, MockLauncher, MockScript, Reply};

fn notebook_script() -> MockScript {
    MockScript::new()
        .on("fun square x = x * x;", Reply::output("val square = fn : int -> int"))
        .on("square 7;", Reply::output("val it = 49 : int"))
        .on(
            "square \"seven\";",
            Reply::output(
                "stdIn:3.1-3.16 Error: operator and operand do not agree [tycon mismatch]",
            ),
        )
        .on("val xs = [1, 2, 3];", Reply::output("val xs = [1,2,3] : int list"))
}

#[tokio::test]
async fn test_notebook_session() {
    let launcher = MockLauncher::new(notebook_script());
    let state = launcher.state();
    let (tx, mut rx) = unbounded_channel();
    let mut kernel = SmlnjKernel::with_launcher(Box::new(launcher), fast_config(), tx)
        .await
        .unwrap();

    let reply = kernel
        .execute(&ExecuteRequest::new("fun square x =\n  x * x;"))
        .await;
    assert_eq!(reply.status, ReplyStatus::Ok);
    assert_eq!(stream_text(&mut rx), "val square = fn : int -> int");

    let reply = kernel.execute(&ExecuteRequest::new("square 7;")).await;
    assert_eq!(reply.status, ReplyStatus::Ok);
    assert_eq!(stream_text(&mut rx), "val it = 49 : int");

    // Type errors are ordinary REPL output
    let reply = kernel.execute(&ExecuteRequest::new("square \"seven\";")).await;
    assert_eq!(reply.status, ReplyStatus::Ok);
    assert!(stream_text(&mut rx).contains("tycon mismatch"));

    let reply = kernel.execute(&ExecuteRequest::new("val xs = [1, 2, 3];")).await;
    assert_eq!(reply.execution_count, 4);
    assert_eq!(state.launches(), 1);
    assert_eq!(
        kernel.coordinator().capture_buffer(),
        Some("val xs = [1,2,3] : int list")
    );
}

#[tokio::test]
async fn test_kernel_info_reports_version_banner() {
    let launcher = MockLauncher::new(MockScript::new());
    let (tx, _rx) = unbounded_channel();
    let kernel = SmlnjKernel::with_launcher(Box::new(launcher), fast_config(), tx)
        .await
        .unwrap();

    let info = kernel.kernel_info().await;

    assert_eq!(info.implementation, "SML/NJ");
    assert_eq!(info.language_info.name, "SML/NJ");
    assert_eq!(info.language_info.version, "Standard ML of New Jersey v110.99");
    assert_eq!(info.language_info.mimetype, "text/plain");
    assert_eq!(
        info.banner,
        "Simple SML/NJ Kernel Standard ML of New Jersey v110.99"
    );
}

#[tokio::test]
async fn test_completion_and_completeness_through_kernel() {
    let launcher = MockLauncher::new(MockScript::new());
    let state = launcher.state();
    let (tx, _rx) = unbounded_channel();
    let kernel = SmlnjKernel::with_launcher(Box::new(launcher), fast_config(), tx)
        .await
        .unwrap();

    let reply = kernel.complete(&CompleteRequest {
        code: "val y = tr".to_string(),
        cursor_pos: 10,
    });
    assert_eq!(reply.matches, vec!["true"]);
    assert_eq!((reply.cursor_start, reply.cursor_end), (8, 10));

    let reply = kernel.is_complete(&IsCompleteRequest {
        code: "val y = 1".to_string(),
    });
    assert_eq!(reply.status, Completeness::Incomplete);

    // Neither touches the REPL
    assert!(state.inputs().is_empty());
}

/// A shell loop that answers like the REPL, for exercising the real PTY path
fn shell_repl() -> KernelConfig {
    KernelConfig {
        repl: ReplConfig {
            executable: "sh".to_string(),
            args: vec![
                "-c".to_string(),
                "printf 'Standard ML\\n- '; while read line; do printf 'val it = \"%s\" : string\\n- ' \"$line\"; done"
                    .to_string(),
            ],
            startup_timeout_ms: 5000,
            ..Default::default()
        },
        pty: PtyConfig::default(),
    }
}

#[tokio::test]
async fn test_pty_backed_kernel() {
    let (tx, mut rx) = unbounded_channel();
    // PTY allocation can be unavailable in sandboxed CI; only check when it works
    let mut kernel = match SmlnjKernel::start(&shell_repl(), tx).await {
        Ok(kernel) => kernel,
        Err(_) => return,
    };

    let reply = kernel.execute(&ExecuteRequest::new("hello;")).await;

    assert_eq!(reply.status, ReplyStatus::Ok);
    assert!(stream_text(&mut rx).contains("val it = \"hello;\" : string"));
    assert!(kernel.coordinator().session().and_then(|s| s.pid()).is_some());
}
