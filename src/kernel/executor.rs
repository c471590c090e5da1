//! Execution Coordinator
//!
//! Adapts one `execute_request` to exactly one [`Session::submit`] call,
//! streams captured output back to the caller, and replaces the session when
//! the REPL process dies or stops answering interrupts.

use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::UnboundedSender;

use super::protocol::{ExecuteReply, ExecuteRequest, ReplyStatus, StreamEvent};
use crate::config::ReplConfig;
use crate::error::{Error, Result};
use crate::session::{
    ExecutionOutcome, ExecutionResult, InterruptHandle, ReplLauncher, Session, SessionState,
};

/// Streamed after the output of a command whose session had to be replaced
pub const RESTART_NOTICE: &str = "Restarting SML/NJ";

static LINE_BREAKS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\r\n]+").expect("valid regex"));

/// Trim the code and fold every run of line breaks into a single space
///
/// The REPL reads line by line, so embedded newlines would otherwise be seen
/// as separate submissions.
pub fn normalize_code(code: &str) -> String {
    LINE_BREAKS.replace_all(code.trim(), " ").into_owned()
}

/// Interrupts the current session, following it across restarts
#[derive(Debug, Clone, Default)]
pub struct InterruptRelay {
    current: Arc<Mutex<Option<InterruptHandle>>>,
}

impl InterruptRelay {
    /// Interrupt the running command; returns false if there is no live session
    pub fn interrupt(&self) -> bool {
        let current = match self.current.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        current.as_ref().is_some_and(InterruptHandle::interrupt)
    }

    fn attach(&self, handle: Option<InterruptHandle>) {
        let mut current = match self.current.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *current = handle;
    }
}

/// Runs execute requests against a single, exclusively owned REPL session
pub struct ExecutionCoordinator {
    launcher: Box<dyn ReplLauncher>,
    config: ReplConfig,
    session: Option<Session>,
    execution_count: u64,
    stream_tx: UnboundedSender<StreamEvent>,
    interrupts: InterruptRelay,
}

impl ExecutionCoordinator {
    /// Open the first session; fails if the REPL cannot be started
    pub async fn start(
        launcher: Box<dyn ReplLauncher>,
        config: ReplConfig,
        stream_tx: UnboundedSender<StreamEvent>,
    ) -> Result<Self> {
        let session = Session::open(launcher.as_ref(), &config).await?;
        let interrupts = InterruptRelay::default();
        interrupts.attach(Some(session.interrupt_handle()));

        Ok(Self {
            launcher,
            config,
            session: Some(session),
            execution_count: 0,
            stream_tx,
            interrupts,
        })
    }

    /// Handle one execute request; every path produces a reply
    pub async fn execute(&mut self, request: &ExecuteRequest) -> ExecuteReply {
        self.execution_count += 1;
        let count = self.execution_count;

        let code = normalize_code(&request.code);
        if code.is_empty() {
            return ExecuteReply::new(ReplyStatus::Ok, count);
        }

        let status = match self.run(&code, request.silent).await {
            Ok(status) => status,
            Err(e) => {
                error!("Execution {} failed: {}", count, e);
                self.emit(format!("{}\n", e));
                ReplyStatus::Error
            }
        };
        ExecuteReply::new(status, count)
    }

    async fn run(&mut self, code: &str, silent: bool) -> Result<ReplyStatus> {
        let timeout = self.config.command_timeout();
        let session = self.ensure_session().await?;

        let submitted = session.submit(code, timeout).await;
        // Dead or desynchronized sessions are never reused
        let replace = session.state() == SessionState::Terminated;

        let status = match submitted {
            Ok(result) => self.report(result, silent),
            Err(Error::PromptTimeout {
                command,
                duration,
                output,
            }) => {
                if !silent {
                    self.emit(output);
                }
                self.emit(format!(
                    "No prompt within {:?}; the command was interrupted:\n{}\n",
                    duration, command
                ));
                ReplyStatus::Error
            }
            Err(e) => {
                if replace {
                    self.restart().await;
                }
                return Err(e);
            }
        };

        if replace {
            self.emit(RESTART_NOTICE.to_string());
            self.restart().await;
        }
        Ok(status)
    }

    /// Stream the captured output of one command and pick the reply status
    fn report(&self, result: ExecutionResult, silent: bool) -> ReplyStatus {
        match result.outcome {
            ExecutionOutcome::Ok => {
                if !silent {
                    self.emit(result.output);
                }
                ReplyStatus::Ok
            }
            ExecutionOutcome::Incomplete => {
                if let Some(diagnostic) = result.diagnostic() {
                    self.emit(diagnostic);
                }
                ReplyStatus::Error
            }
            ExecutionOutcome::Interrupted => {
                if !silent {
                    self.emit(result.output);
                }
                ReplyStatus::Abort
            }
            // The restart notice follows once the session is replaced
            ExecutionOutcome::Terminated => {
                if !silent {
                    self.emit(result.output);
                }
                ReplyStatus::Ok
            }
        }
    }

    /// The live session, opening a new one if the last one died or never started
    async fn ensure_session(&mut self) -> Result<&mut Session> {
        let needs_open = self
            .session
            .as_ref()
            .map_or(true, |s| s.state() == SessionState::Terminated);
        if needs_open {
            self.restart().await;
        }
        self.session.as_mut().ok_or(Error::NoSessionAvailable)
    }

    /// Drop the current session and open a replacement
    async fn restart(&mut self) {
        self.interrupts.attach(None);
        // The old child is killed before the new one is spawned
        if let Some(old) = self.session.take() {
            info!("Discarding REPL session {}", old.id());
        }

        match Session::open(self.launcher.as_ref(), &self.config).await {
            Ok(session) => {
                info!("Replacement REPL session {} started", session.id());
                self.interrupts.attach(Some(session.interrupt_handle()));
                self.session = Some(session);
            }
            Err(e) => {
                error!("Failed to restart REPL: {}", e);
                self.emit(format!("\nFailed to restart REPL: {}\n", e));
            }
        }
    }

    fn emit(&self, text: String) {
        if text.is_empty() {
            return;
        }
        if self.stream_tx.send(StreamEvent::stdout(text)).is_err() {
            debug!("Stream receiver dropped; discarding output");
        }
    }

    /// Number of execute requests handled so far
    pub fn execution_count(&self) -> u64 {
        self.execution_count
    }

    /// The live session, if any
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Output captured before the most recent prompt of the live session
    pub fn capture_buffer(&self) -> Option<&str> {
        self.session.as_ref().map(Session::capture_buffer)
    }

    /// Handle that interrupts whatever command is running, across restarts
    pub fn interrupt_handle(&self) -> InterruptRelay {
        self.interrupts.clone()
    }
}
