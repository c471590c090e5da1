//! REPL Session Driver
//!
//! A [`Session`] owns one REPL child process and the prompt grammar used to
//! synchronize with it. Commands are submitted one at a time; the only signal
//! that a command has finished is the REPL printing one of its prompts:
//!
//! - the **primary** prompt means the command was consumed and the REPL is idle
//! - the **continuation** prompt means the command was syntactically incomplete;
//!   since the caller has nothing more to send, the pending input is aborted with
//!   an interrupt and the command is reported as [`ExecutionOutcome::Incomplete`]
//!
//! Interrupts from the caller are delivered out of band through an
//! [`InterruptHandle`] while [`Session::submit`] is waiting for a prompt.
//! When `submit` returns, the session is either [`SessionState::Idle`] or
//! [`SessionState::Terminated`].

pub mod scanner;

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::time::Instant;
use uuid::Uuid;

use crate::config::ReplConfig;
use crate::error::{Error, Result};
pub use scanner::{PromptMatch, PromptOutcome, PromptScanner};

/// Byte-level access to a running REPL process
#[async_trait]
pub trait ReplProcess: Send {
    /// Write raw input to the process
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Next chunk of output; `None` once the process output has reached end-of-stream
    async fn recv(&mut self) -> Option<Vec<u8>>;

    /// Deliver the platform interrupt signal to the process
    fn interrupt(&mut self) -> Result<()>;

    /// Process ID, when the process has one
    fn pid(&self) -> Option<u32>;
}

/// Creates REPL processes; used at startup and whenever a session has to be replaced
#[async_trait]
pub trait ReplLauncher: Send + Sync {
    async fn launch(&self, config: &ReplConfig) -> Result<Box<dyn ReplProcess>>;
}

/// Driver state between and during submissions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Ready for the next command
    Idle,
    /// A command was sent and the driver is scanning for a prompt
    AwaitingPrompt,
    /// The child process reached end-of-stream, or lost prompt synchronization
    /// and must be replaced
    Terminated,
}

/// Classification of one submitted command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// Primary prompt seen; command fully consumed
    Ok,
    /// Continuation prompt seen; pending input was aborted
    Incomplete,
    /// The caller interrupted the command
    Interrupted,
    /// The child process exited
    Terminated,
}

/// Output captured for one command, tagged with what happened
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub outcome: ExecutionOutcome,
    /// Text received before the matched prompt (or before end-of-stream)
    pub output: String,
    /// The command as submitted
    pub command: String,
}

impl ExecutionResult {
    /// Message describing an incomplete command, if this result is one
    pub fn diagnostic(&self) -> Option<String> {
        match self.outcome {
            ExecutionOutcome::Incomplete => Some(format!(
                "Continuation prompt found - input was incomplete:\n{}",
                self.command
            )),
            _ => None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.outcome == ExecutionOutcome::Ok
    }
}

/// Cloneable handle that interrupts whatever command the session is running
#[derive(Debug, Clone)]
pub struct InterruptHandle {
    tx: UnboundedSender<()>,
}

impl InterruptHandle {
    /// Request an interrupt; returns false if the session is gone
    pub fn interrupt(&self) -> bool {
        self.tx.send(()).is_ok()
    }
}

/// What a prompt scan ended with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanEvent {
    Prompt(PromptOutcome),
    Timeout,
    Interrupted,
    EndOfStream,
}

/// One live REPL child process plus its prompt matchers
pub struct Session {
    id: String,
    process: Box<dyn ReplProcess>,
    scanner: PromptScanner,
    state: SessionState,
    interrupt_tx: UnboundedSender<()>,
    interrupt_rx: UnboundedReceiver<()>,
    resync_timeout: Duration,
    recovery_timeout: Option<Duration>,
}

impl Session {
    /// Launch the REPL and wait for its first prompt
    pub async fn open(launcher: &dyn ReplLauncher, config: &ReplConfig) -> Result<Self> {
        let scanner = PromptScanner::new(&config.primary_prompt, &config.continuation_prompt)?;
        let process = launcher.launch(config).await?;
        let mut session = Self::with_process(process, scanner, config);

        match session
            .expect_prompt(Some(config.startup_timeout()), false)
            .await
        {
            ScanEvent::Prompt(_) => {
                info!(
                    "REPL session {} ready (pid {:?})",
                    session.id,
                    session.process.pid()
                );
                session.state = SessionState::Idle;
                Ok(session)
            }
            ScanEvent::EndOfStream => Err(Error::ReplStartupFailed {
                command: config.command_line(),
                reason: format!(
                    "process exited before its first prompt: {:?}",
                    session.scanner.flush_remaining()
                ),
            }),
            ScanEvent::Timeout | ScanEvent::Interrupted => Err(Error::ReplStartupFailed {
                command: config.command_line(),
                reason: format!(
                    "no prompt within {:?}; received {:?}",
                    config.startup_timeout(),
                    session.scanner.buffered()
                ),
            }),
        }
    }

    fn with_process(
        process: Box<dyn ReplProcess>,
        scanner: PromptScanner,
        config: &ReplConfig,
    ) -> Self {
        let (interrupt_tx, interrupt_rx) = unbounded_channel();
        Self {
            id: Uuid::new_v4().to_string(),
            process,
            scanner,
            state: SessionState::AwaitingPrompt,
            interrupt_tx,
            interrupt_rx,
            resync_timeout: config.resync_timeout(),
            recovery_timeout: config.recovery_timeout(),
        }
    }

    /// Send one command and wait for the REPL to answer with a prompt
    ///
    /// `timeout` bounds the prompt scan; `None` waits indefinitely. On timeout the
    /// command is interrupted and the REPL resynchronized before
    /// [`Error::PromptTimeout`] is returned. If the REPL does not answer the
    /// interrupt in time the session is left [`SessionState::Terminated`].
    pub async fn submit(
        &mut self,
        command: &str,
        timeout: Option<Duration>,
    ) -> Result<ExecutionResult> {
        if command.is_empty() {
            return Err(Error::EmptyCommand);
        }
        if self.state == SessionState::Terminated {
            return Err(Error::SessionTerminated);
        }

        let result = self.exchange(command, timeout).await;

        // Interrupts that arrived after this command settled must not cancel the next one
        while self.interrupt_rx.try_recv().is_ok() {}

        result
    }

    async fn exchange(
        &mut self,
        command: &str,
        timeout: Option<Duration>,
    ) -> Result<ExecutionResult> {
        debug!("Submitting to session {}: {:?}", self.id, command);
        let mut line = String::with_capacity(command.len() + 1);
        line.push_str(command);
        line.push('\n');
        if let Err(e) = self.process.send(line.as_bytes()).await {
            warn!("Failed to send command, treating session as terminated: {}", e);
            return Ok(self.terminated(command));
        }
        self.state = SessionState::AwaitingPrompt;

        match self.expect_prompt(timeout, true).await {
            ScanEvent::Prompt(PromptOutcome::Primary) => {
                self.state = SessionState::Idle;
                Ok(self.result(ExecutionOutcome::Ok, command))
            }
            ScanEvent::Prompt(PromptOutcome::Continuation) => {
                warn!("Continuation prompt after {:?}; aborting input", command);
                let output = self.scanner.before().to_string();
                if let Some(result) = self.abort_pending(command, Some(self.resync_timeout)).await {
                    return Ok(result);
                }
                Ok(ExecutionResult {
                    outcome: ExecutionOutcome::Incomplete,
                    output,
                    command: command.to_string(),
                })
            }
            ScanEvent::Interrupted => {
                info!("Interrupting command in session {}", self.id);
                if let Some(result) = self.abort_pending(command, self.recovery_timeout).await {
                    return Ok(result);
                }
                Ok(self.result(ExecutionOutcome::Interrupted, command))
            }
            ScanEvent::Timeout => {
                let duration = timeout.unwrap_or_default();
                warn!("No prompt within {:?} for {:?}", duration, command);
                if let Some(result) = self.abort_pending(command, Some(self.resync_timeout)).await {
                    return Ok(result);
                }
                Err(Error::PromptTimeout {
                    command: command.to_string(),
                    duration,
                    output: self.scanner.before().to_string(),
                })
            }
            ScanEvent::EndOfStream => Ok(self.terminated(command)),
        }
    }

    /// Interrupt the pending input and rescan for a prompt
    ///
    /// Returns a terminated result if the process died meanwhile. If the rescan
    /// times out the prompt the REPL still owes could arrive at any later point,
    /// so the session is marked terminated and its unconsumed output becomes the
    /// captured text.
    async fn abort_pending(
        &mut self,
        command: &str,
        timeout: Option<Duration>,
    ) -> Option<ExecutionResult> {
        if let Err(e) = self.process.interrupt() {
            warn!("Failed to interrupt REPL: {}", e);
        }

        match self.expect_prompt(timeout, false).await {
            ScanEvent::EndOfStream => Some(self.terminated(command)),
            ScanEvent::Prompt(_) => {
                self.state = SessionState::Idle;
                None
            }
            ScanEvent::Timeout | ScanEvent::Interrupted => {
                error!(
                    "REPL session {} did not resynchronize within {:?}; abandoning it",
                    self.id, timeout
                );
                self.scanner.flush_remaining();
                self.state = SessionState::Terminated;
                None
            }
        }
    }

    fn result(&self, outcome: ExecutionOutcome, command: &str) -> ExecutionResult {
        ExecutionResult {
            outcome,
            output: self.scanner.before().to_string(),
            command: command.to_string(),
        }
    }

    fn terminated(&mut self, command: &str) -> ExecutionResult {
        error!("REPL session {} reached end-of-stream", self.id);
        self.state = SessionState::Terminated;
        let output = self.scanner.flush_remaining().to_string();
        ExecutionResult {
            outcome: ExecutionOutcome::Terminated,
            output,
            command: command.to_string(),
        }
    }

    /// Scan incoming output until a prompt, the deadline, an interrupt or end-of-stream
    async fn expect_prompt(&mut self, timeout: Option<Duration>, interruptible: bool) -> ScanEvent {
        let deadline = timeout.map(|t| Instant::now() + t);

        loop {
            if let Some(outcome) = self.scanner.scan() {
                return ScanEvent::Prompt(outcome);
            }

            let sleep = async {
                match deadline {
                    Some(deadline) => tokio::time::sleep_until(deadline).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                chunk = self.process.recv() => match chunk {
                    Some(bytes) => {
                        trace!("Received {} bytes from REPL", bytes.len());
                        self.scanner.feed(&bytes);
                    }
                    None => return ScanEvent::EndOfStream,
                },
                Some(()) = self.interrupt_rx.recv(), if interruptible => {
                    return ScanEvent::Interrupted;
                }
                _ = sleep => return ScanEvent::Timeout,
            }
        }
    }

    /// Output preceding the most recent prompt match, without a new exchange
    pub fn capture_buffer(&self) -> &str {
        self.scanner.before()
    }

    /// Handle for interrupting commands from another task
    pub fn interrupt_handle(&self) -> InterruptHandle {
        InterruptHandle {
            tx: self.interrupt_tx.clone(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn pid(&self) -> Option<u32> {
        self.process.pid()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("pid", &self.process.pid())
            .field("state", &self.state)
            .finish()
    }
}
