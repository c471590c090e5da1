//! PTY Process Spawning
//!
//! Spawns the REPL inside a pseudoterminal using the portable-pty crate and
//! bridges its blocking I/O to async code with reader/writer threads.

use async_trait::async_trait;
use nix::errno::Errno;
use portable_pty::{native_pty_system, Child, ChildKiller, CommandBuilder, MasterPty, PtySize};
use std::io::{Read, Write};
use std::sync::mpsc::channel;
use std::thread;
use tokio::sync::mpsc::unbounded_channel;

use super::signals::{self, SignalDispositionGuard};
use super::streams::PtyStreams;
use crate::config::{PtyConfig, ReplConfig};
use crate::error::{Error, Result};
use crate::session::{ReplLauncher, ReplProcess};

/// A REPL child process running on a PTY
pub struct PtyReplProcess {
    child: Box<dyn Child + Send + Sync>,
    // Kept alive so the PTY is not torn down under the child
    _master: Box<dyn MasterPty + Send>,
    streams: PtyStreams,
    pid: Option<u32>,
    command: String,
}

#[async_trait]
impl ReplProcess for PtyReplProcess {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        self.streams.write(data)
    }

    async fn recv(&mut self) -> Option<Vec<u8>> {
        self.streams.read().await
    }

    fn interrupt(&mut self) -> Result<()> {
        let pid = self.pid.ok_or(Error::NoPidAvailable)?;
        signals::send_interrupt(pid)
    }

    fn pid(&self) -> Option<u32> {
        self.pid
    }
}

impl Drop for PtyReplProcess {
    fn drop(&mut self) {
        match self.child.try_wait() {
            Ok(Some(status)) => debug!("REPL '{}' already exited: {:?}", self.command, status),
            _ => {
                debug!("Killing REPL '{}' (pid {:?})", self.command, self.pid);
                if let Err(e) = self.child.kill() {
                    debug!("Failed to kill REPL process: {}", e);
                }
                let _ = self.child.wait();
            }
        }
    }
}

/// Launches REPL processes on a fresh PTY each time
#[derive(Debug, Clone, Default)]
pub struct PtyLauncher {
    pty: PtyConfig,
}

impl PtyLauncher {
    pub fn new(pty: PtyConfig) -> Self {
        Self { pty }
    }
}

#[async_trait]
impl ReplLauncher for PtyLauncher {
    async fn launch(&self, repl: &ReplConfig) -> Result<Box<dyn ReplProcess>> {
        let process = spawn_pty_process(repl, &self.pty)?;
        Ok(Box::new(process))
    }
}

/// Spawn the REPL on a new PTY with echo disabled
pub fn spawn_pty_process(repl: &ReplConfig, pty: &PtyConfig) -> Result<PtyReplProcess> {
    let command = repl.command_line();
    let pty_system = native_pty_system();

    let (cols, rows) = pty.dimensions;
    let pair = pty_system
        .openpty(PtySize {
            rows,
            cols,
            pixel_width: 0,
            pixel_height: 0,
        })
        .map_err(|e| Error::PtyCreationFailed {
            command: command.clone(),
            reason: e.to_string(),
        })?;

    // Sent text must not be echoed back into the captured output
    disable_echo(pair.master.as_ref())?;

    let mut cmd_builder = CommandBuilder::new(&repl.executable);
    cmd_builder.args(&repl.args);
    if !pty.inherit_env {
        cmd_builder.env_clear();
    }
    for (key, value) in &pty.environment {
        cmd_builder.env(key, value);
    }

    let child = {
        let _sigint = SignalDispositionGuard::default_interrupt()?;
        pair.slave
            .spawn_command(cmd_builder)
            .map_err(|e| Error::CommandSpawnFailed {
                command: command.clone(),
                reason: e.to_string(),
            })?
    };
    // Our copy of the slave must go, otherwise the reader never sees EOF
    drop(pair.slave);

    let pid = child.process_id();
    info!("Spawned REPL '{}' (pid {:?})", command, pid);

    let streams = create_pty_streams(pair.master.as_ref())?;

    Ok(PtyReplProcess {
        child,
        _master: pair.master,
        streams,
        pid,
        command,
    })
}

fn disable_echo(master: &dyn MasterPty) -> Result<()> {
    use nix::sys::termios::{tcgetattr, tcsetattr, LocalFlags, SetArg};
    use std::os::fd::BorrowedFd;

    let Some(fd) = master.as_raw_fd() else {
        warn!("PTY master has no file descriptor; echo left enabled");
        return Ok(());
    };
    // SAFETY: the fd belongs to `master`, which outlives this borrow.
    let fd = unsafe { BorrowedFd::borrow_raw(fd) };

    let mut termios = tcgetattr(fd).map_err(|e| Error::TerminalConfigFailed {
        reason: e.to_string(),
    })?;
    termios.local_flags.remove(LocalFlags::ECHO);
    tcsetattr(fd, SetArg::TCSANOW, &termios).map_err(|e| Error::TerminalConfigFailed {
        reason: e.to_string(),
    })
}

/// Create PTY streams from the master side of a PTY pair
fn create_pty_streams(master: &dyn MasterPty) -> Result<PtyStreams> {
    let mut master_reader = master
        .try_clone_reader()
        .map_err(|e| Error::PtyReaderCloneFailed {
            reason: e.to_string(),
        })?;
    let mut master_writer = master
        .take_writer()
        .map_err(|e| Error::PtyWriterTakeFailed {
            reason: e.to_string(),
        })?;

    // Channel: PTY output -> async consumer
    let (tx_async_out, rx_async_out) = unbounded_channel::<Vec<u8>>();
    // Channel: async producer (stdin) -> PTY writer thread
    let (tx_stdin, rx_stdin) = channel::<Vec<u8>>();

    // Reader thread: dropping the sender on exit is how the session sees end-of-stream
    thread::spawn(move || {
        let mut buf = [0u8; 4096];
        let mut consecutive_errors = 0;
        const MAX_CONSECUTIVE_ERRORS: u32 = 5;

        loop {
            match master_reader.read(&mut buf) {
                Ok(0) => {
                    debug!("PTY read EOF - process terminated");
                    break;
                }
                Ok(n) => {
                    consecutive_errors = 0;
                    if tx_async_out.send(buf[..n].to_vec()).is_err() {
                        debug!("PTY read: receiver dropped, stopping reader thread");
                        break;
                    }
                }
                Err(e) => {
                    if e.kind() == std::io::ErrorKind::Interrupted {
                        continue;
                    }

                    // Linux reports a hung-up slave as EIO rather than a zero read
                    if e.raw_os_error() == Some(Errno::EIO as i32) {
                        debug!("PTY read EIO - slave side closed");
                        break;
                    }

                    if e.kind() == std::io::ErrorKind::WouldBlock {
                        thread::sleep(std::time::Duration::from_millis(10));
                        continue;
                    }

                    consecutive_errors += 1;
                    warn!(
                        "PTY read error ({}): {} (attempt {}/{})",
                        e.kind(),
                        e,
                        consecutive_errors,
                        MAX_CONSECUTIVE_ERRORS
                    );

                    if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                        error!("PTY read: too many consecutive errors, stopping reader thread");
                        break;
                    }

                    thread::sleep(std::time::Duration::from_millis(50));
                }
            }
        }
        debug!("PTY reader thread exiting");
    });

    // Writer thread: receive stdin data and write to PTY master
    thread::spawn(move || {
        while let Ok(data) = rx_stdin.recv() {
            let mut attempts = 0;
            const MAX_ATTEMPTS: u32 = 3;

            loop {
                match master_writer.write_all(&data) {
                    Ok(()) => {
                        if let Err(e) = master_writer.flush() {
                            debug!("PTY flush error: {}", e);
                        }
                        break;
                    }
                    Err(e) => {
                        attempts += 1;

                        if e.kind() == std::io::ErrorKind::Interrupted {
                            continue;
                        }

                        if e.kind() == std::io::ErrorKind::WouldBlock && attempts < MAX_ATTEMPTS {
                            thread::sleep(std::time::Duration::from_millis(10));
                            continue;
                        }

                        error!("PTY write error ({}): {}, stopping writer thread", e.kind(), e);
                        return;
                    }
                }
            }
        }
        debug!("PTY writer thread exiting");
    });

    Ok(PtyStreams::from_channels(rx_async_out, tx_stdin))
}
