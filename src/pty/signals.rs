//! PTY Signal Handling
//!
//! Sends interrupts to the REPL process and scopes the parent's SIGINT
//! disposition while a child is being spawned.

use crate::error::{Error, Result};
use nix::sys::signal::{kill, sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use nix::unistd::Pid;

/// Send SIGINT to a process (the REPL's own Ctrl+C handling aborts the pending input)
pub fn send_interrupt(pid: u32) -> Result<()> {
    send_signal(pid, Signal::SIGINT)
}

fn send_signal(pid: u32, signal: Signal) -> Result<()> {
    trace!("Sending {} to pid {}", signal, pid);
    // Non-positive pids address process groups
    let raw = i32::try_from(pid)
        .ok()
        .filter(|&raw| raw > 0)
        .ok_or_else(|| Error::SignalSendFailed {
            signal: signal.to_string(),
            reason: format!("pid {} is not a single process", pid),
        })?;
    kill(Pid::from_raw(raw), signal).map_err(|e| Error::SignalSendFailed {
        signal: signal.to_string(),
        reason: e.to_string(),
    })
}

/// Restores the previous disposition of a signal when dropped
///
/// Held across a child spawn so the child starts with the default SIGINT
/// behaviour even if the parent ignores the signal.
pub struct SignalDispositionGuard {
    signal: Signal,
    previous: SigAction,
}

impl SignalDispositionGuard {
    /// Switch SIGINT to its default disposition until the guard is dropped
    pub fn default_interrupt() -> Result<Self> {
        Self::install(Signal::SIGINT, SigHandler::SigDfl)
    }

    fn install(signal: Signal, handler: SigHandler) -> Result<Self> {
        let action = SigAction::new(handler, SaFlags::empty(), SigSet::empty());
        // SAFETY: installs SIG_DFL, which runs no Rust code in signal context.
        let previous = unsafe { sigaction(signal, &action) }.map_err(|e| {
            Error::SignalDispositionFailed {
                signal: signal.to_string(),
                reason: e.to_string(),
            }
        })?;
        Ok(Self { signal, previous })
    }
}

impl Drop for SignalDispositionGuard {
    fn drop(&mut self) {
        // SAFETY: restores the exact action that was installed before the guard.
        if let Err(e) = unsafe { sigaction(self.signal, &self.previous) } {
            warn!("Failed to restore {} disposition: {}", self.signal, e);
        }
    }
}
