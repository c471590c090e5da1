//! Pseudoterminal (PTY) Management
//!
//! Spawns the REPL under a pseudoterminal, bridges its blocking I/O onto
//! async channels, and delivers signals to it.

pub mod process;
pub mod signals;
pub mod streams;

pub use process::{spawn_pty_process, PtyLauncher, PtyReplProcess};
pub use signals::{send_interrupt, SignalDispositionGuard};
pub use streams::PtyStreams;
