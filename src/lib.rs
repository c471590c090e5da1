//! smlnj-kernel - a notebook kernel for the SML/NJ REPL
//!
//! The kernel runs one interactive `sml` process under a pseudoterminal and
//! turns each notebook cell into a single REPL submission. The REPL has no
//! structured protocol, so completion of a command is detected by matching
//! its prompts in the output stream.
//!
//! ## Module Organization
//!
//! - [`session`] - Session driver: submits commands and classifies prompts
//! - [`kernel`] - Execution coordinator, kernel metadata, message payloads
//! - [`pty`] - PTY spawning, I/O streams, signal delivery
//! - [`completion`] - Keyword completion and completeness checks
//! - [`config`] - Configuration loading and validation
//! - [`mod@error`] - Error types and Result aliases
//!
//! ## Quick Start
//!
//! ```no_run
//! use smlnj_kernel::kernel::protocol::ExecuteRequest;
//! use smlnj_kernel::{load_config, SmlnjKernel};
//!
//! # async fn run() -> smlnj_kernel::Result<()> {
//! let config = load_config();
//! let (stream_tx, mut stream_rx) = tokio::sync::mpsc::unbounded_channel();
//! let mut kernel = SmlnjKernel::start(&config, stream_tx).await?;
//!
//! let reply = kernel.execute(&ExecuteRequest::new("1 + 1;")).await;
//! while let Ok(event) = stream_rx.try_recv() {
//!     print!("{}", event.text);
//! }
//! println!("{:?}", reply.status);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **PTY Reader Thread:** Reads REPL output (blocking I/O) into a channel
//! - **PTY Writer Thread:** Writes submitted commands to the REPL
//! - **Session:** Awaits output, interrupts and deadlines with `tokio::select!`
//!
//! Interrupts reach a running command through an [`InterruptRelay`] that
//! survives session restarts.

#![allow(unexpected_cfgs)]

#[macro_use]
extern crate tracing;

pub mod completion;
pub mod config;
pub mod error;
pub mod kernel;
pub mod pty;
pub mod session;

pub use config::loader::ConfigLoader;
pub use config::{KernelConfig, PtyConfig, ReplConfig};
pub use error::{Error, Result};
pub use kernel::{ExecutionCoordinator, InterruptRelay, KernelInfo, SmlnjKernel};
pub use session::{ExecutionOutcome, ExecutionResult, ReplLauncher, ReplProcess, Session};

/// The current version of the kernel from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The package name from Cargo.toml
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// The package description from Cargo.toml
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Load configuration from the default search paths, falling back to defaults
pub fn load_config() -> KernelConfig {
    match ConfigLoader::load() {
        Ok(config) => config,
        Err(e) => {
            warn!("Failed to load configuration: {}. Using defaults", e);
            KernelConfig::default()
        }
    }
}

/// Load configuration from an explicit file
pub fn load_config_from(path: &std::path::Path) -> Result<KernelConfig> {
    info!("Loading configuration from {}", path.display());
    KernelConfig::load_from_file(path).map_err(|e| {
        error!("Failed to load configuration from {}: {}", path.display(), e);
        e
    })
}

/// Human-readable explanation of a startup failure
pub fn handle_startup_error(error: &Error) -> String {
    match error {
        Error::ReplStartupFailed { command, reason } => {
            format!(
                "REPL Error: '{}' did not start: {}\n\nTry:\n• Check that SML/NJ is installed and on PATH\n• Set repl.executable in the configuration\n• Raise repl.startup_timeout_ms",
                command, reason
            )
        }
        Error::CommandSpawnFailed { command, reason } | Error::PtyCreationFailed { command, reason } => {
            format!(
                "Process Error: Could not launch '{}': {}\n\nTry:\n• Check that the executable exists\n• Check terminal availability",
                command, reason
            )
        }
        Error::ConfigLoadFailed { path, reason } => {
            format!(
                "Configuration Error: Failed to load config from '{}': {}\n\nTry:\n• Check configuration file syntax\n• Use default configuration",
                path.display(),
                reason
            )
        }
        Error::ConfigParseFailed { format, reason } => {
            format!(
                "Configuration Error: Failed to parse {} config: {}",
                format, reason
            )
        }
        Error::ConfigValidationFailed { field, reason } => {
            format!(
                "Configuration Error: Validation failed for '{}': {}",
                field, reason
            )
        }
        _ => {
            format!(
                "Unexpected Error: {}\n\nPlease report this issue with debug logs enabled",
                error
            )
        }
    }
}
