//! Error types and Result aliases for the SML/NJ kernel

use std::path::PathBuf;
use std::time::Duration;

/// Result type alias for kernel operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the kernel
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // === PTY-related errors ===
    /// Failed to create PTY
    #[error("Failed to create PTY for command '{command}': {reason}")]
    PtyCreationFailed { command: String, reason: String },

    /// Failed to spawn command in PTY
    #[error("Failed to spawn command '{command}': {reason}")]
    CommandSpawnFailed { command: String, reason: String },

    /// Failed to clone PTY reader
    #[error("Failed to clone PTY reader: {reason}")]
    PtyReaderCloneFailed { reason: String },

    /// Failed to take PTY writer
    #[error("Failed to take PTY writer: {reason}")]
    PtyWriterTakeFailed { reason: String },

    /// Failed to send input to PTY
    #[error("Failed to send input to PTY: {reason}")]
    PtyInputSendFailed { reason: String },

    /// Failed to change terminal attributes
    #[error("Failed to configure terminal: {reason}")]
    TerminalConfigFailed { reason: String },

    /// Failed to send signal to process
    #[error("Failed to send signal '{signal}': {reason}")]
    SignalSendFailed { signal: String, reason: String },

    /// Failed to change a signal disposition
    #[error("Failed to set disposition for '{signal}': {reason}")]
    SignalDispositionFailed { signal: String, reason: String },

    /// No PID available for the child process
    #[error("No PID available for the REPL process")]
    NoPidAvailable,

    // === Session errors ===
    /// The REPL never showed its first prompt
    #[error("REPL '{command}' failed to start: {reason}")]
    ReplStartupFailed { command: String, reason: String },

    /// The session's child process has exited
    #[error("REPL session has terminated")]
    SessionTerminated,

    /// No session is available to run the request
    #[error("No REPL session is available")]
    NoSessionAvailable,

    /// Prompt scan exceeded its bound
    #[error("Command '{command}' timed out after {duration:?} waiting for a prompt")]
    PromptTimeout {
        command: String,
        duration: Duration,
        output: String,
    },

    // === Command errors ===
    /// Empty command
    #[error("Command cannot be empty")]
    EmptyCommand,

    // === Configuration errors ===
    /// Failed to load configuration file
    #[error("Failed to load config from '{}': {reason}", path.display())]
    ConfigLoadFailed { path: PathBuf, reason: String },

    /// Configuration file not found
    #[error("Configuration file not found")]
    ConfigNotFound,

    /// Configuration validation failed
    #[error("Configuration validation failed for '{field}': {reason}")]
    ConfigValidationFailed { field: String, reason: String },

    /// Failed to serialize configuration
    #[error("Failed to serialize config as {format}: {reason}")]
    ConfigSerializationFailed { format: String, reason: String },

    /// Failed to parse configuration
    #[error("Failed to parse {format} config: {reason}")]
    ConfigParseFailed { format: String, reason: String },

    // === I/O and serialization errors ===
    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// TOML parsing errors
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Regex compilation errors
    #[error("Regex compilation error: {0}")]
    Regex(#[from] regex::Error),
}

impl Error {
    /// Whether the error means the child process is gone and the session must be replaced
    pub fn is_child_process_failure(&self) -> bool {
        matches!(
            self,
            Error::SessionTerminated
                | Error::ReplStartupFailed { .. }
                | Error::CommandSpawnFailed { .. }
                | Error::PtyCreationFailed { .. }
                | Error::NoSessionAvailable
        )
    }
}
