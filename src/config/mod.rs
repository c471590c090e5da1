//! Configuration management for the SML/NJ kernel
//!
//! Holds the REPL launch parameters, the prompt grammar used to synchronize
//! with the child process, and the PTY settings the child is spawned with.

pub mod loader;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};

/// Default primary prompt of the SML/NJ REPL
pub const DEFAULT_PRIMARY_PROMPT: &str = "(\n|^)- ";

/// Default continuation prompt of the SML/NJ REPL
pub const DEFAULT_CONTINUATION_PROMPT: &str = "(\n|^)= ";

/// Main configuration structure for the kernel
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct KernelConfig {
    /// REPL process and prompt configuration
    pub repl: ReplConfig,

    /// PTY configuration
    pub pty: PtyConfig,
}

impl KernelConfig {
    /// Load configuration from a specific file, choosing the format by extension
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let loader = loader::ConfigLoader::new();
        let config = loader.load_file(path)?;
        loader.validate_config(&config)?;
        Ok(config)
    }
}

/// REPL process configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReplConfig {
    /// Executable to launch
    pub executable: String,

    /// Arguments passed to the executable
    pub args: Vec<String>,

    /// Regex matching the "ready for a new command" prompt
    pub primary_prompt: String,

    /// Regex matching the "input is incomplete" prompt
    pub continuation_prompt: String,

    /// How long to wait for the first prompt after spawning
    pub startup_timeout_ms: u64,

    /// How long to wait for a prompt after aborting an incomplete or timed out command
    pub resync_timeout_ms: u64,

    /// Bound on each command's prompt scan; `None` waits indefinitely
    pub command_timeout_ms: Option<u64>,

    /// Bound on the prompt scan after a caller interrupt; `None` waits indefinitely
    pub recovery_timeout_ms: Option<u64>,

    /// Arguments used to query the language version banner
    pub version_args: Vec<String>,
}

impl Default for ReplConfig {
    fn default() -> Self {
        Self {
            executable: "sml".to_string(),
            args: Vec::new(),
            primary_prompt: DEFAULT_PRIMARY_PROMPT.to_string(),
            continuation_prompt: DEFAULT_CONTINUATION_PROMPT.to_string(),
            startup_timeout_ms: 1000,
            resync_timeout_ms: 1000,
            command_timeout_ms: None,
            recovery_timeout_ms: None,
            version_args: vec![String::new()],
        }
    }
}

impl ReplConfig {
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }

    pub fn resync_timeout(&self) -> Duration {
        Duration::from_millis(self.resync_timeout_ms)
    }

    pub fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout_ms.map(Duration::from_millis)
    }

    pub fn recovery_timeout(&self) -> Option<Duration> {
        self.recovery_timeout_ms.map(Duration::from_millis)
    }

    /// Full command line, for logs and error messages
    pub fn command_line(&self) -> String {
        if self.args.is_empty() {
            self.executable.clone()
        } else {
            format!("{} {}", self.executable, self.args.join(" "))
        }
    }

    /// Check that both prompt patterns compile
    pub fn validate_prompts(&self) -> Result<()> {
        for (field, pattern) in [
            ("repl.primary_prompt", &self.primary_prompt),
            ("repl.continuation_prompt", &self.continuation_prompt),
        ] {
            if pattern.is_empty() {
                return Err(Error::ConfigValidationFailed {
                    field: field.to_string(),
                    reason: "Prompt pattern cannot be empty".to_string(),
                });
            }
            regex::Regex::new(pattern).map_err(|e| Error::ConfigValidationFailed {
                field: field.to_string(),
                reason: e.to_string(),
            })?;
        }
        Ok(())
    }
}

/// PTY-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PtyConfig {
    /// Environment variables to set
    pub environment: HashMap<String, String>,

    /// Whether to inherit parent environment
    pub inherit_env: bool,

    /// Terminal dimensions (cols, rows)
    pub dimensions: (u16, u16),
}

impl Default for PtyConfig {
    fn default() -> Self {
        Self {
            environment: HashMap::new(),
            inherit_env: true,
            // Wide enough that the REPL never wraps long result lines
            dimensions: (1024, 24),
        }
    }
}
