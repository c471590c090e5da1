//! Kernel Facade
//!
//! Ties the execution coordinator, the static completion helpers and the
//! kernel metadata together behind the handlers a notebook transport calls.

pub mod executor;
pub mod protocol;

use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::OnceCell;

use crate::completion;
use crate::config::{KernelConfig, ReplConfig};
use crate::error::Result;
use crate::pty::PtyLauncher;
use crate::session::ReplLauncher;
pub use executor::{normalize_code, ExecutionCoordinator, InterruptRelay, RESTART_NOTICE};
use protocol::{
    CompleteReply, CompleteRequest, ExecuteReply, ExecuteRequest, IsCompleteReply,
    IsCompleteRequest, StreamEvent,
};

/// Messaging protocol version the replies conform to
pub const PROTOCOL_VERSION: &str = "5.3";

pub const IMPLEMENTATION: &str = "SML/NJ";
pub const IMPLEMENTATION_VERSION: &str = "0.0.1";

/// Language details reported in `kernel_info_reply`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LanguageInfo {
    pub name: String,
    pub version: String,
    pub codemirror_mode: String,
    pub mimetype: String,
    pub file_extension: String,
}

impl LanguageInfo {
    fn smlnj(version: String) -> Self {
        Self {
            name: "SML/NJ".to_string(),
            version,
            codemirror_mode: "fsharp".to_string(),
            mimetype: "text/plain".to_string(),
            file_extension: ".sml".to_string(),
        }
    }
}

/// Contents of a `kernel_info_reply`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KernelInfo {
    pub protocol_version: String,
    pub implementation: String,
    pub implementation_version: String,
    pub language_info: LanguageInfo,
    pub banner: String,
}

impl KernelInfo {
    pub fn new(language_version: &str) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION.to_string(),
            implementation: IMPLEMENTATION.to_string(),
            implementation_version: IMPLEMENTATION_VERSION.to_string(),
            language_info: LanguageInfo::smlnj(language_version.to_string()),
            banner: format!("Simple SML/NJ Kernel {}", language_version),
        }
    }
}

/// Version banner of the REPL executable, queried on first use
#[derive(Debug)]
pub struct LanguageVersion {
    executable: String,
    args: Vec<String>,
    cached: OnceCell<String>,
}

impl LanguageVersion {
    pub fn new(config: &ReplConfig) -> Self {
        Self {
            executable: config.executable.clone(),
            args: config.version_args.clone(),
            cached: OnceCell::new(),
        }
    }

    /// Run the executable once and remember its stdout
    pub async fn get(&self) -> &str {
        self.cached.get_or_init(|| self.query()).await
    }

    async fn query(&self) -> String {
        debug!("Querying version: {} {:?}", self.executable, self.args);
        match Command::new(&self.executable)
            .args(&self.args)
            .stdin(std::process::Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
        {
            Ok(output) => String::from_utf8_lossy(&output.stdout).trim().to_string(),
            Err(e) => {
                warn!("Could not query {} version: {}", self.executable, e);
                String::new()
            }
        }
    }
}

/// Message handlers for one SML/NJ kernel instance
pub struct SmlnjKernel {
    coordinator: ExecutionCoordinator,
    version: LanguageVersion,
}

impl SmlnjKernel {
    /// Start a kernel whose REPL runs under a PTY
    pub async fn start(config: &KernelConfig, stream_tx: UnboundedSender<StreamEvent>) -> Result<Self> {
        let launcher = PtyLauncher::new(config.pty.clone());
        Self::with_launcher(Box::new(launcher), config.repl.clone(), stream_tx).await
    }

    /// Start a kernel with a custom process launcher
    pub async fn with_launcher(
        launcher: Box<dyn ReplLauncher>,
        config: ReplConfig,
        stream_tx: UnboundedSender<StreamEvent>,
    ) -> Result<Self> {
        let version = LanguageVersion::new(&config);
        let coordinator = ExecutionCoordinator::start(launcher, config, stream_tx).await?;
        Ok(Self {
            coordinator,
            version,
        })
    }

    pub async fn execute(&mut self, request: &ExecuteRequest) -> ExecuteReply {
        self.coordinator.execute(request).await
    }

    pub fn complete(&self, request: &CompleteRequest) -> CompleteReply {
        completion::complete(&request.code, request.cursor_pos)
    }

    pub fn is_complete(&self, request: &IsCompleteRequest) -> IsCompleteReply {
        completion::is_complete(&request.code)
    }

    pub async fn kernel_info(&self) -> KernelInfo {
        KernelInfo::new(self.version.get().await)
    }

    pub fn interrupt_handle(&self) -> InterruptRelay {
        self.coordinator.interrupt_handle()
    }

    pub fn coordinator(&self) -> &ExecutionCoordinator {
        &self.coordinator
    }
}
