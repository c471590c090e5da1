//! smlnj-kernel - notebook kernel for the SML/NJ REPL
//!
//! Speaks newline-delimited JSON on stdin/stdout: one request object per
//! line in, `stream` and `*_reply` objects out. Logs go to stderr.

use std::env;
use std::path::PathBuf;
use std::process;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info, warn};

use smlnj_kernel::kernel::protocol::{
    CompleteRequest, ExecuteRequest, IsCompleteRequest, StreamEvent,
};
use smlnj_kernel::{handle_startup_error, InterruptRelay, KernelConfig, SmlnjKernel};

/// Command line options
#[derive(Debug, Default)]
struct AppArgs {
    /// Configuration file path
    config_path: Option<PathBuf>,
    /// Enable debug logging
    debug: bool,
}

impl AppArgs {
    /// Parse command line arguments
    fn parse() -> Result<Self, String> {
        let args: Vec<String> = env::args().collect();
        let mut app_args = AppArgs::default();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--config" | "-c" => {
                    if i + 1 < args.len() {
                        app_args.config_path = Some(PathBuf::from(&args[i + 1]));
                        i += 1;
                    } else {
                        return Err("Missing config file path".to_string());
                    }
                }
                "--debug" | "-d" => {
                    app_args.debug = true;
                }
                "--help" | "-h" => {
                    print_help();
                    process::exit(0);
                }
                "--version" | "-v" => {
                    println!("{} v{}", smlnj_kernel::NAME, smlnj_kernel::VERSION);
                    process::exit(0);
                }
                arg => {
                    return Err(format!("Unknown argument: {}", arg));
                }
            }
            i += 1;
        }

        Ok(app_args)
    }
}

/// Print help information
fn print_help() {
    println!("smlnj-kernel - {}", smlnj_kernel::DESCRIPTION);
    println!();
    println!("USAGE:");
    println!("    smlnj-kernel [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    -c, --config <PATH>    Path to configuration file");
    println!("    -d, --debug            Enable debug logging");
    println!("    -h, --help             Print this help message");
    println!("    -v, --version          Print version information");
    println!();
    println!("PROTOCOL:");
    println!("    Reads one JSON request per line on stdin:");
    println!("      {{\"msg_type\": \"execute_request\", \"msg_id\": \"1\", \"content\": {{\"code\": \"1 + 1;\"}}}}");
    println!("    Supported: execute_request, complete_request, is_complete_request,");
    println!("    kernel_info_request, interrupt_request, shutdown_request");
    println!();
    println!("CONFIGURATION:");
    println!("    1. Path specified with --config");
    println!("    2. $XDG_CONFIG_HOME/smlnj-kernel/config.toml");
    println!("    3. ~/.config/smlnj-kernel/config.toml");
    println!("    4. ~/.smlnj-kernel/config.toml");
    println!("    5. ./.smlnj-kernel/config.toml");
    println!("    6. Built-in defaults");
    println!();
    println!("ENVIRONMENT:");
    println!("    SMLNJ_KERNEL_CONFIG    Path to configuration file");
    println!("    SMLNJ_KERNEL_DEBUG     Enable debug logging (1 or true)");
    println!("    RUST_LOG               Set logging level (error, warn, info, debug, trace)");
}

/// One request line
#[derive(Debug, Deserialize)]
struct Incoming {
    msg_type: String,
    #[serde(default)]
    msg_id: Option<String>,
    #[serde(default)]
    content: Value,
}

/// One output line
#[derive(Debug, Serialize)]
struct Outgoing {
    msg_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    parent_id: Option<String>,
    content: Value,
}

impl Outgoing {
    fn new(msg_type: &str, parent_id: Option<String>, content: impl Serialize) -> Self {
        let content = serde_json::to_value(content).unwrap_or_else(|e| {
            error!("Failed to serialize {}: {}", msg_type, e);
            Value::Null
        });
        Self {
            msg_type: msg_type.to_string(),
            parent_id,
            content,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = AppArgs::parse().unwrap_or_else(|e| {
        eprintln!("Failed to parse arguments: {}", e);
        print_help();
        process::exit(1);
    });

    let debug_env = env::var("SMLNJ_KERNEL_DEBUG")
        .map_or(false, |v| v == "1" || v.eq_ignore_ascii_case("true"));
    let log_level = if args.debug || debug_env { "debug" } else { "info" };

    let env_filter = env::var("RUST_LOG").unwrap_or_else(|_| log_level.to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from(env_filter))
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    info!("Starting {} v{}", smlnj_kernel::NAME, smlnj_kernel::VERSION);
    debug!("Debug mode enabled");

    let config = load_configuration(&args)?;

    let (stream_tx, mut stream_rx) = unbounded_channel();
    let mut kernel = match SmlnjKernel::start(&config, stream_tx).await {
        Ok(kernel) => kernel,
        Err(e) => {
            eprintln!("{}", handle_startup_error(&e));
            return Err(e).context("Kernel startup failed");
        }
    };

    let (out_tx, out_rx) = unbounded_channel();
    let writer = tokio::spawn(write_messages(out_rx));

    let (request_tx, mut request_rx) = unbounded_channel();
    tokio::spawn(read_messages(kernel.interrupt_handle(), request_tx, out_tx.clone()));
    tokio::spawn(forward_ctrl_c(kernel.interrupt_handle()));

    while let Some(message) = request_rx.recv().await {
        let parent = message.msg_id.clone();
        let reply = match message.msg_type.as_str() {
            "execute_request" => {
                let request: ExecuteRequest = parse_content(message.content);
                let reply = kernel.execute(&request).await;
                Outgoing::new("execute_reply", parent.clone(), reply)
            }
            "complete_request" => {
                let request: CompleteRequest = parse_content(message.content);
                Outgoing::new("complete_reply", parent.clone(), kernel.complete(&request))
            }
            "is_complete_request" => {
                let request: IsCompleteRequest = parse_content(message.content);
                Outgoing::new("is_complete_reply", parent.clone(), kernel.is_complete(&request))
            }
            "kernel_info_request" => {
                let info = kernel.kernel_info().await;
                Outgoing::new("kernel_info_reply", parent.clone(), info)
            }
            "shutdown_request" => {
                info!("Shutdown requested");
                let reply = Outgoing::new(
                    "shutdown_reply",
                    parent,
                    json!({ "status": "ok", "restart": false }),
                );
                let _ = out_tx.send(reply);
                break;
            }
            other => {
                warn!("Ignoring unsupported message type: {}", other);
                continue;
            }
        };

        // Output of a request always precedes its reply
        flush_streams(&mut stream_rx, &parent, &out_tx);
        let _ = out_tx.send(reply);
    }

    drop(kernel);
    drop(out_tx);
    writer.await.context("Output writer failed")??;

    info!("{} shutdown complete", smlnj_kernel::NAME);
    Ok(())
}

/// Load configuration from file or use defaults
fn load_configuration(args: &AppArgs) -> anyhow::Result<KernelConfig> {
    let config_path = args
        .config_path
        .clone()
        .or_else(|| env::var("SMLNJ_KERNEL_CONFIG").ok().map(PathBuf::from));

    match config_path {
        Some(path) => smlnj_kernel::load_config_from(&path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => {
            debug!("Using configuration from default search paths");
            Ok(smlnj_kernel::load_config())
        }
    }
}

/// Decode request content; malformed content is an empty request
fn parse_content<T: for<'de> Deserialize<'de> + Default>(content: Value) -> T {
    if content.is_null() {
        return T::default();
    }
    serde_json::from_value(content).unwrap_or_else(|e| {
        warn!("Malformed request content: {}", e);
        T::default()
    })
}

fn flush_streams(
    stream_rx: &mut UnboundedReceiver<StreamEvent>,
    parent: &Option<String>,
    out_tx: &UnboundedSender<Outgoing>,
) {
    while let Ok(event) = stream_rx.try_recv() {
        let _ = out_tx.send(Outgoing::new("stream", parent.clone(), event));
    }
}

/// Read request lines; interrupts are handled here so they reach a running execute
async fn read_messages(
    interrupts: InterruptRelay,
    request_tx: UnboundedSender<Incoming>,
    out_tx: UnboundedSender<Outgoing>,
) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                error!("Failed to read stdin: {}", e);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let message: Incoming = match serde_json::from_str(&line) {
            Ok(message) => message,
            Err(e) => {
                warn!("Ignoring malformed message: {}", e);
                continue;
            }
        };

        if message.msg_type == "interrupt_request" {
            let delivered = interrupts.interrupt();
            debug!("Interrupt requested (delivered: {})", delivered);
            let _ = out_tx.send(Outgoing::new(
                "interrupt_reply",
                message.msg_id,
                json!({ "status": "ok" }),
            ));
            continue;
        }

        if request_tx.send(message).is_err() {
            break;
        }
    }

    debug!("Request stream closed");
}

async fn forward_ctrl_c(interrupts: InterruptRelay) {
    while tokio::signal::ctrl_c().await.is_ok() {
        info!("Ctrl-C received; interrupting running command");
        interrupts.interrupt();
    }
}

async fn write_messages(mut out_rx: UnboundedReceiver<Outgoing>) -> anyhow::Result<()> {
    let mut stdout = tokio::io::stdout();
    while let Some(message) = out_rx.recv().await {
        let mut line = serde_json::to_vec(&message)?;
        line.push(b'\n');
        stdout.write_all(&line).await?;
        stdout.flush().await?;
        // Nothing may follow the shutdown reply
        if message.msg_type == "shutdown_reply" {
            break;
        }
    }
    Ok(())
}
