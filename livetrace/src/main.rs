//! # livetrace - Main Entry Point
//!
//! Supports two operational modes:
//! - **Live TUI** (`livetrace my-app`): interactive view, refreshed every 120ms
//! - **Headless** (`livetrace --headless`): JSON commands on stdin, replies on stdout
//!
//! Both modes drive the same [`Controller`]; only the transport differs.

use anyhow::Result;
use clap::Parser;
use log::{info, warn};
use std::io::IsTerminal;

use livetrace::cli::Args;
use livetrace::control::Controller;
use livetrace::domain::Tid;
use livetrace::platform::{native_backend, native_monitor, native_process_source};
use livetrace::profiling::Tracer;
use livetrace::{headless, tui};

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_NOPERM: i32 = 77;

fn main() {
    env_logger::init();
    std::process::exit(match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            let code = exit_code_for(&e);
            eprintln!("error: {e}");
            code
        }
    });
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    let msg = err.to_string().to_lowercase();
    if msg.contains("permission denied") || msg.contains("operation not permitted") {
        EXIT_NOPERM
    } else {
        EXIT_ERROR
    }
}

/// Host settings that limit what can be sampled
#[cfg(target_os = "linux")]
fn host_warning(args: &Args) -> Option<String> {
    livetrace::platform::linux::preflight::ptrace_scope_warning(&args.proc_root)
}

#[cfg(not(target_os = "linux"))]
fn host_warning(_args: &Args) -> Option<String> {
    Some("stack sampling is only supported on Linux".to_string())
}

#[tokio::main]
async fn run() -> Result<()> {
    let args = Args::parse();

    if !args.headless && !std::io::stdout().is_terminal() {
        anyhow::bail!("stdout is not a terminal; use --headless for JSON commands");
    }

    let tracer = Tracer::new(
        native_backend(&args.proc_root),
        native_monitor(&args.proc_root),
        args.sampler_config(),
    );
    let mut controller = Controller::new(tracer, native_process_source(&args.proc_root));

    if let Some(thread) = args.thread {
        controller.tracer().select(Tid(thread));
    }

    let rule = args.process.clone().unwrap_or_default();
    if !rule.is_empty() {
        match controller.retarget(&rule) {
            Some(pid) => {
                if !args.quiet {
                    eprintln!("livetrace v{}", env!("CARGO_PKG_VERSION"));
                    eprintln!("target: {pid}");
                    eprintln!("interval: {}ms", args.interval_ms);
                }
            }
            None => warn!("No traceable process matches '{rule}'"),
        }
    }

    if !args.quiet {
        if let Some(warning) = host_warning(&args) {
            eprintln!("warning: {warning}");
        }
    }

    if args.headless {
        info!("Headless mode, reading commands from stdin");
        return headless::run(&mut controller).await;
    }

    let (ui, commands, snapshots) = tui::spawn(rule)?;
    tui::serve(&mut controller, ui, commands, snapshots).await
}
