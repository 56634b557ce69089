//! # Headless Transport
//!
//! Newline-delimited JSON: one command per stdin line, one reply per stdout
//! line. Malformed lines are logged and skipped. Ctrl+C or EOF on stdin
//! stops the session.

use anyhow::{Context, Result};
use log::{info, warn};
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::control::Controller;

/// Serve commands from stdin until EOF or Ctrl+C
///
/// # Errors
/// Reading stdin or writing stdout failed.
pub async fn run(controller: &mut Controller) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line.context("Failed to read stdin")? {
                    Some(line) => serve_line(controller, &line, &mut stdout).await?,
                    None => {
                        info!("stdin closed");
                        break;
                    }
                }
            }
            _ = &mut ctrl_c => {
                info!("Interrupted");
                break;
            }
        }
    }

    controller.shutdown();
    Ok(())
}

/// Apply one input line and write its reply, if any
///
/// # Errors
/// Writing the reply failed.
pub async fn serve_line<W: AsyncWrite + Unpin>(
    controller: &mut Controller,
    line: &str,
    out: &mut W,
) -> Result<()> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(());
    }

    match controller.handle_message_blocking(line) {
        Ok(Some(reply)) => {
            out.write_all(reply.as_bytes()).await.context("Failed to write reply")?;
            out.write_all(b"\n").await.context("Failed to write reply")?;
            out.flush().await.context("Failed to flush stdout")?;
        }
        Ok(None) => {}
        Err(e) => warn!("Ignoring message: {e}"),
    }
    Ok(())
}
