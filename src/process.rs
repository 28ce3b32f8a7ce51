//src/process.rs

use std::io::{Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::error::{GenotypeError, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Captured result of a finished child process.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>> {
    pipe.map(|mut p| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            if let Err(e) = p.read_to_end(&mut buf) {
                log::debug!("Reading child output failed: {e}");
            }
            buf
        })
    })
}

fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}

fn wait_with_timeout(child: &mut Child, tool: &str, timeout: Option<Duration>) -> Result<ExitStatus> {
    let start = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) => {}
            Err(e) => {
                return Err(GenotypeError::ExternalTool {
                    tool: tool.to_string(),
                    status: "unknown".into(),
                    stderr: e.to_string(),
                })
            }
        }
        if let Some(limit) = timeout {
            if start.elapsed() >= limit {
                let _ = child.kill();
                let _ = child.wait();
                return Err(GenotypeError::Timeout {
                    tool: tool.to_string(),
                    limit,
                });
            }
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Run `cmd` to completion, optionally feeding `stdin`, and fail with a typed
/// error on spawn failure, non-zero exit or timeout.
///
/// Stdout and stderr are always captured. A `None` timeout waits forever.
pub fn run_command(
    mut cmd: Command,
    stdin: Option<Vec<u8>>,
    timeout: Option<Duration>,
) -> Result<CommandOutput> {
    let tool = cmd.get_program().to_string_lossy().to_string();
    log::debug!("Running {:?}", cmd);

    cmd.stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = cmd.spawn().map_err(|e| GenotypeError::ExternalTool {
        tool: tool.clone(),
        status: "failed to start".into(),
        stderr: e.to_string(),
    })?;

    // Feed stdin from its own thread so a child that stops reading cannot
    // block us past the timeout.
    let feeder = match (stdin, child.stdin.take()) {
        (Some(data), Some(mut pipe)) => {
            let tool = tool.clone();
            Some(thread::spawn(move || {
                if let Err(e) = pipe.write_all(&data) {
                    log::debug!("Writing stdin of {tool} failed: {e}");
                }
            }))
        }
        _ => None,
    };
    let out = drain(child.stdout.take());
    let err = drain(child.stderr.take());

    let status = wait_with_timeout(&mut child, &tool, timeout)?;
    if let Some(f) = feeder {
        let _ = f.join();
    }
    let stdout = collect(out);
    let stderr = collect(err);

    if !status.success() {
        return Err(GenotypeError::ExternalTool {
            tool,
            status: status.to_string(),
            stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
        });
    }

    Ok(CommandOutput {
        status,
        stdout,
        stderr,
    })
}
