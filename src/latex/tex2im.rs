//! `tex2im` process backend.
//!
//! Each snippet is written to a temp `.tex` file and converted with
//!
//! ```text
//! tex2im -z -a -o OUTPUT.png INPUT.tex
//! ```
//!
//! The tool's stdout and stderr go to an anonymous temp file rather than a
//! pipe, so a chatty tool cannot block on a full pipe and a killed tool leaves
//! nothing to drain. The child is polled until it exits or the timeout passes,
//! at which point it is killed.

use super::backend::{LatexBackend, LatexError};
use crate::config::LatexConfig;
use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Runs an external LaTeX-to-PNG converter.
#[derive(Debug, Clone)]
pub struct Tex2Im {
    command: String,
    timeout: Duration,
}

impl Tex2Im {
    pub fn new(command: impl Into<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            timeout,
        }
    }

    pub fn from_config(config: &LatexConfig) -> Self {
        Self::new(config.command.clone(), config.timeout())
    }
}

impl LatexBackend for Tex2Im {
    fn render(&self, tex: &str) -> Result<Vec<u8>, LatexError> {
        let mut source = tempfile::Builder::new()
            .prefix("piccolo-latex-")
            .suffix(".tex")
            .tempfile()?;
        source.write_all(tex.as_bytes())?;
        source.flush()?;
        let output = tempfile::Builder::new()
            .prefix("piccolo-latex-")
            .suffix(".png")
            .tempfile()?;
        let mut log = tempfile::tempfile()?;

        debug!(
            command = %self.command,
            input = %source.path().display(),
            "running LaTeX converter"
        );
        let mut child = Command::new(&self.command)
            .args(["-z", "-a", "-o"])
            .arg(output.path())
            .arg(source.path())
            .stdin(Stdio::null())
            .stdout(Stdio::from(log.try_clone()?))
            .stderr(Stdio::from(log.try_clone()?))
            .spawn()
            .map_err(|source| LatexError::Spawn {
                command: self.command.clone(),
                source,
            })?;

        let Some(status) = wait_with_timeout(&mut child, self.timeout)? else {
            return Err(LatexError::Timeout {
                command: self.command.clone(),
                timeout: self.timeout,
            });
        };
        if !status.success() {
            return Err(LatexError::ToolFailed {
                command: self.command.clone(),
                status,
                output: read_log(&mut log)?,
            });
        }

        let png = fs::read(output.path())?;
        if png.is_empty() {
            return Err(LatexError::EmptyOutput(self.command.clone()));
        }
        Ok(png)
    }
}

/// Wait for `child`, killing it once `timeout` has elapsed.
///
/// Returns `None` if the child was killed.
fn wait_with_timeout(child: &mut Child, timeout: Duration) -> io::Result<Option<ExitStatus>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        let now = Instant::now();
        if now >= deadline {
            // The child may exit between try_wait and kill.
            let _ = child.kill();
            child.wait()?;
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL.min(deadline - now));
    }
}

fn read_log(log: &mut File) -> io::Result<String> {
    log.seek(SeekFrom::Start(0))?;
    let mut bytes = Vec::new();
    log.read_to_end(&mut bytes)?;
    Ok(String::from_utf8_lossy(&bytes).trim().to_string())
}
