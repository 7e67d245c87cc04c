//! LaTeX rendering backend trait and shared types.
//!
//! A [`LatexBackend`] turns one LaTeX snippet into PNG bytes. The production
//! implementation is [`Tex2Im`](super::tex2im::Tex2Im), which shells out to
//! the `tex2im` script under a timeout.

use std::process::ExitStatus;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LatexError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to start {command}: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },
    #[error("{command} failed ({status}): {output}")]
    ToolFailed {
        command: String,
        status: ExitStatus,
        output: String,
    },
    #[error("{command} timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },
    #[error("{0} produced no image")]
    EmptyOutput(String),
    #[error("Empty <latex-pic> element")]
    EmptySource,
}

/// Renders LaTeX source into a PNG image.
pub trait LatexBackend {
    fn render(&self, tex: &str) -> Result<Vec<u8>, LatexError>;
}
