//! Error types for the svg2stl library.
//!
//! Every conversion failure is a [`Svg2StlError`]. Callers that need to
//! react differently to a bad upload and a broken deployment ask the error
//! for its [`ErrorKind`] instead of matching on every variant:
//!
//! * [`ErrorKind::Input`]: the document or the configuration is wrong;
//!   tell the end user, nothing to fix on the server.
//! * [`ErrorKind::Environment`]: OpenSCAD is not installed or not runnable.
//! * [`ErrorKind::Execution`]: OpenSCAD ran and reported a problem.
//! * [`ErrorKind::Timeout`]: OpenSCAD did not finish in time.
//! * [`ErrorKind::Internal`]: scratch-file I/O or process plumbing failed.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the svg2stl conversion pipeline.
#[derive(Debug, Error)]
pub enum Svg2StlError {
    // ── Environment errors ────────────────────────────────────────────────
    /// No candidate path answered `--version` successfully.
    #[error("OpenSCAD not found. Please install OpenSCAD.")]
    ToolNotFound,

    /// The HTTP listener could not be bound.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },

    // ── Input errors ──────────────────────────────────────────────────────
    /// The document is not well-formed XML or its root is not `<svg>`.
    #[error("{reason}")]
    InvalidSvg { reason: String },

    /// Builder or argument validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Execution errors ──────────────────────────────────────────────────
    /// OpenSCAD exited with a non-zero status.
    #[error("OpenSCAD error: {detail}")]
    ToolFailed {
        exit_code: Option<i32>,
        detail: String,
    },

    /// OpenSCAD exited cleanly but never wrote the output file.
    #[error("OpenSCAD error: no output produced. {detail}")]
    MissingOutput { path: PathBuf, detail: String },

    // ── Timeout ───────────────────────────────────────────────────────────
    /// The subprocess exceeded the configured tool timeout and was killed.
    #[error("Conversion timed out after {secs}s. File may be too complex.")]
    Timeout { secs: u64 },

    // ── Internal errors ───────────────────────────────────────────────────
    /// Could not write the generated `.scad` descriptor.
    #[error("Failed to write descriptor '{path}': {source}")]
    DescriptorWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The OS refused to start the resolved tool.
    #[error("Failed to start '{tool}': {source}")]
    SpawnFailed {
        tool: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Scratch-file I/O failed.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification of a [`Svg2StlError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Input,
    Environment,
    Execution,
    Timeout,
    Internal,
}

impl Svg2StlError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Svg2StlError::InvalidSvg { .. } | Svg2StlError::InvalidConfig(_) => ErrorKind::Input,
            Svg2StlError::ToolNotFound | Svg2StlError::Bind { .. } => ErrorKind::Environment,
            Svg2StlError::ToolFailed { .. } | Svg2StlError::MissingOutput { .. } => {
                ErrorKind::Execution
            }
            Svg2StlError::Timeout { .. } => ErrorKind::Timeout,
            Svg2StlError::DescriptorWriteFailed { .. }
            | Svg2StlError::SpawnFailed { .. }
            | Svg2StlError::Io { .. }
            | Svg2StlError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Svg2StlError::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_display_mentions_complexity() {
        let e = Svg2StlError::Timeout { secs: 60 };
        let msg = e.to_string();
        assert!(msg.contains("timed out"), "got: {msg}");
        assert!(msg.contains("60s"), "got: {msg}");
        assert!(msg.contains("too complex"), "got: {msg}");
    }

    #[test]
    fn tool_failed_display_carries_diagnostics() {
        let e = Svg2StlError::ToolFailed {
            exit_code: Some(1),
            detail: "ERROR: Parser error in line 3".into(),
        };
        assert!(e.to_string().contains("Parser error in line 3"));
    }

    #[test]
    fn invalid_svg_display_is_the_reason() {
        let e = Svg2StlError::InvalidSvg {
            reason: "File is not a valid SVG".into(),
        };
        assert_eq!(e.to_string(), "File is not a valid SVG");
    }

    #[test]
    fn kinds() {
        assert_eq!(Svg2StlError::ToolNotFound.kind(), ErrorKind::Environment);
        assert_eq!(Svg2StlError::Timeout { secs: 1 }.kind(), ErrorKind::Timeout);
        assert_eq!(
            Svg2StlError::MissingOutput {
                path: "out.stl".into(),
                detail: String::new(),
            }
            .kind(),
            ErrorKind::Execution
        );
        assert_eq!(
            Svg2StlError::InvalidConfig("height".into()).kind(),
            ErrorKind::Input
        );
        assert_eq!(
            Svg2StlError::io("x", std::io::Error::other("boom")).kind(),
            ErrorKind::Internal
        );
    }
}
