//! Result types returned by the conversion entry points.

use serde::Serialize;
use std::path::PathBuf;

/// A successful conversion.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionOutput {
    /// Where OpenSCAD wrote the STL.
    pub output_path: PathBuf,
    /// The OpenSCAD binary that did the work.
    pub tool_path: PathBuf,
    /// Size of the STL in bytes.
    pub output_bytes: u64,
    /// Wall-clock time from locating the tool to checking the output.
    pub duration_ms: u64,
}

/// Whether OpenSCAD can be used right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolStatus {
    pub available: bool,
    pub path: Option<PathBuf>,
}

impl From<Option<PathBuf>> for ToolStatus {
    fn from(path: Option<PathBuf>) -> Self {
        Self {
            available: path.is_some(),
            path,
        }
    }
}
