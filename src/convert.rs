//! Conversion entry points.
//!
//! ## One-shot vs. shared
//!
//! [`convert`] builds a fresh [`ToolLocator`] on every call, so it probes
//! for OpenSCAD each time. That is fine for the CLI. Long-running callers
//! (the web server) keep a [`Converter`], whose locator remembers the tool
//! once found.
//!
//! ## Stages
//!
//! ```text
//! Locating ─▶ Validating ─▶ DescriptorWritten ─▶ Running ─▶ Success
//!    │            │                                 ├──────▶ Failed
//!    ▼            ▼                                 └──────▶ TimedOut
//! ToolNotFound  InvalidSvg
//! ```
//!
//! Every invocation is one-shot; nothing is retried.

use crate::config::ConversionConfig;
use crate::error::Svg2StlError;
use crate::output::{ConversionOutput, ToolStatus};
use crate::pipeline::descriptor::{create_descriptor, descriptor_file_name};
use crate::pipeline::invoke::{RunError, ToolCommand};
use crate::pipeline::locate::ToolLocator;
use crate::pipeline::validate::validate_svg;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Where a conversion is in its lifecycle. Used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionStage {
    Locating,
    Validating,
    DescriptorWritten,
    Running,
    Success,
    Failed,
    TimedOut,
}

impl fmt::Display for ConversionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConversionStage::Locating => "locating",
            ConversionStage::Validating => "validating",
            ConversionStage::DescriptorWritten => "descriptor_written",
            ConversionStage::Running => "running",
            ConversionStage::Success => "success",
            ConversionStage::Failed => "failed",
            ConversionStage::TimedOut => "timed_out",
        };
        f.write_str(s)
    }
}

/// A conversion configuration plus a caching tool locator.
#[derive(Debug)]
pub struct Converter {
    config: ConversionConfig,
    locator: ToolLocator,
}

impl Converter {
    pub fn new(config: ConversionConfig) -> Self {
        let locator = ToolLocator::new(&config);
        Self { config, locator }
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    pub async fn tool_status(&self) -> ToolStatus {
        self.locator.locate().await.into()
    }

    /// Extrude `svg_path` into an STL at `output_path`.
    pub async fn convert(
        &self,
        svg_path: impl AsRef<Path>,
        output_path: impl AsRef<Path>,
    ) -> Result<ConversionOutput, Svg2StlError> {
        run_conversion(
            &self.config,
            &self.locator,
            svg_path.as_ref(),
            output_path.as_ref(),
        )
        .await
    }
}

/// Convert an SVG file to STL, probing for OpenSCAD first.
///
/// # Errors
/// - [`Svg2StlError::ToolNotFound`] if no candidate answers `--version`
/// - [`Svg2StlError::InvalidSvg`] if the document is malformed or not SVG
/// - [`Svg2StlError::ToolFailed`] / [`Svg2StlError::MissingOutput`] with
///   OpenSCAD's diagnostics
/// - [`Svg2StlError::Timeout`] if OpenSCAD exceeds the tool timeout
pub async fn convert(
    svg_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Svg2StlError> {
    let locator = ToolLocator::new(config);
    run_conversion(config, &locator, svg_path.as_ref(), output_path.as_ref()).await
}

/// Convert SVG bytes in memory to STL bytes.
///
/// The document is written into a managed [`tempfile::TempDir`] under
/// `file_name` (directory components are dropped), converted there, and the
/// directory is removed on return.
pub async fn convert_from_bytes(
    bytes: &[u8],
    file_name: &str,
    config: &ConversionConfig,
) -> Result<Vec<u8>, Svg2StlError> {
    let dir = tempfile::TempDir::new()
        .map_err(|e| Svg2StlError::Internal(format!("tempdir: {e}")))?;
    let name = Path::new(file_name)
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("input.svg"));
    let svg_path = dir.path().join(name);
    let stl_path = svg_path.with_extension("stl");

    tokio::fs::write(&svg_path, bytes)
        .await
        .map_err(|e| Svg2StlError::io(&svg_path, e))?;
    convert(&svg_path, &stl_path, config).await?;
    tokio::fs::read(&stl_path)
        .await
        .map_err(|e| Svg2StlError::io(&stl_path, e))
    // `dir` is dropped (and everything in it deleted) here
}

/// Report whether OpenSCAD can be found with `config`.
pub async fn check_tool(config: &ConversionConfig) -> ToolStatus {
    ToolLocator::new(config).locate().await.into()
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn run_conversion(
    config: &ConversionConfig,
    locator: &ToolLocator,
    svg_path: &Path,
    output_path: &Path,
) -> Result<ConversionOutput, Svg2StlError> {
    let start = Instant::now();
    // OpenSCAD runs from the document's directory; relative paths would
    // resolve against the wrong cwd.
    let svg_path = std::path::absolute(svg_path).map_err(|e| Svg2StlError::io(svg_path, e))?;
    let output_path =
        std::path::absolute(output_path).map_err(|e| Svg2StlError::io(output_path, e))?;
    let work_dir = svg_path
        .parent()
        .ok_or_else(|| Svg2StlError::Internal(format!("'{}' has no parent", svg_path.display())))?
        .to_path_buf();

    // ── Step 1: Locate OpenSCAD ──────────────────────────────────────────
    debug!(stage = %ConversionStage::Locating, svg = %svg_path.display());
    let Some(tool) = locator.locate().await else {
        warn!("OpenSCAD not found on this host; check the installation or --openscad");
        return Err(Svg2StlError::ToolNotFound);
    };

    // ── Step 2: Validate the document ────────────────────────────────────
    debug!(stage = %ConversionStage::Validating);
    validate_svg(&svg_path).await.into_result()?;

    // ── Step 3: Write the descriptor ─────────────────────────────────────
    let scad = create_descriptor(&svg_path, config.extrude_height, config.convexity)?;
    let descriptor_path = work_dir.join(descriptor_file_name());
    tokio::fs::write(&descriptor_path, scad)
        .await
        .map_err(|source| Svg2StlError::DescriptorWriteFailed {
            path: descriptor_path.clone(),
            source,
        })?;
    let descriptor_guard = scopeguard::guard(descriptor_path.clone(), |path| {
        if let Err(e) = std::fs::remove_file(&path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %path.display(), "failed to remove descriptor: {e}");
            }
        }
    });
    debug!(stage = %ConversionStage::DescriptorWritten, descriptor = %descriptor_path.display());

    // ── Step 4: Run OpenSCAD ─────────────────────────────────────────────
    let mut cmd = ToolCommand::new(&tool).arg("-o").arg(&output_path);
    if config.full_render {
        cmd = cmd.arg("--render");
    }
    let cmd = cmd
        .arg(&descriptor_path)
        .cwd(&work_dir)
        .timeout(config.tool_timeout());

    debug!(stage = %ConversionStage::Running, tool = %tool.display());
    let result = cmd.run().await;

    // ── Step 5: Descriptor goes away whatever happened ───────────────────
    drop(descriptor_guard);

    // ── Step 6: Judge the outcome ────────────────────────────────────────
    let elapsed_ms = start.elapsed().as_millis() as u64;
    let out = match result {
        Ok(out) => out,
        Err(RunError::TimedOut) => {
            warn!(stage = %ConversionStage::TimedOut, elapsed_ms, "conversion timed out");
            return Err(Svg2StlError::Timeout {
                secs: config.tool_timeout_secs,
            });
        }
        Err(RunError::Spawn(source)) => {
            warn!(
                stage = %ConversionStage::Failed,
                tool = %tool.display(),
                "could not start OpenSCAD: {source}"
            );
            return Err(Svg2StlError::SpawnFailed { tool, source });
        }
        Err(RunError::Wait(e)) => {
            warn!(stage = %ConversionStage::Failed, "waiting on OpenSCAD failed: {e}");
            return Err(Svg2StlError::Internal(format!("waiting on OpenSCAD: {e}")));
        }
    };

    if !out.success() {
        warn!(
            stage = %ConversionStage::Failed,
            exit_code = ?out.status.code(),
            elapsed_ms,
            "OpenSCAD failed"
        );
        return Err(Svg2StlError::ToolFailed {
            exit_code: out.status.code(),
            detail: out.diagnostics(),
        });
    }

    let output_bytes = match tokio::fs::metadata(&output_path).await {
        Ok(meta) if meta.is_file() => meta.len(),
        _ => {
            warn!(
                stage = %ConversionStage::Failed,
                output = %output_path.display(),
                "OpenSCAD exited cleanly without output"
            );
            return Err(Svg2StlError::MissingOutput {
                path: output_path,
                detail: out.diagnostics(),
            });
        }
    };

    info!(
        stage = %ConversionStage::Success,
        output = %output_path.display(),
        output_bytes,
        elapsed_ms,
        "conversion complete"
    );

    Ok(ConversionOutput {
        output_path,
        tool_path: tool,
        output_bytes,
        duration_ms: elapsed_ms,
    })
}
