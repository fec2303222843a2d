//! # svg2stl
//!
//! Turn 2D SVG artwork into 3D-printable STL meshes by extruding it with
//! [OpenSCAD](https://openscad.org).
//!
//! ## Why shell out?
//!
//! SVG import, path flattening and polygon extrusion are hard to get right;
//! OpenSCAD already does all three and produces watertight meshes. This crate
//! owns everything around the tool instead: finding it, refusing documents
//! that are not SVG before it ever runs, generating the extrusion script,
//! bounding how long it may take and surfacing its diagnostics.
//!
//! ## Pipeline Overview
//!
//! ```text
//! SVG
//!  │
//!  ├─ 1. Locate      probe OpenSCAD candidates with --version
//!  ├─ 2. Validate    well-formed XML whose root is {http://www.w3.org/2000/svg}svg
//!  ├─ 3. Descriptor  temp_<uuid>.scad next to the SVG: linear_extrude(import(..))
//!  ├─ 4. Invoke      openscad -o out.stl temp_<uuid>.scad, bounded by a timeout
//!  └─ 5. Output      STL on disk + ConversionOutput
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use svg2stl::{convert, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::builder().extrude_height(3.0).build()?;
//!     let output = convert("logo.svg", "logo.stl", &config).await?;
//!     eprintln!("{} bytes in {}ms", output.output_bytes, output.duration_ms);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `svg2stl` binary (clap + anyhow + tracing-subscriber) |
//!
//! The web front end lives in [`server`] and is always compiled; the binary
//! only adds argument parsing and log setup on top of it.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder, ServerConfig};
pub use convert::{check_tool, convert, convert_from_bytes, ConversionStage, Converter};
pub use error::{ErrorKind, Svg2StlError};
pub use output::{ConversionOutput, ToolStatus};
