//! Pipeline stages for SVG-to-STL conversion.
//!
//! Each submodule implements exactly one step, and none of them knows about
//! HTTP. [`crate::convert`] strings them together.
//!
//! ## Data Flow
//!
//! ```text
//! locate ──▶ validate ──▶ descriptor ──▶ invoke
//! (probe)     (XML root)   (.scad text)   (subprocess)
//! ```
//!
//! 1. [`locate`]     – find a runnable OpenSCAD among the configured candidates
//! 2. [`validate`]   – parse the document and check its root element
//! 3. [`descriptor`] – render the `linear_extrude(import(..))` script
//! 4. [`invoke`]     – run a tool with captured output and a hard timeout

pub mod descriptor;
pub mod invoke;
pub mod locate;
pub mod validate;
