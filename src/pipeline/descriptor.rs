//! OpenSCAD descriptor generation.
//!
//! The descriptor imports the SVG centred in the XY plane and extrudes it
//! straight up from Z = 0. It names the document by file name only, so
//! OpenSCAD has to run with the document's directory as its working
//! directory.

use crate::error::Svg2StlError;
use std::path::Path;
use uuid::Uuid;

/// Render the `.scad` source for extruding `svg_path` by `height` mm.
pub fn create_descriptor(
    svg_path: &Path,
    height: f64,
    convexity: u32,
) -> Result<String, Svg2StlError> {
    if !height.is_finite() || height <= 0.0 {
        return Err(Svg2StlError::InvalidConfig(format!(
            "extrude height must be a positive number, got {height}"
        )));
    }
    let file_name = svg_path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            Svg2StlError::InvalidConfig(format!(
                "'{}' has no UTF-8 file name",
                svg_path.display()
            ))
        })?;

    Ok(format!(
        "\n// Generated OpenSCAD file for SVG extrusion\n\
         // Extrude height: {height}mm\n\
         \n\
         linear_extrude(height = {height}, center = false, convexity = {convexity})\n    \
         import(\"{}\", center = true);\n",
        escape_scad_string(file_name)
    ))
}

/// Fresh, collision-free descriptor file name.
pub fn descriptor_file_name() -> String {
    format!("temp_{}.scad", Uuid::new_v4())
}

/// `true` if `name` has the shape [`descriptor_file_name`] produces.
pub fn is_descriptor_file_name(name: &str) -> bool {
    name.strip_prefix("temp_")
        .and_then(|rest| rest.strip_suffix(".scad"))
        .is_some_and(|id| Uuid::parse_str(id).is_ok())
}

fn escape_scad_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
