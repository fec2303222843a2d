//! Configuration types for SVG-to-STL conversion and the web service.
//!
//! Conversion behaviour lives in [`ConversionConfig`], built via its
//! [`ConversionConfigBuilder`]. The HTTP application wraps one of those in a
//! [`ServerConfig`] together with the listening address, signing secret and
//! scratch directory. Both are plain values constructed once at startup and
//! handed to whoever needs them; nothing here reads the environment.

use crate::error::Svg2StlError;
use serde::Serialize;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Places OpenSCAD is commonly installed, probed in order.
pub const DEFAULT_TOOL_CANDIDATES: &[&str] = &[
    "openscad",
    "/usr/bin/openscad",
    "/usr/local/bin/openscad",
    "/Applications/OpenSCAD.app/Contents/MacOS/OpenSCAD",
    r"C:\Program Files\OpenSCAD\openscad.exe",
    r"C:\Program Files (x86)\OpenSCAD\openscad.exe",
];

/// 16 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

/// Configuration for a single SVG-to-STL conversion.
///
/// # Example
/// ```rust
/// use svg2stl::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .extrude_height(3.0)
///     .tool_timeout_secs(30)
///     .build()
///     .unwrap();
/// assert_eq!(config.extrude_height, 3.0);
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct ConversionConfig {
    /// Thickness along Z, in millimetres. Default: 5.0.
    pub extrude_height: f64,

    /// OpenSCAD `convexity` hint passed to `linear_extrude`. Default: 10.
    ///
    /// Only affects preview rendering of concave outlines; the exported mesh
    /// is the same, so there is rarely a reason to change it.
    pub convexity: u32,

    /// Explicit OpenSCAD path, probed before [`Self::tool_candidates`].
    pub tool_path: Option<PathBuf>,

    /// Ordered candidate paths or command names for OpenSCAD.
    pub tool_candidates: Vec<PathBuf>,

    /// Timeout for each `--version` probe, in seconds. Default: 5.
    pub probe_timeout_secs: u64,

    /// Timeout for the conversion subprocess, in seconds. Default: 60.
    pub tool_timeout_secs: u64,

    /// Pass `--render` to force a full CGAL render. Default: false.
    pub full_render: bool,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            extrude_height: 5.0,
            convexity: 10,
            tool_path: None,
            tool_candidates: DEFAULT_TOOL_CANDIDATES.iter().map(PathBuf::from).collect(),
            probe_timeout_secs: 5,
            tool_timeout_secs: 60,
            full_render: false,
        }
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Candidates in probe order: the explicit path first, then the list.
    pub fn candidates(&self) -> Vec<PathBuf> {
        self.tool_path
            .iter()
            .cloned()
            .chain(self.tool_candidates.iter().cloned())
            .collect()
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn extrude_height(mut self, height: f64) -> Self {
        self.config.extrude_height = height;
        self
    }

    pub fn convexity(mut self, convexity: u32) -> Self {
        self.config.convexity = convexity.max(1);
        self
    }

    pub fn tool_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.tool_path = Some(path.into());
        self
    }

    /// Replace the default candidate list.
    pub fn tool_candidates<I, P>(mut self, candidates: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.config.tool_candidates = candidates.into_iter().map(Into::into).collect();
        self
    }

    pub fn probe_timeout_secs(mut self, secs: u64) -> Self {
        self.config.probe_timeout_secs = secs;
        self
    }

    pub fn tool_timeout_secs(mut self, secs: u64) -> Self {
        self.config.tool_timeout_secs = secs;
        self
    }

    pub fn full_render(mut self, v: bool) -> Self {
        self.config.full_render = v;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Svg2StlError> {
        let c = &self.config;
        if !c.extrude_height.is_finite() || c.extrude_height <= 0.0 {
            return Err(Svg2StlError::InvalidConfig(format!(
                "extrude height must be a positive number, got {}",
                c.extrude_height
            )));
        }
        if c.probe_timeout_secs == 0 || c.tool_timeout_secs == 0 {
            return Err(Svg2StlError::InvalidConfig(
                "timeouts must be at least one second".into(),
            ));
        }
        if c.tool_path.is_none() && c.tool_candidates.is_empty() {
            return Err(Svg2StlError::InvalidConfig(
                "no OpenSCAD candidates configured".into(),
            ));
        }
        Ok(self.config)
    }
}

/// Configuration for the HTTP application.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind. Default: `0.0.0.0:5002`.
    pub bind: SocketAddr,

    /// Secret used to sign flash-message cookies.
    pub secret_key: String,

    /// Verbose logging and detailed internal-error messages.
    pub debug: bool,

    /// Shared directory for uploads, descriptors and meshes.
    pub scratch_dir: PathBuf,

    /// Largest accepted request body. Default: 16 MiB.
    pub max_upload_bytes: usize,

    /// Leftover scratch files older than this are removed at startup.
    pub stale_after: Duration,

    pub conversion: ConversionConfig,
}

/// Placeholder secret; the binary warns when it is still in use.
pub const DEV_SECRET_KEY: &str = "svg2stl-dev-secret-change-me";

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 5002),
            secret_key: DEV_SECRET_KEY.to_string(),
            debug: false,
            scratch_dir: std::env::temp_dir().join("svg2stl-uploads"),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            stale_after: Duration::from_secs(60 * 60),
            conversion: ConversionConfig::default(),
        }
    }
}
