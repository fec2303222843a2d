//! Executable locator: find a working OpenSCAD.
//!
//! Each candidate is asked for `--version` under a short timeout and the
//! first one that answers with exit code zero wins. Bare command names go
//! through `PATH` via the `which` crate so the resolved path we log and
//! execute is absolute.
//!
//! [`ToolLocator`] remembers a successful resolution for its own lifetime.
//! Misses are not remembered: installing OpenSCAD while the server is up is
//! picked up by the next request.

use super::invoke::{RunError, ToolCommand};
use crate::config::ConversionConfig;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// Probe every configured candidate, in order, without caching.
pub async fn locate_tool(config: &ConversionConfig) -> Option<PathBuf> {
    probe_candidates(&config.candidates(), config.probe_timeout()).await
}

/// Caching wrapper around [`locate_tool`].
#[derive(Debug)]
pub struct ToolLocator {
    candidates: Vec<PathBuf>,
    probe_timeout: Duration,
    resolved: OnceCell<PathBuf>,
}

impl ToolLocator {
    pub fn new(config: &ConversionConfig) -> Self {
        Self {
            candidates: config.candidates(),
            probe_timeout: config.probe_timeout(),
            resolved: OnceCell::new(),
        }
    }

    pub async fn locate(&self) -> Option<PathBuf> {
        if let Some(path) = self.resolved.get() {
            return Some(path.clone());
        }
        let found = probe_candidates(&self.candidates, self.probe_timeout).await?;
        // A concurrent caller may have won the race; either answer is fine.
        let _ = self.resolved.set(found.clone());
        Some(found)
    }
}

async fn probe_candidates(candidates: &[PathBuf], timeout: Duration) -> Option<PathBuf> {
    for candidate in candidates {
        let Some(path) = resolve_candidate(candidate) else {
            debug!(candidate = %candidate.display(), "not present");
            continue;
        };

        match ToolCommand::new(&path)
            .arg("--version")
            .timeout(timeout)
            .run()
            .await
        {
            Ok(out) if out.success() => {
                let version = out.diagnostics();
                info!(
                    tool = %path.display(),
                    version = version.lines().next().unwrap_or(""),
                    "OpenSCAD found"
                );
                return Some(path);
            }
            Ok(out) => {
                debug!(tool = %path.display(), exit_code = ?out.status.code(), "version probe failed");
            }
            Err(RunError::TimedOut) => {
                debug!(tool = %path.display(), "version probe timed out");
            }
            Err(RunError::Spawn(e) | RunError::Wait(e)) => {
                debug!(tool = %path.display(), "version probe could not run: {e}");
            }
        }
    }
    None
}

/// Bare names are looked up on `PATH`; anything with a directory part must
/// exist as given.
fn resolve_candidate(candidate: &Path) -> Option<PathBuf> {
    let bare = candidate
        .parent()
        .is_none_or(|parent| parent.as_os_str().is_empty());
    if bare {
        which::which(candidate).ok()
    } else if candidate.exists() {
        Some(candidate.to_path_buf())
    } else {
        None
    }
}
