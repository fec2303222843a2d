//! Scratch-directory file naming and lifetime.
//!
//! Every request gets its own UUID, and every file it creates carries that
//! UUID in its name, so concurrent requests share one directory without any
//! locking. [`ScratchFile`] removes its file when dropped; holding one in
//! the right scope is all the cleanup logic there is. The startup sweep
//! only touches names of that shape, so pointing the scratch directory at a
//! shared location never deletes anything else.

use crate::pipeline::descriptor::is_descriptor_file_name;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};
use uuid::Uuid;

static RE_UNSAFE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9_.-]").unwrap());

/// A file that is deleted when this value is dropped.
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchFile {
    /// On a runtime the unlink goes to the blocking pool; elsewhere it runs
    /// in place.
    fn drop(&mut self) {
        let path = std::mem::take(&mut self.path);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(move || remove_scratch(&path));
            }
            Err(_) => remove_scratch(&path),
        }
    }
}

fn remove_scratch(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "scratch file removed"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), "failed to remove scratch file: {e}"),
    }
}

/// Paths for one upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPaths {
    /// `<scratch>/<uuid>_<stem>.svg`
    pub upload: PathBuf,
    /// `<scratch>/<uuid>_<stem>.stl`
    pub output: PathBuf,
    /// `<stem>.stl`, offered to the browser.
    pub download_name: String,
}

/// Derive collision-free scratch paths for an upload named `original`.
pub fn upload_paths(scratch_dir: &Path, original: &str) -> UploadPaths {
    let stem = match original.rsplit_once('.') {
        Some((stem, _ext)) => stem,
        None => original,
    };
    let mut stem = sanitize_file_name(stem);
    if stem.is_empty() {
        stem = "upload".to_string();
    }
    let unique = format!("{}_{stem}", Uuid::new_v4());

    UploadPaths {
        upload: scratch_dir.join(format!("{unique}.svg")),
        output: scratch_dir.join(format!("{unique}.stl")),
        download_name: format!("{stem}.stl"),
    }
}

/// `true` if `name` ends in `.svg`, ignoring case.
pub fn has_svg_extension(name: &str) -> bool {
    name.rsplit_once('.')
        .is_some_and(|(_, ext)| ext.eq_ignore_ascii_case("svg"))
}

/// Reduce a client-supplied name to something safe to put in a path.
///
/// Non-ASCII text is transliterated (`café` becomes `cafe`), path
/// separators become spaces and whitespace runs become `_`. Anything left
/// outside `[A-Za-z0-9_.-]` is dropped and leading/trailing `.`/`_` are
/// trimmed. The result may be empty.
pub fn sanitize_file_name(name: &str) -> String {
    let ascii = deunicode::deunicode(name);
    let spaced = ascii.replace(['/', '\\'], " ");
    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("_");
    RE_UNSAFE
        .replace_all(&joined, "")
        .trim_matches(|c| c == '.' || c == '_')
        .to_string()
}

/// `true` for names this server writes: `<uuid>_<stem>.svg`,
/// `<uuid>_<stem>.stl` and the `temp_<uuid>.scad` descriptors beside them.
pub fn is_scratch_name(name: &str) -> bool {
    if is_descriptor_file_name(name) {
        return true;
    }
    let Some((id, rest)) = name.split_once('_') else {
        return false;
    };
    Uuid::parse_str(id).is_ok() && (rest.ends_with(".svg") || rest.ends_with(".stl"))
}

/// Create the scratch directory and sweep our own files older than
/// `stale_after`. Files with any other name are left alone.
///
/// Returns how many stale files were removed.
pub async fn prepare_scratch_dir(dir: &Path, stale_after: Duration) -> std::io::Result<usize> {
    tokio::fs::create_dir_all(dir).await?;

    let now = SystemTime::now();
    let mut removed = 0;
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_name().to_str().is_some_and(is_scratch_name) {
            continue;
        }
        let Ok(meta) = entry.metadata().await else {
            continue;
        };
        if !meta.is_file() {
            continue;
        }
        let age = meta
            .modified()
            .ok()
            .and_then(|m| now.duration_since(m).ok())
            .unwrap_or_default();
        if age >= stale_after {
            match tokio::fs::remove_file(entry.path()).await {
                Ok(()) => removed += 1,
                Err(e) => warn!(path = %entry.path().display(), "failed to sweep: {e}"),
            }
        }
    }
    if removed > 0 {
        info!(dir = %dir.display(), removed, "swept stale scratch files");
    }
    Ok(removed)
}
