//! Content-addressed blob layout.
//!
//! File attachments (replays, backgrounds, beatmap files) live under
//! `root/h[0..1]/h[0..2]/hash`.

use std::path::{Path, PathBuf};

/// Physical path for a blob hash. Hashes shorter than two characters
/// cannot address a blob and yield `None`.
pub fn blob_path(root: &Path, hash: &str) -> Option<PathBuf> {
    if hash.len() < 2 || !hash.is_ascii() {
        return None;
    }
    Some(root.join(&hash[0..1]).join(&hash[0..2]).join(hash))
}

/// Resolves a blob hash to an existing file, if present on disk.
pub fn resolve_blob(root: &Path, hash: &str) -> Option<PathBuf> {
    let path = blob_path(root, hash)?;
    path.exists().then_some(path)
}
