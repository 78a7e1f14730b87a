//! Image discovery for runs without explicit paths

use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::error::{LetterboxError, Phase, Result};

/// Extensions picked up by a directory scan
pub fn discoverable_extensions() -> &'static [&'static str] {
    &["jpg", "jpeg"]
}

/// Check if a path has a discoverable extension (case-insensitive)
pub fn is_discoverable(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            discoverable_extensions()
                .iter()
                .any(|&known| known.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

/// List JPEG files directly inside `dir`, in directory listing order.
///
/// Entries of the current directory are returned as bare file names so they
/// map onto `<output>/<name>`; other directories keep their prefix.
pub fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut images = Vec::new();

    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| LetterboxError::io(Phase::Listing, dir, e.into()))?;

        if entry.file_type().is_dir() || !is_discoverable(entry.path()) {
            continue;
        }

        let path = if dir == Path::new(".") {
            PathBuf::from(entry.file_name())
        } else {
            entry.path().to_path_buf()
        };

        images.push(path);
    }

    debug!("Discovered {} images in {:?}", images.len(), dir);
    Ok(images)
}
