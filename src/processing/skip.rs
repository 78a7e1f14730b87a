//! Up-to-date detection based on modification times

use std::io;
use std::path::Path;
use std::time::SystemTime;

use tokio::fs;
use tracing::{debug, warn};

use crate::config::output_path;
use crate::error::{LetterboxError, Result};

/// What to do with a source image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipDecision {
    Process,
    Skip,
}

/// Decides whether an existing output can be left untouched
#[derive(Debug, Clone, Copy, Default)]
pub struct SkipPolicy {
    force: bool,
}

impl SkipPolicy {
    pub fn new(force: bool) -> Self {
        Self { force }
    }

    /// Check `source` against `<output_dir>/<source>`, unless forced
    pub async fn evaluate(&self, source: &Path, output_dir: &Path) -> Result<SkipDecision> {
        if self.force {
            return Ok(SkipDecision::Process);
        }

        compare(source, &output_path(output_dir, source)).await
    }
}

/// Compare a source with its output on disk.
///
/// A missing destination means process. An existing destination is
/// skipped only when the source was modified strictly before it. A
/// directory in the destination's place is never treated as up to date.
/// Any other stat failure is reported as [`LetterboxError::AmbiguousStat`].
pub async fn compare(source: &Path, destination: &Path) -> Result<SkipDecision> {
    let dest_modified = match fs::metadata(destination).await {
        Ok(meta) if meta.is_dir() => {
            warn!("Output path {:?} for {:?} is a directory", destination, source);
            return Ok(SkipDecision::Process);
        }
        Ok(meta) => modified(destination, meta.modified())?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("No output yet for {:?}", source);
            return Ok(SkipDecision::Process);
        }
        Err(e) => return Err(ambiguous(destination, e)),
    };

    let source_meta = fs::metadata(source)
        .await
        .map_err(|e| ambiguous(source, e))?;
    let source_modified = modified(source, source_meta.modified())?;

    Ok(decide(source_modified, dest_modified))
}

/// Skip when the source predates its output
pub fn decide(source_modified: SystemTime, dest_modified: SystemTime) -> SkipDecision {
    if source_modified < dest_modified {
        SkipDecision::Skip
    } else {
        SkipDecision::Process
    }
}

fn modified(path: &Path, time: io::Result<SystemTime>) -> Result<SystemTime> {
    time.map_err(|e| ambiguous(path, e))
}

fn ambiguous(path: &Path, source: io::Error) -> LetterboxError {
    LetterboxError::AmbiguousStat {
        path: path.to_path_buf(),
        source,
    }
}
