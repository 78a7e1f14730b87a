//! Core image processing functionality

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use image::{DynamicImage, RgbaImage};
use tokio::fs;
use tracing::debug;

use crate::config::ImageTask;
use crate::error::{ErrorContext, LetterboxError, Phase, Result};

pub mod discovery;
pub mod encode;
pub mod letterbox;
pub mod skip;

pub use discovery::*;
pub use encode::*;
pub use letterbox::*;
pub use skip::*;

/// Sources above this size are decoded from a memory map
const MMAP_THRESHOLD: u64 = 100 * 1024 * 1024;

/// Runs decode, letterbox and encode for a single task
#[derive(Debug, Default)]
pub struct ProcessingEngine;

impl ProcessingEngine {
    /// Create a new processing engine
    pub fn new() -> Self {
        Self
    }

    /// Letterbox `task.source` into its destination under the output directory
    pub async fn process(&self, task: &ImageTask) -> Result<ProcessingResult> {
        let start_time = Instant::now();
        let destination = task.destination();

        debug!("Processing file: {:?} -> {:?}", task.source, destination);

        let (image, original_info) = self.load_image(&task.source).await?;

        let letterboxer = Letterboxer::new(task.config.background, task.config.ratio);
        let canvas = tokio::task::spawn_blocking(move || letterboxer.apply(&image))
            .await
            .map_err(|e| LetterboxError::system(format!("Task join error: {}", e)))?;

        let output_info = self
            .save_image(canvas, &destination, task.config.quality)
            .await?;

        Ok(ProcessingResult {
            input: original_info,
            output: output_info,
            processing_time: start_time.elapsed(),
        })
    }

    /// Load an image from file
    async fn load_image(&self, path: &Path) -> Result<(DynamicImage, ImageInfo)> {
        debug!("Loading image: {:?}", path);

        let metadata = fs::metadata(path)
            .await
            .with_file_context(Phase::Opening, path)?;
        let file_size = metadata.len();

        let image = if cfg!(feature = "mmap") && file_size > MMAP_THRESHOLD {
            self.load_image_mmap(path).await?
        } else {
            self.load_image_standard(path).await?
        };

        let info = ImageInfo {
            path: path.to_path_buf(),
            width: image.width(),
            height: image.height(),
            file_size,
        };

        debug!(
            "Loaded image: {}x{} ({:.2}MB)",
            info.width,
            info.height,
            info.file_size as f64 / 1024.0 / 1024.0
        );

        Ok((image, info))
    }

    /// Load image using standard file I/O
    async fn load_image_standard(&self, path: &Path) -> Result<DynamicImage> {
        let data = fs::read(path)
            .await
            .with_file_context(Phase::Opening, path)?;

        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || decode(&data, &path))
            .await
            .map_err(|e| LetterboxError::system(format!("Task join error: {}", e)))?
    }

    /// Load image using memory mapping (for large files)
    #[cfg(feature = "mmap")]
    async fn load_image_mmap(&self, path: &Path) -> Result<DynamicImage> {
        use memmap2::MmapOptions;
        use std::fs::File;

        debug!("Using memory mapping for large file: {:?}", path);

        let file = File::open(path).with_file_context(Phase::Opening, path)?;

        // SAFETY: the map is read-only and dropped before this task returns
        let mmap = unsafe {
            MmapOptions::new()
                .map(&file)
                .with_file_context(Phase::Opening, path)?
        };

        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || decode(&mmap, &path))
            .await
            .map_err(|e| LetterboxError::system(format!("Task join error: {}", e)))?
    }

    #[cfg(not(feature = "mmap"))]
    async fn load_image_mmap(&self, path: &Path) -> Result<DynamicImage> {
        self.load_image_standard(path).await
    }

    /// Encode the canvas to `output_path`
    async fn save_image(
        &self,
        canvas: RgbaImage,
        output_path: &Path,
        quality: u8,
    ) -> Result<ImageInfo> {
        debug!("Saving image: {:?}", output_path);

        let (width, height) = canvas.dimensions();
        let file_size = tokio::task::spawn_blocking({
            let output_path = output_path.to_path_buf();
            move || write_jpeg(&canvas, &output_path, quality)
        })
        .await
        .map_err(|e| LetterboxError::system(format!("Task join error: {}", e)))??;

        Ok(ImageInfo {
            path: output_path.to_path_buf(),
            width,
            height,
            file_size,
        })
    }
}

/// Decode raw file contents, rejecting data that is clearly not an image
fn decode(data: &[u8], path: &Path) -> Result<DynamicImage> {
    if let Some(kind) = infer::get(data) {
        if kind.matcher_type() != infer::MatcherType::Image {
            return Err(LetterboxError::decode(
                path,
                format!("content is {}, not an image", kind.mime_type()),
            ));
        }
    }

    image::load_from_memory(data).with_file_context(Phase::Decoding, path)
}

/// Information about an image file
#[derive(Debug, Clone)]
pub struct ImageInfo {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub file_size: u64,
}

/// Result of processing an image
#[derive(Debug, Clone)]
pub struct ProcessingResult {
    pub input: ImageInfo,
    pub output: ImageInfo,
    pub processing_time: Duration,
}

impl ProcessingResult {
    /// Rows of padding added above and below the source
    pub fn padding_rows(&self) -> i64 {
        i64::from(self.output.height) - i64::from(self.input.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AspectRatio, Background, RunConfig};
    use image::{GenericImageView, Rgb, RgbImage};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn run_config(output_dir: PathBuf, background: Background) -> Arc<RunConfig> {
        Arc::new(RunConfig {
            output_dir,
            background,
            ratio: AspectRatio::parse("16:9").unwrap(),
            force: false,
            quality: 90,
        })
    }

    /// Write a JPEG source and pre-create the mirrored output directory
    fn fixture(root: &Path, name: &str, width: u32, height: u32) -> ImageTask {
        let source = root.join(name);
        RgbImage::from_pixel(width, height, Rgb([90, 160, 30]))
            .save(&source)
            .unwrap();

        let task = ImageTask::new(source, run_config(root.join("processed"), Background::Black));
        std::fs::create_dir_all(task.destination().parent().unwrap()).unwrap();
        task
    }

    #[tokio::test]
    async fn test_process_writes_letterboxed_jpeg() {
        let dir = TempDir::new().unwrap();
        let task = fixture(dir.path(), "wide.jpg", 160, 40);

        let result = ProcessingEngine::new().process(&task).await.unwrap();

        assert_eq!((result.input.width, result.input.height), (160, 40));
        assert_eq!((result.output.width, result.output.height), (160, 90));
        assert_eq!(result.padding_rows(), 50);
        assert_eq!(result.output.path, task.destination());

        let written = image::open(task.destination()).unwrap();
        assert_eq!(written.dimensions(), (160, 90));
        let corner = written.to_rgb8().get_pixel(2, 2).0;
        assert!(corner.iter().all(|&c| c < 16), "bar should be black: {corner:?}");
    }

    #[tokio::test]
    async fn test_zero_height_canvas_fails_without_output() {
        let dir = TempDir::new().unwrap();
        // floor(1 * 9/16) == 0
        let task = fixture(dir.path(), "dot.jpg", 1, 1);

        let err = ProcessingEngine::new().process(&task).await.unwrap_err();
        assert!(matches!(err, LetterboxError::EncodeError { .. }), "unexpected error: {err:?}");
        assert!(!task.destination().exists());
    }

    #[tokio::test]
    async fn test_corrupt_source_is_decode_error() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("broken.jpg");
        std::fs::write(&source, [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x00, 0x00]).unwrap();

        let task = ImageTask::new(source, run_config(dir.path().join("processed"), Background::White));
        let err = ProcessingEngine::new().process(&task).await.unwrap_err();
        assert!(
            matches!(err, LetterboxError::DecodeError { .. } | LetterboxError::IoError { phase: Phase::Decoding, .. }),
            "unexpected error: {err:?}"
        );
    }

    #[tokio::test]
    async fn test_non_image_content_is_rejected() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("archive.jpg");
        // ZIP local file header
        std::fs::write(&source, b"PK\x03\x04\x14\x00\x00\x00\x08\x00rest-of-archive").unwrap();

        let task = ImageTask::new(source, run_config(dir.path().join("processed"), Background::Black));
        let err = ProcessingEngine::new().process(&task).await.unwrap_err();
        assert!(matches!(err, LetterboxError::DecodeError { ref message, .. } if message.contains("zip")));
    }

    #[tokio::test]
    async fn test_missing_source_is_opening_error() {
        let dir = TempDir::new().unwrap();
        let task = ImageTask::new(
            dir.path().join("absent.jpg"),
            run_config(dir.path().join("processed"), Background::Black),
        );

        let err = ProcessingEngine::new().process(&task).await.unwrap_err();
        assert!(matches!(
            err,
            LetterboxError::IoError {
                phase: Phase::Opening,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_missing_output_parent_is_creating_error() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("a.jpg");
        RgbImage::new(16, 16).save(&source).unwrap();

        // Output directory tree deliberately not created
        let task = ImageTask::new(source, run_config(dir.path().join("processed"), Background::Black));
        let err = ProcessingEngine::new().process(&task).await.unwrap_err();
        assert!(matches!(
            err,
            LetterboxError::IoError {
                phase: Phase::Creating,
                ..
            }
        ));
    }
}
