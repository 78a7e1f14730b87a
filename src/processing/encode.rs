//! JPEG output

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use image::buffer::ConvertBuffer;
use image::codecs::jpeg::JpegEncoder;
use image::error::{ImageError, ParameterError, ParameterErrorKind};
use image::{RgbImage, RgbaImage};
use tracing::debug;

use crate::error::{ErrorContext, LetterboxError, Phase, Result};

/// Encode `image` as JPEG at `quality` into `path`, returning the file size.
///
/// The file is created or truncated; parent directories must already exist.
/// A partially written file is left behind if encoding fails. Images with a
/// zero dimension are rejected before anything is written.
pub fn write_jpeg(image: &RgbaImage, path: &Path, quality: u8) -> Result<u64> {
    if image.width() == 0 || image.height() == 0 {
        return Err(LetterboxError::EncodeError {
            path: path.to_path_buf(),
            source: ImageError::Parameter(ParameterError::from_kind(
                ParameterErrorKind::Generic(format!(
                    "cannot encode a {}x{} image",
                    image.width(),
                    image.height()
                )),
            )),
        });
    }

    debug!(
        "Encoding {}x{} JPEG (quality {}) to {:?}",
        image.width(),
        image.height(),
        quality,
        path
    );

    let file = File::create(path).with_file_context(Phase::Creating, path)?;
    let mut writer = BufWriter::new(file);

    // JPEG has no alpha channel
    let rgb: RgbImage = image.convert();

    JpegEncoder::new_with_quality(&mut writer, quality)
        .encode_image(&rgb)
        .with_file_context(Phase::Encoding, path)?;

    writer.flush().with_file_context(Phase::Encoding, path)?;

    let size = writer
        .get_ref()
        .metadata()
        .with_file_context(Phase::Encoding, path)?
        .len();

    Ok(size)
}
