//! Letterbox compositing

use image::{DynamicImage, GenericImageView, RgbaImage};
use tracing::debug;

use crate::config::{AspectRatio, Background};

/// Half-open pixel rectangle in canvas coordinates, may extend past the canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub left: i64,
    pub top: i64,
    pub right: i64,
    pub bottom: i64,
}

impl Rect {
    pub fn new(left: i64, top: i64, right: i64, bottom: i64) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Largest rectangle contained in both
    pub fn intersect(self, other: Rect) -> Rect {
        Rect {
            left: self.left.max(other.left),
            top: self.top.max(other.top),
            right: self.right.min(other.right),
            bottom: self.bottom.min(other.bottom),
        }
    }

    pub fn is_empty(self) -> bool {
        self.left >= self.right || self.top >= self.bottom
    }

    pub fn width(self) -> i64 {
        (self.right - self.left).max(0)
    }

    pub fn height(self) -> i64 {
        (self.bottom - self.top).max(0)
    }
}

/// Pads images vertically onto a solid canvas of a fixed aspect ratio
#[derive(Debug, Clone, Copy)]
pub struct Letterboxer {
    background: Background,
    ratio: AspectRatio,
}

impl Letterboxer {
    pub fn new(background: Background, ratio: AspectRatio) -> Self {
        Self { background, ratio }
    }

    /// Canvas size for a source: width unchanged, height `floor(width * ratio)`
    pub fn canvas_size(&self, source_width: u32) -> (u32, u32) {
        (source_width, self.ratio.canvas_height(source_width))
    }

    /// Target rectangle for the source on the canvas.
    ///
    /// The origin is the integer-centred position. The far edges are
    /// `dw/2 + dw` and `dh/2 + sh` rather than origin plus size; clipping
    /// against the canvas and the source extent during compositing yields
    /// the centred result.
    pub fn placement(source: (u32, u32), canvas: (u32, u32)) -> Rect {
        let (sw, sh) = (i64::from(source.0), i64::from(source.1));
        let (dw, dh) = (i64::from(canvas.0), i64::from(canvas.1));

        Rect::new(dw / 2 - sw / 2, dh / 2 - sh / 2, dw / 2 + dw, dh / 2 + sh)
    }

    /// Composite `source` centred onto a freshly filled canvas
    pub fn apply(&self, source: &DynamicImage) -> RgbaImage {
        let (sw, sh) = source.dimensions();
        let (dw, dh) = self.canvas_size(sw);

        let mut canvas = RgbaImage::from_pixel(dw, dh, self.background.rgba());
        let target = Self::placement((sw, sh), (dw, dh));

        debug!(
            "Letterboxing {}x{} -> {}x{} (target {:?})",
            sw, sh, dw, dh, target
        );

        composite(&mut canvas, &source.to_rgba8(), target);
        canvas
    }
}

/// Copy `source` onto `canvas` at `target`, overwriting without blending.
///
/// The copied region is `target` clipped to the canvas and to the source
/// extent anchored at `target`'s origin.
fn composite(canvas: &mut RgbaImage, source: &RgbaImage, target: Rect) {
    let canvas_bounds = Rect::new(0, 0, i64::from(canvas.width()), i64::from(canvas.height()));
    let source_bounds = Rect::new(
        target.left,
        target.top,
        target.left + i64::from(source.width()),
        target.top + i64::from(source.height()),
    );

    let region = target.intersect(canvas_bounds).intersect(source_bounds);
    if region.is_empty() {
        return;
    }

    let canvas_stride = canvas.width() as usize * 4;
    let source_stride = source.width() as usize * 4;
    let row_bytes = region.width() as usize * 4;
    let src_x = (region.left - target.left) as usize;
    let dst_x = region.left as usize;

    let source_raw = source.as_raw();
    let canvas_raw: &mut [u8] = canvas;

    for y in region.top..region.bottom {
        let src_y = (y - target.top) as usize;
        let src_start = src_y * source_stride + src_x * 4;
        let dst_start = y as usize * canvas_stride + dst_x * 4;

        canvas_raw[dst_start..dst_start + row_bytes]
            .copy_from_slice(&source_raw[src_start..src_start + row_bytes]);
    }
}
