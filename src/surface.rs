//! The opaque 2D drawing capability consumed by clip render steps.
//!
//! Clips never see surface internals; they issue scoped state changes,
//! transforms, path/rect fills and text calls against this trait. The crate
//! ships two implementations: [`TraceSurface`](crate::trace::TraceSurface)
//! (records calls, used by tests and trace dumps) and
//! [`RasterSurface`](crate::surface_cpu::RasterSurface) (CPU rasterizer).

use crate::{
    core::{Affine, Rgba8},
    error::MovieResult,
};

/// Ink extents of a measured string relative to its baseline origin.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct TextMetrics {
    /// Advance width.
    pub width: f64,
    /// Rise above the baseline.
    pub ascent: f64,
    /// Drop below the baseline.
    pub descent: f64,
    /// Left-side bearing (distance from the draw origin to the first ink).
    pub left: f64,
}

impl TextMetrics {
    pub fn height(&self) -> f64 {
        self.ascent + self.descent
    }
}

/// A fully rendered frame read back from a raster surface.
#[derive(Clone, Debug)]
pub struct FrameRgba {
    pub width: u32,
    pub height: u32,
    /// Row-major RGBA8, premultiplied when `premultiplied` is set.
    pub data: Vec<u8>,
    pub premultiplied: bool,
}

pub trait Surface {
    fn width(&self) -> f64;
    fn height(&self) -> f64;

    /// Reset pixels and drawing state for the next frame.
    fn clear(&mut self);

    /// Push the current drawing state (transform, alpha, colors, line width,
    /// font size).
    fn save(&mut self);
    /// Pop the most recently saved state. A restore with nothing saved is a
    /// no-op.
    fn restore(&mut self);

    fn translate(&mut self, dx: f64, dy: f64);
    fn scale(&mut self, sx: f64, sy: f64);
    fn rotate(&mut self, radians: f64);
    /// Compose an arbitrary affine onto the current transform.
    fn transform(&mut self, m: Affine);

    fn global_alpha(&self) -> f64;
    fn set_global_alpha(&mut self, alpha: f64);

    fn set_fill_color(&mut self, color: Rgba8);
    fn set_stroke_color(&mut self, color: Rgba8);
    fn set_line_width(&mut self, width: f64);
    fn set_font_size(&mut self, px: f64);

    fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64);

    fn begin_path(&mut self);
    fn move_to(&mut self, x: f64, y: f64);
    fn line_to(&mut self, x: f64, y: f64);
    fn close_path(&mut self);
    fn fill(&mut self);
    fn stroke(&mut self);

    fn measure_text(&mut self, text: &str) -> MovieResult<TextMetrics>;
    /// Draw `text` with its baseline origin at `(x, y)`.
    fn fill_text(&mut self, text: &str, x: f64, y: f64) -> MovieResult<()>;
}
