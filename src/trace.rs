//! A surface that records every call instead of rasterizing.
//!
//! Compositional semantics (which child rendered, at which index, under which
//! transform and alpha) are asserted against the recorded op list; the same
//! list serializes to JSON for trace dumps from the CLI.

use crate::{
    core::{Affine, Rgba8},
    error::MovieResult,
    surface::{Surface, TextMetrics},
};

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SurfaceOp {
    Clear,
    Save,
    Restore,
    Translate { dx: f64, dy: f64 },
    Scale { sx: f64, sy: f64 },
    Rotate { radians: f64 },
    Transform { coeffs: [f64; 6] },
    SetGlobalAlpha { alpha: f64 },
    SetFillColor { color: Rgba8 },
    SetStrokeColor { color: Rgba8 },
    SetLineWidth { width: f64 },
    SetFontSize { px: f64 },
    FillRect { x: f64, y: f64, w: f64, h: f64 },
    BeginPath,
    MoveTo { x: f64, y: f64 },
    LineTo { x: f64, y: f64 },
    ClosePath,
    Fill,
    Stroke,
    FillText { text: String, x: f64, y: f64 },
}

impl SurfaceOp {
    /// True for ops that put ink on the surface (as opposed to state changes
    /// and path building).
    pub fn is_draw(&self) -> bool {
        matches!(
            self,
            Self::FillRect { .. } | Self::Fill | Self::Stroke | Self::FillText { .. }
        )
    }
}

pub struct TraceSurface {
    width: f64,
    height: f64,
    alpha: f64,
    saved_alpha: Vec<f64>,
    ops: Vec<SurfaceOp>,
}

impl TraceSurface {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            alpha: 1.0,
            saved_alpha: Vec::new(),
            ops: Vec::new(),
        }
    }

    pub fn ops(&self) -> &[SurfaceOp] {
        &self.ops
    }

    pub fn take_ops(&mut self) -> Vec<SurfaceOp> {
        std::mem::take(&mut self.ops)
    }

    pub fn draw_count(&self) -> usize {
        self.ops.iter().filter(|op| op.is_draw()).count()
    }

    /// Width of fake text: ten units per character, ascent 8, descent 2.
    /// Deterministic so placement math is assertable.
    pub const CHAR_WIDTH: f64 = 10.0;
    pub const ASCENT: f64 = 8.0;
    pub const DESCENT: f64 = 2.0;
}

impl Surface for TraceSurface {
    fn width(&self) -> f64 {
        self.width
    }

    fn height(&self) -> f64 {
        self.height
    }

    fn clear(&mut self) {
        self.alpha = 1.0;
        self.saved_alpha.clear();
        self.ops.push(SurfaceOp::Clear);
    }

    fn save(&mut self) {
        self.saved_alpha.push(self.alpha);
        self.ops.push(SurfaceOp::Save);
    }

    fn restore(&mut self) {
        if let Some(alpha) = self.saved_alpha.pop() {
            self.alpha = alpha;
        }
        self.ops.push(SurfaceOp::Restore);
    }

    fn translate(&mut self, dx: f64, dy: f64) {
        self.ops.push(SurfaceOp::Translate { dx, dy });
    }

    fn scale(&mut self, sx: f64, sy: f64) {
        self.ops.push(SurfaceOp::Scale { sx, sy });
    }

    fn rotate(&mut self, radians: f64) {
        self.ops.push(SurfaceOp::Rotate { radians });
    }

    fn transform(&mut self, m: Affine) {
        self.ops.push(SurfaceOp::Transform {
            coeffs: m.as_coeffs(),
        });
    }

    fn global_alpha(&self) -> f64 {
        self.alpha
    }

    fn set_global_alpha(&mut self, alpha: f64) {
        self.alpha = alpha;
        self.ops.push(SurfaceOp::SetGlobalAlpha { alpha });
    }

    fn set_fill_color(&mut self, color: Rgba8) {
        self.ops.push(SurfaceOp::SetFillColor { color });
    }

    fn set_stroke_color(&mut self, color: Rgba8) {
        self.ops.push(SurfaceOp::SetStrokeColor { color });
    }

    fn set_line_width(&mut self, width: f64) {
        self.ops.push(SurfaceOp::SetLineWidth { width });
    }

    fn set_font_size(&mut self, px: f64) {
        self.ops.push(SurfaceOp::SetFontSize { px });
    }

    fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64) {
        self.ops.push(SurfaceOp::FillRect { x, y, w, h });
    }

    fn begin_path(&mut self) {
        self.ops.push(SurfaceOp::BeginPath);
    }

    fn move_to(&mut self, x: f64, y: f64) {
        self.ops.push(SurfaceOp::MoveTo { x, y });
    }

    fn line_to(&mut self, x: f64, y: f64) {
        self.ops.push(SurfaceOp::LineTo { x, y });
    }

    fn close_path(&mut self) {
        self.ops.push(SurfaceOp::ClosePath);
    }

    fn fill(&mut self) {
        self.ops.push(SurfaceOp::Fill);
    }

    fn stroke(&mut self) {
        self.ops.push(SurfaceOp::Stroke);
    }

    fn measure_text(&mut self, text: &str) -> MovieResult<TextMetrics> {
        Ok(TextMetrics {
            width: Self::CHAR_WIDTH * text.chars().count() as f64,
            ascent: Self::ASCENT,
            descent: Self::DESCENT,
            left: 0.0,
        })
    }

    fn fill_text(&mut self, text: &str, x: f64, y: f64) -> MovieResult<()> {
        self.ops.push(SurfaceOp::FillText {
            text: text.to_string(),
            x,
            y,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alpha_is_scoped_by_save_restore() {
        let mut s = TraceSurface::new(100.0, 100.0);
        s.save();
        s.set_global_alpha(0.25);
        assert_eq!(s.global_alpha(), 0.25);
        s.restore();
        assert_eq!(s.global_alpha(), 1.0);
    }

    #[test]
    fn ops_serialize_to_tagged_json() {
        let mut s = TraceSurface::new(10.0, 10.0);
        s.fill_rect(0.0, 0.0, 10.0, 10.0);
        let json = serde_json::to_value(s.ops()).unwrap();
        assert_eq!(json[0]["op"], "fill_rect");
        assert_eq!(json[0]["w"], 10.0);
    }

    #[test]
    fn draw_count_ignores_state_changes() {
        let mut s = TraceSurface::new(10.0, 10.0);
        s.save();
        s.set_fill_color(Rgba8::WHITE);
        s.fill_rect(0.0, 0.0, 1.0, 1.0);
        s.restore();
        assert_eq!(s.draw_count(), 1);
    }
}
