//! CPU raster implementation of [`Surface`] on top of `vello_cpu`.
//!
//! Draw state (transform, alpha, colors, line width, font size) lives here;
//! each primitive pushes the current state into the render context before
//! issuing the draw. Strokes are expanded to fill outlines with
//! [`kurbo::stroke`]. Text is shaped with Parley against a caller-supplied
//! font and filled as glyph runs.

use crate::{
    core::{Affine, BezPath, Rgba8},
    error::{MovieError, MovieResult},
    surface::{FrameRgba, Surface, TextMetrics},
};

#[derive(Clone)]
struct DrawState {
    transform: Affine,
    alpha: f64,
    fill: Rgba8,
    stroke: Rgba8,
    line_width: f64,
    font_px: f64,
}

impl Default for DrawState {
    fn default() -> Self {
        Self {
            transform: Affine::IDENTITY,
            alpha: 1.0,
            fill: Rgba8::BLACK,
            stroke: Rgba8::BLACK,
            line_width: 1.0,
            font_px: 10.0,
        }
    }
}

/// Brush payload carried through Parley layout; one color per styled run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct GlyphBrush {
    r: u8,
    g: u8,
    b: u8,
    a: u8,
}

struct TextEngine {
    font_ctx: parley::FontContext,
    layout_ctx: parley::LayoutContext<GlyphBrush>,
    family_name: String,
    font: vello_cpu::peniko::FontData,
}

impl TextEngine {
    fn new(font_bytes: Vec<u8>) -> MovieResult<Self> {
        let mut font_ctx = parley::FontContext::default();
        let families = font_ctx
            .collection
            .register_fonts(parley::fontique::Blob::from(font_bytes.clone()), None);
        let family_id = families
            .first()
            .map(|(id, _)| *id)
            .ok_or_else(|| MovieError::validation("no font families found in font data"))?;
        let family_name = font_ctx
            .collection
            .family_name(family_id)
            .ok_or_else(|| MovieError::validation("registered font family has no name"))?
            .to_string();
        let font = vello_cpu::peniko::FontData::new(vello_cpu::peniko::Blob::from(font_bytes), 0);
        Ok(Self {
            font_ctx,
            layout_ctx: parley::LayoutContext::new(),
            family_name,
            font,
        })
    }

    fn layout(
        &mut self,
        text: &str,
        size_px: f32,
        brush: GlyphBrush,
    ) -> MovieResult<parley::Layout<GlyphBrush>> {
        if !size_px.is_finite() || size_px <= 0.0 {
            return Err(MovieError::validation("font size must be finite and > 0"));
        }
        let mut builder = self
            .layout_ctx
            .ranged_builder(&mut self.font_ctx, text, 1.0, true);
        builder.push_default(parley::style::StyleProperty::FontStack(
            parley::style::FontStack::Source(std::borrow::Cow::Owned(self.family_name.clone())),
        ));
        builder.push_default(parley::style::StyleProperty::FontSize(size_px));
        builder.push_default(parley::style::StyleProperty::Brush(brush));
        let mut layout: parley::Layout<GlyphBrush> = builder.build(text);
        layout.break_all_lines(None);
        Ok(layout)
    }
}

pub struct RasterSurface {
    width: u16,
    height: u16,
    ctx: vello_cpu::RenderContext,
    state: DrawState,
    saved: Vec<DrawState>,
    path: BezPath,
    text: Option<TextEngine>,
}

impl RasterSurface {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            ctx: vello_cpu::RenderContext::new(width, height),
            state: DrawState::default(),
            saved: Vec::new(),
            path: BezPath::new(),
            text: None,
        }
    }

    /// Register the font used for all subsequent text measurement and
    /// drawing. Text calls on a surface without a font fail.
    pub fn with_font(width: u16, height: u16, font_bytes: Vec<u8>) -> MovieResult<Self> {
        let mut surface = Self::new(width, height);
        surface.text = Some(TextEngine::new(font_bytes)?);
        Ok(surface)
    }

    /// Flush pending draws and read the frame back as premultiplied RGBA8.
    pub fn readback(&mut self) -> FrameRgba {
        self.ctx.flush();
        let mut pixmap = vello_cpu::Pixmap::new(self.width, self.height);
        self.ctx.render_to_pixmap(&mut pixmap);
        FrameRgba {
            width: u32::from(self.width),
            height: u32::from(self.height),
            data: pixmap.data_as_u8_slice().to_vec(),
            premultiplied: true,
        }
    }

    fn apply_paint(&mut self, color: Rgba8) {
        self.ctx.set_transform(affine_to_cpu(self.state.transform));
        self.ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
            color.r, color.g, color.b, color.a,
        ));
    }

    fn fill_cpu_path(&mut self, color: Rgba8, path: &BezPath) {
        self.apply_paint(color);
        let alpha = self.state.alpha;
        if alpha < 1.0 {
            self.ctx.push_opacity_layer(alpha as f32);
        }
        self.ctx.fill_path(&bezpath_to_cpu(path));
        if alpha < 1.0 {
            self.ctx.pop_layer();
        }
    }

    fn engine(&mut self) -> MovieResult<&mut TextEngine> {
        self.text
            .as_mut()
            .ok_or_else(|| MovieError::validation("no font loaded for text drawing"))
    }
}

impl Surface for RasterSurface {
    fn width(&self) -> f64 {
        f64::from(self.width)
    }

    fn height(&self) -> f64 {
        f64::from(self.height)
    }

    fn clear(&mut self) {
        self.ctx = vello_cpu::RenderContext::new(self.width, self.height);
        self.state = DrawState::default();
        self.saved.clear();
        self.path = BezPath::new();
    }

    fn save(&mut self) {
        self.saved.push(self.state.clone());
    }

    fn restore(&mut self) {
        if let Some(state) = self.saved.pop() {
            self.state = state;
        }
    }

    fn translate(&mut self, dx: f64, dy: f64) {
        self.state.transform = self.state.transform * Affine::translate((dx, dy));
    }

    fn scale(&mut self, sx: f64, sy: f64) {
        self.state.transform = self.state.transform * Affine::scale_non_uniform(sx, sy);
    }

    fn rotate(&mut self, radians: f64) {
        self.state.transform = self.state.transform * Affine::rotate(radians);
    }

    fn transform(&mut self, m: Affine) {
        self.state.transform = self.state.transform * m;
    }

    fn global_alpha(&self) -> f64 {
        self.state.alpha
    }

    fn set_global_alpha(&mut self, alpha: f64) {
        self.state.alpha = alpha.clamp(0.0, 1.0);
    }

    fn set_fill_color(&mut self, color: Rgba8) {
        self.state.fill = color;
    }

    fn set_stroke_color(&mut self, color: Rgba8) {
        self.state.stroke = color;
    }

    fn set_line_width(&mut self, width: f64) {
        self.state.line_width = width.max(0.0);
    }

    fn set_font_size(&mut self, px: f64) {
        self.state.font_px = px;
    }

    fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64) {
        self.apply_paint(self.state.fill);
        let alpha = self.state.alpha;
        if alpha < 1.0 {
            self.ctx.push_opacity_layer(alpha as f32);
        }
        self.ctx
            .fill_rect(&vello_cpu::kurbo::Rect::new(x, y, x + w, y + h));
        if alpha < 1.0 {
            self.ctx.pop_layer();
        }
    }

    fn begin_path(&mut self) {
        self.path = BezPath::new();
    }

    fn move_to(&mut self, x: f64, y: f64) {
        self.path.move_to((x, y));
    }

    fn line_to(&mut self, x: f64, y: f64) {
        self.path.line_to((x, y));
    }

    fn close_path(&mut self) {
        self.path.close_path();
    }

    fn fill(&mut self) {
        let path = self.path.clone();
        self.fill_cpu_path(self.state.fill, &path);
    }

    fn stroke(&mut self) {
        let outline = kurbo::stroke(
            self.path.elements().iter().copied(),
            &kurbo::Stroke::new(self.state.line_width),
            &kurbo::StrokeOpts::default(),
            0.25,
        );
        self.fill_cpu_path(self.state.stroke, &outline);
    }

    fn measure_text(&mut self, text: &str) -> MovieResult<TextMetrics> {
        let font_px = self.state.font_px as f32;
        let layout = self.engine()?.layout(text, font_px, GlyphBrush::default())?;
        let mut metrics = TextMetrics {
            width: 0.0,
            ascent: 0.0,
            descent: 0.0,
            left: 0.0,
        };
        for line in layout.lines() {
            let m = line.metrics();
            metrics.width = metrics.width.max(f64::from(m.advance));
            metrics.ascent = metrics.ascent.max(f64::from(m.ascent));
            metrics.descent = metrics.descent.max(f64::from(m.descent));
        }
        Ok(metrics)
    }

    fn fill_text(&mut self, text: &str, x: f64, y: f64) -> MovieResult<()> {
        let ascent = self.measure_text(text)?.ascent;
        let fill = self.state.fill;
        let font_px = self.state.font_px as f32;
        let brush = GlyphBrush {
            r: fill.r,
            g: fill.g,
            b: fill.b,
            a: fill.a,
        };
        let layout = self.engine()?.layout(text, font_px, brush)?;
        let font = self
            .text
            .as_ref()
            .ok_or_else(|| MovieError::validation("no font loaded for text drawing"))?
            .font
            .clone();

        // Parley lays out from the top-left with glyph y at the line
        // baseline; shift so the first baseline lands at the requested y.
        let placed = self.state.transform * Affine::translate((x, y - ascent));
        self.ctx.set_transform(affine_to_cpu(placed));
        let alpha = self.state.alpha;
        if alpha < 1.0 {
            self.ctx.push_opacity_layer(alpha as f32);
        }
        for line in layout.lines() {
            for item in line.items() {
                let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                    continue;
                };
                let brush = run.style().brush;
                self.ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
                    brush.r, brush.g, brush.b, brush.a,
                ));
                let glyphs = run.glyphs().map(|g| vello_cpu::Glyph {
                    id: g.id,
                    x: g.x,
                    y: g.y,
                });
                self.ctx
                    .glyph_run(&font)
                    .font_size(run.run().font_size())
                    .fill_glyphs(glyphs);
            }
        }
        if alpha < 1.0 {
            self.ctx.pop_layer();
        }
        Ok(())
    }
}

fn affine_to_cpu(a: Affine) -> vello_cpu::kurbo::Affine {
    vello_cpu::kurbo::Affine::new(a.as_coeffs())
}

fn bezpath_to_cpu(path: &BezPath) -> vello_cpu::kurbo::BezPath {
    use kurbo::PathEl;

    let mut out = vello_cpu::kurbo::BezPath::new();
    for &el in path.elements() {
        match el {
            PathEl::MoveTo(p) => out.move_to(point_to_cpu(p)),
            PathEl::LineTo(p) => out.line_to(point_to_cpu(p)),
            PathEl::QuadTo(p1, p2) => out.quad_to(point_to_cpu(p1), point_to_cpu(p2)),
            PathEl::CurveTo(p1, p2, p3) => {
                out.curve_to(point_to_cpu(p1), point_to_cpu(p2), point_to_cpu(p3));
            }
            PathEl::ClosePath => out.close_path(),
        }
    }
    out
}

fn point_to_cpu(p: kurbo::Point) -> vello_cpu::kurbo::Point {
    vello_cpu::kurbo::Point::new(p.x, p.y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_rect_puts_ink_in_the_readback() {
        let mut surface = RasterSurface::new(8, 8);
        surface.set_fill_color(Rgba8::WHITE);
        surface.fill_rect(0.0, 0.0, 8.0, 8.0);
        let frame = surface.readback();
        assert_eq!(frame.data.len(), 8 * 8 * 4);
        assert!(frame.premultiplied);
        assert!(frame.data.chunks_exact(4).all(|px| px == [255, 255, 255, 255]));
    }

    #[test]
    fn clear_resets_ink_and_state() {
        let mut surface = RasterSurface::new(4, 4);
        surface.set_fill_color(Rgba8::WHITE);
        surface.set_global_alpha(0.5);
        surface.fill_rect(0.0, 0.0, 4.0, 4.0);
        surface.clear();
        assert_eq!(surface.global_alpha(), 1.0);
        let frame = surface.readback();
        assert!(frame.data.iter().all(|&b| b == 0));
    }

    #[test]
    fn restore_undoes_transform_and_alpha() {
        let mut surface = RasterSurface::new(4, 4);
        surface.save();
        surface.translate(2.0, 0.0);
        surface.set_global_alpha(0.25);
        surface.restore();
        assert_eq!(surface.global_alpha(), 1.0);
    }

    #[test]
    fn text_without_a_font_is_an_error() {
        let mut surface = RasterSurface::new(4, 4);
        assert!(surface.measure_text("x").is_err());
        assert!(surface.fill_text("x", 0.0, 0.0).is_err());
    }

    #[test]
    fn stroked_path_renders_along_the_line() {
        let mut surface = RasterSurface::new(16, 16);
        surface.set_stroke_color(Rgba8::WHITE);
        surface.set_line_width(4.0);
        surface.begin_path();
        surface.move_to(0.0, 8.0);
        surface.line_to(16.0, 8.0);
        surface.stroke();
        let frame = surface.readback();
        // Centre row is covered, the top row is not.
        let px = |x: usize, y: usize| frame.data[(y * 16 + x) * 4 + 3];
        assert_eq!(px(8, 8), 255);
        assert_eq!(px(8, 0), 0);
    }
}
