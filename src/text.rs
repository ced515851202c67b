//! Text-drawing clips.
//!
//! Placement is metrics-driven: the text is measured on the target surface
//! and anchored with normalized `(x, y)` fractions over the slack space
//! (surface extent minus text extent), so `0.5, 0.5` centres regardless of
//! surface size or font.

use std::rc::Rc;

use crate::{
    clip::{Bindable, Clip, ClipLifecycle, bindable},
    core::{FrameCount, FrameIndex, Rgba8},
    error::MovieResult,
    property::{EvalScope, Params, Props, PropertySet},
    surface::Surface,
};

fn place_and_fill(
    surface: &mut dyn Surface,
    text: &str,
    x: f64,
    y: f64,
    offset_x: f64,
    offset_y: f64,
) -> MovieResult<()> {
    let metrics = surface.measure_text(text)?;
    let dw = surface.width() - metrics.width;
    let dh = surface.height() - metrics.height();
    let xx = offset_x + dw * x - metrics.left;
    let yy = offset_y + dh * y - metrics.descent;
    surface.fill_text(text, xx, yy)
}

/// Fully parameterised text clip. Every parameter is bindable; defaults:
/// `text` "Hello, World", `x`/`y` 0.5, `offset_x`/`offset_y` 0, `size` 80,
/// `color` "white".
pub struct TextClip {
    props: Props,
    frames: u64,
}

bindable!(TextClip);

impl Clip {
    pub fn text(frames: u64, params: Params) -> MovieResult<Rc<Self>> {
        let props = PropertySet::new();
        props.bind_many(
            &params,
            Params::new()
                .with("text", "Hello, World")
                .with("x", 0.5)
                .with("y", 0.5)
                .with("offset_x", 0.0)
                .with("offset_y", 0.0)
                .with("size", 80.0)
                .with("color", "white"),
        )?;
        Ok(Rc::new(Self::Text(TextClip { props, frames })))
    }
}

impl ClipLifecycle for TextClip {
    fn frame_count(&self) -> FrameCount {
        FrameCount::Finite(self.frames)
    }

    fn render(
        &self,
        surface: &mut dyn Surface,
        scope: &mut EvalScope,
        _frame: FrameIndex,
    ) -> MovieResult<()> {
        let p = &self.props;
        surface.set_font_size(scope.read_num(p, "size")?);
        surface.set_fill_color(Rgba8::from_css(&scope.read_text(p, "color")?)?);
        place_and_fill(
            surface,
            &scope.read_text(p, "text")?,
            scope.read_num(p, "x")?,
            scope.read_num(p, "y")?,
            scope.read_num(p, "offset_x")?,
            scope.read_num(p, "offset_y")?,
        )
    }
}

/// Style hook for [`TitleClip`]: runs after the default style is set, before
/// measuring and drawing.
pub type StyleFn = Rc<dyn Fn(&mut dyn Surface)>;

/// A fixed string anchored by bindable `x`/`y` fractions, 80px white by
/// default. The style hook may override font size and colors.
pub struct TitleClip {
    props: Props,
    text: String,
    frames: u64,
    style: Option<StyleFn>,
}

bindable!(TitleClip);

impl Clip {
    pub fn title(
        text: impl Into<String>,
        frames: u64,
        params: Params,
    ) -> MovieResult<Rc<Self>> {
        Self::title_styled(text, frames, params, None)
    }

    pub fn title_with(
        text: impl Into<String>,
        frames: u64,
        params: Params,
        style: impl Fn(&mut dyn Surface) + 'static,
    ) -> MovieResult<Rc<Self>> {
        Self::title_styled(text, frames, params, Some(Rc::new(style)))
    }

    fn title_styled(
        text: impl Into<String>,
        frames: u64,
        params: Params,
        style: Option<StyleFn>,
    ) -> MovieResult<Rc<Self>> {
        let props = PropertySet::new();
        props.bind_many(&params, Params::new().with("x", 0.5).with("y", 0.5))?;
        Ok(Rc::new(Self::Title(TitleClip {
            props,
            text: text.into(),
            frames,
            style,
        })))
    }
}

impl ClipLifecycle for TitleClip {
    fn frame_count(&self) -> FrameCount {
        FrameCount::Finite(self.frames)
    }

    fn render(
        &self,
        surface: &mut dyn Surface,
        scope: &mut EvalScope,
        _frame: FrameIndex,
    ) -> MovieResult<()> {
        surface.set_font_size(80.0);
        surface.set_fill_color(Rgba8::WHITE);
        if let Some(style) = &self.style {
            style(surface);
        }
        let x = scope.read_num(&self.props, "x")?;
        let y = scope.read_num(&self.props, "y")?;
        place_and_fill(surface, &self.text, x, y, 0.0, 0.0)
    }
}

/// Diagnostic overlay: the current frame index in small green text at a
/// fixed position. Unbounded, so it never constrains an overlay's length.
pub struct TimecodeClip {
    props: Props,
}

bindable!(TimecodeClip);

impl Clip {
    pub fn timecode() -> Rc<Self> {
        Rc::new(Self::Timecode(TimecodeClip {
            props: PropertySet::new(),
        }))
    }
}

impl ClipLifecycle for TimecodeClip {
    fn frame_count(&self) -> FrameCount {
        FrameCount::Unbounded
    }

    fn render(
        &self,
        surface: &mut dyn Surface,
        _scope: &mut EvalScope,
        frame: FrameIndex,
    ) -> MovieResult<()> {
        surface.set_font_size(18.0);
        surface.set_fill_color(Rgba8::from_css("green")?);
        surface.fill_text(&frame.0.to_string(), 100.0, 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        property::Binding,
        trace::{SurfaceOp, TraceSurface},
    };

    fn rendered_text(clip: &Clip, surface: &mut TraceSurface, frame: u64) -> (String, f64, f64) {
        let mut scope = EvalScope::new();
        clip.make_frame(surface, &mut scope, FrameIndex(frame))
            .unwrap();
        let text = surface
            .ops()
            .iter()
            .find_map(|op| match op {
                SurfaceOp::FillText { text, x, y } => Some((text.clone(), *x, *y)),
                _ => None,
            })
            .unwrap();
        text
    }

    #[test]
    fn text_centres_over_the_slack_space() {
        // "hi" measures 20 wide, 10 tall under the trace metrics.
        let clip = Clip::text(10, Params::new().with("text", "hi")).unwrap();
        let mut surface = TraceSurface::new(120.0, 50.0);
        let (text, x, y) = rendered_text(&clip, &mut surface, 0);
        assert_eq!(text, "hi");
        assert_eq!(x, (120.0 - 20.0) * 0.5);
        assert_eq!(y, (50.0 - 10.0) * 0.5 - TraceSurface::DESCENT);
    }

    #[test]
    fn text_applies_offsets_and_anchor() {
        let clip = Clip::text(
            10,
            Params::new()
                .with("text", "hi")
                .with("x", 0.0)
                .with("y", 1.0)
                .with("offset_x", 3.0)
                .with("offset_y", -4.0),
        )
        .unwrap();
        let mut surface = TraceSurface::new(120.0, 50.0);
        let (_, x, y) = rendered_text(&clip, &mut surface, 0);
        assert_eq!(x, 3.0);
        assert_eq!(y, -4.0 + (50.0 - 10.0) - TraceSurface::DESCENT);
    }

    #[test]
    fn text_style_params_reach_the_surface() {
        let clip = Clip::text(
            10,
            Params::new().with("size", 18.0).with("color", "green"),
        )
        .unwrap();
        let mut surface = TraceSurface::new(64.0, 64.0);
        let mut scope = EvalScope::new();
        clip.make_frame(&mut surface, &mut scope, FrameIndex(0))
            .unwrap();
        assert!(surface.ops().contains(&SurfaceOp::SetFontSize { px: 18.0 }));
        assert!(surface.ops().contains(&SurfaceOp::SetFillColor {
            color: Rgba8::from_css("green").unwrap()
        }));
    }

    #[test]
    fn title_anchor_can_animate() {
        // x sweeps 0 -> 1 across the clip; at frame 5 of 10 it is 0.5.
        let clip = Clip::title(
            "go",
            10,
            Params::new().with(
                "x",
                Binding::computed(|_, ctx| Ok(crate::property::Value::Num(ctx.portion))),
            ),
        )
        .unwrap();
        let mut surface = TraceSurface::new(100.0, 100.0);
        let (_, x, _) = rendered_text(&clip, &mut surface, 5);
        assert_eq!(x, (100.0 - 20.0) * 0.5);
    }

    #[test]
    fn title_style_hook_runs_after_defaults() {
        let clip = Clip::title_with("go", 10, Params::new(), |surface| {
            surface.set_font_size(40.0);
        })
        .unwrap();
        let mut surface = TraceSurface::new(100.0, 100.0);
        let mut scope = EvalScope::new();
        clip.make_frame(&mut surface, &mut scope, FrameIndex(0))
            .unwrap();
        let sizes: Vec<f64> = surface
            .ops()
            .iter()
            .filter_map(|op| match op {
                SurfaceOp::SetFontSize { px } => Some(*px),
                _ => None,
            })
            .collect();
        assert_eq!(sizes, vec![80.0, 40.0]);
    }

    #[test]
    fn timecode_is_unbounded_and_prints_the_frame_index() {
        let clip = Clip::timecode();
        assert_eq!(clip.frame_count(), FrameCount::Unbounded);
        let mut surface = TraceSurface::new(640.0, 480.0);
        let (text, x, y) = rendered_text(&clip, &mut surface, 123);
        assert_eq!(text, "123");
        assert_eq!((x, y), (100.0, 100.0));
    }
}
