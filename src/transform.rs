//! Rigid/affine transform wrapper around a child clip.

use std::rc::Rc;

use crate::{
    clip::{Bindable, Clip, ClipLifecycle, bindable},
    core::{Affine, FrameCount, FrameIndex},
    error::MovieResult,
    property::{EvalScope, Params, Props, PropertySet},
    surface::Surface,
};

/// Applies, in a fixed order, an origin shift, the convenience parameters
/// (scale, rotate, translate) and finally a raw affine override, then
/// delegates to the child. The fixed order is what lets convenience and
/// raw-matrix parameters mix predictably.
///
/// Parameters (all bindable): `origin_x`/`origin_y` as fractions of the
/// surface (default centre), `rotate` (radians), `scale_x`/`scale_y`,
/// `translate_x`/`translate_y` (pixels), and the raw matrix coefficients
/// `transform_a` … `transform_f` (default identity).
pub struct TransformClip {
    props: Props,
    clip: Rc<Clip>,
}

bindable!(TransformClip);

impl Clip {
    pub fn transform(clip: Rc<Clip>, params: Params) -> MovieResult<Rc<Self>> {
        let props = PropertySet::new();
        props.bind_many(
            &params,
            Params::new()
                .with("origin_x", 0.5)
                .with("origin_y", 0.5)
                .with("rotate", 0.0)
                .with("scale_x", 1.0)
                .with("scale_y", 1.0)
                .with("translate_x", 0.0)
                .with("translate_y", 0.0)
                .with("transform_a", 1.0)
                .with("transform_b", 0.0)
                .with("transform_c", 0.0)
                .with("transform_d", 1.0)
                .with("transform_e", 0.0)
                .with("transform_f", 0.0),
        )?;
        Ok(Rc::new(Self::Transform(TransformClip { props, clip })))
    }
}

impl TransformClip {
    fn apply(&self, surface: &mut dyn Surface, scope: &mut EvalScope) -> MovieResult<()> {
        let p = &self.props;
        let shift_x = surface.width() * scope.read_num(p, "origin_x")?;
        let shift_y = surface.height() * scope.read_num(p, "origin_y")?;

        surface.translate(shift_x, shift_y);
        surface.scale(scope.read_num(p, "scale_x")?, scope.read_num(p, "scale_y")?);
        surface.rotate(scope.read_num(p, "rotate")?);
        surface.translate(
            scope.read_num(p, "translate_x")? - shift_x,
            scope.read_num(p, "translate_y")? - shift_y,
        );

        let coeffs = [
            scope.read_num(p, "transform_a")?,
            scope.read_num(p, "transform_b")?,
            scope.read_num(p, "transform_c")?,
            scope.read_num(p, "transform_d")?,
            scope.read_num(p, "transform_e")?,
            scope.read_num(p, "transform_f")?,
        ];
        surface.transform(Affine::new(coeffs));
        Ok(())
    }
}

impl ClipLifecycle for TransformClip {
    fn frame_count(&self) -> FrameCount {
        self.clip.frame_count()
    }

    fn render(
        &self,
        surface: &mut dyn Surface,
        scope: &mut EvalScope,
        frame: FrameIndex,
    ) -> MovieResult<()> {
        surface.save();
        let out = self
            .apply(surface, scope)
            .and_then(|()| self.clip.make_frame(surface, scope, frame));
        surface.restore();
        out
    }
}
