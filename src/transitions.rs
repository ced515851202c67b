//! Cross-clip transitions.

use std::rc::Rc;

use crate::{
    clip::{Bindable, Clip, ClipLifecycle, bindable},
    core::{FrameCount, FrameIndex, Rgba8},
    ease::Ease,
    error::{MovieError, MovieResult},
    property::{EvalScope, Props, PropertySet},
    surface::Surface,
};

/// Plays `a`, then cross-fades into `b` over the last `overlap` frames of
/// `a`, then plays the rest of `b`. Total length is
/// `len(a) - overlap + len(b)`.
///
/// During the overlap, each half is drawn over a frame-filling black fill at
/// the complementary weight, so the blended frame stays fully opaque rather
/// than dimming toward the surface background. The alpha changes are scoped
/// with save/restore and never leak into the children.
pub struct DissolveClip {
    props: Props,
    a: Rc<Clip>,
    b: Rc<Clip>,
    frames_a: u64,
    frames_b: u64,
    overlap: u64,
    ease: Ease,
}

bindable!(DissolveClip);

impl Clip {
    /// Both children must have finite frame counts. `overlap` is clamped to
    /// the shorter child.
    pub fn dissolve(a: Rc<Clip>, b: Rc<Clip>, overlap: u64, ease: Ease) -> MovieResult<Rc<Self>> {
        let frames_a = a.frame_count().finite().ok_or_else(|| {
            MovieError::validation("dissolve requires clips with finite frame counts")
        })?;
        let frames_b = b.frame_count().finite().ok_or_else(|| {
            MovieError::validation("dissolve requires clips with finite frame counts")
        })?;
        let overlap = overlap.min(frames_a).min(frames_b);
        Ok(Rc::new(Self::Dissolve(DissolveClip {
            props: PropertySet::new(),
            a,
            b,
            frames_a,
            frames_b,
            overlap,
            ease,
        })))
    }
}

impl DissolveClip {
    fn weighted(
        clip: &Clip,
        weight: f64,
        surface: &mut dyn Surface,
        scope: &mut EvalScope,
        frame: FrameIndex,
    ) -> MovieResult<()> {
        surface.save();
        let out = (|| {
            surface.set_global_alpha(surface.global_alpha() * weight);
            surface.set_fill_color(Rgba8::BLACK);
            surface.fill_rect(0.0, 0.0, surface.width(), surface.height());
            clip.make_frame(surface, scope, frame)
        })();
        surface.restore();
        out
    }
}

impl ClipLifecycle for DissolveClip {
    fn frame_count(&self) -> FrameCount {
        FrameCount::Finite(self.frames_a - self.overlap + self.frames_b)
    }

    fn render(
        &self,
        surface: &mut dyn Surface,
        scope: &mut EvalScope,
        frame: FrameIndex,
    ) -> MovieResult<()> {
        let f = frame.0;
        let start = self.frames_a - self.overlap;
        if f < start {
            return self.a.make_frame(surface, scope, frame);
        }
        if f < self.frames_a {
            let mix = self.ease.apply((f - start) as f64 / self.overlap as f64);
            Self::weighted(&self.a, 1.0 - mix, surface, scope, frame)?;
            return Self::weighted(&self.b, mix, surface, scope, FrameIndex(f - start));
        }
        self.b.make_frame(surface, scope, FrameIndex(f - start))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        property::Value,
        trace::{SurfaceOp, TraceSurface},
    };

    fn tagged(tag: f64, frames: u64) -> Rc<Clip> {
        Clip::atomic(frames, move |surface, _, frame| {
            surface.fill_rect(tag, frame.0 as f64, 1.0, 1.0);
            Ok(())
        })
    }

    fn render(clip: &Clip, frame: u64) -> Vec<SurfaceOp> {
        let mut surface = TraceSurface::new(64.0, 64.0);
        let mut scope = EvalScope::new();
        clip.make_frame(&mut surface, &mut scope, FrameIndex(frame))
            .unwrap();
        surface.take_ops()
    }

    fn draws(ops: &[SurfaceOp]) -> Vec<SurfaceOp> {
        ops.iter().filter(|op| op.is_draw()).cloned().collect()
    }

    #[test]
    fn total_length_subtracts_the_overlap() {
        let clip = Clip::dissolve(tagged(1.0, 10), tagged(2.0, 10), 4, Ease::Linear).unwrap();
        assert_eq!(clip.frame_count(), FrameCount::Finite(16));
    }

    #[test]
    fn phases_draw_the_right_child() {
        let clip = Clip::dissolve(tagged(1.0, 10), tagged(2.0, 10), 4, Ease::Linear).unwrap();

        // Before the overlap only A draws, at its own index.
        let ops = render(&clip, 5);
        assert_eq!(
            draws(&ops),
            vec![SurfaceOp::FillRect {
                x: 1.0,
                y: 5.0,
                w: 1.0,
                h: 1.0
            }]
        );

        // Inside the overlap both draw, B rebased to its local index, each
        // behind a frame-filling backing fill.
        let ops = render(&clip, 7);
        assert_eq!(
            draws(&ops),
            vec![
                SurfaceOp::FillRect {
                    x: 0.0,
                    y: 0.0,
                    w: 64.0,
                    h: 64.0
                },
                SurfaceOp::FillRect {
                    x: 1.0,
                    y: 7.0,
                    w: 1.0,
                    h: 1.0
                },
                SurfaceOp::FillRect {
                    x: 0.0,
                    y: 0.0,
                    w: 64.0,
                    h: 64.0
                },
                SurfaceOp::FillRect {
                    x: 2.0,
                    y: 1.0,
                    w: 1.0,
                    h: 1.0
                },
            ]
        );

        // After the overlap only B draws.
        let ops = render(&clip, 12);
        assert_eq!(
            draws(&ops),
            vec![SurfaceOp::FillRect {
                x: 2.0,
                y: 6.0,
                w: 1.0,
                h: 1.0
            }]
        );
    }

    #[test]
    fn overlap_weights_rise_linearly_and_stay_scoped() {
        let clip = Clip::dissolve(tagged(1.0, 10), tagged(2.0, 10), 4, Ease::Linear).unwrap();
        let ops = render(&clip, 7);

        // Overlap frame 1 of 4: A at 0.75, B at 0.25.
        let alphas: Vec<f64> = ops
            .iter()
            .filter_map(|op| match op {
                SurfaceOp::SetGlobalAlpha { alpha } => Some(*alpha),
                _ => None,
            })
            .collect();
        assert_eq!(alphas, vec![0.75, 0.25]);

        // The alpha changes are bracketed by save/restore pairs.
        let saves = ops.iter().filter(|op| **op == SurfaceOp::Save).count();
        let restores = ops.iter().filter(|op| **op == SurfaceOp::Restore).count();
        assert_eq!(saves, restores);
    }

    #[test]
    fn overlap_is_clamped_to_the_shorter_child() {
        let clip = Clip::dissolve(tagged(1.0, 3), tagged(2.0, 10), 8, Ease::Linear).unwrap();
        assert_eq!(clip.frame_count(), FrameCount::Finite(10));
    }

    #[test]
    fn unbounded_children_are_rejected() {
        let err = Clip::dissolve(tagged(1.0, 10), Clip::timecode(), 4, Ease::Linear).unwrap_err();
        assert!(matches!(err, MovieError::Validation(_)));
    }

    #[test]
    fn each_phase_runs_under_its_own_frame_context() {
        // A dissolve of two property-driven clips: each child must see its
        // own portion, not the dissolve's.
        let probe = |frames: u64| {
            let clip = Clip::atomic(frames, |_, scope, _| {
                let _ = scope.portion();
                Ok(())
            });
            clip.props()
                .bind("p", crate::property::Binding::computed(|scope, _| {
                    Ok(Value::Num(scope.portion()))
                }))
                .unwrap();
            clip
        };
        let clip = Clip::dissolve(probe(10), probe(10), 4, Ease::Linear).unwrap();
        let mut surface = TraceSurface::new(8.0, 8.0);
        let mut scope = EvalScope::new();
        clip.make_frame(&mut surface, &mut scope, FrameIndex(8))
            .unwrap();
        assert_eq!(scope.depth(), 0);
    }
}
