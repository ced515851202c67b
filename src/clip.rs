//! The clip algebra.
//!
//! A [`Clip`] is a closed set of composable variants sharing one contract:
//! report a [`FrameCount`] and render a given frame index onto a surface.
//! Rendering always happens through [`ClipLifecycle::make_frame`], which
//! brackets the variant's draw logic in a pushed [`FrameContext`] so that
//! property reads are scoped, memoized and cycle-checked per frame.

use std::rc::Rc;

use crate::{
    core::{FrameCount, FrameIndex},
    error::{MovieError, MovieResult},
    property::{EvalScope, FrameContext, Props, PropertySet},
    surface::Surface,
    text::{TextClip, TimecodeClip, TitleClip},
    transform::TransformClip,
    transitions::DissolveClip,
};

/// Caller-supplied draw logic for an [`AtomicClip`].
pub type DrawFn = Rc<dyn Fn(&mut dyn Surface, &mut EvalScope, FrameIndex) -> MovieResult<()>>;

/// Property-graph capability: every clip owns a bindable property set.
pub trait Bindable {
    fn props(&self) -> &Props;
}

/// Frame lifecycle capability, composed on top of [`Bindable`].
pub trait ClipLifecycle: Bindable {
    fn frame_count(&self) -> FrameCount;

    /// Variant draw logic. Runs inside the context pushed by
    /// [`make_frame`](Self::make_frame); never call directly.
    fn render(
        &self,
        surface: &mut dyn Surface,
        scope: &mut EvalScope,
        frame: FrameIndex,
    ) -> MovieResult<()>;

    /// Render `frame` under a fresh frame context.
    ///
    /// The context (and its evaluation cache) is popped on all paths, so no
    /// cached property value outlives the frame it was computed for.
    fn make_frame(
        &self,
        surface: &mut dyn Surface,
        scope: &mut EvalScope,
        frame: FrameIndex,
    ) -> MovieResult<()> {
        scope.push(FrameContext {
            frame,
            portion: self.frame_count().portion_at(frame),
            owner: self.props().id(),
        });
        let out = self.render(surface, scope, frame);
        scope.pop()?;
        out
    }
}

/// The closed set of clip variants.
pub enum Clip {
    Atomic(AtomicClip),
    Blank(BlankClip),
    Sequence(SequenceClip),
    Overlay(OverlayClip),
    Reverse(ReverseClip),
    Edit(EditClip),
    Dissolve(DissolveClip),
    Transform(TransformClip),
    Text(TextClip),
    Title(TitleClip),
    Timecode(TimecodeClip),
}

impl std::fmt::Debug for Clip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let variant = match self {
            Self::Atomic(_) => "Atomic",
            Self::Blank(_) => "Blank",
            Self::Sequence(_) => "Sequence",
            Self::Overlay(_) => "Overlay",
            Self::Reverse(_) => "Reverse",
            Self::Edit(_) => "Edit",
            Self::Dissolve(_) => "Dissolve",
            Self::Transform(_) => "Transform",
            Self::Text(_) => "Text",
            Self::Title(_) => "Title",
            Self::Timecode(_) => "Timecode",
        };
        f.debug_tuple("Clip").field(&variant).finish()
    }
}

impl Clip {
    fn inner(&self) -> &dyn ClipLifecycle {
        match self {
            Self::Atomic(c) => c,
            Self::Blank(c) => c,
            Self::Sequence(c) => c,
            Self::Overlay(c) => c,
            Self::Reverse(c) => c,
            Self::Edit(c) => c,
            Self::Dissolve(c) => c,
            Self::Transform(c) => c,
            Self::Text(c) => c,
            Self::Title(c) => c,
            Self::Timecode(c) => c,
        }
    }

    /// A clip that delegates each frame to `draw`.
    pub fn atomic(
        frames: u64,
        draw: impl Fn(&mut dyn Surface, &mut EvalScope, FrameIndex) -> MovieResult<()> + 'static,
    ) -> Rc<Self> {
        Rc::new(Self::Atomic(AtomicClip {
            props: PropertySet::new(),
            frames,
            draw: Rc::new(draw),
        }))
    }

    /// A clip of `frames` frames with no drawing side effect.
    pub fn blank(frames: u64) -> Rc<Self> {
        Rc::new(Self::Blank(BlankClip {
            props: PropertySet::new(),
            frames,
        }))
    }

    pub fn sequence(children: impl IntoIterator<Item = Rc<Clip>>) -> Rc<Self> {
        let mut seq = SequenceClip::new();
        seq.extend(children);
        Rc::new(Self::Sequence(seq))
    }

    pub fn overlay(children: impl IntoIterator<Item = Rc<Clip>>) -> Rc<Self> {
        let mut overlay = OverlayClip::new();
        for c in children {
            overlay.push(c);
        }
        Rc::new(Self::Overlay(overlay))
    }

    /// Play `clip` backwards. The child must have a finite frame count.
    pub fn reverse(clip: Rc<Clip>) -> MovieResult<Rc<Self>> {
        let frames = clip.frame_count().finite().ok_or_else(|| {
            MovieError::validation("reverse requires a clip with a finite frame count")
        })?;
        Ok(Rc::new(Self::Reverse(ReverseClip {
            props: PropertySet::new(),
            clip,
            frames,
        })))
    }

    /// Trim: skip `in_frame` frames of `clip` and keep `frames` from there.
    ///
    /// Intent degrades gracefully at short sources: the in-point is clamped
    /// to the child's length first, then the kept length is truncated to what
    /// remains. Unbounded children are taken as supplied.
    pub fn edit(clip: Rc<Clip>, in_frame: u64, frames: u64) -> Rc<Self> {
        let (in_frame, frames) = match clip.frame_count() {
            FrameCount::Finite(available) => {
                let in_frame = in_frame.min(available);
                (in_frame, frames.min(available - in_frame))
            }
            FrameCount::Unbounded => (in_frame, frames),
        };
        Rc::new(Self::Edit(EditClip {
            props: PropertySet::new(),
            clip,
            in_frame,
            frames,
        }))
    }
}

impl Bindable for Clip {
    fn props(&self) -> &Props {
        self.inner().props()
    }
}

impl ClipLifecycle for Clip {
    fn frame_count(&self) -> FrameCount {
        self.inner().frame_count()
    }

    fn render(
        &self,
        surface: &mut dyn Surface,
        scope: &mut EvalScope,
        frame: FrameIndex,
    ) -> MovieResult<()> {
        self.inner().render(surface, scope, frame)
    }
}

macro_rules! bindable {
    ($ty:ty) => {
        impl Bindable for $ty {
            fn props(&self) -> &Props {
                &self.props
            }
        }
    };
}
pub(crate) use bindable;

pub struct AtomicClip {
    props: Props,
    frames: u64,
    draw: DrawFn,
}

bindable!(AtomicClip);

impl ClipLifecycle for AtomicClip {
    fn frame_count(&self) -> FrameCount {
        FrameCount::Finite(self.frames)
    }

    fn render(
        &self,
        surface: &mut dyn Surface,
        scope: &mut EvalScope,
        frame: FrameIndex,
    ) -> MovieResult<()> {
        (self.draw)(surface, scope, frame)
    }
}

pub struct BlankClip {
    props: Props,
    frames: u64,
}

bindable!(BlankClip);

impl ClipLifecycle for BlankClip {
    fn frame_count(&self) -> FrameCount {
        FrameCount::Finite(self.frames)
    }

    fn render(
        &self,
        _surface: &mut dyn Surface,
        _scope: &mut EvalScope,
        _frame: FrameIndex,
    ) -> MovieResult<()> {
        Ok(())
    }
}

/// Children play one after another; a frame index is owned by exactly one
/// child, found by subtracting earlier children's counts.
pub struct SequenceClip {
    props: Props,
    clips: Vec<Rc<Clip>>,
}

bindable!(SequenceClip);

impl SequenceClip {
    pub fn new() -> Self {
        Self {
            props: PropertySet::new(),
            clips: Vec::new(),
        }
    }

    /// Append a child. Appending a sequence splices its children in flat, so
    /// nested sequences never accumulate.
    pub fn append(&mut self, clip: Rc<Clip>) {
        if let Clip::Sequence(seq) = &*clip {
            self.clips.extend(seq.clips.iter().cloned());
        } else {
            self.clips.push(clip);
        }
    }

    pub fn extend(&mut self, clips: impl IntoIterator<Item = Rc<Clip>>) {
        for c in clips {
            self.append(c);
        }
    }

    pub fn clips(&self) -> &[Rc<Clip>] {
        &self.clips
    }

    /// Structure-preserving map: children for which `f` returns `None` are
    /// dropped from the result.
    pub fn map(&self, f: impl Fn(&Rc<Clip>) -> Option<Rc<Clip>>) -> SequenceClip {
        let mut out = SequenceClip::new();
        for clip in &self.clips {
            if let Some(mapped) = f(clip) {
                out.append(mapped);
            }
        }
        out
    }

    /// Left fold over the child list. `f` returning `None` keeps the current
    /// accumulator. `None` overall for an empty sequence.
    pub fn reduce(
        &self,
        f: impl Fn(Rc<Clip>, Rc<Clip>) -> Option<Rc<Clip>>,
    ) -> Option<Rc<Clip>> {
        let mut clips = self.clips.iter().cloned();
        let mut accum = clips.next()?;
        for clip in clips {
            if let Some(next) = f(accum.clone(), clip) {
                accum = next;
            }
        }
        Some(accum)
    }

    pub fn into_clip(self) -> Rc<Clip> {
        Rc::new(Clip::Sequence(self))
    }
}

impl Default for SequenceClip {
    fn default() -> Self {
        Self::new()
    }
}

impl ClipLifecycle for SequenceClip {
    fn frame_count(&self) -> FrameCount {
        self.clips
            .iter()
            .fold(FrameCount::Finite(0), |acc, c| acc.add(c.frame_count()))
    }

    fn render(
        &self,
        surface: &mut dyn Surface,
        scope: &mut EvalScope,
        frame: FrameIndex,
    ) -> MovieResult<()> {
        let mut local = frame.0;
        for clip in &self.clips {
            match clip.frame_count() {
                FrameCount::Finite(count) if local >= count => local -= count,
                _ => return clip.make_frame(surface, scope, FrameIndex(local)),
            }
        }
        // Past the end of every child: nothing owns the frame, draw nothing.
        Ok(())
    }
}

/// Children play simultaneously at the same frame index, each under an
/// isolated save/restore so drawing state cannot leak between layers.
pub struct OverlayClip {
    props: Props,
    clips: Vec<Rc<Clip>>,
}

bindable!(OverlayClip);

impl OverlayClip {
    pub fn new() -> Self {
        Self {
            props: PropertySet::new(),
            clips: Vec::new(),
        }
    }

    pub fn push(&mut self, clip: Rc<Clip>) {
        self.clips.push(clip);
    }

    pub fn into_clip(self) -> Rc<Clip> {
        Rc::new(Clip::Overlay(self))
    }
}

impl Default for OverlayClip {
    fn default() -> Self {
        Self::new()
    }
}

impl ClipLifecycle for OverlayClip {
    /// Minimum of the finite children's counts; unbounded children never
    /// bound the overlay, so an overlay of only unbounded children is itself
    /// unbounded.
    fn frame_count(&self) -> FrameCount {
        self.clips
            .iter()
            .fold(FrameCount::Unbounded, |acc, c| acc.min(c.frame_count()))
    }

    fn render(
        &self,
        surface: &mut dyn Surface,
        scope: &mut EvalScope,
        frame: FrameIndex,
    ) -> MovieResult<()> {
        for clip in &self.clips {
            surface.save();
            let out = clip.make_frame(surface, scope, frame);
            surface.restore();
            out?;
        }
        Ok(())
    }
}

pub struct ReverseClip {
    props: Props,
    clip: Rc<Clip>,
    /// Child count captured at construction.
    frames: u64,
}

bindable!(ReverseClip);

impl ClipLifecycle for ReverseClip {
    fn frame_count(&self) -> FrameCount {
        FrameCount::Finite(self.frames)
    }

    fn render(
        &self,
        surface: &mut dyn Surface,
        scope: &mut EvalScope,
        frame: FrameIndex,
    ) -> MovieResult<()> {
        let mapped = self
            .frames
            .checked_sub(frame.0 + 1)
            .ok_or_else(|| MovieError::validation("reverse frame index out of range"))?;
        self.clip.make_frame(surface, scope, FrameIndex(mapped))
    }
}

pub struct EditClip {
    props: Props,
    clip: Rc<Clip>,
    in_frame: u64,
    frames: u64,
}

bindable!(EditClip);

impl EditClip {
    pub fn in_frame(&self) -> u64 {
        self.in_frame
    }
}

impl ClipLifecycle for EditClip {
    fn frame_count(&self) -> FrameCount {
        FrameCount::Finite(self.frames)
    }

    fn render(
        &self,
        surface: &mut dyn Surface,
        scope: &mut EvalScope,
        frame: FrameIndex,
    ) -> MovieResult<()> {
        self.clip
            .make_frame(surface, scope, FrameIndex(frame.0 + self.in_frame))
    }
}
