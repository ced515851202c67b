//! Free-standing dynamic value objects.
//!
//! These are bindable objects that own no pixels: they exist so that a clip
//! parameter can be defined as a delegate to an animated quantity, shared by
//! any number of clips.

use std::{f64::consts::TAU, rc::Rc};

use crate::{
    error::{MovieError, MovieResult},
    property::{Binding, Params, Props, PropertySet, Value},
};

/// Linear ramp over the owning clip's timeline: `value` runs from `min` at
/// portion 0 to `max` at portion 1.
pub struct RampProperty {
    props: Props,
}

impl RampProperty {
    pub fn new(min: f64, max: f64) -> Self {
        let props = PropertySet::new();
        props.bind_fresh(
            "value",
            Binding::computed(move |_, ctx| Ok(Value::Num((max - min) * ctx.portion + min))),
        );
        Self { props }
    }

    pub fn props(&self) -> &Props {
        &self.props
    }

    /// Delegate binding for the ramp's current value.
    pub fn value(&self) -> Binding {
        Binding::delegate(&self.props, "value")
    }
}

/// A point orbiting the origin: `x = sin(angle) * amplitude * scale_x +
/// offset_x` (and the cosine for `y`), with `angle = (portion * frequency +
/// phase) * 2π`.
///
/// The offset is added after amplitude scaling, so `offset_x`/`offset_y`
/// position the orbit's centre regardless of its radius.
///
/// All parameters are bindable, so an orbit's amplitude can itself be driven
/// by another dynamic property.
pub struct CircleProperty {
    props: Props,
}

impl CircleProperty {
    pub fn new(params: Params) -> MovieResult<Self> {
        let props = PropertySet::new();
        props.bind_many(
            &params,
            Params::new()
                .with("frequency", 1.0)
                .with("amplitude", 1.0)
                .with("phase", 0.0)
                .with("scale_x", 1.0)
                .with("scale_y", 1.0)
                .with("offset_x", 0.0)
                .with("offset_y", 0.0),
        )?;

        let weak = Rc::downgrade(&props);
        props.bind_fresh(
            "x",
            Binding::computed(move |scope, ctx| {
                let props = weak
                    .upgrade()
                    .ok_or_else(|| MovieError::validation("circle property was dropped"))?;
                let angle = Self::angle(scope, &props, ctx.portion)?;
                let amplitude = scope.read_num(&props, "amplitude")?;
                let scale = scope.read_num(&props, "scale_x")?;
                let offset = scope.read_num(&props, "offset_x")?;
                Ok(Value::Num(angle.sin() * amplitude * scale + offset))
            }),
        );
        let weak = Rc::downgrade(&props);
        props.bind_fresh(
            "y",
            Binding::computed(move |scope, ctx| {
                let props = weak
                    .upgrade()
                    .ok_or_else(|| MovieError::validation("circle property was dropped"))?;
                let angle = Self::angle(scope, &props, ctx.portion)?;
                let amplitude = scope.read_num(&props, "amplitude")?;
                let scale = scope.read_num(&props, "scale_y")?;
                let offset = scope.read_num(&props, "offset_y")?;
                Ok(Value::Num(angle.cos() * amplitude * scale + offset))
            }),
        );

        Ok(Self { props })
    }

    fn angle(
        scope: &mut crate::property::EvalScope,
        props: &PropertySet,
        portion: f64,
    ) -> MovieResult<f64> {
        let frequency = scope.read_num(props, "frequency")?;
        let phase = scope.read_num(props, "phase")?;
        Ok((portion * frequency + phase) * TAU)
    }

    pub fn props(&self) -> &Props {
        &self.props
    }

    pub fn x(&self) -> Binding {
        Binding::delegate(&self.props, "x")
    }

    pub fn y(&self) -> Binding {
        Binding::delegate(&self.props, "y")
    }
}
