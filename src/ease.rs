/// Easing curve applied to a dissolve's mix ramp (and reusable anywhere a
/// normalized `[0, 1]` progress wants shaping). `Linear` is the identity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Ease {
    #[default]
    Linear,
    InQuad,
    OutQuad,
    InOutQuad,
    InCubic,
    OutCubic,
    SmoothStep,
}

impl Ease {
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        let inv = 1.0 - t;
        match self {
            Self::Linear => t,
            Self::InQuad => t * t,
            Self::OutQuad => 1.0 - inv * inv,
            Self::InOutQuad => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    1.0 - 2.0 * inv * inv
                }
            }
            Self::InCubic => t * t * t,
            Self::OutCubic => 1.0 - inv * inv * inv,
            Self::SmoothStep => t * t * (3.0 - 2.0 * t),
        }
    }
}
