use crate::error::{MovieError, MovieResult};

pub use kurbo::{Affine, BezPath, Point, Rect, Vec2};

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct FrameIndex(pub u64);

/// Total duration of a clip. Diagnostic overlays such as the timecode clip
/// have no duration of their own and report `Unbounded`; the sequence or
/// edit wrapped around them supplies the stop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum FrameCount {
    Finite(u64),
    Unbounded,
}

impl FrameCount {
    pub fn finite(self) -> Option<u64> {
        match self {
            Self::Finite(n) => Some(n),
            Self::Unbounded => None,
        }
    }

    pub fn is_unbounded(self) -> bool {
        matches!(self, Self::Unbounded)
    }

    /// Sum of durations; any unbounded term makes the total unbounded.
    pub fn add(self, other: Self) -> Self {
        match (self, other) {
            (Self::Finite(a), Self::Finite(b)) => Self::Finite(a.saturating_add(b)),
            _ => Self::Unbounded,
        }
    }

    /// Minimum of durations; unbounded terms never win.
    pub fn min(self, other: Self) -> Self {
        match (self, other) {
            (Self::Finite(a), Self::Finite(b)) => Self::Finite(a.min(b)),
            (Self::Finite(a), Self::Unbounded) => Self::Finite(a),
            (Self::Unbounded, other) => other,
        }
    }

    /// Normalized position of `frame` within this duration, in `[0, 1)`.
    /// Unbounded (and zero-length) clips have no meaningful portion; 0.0 is
    /// returned so downstream easing math stays finite.
    pub fn portion_at(self, frame: FrameIndex) -> f64 {
        match self {
            Self::Finite(n) if n > 0 => (frame.0 as f64) / (n as f64),
            _ => 0.0,
        }
    }
}

/// Straight-alpha RGBA8 color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Rgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba8 {
    pub const BLACK: Self = Self::opaque(0, 0, 0);
    pub const WHITE: Self = Self::opaque(255, 255, 255);

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Parse a small CSS-ish color vocabulary: `#rgb`, `#rrggbb`, `#rrggbbaa`
    /// and the handful of keywords the generator scripts use.
    pub fn from_css(s: &str) -> MovieResult<Self> {
        let s = s.trim();
        if let Some(hex) = s.strip_prefix('#') {
            return Self::from_hex(hex)
                .ok_or_else(|| MovieError::validation(format!("invalid color '{s}'")));
        }
        match s.to_ascii_lowercase().as_str() {
            "black" => Ok(Self::BLACK),
            "white" => Ok(Self::WHITE),
            "red" => Ok(Self::opaque(255, 0, 0)),
            "green" => Ok(Self::opaque(0, 128, 0)),
            "blue" => Ok(Self::opaque(0, 0, 255)),
            "yellow" => Ok(Self::opaque(255, 255, 0)),
            "grey" | "gray" => Ok(Self::opaque(128, 128, 128)),
            _ => Err(MovieError::validation(format!("unknown color '{s}'"))),
        }
    }

    fn from_hex(hex: &str) -> Option<Self> {
        fn byte(hex: &str, i: usize) -> Option<u8> {
            u8::from_str_radix(hex.get(i..i + 2)?, 16).ok()
        }
        fn nibble(hex: &str, i: usize) -> Option<u8> {
            let v = u8::from_str_radix(hex.get(i..i + 1)?, 16).ok()?;
            Some(v << 4 | v)
        }

        match hex.len() {
            3 => Some(Self {
                r: nibble(hex, 0)?,
                g: nibble(hex, 1)?,
                b: nibble(hex, 2)?,
                a: 255,
            }),
            6 => Some(Self {
                r: byte(hex, 0)?,
                g: byte(hex, 2)?,
                b: byte(hex, 4)?,
                a: 255,
            }),
            8 => Some(Self {
                r: byte(hex, 0)?,
                g: byte(hex, 2)?,
                b: byte(hex, 4)?,
                a: byte(hex, 6)?,
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_count_arithmetic() {
        let f = FrameCount::Finite(10);
        assert_eq!(f.add(FrameCount::Finite(5)), FrameCount::Finite(15));
        assert_eq!(f.add(FrameCount::Unbounded), FrameCount::Unbounded);
        assert_eq!(f.min(FrameCount::Unbounded), FrameCount::Finite(10));
        assert_eq!(
            FrameCount::Unbounded.min(FrameCount::Unbounded),
            FrameCount::Unbounded
        );
    }

    #[test]
    fn portion_is_zero_for_unbounded() {
        assert_eq!(FrameCount::Unbounded.portion_at(FrameIndex(7)), 0.0);
        assert_eq!(FrameCount::Finite(10).portion_at(FrameIndex(5)), 0.5);
        assert_eq!(FrameCount::Finite(0).portion_at(FrameIndex(0)), 0.0);
    }

    #[test]
    fn color_parsing() {
        assert_eq!(Rgba8::from_css("#fff").unwrap(), Rgba8::WHITE);
        assert_eq!(
            Rgba8::from_css("#102030").unwrap(),
            Rgba8::opaque(0x10, 0x20, 0x30)
        );
        assert_eq!(Rgba8::from_css("White").unwrap(), Rgba8::WHITE);
        assert!(Rgba8::from_css("#12345").is_err());
        assert!(Rgba8::from_css("chartreuse").is_err());
    }
}
