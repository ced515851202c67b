#![forbid(unsafe_code)]

pub mod clip;
pub mod core;
pub mod dynamics;
pub mod ease;
pub mod encode_mjpeg;
pub mod error;
pub mod pipeline;
pub mod property;
pub mod surface;
pub mod surface_cpu;
pub mod text;
pub mod trace;
pub mod transform;
pub mod transitions;

pub use clip::{Bindable, Clip, ClipLifecycle};
pub use core::{FrameCount, FrameIndex, Rgba8};
pub use dynamics::{CircleProperty, RampProperty};
pub use ease::Ease;
pub use encode_mjpeg::{FrameEncoder, MjpegConfig, MjpegEncoder};
pub use error::{MovieError, MovieResult};
pub use pipeline::{MovieMaker, RenderStats, load_font, render_stream};
pub use property::{Binding, EvalScope, FrameContext, Params, Props, PropertySet, Value};
pub use surface::{FrameRgba, Surface, TextMetrics};
pub use surface_cpu::RasterSurface;
pub use trace::{SurfaceOp, TraceSurface};
