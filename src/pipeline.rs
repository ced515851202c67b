//! Frame-by-frame render driver.
//!
//! Renders a clip front to back: clear, render frame N, read the pixels
//! back, hand them to the encoder, and only then start frame N+1. The
//! encoder commits each frame's bytes before returning, so output order is
//! strictly sequential by frame index and an aborted run leaves a valid
//! prefix of the stream on disk.

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use anyhow::Context as _;

use crate::{
    clip::{Clip, ClipLifecycle},
    core::FrameIndex,
    encode_mjpeg::{FrameEncoder, MjpegConfig, MjpegEncoder},
    error::{MovieError, MovieResult},
    property::EvalScope,
    surface::Surface,
    surface_cpu::RasterSurface,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub frames_rendered: u64,
}

/// Render `root` frame by frame into `encoder`.
///
/// The frame count comes from the clip; `frames` overrides it and is
/// required for unbounded roots. The first unrecovered error (cycle fault,
/// stack fault, encode or I/O failure) aborts the run; frames already
/// encoded are left as written.
#[tracing::instrument(skip(root, surface, encoder))]
pub fn render_stream<E: FrameEncoder>(
    root: &Clip,
    surface: &mut RasterSurface,
    mut encoder: E,
    frames: Option<u64>,
) -> MovieResult<RenderStats> {
    let total = match frames {
        Some(n) => n,
        None => root.frame_count().finite().ok_or_else(|| {
            MovieError::validation("rendering an unbounded clip requires an explicit frame count")
        })?,
    };

    let mut scope = EvalScope::new();
    let mut stats = RenderStats::default();
    for f in 0..total {
        surface.clear();
        root.make_frame(surface, &mut scope, FrameIndex(f))?;
        let frame = surface.readback();
        encoder.encode_frame(&frame)?;
        stats.frames_rendered += 1;
        tracing::debug!(frame = f, total, "frame encoded");
    }
    encoder.finish()?;
    Ok(stats)
}

pub fn load_font(path: &Path) -> MovieResult<Vec<u8>> {
    let bytes =
        std::fs::read(path).with_context(|| format!("read font '{}'", path.display()))?;
    Ok(bytes)
}

/// Convenience front end: output dimensions, JPEG quality and an optional
/// font, driving [`render_stream`] into a writer or file.
#[derive(Clone, Debug)]
pub struct MovieMaker {
    width: u16,
    height: u16,
    quality: u8,
    font_bytes: Option<Vec<u8>>,
    frames: Option<u64>,
}

impl MovieMaker {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            quality: 90,
            font_bytes: None,
            frames: None,
        }
    }

    pub fn quality(mut self, quality: u8) -> Self {
        self.quality = quality;
        self
    }

    pub fn font_bytes(mut self, bytes: Vec<u8>) -> Self {
        self.font_bytes = Some(bytes);
        self
    }

    /// Override the frame count (required for unbounded roots).
    pub fn frames(mut self, frames: u64) -> Self {
        self.frames = Some(frames);
        self
    }

    pub fn write<W: Write>(&self, root: &Clip, writer: W) -> MovieResult<RenderStats> {
        let mut surface = match &self.font_bytes {
            Some(bytes) => RasterSurface::with_font(self.width, self.height, bytes.clone())?,
            None => RasterSurface::new(self.width, self.height),
        };
        let cfg = MjpegConfig::new(u32::from(self.width), u32::from(self.height))
            .with_quality(self.quality);
        let encoder = MjpegEncoder::new(cfg, writer)?;
        render_stream(root, &mut surface, encoder, self.frames)
    }

    pub fn write_to(&self, root: &Clip, path: &Path) -> MovieResult<RenderStats> {
        let file =
            File::create(path).with_context(|| format!("create output '{}'", path.display()))?;
        let stats = self.write(root, BufWriter::new(file))?;
        tracing::info!(
            frames = stats.frames_rendered,
            out = %path.display(),
            "stream written"
        );
        Ok(stats)
    }
}
