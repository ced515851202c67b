//! Motion-JPEG elementary stream encoder.
//!
//! Each frame is a complete baseline JPEG; the stream is their plain
//! concatenation, playable by anything that accepts an MJPEG elementary
//! stream. Frames are flattened over an opaque background before encoding
//! since JPEG has no alpha channel.

use std::io::Write;

use crate::{
    error::{MovieError, MovieResult},
    surface::FrameRgba,
};

/// Sink for rendered frames, consumed strictly in frame order.
pub trait FrameEncoder {
    /// Encode one frame and commit its bytes before returning. The driver
    /// relies on this: frame N is fully written before frame N+1 renders.
    fn encode_frame(&mut self, frame: &FrameRgba) -> MovieResult<()>;

    fn finish(self) -> MovieResult<()>
    where
        Self: Sized;
}

#[derive(Clone, Debug)]
pub struct MjpegConfig {
    pub width: u32,
    pub height: u32,
    /// JPEG quality, 1..=100.
    pub quality: u8,
    /// Background flattened under translucent pixels.
    pub background: [u8; 3],
}

impl MjpegConfig {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            quality: 90,
            background: [0, 0, 0],
        }
    }

    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality;
        self
    }

    pub fn validate(&self) -> MovieResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(MovieError::validation(
                "encode width/height must be non-zero",
            ));
        }
        if self.quality == 0 || self.quality > 100 {
            return Err(MovieError::validation("jpeg quality must be in 1..=100"));
        }
        Ok(())
    }
}

pub struct MjpegEncoder<W: Write> {
    cfg: MjpegConfig,
    writer: W,
    scratch: Vec<u8>,
}

impl<W: Write> MjpegEncoder<W> {
    pub fn new(cfg: MjpegConfig, writer: W) -> MovieResult<Self> {
        cfg.validate()?;
        Ok(Self {
            scratch: vec![0u8; (cfg.width * cfg.height * 3) as usize],
            cfg,
            writer,
        })
    }
}

impl<W: Write> FrameEncoder for MjpegEncoder<W> {
    fn encode_frame(&mut self, frame: &FrameRgba) -> MovieResult<()> {
        if frame.width != self.cfg.width || frame.height != self.cfg.height {
            return Err(MovieError::validation(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width, frame.height, self.cfg.width, self.cfg.height
            )));
        }
        if frame.data.len() != self.scratch.len() / 3 * 4 {
            return Err(MovieError::validation(
                "frame.data size mismatch with width*height*4",
            ));
        }

        flatten_to_rgb8(
            &mut self.scratch,
            &frame.data,
            frame.premultiplied,
            self.cfg.background,
        )?;

        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut self.writer, self.cfg.quality)
            .encode(
                &self.scratch,
                self.cfg.width,
                self.cfg.height,
                image::ExtendedColorType::Rgb8,
            )
            .map_err(|e| MovieError::encode(format!("jpeg encode failed: {e}")))?;

        // Commit before the caller renders the next frame.
        self.writer.flush()?;
        Ok(())
    }

    fn finish(mut self) -> MovieResult<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Flatten RGBA8 over an opaque background, dropping the alpha channel.
fn flatten_to_rgb8(
    dst: &mut [u8],
    src: &[u8],
    src_is_premul: bool,
    bg: [u8; 3],
) -> MovieResult<()> {
    if dst.len() / 3 != src.len() / 4 || !dst.len().is_multiple_of(3) || !src.len().is_multiple_of(4)
    {
        return Err(MovieError::validation(
            "flatten_to_rgb8 expects matching rgba8/rgb8 buffers",
        ));
    }

    let bg_r = bg[0] as u16;
    let bg_g = bg[1] as u16;
    let bg_b = bg[2] as u16;

    for (d, s) in dst.chunks_exact_mut(3).zip(src.chunks_exact(4)) {
        let a = s[3] as u16;
        if a == 255 {
            d.copy_from_slice(&s[..3]);
            continue;
        }

        let inv = 255u16 - a;
        let (r, g, b) = if src_is_premul {
            (
                s[0] as u16 + mul_div255(bg_r, inv),
                s[1] as u16 + mul_div255(bg_g, inv),
                s[2] as u16 + mul_div255(bg_b, inv),
            )
        } else {
            (
                mul_div255(s[0] as u16, a) + mul_div255(bg_r, inv),
                mul_div255(s[1] as u16, a) + mul_div255(bg_g, inv),
                mul_div255(s[2] as u16, a) + mul_div255(bg_b, inv),
            )
        };

        d[0] = r.min(255) as u8;
        d[1] = g.min(255) as u8;
        d[2] = b.min(255) as u8;
    }

    Ok(())
}

fn mul_div255(x: u16, y: u16) -> u16 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u16
}

/// Count JPEG start-of-image markers in a byte stream. One per frame in a
/// well-formed MJPEG stream.
pub fn count_jpeg_frames(bytes: &[u8]) -> usize {
    bytes.windows(2).filter(|w| *w == [0xFF, 0xD8]).count()
}
