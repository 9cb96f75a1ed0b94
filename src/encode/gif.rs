//! Animated GIF encoding with a fixed web-safe palette.

use std::borrow::Cow;
use std::io::Write;
use std::time::Duration;

use gif::{DisposalMethod, Repeat};

use crate::encode::Format;
use crate::foundation::core::Frame;
use crate::foundation::error::{ShadecastError, ShadecastResult};

/// GIF container. Every frame is quantized to the same 256-color web-safe
/// palette; frames are composited with "replace with background" disposal
/// and the animation loops forever.
pub struct Gif {
    palette: Vec<u8>,
}

impl Gif {
    /// Create a GIF encoder for one output session.
    pub fn new() -> Self {
        Self {
            palette: web_safe_palette(),
        }
    }
}

impl Default for Gif {
    fn default() -> Self {
        Self::new()
    }
}

impl Format for Gif {
    fn extensions(&self) -> &'static [&'static str] {
        &["gif"]
    }

    fn encode(&mut self, sink: &mut dyn Write, frame: &Frame) -> ShadecastResult<()> {
        // Forward to the stream encoder for easy code reuse.
        self.encode_animation(
            sink,
            &mut std::iter::once(frame.clone()),
            Duration::ZERO,
        )
    }

    fn encode_animation(
        &mut self,
        sink: &mut dyn Write,
        frames: &mut dyn Iterator<Item = Frame>,
        interval: Duration,
    ) -> ShadecastResult<()> {
        let Some(first) = frames.next() else {
            return Ok(());
        };

        let delay = gif_delay_units(interval);
        let (width, height) = gif_dimensions(&first)?;
        let mut encoder =
            gif::Encoder::new(sink, width, height, &self.palette).map_err(gif_err)?;
        // Loop count unset means play once; the animation loops forever.
        encoder.set_repeat(Repeat::Infinite).map_err(gif_err)?;

        for frame in std::iter::once(first).chain(frames) {
            let (width, height) = gif_dimensions(&frame)?;
            let indexed: Vec<u8> = frame
                .data()
                .chunks_exact(4)
                .map(|px| web_safe_index(px[0], px[1], px[2]))
                .collect();
            encoder
                .write_frame(&gif::Frame {
                    width,
                    height,
                    buffer: Cow::Owned(indexed),
                    delay,
                    dispose: DisposalMethod::Background,
                    ..gif::Frame::default()
                })
                .map_err(gif_err)?;
        }
        Ok(())
    }
}

// The container stores dimensions as 16-bit fields.
fn gif_dimensions(frame: &Frame) -> ShadecastResult<(u16, u16)> {
    let (w, h) = (frame.width(), frame.height());
    if w > u16::MAX as u32 || h > u16::MAX as u32 {
        return Err(ShadecastError::encode(format!(
            "gif dimensions are limited to 65535, got {w}x{h}"
        )));
    }
    Ok((w as u16, h as u16))
}

fn gif_err(e: gif::EncodingError) -> ShadecastError {
    ShadecastError::encode(format!("gif encode failed: {e}"))
}

/// Convert a pacing interval to GIF's native 1/100-second delay unit,
/// truncating.
pub fn gif_delay_units(interval: Duration) -> u16 {
    (interval.as_millis() / 10).min(u16::MAX as u128) as u16
}

/// The standard 216-color web-safe cube (channel levels 0, 51, .. 255),
/// padded to 256 entries with a grayscale ramp.
fn web_safe_palette() -> Vec<u8> {
    let mut palette = Vec::with_capacity(256 * 3);
    for r in 0..6u16 {
        for g in 0..6u16 {
            for b in 0..6u16 {
                palette.extend_from_slice(&[(r * 51) as u8, (g * 51) as u8, (b * 51) as u8]);
            }
        }
    }
    for i in 0..40u16 {
        let v = (i * 255 / 39) as u8;
        palette.extend_from_slice(&[v, v, v]);
    }
    palette
}

/// Index of the nearest web-safe cube entry for an RGB pixel.
fn web_safe_index(r: u8, g: u8, b: u8) -> u8 {
    fn level(c: u8) -> u16 {
        ((c as u16 + 25) / 51).min(5)
    }
    (level(r) * 36 + level(g) * 6 + level(b)) as u8
}
