//! Headerless raw pixel dumps, for piping into `ledcat`-style consumers.

use std::io::Write;

use crate::encode::Format;
use crate::foundation::core::Frame;
use crate::foundation::error::ShadecastResult;

/// Interleaved 8-bit RGB, row-major, top-to-bottom, no header.
pub struct Rgb24;

impl Format for Rgb24 {
    fn extensions(&self) -> &'static [&'static str] {
        &[]
    }

    fn encode(&mut self, sink: &mut dyn Write, frame: &Frame) -> ShadecastResult<()> {
        let mut buf = Vec::with_capacity(frame.data().len() / 4 * 3);
        for px in frame.data().chunks_exact(4) {
            buf.extend_from_slice(&px[..3]);
        }
        sink.write_all(&buf)?;
        Ok(())
    }
}

/// Interleaved 8-bit RGBA, row-major, top-to-bottom, no header.
///
/// Frames are already in direct RGBA memory layout, so this is a byte-exact
/// dump of the frame buffer.
pub struct Rgba32;

impl Format for Rgba32 {
    fn extensions(&self) -> &'static [&'static str] {
        &[]
    }

    fn encode(&mut self, sink: &mut dyn Write, frame: &Frame) -> ShadecastResult<()> {
        sink.write_all(frame.data())?;
        Ok(())
    }
}
