//! Still-image containers backed by the `image` crate. Animation falls back
//! to repeated single-frame encoding (motion-JPEG-style concatenation).

use std::io::{Cursor, Write};

use image::{ExtendedColorType, ImageEncoder as _};

use crate::encode::Format;
use crate::foundation::core::Frame;
use crate::foundation::error::{ShadecastError, ShadecastResult};

/// PNG, one image per frame.
pub struct Png;

impl Format for Png {
    fn extensions(&self) -> &'static [&'static str] {
        &["png"]
    }

    fn encode(&mut self, sink: &mut dyn Write, frame: &Frame) -> ShadecastResult<()> {
        // Encode into memory first so a partially written image never
        // reaches the sink on encoder failure.
        let mut buf = Vec::new();
        image::codecs::png::PngEncoder::new(&mut buf)
            .write_image(
                frame.data(),
                frame.width(),
                frame.height(),
                ExtendedColorType::Rgba8,
            )
            .map_err(|e| ShadecastError::encode(format!("png encode failed: {e}")))?;
        sink.write_all(&buf)?;
        Ok(())
    }
}

/// JPEG, one image per frame. Alpha is dropped; JPEG has no alpha channel.
pub struct Jpeg;

impl Format for Jpeg {
    fn extensions(&self) -> &'static [&'static str] {
        &["jpg", "jpeg"]
    }

    fn encode(&mut self, sink: &mut dyn Write, frame: &Frame) -> ShadecastResult<()> {
        let mut rgb = Vec::with_capacity(frame.data().len() / 4 * 3);
        for px in frame.data().chunks_exact(4) {
            rgb.extend_from_slice(&px[..3]);
        }

        let mut buf = Cursor::new(Vec::new());
        image::codecs::jpeg::JpegEncoder::new(&mut buf)
            .write_image(
                &rgb,
                frame.width(),
                frame.height(),
                ExtendedColorType::Rgb8,
            )
            .map_err(|e| ShadecastError::encode(format!("jpeg encode failed: {e}")))?;
        sink.write_all(buf.get_ref())?;
        Ok(())
    }
}
