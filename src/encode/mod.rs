//! Output format capability: encode one frame, or stream an unbounded
//! sequence of frames as an animation.

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use crate::foundation::core::Frame;
use crate::foundation::error::ShadecastResult;

mod ansi;
mod gif;
mod raw;
mod still;

pub use ansi::AnsiDisplay;
pub use gif::{Gif, gif_delay_units};
pub use raw::{Rgb24, Rgba32};
pub use still::{Jpeg, Png};

/// A frame encoder bound to one output session.
///
/// Implementations are stateless or minimally stateful (e.g. "first frame
/// emitted yet"); one instance handles one output session.
pub trait Format: Send {
    /// Filename suffixes this format claims for auto-detection. May be
    /// empty for formats that must be selected explicitly.
    fn extensions(&self) -> &'static [&'static str];

    /// Write exactly one self-contained representation of `frame` to
    /// `sink`. Must not assume more data follows.
    fn encode(&mut self, sink: &mut dyn Write, frame: &Frame) -> ShadecastResult<()>;

    /// Consume a single-pass frame sequence and write an animated
    /// representation paced at `interval`.
    ///
    /// The default repeats single-frame encoding in sequence order, which
    /// is correct for concatenation-safe containers. Terminates when the
    /// input ends or on the first failure, without consuming further
    /// input.
    fn encode_animation(
        &mut self,
        sink: &mut dyn Write,
        frames: &mut dyn Iterator<Item = Frame>,
        interval: Duration,
    ) -> ShadecastResult<()> {
        let _ = interval;
        for frame in frames {
            self.encode(sink, &frame)?;
        }
        Ok(())
    }
}

/// Registered format names, in the order they are listed to users.
pub const FORMAT_NAMES: &[&str] = &["png", "jpg", "rgb24", "rgba32", "gif", "ansi"];

/// Construct a format by registry name.
pub fn by_name(name: &str) -> Option<Box<dyn Format>> {
    match name {
        "png" => Some(Box::new(Png)),
        "jpg" => Some(Box::new(Jpeg)),
        "rgb24" => Some(Box::new(Rgb24)),
        "rgba32" => Some(Box::new(Rgba32)),
        "gif" => Some(Box::new(Gif::new())),
        "ansi" => Some(Box::new(AnsiDisplay::new())),
        _ => None,
    }
}

/// Auto-detect a format from a filename extension.
///
/// Formats with empty extension lists (raw dumps, terminal display) are
/// never detected and must be selected explicitly.
pub fn detect_format(path: &str) -> Option<Box<dyn Format>> {
    let ext = Path::new(path).extension()?.to_str()?.to_ascii_lowercase();
    FORMAT_NAMES
        .iter()
        .filter_map(|name| by_name(name))
        .find(|f| f.extensions().contains(&ext.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::core::Geometry;

    fn solid(w: u32, h: u32, rgba: [u8; 4]) -> Frame {
        let g = Geometry::new(w, h).unwrap();
        Frame::from_rgba8(g, rgba.repeat(g.pixels())).unwrap()
    }

    #[test]
    fn every_registered_name_constructs() {
        for name in FORMAT_NAMES {
            assert!(by_name(name).is_some(), "format {name} did not construct");
        }
        assert!(by_name("webm").is_none());
    }

    #[test]
    fn detects_by_extension_case_insensitively() {
        assert_eq!(detect_format("out.png").unwrap().extensions(), ["png"]);
        assert_eq!(detect_format("out.GIF").unwrap().extensions(), ["gif"]);
        assert_eq!(
            detect_format("shot.JPEG").unwrap().extensions(),
            ["jpg", "jpeg"]
        );
        assert!(detect_format("out.bin").is_none());
        assert!(detect_format("no_extension").is_none());
    }

    #[test]
    fn default_animation_is_concatenation_of_encodes() {
        let frames = vec![
            solid(2, 2, [10, 20, 30, 255]),
            solid(2, 2, [40, 50, 60, 255]),
            solid(2, 2, [70, 80, 90, 255]),
        ];

        let mut expected = Vec::new();
        let mut fmt = Rgb24;
        for f in &frames {
            fmt.encode(&mut expected, f).unwrap();
        }

        let mut streamed = Vec::new();
        let mut fmt = Rgb24;
        fmt.encode_animation(
            &mut streamed,
            &mut frames.into_iter(),
            Duration::from_millis(33),
        )
        .unwrap();

        assert_eq!(streamed, expected);
    }

    #[test]
    fn animation_stops_at_first_write_failure() {
        struct FailAfter(usize);
        impl Write for FailAfter {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                if self.0 == 0 {
                    return Err(std::io::Error::other("sink full"));
                }
                self.0 -= 1;
                Ok(buf.len())
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let mut consumed = 0usize;
        let frames = std::iter::repeat_with(|| {
            consumed += 1;
            solid(2, 2, [1, 2, 3, 255])
        });

        let mut sink = FailAfter(1);
        let mut fmt = Rgb24;
        let err = fmt
            .encode_animation(&mut sink, &mut frames.take(100), Duration::ZERO)
            .unwrap_err();
        assert!(err.to_string().contains("sink full"));
        // One frame written, one pulled for the failing write, no more.
        assert_eq!(consumed, 2);
    }
}
