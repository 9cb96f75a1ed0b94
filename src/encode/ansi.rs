//! True-color terminal display using half-block glyphs.

use std::fmt::Write as _;
use std::io::Write;
use std::time::{Duration, Instant};

use crate::encode::Format;
use crate::foundation::core::Frame;
use crate::foundation::error::ShadecastResult;

/// Draws frames in place in a true-color terminal.
///
/// Two vertically adjacent source rows are rendered per character cell
/// using the upper half block glyph: the top pixel colors the foreground,
/// the bottom pixel the background. This renders square pixels at twice
/// the density of full-cell output.
pub struct AnsiDisplay {
    init_done: bool,
    last_frame: Instant,
}

impl AnsiDisplay {
    /// Create a display encoder for one terminal session.
    pub fn new() -> Self {
        Self {
            init_done: false,
            last_frame: Instant::now(),
        }
    }
}

impl Default for AnsiDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl Format for AnsiDisplay {
    fn extensions(&self) -> &'static [&'static str] {
        &[]
    }

    fn encode(&mut self, sink: &mut dyn Write, frame: &Frame) -> ShadecastResult<()> {
        let (width, height) = (frame.width(), frame.height());

        // Buffered so the frame reaches the terminal in a single write.
        let mut buf = String::new();
        if !self.init_done {
            // Clear the screen and any previous frame with it.
            buf.push_str("\x1b[3J\x1b[H\x1b[2J");
            self.init_done = true;
        } else {
            // Move the cursor to the top-left without clearing so the new
            // frame overdraws the previous one in place.
            buf.push_str("\x1b[1;1H");
        }

        for y in 0..height / 2 + (height & 1) {
            for x in 0..width {
                let [r, g, b, _] = frame.pixel(x, y * 2);
                let _ = write!(buf, "\x1b[38;2;{r};{g};{b}m");
                if y * 2 + 1 < height {
                    let [r, g, b, _] = frame.pixel(x, y * 2 + 1);
                    let _ = write!(buf, "\x1b[48;2;{r};{g};{b}m");
                } else {
                    // Odd final row: pair the half block with black.
                    buf.push_str("\x1b[48;2;0;0;0m");
                }
                buf.push('\u{2580}');
            }
            // Reset styling before the newline so nothing bleeds into the
            // terminal chrome.
            buf.push_str("\x1b[0m\n");
        }
        sink.write_all(buf.as_bytes())?;
        Ok(())
    }

    fn encode_animation(
        &mut self,
        sink: &mut dyn Write,
        frames: &mut dyn Iterator<Item = Frame>,
        interval: Duration,
    ) -> ShadecastResult<()> {
        self.last_frame = Instant::now();
        for frame in frames {
            self.encode(sink, &frame)?;

            // Cap the wall-clock frame rate: sleep whatever remains of the
            // interval after the time already spent since the last frame.
            let elapsed = self.last_frame.elapsed();
            if let Some(remaining) = interval.checked_sub(elapsed) {
                std::thread::sleep(remaining);
            }
            self.last_frame = Instant::now();
        }
        Ok(())
    }
}
