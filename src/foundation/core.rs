use std::time::Duration;

use crate::foundation::error::{ShadecastError, ShadecastResult};

/// Output dimensions in pixels, both non-zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Geometry {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Geometry {
    /// Create a validated geometry.
    pub fn new(width: u32, height: u32) -> ShadecastResult<Self> {
        if width == 0 || height == 0 {
            return Err(ShadecastError::construct(format!(
                "no geometry dimension can be 0, got ({width}, {height})"
            )));
        }
        Ok(Self { width, height })
    }

    /// Total pixel count.
    pub fn pixels(self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// One rendered image as straight-alpha RGBA8 pixels.
///
/// Frames are immutable once produced: the renderer creates one per
/// invocation, the pipeline moves it downstream, and the encoder consumes
/// it. Row-major, top-to-bottom, tightly packed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Frame {
    /// Wrap an RGBA8 buffer; `data.len()` must equal `width * height * 4`.
    pub fn from_rgba8(geometry: Geometry, data: Vec<u8>) -> ShadecastResult<Self> {
        if data.len() != geometry.pixels() * 4 {
            return Err(ShadecastError::construct(format!(
                "frame buffer size mismatch: got {} bytes, expected {} for {}x{}",
                data.len(),
                geometry.pixels() * 4,
                geometry.width,
                geometry.height,
            )));
        }
        Ok(Self {
            width: geometry.width,
            height: geometry.height,
            data,
        })
    }

    /// Frame width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Frame height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// The raw RGBA8 bytes, row-major.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The RGBA pixel at `(x, y)`.
    ///
    /// Callers stay in bounds; the encoders iterate the frame's own
    /// dimensions.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        [
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ]
    }
}

/// Target wall-clock duration between successive frames for `fps` frames
/// per second.
pub fn interval_for_fps(fps: f64) -> ShadecastResult<Duration> {
    if !fps.is_finite() || fps <= 0.0 {
        return Err(ShadecastError::construct(format!(
            "framerate must be a positive number, got {fps}"
        )));
    }
    Ok(Duration::from_secs_f64(1.0 / fps))
}

/// Convert a wall-clock duration limit into a frame-count limit at the
/// given rate (duration × rate).
pub fn frame_limit_for_duration(seconds: u64, fps: f64) -> u64 {
    (seconds as f64 * fps) as u64
}
