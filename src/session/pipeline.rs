use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, mpsc};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::encode::Format;
use crate::foundation::core::Frame;
use crate::foundation::error::{ShadecastError, ShadecastResult};
use crate::render::Renderer;

/// Shared cooperative cancellation signal.
///
/// Cancellation is observed by the producer between frames; there is no
/// preemption mid-frame. Sources: an external interrupt, the frame limit,
/// or an encoder failure.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create an unsignalled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether cancellation has been signalled.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Session options.
#[derive(Clone, Copy, Debug, Default)]
pub struct PipelineOpts {
    /// Target duration between frames. `None` renders a single frame with
    /// no concurrency.
    pub interval: Option<Duration>,
    /// Stop after this many frames. `None` runs until cancelled.
    pub frame_limit: Option<u64>,
}

/// Counters reported after a session ends.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Frames the producer rendered.
    pub frames_rendered: u64,
    /// Frames forwarded to the encoder.
    pub frames_encoded: u64,
}

/// One rendering session: a renderer, a format, and the pacing/limit
/// configuration. Lifetime is one invocation; nothing persists across
/// runs.
pub struct Pipeline {
    renderer: Box<dyn Renderer>,
    format: Box<dyn Format>,
    opts: PipelineOpts,
}

impl Pipeline {
    /// Assemble a session.
    pub fn new(renderer: Box<dyn Renderer>, format: Box<dyn Format>, opts: PipelineOpts) -> Self {
        Self {
            renderer,
            format,
            opts,
        }
    }

    /// Run the session to completion and report frame counters.
    ///
    /// In animation mode three stages run concurrently: the producer on
    /// the calling thread (the renderer keeps its thread affinity),
    /// pacing the renderer to the target interval, a
    /// limiter/instrumentation stage, and the encoder. All stages are
    /// guaranteed to have terminated when this returns.
    pub fn run(
        &mut self,
        sink: &mut (dyn Write + Send),
        cancel: &CancelToken,
    ) -> ShadecastResult<PipelineStats> {
        match self.opts.interval {
            None => {
                let frame = self.renderer.produce_frame()?;
                self.format.encode(sink, &frame)?;
                Ok(PipelineStats {
                    frames_rendered: 1,
                    frames_encoded: 1,
                })
            }
            Some(interval) => self.run_animation(interval, sink, cancel),
        }
    }

    fn run_animation(
        &mut self,
        interval: Duration,
        sink: &mut (dyn Write + Send),
        cancel: &CancelToken,
    ) -> ShadecastResult<PipelineStats> {
        if interval.is_zero() {
            return Err(ShadecastError::construct(
                "animation pacing interval must be positive",
            ));
        }
        if self.opts.frame_limit == Some(0) {
            return Ok(PipelineStats::default());
        }

        // The producer hand-off absorbs render jitter: sized to hold a
        // little over one second of frames.
        let capacity = (1.0 / interval.as_secs_f64()).ceil() as usize + 1;
        let frame_limit = self.opts.frame_limit;
        let format = self.format.as_mut();
        let renderer = self.renderer.as_mut();

        std::thread::scope(|scope| -> ShadecastResult<PipelineStats> {
            let (frame_tx, frame_rx) = mpsc::sync_channel::<Frame>(capacity);
            let (enc_tx, enc_rx) = mpsc::sync_channel::<Frame>(0);

            let enc_cancel = cancel.clone();
            let encoder = scope.spawn(move || -> ShadecastResult<()> {
                let mut frames = enc_rx.iter();
                let res = format.encode_animation(sink, &mut frames, interval);
                if res.is_err() {
                    enc_cancel.cancel();
                    // Keep consuming until end-of-stream so the upstream
                    // stages can never block forever on a full hand-off.
                    for _ in frames {}
                }
                res
            });

            let lim_cancel = cancel.clone();
            let limiter = scope.spawn(move || -> u64 {
                let mut forwarded: u64 = 0;
                let mut last_frame = Instant::now();
                for frame in frame_rx.iter() {
                    let render_time = last_frame.elapsed();
                    last_frame = Instant::now();
                    let fps = 1.0 / render_time.as_secs_f64();
                    let speed = interval.as_secs_f64() / render_time.as_secs_f64();

                    if enc_tx.send(frame).is_err() {
                        // Encoder bailed; cancellation is already signalled.
                        break;
                    }
                    forwarded += 1;
                    debug!(frame = forwarded, fps, speed, "frame forwarded");

                    if Some(forwarded) == frame_limit {
                        lim_cancel.cancel();
                        break;
                    }
                }
                forwarded
                // Dropping enc_tx here closes the encoder's input.
            });

            // Producer: drive the renderer at the requested cadence until
            // cancellation is observed or a stage downstream hangs up.
            // Blocks on a full hand-off for backpressure against a slow
            // encoder.
            let mut rendered: u64 = 0;
            let mut render_err = None;
            let mut last_frame = Instant::now();
            while !cancel.is_cancelled() {
                match renderer.produce_frame() {
                    Ok(frame) => {
                        rendered += 1;
                        if frame_tx.send(frame).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        cancel.cancel();
                        render_err = Some(e);
                        break;
                    }
                }
                // Sleep whatever remains of the interval after the time
                // spent rendering, so frames enter the hand-off in
                // wall-clock time.
                if let Some(remaining) = interval.checked_sub(last_frame.elapsed()) {
                    std::thread::sleep(remaining);
                }
                last_frame = Instant::now();
            }
            drop(frame_tx);

            let frames_encoded = limiter
                .join()
                .map_err(|_| ShadecastError::encode("limiter stage panicked"))?;
            let encode_res = encoder
                .join()
                .map_err(|_| ShadecastError::encode("encoder stage panicked"))?;

            if let Some(e) = render_err {
                return Err(e);
            }
            encode_res?;
            Ok(PipelineStats {
                frames_rendered: rendered,
                frames_encoded,
            })
        })
    }

    /// Release the renderer and the resource providers it owns. Called
    /// after `run`, once every stage has finished.
    pub fn shutdown(mut self) -> ShadecastResult<()> {
        self.renderer.close()
    }
}
