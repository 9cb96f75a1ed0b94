//! Depth/color camera provider fed by hardware driver callbacks.
//!
//! The driver runs its own event loop and calls back with color and depth
//! buffers on a thread we do not own. Callbacks carry an opaque handle;
//! dispatch back into the owning provider instance goes through a
//! process-wide registry keyed by that handle rather than through global
//! mutable fields.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, LazyLock, Mutex};
use std::thread::JoinHandle;

use tracing::warn;

use crate::foundation::core::{Frame, Geometry};
use crate::foundation::error::{ShadecastError, ShadecastResult};
use crate::render::{RenderState, TextureUnit, UniformValue};
use crate::resource::{
    Mapping, ResourceProvider, TextureAllocatorFn, lock_snapshot,
};

/// Fixed capture resolution of the camera stream.
pub const RESOLUTION: Geometry = Geometry {
    width: 640,
    height: 480,
};

/// The sensor reports 11-bit depth values.
const DEPTH_RANGE: usize = 2048;

/// Opaque per-instance handle passed through the driver and back.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DriverHandle(pub u64);

/// The device driver boundary.
///
/// `start` begins the color and depth streams; the driver then delivers
/// buffers through [`dispatch_color`] and [`dispatch_depth`] whenever
/// [`CameraDriver::process_events`] pumps its event loop. `stop` performs
/// the ordered teardown: stop the depth stream, stop the color stream,
/// close the device, shut down the driver context.
pub trait CameraDriver: Send {
    /// Begin streaming, tagging callbacks with `handle`.
    fn start(&mut self, handle: DriverHandle) -> ShadecastResult<()>;

    /// Pump pending driver events, blocking briefly.
    fn process_events(&mut self) -> ShadecastResult<()>;

    /// Ordered device teardown.
    fn stop(&mut self);
}

/// Constructor for a [`CameraDriver`], given the declared mapping (the
/// value carries a device index). Installed at process start by whichever
/// driver backend is linked in.
pub type DriverFactory = fn(&Mapping) -> ShadecastResult<Box<dyn CameraDriver>>;

static DRIVER_FACTORY: Mutex<Option<DriverFactory>> = Mutex::new(None);

/// Install the camera driver backend. Without one, constructing a camera
/// mapping fails at session setup.
pub fn install_driver_factory(factory: DriverFactory) {
    *lock_snapshot(&DRIVER_FACTORY) = Some(factory);
}

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

/// handle -> persistent RGBA image buffer of the owning instance.
static INSTANCES: LazyLock<Mutex<HashMap<u64, Arc<Mutex<Vec<u8>>>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// Alpha lookup over the sensor's depth value range, precomputed once:
/// nearer readings map to higher alpha.
static GAMMA: LazyLock<[u8; DEPTH_RANGE]> = LazyLock::new(|| {
    let mut lut = [0u8; DEPTH_RANGE];
    for (i, v) in lut.iter_mut().enumerate() {
        let a = i as f64 / DEPTH_RANGE as f64;
        let b = a.powi(3) * 6.0;
        *v = 255 - (b * 256.0).min(255.0) as u8;
    }
    lut
});

/// Driver callback: a new color frame. Rewrites the RGB channels of the
/// instance's image buffer under its snapshot lock.
pub fn dispatch_color(handle: DriverHandle, rgb: &[u8]) {
    let Some(image) = instance(handle) else {
        return;
    };
    let mut image = lock_snapshot(&image);
    for (px, src) in image.chunks_exact_mut(4).zip(rgb.chunks_exact(3)) {
        px[..3].copy_from_slice(src);
    }
}

/// Driver callback: a new depth frame. Rewrites the alpha channel through
/// the gamma lookup table under the snapshot lock.
pub fn dispatch_depth(handle: DriverHandle, depth: &[u16]) {
    let Some(image) = instance(handle) else {
        return;
    };
    let mut image = lock_snapshot(&image);
    for (px, &d) in image.chunks_exact_mut(4).zip(depth.iter()) {
        px[3] = GAMMA[(d as usize).min(DEPTH_RANGE - 1)];
    }
}

fn instance(handle: DriverHandle) -> Option<Arc<Mutex<Vec<u8>>>> {
    lock_snapshot(&INSTANCES).get(&handle.0).cloned()
}

/// A camera publishing a color image with depth-mapped alpha as a texture
/// uniform.
pub struct DepthCamera {
    uniform_name: String,
    unit: TextureUnit,
    handle: DriverHandle,
    image: Arc<Mutex<Vec<u8>>>,
    closed: Arc<AtomicBool>,
    event_loop: Option<JoinHandle<()>>,
}

impl DepthCamera {
    /// Register the instance for callback dispatch and start the driver's
    /// event loop on a background thread.
    pub fn open(
        uniform_name: impl Into<String>,
        unit: TextureUnit,
        mut driver: Box<dyn CameraDriver>,
    ) -> ShadecastResult<Self> {
        let handle = DriverHandle(NEXT_HANDLE.fetch_add(1, Ordering::Relaxed));
        let image = Arc::new(Mutex::new(vec![0u8; RESOLUTION.pixels() * 4]));
        lock_snapshot(&INSTANCES).insert(handle.0, Arc::clone(&image));

        let closed = Arc::new(AtomicBool::new(false));
        let event_loop = {
            let closed = Arc::clone(&closed);
            std::thread::spawn(move || {
                if let Err(e) = driver.start(handle) {
                    warn!(error = %e, "camera stream start failed");
                    driver.stop();
                    return;
                }
                while !closed.load(Ordering::Acquire) {
                    if let Err(e) = driver.process_events() {
                        // The loop ends early; the session continues on the
                        // stale snapshot.
                        warn!(error = %e, "camera event loop failed");
                        break;
                    }
                }
                driver.stop();
            })
        };

        Ok(Self {
            uniform_name: uniform_name.into(),
            unit,
            handle,
            image,
            closed,
            event_loop: Some(event_loop),
        })
    }

    /// The dispatch handle of this instance.
    pub fn handle(&self) -> DriverHandle {
        self.handle
    }
}

impl ResourceProvider for DepthCamera {
    fn uniform_source(&self) -> String {
        let n = &self.uniform_name;
        format!("uniform sampler2D {n};uniform vec3 {n}Size;")
    }

    fn pre_render(&mut self, state: &mut RenderState) {
        // Copy the buffer out under the lock; uniform writes happen after
        // the critical section ends.
        let pixels = lock_snapshot(&self.image).clone();
        let Ok(frame) = Frame::from_rgba8(RESOLUTION, pixels) else {
            return;
        };

        state.set_uniform(
            &self.uniform_name,
            UniformValue::Image {
                unit: self.unit,
                pixels: Arc::new(frame),
            },
        );
        state.set_uniform(
            &format!("{}Size", self.uniform_name),
            UniformValue::Vec3([RESOLUTION.width as f32, RESOLUTION.height as f32, 1.0]),
        );
    }

    fn close(&mut self) -> ShadecastResult<()> {
        self.closed.store(true, Ordering::Release);
        if let Some(handle) = self.event_loop.take() {
            handle
                .join()
                .map_err(|_| ShadecastError::device("camera event loop panicked"))?;
        }
        lock_snapshot(&INSTANCES).remove(&self.handle.0);
        Ok(())
    }
}

pub(crate) fn construct(
    mapping: &Mapping,
    alloc: TextureAllocatorFn<'_>,
) -> ShadecastResult<Box<dyn ResourceProvider>> {
    let factory: Option<DriverFactory> = *lock_snapshot(&DRIVER_FACTORY);
    let factory = factory.ok_or_else(|| {
        ShadecastError::construct("no camera driver installed in this build")
    })?;
    let driver = factory(mapping)?;
    Ok(Box::new(DepthCamera::open(
        &mapping.name,
        alloc(),
        driver,
    )?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    /// Driver that publishes solid color frames with an incrementing
    /// brightness on every pump.
    struct StrobeDriver {
        handle: Option<DriverHandle>,
        counter: Arc<AtomicUsize>,
        stopped: Arc<AtomicBool>,
        pump_delay: Duration,
    }

    impl CameraDriver for StrobeDriver {
        fn start(&mut self, handle: DriverHandle) -> ShadecastResult<()> {
            self.handle = Some(handle);
            Ok(())
        }

        fn process_events(&mut self) -> ShadecastResult<()> {
            let handle = self.handle.expect("started");
            let v = (self.counter.fetch_add(1, Ordering::SeqCst) % 256) as u8;
            dispatch_color(handle, &[v].repeat(RESOLUTION.pixels() * 3));
            std::thread::sleep(self.pump_delay);
            Ok(())
        }

        fn stop(&mut self) {
            self.stopped.store(true, Ordering::SeqCst);
        }
    }

    fn open_strobe(pump_delay: Duration) -> (DepthCamera, Arc<AtomicUsize>, Arc<AtomicBool>) {
        let counter = Arc::new(AtomicUsize::new(0));
        let stopped = Arc::new(AtomicBool::new(false));
        let camera = DepthCamera::open(
            "cam",
            TextureUnit(0),
            Box::new(StrobeDriver {
                handle: None,
                counter: counter.clone(),
                stopped: stopped.clone(),
                pump_delay,
            }),
        )
        .unwrap();
        (camera, counter, stopped)
    }

    fn snapshot_pixels(camera: &mut DepthCamera) -> Arc<Frame> {
        let mut state = RenderState::new();
        state.declare_source(&camera.uniform_source());
        camera.pre_render(&mut state);
        match state.uniform("cam") {
            Some(UniformValue::Image { pixels, .. }) => Arc::clone(pixels),
            other => panic!("expected image uniform, got {other:?}"),
        }
    }

    #[test]
    fn snapshots_are_never_torn_under_rapid_writes() {
        let (mut camera, counter, _) = open_strobe(Duration::ZERO);

        // Wait for the writer to publish at least one frame.
        while counter.load(Ordering::SeqCst) == 0 {
            std::thread::yield_now();
        }

        for _ in 0..50 {
            let frame = snapshot_pixels(&mut camera);
            let first = frame.pixel(0, 0);
            for px in frame.data().chunks_exact(4) {
                assert_eq!(
                    &px[..3],
                    &first[..3],
                    "observed a partially written snapshot"
                );
            }
        }

        camera.close().unwrap();
    }

    #[test]
    fn close_blocks_until_the_loop_acknowledges_and_tears_down() {
        let (mut camera, _, stopped) = open_strobe(Duration::from_millis(10));
        let handle = camera.handle();

        assert!(!stopped.load(Ordering::SeqCst));
        camera.close().unwrap();
        assert!(
            stopped.load(Ordering::SeqCst),
            "close returned before the driver teardown ran"
        );
        assert!(instance(handle).is_none(), "instance not unregistered");
    }

    #[test]
    fn depth_maps_through_the_gamma_lut_into_alpha() {
        let (mut camera, _, _) = open_strobe(Duration::from_millis(5));
        let handle = camera.handle();

        dispatch_depth(handle, &vec![0u16; RESOLUTION.pixels()]);
        assert_eq!(snapshot_pixels(&mut camera).pixel(0, 0)[3], 255);

        dispatch_depth(handle, &vec![2047u16; RESOLUTION.pixels()]);
        assert_eq!(snapshot_pixels(&mut camera).pixel(0, 0)[3], 0);

        camera.close().unwrap();
    }

    #[test]
    fn gamma_lut_is_monotonically_darker_with_distance() {
        assert_eq!(GAMMA[0], 255);
        assert_eq!(GAMMA[DEPTH_RANGE - 1], 0);
        for pair in GAMMA.windows(2) {
            assert!(pair[0] >= pair[1]);
        }
    }

    #[test]
    fn dispatch_to_unknown_handles_is_ignored() {
        dispatch_color(DriverHandle(u64::MAX), &[0; 3]);
        dispatch_depth(DriverHandle(u64::MAX), &[0; 1]);
    }

    #[test]
    fn construction_without_an_installed_driver_fails() {
        // The factory slot is process-wide; this test relies on no other
        // test installing one.
        let mapping = Mapping {
            name: "cam".into(),
            kind: "camera".into(),
            value: "0".into(),
        };
        let mut alloc = || TextureUnit(0);
        let err = construct(&mapping, &mut alloc).err().unwrap();
        assert!(err.to_string().contains("no camera driver installed"));
    }
}
