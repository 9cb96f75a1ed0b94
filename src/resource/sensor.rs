//! Networked motion sensor polled over HTTP.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::warn;

use crate::foundation::error::{ShadecastError, ShadecastResult};
use crate::render::{RenderState, UniformValue};
use crate::resource::{
    Mapping, ResourceProvider, TextureAllocatorFn, lock_snapshot,
};

/// How often the background loop polls the endpoint, independent of the
/// render frame rate.
pub const POLL_PERIOD: Duration = Duration::from_millis(100);

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// One decoded reading from the sensor endpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Deserialize)]
pub struct SensorReading {
    /// Linear acceleration, m/s².
    #[serde(rename = "accel")]
    pub acceleration: [f32; 3],
    /// Angular velocity.
    pub gyro: [f32; 3],
    /// Magnetic field vector.
    #[serde(rename = "mag")]
    pub magnetometer: [f32; 3],
    /// Orientation quaternion.
    #[serde(rename = "game_quat")]
    pub quaternion: [f32; 4],
    /// Shake event flag.
    #[serde(default)]
    pub shake: bool,
}

/// A motion sensor polled over HTTP on a fixed period.
///
/// The current reading is the last successfully decoded response; fetch
/// failures are logged and the previous snapshot retained, so the render
/// path never observes an error from this provider.
pub struct MotionSensor {
    prefix: String,
    current: Arc<Mutex<SensorReading>>,
    closed: Arc<AtomicBool>,
    poll_loop: Option<JoinHandle<()>>,
}

impl MotionSensor {
    /// Connect to `url` with the default [`POLL_PERIOD`].
    ///
    /// Performs one synchronous fetch so an unreachable endpoint fails the
    /// session setup instead of rendering stale zeros forever.
    pub fn connect(prefix: impl Into<String>, url: impl Into<String>) -> ShadecastResult<Self> {
        Self::connect_with_period(prefix, url, POLL_PERIOD)
    }

    /// Connect with an explicit poll period.
    pub fn connect_with_period(
        prefix: impl Into<String>,
        url: impl Into<String>,
        period: Duration,
    ) -> ShadecastResult<Self> {
        let url = url.into();
        let client = reqwest::blocking::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| ShadecastError::construct(format!("http client setup failed: {e}")))?;

        let first = fetch(&client, &url)
            .map_err(|e| ShadecastError::construct(format!("sensor at {url} unreachable: {e}")))?;

        let current = Arc::new(Mutex::new(first));
        let closed = Arc::new(AtomicBool::new(false));
        let poll_loop = {
            let current = Arc::clone(&current);
            let closed = Arc::clone(&closed);
            std::thread::spawn(move || {
                while !closed.load(Ordering::Acquire) {
                    match fetch(&client, &url) {
                        Ok(reading) => *lock_snapshot(&current) = reading,
                        Err(e) => warn!(url = %url, error = %e, "sensor fetch failed, keeping previous reading"),
                    }
                    std::thread::sleep(period);
                }
            })
        };

        Ok(Self {
            prefix: prefix.into(),
            current,
            closed,
            poll_loop: Some(poll_loop),
        })
    }

    /// The most recent snapshot.
    pub fn reading(&self) -> SensorReading {
        *lock_snapshot(&self.current)
    }
}

fn fetch(client: &reqwest::blocking::Client, url: &str) -> ShadecastResult<SensorReading> {
    let response = client
        .get(url)
        .send()
        .and_then(|r| r.error_for_status())
        .map_err(|e| ShadecastError::fetch(e.to_string()))?;
    response
        .json::<SensorReading>()
        .map_err(|e| ShadecastError::fetch(format!("bad sensor payload: {e}")))
}

impl ResourceProvider for MotionSensor {
    fn uniform_source(&self) -> String {
        let p = &self.prefix;
        format!(
            "uniform vec3 {p}Acceleration;\
             uniform vec3 {p}Gyro;\
             uniform vec3 {p}Magnetometer;\
             uniform vec4 {p}Quaternion;\
             uniform bool {p}Shake;"
        )
    }

    fn pre_render(&mut self, state: &mut RenderState) {
        // Copy the snapshot out under the lock; the uniform writes happen
        // outside the critical section.
        let reading = *lock_snapshot(&self.current);

        let p = &self.prefix;
        state.set_uniform(
            &format!("{p}Acceleration"),
            UniformValue::Vec3(reading.acceleration),
        );
        state.set_uniform(&format!("{p}Gyro"), UniformValue::Vec3(reading.gyro));
        state.set_uniform(
            &format!("{p}Magnetometer"),
            UniformValue::Vec3(reading.magnetometer),
        );
        state.set_uniform(
            &format!("{p}Quaternion"),
            UniformValue::Vec4(reading.quaternion),
        );
        state.set_uniform(&format!("{p}Shake"), UniformValue::Bool(reading.shake));
    }

    fn close(&mut self) -> ShadecastResult<()> {
        self.closed.store(true, Ordering::Release);
        if let Some(handle) = self.poll_loop.take() {
            handle
                .join()
                .map_err(|_| ShadecastError::device("sensor poll loop panicked"))?;
        }
        Ok(())
    }
}

pub(crate) fn construct(
    mapping: &Mapping,
    _alloc: TextureAllocatorFn<'_>,
) -> ShadecastResult<Box<dyn ResourceProvider>> {
    Ok(Box::new(MotionSensor::connect(
        &mapping.name,
        &mapping.value,
    )?))
}
