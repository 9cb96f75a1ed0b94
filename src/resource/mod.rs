//! Live external data sources that inject per-frame values into the
//! renderer's uniform table.

use std::collections::HashMap;
use std::sync::{LazyLock, RwLock};

use crate::foundation::error::{ShadecastError, ShadecastResult};
use crate::render::{RenderState, TextureUnit};

pub mod camera;
pub mod sensor;

pub use camera::{CameraDriver, DepthCamera, DriverHandle};
pub use sensor::{MotionSensor, SensorReading};

/// A live external data source bound to a set of shader uniforms.
///
/// Providers own a background refresh loop; the render thread only ever
/// touches the provider through [`ResourceProvider::pre_render`], which
/// publishes the loop's most recent snapshot.
pub trait ResourceProvider: Send {
    /// The uniform declarations this provider populates, namespaced by its
    /// mapping name, so the compiled program exposes matching symbols.
    fn uniform_source(&self) -> String;

    /// Push the current snapshot into the bound uniform locations, once
    /// per frame before the program executes. Uniforms absent from the
    /// compiled program are skipped. Never performs I/O; the critical
    /// section on the snapshot lock is as short as possible.
    fn pre_render(&mut self, state: &mut RenderState);

    /// Signal the background loop to stop and block until it has
    /// acknowledged shutdown, then release device handles. Invoked once by
    /// the owner; returns immediately when the loop never started.
    fn close(&mut self) -> ShadecastResult<()>;
}

/// One declared external resource from the shader's `#pragma map`
/// directives: `#pragma map <name>=<kind>:<value>`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mapping {
    /// The uniform-name prefix the provider publishes under.
    pub name: String,
    /// The registered provider kind, e.g. `"sensor"`.
    pub kind: String,
    /// Provider-specific address: a device index, a URL.
    pub value: String,
}

impl Mapping {
    /// Parse the body of one directive, `<name>=<kind>:<value>`.
    pub fn parse(body: &str) -> ShadecastResult<Self> {
        let parse = || {
            let (name, rest) = body.split_once('=')?;
            let (kind, value) = rest.split_once(':')?;
            if name.is_empty() || kind.is_empty() {
                return None;
            }
            Some(Mapping {
                name: name.to_owned(),
                kind: kind.to_owned(),
                value: value.to_owned(),
            })
        };
        parse().ok_or_else(|| {
            ShadecastError::construct(format!(
                "unable to parse mapping directive: {body:?}, expected name=kind:value"
            ))
        })
    }

    /// Scan shader source for `#pragma map` directives.
    pub fn extract(shader_source: &str) -> ShadecastResult<Vec<Self>> {
        shader_source
            .lines()
            .filter_map(|line| line.trim().strip_prefix("#pragma map "))
            .map(|body| Self::parse(body.trim()))
            .collect()
    }
}

/// Constructor registered for a provider kind. Receives the mapping and a
/// texture slot allocator.
pub type ResourceCtor =
    fn(&Mapping, TextureAllocatorFn<'_>) -> ShadecastResult<Box<dyn ResourceProvider>>;

/// Borrowed texture allocator callback, as passed to constructors.
pub type TextureAllocatorFn<'a> = &'a mut dyn FnMut() -> TextureUnit;

static REGISTRY: LazyLock<RwLock<HashMap<&'static str, ResourceCtor>>> = LazyLock::new(|| {
    let mut map: HashMap<&'static str, ResourceCtor> = HashMap::new();
    map.insert("sensor", sensor::construct);
    map.insert("camera", camera::construct);
    RwLock::new(map)
});

/// Register a provider kind. Registration happens at process start;
/// kinds are never unregistered.
pub fn register_resource_kind(kind: &'static str, ctor: ResourceCtor) {
    let mut registry = REGISTRY.write().unwrap_or_else(|e| e.into_inner());
    registry.insert(kind, ctor);
}

/// Construct the provider for one declared mapping. Unknown kinds and
/// unreachable resources abort session setup.
pub fn construct(
    mapping: &Mapping,
    alloc: TextureAllocatorFn<'_>,
) -> ShadecastResult<Box<dyn ResourceProvider>> {
    let ctor = {
        let registry = REGISTRY.read().unwrap_or_else(|e| e.into_inner());
        registry.get(mapping.kind.as_str()).copied()
    };
    match ctor {
        Some(ctor) => ctor(mapping, alloc),
        None => Err(ShadecastError::construct(format!(
            "unknown resource kind: {:?}",
            mapping.kind
        ))),
    }
}

/// Lock a mutex, recovering the data from a poisoned lock.
///
/// Snapshot writers only replace whole values under the lock, so a panic
/// on another thread cannot leave a torn snapshot behind.
pub(crate) fn lock_snapshot<T>(mutex: &std::sync::Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
