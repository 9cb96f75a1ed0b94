//! A deterministic software renderer used by the CLI and the pipeline
//! tests. GPU shader execution plugs in behind the same [`Renderer`]
//! contract.

use std::time::Duration;

use crate::foundation::core::{Frame, Geometry};
use crate::foundation::error::ShadecastResult;
use crate::render::{RenderState, Renderer, TextureUnit, UniformValue};
use crate::resource::{Mapping, ResourceProvider};

/// Renders an animated gradient driven by a virtual clock that advances by
/// the pacing interval per frame, so offline renders are paced in shader
/// time rather than wall-clock time.
pub struct PatternRenderer {
    geometry: Geometry,
    state: RenderState,
    providers: Vec<Box<dyn ResourceProvider>>,
    time: f32,
    step: f32,
    frame_index: u64,
}

impl PatternRenderer {
    /// Set up a renderer: allocates texture slots, constructs one provider
    /// per mapping through the resource registry, and declares the builtin
    /// uniforms plus every uniform the providers publish.
    pub fn new(
        geometry: Geometry,
        interval: Duration,
        mappings: &[Mapping],
    ) -> ShadecastResult<Self> {
        let mut next_unit = 0u32;
        let mut alloc = || {
            let unit = TextureUnit(next_unit);
            next_unit += 1;
            unit
        };

        let mut providers = Vec::with_capacity(mappings.len());
        for mapping in mappings {
            providers.push(crate::resource::construct(mapping, &mut alloc)?);
        }

        let mut state = RenderState::new();
        for name in ["iTime", "iFrame", "iResolution"] {
            state.declare(name);
        }
        for provider in &providers {
            state.declare_source(&provider.uniform_source());
        }

        Ok(Self {
            geometry,
            state,
            providers,
            time: 0.0,
            step: interval.as_secs_f32(),
            frame_index: 0,
        })
    }

    /// The uniform table, as seen by providers. Exposed for inspection.
    pub fn state(&self) -> &RenderState {
        &self.state
    }
}

impl Renderer for PatternRenderer {
    fn produce_frame(&mut self) -> ShadecastResult<Frame> {
        self.state
            .set_uniform("iTime", UniformValue::Float(self.time));
        self.state
            .set_uniform("iFrame", UniformValue::Int(self.frame_index as i32));
        self.state.set_uniform(
            "iResolution",
            UniformValue::Vec3([
                self.geometry.width as f32,
                self.geometry.height as f32,
                1.0,
            ]),
        );
        for provider in &mut self.providers {
            provider.pre_render(&mut self.state);
        }

        let (w, h) = (self.geometry.width, self.geometry.height);
        let t = self.time;
        let mut data = Vec::with_capacity(self.geometry.pixels() * 4);
        for y in 0..h {
            for x in 0..w {
                let fx = x as f32 / w as f32;
                let fy = y as f32 / h as f32;
                data.push(channel(fx + t));
                data.push(channel(fy + t * 0.5));
                data.push(channel(fx + fy + t * 0.25));
                data.push(255);
            }
        }

        self.time += self.step;
        self.frame_index += 1;
        Frame::from_rgba8(self.geometry, data)
    }

    fn close(&mut self) -> ShadecastResult<()> {
        // Close every provider even when one fails; a skipped close would
        // leave its background loop running detached.
        let mut first_err = None;
        for mut provider in self.providers.drain(..) {
            if let Err(e) = provider.close() {
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn channel(v: f32) -> u8 {
    (v.fract() * 255.0) as u8
}
