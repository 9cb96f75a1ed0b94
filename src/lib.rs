//! Shadecast renders shader-driven animations frame by frame and streams
//! them into an output format.
//!
//! The public API is session-oriented:
//!
//! - Extract `#pragma map` resource [`Mapping`]s from the shader source
//! - Construct a [`Renderer`] (the built-in [`PatternRenderer`], or your own)
//! - Pick a [`Format`] by name or by filename extension
//! - Assemble a [`Pipeline`] and run it against a byte sink
//!
//! Live data sources (a depth camera, a networked motion sensor) attach as
//! [`ResourceProvider`]s and publish fresh values into the renderer's
//! uniform table before every frame.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod foundation;

/// Output formats: stills, raw dumps, GIF, terminal display.
pub mod encode;
/// The renderer boundary and the built-in software renderer.
pub mod render;
/// Live external data sources mapped to shader uniforms.
pub mod resource;
/// The frame-production pipeline.
pub mod session;

pub use crate::foundation::core::{Frame, Geometry, frame_limit_for_duration, interval_for_fps};
pub use crate::foundation::error::{ShadecastError, ShadecastResult};

pub use crate::encode::{Format, by_name, detect_format};
pub use crate::render::{PatternRenderer, RenderState, Renderer, TextureUnit, UniformValue};
pub use crate::resource::{Mapping, ResourceProvider, register_resource_kind};
pub use crate::session::{CancelToken, Pipeline, PipelineOpts, PipelineStats};
