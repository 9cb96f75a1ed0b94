//! The consumed renderer boundary: a uniform table written by resource
//! providers before each frame, and the renderer contract itself.

use std::collections::HashMap;
use std::sync::Arc;

use crate::foundation::core::Frame;
use crate::foundation::error::ShadecastResult;

mod pattern;

pub use pattern::PatternRenderer;

/// A GPU-visible texture slot assigned to a provider at construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureUnit(pub u32);

/// A value written into a bound uniform location.
#[derive(Clone, Debug)]
pub enum UniformValue {
    /// A scalar float.
    Float(f32),
    /// A scalar integer.
    Int(i32),
    /// A boolean flag.
    Bool(bool),
    /// A 3-component vector.
    Vec3([f32; 3]),
    /// A 4-component vector.
    Vec4([f32; 4]),
    /// Image data published to a texture slot.
    Image {
        /// The slot allocated to the publishing provider.
        unit: TextureUnit,
        /// The current pixel snapshot.
        pixels: Arc<Frame>,
    },
}

/// The renderer's uniform-variable table.
///
/// Uniform names absent from the compiled program are silently skipped on
/// write; providers never treat an unused uniform as an error.
#[derive(Debug, Default)]
pub struct RenderState {
    uniforms: HashMap<String, Option<UniformValue>>,
}

impl RenderState {
    /// Create a state with no declared uniforms.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a uniform location, making it writable.
    pub fn declare(&mut self, name: impl Into<String>) {
        self.uniforms.entry(name.into()).or_insert(None);
    }

    /// Declare every uniform named in a block of GLSL declarations.
    pub fn declare_source(&mut self, source: &str) {
        for name in declared_uniforms(source) {
            self.declare(name);
        }
    }

    /// Write a uniform value. Writes to undeclared names are dropped and
    /// `false` is returned.
    pub fn set_uniform(&mut self, name: &str, value: UniformValue) -> bool {
        match self.uniforms.get_mut(name) {
            Some(slot) => {
                *slot = Some(value);
                true
            }
            None => false,
        }
    }

    /// The last value written to a declared uniform, if any.
    pub fn uniform(&self, name: &str) -> Option<&UniformValue> {
        self.uniforms.get(name).and_then(|v| v.as_ref())
    }

    /// Whether a uniform location exists in the compiled program.
    pub fn is_declared(&self, name: &str) -> bool {
        self.uniforms.contains_key(name)
    }
}

/// Extract the variable names from `uniform <type> <name>;` declarations.
pub fn declared_uniforms(source: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut tokens = source.split([' ', '\t', '\n', ';']).filter(|t| !t.is_empty());
    while let Some(tok) = tokens.next() {
        if tok != "uniform" {
            continue;
        }
        let Some(_ty) = tokens.next() else { break };
        if let Some(name) = tokens.next() {
            names.push(name.to_owned());
        }
    }
    names
}

/// Produces one frame per invocation.
///
/// Implementations invoke each active resource provider's pre-render hook
/// before executing the program, and own provider teardown: `close`
/// releases the providers the renderer was constructed with.
pub trait Renderer {
    /// Render the next frame.
    fn produce_frame(&mut self) -> ShadecastResult<Frame>;

    /// Release providers and rendering resources. Called once by the
    /// owner after all pipeline stages have finished.
    fn close(&mut self) -> ShadecastResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undeclared_uniform_writes_are_silently_skipped() {
        let mut state = RenderState::new();
        state.declare("iTime");
        assert!(state.set_uniform("iTime", UniformValue::Float(1.5)));
        assert!(!state.set_uniform("iMouse", UniformValue::Float(0.0)));
        assert!(matches!(
            state.uniform("iTime"),
            Some(UniformValue::Float(t)) if *t == 1.5
        ));
        assert!(state.uniform("iMouse").is_none());
    }

    #[test]
    fn parses_uniform_declarations() {
        let src = "
            uniform sampler2D cam;
            uniform vec3 camSize;
            uniform float camCurTime;
        ";
        assert_eq!(
            declared_uniforms(src),
            vec!["cam", "camSize", "camCurTime"]
        );
    }

    #[test]
    fn parses_single_line_declarations() {
        let src = "uniform vec3 imuAcceleration;uniform bool imuShake;";
        assert_eq!(declared_uniforms(src), vec!["imuAcceleration", "imuShake"]);
    }

    #[test]
    fn declare_source_makes_names_writable() {
        let mut state = RenderState::new();
        state.declare_source("uniform vec4 q;");
        assert!(state.set_uniform("q", UniformValue::Vec4([0.0; 4])));
    }
}
