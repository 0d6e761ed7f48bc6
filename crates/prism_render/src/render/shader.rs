//! Shader stage abstraction
//!
//! Shader compilation is delegated to the backend: the OpenGL driver compiles
//! GLSL source, Vulkan wraps pre-compiled SPIR-V in a shader module. This
//! crate never parses or cross-compiles shader source itself.

/// Pipeline stage a shader is compiled for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    /// Vertex stage
    Vertex,
    /// Fragment stage
    Fragment,
}

/// Shader payload handed to the backend
///
/// GLSL text is only meaningful to the OpenGL backend, SPIR-V bytes only to
/// Vulkan; creating a shader from the wrong payload for the active backend is
/// a resource-creation failure.
#[derive(Debug, Clone)]
pub enum ShaderSource {
    /// GLSL source text (OpenGL)
    Glsl(String),
    /// SPIR-V bytecode (Vulkan); must be 4-byte aligned
    SpirV(Vec<u8>),
}

/// Opaque handle to a backend-compiled shader stage
pub trait Shader {
    /// The stage this shader was compiled for
    fn stage(&self) -> ShaderStage;

    /// Downcast seam for backend implementations
    fn as_any(&self) -> &dyn std::any::Any;
}
