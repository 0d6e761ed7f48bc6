//! OpenGL rendering backend
//!
//! Implemented on [`glow`] against a context the windowing layer makes
//! current before handing over its proc-address loader. OpenGL's implicit
//! global-state model means most operations here are direct GL calls with no
//! frame synchronization of their own; presentation is the window's
//! swap-buffers call.

mod buffer;
mod context;
mod pipeline;
mod renderer;
mod shader;
mod texture;

pub use buffer::GlBuffer;
pub use context::GlContext;
pub use pipeline::GlPipeline;
pub use renderer::GlRenderer;
pub use shader::GlShader;
pub use texture::GlTexture;

/// OpenGL-specific error types
#[derive(Debug, thiserror::Error)]
pub enum GlError {
    /// GL context creation or configuration failed
    #[error("OpenGL context error: {0}")]
    Context(String),

    /// Driver-side shader compilation failed
    #[error("Shader compilation failed: {0}")]
    Compile(String),

    /// Program linking failed
    #[error("Program link failed: {0}")]
    Link(String),

    /// GL object allocation failed
    #[error("Resource allocation failed: {0}")]
    Resource(String),
}

/// Result type for OpenGL operations
pub type GlResult<T> = Result<T, GlError>;

impl From<GlError> for crate::render::RenderError {
    fn from(e: GlError) -> Self {
        match e {
            GlError::Context(msg) => crate::render::RenderError::InitializationFailed(msg),
            other => crate::render::RenderError::ResourceCreationFailed(other.to_string()),
        }
    }
}
