//! # Rendering system
//!
//! Backend-agnostic rendering abstraction with OpenGL and Vulkan backends.
//!
//! The module is split into the public surface applications use (the
//! [`Renderer`] facade, cameras, resource descriptions) and the per-backend
//! implementations living under [`backends`]. Applications never construct
//! backend types directly; everything is routed through the facade, which
//! branches on the [`RendererApiType`] selected once at initialization.

pub mod api;
pub mod batch;
pub mod buffer;
pub mod camera;
pub mod frame;
pub mod pipeline;
pub mod renderer;
pub mod shader;
pub mod texture;
pub mod window;

/// Graphics backend implementations
pub mod backends;

pub use api::{DeviceLimits, RendererApi, RendererApiType};
pub use batch::GeometryBatcher;
pub use buffer::{BufferElement, BufferLayout, BufferUsage, GpuBuffer, ShaderDataType};
pub use camera::{OrthographicBounds, OrthographicCamera, PerspectiveCamera};
pub use frame::{FrameFence, FrameRing, SlotState};
pub use pipeline::{
    CullMode, FrontFace, Pipeline, PipelineSpec, PolygonMode, PrimitiveTopology,
    PushConstantRange,
};
pub use renderer::{RenderStats, Renderer};
pub use shader::{Shader, ShaderSource, ShaderStage};
pub use texture::{Texture, TextureDesc};
pub use window::RenderSurface;

/// Errors surfaced by rendering operations
///
/// Backend-specific failures are wrapped into these variants before they
/// cross the facade boundary, so callers handle one taxonomy regardless of
/// the active graphics API.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// Renderer or backend initialization failed
    #[error("Renderer initialization failed: {0}")]
    InitializationFailed(String),

    /// GPU resource (buffer, texture, shader, pipeline) could not be created
    #[error("Resource creation failed: {0}")]
    ResourceCreationFailed(String),

    /// A call was made that the current renderer state does not allow
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Backend-specific error in a generic wrapper
    #[error("Backend error: {0}")]
    BackendError(String),
}

/// Result type for rendering operations
pub type RenderResult<T> = Result<T, RenderError>;
