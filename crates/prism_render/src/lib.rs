//! # Prism Render
//!
//! A cross-backend real-time rendering abstraction. Application code issues
//! drawing commands (quads, cubes, lines, meshes) and camera state through a
//! single facade without knowing whether the underlying graphics API is
//! OpenGL or Vulkan.
//!
//! ## Architecture
//!
//! - **Renderer**: backend-agnostic facade and the single entry point
//! - **RendererApi**: strategy trait with one concrete implementation per backend
//! - **Cameras**: orthographic and perspective view/projection holders
//! - **Resource objects**: GPU buffers, shaders, pipelines and textures created
//!   through the facade and handed back as opaque trait objects
//!
//! Windowing, input, audio and asset decoding are external collaborators; the
//! crate consumes a [`render::RenderSurface`] for everything it needs from the
//! window and already-decoded pixel/shader payloads for resources.

pub mod render;

pub use render::{
    BufferElement, BufferLayout, BufferUsage, GpuBuffer, OrthographicCamera,
    PerspectiveCamera, Pipeline, PipelineSpec, RenderError, RenderResult, RenderStats,
    RenderSurface, Renderer, RendererApi, RendererApiType, Shader, ShaderDataType,
    ShaderSource, ShaderStage, Texture, TextureDesc,
};
