//! Backend strategy interface
//!
//! Defines the polymorphic surface every rendering backend implements. Exactly
//! one concrete implementation is alive per [`crate::render::Renderer`],
//! constructed against exactly one graphics context at initialization time.

use crate::render::buffer::{BufferLayout, BufferUsage, GpuBuffer};
use crate::render::pipeline::{Pipeline, PipelineSpec};
use crate::render::shader::{Shader, ShaderSource, ShaderStage};
use crate::render::texture::{Texture, TextureDesc};
use crate::render::RenderResult;

/// Graphics API selector
///
/// Chosen once at renderer initialization and immutable for the renderer's
/// lifetime. All resource factories branch on the same selector; DirectX
/// variants are declared for configuration compatibility but unimplemented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RendererApiType {
    /// No backend selected; the renderer is uninitialized
    #[default]
    None,
    /// OpenGL backend (implicit global-state model)
    OpenGl,
    /// Vulkan backend (explicit command-buffer model)
    Vulkan,
    /// DirectX 11 (declared, not implemented)
    DirectX11,
    /// DirectX 12 (declared, not implemented)
    DirectX12,
}

impl std::fmt::Display for RendererApiType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RendererApiType::None => "None",
            RendererApiType::OpenGl => "OpenGL",
            RendererApiType::Vulkan => "Vulkan",
            RendererApiType::DirectX11 => "DirectX 11",
            RendererApiType::DirectX12 => "DirectX 12",
        };
        write!(f, "{}", name)
    }
}

/// Device limits exposed by the active graphics device
///
/// Vulkan reports real physical-device limits; the OpenGL device is a thin
/// stub that queries what the driver exposes and zero-fills the rest.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeviceLimits {
    /// Maximum width/height of a 2D texture
    pub max_texture_size: u32,
    /// Maximum size of a uniform buffer binding in bytes
    pub max_uniform_buffer_range: u32,
    /// Maximum push-constant block size in bytes (0 where not applicable)
    pub max_push_constant_size: u32,
}

/// Rendering backend strategy
///
/// The facade forwards every draw, state and resource-creation call here.
/// Implementations own their graphics context (GL context or Vulkan
/// instance/surface/swapchain bundle) plus the current frame's recording
/// state; they hold no cross-frame draw state beyond viewport/scissor.
///
/// Binding of buffers and pipelines goes through the backend rather than the
/// resource objects themselves because Vulkan binds are command-buffer
/// recordings, not global state changes. Backends downcast the trait objects
/// they are handed to their own concrete resource types.
pub trait RendererApi {
    /// The API this backend implements
    fn api_type(&self) -> RendererApiType;

    /// Limits of the underlying graphics device
    fn device_limits(&self) -> DeviceLimits;

    /// Set the color used by [`RendererApi::clear`] and the frame clear pass
    fn set_clear_color(&mut self, color: [f32; 4]);

    /// Clear the current render target
    fn clear(&mut self);

    /// Set the viewport (and scissor, where the backend has one)
    fn set_viewport(&mut self, x: i32, y: i32, width: u32, height: u32);

    /// Begin a frame
    ///
    /// Near no-op for OpenGL; for Vulkan this performs the full per-frame
    /// synchronization dance (fence wait, image acquire, render-pass begin).
    fn begin_frame(&mut self) -> RenderResult<()>;

    /// End a frame: submit recorded work and present
    fn end_frame(&mut self) -> RenderResult<()>;

    /// Bind a pipeline for subsequent draw calls
    fn bind_pipeline(&mut self, pipeline: &dyn Pipeline) -> RenderResult<()>;

    /// Bind a vertex buffer for subsequent draw calls
    fn bind_vertex_buffer(&mut self, buffer: &dyn GpuBuffer) -> RenderResult<()>;

    /// Bind an index buffer for subsequent indexed draw calls
    fn bind_index_buffer(&mut self, buffer: &dyn GpuBuffer) -> RenderResult<()>;

    /// Draw non-indexed triangles from the bound vertex buffer
    fn draw_arrays(&mut self, vertex_count: u32) -> RenderResult<()>;

    /// Draw lines from the bound vertex buffer
    fn draw_lines(&mut self, vertex_count: u32) -> RenderResult<()>;

    /// Draw indexed triangles from the bound vertex and index buffers
    fn draw_indexed(&mut self, index_count: u32) -> RenderResult<()>;

    /// Create a GPU buffer, optionally initialized with `data`
    fn create_buffer(
        &mut self,
        usage: BufferUsage,
        layout: Option<BufferLayout>,
        size: usize,
        data: Option<&[u8]>,
    ) -> RenderResult<Box<dyn GpuBuffer>>;

    /// Create a compiled shader stage from source or bytecode
    fn create_shader(
        &mut self,
        stage: ShaderStage,
        source: &ShaderSource,
    ) -> RenderResult<Box<dyn Shader>>;

    /// Create a graphics pipeline from shader stages and fixed-function state
    fn create_pipeline(
        &mut self,
        spec: &PipelineSpec,
        vertex: &dyn Shader,
        fragment: &dyn Shader,
    ) -> RenderResult<Box<dyn Pipeline>>;

    /// Create a sampled texture from already-decoded pixel data
    fn create_texture(
        &mut self,
        desc: &TextureDesc,
        pixels: &[u8],
    ) -> RenderResult<Box<dyn Texture>>;

    /// Handle a framebuffer resize
    fn resize(&mut self, width: u32, height: u32) -> RenderResult<()>;

    /// Block until the device has finished all submitted work
    fn wait_idle(&mut self) -> RenderResult<()>;
}
