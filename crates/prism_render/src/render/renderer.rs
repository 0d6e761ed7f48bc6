//! Backend-agnostic renderer facade
//!
//! The single entry point application code calls. The renderer is an explicit
//! context object: construct it with [`Renderer::new`], initialize it once
//! against a window surface, and pass it to whoever renders. There is no
//! process-global renderer state.
//!
//! Failure policy: initialization problems and resource-creation failures are
//! logged and surfaced as `None`/no-op, never as panics. Callers null-check
//! factory results; draw calls on an uninitialized renderer log and do
//! nothing.

use std::cell::RefCell;
use std::rc::Rc;

use crate::render::api::{DeviceLimits, RendererApi, RendererApiType};
use crate::render::backends::opengl::GlRenderer;
use crate::render::backends::vulkan::VulkanRenderer;
use crate::render::batch::GeometryBatcher;
use crate::render::buffer::{BufferLayout, BufferUsage, GpuBuffer};
use crate::render::pipeline::{Pipeline, PipelineSpec};
use crate::render::shader::{Shader, ShaderSource, ShaderStage};
use crate::render::texture::{Texture, TextureDesc};
use crate::render::window::RenderSurface;
use nalgebra::Vector3;

/// Per-frame rendering statistics
///
/// Counters accumulate until [`Renderer::reset_stats`] is called; resetting
/// once per frame is a caller convention, not automatic. A caller that
/// forgets to reset sees monotonically growing counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// Draw calls issued since the last reset
    pub draw_calls: u32,
    /// Vertices submitted since the last reset
    pub vertices: u32,
    /// Indices submitted since the last reset
    pub indices: u32,
}

/// Backend-agnostic rendering facade
pub struct Renderer {
    backend: Option<Box<dyn RendererApi>>,
    api_type: RendererApiType,
    batcher: GeometryBatcher,
    stats: RenderStats,
    clear_color: [f32; 4],
}

impl Renderer {
    /// Create an uninitialized renderer
    pub fn new() -> Self {
        Self {
            backend: None,
            api_type: RendererApiType::None,
            batcher: GeometryBatcher::new(),
            stats: RenderStats::default(),
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }

    /// Initialize against a window surface
    ///
    /// Selects the backend from the surface's configured [`RendererApiType`].
    /// Initializing twice, or with `None`, logs an error and leaves the
    /// renderer in its previous state.
    pub fn init(&mut self, surface: Rc<RefCell<dyn RenderSurface>>) {
        if self.backend.is_some() {
            log::error!("Renderer is already initialized; ignoring second init");
            return;
        }

        let api_type = surface.borrow().configured_api();
        let backend: Result<Box<dyn RendererApi>, crate::render::RenderError> = match api_type {
            RendererApiType::OpenGl => GlRenderer::new(surface)
                .map(|r| Box::new(r) as Box<dyn RendererApi>)
                .map_err(Into::into),
            RendererApiType::Vulkan => VulkanRenderer::new(surface)
                .map(|r| Box::new(r) as Box<dyn RendererApi>)
                .map_err(Into::into),
            RendererApiType::None => {
                log::error!("Cannot initialize renderer with RendererApiType::None");
                return;
            }
            other => {
                log::error!("Renderer backend {} is not implemented", other);
                return;
            }
        };

        match backend {
            Ok(mut backend) => {
                backend.set_clear_color(self.clear_color);
                log::info!("Renderer initialized with {} backend", api_type);
                self.backend = Some(backend);
                self.api_type = api_type;
            }
            Err(e) => {
                log::error!("Renderer initialization failed: {}", e);
            }
        }
    }

    /// Whether [`Renderer::init`] has succeeded
    pub fn is_initialized(&self) -> bool {
        self.backend.is_some()
    }

    /// The active graphics API, `None` until initialized
    pub fn current_api(&self) -> RendererApiType {
        self.api_type
    }

    /// Limits of the active graphics device, if initialized
    pub fn device_limits(&self) -> Option<DeviceLimits> {
        self.backend.as_ref().map(|b| b.device_limits())
    }

    /// Set the clear color for subsequent frames
    pub fn set_clear_color(&mut self, color: [f32; 4]) {
        self.clear_color = color;
        if let Some(backend) = self.backend.as_mut() {
            backend.set_clear_color(color);
        }
    }

    /// Clear the current render target
    pub fn clear(&mut self) {
        match self.backend.as_mut() {
            Some(backend) => backend.clear(),
            None => log::warn!("clear() called on uninitialized renderer"),
        }
    }

    /// Set the viewport (and scissor where applicable)
    pub fn set_viewport(&mut self, x: i32, y: i32, width: u32, height: u32) {
        if let Some(backend) = self.backend.as_mut() {
            backend.set_viewport(x, y, width, height);
        }
    }

    /// Begin a frame
    pub fn begin_frame(&mut self) {
        let Some(backend) = self.backend.as_mut() else {
            log::warn!("begin_frame() called on uninitialized renderer");
            return;
        };
        if let Err(e) = backend.begin_frame() {
            log::error!("begin_frame failed: {}", e);
        }
    }

    /// End a frame: flush batched geometry, submit and present
    pub fn end_frame(&mut self) {
        let Some(backend) = self.backend.as_mut() else {
            log::warn!("end_frame() called on uninitialized renderer");
            return;
        };
        if let Err(e) = self.batcher.flush(backend.as_mut(), &mut self.stats) {
            log::error!("Batch flush failed: {}", e);
        }
        if let Err(e) = backend.end_frame() {
            log::error!("end_frame failed: {}", e);
        }
    }

    /// Bind a pipeline for subsequent draw calls
    pub fn submit(&mut self, pipeline: &dyn Pipeline) {
        let Some(backend) = self.backend.as_mut() else {
            log::warn!("submit() called on uninitialized renderer");
            return;
        };
        if let Err(e) = backend.bind_pipeline(pipeline) {
            log::error!("Pipeline bind failed: {}", e);
        }
    }

    /// Bind a vertex buffer for subsequent draw calls
    pub fn bind_vertex_buffer(&mut self, buffer: &dyn GpuBuffer) {
        if let Some(backend) = self.backend.as_mut() {
            if let Err(e) = backend.bind_vertex_buffer(buffer) {
                log::error!("Vertex buffer bind failed: {}", e);
            }
        }
    }

    /// Bind an index buffer for subsequent indexed draw calls
    pub fn bind_index_buffer(&mut self, buffer: &dyn GpuBuffer) {
        if let Some(backend) = self.backend.as_mut() {
            if let Err(e) = backend.bind_index_buffer(buffer) {
                log::error!("Index buffer bind failed: {}", e);
            }
        }
    }

    /// Draw non-indexed triangles from the bound vertex buffer
    pub fn draw_arrays(&mut self, vertex_count: u32) {
        let Some(backend) = self.backend.as_mut() else {
            log::warn!("draw_arrays() called on uninitialized renderer");
            return;
        };
        match backend.draw_arrays(vertex_count) {
            Ok(()) => {
                self.stats.draw_calls += 1;
                self.stats.vertices += vertex_count;
            }
            Err(e) => log::error!("draw_arrays failed: {}", e),
        }
    }

    /// Draw lines from the bound vertex buffer
    pub fn draw_lines(&mut self, vertex_count: u32) {
        let Some(backend) = self.backend.as_mut() else {
            log::warn!("draw_lines() called on uninitialized renderer");
            return;
        };
        match backend.draw_lines(vertex_count) {
            Ok(()) => {
                self.stats.draw_calls += 1;
                self.stats.vertices += vertex_count;
            }
            Err(e) => log::error!("draw_lines failed: {}", e),
        }
    }

    /// Draw indexed triangles from the bound vertex and index buffers
    pub fn draw_indexed(&mut self, index_count: u32) {
        let Some(backend) = self.backend.as_mut() else {
            log::warn!("draw_indexed() called on uninitialized renderer");
            return;
        };
        match backend.draw_indexed(index_count) {
            Ok(()) => {
                self.stats.draw_calls += 1;
                self.stats.indices += index_count;
            }
            Err(e) => log::error!("draw_indexed failed: {}", e),
        }
    }

    /// Queue a quad for the batched flush at frame end
    pub fn add_quad(&mut self, center: Vector3<f32>, size: [f32; 2], color: [f32; 4]) {
        self.batcher.add_quad(center, size, color);
    }

    /// Queue a cube for the batched flush at frame end
    pub fn add_cube(&mut self, center: Vector3<f32>, size: [f32; 3], color: [f32; 4]) {
        self.batcher.add_cube(center, size, color);
    }

    /// Queue a line for the batched flush at frame end
    pub fn add_line(&mut self, from: Vector3<f32>, to: Vector3<f32>, color: [f32; 4]) {
        self.batcher.add_line(from, to, color);
    }

    /// The geometry batcher, for inspecting queued counts
    pub fn batcher(&self) -> &GeometryBatcher {
        &self.batcher
    }

    /// Statistics accumulated since the last reset
    pub fn stats(&self) -> RenderStats {
        self.stats
    }

    /// Reset statistics; callers do this once per frame by convention
    pub fn reset_stats(&mut self) {
        self.stats = RenderStats::default();
    }

    /// Create a GPU buffer; `None` (with one logged error) on failure
    pub fn create_buffer(
        &mut self,
        usage: BufferUsage,
        layout: Option<BufferLayout>,
        size: usize,
        data: Option<&[u8]>,
    ) -> Option<Box<dyn GpuBuffer>> {
        let backend = self.require_backend("Buffer")?;
        match backend.create_buffer(usage, layout, size, data) {
            Ok(buffer) => Some(buffer),
            Err(e) => {
                log::error!("Buffer creation failed: {}", e);
                None
            }
        }
    }

    /// Create a shader stage; `None` (with one logged error) on failure
    pub fn create_shader(
        &mut self,
        stage: ShaderStage,
        source: &ShaderSource,
    ) -> Option<Box<dyn Shader>> {
        let backend = self.require_backend("Shader")?;
        match backend.create_shader(stage, source) {
            Ok(shader) => Some(shader),
            Err(e) => {
                log::error!("Shader creation failed: {}", e);
                None
            }
        }
    }

    /// Create a graphics pipeline; `None` (with one logged error) on failure
    pub fn create_pipeline(
        &mut self,
        spec: &PipelineSpec,
        vertex: &dyn Shader,
        fragment: &dyn Shader,
    ) -> Option<Box<dyn Pipeline>> {
        let backend = self.require_backend("Pipeline")?;
        match backend.create_pipeline(spec, vertex, fragment) {
            Ok(pipeline) => Some(pipeline),
            Err(e) => {
                log::error!("Pipeline creation failed: {}", e);
                None
            }
        }
    }

    /// Create a texture from decoded pixels; `None` (with one logged error) on failure
    pub fn create_texture(
        &mut self,
        desc: &TextureDesc,
        pixels: &[u8],
    ) -> Option<Box<dyn Texture>> {
        let backend = self.require_backend("Texture")?;
        if pixels.len() != desc.byte_len() {
            log::error!(
                "Texture creation failed: pixel buffer is {} bytes, expected {}",
                pixels.len(),
                desc.byte_len()
            );
            return None;
        }
        match backend.create_texture(desc, pixels) {
            Ok(texture) => Some(texture),
            Err(e) => {
                log::error!("Texture creation failed: {}", e);
                None
            }
        }
    }

    /// Propagate a framebuffer resize to the backend
    pub fn resize(&mut self, width: u32, height: u32) {
        if let Some(backend) = self.backend.as_mut() {
            if let Err(e) = backend.resize(width, height) {
                log::error!("Resize failed: {}", e);
            }
        }
    }

    /// Wait for the device to go idle and release the backend
    ///
    /// Safe to call more than once; the renderer returns to its
    /// uninitialized state.
    pub fn shutdown(&mut self) {
        if let Some(mut backend) = self.backend.take() {
            if let Err(e) = backend.wait_idle() {
                log::error!("wait_idle during shutdown failed: {}", e);
            }
            self.api_type = RendererApiType::None;
            log::info!("Renderer shut down");
        }
    }

    fn require_backend(&mut self, what: &str) -> Option<&mut Box<dyn RendererApi>> {
        if self.backend.is_none() {
            log::error!(
                "{} factory called before Renderer::init (active API is None)",
                what
            );
        }
        self.backend.as_mut()
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::RenderResult;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Recording backend used to test facade dispatch without a GPU
    #[derive(Default)]
    struct MockApi {
        calls: Rc<RefCell<Vec<String>>>,
    }

    struct MockBuffer {
        usage: BufferUsage,
        layout: Option<BufferLayout>,
        data: Vec<u8>,
    }

    impl GpuBuffer for MockBuffer {
        fn usage(&self) -> BufferUsage {
            self.usage
        }
        fn size(&self) -> usize {
            self.data.len()
        }
        fn layout(&self) -> Option<&BufferLayout> {
            self.layout.as_ref()
        }
        fn set_data(&mut self, data: &[u8]) -> RenderResult<()> {
            self.data[..data.len()].copy_from_slice(data);
            Ok(())
        }
        fn as_any(&self) -> &dyn std::any::Any {
            self
        }
    }

    impl MockApi {
        fn record(&self, call: impl Into<String>) {
            self.calls.borrow_mut().push(call.into());
        }
    }

    impl RendererApi for MockApi {
        fn api_type(&self) -> RendererApiType {
            RendererApiType::OpenGl
        }
        fn device_limits(&self) -> DeviceLimits {
            DeviceLimits::default()
        }
        fn set_clear_color(&mut self, _color: [f32; 4]) {}
        fn clear(&mut self) {
            self.record("clear");
        }
        fn set_viewport(&mut self, _x: i32, _y: i32, _w: u32, _h: u32) {}
        fn begin_frame(&mut self) -> RenderResult<()> {
            self.record("begin_frame");
            Ok(())
        }
        fn end_frame(&mut self) -> RenderResult<()> {
            self.record("end_frame");
            Ok(())
        }
        fn bind_pipeline(&mut self, _pipeline: &dyn Pipeline) -> RenderResult<()> {
            self.record("bind_pipeline");
            Ok(())
        }
        fn bind_vertex_buffer(&mut self, _buffer: &dyn GpuBuffer) -> RenderResult<()> {
            self.record("bind_vertex_buffer");
            Ok(())
        }
        fn bind_index_buffer(&mut self, _buffer: &dyn GpuBuffer) -> RenderResult<()> {
            self.record("bind_index_buffer");
            Ok(())
        }
        fn draw_arrays(&mut self, count: u32) -> RenderResult<()> {
            self.record(format!("draw_arrays({})", count));
            Ok(())
        }
        fn draw_lines(&mut self, count: u32) -> RenderResult<()> {
            self.record(format!("draw_lines({})", count));
            Ok(())
        }
        fn draw_indexed(&mut self, count: u32) -> RenderResult<()> {
            self.record(format!("draw_indexed({})", count));
            Ok(())
        }
        fn create_buffer(
            &mut self,
            usage: BufferUsage,
            layout: Option<BufferLayout>,
            size: usize,
            data: Option<&[u8]>,
        ) -> RenderResult<Box<dyn GpuBuffer>> {
            self.record("create_buffer");
            let mut bytes = vec![0u8; size];
            if let Some(data) = data {
                bytes[..data.len()].copy_from_slice(data);
            }
            Ok(Box::new(MockBuffer {
                usage,
                layout,
                data: bytes,
            }))
        }
        fn create_shader(
            &mut self,
            _stage: ShaderStage,
            _source: &ShaderSource,
        ) -> RenderResult<Box<dyn Shader>> {
            unimplemented!("not exercised by facade tests")
        }
        fn create_pipeline(
            &mut self,
            _spec: &PipelineSpec,
            _vertex: &dyn Shader,
            _fragment: &dyn Shader,
        ) -> RenderResult<Box<dyn Pipeline>> {
            unimplemented!("not exercised by facade tests")
        }
        fn create_texture(
            &mut self,
            _desc: &TextureDesc,
            _pixels: &[u8],
        ) -> RenderResult<Box<dyn Texture>> {
            unimplemented!("not exercised by facade tests")
        }
        fn resize(&mut self, _width: u32, _height: u32) -> RenderResult<()> {
            Ok(())
        }
        fn wait_idle(&mut self) -> RenderResult<()> {
            Ok(())
        }
    }

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn mock_renderer() -> (Renderer, Rc<RefCell<Vec<String>>>) {
        let api = MockApi::default();
        let calls = api.calls.clone();
        let renderer = Renderer {
            backend: Some(Box::new(api)),
            api_type: RendererApiType::OpenGl,
            batcher: GeometryBatcher::new(),
            stats: RenderStats::default(),
            clear_color: [0.0; 4],
        };
        (renderer, calls)
    }

    /// Shader stand-in for exercising the pipeline factory without a backend
    struct StubShader(ShaderStage);

    impl Shader for StubShader {
        fn stage(&self) -> ShaderStage {
            self.0
        }
        fn as_any(&self) -> &dyn std::any::Any {
            self
        }
    }

    #[test]
    fn uninitialized_factories_return_none() {
        init_logging();
        let mut renderer = Renderer::new();
        assert_eq!(renderer.current_api(), RendererApiType::None);

        assert!(renderer
            .create_buffer(BufferUsage::Vertex, None, 64, None)
            .is_none());
        assert!(renderer
            .create_shader(ShaderStage::Vertex, &ShaderSource::Glsl(String::new()))
            .is_none());
        let vertex = StubShader(ShaderStage::Vertex);
        let fragment = StubShader(ShaderStage::Fragment);
        assert!(renderer
            .create_pipeline(&PipelineSpec::default(), &vertex, &fragment)
            .is_none());
        assert!(renderer
            .create_texture(
                &TextureDesc {
                    width: 1,
                    height: 1,
                    channels: 4
                },
                &[0, 0, 0, 255]
            )
            .is_none());
    }

    #[test]
    fn uninitialized_draw_calls_are_no_ops() {
        init_logging();
        let mut renderer = Renderer::new();
        renderer.clear();
        renderer.begin_frame();
        renderer.draw_indexed(6);
        renderer.end_frame();
        assert_eq!(renderer.stats().draw_calls, 0);
    }

    #[test]
    fn draw_indexed_counts_stats() {
        let (mut renderer, _) = mock_renderer();

        for _ in 0..5 {
            renderer.draw_indexed(6);
        }
        assert_eq!(renderer.stats().draw_calls, 5);
        assert_eq!(renderer.stats().indices, 30);

        renderer.reset_stats();
        assert_eq!(renderer.stats(), RenderStats::default());
    }

    #[test]
    fn quad_flush_issues_one_indexed_draw() {
        let (mut renderer, calls) = mock_renderer();

        renderer.add_quad(Vector3::zeros(), [1.0, 1.0], [1.0; 4]);
        assert_eq!(renderer.batcher().quad_vertex_count(), 4);
        assert_eq!(renderer.batcher().quad_index_count(), 6);

        renderer.end_frame();

        let calls = calls.borrow();
        assert_eq!(
            calls
                .iter()
                .filter(|c| c.starts_with("draw_indexed"))
                .count(),
            1
        );
        assert!(calls.contains(&"draw_indexed(6)".to_string()));

        assert_eq!(renderer.stats().draw_calls, 1);
        assert_eq!(renderer.stats().vertices, 4);
        assert_eq!(renderer.stats().indices, 6);
        assert!(renderer.batcher().is_empty());
    }

    #[test]
    fn mixed_batch_flushes_one_draw_per_kind() {
        let (mut renderer, calls) = mock_renderer();

        renderer.add_quad(Vector3::zeros(), [1.0, 1.0], [1.0; 4]);
        renderer.add_quad(Vector3::new(2.0, 0.0, 0.0), [1.0, 1.0], [1.0; 4]);
        renderer.add_cube(Vector3::zeros(), [1.0, 1.0, 1.0], [1.0; 4]);
        renderer.add_line(Vector3::zeros(), Vector3::new(1.0, 1.0, 1.0), [1.0; 4]);

        renderer.end_frame();

        let calls = calls.borrow();
        assert!(calls.contains(&"draw_indexed(12)".to_string())); // two quads
        assert!(calls.contains(&"draw_indexed(36)".to_string())); // one cube
        assert!(calls.contains(&"draw_lines(2)".to_string()));
        assert_eq!(renderer.stats().draw_calls, 3);
    }
}
