//! OpenGL implementation of the backend strategy
//!
//! Thin by design: OpenGL's implicit state machine means frame begin/end is
//! close to a no-op and draws map one-to-one onto GL calls. One vertex array
//! object is shared for the renderer's lifetime; attribute pointers are
//! replayed from the bound buffer's layout.

use std::cell::RefCell;
use std::rc::Rc;

use glow::HasContext;

use super::{GlBuffer, GlContext, GlPipeline, GlResult, GlShader, GlTexture};
use crate::render::api::{DeviceLimits, RendererApi, RendererApiType};
use crate::render::buffer::{BufferLayout, BufferUsage, GpuBuffer, ShaderDataType};
use crate::render::pipeline::{Pipeline, PipelineSpec};
use crate::render::shader::{Shader, ShaderSource, ShaderStage};
use crate::render::texture::{Texture, TextureDesc};
use crate::render::window::RenderSurface;
use crate::render::{RenderError, RenderResult};

/// OpenGL backend
pub struct GlRenderer {
    context: GlContext,
    gl: Rc<glow::Context>,
    vao: glow::NativeVertexArray,
    draw_mode: u32,
    limits: DeviceLimits,
}

impl GlRenderer {
    /// Create the backend against a surface configured for OpenGL
    pub fn new(surface: Rc<RefCell<dyn RenderSurface>>) -> GlResult<Self> {
        let context = GlContext::new(surface)?;
        let gl = context.gl();

        let vao = unsafe { gl.create_vertex_array() }.map_err(super::GlError::Resource)?;

        let limits = unsafe {
            DeviceLimits {
                max_texture_size: gl.get_parameter_i32(glow::MAX_TEXTURE_SIZE) as u32,
                max_uniform_buffer_range: gl.get_parameter_i32(glow::MAX_UNIFORM_BLOCK_SIZE) as u32,
                // Push constants do not exist in GL.
                max_push_constant_size: 0,
            }
        };

        unsafe {
            gl.enable(glow::DEPTH_TEST);
            gl.depth_func(glow::LESS);
        }

        let (width, height) = context.framebuffer_size();
        unsafe {
            gl.viewport(0, 0, width as i32, height as i32);
        }

        Ok(Self {
            context,
            gl,
            vao,
            draw_mode: glow::TRIANGLES,
            limits,
        })
    }

    fn apply_vertex_layout(&self, layout: &BufferLayout) -> RenderResult<()> {
        let stride = layout.stride() as i32;
        for (index, element) in layout.elements().iter().enumerate() {
            let (gl_type, float) = match element.data_type {
                ShaderDataType::Float
                | ShaderDataType::Float2
                | ShaderDataType::Float3
                | ShaderDataType::Float4
                | ShaderDataType::Mat3
                | ShaderDataType::Mat4 => (glow::FLOAT, true),
                ShaderDataType::Int
                | ShaderDataType::Int2
                | ShaderDataType::Int3
                | ShaderDataType::Int4 => (glow::INT, false),
                ShaderDataType::Bool => (glow::UNSIGNED_BYTE, true),
            };
            unsafe {
                self.gl.enable_vertex_attrib_array(index as u32);
                if float {
                    self.gl.vertex_attrib_pointer_f32(
                        index as u32,
                        element.data_type.component_count() as i32,
                        gl_type,
                        element.normalized,
                        stride,
                        element.offset as i32,
                    );
                } else {
                    self.gl.vertex_attrib_pointer_i32(
                        index as u32,
                        element.data_type.component_count() as i32,
                        gl_type,
                        stride,
                        element.offset as i32,
                    );
                }
            }
        }
        Ok(())
    }

    fn downcast_buffer<'a>(buffer: &'a dyn GpuBuffer, expected: BufferUsage) -> RenderResult<&'a GlBuffer> {
        if buffer.usage() != expected {
            return Err(RenderError::InvalidOperation(format!(
                "Expected a {:?} buffer, got {:?}",
                expected,
                buffer.usage()
            )));
        }
        buffer.as_any().downcast_ref::<GlBuffer>().ok_or_else(|| {
            RenderError::InvalidOperation(
                "Buffer was not created by the OpenGL backend".to_string(),
            )
        })
    }
}

impl RendererApi for GlRenderer {
    fn api_type(&self) -> RendererApiType {
        RendererApiType::OpenGl
    }

    fn device_limits(&self) -> DeviceLimits {
        self.limits
    }

    fn set_clear_color(&mut self, color: [f32; 4]) {
        unsafe {
            self.gl.clear_color(color[0], color[1], color[2], color[3]);
        }
    }

    fn clear(&mut self) {
        unsafe {
            self.gl.clear(glow::COLOR_BUFFER_BIT | glow::DEPTH_BUFFER_BIT);
        }
    }

    fn set_viewport(&mut self, x: i32, y: i32, width: u32, height: u32) {
        unsafe {
            self.gl.viewport(x, y, width as i32, height as i32);
        }
    }

    fn begin_frame(&mut self) -> RenderResult<()> {
        // GL needs no per-frame synchronization; just track window size.
        let (width, height) = self.context.framebuffer_size();
        unsafe {
            self.gl.viewport(0, 0, width as i32, height as i32);
        }
        Ok(())
    }

    fn end_frame(&mut self) -> RenderResult<()> {
        self.context.swap_buffers();
        Ok(())
    }

    fn bind_pipeline(&mut self, pipeline: &dyn Pipeline) -> RenderResult<()> {
        let pipeline = pipeline
            .as_any()
            .downcast_ref::<GlPipeline>()
            .ok_or_else(|| {
                RenderError::InvalidOperation(
                    "Pipeline was not created by the OpenGL backend".to_string(),
                )
            })?;
        pipeline.apply();
        self.draw_mode = pipeline.draw_mode();
        Ok(())
    }

    fn bind_vertex_buffer(&mut self, buffer: &dyn GpuBuffer) -> RenderResult<()> {
        let gl_buffer = Self::downcast_buffer(buffer, BufferUsage::Vertex)?;
        let layout = buffer.layout().ok_or_else(|| {
            RenderError::InvalidOperation("Vertex buffer has no layout".to_string())
        })?;

        unsafe {
            self.gl.bind_vertex_array(Some(self.vao));
        }
        gl_buffer.bind();
        self.apply_vertex_layout(layout)
    }

    fn bind_index_buffer(&mut self, buffer: &dyn GpuBuffer) -> RenderResult<()> {
        let gl_buffer = Self::downcast_buffer(buffer, BufferUsage::Index)?;
        unsafe {
            self.gl.bind_vertex_array(Some(self.vao));
        }
        gl_buffer.bind();
        Ok(())
    }

    fn draw_arrays(&mut self, vertex_count: u32) -> RenderResult<()> {
        unsafe {
            self.gl.draw_arrays(self.draw_mode, 0, vertex_count as i32);
        }
        Ok(())
    }

    fn draw_lines(&mut self, vertex_count: u32) -> RenderResult<()> {
        unsafe {
            self.gl.draw_arrays(glow::LINES, 0, vertex_count as i32);
        }
        Ok(())
    }

    fn draw_indexed(&mut self, index_count: u32) -> RenderResult<()> {
        unsafe {
            self.gl
                .draw_elements(self.draw_mode, index_count as i32, glow::UNSIGNED_INT, 0);
        }
        Ok(())
    }

    fn create_buffer(
        &mut self,
        usage: BufferUsage,
        layout: Option<BufferLayout>,
        size: usize,
        data: Option<&[u8]>,
    ) -> RenderResult<Box<dyn GpuBuffer>> {
        let buffer = GlBuffer::new(self.context.gl(), usage, layout, size, data)?;
        Ok(Box::new(buffer))
    }

    fn create_shader(
        &mut self,
        stage: ShaderStage,
        source: &ShaderSource,
    ) -> RenderResult<Box<dyn Shader>> {
        let shader = GlShader::new(self.context.gl(), stage, source)?;
        Ok(Box::new(shader))
    }

    fn create_pipeline(
        &mut self,
        spec: &PipelineSpec,
        vertex: &dyn Shader,
        fragment: &dyn Shader,
    ) -> RenderResult<Box<dyn Pipeline>> {
        let vertex = vertex.as_any().downcast_ref::<GlShader>().ok_or_else(|| {
            RenderError::InvalidOperation(
                "Vertex shader was not created by the OpenGL backend".to_string(),
            )
        })?;
        let fragment = fragment.as_any().downcast_ref::<GlShader>().ok_or_else(|| {
            RenderError::InvalidOperation(
                "Fragment shader was not created by the OpenGL backend".to_string(),
            )
        })?;
        let pipeline = GlPipeline::new(self.context.gl(), spec, vertex, fragment)?;
        Ok(Box::new(pipeline))
    }

    fn create_texture(
        &mut self,
        desc: &TextureDesc,
        pixels: &[u8],
    ) -> RenderResult<Box<dyn Texture>> {
        let texture = GlTexture::new(self.context.gl(), desc, pixels)?;
        Ok(Box::new(texture))
    }

    fn resize(&mut self, width: u32, height: u32) -> RenderResult<()> {
        self.set_viewport(0, 0, width, height);
        Ok(())
    }

    fn wait_idle(&mut self) -> RenderResult<()> {
        unsafe {
            self.gl.finish();
        }
        Ok(())
    }
}

impl Drop for GlRenderer {
    fn drop(&mut self) {
        unsafe {
            self.gl.delete_vertex_array(self.vao);
        }
    }
}
