//! OpenGL buffer objects
//!
//! A single driver-managed buffer per handle. Uploads go through
//! `glBufferSubData` and are synchronous from the caller's perspective; the
//! driver may still queue them internally.

use std::rc::Rc;

use glow::HasContext;

use super::{GlError, GlResult};
use crate::render::buffer::{BufferLayout, BufferUsage, GpuBuffer};
use crate::render::{RenderError, RenderResult};

/// OpenGL GPU buffer
pub struct GlBuffer {
    gl: Rc<glow::Context>,
    handle: glow::NativeBuffer,
    target: u32,
    usage: BufferUsage,
    layout: Option<BufferLayout>,
    size: usize,
}

impl GlBuffer {
    /// Create a buffer, optionally initialized with `data`
    pub fn new(
        gl: Rc<glow::Context>,
        usage: BufferUsage,
        layout: Option<BufferLayout>,
        size: usize,
        data: Option<&[u8]>,
    ) -> GlResult<Self> {
        let target = match usage {
            BufferUsage::Vertex => glow::ARRAY_BUFFER,
            BufferUsage::Index => glow::ELEMENT_ARRAY_BUFFER,
            BufferUsage::Uniform => glow::UNIFORM_BUFFER,
        };

        let handle = unsafe { gl.create_buffer() }.map_err(GlError::Resource)?;
        unsafe {
            gl.bind_buffer(target, Some(handle));
            // Allocate full capacity even when the initial data is shorter.
            gl.buffer_data_size(target, size as i32, glow::DYNAMIC_DRAW);
            if let Some(data) = data {
                gl.buffer_sub_data_u8_slice(target, 0, data);
            }
            gl.bind_buffer(target, None);
        }

        Ok(Self {
            gl,
            handle,
            target,
            usage,
            layout,
            size,
        })
    }

    /// Bind to this buffer's target
    pub fn bind(&self) {
        unsafe {
            self.gl.bind_buffer(self.target, Some(self.handle));
        }
    }

    /// Unbind this buffer's target
    pub fn unbind(&self) {
        unsafe {
            self.gl.bind_buffer(self.target, None);
        }
    }

    /// Raw GL handle
    pub fn handle(&self) -> glow::NativeBuffer {
        self.handle
    }
}

impl GpuBuffer for GlBuffer {
    fn usage(&self) -> BufferUsage {
        self.usage
    }

    fn size(&self) -> usize {
        self.size
    }

    fn layout(&self) -> Option<&BufferLayout> {
        self.layout.as_ref()
    }

    fn set_data(&mut self, data: &[u8]) -> RenderResult<()> {
        if data.len() > self.size {
            return Err(RenderError::InvalidOperation(format!(
                "set_data of {} bytes exceeds buffer capacity {}",
                data.len(),
                self.size
            )));
        }
        unsafe {
            self.gl.bind_buffer(self.target, Some(self.handle));
            self.gl.buffer_sub_data_u8_slice(self.target, 0, data);
            self.gl.bind_buffer(self.target, None);
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

impl Drop for GlBuffer {
    fn drop(&mut self) {
        unsafe {
            self.gl.delete_buffer(self.handle);
        }
    }
}
