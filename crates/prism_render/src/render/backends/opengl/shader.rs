//! OpenGL shader compilation
//!
//! The driver compiles GLSL source; compile logs become resource-creation
//! errors. SPIR-V payloads are rejected here, that path belongs to Vulkan.

use std::rc::Rc;

use glow::HasContext;

use super::{GlError, GlResult};
use crate::render::shader::{Shader, ShaderSource, ShaderStage};

/// Compiled OpenGL shader stage
pub struct GlShader {
    gl: Rc<glow::Context>,
    handle: glow::NativeShader,
    stage: ShaderStage,
}

impl GlShader {
    /// Compile a shader stage from GLSL source
    pub fn new(gl: Rc<glow::Context>, stage: ShaderStage, source: &ShaderSource) -> GlResult<Self> {
        let ShaderSource::Glsl(source) = source else {
            return Err(GlError::Compile(
                "OpenGL backend expects GLSL source, got SPIR-V".to_string(),
            ));
        };

        let shader_type = match stage {
            ShaderStage::Vertex => glow::VERTEX_SHADER,
            ShaderStage::Fragment => glow::FRAGMENT_SHADER,
        };

        let handle = unsafe { gl.create_shader(shader_type) }.map_err(GlError::Resource)?;
        unsafe {
            gl.shader_source(handle, source);
            gl.compile_shader(handle);
            if !gl.get_shader_compile_status(handle) {
                let info_log = gl.get_shader_info_log(handle);
                gl.delete_shader(handle);
                return Err(GlError::Compile(info_log));
            }
        }

        Ok(Self { gl, handle, stage })
    }

    /// Raw GL handle, used during program linking
    pub fn handle(&self) -> glow::NativeShader {
        self.handle
    }
}

impl Shader for GlShader {
    fn stage(&self) -> ShaderStage {
        self.stage
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

impl Drop for GlShader {
    fn drop(&mut self) {
        unsafe {
            self.gl.delete_shader(self.handle);
        }
    }
}
