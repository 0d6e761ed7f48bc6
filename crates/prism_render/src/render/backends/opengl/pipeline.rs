//! OpenGL pipeline emulation
//!
//! GL has no monolithic pipeline object, so a pipeline here is a linked
//! program plus the fixed-function state recorded in the spec. `apply()`
//! replays that state into the GL state machine when the pipeline is bound.

use std::rc::Rc;

use glow::HasContext;

use super::{GlError, GlResult, GlShader};
use crate::render::pipeline::{
    CullMode, FrontFace, Pipeline, PipelineSpec, PolygonMode, PrimitiveTopology,
};

/// Linked program + rasterizer state
pub struct GlPipeline {
    gl: Rc<glow::Context>,
    program: glow::NativeProgram,
    spec: PipelineSpec,
}

impl GlPipeline {
    /// Link vertex and fragment stages into a program
    pub fn new(
        gl: Rc<glow::Context>,
        spec: &PipelineSpec,
        vertex: &GlShader,
        fragment: &GlShader,
    ) -> GlResult<Self> {
        let program = unsafe { gl.create_program() }.map_err(GlError::Resource)?;
        unsafe {
            gl.attach_shader(program, vertex.handle());
            gl.attach_shader(program, fragment.handle());
            gl.link_program(program);
            gl.detach_shader(program, vertex.handle());
            gl.detach_shader(program, fragment.handle());

            if !gl.get_program_link_status(program) {
                let info_log = gl.get_program_info_log(program);
                gl.delete_program(program);
                return Err(GlError::Link(info_log));
            }
        }

        if !spec.push_constant_ranges.is_empty() {
            // Push constants are a Vulkan concept; GL callers use uniforms.
            log::warn!(
                "Pipeline '{}' declares push-constant ranges; ignored by the OpenGL backend",
                spec.name
            );
        }

        Ok(Self {
            gl,
            program,
            spec: spec.clone(),
        })
    }

    /// Make this pipeline's program and rasterizer state current
    pub fn apply(&self) {
        unsafe {
            self.gl.use_program(Some(self.program));

            match self.spec.cull_mode {
                CullMode::None => self.gl.disable(glow::CULL_FACE),
                CullMode::Front => {
                    self.gl.enable(glow::CULL_FACE);
                    self.gl.cull_face(glow::FRONT);
                }
                CullMode::Back => {
                    self.gl.enable(glow::CULL_FACE);
                    self.gl.cull_face(glow::BACK);
                }
            }

            self.gl.front_face(match self.spec.front_face {
                FrontFace::CounterClockwise => glow::CCW,
                FrontFace::Clockwise => glow::CW,
            });

            self.gl.polygon_mode(
                glow::FRONT_AND_BACK,
                match self.spec.polygon_mode {
                    PolygonMode::Fill => glow::FILL,
                    PolygonMode::Line => glow::LINE,
                },
            );
        }
    }

    /// GL draw mode for this pipeline's topology
    pub fn draw_mode(&self) -> u32 {
        match self.spec.topology {
            PrimitiveTopology::TriangleList => glow::TRIANGLES,
            PrimitiveTopology::LineList => glow::LINES,
        }
    }
}

impl Pipeline for GlPipeline {
    fn spec(&self) -> &PipelineSpec {
        &self.spec
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

impl Drop for GlPipeline {
    fn drop(&mut self) {
        unsafe {
            self.gl.delete_program(self.program);
        }
    }
}
