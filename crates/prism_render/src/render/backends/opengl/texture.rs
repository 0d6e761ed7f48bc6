//! OpenGL texture upload
//!
//! Consumes already-decoded pixel buffers; image decoding lives at the asset
//! boundary outside this crate.

use std::rc::Rc;

use glow::HasContext;

use super::{GlError, GlResult};
use crate::render::texture::{Texture, TextureDesc};

/// OpenGL sampled 2D texture
pub struct GlTexture {
    gl: Rc<glow::Context>,
    handle: glow::NativeTexture,
    width: u32,
    height: u32,
}

impl GlTexture {
    /// Upload decoded pixels into a new 2D texture
    pub fn new(gl: Rc<glow::Context>, desc: &TextureDesc, pixels: &[u8]) -> GlResult<Self> {
        let (internal_format, format) = match desc.channels {
            1 => (glow::R8, glow::RED),
            3 => (glow::RGB8, glow::RGB),
            4 => (glow::RGBA8, glow::RGBA),
            other => {
                return Err(GlError::Resource(format!(
                    "Unsupported channel count {} (expected 1, 3 or 4)",
                    other
                )))
            }
        };

        let handle = unsafe { gl.create_texture() }.map_err(GlError::Resource)?;
        unsafe {
            gl.bind_texture(glow::TEXTURE_2D, Some(handle));
            // Decoded pixel rows are tightly packed regardless of channel count.
            gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);
            gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                internal_format as i32,
                desc.width as i32,
                desc.height as i32,
                0,
                format,
                glow::UNSIGNED_BYTE,
                Some(pixels),
            );
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MIN_FILTER,
                glow::LINEAR_MIPMAP_LINEAR as i32,
            );
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, glow::LINEAR as i32);
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_S, glow::REPEAT as i32);
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_T, glow::REPEAT as i32);
            gl.generate_mipmap(glow::TEXTURE_2D);
            gl.bind_texture(glow::TEXTURE_2D, None);
        }

        Ok(Self {
            gl,
            handle,
            width: desc.width,
            height: desc.height,
        })
    }

    /// Bind to a texture unit
    pub fn bind(&self, unit: u32) {
        unsafe {
            self.gl.active_texture(glow::TEXTURE0 + unit);
            self.gl.bind_texture(glow::TEXTURE_2D, Some(self.handle));
        }
    }
}

impl Texture for GlTexture {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

impl Drop for GlTexture {
    fn drop(&mut self) {
        unsafe {
            self.gl.delete_texture(self.handle);
        }
    }
}
