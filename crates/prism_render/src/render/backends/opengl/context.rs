//! OpenGL context ownership
//!
//! For OpenGL the graphics context is the GL function table plus the window's
//! swap-buffers call. The windowing layer owns the real OS context and keeps
//! it current on the render thread; this wrapper owns the loaded function
//! pointers and the shared surface handle used for presentation.

use std::cell::RefCell;
use std::rc::Rc;

use glow::HasContext;

use super::{GlError, GlResult};
use crate::render::window::RenderSurface;

/// OpenGL connection to a window
pub struct GlContext {
    gl: Rc<glow::Context>,
    surface: Rc<RefCell<dyn RenderSurface>>,
}

impl GlContext {
    /// Load GL function pointers through the surface's proc-address loader
    ///
    /// The surface's GL context must already be current on this thread.
    pub fn new(surface: Rc<RefCell<dyn RenderSurface>>) -> GlResult<Self> {
        let gl = {
            let mut window = surface.borrow_mut();
            unsafe { glow::Context::from_loader_function(|symbol| window.gl_proc_address(symbol)) }
        };

        let version = unsafe { gl.get_parameter_string(glow::VERSION) };
        let renderer = unsafe { gl.get_parameter_string(glow::RENDERER) };
        if version.is_empty() {
            return Err(GlError::Context(
                "GL function loading produced no usable context".to_string(),
            ));
        }
        log::info!("OpenGL context: {} on {}", version, renderer);

        Ok(Self {
            gl: Rc::new(gl),
            surface,
        })
    }

    /// Shared GL function table
    pub fn gl(&self) -> Rc<glow::Context> {
        self.gl.clone()
    }

    /// Current framebuffer size in pixels
    pub fn framebuffer_size(&self) -> (u32, u32) {
        self.surface.borrow().framebuffer_size()
    }

    /// Present the frame via the window's swap-buffers call
    pub fn swap_buffers(&self) {
        self.surface.borrow_mut().swap_buffers();
    }
}
