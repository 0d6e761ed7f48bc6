//! Window boundary
//!
//! The renderer does not create or manage windows. It consumes a
//! [`RenderSurface`] implemented by the application's windowing layer, which
//! supplies the native handles for surface creation, the current framebuffer
//! size, vsync control and (for OpenGL) the proc-address loader and
//! swap-buffers call.
//!
//! Ownership stays acyclic: backends hold a shared handle to the surface, the
//! surface never references the renderer.

use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

use crate::render::api::RendererApiType;

/// Everything the rendering backends need from the window
pub trait RenderSurface {
    /// The graphics API the window was configured for
    fn configured_api(&self) -> RendererApiType;

    /// Current framebuffer size in pixels
    fn framebuffer_size(&self) -> (u32, u32);

    /// Whether vsync is enabled
    fn vsync(&self) -> bool;

    /// Enable or disable vsync
    fn set_vsync(&mut self, enabled: bool);

    /// Raw display handle for Vulkan surface creation
    fn raw_display_handle(&self) -> RawDisplayHandle;

    /// Raw window handle for Vulkan surface creation
    fn raw_window_handle(&self) -> RawWindowHandle;

    /// Resolve an OpenGL function pointer by symbol name
    ///
    /// Only called by the OpenGL backend, and only while the window's GL
    /// context is current.
    fn gl_proc_address(&mut self, symbol: &str) -> *const std::ffi::c_void;

    /// Swap the window's front and back buffers (OpenGL presentation)
    fn swap_buffers(&mut self);
}
