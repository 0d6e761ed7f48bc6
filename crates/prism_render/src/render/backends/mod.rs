//! Graphics backend implementations
//!
//! One module per supported API. Backends implement
//! [`crate::render::RendererApi`] and are constructed only by
//! [`crate::render::Renderer::init`].

pub mod opengl;
pub mod vulkan;
