//! Sampled texture abstraction
//!
//! Textures are created from already-decoded pixel data; image file decoding
//! happens outside this crate at the asset boundary.

/// Description of decoded pixel data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureDesc {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Channel count: 1 (R), 3 (RGB) or 4 (RGBA)
    pub channels: u32,
}

impl TextureDesc {
    /// Expected byte length of the pixel buffer for this description
    pub fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * self.channels as usize
    }
}

/// Opaque handle to a backend-specific sampled image resource
pub trait Texture {
    /// Width in pixels
    fn width(&self) -> u32;

    /// Height in pixels
    fn height(&self) -> u32;

    /// Downcast seam for backend implementations
    fn as_any(&self) -> &dyn std::any::Any;
}
