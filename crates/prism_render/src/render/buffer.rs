//! GPU buffer abstractions and vertex layout description
//!
//! [`BufferLayout`] is a pure CPU-side description of vertex data consumed
//! when building vertex input state. [`GpuBuffer`] is the opaque handle the
//! facade hands back for backend-specific device memory.

use crate::render::RenderResult;

/// Element types a vertex attribute can have
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderDataType {
    /// Single 32-bit float
    Float,
    /// Two-component float vector
    Float2,
    /// Three-component float vector
    Float3,
    /// Four-component float vector
    Float4,
    /// Single 32-bit signed integer
    Int,
    /// Two-component integer vector
    Int2,
    /// Three-component integer vector
    Int3,
    /// Four-component integer vector
    Int4,
    /// 3x3 float matrix
    Mat3,
    /// 4x4 float matrix
    Mat4,
    /// Boolean, stored as one byte
    Bool,
}

impl ShaderDataType {
    /// Size of the element in bytes
    pub fn size(&self) -> u32 {
        match self {
            ShaderDataType::Float => 4,
            ShaderDataType::Float2 => 4 * 2,
            ShaderDataType::Float3 => 4 * 3,
            ShaderDataType::Float4 => 4 * 4,
            ShaderDataType::Int => 4,
            ShaderDataType::Int2 => 4 * 2,
            ShaderDataType::Int3 => 4 * 3,
            ShaderDataType::Int4 => 4 * 4,
            ShaderDataType::Mat3 => 4 * 3 * 3,
            ShaderDataType::Mat4 => 4 * 4 * 4,
            ShaderDataType::Bool => 1,
        }
    }

    /// Number of scalar components
    pub fn component_count(&self) -> u32 {
        match self {
            ShaderDataType::Float | ShaderDataType::Int | ShaderDataType::Bool => 1,
            ShaderDataType::Float2 | ShaderDataType::Int2 => 2,
            ShaderDataType::Float3 | ShaderDataType::Int3 => 3,
            ShaderDataType::Float4 | ShaderDataType::Int4 => 4,
            ShaderDataType::Mat3 => 3 * 3,
            ShaderDataType::Mat4 => 4 * 4,
        }
    }
}

/// One attribute in a vertex layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferElement {
    /// Element type
    pub data_type: ShaderDataType,
    /// Whether integer data is normalized to [0, 1] when read by the GPU
    pub normalized: bool,
    /// Byte offset from the start of the vertex, computed by the layout
    pub offset: u32,
}

impl BufferElement {
    /// Create a non-normalized element; offset is assigned by [`BufferLayout`]
    pub fn new(data_type: ShaderDataType) -> Self {
        Self {
            data_type,
            normalized: false,
            offset: 0,
        }
    }

    /// Create a normalized element
    pub fn normalized(data_type: ShaderDataType) -> Self {
        Self {
            data_type,
            normalized: true,
            offset: 0,
        }
    }
}

/// Ordered vertex attribute layout with computed offsets and stride
///
/// The stride must match the vertex structure the buffer actually contains or
/// GPU reads corrupt data. That contract is the caller's to uphold; it is not
/// checked at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BufferLayout {
    elements: Vec<BufferElement>,
    stride: u32,
}

impl BufferLayout {
    /// Build a layout from element types, computing offsets and stride
    pub fn new(elements: impl IntoIterator<Item = BufferElement>) -> Self {
        let mut elements: Vec<BufferElement> = elements.into_iter().collect();
        let mut offset = 0;
        for element in &mut elements {
            element.offset = offset;
            offset += element.data_type.size();
        }
        Self {
            elements,
            stride: offset,
        }
    }

    /// The elements in declaration order
    pub fn elements(&self) -> &[BufferElement] {
        &self.elements
    }

    /// Total vertex size in bytes
    pub fn stride(&self) -> u32 {
        self.stride
    }

    /// Whether the layout has no elements
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

/// Binding point a GPU buffer is created for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferUsage {
    /// Vertex data
    Vertex,
    /// Index data (u32 indices)
    Index,
    /// Uniform/constant data
    Uniform,
}

/// Opaque handle to a backend-specific device memory region
///
/// OpenGL buffers are single driver-managed objects with synchronous
/// sub-data uploads. Vulkan buffers pair a persistently mapped staging buffer
/// with a device-local buffer; their `set_data` records a one-shot copy and
/// blocks the calling thread on an upload fence until the copy completes.
/// Callers that re-upload large buffers every frame accept that stall.
pub trait GpuBuffer {
    /// Binding point fixed at creation
    fn usage(&self) -> BufferUsage;

    /// Capacity in bytes
    fn size(&self) -> usize;

    /// Vertex layout, present for vertex buffers
    fn layout(&self) -> Option<&BufferLayout>;

    /// Replace the buffer contents
    ///
    /// `data` must not exceed the capacity the buffer was created with.
    fn set_data(&mut self, data: &[u8]) -> RenderResult<()>;

    /// Downcast seam for backend implementations
    fn as_any(&self) -> &dyn std::any::Any;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_computes_stride_and_offsets() {
        let layout = BufferLayout::new([
            BufferElement::new(ShaderDataType::Float3),
            BufferElement::new(ShaderDataType::Float4),
            BufferElement::new(ShaderDataType::Float2),
        ]);

        assert_eq!(layout.stride(), 4 * 3 + 4 * 4 + 4 * 2);
        assert_eq!(layout.stride(), 36);

        let offsets: Vec<u32> = layout.elements().iter().map(|e| e.offset).collect();
        assert_eq!(offsets, vec![0, 12, 28]);
    }

    #[test]
    fn empty_layout_has_zero_stride() {
        let layout = BufferLayout::default();
        assert!(layout.is_empty());
        assert_eq!(layout.stride(), 0);
    }

    #[test]
    fn matrix_elements_are_scalar_expanded() {
        assert_eq!(ShaderDataType::Mat4.size(), 64);
        assert_eq!(ShaderDataType::Mat4.component_count(), 16);
        assert_eq!(ShaderDataType::Mat3.size(), 36);
    }
}
