//! Graphics pipeline description
//!
//! A pipeline bakes shader stages, vertex layout and fixed-function
//! rasterization state into one immutable object ready for draw submission.
//! Changing any baked state requires destroying and recreating the pipeline.

use crate::render::buffer::BufferLayout;

/// Face culling mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CullMode {
    /// No culling
    None,
    /// Cull front faces
    Front,
    /// Cull back faces
    #[default]
    Back,
}

/// Polygon rasterization mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PolygonMode {
    /// Filled polygons
    #[default]
    Fill,
    /// Wireframe
    Line,
}

/// Winding order considered front-facing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrontFace {
    /// Counter-clockwise winding is front-facing
    #[default]
    CounterClockwise,
    /// Clockwise winding is front-facing
    Clockwise,
}

/// Primitive assembly topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrimitiveTopology {
    /// Independent triangles
    #[default]
    TriangleList,
    /// Independent line segments
    LineList,
}

/// Named push-constant range (consumed by the Vulkan backend only)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushConstantRange {
    /// Name used to address the range from application code
    pub name: String,
    /// Byte offset within the push-constant block
    pub offset: u32,
    /// Size of the range in bytes
    pub size: u32,
}

/// Everything baked into a graphics pipeline at creation time
#[derive(Debug, Clone, Default)]
pub struct PipelineSpec {
    /// Debug name, used in log output
    pub name: String,
    /// Vertex attribute layout the pipeline consumes
    pub layout: BufferLayout,
    /// Face culling mode
    pub cull_mode: CullMode,
    /// Polygon rasterization mode
    pub polygon_mode: PolygonMode,
    /// Front-face winding
    pub front_face: FrontFace,
    /// Primitive topology
    pub topology: PrimitiveTopology,
    /// Push-constant ranges (Vulkan)
    pub push_constant_ranges: Vec<PushConstantRange>,
}

/// Opaque handle to a baked backend pipeline
pub trait Pipeline {
    /// The spec this pipeline was created from
    fn spec(&self) -> &PipelineSpec;

    /// Downcast seam for backend implementations
    fn as_any(&self) -> &dyn std::any::Any;
}
