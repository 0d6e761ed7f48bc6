//! Immediate-mode geometry batching
//!
//! CPU-side accumulation of per-primitive-kind vertex data, flushed as one
//! draw call per kind at frame end. This is deliberately not a
//! sorting/material batcher: draws go out with whatever pipeline the caller
//! last submitted, in accumulation order.

use nalgebra::Vector3;

use crate::render::api::RendererApi;
use crate::render::buffer::{
    BufferElement, BufferLayout, BufferUsage, GpuBuffer, ShaderDataType,
};
use crate::render::renderer::RenderStats;
use crate::render::RenderResult;

/// Vertex format shared by all batched primitives
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct BatchVertex {
    /// World-space position
    pub position: [f32; 3],
    /// RGBA color
    pub color: [f32; 4],
}

impl BatchVertex {
    /// Vertex layout matching [`BatchVertex`]
    pub fn layout() -> BufferLayout {
        BufferLayout::new([
            BufferElement::new(ShaderDataType::Float3),
            BufferElement::new(ShaderDataType::Float4),
        ])
    }
}

#[derive(Default)]
struct KindBuffers {
    vertex: Option<Box<dyn GpuBuffer>>,
    index: Option<Box<dyn GpuBuffer>>,
}

/// Accumulates quads, cubes and lines for one-draw-per-kind flushing
#[derive(Default)]
pub struct GeometryBatcher {
    quad_vertices: Vec<BatchVertex>,
    quad_indices: Vec<u32>,
    cube_vertices: Vec<BatchVertex>,
    cube_indices: Vec<u32>,
    line_vertices: Vec<BatchVertex>,

    quads: KindBuffers,
    cubes: KindBuffers,
    lines: KindBuffers,
}

impl GeometryBatcher {
    /// Create an empty batcher
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an axis-aligned quad in the XY plane
    pub fn add_quad(&mut self, center: Vector3<f32>, size: [f32; 2], color: [f32; 4]) {
        let base = self.quad_vertices.len() as u32;
        let half = [size[0] * 0.5, size[1] * 0.5];

        let corners = [
            [center.x - half[0], center.y - half[1], center.z],
            [center.x + half[0], center.y - half[1], center.z],
            [center.x + half[0], center.y + half[1], center.z],
            [center.x - half[0], center.y + half[1], center.z],
        ];
        for position in corners {
            self.quad_vertices.push(BatchVertex { position, color });
        }
        self.quad_indices
            .extend([0, 1, 2, 2, 3, 0].map(|i| base + i));
    }

    /// Queue an axis-aligned cube
    pub fn add_cube(&mut self, center: Vector3<f32>, size: [f32; 3], color: [f32; 4]) {
        let base = self.cube_vertices.len() as u32;
        let half = [size[0] * 0.5, size[1] * 0.5, size[2] * 0.5];

        // 8 corners; the batch vertex carries no normals, so faces share them.
        for i in 0..8u32 {
            let position = [
                center.x + if i & 1 != 0 { half[0] } else { -half[0] },
                center.y + if i & 2 != 0 { half[1] } else { -half[1] },
                center.z + if i & 4 != 0 { half[2] } else { -half[2] },
            ];
            self.cube_vertices.push(BatchVertex { position, color });
        }

        const FACES: [u32; 36] = [
            0, 1, 3, 3, 2, 0, // -Z
            4, 6, 7, 7, 5, 4, // +Z
            0, 2, 6, 6, 4, 0, // -X
            1, 5, 7, 7, 3, 1, // +X
            0, 4, 5, 5, 1, 0, // -Y
            2, 3, 7, 7, 6, 2, // +Y
        ];
        self.cube_indices.extend(FACES.map(|i| base + i));
    }

    /// Queue a line segment
    pub fn add_line(&mut self, from: Vector3<f32>, to: Vector3<f32>, color: [f32; 4]) {
        self.line_vertices.push(BatchVertex {
            position: [from.x, from.y, from.z],
            color,
        });
        self.line_vertices.push(BatchVertex {
            position: [to.x, to.y, to.z],
            color,
        });
    }

    /// Vertices queued for the quad batch since the last flush
    pub fn quad_vertex_count(&self) -> u32 {
        self.quad_vertices.len() as u32
    }

    /// Indices queued for the quad batch since the last flush
    pub fn quad_index_count(&self) -> u32 {
        self.quad_indices.len() as u32
    }

    /// Vertices queued for the cube batch since the last flush
    pub fn cube_vertex_count(&self) -> u32 {
        self.cube_vertices.len() as u32
    }

    /// Indices queued for the cube batch since the last flush
    pub fn cube_index_count(&self) -> u32 {
        self.cube_indices.len() as u32
    }

    /// Vertices queued for the line batch since the last flush
    pub fn line_vertex_count(&self) -> u32 {
        self.line_vertices.len() as u32
    }

    /// Whether nothing is queued
    pub fn is_empty(&self) -> bool {
        self.quad_vertices.is_empty()
            && self.cube_vertices.is_empty()
            && self.line_vertices.is_empty()
    }

    /// Upload accumulated vertices and issue one draw call per geometry kind
    ///
    /// Buffers are grown (recreated) when a batch outgrows them and reused
    /// otherwise. Reuse means a `set_data` per kind per frame, which on the
    /// Vulkan backend is a synchronous staging copy.
    pub fn flush(
        &mut self,
        api: &mut dyn RendererApi,
        stats: &mut RenderStats,
    ) -> RenderResult<()> {
        if !self.quad_vertices.is_empty() {
            let vertices = std::mem::take(&mut self.quad_vertices);
            let indices = std::mem::take(&mut self.quad_indices);
            Self::draw_indexed_batch(api, stats, &mut self.quads, &vertices, &indices)?;
        }
        if !self.cube_vertices.is_empty() {
            let vertices = std::mem::take(&mut self.cube_vertices);
            let indices = std::mem::take(&mut self.cube_indices);
            Self::draw_indexed_batch(api, stats, &mut self.cubes, &vertices, &indices)?;
        }
        if !self.line_vertices.is_empty() {
            let vertices = std::mem::take(&mut self.line_vertices);
            let bytes: &[u8] = bytemuck::cast_slice(&vertices);
            Self::upload(
                api,
                &mut self.lines.vertex,
                BufferUsage::Vertex,
                Some(BatchVertex::layout()),
                bytes,
            )?;
            if let Some(buffer) = self.lines.vertex.as_deref() {
                api.bind_vertex_buffer(buffer)?;
            }
            api.draw_lines(vertices.len() as u32)?;
            stats.draw_calls += 1;
            stats.vertices += vertices.len() as u32;
        }
        Ok(())
    }

    fn draw_indexed_batch(
        api: &mut dyn RendererApi,
        stats: &mut RenderStats,
        buffers: &mut KindBuffers,
        vertices: &[BatchVertex],
        indices: &[u32],
    ) -> RenderResult<()> {
        let vertex_bytes: &[u8] = bytemuck::cast_slice(vertices);
        let index_bytes: &[u8] = bytemuck::cast_slice(indices);

        Self::upload(
            api,
            &mut buffers.vertex,
            BufferUsage::Vertex,
            Some(BatchVertex::layout()),
            vertex_bytes,
        )?;
        Self::upload(api, &mut buffers.index, BufferUsage::Index, None, index_bytes)?;

        if let Some(buffer) = buffers.vertex.as_deref() {
            api.bind_vertex_buffer(buffer)?;
        }
        if let Some(buffer) = buffers.index.as_deref() {
            api.bind_index_buffer(buffer)?;
        }
        api.draw_indexed(indices.len() as u32)?;

        stats.draw_calls += 1;
        stats.vertices += vertices.len() as u32;
        stats.indices += indices.len() as u32;
        Ok(())
    }

    fn upload(
        api: &mut dyn RendererApi,
        slot: &mut Option<Box<dyn GpuBuffer>>,
        usage: BufferUsage,
        layout: Option<BufferLayout>,
        bytes: &[u8],
    ) -> RenderResult<()> {
        match slot {
            Some(buffer) if buffer.size() >= bytes.len() => buffer.set_data(bytes),
            _ => {
                *slot = Some(api.create_buffer(usage, layout, bytes.len(), Some(bytes))?);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quad_accumulates_four_vertices_six_indices() {
        let mut batcher = GeometryBatcher::new();
        batcher.add_quad(Vector3::zeros(), [1.0, 1.0], [1.0; 4]);

        assert_eq!(batcher.quad_vertex_count(), 4);
        assert_eq!(batcher.quad_index_count(), 6);
    }

    #[test]
    fn quad_corners_span_the_requested_size() {
        let mut batcher = GeometryBatcher::new();
        batcher.add_quad(Vector3::new(1.0, 2.0, 0.0), [2.0, 4.0], [1.0; 4]);

        let xs: Vec<f32> = batcher.quad_vertices.iter().map(|v| v.position[0]).collect();
        let ys: Vec<f32> = batcher.quad_vertices.iter().map(|v| v.position[1]).collect();
        assert_eq!(xs, vec![0.0, 2.0, 2.0, 0.0]);
        assert_eq!(ys, vec![0.0, 0.0, 4.0, 4.0]);
    }

    #[test]
    fn second_quad_offsets_its_indices() {
        let mut batcher = GeometryBatcher::new();
        batcher.add_quad(Vector3::zeros(), [1.0, 1.0], [1.0; 4]);
        batcher.add_quad(Vector3::zeros(), [1.0, 1.0], [1.0; 4]);

        assert_eq!(batcher.quad_index_count(), 12);
        assert_eq!(&batcher.quad_indices[6..], &[4, 5, 6, 6, 7, 4]);
    }

    #[test]
    fn cube_accumulates_eight_vertices_thirty_six_indices() {
        let mut batcher = GeometryBatcher::new();
        batcher.add_cube(Vector3::zeros(), [1.0, 1.0, 1.0], [1.0; 4]);

        assert_eq!(batcher.cube_vertex_count(), 8);
        assert_eq!(batcher.cube_index_count(), 36);
    }

    #[test]
    fn lines_accumulate_two_vertices_each() {
        let mut batcher = GeometryBatcher::new();
        batcher.add_line(Vector3::zeros(), Vector3::new(1.0, 0.0, 0.0), [1.0; 4]);
        batcher.add_line(Vector3::zeros(), Vector3::new(0.0, 1.0, 0.0), [1.0; 4]);

        assert_eq!(batcher.line_vertex_count(), 4);
        assert!(!batcher.is_empty());
    }
}
