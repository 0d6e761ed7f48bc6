//! Graphics pipeline construction
//!
//! Viewport and scissor are dynamic state so window resizes do not force
//! pipeline rebuilds; everything else is baked from the spec at creation.

use std::cell::RefCell;
use std::ffi::CStr;
use std::rc::Rc;

use ash::vk;

use super::{DeferredResource, DeletionQueue, VulkanContext, VulkanError, VulkanResult, VulkanShader};
use crate::render::buffer::{BufferLayout, ShaderDataType};
use crate::render::pipeline::{
    CullMode, FrontFace, Pipeline, PipelineSpec, PolygonMode, PrimitiveTopology,
};

/// Baked graphics pipeline and its layout
pub struct VulkanPipeline {
    deletion: Rc<RefCell<DeletionQueue>>,
    pipeline: vk::Pipeline,
    layout: vk::PipelineLayout,
    spec: PipelineSpec,
}

impl VulkanPipeline {
    /// Bake a pipeline targeting `render_pass`
    pub fn new(
        context: &VulkanContext,
        render_pass: vk::RenderPass,
        spec: &PipelineSpec,
        vertex: &VulkanShader,
        fragment: &VulkanShader,
    ) -> VulkanResult<Self> {
        let device = &context.device;

        let entry_point = CStr::from_bytes_with_nul(b"main\0")
            .map_err(|_| VulkanError::InvalidOperation("Bad entry point name".to_string()))?;
        let stages = [
            vk::PipelineShaderStageCreateInfo::builder()
                .stage(vertex.stage_flags())
                .module(vertex.module())
                .name(entry_point)
                .build(),
            vk::PipelineShaderStageCreateInfo::builder()
                .stage(fragment.stage_flags())
                .module(fragment.module())
                .name(entry_point)
                .build(),
        ];

        let bindings;
        let attributes = Self::vertex_attributes(&spec.layout)?;
        let mut vertex_input = vk::PipelineVertexInputStateCreateInfo::builder();
        if !spec.layout.is_empty() {
            bindings = [vk::VertexInputBindingDescription {
                binding: 0,
                stride: spec.layout.stride(),
                input_rate: vk::VertexInputRate::VERTEX,
            }];
            vertex_input = vertex_input
                .vertex_binding_descriptions(&bindings)
                .vertex_attribute_descriptions(&attributes);
        }

        let topology = match spec.topology {
            PrimitiveTopology::TriangleList => vk::PrimitiveTopology::TRIANGLE_LIST,
            PrimitiveTopology::LineList => vk::PrimitiveTopology::LINE_LIST,
        };
        let input_assembly =
            vk::PipelineInputAssemblyStateCreateInfo::builder().topology(topology);

        // Actual viewport/scissor are set per frame; only the counts are baked.
        let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
            .viewport_count(1)
            .scissor_count(1);
        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state =
            vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(&dynamic_states);

        let rasterization = vk::PipelineRasterizationStateCreateInfo::builder()
            .polygon_mode(match spec.polygon_mode {
                PolygonMode::Fill => vk::PolygonMode::FILL,
                PolygonMode::Line => vk::PolygonMode::LINE,
            })
            .cull_mode(match spec.cull_mode {
                CullMode::None => vk::CullModeFlags::NONE,
                CullMode::Front => vk::CullModeFlags::FRONT,
                CullMode::Back => vk::CullModeFlags::BACK,
            })
            .front_face(match spec.front_face {
                FrontFace::CounterClockwise => vk::FrontFace::COUNTER_CLOCKWISE,
                FrontFace::Clockwise => vk::FrontFace::CLOCKWISE,
            })
            .line_width(1.0);

        let multisample = vk::PipelineMultisampleStateCreateInfo::builder()
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let blend_attachment = vk::PipelineColorBlendAttachmentState::builder()
            .color_write_mask(vk::ColorComponentFlags::RGBA)
            .blend_enable(false)
            .build();
        let blend_attachments = [blend_attachment];
        let color_blend = vk::PipelineColorBlendStateCreateInfo::builder()
            .attachments(&blend_attachments);

        let push_ranges: Vec<vk::PushConstantRange> = spec
            .push_constant_ranges
            .iter()
            .map(|range| vk::PushConstantRange {
                stage_flags: vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
                offset: range.offset,
                size: range.size,
            })
            .collect();
        let layout_info = vk::PipelineLayoutCreateInfo::builder()
            .push_constant_ranges(&push_ranges);
        let layout = unsafe {
            device
                .create_pipeline_layout(&layout_info, None)
                .map_err(VulkanError::Api)?
        };

        let create_info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization)
            .multisample_state(&multisample)
            .color_blend_state(&color_blend)
            .dynamic_state(&dynamic_state)
            .layout(layout)
            .render_pass(render_pass)
            .subpass(0);

        let pipeline = unsafe {
            device.create_graphics_pipelines(
                vk::PipelineCache::null(),
                &[create_info.build()],
                None,
            )
        };
        let pipeline = match pipeline {
            Ok(pipelines) => pipelines[0],
            Err((_, e)) => {
                unsafe { device.destroy_pipeline_layout(layout, None) };
                return Err(VulkanError::Api(e));
            }
        };

        log::debug!("Pipeline '{}' baked", spec.name);
        Ok(Self {
            deletion: Rc::clone(&context.deletion),
            pipeline,
            layout,
            spec: spec.clone(),
        })
    }

    fn vertex_attributes(
        layout: &BufferLayout,
    ) -> VulkanResult<Vec<vk::VertexInputAttributeDescription>> {
        layout
            .elements()
            .iter()
            .enumerate()
            .map(|(location, element)| {
                let format = match element.data_type {
                    ShaderDataType::Float => vk::Format::R32_SFLOAT,
                    ShaderDataType::Float2 => vk::Format::R32G32_SFLOAT,
                    ShaderDataType::Float3 => vk::Format::R32G32B32_SFLOAT,
                    ShaderDataType::Float4 => vk::Format::R32G32B32A32_SFLOAT,
                    ShaderDataType::Int => vk::Format::R32_SINT,
                    ShaderDataType::Int2 => vk::Format::R32G32_SINT,
                    ShaderDataType::Int3 => vk::Format::R32G32B32_SINT,
                    ShaderDataType::Int4 => vk::Format::R32G32B32A32_SINT,
                    ShaderDataType::Bool => vk::Format::R8_UNORM,
                    ShaderDataType::Mat3 | ShaderDataType::Mat4 => {
                        return Err(VulkanError::InvalidOperation(
                            "Matrix vertex attributes must be split into vectors".to_string(),
                        ))
                    }
                };
                Ok(vk::VertexInputAttributeDescription {
                    location: location as u32,
                    binding: 0,
                    format,
                    offset: element.offset,
                })
            })
            .collect()
    }

    /// Raw pipeline handle
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }

    /// Raw pipeline layout, needed for push-constant updates
    pub fn layout_handle(&self) -> vk::PipelineLayout {
        self.layout
    }
}

impl Pipeline for VulkanPipeline {
    fn spec(&self) -> &PipelineSpec {
        &self.spec
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

impl Drop for VulkanPipeline {
    fn drop(&mut self) {
        self.deletion.borrow_mut().defer(DeferredResource::Pipeline {
            pipeline: self.pipeline,
            layout: self.layout,
        });
    }
}
