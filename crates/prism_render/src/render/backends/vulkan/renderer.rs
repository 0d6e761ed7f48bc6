//! Vulkan implementation of the backend strategy
//!
//! Frames cycle through a two-deep ring: begin waits on the slot's fence,
//! acquires a swapchain image and opens a render pass; end submits the
//! command buffer (fenced on the slot) and queues the present. Out-of-date
//! swapchains are rebuilt in place on acquire and present.

use std::cell::RefCell;
use std::rc::Rc;

use ash::vk;

use super::{
    check_vk, CommandPool, Fence, Semaphore, Swapchain, VulkanBuffer, VulkanContext,
    VulkanPipeline, VulkanResult, VulkanShader, VulkanTexture,
};
use crate::render::api::{DeviceLimits, RendererApi, RendererApiType};
use crate::render::buffer::{BufferLayout, BufferUsage, GpuBuffer};
use crate::render::frame::FrameRing;
use crate::render::pipeline::{Pipeline, PipelineSpec};
use crate::render::shader::{Shader, ShaderSource, ShaderStage};
use crate::render::texture::{Texture, TextureDesc};
use crate::render::window::RenderSurface;
use crate::render::{RenderError, RenderResult};

const MAX_FRAMES_IN_FLIGHT: usize = 2;

/// Per-slot recording and synchronization objects
struct VulkanFrame {
    command_buffer: vk::CommandBuffer,
    image_available: Semaphore,
    render_finished: Semaphore,
}

/// Vulkan backend
pub struct VulkanRenderer {
    // Declaration order doubles as destruction order: everything referencing
    // the device must go before `context`.
    swapchain: Swapchain,
    frames: Vec<VulkanFrame>,
    ring: FrameRing<Fence>,
    command_pool: CommandPool,
    surface: Rc<RefCell<dyn RenderSurface>>,
    clear_color: [f32; 4],
    current_slot: usize,
    current_image: u32,
    recording: bool,
    context: VulkanContext,
}

impl VulkanRenderer {
    /// Create the backend against a surface configured for Vulkan
    pub fn new(surface: Rc<RefCell<dyn RenderSurface>>) -> VulkanResult<Self> {
        let context = VulkanContext::new(&*surface.borrow())?;
        let (width, height) = surface.borrow().framebuffer_size();
        let vsync = surface.borrow().vsync();
        let swapchain = Swapchain::new(&context, width, height, vsync, vk::SwapchainKHR::null())?;

        let command_pool = CommandPool::new(
            context.device.clone(),
            context.physical.families.graphics,
            vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
        )?;
        let command_buffers = command_pool.allocate(MAX_FRAMES_IN_FLIGHT as u32)?;

        let mut frames = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
        let mut fences = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
        for command_buffer in command_buffers {
            frames.push(VulkanFrame {
                command_buffer,
                image_available: Semaphore::new(context.device.clone())?,
                render_finished: Semaphore::new(context.device.clone())?,
            });
            // Signaled so the first pass over the ring does not block.
            fences.push(Fence::new(context.device.clone(), true)?);
        }
        let ring = FrameRing::new(fences);

        log::info!(
            "Vulkan backend ready: {} frames in flight, {} swapchain images",
            MAX_FRAMES_IN_FLIGHT,
            swapchain.image_count()
        );

        Ok(Self {
            swapchain,
            frames,
            ring,
            command_pool,
            surface,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            current_slot: 0,
            current_image: 0,
            recording: false,
            context,
        })
    }

    fn require_recording(&self) -> RenderResult<()> {
        if self.recording {
            Ok(())
        } else {
            Err(RenderError::InvalidOperation(
                "No frame is being recorded; call begin_frame first".to_string(),
            ))
        }
    }

    fn current_cmd(&self) -> vk::CommandBuffer {
        self.frames[self.current_slot].command_buffer
    }

    /// Rebuild the swapchain for the surface's current size and vsync state
    fn recreate_swapchain(&mut self) -> VulkanResult<()> {
        let (width, height) = self.surface.borrow().framebuffer_size();
        if width == 0 || height == 0 {
            // Minimized; keep the old swapchain until the surface has area.
            return Ok(());
        }
        let vsync = self.surface.borrow().vsync();

        self.context.wait_idle()?;
        let rebuilt = Swapchain::new(&self.context, width, height, vsync, self.swapchain.handle())?;
        // The retired swapchain drops here, after the device went idle.
        self.swapchain = rebuilt;
        self.context.deletion.borrow_mut().flush();
        log::debug!("Swapchain recreated at {}x{}", width, height);
        Ok(())
    }

    /// Acquire a swapchain image for the already-claimed frame slot
    ///
    /// By the time this runs the slot's fence has been waited and reset, so
    /// bailing out with an error would leave a slot whose fence nothing will
    /// ever signal; the next pass over the ring would then block forever.
    /// Every failure here is therefore fatal (log + abort), matching the rest
    /// of the frame path.
    fn acquire_image(&mut self) -> u32 {
        let semaphore = self.frames[self.current_slot].image_available.handle();
        match self.swapchain.acquire_next_image(semaphore) {
            Ok((index, suboptimal)) => {
                if suboptimal {
                    log::warn!("Swapchain suboptimal on acquire; recreating after this frame");
                }
                index
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                if let Err(e) = self.recreate_swapchain() {
                    log::error!("Fatal Vulkan error during swapchain recreation: {}", e);
                    std::process::abort();
                }
                // One retry against the fresh swapchain; a second failure is
                // a device/surface state this design treats as fatal.
                let (index, _) = check_vk(
                    self.swapchain.acquire_next_image(semaphore),
                    "swapchain image acquire",
                );
                index
            }
            Err(e) => check_vk(Err(e), "swapchain image acquire"),
        }
    }

    fn begin_render_pass(&self, image_index: u32) {
        let device = &self.context.device;
        let cmd = self.current_cmd();
        let extent = self.swapchain.extent();

        let clear_value = vk::ClearValue {
            color: vk::ClearColorValue {
                float32: self.clear_color,
            },
        };
        let clear_values = [clear_value];
        let begin_info = vk::RenderPassBeginInfo::builder()
            .render_pass(self.swapchain.render_pass())
            .framebuffer(self.swapchain.framebuffer(image_index))
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            })
            .clear_values(&clear_values);

        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        let scissor = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };

        unsafe {
            device.cmd_begin_render_pass(cmd, &begin_info, vk::SubpassContents::INLINE);
            device.cmd_set_viewport(cmd, 0, &[viewport]);
            device.cmd_set_scissor(cmd, 0, &[scissor]);
        }
    }

    fn downcast_buffer<'a>(
        buffer: &'a dyn GpuBuffer,
        expected: BufferUsage,
    ) -> RenderResult<&'a VulkanBuffer> {
        if buffer.usage() != expected {
            return Err(RenderError::InvalidOperation(format!(
                "Expected a {:?} buffer, got {:?}",
                expected,
                buffer.usage()
            )));
        }
        buffer
            .as_any()
            .downcast_ref::<VulkanBuffer>()
            .ok_or_else(|| {
                RenderError::InvalidOperation(
                    "Buffer was not created by the Vulkan backend".to_string(),
                )
            })
    }
}

impl RendererApi for VulkanRenderer {
    fn api_type(&self) -> RendererApiType {
        RendererApiType::Vulkan
    }

    fn device_limits(&self) -> DeviceLimits {
        self.context.limits()
    }

    fn set_clear_color(&mut self, color: [f32; 4]) {
        self.clear_color = color;
    }

    fn clear(&mut self) {
        // Outside a frame the clear color is applied by the next render pass
        // load op; mid-frame it clears the attachment in place.
        if !self.recording {
            return;
        }
        let extent = self.swapchain.extent();
        let attachment = vk::ClearAttachment {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            color_attachment: 0,
            clear_value: vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: self.clear_color,
                },
            },
        };
        let rect = vk::ClearRect {
            rect: vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            },
            base_array_layer: 0,
            layer_count: 1,
        };
        unsafe {
            self.context
                .device
                .cmd_clear_attachments(self.current_cmd(), &[attachment], &[rect]);
        }
    }

    fn set_viewport(&mut self, x: i32, y: i32, width: u32, height: u32) {
        if !self.recording {
            return;
        }
        let viewport = vk::Viewport {
            x: x as f32,
            y: y as f32,
            width: width as f32,
            height: height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        let scissor = vk::Rect2D {
            offset: vk::Offset2D { x, y },
            extent: vk::Extent2D { width, height },
        };
        unsafe {
            self.context
                .device
                .cmd_set_viewport(self.current_cmd(), 0, &[viewport]);
            self.context
                .device
                .cmd_set_scissor(self.current_cmd(), 0, &[scissor]);
        }
    }

    fn begin_frame(&mut self) -> RenderResult<()> {
        if self.recording {
            return Err(RenderError::InvalidOperation(
                "begin_frame called while a frame is already being recorded".to_string(),
            ));
        }

        // Backpressure: blocks until this slot's previous frame retires.
        self.current_slot = self.ring.begin();
        self.current_image = self.acquire_image();

        let device = &self.context.device;
        let cmd = self.current_cmd();
        let begin_info = vk::CommandBufferBeginInfo::builder();
        check_vk(
            unsafe { device.reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty()) },
            "command buffer reset",
        );
        check_vk(
            unsafe { device.begin_command_buffer(cmd, &begin_info) },
            "command buffer begin",
        );

        self.begin_render_pass(self.current_image);
        self.recording = true;
        Ok(())
    }

    fn end_frame(&mut self) -> RenderResult<()> {
        self.require_recording()?;

        let device = &self.context.device;
        let cmd = self.current_cmd();
        unsafe {
            device.cmd_end_render_pass(cmd);
        }
        check_vk(
            unsafe { device.end_command_buffer(cmd) },
            "command buffer end",
        );

        let frame = &self.frames[self.current_slot];
        let wait_semaphores = [frame.image_available.handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [cmd];
        let signal_semaphores = [frame.render_finished.handle()];
        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        check_vk(
            unsafe {
                device.queue_submit(
                    self.context.graphics_queue,
                    &[submit_info.build()],
                    self.ring.fence(self.current_slot).handle(),
                )
            },
            "queue submit",
        );
        self.ring.submit(self.current_slot);

        let swapchains = [self.swapchain.handle()];
        let image_indices = [self.current_image];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&signal_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);
        let present = unsafe {
            self.swapchain
                .loader()
                .queue_present(self.context.present_queue, &present_info)
        };
        self.ring.present(self.current_slot);
        self.recording = false;

        match present {
            Ok(false) => Ok(()),
            Ok(true) | Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                self.recreate_swapchain()?;
                Ok(())
            }
            Err(e) => check_vk(Err(e), "queue present"),
        }
    }

    fn bind_pipeline(&mut self, pipeline: &dyn Pipeline) -> RenderResult<()> {
        self.require_recording()?;
        let pipeline = pipeline
            .as_any()
            .downcast_ref::<VulkanPipeline>()
            .ok_or_else(|| {
                RenderError::InvalidOperation(
                    "Pipeline was not created by the Vulkan backend".to_string(),
                )
            })?;
        unsafe {
            self.context.device.cmd_bind_pipeline(
                self.current_cmd(),
                vk::PipelineBindPoint::GRAPHICS,
                pipeline.handle(),
            );
        }
        Ok(())
    }

    fn bind_vertex_buffer(&mut self, buffer: &dyn GpuBuffer) -> RenderResult<()> {
        self.require_recording()?;
        let buffer = Self::downcast_buffer(buffer, BufferUsage::Vertex)?;
        unsafe {
            self.context.device.cmd_bind_vertex_buffers(
                self.current_cmd(),
                0,
                &[buffer.handle()],
                &[0],
            );
        }
        Ok(())
    }

    fn bind_index_buffer(&mut self, buffer: &dyn GpuBuffer) -> RenderResult<()> {
        self.require_recording()?;
        let buffer = Self::downcast_buffer(buffer, BufferUsage::Index)?;
        unsafe {
            self.context.device.cmd_bind_index_buffer(
                self.current_cmd(),
                buffer.handle(),
                0,
                vk::IndexType::UINT32,
            );
        }
        Ok(())
    }

    fn draw_arrays(&mut self, vertex_count: u32) -> RenderResult<()> {
        self.require_recording()?;
        unsafe {
            self.context
                .device
                .cmd_draw(self.current_cmd(), vertex_count, 1, 0, 0);
        }
        Ok(())
    }

    fn draw_lines(&mut self, vertex_count: u32) -> RenderResult<()> {
        // Topology is baked into the bound pipeline; the draw itself is the
        // same call as for triangles.
        self.draw_arrays(vertex_count)
    }

    fn draw_indexed(&mut self, index_count: u32) -> RenderResult<()> {
        self.require_recording()?;
        unsafe {
            self.context
                .device
                .cmd_draw_indexed(self.current_cmd(), index_count, 1, 0, 0, 0);
        }
        Ok(())
    }

    fn create_buffer(
        &mut self,
        usage: BufferUsage,
        layout: Option<BufferLayout>,
        size: usize,
        data: Option<&[u8]>,
    ) -> RenderResult<Box<dyn GpuBuffer>> {
        let buffer = VulkanBuffer::new(&self.context, usage, layout, size, data)?;
        Ok(Box::new(buffer))
    }

    fn create_shader(
        &mut self,
        stage: ShaderStage,
        source: &ShaderSource,
    ) -> RenderResult<Box<dyn Shader>> {
        let shader = VulkanShader::new(&self.context, stage, source)?;
        Ok(Box::new(shader))
    }

    fn create_pipeline(
        &mut self,
        spec: &PipelineSpec,
        vertex: &dyn Shader,
        fragment: &dyn Shader,
    ) -> RenderResult<Box<dyn Pipeline>> {
        let vertex = vertex
            .as_any()
            .downcast_ref::<VulkanShader>()
            .ok_or_else(|| {
                RenderError::InvalidOperation(
                    "Vertex shader was not created by the Vulkan backend".to_string(),
                )
            })?;
        let fragment = fragment
            .as_any()
            .downcast_ref::<VulkanShader>()
            .ok_or_else(|| {
                RenderError::InvalidOperation(
                    "Fragment shader was not created by the Vulkan backend".to_string(),
                )
            })?;
        let pipeline = VulkanPipeline::new(
            &self.context,
            self.swapchain.render_pass(),
            spec,
            vertex,
            fragment,
        )?;
        Ok(Box::new(pipeline))
    }

    fn create_texture(
        &mut self,
        desc: &TextureDesc,
        pixels: &[u8],
    ) -> RenderResult<Box<dyn Texture>> {
        let texture = VulkanTexture::new(&self.context, desc, pixels)?;
        Ok(Box::new(texture))
    }

    fn resize(&mut self, _width: u32, _height: u32) -> RenderResult<()> {
        // Sizes come from the surface itself so a stale event cannot build a
        // swapchain the surface has already outgrown.
        self.recreate_swapchain()?;
        Ok(())
    }

    fn wait_idle(&mut self) -> RenderResult<()> {
        self.context.wait_idle()?;
        self.context.deletion.borrow_mut().flush();
        Ok(())
    }
}

impl Drop for VulkanRenderer {
    fn drop(&mut self) {
        // Frame objects and the swapchain drop right after this body; the
        // device must be idle before they do.
        if let Err(e) = self.context.wait_idle() {
            log::error!("Device wait failed during renderer teardown: {}", e);
        }
    }
}
