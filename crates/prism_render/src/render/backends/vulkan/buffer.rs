//! Device-local buffers with a persistent staging path
//!
//! Each buffer owns a host-visible staging buffer (persistently mapped) and a
//! device-local buffer, plus a dedicated transfer command buffer and fence.
//! Uploads memcpy into the staging map, record a one-shot copy and block on
//! the fence, so the caller may reuse or free its source slice immediately
//! after `set_data` returns.

use std::cell::RefCell;
use std::rc::Rc;

use ash::{vk, Device};

use super::{CommandPool, DeferredResource, DeletionQueue, Fence, VulkanContext, VulkanError, VulkanResult};
use crate::render::buffer::{BufferLayout, BufferUsage, GpuBuffer};
use crate::render::RenderResult;

/// Pick a memory type index satisfying `type_bits` and `flags`
pub(crate) fn find_memory_type(
    memory: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    flags: vk::MemoryPropertyFlags,
) -> VulkanResult<u32> {
    (0..memory.memory_type_count)
        .find(|&i| {
            type_bits & (1 << i) != 0
                && memory.memory_types[i as usize].property_flags.contains(flags)
        })
        .ok_or(VulkanError::NoSuitableMemoryType)
}

/// Create a buffer and bind freshly allocated memory to it
pub(crate) fn create_buffer(
    device: &Device,
    memory_props: &vk::PhysicalDeviceMemoryProperties,
    size: vk::DeviceSize,
    usage: vk::BufferUsageFlags,
    flags: vk::MemoryPropertyFlags,
) -> VulkanResult<(vk::Buffer, vk::DeviceMemory)> {
    let create_info = vk::BufferCreateInfo::builder()
        .size(size)
        .usage(usage)
        .sharing_mode(vk::SharingMode::EXCLUSIVE);
    let buffer = unsafe {
        device
            .create_buffer(&create_info, None)
            .map_err(VulkanError::Api)?
    };

    let requirements = unsafe { device.get_buffer_memory_requirements(buffer) };
    let memory_type = match find_memory_type(memory_props, requirements.memory_type_bits, flags) {
        Ok(index) => index,
        Err(e) => {
            unsafe { device.destroy_buffer(buffer, None) };
            return Err(e);
        }
    };

    let alloc_info = vk::MemoryAllocateInfo::builder()
        .allocation_size(requirements.size)
        .memory_type_index(memory_type);
    let memory = match unsafe { device.allocate_memory(&alloc_info, None) } {
        Ok(memory) => memory,
        Err(e) => {
            unsafe { device.destroy_buffer(buffer, None) };
            return Err(VulkanError::Api(e));
        }
    };

    if let Err(e) = unsafe { device.bind_buffer_memory(buffer, memory, 0) } {
        unsafe {
            device.destroy_buffer(buffer, None);
            device.free_memory(memory, None);
        }
        return Err(VulkanError::Api(e));
    }
    Ok((buffer, memory))
}

/// Device-local buffer with synchronous staged uploads
pub struct VulkanBuffer {
    device: Device,
    deletion: Rc<RefCell<DeletionQueue>>,
    graphics_queue: vk::Queue,
    usage: BufferUsage,
    layout: Option<BufferLayout>,
    size: usize,
    staging: vk::Buffer,
    staging_memory: vk::DeviceMemory,
    mapped: *mut std::ffi::c_void,
    local: vk::Buffer,
    local_memory: vk::DeviceMemory,
    upload_pool: CommandPool,
    upload_cmd: vk::CommandBuffer,
    upload_fence: Fence,
}

impl VulkanBuffer {
    /// Create a buffer of `size` bytes, optionally uploading initial data
    pub fn new(
        context: &VulkanContext,
        usage: BufferUsage,
        layout: Option<BufferLayout>,
        size: usize,
        data: Option<&[u8]>,
    ) -> VulkanResult<Self> {
        if size == 0 {
            return Err(VulkanError::InvalidOperation(
                "Buffer size must be non-zero".to_string(),
            ));
        }

        let device = context.device.clone();
        let memory_props = &context.physical.memory;
        let vk_size = size as vk::DeviceSize;

        let usage_flags = match usage {
            BufferUsage::Vertex => vk::BufferUsageFlags::VERTEX_BUFFER,
            BufferUsage::Index => vk::BufferUsageFlags::INDEX_BUFFER,
            BufferUsage::Uniform => vk::BufferUsageFlags::UNIFORM_BUFFER,
        };

        let (staging, staging_memory) = create_buffer(
            &device,
            memory_props,
            vk_size,
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;
        let (local, local_memory) = create_buffer(
            &device,
            memory_props,
            vk_size,
            usage_flags | vk::BufferUsageFlags::TRANSFER_DST,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;

        let mapped = unsafe {
            device
                .map_memory(staging_memory, 0, vk_size, vk::MemoryMapFlags::empty())
                .map_err(VulkanError::Api)?
        };

        let upload_pool = CommandPool::new(
            device.clone(),
            context.physical.families.graphics,
            vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
        )?;
        let upload_cmd = upload_pool.allocate(1)?[0];
        let upload_fence = Fence::new(device.clone(), false)?;

        let mut buffer = Self {
            device,
            deletion: Rc::clone(&context.deletion),
            graphics_queue: context.graphics_queue,
            usage,
            layout,
            size,
            staging,
            staging_memory,
            mapped,
            local,
            local_memory,
            upload_pool,
            upload_cmd,
            upload_fence,
        };

        if let Some(data) = data {
            buffer.upload(data)?;
        }
        Ok(buffer)
    }

    /// Raw handle of the device-local buffer
    pub fn handle(&self) -> vk::Buffer {
        self.local
    }

    fn upload(&mut self, data: &[u8]) -> VulkanResult<()> {
        if data.len() > self.size {
            return Err(VulkanError::InvalidOperation(format!(
                "Upload of {} bytes exceeds buffer capacity of {} bytes",
                data.len(),
                self.size
            )));
        }
        if data.is_empty() {
            return Ok(());
        }

        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), self.mapped as *mut u8, data.len());
        }

        let begin_info = vk::CommandBufferBeginInfo::builder()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        let region = vk::BufferCopy::builder().size(data.len() as vk::DeviceSize);
        unsafe {
            self.device
                .reset_command_buffer(self.upload_cmd, vk::CommandBufferResetFlags::empty())
                .map_err(VulkanError::Api)?;
            self.device
                .begin_command_buffer(self.upload_cmd, &begin_info)
                .map_err(VulkanError::Api)?;
            self.device
                .cmd_copy_buffer(self.upload_cmd, self.staging, self.local, &[region.build()]);
            self.device
                .end_command_buffer(self.upload_cmd)
                .map_err(VulkanError::Api)?;

            let command_buffers = [self.upload_cmd];
            let submit_info = vk::SubmitInfo::builder().command_buffers(&command_buffers);
            self.device
                .queue_submit(
                    self.graphics_queue,
                    &[submit_info.build()],
                    self.upload_fence.handle(),
                )
                .map_err(VulkanError::Api)?;
        }

        // Block until the copy retires so the staging map is free for reuse.
        self.upload_fence.wait_timeout(u64::MAX)?;
        self.upload_fence.reset_fence()
    }
}

impl GpuBuffer for VulkanBuffer {
    fn usage(&self) -> BufferUsage {
        self.usage
    }

    fn size(&self) -> usize {
        self.size
    }

    fn layout(&self) -> Option<&BufferLayout> {
        self.layout.as_ref()
    }

    fn set_data(&mut self, data: &[u8]) -> RenderResult<()> {
        self.upload(data)?;
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

impl Drop for VulkanBuffer {
    fn drop(&mut self) {
        // The upload fence was waited before every return from set_data, so
        // the staging pair and pool have no pending work. The device-local
        // buffer may still be referenced by in-flight frames, so both pairs
        // go through the deletion queue.
        unsafe {
            self.device.unmap_memory(self.staging_memory);
        }
        let mut deletion = self.deletion.borrow_mut();
        deletion.defer(DeferredResource::Buffer {
            buffer: self.staging,
            memory: self.staging_memory,
        });
        deletion.defer(DeferredResource::Buffer {
            buffer: self.local,
            memory: self.local_memory,
        });
    }
}
