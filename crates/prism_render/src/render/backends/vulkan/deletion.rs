//! Deferred GPU resource destruction
//!
//! Dropped resource wrappers enqueue their raw handles here instead of
//! destroying them inline; the queue is flushed only after the device is
//! confirmed idle. Tying destruction to device idleness rather than Rust
//! drop order is what prevents use-after-free on handles an in-flight
//! command buffer still references.

use ash::{vk, Device};

/// Raw handles awaiting destruction
pub enum DeferredResource {
    /// Buffer and its backing allocation
    Buffer {
        /// Buffer handle
        buffer: vk::Buffer,
        /// Device memory backing the buffer
        memory: vk::DeviceMemory,
    },
    /// Image with its view, sampler and backing allocation
    Image {
        /// Image handle
        image: vk::Image,
        /// Image view
        view: vk::ImageView,
        /// Sampler
        sampler: vk::Sampler,
        /// Device memory backing the image
        memory: vk::DeviceMemory,
    },
    /// Pipeline and its layout
    Pipeline {
        /// Pipeline handle
        pipeline: vk::Pipeline,
        /// Pipeline layout
        layout: vk::PipelineLayout,
    },
    /// Shader module
    ShaderModule(vk::ShaderModule),
    /// Command pool (frees its command buffers with it)
    CommandPool(vk::CommandPool),
}

/// Queue of deferred destructions, flushed at device-idle points
pub struct DeletionQueue {
    device: Device,
    pending: Vec<DeferredResource>,
}

impl DeletionQueue {
    /// Create an empty queue for `device`
    pub fn new(device: Device) -> Self {
        Self {
            device,
            pending: Vec::new(),
        }
    }

    /// Enqueue handles for destruction at the next flush
    pub fn defer(&mut self, resource: DeferredResource) {
        self.pending.push(resource);
    }

    /// Number of pending destructions
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Destroy all pending handles
    ///
    /// The caller must have confirmed device idleness (or otherwise know no
    /// submitted work references the pending handles) before flushing.
    pub fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        log::trace!("Flushing {} deferred GPU destructions", self.pending.len());
        for resource in self.pending.drain(..) {
            unsafe {
                match resource {
                    DeferredResource::Buffer { buffer, memory } => {
                        self.device.destroy_buffer(buffer, None);
                        self.device.free_memory(memory, None);
                    }
                    DeferredResource::Image {
                        image,
                        view,
                        sampler,
                        memory,
                    } => {
                        self.device.destroy_sampler(sampler, None);
                        self.device.destroy_image_view(view, None);
                        self.device.destroy_image(image, None);
                        self.device.free_memory(memory, None);
                    }
                    DeferredResource::Pipeline { pipeline, layout } => {
                        self.device.destroy_pipeline(pipeline, None);
                        self.device.destroy_pipeline_layout(layout, None);
                    }
                    DeferredResource::ShaderModule(module) => {
                        self.device.destroy_shader_module(module, None);
                    }
                    DeferredResource::CommandPool(pool) => {
                        self.device.destroy_command_pool(pool, None);
                    }
                }
            }
        }
    }
}
