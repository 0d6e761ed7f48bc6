//! Vulkan synchronization primitives
//!
//! RAII wrappers for the two primitives this backend needs: binary semaphores
//! for GPU-GPU ordering (image acquire -> render, render -> present) and
//! fences for CPU-GPU completion tracking. Frame pacing builds on these via
//! [`crate::render::FrameRing`].

use ash::{vk, Device};

use super::{check_vk, VulkanError, VulkanResult};
use crate::render::frame::FrameFence;

/// GPU-GPU synchronization primitive with RAII cleanup
pub struct Semaphore {
    device: Device,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// Create a new binary semaphore
    pub fn new(device: Device) -> VulkanResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::builder();
        let semaphore = unsafe {
            device
                .create_semaphore(&create_info, None)
                .map_err(VulkanError::Api)?
        };
        Ok(Self { device, semaphore })
    }

    /// Raw semaphore handle
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_semaphore(self.semaphore, None);
        }
    }
}

/// CPU-GPU fence with RAII cleanup
pub struct Fence {
    device: Device,
    fence: vk::Fence,
}

impl Fence {
    /// Create a fence, optionally already signaled
    ///
    /// Frame-slot fences start signaled so the first pass over the frame
    /// ring does not block.
    pub fn new(device: Device, signaled: bool) -> VulkanResult<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let create_info = vk::FenceCreateInfo::builder().flags(flags);
        let fence = unsafe {
            device
                .create_fence(&create_info, None)
                .map_err(VulkanError::Api)?
        };
        Ok(Self { device, fence })
    }

    /// Block until signaled or `timeout` nanoseconds elapse
    pub fn wait_timeout(&self, timeout: u64) -> VulkanResult<()> {
        unsafe {
            self.device
                .wait_for_fences(&[self.fence], true, timeout)
                .map_err(VulkanError::Api)
        }
    }

    /// Return the fence to the unsignaled state
    pub fn reset_fence(&self) -> VulkanResult<()> {
        unsafe {
            self.device
                .reset_fences(&[self.fence])
                .map_err(VulkanError::Api)
        }
    }

    /// Raw fence handle
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }
}

impl FrameFence for Fence {
    fn wait(&self) {
        // Frame-path fence failures are fatal; see check_vk.
        check_vk(
            unsafe {
                self.device
                    .wait_for_fences(&[self.fence], true, u64::MAX)
            },
            "frame fence wait",
        );
    }

    fn reset(&self) {
        check_vk(
            unsafe { self.device.reset_fences(&[self.fence]) },
            "frame fence reset",
        );
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_fence(self.fence, None);
        }
    }
}
