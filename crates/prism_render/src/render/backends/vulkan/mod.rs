//! Vulkan rendering backend
//!
//! Explicit command-buffer implementation of the backend strategy: an
//! instance/surface/swapchain bundle, a ring of in-flight frame slots, and
//! RAII wrappers for every GPU object. Resource destruction is deferred to a
//! deletion queue flushed after the device is confirmed idle, because
//! destroying a resource still referenced by an in-flight command buffer is
//! undefined behavior.

mod buffer;
mod context;
mod deletion;
mod pipeline;
mod renderer;
mod shader;
mod swapchain;
mod sync;
mod texture;

pub use buffer::VulkanBuffer;
pub use context::{CommandPool, PhysicalDeviceInfo, QueueFamilies, VulkanContext};
pub use deletion::{DeferredResource, DeletionQueue};
pub use pipeline::VulkanPipeline;
pub use renderer::VulkanRenderer;
pub use shader::VulkanShader;
pub use swapchain::Swapchain;
pub use sync::{Fence, Semaphore};
pub use texture::VulkanTexture;

use ash::vk;

/// Vulkan-specific error types
#[derive(Debug, thiserror::Error)]
pub enum VulkanError {
    /// General Vulkan API error with result code
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// Context or device initialization failed
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// Invalid operation attempted
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// No physical device with graphics + present support was found
    #[error("No suitable physical device")]
    NoSuitableDevice,

    /// No memory type satisfies the requested property flags
    #[error("No suitable memory type found")]
    NoSuitableMemoryType,
}

/// Result type for Vulkan operations
pub type VulkanResult<T> = Result<T, VulkanError>;

impl From<VulkanError> for crate::render::RenderError {
    fn from(e: VulkanError) -> Self {
        match e {
            VulkanError::InitializationFailed(msg) => {
                crate::render::RenderError::InitializationFailed(msg)
            }
            VulkanError::InvalidOperation(msg) => {
                crate::render::RenderError::InvalidOperation(msg)
            }
            other => crate::render::RenderError::BackendError(other.to_string()),
        }
    }
}

/// Funnel for Vulkan calls in the frame path
///
/// Error codes here mean the device is in a state this design cannot recover
/// from (device lost, surface lost); the process logs and aborts rather than
/// limping on with undefined GPU state.
pub(crate) fn check_vk<T>(result: Result<T, vk::Result>, what: &str) -> T {
    match result {
        Ok(value) => value,
        Err(code) => {
            log::error!("Fatal Vulkan error during {}: {:?}", what, code);
            std::process::abort();
        }
    }
}
