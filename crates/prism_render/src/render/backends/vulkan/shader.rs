//! SPIR-V shader modules

use std::cell::RefCell;
use std::rc::Rc;

use ash::vk;

use super::{DeferredResource, DeletionQueue, VulkanContext, VulkanError, VulkanResult};
use crate::render::shader::{Shader, ShaderSource, ShaderStage};

/// Compiled shader module for one pipeline stage
pub struct VulkanShader {
    deletion: Rc<RefCell<DeletionQueue>>,
    module: vk::ShaderModule,
    stage: ShaderStage,
}

impl VulkanShader {
    /// Create a module from SPIR-V words
    ///
    /// GLSL source is rejected; this backend does not carry a runtime
    /// compiler, callers ship precompiled SPIR-V.
    pub fn new(
        context: &VulkanContext,
        stage: ShaderStage,
        source: &ShaderSource,
    ) -> VulkanResult<Self> {
        let bytes = match source {
            ShaderSource::SpirV(bytes) => bytes,
            ShaderSource::Glsl(_) => {
                return Err(VulkanError::InvalidOperation(
                    "Vulkan shaders must be provided as SPIR-V".to_string(),
                ))
            }
        };
        if bytes.is_empty() || bytes.len() % 4 != 0 {
            return Err(VulkanError::InvalidOperation(format!(
                "SPIR-V payload of {} bytes is not a whole number of words",
                bytes.len()
            )));
        }

        let words: Vec<u32> = bytes
            .chunks_exact(4)
            .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();
        if words.first() != Some(&0x0723_0203) {
            return Err(VulkanError::InvalidOperation(
                "SPIR-V payload has a bad magic number".to_string(),
            ));
        }

        let create_info = vk::ShaderModuleCreateInfo::builder().code(&words);
        let module = unsafe {
            context
                .device
                .create_shader_module(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(Self {
            deletion: Rc::clone(&context.deletion),
            module,
            stage,
        })
    }

    /// Raw module handle
    pub fn module(&self) -> vk::ShaderModule {
        self.module
    }

    /// Stage flag for pipeline stage create infos
    pub fn stage_flags(&self) -> vk::ShaderStageFlags {
        match self.stage {
            ShaderStage::Vertex => vk::ShaderStageFlags::VERTEX,
            ShaderStage::Fragment => vk::ShaderStageFlags::FRAGMENT,
        }
    }
}

impl Shader for VulkanShader {
    fn stage(&self) -> ShaderStage {
        self.stage
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

impl Drop for VulkanShader {
    fn drop(&mut self) {
        self.deletion
            .borrow_mut()
            .defer(DeferredResource::ShaderModule(self.module));
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn spirv_words_decode_little_endian() {
        let bytes = [0x03, 0x02, 0x23, 0x07];
        let word = u32::from_le_bytes(bytes);
        assert_eq!(word, 0x0723_0203);
    }
}
