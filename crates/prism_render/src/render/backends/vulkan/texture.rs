//! Sampled 2D textures
//!
//! Pixels are staged through a throwaway host-visible buffer and copied on a
//! one-shot command buffer, with layout transitions on either side of the
//! copy. Three-channel input is expanded to RGBA on the CPU first; tightly
//! packed RGB is poorly supported as a sampled format on real devices.

use std::cell::RefCell;
use std::rc::Rc;

use ash::vk;

use super::buffer::{create_buffer, find_memory_type};
use super::{DeferredResource, DeletionQueue, VulkanContext, VulkanError, VulkanResult};
use crate::render::texture::{Texture, TextureDesc};

/// Device-local sampled image with view and sampler
pub struct VulkanTexture {
    deletion: Rc<RefCell<DeletionQueue>>,
    image: vk::Image,
    view: vk::ImageView,
    sampler: vk::Sampler,
    memory: vk::DeviceMemory,
    width: u32,
    height: u32,
}

impl VulkanTexture {
    /// Create and upload a texture from tightly packed pixels
    pub fn new(
        context: &VulkanContext,
        desc: &TextureDesc,
        pixels: &[u8],
    ) -> VulkanResult<Self> {
        if desc.width == 0 || desc.height == 0 {
            return Err(VulkanError::InvalidOperation(
                "Texture dimensions must be non-zero".to_string(),
            ));
        }
        if pixels.len() != desc.byte_len() {
            return Err(VulkanError::InvalidOperation(format!(
                "Texture upload of {} bytes does not match {}x{}x{} = {} bytes",
                pixels.len(),
                desc.width,
                desc.height,
                desc.channels,
                desc.byte_len()
            )));
        }

        let expanded;
        let (format, upload): (vk::Format, &[u8]) = match desc.channels {
            1 => (vk::Format::R8_UNORM, pixels),
            4 => (vk::Format::R8G8B8A8_SRGB, pixels),
            3 => {
                expanded = Self::expand_rgb(pixels);
                (vk::Format::R8G8B8A8_SRGB, expanded.as_slice())
            }
            other => {
                return Err(VulkanError::InvalidOperation(format!(
                    "Unsupported channel count: {}",
                    other
                )))
            }
        };

        let device = &context.device;
        let memory_props = &context.physical.memory;

        let (staging, staging_memory) = create_buffer(
            device,
            memory_props,
            upload.len() as vk::DeviceSize,
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;
        unsafe {
            let mapped = device
                .map_memory(
                    staging_memory,
                    0,
                    upload.len() as vk::DeviceSize,
                    vk::MemoryMapFlags::empty(),
                )
                .map_err(VulkanError::Api)?;
            std::ptr::copy_nonoverlapping(upload.as_ptr(), mapped as *mut u8, upload.len());
            device.unmap_memory(staging_memory);
        }

        let result = Self::create_device_image(context, desc, format, staging);

        // The one-shot submit waits on its fence, so the staging pair is
        // safe to destroy here whether the upload succeeded or not.
        unsafe {
            device.destroy_buffer(staging, None);
            device.free_memory(staging_memory, None);
        }
        let (image, memory) = result?;

        let view_info = vk::ImageViewCreateInfo::builder()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });
        let view = match unsafe { device.create_image_view(&view_info, None) } {
            Ok(view) => view,
            Err(e) => {
                unsafe {
                    device.destroy_image(image, None);
                    device.free_memory(memory, None);
                }
                return Err(VulkanError::Api(e));
            }
        };

        let sampler_info = vk::SamplerCreateInfo::builder()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
            .address_mode_u(vk::SamplerAddressMode::REPEAT)
            .address_mode_v(vk::SamplerAddressMode::REPEAT)
            .address_mode_w(vk::SamplerAddressMode::REPEAT);
        let sampler = match unsafe { device.create_sampler(&sampler_info, None) } {
            Ok(sampler) => sampler,
            Err(e) => {
                unsafe {
                    device.destroy_image_view(view, None);
                    device.destroy_image(image, None);
                    device.free_memory(memory, None);
                }
                return Err(VulkanError::Api(e));
            }
        };

        Ok(Self {
            deletion: Rc::clone(&context.deletion),
            image,
            view,
            sampler,
            memory,
            width: desc.width,
            height: desc.height,
        })
    }

    fn expand_rgb(pixels: &[u8]) -> Vec<u8> {
        let mut rgba = Vec::with_capacity(pixels.len() / 3 * 4);
        for rgb in pixels.chunks_exact(3) {
            rgba.extend_from_slice(rgb);
            rgba.push(u8::MAX);
        }
        rgba
    }

    fn create_device_image(
        context: &VulkanContext,
        desc: &TextureDesc,
        format: vk::Format,
        staging: vk::Buffer,
    ) -> VulkanResult<(vk::Image, vk::DeviceMemory)> {
        let device = &context.device;
        let extent = vk::Extent3D {
            width: desc.width,
            height: desc.height,
            depth: 1,
        };

        let image_info = vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::TYPE_2D)
            .format(format)
            .extent(extent)
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);
        let image = unsafe {
            device
                .create_image(&image_info, None)
                .map_err(VulkanError::Api)?
        };

        let requirements = unsafe { device.get_image_memory_requirements(image) };
        let memory_type = find_memory_type(
            &context.physical.memory,
            requirements.memory_type_bits,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        );
        let memory_type = match memory_type {
            Ok(index) => index,
            Err(e) => {
                unsafe { device.destroy_image(image, None) };
                return Err(e);
            }
        };
        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type);
        let memory = match unsafe { device.allocate_memory(&alloc_info, None) } {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { device.destroy_image(image, None) };
                return Err(VulkanError::Api(e));
            }
        };
        if let Err(e) = unsafe { device.bind_image_memory(image, memory, 0) } {
            unsafe {
                device.destroy_image(image, None);
                device.free_memory(memory, None);
            }
            return Err(VulkanError::Api(e));
        }

        let upload = context.submit_one_shot(|device, cmd| {
            let subresource = vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            };

            let to_transfer = vk::ImageMemoryBarrier::builder()
                .src_access_mask(vk::AccessFlags::empty())
                .dst_access_mask(vk::AccessFlags::TRANSFER_WRITE)
                .old_layout(vk::ImageLayout::UNDEFINED)
                .new_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .image(image)
                .subresource_range(subresource)
                .build();
            unsafe {
                device.cmd_pipeline_barrier(
                    cmd,
                    vk::PipelineStageFlags::TOP_OF_PIPE,
                    vk::PipelineStageFlags::TRANSFER,
                    vk::DependencyFlags::empty(),
                    &[],
                    &[],
                    &[to_transfer],
                );
            }

            let region = vk::BufferImageCopy::builder()
                .image_subresource(vk::ImageSubresourceLayers {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    mip_level: 0,
                    base_array_layer: 0,
                    layer_count: 1,
                })
                .image_extent(extent)
                .build();
            unsafe {
                device.cmd_copy_buffer_to_image(
                    cmd,
                    staging,
                    image,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    &[region],
                );
            }

            let to_sampled = vk::ImageMemoryBarrier::builder()
                .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
                .dst_access_mask(vk::AccessFlags::SHADER_READ)
                .old_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                .new_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
                .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .image(image)
                .subresource_range(subresource)
                .build();
            unsafe {
                device.cmd_pipeline_barrier(
                    cmd,
                    vk::PipelineStageFlags::TRANSFER,
                    vk::PipelineStageFlags::FRAGMENT_SHADER,
                    vk::DependencyFlags::empty(),
                    &[],
                    &[],
                    &[to_sampled],
                );
            }
        });
        if let Err(e) = upload {
            unsafe {
                device.destroy_image(image, None);
                device.free_memory(memory, None);
            }
            return Err(e);
        }

        Ok((image, memory))
    }

    /// Raw image view handle
    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    /// Raw sampler handle
    pub fn sampler(&self) -> vk::Sampler {
        self.sampler
    }
}

impl Texture for VulkanTexture {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

impl Drop for VulkanTexture {
    fn drop(&mut self) {
        self.deletion.borrow_mut().defer(DeferredResource::Image {
            image: self.image,
            view: self.view,
            sampler: self.sampler,
            memory: self.memory,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgb_expansion_appends_opaque_alpha() {
        let rgb = [10, 20, 30, 40, 50, 60];
        let rgba = VulkanTexture::expand_rgb(&rgb);
        assert_eq!(rgba, vec![10, 20, 30, 255, 40, 50, 60, 255]);
    }
}
