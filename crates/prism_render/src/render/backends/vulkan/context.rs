//! Vulkan context initialization
//!
//! Owns the backend's connection to a window: entry, instance, surface,
//! physical/logical device, queues and the deferred deletion queue. Created
//! once per window at renderer initialization, destroyed at shutdown.

use std::cell::RefCell;
use std::ffi::CStr;
use std::rc::Rc;

use ash::extensions::khr;
use ash::{vk, Device, Entry, Instance};

use super::{DeletionQueue, VulkanError, VulkanResult};
use crate::render::api::DeviceLimits;
use crate::render::window::RenderSurface;

/// Queue family indices negotiated at device selection
#[derive(Debug, Clone, Copy)]
pub struct QueueFamilies {
    /// Family used for graphics and transfer submissions
    pub graphics: u32,
    /// Family used for presentation (often the same as graphics)
    pub present: u32,
}

/// Selected physical device and its cached properties
pub struct PhysicalDeviceInfo {
    /// Physical device handle
    pub device: vk::PhysicalDevice,
    /// Device properties (limits, type, name)
    pub properties: vk::PhysicalDeviceProperties,
    /// Memory heap/type table used for allocation decisions
    pub memory: vk::PhysicalDeviceMemoryProperties,
    /// Negotiated queue families
    pub families: QueueFamilies,
}

/// Vulkan connection to a window
pub struct VulkanContext {
    /// Deferred destruction queue shared with every resource wrapper
    pub deletion: Rc<RefCell<DeletionQueue>>,
    /// Logical device
    pub device: Device,
    /// Graphics/transfer queue
    pub graphics_queue: vk::Queue,
    /// Present queue
    pub present_queue: vk::Queue,
    /// Selected physical device info
    pub physical: PhysicalDeviceInfo,
    /// Surface extension loader
    pub surface_loader: khr::Surface,
    /// Window surface
    pub surface: vk::SurfaceKHR,
    /// Instance (kept after device creation for swapchain/surface queries)
    pub instance: Instance,
    // Keeps the loaded Vulkan library mapped for the context's lifetime.
    _entry: Entry,
}

impl VulkanContext {
    /// Create the full context against a window surface
    pub fn new(surface_source: &dyn RenderSurface) -> VulkanResult<Self> {
        let entry = unsafe { Entry::load() }.map_err(|e| {
            VulkanError::InitializationFailed(format!("Failed to load Vulkan library: {}", e))
        })?;

        let instance = Self::create_instance(&entry, surface_source)?;

        let surface = unsafe {
            ash_window::create_surface(
                &entry,
                &instance,
                surface_source.raw_display_handle(),
                surface_source.raw_window_handle(),
                None,
            )
            .map_err(VulkanError::Api)?
        };
        let surface_loader = khr::Surface::new(&entry, &instance);

        let physical = Self::pick_physical_device(&instance, &surface_loader, surface)?;
        let device_name = unsafe {
            CStr::from_ptr(physical.properties.device_name.as_ptr())
                .to_string_lossy()
                .into_owned()
        };
        log::info!("Vulkan device: {}", device_name);

        let device = Self::create_logical_device(&instance, &physical)?;
        let graphics_queue = unsafe { device.get_device_queue(physical.families.graphics, 0) };
        let present_queue = unsafe { device.get_device_queue(physical.families.present, 0) };

        let deletion = Rc::new(RefCell::new(DeletionQueue::new(device.clone())));

        Ok(Self {
            deletion,
            device,
            graphics_queue,
            present_queue,
            physical,
            surface_loader,
            surface,
            instance,
            _entry: entry,
        })
    }

    fn create_instance(
        entry: &Entry,
        surface_source: &dyn RenderSurface,
    ) -> VulkanResult<Instance> {
        let app_name = CStr::from_bytes_with_nul(b"prism_render\0")
            .map_err(|_| VulkanError::InitializationFailed("Bad app name".to_string()))?;
        let app_info = vk::ApplicationInfo::builder()
            .application_name(app_name)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(app_name)
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_0);

        let extensions =
            ash_window::enumerate_required_extensions(surface_source.raw_display_handle())
                .map_err(VulkanError::Api)?;

        // Validation layers for debug builds, when the loader has them.
        let validation_layer = CStr::from_bytes_with_nul(b"VK_LAYER_KHRONOS_validation\0")
            .map_err(|_| VulkanError::InitializationFailed("Bad layer name".to_string()))?;
        let mut layers: Vec<*const std::os::raw::c_char> = Vec::new();
        if cfg!(debug_assertions) {
            let available = entry
                .enumerate_instance_layer_properties()
                .map_err(VulkanError::Api)?;
            let has_validation = available.iter().any(|layer| unsafe {
                CStr::from_ptr(layer.layer_name.as_ptr()) == validation_layer
            });
            if has_validation {
                layers.push(validation_layer.as_ptr());
            } else {
                log::warn!("VK_LAYER_KHRONOS_validation not available; continuing without it");
            }
        }

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(extensions)
            .enabled_layer_names(&layers);

        unsafe {
            entry
                .create_instance(&create_info, None)
                .map_err(VulkanError::Api)
        }
    }

    fn pick_physical_device(
        instance: &Instance,
        surface_loader: &khr::Surface,
        surface: vk::SurfaceKHR,
    ) -> VulkanResult<PhysicalDeviceInfo> {
        let devices = unsafe {
            instance
                .enumerate_physical_devices()
                .map_err(VulkanError::Api)?
        };

        let mut best: Option<PhysicalDeviceInfo> = None;
        for device in devices {
            let Some(families) = Self::find_queue_families(instance, surface_loader, surface, device)?
            else {
                continue;
            };
            if !Self::supports_swapchain(instance, device)? {
                continue;
            }

            let properties = unsafe { instance.get_physical_device_properties(device) };
            let memory = unsafe { instance.get_physical_device_memory_properties(device) };
            let info = PhysicalDeviceInfo {
                device,
                properties,
                memory,
                families,
            };

            // Prefer a discrete GPU; otherwise take the first suitable device.
            let is_discrete = properties.device_type == vk::PhysicalDeviceType::DISCRETE_GPU;
            match &best {
                None => best = Some(info),
                Some(current)
                    if is_discrete
                        && current.properties.device_type
                            != vk::PhysicalDeviceType::DISCRETE_GPU =>
                {
                    best = Some(info)
                }
                _ => {}
            }
        }

        best.ok_or(VulkanError::NoSuitableDevice)
    }

    fn find_queue_families(
        instance: &Instance,
        surface_loader: &khr::Surface,
        surface: vk::SurfaceKHR,
        device: vk::PhysicalDevice,
    ) -> VulkanResult<Option<QueueFamilies>> {
        let families = unsafe { instance.get_physical_device_queue_family_properties(device) };

        let mut graphics = None;
        let mut present = None;
        for (index, family) in families.iter().enumerate() {
            let index = index as u32;
            if family.queue_flags.contains(vk::QueueFlags::GRAPHICS) && graphics.is_none() {
                graphics = Some(index);
            }
            let supports_present = unsafe {
                surface_loader
                    .get_physical_device_surface_support(device, index, surface)
                    .map_err(VulkanError::Api)?
            };
            if supports_present && present.is_none() {
                present = Some(index);
            }
        }

        Ok(match (graphics, present) {
            (Some(graphics), Some(present)) => Some(QueueFamilies { graphics, present }),
            _ => None,
        })
    }

    fn supports_swapchain(instance: &Instance, device: vk::PhysicalDevice) -> VulkanResult<bool> {
        let extensions = unsafe {
            instance
                .enumerate_device_extension_properties(device)
                .map_err(VulkanError::Api)?
        };
        Ok(extensions.iter().any(|ext| unsafe {
            CStr::from_ptr(ext.extension_name.as_ptr()) == khr::Swapchain::name()
        }))
    }

    fn create_logical_device(
        instance: &Instance,
        physical: &PhysicalDeviceInfo,
    ) -> VulkanResult<Device> {
        let mut unique_families = vec![physical.families.graphics];
        if physical.families.present != physical.families.graphics {
            unique_families.push(physical.families.present);
        }

        let priorities = [1.0f32];
        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = unique_families
            .iter()
            .map(|&family| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(family)
                    .queue_priorities(&priorities)
                    .build()
            })
            .collect();

        let extensions = [khr::Swapchain::name().as_ptr()];
        let features = vk::PhysicalDeviceFeatures::builder();
        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&extensions)
            .enabled_features(&features);

        unsafe {
            instance
                .create_device(physical.device, &create_info, None)
                .map_err(VulkanError::Api)
        }
    }

    /// Device limits in the backend-agnostic shape
    pub fn limits(&self) -> DeviceLimits {
        let limits = &self.physical.properties.limits;
        DeviceLimits {
            max_texture_size: limits.max_image_dimension2_d,
            max_uniform_buffer_range: limits.max_uniform_buffer_range,
            max_push_constant_size: limits.max_push_constants_size,
        }
    }

    /// Block until the device has finished all submitted work
    pub fn wait_idle(&self) -> VulkanResult<()> {
        unsafe { self.device.device_wait_idle().map_err(VulkanError::Api) }
    }

    /// Record, submit and wait for a one-shot command buffer
    ///
    /// Used for copies outside the frame loop (texture uploads). Blocks the
    /// calling thread until the GPU has executed the recorded commands.
    pub fn submit_one_shot(
        &self,
        record: impl FnOnce(&Device, vk::CommandBuffer),
    ) -> VulkanResult<()> {
        let pool = CommandPool::new(
            self.device.clone(),
            self.physical.families.graphics,
            vk::CommandPoolCreateFlags::TRANSIENT,
        )?;
        let command_buffer = pool.allocate(1)?[0];

        let begin_info = vk::CommandBufferBeginInfo::builder()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe {
            self.device
                .begin_command_buffer(command_buffer, &begin_info)
                .map_err(VulkanError::Api)?;
        }
        record(&self.device, command_buffer);
        unsafe {
            self.device
                .end_command_buffer(command_buffer)
                .map_err(VulkanError::Api)?;
        }

        let fence = super::Fence::new(self.device.clone(), false)?;
        let command_buffers = [command_buffer];
        let submit_info = vk::SubmitInfo::builder().command_buffers(&command_buffers);
        unsafe {
            self.device
                .queue_submit(self.graphics_queue, &[submit_info.build()], fence.handle())
                .map_err(VulkanError::Api)?;
        }
        fence.wait_timeout(u64::MAX)?;
        Ok(())
    }
}

impl Drop for VulkanContext {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();
            self.deletion.borrow_mut().flush();
            self.device.destroy_device(None);
            self.surface_loader.destroy_surface(self.surface, None);
            self.instance.destroy_instance(None);
        }
    }
}

/// Command pool wrapper with RAII cleanup
pub struct CommandPool {
    device: Device,
    pool: vk::CommandPool,
}

impl CommandPool {
    /// Create a pool on the given queue family
    pub fn new(
        device: Device,
        queue_family: u32,
        flags: vk::CommandPoolCreateFlags,
    ) -> VulkanResult<Self> {
        let create_info = vk::CommandPoolCreateInfo::builder()
            .flags(flags)
            .queue_family_index(queue_family);
        let pool = unsafe {
            device
                .create_command_pool(&create_info, None)
                .map_err(VulkanError::Api)?
        };
        Ok(Self { device, pool })
    }

    /// Allocate primary command buffers
    pub fn allocate(&self, count: u32) -> VulkanResult<Vec<vk::CommandBuffer>> {
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(self.pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);
        unsafe {
            self.device
                .allocate_command_buffers(&alloc_info)
                .map_err(VulkanError::Api)
        }
    }

    /// Raw pool handle
    pub fn handle(&self) -> vk::CommandPool {
        self.pool
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        unsafe {
            // Callers idle the device (or wait the relevant fence) before
            // dropping pools whose buffers may still be executing.
            self.device.destroy_command_pool(self.pool, None);
        }
    }
}
