//! Presentation surface

use ash::extensions::khr;
use ash::vk;

use super::instance::VulkanInstance;
use crate::driver::WindowSurface;
use crate::error::{DriverError, DriverResult};
use crate::negotiation::{SurfaceCapabilities, SurfaceSupport};

/// Window surface plus its extension loader, destroyed on drop
///
/// Must be dropped before the instance it was created on.
pub struct PresentationSurface {
    loader: khr::Surface,
    handle: vk::SurfaceKHR,
}

impl PresentationSurface {
    /// Ask the window system for a surface on `instance`
    pub fn new(instance: &VulkanInstance, window: &mut dyn WindowSurface) -> DriverResult<Self> {
        let loader = khr::Surface::new(instance.entry(), instance.instance());
        let handle = window.create_surface(instance.handle())?;
        log::debug!("Created presentation surface");
        Ok(Self { loader, handle })
    }

    /// Surface handle
    pub const fn handle(&self) -> vk::SurfaceKHR {
        self.handle
    }

    /// Extension loader
    pub const fn loader(&self) -> &khr::Surface {
        &self.loader
    }

    /// Whether a queue family of `physical_device` can present here
    pub fn supports_present(&self, physical_device: vk::PhysicalDevice, queue_family: u32) -> DriverResult<bool> {
        unsafe {
            self.loader
                .get_physical_device_surface_support(physical_device, queue_family, self.handle)
                .map_err(DriverError::Api)
        }
    }

    /// Capabilities, formats and present modes for `physical_device`
    pub fn support(&self, physical_device: vk::PhysicalDevice) -> DriverResult<SurfaceSupport> {
        query_support(&self.loader, self.handle, physical_device)
    }
}

impl Drop for PresentationSurface {
    fn drop(&mut self) {
        unsafe {
            self.loader.destroy_surface(self.handle, None);
        }
        log::debug!("Presentation surface destroyed");
    }
}

/// Query everything swapchain negotiation needs from the surface
pub fn query_support(
    loader: &khr::Surface,
    surface: vk::SurfaceKHR,
    physical_device: vk::PhysicalDevice,
) -> DriverResult<SurfaceSupport> {
    unsafe {
        let capabilities = loader
            .get_physical_device_surface_capabilities(physical_device, surface)
            .map_err(DriverError::Api)?;
        let formats = loader
            .get_physical_device_surface_formats(physical_device, surface)
            .map_err(DriverError::Api)?;
        let present_modes = loader
            .get_physical_device_surface_present_modes(physical_device, surface)
            .map_err(DriverError::Api)?;

        Ok(SurfaceSupport {
            capabilities: SurfaceCapabilities::from(capabilities),
            formats,
            present_modes,
        })
    }
}
