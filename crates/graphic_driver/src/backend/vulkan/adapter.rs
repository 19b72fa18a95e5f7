//! Physical device discovery

use std::ffi::CStr;

use ash::extensions::khr::Swapchain;
use ash::{vk, Instance};

use super::surface::PresentationSurface;
use crate::error::{DriverError, DriverResult};
use crate::negotiation::{AdapterInfo, QueueFamilySupport};

/// Enumerate physical devices and describe each for selection
///
/// The returned vectors are index-aligned.
pub fn enumerate_adapters(
    instance: &Instance,
    surface: &PresentationSurface,
) -> DriverResult<(Vec<vk::PhysicalDevice>, Vec<AdapterInfo>)> {
    let devices = unsafe { instance.enumerate_physical_devices() }.map_err(DriverError::Api)?;
    log::debug!("Found {} physical devices", devices.len());

    let mut infos = Vec::with_capacity(devices.len());
    for &device in &devices {
        infos.push(describe(instance, surface, device)?);
    }
    Ok((devices, infos))
}

fn describe(
    instance: &Instance,
    surface: &PresentationSurface,
    device: vk::PhysicalDevice,
) -> DriverResult<AdapterInfo> {
    let (properties, features, families, extensions) = unsafe {
        (
            instance.get_physical_device_properties(device),
            instance.get_physical_device_features(device),
            instance.get_physical_device_queue_family_properties(device),
            instance
                .enumerate_device_extension_properties(device)
                .map_err(DriverError::Api)?,
        )
    };

    let swapchain_supported = extensions
        .iter()
        .any(|ext| unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) } == Swapchain::name());

    let mut queue_families = Vec::with_capacity(families.len());
    for (index, family) in (0u32..).zip(&families) {
        queue_families.push(QueueFamilySupport {
            flags: family.queue_flags,
            present: surface.supports_present(device, index)?,
        });
    }

    let name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }
        .to_string_lossy()
        .into_owned();

    Ok(AdapterInfo {
        name,
        device_type: properties.device_type,
        max_image_dimension_2d: properties.limits.max_image_dimension2_d,
        geometry_shader: features.geometry_shader == vk::TRUE,
        swapchain_supported,
        queue_families,
    })
}
