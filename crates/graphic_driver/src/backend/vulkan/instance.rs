//! Vulkan instance and validation
//!
//! Loads the Vulkan library, creates the instance with the extensions the
//! window system asks for and, when requested and available, the Khronos
//! validation layer plus a debug messenger that forwards to `log`.

use std::ffi::{CStr, CString};
use std::os::raw::c_char;

use ash::extensions::ext::DebugUtils;
use ash::{vk, Entry, Instance};

use crate::config::{ConfigError, DriverConfig};
use crate::error::{DriverError, DriverResult};

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Vulkan entry, instance and optional debug messenger, destroyed on drop
pub struct VulkanInstance {
    entry: Entry,
    instance: Instance,
    debug: Option<(DebugUtils, vk::DebugUtilsMessengerEXT)>,
}

impl VulkanInstance {
    /// Create the instance
    ///
    /// Validation is dropped with a warning when the layer is not installed.
    pub fn new(config: &DriverConfig, window_extensions: &[String]) -> DriverResult<Self> {
        let entry = unsafe { Entry::load() }.map_err(|e| DriverError::LoaderUnavailable(e.to_string()))?;

        log_available_extensions(&entry);

        let validation = config.validation_enabled() && validation_layer_available(&entry);
        if config.validation_enabled() && !validation {
            log::warn!("Validation requested but {:?} is not installed, continuing without it", VALIDATION_LAYER);
        }

        let app_name = to_cstring(&config.application_name)?;
        let engine_name = to_cstring(&config.engine_name)?;
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name)
            .application_version(make_version(config.application_version))
            .engine_name(&engine_name)
            .engine_version(make_version(config.engine_version))
            .api_version(vk::API_VERSION_1_0);

        let extension_names = window_extensions
            .iter()
            .map(|name| CString::new(name.as_str()).map_err(|e| DriverError::WindowSystem(e.to_string())))
            .collect::<DriverResult<Vec<CString>>>()?;
        let mut extensions: Vec<*const c_char> = extension_names.iter().map(|ext| ext.as_ptr()).collect();
        if validation {
            extensions.push(DebugUtils::name().as_ptr());
        }

        let layers: Vec<*const c_char> = if validation {
            vec![VALIDATION_LAYER.as_ptr()]
        } else {
            Vec::new()
        };

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layers);

        let instance =
            unsafe { entry.create_instance(&create_info, None) }.map_err(DriverError::InstanceCreation)?;
        log::info!(
            "Created Vulkan instance for {} (validation {})",
            config.application_name,
            if validation { "on" } else { "off" }
        );

        let debug = if validation {
            let debug_utils = DebugUtils::new(&entry, &instance);
            match setup_debug_messenger(&debug_utils) {
                Ok(messenger) => Some((debug_utils, messenger)),
                Err(result) => {
                    log::warn!("Debug messenger unavailable: {:?}", result);
                    None
                }
            }
        } else {
            None
        };

        Ok(Self { entry, instance, debug })
    }

    /// Loaded entry points
    pub const fn entry(&self) -> &Entry {
        &self.entry
    }

    /// Instance function table
    pub const fn instance(&self) -> &Instance {
        &self.instance
    }

    /// Raw instance handle
    pub fn handle(&self) -> vk::Instance {
        self.instance.handle()
    }
}

impl Drop for VulkanInstance {
    fn drop(&mut self) {
        unsafe {
            if let Some((debug_utils, messenger)) = self.debug.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
        log::debug!("Vulkan instance destroyed");
    }
}

fn to_cstring(value: &str) -> DriverResult<CString> {
    CString::new(value).map_err(|e| DriverError::Config(ConfigError::Invalid(e.to_string())))
}

const fn make_version((major, minor, patch): (u32, u32, u32)) -> u32 {
    vk::make_api_version(0, major, minor, patch)
}

fn validation_layer_available(entry: &Entry) -> bool {
    match entry.enumerate_instance_layer_properties() {
        Ok(layers) => layers
            .iter()
            .any(|layer| unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) } == VALIDATION_LAYER),
        Err(result) => {
            log::warn!("Could not enumerate instance layers: {:?}", result);
            false
        }
    }
}

fn log_available_extensions(entry: &Entry) {
    if !log::log_enabled!(log::Level::Debug) {
        return;
    }

    match entry.enumerate_instance_extension_properties(None) {
        Ok(extensions) => {
            log::debug!("{} instance extensions available:", extensions.len());
            for extension in &extensions {
                let name = unsafe { CStr::from_ptr(extension.extension_name.as_ptr()) };
                log::debug!("  {}", name.to_string_lossy());
            }
        }
        Err(result) => log::debug!("Could not enumerate instance extensions: {:?}", result),
    }
}

fn setup_debug_messenger(debug_utils: &DebugUtils) -> Result<vk::DebugUtilsMessengerEXT, vk::Result> {
    let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(debug_callback));

    unsafe { debug_utils.create_debug_utils_messenger(&create_info, None) }
}

unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if callback_data.is_null() || (*callback_data).p_message.is_null() {
        return vk::FALSE;
    }
    let message = CStr::from_ptr((*callback_data).p_message).to_string_lossy();

    if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::ERROR {
        log::error!("[Vulkan] {:?} - {}", message_type, message);
    } else if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::WARNING {
        log::warn!("[Vulkan] {:?} - {}", message_type, message);
    } else if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::INFO {
        log::info!("[Vulkan] {:?} - {}", message_type, message);
    } else {
        log::trace!("[Vulkan] {:?} - {}", message_type, message);
    }

    vk::FALSE
}
