//! Desktop window hosting the presentation surface
//!
//! The window is opened without a client API; all rendering reaches it
//! through the Vulkan surface created from it. Key, close and framebuffer
//! size events are queued by GLFW and handed to the caller in batches.

use ash::vk;
use glfw::WindowEvent;
use thiserror::Error;

use crate::driver::WindowSurface;
use crate::error::{DriverError, DriverResult};

/// Failure to open the window
#[derive(Error, Debug, PartialEq, Eq)]
pub enum WindowError {
    /// GLFW itself failed to start
    #[error("could not initialize GLFW: {0}")]
    Init(String),

    /// Vulkan surfaces cannot be created on this system
    #[error("GLFW found no Vulkan loader")]
    VulkanUnavailable,

    /// A requested dimension was zero
    #[error("cannot open a {width}x{height} window")]
    EmptySize {
        /// Requested width
        width: u32,
        /// Requested height
        height: u32,
    },

    /// GLFW returned no window
    #[error("GLFW refused to open window {title:?}")]
    Refused {
        /// Requested title
        title: String,
    },
}

/// Result of opening a window
pub type WindowResult<T> = Result<T, WindowError>;

fn checked_size(width: u32, height: u32) -> WindowResult<(u32, u32)> {
    if width == 0 || height == 0 {
        Err(WindowError::EmptySize { width, height })
    } else {
        Ok((width, height))
    }
}

/// Resizable window with no client API
pub struct Window {
    glfw: glfw::Glfw,
    handle: glfw::PWindow,
    receiver: glfw::GlfwReceiver<(f64, WindowEvent)>,
}

impl Window {
    /// Open a `width` x `height` window
    pub fn new(title: &str, width: u32, height: u32) -> WindowResult<Self> {
        let (width, height) = checked_size(width, height)?;

        let mut glfw = glfw::init(glfw::fail_on_errors).map_err(|err| WindowError::Init(format!("{:?}", err)))?;
        if !glfw.vulkan_supported() {
            return Err(WindowError::VulkanUnavailable);
        }

        glfw.window_hint(glfw::WindowHint::ClientApi(glfw::ClientApiHint::NoApi));
        glfw.window_hint(glfw::WindowHint::Resizable(true));
        let (mut handle, receiver) = glfw
            .create_window(width, height, title, glfw::WindowMode::Windowed)
            .ok_or_else(|| WindowError::Refused {
                title: title.to_string(),
            })?;

        handle.set_framebuffer_size_polling(true);
        handle.set_key_polling(true);
        handle.set_close_polling(true);
        log::debug!("Opened {}x{} window {:?}", width, height, title);

        Ok(Self { glfw, handle, receiver })
    }

    /// Whether closing was requested by the user or by [`Window::request_close`]
    pub fn should_close(&self) -> bool {
        self.handle.should_close()
    }

    /// Leave the event loop after the current iteration
    pub fn request_close(&mut self) {
        self.handle.set_should_close(true);
    }

    /// Process window system events and return the ones queued for this window
    ///
    /// With `block` set, sleeps until at least one event arrives.
    pub fn pump_events(&mut self, block: bool) -> Vec<WindowEvent> {
        if block {
            self.glfw.wait_events();
        } else {
            self.glfw.poll_events();
        }
        glfw::flush_messages(&self.receiver).map(|(_, event)| event).collect()
    }

    /// Framebuffer size in pixels; zero while minimized
    pub fn framebuffer_size(&self) -> (u32, u32) {
        let (width, height) = self.handle.get_framebuffer_size();
        (width.max(0) as u32, height.max(0) as u32)
    }
}

impl WindowSurface for Window {
    fn required_instance_extensions(&self) -> DriverResult<Vec<String>> {
        self.glfw
            .get_required_instance_extensions()
            .ok_or_else(|| DriverError::WindowSystem("no instance extensions for presentation".to_string()))
    }

    fn create_surface(&mut self, instance: vk::Instance) -> DriverResult<vk::SurfaceKHR> {
        let mut surface = vk::SurfaceKHR::null();
        match self.handle.create_window_surface(instance, std::ptr::null(), &mut surface) {
            vk::Result::SUCCESS => Ok(surface),
            result => Err(DriverError::SurfaceCreation(format!("{:?}", result))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_dimension_is_rejected_before_glfw_starts() {
        assert_eq!(checked_size(0, 600), Err(WindowError::EmptySize { width: 0, height: 600 }));
        assert_eq!(checked_size(800, 0), Err(WindowError::EmptySize { width: 800, height: 0 }));
        assert_eq!(checked_size(800, 600), Ok((800, 600)));
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            WindowError::EmptySize { width: 0, height: 600 }.to_string(),
            "cannot open a 0x600 window"
        );
        assert_eq!(
            WindowError::Refused {
                title: "Triangle".to_string()
            }
            .to_string(),
            "GLFW refused to open window \"Triangle\""
        );
        assert_eq!(WindowError::VulkanUnavailable.to_string(), "GLFW found no Vulkan loader");
    }
}
