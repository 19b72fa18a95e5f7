//! Lifecycle contract of a graphic driver
//!
//! A host drives any backend through [`GraphicDriver`]:
//!
//! ```text
//! initial -> start_up -> (draw_frame | resize_window)* -> shut_down -> clean_up
//! ```

use ash::vk;

use crate::error::DriverResult;

/// Where the driver is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    /// Constructed, nothing acquired
    Created,
    /// `initial` succeeded
    Initialized,
    /// `start_up` succeeded; frames can be drawn
    Running,
    /// `shut_down` released every GPU object
    ShutDown,
}

/// A window the driver can present to
///
/// Implemented by the windowing layer. The driver asks it which instance
/// extensions presentation needs and then for a surface on the created
/// instance.
pub trait WindowSurface {
    /// Instance extensions the window system requires
    fn required_instance_extensions(&self) -> DriverResult<Vec<String>>;

    /// Create a presentation surface for this window
    fn create_surface(&mut self, instance: vk::Instance) -> DriverResult<vk::SurfaceKHR>;
}

/// Arguments of [`GraphicDriver::start_up`]
pub struct GraphicInitialInfo<'a> {
    /// Window to present into
    pub window: &'a mut dyn WindowSurface,
    /// Initial framebuffer width in pixels
    pub width: u32,
    /// Initial framebuffer height in pixels
    pub height: u32,
}

impl<'a> GraphicInitialInfo<'a> {
    /// Bundle a window with its initial framebuffer size
    pub fn new(window: &'a mut dyn WindowSurface, width: u32, height: u32) -> Self {
        Self { window, width, height }
    }

    /// Requested initial extent
    pub const fn extent(&self) -> vk::Extent2D {
        vk::Extent2D {
            width: self.width,
            height: self.height,
        }
    }
}

/// Arguments of [`GraphicDriver::resize_window`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphicResizeInfo {
    /// Previous framebuffer width
    pub old_width: u32,
    /// Previous framebuffer height
    pub old_height: u32,
    /// New framebuffer width
    pub new_width: u32,
    /// New framebuffer height
    pub new_height: u32,
}

impl GraphicResizeInfo {
    /// Describe a change from `old` to `new` framebuffer size
    pub const fn new(old: (u32, u32), new: (u32, u32)) -> Self {
        Self {
            old_width: old.0,
            old_height: old.1,
            new_width: new.0,
            new_height: new.1,
        }
    }

    /// Previous extent
    pub const fn old_extent(&self) -> vk::Extent2D {
        vk::Extent2D {
            width: self.old_width,
            height: self.old_height,
        }
    }

    /// New extent
    pub const fn new_extent(&self) -> vk::Extent2D {
        vk::Extent2D {
            width: self.new_width,
            height: self.new_height,
        }
    }
}

/// The lifecycle every rendering backend implements
pub trait GraphicDriver {
    /// Prepare state that needs no window; the API is not touched yet
    fn initial(&mut self) -> DriverResult<()>;

    /// Negotiate capabilities, create every GPU object and record command buffers
    fn start_up(&mut self, info: GraphicInitialInfo<'_>) -> DriverResult<()>;

    /// Render and present one frame, or do nothing while minimized
    fn draw_frame(&mut self) -> DriverResult<()>;

    /// React to a framebuffer size change
    fn resize_window(&mut self, info: &GraphicResizeInfo) -> DriverResult<()>;

    /// Wait for the GPU and release every GPU object
    fn shut_down(&mut self) -> DriverResult<()>;

    /// Release remaining host-side state; always succeeds
    fn clean_up(&mut self);
}
