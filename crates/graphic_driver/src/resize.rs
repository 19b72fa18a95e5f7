//! Resize coordination
//!
//! A framebuffer change becomes one of three plans. A zero-area target
//! suspends drawing without touching GPU objects. Coming back from a
//! zero-area size only resumes drawing, because the resources built before
//! the minimize are still valid for the restored size. Anything else drains
//! the GPU and rebuilds the surface scope at the new extent.

use ash::vk;

use crate::driver::GraphicResizeInfo;

/// What a resize request asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizePlan {
    /// New size has zero area; skip frames until restored
    Suspend,
    /// Restored from zero area; draw again with the existing resources
    Resume,
    /// Wait idle, tear down and rebuild at this extent
    Rebuild(vk::Extent2D),
}

impl ResizePlan {
    /// Classify a resize request
    pub const fn from_info(info: &GraphicResizeInfo) -> Self {
        if is_zero_area(info.new_width, info.new_height) {
            Self::Suspend
        } else if is_zero_area(info.old_width, info.old_height) {
            Self::Resume
        } else {
            Self::Rebuild(info.new_extent())
        }
    }
}

const fn is_zero_area(width: u32, height: u32) -> bool {
    width == 0 || height == 0
}
