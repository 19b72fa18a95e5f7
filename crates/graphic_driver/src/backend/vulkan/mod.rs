//! Vulkan backend
//!
//! Instance and surface bring-up, adapter discovery, the logical device that
//! implements [`crate::device::GpuDevice`], and [`VulkanGraphicDriver`] which
//! ties them to the lifecycle.

pub mod adapter;
pub mod device;
pub mod driver;
pub mod instance;
pub mod pipeline;
pub mod surface;

pub use device::VulkanDevice;
pub use driver::VulkanGraphicDriver;
pub use instance::VulkanInstance;
pub use surface::PresentationSurface;
