//! Driver error types
//!
//! Every lifecycle call reports a single [`DriverError`]. Variants are distinct
//! per failure cause so callers can tell a missing present queue from a missing
//! surface format, or a lost device from an out-of-date swapchain.

use std::path::PathBuf;

use ash::vk;
use thiserror::Error;

use crate::config::ConfigError;
use crate::driver::DriverState;

/// Errors raised by the graphic driver
#[derive(Error, Debug)]
pub enum DriverError {
    /// The Vulkan loader library could not be loaded
    #[error("Vulkan loader unavailable: {0}")]
    LoaderUnavailable(String),

    /// `vkCreateInstance` failed
    #[error("Instance creation failed: {0:?}")]
    InstanceCreation(vk::Result),

    /// The window system could not provide what Vulkan needs
    #[error("Window system error: {0}")]
    WindowSystem(String),

    /// The presentation surface could not be created for the window
    #[error("Window surface creation failed: {0}")]
    SurfaceCreation(String),

    /// The instance reports no physical devices at all
    #[error("No physical device available")]
    NoPhysicalDevice,

    /// Physical devices exist but none passes the suitability threshold
    #[error("No suitable physical device found")]
    NoSuitableDevice,

    /// The selected adapter has no graphics-capable queue family
    #[error("Selected device has no graphics queue family")]
    NoGraphicsQueueFamily,

    /// No queue family of the selected adapter can present to the surface
    #[error("Selected device has no present queue family")]
    NoPresentQueueFamily,

    /// The surface reports no supported formats
    #[error("Surface reports no supported formats")]
    NoSurfaceFormat,

    /// The surface reports no supported present modes
    #[error("Surface reports no supported present modes")]
    NoPresentMode,

    /// `vkCreateDevice` failed
    #[error("Logical device creation failed: {0:?}")]
    LogicalDeviceCreation(vk::Result),

    /// `vkCreateSwapchainKHR` failed
    #[error("Swapchain creation failed: {0:?}")]
    SwapchainCreation(vk::Result),

    /// Fetching the swapchain images failed
    #[error("Swapchain image query failed: {0:?}")]
    SwapchainImages(vk::Result),

    /// Creating a swapchain image view failed
    #[error("Image view creation failed: {0:?}")]
    ImageViewCreation(vk::Result),

    /// Creating the pipeline layout failed
    #[error("Pipeline layout creation failed: {0:?}")]
    PipelineLayoutCreation(vk::Result),

    /// Creating the render pass failed
    #[error("Render pass creation failed: {0:?}")]
    RenderPassCreation(vk::Result),

    /// Creating a shader module failed
    #[error("Shader module creation failed: {0:?}")]
    ShaderModuleCreation(vk::Result),

    /// Creating the graphics pipeline failed
    #[error("Graphics pipeline creation failed: {0:?}")]
    PipelineCreation(vk::Result),

    /// Creating a framebuffer failed
    #[error("Framebuffer creation failed: {0:?}")]
    FramebufferCreation(vk::Result),

    /// Creating the command pool failed
    #[error("Command pool creation failed: {0:?}")]
    CommandPoolCreation(vk::Result),

    /// Allocating command buffers failed
    #[error("Command buffer allocation failed: {0:?}")]
    CommandBufferAllocation(vk::Result),

    /// Recording a command buffer failed
    #[error("Command buffer recording failed: {0:?}")]
    CommandRecording(vk::Result),

    /// Creating a semaphore or fence failed
    #[error("Synchronization object creation failed: {0:?}")]
    SyncObjectCreation(vk::Result),

    /// A shader binary could not be read
    #[error("Failed to read shader {path:?}: {source}")]
    ShaderLoad {
        /// File that failed to load
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// A shader binary is not valid SPIR-V
    #[error("Invalid shader {path:?}: {reason}")]
    InvalidShader {
        /// File (or label) of the offending binary
        path: PathBuf,
        /// Why it was rejected
        reason: String,
    },

    /// The surface changed and the swapchain no longer matches it
    #[error("Swapchain is out of date with the surface")]
    SurfaceOutOfDate,

    /// Acquiring the next swapchain image failed
    #[error("Image acquisition failed: {0:?}")]
    Acquire(vk::Result),

    /// Queue submission failed
    #[error("Queue submission failed: {0:?}")]
    Submit(vk::Result),

    /// Presentation failed
    #[error("Presentation failed: {0:?}")]
    Present(vk::Result),

    /// The presentation engine returned an index outside the swapchain
    #[error("Acquired image index {index} out of range for {count} images")]
    ImageIndexOutOfRange {
        /// Index returned by acquisition
        index: u32,
        /// Number of swapchain images
        count: usize,
    },

    /// The logical device was lost
    #[error("Device lost")]
    DeviceLost,

    /// Any other Vulkan API failure
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// A lifecycle call was made in a state that does not allow it
    #[error("{operation} is not allowed while the driver is {state:?}")]
    InvalidState {
        /// The rejected call
        operation: &'static str,
        /// State at the time of the call
        state: DriverState,
    },

    /// No swapchain exists, typically after a failed rebuild
    #[error("No surface resources are available")]
    SurfaceUnavailable,

    /// Configuration could not be loaded or is invalid
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type for driver operations
pub type DriverResult<T> = Result<T, DriverError>;

/// Broad classes of failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Hardware or platform lacks something required; fatal to start-up
    Capability,
    /// An object creation call failed
    ResourceCreation,
    /// The surface went out of date; resolved by the next resize
    TransientPresentation,
    /// Unexpected GPU failure with no recovery path
    Device,
    /// The caller used the driver out of order
    Usage,
    /// Configuration or shader input was unusable
    Configuration,
}

impl DriverError {
    /// Classify this error
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NoPhysicalDevice
            | Self::NoSuitableDevice
            | Self::NoGraphicsQueueFamily
            | Self::NoPresentQueueFamily
            | Self::NoSurfaceFormat
            | Self::NoPresentMode
            | Self::LoaderUnavailable(_)
            | Self::WindowSystem(_) => ErrorKind::Capability,

            Self::InstanceCreation(_)
            | Self::SurfaceCreation(_)
            | Self::LogicalDeviceCreation(_)
            | Self::SwapchainCreation(_)
            | Self::SwapchainImages(_)
            | Self::ImageViewCreation(_)
            | Self::PipelineLayoutCreation(_)
            | Self::RenderPassCreation(_)
            | Self::ShaderModuleCreation(_)
            | Self::PipelineCreation(_)
            | Self::FramebufferCreation(_)
            | Self::CommandPoolCreation(_)
            | Self::CommandBufferAllocation(_)
            | Self::CommandRecording(_)
            | Self::SyncObjectCreation(_) => ErrorKind::ResourceCreation,

            Self::SurfaceOutOfDate => ErrorKind::TransientPresentation,

            Self::Acquire(_)
            | Self::Submit(_)
            | Self::Present(_)
            | Self::ImageIndexOutOfRange { .. }
            | Self::DeviceLost
            | Self::Api(_) => ErrorKind::Device,

            Self::InvalidState { .. } | Self::SurfaceUnavailable => ErrorKind::Usage,

            Self::ShaderLoad { .. } | Self::InvalidShader { .. } | Self::Config(_) => {
                ErrorKind::Configuration
            }
        }
    }

    /// Whether the caller can expect a resize to clear this error
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::SurfaceOutOfDate)
    }

    /// Map a result code from the per-frame path, splitting out device loss
    pub(crate) fn from_frame_result(result: vk::Result, wrap: fn(vk::Result) -> Self) -> Self {
        match result {
            vk::Result::ERROR_DEVICE_LOST => Self::DeviceLost,
            vk::Result::ERROR_OUT_OF_DATE_KHR => Self::SurfaceOutOfDate,
            other => wrap(other),
        }
    }
}
