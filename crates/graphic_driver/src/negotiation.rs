//! Capability negotiation
//!
//! Pure selection logic over what the adapter and surface advertise: which
//! physical device to use, which queue families, and the concrete surface
//! format, present mode, extent and image count of the swapchain. Nothing in
//! here touches Vulkan directly; the backend gathers the facts and these
//! functions decide.

use ash::vk;

use crate::error::{DriverError, DriverResult};

/// Scores must strictly exceed this to be selected, so an all-zero field
/// yields [`DriverError::NoSuitableDevice`]
pub const MIN_DEVICE_SCORE: u32 = 1;

/// Bonus for discrete GPUs
pub const DISCRETE_GPU_BONUS: u32 = 1000;

/// What a queue family offers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilySupport {
    /// Capability flags of the family
    pub flags: vk::QueueFlags,
    /// Whether the family can present to the target surface
    pub present: bool,
}

/// Facts about one physical device relevant to selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterInfo {
    /// Human readable device name
    pub name: String,
    /// Integrated, discrete, virtual, ...
    pub device_type: vk::PhysicalDeviceType,
    /// `maxImageDimension2D` limit
    pub max_image_dimension_2d: u32,
    /// Geometry shader feature support
    pub geometry_shader: bool,
    /// Whether `VK_KHR_swapchain` is available
    pub swapchain_supported: bool,
    /// Queue families in index order
    pub queue_families: Vec<QueueFamilySupport>,
}

/// Deterministic suitability score of an adapter
pub fn suitability_score(adapter: &AdapterInfo) -> u32 {
    if !adapter.geometry_shader {
        return 0;
    }

    let mut score = 0u32;
    if adapter.device_type == vk::PhysicalDeviceType::DISCRETE_GPU {
        score += DISCRETE_GPU_BONUS;
    }
    score.saturating_add(adapter.max_image_dimension_2d)
}

/// Pick the first adapter whose score exceeds [`MIN_DEVICE_SCORE`]
///
/// Adapters without swapchain support are skipped entirely.
pub fn select_adapter(adapters: &[AdapterInfo]) -> DriverResult<usize> {
    if adapters.is_empty() {
        return Err(DriverError::NoPhysicalDevice);
    }

    for (index, adapter) in adapters.iter().enumerate() {
        if !adapter.swapchain_supported {
            log::debug!("Skipping {}: no swapchain support", adapter.name);
            continue;
        }

        let score = suitability_score(adapter);
        log::debug!("Adapter {} ({:?}) scored {}", adapter.name, adapter.device_type, score);
        if score > MIN_DEVICE_SCORE {
            return Ok(index);
        }
    }

    Err(DriverError::NoSuitableDevice)
}

/// Queue family indices used by the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilies {
    /// Family the graphics queue comes from
    pub graphics: u32,
    /// Family the present queue comes from
    pub present: u32,
}

impl QueueFamilies {
    /// Whether one family serves both roles
    pub const fn is_shared(&self) -> bool {
        self.graphics == self.present
    }

    /// Distinct families, graphics first
    pub fn unique(&self) -> Vec<u32> {
        if self.is_shared() {
            vec![self.graphics]
        } else {
            vec![self.graphics, self.present]
        }
    }

    /// Image sharing mode and the family indices it must list
    pub fn sharing(&self) -> (vk::SharingMode, Vec<u32>) {
        if self.is_shared() {
            (vk::SharingMode::EXCLUSIVE, Vec::new())
        } else {
            (vk::SharingMode::CONCURRENT, vec![self.graphics, self.present])
        }
    }
}

/// First graphics-capable family and first present-capable family
pub fn select_queue_families(families: &[QueueFamilySupport]) -> DriverResult<QueueFamilies> {
    let index_of = |predicate: fn(&QueueFamilySupport) -> bool| {
        families
            .iter()
            .position(predicate)
            .and_then(|index| u32::try_from(index).ok())
    };

    let graphics = index_of(|family| family.flags.contains(vk::QueueFlags::GRAPHICS))
        .ok_or(DriverError::NoGraphicsQueueFamily)?;
    let present = index_of(|family| family.present).ok_or(DriverError::NoPresentQueueFamily)?;

    Ok(QueueFamilies { graphics, present })
}

/// Surface capabilities with the "undefined extent" sentinel made explicit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceCapabilities {
    /// Minimum number of swapchain images
    pub min_image_count: u32,
    /// Maximum number of swapchain images, 0 meaning unbounded
    pub max_image_count: u32,
    /// Extent the surface dictates, `None` when the swapchain decides
    pub current_extent: Option<vk::Extent2D>,
    /// Smallest allowed extent
    pub min_image_extent: vk::Extent2D,
    /// Largest allowed extent
    pub max_image_extent: vk::Extent2D,
    /// Transform to use as pre-transform
    pub current_transform: vk::SurfaceTransformFlagsKHR,
}

impl From<vk::SurfaceCapabilitiesKHR> for SurfaceCapabilities {
    fn from(caps: vk::SurfaceCapabilitiesKHR) -> Self {
        let current_extent = (caps.current_extent.width != u32::MAX
            && caps.current_extent.height != u32::MAX)
            .then_some(caps.current_extent);

        Self {
            min_image_count: caps.min_image_count,
            max_image_count: caps.max_image_count,
            current_extent,
            min_image_extent: caps.min_image_extent,
            max_image_extent: caps.max_image_extent,
            current_transform: caps.current_transform,
        }
    }
}

/// Everything the surface advertises for one adapter
#[derive(Debug, Clone)]
pub struct SurfaceSupport {
    /// Capabilities
    pub capabilities: SurfaceCapabilities,
    /// Supported format/color-space pairs
    pub formats: Vec<vk::SurfaceFormatKHR>,
    /// Supported present modes
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SurfaceSupport {
    /// Fail if the surface offers no format or no present mode
    pub fn check(&self) -> DriverResult<()> {
        if self.formats.is_empty() {
            return Err(DriverError::NoSurfaceFormat);
        }
        if self.present_modes.is_empty() {
            return Err(DriverError::NoPresentMode);
        }
        Ok(())
    }
}

/// What the driver would like the surface to be
#[derive(Debug, Clone, Copy)]
pub struct SurfacePreferences {
    /// Preferred format/color-space pair
    pub format: vk::SurfaceFormatKHR,
    /// Preferred present mode
    pub present_mode: vk::PresentModeKHR,
}

impl Default for SurfacePreferences {
    fn default() -> Self {
        Self {
            format: vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            present_mode: vk::PresentModeKHR::MAILBOX,
        }
    }
}

/// Preferred pair when available, otherwise the first advertised format
pub fn choose_surface_format(
    formats: &[vk::SurfaceFormatKHR],
    preferred: vk::SurfaceFormatKHR,
) -> DriverResult<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .find(|sf| sf.format == preferred.format && sf.color_space == preferred.color_space)
        .or_else(|| formats.first())
        .copied()
        .ok_or(DriverError::NoSurfaceFormat)
}

/// Preferred mode when available, otherwise FIFO, which every surface supports
pub fn choose_present_mode(
    modes: &[vk::PresentModeKHR],
    preferred: vk::PresentModeKHR,
) -> DriverResult<vk::PresentModeKHR> {
    if modes.is_empty() {
        return Err(DriverError::NoPresentMode);
    }

    Ok(if modes.contains(&preferred) {
        preferred
    } else {
        vk::PresentModeKHR::FIFO
    })
}

/// The surface's own extent when it has one, else the request clamped to limits
pub fn choose_extent(caps: &SurfaceCapabilities, requested: vk::Extent2D) -> vk::Extent2D {
    caps.current_extent.unwrap_or_else(|| vk::Extent2D {
        width: requested
            .width
            .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
        height: requested
            .height
            .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
    })
}

/// One image above the minimum, capped by the maximum when there is one
pub const fn choose_image_count(min_image_count: u32, max_image_count: u32) -> u32 {
    let desired = min_image_count + 1;
    if max_image_count > 0 && desired > max_image_count {
        max_image_count
    } else {
        desired
    }
}

/// The concrete surface configuration a swapchain is built with
#[derive(Debug, Clone, Copy)]
pub struct SurfaceConfig {
    /// Image format and color space
    pub format: vk::SurfaceFormatKHR,
    /// Present mode
    pub present_mode: vk::PresentModeKHR,
    /// Image extent
    pub extent: vk::Extent2D,
    /// Requested minimum image count
    pub image_count: u32,
    /// Pre-transform
    pub transform: vk::SurfaceTransformFlagsKHR,
}

/// Resolve a complete [`SurfaceConfig`] from what the surface supports
pub fn negotiate_surface(
    support: &SurfaceSupport,
    requested: vk::Extent2D,
    preferences: &SurfacePreferences,
) -> DriverResult<SurfaceConfig> {
    let caps = &support.capabilities;
    Ok(SurfaceConfig {
        format: choose_surface_format(&support.formats, preferences.format)?,
        present_mode: choose_present_mode(&support.present_modes, preferences.present_mode)?,
        extent: choose_extent(caps, requested),
        image_count: choose_image_count(caps.min_image_count, caps.max_image_count),
        transform: caps.current_transform,
    })
}
