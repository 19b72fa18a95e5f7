//! # Driver Configuration
//!
//! Settings consumed by [`crate::VulkanGraphicDriver`]: instance metadata,
//! validation, frames in flight, surface preferences and where the
//! precompiled shaders live.

use std::path::{Path, PathBuf};

use ash::vk;
use serde::{Deserialize, Serialize};

use super::{Config, ConfigError};

/// Default number of frame slots
pub const DEFAULT_FRAMES_IN_FLIGHT: usize = 2;

/// Largest accepted number of frame slots
pub const MAX_FRAMES_IN_FLIGHT_LIMIT: usize = 8;

/// # Shader Configuration
///
/// Locates the vertex and fragment SPIR-V binaries. Without an explicit
/// directory the binaries are looked up in `<exe_dir>/../Data/Engine`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShaderConfig {
    /// Directory override; `None` resolves relative to the running executable
    pub directory: Option<PathBuf>,
    /// Vertex stage file name
    pub vertex_file: String,
    /// Fragment stage file name
    pub fragment_file: String,
}

impl ShaderConfig {
    /// Create a shader configuration with explicit file names
    pub fn new(vertex_file: impl Into<String>, fragment_file: impl Into<String>) -> Self {
        Self {
            directory: None,
            vertex_file: vertex_file.into(),
            fragment_file: fragment_file.into(),
        }
    }

    /// Look for the binaries in a fixed directory instead of next to the executable
    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = Some(directory.into());
        self
    }

    /// Directory the binaries are read from
    pub fn resolve_directory(&self) -> Result<PathBuf, ConfigError> {
        if let Some(directory) = &self.directory {
            return Ok(directory.clone());
        }

        let exe = std::env::current_exe()?;
        let exe_dir = exe.parent().unwrap_or_else(|| Path::new("."));
        Ok(exe_dir.join("..").join("Data").join("Engine"))
    }

    /// Full paths of the vertex and fragment binaries
    pub fn resolve_paths(&self) -> Result<(PathBuf, PathBuf), ConfigError> {
        let directory = self.resolve_directory()?;
        Ok((directory.join(&self.vertex_file), directory.join(&self.fragment_file)))
    }
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self::new("sample.vs.spv", "sample.fs.spv")
    }
}

/// Preferred swapchain color format, paired with the sRGB non-linear color space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColorFormatPreference {
    /// `B8G8R8A8_SRGB`
    Bgra8Srgb,
    /// `R8G8B8A8_SRGB`
    Rgba8Srgb,
    /// `B8G8R8A8_UNORM`
    Bgra8Unorm,
}

impl ColorFormatPreference {
    /// The Vulkan format/color-space pair this preference asks for
    pub const fn surface_format(self) -> vk::SurfaceFormatKHR {
        let format = match self {
            Self::Bgra8Srgb => vk::Format::B8G8R8A8_SRGB,
            Self::Rgba8Srgb => vk::Format::R8G8B8A8_SRGB,
            Self::Bgra8Unorm => vk::Format::B8G8R8A8_UNORM,
        };
        vk::SurfaceFormatKHR {
            format,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }
    }
}

/// Preferred presentation mode; FIFO is used whenever it is unavailable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PresentModePreference {
    /// Low-latency triple buffering
    Mailbox,
    /// Vsync, always available
    Fifo,
    /// Vsync that tears when late
    FifoRelaxed,
    /// No vsync
    Immediate,
}

impl PresentModePreference {
    /// The Vulkan present mode this preference asks for
    pub const fn present_mode(self) -> vk::PresentModeKHR {
        match self {
            Self::Mailbox => vk::PresentModeKHR::MAILBOX,
            Self::Fifo => vk::PresentModeKHR::FIFO,
            Self::FifoRelaxed => vk::PresentModeKHR::FIFO_RELAXED,
            Self::Immediate => vk::PresentModeKHR::IMMEDIATE,
        }
    }
}

/// # Driver Configuration
///
/// Every field has a default, so configuration files only need to name
/// the values they change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Application name for Vulkan instance creation
    pub application_name: String,
    /// Application version (major, minor, patch)
    pub application_version: (u32, u32, u32),
    /// Engine name for Vulkan instance creation
    pub engine_name: String,
    /// Engine version (major, minor, patch)
    pub engine_version: (u32, u32, u32),
    /// Whether to enable Vulkan validation layers; `None` follows the build type
    pub enable_validation: Option<bool>,
    /// Number of frame slots
    pub max_frames_in_flight: usize,
    /// Preferred swapchain format
    pub surface_format: ColorFormatPreference,
    /// Preferred present mode
    pub present_mode: PresentModePreference,
    /// RGBA clear color of the render pass
    pub clear_color: [f32; 4],
    /// Shader binary location
    pub shaders: ShaderConfig,
}

impl DriverConfig {
    /// Create a configuration with defaults and the given application name
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            application_name: app_name.into(),
            ..Self::default()
        }
    }

    /// Set application name
    pub fn with_application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = name.into();
        self
    }

    /// Set application version
    pub const fn with_version(mut self, major: u32, minor: u32, patch: u32) -> Self {
        self.application_version = (major, minor, patch);
        self
    }

    /// Set custom shader configuration
    pub fn with_shaders(mut self, shaders: ShaderConfig) -> Self {
        self.shaders = shaders;
        self
    }

    /// Set number of frame slots
    pub const fn with_max_frames_in_flight(mut self, frames: usize) -> Self {
        self.max_frames_in_flight = frames;
        self
    }

    /// Enable or disable validation layers
    pub const fn with_validation(mut self, enabled: bool) -> Self {
        self.enable_validation = Some(enabled);
        self
    }

    /// Set preferred present mode
    pub const fn with_present_mode(mut self, mode: PresentModePreference) -> Self {
        self.present_mode = mode;
        self
    }

    /// Set render pass clear color
    pub const fn with_clear_color(mut self, color: [f32; 4]) -> Self {
        self.clear_color = color;
        self
    }

    /// Whether validation layers should be requested
    pub const fn validation_enabled(&self) -> bool {
        match self.enable_validation {
            Some(enabled) => enabled,
            None => cfg!(debug_assertions),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.application_name.is_empty() {
            return Err(ConfigError::Invalid("Application name cannot be empty".to_string()));
        }

        if !(1..=MAX_FRAMES_IN_FLIGHT_LIMIT).contains(&self.max_frames_in_flight) {
            return Err(ConfigError::Invalid(format!(
                "Max frames in flight must be between 1 and {}, got {}",
                MAX_FRAMES_IN_FLIGHT_LIMIT, self.max_frames_in_flight
            )));
        }

        if self.clear_color.iter().any(|c| !(0.0..=1.0).contains(c)) {
            return Err(ConfigError::Invalid(format!(
                "Clear color components must lie in [0, 1]: {:?}",
                self.clear_color
            )));
        }

        if self.shaders.vertex_file.is_empty() || self.shaders.fragment_file.is_empty() {
            return Err(ConfigError::Invalid("Shader file names cannot be empty".to_string()));
        }

        Ok(())
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            application_name: "Player".to_string(),
            application_version: (0, 1, 0),
            engine_name: "Kaleidoscope".to_string(),
            engine_version: (0, 1, 0),
            enable_validation: None,
            max_frames_in_flight: DEFAULT_FRAMES_IN_FLIGHT,
            surface_format: ColorFormatPreference::Bgra8Srgb,
            present_mode: PresentModePreference::Mailbox,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            shaders: ShaderConfig::default(),
        }
    }
}

impl Config for DriverConfig {}
