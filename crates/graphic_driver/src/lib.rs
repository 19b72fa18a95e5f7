//! # Graphic Driver
//!
//! A minimal Vulkan rendering driver. It brings up a presentation surface,
//! builds a fixed single-triangle pipeline and keeps a render loop correct
//! across window resize and minimize/restore.
//!
//! ## Components
//!
//! - **Capability negotiation** ([`negotiation`]): adapter scoring, queue family
//!   selection, surface format / present mode / extent resolution
//! - **Resource graph** ([`resources`]): ordered construction and reverse-order
//!   teardown of swapchain, pipeline and per-image objects
//! - **Frame synchronization** ([`frame`]): frames in flight, fences and
//!   semaphores, the acquire/submit/present protocol
//! - **Resize coordination** ([`resize`]): minimize, restore and drain-then-rebuild
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use graphic_driver::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut window = Window::new("Triangle", 1024, 768)?;
//!     let mut driver = VulkanGraphicDriver::new(DriverConfig::default());
//!
//!     driver.initial()?;
//!     driver.start_up(GraphicInitialInfo::new(&mut window, 1024, 768))?;
//!     while !window.should_close() {
//!         window.pump_events(false);
//!         driver.draw_frame()?;
//!     }
//!     driver.shut_down()?;
//!     driver.clean_up();
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod backend;
pub mod config;
pub mod device;
pub mod driver;
pub mod error;
pub mod frame;
pub mod negotiation;
pub mod resize;
pub mod resources;
pub mod session;
pub mod shaders;
pub mod window;

#[cfg(test)]
pub(crate) mod testing;

pub use backend::vulkan::VulkanGraphicDriver;
pub use config::{Config, ConfigError, DriverConfig, ShaderConfig};
pub use driver::{DriverState, GraphicDriver, GraphicInitialInfo, GraphicResizeInfo, WindowSurface};
pub use error::{DriverError, DriverResult, ErrorKind};

/// Common imports for driver users
pub mod prelude {
    pub use crate::{
        config::{Config, DriverConfig, ShaderConfig},
        driver::{GraphicDriver, GraphicInitialInfo, GraphicResizeInfo, WindowSurface},
        error::{DriverError, DriverResult, ErrorKind},
        window::Window,
        VulkanGraphicDriver,
    };
}
