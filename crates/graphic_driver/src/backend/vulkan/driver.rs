//! Vulkan implementation of the driver lifecycle

use ash::vk;

use super::adapter::enumerate_adapters;
use super::device::VulkanDevice;
use super::instance::VulkanInstance;
use super::surface::PresentationSurface;
use crate::config::DriverConfig;
use crate::driver::{DriverState, GraphicDriver, GraphicInitialInfo, GraphicResizeInfo};
use crate::error::{DriverError, DriverResult, ErrorKind};
use crate::negotiation::{select_adapter, select_queue_families, SurfacePreferences};
use crate::session::{RenderSession, SessionSettings};
use crate::shaders::ShaderBinaries;

/// Graphic driver backed by Vulkan
///
/// Field order is drop order: session objects go before the device, the
/// device before the surface and the surface before the instance.
pub struct VulkanGraphicDriver {
    config: DriverConfig,
    state: DriverState,
    last_error_kind: Option<ErrorKind>,
    session: Option<RenderSession>,
    device: Option<VulkanDevice>,
    surface: Option<PresentationSurface>,
    instance: Option<VulkanInstance>,
}

impl VulkanGraphicDriver {
    /// Create a driver; nothing is acquired until [`GraphicDriver::start_up`]
    pub const fn new(config: DriverConfig) -> Self {
        Self {
            config,
            state: DriverState::Created,
            last_error_kind: None,
            session: None,
            device: None,
            surface: None,
            instance: None,
        }
    }

    /// Current lifecycle state
    pub const fn state(&self) -> DriverState {
        self.state
    }

    /// Configuration the driver was created with
    pub const fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Whether frames are skipped because the window has zero area
    pub fn is_suspended(&self) -> bool {
        self.session.as_ref().is_some_and(RenderSession::is_suspended)
    }

    /// Current swapchain extent, if surface resources exist
    pub fn extent(&self) -> Option<vk::Extent2D> {
        self.session.as_ref().and_then(RenderSession::extent)
    }

    /// Class of the most recent error returned by a lifecycle call
    pub const fn last_error_kind(&self) -> Option<ErrorKind> {
        self.last_error_kind
    }

    fn expect_state(&self, operation: &'static str, expected: DriverState) -> DriverResult<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(DriverError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    fn record<T>(&mut self, result: DriverResult<T>) -> DriverResult<T> {
        if let Err(err) = &result {
            self.last_error_kind = Some(err.kind());
        }
        result
    }

    fn bring_up(&mut self, info: GraphicInitialInfo<'_>) -> DriverResult<()> {
        let extent = info.extent();
        let window_extensions = info.window.required_instance_extensions()?;
        log::debug!("Window system requires {:?}", window_extensions);

        let instance = VulkanInstance::new(&self.config, &window_extensions)?;
        let surface = PresentationSurface::new(&instance, info.window)?;

        let (physical_devices, adapters) = enumerate_adapters(instance.instance(), &surface)?;
        let selected = select_adapter(&adapters)?;
        let adapter = &adapters[selected];
        log::info!("Selected GPU: {} ({:?})", adapter.name, adapter.device_type);

        let queue_families = select_queue_families(&adapter.queue_families)?;
        let physical_device = physical_devices[selected];
        surface.support(physical_device)?.check()?;

        let mut device = VulkanDevice::new(
            instance.instance(),
            physical_device,
            queue_families,
            surface.loader(),
            surface.handle(),
        )?;

        let settings = SessionSettings {
            queue_families,
            shaders: ShaderBinaries::load(&self.config.shaders)?,
            preferences: SurfacePreferences {
                format: self.config.surface_format.surface_format(),
                present_mode: self.config.present_mode.present_mode(),
            },
            clear_color: self.config.clear_color,
            frames_in_flight: self.config.max_frames_in_flight,
        };
        let session = RenderSession::start(&mut device, settings, extent)?;

        self.session = Some(session);
        self.device = Some(device);
        self.surface = Some(surface);
        self.instance = Some(instance);
        Ok(())
    }

    fn release(&mut self) -> DriverResult<()> {
        let result = match (self.session.take(), self.device.as_mut()) {
            (Some(session), Some(device)) => session.shut_down(device),
            _ => Ok(()),
        };
        self.device = None;
        self.surface = None;
        self.instance = None;
        result
    }
}

impl GraphicDriver for VulkanGraphicDriver {
    fn initial(&mut self) -> DriverResult<()> {
        self.expect_state("initial", DriverState::Created)?;
        let result = self.config.validate().map_err(DriverError::from);
        self.record(result)?;

        log::info!(
            "Graphic driver initialized for {} v{}.{}.{}",
            self.config.application_name,
            self.config.application_version.0,
            self.config.application_version.1,
            self.config.application_version.2
        );
        self.state = DriverState::Initialized;
        Ok(())
    }

    fn start_up(&mut self, info: GraphicInitialInfo<'_>) -> DriverResult<()> {
        self.expect_state("start_up", DriverState::Initialized)?;

        // locals drop in reverse declaration order on failure
        let result = self.bring_up(info);
        self.record(result)?;

        self.state = DriverState::Running;
        log::info!("Graphic driver running");
        Ok(())
    }

    fn draw_frame(&mut self) -> DriverResult<()> {
        self.expect_state("draw_frame", DriverState::Running)?;
        let result = match (self.session.as_mut(), self.device.as_mut()) {
            (Some(session), Some(device)) => session.draw_frame(device).map(|_| ()),
            _ => Err(DriverError::SurfaceUnavailable),
        };
        self.record(result)
    }

    fn resize_window(&mut self, info: &GraphicResizeInfo) -> DriverResult<()> {
        self.expect_state("resize_window", DriverState::Running)?;
        log::debug!(
            "Resize {}x{} -> {}x{}",
            info.old_width,
            info.old_height,
            info.new_width,
            info.new_height
        );
        let result = match (self.session.as_mut(), self.device.as_mut()) {
            (Some(session), Some(device)) => session.resize(device, info).map(|_| ()),
            _ => Err(DriverError::SurfaceUnavailable),
        };
        self.record(result)
    }

    fn shut_down(&mut self) -> DriverResult<()> {
        self.expect_state("shut_down", DriverState::Running)?;
        let result = self.release();
        self.state = DriverState::ShutDown;
        log::info!("Graphic driver shut down");
        self.record(result)
    }

    fn clean_up(&mut self) {
        if self.state == DriverState::Running {
            if let Err(err) = self.shut_down() {
                log::error!("Shutdown during clean up failed: {}", err);
            }
        }
        self.last_error_kind = None;
        self.state = DriverState::Created;
        log::debug!("Graphic driver cleaned up");
    }
}

impl Drop for VulkanGraphicDriver {
    fn drop(&mut self) {
        if self.state == DriverState::Running {
            if let Err(err) = self.release() {
                log::error!("Releasing GPU objects on drop failed: {}", err);
            }
        }
    }
}
