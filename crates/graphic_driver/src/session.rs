//! Render session
//!
//! Owns the device-scoped objects (command pool, frame slots, shader code)
//! and the current surface scope. This is where the resize policy meets the
//! resource graph: a rebuild drains the GPU, tears the surface scope down and
//! builds it again, while the frame slots survive untouched.

use ash::vk;

use crate::device::GpuDevice;
use crate::driver::GraphicResizeInfo;
use crate::error::{DriverError, DriverResult};
use crate::frame::{FrameOutcome, FrameSynchronizer};
use crate::negotiation::{QueueFamilies, SurfacePreferences};
use crate::resize::ResizePlan;
use crate::resources::{GraphContext, SurfaceScope};
use crate::shaders::ShaderBinaries;

/// Everything needed to start a session
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Graphics and present families of the logical device
    pub queue_families: QueueFamilies,
    /// Pipeline shader code
    pub shaders: ShaderBinaries,
    /// Preferred surface format and present mode
    pub preferences: SurfacePreferences,
    /// Clear color of every frame
    pub clear_color: [f32; 4],
    /// Number of frame slots
    pub frames_in_flight: usize,
}

/// Objects that live as long as the logical device
#[derive(Debug)]
struct SessionScope {
    queue_families: QueueFamilies,
    command_pool: vk::CommandPool,
    frames: FrameSynchronizer,
    shaders: ShaderBinaries,
    preferences: SurfacePreferences,
    clear_color: [f32; 4],
}

impl SessionScope {
    fn graph_context(&self) -> GraphContext<'_> {
        GraphContext {
            queue_families: self.queue_families,
            command_pool: self.command_pool,
            shaders: &self.shaders,
            preferences: self.preferences,
            clear_color: self.clear_color,
        }
    }

    fn destroy<D: GpuDevice>(self, device: &mut D) {
        self.frames.destroy(device);
        device.destroy_command_pool(self.command_pool);
    }
}

/// A running renderer on one device and one surface
#[derive(Debug)]
pub struct RenderSession {
    scope: SessionScope,
    surface: Option<SurfaceScope>,
}

impl RenderSession {
    /// Create the command pool, frame slots and the first surface scope
    ///
    /// Frame slots come before the first surface scope, so every surface
    /// scope, rebuilt or not, nests inside them and is torn down first.
    pub fn start<D: GpuDevice>(
        device: &mut D,
        settings: SessionSettings,
        extent: vk::Extent2D,
    ) -> DriverResult<Self> {
        let command_pool = device.create_command_pool(settings.queue_families.graphics)?;
        let frames = match FrameSynchronizer::new(device, settings.frames_in_flight) {
            Ok(frames) => frames,
            Err(err) => {
                device.destroy_command_pool(command_pool);
                return Err(err);
            }
        };

        let scope = SessionScope {
            queue_families: settings.queue_families,
            command_pool,
            frames,
            shaders: settings.shaders,
            preferences: settings.preferences,
            clear_color: settings.clear_color,
        };

        let mut session = Self { scope, surface: None };
        if extent.width == 0 || extent.height == 0 {
            log::info!("Starting minimized; surface resources are built on the first resize");
            session.scope.frames.set_skip_frame(true);
            return Ok(session);
        }

        match SurfaceScope::build(device, &session.scope.graph_context(), extent) {
            Ok(surface) => {
                session.scope.frames.reset_image_fences(surface.image_count());
                session.surface = Some(surface);
                Ok(session)
            }
            Err(err) => {
                session.scope.destroy(device);
                Err(err)
            }
        }
    }

    /// Draw one frame, or skip it while suspended
    pub fn draw_frame<D: GpuDevice>(&mut self, device: &mut D) -> DriverResult<FrameOutcome> {
        if self.scope.frames.skip_frame() {
            return Ok(FrameOutcome::Skipped);
        }
        let surface = self.surface.as_ref().ok_or(DriverError::SurfaceUnavailable)?;
        self.scope.frames.draw(device, surface)
    }

    /// Apply the resize policy and return the plan that was carried out
    ///
    /// When a rebuild fails the surface scope stays absent; draws report
    /// [`DriverError::SurfaceUnavailable`] until a later resize succeeds.
    pub fn resize<D: GpuDevice>(&mut self, device: &mut D, info: &GraphicResizeInfo) -> DriverResult<ResizePlan> {
        let mut plan = ResizePlan::from_info(info);
        if plan == ResizePlan::Resume && self.surface.is_none() {
            plan = ResizePlan::Rebuild(info.new_extent());
        }

        match plan {
            ResizePlan::Suspend => {
                log::debug!("Framebuffer has zero area, suspending frames");
                self.scope.frames.set_skip_frame(true);
            }
            ResizePlan::Resume => {
                log::debug!("Framebuffer restored, resuming frames");
                self.scope.frames.set_skip_frame(false);
            }
            ResizePlan::Rebuild(extent) => {
                self.rebuild(device, extent)?;
                self.scope.frames.set_skip_frame(false);
            }
        }
        Ok(plan)
    }

    fn rebuild<D: GpuDevice>(&mut self, device: &mut D, extent: vk::Extent2D) -> DriverResult<()> {
        log::info!("Rebuilding surface resources at {}x{}", extent.width, extent.height);
        device.wait_idle()?;

        if let Some(surface) = self.surface.take() {
            surface.teardown(device);
        }

        let surface = SurfaceScope::build(device, &self.scope.graph_context(), extent)?;
        self.scope.frames.reset_image_fences(surface.image_count());
        self.surface = Some(surface);
        Ok(())
    }

    /// Drain the GPU and destroy everything in reverse creation order
    ///
    /// Teardown continues even if the idle wait fails; that error is
    /// returned afterwards.
    pub fn shut_down<D: GpuDevice>(mut self, device: &mut D) -> DriverResult<()> {
        let idle = device.wait_idle();
        if let Err(err) = &idle {
            log::error!("Device wait idle failed during shutdown: {}", err);
        }

        if let Some(surface) = self.surface.take() {
            surface.teardown(device);
        }
        self.scope.destroy(device);
        log::debug!("Render session shut down");
        idle
    }

    /// Extent of the current surface scope
    pub fn extent(&self) -> Option<vk::Extent2D> {
        self.surface.as_ref().map(SurfaceScope::extent)
    }

    /// Number of swapchain images
    pub fn image_count(&self) -> usize {
        self.surface.as_ref().map_or(0, SurfaceScope::image_count)
    }

    /// Whether frames are currently skipped
    pub const fn is_suspended(&self) -> bool {
        self.scope.frames.skip_frame()
    }

    /// Number of frame slots
    pub fn frames_in_flight(&self) -> usize {
        self.scope.frames.frames_in_flight()
    }

    /// Frame synchronizer of this session
    pub const fn frames(&self) -> &FrameSynchronizer {
        &self.scope.frames
    }

    /// Current surface scope, absent after a failed rebuild
    pub const fn surface(&self) -> Option<&SurfaceScope> {
        self.surface.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_shaders, FakeDevice, Kind};

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn settings() -> SessionSettings {
        SessionSettings {
            queue_families: QueueFamilies { graphics: 0, present: 0 },
            shaders: sample_shaders(),
            preferences: SurfacePreferences::default(),
            clear_color: [0.0, 0.0, 0.0, 1.0],
            frames_in_flight: 2,
        }
    }

    fn extent(width: u32, height: u32) -> vk::Extent2D {
        vk::Extent2D { width, height }
    }

    #[test]
    fn test_start_and_draw() {
        init();
        let mut device = FakeDevice::new();
        let mut session = RenderSession::start(&mut device, settings(), extent(800, 600)).unwrap();

        assert_eq!(session.extent(), Some(extent(800, 600)));
        assert_eq!(session.image_count(), 3);
        assert_eq!(session.frames_in_flight(), 2);

        let outcome = session.draw_frame(&mut device).unwrap();
        assert_eq!(outcome, FrameOutcome::Presented { image_index: 0, suboptimal: false });
        assert_eq!(device.submissions, 1);
        assert_eq!(device.presents, 1);
    }

    #[test]
    fn test_same_size_resize_rebuilds_and_draws() {
        init();
        let mut device = FakeDevice::new();
        let mut session = RenderSession::start(&mut device, settings(), extent(800, 600)).unwrap();
        session.draw_frame(&mut device).unwrap();
        let first_swapchain = session.surface().unwrap().swapchain();

        let info = GraphicResizeInfo::new((800, 600), (800, 600));
        let plan = session.resize(&mut device, &info).unwrap();

        assert_eq!(plan, ResizePlan::Rebuild(extent(800, 600)));
        assert_eq!(device.wait_idle_calls, 1);
        assert_ne!(session.surface().unwrap().swapchain(), first_swapchain);
        assert_eq!(device.live_count(Kind::Swapchain), 1);
        assert_eq!(session.extent(), Some(extent(800, 600)));

        session.draw_frame(&mut device).unwrap();
        assert_eq!(device.presents, 2);
    }

    #[test]
    fn test_resize_drains_before_teardown() {
        init();
        let mut device = FakeDevice::new();
        let mut session = RenderSession::start(&mut device, settings(), extent(800, 600)).unwrap();
        session.draw_frame(&mut device).unwrap();
        session.draw_frame(&mut device).unwrap();
        assert_eq!(device.pending_submissions(), 2);

        // freeing a command buffer with pending work would panic inside the fake
        session
            .resize(&mut device, &GraphicResizeInfo::new((800, 600), (1024, 768)))
            .unwrap();

        assert_eq!(device.pending_submissions(), 0);
        assert_eq!(session.extent(), Some(extent(1024, 768)));
        assert_eq!(device.destroyed(Kind::Swapchain).len(), 1);
    }

    #[test]
    fn test_minimize_skips_and_restore_resumes() {
        init();
        let mut device = FakeDevice::new();
        let mut session = RenderSession::start(&mut device, settings(), extent(800, 600)).unwrap();
        let swapchain = session.surface().unwrap().swapchain();

        let plan = session
            .resize(&mut device, &GraphicResizeInfo::new((800, 600), (0, 0)))
            .unwrap();
        assert_eq!(plan, ResizePlan::Suspend);
        assert!(session.is_suspended());

        for _ in 0..10 {
            assert_eq!(session.draw_frame(&mut device).unwrap(), FrameOutcome::Skipped);
        }
        assert_eq!(device.submissions, 0);
        assert_eq!(device.presents, 0);

        let plan = session
            .resize(&mut device, &GraphicResizeInfo::new((0, 0), (800, 600)))
            .unwrap();
        assert_eq!(plan, ResizePlan::Resume);
        assert!(!session.is_suspended());
        assert_eq!(device.wait_idle_calls, 0);
        assert_eq!(session.surface().unwrap().swapchain(), swapchain);

        assert!(matches!(
            session.draw_frame(&mut device).unwrap(),
            FrameOutcome::Presented { .. }
        ));
        assert_eq!(device.submissions, 1);
        assert_eq!(device.presents, 1);
    }

    #[test]
    fn test_frame_slots_survive_rebuilds() {
        init();
        let mut device = FakeDevice::new();
        let mut session = RenderSession::start(&mut device, settings(), extent(800, 600)).unwrap();
        let slots = session.frames().slots().to_vec();

        for (width, height) in [(1024, 768), (640, 480), (640, 480)] {
            let old = session.extent().unwrap();
            session
                .resize(&mut device, &GraphicResizeInfo::new((old.width, old.height), (width, height)))
                .unwrap();
            session.draw_frame(&mut device).unwrap();
        }

        assert_eq!(session.frames().slots(), slots.as_slice());
        assert_eq!(device.created(Kind::Fence).len(), 2);
        assert_eq!(device.created(Kind::Semaphore).len(), 4);
        assert_eq!(device.created(Kind::CommandPool).len(), 1);
        assert_eq!(device.created(Kind::Swapchain).len(), 4);
    }

    #[test]
    fn test_shutdown_destroys_everything_in_reverse() {
        init();
        let mut device = FakeDevice::new();
        let mut session = RenderSession::start(&mut device, settings(), extent(800, 600)).unwrap();
        for _ in 0..3 {
            session.draw_frame(&mut device).unwrap();
        }
        session
            .resize(&mut device, &GraphicResizeInfo::new((800, 600), (1024, 768)))
            .unwrap();
        session.draw_frame(&mut device).unwrap();

        session.shut_down(&mut device).unwrap();

        assert_eq!(device.live_total(), 0);
        device.assert_reverse_teardown();
    }

    #[test]
    fn test_frame_slots_enclose_every_surface_scope() {
        init();
        let mut device = FakeDevice::new();
        let mut session = RenderSession::start(&mut device, settings(), extent(800, 600)).unwrap();
        session
            .resize(&mut device, &GraphicResizeInfo::new((800, 600), (1024, 768)))
            .unwrap();

        let newest_sync = device
            .created(Kind::Fence)
            .into_iter()
            .chain(device.created(Kind::Semaphore))
            .max()
            .unwrap();
        let oldest_swapchain = device.created(Kind::Swapchain).into_iter().min().unwrap();
        assert!(device.created(Kind::CommandPool)[0] < newest_sync);
        assert!(newest_sync < oldest_swapchain);

        session.shut_down(&mut device).unwrap();
        assert_eq!(device.live_total(), 0);
        device.assert_reverse_teardown();
    }

    #[test]
    fn test_failed_submit_recovers_after_rebuild() {
        init();
        let mut device = FakeDevice::new();
        let mut session = RenderSession::start(&mut device, settings(), extent(800, 600)).unwrap();
        session.draw_frame(&mut device).unwrap();

        device.submit_errors.push_back(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY);
        assert!(matches!(
            session.draw_frame(&mut device),
            Err(DriverError::Submit(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY))
        ));

        session
            .resize(&mut device, &GraphicResizeInfo::new((800, 600), (800, 600)))
            .unwrap();
        for _ in 0..4 {
            assert!(matches!(
                session.draw_frame(&mut device).unwrap(),
                FrameOutcome::Presented { .. }
            ));
        }
        assert_eq!(device.submissions, 5);

        session.shut_down(&mut device).unwrap();
        assert_eq!(device.live_total(), 0);
    }

    #[test]
    fn test_shutdown_while_minimized() {
        init();
        let mut device = FakeDevice::new();
        let mut session = RenderSession::start(&mut device, settings(), extent(800, 600)).unwrap();
        session
            .resize(&mut device, &GraphicResizeInfo::new((800, 600), (0, 0)))
            .unwrap();

        session.shut_down(&mut device).unwrap();
        assert_eq!(device.live_total(), 0);
    }

    #[test]
    fn test_start_failure_leaks_nothing() {
        init();
        let mut dry_run = FakeDevice::new();
        RenderSession::start(&mut dry_run, settings(), extent(800, 600)).unwrap();
        let steps = dry_run.creation_calls();

        for step in 0..steps {
            let mut device = FakeDevice::new();
            device.fail_after(step);
            assert!(RenderSession::start(&mut device, settings(), extent(800, 600)).is_err());
            assert_eq!(device.live_total(), 0, "leak after failure at step {}", step);
            device.assert_reverse_teardown();
        }
    }

    #[test]
    fn test_start_minimized_builds_on_restore() {
        init();
        let mut device = FakeDevice::new();
        let mut session = RenderSession::start(&mut device, settings(), extent(0, 0)).unwrap();

        assert!(session.is_suspended());
        assert_eq!(session.extent(), None);
        assert_eq!(session.draw_frame(&mut device).unwrap(), FrameOutcome::Skipped);

        let plan = session
            .resize(&mut device, &GraphicResizeInfo::new((0, 0), (800, 600)))
            .unwrap();
        assert_eq!(plan, ResizePlan::Rebuild(extent(800, 600)));
        session.draw_frame(&mut device).unwrap();
        assert_eq!(device.presents, 1);
    }

    #[test]
    fn test_failed_rebuild_recovers_on_next_resize() {
        init();
        let mut device = FakeDevice::new();
        let mut session = RenderSession::start(&mut device, settings(), extent(800, 600)).unwrap();

        device.fail_after(0);
        let result = session.resize(&mut device, &GraphicResizeInfo::new((800, 600), (1024, 768)));
        assert!(matches!(result, Err(DriverError::SwapchainCreation(_))));
        assert_eq!(device.live_surface_objects(), 0);
        assert!(matches!(
            session.draw_frame(&mut device),
            Err(DriverError::SurfaceUnavailable)
        ));

        session
            .resize(&mut device, &GraphicResizeInfo::new((1024, 768), (1024, 768)))
            .unwrap();
        assert!(matches!(
            session.draw_frame(&mut device).unwrap(),
            FrameOutcome::Presented { .. }
        ));

        session.shut_down(&mut device).unwrap();
        assert_eq!(device.live_total(), 0);
    }
}
