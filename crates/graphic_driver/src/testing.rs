//! In-memory [`GpuDevice`] for unit tests
//!
//! Handles are fabricated with `vk::Handle::from_raw`. Every creation and
//! destruction is logged so tests can check ordering and leaks. Submitted work
//! never completes on its own: a fence only signals when the CPU waits on it
//! (or on device idle), which models a GPU that is always behind.

use std::collections::{HashMap, VecDeque};

use ash::vk::{self, Handle};

use crate::device::{AcquiredImage, DrawRecording, FrameSubmission, GpuDevice, PipelineRequest, SwapchainRequest};
use crate::error::{DriverError, DriverResult};
use crate::negotiation::{QueueFamilies, SurfaceCapabilities, SurfacePreferences, SurfaceSupport};
use crate::resources::{GraphContext, SurfaceScope};
use crate::shaders::ShaderBinaries;

/// Two tiny stand-in SPIR-V modules
pub fn sample_shaders() -> ShaderBinaries {
    ShaderBinaries {
        vertex: vec![0x0723_0203, 1],
        fragment: vec![0x0723_0203, 2],
    }
}

/// Build a complete surface scope on a fresh command pool
pub fn surface_scope(device: &mut FakeDevice, extent: vk::Extent2D) -> SurfaceScope {
    let pool = device.create_command_pool(0).unwrap();
    let shaders = sample_shaders();
    let ctx = GraphContext {
        queue_families: QueueFamilies { graphics: 0, present: 0 },
        command_pool: pool,
        shaders: &shaders,
        preferences: SurfacePreferences::default(),
        clear_color: [0.0, 0.0, 0.0, 1.0],
    };
    SurfaceScope::build(device, &ctx, extent).unwrap()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Swapchain,
    ImageView,
    PipelineLayout,
    RenderPass,
    ShaderModule,
    Pipeline,
    Framebuffer,
    CommandPool,
    CommandBuffer,
    Semaphore,
    Fence,
}

impl Kind {
    /// Objects owned by the surface scope
    pub const fn is_surface_scoped(self) -> bool {
        matches!(
            self,
            Self::Swapchain
                | Self::ImageView
                | Self::PipelineLayout
                | Self::RenderPass
                | Self::ShaderModule
                | Self::Pipeline
                | Self::Framebuffer
                | Self::CommandBuffer
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Created(Kind, u64),
    Destroyed(Kind, u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FenceState {
    Signaled,
    Unsignaled,
    Pending,
}

pub struct FakeDevice {
    pub support: SurfaceSupport,
    pub events: Vec<Event>,
    pub recordings: HashMap<vk::CommandBuffer, DrawRecording>,
    pub acquire_errors: VecDeque<vk::Result>,
    pub submit_errors: VecDeque<vk::Result>,
    pub present_errors: VecDeque<vk::Result>,
    pub suboptimal_acquires: VecDeque<bool>,
    pub suboptimal_presents: VecDeque<bool>,
    pub submissions: usize,
    pub presents: usize,
    pub blocking_waits: usize,
    pub max_pending: usize,
    pub wait_idle_calls: usize,
    next_raw: u64,
    creations: usize,
    fail_at: Option<usize>,
    live: HashMap<u64, Kind>,
    images: HashMap<vk::SwapchainKHR, Vec<vk::Image>>,
    next_image: HashMap<vk::SwapchainKHR, u32>,
    fences: HashMap<vk::Fence, FenceState>,
    pending: Vec<vk::Fence>,
    buffer_fences: HashMap<vk::CommandBuffer, vk::Fence>,
}

impl FakeDevice {
    pub fn new() -> Self {
        Self {
            support: SurfaceSupport {
                capabilities: SurfaceCapabilities {
                    min_image_count: 2,
                    max_image_count: 0,
                    current_extent: None,
                    min_image_extent: vk::Extent2D { width: 1, height: 1 },
                    max_image_extent: vk::Extent2D { width: 4096, height: 4096 },
                    current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
                },
                formats: vec![SurfacePreferences::default().format],
                present_modes: vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX],
            },
            events: Vec::new(),
            recordings: HashMap::new(),
            acquire_errors: VecDeque::new(),
            submit_errors: VecDeque::new(),
            present_errors: VecDeque::new(),
            suboptimal_acquires: VecDeque::new(),
            suboptimal_presents: VecDeque::new(),
            submissions: 0,
            presents: 0,
            blocking_waits: 0,
            max_pending: 0,
            wait_idle_calls: 0,
            next_raw: 1,
            creations: 0,
            fail_at: None,
            live: HashMap::new(),
            images: HashMap::new(),
            next_image: HashMap::new(),
            fences: HashMap::new(),
            pending: Vec::new(),
            buffer_fences: HashMap::new(),
        }
    }

    /// Surface that allows exactly `count` images
    pub fn with_image_count(count: u32) -> Self {
        let mut device = Self::new();
        device.support.capabilities.min_image_count = count;
        device.support.capabilities.max_image_count = count;
        device
    }

    /// Make the `n`-th creation call from now fail (0 = the next one)
    pub fn fail_after(&mut self, n: usize) {
        self.fail_at = Some(self.creations + n);
    }

    /// Number of creation calls made so far
    pub const fn creation_calls(&self) -> usize {
        self.creations
    }

    pub fn live_count(&self, kind: Kind) -> usize {
        self.live.values().filter(|&&k| k == kind).count()
    }

    pub fn live_surface_objects(&self) -> usize {
        self.live.values().filter(|k| k.is_surface_scoped()).count()
    }

    pub fn live_total(&self) -> usize {
        self.live.len()
    }

    pub fn created(&self, kind: Kind) -> Vec<u64> {
        self.events
            .iter()
            .filter_map(|event| match *event {
                Event::Created(k, raw) if k == kind => Some(raw),
                _ => None,
            })
            .collect()
    }

    pub fn destroyed(&self, kind: Kind) -> Vec<u64> {
        self.events
            .iter()
            .filter_map(|event| match *event {
                Event::Destroyed(k, raw) if k == kind => Some(raw),
                _ => None,
            })
            .collect()
    }

    pub fn pending_submissions(&self) -> usize {
        self.pending.len()
    }

    /// Every destruction must undo the most recent live creation.
    ///
    /// Shader modules are exempt: they die while the pipeline built from
    /// them lives on.
    pub fn assert_reverse_teardown(&self) {
        let mut stack = Vec::new();
        for event in &self.events {
            match *event {
                Event::Created(Kind::ShaderModule, _) | Event::Destroyed(Kind::ShaderModule, _) => {}
                Event::Created(kind, raw) => stack.push((kind, raw)),
                Event::Destroyed(kind, raw) => {
                    assert_eq!(
                        stack.pop(),
                        Some((kind, raw)),
                        "{:?} {} destroyed out of reverse creation order",
                        kind,
                        raw
                    );
                }
            }
        }
    }

    fn fresh_raw(&mut self) -> u64 {
        let raw = self.next_raw;
        self.next_raw += 1;
        raw
    }

    fn begin_creation(&mut self, error: fn(vk::Result) -> DriverError) -> DriverResult<()> {
        let step = self.creations;
        self.creations += 1;
        if self.fail_at == Some(step) {
            return Err(error(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY));
        }
        Ok(())
    }

    fn track<T: Handle>(&mut self, kind: Kind) -> T {
        let raw = self.fresh_raw();
        self.live.insert(raw, kind);
        self.events.push(Event::Created(kind, raw));
        T::from_raw(raw)
    }

    fn create<T: Handle>(&mut self, kind: Kind, error: fn(vk::Result) -> DriverError) -> DriverResult<T> {
        self.begin_creation(error)?;
        Ok(self.track(kind))
    }

    fn destroy<T: Handle>(&mut self, kind: Kind, handle: T) {
        let raw = handle.as_raw();
        assert_eq!(
            self.live.remove(&raw),
            Some(kind),
            "destroying {:?} {} that is not live",
            kind,
            raw
        );
        self.events.push(Event::Destroyed(kind, raw));
    }

    fn assert_live<T: Handle>(&self, kind: Kind, handle: T) {
        assert_eq!(self.live.get(&handle.as_raw()), Some(&kind), "{:?} used while not live", kind);
    }

    fn complete(&mut self, fence: vk::Fence) {
        self.pending.retain(|&f| f != fence);
        self.fences.insert(fence, FenceState::Signaled);
    }
}

impl GpuDevice for FakeDevice {
    fn query_surface_support(&self) -> DriverResult<SurfaceSupport> {
        Ok(self.support.clone())
    }

    fn create_swapchain(&mut self, request: &SwapchainRequest) -> DriverResult<vk::SwapchainKHR> {
        let swapchain: vk::SwapchainKHR = self.create(Kind::Swapchain, DriverError::SwapchainCreation)?;
        let images = (0..request.config.image_count)
            .map(|_| vk::Image::from_raw(self.fresh_raw()))
            .collect();
        self.images.insert(swapchain, images);
        self.next_image.insert(swapchain, 0);
        Ok(swapchain)
    }

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> DriverResult<Vec<vk::Image>> {
        self.images
            .get(&swapchain)
            .cloned()
            .ok_or(DriverError::SwapchainImages(vk::Result::ERROR_UNKNOWN))
    }

    fn destroy_swapchain(&mut self, swapchain: vk::SwapchainKHR) {
        self.images.remove(&swapchain);
        self.next_image.remove(&swapchain);
        self.destroy(Kind::Swapchain, swapchain);
    }

    fn create_image_view(&mut self, _image: vk::Image, _format: vk::Format) -> DriverResult<vk::ImageView> {
        self.create(Kind::ImageView, DriverError::ImageViewCreation)
    }

    fn destroy_image_view(&mut self, view: vk::ImageView) {
        self.destroy(Kind::ImageView, view);
    }

    fn create_pipeline_layout(&mut self) -> DriverResult<vk::PipelineLayout> {
        self.create(Kind::PipelineLayout, DriverError::PipelineLayoutCreation)
    }

    fn destroy_pipeline_layout(&mut self, layout: vk::PipelineLayout) {
        self.destroy(Kind::PipelineLayout, layout);
    }

    fn create_render_pass(&mut self, _format: vk::Format) -> DriverResult<vk::RenderPass> {
        self.create(Kind::RenderPass, DriverError::RenderPassCreation)
    }

    fn destroy_render_pass(&mut self, render_pass: vk::RenderPass) {
        self.destroy(Kind::RenderPass, render_pass);
    }

    fn create_shader_module(&mut self, code: &[u32]) -> DriverResult<vk::ShaderModule> {
        assert!(!code.is_empty(), "shader module created from empty code");
        self.create(Kind::ShaderModule, DriverError::ShaderModuleCreation)
    }

    fn destroy_shader_module(&mut self, module: vk::ShaderModule) {
        self.destroy(Kind::ShaderModule, module);
    }

    fn create_graphics_pipeline(&mut self, request: &PipelineRequest) -> DriverResult<vk::Pipeline> {
        self.assert_live(Kind::PipelineLayout, request.layout);
        self.assert_live(Kind::RenderPass, request.render_pass);
        self.assert_live(Kind::ShaderModule, request.vertex_shader);
        self.assert_live(Kind::ShaderModule, request.fragment_shader);
        self.create(Kind::Pipeline, DriverError::PipelineCreation)
    }

    fn destroy_pipeline(&mut self, pipeline: vk::Pipeline) {
        self.destroy(Kind::Pipeline, pipeline);
    }

    fn create_framebuffer(
        &mut self,
        render_pass: vk::RenderPass,
        view: vk::ImageView,
        _extent: vk::Extent2D,
    ) -> DriverResult<vk::Framebuffer> {
        self.assert_live(Kind::RenderPass, render_pass);
        self.assert_live(Kind::ImageView, view);
        self.create(Kind::Framebuffer, DriverError::FramebufferCreation)
    }

    fn destroy_framebuffer(&mut self, framebuffer: vk::Framebuffer) {
        self.destroy(Kind::Framebuffer, framebuffer);
    }

    fn create_command_pool(&mut self, _queue_family: u32) -> DriverResult<vk::CommandPool> {
        self.create(Kind::CommandPool, DriverError::CommandPoolCreation)
    }

    fn destroy_command_pool(&mut self, pool: vk::CommandPool) {
        self.destroy(Kind::CommandPool, pool);
    }

    fn allocate_command_buffers(
        &mut self,
        pool: vk::CommandPool,
        count: u32,
    ) -> DriverResult<Vec<vk::CommandBuffer>> {
        self.assert_live(Kind::CommandPool, pool);
        self.begin_creation(DriverError::CommandBufferAllocation)?;
        Ok((0..count).map(|_| self.track(Kind::CommandBuffer)).collect())
    }

    fn free_command_buffers(&mut self, pool: vk::CommandPool, buffers: &[vk::CommandBuffer]) {
        self.assert_live(Kind::CommandPool, pool);
        for &buffer in buffers.iter().rev() {
            if let Some(fence) = self.buffer_fences.remove(&buffer) {
                assert_ne!(
                    self.fences.get(&fence),
                    Some(&FenceState::Pending),
                    "command buffer freed while its submission is in flight"
                );
            }
            self.recordings.remove(&buffer);
            self.destroy(Kind::CommandBuffer, buffer);
        }
    }

    fn record_draw(&mut self, buffer: vk::CommandBuffer, recording: &DrawRecording) -> DriverResult<()> {
        self.assert_live(Kind::CommandBuffer, buffer);
        self.assert_live(Kind::Framebuffer, recording.framebuffer);
        self.assert_live(Kind::Pipeline, recording.pipeline);
        self.recordings.insert(buffer, *recording);
        Ok(())
    }

    fn create_semaphore(&mut self) -> DriverResult<vk::Semaphore> {
        self.create(Kind::Semaphore, DriverError::SyncObjectCreation)
    }

    fn destroy_semaphore(&mut self, semaphore: vk::Semaphore) {
        self.destroy(Kind::Semaphore, semaphore);
    }

    fn create_fence(&mut self, signaled: bool) -> DriverResult<vk::Fence> {
        let fence: vk::Fence = self.create(Kind::Fence, DriverError::SyncObjectCreation)?;
        let state = if signaled { FenceState::Signaled } else { FenceState::Unsignaled };
        self.fences.insert(fence, state);
        Ok(fence)
    }

    fn destroy_fence(&mut self, fence: vk::Fence) {
        assert_ne!(
            self.fences.remove(&fence),
            Some(FenceState::Pending),
            "fence destroyed while in flight"
        );
        self.destroy(Kind::Fence, fence);
    }

    fn wait_for_fence(&mut self, fence: vk::Fence) -> DriverResult<()> {
        match self.fences.get(&fence).copied() {
            Some(FenceState::Signaled) => {}
            Some(FenceState::Pending) => {
                self.blocking_waits += 1;
                self.complete(fence);
            }
            Some(FenceState::Unsignaled) => panic!("waiting on a reset fence with no submitted work never returns"),
            None => panic!("waiting on unknown fence"),
        }
        Ok(())
    }

    fn reset_fence(&mut self, fence: vk::Fence) -> DriverResult<()> {
        assert_ne!(
            self.fences.get(&fence),
            Some(&FenceState::Pending),
            "fence reset while its work is in flight"
        );
        self.fences.insert(fence, FenceState::Unsignaled);
        Ok(())
    }

    fn acquire_next_image(
        &mut self,
        swapchain: vk::SwapchainKHR,
        semaphore: vk::Semaphore,
    ) -> DriverResult<AcquiredImage> {
        self.assert_live(Kind::Swapchain, swapchain);
        self.assert_live(Kind::Semaphore, semaphore);
        if let Some(error) = self.acquire_errors.pop_front() {
            return Err(DriverError::from_frame_result(error, DriverError::Acquire));
        }

        let count = self.images.get(&swapchain).map_or(0, Vec::len) as u32;
        let cursor = self.next_image.entry(swapchain).or_insert(0);
        let index = *cursor;
        *cursor = (index + 1) % count.max(1);
        let suboptimal = self.suboptimal_acquires.pop_front().unwrap_or(false);
        Ok(AcquiredImage { index, suboptimal })
    }

    fn submit(&mut self, submission: &FrameSubmission) -> DriverResult<()> {
        self.assert_live(Kind::CommandBuffer, submission.command_buffer);
        assert!(
            self.recordings.contains_key(&submission.command_buffer),
            "submitting a command buffer that was never recorded"
        );
        assert_eq!(
            self.fences.get(&submission.fence),
            Some(&FenceState::Unsignaled),
            "submission fence must be reset first"
        );
        if let Some(previous) = self.buffer_fences.get(&submission.command_buffer) {
            assert_ne!(
                self.fences.get(previous),
                Some(&FenceState::Pending),
                "command buffer resubmitted while its previous submission is in flight"
            );
        }
        if let Some(error) = self.submit_errors.pop_front() {
            return Err(DriverError::from_frame_result(error, DriverError::Submit));
        }

        self.buffer_fences.insert(submission.command_buffer, submission.fence);
        self.fences.insert(submission.fence, FenceState::Pending);
        self.pending.push(submission.fence);
        self.submissions += 1;
        self.max_pending = self.max_pending.max(self.pending.len());
        Ok(())
    }

    fn present(
        &mut self,
        swapchain: vk::SwapchainKHR,
        _image_index: u32,
        wait_semaphore: vk::Semaphore,
    ) -> DriverResult<bool> {
        self.assert_live(Kind::Swapchain, swapchain);
        self.assert_live(Kind::Semaphore, wait_semaphore);
        if let Some(error) = self.present_errors.pop_front() {
            return Err(DriverError::from_frame_result(error, DriverError::Present));
        }
        self.presents += 1;
        Ok(self.suboptimal_presents.pop_front().unwrap_or(false))
    }

    fn wait_idle(&mut self) -> DriverResult<()> {
        self.wait_idle_calls += 1;
        for fence in std::mem::take(&mut self.pending) {
            self.fences.insert(fence, FenceState::Signaled);
        }
        Ok(())
    }
}
