//! GPU device abstraction
//!
//! [`GpuDevice`] is the seam between the lifecycle logic (resource graph,
//! frame synchronizer, resize coordinator) and the graphics API. The Vulkan
//! backend implements it on top of `ash`; the handles it hands out are plain
//! `ash::vk` handles, so the logic above it stays API-shaped without calling
//! the API itself.

use ash::vk;

use crate::error::DriverResult;
use crate::negotiation::{QueueFamilies, SurfaceConfig, SurfaceSupport};

/// Parameters for swapchain creation
#[derive(Debug, Clone, Copy)]
pub struct SwapchainRequest {
    /// Negotiated surface configuration
    pub config: SurfaceConfig,
    /// Families that will touch the images
    pub queue_families: QueueFamilies,
}

/// Parameters for the fixed-function triangle pipeline
#[derive(Debug, Clone, Copy)]
pub struct PipelineRequest {
    /// Layout the pipeline is created against
    pub layout: vk::PipelineLayout,
    /// Render pass (subpass 0) the pipeline is used in
    pub render_pass: vk::RenderPass,
    /// Vertex stage module
    pub vertex_shader: vk::ShaderModule,
    /// Fragment stage module
    pub fragment_shader: vk::ShaderModule,
    /// Extent baked into the viewport and scissor
    pub extent: vk::Extent2D,
}

/// Contents of one pre-recorded command buffer
#[derive(Debug, Clone, Copy)]
pub struct DrawRecording {
    /// Render pass to begin
    pub render_pass: vk::RenderPass,
    /// Framebuffer of the target image
    pub framebuffer: vk::Framebuffer,
    /// Pipeline to bind
    pub pipeline: vk::Pipeline,
    /// Render area
    pub extent: vk::Extent2D,
    /// RGBA clear color
    pub clear_color: [f32; 4],
    /// Vertices drawn, generated in the vertex shader
    pub vertex_count: u32,
}

/// One graphics-queue submission
#[derive(Debug, Clone, Copy)]
pub struct FrameSubmission {
    /// Pre-recorded command buffer of the acquired image
    pub command_buffer: vk::CommandBuffer,
    /// Waited at color-attachment-output
    pub wait_semaphore: vk::Semaphore,
    /// Signaled when rendering finishes
    pub signal_semaphore: vk::Semaphore,
    /// Signaled when the submission completes
    pub fence: vk::Fence,
}

/// Result of a successful image acquisition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquiredImage {
    /// Swapchain image index
    pub index: u32,
    /// The swapchain still works but no longer matches the surface exactly
    pub suboptimal: bool,
}

/// Device-level operations the driver core needs
///
/// Creation calls report their own distinct [`crate::DriverError`] variant.
/// Destruction calls are infallible and must accept every handle previously
/// returned by the matching creation call exactly once.
pub trait GpuDevice {
    /// Current capabilities, formats and present modes of the surface
    fn query_surface_support(&self) -> DriverResult<SurfaceSupport>;

    /// Create a swapchain
    fn create_swapchain(&mut self, request: &SwapchainRequest) -> DriverResult<vk::SwapchainKHR>;
    /// Images owned by a swapchain
    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> DriverResult<Vec<vk::Image>>;
    /// Destroy a swapchain
    fn destroy_swapchain(&mut self, swapchain: vk::SwapchainKHR);

    /// Create a 2D color view of a swapchain image
    fn create_image_view(&mut self, image: vk::Image, format: vk::Format) -> DriverResult<vk::ImageView>;
    /// Destroy an image view
    fn destroy_image_view(&mut self, view: vk::ImageView);

    /// Create an empty pipeline layout
    fn create_pipeline_layout(&mut self) -> DriverResult<vk::PipelineLayout>;
    /// Destroy a pipeline layout
    fn destroy_pipeline_layout(&mut self, layout: vk::PipelineLayout);

    /// Create the single-subpass color render pass
    fn create_render_pass(&mut self, format: vk::Format) -> DriverResult<vk::RenderPass>;
    /// Destroy a render pass
    fn destroy_render_pass(&mut self, render_pass: vk::RenderPass);

    /// Create a shader module from SPIR-V words
    fn create_shader_module(&mut self, code: &[u32]) -> DriverResult<vk::ShaderModule>;
    /// Destroy a shader module
    fn destroy_shader_module(&mut self, module: vk::ShaderModule);

    /// Create the fixed-function graphics pipeline
    fn create_graphics_pipeline(&mut self, request: &PipelineRequest) -> DriverResult<vk::Pipeline>;
    /// Destroy a pipeline
    fn destroy_pipeline(&mut self, pipeline: vk::Pipeline);

    /// Create a framebuffer over one image view
    fn create_framebuffer(
        &mut self,
        render_pass: vk::RenderPass,
        view: vk::ImageView,
        extent: vk::Extent2D,
    ) -> DriverResult<vk::Framebuffer>;
    /// Destroy a framebuffer
    fn destroy_framebuffer(&mut self, framebuffer: vk::Framebuffer);

    /// Create a command pool for a queue family
    fn create_command_pool(&mut self, queue_family: u32) -> DriverResult<vk::CommandPool>;
    /// Destroy a command pool
    fn destroy_command_pool(&mut self, pool: vk::CommandPool);

    /// Allocate primary command buffers
    fn allocate_command_buffers(
        &mut self,
        pool: vk::CommandPool,
        count: u32,
    ) -> DriverResult<Vec<vk::CommandBuffer>>;
    /// Return command buffers to their pool
    fn free_command_buffers(&mut self, pool: vk::CommandPool, buffers: &[vk::CommandBuffer]);
    /// Record the fixed draw into a command buffer
    fn record_draw(&mut self, buffer: vk::CommandBuffer, recording: &DrawRecording) -> DriverResult<()>;

    /// Create a binary semaphore
    fn create_semaphore(&mut self) -> DriverResult<vk::Semaphore>;
    /// Destroy a semaphore
    fn destroy_semaphore(&mut self, semaphore: vk::Semaphore);

    /// Create a fence, optionally already signaled
    fn create_fence(&mut self, signaled: bool) -> DriverResult<vk::Fence>;
    /// Destroy a fence
    fn destroy_fence(&mut self, fence: vk::Fence);
    /// Block until the fence is signaled, without timeout
    fn wait_for_fence(&mut self, fence: vk::Fence) -> DriverResult<()>;
    /// Return a fence to the unsignaled state
    fn reset_fence(&mut self, fence: vk::Fence) -> DriverResult<()>;

    /// Acquire the next presentable image, signaling `semaphore` when it is ready
    ///
    /// An out-of-date swapchain is reported as [`crate::DriverError::SurfaceOutOfDate`].
    fn acquire_next_image(
        &mut self,
        swapchain: vk::SwapchainKHR,
        semaphore: vk::Semaphore,
    ) -> DriverResult<AcquiredImage>;
    /// Submit to the graphics queue
    fn submit(&mut self, submission: &FrameSubmission) -> DriverResult<()>;
    /// Present on the present queue; returns whether the swapchain is suboptimal
    fn present(
        &mut self,
        swapchain: vk::SwapchainKHR,
        image_index: u32,
        wait_semaphore: vk::Semaphore,
    ) -> DriverResult<bool>;

    /// Block until all queues are idle
    fn wait_idle(&mut self) -> DriverResult<()>;
}
