//! Resource graph construction and teardown
//!
//! The surface-dependent objects form a dependency chain:
//!
//! ```text
//! swapchain -> image views -> pipeline layout -> render pass -> pipeline
//!           -> framebuffers -> command buffers (recorded once)
//! ```
//!
//! Each build phase records what it created and, on failure, destroys exactly
//! those objects in reverse order before returning the error. Teardown always
//! runs in reverse construction order.

use ash::vk;

use crate::device::{DrawRecording, GpuDevice, PipelineRequest, SwapchainRequest};
use crate::error::DriverResult;
use crate::negotiation::{negotiate_surface, QueueFamilies, SurfaceConfig, SurfacePreferences};
use crate::shaders::ShaderBinaries;

/// Vertices of the fixed triangle, generated by the vertex shader
pub const TRIANGLE_VERTEX_COUNT: u32 = 3;

/// Long-lived inputs every surface build needs
#[derive(Debug, Clone, Copy)]
pub struct GraphContext<'a> {
    /// Graphics and present families
    pub queue_families: QueueFamilies,
    /// Pool the per-image command buffers come from
    pub command_pool: vk::CommandPool,
    /// SPIR-V of both stages
    pub shaders: &'a ShaderBinaries,
    /// Preferred format and present mode
    pub preferences: SurfacePreferences,
    /// Clear color recorded into every command buffer
    pub clear_color: [f32; 4],
}

/// Swapchain, its images and one view per image
#[derive(Debug)]
pub struct SwapchainChain {
    /// Swapchain handle
    pub swapchain: vk::SwapchainKHR,
    /// Presentable images, owned by the swapchain
    pub images: Vec<vk::Image>,
    /// One view per image, same order
    pub views: Vec<vk::ImageView>,
    /// Configuration the swapchain was created with
    pub config: SurfaceConfig,
}

impl SwapchainChain {
    /// Destroy the views (last first) and then the swapchain
    pub fn teardown<D: GpuDevice>(self, device: &mut D) {
        for view in self.views.into_iter().rev() {
            device.destroy_image_view(view);
        }
        device.destroy_swapchain(self.swapchain);
    }
}

/// Pipeline layout, render pass and graphics pipeline
#[derive(Debug)]
pub struct PipelineChain {
    /// Empty layout
    pub layout: vk::PipelineLayout,
    /// Single color attachment render pass
    pub render_pass: vk::RenderPass,
    /// Fixed triangle pipeline
    pub pipeline: vk::Pipeline,
}

impl PipelineChain {
    /// Destroy pipeline, render pass, layout
    pub fn teardown<D: GpuDevice>(self, device: &mut D) {
        device.destroy_pipeline(self.pipeline);
        device.destroy_render_pass(self.render_pass);
        device.destroy_pipeline_layout(self.layout);
    }
}

/// One framebuffer and one pre-recorded command buffer per swapchain image
#[derive(Debug)]
pub struct PerImageResources {
    /// Framebuffers, indexed like the swapchain images
    pub framebuffers: Vec<vk::Framebuffer>,
    /// Command buffers, indexed like the swapchain images
    pub command_buffers: Vec<vk::CommandBuffer>,
    /// Pool the command buffers were allocated from
    pub command_pool: vk::CommandPool,
}

impl PerImageResources {
    /// Free the command buffers, then destroy the framebuffers (last first)
    pub fn teardown<D: GpuDevice>(self, device: &mut D) {
        device.free_command_buffers(self.command_pool, &self.command_buffers);
        for framebuffer in self.framebuffers.into_iter().rev() {
            device.destroy_framebuffer(framebuffer);
        }
    }
}

/// Everything that is rebuilt when the surface changes size
#[derive(Debug)]
pub struct SurfaceScope {
    swapchain: SwapchainChain,
    pipeline: PipelineChain,
    per_image: PerImageResources,
}

impl SurfaceScope {
    /// Build the full chain at the requested extent
    ///
    /// If a later phase fails, the phases already completed are torn down
    /// before the error is returned, so nothing stays alive.
    pub fn build<D: GpuDevice>(
        device: &mut D,
        ctx: &GraphContext<'_>,
        requested: vk::Extent2D,
    ) -> DriverResult<Self> {
        let swapchain = build_swapchain_chain(device, ctx, requested)?;

        let pipeline = match build_pipeline_chain(device, ctx, &swapchain) {
            Ok(pipeline) => pipeline,
            Err(err) => {
                swapchain.teardown(device);
                return Err(err);
            }
        };

        let per_image = match build_per_image_resources(device, ctx, &swapchain, &pipeline) {
            Ok(per_image) => per_image,
            Err(err) => {
                pipeline.teardown(device);
                swapchain.teardown(device);
                return Err(err);
            }
        };

        Ok(Self {
            swapchain,
            pipeline,
            per_image,
        })
    }

    /// Command buffers, framebuffers, pipeline chain, swapchain chain
    pub fn teardown<D: GpuDevice>(self, device: &mut D) {
        log::debug!("Tearing down surface resources ({} images)", self.image_count());
        self.per_image.teardown(device);
        self.pipeline.teardown(device);
        self.swapchain.teardown(device);
    }

    /// Swapchain handle
    pub const fn swapchain(&self) -> vk::SwapchainKHR {
        self.swapchain.swapchain
    }

    /// Negotiated configuration
    pub const fn config(&self) -> &SurfaceConfig {
        &self.swapchain.config
    }

    /// Extent of the swapchain images
    pub const fn extent(&self) -> vk::Extent2D {
        self.swapchain.config.extent
    }

    /// Number of swapchain images
    pub fn image_count(&self) -> usize {
        self.swapchain.images.len()
    }

    /// Pre-recorded command buffer for an image
    pub fn command_buffer(&self, image_index: usize) -> Option<vk::CommandBuffer> {
        self.per_image.command_buffers.get(image_index).copied()
    }

    /// Swapchain chain
    pub const fn swapchain_chain(&self) -> &SwapchainChain {
        &self.swapchain
    }

    /// Pipeline chain
    pub const fn pipeline_chain(&self) -> &PipelineChain {
        &self.pipeline
    }

    /// Framebuffers and command buffers
    pub const fn per_image(&self) -> &PerImageResources {
        &self.per_image
    }
}

/// Negotiate the surface, then create swapchain and image views
pub fn build_swapchain_chain<D: GpuDevice>(
    device: &mut D,
    ctx: &GraphContext<'_>,
    requested: vk::Extent2D,
) -> DriverResult<SwapchainChain> {
    let support = device.query_surface_support()?;
    let config = negotiate_surface(&support, requested, &ctx.preferences)?;
    log::info!(
        "Swapchain: {}x{}, {:?}/{:?}, {:?}, {} images requested",
        config.extent.width,
        config.extent.height,
        config.format.format,
        config.format.color_space,
        config.present_mode,
        config.image_count
    );

    let request = SwapchainRequest {
        config,
        queue_families: ctx.queue_families,
    };

    let mut built = BuildLog::default();
    let swapchain = built.step(device, |d| d.create_swapchain(&request), |&s| Created::Swapchain(s))?;
    let images = built.attempt(device, |d| d.swapchain_images(swapchain))?;

    let mut views = Vec::with_capacity(images.len());
    for &image in &images {
        let view = built.step(
            device,
            |d| d.create_image_view(image, config.format.format),
            |&v| Created::ImageView(v),
        )?;
        views.push(view);
    }

    log::debug!("Created swapchain with {} images", images.len());
    Ok(SwapchainChain {
        swapchain,
        images,
        views,
        config,
    })
}

/// Create layout, render pass and pipeline; shader modules live only for the pipeline call
pub fn build_pipeline_chain<D: GpuDevice>(
    device: &mut D,
    ctx: &GraphContext<'_>,
    swapchain: &SwapchainChain,
) -> DriverResult<PipelineChain> {
    let mut built = BuildLog::default();

    let layout = built.step(device, |d| d.create_pipeline_layout(), |&l| Created::PipelineLayout(l))?;
    let render_pass = built.step(
        device,
        |d| d.create_render_pass(swapchain.config.format.format),
        |&r| Created::RenderPass(r),
    )?;
    let vertex_shader = built.step(
        device,
        |d| d.create_shader_module(&ctx.shaders.vertex),
        |&m| Created::ShaderModule(m),
    )?;
    let fragment_shader = built.step(
        device,
        |d| d.create_shader_module(&ctx.shaders.fragment),
        |&m| Created::ShaderModule(m),
    )?;

    let request = PipelineRequest {
        layout,
        render_pass,
        vertex_shader,
        fragment_shader,
        extent: swapchain.config.extent,
    };
    let pipeline = built.step(device, |d| d.create_graphics_pipeline(&request), |&p| Created::Pipeline(p))?;

    built.release(device, &Created::ShaderModule(fragment_shader));
    built.release(device, &Created::ShaderModule(vertex_shader));

    Ok(PipelineChain {
        layout,
        render_pass,
        pipeline,
    })
}

/// Framebuffers and recorded command buffers, one each per swapchain image
pub fn build_per_image_resources<D: GpuDevice>(
    device: &mut D,
    ctx: &GraphContext<'_>,
    swapchain: &SwapchainChain,
    pipeline: &PipelineChain,
) -> DriverResult<PerImageResources> {
    let extent = swapchain.config.extent;
    let mut built = BuildLog::default();

    let mut framebuffers = Vec::with_capacity(swapchain.views.len());
    for &view in &swapchain.views {
        let framebuffer = built.step(
            device,
            |d| d.create_framebuffer(pipeline.render_pass, view, extent),
            |&f| Created::Framebuffer(f),
        )?;
        framebuffers.push(framebuffer);
    }

    let pool = ctx.command_pool;
    let command_buffers = built.step(
        device,
        |d| d.allocate_command_buffers(pool, framebuffers.len() as u32),
        |buffers| Created::CommandBuffers(pool, buffers.clone()),
    )?;

    for (&buffer, &framebuffer) in command_buffers.iter().zip(&framebuffers) {
        let recording = DrawRecording {
            render_pass: pipeline.render_pass,
            framebuffer,
            pipeline: pipeline.pipeline,
            extent,
            clear_color: ctx.clear_color,
            vertex_count: TRIANGLE_VERTEX_COUNT,
        };
        built.attempt(device, |d| d.record_draw(buffer, &recording))?;
    }

    Ok(PerImageResources {
        framebuffers,
        command_buffers,
        command_pool: pool,
    })
}

/// An object created during a build phase
#[derive(Debug, Clone, PartialEq, Eq)]
enum Created {
    Swapchain(vk::SwapchainKHR),
    ImageView(vk::ImageView),
    PipelineLayout(vk::PipelineLayout),
    RenderPass(vk::RenderPass),
    ShaderModule(vk::ShaderModule),
    Pipeline(vk::Pipeline),
    Framebuffer(vk::Framebuffer),
    CommandBuffers(vk::CommandPool, Vec<vk::CommandBuffer>),
}

impl Created {
    fn destroy<D: GpuDevice>(self, device: &mut D) {
        match self {
            Self::Swapchain(swapchain) => device.destroy_swapchain(swapchain),
            Self::ImageView(view) => device.destroy_image_view(view),
            Self::PipelineLayout(layout) => device.destroy_pipeline_layout(layout),
            Self::RenderPass(render_pass) => device.destroy_render_pass(render_pass),
            Self::ShaderModule(module) => device.destroy_shader_module(module),
            Self::Pipeline(pipeline) => device.destroy_pipeline(pipeline),
            Self::Framebuffer(framebuffer) => device.destroy_framebuffer(framebuffer),
            Self::CommandBuffers(pool, buffers) => device.free_command_buffers(pool, &buffers),
        }
    }
}

/// Creation log of one build phase, unwound in reverse on failure
#[derive(Debug, Default)]
struct BuildLog {
    created: Vec<Created>,
}

impl BuildLog {
    /// Run a fallible call; on error destroy everything logged so far
    fn attempt<D: GpuDevice, T>(
        &mut self,
        device: &mut D,
        call: impl FnOnce(&mut D) -> DriverResult<T>,
    ) -> DriverResult<T> {
        call(device).map_err(|err| {
            log::debug!("Build step failed ({}), unwinding {} objects", err, self.created.len());
            self.unwind(device);
            err
        })
    }

    /// Run a creation call and log what it produced
    fn step<D: GpuDevice, T>(
        &mut self,
        device: &mut D,
        create: impl FnOnce(&mut D) -> DriverResult<T>,
        track: impl FnOnce(&T) -> Created,
    ) -> DriverResult<T> {
        let value = self.attempt(device, create)?;
        self.created.push(track(&value));
        Ok(value)
    }

    /// Destroy one logged object ahead of the rest
    fn release<D: GpuDevice>(&mut self, device: &mut D, target: &Created) {
        if let Some(position) = self.created.iter().rposition(|c| c == target) {
            self.created.remove(position).destroy(device);
        }
    }

    fn unwind<D: GpuDevice>(&mut self, device: &mut D) {
        while let Some(created) = self.created.pop() {
            created.destroy(device);
        }
    }
}
