//! Logical device and the [`GpuDevice`] implementation on top of `ash`

use ash::extensions::khr::{self, Swapchain};
use ash::{vk, Device, Instance};

use super::{pipeline, surface};
use crate::device::{AcquiredImage, DrawRecording, FrameSubmission, GpuDevice, PipelineRequest, SwapchainRequest};
use crate::error::{DriverError, DriverResult};
use crate::negotiation::{QueueFamilies, SurfaceSupport};

/// Logical device with its queues and swapchain loader
///
/// Dropping it destroys the device. Every object created through it must be
/// destroyed first.
pub struct VulkanDevice {
    device: Device,
    swapchain_loader: Swapchain,
    surface_loader: khr::Surface,
    surface: vk::SurfaceKHR,
    physical_device: vk::PhysicalDevice,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
}

impl VulkanDevice {
    /// Create the logical device with one queue per unique family
    pub fn new(
        instance: &Instance,
        physical_device: vk::PhysicalDevice,
        queue_families: QueueFamilies,
        surface_loader: &khr::Surface,
        surface: vk::SurfaceKHR,
    ) -> DriverResult<Self> {
        let priorities = [1.0_f32];
        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = queue_families
            .unique()
            .into_iter()
            .map(|family| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(family)
                    .queue_priorities(&priorities)
                    .build()
            })
            .collect();

        let extensions = [Swapchain::name().as_ptr()];
        let features = vk::PhysicalDeviceFeatures::builder();
        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&extensions)
            .enabled_features(&features);

        let device = unsafe { instance.create_device(physical_device, &create_info, None) }
            .map_err(DriverError::LogicalDeviceCreation)?;

        let graphics_queue = unsafe { device.get_device_queue(queue_families.graphics, 0) };
        let present_queue = unsafe { device.get_device_queue(queue_families.present, 0) };
        let swapchain_loader = Swapchain::new(instance, &device);

        log::debug!(
            "Created logical device (graphics family {}, present family {})",
            queue_families.graphics,
            queue_families.present
        );

        Ok(Self {
            device,
            swapchain_loader,
            surface_loader: surface_loader.clone(),
            surface,
            physical_device,
            graphics_queue,
            present_queue,
        })
    }

    /// Device function table
    pub const fn raw(&self) -> &Device {
        &self.device
    }
}

impl Drop for VulkanDevice {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_device(None);
        }
        log::debug!("Logical device destroyed");
    }
}

impl GpuDevice for VulkanDevice {
    fn query_surface_support(&self) -> DriverResult<SurfaceSupport> {
        surface::query_support(&self.surface_loader, self.surface, self.physical_device)
    }

    fn create_swapchain(&mut self, request: &SwapchainRequest) -> DriverResult<vk::SwapchainKHR> {
        let config = &request.config;
        let (sharing_mode, family_indices) = request.queue_families.sharing();

        let create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(self.surface)
            .min_image_count(config.image_count)
            .image_format(config.format.format)
            .image_color_space(config.format.color_space)
            .image_extent(config.extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(sharing_mode)
            .queue_family_indices(&family_indices)
            .pre_transform(config.transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(config.present_mode)
            .clipped(true)
            .old_swapchain(vk::SwapchainKHR::null());

        unsafe { self.swapchain_loader.create_swapchain(&create_info, None) }.map_err(DriverError::SwapchainCreation)
    }

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> DriverResult<Vec<vk::Image>> {
        unsafe { self.swapchain_loader.get_swapchain_images(swapchain) }.map_err(DriverError::SwapchainImages)
    }

    fn destroy_swapchain(&mut self, swapchain: vk::SwapchainKHR) {
        unsafe { self.swapchain_loader.destroy_swapchain(swapchain, None) };
    }

    fn create_image_view(&mut self, image: vk::Image, format: vk::Format) -> DriverResult<vk::ImageView> {
        let create_info = vk::ImageViewCreateInfo::builder()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .components(vk::ComponentMapping {
                r: vk::ComponentSwizzle::IDENTITY,
                g: vk::ComponentSwizzle::IDENTITY,
                b: vk::ComponentSwizzle::IDENTITY,
                a: vk::ComponentSwizzle::IDENTITY,
            })
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });

        unsafe { self.device.create_image_view(&create_info, None) }.map_err(DriverError::ImageViewCreation)
    }

    fn destroy_image_view(&mut self, view: vk::ImageView) {
        unsafe { self.device.destroy_image_view(view, None) };
    }

    fn create_pipeline_layout(&mut self) -> DriverResult<vk::PipelineLayout> {
        let create_info = vk::PipelineLayoutCreateInfo::builder();
        unsafe { self.device.create_pipeline_layout(&create_info, None) }
            .map_err(DriverError::PipelineLayoutCreation)
    }

    fn destroy_pipeline_layout(&mut self, layout: vk::PipelineLayout) {
        unsafe { self.device.destroy_pipeline_layout(layout, None) };
    }

    fn create_render_pass(&mut self, format: vk::Format) -> DriverResult<vk::RenderPass> {
        pipeline::create_render_pass(&self.device, format)
    }

    fn destroy_render_pass(&mut self, render_pass: vk::RenderPass) {
        unsafe { self.device.destroy_render_pass(render_pass, None) };
    }

    fn create_shader_module(&mut self, code: &[u32]) -> DriverResult<vk::ShaderModule> {
        let create_info = vk::ShaderModuleCreateInfo::builder().code(code);
        unsafe { self.device.create_shader_module(&create_info, None) }.map_err(DriverError::ShaderModuleCreation)
    }

    fn destroy_shader_module(&mut self, module: vk::ShaderModule) {
        unsafe { self.device.destroy_shader_module(module, None) };
    }

    fn create_graphics_pipeline(&mut self, request: &PipelineRequest) -> DriverResult<vk::Pipeline> {
        pipeline::create_graphics_pipeline(&self.device, request)
    }

    fn destroy_pipeline(&mut self, pipeline: vk::Pipeline) {
        unsafe { self.device.destroy_pipeline(pipeline, None) };
    }

    fn create_framebuffer(
        &mut self,
        render_pass: vk::RenderPass,
        view: vk::ImageView,
        extent: vk::Extent2D,
    ) -> DriverResult<vk::Framebuffer> {
        let attachments = [view];
        let create_info = vk::FramebufferCreateInfo::builder()
            .render_pass(render_pass)
            .attachments(&attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);

        unsafe { self.device.create_framebuffer(&create_info, None) }.map_err(DriverError::FramebufferCreation)
    }

    fn destroy_framebuffer(&mut self, framebuffer: vk::Framebuffer) {
        unsafe { self.device.destroy_framebuffer(framebuffer, None) };
    }

    fn create_command_pool(&mut self, queue_family: u32) -> DriverResult<vk::CommandPool> {
        let create_info = vk::CommandPoolCreateInfo::builder()
            .queue_family_index(queue_family)
            .flags(vk::CommandPoolCreateFlags::empty());

        unsafe { self.device.create_command_pool(&create_info, None) }.map_err(DriverError::CommandPoolCreation)
    }

    fn destroy_command_pool(&mut self, pool: vk::CommandPool) {
        unsafe { self.device.destroy_command_pool(pool, None) };
    }

    fn allocate_command_buffers(
        &mut self,
        pool: vk::CommandPool,
        count: u32,
    ) -> DriverResult<Vec<vk::CommandBuffer>> {
        let allocate_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);

        unsafe { self.device.allocate_command_buffers(&allocate_info) }.map_err(DriverError::CommandBufferAllocation)
    }

    fn free_command_buffers(&mut self, pool: vk::CommandPool, buffers: &[vk::CommandBuffer]) {
        if !buffers.is_empty() {
            unsafe { self.device.free_command_buffers(pool, buffers) };
        }
    }

    fn record_draw(&mut self, buffer: vk::CommandBuffer, recording: &DrawRecording) -> DriverResult<()> {
        pipeline::record_draw(&self.device, buffer, recording)
    }

    fn create_semaphore(&mut self) -> DriverResult<vk::Semaphore> {
        let create_info = vk::SemaphoreCreateInfo::builder();
        unsafe { self.device.create_semaphore(&create_info, None) }.map_err(DriverError::SyncObjectCreation)
    }

    fn destroy_semaphore(&mut self, semaphore: vk::Semaphore) {
        unsafe { self.device.destroy_semaphore(semaphore, None) };
    }

    fn create_fence(&mut self, signaled: bool) -> DriverResult<vk::Fence> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let create_info = vk::FenceCreateInfo::builder().flags(flags);
        unsafe { self.device.create_fence(&create_info, None) }.map_err(DriverError::SyncObjectCreation)
    }

    fn destroy_fence(&mut self, fence: vk::Fence) {
        unsafe { self.device.destroy_fence(fence, None) };
    }

    fn wait_for_fence(&mut self, fence: vk::Fence) -> DriverResult<()> {
        unsafe { self.device.wait_for_fences(&[fence], true, u64::MAX) }
            .map_err(|result| DriverError::from_frame_result(result, DriverError::Api))
    }

    fn reset_fence(&mut self, fence: vk::Fence) -> DriverResult<()> {
        unsafe { self.device.reset_fences(&[fence]) }.map_err(DriverError::Api)
    }

    fn acquire_next_image(
        &mut self,
        swapchain: vk::SwapchainKHR,
        semaphore: vk::Semaphore,
    ) -> DriverResult<AcquiredImage> {
        match unsafe {
            self.swapchain_loader
                .acquire_next_image(swapchain, u64::MAX, semaphore, vk::Fence::null())
        } {
            Ok((index, suboptimal)) => Ok(AcquiredImage { index, suboptimal }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                log::warn!("Swapchain out of date during acquire_next_image");
                Err(DriverError::SurfaceOutOfDate)
            }
            Err(result) => Err(DriverError::from_frame_result(result, DriverError::Acquire)),
        }
    }

    fn submit(&mut self, submission: &FrameSubmission) -> DriverResult<()> {
        let wait_semaphores = [submission.wait_semaphore];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [submission.command_buffer];
        let signal_semaphores = [submission.signal_semaphore];
        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            self.device
                .queue_submit(self.graphics_queue, &[submit_info.build()], submission.fence)
        }
        .map_err(|result| DriverError::from_frame_result(result, DriverError::Submit))
    }

    fn present(
        &mut self,
        swapchain: vk::SwapchainKHR,
        image_index: u32,
        wait_semaphore: vk::Semaphore,
    ) -> DriverResult<bool> {
        let wait_semaphores = [wait_semaphore];
        let swapchains = [swapchain];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        match unsafe { self.swapchain_loader.queue_present(self.present_queue, &present_info) } {
            Ok(suboptimal) => Ok(suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                log::warn!("Swapchain out of date during queue_present");
                Err(DriverError::SurfaceOutOfDate)
            }
            Err(result) => Err(DriverError::from_frame_result(result, DriverError::Present)),
        }
    }

    fn wait_idle(&mut self) -> DriverResult<()> {
        unsafe { self.device.device_wait_idle() }.map_err(|result| DriverError::from_frame_result(result, DriverError::Api))
    }
}
