//! Frame synchronization
//!
//! Up to `frames_in_flight` frames may be queued on the GPU at once. Each
//! frame slot owns an image-available semaphore, a render-finished semaphore
//! and an in-flight fence created signaled. A per-image fence map tracks the
//! slot fence that last used each swapchain image, so an image whose command
//! buffer is still executing is never resubmitted.

use ash::vk;

use crate::device::{FrameSubmission, GpuDevice};
use crate::error::{DriverError, DriverResult};
use crate::resources::SurfaceScope;

/// Synchronization objects of one frame slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSlot {
    /// Signaled by acquire, waited by submit
    pub image_available: vk::Semaphore,
    /// Signaled by submit, waited by present
    pub render_finished: vk::Semaphore,
    /// Signaled when the slot's submission completes
    pub in_flight: vk::Fence,
}

impl FrameSlot {
    fn create<D: GpuDevice>(device: &mut D) -> DriverResult<Self> {
        let image_available = device.create_semaphore()?;
        let render_finished = match device.create_semaphore() {
            Ok(semaphore) => semaphore,
            Err(err) => {
                device.destroy_semaphore(image_available);
                return Err(err);
            }
        };
        let in_flight = match device.create_fence(true) {
            Ok(fence) => fence,
            Err(err) => {
                device.destroy_semaphore(render_finished);
                device.destroy_semaphore(image_available);
                return Err(err);
            }
        };

        Ok(Self {
            image_available,
            render_finished,
            in_flight,
        })
    }

    fn destroy<D: GpuDevice>(self, device: &mut D) {
        device.destroy_fence(self.in_flight);
        device.destroy_semaphore(self.render_finished);
        device.destroy_semaphore(self.image_available);
    }
}

/// What a draw call did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Rendering is suspended; nothing was submitted
    Skipped,
    /// A frame was submitted and presented
    Presented {
        /// Swapchain image that was presented
        image_index: u32,
        /// The swapchain no longer matches the surface exactly
        suboptimal: bool,
    },
}

/// Frames-in-flight state machine
#[derive(Debug)]
pub struct FrameSynchronizer {
    slots: Vec<FrameSlot>,
    image_fences: Vec<Option<vk::Fence>>,
    current: usize,
    skip_frame: bool,
}

impl FrameSynchronizer {
    /// Create `frames_in_flight` slots; partial creation is undone on failure
    pub fn new<D: GpuDevice>(device: &mut D, frames_in_flight: usize) -> DriverResult<Self> {
        let mut slots = Vec::with_capacity(frames_in_flight);
        for _ in 0..frames_in_flight.max(1) {
            match FrameSlot::create(device) {
                Ok(slot) => slots.push(slot),
                Err(err) => {
                    for slot in slots.into_iter().rev() {
                        slot.destroy(device);
                    }
                    return Err(err);
                }
            }
        }

        log::debug!("Created {} frame slots", slots.len());
        Ok(Self {
            slots,
            image_fences: Vec::new(),
            current: 0,
            skip_frame: false,
        })
    }

    /// Destroy every slot, last first
    ///
    /// The caller must make sure the device is idle.
    pub fn destroy<D: GpuDevice>(self, device: &mut D) {
        for slot in self.slots.into_iter().rev() {
            slot.destroy(device);
        }
    }

    /// Render one frame into the given surface resources
    ///
    /// The cursor only advances after a successful present, so an
    /// out-of-date swapchain leaves the slot to be retried after the rebuild.
    pub fn draw<D: GpuDevice>(&mut self, device: &mut D, surface: &SurfaceScope) -> DriverResult<FrameOutcome> {
        if self.skip_frame {
            return Ok(FrameOutcome::Skipped);
        }

        let slot = self.slots[self.current];
        device.wait_for_fence(slot.in_flight)?;

        let acquired = device.acquire_next_image(surface.swapchain(), slot.image_available)?;
        let image_index = acquired.index as usize;

        let image_count = surface.image_count();
        if self.image_fences.len() != image_count {
            self.reset_image_fences(image_count);
        }
        let command_buffer = surface
            .command_buffer(image_index)
            .ok_or(DriverError::ImageIndexOutOfRange {
                index: acquired.index,
                count: image_count,
            })?;

        if let Some(previous) = self.image_fences[image_index] {
            if previous != slot.in_flight {
                device.wait_for_fence(previous)?;
            }
        }
        self.image_fences[image_index] = Some(slot.in_flight);

        device.reset_fence(slot.in_flight)?;
        let submission = FrameSubmission {
            command_buffer,
            wait_semaphore: slot.image_available,
            signal_semaphore: slot.render_finished,
            fence: slot.in_flight,
        };
        if let Err(err) = device.submit(&submission) {
            self.image_fences[image_index] = None;
            if let Err(renew_err) = self.renew_current_slot(device) {
                log::error!("Frame slot {} could not be renewed: {}", self.current, renew_err);
            }
            return Err(err);
        }

        let suboptimal = device.present(surface.swapchain(), acquired.index, slot.render_finished)?;
        self.current = (self.current + 1) % self.slots.len();

        Ok(FrameOutcome::Presented {
            image_index: acquired.index,
            suboptimal: suboptimal || acquired.suboptimal,
        })
    }

    /// Replace the current slot's fence and acquire semaphore after a rejected submit
    ///
    /// The old fence was reset and will never signal, and the old semaphore
    /// holds an acquire signal nothing will wait on.
    fn renew_current_slot<D: GpuDevice>(&mut self, device: &mut D) -> DriverResult<()> {
        let in_flight = device.create_fence(true)?;
        let image_available = match device.create_semaphore() {
            Ok(semaphore) => semaphore,
            Err(err) => {
                device.destroy_fence(in_flight);
                return Err(err);
            }
        };

        let slot = &mut self.slots[self.current];
        let stale_fence = std::mem::replace(&mut slot.in_flight, in_flight);
        let stale_semaphore = std::mem::replace(&mut slot.image_available, image_available);
        for entry in &mut self.image_fences {
            if *entry == Some(stale_fence) {
                *entry = None;
            }
        }
        device.destroy_fence(stale_fence);
        device.destroy_semaphore(stale_semaphore);

        log::warn!("Submit failed; frame slot {} renewed", self.current);
        Ok(())
    }

    /// Forget which fence last used each image and size the map for `image_count`
    pub fn reset_image_fences(&mut self, image_count: usize) {
        self.image_fences.clear();
        self.image_fences.resize(image_count, None);
    }

    /// Suspend or resume rendering
    pub fn set_skip_frame(&mut self, skip: bool) {
        self.skip_frame = skip;
    }

    /// Whether draws are currently skipped
    pub const fn skip_frame(&self) -> bool {
        self.skip_frame
    }

    /// Index of the slot the next draw uses
    pub const fn current_frame(&self) -> usize {
        self.current
    }

    /// Number of frame slots
    pub fn frames_in_flight(&self) -> usize {
        self.slots.len()
    }

    /// All frame slots
    pub fn slots(&self) -> &[FrameSlot] {
        &self.slots
    }
}
