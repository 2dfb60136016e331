use std::time::Duration;

use ingest::{DecodedQueue, DoubleRing, UploadPump};
use scheduler::TileScheduler;
use tracing::trace;

use crate::control::{ControlHandle, ScrollState};
use crate::error::EngineError;
use crate::gpu::{Composer, CompositionParams, GpuRingStorage};
use crate::types::MosaicConfig;

/// What one call to [`MosaicEngine::frame`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub uploaded: usize,
    /// Decoded frames still waiting for upload.
    pub pending: usize,
    pub swapped: bool,
    pub switched: usize,
    /// Front ring occupancy after the frame.
    pub usage: usize,
    pub tiles_drawn: usize,
}

/// Everything the mosaic needs between frames.
///
/// The device and queue are injected, so the engine renders into whatever
/// view the caller hands to [`MosaicEngine::frame`].
pub struct MosaicEngine {
    device: wgpu::Device,
    queue: wgpu::Queue,
    pump: UploadPump<GpuRingStorage>,
    scheduler: TileScheduler,
    composer: Composer,
    scroll: ScrollState,
    control: ControlHandle,
}

impl MosaicEngine {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        surface_format: wgpu::TextureFormat,
        size: (u32, u32),
        config: &MosaicConfig,
        control: ControlHandle,
        decoded: DecodedQueue,
    ) -> Result<Self, EngineError> {
        let instance = |label: &str| {
            GpuRingStorage::new(
                device,
                queue,
                config.ring_capacity,
                config.layers_per_array,
                config.resolution,
                label,
            )
        };
        let ring = DoubleRing::new(instance("ring a")?, instance("ring b")?);
        let composer = Composer::new(device, queue, surface_format, size, &ring);
        let params = control.snapshot();
        let scroll = ScrollState::new(&control);

        Ok(Self {
            device: device.clone(),
            queue: queue.clone(),
            pump: UploadPump::new(ring, decoded),
            scheduler: TileScheduler::new(params.tile_factor, config.seed),
            composer,
            scroll,
            control,
        })
    }

    pub fn control(&self) -> ControlHandle {
        self.control.clone()
    }

    pub fn size(&self) -> (u32, u32) {
        self.composer.size()
    }

    /// Renders one frame into `view`: upload within budget, swap, advance the
    /// tiles against the published front, then compose and submit once.
    pub fn frame(&mut self, dt: Duration, view: &wgpu::TextureView) -> FrameStats {
        let params = self.control.snapshot();
        self.scheduler.set_tile_factor(params.tile_factor);

        let report = self.pump.pump(params.max_uploads_per_frame);
        let usage = self.pump.usage();
        let switched = self.scheduler.advance(dt, &params.switch, usage);
        self.control.publish_usage(usage);

        let scroll_offset = self.scroll.advance(&self.control, params.scroll_speed, dt);
        let tiles_drawn = self.composer.render(
            &self.device,
            &self.queue,
            view,
            self.pump.ring(),
            &self.scheduler,
            CompositionParams {
                fade: params.fade_factor,
                scroll_offset,
            },
        );

        let stats = FrameStats {
            uploaded: report.uploaded,
            pending: report.remaining,
            swapped: report.swapped,
            switched,
            usage,
            tiles_drawn,
        };
        trace!(?stats, "frame composed");
        stats
    }

    /// Rebuilds the offscreen targets for a new surface size.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.composer
            .resize(&self.device, &self.queue, (width.max(1), height.max(1)));
    }
}
