use std::thread;
use std::time::{Duration, Instant};

use ingest::{DecodedQueue, DoubleRing, MemoryStorage, UploadPump};
use mosaic::MosaicConfig;
use scheduler::TileScheduler;
use tracing::{debug, info};

/// Simulated frame period for headless runs.
pub const TICK: Duration = Duration::from_nanos(16_666_667);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeadlessSummary {
    pub frames: u64,
    pub uploaded: usize,
    pub switched: usize,
    pub usage: usize,
    pub pending: usize,
}

/// Drives the upload pump and tile scheduler without a GPU.
///
/// Each tick uploads within the frame budget, swaps, and advances the tiles
/// by `tick`, then sleeps out the rest of the tick.
pub fn run(config: &MosaicConfig, decoded: DecodedQueue, frames: u64, tick: Duration) -> HeadlessSummary {
    let ring = DoubleRing::new(
        MemoryStorage::new(config.ring_capacity, config.resolution),
        MemoryStorage::new(config.ring_capacity, config.resolution),
    );
    let mut pump = UploadPump::new(ring, decoded);
    let mut scheduler = TileScheduler::new(config.tile_factor, config.seed);
    let mut summary = HeadlessSummary::default();
    let mut last_report = Instant::now();

    info!(
        frames,
        capacity = config.ring_capacity,
        tiles = scheduler.tile_count(),
        "headless run started"
    );
    for frame in 0..frames {
        let started = Instant::now();
        let report = pump.pump(config.max_uploads_per_frame);
        let usage = pump.usage();
        summary.uploaded += report.uploaded;
        summary.switched += scheduler.advance(tick, &config.switch, usage);
        summary.frames = frame + 1;

        if last_report.elapsed() >= Duration::from_secs(1) {
            debug!(
                frame,
                usage,
                capacity = pump.capacity(),
                pending = report.remaining,
                "headless stats"
            );
            last_report = Instant::now();
        }
        if let Some(rest) = tick.checked_sub(started.elapsed()) {
            thread::sleep(rest);
        }
    }

    summary.usage = pump.usage();
    summary.pending = pump.pending();
    info!(
        frames = summary.frames,
        uploaded = summary.uploaded,
        switched = summary.switched,
        usage = summary.usage,
        capacity = pump.capacity(),
        pending = summary.pending,
        "headless run finished"
    );
    summary
}
