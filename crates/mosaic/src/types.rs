use std::time::Duration;

use ingest::Resolution;
use scheduler::SwitchPolicy;

/// Immutable start-up parameters for [`crate::MosaicEngine`].
///
/// The ring shape is fixed for the lifetime of the engine; everything else
/// only seeds the [`crate::ControlHandle`] and can be changed while running.
#[derive(Debug, Clone, PartialEq)]
pub struct MosaicConfig {
    /// Slots per ring instance.
    pub ring_capacity: usize,
    /// Upper bound on layers per texture array. Clamped again to the device
    /// limit when the ring is allocated.
    pub layers_per_array: usize,
    /// Working resolution every decoded image is resized to.
    pub resolution: Resolution,
    /// Grid edge exponent; the mosaic has `2^tile_factor` tiles per side.
    pub tile_factor: u32,
    /// Dwell interval and per-frame switch share.
    pub switch: SwitchPolicy,
    /// Uploads per rendered frame; `0` drains the whole queue.
    pub max_uploads_per_frame: usize,
    /// Weight of the fresh mosaic when blending over the previous frame.
    pub fade_factor: f32,
    /// Scroll speed in texture widths per second.
    pub scroll_speed: [f32; 2],
    /// Initial scroll offset, wrapped into `[0, 1)`.
    pub scroll_offset: [f32; 2],
    /// Seed for tile selection.
    pub seed: u64,
}

impl Default for MosaicConfig {
    fn default() -> Self {
        Self {
            ring_capacity: 256,
            layers_per_array: 256,
            resolution: Resolution::default(),
            tile_factor: 2,
            switch: SwitchPolicy {
                interval: Duration::from_secs(2),
                fraction: 0.1,
            },
            max_uploads_per_frame: 4,
            fade_factor: 0.1,
            scroll_speed: [0.0, 0.0],
            scroll_offset: [0.0, 0.0],
            seed: 0,
        }
    }
}

/// Adapter preference used when picking a GPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GpuPowerPreference {
    Low,
    #[default]
    High,
}

/// Settings for the interactive window driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowConfig {
    /// Initial inner size in physical pixels.
    pub size: (u32, u32),
    /// Present with FIFO when `true`; prefer immediate or mailbox otherwise.
    pub vsync: bool,
    pub power: GpuPowerPreference,
    pub title: String,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            size: (1280, 720),
            vsync: true,
            power: GpuPowerPreference::default(),
            title: "imageflash".into(),
        }
    }
}
