use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_utils::atomic::AtomicCell;
use scheduler::{SwitchPolicy, MAX_TILE_FACTOR};

use crate::types::MosaicConfig;

/// Per-frame copy of every runtime parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameParams {
    pub fade_factor: f32,
    pub scroll_speed: [f32; 2],
    pub tile_factor: u32,
    pub max_uploads_per_frame: usize,
    pub switch: SwitchPolicy,
}

struct ControlState {
    fade_factor: AtomicCell<f32>,
    scroll_speed: AtomicCell<[f32; 2]>,
    scroll_offset: AtomicCell<[f32; 2]>,
    scroll_epoch: AtomicU64,
    tile_factor: AtomicCell<u32>,
    max_uploads_per_frame: AtomicCell<usize>,
    switch_interval: AtomicCell<f32>,
    switch_fraction: AtomicCell<f32>,
    usage: AtomicCell<usize>,
    capacity: usize,
}

/// Thread-safe handle to the mosaic parameters.
///
/// Any thread may call the setters at any time; they validate their input
/// and never block. The render loop picks the new values up on its next
/// frame through [`ControlHandle::snapshot`].
#[derive(Clone)]
pub struct ControlHandle {
    state: Arc<ControlState>,
}

impl ControlHandle {
    pub fn new(config: &MosaicConfig) -> Self {
        let handle = Self {
            state: Arc::new(ControlState {
                fade_factor: AtomicCell::new(0.0),
                scroll_speed: AtomicCell::new([0.0, 0.0]),
                scroll_offset: AtomicCell::new([0.0, 0.0]),
                scroll_epoch: AtomicU64::new(0),
                tile_factor: AtomicCell::new(0),
                max_uploads_per_frame: AtomicCell::new(0),
                switch_interval: AtomicCell::new(0.0),
                switch_fraction: AtomicCell::new(0.0),
                usage: AtomicCell::new(0),
                capacity: config.ring_capacity,
            }),
        };
        handle.set_fade_factor(config.fade_factor);
        handle.set_scroll_speed(config.scroll_speed[0], config.scroll_speed[1]);
        handle.set_scroll_offset(config.scroll_offset[0], config.scroll_offset[1]);
        handle.set_tile_factor(config.tile_factor.min(i32::MAX as u32) as i32);
        handle.set_max_uploads_per_frame(config.max_uploads_per_frame.min(i64::MAX as usize) as i64);
        handle.set_switch_interval(config.switch.interval.as_secs_f32());
        handle.set_switch_fraction(config.switch.fraction);
        handle
    }

    /// Clamps to `[0, 1]`. NaN is ignored.
    pub fn set_fade_factor(&self, fade: f32) {
        if !fade.is_nan() {
            self.state.fade_factor.store(fade.clamp(0.0, 1.0));
        }
    }

    /// Texture widths per second on each axis. Non-finite input is ignored.
    pub fn set_scroll_speed(&self, x: f32, y: f32) {
        if x.is_finite() && y.is_finite() {
            self.state.scroll_speed.store([x, y]);
        }
    }

    /// Absolute offset, wrapped into `[0, 1)`. Non-finite input is ignored.
    pub fn set_scroll_offset(&self, x: f32, y: f32) {
        if !(x.is_finite() && y.is_finite()) {
            return;
        }
        self.state.scroll_offset.store([wrap_unit(x), wrap_unit(y)]);
        self.state.scroll_epoch.fetch_add(1, Ordering::Release);
    }

    /// Clamps to `[0, MAX_TILE_FACTOR]`.
    pub fn set_tile_factor(&self, factor: i32) {
        let clamped = factor.clamp(0, MAX_TILE_FACTOR as i32) as u32;
        self.state.tile_factor.store(clamped);
    }

    /// Negative values clamp to `0`, which means unbounded.
    pub fn set_max_uploads_per_frame(&self, uploads: i64) {
        let clamped = usize::try_from(uploads.max(0)).unwrap_or(usize::MAX);
        self.state.max_uploads_per_frame.store(clamped);
    }

    /// Seconds a tile keeps its image. Negative or NaN clamps to `0`.
    pub fn set_switch_interval(&self, seconds: f32) {
        let clamped = if seconds.is_nan() { 0.0 } else { seconds.max(0.0) };
        self.state.switch_interval.store(clamped);
    }

    /// Clamps to `[0, 1]`. NaN is ignored.
    pub fn set_switch_fraction(&self, fraction: f32) {
        if !fraction.is_nan() {
            self.state.switch_fraction.store(fraction.clamp(0.0, 1.0));
        }
    }

    pub fn fade_factor(&self) -> f32 {
        self.state.fade_factor.load()
    }

    pub fn scroll_speed(&self) -> [f32; 2] {
        self.state.scroll_speed.load()
    }

    pub fn tile_factor(&self) -> u32 {
        self.state.tile_factor.load()
    }

    /// Images in the ring readers currently see.
    pub fn buffer_usage(&self) -> usize {
        self.state.usage.load()
    }

    pub fn ring_capacity(&self) -> usize {
        self.state.capacity
    }

    pub fn snapshot(&self) -> FrameParams {
        let interval = self.state.switch_interval.load();
        FrameParams {
            fade_factor: self.state.fade_factor.load(),
            scroll_speed: self.state.scroll_speed.load(),
            tile_factor: self.state.tile_factor.load(),
            max_uploads_per_frame: self.state.max_uploads_per_frame.load(),
            switch: SwitchPolicy {
                interval: Duration::try_from_secs_f32(interval).unwrap_or(Duration::MAX),
                fraction: self.state.switch_fraction.load(),
            },
        }
    }

    pub(crate) fn publish_usage(&self, usage: usize) {
        self.state.usage.store(usage);
    }

    /// Returns the externally set offset when it changed after `epoch`.
    fn scroll_offset_since(&self, epoch: u64) -> Option<(u64, [f32; 2])> {
        let current = self.state.scroll_epoch.load(Ordering::Acquire);
        (current != epoch).then(|| (current, self.state.scroll_offset.load()))
    }
}

/// Wraps `value` into `[0, 1)`.
pub fn wrap_unit(value: f32) -> f32 {
    let wrapped = value.rem_euclid(1.0);
    // rem_euclid rounds tiny negatives up to exactly 1.0.
    if wrapped >= 1.0 {
        0.0
    } else {
        wrapped
    }
}

/// Scroll position owned by the render loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollState {
    offset: [f32; 2],
    epoch: u64,
}

impl ScrollState {
    pub fn new(control: &ControlHandle) -> Self {
        let mut state = Self {
            offset: [0.0, 0.0],
            epoch: 0,
        };
        state.adopt(control);
        state
    }

    pub fn offset(&self) -> [f32; 2] {
        self.offset
    }

    /// Adopts an externally set offset, then integrates `speed × dt`.
    pub fn advance(&mut self, control: &ControlHandle, speed: [f32; 2], dt: Duration) -> [f32; 2] {
        self.adopt(control);
        let seconds = dt.as_secs_f32();
        for (offset, speed) in self.offset.iter_mut().zip(speed) {
            *offset = wrap_unit(*offset + speed * seconds);
        }
        self.offset
    }

    fn adopt(&mut self, control: &ControlHandle) {
        if let Some((epoch, offset)) = control.scroll_offset_since(self.epoch) {
            self.epoch = epoch;
            self.offset = offset;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> ControlHandle {
        ControlHandle::new(&MosaicConfig::default())
    }

    fn close(a: [f32; 2], b: [f32; 2]) -> bool {
        a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-5)
    }

    #[test]
    fn starts_from_config() {
        let config = MosaicConfig {
            ring_capacity: 32,
            fade_factor: 0.4,
            tile_factor: 3,
            ..MosaicConfig::default()
        };
        let control = ControlHandle::new(&config);
        let params = control.snapshot();
        assert_eq!(params.fade_factor, 0.4);
        assert_eq!(params.tile_factor, 3);
        assert_eq!(params.max_uploads_per_frame, 4);
        assert_eq!(params.switch.interval, Duration::from_secs(2));
        assert_eq!(control.ring_capacity(), 32);
        assert_eq!(control.buffer_usage(), 0);
    }

    #[test]
    fn fade_is_clamped_and_nan_ignored() {
        let control = handle();
        control.set_fade_factor(1.5);
        assert_eq!(control.fade_factor(), 1.0);
        control.set_fade_factor(-2.0);
        assert_eq!(control.fade_factor(), 0.0);
        control.set_fade_factor(0.3);
        control.set_fade_factor(f32::NAN);
        assert_eq!(control.fade_factor(), 0.3);
    }

    #[test]
    fn scroll_offset_wraps_into_unit_square() {
        let control = handle();
        control.set_scroll_offset(-0.3, 1.7);
        let scroll = ScrollState::new(&control);
        assert!(close(scroll.offset(), [0.7, 0.7]), "{:?}", scroll.offset());
    }

    #[test]
    fn wrap_never_returns_one() {
        assert_eq!(wrap_unit(-1e-9), 0.0);
        assert_eq!(wrap_unit(3.0), 0.0);
        assert!((wrap_unit(-2.25) - 0.75).abs() < 1e-6);
    }

    #[test]
    fn non_finite_scroll_input_is_ignored() {
        let control = handle();
        control.set_scroll_speed(0.5, 0.25);
        control.set_scroll_speed(f32::INFINITY, 0.0);
        assert_eq!(control.scroll_speed(), [0.5, 0.25]);

        let mut scroll = ScrollState::new(&control);
        control.set_scroll_offset(f32::NAN, 0.5);
        scroll.advance(&control, [0.0, 0.0], Duration::ZERO);
        assert_eq!(scroll.offset(), [0.0, 0.0]);
    }

    #[test]
    fn tile_factor_and_budget_are_clamped() {
        let control = handle();
        control.set_tile_factor(-4);
        assert_eq!(control.tile_factor(), 0);
        control.set_tile_factor(40);
        assert_eq!(control.tile_factor(), MAX_TILE_FACTOR);
        control.set_max_uploads_per_frame(-1);
        assert_eq!(control.snapshot().max_uploads_per_frame, 0);
        control.set_max_uploads_per_frame(9);
        assert_eq!(control.snapshot().max_uploads_per_frame, 9);
    }

    #[test]
    fn switch_parameters_are_clamped() {
        let control = handle();
        control.set_switch_interval(-3.0);
        assert_eq!(control.snapshot().switch.interval, Duration::ZERO);
        control.set_switch_interval(f32::NAN);
        assert_eq!(control.snapshot().switch.interval, Duration::ZERO);
        control.set_switch_interval(0.5);
        assert_eq!(control.snapshot().switch.interval, Duration::from_millis(500));
        control.set_switch_interval(f32::INFINITY);
        assert_eq!(control.snapshot().switch.interval, Duration::MAX);

        control.set_switch_fraction(2.0);
        assert_eq!(control.snapshot().switch.fraction, 1.0);
        control.set_switch_fraction(f32::NAN);
        assert_eq!(control.snapshot().switch.fraction, 1.0);
    }

    #[test]
    fn scroll_integrates_speed_and_wraps() {
        let control = handle();
        let mut scroll = ScrollState::new(&control);
        let offset = scroll.advance(&control, [0.25, -0.25], Duration::from_secs(1));
        assert!(close(offset, [0.25, 0.75]));
        let offset = scroll.advance(&control, [0.25, -0.25], Duration::from_secs(3));
        assert!(close(offset, [0.0, 0.0]), "{offset:?}");
    }

    #[test]
    fn external_offset_wins_once() {
        let control = handle();
        let mut scroll = ScrollState::new(&control);
        scroll.advance(&control, [0.1, 0.0], Duration::from_secs(1));
        control.set_scroll_offset(0.5, 0.5);
        let offset = scroll.advance(&control, [0.1, 0.0], Duration::from_secs(1));
        assert!(close(offset, [0.6, 0.5]));
        let offset = scroll.advance(&control, [0.1, 0.0], Duration::from_secs(1));
        assert!(close(offset, [0.7, 0.5]));
    }

    #[test]
    fn handle_is_shared_across_threads() {
        let control = handle();
        let remote = control.clone();
        std::thread::spawn(move || remote.set_fade_factor(0.9))
            .join()
            .unwrap();
        assert_eq!(control.snapshot().fade_factor, 0.9);
    }
}
