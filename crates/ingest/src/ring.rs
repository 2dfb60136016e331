use tracing::warn;

use crate::frame::{ImageFrame, Resolution};

/// Backing store for ring-buffer slots.
///
/// Implementations only have to place pixels; the write cursor and occupancy
/// are tracked by [`RingBuffer`].
pub trait RingStorage {
    fn capacity(&self) -> usize;
    fn resolution(&self) -> Resolution;
    /// Overwrites `slot` with `frame`. `slot` is always `< capacity()` and
    /// `frame` always matches `resolution()`.
    fn write(&mut self, slot: usize, frame: &ImageFrame);
    /// Copies `slots` from `source`, a storage of identical shape.
    fn copy_slots(&mut self, source: &Self, slots: &[usize])
    where
        Self: Sized;
}

/// Splits a ring of `capacity` slots across texture arrays holding at most
/// `layers_per_array` layers each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardLayout {
    capacity: usize,
    layers_per_array: usize,
}

impl ShardLayout {
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize, layers_per_array: usize) -> Self {
        assert!(capacity > 0, "ring capacity must be > 0");
        Self {
            capacity,
            layers_per_array: layers_per_array.clamp(1, capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn layers_per_array(&self) -> usize {
        self.layers_per_array
    }

    pub fn array_count(&self) -> usize {
        self.capacity.div_ceil(self.layers_per_array)
    }

    /// Layers actually used by `array`; only the last shard may be short.
    pub fn layers_in(&self, array: usize) -> usize {
        let start = array * self.layers_per_array;
        self.capacity
            .saturating_sub(start)
            .min(self.layers_per_array)
    }

    /// Clamps an out-of-range slot to the last valid one. Debug builds assert.
    pub fn clamp_slot(&self, slot: usize) -> usize {
        debug_assert!(
            slot < self.capacity,
            "slot {slot} out of range for capacity {}",
            self.capacity
        );
        slot.min(self.capacity - 1)
    }

    /// Maps a global slot to `(array, layer)`.
    pub fn locate(&self, slot: usize) -> (usize, usize) {
        let slot = self.clamp_slot(slot);
        (slot / self.layers_per_array, slot % self.layers_per_array)
    }
}

/// Write cursor and fill level of one ring instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RingState {
    pub write_index: usize,
    pub occupancy: usize,
}

impl RingState {
    fn advance(&mut self, capacity: usize) {
        self.write_index = (self.write_index + 1) % capacity;
        if self.occupancy < capacity {
            self.occupancy += 1;
        }
    }
}

/// Fixed-capacity circular store; once full every upload overwrites the oldest
/// slot, which is always the one `write_index` points at.
pub struct RingBuffer<S> {
    storage: S,
    state: RingState,
}

impl<S: RingStorage> RingBuffer<S> {
    /// # Panics
    ///
    /// Panics if the storage reports zero capacity.
    pub fn new(storage: S) -> Self {
        assert!(storage.capacity() > 0, "ring capacity must be > 0");
        Self {
            storage,
            state: RingState::default(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.storage.capacity()
    }

    pub fn state(&self) -> RingState {
        self.state
    }

    pub fn occupancy(&self) -> usize {
        self.state.occupancy
    }

    pub fn is_full(&self) -> bool {
        self.state.occupancy == self.capacity()
    }

    /// Slot holding the oldest live image.
    pub fn oldest_slot(&self) -> usize {
        if self.is_full() {
            self.state.write_index
        } else {
            0
        }
    }

    /// Writes `frame` at the cursor and advances it. Returns the slot written,
    /// or `None` when the frame does not match the storage resolution.
    pub fn upload(&mut self, frame: &ImageFrame) -> Option<usize> {
        let resolution = self.storage.resolution();
        debug_assert!(
            frame.matches(resolution),
            "frame {} is {}x{}, ring expects {resolution}",
            frame.sequence,
            frame.width,
            frame.height
        );
        if !frame.matches(resolution) {
            warn!(
                sequence = frame.sequence,
                width = frame.width,
                height = frame.height,
                expected = %resolution,
                "refusing upload with mismatched dimensions"
            );
            return None;
        }

        let slot = self.state.write_index;
        self.storage.write(slot, frame);
        self.state.advance(self.capacity());
        Some(slot)
    }

    /// Copies `slots` and the cursor from `source` so both instances hold the
    /// same generation.
    pub(crate) fn catch_up(&mut self, source: &RingBuffer<S>, slots: &[usize]) {
        self.storage.copy_slots(&source.storage, slots);
        self.state = source.state;
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }
}
