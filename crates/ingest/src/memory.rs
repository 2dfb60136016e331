use crate::frame::{ImageFrame, Resolution};
use crate::ring::RingStorage;

/// Ring storage held in system memory.
///
/// Used when no GPU is available (headless runs) and wherever slot contents
/// need to be read back.
#[derive(Debug, Clone)]
pub struct MemoryStorage {
    resolution: Resolution,
    slots: Vec<Option<ImageFrame>>,
}

impl MemoryStorage {
    pub fn new(capacity: usize, resolution: Resolution) -> Self {
        Self {
            resolution,
            slots: vec![None; capacity],
        }
    }

    pub fn frame(&self, slot: usize) -> Option<&ImageFrame> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    pub fn sequence_at(&self, slot: usize) -> Option<u64> {
        self.frame(slot).map(|frame| frame.sequence)
    }

    /// Sequence numbers of every occupied slot, in slot order.
    pub fn live_sequences(&self) -> Vec<u64> {
        self.slots.iter().flatten().map(|frame| frame.sequence).collect()
    }
}

impl RingStorage for MemoryStorage {
    fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn write(&mut self, slot: usize, frame: &ImageFrame) {
        if let Some(entry) = self.slots.get_mut(slot) {
            match entry {
                Some(existing) => existing.clone_from(frame),
                None => *entry = Some(frame.clone()),
            }
        }
    }

    fn copy_slots(&mut self, source: &Self, slots: &[usize]) {
        for &slot in slots {
            if let (Some(dst), Some(src)) = (self.slots.get_mut(slot), source.slots.get(slot)) {
                dst.clone_from(src);
            }
        }
    }
}
