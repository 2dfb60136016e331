use std::sync::atomic::{AtomicUsize, Ordering};

use crate::frame::ImageFrame;
use crate::ring::{RingBuffer, RingStorage};

/// Front/back pair of ring buffers.
///
/// Uploads only ever touch the back instance and readers only ever see the
/// front one. [`DoubleRing::swap`] publishes a finished batch by flipping a
/// single atomic index, so a reader never sees half a batch.
///
/// After a swap the new back instance is one batch behind. The slots written
/// by that batch are remembered and copied over from the front before the
/// next batch starts, which keeps both generations converging.
pub struct DoubleRing<S> {
    rings: [RingBuffer<S>; 2],
    front: AtomicUsize,
    written: Vec<usize>,
    stale: Vec<usize>,
}

impl<S: RingStorage> DoubleRing<S> {
    /// # Panics
    ///
    /// Panics if the two storages differ in capacity.
    pub fn new(first: S, second: S) -> Self {
        assert_eq!(
            first.capacity(),
            second.capacity(),
            "front and back storage must have the same capacity"
        );
        Self {
            rings: [RingBuffer::new(first), RingBuffer::new(second)],
            front: AtomicUsize::new(0),
            written: Vec::new(),
            stale: Vec::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.rings[0].capacity()
    }

    /// Index (0 or 1) of the instance readers currently see.
    pub fn front_index(&self) -> usize {
        self.front.load(Ordering::Acquire)
    }

    pub fn front(&self) -> &RingBuffer<S> {
        &self.rings[self.front_index()]
    }

    pub fn back(&self) -> &RingBuffer<S> {
        &self.rings[1 - self.front_index()]
    }

    /// Both instances, indexed like [`DoubleRing::front_index`].
    pub fn instances(&self) -> &[RingBuffer<S>; 2] {
        &self.rings
    }

    /// Uploads still waiting for [`DoubleRing::swap`].
    pub fn batch_len(&self) -> usize {
        self.written.len()
    }

    /// Writes `frame` into the back instance. The frame is consumed here.
    pub fn upload(&mut self, frame: ImageFrame) -> Option<usize> {
        self.catch_up();
        let back = 1 - self.front_index();
        let slot = self.rings[back].upload(&frame)?;
        self.written.push(slot);
        Some(slot)
    }

    /// Publishes the current batch. Returns `false` when nothing was uploaded
    /// since the last swap, in which case the front stays as it is.
    pub fn swap(&mut self) -> bool {
        if self.written.is_empty() {
            return false;
        }
        let back = 1 - self.front_index();
        self.front.store(back, Ordering::Release);

        self.stale = std::mem::take(&mut self.written);
        self.stale.sort_unstable();
        self.stale.dedup();
        true
    }

    fn catch_up(&mut self) {
        if self.stale.is_empty() {
            return;
        }
        let front = self.front_index();
        let [first, second] = &mut self.rings;
        let (source, target) = if front == 0 {
            (&*first, second)
        } else {
            (&*second, first)
        };
        target.catch_up(source, &self.stale);
        self.stale.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Resolution;
    use crate::memory::MemoryStorage;

    fn frame(sequence: u64) -> ImageFrame {
        ImageFrame {
            sequence,
            width: 1,
            height: 1,
            pixels: vec![0; 4],
        }
    }

    fn double(capacity: usize) -> DoubleRing<MemoryStorage> {
        let resolution = Resolution::new(1, 1);
        DoubleRing::new(
            MemoryStorage::new(capacity, resolution),
            MemoryStorage::new(capacity, resolution),
        )
    }

    #[test]
    fn front_is_untouched_until_swap() {
        let mut ring = double(8);
        ring.upload(frame(0));
        ring.upload(frame(1));
        assert!(ring.swap());
        let generation: Vec<_> = ring.front().storage().live_sequences();
        assert_eq!(generation, vec![0, 1]);

        for sequence in 2..5 {
            ring.upload(frame(sequence));
            assert_eq!(ring.front().occupancy(), 2);
            assert_eq!(ring.front().storage().live_sequences(), generation);
        }
        assert_eq!(ring.batch_len(), 3);

        assert!(ring.swap());
        assert_eq!(ring.front().occupancy(), 5);
        assert_eq!(ring.front().storage().live_sequences(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn swap_without_uploads_keeps_front() {
        let mut ring = double(4);
        let before = ring.front_index();
        assert!(!ring.swap());
        assert_eq!(ring.front_index(), before);
    }

    #[test]
    fn alternating_batches_keep_both_instances_in_step() {
        let mut ring = double(4);
        let mut next = 0;
        for batch in [1usize, 3, 2, 5, 1] {
            for _ in 0..batch {
                ring.upload(frame(next));
                next += 1;
            }
            assert!(ring.swap());
        }
        // One more upload forces the catch-up of the instance that was front.
        ring.upload(frame(next));
        assert!(ring.swap());

        let [a, b] = ring.instances();
        let front = ring.front_index();
        assert_eq!(ring.instances()[front].state().occupancy, 4);
        let mut live = ring.front().storage().live_sequences();
        live.sort_unstable();
        assert_eq!(live, vec![9, 10, 11, 12]);

        // The back is exactly one upload behind the front.
        let back = &ring.instances()[1 - front];
        assert_eq!(back.state().write_index, (ring.front().state().write_index + 3) % 4);
        let differing = (0..4)
            .filter(|&slot| a.storage().sequence_at(slot) != b.storage().sequence_at(slot))
            .count();
        assert_eq!(differing, 1);
    }
}
