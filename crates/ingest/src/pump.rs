use tracing::trace;

use crate::double::DoubleRing;
use crate::queue::DecodedQueue;
use crate::ring::RingStorage;

/// Outcome of one [`UploadPump::pump`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadReport {
    /// Frames written into the back ring.
    pub uploaded: usize,
    /// Frames left in the decoded queue for later frames.
    pub remaining: usize,
    /// Whether the front ring changed.
    pub swapped: bool,
}

/// Moves decoded frames into the back ring, then publishes them.
///
/// Called once per rendered frame. The budget is the backpressure knob: frames
/// beyond it wait in the queue instead of stalling presentation.
pub struct UploadPump<S> {
    ring: DoubleRing<S>,
    queue: DecodedQueue,
}

impl<S: RingStorage> UploadPump<S> {
    pub fn new(ring: DoubleRing<S>, queue: DecodedQueue) -> Self {
        Self { ring, queue }
    }

    /// Uploads at most `budget` frames (`0` = everything queued) and swaps when
    /// at least one landed.
    pub fn pump(&mut self, budget: usize) -> UploadReport {
        let mut uploaded = 0;
        for frame in self.queue.drain(budget) {
            if self.ring.upload(frame).is_some() {
                uploaded += 1;
            }
        }
        let swapped = self.ring.swap();
        let report = UploadReport {
            uploaded,
            remaining: self.queue.pending(),
            swapped,
        };
        if uploaded > 0 {
            trace!(
                uploaded,
                remaining = report.remaining,
                usage = self.usage(),
                "uploaded decoded frames"
            );
        }
        report
    }

    /// Occupancy of the front ring.
    pub fn usage(&self) -> usize {
        self.ring.front().occupancy()
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    pub fn pending(&self) -> usize {
        self.queue.pending()
    }

    pub fn ring(&self) -> &DoubleRing<S> {
        &self.ring
    }
}
