use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::frame::{ImageFrame, RawPayload};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("queue consumer has shut down")]
pub struct QueueClosed;

/// Creates the transport → decode queue.
pub fn raw_queue() -> (RawSender, RawReceiver) {
    let (tx, rx) = unbounded();
    (
        RawSender {
            tx,
            next_sequence: Arc::new(AtomicU64::new(0)),
        },
        RawReceiver { rx },
    )
}

/// Creates the decode → upload queue.
pub fn decoded_queue() -> (DecodedSender, DecodedQueue) {
    let (tx, rx) = unbounded();
    (DecodedSender { tx }, DecodedQueue { rx })
}

/// Ingress handle handed to producers. Cloning shares the sequence counter.
#[derive(Clone)]
pub struct RawSender {
    tx: Sender<RawPayload>,
    next_sequence: Arc<AtomicU64>,
}

impl RawSender {
    /// Queues one compressed image and returns the sequence number it was
    /// stamped with. Never blocks.
    pub fn push(&self, bytes: Vec<u8>) -> Result<u64, QueueClosed> {
        let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
        self.tx
            .send(RawPayload { sequence, bytes })
            .map_err(|_| QueueClosed)?;
        Ok(sequence)
    }

    /// Payloads waiting for a decode worker.
    pub fn pending(&self) -> usize {
        self.tx.len()
    }
}

#[derive(Clone)]
pub struct RawReceiver {
    rx: Receiver<RawPayload>,
}

impl RawReceiver {
    pub(crate) fn channel(&self) -> &Receiver<RawPayload> {
        &self.rx
    }
}

#[derive(Clone)]
pub struct DecodedSender {
    tx: Sender<ImageFrame>,
}

impl DecodedSender {
    pub fn send(&self, frame: ImageFrame) -> Result<(), QueueClosed> {
        self.tx.send(frame).map_err(|_| QueueClosed)
    }
}

/// Render-side end of the decoded queue.
pub struct DecodedQueue {
    rx: Receiver<ImageFrame>,
}

impl DecodedQueue {
    /// Pops at most `budget` frames without blocking; `0` means no limit.
    ///
    /// Frames beyond the budget stay queued for the next call.
    pub fn drain(&self, budget: usize) -> impl Iterator<Item = ImageFrame> + '_ {
        let limit = if budget == 0 { usize::MAX } else { budget };
        self.rx.try_iter().take(limit)
    }

    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}
