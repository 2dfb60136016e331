//! Image ingestion for the imageflash mosaic.
//!
//! Everything between the external producer and the GPU lives here, minus the
//! GPU itself:
//!
//! ```text
//!   RawSender::push ──▶ raw queue ──▶ DecodeWorkers ──▶ decoded queue
//!                                                          │
//!                     DoubleRing<S> (back) ◀── UploadPump::pump(budget)
//!                            │ swap()
//!                            ▼
//!                     DoubleRing<S> (front) ──▶ readers
//! ```
//!
//! - `frame` defines the payloads that move through the queues.
//! - `decode` turns compressed bytes into fixed-size RGBA8 frames.
//! - `queue` wraps the two crossbeam channels and the per-frame drain budget.
//! - `worker` runs decode threads that block on the raw queue and exit promptly
//!   on shutdown.
//! - `ring` tracks the circular write cursor over a pluggable [`RingStorage`].
//! - `double` keeps a front/back pair and flips between them atomically.
//! - `pump` glues the decoded queue to the back ring once per rendered frame.
//! - `memory` is a CPU-side [`RingStorage`] used for headless runs and tests.

mod decode;
mod double;
mod frame;
mod memory;
mod pump;
mod queue;
mod ring;
mod worker;

pub use decode::{DecodeError, Decoder, ResizeFilter};
pub use double::DoubleRing;
pub use frame::{ImageFrame, RawPayload, Resolution};
pub use memory::MemoryStorage;
pub use pump::{UploadPump, UploadReport};
pub use queue::{
    decoded_queue, raw_queue, DecodedQueue, DecodedSender, QueueClosed, RawReceiver, RawSender,
};
pub use ring::{RingBuffer, RingState, RingStorage, ShardLayout};
pub use worker::{DecodeWorkers, WorkerConfig, WorkerError, WorkerStats};
