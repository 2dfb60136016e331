//! GPU side of the imageflash mosaic.
//!
//! The crate owns the ring textures, the tile scheduler and the composition
//! passes. One call to [`MosaicEngine::frame`] does the whole per-frame job:
//!
//! ```text
//!   DecodedQueue ──▶ UploadPump ──▶ DoubleRing<GpuRingStorage>
//!                                          │ front
//!   ControlHandle::snapshot ──▶ TileScheduler::advance
//!                                          │
//!                                          ▼
//!   mosaic pass ─▶ copy old→temp ─▶ fade pass ─▶ scroll present ─▶ surface
//! ```
//!
//! `window::run` hosts the engine in a winit window; embedders with their own
//! surface construct [`MosaicEngine`] directly and hand it a view each frame.
//! [`ControlHandle`] is the only piece meant to cross threads.

mod control;
mod engine;
mod error;
mod gpu;
mod types;
pub mod window;

pub use control::{wrap_unit, ControlHandle, FrameParams, ScrollState};
pub use engine::{FrameStats, MosaicEngine};
pub use error::EngineError;
pub use gpu::GpuRingStorage;
pub use types::{GpuPowerPreference, MosaicConfig, WindowConfig};
