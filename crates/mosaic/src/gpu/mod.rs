//! GPU side of the mosaic.
//!
//! - `context` owns the wgpu instance, device and swapchain for a window.
//! - `ring_storage` backs ring slots with sharded texture arrays.
//! - `targets` holds the surface-sized intermediates (`new_frame`,
//!   `old_frame`, `temp`).
//! - `pipeline` builds the mosaic, fade and present pipelines from WGSL.
//! - `uniforms` mirrors the WGSL uniform blocks and packs the per-tile array.
//! - `composer` encodes the four passes of a frame.

mod composer;
mod context;
mod pipeline;
mod ring_storage;
mod targets;
mod uniforms;

pub(crate) use composer::{Composer, CompositionParams};
pub(crate) use context::GpuContext;
pub use ring_storage::GpuRingStorage;
