use ingest::Resolution;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("failed to allocate ring textures ({capacity} slots at {resolution}): {message}")]
    RingAllocation {
        capacity: usize,
        resolution: Resolution,
        message: String,
    },
    #[error("ring resolution {resolution} exceeds the GPU texture limit of {limit}")]
    ResolutionLimit { resolution: Resolution, limit: u32 },
    #[error("surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),
}
