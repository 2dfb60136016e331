use bytemuck::{Pod, Zeroable};
use scheduler::MAX_TILES;

/// Per-tile parameters read by `mosaic.wgsl`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(crate) struct TileUniform {
    pub layer: u32,
    pub _padding: [u32; 3],
}

unsafe impl Zeroable for TileUniform {}
unsafe impl Pod for TileUniform {}

impl TileUniform {
    pub fn new(layer: u32) -> Self {
        Self {
            layer,
            _padding: [0; 3],
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(crate) struct FadeUniforms {
    pub fade: f32,
    pub _padding: [f32; 3],
}

unsafe impl Zeroable for FadeUniforms {}
unsafe impl Pod for FadeUniforms {}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(crate) struct PresentUniforms {
    pub offset: [f32; 2],
    pub _padding: [f32; 2],
}

unsafe impl Zeroable for PresentUniforms {}
unsafe impl Pod for PresentUniforms {}

/// Rounds `size` up to the device's dynamic offset alignment.
pub(crate) fn aligned_stride(size: u64, alignment: u64) -> u64 {
    let alignment = alignment.max(1);
    size.div_ceil(alignment) * alignment
}

/// One uniform buffer holding a [`TileUniform`] for every tile, addressed
/// with dynamic offsets and rewritten once per frame.
pub(crate) struct TileUniformArray {
    buffer: wgpu::Buffer,
    stride: u64,
    staging: Vec<u8>,
}

impl TileUniformArray {
    pub fn new(device: &wgpu::Device) -> Self {
        let alignment = u64::from(device.limits().min_uniform_buffer_offset_alignment);
        let stride = aligned_stride(std::mem::size_of::<TileUniform>() as u64, alignment);
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("tile uniform array"),
            size: stride * MAX_TILES as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Self {
            buffer,
            stride,
            staging: Vec::new(),
        }
    }

    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    pub fn binding_size() -> wgpu::BufferSize {
        wgpu::BufferSize::new(std::mem::size_of::<TileUniform>() as u64)
            .unwrap_or(wgpu::BufferSize::MIN)
    }

    /// Dynamic offset of tile `index`.
    pub fn offset(&self, index: usize) -> u32 {
        (index as u64 * self.stride) as u32
    }

    /// Packs `tiles` at stride spacing and uploads them with a single write.
    pub fn write(&mut self, queue: &wgpu::Queue, tiles: &[TileUniform]) {
        let count = tiles.len().min(MAX_TILES);
        if count == 0 {
            return;
        }
        pack_strided(&mut self.staging, &tiles[..count], self.stride as usize);
        queue.write_buffer(&self.buffer, 0, &self.staging);
    }
}

fn pack_strided(out: &mut Vec<u8>, tiles: &[TileUniform], stride: usize) {
    out.clear();
    out.resize(tiles.len() * stride, 0);
    for (chunk, tile) in out.chunks_exact_mut(stride).zip(tiles) {
        let bytes = bytemuck::bytes_of(tile);
        chunk[..bytes.len()].copy_from_slice(bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_sizes_match_wgsl_layout() {
        assert_eq!(std::mem::size_of::<TileUniform>(), 16);
        assert_eq!(std::mem::size_of::<FadeUniforms>(), 16);
        assert_eq!(std::mem::size_of::<PresentUniforms>(), 16);
    }

    #[test]
    fn stride_rounds_up_to_alignment() {
        assert_eq!(aligned_stride(16, 256), 256);
        assert_eq!(aligned_stride(256, 256), 256);
        assert_eq!(aligned_stride(257, 256), 512);
        assert_eq!(aligned_stride(16, 0), 16);
    }

    #[test]
    fn tiles_are_packed_at_stride() {
        let mut out = Vec::new();
        pack_strided(&mut out, &[TileUniform::new(3), TileUniform::new(7)], 32);
        assert_eq!(out.len(), 64);
        assert_eq!(&out[0..4], &3u32.to_ne_bytes());
        assert!(out[16..32].iter().all(|&byte| byte == 0));
        assert_eq!(&out[32..36], &7u32.to_ne_bytes());
    }
}
