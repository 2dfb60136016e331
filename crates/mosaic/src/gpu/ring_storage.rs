use ingest::{ImageFrame, Resolution, RingStorage, ShardLayout};
use tracing::info;

use crate::error::EngineError;

pub(crate) const RING_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

struct Shard {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

/// Ring slots stored as layers of one or more 2D texture arrays.
pub struct GpuRingStorage {
    device: wgpu::Device,
    queue: wgpu::Queue,
    layout: ShardLayout,
    resolution: Resolution,
    shards: Vec<Shard>,
}

impl GpuRingStorage {
    /// Allocates every shard up front. Allocation failure is reported instead
    /// of surfacing later as a device loss.
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        capacity: usize,
        layers_per_array: usize,
        resolution: Resolution,
        label: &str,
    ) -> Result<Self, EngineError> {
        let limits = device.limits();
        let limit = limits.max_texture_dimension_2d;
        if resolution.width > limit || resolution.height > limit {
            return Err(EngineError::ResolutionLimit { resolution, limit });
        }
        let layers = layers_per_array.min(limits.max_texture_array_layers as usize);
        let layout = ShardLayout::new(capacity, layers);

        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let shards: Vec<Shard> = (0..layout.array_count())
            .map(|array| {
                let texture = device.create_texture(&wgpu::TextureDescriptor {
                    label: Some(&format!("{label} shard #{array}")),
                    size: wgpu::Extent3d {
                        width: resolution.width,
                        height: resolution.height,
                        depth_or_array_layers: layout.layers_in(array) as u32,
                    },
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format: RING_FORMAT,
                    usage: wgpu::TextureUsages::TEXTURE_BINDING
                        | wgpu::TextureUsages::COPY_DST
                        | wgpu::TextureUsages::COPY_SRC,
                    view_formats: &[],
                });
                let view = texture.create_view(&wgpu::TextureViewDescriptor {
                    label: Some(&format!("{label} shard view #{array}")),
                    dimension: Some(wgpu::TextureViewDimension::D2Array),
                    ..Default::default()
                });
                Shard { texture, view }
            })
            .collect();
        let validation = pollster::block_on(device.pop_error_scope());
        let out_of_memory = pollster::block_on(device.pop_error_scope());
        if let Some(err) = out_of_memory.or(validation) {
            return Err(EngineError::RingAllocation {
                capacity,
                resolution,
                message: err.to_string(),
            });
        }

        info!(
            label,
            capacity,
            shards = layout.array_count(),
            layers_per_array = layout.layers_per_array(),
            %resolution,
            mib = (capacity * resolution.frame_bytes()) >> 20,
            "allocated ring textures"
        );

        Ok(Self {
            device: device.clone(),
            queue: queue.clone(),
            layout,
            resolution,
            shards,
        })
    }

    pub fn layout(&self) -> ShardLayout {
        self.layout
    }

    /// `D2Array` view of each shard, indexed by array number.
    pub(crate) fn views(&self) -> impl Iterator<Item = &wgpu::TextureView> {
        self.shards.iter().map(|shard| &shard.view)
    }

    fn layer_origin(&self, slot: usize) -> (usize, wgpu::Origin3d) {
        let (array, layer) = self.layout.locate(slot);
        (
            array,
            wgpu::Origin3d {
                x: 0,
                y: 0,
                z: layer as u32,
            },
        )
    }

    fn layer_extent(&self) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: self.resolution.width,
            height: self.resolution.height,
            depth_or_array_layers: 1,
        }
    }
}

impl RingStorage for GpuRingStorage {
    fn capacity(&self) -> usize {
        self.layout.capacity()
    }

    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn write(&mut self, slot: usize, frame: &ImageFrame) {
        let (array, origin) = self.layer_origin(slot);
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.shards[array].texture,
                mip_level: 0,
                origin,
                aspect: wgpu::TextureAspect::All,
            },
            &frame.pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(self.resolution.bytes_per_row()),
                rows_per_image: Some(self.resolution.height),
            },
            self.layer_extent(),
        );
    }

    fn copy_slots(&mut self, source: &Self, slots: &[usize]) {
        if slots.is_empty() {
            return;
        }
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("ring catch-up encoder"),
            });
        for &slot in slots {
            let (array, origin) = self.layer_origin(slot);
            encoder.copy_texture_to_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &source.shards[array].texture,
                    mip_level: 0,
                    origin,
                    aspect: wgpu::TextureAspect::All,
                },
                wgpu::TexelCopyTextureInfo {
                    texture: &self.shards[array].texture,
                    mip_level: 0,
                    origin,
                    aspect: wgpu::TextureAspect::All,
                },
                self.layer_extent(),
            );
        }
        self.queue.submit(std::iter::once(encoder.finish()));
    }
}
