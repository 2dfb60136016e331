use ingest::{DoubleRing, ShardLayout};
use scheduler::{TileRect, TileScheduler};
use wgpu::util::{DeviceExt, TextureDataOrder};

use super::pipeline::Pipelines;
use super::ring_storage::{GpuRingStorage, RING_FORMAT};
use super::targets::OffscreenTargets;
use super::uniforms::{FadeUniforms, PresentUniforms, TileUniform, TileUniformArray};

/// Colour shown by tiles while the ring is still empty.
const PLACEHOLDER_TEXEL: [u8; 4] = [0, 0, 0, 255];

/// Per-frame inputs the composer does not own.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct CompositionParams {
    pub fade: f32,
    pub scroll_offset: [f32; 2],
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct TileDraw {
    rect: TileRect,
    /// Shard array holding the tile's slot, `None` for the placeholder.
    shard: Option<usize>,
}

/// Encodes the mosaic, copy, fade and present passes.
pub(crate) struct Composer {
    pipelines: Pipelines,
    tile_uniforms: TileUniformArray,
    tile_bind_group: wgpu::BindGroup,
    /// Shard bind groups per ring instance, built once.
    shard_groups: [Vec<wgpu::BindGroup>; 2],
    _placeholder: wgpu::Texture,
    placeholder_group: wgpu::BindGroup,
    fade_buffer: wgpu::Buffer,
    present_buffer: wgpu::Buffer,
    linear_sampler: wgpu::Sampler,
    repeat_sampler: wgpu::Sampler,
    targets: OffscreenTargets,
    fade_group: wgpu::BindGroup,
    present_group: wgpu::BindGroup,
    draws: Vec<TileDraw>,
    tile_data: Vec<TileUniform>,
}

impl Composer {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        surface_format: wgpu::TextureFormat,
        size: (u32, u32),
        ring: &DoubleRing<GpuRingStorage>,
    ) -> Self {
        let pipelines = Pipelines::new(device, surface_format);
        let tile_uniforms = TileUniformArray::new(device);
        let tile_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("tile uniform bind group"),
            layout: &pipelines.tile_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: tile_uniforms.buffer(),
                    offset: 0,
                    size: Some(TileUniformArray::binding_size()),
                }),
            }],
        });

        let linear_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("linear clamp sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        let repeat_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("linear repeat sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let shard_group = |label: &str, view: &wgpu::TextureView| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout: &pipelines.shard_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(&linear_sampler),
                    },
                ],
            })
        };
        let shard_groups = std::array::from_fn(|instance| {
            ring.instances()[instance]
                .storage()
                .views()
                .enumerate()
                .map(|(array, view)| {
                    shard_group(&format!("ring {instance} shard #{array} bind group"), view)
                })
                .collect()
        });

        let placeholder = device.create_texture_with_data(
            queue,
            &wgpu::TextureDescriptor {
                label: Some("placeholder slot texture"),
                size: wgpu::Extent3d {
                    width: 1,
                    height: 1,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: RING_FORMAT,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            TextureDataOrder::LayerMajor,
            &PLACEHOLDER_TEXEL,
        );
        let placeholder_view = placeholder.create_view(&wgpu::TextureViewDescriptor {
            label: Some("placeholder slot view"),
            dimension: Some(wgpu::TextureViewDimension::D2Array),
            ..Default::default()
        });
        let placeholder_group = shard_group("placeholder bind group", &placeholder_view);

        let fade_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("fade uniforms"),
            contents: bytemuck::bytes_of(&FadeUniforms::default()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let present_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("present uniforms"),
            contents: bytemuck::bytes_of(&PresentUniforms::default()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let targets = OffscreenTargets::new(device, queue, size);
        let (fade_group, present_group) = target_groups(
            device,
            &pipelines,
            &targets,
            &fade_buffer,
            &present_buffer,
            &linear_sampler,
            &repeat_sampler,
        );

        Self {
            pipelines,
            tile_uniforms,
            tile_bind_group,
            shard_groups,
            _placeholder: placeholder,
            placeholder_group,
            fade_buffer,
            present_buffer,
            linear_sampler,
            repeat_sampler,
            targets,
            fade_group,
            present_group,
            draws: Vec::new(),
            tile_data: Vec::new(),
        }
    }

    pub fn size(&self) -> (u32, u32) {
        self.targets.size()
    }

    /// Recreates the offscreen targets; the faded history starts over black.
    pub fn resize(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, size: (u32, u32)) {
        if size == self.targets.size() {
            return;
        }
        self.targets = OffscreenTargets::new(device, queue, size);
        let (fade_group, present_group) = target_groups(
            device,
            &self.pipelines,
            &self.targets,
            &self.fade_buffer,
            &self.present_buffer,
            &self.linear_sampler,
            &self.repeat_sampler,
        );
        self.fade_group = fade_group;
        self.present_group = present_group;
    }

    /// Encodes all four passes into one command buffer and submits it.
    /// Returns the number of tiles drawn.
    pub fn render(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        output: &wgpu::TextureView,
        ring: &DoubleRing<GpuRingStorage>,
        scheduler: &TileScheduler,
        params: CompositionParams,
    ) -> usize {
        let front_index = ring.front_index();
        let front = &ring.instances()[front_index];
        let occupancy = front.occupancy();
        let layout = front.storage().layout();

        tile_draws(
            scheduler,
            occupancy,
            layout,
            self.targets.size(),
            &mut self.draws,
            &mut self.tile_data,
        );
        self.tile_uniforms.write(queue, &self.tile_data);
        queue.write_buffer(
            &self.fade_buffer,
            0,
            bytemuck::bytes_of(&FadeUniforms {
                fade: params.fade,
                ..FadeUniforms::default()
            }),
        );
        queue.write_buffer(
            &self.present_buffer,
            0,
            bytemuck::bytes_of(&PresentUniforms {
                offset: params.scroll_offset,
                ..PresentUniforms::default()
            }),
        );

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("mosaic frame encoder"),
        });

        let mut drawn = 0;
        {
            let mut pass = begin_pass(
                &mut encoder,
                "mosaic pass",
                &self.targets.new_frame.view,
                wgpu::LoadOp::Clear(wgpu::Color::BLACK),
            );
            pass.set_pipeline(&self.pipelines.mosaic);
            for (index, draw) in self.draws.iter().enumerate() {
                let rect = draw.rect;
                let slot_group = match draw.shard {
                    Some(array) => &self.shard_groups[front_index][array],
                    None => &self.placeholder_group,
                };
                pass.set_viewport(
                    rect.x as f32,
                    rect.y as f32,
                    rect.width as f32,
                    rect.height as f32,
                    0.0,
                    1.0,
                );
                pass.set_bind_group(0, &self.tile_bind_group, &[self.tile_uniforms.offset(index)]);
                pass.set_bind_group(1, slot_group, &[]);
                pass.draw(0..3, 0..1);
                drawn += 1;
            }
        }

        encoder.copy_texture_to_texture(
            self.targets.old_frame.texture.as_image_copy(),
            self.targets.temp.texture.as_image_copy(),
            self.targets.extent(),
        );

        {
            let mut pass = begin_pass(
                &mut encoder,
                "fade pass",
                &self.targets.old_frame.view,
                wgpu::LoadOp::Load,
            );
            pass.set_pipeline(&self.pipelines.fade);
            pass.set_bind_group(0, &self.fade_group, &[]);
            pass.draw(0..3, 0..1);
        }

        {
            let mut pass = begin_pass(
                &mut encoder,
                "present pass",
                output,
                wgpu::LoadOp::Clear(wgpu::Color::BLACK),
            );
            pass.set_pipeline(&self.pipelines.present);
            pass.set_bind_group(0, &self.present_group, &[]);
            pass.draw(0..3, 0..1);
        }

        queue.submit(std::iter::once(encoder.finish()));
        drawn
    }
}

/// Builds the draw list and matching uniforms for the front ring, in
/// lockstep so draw `i` uses uniform `i`. Tiles with no pixels are left out.
fn tile_draws(
    scheduler: &TileScheduler,
    occupancy: usize,
    layout: ShardLayout,
    (width, height): (u32, u32),
    draws: &mut Vec<TileDraw>,
    tile_data: &mut Vec<TileUniform>,
) {
    draws.clear();
    tile_data.clear();
    for index in 0..scheduler.tile_count() {
        let rect = scheduler.tile_rect(index, width, height);
        if rect.width == 0 || rect.height == 0 {
            continue;
        }
        let (shard, layer) = match scheduler.slot_for(index, occupancy) {
            Some(slot) => {
                let (array, layer) = layout.locate(slot);
                (Some(array), layer as u32)
            }
            None => (None, 0),
        };
        draws.push(TileDraw { rect, shard });
        tile_data.push(TileUniform::new(layer));
    }
}

fn begin_pass<'encoder>(
    encoder: &'encoder mut wgpu::CommandEncoder,
    label: &str,
    view: &wgpu::TextureView,
    load: wgpu::LoadOp<wgpu::Color>,
) -> wgpu::RenderPass<'encoder> {
    encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view,
            depth_slice: None,
            resolve_target: None,
            ops: wgpu::Operations {
                load,
                store: wgpu::StoreOp::Store,
            },
        })],
        depth_stencil_attachment: None,
        occlusion_query_set: None,
        timestamp_writes: None,
    })
}

fn target_groups(
    device: &wgpu::Device,
    pipelines: &Pipelines,
    targets: &OffscreenTargets,
    fade_buffer: &wgpu::Buffer,
    present_buffer: &wgpu::Buffer,
    linear_sampler: &wgpu::Sampler,
    repeat_sampler: &wgpu::Sampler,
) -> (wgpu::BindGroup, wgpu::BindGroup) {
    let fade = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("fade bind group"),
        layout: &pipelines.fade_layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: fade_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(&targets.temp.view),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::TextureView(&targets.new_frame.view),
            },
            wgpu::BindGroupEntry {
                binding: 3,
                resource: wgpu::BindingResource::Sampler(linear_sampler),
            },
        ],
    });
    let present = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("present bind group"),
        layout: &pipelines.present_layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: present_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(&targets.old_frame.view),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::Sampler(repeat_sampler),
            },
        ],
    });
    (fade, present)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scheduler::SwitchPolicy;
    use std::time::Duration;

    fn build(
        scheduler: &TileScheduler,
        occupancy: usize,
        layout: ShardLayout,
        size: (u32, u32),
    ) -> (Vec<TileDraw>, Vec<TileUniform>) {
        let (mut draws, mut tile_data) = (Vec::new(), Vec::new());
        tile_draws(scheduler, occupancy, layout, size, &mut draws, &mut tile_data);
        (draws, tile_data)
    }

    #[test]
    fn empty_ring_uses_placeholder_for_every_tile() {
        let scheduler = TileScheduler::new(2, 1);
        let (draws, tile_data) = build(&scheduler, 0, ShardLayout::new(8, 4), (64, 64));

        assert_eq!(draws.len(), 16);
        assert!(draws.iter().all(|draw| draw.shard.is_none()));
        assert!(tile_data.iter().all(|tile| *tile == TileUniform::new(0)));
    }

    #[test]
    fn slot_maps_to_shard_and_layer() {
        let mut scheduler = TileScheduler::new(0, 1);
        let every_frame = SwitchPolicy {
            interval: Duration::ZERO,
            fraction: 1.0,
        };
        for _ in 0..300 {
            scheduler.advance(Duration::from_millis(16), &every_frame, 600);
        }
        assert_eq!(scheduler.slot_for(0, 600), Some(300));

        let (draws, tile_data) = build(&scheduler, 600, ShardLayout::new(600, 256), (32, 16));
        assert_eq!(
            draws,
            vec![TileDraw {
                rect: TileRect {
                    x: 0,
                    y: 0,
                    width: 32,
                    height: 16,
                },
                shard: Some(1),
            }]
        );
        assert_eq!(tile_data, vec![TileUniform::new(44)]);
    }

    #[test]
    fn zero_area_tiles_are_skipped() {
        let scheduler = TileScheduler::new(1, 1);
        let (draws, tile_data) = build(&scheduler, 3, ShardLayout::new(8, 8), (1, 1));

        assert_eq!(draws.len(), 1);
        assert_eq!(tile_data.len(), 1);
        assert_eq!(
            draws[0].rect,
            TileRect {
                x: 0,
                y: 0,
                width: 1,
                height: 1,
            }
        );
        assert_eq!(draws[0].shard, Some(0));
    }
}
