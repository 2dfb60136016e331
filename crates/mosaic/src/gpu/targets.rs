pub(crate) const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

pub(crate) struct RenderTarget {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

impl RenderTarget {
    fn new(device: &wgpu::Device, label: &str, size: (u32, u32), usage: wgpu::TextureUsages) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: extent(size),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TARGET_FORMAT,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }
}

fn extent((width, height): (u32, u32)) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width: width.max(1),
        height: height.max(1),
        depth_or_array_layers: 1,
    }
}

/// Surface-sized intermediates for the composition passes.
///
/// `new_frame` receives the mosaic, `old_frame` carries the faded history
/// between frames and `temp` is the copy of `old_frame` the fade reads from.
pub(crate) struct OffscreenTargets {
    pub new_frame: RenderTarget,
    pub old_frame: RenderTarget,
    pub temp: RenderTarget,
    size: (u32, u32),
}

impl OffscreenTargets {
    /// Creates the targets with `old_frame` cleared to opaque black.
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, size: (u32, u32)) -> Self {
        let sampled = wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING;
        let targets = Self {
            new_frame: RenderTarget::new(device, "new frame target", size, sampled),
            old_frame: RenderTarget::new(
                device,
                "old frame target",
                size,
                sampled | wgpu::TextureUsages::COPY_SRC,
            ),
            temp: RenderTarget::new(
                device,
                "fade source target",
                size,
                wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            ),
            size,
        };
        targets.clear_history(device, queue);
        targets
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn extent(&self) -> wgpu::Extent3d {
        extent(self.size)
    }

    fn clear_history(&self, device: &wgpu::Device, queue: &wgpu::Queue) {
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("clear history encoder"),
        });
        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("clear history pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &self.old_frame.view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            occlusion_query_set: None,
            timestamp_writes: None,
        });
        queue.submit(std::iter::once(encoder.finish()));
    }
}
