// ============================================================================
// IMAGE TEXTURE — GPU-side image wrapper with upload and readback
// ============================================================================

use super::context::GpuContext;
use super::EngineError;

/// A 2D, single-mip GPU texture with its default view.
pub struct ImageTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
}

impl ImageTexture {
    /// Sampled `Bgra8Unorm` texture initialised from BGRA pixels.
    pub fn from_bgra(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        width: u32,
        height: u32,
        data: &[u8],
        label: &str,
    ) -> Self {
        let tex = Self::create(
            device,
            width,
            height,
            wgpu::TextureFormat::Bgra8Unorm,
            wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::COPY_SRC,
            label,
        );
        tex.upload(queue, data);
        tex
    }

    /// `Rgba8Unorm` texture a compute kernel writes and a render pass samples.
    pub fn storage(device: &wgpu::Device, width: u32, height: u32, label: &str) -> Self {
        Self::create(
            device,
            width,
            height,
            wgpu::TextureFormat::Rgba8Unorm,
            wgpu::TextureUsages::STORAGE_BINDING
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            label,
        )
    }

    pub fn create(
        device: &wgpu::Device,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
        label: &str,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view,
            width,
            height,
            format,
        }
    }

    /// Full re-upload of tightly packed 4-byte pixels.
    pub fn upload(&self, queue: &wgpu::Queue, data: &[u8]) {
        debug_assert_eq!(data.len() as u64, self.width as u64 * self.height as u64 * 4);

        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4 * self.width),
                rows_per_image: Some(self.height),
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
    }

    /// Blocking readback; returns tightly packed pixels in the texture's
    /// own channel order.
    pub fn read(&self, ctx: &GpuContext) -> Result<Vec<u8>, EngineError> {
        readback_texture(ctx, &self.texture, self.width, self.height)
    }
}

/// WGPU requires `bytes_per_row` of buffer copies to be a multiple of 256.
pub fn aligned_bytes_per_row(width: u32) -> u32 {
    let unaligned = width * 4;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unaligned.div_ceil(align) * align
}

/// Bytes of a padded readback buffer for a `width` x `height` texture.
pub fn staging_size(width: u32, height: u32) -> u64 {
    aligned_bytes_per_row(width) as u64 * height as u64
}

/// Copy a 4-byte-per-pixel texture into a staging buffer, wait for the GPU,
/// and strip the row padding.
pub fn readback_texture(
    ctx: &GpuContext,
    texture: &wgpu::Texture,
    width: u32,
    height: u32,
) -> Result<Vec<u8>, EngineError> {
    let device = &ctx.device;

    let bytes_per_row = aligned_bytes_per_row(width);
    let staging = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("readback_staging"),
        size: staging_size(width, height),
        usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("readback_encoder"),
    });
    encoder.copy_texture_to_buffer(
        wgpu::ImageCopyTexture {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::ImageCopyBuffer {
            buffer: &staging,
            layout: wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
    );
    ctx.submit_one(encoder);

    let slice = staging.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    device.poll(wgpu::Maintain::Wait);
    match rx.recv() {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return Err(EngineError::Readback(format!("map error: {e:?}"))),
        Err(e) => return Err(EngineError::Readback(format!("channel error: {e}"))),
    }

    let mapped = slice.get_mapped_range();
    let actual_row = (width * 4) as usize;
    let mut result = Vec::with_capacity(actual_row * height as usize);
    for row in mapped.chunks_exact(bytes_per_row as usize) {
        result.extend_from_slice(&row[..actual_row]);
    }
    drop(mapped);
    staging.unmap();

    Ok(result)
}
