// ============================================================================
// OFFSCREEN FRAME — headless stand-in for a window's drawable
// ============================================================================

use super::context::GpuContext;
use super::engine::Engine;
use super::texture::{readback_texture, ImageTexture};
use super::EngineError;

/// Colour target in `Engine::COLOR_PIXEL_FORMAT` that frames are drawn into.
pub struct OffscreenTarget {
    target: ImageTexture,
}

impl OffscreenTarget {
    pub fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let target = ImageTexture::create(
            device,
            width.max(1),
            height.max(1),
            Engine::COLOR_PIXEL_FORMAT,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            "offscreen_target",
        );
        Self { target }
    }

    /// Reallocate if the size changed.  Contents are discarded.
    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        if self.size() != [width.max(1), height.max(1)] {
            *self = Self::new(device, width, height);
        }
    }

    pub fn size(&self) -> [u32; 2] {
        [self.target.width, self.target.height]
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.target.view
    }

    /// Blocking readback of the last frame as BGRA bytes.
    pub fn read_pixels(&self, ctx: &GpuContext) -> Result<Vec<u8>, EngineError> {
        readback_texture(ctx, &self.target.texture, self.target.width, self.target.height)
    }
}

/// Encode and submit one frame: compute pass, then a render pass cleared to
/// `engine.clear_color()`.  The target follows the engine's viewport size.
pub fn render_frame(engine: &Engine, target: &mut OffscreenTarget) {
    let [w, h] = engine.viewport_size();
    target.resize(engine.device(), w, h);

    let mut encoder = engine.device().create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("frame_encoder"),
    });

    engine.compute(&mut encoder);

    {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("frame_render_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target.view(),
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(engine.clear_color()),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        engine.render(&mut pass);
    }

    engine.context().submit_one(encoder);
}
