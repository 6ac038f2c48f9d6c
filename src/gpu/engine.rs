// ============================================================================
// ENGINE — grayscale compute pass + textured-quad render pass
// ============================================================================
//
// Per frame the caller encodes `compute` (input → output texture) and then
// `render` (output texture → colour target) into its own encoder, and
// submits to `command_queue()`.  Queue order keeps the two passes ordered.

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use super::context::GpuContext;
use super::shaders;
use super::texture::ImageTexture;
use super::{EngineError, ImageSource};
use crate::settings::{EngineSettings, QuadFit};

// ============================================================================
// DISPATCH SIZING
// ============================================================================

/// Invocations per workgroup in x and y (z is always 1).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ThreadgroupSize {
    pub x: u32,
    pub y: u32,
}

impl ThreadgroupSize {
    pub fn total(&self) -> u64 {
        self.x as u64 * self.y as u64
    }

    /// Reject sizes the device would refuse at pipeline creation.
    pub fn validate(&self, limits: &wgpu::Limits) -> Result<(), EngineError> {
        let max_x = limits.max_compute_workgroup_size_x;
        let max_y = limits.max_compute_workgroup_size_y;
        let max_invocations = limits.max_compute_invocations_per_workgroup;
        let ok = self.x > 0
            && self.y > 0
            && self.x <= max_x
            && self.y <= max_y
            && self.total() <= max_invocations as u64;
        if ok {
            Ok(())
        } else {
            Err(EngineError::ThreadgroupTooLarge {
                x: self.x,
                y: self.y,
                max_x,
                max_y,
                max_invocations,
            })
        }
    }
}

/// Number of workgroups dispatched per compute pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ThreadgroupCount {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl ThreadgroupCount {
    /// Smallest grid of `size` workgroups that covers a `width` x `height`
    /// image.  The kernel discards the overhang.
    pub fn covering(size: ThreadgroupSize, width: u32, height: u32) -> Self {
        Self {
            x: width.div_ceil(size.x),
            y: height.div_ceil(size.y),
            z: 1,
        }
    }
}

// ============================================================================
// UNIFORMS
// ============================================================================

/// Quad placement, uploaded as a uniform buffer.  Layout matches
/// `QuadUniforms` in `QUAD_SHADER`.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct QuadUniforms {
    pub viewport_size: [f32; 2],
    pub image_size: [f32; 2],
    pub scale: f32,
    pub _pad: [f32; 3],
}

impl QuadUniforms {
    pub fn new(viewport: [u32; 2], image: [u32; 2], fit: QuadFit) -> Self {
        let [vw, vh] = viewport.map(|v| v as f32);
        let [iw, ih] = image.map(|v| v as f32);
        let scale = match fit {
            QuadFit::Native => 1.0,
            QuadFit::Contain => (vw / iw).min(vh / ih),
        };
        Self {
            viewport_size: [vw, vh],
            image_size: [iw, ih],
            scale,
            _pad: [0.0; 3],
        }
    }
}

// ============================================================================
// ENGINE
// ============================================================================

pub struct Engine {
    context: GpuContext,

    compute_pipeline: wgpu::ComputePipeline,
    compute_bgl: wgpu::BindGroupLayout,
    compute_bind_group: wgpu::BindGroup,

    render_pipeline: wgpu::RenderPipeline,
    render_bgl: wgpu::BindGroupLayout,
    render_bind_group: wgpu::BindGroup,
    sampler: wgpu::Sampler,
    uniform_buffer: wgpu::Buffer,

    /// Source for image processing.
    input_texture: ImageTexture,
    /// Written by the compute pass, sampled by the render pass.
    output_texture: ImageTexture,

    viewport_size: [u32; 2],
    threadgroup_size: ThreadgroupSize,
    threadgroup_count: ThreadgroupCount,
    quad_fit: QuadFit,
    clear_color: wgpu::Color,
}

impl Engine {
    /// Format of the colour target `render` draws into.
    pub const COLOR_PIXEL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Bgra8UnormSrgb;

    /// Acquire a GPU context from `settings.preferred_gpu` and build the engine.
    pub fn with_settings<S: ImageSource + ?Sized>(
        source: &S,
        settings: &EngineSettings,
    ) -> Result<Self, EngineError> {
        let context = GpuContext::new(&settings.preferred_gpu)?;
        Self::new(context, source, settings)
    }

    pub fn new<S: ImageSource + ?Sized>(
        context: GpuContext,
        source: &S,
        settings: &EngineSettings,
    ) -> Result<Self, EngineError> {
        validate_source(&context, source)?;

        let threadgroup_size = ThreadgroupSize {
            x: settings.threadgroup_width,
            y: settings.threadgroup_height,
        };
        threadgroup_size.validate(&context.limits)?;

        let device = &context.device;
        let (compute_pipeline, compute_bgl) = build_compute_pipeline(device, threadgroup_size);
        let (render_pipeline, render_bgl) = build_render_pipeline(device);

        let filter = settings.filter.to_wgpu();
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("quad_sampler"),
            mag_filter: filter,
            min_filter: filter,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let image = [source.width(), source.height()];
        let viewport_size = image;
        let uniforms = QuadUniforms::new(viewport_size, image, settings.quad_fit);
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("quad_uniforms"),
            contents: bytemuck::bytes_of(&uniforms),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let (input_texture, output_texture) = create_textures(&context, source);
        let compute_bind_group =
            create_compute_bind_group(device, &compute_bgl, &input_texture, &output_texture);
        let render_bind_group =
            create_render_bind_group(device, &render_bgl, &uniform_buffer, &output_texture, &sampler);

        let threadgroup_count = ThreadgroupCount::covering(threadgroup_size, image[0], image[1]);
        let [r, g, b, a] = settings.clear_color;

        crate::log_info!(
            "[Engine] {}x{} image, threadgroup {}x{}, dispatch {}x{}",
            image[0],
            image[1],
            threadgroup_size.x,
            threadgroup_size.y,
            threadgroup_count.x,
            threadgroup_count.y
        );

        Ok(Self {
            context,
            compute_pipeline,
            compute_bgl,
            compute_bind_group,
            render_pipeline,
            render_bgl,
            render_bind_group,
            sampler,
            uniform_buffer,
            input_texture,
            output_texture,
            viewport_size,
            threadgroup_size,
            threadgroup_count,
            quad_fit: settings.quad_fit,
            clear_color: wgpu::Color { r, g, b, a },
        })
    }

    /// Encode the grayscale pass.  Nothing runs until the encoder is submitted.
    pub fn compute(&self, encoder: &mut wgpu::CommandEncoder) {
        let count = self.threadgroup_count;
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("grayscale_pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.compute_pipeline);
        pass.set_bind_group(0, &self.compute_bind_group, &[]);
        pass.dispatch_workgroups(count.x, count.y, count.z);
    }

    /// Encode the quad draw into an active render pass whose colour target
    /// is `COLOR_PIXEL_FORMAT` and at least `viewport_size()` large.
    pub fn render<'a>(&'a self, pass: &mut wgpu::RenderPass<'a>) {
        let [w, h] = self.viewport_size;
        pass.set_viewport(0.0, 0.0, w as f32, h as f32, 0.0, 1.0);
        pass.set_pipeline(&self.render_pipeline);
        pass.set_bind_group(0, &self.render_bind_group, &[]);
        pass.draw(0..6, 0..1);
    }

    /// Update the viewport used by `render`.  Sizes the device cannot
    /// back with a colour target (zero for a minimised window, or beyond
    /// `max_texture_dimension_2d`) are ignored and the previous size kept.
    pub fn resize(&mut self, width: u32, height: u32) {
        if let Err(e) = self.try_resize(width, height) {
            crate::log_warn!("[Engine] Ignoring resize: {}", e);
        }
    }

    /// `resize` that reports a rejected size instead of logging it.
    pub fn try_resize(&mut self, width: u32, height: u32) -> Result<(), EngineError> {
        let max = self.context.limits.max_texture_dimension_2d;
        if width == 0 || height == 0 || width > max || height > max {
            return Err(EngineError::InvalidViewport { width, height, max });
        }
        self.viewport_size = [width, height];
        self.write_uniforms();
        Ok(())
    }

    /// Replace the source image, reallocating both textures at its extent.
    pub fn set_image<S: ImageSource + ?Sized>(&mut self, source: &S) -> Result<(), EngineError> {
        validate_source(&self.context, source)?;

        let (input_texture, output_texture) = create_textures(&self.context, source);
        let device = &self.context.device;
        self.compute_bind_group =
            create_compute_bind_group(device, &self.compute_bgl, &input_texture, &output_texture);
        self.render_bind_group = create_render_bind_group(
            device,
            &self.render_bgl,
            &self.uniform_buffer,
            &output_texture,
            &self.sampler,
        );
        self.input_texture = input_texture;
        self.output_texture = output_texture;
        self.threadgroup_count =
            ThreadgroupCount::covering(self.threadgroup_size, source.width(), source.height());
        self.write_uniforms();
        Ok(())
    }

    /// Blocking readback of the compute output as RGBA bytes.
    pub fn read_output(&self) -> Result<Vec<u8>, EngineError> {
        self.output_texture.read(&self.context)
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.context.device
    }

    pub fn command_queue(&self) -> &wgpu::Queue {
        &self.context.queue
    }

    pub fn color_pixel_format(&self) -> wgpu::TextureFormat {
        Self::COLOR_PIXEL_FORMAT
    }

    pub fn context(&self) -> &GpuContext {
        &self.context
    }

    pub fn viewport_size(&self) -> [u32; 2] {
        self.viewport_size
    }

    pub fn image_size(&self) -> [u32; 2] {
        [self.input_texture.width, self.input_texture.height]
    }

    pub fn threadgroup_size(&self) -> ThreadgroupSize {
        self.threadgroup_size
    }

    pub fn threadgroup_count(&self) -> ThreadgroupCount {
        self.threadgroup_count
    }

    pub fn input_texture(&self) -> &ImageTexture {
        &self.input_texture
    }

    pub fn output_texture(&self) -> &ImageTexture {
        &self.output_texture
    }

    pub fn clear_color(&self) -> wgpu::Color {
        self.clear_color
    }

    /// Uniforms `render` currently draws with.
    pub fn quad_uniforms(&self) -> QuadUniforms {
        QuadUniforms::new(self.viewport_size, self.image_size(), self.quad_fit)
    }

    fn write_uniforms(&self) {
        let uniforms = self.quad_uniforms();
        self.context
            .queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));
    }
}

// ============================================================================
// CONSTRUCTION HELPERS
// ============================================================================

fn validate_source<S: ImageSource + ?Sized>(ctx: &GpuContext, source: &S) -> Result<(), EngineError> {
    let (width, height) = (source.width(), source.height());
    if width == 0 || height == 0 {
        return Err(EngineError::EmptySource);
    }
    if !ctx.supports_size(width, height) {
        return Err(EngineError::ImageTooLarge {
            width,
            height,
            max: ctx.limits.max_texture_dimension_2d,
        });
    }
    let expected = width as usize * height as usize * 4;
    if source.bgra().len() != expected {
        return Err(EngineError::SourceLength {
            expected,
            actual: source.bgra().len(),
        });
    }
    Ok(())
}

fn create_textures<S: ImageSource + ?Sized>(ctx: &GpuContext, source: &S) -> (ImageTexture, ImageTexture) {
    let (w, h) = (source.width(), source.height());
    let input = ImageTexture::from_bgra(&ctx.device, &ctx.queue, w, h, source.bgra(), "engine_input");
    let output = ImageTexture::storage(&ctx.device, w, h, "engine_output");
    (input, output)
}

fn build_compute_pipeline(
    device: &wgpu::Device,
    size: ThreadgroupSize,
) -> (wgpu::ComputePipeline, wgpu::BindGroupLayout) {
    let source = shaders::grayscale_shader(size.x, size.y);
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("grayscale_shader"),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });

    let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("grayscale_bgl"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: false },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::StorageTexture {
                    access: wgpu::StorageTextureAccess::WriteOnly,
                    format: wgpu::TextureFormat::Rgba8Unorm,
                    view_dimension: wgpu::TextureViewDimension::D2,
                },
                count: None,
            },
        ],
    });

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("grayscale_pipeline_layout"),
        bind_group_layouts: &[&bind_group_layout],
        push_constant_ranges: &[],
    });

    let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some("grayscale_pipeline"),
        layout: Some(&pipeline_layout),
        module: &shader,
        entry_point: "cs_grayscale",
        compilation_options: Default::default(),
    });

    (pipeline, bind_group_layout)
}

fn build_render_pipeline(device: &wgpu::Device) -> (wgpu::RenderPipeline, wgpu::BindGroupLayout) {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("quad_shader"),
        source: wgpu::ShaderSource::Wgsl(shaders::QUAD_SHADER.into()),
    });

    let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("quad_bgl"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
    });

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("quad_pipeline_layout"),
        bind_group_layouts: &[&bind_group_layout],
        push_constant_ranges: &[],
    });

    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("quad_pipeline"),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: "vs_quad",
            buffers: &[],
            compilation_options: Default::default(),
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            ..Default::default()
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: "fs_quad",
            targets: &[Some(wgpu::ColorTargetState {
                format: Engine::COLOR_PIXEL_FORMAT,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        multiview: None,
    });

    (pipeline, bind_group_layout)
}

fn create_compute_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    input: &ImageTexture,
    output: &ImageTexture,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("grayscale_bg"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&input.view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(&output.view),
            },
        ],
    })
}

fn create_render_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    uniforms: &wgpu::Buffer,
    output: &ImageTexture,
    sampler: &wgpu::Sampler,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("quad_bg"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: uniforms.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(&output.view),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threadgroup_count_rounds_up() {
        let size = ThreadgroupSize { x: 16, y: 16 };
        assert_eq!(
            ThreadgroupCount::covering(size, 33, 16),
            ThreadgroupCount { x: 3, y: 1, z: 1 }
        );
        assert_eq!(
            ThreadgroupCount::covering(size, 1, 1),
            ThreadgroupCount { x: 1, y: 1, z: 1 }
        );
    }

    #[test]
    fn threadgroup_limits_are_enforced() {
        let limits = wgpu::Limits::downlevel_defaults();
        assert_eq!(ThreadgroupSize { x: 16, y: 16 }.total(), 256);
        assert!(ThreadgroupSize { x: 16, y: 16 }.validate(&limits).is_ok());
        assert!(ThreadgroupSize { x: 32, y: 16 }.validate(&limits).is_err());
        assert!(ThreadgroupSize { x: 0, y: 8 }.validate(&limits).is_err());
        assert!(
            ThreadgroupSize { x: limits.max_compute_workgroup_size_x + 1, y: 1 }
                .validate(&limits)
                .is_err()
        );
        // Product past u32::MAX must not wrap into range
        let huge = ThreadgroupSize { x: 1 << 16, y: 1 << 16 };
        assert_eq!(huge.total(), 1 << 32);
        let mut generous = limits.clone();
        generous.max_compute_workgroup_size_x = u32::MAX;
        generous.max_compute_workgroup_size_y = u32::MAX;
        assert!(huge.validate(&generous).is_err());
    }

    #[test]
    fn contain_fit_preserves_aspect() {
        let u = QuadUniforms::new([800, 600], [400, 100], QuadFit::Contain);
        assert_eq!(u.scale, 2.0);
        assert_eq!(u.viewport_size, [800.0, 600.0]);
        assert_eq!(u.image_size, [400.0, 100.0]);

        let tall = QuadUniforms::new([800, 600], [100, 1200], QuadFit::Contain);
        assert_eq!(tall.scale, 0.5);
    }

    #[test]
    fn native_fit_is_one_to_one() {
        let u = QuadUniforms::new([64, 64], [4, 4], QuadFit::Native);
        assert_eq!(u.scale, 1.0);
    }

    #[test]
    fn uniform_block_is_32_bytes() {
        assert_eq!(std::mem::size_of::<QuadUniforms>(), 32);
    }
}
