// ============================================================================
// GPU CONTEXT — wgpu Device, Queue, and adapter initialization
// ============================================================================

use std::sync::Arc;

use super::EngineError;

/// The device and command queue every engine resource is created from.
/// Cheap to clone; the handles are shared.
#[derive(Clone)]
pub struct GpuContext {
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
    pub adapter_name: String,
    /// Limits the device was created with.
    pub limits: wgpu::Limits,
}

impl GpuContext {
    /// Create a GPU context.  Tries a hardware adapter first, then falls
    /// back to a software rasterizer (`force_fallback_adapter`).
    ///
    /// We use `pollster::block_on` because wgpu's adapter and device
    /// requests are async and this crate drives them from synchronous code.
    pub fn new(preferred_gpu: &str) -> Result<Self, EngineError> {
        match pollster::block_on(Self::new_async(preferred_gpu, false)) {
            Ok(ctx) => return Ok(ctx),
            Err(EngineError::NoAdapter) => {}
            Err(e) => return Err(e),
        }
        crate::log_warn!("[GPU] Hardware adapter unavailable, trying software fallback");
        pollster::block_on(Self::new_async(preferred_gpu, true))
    }

    async fn new_async(preferred_gpu: &str, force_fallback: bool) -> Result<Self, EngineError> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let power = match preferred_gpu.to_lowercase().as_str() {
            "low power" | "integrated" => wgpu::PowerPreference::LowPower,
            _ => wgpu::PowerPreference::HighPerformance,
        };

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: power,
                compatible_surface: None, // headless: compute + offscreen only
                force_fallback_adapter: force_fallback,
            })
            .await
            .ok_or(EngineError::NoAdapter)?;

        let info = adapter.get_info();
        let caps = adapter.get_downlevel_capabilities();
        if !caps.flags.contains(wgpu::DownlevelFlags::COMPUTE_SHADERS) {
            return Err(EngineError::ComputeUnsupported { adapter: info.name });
        }

        let supported = adapter.limits();
        let limits = wgpu::Limits {
            max_texture_dimension_2d: supported.max_texture_dimension_2d,
            max_compute_workgroup_size_x: supported.max_compute_workgroup_size_x,
            max_compute_workgroup_size_y: supported.max_compute_workgroup_size_y,
            max_compute_workgroup_size_z: supported.max_compute_workgroup_size_z,
            max_compute_invocations_per_workgroup: supported.max_compute_invocations_per_workgroup,
            max_compute_workgroups_per_dimension: supported.max_compute_workgroups_per_dimension,
            ..wgpu::Limits::downlevel_defaults()
        };

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("vox-compute GPU"),
                    required_features: wgpu::Features::empty(),
                    required_limits: limits.clone(),
                },
                None,
            )
            .await
            .map_err(EngineError::DeviceRequest)?;

        crate::log_info!("[GPU] Using adapter {} ({:?}, {:?})", info.name, info.backend, info.device_type);

        Ok(Self {
            device: Arc::new(device),
            queue: Arc::new(queue),
            adapter_name: info.name,
            limits,
        })
    }

    /// Check if a texture of the given dimensions can be created.
    pub fn supports_size(&self, width: u32, height: u32) -> bool {
        let max = self.limits.max_texture_dimension_2d;
        width <= max && height <= max
    }

    /// Submit a single encoder's commands.
    pub fn submit_one(&self, encoder: wgpu::CommandEncoder) {
        self.queue.submit(std::iter::once(encoder.finish()));
    }
}
