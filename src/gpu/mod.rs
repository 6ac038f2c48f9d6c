// ============================================================================
// GPU MODULE — wgpu compute + render engine
// ============================================================================
//
// Architecture:
//   context.rs — wgpu Device, Queue, adapter init
//   shaders.rs — WGSL source for the grayscale kernel and the textured quad
//   texture.rs — ImageTexture wrapper with upload + readback
//   engine.rs  — Engine: pipelines, textures, dispatch sizing, viewport
//   frame.rs   — offscreen colour target driving compute → render per frame
// ============================================================================

use std::fmt;

pub mod context;
pub mod shaders;
pub mod texture;
pub mod engine;
pub mod frame;

pub use context::GpuContext;
pub use engine::{Engine, QuadUniforms, ThreadgroupCount, ThreadgroupSize};
pub use frame::{render_frame, OffscreenTarget};
pub use texture::ImageTexture;

/// Anything that can seed the engine's input texture.
///
/// Pixels are BGRA8, top row first, `width * height * 4` bytes.
pub trait ImageSource {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn bgra(&self) -> &[u8];
}

/// Errors from GPU initialization, pipeline setup and readback.
#[derive(Debug)]
pub enum EngineError {
    /// No adapter could be obtained, hardware or software.
    NoAdapter,
    /// The adapter cannot run compute shaders (e.g. a WebGL2-class backend).
    ComputeUnsupported { adapter: String },
    DeviceRequest(wgpu::RequestDeviceError),
    ImageTooLarge { width: u32, height: u32, max: u32 },
    /// Source image has a zero dimension.
    EmptySource,
    /// Source pixel buffer does not match its declared extent.
    SourceLength { expected: usize, actual: usize },
    /// Viewport is zero or larger than the device can render into.
    InvalidViewport { width: u32, height: u32, max: u32 },
    ThreadgroupTooLarge { x: u32, y: u32, max_x: u32, max_y: u32, max_invocations: u32 },
    Readback(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::NoAdapter => write!(f, "no GPU adapter available"),
            EngineError::ComputeUnsupported { adapter } => {
                write!(f, "adapter '{adapter}' does not support compute shaders")
            }
            EngineError::DeviceRequest(e) => write!(f, "device request failed: {e}"),
            EngineError::ImageTooLarge { width, height, max } => {
                write!(f, "image {width}x{height} exceeds the device limit of {max} pixels per side")
            }
            EngineError::EmptySource => write!(f, "source image is empty"),
            EngineError::SourceLength { expected, actual } => {
                write!(f, "source image has {actual} bytes, expected {expected}")
            }
            EngineError::InvalidViewport { width, height, max } => {
                write!(f, "viewport {width}x{height} is outside 1..={max} pixels per side")
            }
            EngineError::ThreadgroupTooLarge { x, y, max_x, max_y, max_invocations } => write!(
                f,
                "threadgroup {x}x{y} exceeds device limits ({max_x}x{max_y}, {max_invocations} invocations)"
            ),
            EngineError::Readback(msg) => write!(f, "readback failed: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::DeviceRequest(e) => Some(e),
            _ => None,
        }
    }
}
