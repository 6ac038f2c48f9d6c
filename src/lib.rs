// vox-compute — GPU grayscale compute + render engine with a minimal TGA loader.
//
//   tga       — uncompressed true-colour TGA decode/encode
//   gpu       — wgpu context, kernels, Engine, offscreen frame driver
//   cpu       — rayon reference of the compute kernel
//   settings  — key=value configuration file
//   logger    — session log + log_info!/log_warn!/log_err!
//   cli       — headless batch driver

pub mod logger;
pub mod settings;
pub mod tga;
pub mod cpu;
pub mod gpu;
pub mod cli;

pub use gpu::{Engine, EngineError, GpuContext, ImageSource};
pub use settings::EngineSettings;
pub use tga::{TgaError, TgaImage};
