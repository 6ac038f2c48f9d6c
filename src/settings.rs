// ============================================================================
// ENGINE SETTINGS — persistent key=value configuration
// ============================================================================

use std::path::{Path, PathBuf};

const FILE_NAME: &str = "vox_compute.cfg";

/// How the processed image is sized inside the viewport.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QuadFit {
    /// One image pixel per viewport pixel, centred.
    Native,
    /// Largest size that fits the viewport while keeping the aspect ratio.
    Contain,
}

/// Sampler filter used when drawing the output texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SampleFilter {
    Linear,
    Nearest,
}

impl SampleFilter {
    pub fn to_wgpu(self) -> wgpu::FilterMode {
        match self {
            SampleFilter::Linear => wgpu::FilterMode::Linear,
            SampleFilter::Nearest => wgpu::FilterMode::Nearest,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct EngineSettings {
    /// "high performance", "low power", or empty for the default.
    pub preferred_gpu: String,
    pub threadgroup_width: u32,
    pub threadgroup_height: u32,
    pub quad_fit: QuadFit,
    pub filter: SampleFilter,
    /// Render pass clear colour (r, g, b, a).
    pub clear_color: [f64; 4],
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            preferred_gpu: String::new(),
            threadgroup_width: 16,
            threadgroup_height: 16,
            quad_fit: QuadFit::Contain,
            filter: SampleFilter::Linear,
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

impl EngineSettings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/vox-compute/vox_compute.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\vox-compute\vox_compute.cfg
    /// On macOS:   ~/Library/Application Support/vox-compute/vox_compute.cfg
    /// Fallback:   same directory as the executable.
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
                    PathBuf::from(home).join(".config")
                })
                .join("vox-compute");
            return Some(config_dir.join(FILE_NAME));
        }
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA").or_else(|_| std::env::var("USERPROFILE")).ok()?;
            return Some(PathBuf::from(appdata).join("vox-compute").join(FILE_NAME));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
            return Some(
                PathBuf::from(home)
                    .join("Library")
                    .join("Application Support")
                    .join("vox-compute")
                    .join(FILE_NAME),
            );
        }
        #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
        {
            std::env::current_exe().ok().and_then(|p| p.parent().map(|d| d.join(FILE_NAME)))
        }
    }

    /// Load from the default location (defaults if missing or unreadable).
    pub fn load() -> Self {
        match Self::settings_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Load from an explicit file (defaults if missing or unreadable).
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(&content),
            Err(_) => Self::default(),
        }
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_config_string())
    }

    /// Parse `key=value` lines.  Unknown keys are skipped; malformed values
    /// keep their defaults.
    pub fn parse(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let line = line.trim();
            if line.starts_with('#') {
                continue;
            }
            let Some((key, val)) = line.split_once('=') else { continue };
            let val = val.trim();
            match key.trim() {
                "preferred_gpu" => {
                    s.preferred_gpu = val.to_string();
                }
                "threadgroup_width" => {
                    s.threadgroup_width = parse_dim(val).unwrap_or(s.threadgroup_width);
                }
                "threadgroup_height" => {
                    s.threadgroup_height = parse_dim(val).unwrap_or(s.threadgroup_height);
                }
                "quad_fit" => {
                    s.quad_fit = match val {
                        "native" => QuadFit::Native,
                        _ => QuadFit::Contain,
                    };
                }
                "filter" => {
                    s.filter = match val {
                        "nearest" => SampleFilter::Nearest,
                        _ => SampleFilter::Linear,
                    };
                }
                "clear_color" => {
                    if let Some(c) = str_to_color(val) {
                        s.clear_color = c;
                    }
                }
                _ => {}
            }
        }
        s
    }

    pub fn to_config_string(&self) -> String {
        let fit = match self.quad_fit {
            QuadFit::Native => "native",
            QuadFit::Contain => "contain",
        };
        let filter = match self.filter {
            SampleFilter::Linear => "linear",
            SampleFilter::Nearest => "nearest",
        };
        let [r, g, b, a] = self.clear_color;
        format!(
            "preferred_gpu={}\n\
             threadgroup_width={}\n\
             threadgroup_height={}\n\
             quad_fit={fit}\n\
             filter={filter}\n\
             clear_color={r},{g},{b},{a}\n",
            self.preferred_gpu, self.threadgroup_width, self.threadgroup_height,
        )
    }
}

fn parse_dim(val: &str) -> Option<u32> {
    val.parse::<u32>().ok().filter(|v| *v > 0)
}

/// Parse "r,g,b,a" with components in 0..=1.
fn str_to_color(s: &str) -> Option<[f64; 4]> {
    let parts: Vec<&str> = s.split(',').collect();
    if parts.len() != 4 {
        return None;
    }
    let mut out = [0.0; 4];
    for (slot, part) in out.iter_mut().zip(parts) {
        let v = part.trim().parse::<f64>().ok()?;
        if !(0.0..=1.0).contains(&v) {
            return None;
        }
        *slot = v;
    }
    Some(out)
}
