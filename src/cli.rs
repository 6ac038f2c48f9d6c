// ============================================================================
// vox-compute CLI — headless batch processing of TGA files
// ============================================================================
//
// Usage examples:
//   vox-compute -i photo.tga -o gray.png
//   vox-compute -i shots/*.tga --output-dir out/ --format tga
//   vox-compute -i photo.tga -o frame.png --mode render --width 800 --height 600
//   vox-compute -i photo.tga -o gray.tga --cpu
//
// `compute` writes the grayscale output texture at image resolution.
// `render` draws a full frame (compute → quad) into a viewport-sized target.
// Without a usable GPU, compute mode falls back to the rayon CPU path.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::{Parser, ValueEnum};

use crate::gpu::{render_frame, Engine, GpuContext, OffscreenTarget};
use crate::settings::EngineSettings;
use crate::tga::TgaImage;
use crate::{cpu, log_err, log_info, log_warn, logger};

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// GPU grayscale processor for uncompressed TGA images.
#[derive(Parser, Debug)]
#[command(
    name = "vox-compute",
    about = "GPU grayscale compute + render for uncompressed TGA images",
    long_about = "Load uncompressed true-colour TGA files, run the grayscale compute\n\
                  kernel, and write the result as PNG or TGA.\n\n\
                  Example:\n  \
                  vox-compute -i photo.tga -o gray.png\n  \
                  vox-compute -i *.tga --output-dir out/ --mode render --width 800 --height 600"
)]
pub struct CliArgs {
    /// Input TGA file(s). Glob patterns accepted (e.g. "*.tga").
    #[arg(short, long, required = true, num_args = 1..)]
    pub input: Vec<String>,

    /// Output file path. Only valid for single-file input.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory for batch processing.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Output format: png or tga. Inferred from --output's extension when omitted.
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// What to write: the compute output, or a rendered frame.
    #[arg(short, long, value_enum, default_value_t = Mode::Compute)]
    pub mode: Mode,

    /// Viewport width for render mode (defaults to the image width).
    #[arg(long)]
    pub width: Option<u32>,

    /// Viewport height for render mode (defaults to the image height).
    #[arg(long)]
    pub height: Option<u32>,

    /// Skip the GPU and use the CPU path (compute mode only).
    #[arg(long)]
    pub cpu: bool,

    /// Settings file to use instead of the default location.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Echo log output and print per-file timing.
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    Compute,
    Render,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Png,
    Tga,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Tga => "tga",
        }
    }
}

// ============================================================================
// Processing backends
// ============================================================================

/// GPU resources reused across every file of a batch.
struct GpuState {
    context: GpuContext,
    engine: Option<Engine>,
    target: Option<OffscreenTarget>,
}

enum Backend {
    Gpu(GpuState),
    Cpu,
}

impl Backend {
    fn select(args: &CliArgs, settings: &EngineSettings) -> Result<Self, String> {
        if args.cpu {
            if args.mode == Mode::Render {
                return Err("--cpu only applies to --mode compute".to_string());
            }
            return Ok(Backend::Cpu);
        }
        match GpuContext::new(&settings.preferred_gpu) {
            Ok(context) => {
                log_info!("GPU: {}", context.adapter_name);
                Ok(Backend::Gpu(GpuState { context, engine: None, target: None }))
            }
            Err(e) if args.mode == Mode::Compute => {
                log_warn!("GPU unavailable ({}), using CPU path", e);
                Ok(Backend::Cpu)
            }
            Err(e) => Err(format!("render mode needs a GPU: {}", e)),
        }
    }
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run all CLI processing and return an OS exit code.
/// `0` = all files succeeded, `1` = one or more files failed.
pub fn run(args: CliArgs) -> ExitCode {
    logger::set_echo(args.verbose);

    let settings = match &args.config {
        Some(path) => EngineSettings::load_from(path),
        None => EngineSettings::load(),
    };

    let inputs = resolve_inputs(&args.input);
    if inputs.is_empty() {
        eprintln!("error: no input files matched the given pattern(s).");
        return ExitCode::FAILURE;
    }

    if inputs.len() > 1 && args.output.is_some() && args.output_dir.is_none() {
        eprintln!(
            "error: {} input files given but --output only accepts a single file path.\n\
             Use --output-dir to specify a destination directory for batch processing.",
            inputs.len()
        );
        return ExitCode::FAILURE;
    }

    let format = parse_format(args.format.as_deref(), args.output.as_deref());

    if let Some(dir) = &args.output_dir
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        eprintln!("error: could not create output directory '{}': {}", dir.display(), e);
        return ExitCode::FAILURE;
    }

    let mut backend = match Backend::select(&args, &settings) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let total = inputs.len();
    let multi = total > 1;
    let mut any_failure = false;

    for (idx, input_path) in inputs.iter().enumerate() {
        if multi || args.verbose {
            println!("[{}/{}] {}", idx + 1, total, input_path.display());
        }
        let file_start = Instant::now();

        let Some(output_path) =
            build_output_path(input_path, args.output.as_deref(), args.output_dir.as_deref(), format)
        else {
            eprintln!("  error: cannot determine output path for '{}'.", input_path.display());
            any_failure = true;
            continue;
        };

        match run_one(input_path, &output_path, format, &args, &settings, &mut backend) {
            Ok(()) => {
                if args.verbose || multi {
                    println!(
                        "  → {} ({:.0}ms)",
                        output_path.display(),
                        file_start.elapsed().as_secs_f64() * 1000.0
                    );
                }
            }
            Err(e) => {
                log_err!("{}: {}", input_path.display(), e);
                eprintln!("  error: {}", e);
                any_failure = true;
            }
        }
    }

    if any_failure { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

// ============================================================================
// Per-file processing pipeline
// ============================================================================

fn run_one(
    input: &Path,
    output: &Path,
    format: OutputFormat,
    args: &CliArgs,
    settings: &EngineSettings,
    backend: &mut Backend,
) -> Result<(), String> {
    // -- Step 1: Load ----------------------------------------------------
    let image = TgaImage::open(input).map_err(|e| format!("load failed: {}", e))?;

    // -- Step 2: Process -------------------------------------------------
    let result = match backend {
        Backend::Cpu => cpu::grayscale(&image).map_err(|e| e.to_string())?,
        Backend::Gpu(state) => process_gpu(state, &image, args, settings)?,
    };

    // -- Step 3: Save ----------------------------------------------------
    write_output(&result, output, format)
}

fn process_gpu(
    state: &mut GpuState,
    image: &TgaImage,
    args: &CliArgs,
    settings: &EngineSettings,
) -> Result<TgaImage, String> {
    match state.engine.as_mut() {
        Some(engine) => engine.set_image(image).map_err(|e| e.to_string())?,
        None => {
            let engine = Engine::new(state.context.clone(), image, settings).map_err(|e| e.to_string())?;
            state.engine = Some(engine);
        }
    }
    let engine = state
        .engine
        .as_mut()
        .ok_or_else(|| "engine unavailable".to_string())?;

    match args.mode {
        Mode::Compute => {
            let mut encoder = engine.device().create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("cli_compute"),
            });
            engine.compute(&mut encoder);
            engine.context().submit_one(encoder);
            let rgba = engine.read_output().map_err(|e| e.to_string())?;
            let [w, h] = engine.image_size();
            TgaImage::from_bgra(w, h, swap_red_blue(rgba)).map_err(|e| e.to_string())
        }
        Mode::Render => {
            let [vw, vh] = viewport_for(engine.image_size(), args.width, args.height);
            engine.try_resize(vw, vh).map_err(|e| e.to_string())?;
            let target = state
                .target
                .get_or_insert_with(|| OffscreenTarget::new(engine.device(), vw, vh));
            render_frame(engine, target);
            let bgra = target.read_pixels(engine.context()).map_err(|e| e.to_string())?;
            let [tw, th] = target.size();
            TgaImage::from_bgra(tw, th, bgra).map_err(|e| e.to_string())
        }
    }
}

fn write_output(image: &TgaImage, output: &Path, format: OutputFormat) -> Result<(), String> {
    match format {
        OutputFormat::Tga => image.save(output).map_err(|e| format!("save failed: {}", e)),
        OutputFormat::Png => {
            let rgba = image::RgbaImage::from_raw(image.width(), image.height(), image.to_rgba())
                .ok_or_else(|| "pixel buffer does not match image size".to_string())?;
            rgba.save_with_format(output, image::ImageFormat::Png)
                .map_err(|e| format!("save failed: {}", e))
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn swap_red_blue(mut pixels: Vec<u8>) -> Vec<u8> {
    for px in pixels.chunks_exact_mut(4) {
        px.swap(0, 2);
    }
    pixels
}

/// Viewport for render mode; missing dimensions come from the image.
fn viewport_for(image: [u32; 2], width: Option<u32>, height: Option<u32>) -> [u32; 2] {
    [
        width.filter(|w| *w > 0).unwrap_or(image[0]),
        height.filter(|h| *h > 0).unwrap_or(image[1]),
    ]
}

/// Expand every pattern and keep the first occurrence of each file.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();
    for path in patterns.iter().flat_map(|p| expand_pattern(p)) {
        if !result.contains(&path) {
            result.push(path);
        }
    }
    result
}

/// A literal file path, or the files a glob matches in glob order.
/// Directories are never inputs.
fn expand_pattern(pattern: &str) -> Vec<PathBuf> {
    let literal = Path::new(pattern);
    if literal.is_file() {
        return vec![literal.to_path_buf()];
    }

    let entries = match glob::glob(pattern) {
        Ok(entries) => entries,
        Err(e) => {
            eprintln!("warning: invalid glob '{}': {}", pattern, e);
            return Vec::new();
        }
    };
    let files: Vec<PathBuf> = entries.flatten().filter(|p| p.is_file()).collect();
    if files.is_empty() {
        eprintln!("warning: pattern '{}' matched no files.", pattern);
    }
    files
}

/// Choose the output format from `--format` or the output extension.
/// Defaults to PNG.
fn parse_format(format_arg: Option<&str>, output: Option<&Path>) -> OutputFormat {
    let name = match (format_arg, output) {
        (Some(f), _) => f.to_lowercase(),
        (None, Some(out)) => out
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase(),
        (None, None) => String::new(),
    };
    match name.as_str() {
        "tga" => OutputFormat::Tga,
        _ => OutputFormat::Png,
    }
}

/// Compute the output path for a single input file.
///
/// Priority:
/// 1. `--output` (explicit path, used for single-file input)
/// 2. `--output-dir` (batch directory, derives filename from input stem)
/// 3. Fallback: next to the input with a `_gray` suffix
fn build_output_path(
    input: &Path,
    output: Option<&Path>,
    output_dir: Option<&Path>,
    format: OutputFormat,
) -> Option<PathBuf> {
    if let Some(out) = output {
        return Some(out.to_path_buf());
    }

    let ext = format.extension();
    let stem = input.file_stem()?.to_string_lossy().into_owned();

    if let Some(dir) = output_dir {
        return Some(dir.join(format!("{}.{}", stem, ext)));
    }

    let parent = input.parent().unwrap_or(Path::new("."));
    Some(parent.join(format!("{}_gray.{}", stem, ext)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_prefers_flag_then_extension() {
        assert_eq!(parse_format(Some("TGA"), Some(Path::new("x.png"))), OutputFormat::Tga);
        assert_eq!(parse_format(None, Some(Path::new("x.tga"))), OutputFormat::Tga);
        assert_eq!(parse_format(None, Some(Path::new("x.bmp"))), OutputFormat::Png);
        assert_eq!(parse_format(None, None), OutputFormat::Png);
    }

    #[test]
    fn output_path_priority() {
        let input = Path::new("shots/a.tga");
        assert_eq!(
            build_output_path(input, Some(Path::new("o.png")), Some(Path::new("d")), OutputFormat::Png),
            Some(PathBuf::from("o.png"))
        );
        assert_eq!(
            build_output_path(input, None, Some(Path::new("d")), OutputFormat::Tga),
            Some(PathBuf::from("d/a.tga"))
        );
        assert_eq!(
            build_output_path(input, None, None, OutputFormat::Tga),
            Some(PathBuf::from("shots/a_gray.tga"))
        );
    }

    #[test]
    fn viewport_falls_back_to_image() {
        assert_eq!(viewport_for([40, 30], None, None), [40, 30]);
        assert_eq!(viewport_for([40, 30], Some(800), None), [800, 30]);
        assert_eq!(viewport_for([40, 30], Some(0), Some(600)), [40, 600]);
    }

    #[test]
    fn red_blue_swap() {
        assert_eq!(swap_red_blue(vec![1, 2, 3, 4, 5, 6, 7, 8]), vec![3, 2, 1, 4, 7, 6, 5, 8]);
    }

    #[test]
    fn args_parse() {
        let args = CliArgs::parse_from([
            "vox-compute", "-i", "a.tga", "b.tga", "--mode", "render", "--width", "320",
        ]);
        assert_eq!(args.input, vec!["a.tga", "b.tga"]);
        assert_eq!(args.mode, Mode::Render);
        assert_eq!(args.width, Some(320));
        assert!(!args.cpu);
    }

    #[test]
    fn cpu_render_is_rejected() {
        let args = CliArgs::parse_from(["vox-compute", "-i", "a.tga", "--cpu", "--mode", "render"]);
        assert!(Backend::select(&args, &EngineSettings::default()).is_err());
    }

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("vox_compute_cli_{}_{}", tag, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// Parse `vox-compute -i <args>`.
    fn cli(args: &[&str]) -> CliArgs {
        CliArgs::parse_from(["vox-compute", "-i"].into_iter().chain(args.iter().copied()))
    }

    fn path_arg(p: &Path) -> String {
        p.to_str().unwrap().to_string()
    }

    #[test]
    fn inputs_are_deduplicated_files() {
        let dir = scratch_dir("inputs");
        let a = dir.join("a.tga");
        let b = dir.join("b.tga");
        std::fs::write(&a, b"").unwrap();
        std::fs::write(&b, b"").unwrap();
        std::fs::create_dir_all(dir.join("c.tga")).unwrap();

        let pattern = path_arg(&dir.join("*.tga"));
        let inputs = resolve_inputs(&[path_arg(&b), pattern, path_arg(&dir.join("nothing_*.tga"))]);
        assert_eq!(inputs, vec![b, a]);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn cpu_batch_writes_gray_tga() {
        let dir = std::env::temp_dir().join(format!("vox_compute_cli_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let input = dir.join("in.tga");
        let output = dir.join("out.tga");
        TgaImage::from_bgra(2, 1, vec![0, 0, 255, 255, 255, 255, 255, 255])
            .unwrap()
            .save(&input)
            .unwrap();

        let args = CliArgs::parse_from([
            "vox-compute",
            "-i",
            input.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
            "--cpu",
        ]);
        assert_eq!(run(args), ExitCode::SUCCESS);

        let gray = TgaImage::open(&output).unwrap();
        assert_eq!(gray.data(), &[54, 54, 54, 255, 255, 255, 255, 255]);
        let _ = std::fs::remove_dir_all(&dir);
    }

    fn assert_gray(img: &TgaImage, expected: Option<u8>) {
        for px in img.data().chunks_exact(4) {
            assert_eq!(px[0], px[1]);
            assert_eq!(px[1], px[2]);
            assert_eq!(px[3], 255);
            if let Some(y) = expected {
                assert!((px[0] as i32 - y as i32).abs() <= 1, "gray {} vs {}", px[0], y);
            }
        }
    }

    #[test]
    fn gpu_batch_reuses_engine_across_sizes() {
        if let Err(e) = GpuContext::new("") {
            eprintln!("skipping GPU test: {e}");
            return;
        }
        let dir = scratch_dir("gpu");
        let red = dir.join("red.tga");
        let green = dir.join("green.tga");
        TgaImage::from_bgra(3, 2, [0, 0, 255, 255].repeat(6)).unwrap().save(&red).unwrap();
        TgaImage::from_bgra(5, 4, [0, 255, 0, 255].repeat(20)).unwrap().save(&green).unwrap();
        let config = path_arg(&dir.join("absent.cfg"));
        let inputs = [path_arg(&red), path_arg(&green)];

        // Compute mode writes the kernel output at image resolution
        let out = dir.join("compute");
        let args = cli(&[
            &inputs[0], &inputs[1], "--format", "tga", "--config", &config,
            "--output-dir", &path_arg(&out),
        ]);
        assert_eq!(run(args), ExitCode::SUCCESS);
        let r = TgaImage::open(out.join("red.tga")).unwrap();
        let g = TgaImage::open(out.join("green.tga")).unwrap();
        assert_eq!((r.width(), r.height()), (3, 2));
        assert_eq!((g.width(), g.height()), (5, 4));
        assert_gray(&r, Some(54));
        assert_gray(&g, Some(182));

        // Render mode writes a viewport-sized frame with clear colour borders
        let out = dir.join("render");
        let args = cli(&[
            &inputs[0], &inputs[1], "--format", "tga", "--config", &config,
            "--mode", "render", "--width", "32", "--height", "24", "--output-dir", &path_arg(&out),
        ]);
        assert_eq!(run(args), ExitCode::SUCCESS);
        for name in ["red.tga", "green.tga"] {
            let frame = TgaImage::open(out.join(name)).unwrap();
            assert_eq!((frame.width(), frame.height()), (32, 24));
            assert_gray(&frame, None);
            assert_eq!(&frame.data()[..4], &[0, 0, 0, 255]);
            let center = (12 * 32 + 16) * 4;
            assert!(frame.data()[center] > 0);
        }

        // A viewport no device can back is a per-file failure, not a panic
        let args = cli(&[
            &inputs[0], "--config", &config, "--mode", "render",
            "--width", "1000000", "-o", &path_arg(&dir.join("huge.png")),
        ]);
        assert_eq!(run(args), ExitCode::FAILURE);
        assert!(!dir.join("huge.png").exists());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
