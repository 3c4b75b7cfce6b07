// ============================================================================
// RasterPad CLI — headless batch processing via command-line arguments
// ============================================================================
//
// Usage examples:
//   rasterpad --input photo.png --invert --output result.png
//   rasterpad -i project.rpd -o flat.jpg --quality 85
//   rasterpad -i photo.jpg --brightness 20 --blur 1.5 -o out.png
//   rasterpad -i photo.png --format rpd -o project.rpd
//
// All processing runs synchronously on the current thread; rayon parallelism
// stays inside individual pixel loops.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use image::{DynamicImage, ImageFormat};

use crate::ops::{adjustments, filters};
use crate::project::{load_document, save_project};
use crate::selection::SelectionMask;
use crate::{log_err, log_info};

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// RasterPad headless image processor.
#[derive(Parser, Debug)]
#[command(
    name = "rasterpad",
    about = "RasterPad headless image processor",
    long_about = "Apply color adjustments and filters to images or RasterPad\n\
                  projects and export the flattened result — no GUI required.\n\n\
                  Example:\n  \
                  rasterpad --input photo.png --sepia --output result.png\n  \
                  rasterpad -i project.rpd -o flat.jpg --quality 85"
)]
pub struct CliArgs {
    /// Input file. RPD project files retain all layers; all other formats
    /// load as a single layer.
    #[arg(short, long, required = true)]
    pub input: PathBuf,

    /// Output file path.
    /// When omitted, the result is written next to the input with "_out"
    /// appended to the stem.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format: png, jpeg, bmp, rpd.
    /// When omitted, inferred from --output's extension, defaulting to png.
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// JPEG quality (1-100, default 90).
    #[arg(short, long, default_value_t = 90, value_name = "1-100")]
    pub quality: u8,

    /// Invert R, G, B on the active layer.
    #[arg(long)]
    pub invert: bool,

    /// Convert the active layer to grayscale (arithmetic channel mean).
    #[arg(long)]
    pub grayscale: bool,

    /// Apply the sepia tone matrix to the active layer.
    #[arg(long)]
    pub sepia: bool,

    /// Add VALUE to R, G, B (may be negative), clamped to [0, 255].
    #[arg(long, value_name = "VALUE", allow_hyphen_values = true)]
    pub brightness: Option<i32>,

    /// Rotate hue by DEGREES.
    #[arg(long, value_name = "DEGREES", allow_hyphen_values = true)]
    pub hue: Option<f32>,

    /// Gaussian blur with the given sigma.
    #[arg(long, value_name = "SIGMA")]
    pub blur: Option<f32>,

    /// Pixelate with the given block size.
    #[arg(long, value_name = "BLOCK")]
    pub pixelate: Option<u32>,

    /// Apply a 3x3 sharpen kernel.
    #[arg(long)]
    pub sharpen: bool,

    /// Print per-step timing information.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Output encoding chosen by `--format` or the output extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SaveFormat {
    Png,
    Jpeg,
    Bmp,
    Rpd,
}

impl SaveFormat {
    fn extension(self) -> &'static str {
        match self {
            SaveFormat::Png => "png",
            SaveFormat::Jpeg => "jpg",
            SaveFormat::Bmp => "bmp",
            SaveFormat::Rpd => "rpd",
        }
    }

    fn from_name(name: &str) -> Option<SaveFormat> {
        match name.to_lowercase().as_str() {
            "png" => Some(SaveFormat::Png),
            "jpeg" | "jpg" => Some(SaveFormat::Jpeg),
            "bmp" => Some(SaveFormat::Bmp),
            "rpd" => Some(SaveFormat::Rpd),
            _ => None,
        }
    }
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run CLI processing and return an OS exit code.
pub fn run(args: CliArgs) -> ExitCode {
    let format = parse_format(args.format.as_deref(), args.output.as_deref());
    let output = build_output_path(&args.input, args.output.as_deref(), format);
    let start = Instant::now();

    match run_one(&args, &output, format) {
        Ok(()) => {
            if args.verbose {
                println!(
                    "{} → {} ({:.0}ms)",
                    args.input.display(),
                    output.display(),
                    start.elapsed().as_secs_f64() * 1000.0
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            log_err!("CLI processing failed: {}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

// ============================================================================
// Per-file processing pipeline
// ============================================================================

fn run_one(args: &CliArgs, output: &Path, format: SaveFormat) -> Result<(), String> {
    // -- Step 1: Load ----------------------------------------------------
    let mut state = load_document(&args.input).map_err(|e| format!("load failed: {}", e))?;
    log_info!(
        "Loaded '{}': {}x{}, {} layer(s)",
        args.input.display(),
        state.width,
        state.height,
        state.layers.len()
    );
    if args.verbose {
        for info in state.layer_list() {
            println!(
                "  layer {}: '{}' {} opacity {:.2} {}{}",
                info.id,
                info.name,
                info.blend_mode.name(),
                info.opacity,
                if info.visible { "visible" } else { "hidden" },
                if info.active { " (active)" } else { "" },
            );
        }
    }

    // -- Step 2: Adjustments on the active layer -------------------------
    let mask = SelectionMask::new(state.width, state.height);
    if let Some(layer) = state.active_layer_mut() {
        if args.invert {
            adjustments::invert(layer, &mask);
        }
        if args.grayscale {
            adjustments::grayscale(layer, &mask);
        }
        if args.sepia {
            adjustments::sepia(layer, &mask);
        }
        if let Some(value) = args.brightness {
            adjustments::brightness(layer, &mask, value);
        }
        if let Some(degrees) = args.hue {
            adjustments::hue_shift(layer, &mask, degrees);
        }
        if args.sharpen {
            filters::convolve(layer, &filters::SHARPEN_KERNEL, &mask);
        }
        if let Some(block) = args.pixelate {
            filters::pixelate(layer, block, &mask);
        }
        if let Some(sigma) = args.blur {
            filters::gaussian_blur(layer, sigma, &mask);
        }
    }

    // -- Step 3: Save ----------------------------------------------------
    match format {
        SaveFormat::Rpd => {
            save_project(&state, output).map_err(|e| format!("project save failed: {}", e))?;
        }
        _ => {
            let flat = crate::compositor::flatten(&state).into_image();
            encode_and_write(flat, output, format, args.quality)
                .map_err(|e| format!("save failed: {}", e))?;
        }
    }
    Ok(())
}

fn encode_and_write(
    flat: image::RgbaImage,
    output: &Path,
    format: SaveFormat,
    quality: u8,
) -> Result<(), String> {
    match format {
        SaveFormat::Png => flat
            .save_with_format(output, ImageFormat::Png)
            .map_err(|e| e.to_string()),
        SaveFormat::Bmp => flat
            .save_with_format(output, ImageFormat::Bmp)
            .map_err(|e| e.to_string()),
        SaveFormat::Jpeg => {
            // JPEG carries no alpha: drop the alpha channel.
            let rgb = DynamicImage::ImageRgba8(flat).to_rgb8();
            let file = std::fs::File::create(output).map_err(|e| e.to_string())?;
            let writer = std::io::BufWriter::new(file);
            let mut encoder =
                image::codecs::jpeg::JpegEncoder::new_with_quality(writer, quality.clamp(1, 100));
            encoder
                .encode(rgb.as_raw(), rgb.width(), rgb.height(), image::ColorType::Rgb8)
                .map_err(|e| e.to_string())
        }
        SaveFormat::Rpd => unreachable!("RPD output is handled via save_project()"),
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Choose the [`SaveFormat`] from the `--format` string or infer it from the
/// output file extension. Defaults to PNG when neither is known.
fn parse_format(format_arg: Option<&str>, output: Option<&Path>) -> SaveFormat {
    if let Some(f) = format_arg.and_then(SaveFormat::from_name) {
        return f;
    }
    output
        .and_then(|p| p.extension())
        .and_then(|e| e.to_str())
        .and_then(SaveFormat::from_name)
        .unwrap_or(SaveFormat::Png)
}

/// Compute the output path: the explicit `--output` when given, otherwise the
/// input's stem with the target extension (plus `_out` if it would collide
/// with the input itself).
fn build_output_path(input: &Path, output: Option<&Path>, format: SaveFormat) -> PathBuf {
    if let Some(out) = output {
        return out.to_path_buf();
    }
    let ext = format.extension();
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let parent = input.parent().unwrap_or(Path::new("."));
    let candidate = parent.join(format!("{}.{}", stem, ext));
    if candidate == input {
        parent.join(format!("{}_out.{}", stem, ext))
    } else {
        candidate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_prefers_the_explicit_flag_over_the_extension() {
        let out = PathBuf::from("result.jpg");
        assert_eq!(parse_format(Some("png"), Some(&out)), SaveFormat::Png);
        assert_eq!(parse_format(None, Some(&out)), SaveFormat::Jpeg);
        assert_eq!(parse_format(None, None), SaveFormat::Png);
        assert_eq!(parse_format(Some("rpd"), None), SaveFormat::Rpd);
    }

    #[test]
    fn default_output_avoids_clobbering_the_input() {
        let input = PathBuf::from("dir/photo.png");
        let out = build_output_path(&input, None, SaveFormat::Png);
        assert_eq!(out, PathBuf::from("dir/photo_out.png"));
        let out = build_output_path(&input, None, SaveFormat::Jpeg);
        assert_eq!(out, PathBuf::from("dir/photo.jpg"));
    }

    #[test]
    fn explicit_output_wins() {
        let input = PathBuf::from("a.png");
        let explicit = PathBuf::from("b/c.bmp");
        assert_eq!(
            build_output_path(&input, Some(&explicit), SaveFormat::Png),
            explicit
        );
    }
}
