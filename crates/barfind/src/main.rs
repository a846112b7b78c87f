//! barfind: find the barcode region in an image file and save a copy with
//! the region outlined.
//!
//! # Usage
//!
//! ```text
//! barfind --path shelf.jpg [--color 255:0:0] [--output out.png] [OPTIONS]
//! ```
//!
//! Every detection parameter has a flag; `--preset` picks the base set
//! and `--config-json` replaces all of them at once. `--diagnostics`
//! prints per-stage timings and counts, `--json` prints them as JSON.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use barfind_pipeline::diagnostics::Clock;
use barfind_pipeline::{
    BlurMethod, BorderColor, DetectionConfig, DetectionError, GradientOperator, KernelSize, Preset,
};
use clap::{Parser, ValueEnum};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Locate the barcode in an image and outline it with an oriented box.
#[derive(Parser, Debug)]
#[command(name = "barfind", version)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP, TIFF).
    #[arg(short = 'p', long = "path")]
    path: PathBuf,

    /// Border color as `r:g:b`.
    #[arg(short = 'c', long = "color", default_value_t = DetectionConfig::DEFAULT_BORDER_COLOR)]
    color: BorderColor,

    /// Where to write the annotated image [default: `<stem>-barcode.png`
    /// next to the input].
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Base parameter set.
    #[arg(long, value_enum, default_value_t = PresetArg::Gaussian)]
    preset: PresetArg,

    /// Derivative kernel (overrides the preset).
    #[arg(long, value_enum)]
    gradient: Option<GradientArg>,

    /// Blur method (overrides the preset).
    #[arg(long, value_enum)]
    blur: Option<BlurArg>,

    /// Blur kernel as `WxH` or `N`; sides must be odd.
    #[arg(long)]
    blur_kernel: Option<KernelSize>,

    /// Binarization cutoff (0-255).
    #[arg(long)]
    threshold: Option<u8>,

    /// Closing structuring element as `WxH` or `N`.
    #[arg(long)]
    closing_kernel: Option<KernelSize>,

    /// Number of 3x3 erosions, then dilations, used to drop small blobs.
    #[arg(long)]
    iterations: Option<u32>,

    /// Stroke width of the drawn box in pixels.
    #[arg(long)]
    stroke_width: Option<f32>,

    /// Full detection config as a JSON string.
    ///
    /// When provided, all other detection parameter flags (including
    /// `--color`) are ignored. Missing fields take their defaults.
    #[arg(long)]
    config_json: Option<String>,

    /// Print the per-stage diagnostics report.
    #[arg(long)]
    diagnostics: bool,

    /// Print diagnostics as JSON on stdout instead of the report.
    #[arg(long)]
    json: bool,

    /// Log filter (trace, debug, info, warn, error, or a directive list).
    #[arg(long, env = "RUST_LOG", default_value = "warn")]
    log_level: String,
}

/// Parameter set selection.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum PresetArg {
    /// Gaussian blur, threshold 237, 29x29 closing.
    Gaussian,
    /// Box blur, threshold 225, 21x7 closing.
    Box,
}

/// Derivative kernel selection.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum GradientArg {
    /// 3x3 Scharr.
    Scharr,
    /// 3x3 Sobel.
    Sobel,
}

/// Blur method selection.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum BlurArg {
    /// Unweighted mean.
    Box,
    /// Gaussian weights.
    Gaussian,
}

/// Errors the front end can report.
#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("error parsing --config-json: {0}")]
    ConfigJson(#[source] serde_json::Error),

    #[error("error serializing diagnostics: {0}")]
    Json(#[source] serde_json::Error),

    #[error("error reading {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("error writing {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error(transparent)]
    Detection(#[from] DetectionError),
}

/// Build a [`DetectionConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored. Otherwise the preset is taken
/// as the base and each given flag overrides its field.
fn config_from_cli(cli: &Cli) -> Result<DetectionConfig, CliError> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(CliError::ConfigJson);
    }

    let preset = match cli.preset {
        PresetArg::Gaussian => Preset::Gaussian,
        PresetArg::Box => Preset::Box,
    };
    let base = DetectionConfig::preset(preset);

    Ok(DetectionConfig {
        border_color: cli.color,
        gradient_operator: cli.gradient.map_or(base.gradient_operator, |g| match g {
            GradientArg::Scharr => GradientOperator::Scharr,
            GradientArg::Sobel => GradientOperator::Sobel,
        }),
        blur_method: cli.blur.map_or(base.blur_method, |b| match b {
            BlurArg::Box => BlurMethod::Box,
            BlurArg::Gaussian => BlurMethod::Gaussian,
        }),
        blur_kernel_size: cli.blur_kernel.unwrap_or(base.blur_kernel_size),
        threshold: cli.threshold.unwrap_or(base.threshold),
        closing_kernel_size: cli.closing_kernel.unwrap_or(base.closing_kernel_size),
        erode_dilate_iterations: cli.iterations.unwrap_or(base.erode_dilate_iterations),
        stroke_width: cli.stroke_width.unwrap_or(base.stroke_width),
    })
}

/// `<dir>/<stem>-barcode.png` for an input at `<dir>/<stem>.<ext>`.
fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map_or_else(|| "image".into(), |s| s.to_string_lossy());
    input.with_file_name(format!("{stem}-barcode.png"))
}

fn init_logging(filter: &str) {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run(cli: &Cli) -> Result<(), CliError> {
    let config = config_from_cli(cli)?;
    tracing::debug!(?config, "configuration");

    let bytes = std::fs::read(&cli.path).map_err(|source| CliError::Read {
        path: cli.path.clone(),
        source,
    })?;
    let image = barfind_pipeline::grayscale::decode(&bytes)?;
    tracing::info!(
        path = %cli.path.display(),
        width = image.width(),
        height = image.height(),
        "image loaded"
    );

    let (detection, diagnostics) =
        barfind_pipeline::detect_with_diagnostics(image, &config, &StdClock)?;

    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&cli.path));
    detection
        .annotated
        .save(&output)
        .map_err(|source| CliError::Write {
            path: output.clone(),
            source,
        })?;
    tracing::info!(path = %output.display(), "annotated image written");

    if cli.json {
        let json = serde_json::to_string_pretty(&diagnostics).map_err(CliError::Json)?;
        println!("{json}");
    } else if cli.diagnostics {
        println!("{}", diagnostics.report());
    } else {
        let corners: Vec<String> = detection
            .bounding_box
            .corners()
            .iter()
            .map(|p| format!("{},{}", p.x, p.y))
            .collect();
        println!("{} {}", output.display(), corners.join(" "));
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "detection failed");
            eprintln!("{e}");
            if cli.json {
                match failure_json(&e) {
                    Ok(json) => println!("{json}"),
                    Err(err) => eprintln!("error serializing failure: {err}"),
                }
            } else if cli.diagnostics {
                println!("detection failed: {e}");
            }
            ExitCode::FAILURE
        }
    }
}

/// Failure record for `--json` mode: the message plus, for detection
/// failures, the structured [`DetectionError`].
fn failure_json(error: &CliError) -> Result<String, serde_json::Error> {
    let detection = match error {
        CliError::Detection(e) => Some(e),
        _ => None,
    };
    serde_json::to_string_pretty(&serde_json::json!({
        "error": error.to_string(),
        "detection": detection,
    }))
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("barfind").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults_match_library_defaults() {
        let cli = parse(&["-p", "in.png"]);
        assert_eq!(config_from_cli(&cli).unwrap(), DetectionConfig::default());
    }

    #[test]
    fn box_preset_is_selectable() {
        let cli = parse(&["--path", "in.png", "--preset", "box"]);
        assert_eq!(
            config_from_cli(&cli).unwrap(),
            DetectionConfig::preset(Preset::Box)
        );
    }

    #[test]
    fn flags_override_the_preset() {
        let cli = parse(&[
            "-p",
            "in.png",
            "--preset",
            "box",
            "-c",
            "255:0:0",
            "--gradient",
            "sobel",
            "--blur",
            "gaussian",
            "--blur-kernel",
            "7x5",
            "--threshold",
            "200",
            "--closing-kernel",
            "31",
            "--iterations",
            "2",
            "--stroke-width",
            "1.5",
        ]);
        let config = config_from_cli(&cli).unwrap();
        assert_eq!(config.border_color, BorderColor::new(255, 0, 0));
        assert_eq!(config.gradient_operator, GradientOperator::Sobel);
        assert_eq!(config.blur_method, BlurMethod::Gaussian);
        assert_eq!(config.blur_kernel_size, KernelSize::new(7, 5));
        assert_eq!(config.threshold, 200);
        assert_eq!(config.closing_kernel_size, KernelSize::square(31));
        assert_eq!(config.erode_dilate_iterations, 2);
        assert!((config.stroke_width - 1.5).abs() < f32::EPSILON);
    }

    #[test]
    fn config_json_replaces_flags() {
        let cli = parse(&[
            "-p",
            "in.png",
            "--threshold",
            "10",
            "--config-json",
            r#"{"threshold": 99, "closing_kernel_size": {"width": 21, "height": 7}}"#,
        ]);
        let config = config_from_cli(&cli).unwrap();
        assert_eq!(config.threshold, 99);
        assert_eq!(config.closing_kernel_size, KernelSize::new(21, 7));
        assert_eq!(config.blur_method, BlurMethod::Gaussian);
    }

    #[test]
    fn malformed_config_json_is_an_error() {
        let cli = parse(&["-p", "in.png", "--config-json", "{not json"]);
        assert!(matches!(
            config_from_cli(&cli),
            Err(CliError::ConfigJson(_))
        ));
    }

    #[test]
    fn bad_color_is_rejected_at_parse_time() {
        for color in ["0:255", "a:b:c", "0:0:256", "1:2:3:4"] {
            let result = Cli::try_parse_from(["barfind", "-p", "in.png", "-c", color]);
            assert!(result.is_err(), "{color} should be rejected");
        }
    }

    #[test]
    fn path_is_required() {
        assert!(Cli::try_parse_from(["barfind"]).is_err());
        assert!(Cli::try_parse_from(["barfind", "--path", ""]).is_err());
    }

    #[test]
    fn default_output_sits_next_to_input() {
        assert_eq!(
            default_output_path(Path::new("photos/shelf.jpg")),
            PathBuf::from("photos/shelf-barcode.png")
        );
        assert_eq!(
            default_output_path(Path::new("scan.tiff")),
            PathBuf::from("scan-barcode.png")
        );
    }

    #[test]
    fn missing_input_file_is_reported() {
        let cli = parse(&["-p", "/nonexistent/barfind/input.png"]);
        assert!(matches!(run(&cli), Err(CliError::Read { .. })));
    }

    #[test]
    fn detection_failure_json_carries_structured_error() {
        let json = failure_json(&CliError::Detection(DetectionError::NoRegionFound)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["detection"]["kind"], "NoRegionFound");
        assert!(value["error"].as_str().unwrap().contains("no barcode-like region"));
    }

    #[test]
    fn io_failure_json_has_no_detection_error() {
        let err = CliError::Read {
            path: PathBuf::from("in.png"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        let value: serde_json::Value = serde_json::from_str(&failure_json(&err).unwrap()).unwrap();
        assert!(value["detection"].is_null());
        assert!(value["error"].as_str().unwrap().contains("in.png"));
    }
}
