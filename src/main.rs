//! Tessella CLI - tiled image resizing.
//!
//! Loads an image, optionally pre-shrinks and filters it, resizes it through
//! the tiled pipeline, optionally rotates the result and saves it.

use anyhow::{bail, Context};
use clap::Parser;
use image::{DynamicImage, ImageFormat};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;
use std::time::Instant;
use tessella::prelude::*;

// =============================================================================
// CLI Arguments
// =============================================================================

/// Tile size given as `WIDTHxHEIGHT` or a single edge length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TileSize(u32, u32);

impl FromStr for TileSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse = |part: &str| {
            part.trim()
                .parse::<u32>()
                .map_err(|_| format!("invalid tile size '{}', expected WxH", s))
        };
        match s.split_once(['x', 'X']) {
            Some((w, h)) => Ok(TileSize(parse(w)?, parse(h)?)),
            None => {
                let edge = parse(s)?;
                Ok(TileSize(edge, edge))
            }
        }
    }
}

/// Resize an image by splitting it into tiles, resizing each tile on its own
/// and stitching the results back together.
#[derive(Parser, Debug)]
#[command(name = "tessella")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Image to read.
    input: PathBuf,

    /// Where to write the result. The format follows the extension.
    output: PathBuf,

    /// Output width in pixels.
    #[arg(long)]
    width: u32,

    /// Output height in pixels.
    #[arg(long)]
    height: u32,

    /// Nominal tile size in source pixels, e.g. `256x256` or `256`.
    #[arg(long)]
    tile: Option<TileSize>,

    /// Worker threads (0 = one per core).
    #[arg(long)]
    workers: Option<usize>,

    /// Stage tiles one at a time instead of in parallel.
    #[arg(long)]
    sequential: bool,

    /// Filter applied to the whole image before tiling
    /// (gaussianblur, sharpen, brightness, contrast, invert).
    #[arg(long)]
    filter: Option<FilterKind>,

    /// Shrink the source to output / N in one pass before tiling.
    #[arg(long, value_name = "N")]
    pre_downscale: Option<u32>,

    /// Rotate the result clockwise by this many degrees.
    #[arg(long, value_name = "DEGREES", allow_hyphen_values = true)]
    rotate: Option<f32>,

    /// Resampling filter (nearest, triangle, catmullrom, gaussian, lanczos3).
    #[arg(long)]
    resample: Option<ResampleFilter>,

    /// How the output is divided among tiles (uniform, proportional).
    #[arg(long)]
    split: Option<OutputSplit>,

    /// Stage tiles as files in this directory instead of a temporary one.
    #[arg(long, conflicts_with = "in_memory")]
    staging_dir: Option<PathBuf>,

    /// Keep staged tiles in memory.
    #[arg(long)]
    in_memory: bool,

    /// TOML file with pipeline settings. Flags override it.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print run statistics as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Enable debug logging.
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// Settings from `--config` (or the CLI defaults), then flag overrides.
    fn tiling_config(&self) -> anyhow::Result<TilingConfig> {
        let mut config = match &self.config {
            Some(path) => TilingConfig::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => TilingConfig::new().with_staging(StagingConfig::TempDir),
        };

        if let Some(TileSize(width, height)) = self.tile {
            config = config.with_tile_size(width, height);
        }
        if let Some(workers) = self.workers {
            config = config.with_workers(workers);
        }
        if self.sequential {
            config = config.with_parallel(false);
        }
        if let Some(filter) = self.resample {
            config = config.with_filter(filter);
        }
        if let Some(split) = self.split {
            config = config.with_split(split);
        }
        if let Some(dir) = &self.staging_dir {
            config = config.with_staging(StagingConfig::Directory { path: dir.clone() });
        }
        if self.in_memory {
            config = config.with_staging(StagingConfig::Memory);
        }

        config.validate()?;
        Ok(config)
    }
}

// =============================================================================
// Main
// =============================================================================

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "tessella=debug" } else { "tessella=info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp_millis()
        .init();
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let total_start = Instant::now();
    let config = cli.tiling_config()?;

    let (width, height) = clamp_output_size(cli.width, cli.height);
    if (width, height) != (cli.width, cli.height) {
        warn!(
            "Requested {}x{} exceeds the {}x{} limit, using {}x{}",
            cli.width, cli.height, MAX_OUTPUT_WIDTH, MAX_OUTPUT_HEIGHT, width, height
        );
    }

    let start = Instant::now();
    let mut source = image::open(&cli.input)
        .with_context(|| format!("Failed to open {}", cli.input.display()))?
        .into_rgba8();
    info!(
        "Loaded {} ({}x{}) in {}ms",
        cli.input.display(),
        source.width(),
        source.height(),
        start.elapsed().as_millis()
    );

    if let Some(divisor) = cli.pre_downscale {
        if divisor == 0 {
            bail!("--pre-downscale must be at least 1");
        }
        let start = Instant::now();
        let target = ((width / divisor).max(1), (height / divisor).max(1));
        source = downscale(&source, target.0, target.1, config.filter)?;
        info!(
            "Pre-downscaled to {}x{} in {}ms",
            target.0,
            target.1,
            start.elapsed().as_millis()
        );
    }

    if let Some(kind) = cli.filter {
        let start = Instant::now();
        apply_filter(&mut source, kind);
        info!("Applied {} in {}ms", kind, start.elapsed().as_millis());
    }

    let pipeline = TiledResizePipeline::new(config).context("Failed to set up pipeline")?;
    let output = pipeline
        .run(&source, width, height)
        .with_context(|| format!("Tiled resize to {}x{} failed", width, height))?;
    let mut canvas = output.image;

    if let Some(degrees) = cli.rotate {
        let start = Instant::now();
        canvas = rotate(&canvas, degrees)?;
        info!("Rotated {} degrees in {}ms", degrees, start.elapsed().as_millis());
    }

    let start = Instant::now();
    save(canvas, &cli.output)?;
    info!("Saved {} in {}ms", cli.output.display(), start.elapsed().as_millis());

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&output.stats)?);
    }
    info!("Done in {}ms", total_start.elapsed().as_millis());
    Ok(())
}

/// Encode `canvas` at `path`, dropping alpha for formats that cannot hold it.
fn save(canvas: PixelBuffer, path: &Path) -> anyhow::Result<()> {
    let format = ImageFormat::from_path(path)
        .with_context(|| format!("Cannot tell output format of {}", path.display()))?;
    let image = DynamicImage::ImageRgba8(canvas);
    let image = match format {
        ImageFormat::Jpeg | ImageFormat::Bmp | ImageFormat::Pnm => {
            DynamicImage::ImageRgb8(image.to_rgb8())
        }
        _ => image,
    };
    image
        .save_with_format(path, format)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_size_parsing() {
        assert_eq!("256x128".parse(), Ok(TileSize(256, 128)));
        assert_eq!("64X64".parse(), Ok(TileSize(64, 64)));
        assert_eq!("100".parse(), Ok(TileSize(100, 100)));
        assert!("axb".parse::<TileSize>().is_err());
    }

    #[test]
    fn test_flags_override_defaults() {
        let cli = Cli::parse_from([
            "tessella", "in.png", "out.png", "--width", "800", "--height", "600", "--tile",
            "64x32", "--resample", "lanczos3", "--in-memory", "--sequential",
        ]);
        let config = cli.tiling_config().unwrap();

        assert_eq!((config.tile_width, config.tile_height), (64, 32));
        assert_eq!(config.filter, ResampleFilter::Lanczos3);
        assert_eq!(config.staging, StagingConfig::Memory);
        assert!(!config.parallel);
    }

    #[test]
    fn test_cli_stages_in_temp_dir_by_default() {
        let cli = Cli::parse_from(["tessella", "a.png", "b.jpg", "--width", "10", "--height", "10"]);
        assert_eq!(cli.tiling_config().unwrap().staging, StagingConfig::TempDir);
    }

    #[test]
    fn test_end_to_end_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.png");
        let output = dir.path().join("out.jpg");
        PixelBuffer::from_pixel(250, 140, image::Rgba([30, 60, 90, 255]))
            .save(&input)
            .unwrap();

        let input_arg = input.to_string_lossy().into_owned();
        let output_arg = output.to_string_lossy().into_owned();
        let cli = Cli::parse_from([
            "tessella", input_arg.as_str(), output_arg.as_str(), "--width", "125", "--height", "70", "--rotate",
            "90",
        ]);
        run(&cli).unwrap();

        let written = image::open(&output).unwrap();
        assert_eq!((written.width(), written.height()), (70, 125));
    }
}
