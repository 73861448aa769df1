//! ember - render the built-in demo scene to an image file.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use ember_renderer::{
    Color, RenderBuffer, RenderEngine, RenderMethod, RenderSettings, State, UVec2,
};

mod demo;

#[derive(Parser)]
#[command(name = "ember")]
#[command(about = "Tile-scheduled CPU path tracer", long_about = None)]
struct Cli {
    /// Output image (format determined by extension: .png, .jpg, .bmp, ...)
    #[arg(short, long, default_value = "render.png")]
    output: PathBuf,

    #[arg(long, default_value_t = 640)]
    width: u32,

    #[arg(long, default_value_t = 360)]
    height: u32,

    /// JSON render settings; command-line flags override its values
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Base samples per pixel
    #[arg(long)]
    samples: Option<u32>,

    /// Ceiling of extra samples for noisy pixels
    #[arg(long)]
    adaptive: Option<u32>,

    #[arg(long)]
    tile_size: Option<u32>,

    /// Worker threads (default: half the hardware threads)
    #[arg(short, long)]
    workers: Option<u32>,

    #[arg(long)]
    max_bounce: Option<u32>,

    #[arg(long)]
    seed: Option<u64>,

    #[arg(long, value_enum)]
    method: Option<Method>,

    /// Seconds between progress reports
    #[arg(long, default_value_t = 1.0)]
    progress: f32,
}

#[derive(Clone, Copy, ValueEnum)]
enum Method {
    /// Monte Carlo path tracing
    PathTrace,
    /// Heat map of BVH traversal cost
    BvhQuality,
}

impl From<Method> for RenderMethod {
    fn from(method: Method) -> Self {
        match method {
            Method::PathTrace => RenderMethod::PathTrace,
            Method::BvhQuality => RenderMethod::BvhQuality,
        }
    }
}

impl Cli {
    fn render_settings(&self) -> Result<RenderSettings> {
        let mut settings = match &self.settings {
            Some(path) => load_settings(path)?,
            None => RenderSettings::default(),
        };

        if let Some(samples) = self.samples {
            settings.pixel_sample = samples;
        }
        if let Some(adaptive) = self.adaptive {
            settings.adaptive_sample = adaptive;
        }
        if let Some(tile_size) = self.tile_size {
            settings.tile_size = tile_size;
        }
        if let Some(workers) = self.workers {
            settings.worker_size = workers;
        }
        if let Some(max_bounce) = self.max_bounce {
            settings.max_bounce = max_bounce;
        }
        if let Some(seed) = self.seed {
            settings.seed = seed;
        }
        if let Some(method) = self.method {
            settings.method = method.into();
        }

        settings.validate()?;
        Ok(settings)
    }
}

fn load_settings(path: &Path) -> Result<RenderSettings> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read settings from {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("failed to parse settings in {}", path.display()))
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let cli = Cli::parse();
    if cli.width == 0 || cli.height == 0 {
        bail!("image size must be positive, got {}x{}", cli.width, cli.height);
    }

    let settings = cli.render_settings()?;
    log::info!("settings: {}", serde_json::to_string(&settings)?);

    let buffer = Arc::new(RenderBuffer::new(cli.width, cli.height));
    let scene = demo::build_scene(settings.seed, buffer.aspect());

    let engine = RenderEngine::with_settings(settings.clone());
    engine.set_render_buffer(buffer.clone())?;
    engine.set_scene(scene)?;
    engine.begin().context("failed to start render")?;

    let interval = Duration::from_secs_f32(cli.progress.max(0.05));
    loop {
        let state = engine
            .wait_for_render_timeout(interval)
            .context("render failed")?;
        if matches!(state, State::Completed | State::Aborted) {
            break;
        }
        log::info!(
            "{}/{} tiles, {} pixels, {} samples, {:.1?}",
            engine.completed_tile_count(),
            engine.total_tile_count(),
            engine.completed_pixel(),
            engine.completed_sample(),
            engine.elapsed(),
        );
    }

    let elapsed = engine.elapsed();
    let samples = engine.completed_sample();
    log::info!(
        "rendered {samples} samples in {elapsed:.2?} ({:.2} Msamples/s)",
        samples as f64 / elapsed.as_secs_f64().max(1e-9) / 1e6,
    );

    if settings.method == RenderMethod::BvhQuality {
        apply_heat_map(&buffer);
    }

    buffer
        .save(&cli.output)
        .with_context(|| format!("failed to save {}", cli.output.display()))?;
    log::info!("saved {}", cli.output.display());
    Ok(())
}

/// Replace raw traversal costs (red channel) with a blue-to-red ramp
/// normalized to the most expensive pixel.
fn apply_heat_map(buffer: &RenderBuffer) {
    let size = buffer.size();
    let positions = (0..size.y).flat_map(|y| (0..size.x).map(move |x| UVec2::new(x, y)));

    let max_cost = positions
        .clone()
        .map(|position| buffer.get(position).x)
        .fold(1.0f32, f32::max);

    for position in positions {
        let t = (buffer.get(position).x / max_cost).clamp(0.0, 1.0);
        let heat = Color::new(t, 1.0 - (2.0 * t - 1.0).abs(), 1.0 - t);
        buffer.set(position, heat);
    }
    log::info!("heat map normalized to {max_cost:.0} tests per ray");
}
