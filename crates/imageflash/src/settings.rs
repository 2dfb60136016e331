use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, bail, Context, Result};
use flashconfig::{FilterSetting, FlashConfig, PowerSetting};
use ingest::{Decoder, ResizeFilter, Resolution, WorkerConfig};
use mosaic::{GpuPowerPreference, MosaicConfig, WindowConfig};
use scheduler::SwitchPolicy;

use crate::cli::{parse_size, Args};
use crate::paths::ConfigLocation;

/// Reads the config file. A missing default file is not an error.
pub fn load_config(location: &ConfigLocation) -> Result<FlashConfig> {
    match location {
        ConfigLocation::Explicit(path) => FlashConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        ConfigLocation::Discovered(path) if path.exists() => FlashConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        ConfigLocation::Discovered(path) => {
            tracing::debug!(path = %path.display(), "no config file; using defaults");
            Ok(FlashConfig::default())
        }
    }
}

/// Applies command-line flags on top of the file values and re-validates.
pub fn apply_overrides(config: &mut FlashConfig, args: &Args) -> Result<()> {
    if let Some(size) = args.size.as_deref() {
        let (width, height) = parse_size(size).map_err(|err| anyhow!(err))?;
        config.window.width = width;
        config.window.height = height;
    }
    if let Some(capacity) = args.ring_capacity {
        config.ring.capacity = capacity;
    }
    if let Some(tile_factor) = args.tile_factor {
        config.mosaic.tile_factor = tile_factor;
    }
    if let Some(fade) = args.fade {
        config.mosaic.fade_factor = fade;
    }
    if let Some(interval) = args.interval {
        config.feed.interval = Duration::try_from_secs_f64(interval)
            .map_err(|_| anyhow!("feed interval must be a non-negative number of seconds"))?;
    }
    if args.repeat {
        config.feed.repeat = true;
    }
    if let Some(seed) = args.seed {
        config.mosaic.seed = Some(seed);
    }
    config
        .validate()
        .context("invalid configuration after command-line overrides")
}

pub fn resolution(config: &FlashConfig) -> Resolution {
    Resolution::new(config.ring.width, config.ring.height)
}

pub fn mosaic_config(config: &FlashConfig) -> MosaicConfig {
    let section = &config.mosaic;
    MosaicConfig {
        ring_capacity: config.ring.capacity,
        layers_per_array: config.ring.layers_per_array,
        resolution: resolution(config),
        tile_factor: section.tile_factor,
        switch: SwitchPolicy {
            interval: section.switch_interval,
            fraction: section.switch_fraction,
        },
        max_uploads_per_frame: section.max_uploads_per_frame,
        fade_factor: section.fade_factor,
        scroll_speed: section.scroll_speed,
        scroll_offset: section.scroll_offset,
        seed: section.seed.unwrap_or_else(time_seed),
    }
}

pub fn window_config(config: &FlashConfig) -> WindowConfig {
    WindowConfig {
        size: (config.window.width, config.window.height),
        vsync: config.window.vsync,
        power: match config.window.power {
            PowerSetting::Low => GpuPowerPreference::Low,
            PowerSetting::High => GpuPowerPreference::High,
        },
        title: config.window.title.clone(),
    }
}

pub fn worker_config(config: &FlashConfig) -> WorkerConfig {
    WorkerConfig {
        workers: config.decode.workers,
        decoder: Decoder::new(resolution(config), resize_filter(config.decode.filter)),
    }
}

fn resize_filter(setting: FilterSetting) -> ResizeFilter {
    match setting {
        FilterSetting::Nearest => ResizeFilter::Nearest,
        FilterSetting::Triangle => ResizeFilter::Triangle,
        FilterSetting::CatmullRom => ResizeFilter::CatmullRom,
        FilterSetting::Gaussian => ResizeFilter::Gaussian,
        FilterSetting::Lanczos3 => ResizeFilter::Lanczos3,
    }
}

fn time_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos() as u64)
        .unwrap_or_default()
}

/// Rejects headless runs that could never finish.
pub fn check_headless(args: &Args, config: &FlashConfig) -> Result<()> {
    if args.frames == 0 {
        bail!("--frames must be greater than zero in headless mode");
    }
    if config.feed.repeat {
        tracing::info!("feed loops; headless run ends after {} frames", args.frames);
    }
    Ok(())
}
