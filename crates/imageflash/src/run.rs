use anyhow::{Context, Result};
use flashconfig::FlashConfig;
use ingest::{decoded_queue, raw_queue, DecodeWorkers, DecodedQueue};
use mosaic::ControlHandle;
use tracing_subscriber::EnvFilter;

use crate::cli::Args;
use crate::feed::{collect_files, Feed};
use crate::headless;
use crate::paths::ConfigLocation;
use crate::settings;

pub fn run(args: Args) -> Result<()> {
    initialise_tracing();

    let location = ConfigLocation::resolve(args.config.as_deref())?;
    tracing::debug!(config = %location.path().display(), "resolved config path");
    let mut config = settings::load_config(&location)?;
    settings::apply_overrides(&mut config, &args)?;

    if args.dump_config {
        print!("{}", config.to_toml_string()?);
        return Ok(());
    }

    let files = collect_files(&args.paths)?;
    if files.is_empty() {
        tracing::warn!("no images to feed; the mosaic will stay black");
    }

    let (raw_tx, raw_rx) = raw_queue();
    let (decoded_tx, decoded_rx) = decoded_queue();
    let workers = DecodeWorkers::spawn(settings::worker_config(&config), raw_rx, decoded_tx)
        .context("failed to start decode workers")?;
    let feed = Feed::spawn(files, raw_tx, config.feed.interval, config.feed.repeat)?;

    let result = if args.headless {
        run_headless(&args, &config, decoded_rx)
    } else {
        run_window(&config, decoded_rx)
    };

    feed.stop();
    workers.shutdown();
    result
}

fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn run_headless(args: &Args, config: &FlashConfig, decoded: DecodedQueue) -> Result<()> {
    settings::check_headless(args, config)?;
    let mosaic = settings::mosaic_config(config);
    headless::run(&mosaic, decoded, args.frames, headless::TICK);
    Ok(())
}

fn run_window(config: &FlashConfig, decoded: DecodedQueue) -> Result<()> {
    let mosaic = settings::mosaic_config(config);
    let window = settings::window_config(config);
    tracing::info!(
        capacity = mosaic.ring_capacity,
        resolution = %mosaic.resolution,
        tile_factor = mosaic.tile_factor,
        seed = mosaic.seed,
        "starting mosaic window"
    );
    let control = ControlHandle::new(&mosaic);
    mosaic::window::run(window, mosaic, control, decoded)
}

