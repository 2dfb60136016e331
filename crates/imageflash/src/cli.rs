use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug, Default)]
#[command(
    name = "imageflash",
    author,
    version,
    about = "Real-time image mosaic fed from local files"
)]
pub struct Args {
    /// Image files or directories to feed, in order. Directories are expanded
    /// to their image files sorted by name.
    #[arg(value_name = "PATHS")]
    pub paths: Vec<PathBuf>,

    /// Config file; defaults to `$XDG_CONFIG_HOME/imageflash/config.toml`.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Window size (e.g. `1280x720`).
    #[arg(long, value_name = "WIDTHxHEIGHT")]
    pub size: Option<String>,

    /// Slots per ring instance.
    #[arg(long, value_name = "SLOTS")]
    pub ring_capacity: Option<usize>,

    /// Grid edge exponent (0-6); the mosaic has `2^N` tiles per side.
    #[arg(long, value_name = "N")]
    pub tile_factor: Option<u32>,

    /// Weight of the fresh mosaic when blending over the previous frame (0-1).
    #[arg(long, value_name = "FACTOR")]
    pub fade: Option<f32>,

    /// Seconds between fed images.
    #[arg(long, value_name = "SECONDS")]
    pub interval: Option<f64>,

    /// Restart the feed from the first file once every file has been sent.
    #[arg(long = "loop")]
    pub repeat: bool,

    /// Run the ingest pipeline without a window or GPU.
    #[arg(long)]
    pub headless: bool,

    /// Ticks to run in headless mode (60 per second).
    #[arg(long, value_name = "COUNT", default_value_t = 600)]
    pub frames: u64,

    /// Seed for tile selection; random when neither this nor the config sets one.
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u64>,

    /// Print the effective configuration as TOML and exit.
    #[arg(long)]
    pub dump_config: bool,
}

pub fn parse() -> Args {
    Args::parse()
}

/// Parses `WxH` (also `WXH` and `W×H`).
pub fn parse_size(spec: &str) -> Result<(u32, u32), String> {
    let trimmed = spec.trim();
    let (width, height) = trimmed
        .split_once(['x', 'X', '×'])
        .ok_or_else(|| "expected WxH format, e.g. 1280x720".to_string())?;

    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| format!("invalid width in size '{trimmed}'"))?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| format!("invalid height in size '{trimmed}'"))?;

    if width == 0 || height == 0 {
        return Err("window dimensions must be greater than zero".to_string());
    }
    Ok((width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sizes() {
        assert_eq!(parse_size("1280x720"), Ok((1280, 720)));
        assert_eq!(parse_size(" 640 X 480 "), Ok((640, 480)));
        assert_eq!(parse_size("800×600"), Ok((800, 600)));
    }

    #[test]
    fn rejects_bad_sizes() {
        assert!(parse_size("1280").is_err());
        assert!(parse_size("0x720").is_err());
        assert!(parse_size("widexhigh").is_err());
    }

    #[test]
    fn parses_feed_arguments() {
        let args = Args::try_parse_from([
            "imageflash",
            "photos",
            "extra.png",
            "--tile-factor",
            "3",
            "--interval",
            "0.5",
            "--loop",
            "--headless",
            "--frames",
            "120",
        ])
        .unwrap();
        assert_eq!(
            args.paths,
            vec![PathBuf::from("photos"), PathBuf::from("extra.png")]
        );
        assert_eq!(args.tile_factor, Some(3));
        assert_eq!(args.interval, Some(0.5));
        assert!(args.repeat);
        assert!(args.headless);
        assert_eq!(args.frames, 120);
        assert_eq!(args.config, None);
    }

    #[test]
    fn frames_default_to_ten_seconds() {
        let args = Args::try_parse_from(["imageflash"]).unwrap();
        assert_eq!(args.frames, 600);
        assert!(args.paths.is_empty());
    }
}
