use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};

/// Largest accepted `mosaic.tile_factor`; the grid edge is `2^tile_factor`.
/// Must equal `scheduler::MAX_TILE_FACTOR`, which the binary's tests check.
pub const MAX_TILE_FACTOR: u32 = 6;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FlashConfig {
    pub version: u32,
    #[serde(default)]
    pub ring: RingSection,
    #[serde(default)]
    pub decode: DecodeSection,
    #[serde(default)]
    pub mosaic: MosaicSection,
    #[serde(default)]
    pub window: WindowSection,
    #[serde(default)]
    pub feed: FeedSection,
}

impl Default for FlashConfig {
    fn default() -> Self {
        Self {
            version: 1,
            ring: RingSection::default(),
            decode: DecodeSection::default(),
            mosaic: MosaicSection::default(),
            window: WindowSection::default(),
            feed: FeedSection::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RingSection {
    pub capacity: usize,
    pub layers_per_array: usize,
    pub width: u32,
    pub height: u32,
}

impl Default for RingSection {
    fn default() -> Self {
        Self {
            capacity: 256,
            layers_per_array: 256,
            width: 512,
            height: 512,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterSetting {
    Nearest,
    Triangle,
    CatmullRom,
    Gaussian,
    #[default]
    Lanczos3,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct DecodeSection {
    /// Decode threads. More than one relaxes output ordering.
    pub workers: usize,
    pub filter: FilterSetting,
}

impl Default for DecodeSection {
    fn default() -> Self {
        Self {
            workers: 1,
            filter: FilterSetting::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MosaicSection {
    pub tile_factor: u32,
    #[serde(
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub switch_interval: Duration,
    pub switch_fraction: f32,
    /// Uploads per rendered frame; `0` drains everything.
    pub max_uploads_per_frame: usize,
    pub fade_factor: f32,
    pub scroll_speed: [f32; 2],
    pub scroll_offset: [f32; 2],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for MosaicSection {
    fn default() -> Self {
        Self {
            tile_factor: 2,
            switch_interval: Duration::from_secs(2),
            switch_fraction: 0.1,
            max_uploads_per_frame: 4,
            fade_factor: 0.1,
            scroll_speed: [0.0, 0.0],
            scroll_offset: [0.0, 0.0],
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerSetting {
    Low,
    #[default]
    High,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct WindowSection {
    pub width: u32,
    pub height: u32,
    pub vsync: bool,
    pub power: PowerSetting,
    pub title: String,
}

impl Default for WindowSection {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            vsync: true,
            power: PowerSetting::default(),
            title: "imageflash".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct FeedSection {
    #[serde(
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub interval: Duration,
    #[serde(rename = "loop")]
    pub repeat: bool,
}

impl Default for FeedSection {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(250),
            repeat: false,
        }
    }
}

fn serialize_duration<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&humantime::format_duration(*value).to_string())
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Duration;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Duration::from_secs(v))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Duration::from_secs(v as u64))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if !v.is_finite() || v.is_sign_negative() {
                return Err(E::custom("duration must be a non-negative number"));
            }
            Ok(Duration::from_secs_f64(v))
        }
    }

    deserializer.deserialize_any(Visitor)
}

impl FlashConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: FlashConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Renders the configuration back to TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|err| ConfigError::Invalid(err.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected 1",
                self.version
            )));
        }

        let ring = &self.ring;
        if ring.capacity == 0 {
            return Err(ConfigError::Invalid("ring.capacity must be > 0".into()));
        }
        if ring.layers_per_array == 0 {
            return Err(ConfigError::Invalid(
                "ring.layers_per_array must be > 0".into(),
            ));
        }
        if ring.width == 0 || ring.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "ring resolution {}x{} must be non-zero",
                ring.width, ring.height
            )));
        }

        if self.decode.workers == 0 {
            return Err(ConfigError::Invalid(
                "decode.workers must be at least 1".into(),
            ));
        }

        let mosaic = &self.mosaic;
        if mosaic.tile_factor > MAX_TILE_FACTOR {
            return Err(ConfigError::Invalid(format!(
                "mosaic.tile_factor {} exceeds the maximum of {MAX_TILE_FACTOR}",
                mosaic.tile_factor
            )));
        }
        check_unit("mosaic.switch_fraction", mosaic.switch_fraction)?;
        check_unit("mosaic.fade_factor", mosaic.fade_factor)?;
        if mosaic
            .scroll_speed
            .iter()
            .chain(mosaic.scroll_offset.iter())
            .any(|value| !value.is_finite())
        {
            return Err(ConfigError::Invalid(
                "mosaic scroll values must be finite".into(),
            ));
        }

        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::Invalid(
                "window size must be non-zero".into(),
            ));
        }

        Ok(())
    }
}

fn check_unit(name: &str, value: f32) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!(
            "{name} must be within [0, 1], got {value}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
version = 1

[ring]
capacity = 600
layers_per_array = 256
width = 320
height = 240

[decode]
workers = 2
filter = "triangle"

[mosaic]
tile_factor = 3
switch_interval = "1500ms"
switch_fraction = 0.25
max_uploads_per_frame = 0
fade_factor = 0.5
scroll_speed = [0.01, -0.02]
seed = 42

[window]
vsync = false
power = "low"

[feed]
interval = 0.5
loop = true
"#;

    #[test]
    fn parses_sample_config() {
        let config = FlashConfig::from_toml_str(SAMPLE).expect("parse config");
        assert_eq!(config.ring.capacity, 600);
        assert_eq!((config.ring.width, config.ring.height), (320, 240));
        assert_eq!(config.decode.workers, 2);
        assert_eq!(config.decode.filter, FilterSetting::Triangle);
        assert_eq!(config.mosaic.tile_factor, 3);
        assert_eq!(config.mosaic.switch_interval, Duration::from_millis(1500));
        assert_eq!(config.mosaic.max_uploads_per_frame, 0);
        assert_eq!(config.mosaic.scroll_speed, [0.01, -0.02]);
        assert_eq!(config.mosaic.scroll_offset, [0.0, 0.0]);
        assert_eq!(config.mosaic.seed, Some(42));
        assert!(!config.window.vsync);
        assert_eq!(config.window.power, PowerSetting::Low);
        assert_eq!(config.window.width, 1280);
        assert_eq!(config.feed.interval, Duration::from_millis(500));
        assert!(config.feed.repeat);
    }

    #[test]
    fn missing_sections_use_defaults() {
        let config = FlashConfig::from_toml_str("version = 1").unwrap();
        assert_eq!(config.ring, RingSection::default());
        assert_eq!(config.decode.filter, FilterSetting::Lanczos3);
        assert_eq!(config.mosaic.switch_interval, Duration::from_secs(2));
        assert_eq!(config.feed, FeedSection::default());
    }

    #[test]
    fn rejects_unknown_version() {
        let err = FlashConfig::from_toml_str("version = 2").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_out_of_range_values() {
        for body in [
            "[ring]\ncapacity = 0",
            "[ring]\nwidth = 0",
            "[decode]\nworkers = 0",
            "[mosaic]\ntile_factor = 7",
            "[mosaic]\nfade_factor = 1.5",
            "[mosaic]\nswitch_fraction = -0.1",
        ] {
            let input = format!("version = 1\n{body}\n");
            let err = FlashConfig::from_toml_str(&input).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "{body}: {err}");
        }
    }

    #[test]
    fn rejects_negative_duration() {
        let err = FlashConfig::from_toml_str("version = 1\n[feed]\ninterval = -1\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn rejects_unknown_filter() {
        let err =
            FlashConfig::from_toml_str("version = 1\n[decode]\nfilter = \"bicubic\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn rendered_config_parses_back() {
        let config = FlashConfig::from_toml_str(SAMPLE).unwrap();
        let rendered = config.to_toml_string().unwrap();
        let reparsed = FlashConfig::from_toml_str(&rendered).unwrap();
        assert_eq!(reparsed.mosaic, config.mosaic);
        assert_eq!(reparsed.feed, config.feed);
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let config = FlashConfig::load(file.path()).unwrap();
        assert_eq!(config.ring.capacity, 600);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = FlashConfig::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
