//! Session configuration: cadences, price plausibility, capture geometry.
//!
//! Stored as TOML. Unknown keys are rejected both when loading a file and when
//! setting a value by name, so a typo never silently falls back to a default.

use chrono::NaiveTime;
use chrono_tz::Tz;
use nqfuse_core::domain::{Instrument, InstrumentError, Region, RegionError, NQ_TICK_SIZE};
use nqfuse_core::extraction::{ExtractorSettings, RecognitionMode};
use nqfuse_core::series::Timeframe;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Errors from loading, editing or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("config serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("unknown config key '{0}'")]
    UnknownKey(String),

    #[error("invalid value '{value}' for '{key}': {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error(transparent)]
    Region(#[from] RegionError),

    #[error(transparent)]
    Instrument(#[from] InstrumentError),
}

/// Every tunable of a fused session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FusionConfig {
    /// Reference-feed symbol.
    pub symbol: String,
    /// IANA zone of the feed; bar timestamps and the session open use it.
    pub timezone: String,
    pub reference_poll_secs: u64,
    pub extraction_poll_ms: u64,
    /// Coordinator cadence.
    pub cycle_ms: u64,
    pub session_open: NaiveTime,
    pub or_minutes: u32,
    pub min_px: f64,
    pub max_px: f64,
    pub max_jump_pts: f64,
    /// Fixed at the NQ tick; any other value fails validation.
    pub tick_size: f64,
    /// Page-segmentation mode handed to the recogniser.
    pub ocr_psm: u8,
    /// Width of the right-edge strip searched when locating the price column.
    pub search_right_px: u32,
    pub region: Region,
    pub relocate_interval_secs: u64,
    pub relocate_grace_secs: u64,
    /// An extracted price older than this is not used for the current cycle.
    pub extraction_max_age_ms: u64,
    pub timeframes: Vec<Timeframe>,
    /// Most recent bars kept in the store.
    pub history_limit: usize,
    /// Bias transitions kept in the signal history.
    pub signal_history: usize,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            symbol: "NQ=F".into(),
            timezone: "America/New_York".into(),
            reference_poll_secs: 10,
            extraction_poll_ms: 250,
            cycle_ms: 250,
            session_open: NaiveTime::from_hms_opt(9, 30, 0).unwrap_or_default(),
            or_minutes: 15,
            min_px: 2000.0,
            max_px: 40000.0,
            max_jump_pts: 60.0,
            tick_size: NQ_TICK_SIZE,
            ocr_psm: 6,
            search_right_px: 520,
            region: Region::default(),
            relocate_interval_secs: 30,
            relocate_grace_secs: 3,
            extraction_max_age_ms: 3000,
            timeframes: Timeframe::ALL.to_vec(),
            history_limit: 10_000,
            signal_history: 50,
        }
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse::<T>().map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn invalid(key: &str, value: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

impl FusionConfig {
    pub fn from_toml(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// The file's contents, or the defaults when it does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Set one named value from text. `region` takes `left,top,width,height`;
    /// `region.left` etc. replace one side; `timeframes` takes a comma list.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "symbol" => {
                let symbol = value.trim();
                if symbol.is_empty() {
                    return Err(invalid(key, value, "symbol must not be empty"));
                }
                self.symbol = symbol.to_string();
            }
            "timezone" => {
                value
                    .trim()
                    .parse::<Tz>()
                    .map_err(|e| invalid(key, value, e.to_string()))?;
                self.timezone = value.trim().to_string();
            }
            "reference_poll_secs" => self.reference_poll_secs = parse_value(key, value)?,
            "extraction_poll_ms" => self.extraction_poll_ms = parse_value(key, value)?,
            "cycle_ms" => self.cycle_ms = parse_value(key, value)?,
            "session_open" => self.session_open = parse_value(key, value)?,
            "or_minutes" => self.or_minutes = parse_value(key, value)?,
            "min_px" => self.min_px = parse_value(key, value)?,
            "max_px" => self.max_px = parse_value(key, value)?,
            "max_jump_pts" => self.max_jump_pts = parse_value(key, value)?,
            "tick_size" => {
                let tick: f64 = parse_value(key, value)?;
                if tick != NQ_TICK_SIZE {
                    return Err(invalid(key, value, format!("NQ trades in {NQ_TICK_SIZE} ticks")));
                }
                self.tick_size = tick;
            }
            "ocr_psm" => self.ocr_psm = parse_value(key, value)?,
            "search_right_px" => self.search_right_px = parse_value(key, value)?,
            "relocate_interval_secs" => self.relocate_interval_secs = parse_value(key, value)?,
            "relocate_grace_secs" => self.relocate_grace_secs = parse_value(key, value)?,
            "extraction_max_age_ms" => self.extraction_max_age_ms = parse_value(key, value)?,
            "history_limit" => self.history_limit = parse_value(key, value)?,
            "signal_history" => self.signal_history = parse_value(key, value)?,
            "timeframes" => {
                self.timeframes = value
                    .split(',')
                    .map(|tf| parse_value::<Timeframe>(key, tf))
                    .collect::<Result<_, _>>()?;
            }
            "region" => {
                let parts: Vec<&str> = value.split(',').collect();
                let [l, t, w, h] = parts.as_slice() else {
                    return Err(invalid(key, value, "expected left,top,width,height"));
                };
                self.region = Region::new(
                    parse_value(key, l)?,
                    parse_value(key, t)?,
                    parse_value(key, w)?,
                    parse_value(key, h)?,
                )
                .map_err(|e| invalid(key, value, e.to_string()))?;
            }
            "region.left" | "region.top" | "region.width" | "region.height" => {
                let r = self.region;
                let (mut left, mut top, mut width, mut height) =
                    (r.left(), r.top(), r.width(), r.height());
                match key {
                    "region.left" => left = parse_value(key, value)?,
                    "region.top" => top = parse_value(key, value)?,
                    "region.width" => width = parse_value(key, value)?,
                    _ => height = parse_value(key, value)?,
                }
                self.region = Region::new(left, top, width, height)
                    .map_err(|e| invalid(key, value, e.to_string()))?;
            }
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }

    /// Cross-field checks a deserialised file cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.symbol.trim().is_empty() {
            return Err(ConfigError::Invalid("symbol must not be empty".into()));
        }
        self.tz()?;
        if !(self.min_px.is_finite() && self.max_px.is_finite() && self.min_px < self.max_px) {
            return Err(ConfigError::Invalid(format!(
                "min_px ({}) must be below max_px ({})",
                self.min_px, self.max_px
            )));
        }
        if !(self.max_jump_pts.is_finite() && self.max_jump_pts >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "max_jump_pts must be non-negative, got {}",
                self.max_jump_pts
            )));
        }
        if self.tick_size != NQ_TICK_SIZE {
            return Err(ConfigError::Invalid(format!(
                "tick_size must be {NQ_TICK_SIZE}, got {}",
                self.tick_size
            )));
        }
        for (name, value) in [
            ("reference_poll_secs", self.reference_poll_secs),
            ("extraction_poll_ms", self.extraction_poll_ms),
            ("cycle_ms", self.cycle_ms),
            ("relocate_interval_secs", self.relocate_interval_secs),
            ("extraction_max_age_ms", self.extraction_max_age_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{name} must be positive")));
            }
        }
        if self.search_right_px == 0 {
            return Err(ConfigError::Invalid("search_right_px must be positive".into()));
        }
        if self.history_limit == 0 {
            return Err(ConfigError::Invalid("history_limit must be positive".into()));
        }
        Ok(())
    }

    pub fn tz(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| invalid("timezone", &self.timezone, e.to_string()))
    }

    pub fn instrument(&self) -> Result<Instrument, ConfigError> {
        Ok(Instrument::new(self.symbol.clone(), self.tick_size)?)
    }

    pub fn extractor_settings(&self) -> ExtractorSettings {
        ExtractorSettings {
            min_px: self.min_px,
            max_px: self.max_px,
            max_jump_pts: self.max_jump_pts,
            mode: self.recognition_mode(),
        }
    }

    pub fn recognition_mode(&self) -> RecognitionMode {
        RecognitionMode(self.ocr_psm)
    }

    pub fn reference_poll(&self) -> Duration {
        Duration::from_secs(self.reference_poll_secs)
    }

    pub fn extraction_poll(&self) -> Duration {
        Duration::from_millis(self.extraction_poll_ms)
    }

    pub fn cycle(&self) -> Duration {
        Duration::from_millis(self.cycle_ms)
    }

    pub fn extraction_max_age(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.extraction_max_age_ms as i64)
    }
}

/// Persists region changes made at runtime.
pub trait ConfigStore: Send + Sync {
    fn persist_region(&self, region: Region) -> Result<(), ConfigError>;
}

/// Keeps the latest configuration in memory and rewrites the whole TOML file
/// on every change.
#[derive(Debug)]
pub struct TomlConfigStore {
    path: PathBuf,
    config: Mutex<FusionConfig>,
}

impl TomlConfigStore {
    pub fn new(path: impl Into<PathBuf>, config: FusionConfig) -> Self {
        Self {
            path: path.into(),
            config: Mutex::new(config),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn current(&self) -> FusionConfig {
        self.config
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl ConfigStore for TomlConfigStore {
    fn persist_region(&self, region: Region) -> Result<(), ConfigError> {
        let mut config = self
            .config
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        config.region = region;
        config.save(&self.path)?;
        info!(path = %self.path.display(), "persisted capture region");
        Ok(())
    }
}

/// Store that only remembers the last region, for sessions without a file.
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    region: Mutex<Option<Region>>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_region(&self) -> Option<Region> {
        *self
            .region
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ConfigStore for MemoryConfigStore {
    fn persist_region(&self, region: Region) -> Result<(), ConfigError> {
        *self
            .region
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(region);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate_and_round_trip() {
        let config = FusionConfig::default();
        config.validate().unwrap();
        let text = config.to_toml().unwrap();
        assert!(text.contains("symbol = \"NQ=F\""));
        assert!(text.contains("session_open = \"09:30:00\""));
        assert_eq!(FusionConfig::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let config = FusionConfig::from_toml("max_jump_pts = 40.0\n[region]\nleft = 10\ntop = 20\nwidth = 100\nheight = 300\n").unwrap();
        assert_eq!(config.max_jump_pts, 40.0);
        assert_eq!(config.region, Region::new(10, 20, 100, 300).unwrap());
        assert_eq!(config.reference_poll_secs, 10);
    }

    #[test]
    fn unknown_file_key_is_rejected() {
        let err = FusionConfig::from_toml("beeps_on = true\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn zero_sized_region_in_file_is_rejected() {
        let err = FusionConfig::from_toml("[region]\nleft = 0\ntop = 0\nwidth = 0\nheight = 10\n");
        assert!(err.is_err());
    }

    #[test]
    fn set_known_keys() {
        let mut config = FusionConfig::default();
        config.set("max_px", "25000").unwrap();
        config.set("session_open", "08:30:00").unwrap();
        config.set("timeframes", "5m, 1h").unwrap();
        config.set("region", "1,2,3,4").unwrap();
        config.set("region.height", "500").unwrap();
        config.set("timezone", "America/Chicago").unwrap();

        assert_eq!(config.max_px, 25000.0);
        assert_eq!(config.session_open, NaiveTime::from_hms_opt(8, 30, 0).unwrap());
        assert_eq!(config.timeframes, vec![Timeframe::M5, Timeframe::M60]);
        assert_eq!(config.region, Region::new(1, 2, 3, 500).unwrap());
        assert_eq!(config.tz().unwrap(), chrono_tz::America::Chicago);
    }

    #[test]
    fn set_unknown_key_and_bad_values() {
        let mut config = FusionConfig::default();
        assert!(matches!(
            config.set("theme", "dark"),
            Err(ConfigError::UnknownKey(k)) if k == "theme"
        ));
        assert!(matches!(
            config.set("cycle_ms", "fast"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            config.set("region", "1,2,0,4"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            config.set("timeframes", "5m,3m"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            config.set("timezone", "Mars/Olympus"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert_eq!(config, FusionConfig::default());
    }

    #[test]
    fn validate_rejects_inverted_bounds_and_zero_cadence() {
        let mut config = FusionConfig::default();
        config.min_px = 50000.0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = FusionConfig::default();
        config.cycle_ms = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = FusionConfig::default();
        config.tick_size = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn tick_size_is_pinned_to_nq_tick() {
        let mut config = FusionConfig::default();
        assert!(config.set("tick_size", "0.25").is_ok());
        assert!(matches!(
            config.set("tick_size", "0.5"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert_eq!(config.tick_size, 0.25);

        config.tick_size = 0.1;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
        assert!(FusionConfig::from_toml("tick_size = 1.0").is_err());
    }

    #[test]
    fn toml_store_rewrites_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nqfuse.toml");
        let store = TomlConfigStore::new(&path, FusionConfig::default());

        let region = Region::new(1500, 120, 200, 700).unwrap();
        store.persist_region(region).unwrap();

        let reloaded = FusionConfig::load(&path).unwrap();
        assert_eq!(reloaded.region, region);
        assert_eq!(store.current().region, region);
    }

    #[test]
    fn load_or_default_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = FusionConfig::load_or_default(&dir.path().join("missing.toml")).unwrap();
        assert_eq!(config, FusionConfig::default());
    }
}
