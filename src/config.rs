use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use thiserror::Error;

const DEFAULT_SLOW_HZ: f64 = 5.0;
const DEFAULT_FAST_HZ: f64 = 15.0;
const DEFAULT_MOVEMENT_THRESHOLD: f32 = 7.5;
const DEFAULT_COVERAGE_THRESHOLD: f64 = 10.0;
const DEFAULT_MOVEMENT_COOLDOWN_SECS: f64 = 3.0;
const DEFAULT_TOUCH_COOLDOWN_SECS: f64 = 5.0;

const MAX_RATE_HZ: f64 = 60.0;
const MAX_COOLDOWN_SECS: f64 = 60.0;
const MAX_MOVEMENT_THRESHOLD: f32 = 50.0;
const MAX_COVERAGE_THRESHOLD: f64 = 255.0;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be a finite number, got {value}")]
    NotFinite { name: &'static str, value: f64 },

    #[error("{name} must be greater than 0 and at most {max}, got {value}")]
    RateOutOfRange {
        name: &'static str,
        value: f64,
        max: f64,
    },

    #[error("{name} must be between 0 and {max}, got {value}")]
    OutOfRange {
        name: &'static str,
        value: f64,
        max: f64,
    },

    #[error("failed to read config file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Tuning values for the decision engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Sampling rate while nothing is moving
    pub slow_hz: f64,
    /// Sampling rate after movement was detected
    pub fast_hz: f64,
    /// Fingerprint distance at or above which a frame counts as movement
    pub movement_threshold: f32,
    /// Mean mask intensity per pixel (0-255) that must be accumulated
    /// before a touch is declared
    pub coverage_threshold: f64,
    /// Dead time after movement before the next fingerprint comparison
    pub movement_cooldown: Duration,
    /// Length of the suppression window refreshed by each touching frame
    pub touch_cooldown: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            slow_hz: DEFAULT_SLOW_HZ,
            fast_hz: DEFAULT_FAST_HZ,
            movement_threshold: DEFAULT_MOVEMENT_THRESHOLD,
            coverage_threshold: DEFAULT_COVERAGE_THRESHOLD,
            movement_cooldown: Duration::from_secs_f64(DEFAULT_MOVEMENT_COOLDOWN_SECS),
            touch_cooldown: Duration::from_secs_f64(DEFAULT_TOUCH_COOLDOWN_SECS),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_rate("slow_hz", self.slow_hz)?;
        check_rate("fast_hz", self.fast_hz)?;
        check_range(
            "movement_threshold",
            f64::from(self.movement_threshold),
            f64::from(MAX_MOVEMENT_THRESHOLD),
        )?;
        check_range(
            "coverage_threshold",
            self.coverage_threshold,
            MAX_COVERAGE_THRESHOLD,
        )?;
        check_range(
            "movement_cooldown",
            self.movement_cooldown.as_secs_f64(),
            MAX_COOLDOWN_SECS,
        )?;
        check_range(
            "touch_cooldown",
            self.touch_cooldown.as_secs_f64(),
            MAX_COOLDOWN_SECS,
        )?;
        Ok(())
    }

    /// Layer `overrides` on top of `self` and validate the result.
    pub fn with_overrides(&self, overrides: &ConfigOverrides) -> Result<Self, ConfigError> {
        let mut config = self.clone();
        if let Some(v) = overrides.slow_hz {
            config.slow_hz = v;
        }
        if let Some(v) = overrides.fast_hz {
            config.fast_hz = v;
        }
        if let Some(v) = overrides.movement_threshold {
            config.movement_threshold = v;
        }
        if let Some(v) = overrides.coverage_threshold {
            config.coverage_threshold = v;
        }
        if let Some(secs) = overrides.movement_cooldown_secs {
            config.movement_cooldown = cooldown("movement_cooldown", secs)?;
        }
        if let Some(secs) = overrides.touch_cooldown_secs {
            config.touch_cooldown = cooldown("touch_cooldown", secs)?;
        }
        config.validate()?;
        Ok(config)
    }
}

/// Partial configuration, as read from a TOML file or the command line.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigOverrides {
    pub slow_hz: Option<f64>,
    pub fast_hz: Option<f64>,
    pub movement_threshold: Option<f32>,
    pub coverage_threshold: Option<f64>,
    pub movement_cooldown_secs: Option<f64>,
    pub touch_cooldown_secs: Option<f64>,
}

fn check_finite(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NotFinite { name, value })
    }
}

fn check_rate(name: &'static str, value: f64) -> Result<(), ConfigError> {
    check_finite(name, value)?;
    if value <= 0.0 || value > MAX_RATE_HZ {
        return Err(ConfigError::RateOutOfRange {
            name,
            value,
            max: MAX_RATE_HZ,
        });
    }
    Ok(())
}

fn check_range(name: &'static str, value: f64, max: f64) -> Result<(), ConfigError> {
    check_finite(name, value)?;
    if !(0.0..=max).contains(&value) {
        return Err(ConfigError::OutOfRange { name, value, max });
    }
    Ok(())
}

// Duration::from_secs_f64 panics on negative input, so range-check first.
fn cooldown(name: &'static str, secs: f64) -> Result<Duration, ConfigError> {
    check_range(name, secs, MAX_COOLDOWN_SECS)?;
    Ok(Duration::from_secs_f64(secs))
}

/// A TOML configuration file that is re-read whenever its mtime changes.
#[derive(Debug)]
pub struct ConfigFile {
    path: PathBuf,
    modified: Option<SystemTime>,
}

impl ConfigFile {
    /// Read the file once and remember its modification time.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<(Self, ConfigOverrides), ConfigError> {
        let mut file = Self {
            path: path.as_ref().to_path_buf(),
            modified: None,
        };
        file.modified = file.modified_time()?;
        let overrides = file.read()?;
        Ok((file, overrides))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&self) -> Result<ConfigOverrides, ConfigError> {
        let text = std::fs::read_to_string(&self.path).map_err(|source| ConfigError::Read {
            path: self.path.clone(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    /// Returns the new contents if the file changed since the last call.
    pub fn poll_changed(&mut self) -> Option<Result<ConfigOverrides, ConfigError>> {
        let modified = match self.modified_time() {
            Ok(modified) => modified,
            Err(err) => {
                // Report a vanished file once, not on every poll.
                return self.modified.take().map(|_| Err(err));
            }
        };
        if modified == self.modified {
            return None;
        }
        self.modified = modified;
        Some(self.read())
    }

    fn modified_time(&self) -> Result<Option<SystemTime>, ConfigError> {
        let metadata = std::fs::metadata(&self.path).map_err(|source| ConfigError::Read {
            path: self.path.clone(),
            source,
        })?;
        Ok(metadata.modified().ok())
    }
}
