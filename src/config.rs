// config.rs

use crate::bus::DEFAULT_BAUD_RATE;
use crate::midi::{MidiSettings, DEFAULT_MIN_REST_MS, DEFAULT_TEMPO_US};
use crate::orchestrator::TransmitOptions;
use crate::playback::{MonitorOptions, DEFAULT_POLL_TIMEOUT, DEFAULT_SYNC_WAIT};
use crate::transport::DEFAULT_ACK_TIMEOUT;
use config::{Config, Environment, File, Map};
use log::{debug, LevelFilter};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Config file looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "nodesyncrs.toml";
/// Prefix of environment overrides, e.g. `NODESYNC__SERIAL__BAUD_RATE`.
pub const ENV_PREFIX: &str = "NODESYNC";

/// Bounds for the sync release wait, in milliseconds
pub const SYNC_WAIT_RANGE_MS: (u64, u64) = (10, 1000);

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("invalid setting {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SerialSettings {
    pub baud_rate: u32,
    pub ack_timeout_ms: u64,
    pub poll_timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MidiConfig {
    pub min_rest_ms: u64,
    pub default_tempo_us: u32,
    /// Merge synchronization markers into every track
    pub enable_sync: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PlaybackConfig {
    pub sync_wait_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TransmitConfig {
    pub retries: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LogConfig {
    pub level: String,
}

/// Application settings after layering defaults, file and environment.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Settings {
    pub serial: SerialSettings,
    pub midi: MidiConfig,
    pub playback: PlaybackConfig,
    pub transmit: TransmitConfig,
    pub log: LogConfig,
}

impl Settings {
    /// Loads settings from `path` (or `nodesyncrs.toml` if present) and the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        Self::load_with_env(path, None)
    }

    /// Like [`Settings::load`], reading overrides from `env` instead of the process environment.
    pub fn load_with_env(
        path: Option<&Path>,
        env: Option<Map<String, String>>,
    ) -> Result<Self, SettingsError> {
        // An explicit path must exist; the default file is optional
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let settings: Settings = defaults()?
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true)
                    .source(env),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        debug!("Loaded settings: {:?}", settings);
        Ok(settings)
    }

    /// Built-in defaults only.
    pub fn defaults() -> Result<Self, SettingsError> {
        Ok(defaults()?.build()?.try_deserialize()?)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.serial.baud_rate == 0 {
            return Err(invalid("serial.baud_rate", "must be greater than zero"));
        }
        if self.serial.ack_timeout_ms == 0 {
            return Err(invalid("serial.ack_timeout_ms", "must be greater than zero"));
        }
        if self.serial.poll_timeout_ms == 0 {
            return Err(invalid("serial.poll_timeout_ms", "must be greater than zero"));
        }
        if self.midi.default_tempo_us == 0 {
            return Err(invalid("midi.default_tempo_us", "must be greater than zero"));
        }
        let (min, max) = SYNC_WAIT_RANGE_MS;
        if !(min..=max).contains(&self.playback.sync_wait_ms) {
            return Err(invalid(
                "playback.sync_wait_ms",
                format!("must be between {} and {}", min, max),
            ));
        }
        self.log_level()?;
        Ok(())
    }

    pub fn log_level(&self) -> Result<LevelFilter, SettingsError> {
        self.log
            .level
            .parse()
            .map_err(|_| invalid("log.level", format!("unknown level '{}'", self.log.level)))
    }

    pub fn midi_settings(&self) -> MidiSettings {
        MidiSettings {
            default_tempo_us: self.midi.default_tempo_us,
            min_rest_ms: self.midi.min_rest_ms,
        }
    }

    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.serial.ack_timeout_ms)
    }

    pub fn transmit_options(&self) -> TransmitOptions {
        TransmitOptions {
            ack_timeout: self.ack_timeout(),
            retries: self.transmit.retries,
        }
    }

    pub fn monitor_options(&self) -> MonitorOptions {
        MonitorOptions {
            poll_timeout: Duration::from_millis(self.serial.poll_timeout_ms),
            sync_wait: Duration::from_millis(self.playback.sync_wait_ms),
        }
    }
}

fn invalid(key: &'static str, reason: impl Into<String>) -> SettingsError {
    SettingsError::Invalid {
        key,
        reason: reason.into(),
    }
}

fn millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

type Builder = config::builder::ConfigBuilder<config::builder::DefaultState>;

fn defaults() -> Result<Builder, SettingsError> {
    Ok(Config::builder()
        .set_default("serial.baud_rate", i64::from(DEFAULT_BAUD_RATE))?
        .set_default("serial.ack_timeout_ms", millis(DEFAULT_ACK_TIMEOUT))?
        .set_default("serial.poll_timeout_ms", millis(DEFAULT_POLL_TIMEOUT))?
        .set_default("midi.min_rest_ms", DEFAULT_MIN_REST_MS as i64)?
        .set_default("midi.default_tempo_us", i64::from(DEFAULT_TEMPO_US))?
        .set_default("midi.enable_sync", true)?
        .set_default("playback.sync_wait_ms", millis(DEFAULT_SYNC_WAIT))?
        .set_default("transmit.retries", 0i64)?
        .set_default("log.level", "debug")?)
}
