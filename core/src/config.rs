//! Engine tuning knobs (§6 "CLI/config surface"): a TOML file plus
//! `DRIFT_`-prefixed environment overrides, via the `config` crate.

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use drift_types::Resolution;

pub static DEFAULT_CONFIG: &str = include_str!("../Drift.toml");

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Settings {
    #[serde(default)]
    pub engine: EngineSettings,
    #[serde(default)]
    pub daemon: DaemonSettings,
}

impl Default for Settings {
    #[inline]
    fn default() -> Self {
        Self {
            engine: EngineSettings::default(),
            daemon: DaemonSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file plus `DRIFT_`-prefixed environment
    /// variables (e.g. `DRIFT_ENGINE__CROSSFADE_DURATION_SECONDS=3.0`).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or does not parse into
    /// `Settings`.
    #[inline]
    pub fn init(config_path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let built = Config::builder()
            .add_source(File::from(config_path.as_ref()))
            .add_source(Environment::with_prefix("DRIFT").separator("__"))
            .build()?;
        built.try_deserialize()
    }

    /// Default path for the config file, via the platform-appropriate
    /// config directory for this project.
    ///
    /// # Errors
    ///
    /// Returns an error if the system config directory could not be found or
    /// the default config could not be written to it.
    #[inline]
    pub fn get_config_path() -> Result<PathBuf, std::io::Error> {
        let Some(proj_dirs) = directories::ProjectDirs::from("com", "drift", "drift-radio") else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "unable to find the config directory for the drift radio engine",
            ));
        };
        let config_dir = proj_dirs.config_local_dir();
        if !config_dir.exists() {
            std::fs::create_dir_all(config_dir)?;
        }
        let config_file = config_dir.join("Drift.toml");
        if !config_file.exists() {
            std::fs::write(&config_file, DEFAULT_CONFIG)?;
        }
        Ok(config_file)
    }
}

/// Engine tuning knobs covering the exploration, mixing, and session
/// behavior described in §6.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct EngineSettings {
    #[serde(default = "default_resolution")]
    pub default_resolution: Resolution,
    #[serde(default = "default_mixdown_cache_size")]
    pub mixdown_cache_size: usize,
    #[serde(default = "default_crossfade_duration_seconds")]
    pub crossfade_duration_seconds: f32,
    #[serde(default = "default_silence_threshold")]
    pub silence_threshold: f32,
    #[serde(default = "default_chunk_size_bytes")]
    pub chunk_size_bytes: usize,
    #[serde(default = "default_tempo_tolerance")]
    pub tempo_tolerance: f32,
    #[serde(default = "default_crossfade_guard_seconds")]
    pub crossfade_guard_seconds: f32,
    #[serde(default = "default_user_selection_debounce_ms")]
    pub user_selection_debounce_ms: u64,
    #[serde(default = "default_stack_total")]
    pub stack_total: usize,
    #[serde(default = "default_stack_random")]
    pub stack_random: usize,
    #[serde(default = "default_max_dimensions")]
    pub max_dimensions: usize,
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_channels")]
    pub channels: u16,
    #[serde(default = "default_bitrate_kbps")]
    pub bitrate_kbps: u32,
    #[serde(default = "default_fingerprint_ttl_seconds")]
    pub fingerprint_ttl_seconds: u64,
    #[serde(default = "default_noise_rate_limit_window_seconds")]
    pub noise_rate_limit_window_seconds: u64,
    #[serde(default = "default_noise_rate_limit_max_events")]
    pub noise_rate_limit_max_events: u32,
}

const fn default_resolution() -> Resolution {
    Resolution::MagnifyingGlass
}
const fn default_mixdown_cache_size() -> usize {
    32
}
const fn default_crossfade_duration_seconds() -> f32 {
    2.5
}
const fn default_silence_threshold() -> f32 {
    drift_analysis::DEFAULT_SILENCE_THRESHOLD
}
const fn default_chunk_size_bytes() -> usize {
    // ~40ms of 44.1kHz 16-bit stereo PCM-equivalent compressed chunk size.
    4096
}
const fn default_tempo_tolerance() -> f32 {
    0.17
}
const fn default_crossfade_guard_seconds() -> f32 {
    6.0
}
const fn default_user_selection_debounce_ms() -> u64 {
    5000
}
const fn default_stack_total() -> usize {
    15
}
const fn default_stack_random() -> usize {
    3
}
const fn default_max_dimensions() -> usize {
    12
}
const fn default_tick_interval_ms() -> u64 {
    40
}
const fn default_sample_rate() -> u32 {
    44100
}
const fn default_channels() -> u16 {
    2
}
const fn default_bitrate_kbps() -> u32 {
    192
}
const fn default_fingerprint_ttl_seconds() -> u64 {
    3600
}
const fn default_noise_rate_limit_window_seconds() -> u64 {
    5
}
const fn default_noise_rate_limit_max_events() -> u32 {
    3
}

impl Default for EngineSettings {
    #[inline]
    fn default() -> Self {
        Self {
            default_resolution: default_resolution(),
            mixdown_cache_size: default_mixdown_cache_size(),
            crossfade_duration_seconds: default_crossfade_duration_seconds(),
            silence_threshold: default_silence_threshold(),
            chunk_size_bytes: default_chunk_size_bytes(),
            tempo_tolerance: default_tempo_tolerance(),
            crossfade_guard_seconds: default_crossfade_guard_seconds(),
            user_selection_debounce_ms: default_user_selection_debounce_ms(),
            stack_total: default_stack_total(),
            stack_random: default_stack_random(),
            max_dimensions: default_max_dimensions(),
            tick_interval_ms: default_tick_interval_ms(),
            sample_rate: default_sample_rate(),
            channels: default_channels(),
            bitrate_kbps: default_bitrate_kbps(),
            fingerprint_ttl_seconds: default_fingerprint_ttl_seconds(),
            noise_rate_limit_window_seconds: default_noise_rate_limit_window_seconds(),
            noise_rate_limit_max_events: default_noise_rate_limit_max_events(),
        }
    }
}

/// Process-level knobs that gate behavior but aren't themselves core logic
/// (data directory, log level).
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct DaemonSettings {
    #[serde(default = "default_log_level")]
    #[serde(deserialize_with = "de_log_level")]
    pub log_level: log::LevelFilter,
    #[serde(default)]
    pub corpus_path: Option<PathBuf>,
}

fn de_log_level<'de, D>(deserializer: D) -> Result<log::LevelFilter, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use std::str::FromStr;
    let s = String::deserialize(deserializer)?;
    Ok(log::LevelFilter::from_str(&s).unwrap_or_else(|_| default_log_level()))
}

const fn default_log_level() -> log::LevelFilter {
    log::LevelFilter::Info
}

impl Default for DaemonSettings {
    #[inline]
    fn default() -> Self {
        Self { log_level: default_log_level(), corpus_path: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_config_file_parses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Drift.toml");
        std::fs::write(&path, DEFAULT_CONFIG).unwrap();
        let settings = Settings::init(&path);
        assert!(settings.is_ok(), "{:?}", settings.err());
    }

    #[test]
    fn missing_fields_use_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Drift.toml");
        std::fs::write(&path, "").unwrap();
        let settings = Settings::init(&path).unwrap();
        assert_eq!(settings.engine.stack_total, 15);
        assert_eq!(settings.engine.stack_random, 3);
    }

    #[test]
    fn env_override_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Drift.toml");
        std::fs::write(&path, "").unwrap();
        // SAFETY: test-local env var, no other thread in this test process reads it concurrently.
        unsafe {
            std::env::set_var("DRIFT_ENGINE__STACK_TOTAL", "20");
        }
        let settings = Settings::init(&path).unwrap();
        unsafe {
            std::env::remove_var("DRIFT_ENGINE__STACK_TOTAL");
        }
        assert_eq!(settings.engine.stack_total, 20);
    }
}
