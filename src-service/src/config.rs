//! Configuration management for LoopGrab.
//!
//! Handles loading and saving user configuration to platform-standard config directories:
//! - Linux: `~/.config/loopgrab/config.json`
//! - macOS: `~/Library/Application Support/loopgrab/config.json`
//! - Windows: `%APPDATA%\loopgrab\config.json`

use directories::{ProjectDirs, UserDirs};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Recorder MIME types in order of preference.
pub fn default_recorder_mime_types() -> Vec<String> {
    [
        "audio/webm;codecs=opus",
        "audio/webm",
        "audio/ogg;codecs=opus",
        "audio/ogg",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_timeslice_ms() -> u64 {
    500
}

fn default_stop_timeout_ms() -> u64 {
    15_000
}

/// Output-related configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct OutputConfig {
    /// Custom output directory. If None, uses the system Downloads folder.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<String>,
}

/// Recorder configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaptureConfig {
    /// Candidate recorder MIME types, most preferred first. When none is
    /// supported the recorder picks its own default.
    #[serde(default = "default_recorder_mime_types")]
    pub recorder_mime_types: Vec<String>,
    /// Interval at which the recorder emits data chunks.
    #[serde(default = "default_timeslice_ms")]
    pub timeslice_ms: u64,
    /// How long a stopped recorder may take to confirm and flush.
    #[serde(default = "default_stop_timeout_ms")]
    pub stop_timeout_ms: u64,
}

impl CaptureConfig {
    pub fn timeslice(&self) -> Duration {
        Duration::from_millis(self.timeslice_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            recorder_mime_types: default_recorder_mime_types(),
            timeslice_ms: default_timeslice_ms(),
            stop_timeout_ms: default_stop_timeout_ms(),
        }
    }
}

/// Loop boundary detection tunables.
///
/// The thresholds assume the default 100ms polling cadence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DetectionConfig {
    /// Position polling interval.
    pub poll_interval_ms: u64,
    /// Minimum backwards jump (seconds) that counts as a wrap.
    pub wrap_drop_secs: f64,
    /// Alignment only accepts a wrap landing at or below this position.
    pub near_start_secs: f64,
    /// Distance from the known duration treated as the end of the iteration.
    pub near_tail_secs: f64,
    /// Position that must be exceeded before wraps count as iteration ends.
    pub progress_secs: f64,
    /// Upper bound on waiting for element metadata.
    pub metadata_timeout_ms: u64,
    /// Duration assumed for timeout computation when the element reports none.
    pub fallback_duration_secs: f64,
    /// Timeout budget per second of media.
    pub timeout_ms_per_media_sec: f64,
    pub align_timeout_min_ms: u64,
    pub align_timeout_max_ms: u64,
    /// Extra time granted to the iteration-end wait on top of the per-second budget.
    pub iteration_grace_ms: u64,
    pub iteration_timeout_min_ms: u64,
    pub iteration_timeout_max_ms: u64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            wrap_drop_secs: 0.4,
            near_start_secs: 0.25,
            near_tail_secs: 0.2,
            progress_secs: 0.5,
            metadata_timeout_ms: 20_000,
            fallback_duration_secs: 30.0,
            timeout_ms_per_media_sec: 1500.0,
            align_timeout_min_ms: 10_000,
            align_timeout_max_ms: 120_000,
            iteration_grace_ms: 15_000,
            iteration_timeout_min_ms: 30_000,
            iteration_timeout_max_ms: 180_000,
        }
    }
}

impl DetectionConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_millis(self.metadata_timeout_ms)
    }
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct AppConfig {
    /// Output settings group.
    #[serde(default)]
    pub output: OutputConfig,
    /// Recorder settings group.
    #[serde(default)]
    pub capture: CaptureConfig,
    /// Boundary detection settings group.
    #[serde(default)]
    pub detection: DetectionConfig,
}

/// Get the path to the config file.
pub fn get_config_path() -> Result<PathBuf, String> {
    let proj_dirs = ProjectDirs::from("", "", "loopgrab")
        .ok_or("Could not determine config directory")?;

    Ok(proj_dirs.config_dir().join("config.json"))
}

/// Load configuration from disk.
/// Returns default config if the file is invalid. On first run the defaults
/// are written out so there is a file to edit.
pub fn load_config() -> AppConfig {
    match get_config_path() {
        Ok(path) => load_or_init_config(&path),
        Err(e) => {
            warn!("Failed to get config path: {}", e);
            AppConfig::default()
        }
    }
}

/// Load configuration from a specific file, falling back to defaults.
pub fn load_config_from(config_path: &Path) -> AppConfig {
    if !config_path.exists() {
        info!("No config file found, using defaults");
        return AppConfig::default();
    }

    match fs::read_to_string(config_path) {
        Ok(contents) => match serde_json::from_str::<AppConfig>(&contents) {
            Ok(config) => {
                info!("Loaded config from {:?}", config_path);
                config
            }
            Err(e) => {
                warn!("Failed to parse config file: {}. Using defaults.", e);
                AppConfig::default()
            }
        },
        Err(e) => {
            warn!("Failed to read config file: {}. Using defaults.", e);
            AppConfig::default()
        }
    }
}

/// Load configuration from `config_path`, writing the defaults there when the
/// file does not exist yet.
pub fn load_or_init_config(config_path: &Path) -> AppConfig {
    if config_path.exists() {
        return load_config_from(config_path);
    }

    let config = AppConfig::default();
    match save_config_to(&config, config_path) {
        Ok(()) => info!("Wrote default config to {:?}", config_path),
        Err(e) => warn!("{}", e),
    }
    config
}

/// Save configuration to a specific file.
/// Creates the config directory if it doesn't exist.
pub fn save_config_to(config: &AppConfig, config_path: &Path) -> Result<(), String> {
    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }

    let json = serde_json::to_string_pretty(config)
        .map_err(|e| format!("Failed to serialize config: {}", e))?;

    fs::write(config_path, json).map_err(|e| format!("Failed to write config file: {}", e))?;

    info!("Saved config to {:?}", config_path);
    Ok(())
}

/// Get the default output directory (system Downloads folder).
pub fn get_default_output_dir() -> Result<PathBuf, String> {
    let user_dirs = UserDirs::new().ok_or("Could not determine user directories")?;

    // Downloads first, home directory otherwise
    let output_dir = user_dirs
        .download_dir()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| user_dirs.home_dir().to_path_buf());

    Ok(output_dir)
}

/// Get the configured output directory, falling back to default if not set.
pub fn get_output_dir(config: &AppConfig) -> Result<PathBuf, String> {
    match &config.output.directory {
        Some(dir) if !dir.is_empty() => Ok(PathBuf::from(dir)),
        _ => get_default_output_dir(),
    }
}
