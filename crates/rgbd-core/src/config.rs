//! Capture configuration using Figment.
//!
//! Configuration is loaded from:
//! 1. a TOML file (base configuration, optional)
//! 2. environment variables prefixed with `RGBD_`, nested keys separated by
//!    `__` (e.g. `RGBD_STORAGE__WORKERS=8`)
//!
//! # Example
//! ```no_run
//! use rgbd_core::config::CaptureConfig;
//!
//! let config = CaptureConfig::load_from("rgbd.toml")?;
//! config.validate()?;
//! # Ok::<(), rgbd_core::CaptureError>(())
//! ```

use crate::channel::{Resolution, SensorGeometry, SerializationFlags};
use crate::error::{CaptureError, CaptureResult};
use crate::logging::OutputFormat;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "RGBD_";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Application settings
    pub application: ApplicationConfig,
    /// Serialization settings
    pub storage: StorageConfig,
    /// Sensor settings
    pub sensor: SensorConfig,
    /// Shots captured in order
    pub shots: Vec<ShotDefinition>,
}

/// Application-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Log output format
    pub log_format: OutputFormat,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: OutputFormat::Pretty,
        }
    }
}

/// Serialization worker and output configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Session root directory
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Number of serialization worker threads
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// How long an idle worker waits for pending work before re-checking
    #[serde(default = "default_idle_wait_ms")]
    pub idle_wait_ms: u64,
    /// JPEG quality for color frames (1-100)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    /// Upper bound on the end-of-shot drain barrier
    #[serde(default = "default_drain_timeout_secs")]
    pub drain_timeout_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            workers: default_workers(),
            idle_wait_ms: default_idle_wait_ms(),
            jpeg_quality: default_jpeg_quality(),
            drain_timeout_secs: default_drain_timeout_secs(),
        }
    }
}

impl StorageConfig {
    /// Idle wait as a duration.
    #[must_use]
    pub fn idle_wait(&self) -> Duration {
        Duration::from_millis(self.idle_wait_ms)
    }

    /// Drain timeout as a duration.
    #[must_use]
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }
}

/// Sensor stream configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorConfig {
    /// Frame arrival rate
    #[serde(default = "default_frame_rate")]
    pub frame_rate_hz: f64,
    /// Stream resolutions
    #[serde(default)]
    pub geometry: GeometryConfig,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            frame_rate_hz: default_frame_rate(),
            geometry: GeometryConfig::default(),
        }
    }
}

/// Named geometry presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeometryPreset {
    /// 1920x1080 color, 512x424 depth
    KinectV2,
}

/// Geometry given either as a preset name or explicit `[width, height]` pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GeometryConfig {
    /// A named preset, e.g. `geometry = "kinect_v2"`
    Preset(GeometryPreset),
    /// Explicit resolutions, e.g. `geometry = { color = [64, 48], depth = [32, 24] }`
    Custom {
        /// Color `[width, height]`
        color: [u16; 2],
        /// Depth `[width, height]`
        depth: [u16; 2],
    },
}

impl Default for GeometryConfig {
    fn default() -> Self {
        GeometryConfig::Preset(GeometryPreset::KinectV2)
    }
}

impl GeometryConfig {
    /// Resolve to a concrete geometry.
    #[must_use]
    pub fn resolve(&self) -> SensorGeometry {
        match *self {
            GeometryConfig::Preset(GeometryPreset::KinectV2) => SensorGeometry::KINECT_V2,
            GeometryConfig::Custom { color, depth } => SensorGeometry::new(
                Resolution::new(color[0], color[1]),
                Resolution::new(depth[0], depth[1]),
            ),
        }
    }
}

/// One bounded capture: pool sizing, frame budget and enabled channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShotDefinition {
    /// Pool capacity for this shot
    #[serde(default = "default_buffer_count")]
    pub buffer_count: usize,
    /// Frames to capture, 0 = until stopped externally
    #[serde(default = "default_frames_to_capture")]
    pub frames_to_capture: u64,
    /// Channels serialized in this shot
    #[serde(default)]
    pub channels: SerializationFlags,
}

impl Default for ShotDefinition {
    fn default() -> Self {
        Self {
            buffer_count: default_buffer_count(),
            frames_to_capture: default_frames_to_capture(),
            channels: SerializationFlags::default(),
        }
    }
}

impl ShotDefinition {
    /// True if the shot only ends on an external stop.
    #[must_use]
    pub const fn is_unbounded(&self) -> bool {
        self.frames_to_capture == 0
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("captures")
}

fn default_workers() -> usize {
    4
}

fn default_idle_wait_ms() -> u64 {
    5
}

fn default_jpeg_quality() -> u8 {
    90
}

fn default_drain_timeout_secs() -> u64 {
    60
}

fn default_frame_rate() -> f64 {
    30.0
}

fn default_buffer_count() -> usize {
    50
}

fn default_frames_to_capture() -> u64 {
    100
}

impl CaptureConfig {
    /// Load from a TOML file (missing file = defaults) and `RGBD_` environment variables.
    pub fn load_from<P: AsRef<Path>>(path: P) -> CaptureResult<Self> {
        Self::extract(
            Figment::new()
                .merge(Toml::file(path.as_ref()))
                .merge(Env::prefixed(ENV_PREFIX).split("__")),
        )
    }

    /// Parse configuration from a TOML string, without environment overrides.
    pub fn from_toml_str(toml: &str) -> CaptureResult<Self> {
        Self::extract(Figment::new().merge(Toml::string(toml)))
    }

    /// Extract from an arbitrary figment.
    pub fn extract(figment: Figment) -> CaptureResult<Self> {
        let mut config: Self = figment.extract()?;
        if config.shots.is_empty() {
            config.shots.push(ShotDefinition::default());
        }
        Ok(config)
    }

    /// Render as TOML, e.g. to show the effective configuration.
    pub fn to_toml_string(&self) -> CaptureResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| CaptureError::Configuration(format!("Failed to render TOML: {e}")))
    }

    /// Sensor geometry resolved from the sensor section.
    #[must_use]
    pub fn geometry(&self) -> SensorGeometry {
        self.sensor.geometry.resolve()
    }

    /// Validate configuration after loading.
    pub fn validate(&self) -> CaptureResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.to_lowercase().as_str()) {
            return Err(CaptureError::Configuration(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            )));
        }

        if self.storage.workers == 0 {
            return Err(CaptureError::Configuration(
                "storage.workers must be at least 1".to_string(),
            ));
        }

        if !(1..=100).contains(&self.storage.jpeg_quality) {
            return Err(CaptureError::Configuration(format!(
                "Invalid jpeg_quality {}. Must be 1-100",
                self.storage.jpeg_quality
            )));
        }

        if self.sensor.frame_rate_hz.is_nan() || self.sensor.frame_rate_hz <= 0.0 {
            return Err(CaptureError::Configuration(format!(
                "Invalid frame_rate_hz {}. Must be positive",
                self.sensor.frame_rate_hz
            )));
        }

        if self.geometry().is_degenerate() {
            return Err(CaptureError::Configuration(
                "sensor.geometry has a zero dimension".to_string(),
            ));
        }

        for (index, shot) in self.shots.iter().enumerate() {
            if shot.buffer_count == 0 {
                return Err(CaptureError::Configuration(format!(
                    "shots[{index}].buffer_count must be at least 1"
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = CaptureConfig::from_toml_str("").unwrap();
        assert_eq!(config.application.log_level, "info");
        assert_eq!(config.storage.workers, 4);
        assert_eq!(config.storage.jpeg_quality, 90);
        assert_eq!(config.geometry(), SensorGeometry::KINECT_V2);
        assert_eq!(config.shots, vec![ShotDefinition::default()]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_config() {
        let config = CaptureConfig::from_toml_str(
            r#"
            [application]
            log_level = "debug"
            log_format = "json"

            [storage]
            output_dir = "/tmp/rgbd"
            workers = 2

            [sensor]
            frame_rate_hz = 60.0
            geometry = { color = [64, 48], depth = [32, 24] }

            [[shots]]
            buffer_count = 10
            frames_to_capture = 0
            [shots.channels]
            color = false
            depth_mapping = true

            [[shots]]
            buffer_count = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.application.log_format, OutputFormat::Json);
        assert_eq!(config.storage.workers, 2);
        assert_eq!(config.storage.idle_wait_ms, 5);
        assert_eq!(config.geometry().color, Resolution::new(64, 48));
        assert_eq!(config.shots.len(), 2);
        assert!(config.shots[0].is_unbounded());
        assert!(!config.shots[0].channels.color);
        assert!(config.shots[0].channels.depth);
        assert!(config.shots[0].channels.depth_mapping);
        assert_eq!(config.shots[1].frames_to_capture, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_preset_geometry() {
        let config = CaptureConfig::from_toml_str(
            r#"
            [sensor]
            geometry = "kinect_v2"
            "#,
        )
        .unwrap();
        assert_eq!(config.geometry(), SensorGeometry::KINECT_V2);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = CaptureConfig::from_toml_str("").unwrap();
        config.application.log_level = "loud".to_string();
        assert!(matches!(
            config.validate(),
            Err(CaptureError::Configuration(_))
        ));

        let mut config = CaptureConfig::from_toml_str("").unwrap();
        config.storage.workers = 0;
        assert!(config.validate().is_err());

        let mut config = CaptureConfig::from_toml_str("").unwrap();
        config.storage.jpeg_quality = 0;
        assert!(config.validate().is_err());

        let mut config = CaptureConfig::from_toml_str("").unwrap();
        config.shots[0].buffer_count = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("shots[0]"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[storage]\nworkers = 6\n").unwrap();

        let config = CaptureConfig::load_from(file.path()).unwrap();
        assert_eq!(config.storage.workers, 6);
    }

    #[test]
    fn test_type_mismatch_is_config_error() {
        let result = CaptureConfig::from_toml_str("[storage]\nworkers = \"many\"\n");
        assert!(matches!(result, Err(CaptureError::Config(_))));
    }

    #[test]
    fn test_rendered_toml_parses_back() {
        let mut config = CaptureConfig::from_toml_str("").unwrap();
        config.storage.workers = 6;
        config.sensor.geometry = GeometryConfig::Custom {
            color: [64, 48],
            depth: [32, 24],
        };
        let text = config.to_toml_string().unwrap();
        assert!(text.contains("workers = 6"));
        assert_eq!(CaptureConfig::from_toml_str(&text).unwrap(), config);
    }
}
