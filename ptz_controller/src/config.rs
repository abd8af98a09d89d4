use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use ptz_device::{AxisRange, AxisRanges};
use serde::{Deserialize, Serialize};

use crate::command_executor::{DEFAULT_CONNECT_TIMEOUT, FailurePolicy};

/// Prefix of environment variables overriding file values, e.g. `PTZ__INPUT__WHEEL_DELTA`.
pub const ENV_PREFIX: &str = "PTZ";
const ENV_SEPARATOR: &str = "__";

/// Tilt moves slower than pan for the same pointer offset.
const TILT_FACTOR: f32 = 0.6;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found at {path}")]
    FileNotFound { path: PathBuf },

    #[error("Failed to load configuration: {source}")]
    LoadError { source: ::config::ConfigError },

    #[error("Failed to serialize configuration: {source}")]
    SerializeError { source: toml::ser::Error },

    #[error("Failed to write configuration file: {source}")]
    WriteError { source: std::io::Error },

    #[error("Configuration validation failed: {message}")]
    ValidationError { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Multiplier applied to accumulated wheel deltas.
    pub zoom_sensitivity: i32,
    pub pan_tilt_sensitivity: f32,
    /// Wheel delta of one notch.
    pub wheel_delta: i32,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            zoom_sensitivity: 1,
            pan_tilt_sensitivity: 1.0,
            wheel_delta: 120,
        }
    }
}

impl InputConfig {
    pub fn pan_sensitivity(&self) -> f32 {
        self.pan_tilt_sensitivity
    }

    pub fn tilt_sensitivity(&self) -> f32 {
        self.pan_tilt_sensitivity * TILT_FACTOR
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub failure_policy: FailurePolicy,
    pub connect_poll_interval_ms: u64,
    pub connect_timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            failure_policy: FailurePolicy::Fatal,
            connect_poll_interval_ms: 1000,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT.as_secs(),
        }
    }
}

impl SessionConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.connect_poll_interval_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub name: String,
    pub latency_ms: u64,
    pub pan: AxisRange,
    pub tilt: AxisRange,
    pub zoom: AxisRange,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        let ranges = AxisRanges::default();
        Self {
            name: String::from("simulated-ptz"),
            latency_ms: 20,
            pan: ranges.pan,
            tilt: ranges.tilt,
            zoom: ranges.zoom,
        }
    }
}

impl DeviceConfig {
    pub fn ranges(&self) -> AxisRanges {
        AxisRanges {
            pan: self.pan,
            tilt: self.tilt,
            zoom: self.zoom,
        }
    }

    pub fn latency(&self) -> Duration {
        Duration::from_millis(self.latency_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Daily rolling log files are written here when set.
    pub directory: Option<PathBuf>,
    pub file_prefix: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: None,
            file_prefix: String::from("ptz_controller"),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PtzConfig {
    pub input: InputConfig,
    pub session: SessionConfig,
    pub device: DeviceConfig,
    pub logging: LoggingConfig,
}

impl PtzConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: String| Err(ConfigError::ValidationError { message });

        if self.input.pan_tilt_sensitivity <= f32::EPSILON {
            return invalid(format!(
                "input.pan_tilt_sensitivity must be positive, got {}",
                self.input.pan_tilt_sensitivity
            ));
        }
        if self.input.zoom_sensitivity < 1 {
            return invalid(format!(
                "input.zoom_sensitivity must be at least 1, got {}",
                self.input.zoom_sensitivity
            ));
        }
        if self.input.wheel_delta <= 0 {
            return invalid(format!(
                "input.wheel_delta must be positive, got {}",
                self.input.wheel_delta
            ));
        }
        for (axis, range) in [
            ("pan", self.device.pan),
            ("tilt", self.device.tilt),
            ("zoom", self.device.zoom),
        ] {
            if range.is_degenerate() {
                return invalid(format!(
                    "device.{axis} range [{}, {}] is empty",
                    range.min, range.max
                ));
            }
        }

        Ok(())
    }
}

#[derive(Debug)]
pub struct ConfigOptions {
    pub config_path: PathBuf,
    pub create_if_missing: bool,
}

impl Default for ConfigOptions {
    fn default() -> Self {
        Self {
            config_path: Self::default_config_path(),
            create_if_missing: true,
        }
    }
}

impl ConfigOptions {
    pub fn default_config_path() -> PathBuf {
        std::env::var("CONFIG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("default_config.toml"))
    }

    pub fn with_path<P: AsRef<Path>>(path: P) -> Self {
        Self {
            config_path: path.as_ref().to_path_buf(),
            ..Default::default()
        }
    }
}

#[derive(Debug)]
pub struct ConfigManager {
    options: ConfigOptions,
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigManager {
    pub fn new() -> Self {
        Self {
            options: ConfigOptions::default(),
        }
    }

    pub fn with_options(options: ConfigOptions) -> Self {
        Self { options }
    }

    pub fn path(&self) -> &Path {
        &self.options.config_path
    }

    /// Reads the file, applies `PTZ__` environment overrides and validates the result.
    pub fn load(&self) -> Result<PtzConfig, ConfigError> {
        let config_path = &self.options.config_path;

        if !config_path.exists() {
            if !self.options.create_if_missing {
                return Err(ConfigError::FileNotFound {
                    path: config_path.clone(),
                });
            }
            self.save(&PtzConfig::default())?;
        }

        let config: PtzConfig = ::config::Config::builder()
            .add_source(
                ::config::File::from(config_path.as_path()).format(::config::FileFormat::Toml),
            )
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator(ENV_SEPARATOR)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true),
            )
            .build()
            .and_then(|settings| settings.try_deserialize())
            .map_err(|e| ConfigError::LoadError { source: e })?;

        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, config: &PtzConfig) -> Result<(), ConfigError> {
        let config_path = &self.options.config_path;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError { source: e })?;
        }

        let content = toml::to_string_pretty(config)
            .map_err(|e| ConfigError::SerializeError { source: e })?;

        fs::write(config_path, content).map_err(|e| ConfigError::WriteError { source: e })?;

        Ok(())
    }
}

pub fn init_config() -> Result<(ConfigManager, PtzConfig), ConfigError> {
    init_config_with_options(ConfigOptions::default())
}

pub fn init_config_with_options(
    options: ConfigOptions,
) -> Result<(ConfigManager, PtzConfig), ConfigError> {
    let manager = ConfigManager::with_options(options);
    let config = manager.load()?;
    Ok((manager, config))
}

/// Writes the default configuration, replacing any existing file. Returns the path written.
pub fn create_default_config<P: AsRef<Path>>(path: Option<P>) -> Result<PathBuf, ConfigError> {
    let config_path = path
        .map(|p| p.as_ref().to_path_buf())
        .unwrap_or_else(ConfigOptions::default_config_path);

    let manager = ConfigManager::with_options(ConfigOptions {
        config_path: config_path.clone(),
        create_if_missing: true,
    });
    manager.save(&PtzConfig::default())?;

    Ok(config_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager_in(dir: &tempfile::TempDir, create_if_missing: bool) -> ConfigManager {
        ConfigManager::with_options(ConfigOptions {
            config_path: dir.path().join("nested").join("ptz.toml"),
            create_if_missing,
        })
    }

    #[test]
    fn missing_file_is_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_in(&dir, true);

        let config = manager.load().unwrap();

        assert_eq!(config, PtzConfig::default());
        assert!(manager.path().exists());
    }

    #[test]
    fn missing_file_is_an_error_when_creation_is_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let err = manager_in(&dir, false).load().unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }

    #[test]
    fn partial_file_keeps_defaults_for_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_in(&dir, false);
        fs::create_dir_all(manager.path().parent().unwrap()).unwrap();
        fs::write(
            manager.path(),
            r#"
[input]
zoom_sensitivity = 3

[session]
failure_policy = "tolerate_transient"

[device.pan]
min = -170.0
max = 170.0
"#,
        )
        .unwrap();

        let config = manager.load().unwrap();

        assert_eq!(config.input.zoom_sensitivity, 3);
        assert_eq!(config.input.wheel_delta, 120);
        assert_eq!(config.session.failure_policy, FailurePolicy::TolerateTransient);
        assert_eq!(config.device.pan, AxisRange::new(-170.0, 170.0));
        assert_eq!(config.device.zoom, AxisRanges::default().zoom);
    }

    #[test]
    fn saved_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_in(&dir, false);
        let mut config = PtzConfig::default();
        config.input.pan_tilt_sensitivity = 2.5;
        config.logging.directory = Some(PathBuf::from("logs"));
        config.logging.json = true;

        manager.save(&config).unwrap();

        assert_eq!(manager.load().unwrap(), config);
    }

    #[test]
    fn validation_rejects_bad_input_settings() {
        let mut config = PtzConfig::default();
        config.input.pan_tilt_sensitivity = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError { .. })
        ));

        let mut config = PtzConfig::default();
        config.input.zoom_sensitivity = 0;
        assert!(config.validate().is_err());

        let mut config = PtzConfig::default();
        config.input.wheel_delta = 0;
        assert!(config.validate().is_err());

        let mut config = PtzConfig::default();
        config.input.wheel_delta = -120;
        assert!(config.validate().is_err());

        let mut config = PtzConfig::default();
        config.device.tilt = AxisRange::new(0.5, 0.5);
        assert!(config.validate().is_err());
    }

    #[test]
    fn tilt_is_slower_than_pan() {
        let input = InputConfig {
            pan_tilt_sensitivity: 2.0,
            ..InputConfig::default()
        };
        assert_eq!(input.pan_sensitivity(), 2.0);
        assert!((input.tilt_sensitivity() - 1.2).abs() < 1e-6);
    }

    #[test]
    fn create_default_config_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ptz.toml");
        fs::write(&path, "garbage = [").unwrap();

        let written = create_default_config(Some(&path)).unwrap();

        assert_eq!(written, path);
        let manager = ConfigManager::with_options(ConfigOptions::with_path(&path));
        assert_eq!(manager.load().unwrap(), PtzConfig::default());
    }
}
