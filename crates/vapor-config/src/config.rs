//! Configuration structs with sensible defaults and RON persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Volumetric fog settings consumed by the fog pipeline.
    pub fog: FogConfig,
    /// Offscreen output settings (demo / capture).
    pub output: OutputConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Resolution at which the fog accumulation buffer is rendered.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum FogResolution {
    /// Native camera resolution.
    #[default]
    Full,
    /// Half the camera resolution per axis.
    Half,
    /// A quarter of the camera resolution per axis.
    Quarter,
}

impl std::str::FromStr for FogResolution {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "full" => Ok(Self::Full),
            "half" => Ok(Self::Half),
            "quarter" => Ok(Self::Quarter),
            other => Err(ConfigError::InvalidValue {
                field: "fog.resolution",
                value: other.to_string(),
            }),
        }
    }
}

/// Volumetric fog configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FogConfig {
    /// Configured render tier. Ignored (forced to full) while `temporal` is on.
    pub resolution: FogResolution,
    /// Enable jittered temporal rendering with history reprojection.
    pub temporal: bool,
    /// Temporal kernel resolution, clamped to `2..=256`.
    pub temporal_resolution: u32,
    /// Skip the bilateral blur passes. Upsampling still runs.
    pub disable_blur: bool,
    /// Seed for the jitter offset generator.
    pub jitter_seed: u64,
}

impl FogConfig {
    /// Smallest usable temporal kernel.
    pub const MIN_KERNEL_SIZE: u32 = 2;
    /// Largest temporal kernel. Its cell count, `k²`, must fit the jitter cursor.
    pub const MAX_KERNEL_SIZE: u32 = 256;

    /// Effective temporal kernel size: `temporal_resolution` clamped to
    /// `MIN_KERNEL_SIZE..=MAX_KERNEL_SIZE`.
    pub fn kernel_size(&self) -> u32 {
        self.temporal_resolution
            .clamp(Self::MIN_KERNEL_SIZE, Self::MAX_KERNEL_SIZE)
    }
}

/// Offscreen output configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Number of frames to render before capturing.
    pub frames: u32,
    /// Where the captured image is written.
    pub path: PathBuf,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
    /// Treat the camera as an editor/scene view (suppresses motion influence).
    pub scene_view: bool,
}

// --- Default implementations ---

impl Default for FogConfig {
    fn default() -> Self {
        Self {
            resolution: FogResolution::Half,
            temporal: false,
            temporal_resolution: 4,
            disable_blur: false,
            jitter_seed: 0x5eed,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            frames: 16,
            path: PathBuf::from("fog.png"),
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            scene_view: false,
        }
    }
}

// --- Load / Save / Reload ---

impl Config {
    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join("config.ron");

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
            let config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let config_path = config_dir.join("config.ron");
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(&config_path, serialized).map_err(ConfigError::WriteError)?;
        Ok(())
    }

    /// Hot-reload: returns `Some(new_config)` if the file changed, `None` otherwise.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let config_path = config_dir.join("config.ron");
        let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
        let new_config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_serializes() {
        let config = Config::default();
        let ron_str =
            ron::ser::to_string_pretty(&config, ron::ser::PrettyConfig::new().depth_limit(3))
                .unwrap();
        assert!(ron_str.contains("resolution: Half"));
        assert!(ron_str.contains("temporal_resolution: 4"));
    }

    #[test]
    fn test_config_roundtrip() {
        let mut config = Config::default();
        config.fog.resolution = FogResolution::Quarter;
        config.fog.temporal = true;
        let ron_str = ron::to_string(&config).unwrap();
        let deserialized: Config = ron::from_str(&ron_str).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_missing_field_uses_default() {
        let ron_str = "(fog: (temporal: true))";
        let config: Config = ron::from_str(ron_str).unwrap();
        assert!(config.fog.temporal);
        assert_eq!(config.fog.temporal_resolution, 4);
        assert_eq!(config.output, OutputConfig::default());
    }

    #[test]
    fn test_extra_field_ignored() {
        let result: Result<Config, _> = ron::from_str("(future_setting: true)");
        assert!(result.is_ok());
    }

    #[test]
    fn test_kernel_size_is_clamped() {
        let mut fog = FogConfig::default();
        for (configured, expected) in [
            (0, 2),
            (1, 2),
            (2, 2),
            (3, 3),
            (8, 8),
            (256, 256),
            (65536, 256),
            (u32::MAX, 256),
        ] {
            fog.temporal_resolution = configured;
            assert_eq!(fog.kernel_size(), expected, "temporal_resolution {configured}");
        }
    }

    #[test]
    fn test_resolution_from_str() {
        assert_eq!("full".parse::<FogResolution>().unwrap(), FogResolution::Full);
        assert_eq!("Half".parse::<FogResolution>().unwrap(), FogResolution::Half);
        assert_eq!(
            "QUARTER".parse::<FogResolution>().unwrap(),
            FogResolution::Quarter
        );
        assert!(matches!(
            "eighth".parse::<FogResolution>(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.fog.disable_blur = true;
        config.output.width = 640;

        config.save(dir.path()).unwrap();
        let loaded = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_load_or_create_writes_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, Config::default());
        assert!(dir.path().join("config.ron").exists());
    }

    #[test]
    fn test_reload_detects_changes() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        config.save(dir.path()).unwrap();

        let mut modified = config.clone();
        modified.fog.temporal = true;
        modified.save(dir.path()).unwrap();

        let result = config.reload(dir.path()).unwrap();
        assert!(result.unwrap().fog.temporal);
    }

    #[test]
    fn test_reload_no_changes() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        config.save(dir.path()).unwrap();

        let result = config.reload(dir.path()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_invalid_ron_produces_error() {
        let result: Result<Config, _> = ron::from_str("{{not valid}}");
        assert!(result.is_err());
    }
}
