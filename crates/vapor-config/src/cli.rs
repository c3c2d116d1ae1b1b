//! Command-line argument parsing.

use std::path::PathBuf;

use clap::Parser;

use crate::{Config, FogResolution};

/// Vapor command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "vapor", about = "Volumetric fog renderer")]
pub struct CliArgs {
    /// Output width.
    #[arg(long)]
    pub width: Option<u32>,

    /// Output height.
    #[arg(long)]
    pub height: Option<u32>,

    /// Number of frames to render.
    #[arg(long)]
    pub frames: Option<u32>,

    /// Output image path.
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Fog resolution tier (full, half, quarter).
    #[arg(long)]
    pub resolution: Option<FogResolution>,

    /// Enable or disable temporal rendering.
    #[arg(long)]
    pub temporal: Option<bool>,

    /// Temporal kernel resolution (2 to 256).
    #[arg(long, value_parser = clap::value_parser!(u32).range(2..=256))]
    pub temporal_resolution: Option<u32>,

    /// Disable the bilateral blur passes.
    #[arg(long)]
    pub disable_blur: Option<bool>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(w) = args.width {
            self.output.width = w;
        }
        if let Some(h) = args.height {
            self.output.height = h;
        }
        if let Some(frames) = args.frames {
            self.output.frames = frames;
        }
        if let Some(ref path) = args.output {
            self.output.path = path.clone();
        }
        if let Some(resolution) = args.resolution {
            self.fog.resolution = resolution;
        }
        if let Some(temporal) = args.temporal {
            self.fog.temporal = temporal;
        }
        if let Some(k) = args.temporal_resolution {
            self.fog.temporal_resolution = k;
        }
        if let Some(disable) = args.disable_blur {
            self.fog.disable_blur = disable;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_override() {
        let mut config = Config::default();
        let args = CliArgs {
            width: Some(1920),
            resolution: Some(FogResolution::Quarter),
            temporal: Some(true),
            ..Default::default()
        };
        config.apply_cli_overrides(&args);
        assert_eq!(config.output.width, 1920);
        assert_eq!(config.fog.resolution, FogResolution::Quarter);
        assert!(config.fog.temporal);
        // Non-overridden fields retain defaults
        assert_eq!(config.output.height, 720);
        assert_eq!(config.fog.temporal_resolution, 4);
    }

    #[test]
    fn test_cli_no_override() {
        let original = Config::default();
        let mut config = Config::default();
        config.apply_cli_overrides(&CliArgs::default());
        assert_eq!(config, original);
    }

    #[test]
    fn test_cli_parses_resolution_names() {
        let args = CliArgs::try_parse_from(["vapor", "--resolution", "quarter", "--temporal", "true"])
            .unwrap();
        assert_eq!(args.resolution, Some(FogResolution::Quarter));
        assert_eq!(args.temporal, Some(true));
    }

    #[test]
    fn test_cli_rejects_kernel_out_of_range() {
        for value in ["1", "257", "65536"] {
            let result = CliArgs::try_parse_from(["vapor", "--temporal-resolution", value]);
            assert!(result.is_err(), "temporal resolution {value}");
        }
        let args = CliArgs::try_parse_from(["vapor", "--temporal-resolution", "256"]).unwrap();
        assert_eq!(args.temporal_resolution, Some(256));
    }
}
