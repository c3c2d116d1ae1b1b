//! Fog resolution tiers and the resolution planner.

use vapor_config::{FogConfig, FogResolution};

use crate::binding::{
    CAMERA_DEPTH_TEXTURE, HALF_DEPTH_TARGET, HALF_VOLUME_FOG_TEXTURE, QUARTER_DEPTH_TARGET,
    QUARTER_VOLUME_FOG_TEXTURE, ShaderBinding, VOLUME_FOG_TEXTURE,
};

/// Spatial resolution at which the fog accumulation buffer is rendered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FogTier {
    Full,
    Half,
    Quarter,
}

impl FogTier {
    /// Per-axis divisor relative to the camera resolution.
    pub const fn divisor(self) -> u32 {
        match self {
            Self::Full => 1,
            Self::Half => 2,
            Self::Quarter => 4,
        }
    }

    /// Whether this tier renders below camera resolution and needs upsampling.
    pub const fn is_reduced(self) -> bool {
        !matches!(self, Self::Full)
    }

    /// Texture extent for this tier; see [`tier_extent`].
    pub fn extent(self, width: u32, height: u32) -> (u32, u32) {
        tier_extent(width, height, self)
    }

    /// Binding of the fog buffer rendered at this tier.
    pub const fn fog_binding(self) -> ShaderBinding {
        match self {
            Self::Full => VOLUME_FOG_TEXTURE,
            Self::Half => HALF_VOLUME_FOG_TEXTURE,
            Self::Quarter => QUARTER_VOLUME_FOG_TEXTURE,
        }
    }

    /// Binding of the depth buffer matching this tier's resolution.
    pub const fn depth_binding(self) -> ShaderBinding {
        match self {
            Self::Full => CAMERA_DEPTH_TEXTURE,
            Self::Half => HALF_DEPTH_TARGET,
            Self::Quarter => QUARTER_DEPTH_TARGET,
        }
    }
}

impl From<FogResolution> for FogTier {
    fn from(resolution: FogResolution) -> Self {
        match resolution {
            FogResolution::Full => Self::Full,
            FogResolution::Half => Self::Half,
            FogResolution::Quarter => Self::Quarter,
        }
    }
}

/// Active tier for a frame.
///
/// Temporal mode forces [`FogTier::Full`]: the jitter tile already renders at
/// reduced resolution and reconstructs full detail over several frames.
pub fn plan_tier(configured: FogResolution, temporal: bool) -> FogTier {
    if temporal {
        FogTier::Full
    } else {
        configured.into()
    }
}

/// Active tier for a frame under `config`.
pub fn plan_tier_for(config: &FogConfig) -> FogTier {
    plan_tier(config.resolution, config.temporal)
}

/// Floor-divided extent at `tier`, never smaller than 1x1.
pub fn tier_extent(width: u32, height: u32, tier: FogTier) -> (u32, u32) {
    scaled_extent(width, height, tier.divisor())
}

/// `(width / divisor, height / divisor)` floored, clamped to at least 1 per axis.
pub fn scaled_extent(width: u32, height: u32, divisor: u32) -> (u32, u32) {
    let divisor = divisor.max(1);
    ((width / divisor).max(1), (height / divisor).max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temporal_forces_full() {
        for resolution in [
            FogResolution::Full,
            FogResolution::Half,
            FogResolution::Quarter,
        ] {
            assert_eq!(plan_tier(resolution, true), FogTier::Full);
        }
    }

    #[test]
    fn test_configured_tier_without_temporal() {
        assert_eq!(plan_tier(FogResolution::Full, false), FogTier::Full);
        assert_eq!(plan_tier(FogResolution::Half, false), FogTier::Half);
        assert_eq!(plan_tier(FogResolution::Quarter, false), FogTier::Quarter);
    }

    #[test]
    fn test_plan_from_config() {
        let config = FogConfig {
            resolution: FogResolution::Quarter,
            temporal: false,
            ..Default::default()
        };
        assert_eq!(plan_tier_for(&config), FogTier::Quarter);
    }

    #[test]
    fn test_extent_halving_floors() {
        assert_eq!(tier_extent(1920, 1080, FogTier::Full), (1920, 1080));
        assert_eq!(tier_extent(1920, 1080, FogTier::Half), (960, 540));
        assert_eq!(tier_extent(1921, 1081, FogTier::Half), (960, 540));
        assert_eq!(tier_extent(1921, 1081, FogTier::Quarter), (480, 270));
    }

    #[test]
    fn test_degenerate_extent_floors_to_one() {
        assert_eq!(tier_extent(1, 1, FogTier::Quarter), (1, 1));
        assert_eq!(tier_extent(3, 7, FogTier::Quarter), (1, 1));
        assert_eq!(tier_extent(0, 0, FogTier::Full), (1, 1));
        assert_eq!(scaled_extent(5, 5, 8), (1, 1));
    }

    #[test]
    fn test_quarter_matches_chained_halving() {
        for w in [1u32, 2, 3, 5, 17, 641, 1919] {
            let (hw, _) = tier_extent(w, 1, FogTier::Half);
            let (qw, _) = tier_extent(w, 1, FogTier::Quarter);
            assert_eq!(qw, (hw / 2).max(1), "width {w}");
        }
    }

    #[test]
    fn test_bindings_per_tier() {
        assert_eq!(FogTier::Full.fog_binding(), VOLUME_FOG_TEXTURE);
        assert_eq!(FogTier::Half.depth_binding(), HALF_DEPTH_TARGET);
        assert_eq!(FogTier::Quarter.fog_binding(), QUARTER_VOLUME_FOG_TEXTURE);
        assert!(!FogTier::Full.is_reduced());
        assert!(FogTier::Quarter.is_reduced());
    }
}
