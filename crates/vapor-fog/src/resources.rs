//! Per-frame transient textures sized for the active tier.

use vapor_config::FogConfig;

use crate::binding::{HALF_VOLUME_FOG_TEXTURE, QUARTER_VOLUME_FOG_TEXTURE, VOLUME_FOG_TEXTURE};
use crate::camera::CameraTarget;
use crate::error::FogError;
use crate::recorder::{CommandRecorder, TextureDesc, TextureId};
use crate::tier::{FogTier, plan_tier_for, scaled_extent, tier_extent};

/// Decisions made once per frame from configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FramePlan {
    pub tier: FogTier,
    pub temporal: bool,
    /// Temporal kernel size, at least 2.
    pub kernel_size: u32,
    pub blur: bool,
}

impl FramePlan {
    pub fn from_config(config: &FogConfig) -> Self {
        Self {
            tier: plan_tier_for(config),
            temporal: config.temporal,
            kernel_size: config.kernel_size(),
            blur: !config.disable_blur,
        }
    }
}

/// Texture labels, also used by tests to locate allocations.
pub mod labels {
    pub const FULL_FOG: &str = "vapor.fog.full";
    pub const HALF_FOG: &str = "vapor.fog.half";
    pub const QUARTER_FOG: &str = "vapor.fog.quarter";
    pub const HALF_DEPTH: &str = "vapor.depth.half";
    pub const QUARTER_DEPTH: &str = "vapor.depth.quarter";
    pub const BLUR_SCRATCH: &str = "vapor.fog.blur_scratch";
    pub const COLOR_COPY: &str = "vapor.color_copy";
    pub const TEMPORAL_TILE: &str = "vapor.fog.temporal_tile";
    pub const HISTORY: &str = "vapor.fog.history";
}

/// Handles of the textures owned by one frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameResources {
    pub tier: FogTier,
    /// Full-resolution fog buffer. Upsample destination at reduced tiers.
    pub full_fog: TextureId,
    pub half_fog: Option<TextureId>,
    pub quarter_fog: Option<TextureId>,
    pub half_depth: Option<TextureId>,
    pub quarter_depth: Option<TextureId>,
    /// Blur scratch at tier resolution, present only when blur is enabled.
    pub blur_scratch: Option<TextureId>,
    /// Copy of the camera colour read by the compositor.
    pub color_copy: TextureId,
    /// Jitter-tile target, present only in temporal mode.
    pub temporal_tile: Option<TextureId>,
}

impl FrameResources {
    /// Create every texture `plan` needs for a camera of `target`'s size.
    ///
    /// On failure, textures created so far are released before returning.
    pub fn allocate<R: CommandRecorder + ?Sized>(
        recorder: &mut R,
        target: &CameraTarget,
        plan: &FramePlan,
    ) -> Result<Self, FogError> {
        let mut created = Vec::new();
        let result = Self::allocate_tracked(recorder, target, plan, &mut created);
        if result.is_err() {
            for id in created {
                recorder.release_texture(id);
            }
        }
        result
    }

    fn allocate_tracked<R: CommandRecorder + ?Sized>(
        recorder: &mut R,
        target: &CameraTarget,
        plan: &FramePlan,
        created: &mut Vec<TextureId>,
    ) -> Result<Self, FogError> {
        let (width, height) = target.size();
        let mut create = |recorder: &mut R, desc: TextureDesc| -> Result<TextureId, FogError> {
            let id = recorder.create_texture(&desc)?;
            created.push(id);
            Ok(id)
        };

        let fog = TextureDesc::FOG_FORMAT;
        let depth = TextureDesc::DEPTH_MIRROR_FORMAT;
        let full = tier_extent(width, height, FogTier::Full);
        let half = tier_extent(width, height, FogTier::Half);
        let quarter = tier_extent(width, height, FogTier::Quarter);

        let full_fog = create(recorder, TextureDesc::transient(labels::FULL_FOG, full, fog))?;

        let mut resources = Self {
            tier: plan.tier,
            full_fog,
            half_fog: None,
            quarter_fog: None,
            half_depth: None,
            quarter_depth: None,
            blur_scratch: None,
            color_copy: full_fog,
            temporal_tile: None,
        };

        match plan.tier {
            FogTier::Full => {}
            FogTier::Half => {
                resources.half_fog =
                    Some(create(recorder, TextureDesc::transient(labels::HALF_FOG, half, fog))?);
                resources.half_depth = Some(create(
                    recorder,
                    TextureDesc::transient(labels::HALF_DEPTH, half, depth),
                )?);
            }
            FogTier::Quarter => {
                // The quarter mirror is chained from the half mirror.
                resources.half_depth = Some(create(
                    recorder,
                    TextureDesc::transient(labels::HALF_DEPTH, half, depth),
                )?);
                resources.quarter_fog = Some(create(
                    recorder,
                    TextureDesc::transient(labels::QUARTER_FOG, quarter, fog),
                )?);
                resources.quarter_depth = Some(create(
                    recorder,
                    TextureDesc::transient(labels::QUARTER_DEPTH, quarter, depth),
                )?);
            }
        }

        if plan.blur {
            let extent = tier_extent(width, height, plan.tier);
            resources.blur_scratch = Some(create(
                recorder,
                TextureDesc::transient(labels::BLUR_SCRATCH, extent, fog),
            )?);
        }

        resources.color_copy = create(
            recorder,
            TextureDesc::transient(labels::COLOR_COPY, full, target.color_format),
        )?;

        if plan.temporal {
            let tile = scaled_extent(width, height, plan.kernel_size);
            resources.temporal_tile = Some(create(
                recorder,
                TextureDesc::transient(labels::TEMPORAL_TILE, tile, fog),
            )?);
        }

        log::trace!(
            "Allocated {} fog textures for {:?} at {}x{}",
            created.len(),
            plan.tier,
            width,
            height
        );

        Ok(resources)
    }

    /// Fog buffer rendered at the active tier.
    pub fn tier_fog(&self) -> TextureId {
        match self.tier {
            FogTier::Full => Some(self.full_fog),
            FogTier::Half => self.half_fog,
            FogTier::Quarter => self.quarter_fog,
        }
        .unwrap_or(self.full_fog)
    }

    /// Publish the fog buffers under their global bindings.
    pub fn bind_globals<R: CommandRecorder + ?Sized>(&self, recorder: &mut R) {
        recorder.set_global_texture(VOLUME_FOG_TEXTURE, self.full_fog);
        if let Some(half) = self.half_fog {
            recorder.set_global_texture(HALF_VOLUME_FOG_TEXTURE, half);
        }
        if let Some(quarter) = self.quarter_fog {
            recorder.set_global_texture(QUARTER_VOLUME_FOG_TEXTURE, quarter);
        }
    }

    /// Every handle owned by this frame.
    pub fn handles(&self) -> Vec<TextureId> {
        let mut handles = vec![self.full_fog, self.color_copy];
        handles.extend(
            [
                self.half_fog,
                self.quarter_fog,
                self.half_depth,
                self.quarter_depth,
                self.blur_scratch,
                self.temporal_tile,
            ]
            .into_iter()
            .flatten(),
        );
        handles
    }

    /// Release every texture owned by this frame.
    pub fn release<R: CommandRecorder + ?Sized>(self, recorder: &mut R) {
        for id in self.handles() {
            recorder.release_texture(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::TextureLifetime;
    use crate::trace::CommandTrace;
    use vapor_config::FogResolution;

    fn camera(trace: &mut CommandTrace, width: u32, height: u32) -> CameraTarget {
        let color = trace.import_texture("color", (width, height), wgpu::TextureFormat::Rgba8Unorm);
        let depth = trace.import_texture("depth", (width, height), wgpu::TextureFormat::R32Float);
        CameraTarget {
            width,
            height,
            color_format: wgpu::TextureFormat::Rgba8Unorm,
            color,
            depth,
        }
    }

    fn plan(tier: FogTier, temporal: bool, blur: bool) -> FramePlan {
        FramePlan {
            tier,
            temporal,
            kernel_size: 4,
            blur,
        }
    }

    #[test]
    fn test_plan_from_config() {
        let config = FogConfig {
            resolution: FogResolution::Quarter,
            temporal: true,
            temporal_resolution: 1,
            disable_blur: true,
            ..Default::default()
        };
        let plan = FramePlan::from_config(&config);
        assert_eq!(plan.tier, FogTier::Full);
        assert_eq!(plan.kernel_size, 2);
        assert!(!plan.blur);
    }

    #[test]
    fn test_half_tier_allocation() {
        let mut trace = CommandTrace::new();
        let target = camera(&mut trace, 1921, 1081);
        let res = FrameResources::allocate(&mut trace, &target, &plan(FogTier::Half, false, true))
            .unwrap();

        assert_eq!(trace.texture_size(res.full_fog), Some((1921, 1081)));
        assert_eq!(trace.texture_size(res.half_fog.unwrap()), Some((960, 540)));
        assert_eq!(trace.texture_size(res.half_depth.unwrap()), Some((960, 540)));
        assert_eq!(trace.texture_size(res.blur_scratch.unwrap()), Some((960, 540)));
        assert!(res.quarter_fog.is_none());
        assert!(res.temporal_tile.is_none());
        assert_eq!(res.tier_fog(), res.half_fog.unwrap());
        assert_eq!(
            trace.desc(res.color_copy).map(|d| d.format),
            Some(wgpu::TextureFormat::Rgba8Unorm)
        );
    }

    #[test]
    fn test_quarter_tier_allocates_depth_chain() {
        let mut trace = CommandTrace::new();
        let target = camera(&mut trace, 640, 360);
        let res =
            FrameResources::allocate(&mut trace, &target, &plan(FogTier::Quarter, false, false))
                .unwrap();

        assert_eq!(trace.texture_size(res.half_depth.unwrap()), Some((320, 180)));
        assert_eq!(trace.texture_size(res.quarter_depth.unwrap()), Some((160, 90)));
        assert_eq!(trace.texture_size(res.quarter_fog.unwrap()), Some((160, 90)));
        assert!(res.half_fog.is_none());
        assert!(res.blur_scratch.is_none());
    }

    #[test]
    fn test_degenerate_camera_allocates_one_pixel() {
        let mut trace = CommandTrace::new();
        let target = camera(&mut trace, 2, 2);
        let res =
            FrameResources::allocate(&mut trace, &target, &plan(FogTier::Quarter, false, true))
                .unwrap();
        assert_eq!(trace.texture_size(res.quarter_fog.unwrap()), Some((1, 1)));
        assert_eq!(trace.texture_size(res.blur_scratch.unwrap()), Some((1, 1)));
    }

    #[test]
    fn test_temporal_tile_size() {
        let mut trace = CommandTrace::new();
        let target = camera(&mut trace, 1280, 720);
        let res = FrameResources::allocate(&mut trace, &target, &plan(FogTier::Full, true, true))
            .unwrap();
        assert_eq!(trace.texture_size(res.temporal_tile.unwrap()), Some((320, 180)));
        assert_eq!(trace.texture_size(res.blur_scratch.unwrap()), Some((1280, 720)));
    }

    #[test]
    fn test_failure_releases_partial_allocation() {
        let mut trace = CommandTrace::new();
        let target = camera(&mut trace, 64, 64);
        trace.fail_texture_creation(labels::COLOR_COPY);
        let result =
            FrameResources::allocate(&mut trace, &target, &plan(FogTier::Half, false, true));
        assert!(result.is_err());
        assert_eq!(trace.live_textures(TextureLifetime::Transient), 0);
    }

    #[test]
    fn test_release_frees_everything() {
        let mut trace = CommandTrace::new();
        let target = camera(&mut trace, 64, 64);
        let res =
            FrameResources::allocate(&mut trace, &target, &plan(FogTier::Quarter, true, true))
                .unwrap();
        assert!(trace.live_textures(TextureLifetime::Transient) > 0);
        res.release(&mut trace);
        assert_eq!(trace.live_textures(TextureLifetime::Transient), 0);
    }
}
