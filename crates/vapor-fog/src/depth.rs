//! Reduced-resolution depth mirrors for the half and quarter tiers.

use crate::binding::{HALF_DEPTH_TARGET, QUARTER_DEPTH_TARGET};
use crate::error::FogError;
use crate::recorder::{CommandRecorder, FogPass, TextureId};
use crate::resources::FrameResources;
use crate::tier::FogTier;

/// Downsample `camera_depth` into the mirrors the active tier needs.
///
/// Half: camera depth → half. Quarter: camera depth → half → quarter.
/// Full needs no mirror. Returns the number of passes recorded.
pub fn downsample_depth<R: CommandRecorder + ?Sized>(
    recorder: &mut R,
    camera_depth: TextureId,
    resources: &FrameResources,
) -> Result<u32, FogError> {
    if resources.tier == FogTier::Full {
        return Ok(0);
    }

    let half = resources
        .half_depth
        .ok_or(FogError::UnknownTexture(camera_depth))?;
    recorder.blit(Some(camera_depth), half, FogPass::DownsampleDepth)?;
    recorder.set_global_texture(HALF_DEPTH_TARGET, half);

    if resources.tier != FogTier::Quarter {
        return Ok(1);
    }

    let quarter = resources.quarter_depth.ok_or(FogError::UnknownTexture(half))?;
    recorder.blit(Some(half), quarter, FogPass::DownsampleDepth)?;
    recorder.set_global_texture(QUARTER_DEPTH_TARGET, quarter);
    Ok(2)
}
