//! Fog accumulation target selection, clearing and jitter publication.

use crate::binding::{PASS_OFFSET, TEMPORAL_RENDER_SIZE, TEMPORAL_RENDERING_KEYWORD, TILE_SIZE};
use crate::error::FogError;
use crate::history::{JitterSample, JitterSequence, temporal_render_size};
use crate::recorder::{CLEAR_TRANSPARENT, CommandRecorder, TextureId};
use crate::resources::{FramePlan, FrameResources};

/// Where volumes draw this frame.
///
/// Quarter fog, else half fog, else the jitter tile in temporal mode, else full fog.
pub fn select_fog_target(resources: &FrameResources) -> TextureId {
    resources
        .quarter_fog
        .or(resources.half_fog)
        .or(resources.temporal_tile)
        .unwrap_or(resources.full_fog)
}

/// Bind and clear the fog target and publish temporal parameters.
///
/// In temporal mode the jitter cursor advances exactly once here.
pub fn setup_fog_target<R: CommandRecorder + ?Sized>(
    recorder: &mut R,
    resources: &FrameResources,
    plan: &FramePlan,
    jitter: &mut JitterSequence,
    camera_size: (u32, u32),
) -> Result<(TextureId, Option<JitterSample>), FogError> {
    let target = select_fog_target(resources);
    recorder.set_render_target(target)?;
    recorder.clear_render_target(CLEAR_TRANSPARENT);
    recorder.set_keyword(TEMPORAL_RENDERING_KEYWORD, plan.temporal);

    if !plan.temporal {
        return Ok((target, None));
    }

    jitter.set_kernel_size(plan.kernel_size);
    let sample = jitter.advance();
    recorder.set_global_float(TILE_SIZE, sample.kernel_size as f32);
    recorder.set_global_vector(PASS_OFFSET, sample.pass_offset());
    recorder.set_global_vector(
        TEMPORAL_RENDER_SIZE,
        temporal_render_size(camera_size.0, camera_size.1, sample.kernel_size),
    );
    log::trace!("Jitter cell {:?} offset {:?}", sample.cell(), sample.offset);

    Ok((target, Some(sample)))
}
