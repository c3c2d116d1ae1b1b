//! Temporal reprojection of the jitter tile against the history buffer.

use crate::binding::{MOTION_INFLUENCE, TEMPORAL_BUFFER, TEMPORAL_TARGET};
use crate::camera::FogCamera;
use crate::error::FogError;
use crate::history::HistoryBuffer;
use crate::recorder::{CommandRecorder, FogPass};
use crate::resources::FrameResources;

/// `_MotionInfluence` for a camera: 0 for scene views, 1 otherwise.
pub fn motion_influence(camera: &FogCamera) -> f32 {
    if camera.is_scene_view() { 0.0 } else { 1.0 }
}

/// Reproject the jitter tile into the full fog buffer, then copy the result
/// into history for the next frame.
///
/// History receives the post-reprojection buffer, before blur.
pub fn reproject<R: CommandRecorder + ?Sized>(
    recorder: &mut R,
    history: &mut HistoryBuffer,
    resources: &FrameResources,
    camera: &FogCamera,
    camera_size: (u32, u32),
) -> Result<(), FogError> {
    let tile = resources
        .temporal_tile
        .ok_or(FogError::UnknownTexture(resources.full_fog))?;
    let history_texture = history.ensure_sized(recorder, camera_size.0, camera_size.1)?;

    recorder.set_global_texture(TEMPORAL_BUFFER, history_texture);
    recorder.set_global_texture(TEMPORAL_TARGET, tile);
    recorder.set_global_float(MOTION_INFLUENCE, motion_influence(camera));

    recorder.blit(None, resources.full_fog, FogPass::TemporalReproject)?;
    recorder.copy_texture(resources.full_fog, history_texture)
}
