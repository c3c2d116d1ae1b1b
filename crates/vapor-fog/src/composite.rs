//! Final blend of the fog buffer over the camera colour.

use crate::binding::{BLIT_ADD, BLIT_SOURCE};
use crate::camera::CameraTarget;
use crate::error::FogError;
use crate::recorder::{CommandRecorder, FogPass};
use crate::resources::FrameResources;

/// Per-pixel composite: `scene * (1 - clamp(fog.a)) + fog.rgb`, alpha 1.
pub fn blend(scene: [f32; 3], fog: [f32; 4]) -> [f32; 4] {
    let src_factor = 1.0 - fog[3].clamp(0.0, 1.0);
    [
        scene[0] * src_factor + fog[0],
        scene[1] * src_factor + fog[1],
        scene[2] * src_factor + fog[2],
        1.0,
    ]
}

/// Copy the camera colour aside, then blend full-resolution fog back onto it.
pub fn composite<R: CommandRecorder + ?Sized>(
    recorder: &mut R,
    resources: &FrameResources,
    target: &CameraTarget,
) -> Result<(), FogError> {
    recorder.copy_texture(target.color, resources.color_copy)?;
    recorder.set_global_texture(BLIT_SOURCE, resources.color_copy);
    recorder.set_global_texture(BLIT_ADD, resources.full_fog);
    recorder.blit(Some(resources.color_copy), target.color, FogPass::Composite)
}
