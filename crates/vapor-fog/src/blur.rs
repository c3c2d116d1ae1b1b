//! Depth-aware separable blur and upsampling to full resolution.

use crate::error::FogError;
use crate::recorder::{BlurAxis, CommandRecorder, FogPass};
use crate::resources::{FramePlan, FrameResources};

/// What the blur/upsample stage recorded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BlurOutcome {
    pub blur_passes: u32,
    pub upsampled: bool,
}

/// Blur the tier's fog buffer (unless disabled), then upsample reduced tiers
/// into the full fog buffer.
///
/// Horizontal pass: fog → scratch. Vertical pass: scratch → fog.
pub fn blur_and_upsample<R: CommandRecorder + ?Sized>(
    recorder: &mut R,
    resources: &FrameResources,
    plan: &FramePlan,
) -> Result<BlurOutcome, FogError> {
    let tier = resources.tier;
    let fog = resources.tier_fog();
    let mut outcome = BlurOutcome::default();

    if plan.blur
        && let Some(scratch) = resources.blur_scratch
    {
        recorder.blit(
            Some(fog),
            scratch,
            FogPass::Blur {
                axis: BlurAxis::Horizontal,
                tier,
            },
        )?;
        recorder.blit(
            Some(scratch),
            fog,
            FogPass::Blur {
                axis: BlurAxis::Vertical,
                tier,
            },
        )?;
        outcome.blur_passes = 2;
    }

    if tier.is_reduced() {
        recorder.blit(Some(fog), resources.full_fog, FogPass::Upsample { from: tier })?;
        outcome.upsampled = true;
    }

    Ok(outcome)
}
