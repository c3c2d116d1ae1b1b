//! Fog pipeline error types.

use crate::recorder::TextureId;

/// Errors raised while recording fog commands.
///
/// None of these reach the host: a failed frame is reported as
/// [`FrameOutcome::Aborted`](crate::FrameOutcome::Aborted) and fog is skipped.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FogError {
    /// The backend could not create a texture.
    #[error("failed to create texture '{label}' ({width}x{height}): {reason}")]
    TextureCreation {
        label: &'static str,
        width: u32,
        height: u32,
        reason: String,
    },

    /// A command referenced a texture that was never created or already released.
    #[error("unknown texture handle {0:?}")]
    UnknownTexture(TextureId),

    /// A draw or clear was recorded with no render target bound.
    #[error("no render target is bound")]
    NoRenderTarget,

    /// A volume failed to record its draw.
    #[error("volume draw failed: {0}")]
    VolumeDraw(String),

    /// A copy between textures of different sizes.
    #[error("cannot copy a {from:?} texture into a {to:?} texture")]
    CopySizeMismatch { from: (u32, u32), to: (u32, u32) },
}
