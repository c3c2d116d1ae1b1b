//! The command-recording seam between the fog pipeline and a GPU backend.
//!
//! The pipeline expresses every frame as a sequence of [`CommandRecorder`] calls:
//! texture creation, global bindings, render-target selection, full-screen
//! passes and copies. [`CommandTrace`](crate::CommandTrace) records them for
//! inspection; [`GpuRecorder`](crate::gpu::GpuRecorder) encodes them with wgpu.

use glam::Vec4;

use crate::binding::ShaderBinding;
use crate::error::FogError;
use crate::tier::FogTier;

/// Opaque handle to a texture owned by a recorder's backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(u32);

impl TextureId {
    /// Wrap a backend-assigned index.
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// The backend-assigned index.
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// How long a texture is expected to live.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureLifetime {
    /// Created and released within one frame.
    Transient,
    /// Survives across frames until explicitly released.
    Persistent,
}

/// Description of a texture to create.
#[derive(Clone, Debug, PartialEq)]
pub struct TextureDesc {
    /// Debug label.
    pub label: &'static str,
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
    pub lifetime: TextureLifetime,
}

impl TextureDesc {
    /// Format of fog colour/opacity buffers and the history buffer.
    pub const FOG_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

    /// Format of the reduced-resolution depth mirrors.
    pub const DEPTH_MIRROR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R32Float;

    /// A per-frame texture. Sizes are clamped to at least 1x1.
    pub fn transient(
        label: &'static str,
        (width, height): (u32, u32),
        format: wgpu::TextureFormat,
    ) -> Self {
        Self {
            label,
            width: width.max(1),
            height: height.max(1),
            format,
            lifetime: TextureLifetime::Transient,
        }
    }

    /// A cross-frame texture. Sizes are clamped to at least 1x1.
    pub fn persistent(
        label: &'static str,
        (width, height): (u32, u32),
        format: wgpu::TextureFormat,
    ) -> Self {
        Self {
            lifetime: TextureLifetime::Persistent,
            ..Self::transient(label, (width, height), format)
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Direction of a separable blur pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlurAxis {
    Horizontal,
    Vertical,
}

/// The full-screen passes a backend must provide.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FogPass {
    /// Filtered depth reduction, source depth → target depth mirror.
    DownsampleDepth,
    /// One axis of the depth-aware blur, guided by the depth matching `tier`.
    Blur { axis: BlurAxis, tier: FogTier },
    /// Depth-aware reconstruction from `from` resolution to full resolution.
    Upsample { from: FogTier },
    /// Jitter tile + history → stabilised full-resolution fog.
    TemporalReproject,
    /// `_BlitSource * (1 - clamp(fog.a)) + fog.rgb` with alpha forced to 1.
    Composite,
}

/// Records GPU work for one frame.
///
/// Calls are issued strictly in order from a single thread; implementations
/// need no internal synchronisation.
pub trait CommandRecorder {
    /// Create a texture. Sizes in `desc` are at least 1x1.
    fn create_texture(&mut self, desc: &TextureDesc) -> Result<TextureId, FogError>;

    /// Release a texture. Unknown handles are ignored.
    fn release_texture(&mut self, texture: TextureId);

    /// Size of a live texture, `None` if the handle is invalid.
    fn texture_size(&self, texture: TextureId) -> Option<(u32, u32)>;

    /// Bind a texture globally under `binding` for subsequent passes and draws.
    fn set_global_texture(&mut self, binding: ShaderBinding, texture: TextureId);

    fn set_global_float(&mut self, binding: ShaderBinding, value: f32);

    fn set_global_vector(&mut self, binding: ShaderBinding, value: Vec4);

    /// Toggle a global shader keyword.
    fn set_keyword(&mut self, keyword: &str, enabled: bool);

    /// Bind the colour target for subsequent clears and volume draws.
    fn set_render_target(&mut self, target: TextureId) -> Result<(), FogError>;

    /// Clear the bound render target.
    fn clear_render_target(&mut self, color: [f32; 4]);

    /// Record one full-screen pass reading `source` (if any) and writing `target`.
    fn blit(
        &mut self,
        source: Option<TextureId>,
        target: TextureId,
        pass: FogPass,
    ) -> Result<(), FogError>;

    /// Copy `source` into `target`; both must have the same size.
    fn copy_texture(&mut self, source: TextureId, target: TextureId) -> Result<(), FogError>;
}

/// Transparent black, the fog accumulation clear colour.
pub const CLEAR_TRANSPARENT: [f32; 4] = [0.0; 4];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_desc_clamps_to_one() {
        let desc = TextureDesc::transient("t", (0, 0), TextureDesc::FOG_FORMAT);
        assert_eq!(desc.size(), (1, 1));
        assert_eq!(desc.lifetime, TextureLifetime::Transient);
    }

    #[test]
    fn test_persistent_desc_keeps_size() {
        let desc = TextureDesc::persistent("h", (640, 360), TextureDesc::FOG_FORMAT);
        assert_eq!(desc.size(), (640, 360));
        assert_eq!(desc.lifetime, TextureLifetime::Persistent);
        assert_eq!(desc.format, wgpu::TextureFormat::Rgba16Float);
    }

    #[test]
    fn test_texture_id_roundtrip() {
        assert_eq!(TextureId::from_raw(7).raw(), 7);
    }
}
