//! Named shader bindings shared by the fog passes and the volume shaders.
//!
//! A [`ShaderBinding`] pairs the stable binding name with a numeric id derived
//! from it. There are no implicit conversions: recorders that key by string call
//! [`ShaderBinding::name`], recorders that key by integer call [`ShaderBinding::id`].

/// A shader-visible binding name and its precomputed id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ShaderBinding {
    name: &'static str,
    id: u32,
}

impl ShaderBinding {
    /// Create a binding; the id is the 32-bit FNV-1a hash of `name`.
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            id: fnv1a(name.as_bytes()),
        }
    }

    /// The binding name as it appears in shader source.
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// The numeric id, stable across runs and builds.
    pub const fn id(&self) -> u32 {
        self.id
    }
}

const fn fnv1a(bytes: &[u8]) -> u32 {
    let mut hash = 0x811c_9dc5_u32;
    let mut i = 0;
    while i < bytes.len() {
        hash ^= bytes[i] as u32;
        hash = hash.wrapping_mul(0x0100_0193);
        i += 1;
    }
    hash
}

/// Full-resolution fog accumulation buffer.
pub const VOLUME_FOG_TEXTURE: ShaderBinding = ShaderBinding::new("_VolumeFogTexture");
/// Half-resolution fog buffer.
pub const HALF_VOLUME_FOG_TEXTURE: ShaderBinding = ShaderBinding::new("_HalfVolumeFogTexture");
/// Quarter-resolution fog buffer.
pub const QUARTER_VOLUME_FOG_TEXTURE: ShaderBinding =
    ShaderBinding::new("_QuarterVolumeFogTexture");
/// Half-resolution depth mirror.
pub const HALF_DEPTH_TARGET: ShaderBinding = ShaderBinding::new("_HalfDepthTarget");
/// Quarter-resolution depth mirror.
pub const QUARTER_DEPTH_TARGET: ShaderBinding = ShaderBinding::new("_QuarterDepthTarget");
/// Host-provided full-resolution scene depth.
pub const CAMERA_DEPTH_TEXTURE: ShaderBinding = ShaderBinding::new("_CameraDepthTexture");
/// Jitter-tile render target sampled by the reprojection pass.
pub const TEMPORAL_TARGET: ShaderBinding = ShaderBinding::new("_TemporalTarget");
/// Persistent history buffer sampled by the reprojection pass.
pub const TEMPORAL_BUFFER: ShaderBinding = ShaderBinding::new("_TemporalBuffer");
/// Scene colour read by the composite pass.
pub const BLIT_SOURCE: ShaderBinding = ShaderBinding::new("_BlitSource");
/// Fog colour/opacity read by the composite pass.
pub const BLIT_ADD: ShaderBinding = ShaderBinding::new("_BlitAdd");

/// 0 for scene/editor views, 1 otherwise.
pub const MOTION_INFLUENCE: ShaderBinding = ShaderBinding::new("_MotionInfluence");
/// Temporal kernel size.
pub const TILE_SIZE: ShaderBinding = ShaderBinding::new("_TileSize");
/// xy = current kernel cell, zw = random sub-cell offset.
pub const PASS_OFFSET: ShaderBinding = ShaderBinding::new("_PassOffset");
/// xy = camera size / kernel size, zw = reciprocal.
pub const TEMPORAL_RENDER_SIZE: ShaderBinding = ShaderBinding::new("_TemporalRenderSize");

/// Keyword enabling the temporal branches of the fog shaders.
pub const TEMPORAL_RENDERING_KEYWORD: &str = "TEMPORAL_RENDERING";
