//! Light list preparation for fog shading.
//!
//! Lights visible to the camera are sphere-culled against the frustum
//! (directional lights bypass the test), converted to [`LightRecord`]s through
//! a [`LightConstants`] routine, and ordered nearest-first with a stable sort.

use bytemuck::{Pod, Zeroable};
use glam::{Vec3, Vec4};

use crate::frustum::Frustum;

/// Shape of a light source.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LightKind {
    /// Infinitely distant light; only `direction` is meaningful.
    Directional,
    /// Omnidirectional light with a finite range.
    Point,
    /// Cone light. Angles are full cone angles in radians.
    Spot { inner_angle: f32, outer_angle: f32 },
}

/// A light as enumerated by the host for the current camera.
#[derive(Clone, Debug, PartialEq)]
pub struct LightSource {
    pub kind: LightKind,
    /// World-space position. Ignored for directional lights.
    pub position: Vec3,
    /// Direction the light travels. Used by directional and spot lights.
    pub direction: Vec3,
    /// Linear RGB colour, not premultiplied by intensity.
    pub color: Vec3,
    pub intensity: f32,
    /// Radius of influence. Also the culling sphere radius.
    pub range: f32,
    /// Culling layer bits.
    pub layer_mask: u32,
}

impl LightSource {
    pub fn directional(direction: Vec3, color: Vec3, intensity: f32) -> Self {
        Self {
            kind: LightKind::Directional,
            position: Vec3::ZERO,
            direction: direction.normalize_or_zero(),
            color,
            intensity,
            range: f32::INFINITY,
            layer_mask: u32::MAX,
        }
    }

    pub fn point(position: Vec3, color: Vec3, intensity: f32, range: f32) -> Self {
        Self {
            kind: LightKind::Point,
            position,
            direction: Vec3::NEG_Z,
            color,
            intensity,
            range,
            layer_mask: u32::MAX,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn spot(
        position: Vec3,
        direction: Vec3,
        color: Vec3,
        intensity: f32,
        range: f32,
        inner_angle: f32,
        outer_angle: f32,
    ) -> Self {
        Self {
            kind: LightKind::Spot {
                inner_angle,
                outer_angle,
            },
            position,
            direction: direction.normalize_or_zero(),
            color,
            intensity,
            range,
            layer_mask: u32::MAX,
        }
    }

    /// Restrict the light to the given culling layers.
    pub fn with_layer_mask(mut self, layer_mask: u32) -> Self {
        self.layer_mask = layer_mask;
        self
    }

    pub fn is_directional(&self) -> bool {
        matches!(self.kind, LightKind::Directional)
    }
}

/// Shader constants computed for one light.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LightConstantData {
    /// xyz = position (w = 1), or xyz = direction towards the light (w = 0).
    pub position: Vec4,
    /// xyz = colour * intensity.
    pub color: Vec4,
    /// x = 1/range², y = fade term, zw = spot scale/offset.
    pub attenuation: Vec4,
    /// xyz = direction towards the light along the spot axis.
    pub spot_direction: Vec4,
}

/// Computes per-light shader constants.
///
/// Receives the full light list so implementations can depend on neighbours
/// (shadow slots, cookie atlases) the way engine light loops do.
pub trait LightConstants {
    fn light_constants(&self, lights: &[LightSource], index: usize) -> LightConstantData;
}

/// Default constants with a smooth range fade and cone attenuation.
#[derive(Clone, Copy, Debug, Default)]
pub struct StandardLightConstants;

impl StandardLightConstants {
    /// Fraction of the range where distance fading starts.
    pub const FADE_START: f32 = 0.8;
}

impl LightConstants for StandardLightConstants {
    fn light_constants(&self, lights: &[LightSource], index: usize) -> LightConstantData {
        let light = &lights[index];
        let color = (light.color * light.intensity).extend(0.0);

        if light.is_directional() {
            return LightConstantData {
                position: (-light.direction).extend(0.0),
                color,
                attenuation: Vec4::new(0.0, 1.0, 0.0, 1.0),
                spot_direction: Vec4::new(0.0, 0.0, 1.0, 0.0),
            };
        }

        let range_sq = (light.range * light.range).max(1e-4);
        let fade_start_sq = (light.range * Self::FADE_START).powi(2);
        let fade_range_sq = fade_start_sq - range_sq;
        let fade = if fade_range_sq.abs() > f32::EPSILON {
            -range_sq / fade_range_sq
        } else {
            1.0
        };

        let (spot_scale, spot_offset) = match light.kind {
            LightKind::Spot {
                inner_angle,
                outer_angle,
            } => {
                let cos_outer = (outer_angle * 0.5).cos();
                let cos_inner = (inner_angle * 0.5).cos();
                let scale = 1.0 / (cos_inner - cos_outer).max(1e-3);
                (scale, -cos_outer * scale)
            }
            _ => (0.0, 1.0),
        };

        LightConstantData {
            position: light.position.extend(1.0),
            color,
            attenuation: Vec4::new(1.0 / range_sq, fade, spot_scale, spot_offset),
            spot_direction: (-light.direction).extend(0.0),
        }
    }
}

/// A light prepared for fog shading.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LightRecord {
    pub position: Vec4,
    pub color: Vec4,
    pub attenuation: Vec4,
    pub spot_direction: Vec4,
    pub is_directional: bool,
    pub layer_mask: u32,
    pub range: f32,
    /// Squared distance to the camera; 0 for directional lights.
    pub sqr_distance: f32,
    /// Index of the source light in the enumeration order.
    pub source_index: usize,
}

impl LightRecord {
    /// Pack into the std430 layout consumed by fog shaders.
    pub fn to_gpu(&self) -> LightRecordGpu {
        LightRecordGpu {
            position: self.position.to_array(),
            color: self.color.to_array(),
            attenuation: self.attenuation.to_array(),
            spot_direction: self.spot_direction.to_array(),
            range_distance: [self.range, self.sqr_distance, 0.0, 0.0],
            flags: [self.layer_mask, u32::from(self.is_directional), 0, 0],
        }
    }
}

/// Per-light GPU data, 96 bytes, std430-compatible.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct LightRecordGpu {
    pub position: [f32; 4],
    pub color: [f32; 4],
    pub attenuation: [f32; 4],
    pub spot_direction: [f32; 4],
    /// x = range, y = squared camera distance.
    pub range_distance: [f32; 4],
    /// x = layer mask, y = 1 if directional.
    pub flags: [u32; 4],
}

/// Lights for one frame, nearest first. Immutable once built.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LightList {
    records: Vec<LightRecord>,
    main_light: Option<usize>,
}

impl LightList {
    pub fn records(&self) -> &[LightRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The main light's record, if it survived culling.
    pub fn main_light(&self) -> Option<&LightRecord> {
        self.main_light.map(|i| &self.records[i])
    }

    /// Number of records other than the main light.
    pub fn additional_light_count(&self) -> usize {
        self.records.len() - usize::from(self.main_light.is_some())
    }

    /// Records packed for upload.
    pub fn to_gpu(&self) -> Vec<LightRecordGpu> {
        self.records.iter().map(LightRecord::to_gpu).collect()
    }
}

/// Builds the per-frame [`LightList`].
pub struct LightListBuilder {
    constants: Box<dyn LightConstants>,
}

impl LightListBuilder {
    /// Builder using [`StandardLightConstants`].
    pub fn new() -> Self {
        Self::with_constants(Box::new(StandardLightConstants))
    }

    /// Builder delegating constant computation to `constants`.
    pub fn with_constants(constants: Box<dyn LightConstants>) -> Self {
        Self { constants }
    }

    /// Cull, convert, and sort `lights` for a camera at `camera_position`.
    ///
    /// Deterministic: equal distances keep enumeration order.
    pub fn build(
        &self,
        lights: &[LightSource],
        main_light: Option<usize>,
        camera_position: Vec3,
        frustum: &Frustum,
    ) -> LightList {
        let mut records = Vec::with_capacity(lights.len());

        for (index, light) in lights.iter().enumerate() {
            let is_directional = light.is_directional();
            if !is_directional && frustum.is_sphere_culled(light.position, light.range) {
                continue;
            }

            let constants = self.constants.light_constants(lights, index);
            let sqr_distance = if is_directional {
                0.0
            } else {
                light.position.distance_squared(camera_position)
            };

            records.push(LightRecord {
                position: constants.position,
                color: constants.color,
                attenuation: constants.attenuation,
                spot_direction: constants.spot_direction,
                is_directional,
                layer_mask: light.layer_mask,
                range: light.range,
                sqr_distance,
                source_index: index,
            });
        }

        // Stable: ties keep enumeration order.
        records.sort_by(|a, b| a.sqr_distance.total_cmp(&b.sqr_distance));

        let main_light =
            main_light.and_then(|main| records.iter().position(|r| r.source_index == main));

        log::trace!(
            "Light list: {} of {} lights kept, main light {:?}",
            records.len(),
            lights.len(),
            main_light
        );

        LightList {
            records,
            main_light,
        }
    }
}

impl Default for LightListBuilder {
    fn default() -> Self {
        Self::new()
    }
}
