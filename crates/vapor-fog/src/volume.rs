//! Fog volumes, their draw contract, and the caller-owned registry.

use std::borrow::Cow;

use glam::Vec3;

use crate::camera::{CameraTarget, FogCamera};
use crate::error::FogError;
use crate::frustum::{Aabb, Frustum};
use crate::light::LightList;
use crate::recorder::{CommandRecorder, TextureId};
use crate::tier::FogTier;

/// The shader program volumes use to rasterize fog.
///
/// Identified by its label and a 64-bit FNV-1a fingerprint of its source, so
/// consumers can cache compiled state and rebuild only when the source changes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FogShader {
    label: Cow<'static, str>,
    source: Cow<'static, str>,
    fingerprint: u64,
}

impl FogShader {
    pub fn new(label: impl Into<Cow<'static, str>>, source: impl Into<Cow<'static, str>>) -> Self {
        let source = source.into();
        let fingerprint = source_fingerprint(&source);
        Self {
            label: label.into(),
            source,
            fingerprint,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// WGSL source.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }
}

/// 64-bit FNV-1a over shader source bytes.
pub fn source_fingerprint(source: &str) -> u64 {
    source.bytes().fold(0xcbf2_9ce4_8422_2325_u64, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x0000_0100_0000_01b3)
    })
}

/// Everything a volume receives when asked to draw.
#[derive(Clone, Copy, Debug)]
pub struct VolumeDrawContext<'a> {
    pub camera: &'a FogCamera,
    pub target: &'a CameraTarget,
    pub is_scene_view: bool,
    pub fog_shader: &'a FogShader,
    /// Lights sorted nearest first.
    pub lights: &'a LightList,
    /// Number of lights other than the main light.
    pub max_lights: usize,
    /// Tier of the bound target.
    pub tier: FogTier,
    /// The render target currently bound on the recorder.
    pub fog_target: TextureId,
}

/// A fog volume that can be culled and drawn through a recorder of type `R`.
pub trait FogVolume<R: CommandRecorder + ?Sized> {
    /// Returns `true` when the volume is excluded from this frame.
    fn cull(&self, camera_position: Vec3, frustum: &Frustum) -> bool;

    /// Rasterize into the currently bound render target.
    fn draw(&self, ctx: &VolumeDrawContext<'_>, recorder: &mut R) -> Result<(), FogError>;
}

/// Stable handle to a registered volume.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VolumeHandle(u64);

/// Registered fog volumes, iterated in insertion order.
pub struct VolumeRegistry<R: CommandRecorder + ?Sized> {
    volumes: Vec<(VolumeHandle, Box<dyn FogVolume<R>>)>,
    next_handle: u64,
}

impl<R: CommandRecorder + ?Sized> VolumeRegistry<R> {
    pub fn new() -> Self {
        Self {
            volumes: Vec::new(),
            next_handle: 0,
        }
    }

    /// Register a volume. Handles are never reused.
    pub fn add(&mut self, volume: Box<dyn FogVolume<R>>) -> VolumeHandle {
        let handle = VolumeHandle(self.next_handle);
        self.next_handle += 1;
        self.volumes.push((handle, volume));
        handle
    }

    /// Unregister a volume. Returns `false` if the handle was not registered.
    pub fn remove(&mut self, handle: VolumeHandle) -> bool {
        match self.volumes.iter().position(|(h, _)| *h == handle) {
            Some(index) => {
                self.volumes.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, handle: VolumeHandle) -> Option<&dyn FogVolume<R>> {
        self.volumes
            .iter()
            .find(|(h, _)| *h == handle)
            .map(|(_, v)| v.as_ref())
    }

    pub fn len(&self) -> usize {
        self.volumes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.volumes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (VolumeHandle, &dyn FogVolume<R>)> {
        self.volumes.iter().map(|(h, v)| (*h, v.as_ref()))
    }
}

impl<R: CommandRecorder + ?Sized> Default for VolumeRegistry<R> {
    fn default() -> Self {
        Self::new()
    }
}

type DrawFn<R> = dyn Fn(&VolumeDrawContext<'_>, &mut R) -> Result<(), FogError>;

/// A volume bounded by a world-space box, drawn through a closure.
pub struct BoxFogVolume<R: CommandRecorder + ?Sized> {
    bounds: Aabb,
    draw: Box<DrawFn<R>>,
}

impl<R: CommandRecorder + ?Sized> BoxFogVolume<R> {
    pub fn new(
        bounds: Aabb,
        draw: impl Fn(&VolumeDrawContext<'_>, &mut R) -> Result<(), FogError> + 'static,
    ) -> Self {
        Self {
            bounds,
            draw: Box::new(draw),
        }
    }

    pub fn bounds(&self) -> &Aabb {
        &self.bounds
    }
}

impl<R: CommandRecorder + ?Sized> FogVolume<R> for BoxFogVolume<R> {
    fn cull(&self, _camera_position: Vec3, frustum: &Frustum) -> bool {
        !frustum.is_aabb_visible(&self.bounds)
    }

    fn draw(&self, ctx: &VolumeDrawContext<'_>, recorder: &mut R) -> Result<(), FogError> {
        (self.draw)(ctx, recorder)
    }
}
