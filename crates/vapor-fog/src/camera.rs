//! Camera and per-frame input consumed by the fog pipeline.

use glam::{Mat4, Vec3};

use crate::frustum::Frustum;
use crate::light::LightSource;
use crate::recorder::TextureId;

/// What the camera is rendering for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CameraKind {
    /// Gameplay camera; reprojection follows camera motion.
    #[default]
    Game,
    /// Editor/scene view; motion influence is suppressed.
    SceneView,
}

/// The camera a fog frame is rendered from.
#[derive(Clone, Debug)]
pub struct FogCamera {
    /// World-space position.
    pub position: Vec3,
    /// Combined projection * view matrix (wgpu clip space).
    pub view_projection: Mat4,
    /// Game camera or editor view.
    pub kind: CameraKind,
}

impl FogCamera {
    /// A gameplay camera.
    pub fn new(position: Vec3, view_projection: Mat4) -> Self {
        Self {
            position,
            view_projection,
            kind: CameraKind::Game,
        }
    }

    /// Mark this camera as an editor/scene view.
    pub fn scene_view(mut self) -> Self {
        self.kind = CameraKind::SceneView;
        self
    }

    pub fn is_scene_view(&self) -> bool {
        self.kind == CameraKind::SceneView
    }

    /// Frustum planes for this frame.
    pub fn frustum(&self) -> Frustum {
        Frustum::from_view_projection(&self.view_projection)
    }
}

/// The camera's output target: size, colour format and the backend handles
/// of its colour and depth textures.
#[derive(Clone, Debug, PartialEq)]
pub struct CameraTarget {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Format of `color`; the scratch copy used by the compositor matches it.
    pub color_format: wgpu::TextureFormat,
    /// Scene colour, read and then overwritten by the compositor.
    pub color: TextureId,
    /// Full-resolution scene depth.
    pub depth: TextureId,
}

impl CameraTarget {
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Everything the pipeline needs to render fog for one frame.
#[derive(Clone, Copy, Debug)]
pub struct FrameInput<'a> {
    /// Camera the fog is rendered from.
    pub camera: &'a FogCamera,
    /// Colour and depth the fog reads and composites into.
    pub target: &'a CameraTarget,
    /// Lights visible to the camera, in enumeration order.
    pub lights: &'a [LightSource],
    /// Index into `lights` of the designated main light.
    pub main_light: Option<usize>,
}
