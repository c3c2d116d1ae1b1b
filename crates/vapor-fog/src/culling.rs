//! Per-frame visibility of registered fog volumes.

use glam::Vec3;

use crate::frustum::Frustum;
use crate::recorder::CommandRecorder;
use crate::volume::{VolumeHandle, VolumeRegistry};

/// Volumes that passed culling this frame, in registry order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VisibilitySet {
    handles: Vec<VolumeHandle>,
}

impl VisibilitySet {
    pub fn handles(&self) -> &[VolumeHandle] {
        &self.handles
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

/// Ask every registered volume whether it is excluded for this camera.
pub fn cull_volumes<R: CommandRecorder + ?Sized>(
    registry: &VolumeRegistry<R>,
    camera_position: Vec3,
    frustum: &Frustum,
) -> VisibilitySet {
    let handles = registry
        .iter()
        .filter(|(_, volume)| !volume.cull(camera_position, frustum))
        .map(|(handle, _)| handle)
        .collect();
    VisibilitySet { handles }
}
