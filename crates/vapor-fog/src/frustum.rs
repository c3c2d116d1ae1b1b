//! View frustum planes with sphere and AABB tests.
//!
//! Planes are extracted from the camera's view-projection matrix and point
//! inward, so a positive signed distance means "in front of the plane".

use glam::{Mat4, Vec3, Vec4};

/// Plane indices into the frustum planes array.
const LEFT: usize = 0;
const RIGHT: usize = 1;
const BOTTOM: usize = 2;
const TOP: usize = 3;
const NEAR: usize = 4;
const FAR: usize = 5;

/// An axis-aligned bounding box in world space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    /// Minimum corner of the bounding box.
    pub min: Vec3,
    /// Maximum corner of the bounding box.
    pub max: Vec3,
}

impl Aabb {
    /// Create a new AABB from min and max corners.
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Create an AABB from a center and half-extents.
    pub fn from_center_extents(center: Vec3, extents: Vec3) -> Self {
        Self {
            min: center - extents,
            max: center + extents,
        }
    }

    /// Returns the center point of the AABB.
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Returns the half-extents (half-size along each axis).
    pub fn extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }
}

/// A view frustum defined by six inward-pointing planes.
#[derive(Clone, Debug, PartialEq)]
pub struct Frustum {
    /// Six planes: left, right, bottom, top, near, far.
    /// Each `Vec4(a, b, c, d)` where `(a,b,c)` is the normalized inward
    /// normal and `d` is the signed distance term.
    planes: [Vec4; 6],
}

impl Frustum {
    /// Extract frustum planes from a combined view-projection matrix
    /// using the Gribb-Hartmann method, for wgpu's `[0, 1]` clip depth.
    pub fn from_view_projection(vp: &Mat4) -> Self {
        let rows = [vp.row(0), vp.row(1), vp.row(2), vp.row(3)];

        let mut planes = [Vec4::ZERO; 6];
        planes[LEFT] = rows[3] + rows[0];
        planes[RIGHT] = rows[3] - rows[0];
        planes[BOTTOM] = rows[3] + rows[1];
        planes[TOP] = rows[3] - rows[1];
        // z_clip >= 0 and z_clip <= w_clip.
        planes[NEAR] = rows[2];
        planes[FAR] = rows[3] - rows[2];

        for plane in &mut planes {
            let len = plane.truncate().length();
            if len > 0.0 {
                *plane /= len;
            }
        }

        Self { planes }
    }

    /// Build a frustum from six already-normalized inward planes.
    pub fn from_planes(planes: [Vec4; 6]) -> Self {
        Self { planes }
    }

    /// The six planes in left, right, bottom, top, near, far order.
    pub fn planes(&self) -> &[Vec4; 6] {
        &self.planes
    }

    /// Returns `true` if a sphere lies entirely behind some plane.
    ///
    /// A sphere is culled when a plane's signed distance to its center is
    /// negative with magnitude greater than `radius`. Touching the plane keeps it.
    /// Zero planes (all components 0) never cull.
    pub fn is_sphere_culled(&self, center: Vec3, radius: f32) -> bool {
        self.planes.iter().any(|plane| {
            if plane.truncate().length_squared() < 1e-10 {
                return false;
            }
            let distance = signed_distance(*plane, center);
            distance < 0.0 && -distance > radius
        })
    }

    /// Test whether an AABB is at least partially inside the frustum.
    ///
    /// Uses the p-vertex method: for each plane, find the corner of the AABB
    /// furthest along the plane normal. If that corner is behind the plane, the
    /// entire AABB is outside. Conservative near frustum corners.
    pub fn is_aabb_visible(&self, aabb: &Aabb) -> bool {
        for plane in &self.planes {
            let normal = plane.truncate();

            let p = Vec3::new(
                if normal.x >= 0.0 {
                    aabb.max.x
                } else {
                    aabb.min.x
                },
                if normal.y >= 0.0 {
                    aabb.max.y
                } else {
                    aabb.min.y
                },
                if normal.z >= 0.0 {
                    aabb.max.z
                } else {
                    aabb.min.z
                },
            );

            if signed_distance(*plane, p) < 0.0 {
                return false;
            }
        }
        true
    }
}

/// Signed distance from `point` to `plane`; positive in front.
pub fn signed_distance(plane: Vec4, point: Vec3) -> f32 {
    plane.truncate().dot(point) + plane.w
}
