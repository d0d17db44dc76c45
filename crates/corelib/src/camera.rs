use std::f32::consts::{FRAC_PI_2, PI};

use crate::{Mat4, Vec3};

/// First-person perspective camera (right-handed) described by a position and
/// two angles instead of a look-at target.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    /// Yaw in radians; `PI` looks down -Z.
    pub horizontal_angle: f32,
    /// Pitch in radians; positive looks up.
    pub vertical_angle: f32,
    pub fov_y_deg: f32,
    pub z_near: f32,
    pub z_far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 5.0),
            horizontal_angle: PI,
            vertical_angle: 0.0,
            fov_y_deg: 45.0,
            z_near: 0.1,
            z_far: 100.0,
        }
    }
}

impl Camera {
    /// Spherical to cartesian conversion of the two angles.
    #[inline]
    pub fn direction(&self) -> Vec3 {
        let (sin_v, cos_v) = self.vertical_angle.sin_cos();
        let (sin_h, cos_h) = self.horizontal_angle.sin_cos();
        Vec3::new(cos_v * sin_h, sin_v, cos_v * cos_h)
    }

    /// Horizontal right vector; never tilts with pitch.
    #[inline]
    pub fn right(&self) -> Vec3 {
        let h = self.horizontal_angle - FRAC_PI_2;
        Vec3::new(h.sin(), 0.0, h.cos())
    }

    #[inline]
    pub fn up(&self) -> Vec3 {
        self.right().cross(self.direction())
    }

    #[inline]
    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.direction(), self.up())
    }

    /// Depth maps to [0, 1], which is what wgpu clip space expects.
    #[inline]
    pub fn projection(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(
            self.fov_y_deg.to_radians(),
            aspect.max(1e-6),
            self.z_near,
            self.z_far,
        )
    }
}
