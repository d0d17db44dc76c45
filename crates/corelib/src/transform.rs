use crate::{EulerRot, Mat4, Quat, Vec3};

/// Object placement in world space (Euler XYZ rotation).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    /// Euler angles in radians (XYZ order).
    pub rotation_euler: Vec3,
    pub scale: Vec3,
}

impl Transform {
    #[inline]
    pub const fn identity() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation_euler: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }

    /// Model matrix = T * R * S.
    #[inline]
    pub fn matrix(&self) -> Mat4 {
        let q = Quat::from_euler(
            EulerRot::XYZ,
            self.rotation_euler.x,
            self.rotation_euler.y,
            self.rotation_euler.z,
        );
        Mat4::from_scale_rotation_translation(self.scale, q, self.translation)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

/// Combined clip-space transform: `projection * view * model`.
///
/// Column vectors, so the model matrix is applied to the vertex first.
#[inline]
pub fn model_view_projection(projection: Mat4, view: Mat4, model: Mat4) -> Mat4 {
    projection * view * model
}
