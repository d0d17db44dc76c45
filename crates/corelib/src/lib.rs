//! Core types: math re-exports, camera, input controller, setup errors.

pub use glam::{EulerRot, Mat4, Quat, Vec2, Vec3, Vec4, vec2, vec3};

pub mod camera;
pub mod controls;
pub mod error;
pub mod transform;

pub use error::{SetupError, SetupResult};
