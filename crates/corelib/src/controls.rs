//! Keyboard/mouse driven camera controller.
//!
//! The controller is the only state that survives between frames; the render
//! loop owns it and feeds it one [`ControlInput`] snapshot per frame.

use crate::camera::Camera;
use crate::{Mat4, Vec2};

/// Input sampled for a single frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ControlInput {
    pub forward: bool,
    pub backward: bool,
    pub strafe_left: bool,
    pub strafe_right: bool,
    /// Cursor motion in pixels since the previous frame.
    pub mouse_delta: Vec2,
}

#[derive(Clone, Copy, Debug)]
pub struct CameraController {
    camera: Camera,
    /// World units per second.
    pub speed: f32,
    /// Radians per pixel of cursor motion.
    pub mouse_speed: f32,
}

impl Default for CameraController {
    fn default() -> Self {
        Self::new(Camera::default())
    }
}

impl CameraController {
    pub fn new(camera: Camera) -> Self {
        Self {
            camera,
            speed: 3.0,
            mouse_speed: 0.005,
        }
    }

    #[inline]
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Fold one frame of input into the camera. `dt` is in seconds.
    pub fn update(&mut self, input: &ControlInput, dt: f32) {
        let cam = &mut self.camera;
        cam.horizontal_angle -= self.mouse_speed * input.mouse_delta.x;
        cam.vertical_angle -= self.mouse_speed * input.mouse_delta.y;

        let step = self.speed * dt;
        let direction = cam.direction();
        let right = cam.right();
        if input.forward {
            cam.position += direction * step;
        }
        if input.backward {
            cam.position -= direction * step;
        }
        if input.strafe_right {
            cam.position += right * step;
        }
        if input.strafe_left {
            cam.position -= right * step;
        }
    }

    #[inline]
    pub fn view_matrix(&self) -> Mat4 {
        self.camera.view()
    }

    #[inline]
    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        self.camera.projection(aspect)
    }
}
