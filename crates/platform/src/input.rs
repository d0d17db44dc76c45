//! Raw key/mouse polling state fed by winit events.

use std::collections::HashSet;

use corelib::{Vec2, controls::ControlInput, vec2};
use winit::{event::ElementState, keyboard::KeyCode};

#[derive(Debug, Default)]
pub struct InputState {
    pressed: HashSet<KeyCode>,
    mouse_delta: Vec2,
    /// Sticky: stays set once Escape went down, even if released before the
    /// loop looked at it.
    escape_seen: bool,
    close_requested: bool,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_key(&mut self, code: KeyCode, state: ElementState) {
        match state {
            ElementState::Pressed => {
                if code == KeyCode::Escape {
                    self.escape_seen = true;
                }
                self.pressed.insert(code);
            }
            ElementState::Released => {
                self.pressed.remove(&code);
            }
        }
    }

    pub fn on_mouse_motion(&mut self, dx: f64, dy: f64) {
        self.mouse_delta += vec2(dx as f32, dy as f32);
    }

    pub fn on_close_requested(&mut self) {
        self.close_requested = true;
    }

    /// Keys are not "pressed" after focus loss; the release never arrives.
    pub fn on_focus_lost(&mut self) {
        self.pressed.clear();
    }

    #[inline]
    pub fn is_pressed(&self, code: KeyCode) -> bool {
        self.pressed.contains(&code)
    }

    /// Escape seen or the window asked to close.
    #[inline]
    pub fn should_exit(&self) -> bool {
        self.escape_seen || self.close_requested
    }

    /// Snapshot for this frame. Mouse motion is consumed.
    pub fn take_control_input(&mut self) -> ControlInput {
        let any = |keys: [KeyCode; 2]| keys.iter().any(|k| self.pressed.contains(k));
        let input = ControlInput {
            forward: any([KeyCode::ArrowUp, KeyCode::KeyW]),
            backward: any([KeyCode::ArrowDown, KeyCode::KeyS]),
            strafe_left: any([KeyCode::ArrowLeft, KeyCode::KeyA]),
            strafe_right: any([KeyCode::ArrowRight, KeyCode::KeyD]),
            mouse_delta: self.mouse_delta,
        };
        self.mouse_delta = Vec2::ZERO;
        input
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_is_sticky() {
        let mut input = InputState::new();
        assert!(!input.should_exit());
        input.on_key(KeyCode::Escape, ElementState::Pressed);
        input.on_key(KeyCode::Escape, ElementState::Released);
        assert!(!input.is_pressed(KeyCode::Escape));
        assert!(input.should_exit());
    }

    #[test]
    fn close_request_exits() {
        let mut input = InputState::new();
        input.on_close_requested();
        assert!(input.should_exit());
    }

    #[test]
    fn other_keys_do_not_exit() {
        let mut input = InputState::new();
        input.on_key(KeyCode::KeyQ, ElementState::Pressed);
        assert!(!input.should_exit());
    }

    #[test]
    fn mouse_delta_is_accumulated_then_consumed() {
        let mut input = InputState::new();
        input.on_mouse_motion(3.0, -1.0);
        input.on_mouse_motion(2.0, 4.0);
        assert_eq!(input.take_control_input().mouse_delta, vec2(5.0, 3.0));
        assert_eq!(input.take_control_input().mouse_delta, Vec2::ZERO);
    }

    #[test]
    fn held_keys_map_to_movement() {
        let mut input = InputState::new();
        input.on_key(KeyCode::ArrowUp, ElementState::Pressed);
        input.on_key(KeyCode::KeyD, ElementState::Pressed);
        let ctl = input.take_control_input();
        assert!(ctl.forward && ctl.strafe_right);
        assert!(!ctl.backward && !ctl.strafe_left);

        // Held keys persist across frames until released.
        assert!(input.take_control_input().forward);
        input.on_key(KeyCode::ArrowUp, ElementState::Released);
        assert!(!input.take_control_input().forward);
    }

    #[test]
    fn focus_loss_releases_keys() {
        let mut input = InputState::new();
        input.on_key(KeyCode::ArrowLeft, ElementState::Pressed);
        input.on_focus_lost();
        assert!(!input.take_control_input().strafe_left);
    }
}
