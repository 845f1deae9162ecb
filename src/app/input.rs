use winit::event::{MouseButton, MouseScrollDelta};
use winit::keyboard::{KeyCode, PhysicalKey};

/// Pixels of trackpad scroll that count as one wheel notch.
const PIXELS_PER_NOTCH: f32 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputAction {
    None,
    Orbit { dx: f32, dy: f32 },
    Pan { dx: f32, dy: f32 },
    /// Positive values move toward the orbit target.
    Dolly(f32),
    SwitchCamera,
    Exit,
}

#[derive(Default, Debug, Clone, Copy)]
pub struct InputState {
    rotating: bool,
    panning: bool,
    cursor: Option<(f64, f64)>,
}

impl InputState {
    pub fn handle_key(&mut self, key: PhysicalKey, pressed: bool) -> InputAction {
        if !pressed {
            return InputAction::None;
        }
        match key {
            PhysicalKey::Code(KeyCode::KeyC) => InputAction::SwitchCamera,
            PhysicalKey::Code(KeyCode::Escape) => InputAction::Exit,
            _ => InputAction::None,
        }
    }

    pub fn handle_mouse_button(&mut self, button: MouseButton, pressed: bool) {
        match button {
            MouseButton::Left => self.rotating = pressed,
            MouseButton::Right | MouseButton::Middle => self.panning = pressed,
            _ => {}
        }
    }

    pub fn handle_cursor_moved(&mut self, x: f64, y: f64) -> InputAction {
        let previous = self.cursor.replace((x, y));
        let Some((px, py)) = previous else {
            return InputAction::None;
        };
        let (dx, dy) = ((x - px) as f32, (y - py) as f32);
        if self.rotating {
            InputAction::Orbit { dx, dy }
        } else if self.panning {
            InputAction::Pan { dx, dy }
        } else {
            InputAction::None
        }
    }

    pub fn handle_wheel(&mut self, delta: MouseScrollDelta) -> InputAction {
        let steps = match delta {
            MouseScrollDelta::LineDelta(_, y) => y,
            MouseScrollDelta::PixelDelta(position) => position.y as f32 / PIXELS_PER_NOTCH,
        };
        if steps == 0.0 {
            InputAction::None
        } else {
            InputAction::Dolly(steps)
        }
    }

    /// Drops any drag in progress, e.g. when the pointer leaves the window.
    pub fn release_all(&mut self) {
        self.rotating = false;
        self.panning = false;
        self.cursor = None;
    }
}
