//! Input service: named actions, per-tick edges and held state

use glam::{Vec2, Vec3};
use std::collections::HashSet;

/// Named input actions the state machine reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputAction {
    Movement,
    Look,
    Aim,
    Fire,
    Sprint,
    Vault,
    Reload,
    EnterVehicle,
    Respawn,
    EquipPrimary,
    EquipSecondary,
    ToggleEquip,
}

/// Device class; sprint is held on keyboard+mouse and toggled on gamepad
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputDevice {
    #[default]
    KeyboardMouse,
    Gamepad,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputPhase {
    Pressed,
    Released,
    /// Interaction completed; `tap` marks a short press
    Performed { tap: bool },
    /// Axis value changed
    Value(Vec2),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputEvent {
    pub action: InputAction,
    pub phase: InputPhase,
}

impl InputEvent {
    pub fn pressed(action: InputAction) -> Self {
        Self {
            action,
            phase: InputPhase::Pressed,
        }
    }

    pub fn released(action: InputAction) -> Self {
        Self {
            action,
            phase: InputPhase::Released,
        }
    }

    pub fn tapped(action: InputAction) -> Self {
        Self {
            action,
            phase: InputPhase::Performed { tap: true },
        }
    }

    pub fn axis(action: InputAction, value: Vec2) -> Self {
        Self {
            action,
            phase: InputPhase::Value(value),
        }
    }

    pub fn was_pressed(&self) -> bool {
        matches!(self.phase, InputPhase::Pressed)
    }

    pub fn was_released(&self) -> bool {
        matches!(self.phase, InputPhase::Released)
    }

    pub fn was_performed(&self) -> bool {
        matches!(self.phase, InputPhase::Performed { .. })
    }

    pub fn is_tap(&self) -> bool {
        matches!(self.phase, InputPhase::Performed { tap: true })
    }
}

/// Input state of the locally controlled player
#[derive(Debug, Clone, Default)]
pub struct InputState {
    pub device: InputDevice,
    /// Menus, chat or pause; suppresses input-driven transitions
    pub disabled: bool,
    held: HashSet<InputAction>,
    pressed_this_tick: HashSet<InputAction>,
    move_axis: Vec2,
    look_axis: Vec2,
}

impl InputState {
    pub fn new(device: InputDevice) -> Self {
        Self {
            device,
            ..Self::default()
        }
    }

    /// Input that never drives a transition, for players simulated without
    /// a local input device
    pub fn disabled() -> Self {
        Self {
            disabled: true,
            ..Self::default()
        }
    }

    /// Record an event before it is dispatched to the active state
    pub fn apply(&mut self, event: &InputEvent) {
        match event.phase {
            InputPhase::Pressed => {
                self.held.insert(event.action);
                self.pressed_this_tick.insert(event.action);
            }
            InputPhase::Released => {
                self.held.remove(&event.action);
            }
            InputPhase::Performed { .. } => {
                self.pressed_this_tick.insert(event.action);
            }
            InputPhase::Value(value) => match event.action {
                InputAction::Movement => self.move_axis = value.clamp_length_max(1.0),
                InputAction::Look => self.look_axis = value,
                _ => {}
            },
        }
    }

    pub fn is_held(&self, action: InputAction) -> bool {
        self.held.contains(&action)
    }

    pub fn was_pressed_this_tick(&self, action: InputAction) -> bool {
        self.pressed_this_tick.contains(&action)
    }

    /// Movement input as a horizontal vector (x sideways, z forwards);
    /// zero while input is disabled
    pub fn move_dir(&self) -> Vec3 {
        if self.disabled {
            Vec3::ZERO
        } else {
            Vec3::new(self.move_axis.x, 0.0, self.move_axis.y)
        }
    }

    pub fn look_delta(&self) -> Vec2 {
        if self.disabled {
            Vec2::ZERO
        } else {
            self.look_axis
        }
    }

    /// Clear per-tick edges
    pub fn end_tick(&mut self) {
        self.pressed_this_tick.clear();
        self.look_axis = Vec2::ZERO;
    }
}
