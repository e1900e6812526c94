use bevy::prelude::*;
use leafwing_input_manager::Actionlike;
use leafwing_input_manager::prelude::*;
use serde::{Deserialize, Serialize};

const MOVEMENT_DEADZONE_SQUARED: f32 = 0.000001;

#[derive(
    Clone, Copy, PartialEq, Eq, Hash, Debug, Reflect, Serialize, Deserialize, Actionlike, Default,
)]
pub enum TraversalAction {
    #[default]
    #[actionlike(DualAxis)]
    Move,

    #[actionlike(Button)]
    Jump,

    #[actionlike(Button)]
    Roll,

    #[actionlike(Button)]
    Run,

    #[actionlike(Button)]
    Interact,

    #[actionlike(Button)]
    Dash,

    #[actionlike(Button)]
    Equip,
}

pub fn default_input_map() -> InputMap<TraversalAction> {
    InputMap::<TraversalAction>::default()
        .with(TraversalAction::Jump, KeyCode::Space)
        .with(TraversalAction::Roll, KeyCode::ControlLeft)
        .with(TraversalAction::Run, KeyCode::ShiftLeft)
        .with(TraversalAction::Interact, KeyCode::KeyE)
        .with(TraversalAction::Dash, KeyCode::KeyQ)
        .with(TraversalAction::Equip, KeyCode::KeyF)
        .with_dual_axis(TraversalAction::Move, VirtualDPad::wasd())
        .with_dual_axis(TraversalAction::Move, VirtualDPad::arrow_keys())
}

/// Camera heading in radians around +Y, written by whatever drives the camera.
#[derive(Component, Reflect, Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq)]
pub struct CameraYaw(pub f32);

/// One fixed tick worth of input.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameInput {
    /// Raw stick, `x` right and `y` forward, each in `-1..=1`
    pub move_axis: Vec2,
    pub camera_yaw: f32,
    pub jump: bool,
    pub roll: bool,
    pub run: bool,
    pub interact: bool,
    pub dash: bool,
    pub equip: bool,
}

impl FrameInput {
    pub fn has_move(&self) -> bool {
        self.move_axis.length_squared() > MOVEMENT_DEADZONE_SQUARED
    }

    /// Camera-relative planar direction, magnitude at most one.
    pub fn world_direction(&self) -> Vec3 {
        if !self.has_move() {
            return Vec3::ZERO;
        }
        let forward = Vec3::new(0.0, 0.0, -self.move_axis.y);
        let right = Vec3::new(self.move_axis.x, 0.0, 0.0);
        let move_to_world = Mat3::from_rotation_y(self.camera_yaw);
        (move_to_world * (forward + right)).clamp_length_max(1.0)
    }
}

/// Input captured at frame rate and consumed at the fixed rate.
///
/// Button edges are OR-latched until the next fixed tick takes them, so a
/// press between two ticks is seen exactly once.
#[derive(Component, Reflect, Clone, Copy, Debug, Default, PartialEq)]
pub struct InputLatch {
    pub move_axis: Vec2,
    pub run: bool,
    pub jump: bool,
    pub roll: bool,
    pub interact: bool,
    pub dash: bool,
    pub equip: bool,
}

impl InputLatch {
    pub fn capture(&mut self, actions: &ActionState<TraversalAction>) {
        self.move_axis = actions
            .axis_pair(&TraversalAction::Move)
            .clamp(Vec2::NEG_ONE, Vec2::ONE);
        self.run = actions.pressed(&TraversalAction::Run);
        self.jump |= actions.just_pressed(&TraversalAction::Jump);
        self.roll |= actions.just_pressed(&TraversalAction::Roll);
        self.interact |= actions.just_pressed(&TraversalAction::Interact);
        self.dash |= actions.just_pressed(&TraversalAction::Dash);
        self.equip |= actions.just_pressed(&TraversalAction::Equip);
    }

    /// Hand the latched state to a fixed tick and clear the edges.
    pub fn take(&mut self, camera_yaw: f32) -> FrameInput {
        let input = FrameInput {
            move_axis: self.move_axis,
            camera_yaw,
            jump: self.jump,
            roll: self.roll,
            run: self.run,
            interact: self.interact,
            dash: self.dash,
            equip: self.equip,
        };
        self.jump = false;
        self.roll = false;
        self.interact = false;
        self.dash = false;
        self.equip = false;
        input
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    fn approx(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-4
    }

    #[test]
    fn test_world_direction_follows_camera_yaw() {
        let mut input = FrameInput {
            move_axis: Vec2::new(0.0, 1.0),
            ..default()
        };
        assert!(approx(input.world_direction(), Vec3::NEG_Z));

        input.camera_yaw = FRAC_PI_2;
        assert!(approx(input.world_direction(), Vec3::NEG_X));

        input.move_axis = Vec2::new(1.0, 0.0);
        input.camera_yaw = 0.0;
        assert!(approx(input.world_direction(), Vec3::X));
    }

    #[test]
    fn test_world_direction_is_clamped() {
        let input = FrameInput {
            move_axis: Vec2::new(1.0, 1.0),
            ..default()
        };
        assert!((input.world_direction().length() - 1.0).abs() < 1e-4);
        assert_eq!(FrameInput::default().world_direction(), Vec3::ZERO);
    }

    #[test]
    fn test_latch_keeps_edges_until_taken() {
        let mut actions = ActionState::<TraversalAction>::default();
        let mut latch = InputLatch::default();

        actions.press(&TraversalAction::Jump);
        latch.capture(&actions);
        // Released again before the fixed tick ran
        actions.release(&TraversalAction::Jump);
        latch.capture(&actions);

        let first = latch.take(0.0);
        assert!(first.jump);
        assert!(!latch.take(0.0).jump, "edge must be consumed once");
    }
}
