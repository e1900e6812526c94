//! The character's collision volume and the per-body frame helpers.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::mover::Contacts;

pub const PLAYER_CAPSULE_RADIUS: f32 = 0.3;
pub const PLAYER_CAPSULE_HEIGHT: f32 = 1.8;
const DIRECTION_EPSILON_SQUARED: f32 = 0.0001;

/// Kinematic capsule owned by whichever traversal machine holds control.
///
/// `position` is the bottom of the capsule (the feet); the body faces
/// `rotation * -Z` like a Bevy `Transform`.
#[derive(Component, Reflect, Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CapsuleBody {
    pub radius: f32,
    pub height: f32,
    pub position: Vec3,
    pub rotation: Quat,
    pub vertical_velocity: f32,
    pub grounded: bool,
    pub grounded_last_frame: bool,
    /// Height of obstacles the mover may climb while grounded
    pub step_offset: f32,
    /// Off while a machine repositions the body without collision response
    pub collision_enabled: bool,
    /// Contacts reported by the last resolved displacement
    pub last_contacts: Contacts,
}

impl Default for CapsuleBody {
    fn default() -> Self {
        Self::new(PLAYER_CAPSULE_RADIUS, PLAYER_CAPSULE_HEIGHT, Vec3::ZERO)
    }
}

impl CapsuleBody {
    pub fn new(radius: f32, height: f32, position: Vec3) -> Self {
        Self {
            radius,
            height,
            position,
            rotation: Quat::IDENTITY,
            vertical_velocity: 0.0,
            grounded: false,
            grounded_last_frame: false,
            step_offset: 0.0,
            collision_enabled: true,
            last_contacts: Contacts::default(),
        }
    }

    pub fn center(&self) -> Vec3 {
        self.position + Vec3::Y * (self.height * 0.5)
    }

    /// Planar forward direction, never zero.
    pub fn forward(&self) -> Vec3 {
        let forward = self.rotation * Vec3::NEG_Z;
        let planar = Vec3::new(forward.x, 0.0, forward.z);
        if planar.length_squared() > DIRECTION_EPSILON_SQUARED {
            planar.normalize()
        } else {
            Vec3::NEG_Z
        }
    }

    /// Express a world direction in the body's planar frame where `x` is
    /// right and `z` is forward.
    pub fn to_local_planar(&self, world: Vec3) -> Vec3 {
        let local = self.rotation.inverse() * world;
        Vec3::new(local.x, 0.0, -local.z)
    }

    /// Place the body without going through the mover. Contacts from before
    /// the jump no longer apply; the collision switch is left as it is.
    pub fn teleport(&mut self, position: Vec3) {
        self.position = position;
        self.last_contacts = Contacts::default();
    }
}

/// Upright rotation whose forward (`-Z`) points along the planar part of `direction`.
pub fn facing_rotation(direction: Vec3) -> Option<Quat> {
    let planar = Vec3::new(direction.x, 0.0, direction.z);
    if planar.length_squared() <= DIRECTION_EPSILON_SQUARED {
        return None;
    }
    let planar = planar.normalize();
    Some(Quat::from_rotation_y(f32::atan2(-planar.x, -planar.z)))
}

/// Frame-rate independent slerp factor.
pub fn smoothing_factor(rate: f32, dt: f32) -> f32 {
    (rate * dt).clamp(0.0, 1.0)
}
