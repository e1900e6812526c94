//! Fire-and-forget noise events and their conversion to audible pings.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

const JUMP_STRENGTH: f32 = 0.35;
const ROLL_STRENGTH: f32 = 0.8;
const LAND_STRENGTH: f32 = 0.9;

#[derive(Clone, Copy, Debug, PartialEq, Reflect, Serialize, Deserialize)]
pub enum NoiseEvent {
    Jump,
    Land,
    Roll,
    /// Strength in `0..=1`
    Footstep { strength: f32 },
}

/// Receiver of noise events emitted by the state machines.
pub trait NoiseSink {
    fn emit(&mut self, event: NoiseEvent);
}

impl NoiseSink for Vec<NoiseEvent> {
    fn emit(&mut self, event: NoiseEvent) {
        self.push(event);
    }
}

/// Base hearing radius per noise kind, in metres.
#[derive(Clone, Debug, PartialEq, Reflect, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseRadii {
    pub footstep: f32,
    pub roll: f32,
    pub land: f32,
    pub global_multiplier: f32,
}

impl Default for NoiseRadii {
    fn default() -> Self {
        Self {
            footstep: 6.0,
            roll: 8.0,
            land: 9.0,
            global_multiplier: 1.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Reflect, Serialize, Deserialize)]
pub struct NoisePing {
    pub position: Vec3,
    pub strength: f32,
    pub base_radius: f32,
}

impl NoisePing {
    pub fn from_event(event: NoiseEvent, position: Vec3, radii: &NoiseRadii) -> Self {
        let (strength, base_radius) = match event {
            NoiseEvent::Jump => (JUMP_STRENGTH, radii.footstep),
            NoiseEvent::Land => (LAND_STRENGTH, radii.land),
            NoiseEvent::Roll => (ROLL_STRENGTH, radii.roll),
            NoiseEvent::Footstep { strength } => (strength.clamp(0.0, 1.0), radii.footstep),
        };
        Self {
            position,
            strength,
            base_radius: base_radius * radii.global_multiplier,
        }
    }

    /// Louder noises carry further: half the base radius when silent, one
    /// and a half times at full strength.
    pub fn effective_radius(&self) -> f32 {
        self.base_radius * (0.5 + self.strength)
    }
}

/// Noise published for listeners (AI hearing, audio).
#[derive(Message, Clone, Debug, Serialize, Deserialize)]
pub struct NoiseMessage {
    pub source: Entity,
    pub ping: NoisePing,
}
