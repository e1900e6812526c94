//! What a state machine gets handed each tick.

use bevy::prelude::*;

use crate::animation::{AnimBool, AnimFloat, AnimSegment, AnimTrigger, AnimationGraph, RollDirection};
use crate::body::CapsuleBody;
use crate::mover::{CapsuleMover, Contacts};
use crate::noise::{NoiseEvent, NoiseSink};
use crate::query::{LadderDirectory, SpatialQueryService};

/// Simulation clock for one fixed step, in seconds.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Tick {
    pub now: f32,
    pub dt: f32,
}

impl Tick {
    pub fn new(now: f32, dt: f32) -> Self {
        Self { now, dt }
    }
}

/// Collaborators injected into the state machines for one tick.
///
/// The mover, the animation graph and the noise sink are optional; every
/// call through a missing one is a no-op.
pub struct Collaborators<'a> {
    pub query: &'a dyn SpatialQueryService,
    pub ladders: &'a dyn LadderDirectory,
    pub mover: Option<&'a dyn CapsuleMover>,
    pub anim: Option<&'a mut dyn AnimationGraph>,
    pub noise: Option<&'a mut dyn NoiseSink>,
}

impl<'a> Collaborators<'a> {
    pub fn new(query: &'a dyn SpatialQueryService, ladders: &'a dyn LadderDirectory) -> Self {
        Self {
            query,
            ladders,
            mover: None,
            anim: None,
            noise: None,
        }
    }

    pub fn with_mover(mut self, mover: &'a dyn CapsuleMover) -> Self {
        self.mover = Some(mover);
        self
    }

    pub fn with_anim(mut self, anim: &'a mut dyn AnimationGraph) -> Self {
        self.anim = Some(anim);
        self
    }

    pub fn with_noise(mut self, noise: &'a mut dyn NoiseSink) -> Self {
        self.noise = Some(noise);
        self
    }

    /// Resolve a displacement, `None` when there is no mover.
    pub fn move_body(&self, body: &mut CapsuleBody, delta: Vec3) -> Option<Contacts> {
        self.mover.map(|mover| mover.move_body(body, delta))
    }

    pub fn set_bool(&mut self, signal: AnimBool, value: bool) {
        if let Some(anim) = self.anim.as_deref_mut() {
            anim.set_bool(signal, value);
        }
    }

    pub fn set_float(&mut self, signal: AnimFloat, value: f32) {
        if let Some(anim) = self.anim.as_deref_mut() {
            anim.set_float(signal, value);
        }
    }

    /// Reset then set, so a trigger still pending from an earlier tick fires once.
    pub fn fire(&mut self, signal: AnimTrigger) {
        if let Some(anim) = self.anim.as_deref_mut() {
            anim.reset_trigger(signal);
            anim.set_trigger(signal);
        }
    }

    pub fn reset_trigger(&mut self, signal: AnimTrigger) {
        if let Some(anim) = self.anim.as_deref_mut() {
            anim.reset_trigger(signal);
        }
    }

    pub fn set_roll_direction(&mut self, direction: RollDirection) {
        if let Some(anim) = self.anim.as_deref_mut() {
            anim.set_roll_direction(direction);
        }
    }

    pub fn in_transition(&self) -> bool {
        self.anim.as_deref().is_some_and(|anim| anim.in_transition())
    }

    pub fn is_playing(&self, segment: AnimSegment) -> bool {
        self.anim.as_deref().is_some_and(|anim| anim.is_playing(segment))
    }

    pub fn emit(&mut self, event: NoiseEvent) {
        if let Some(noise) = self.noise.as_deref_mut() {
            noise.emit(event);
        }
    }
}
