//! Routes input to the three machines and runs them in a fixed order.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::animation::{AnimBool, AnimEvent, AnimTrigger};
use crate::body::CapsuleBody;
use crate::config::TraversalConfig;
use crate::context::{Collaborators, Tick};
use crate::input::FrameInput;
use crate::ladder::LadderClimber;
use crate::ledge::{ClimbPhase, LedgeClimber};
use crate::locomotion::{Locomotion, LocomotionReport};
use crate::noise::NoiseEvent;

const HANG_MANTLE_INPUT: f32 = 0.5;
const HANG_DROP_INPUT: f32 = -0.5;
const DEFAULT_FOOTSTEP_STRENGTH: f32 = 0.8;

/// Which machine applies displacement to the body this tick.
#[derive(Reflect, Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BodyOwner {
    #[default]
    Locomotion,
    Ladder,
    Ledge,
}

#[derive(Component, Reflect, Serialize, Deserialize, Clone, Debug, Default)]
pub struct TraversalController {
    pub locomotion: Locomotion,
    pub ladder: LadderClimber,
    pub ledge: LedgeClimber,
    armed: bool,
}

impl TraversalController {
    pub fn from_config(config: &TraversalConfig) -> Self {
        Self {
            locomotion: Locomotion::new(config.locomotion.clone()),
            ladder: LadderClimber::new(config.ladder.clone()),
            ledge: LedgeClimber::new(config.ledge.clone()),
            armed: false,
        }
    }

    pub fn owner(&self) -> BodyOwner {
        if self.ladder.is_attached() {
            BodyOwner::Ladder
        } else if self.ledge.is_active() {
            BodyOwner::Ledge
        } else {
            BodyOwner::Locomotion
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn tick(
        &mut self,
        body: &mut CapsuleBody,
        input: &FrameInput,
        tick: Tick,
        collab: &mut Collaborators,
    ) -> LocomotionReport {
        let before = self.owner();
        let locomotion_input = self.route(body, input, tick.now, collab);

        // One machine displaces the body per tick: locomotion only keeps it
        // when nothing was handed over during input capture.
        let routed = self.owner();
        let report = if before == BodyOwner::Locomotion && routed == BodyOwner::Locomotion {
            self.locomotion.tick(body, &locomotion_input, tick, collab)
        } else {
            LocomotionReport::default()
        };
        match routed {
            BodyOwner::Ladder => self
                .ladder
                .tick(body, &mut self.locomotion, input, tick, collab),
            BodyOwner::Ledge => self.ledge.tick(body, input, tick.dt, collab),
            BodyOwner::Locomotion => {}
        }

        let after = self.owner();
        if before != after {
            debug!("body owner {:?} -> {:?}", before, after);
        }
        report
    }

    /// Consume the edges the climbing machines care about and return what
    /// is left for locomotion.
    fn route(
        &mut self,
        body: &mut CapsuleBody,
        input: &FrameInput,
        now: f32,
        collab: &mut Collaborators,
    ) -> FrameInput {
        let mut rest = *input;
        let was_hanging = self.ledge.phase() == ClimbPhase::Hanging;

        if !self.ladder.is_attached() && !self.ledge.is_active() {
            self.ladder
                .try_air_grab(body, &mut self.locomotion, collab, now);
        }

        if input.equip {
            self.armed = !self.armed;
            collab.set_bool(AnimBool::Armed, self.armed);
            collab.fire(AnimTrigger::Equip);
        }

        if input.interact {
            self.interact(body, input, now, collab);
        }

        if input.jump && self.jump(body, input, now, collab) {
            rest.jump = false;
        }

        // A ledge grabbed during this capture hangs for at least one tick.
        if was_hanging && self.ledge.phase() == ClimbPhase::Hanging {
            if input.move_axis.y > HANG_MANTLE_INPUT {
                self.ledge.request_mantle(collab);
            } else if input.move_axis.y < HANG_DROP_INPUT {
                self.ledge.request_drop(collab);
            }
        }

        if input.dash && self.ladder.is_attached() {
            self.ladder
                .dash(body, &mut self.locomotion, collab, now);
        }

        rest
    }

    fn interact(&mut self, body: &mut CapsuleBody, input: &FrameInput, now: f32, collab: &mut Collaborators) {
        if self.ladder.is_attached() {
            self.ladder
                .jump_off(false, body, &mut self.locomotion, collab, now);
            return;
        }
        match self.ledge.phase() {
            ClimbPhase::Hanging => {
                self.ledge.request_drop(collab);
            }
            ClimbPhase::None => {
                if !self
                    .ladder
                    .try_attach(body, &mut self.locomotion, collab, now)
                {
                    self.ledge.try_start(
                        body,
                        &mut self.locomotion,
                        input.world_direction(),
                        collab,
                        now,
                    );
                }
            }
            ClimbPhase::ClimbingUp | ClimbPhase::Dropping => {}
        }
    }

    /// Returns true when a climbing machine consumed the jump.
    fn jump(&mut self, body: &mut CapsuleBody, input: &FrameInput, now: f32, collab: &mut Collaborators) -> bool {
        if self.ladder.is_attached() {
            self.ladder
                .jump(body, &mut self.locomotion, collab, now);
            return true;
        }
        match self.ledge.phase() {
            ClimbPhase::Hanging => {
                self.ledge.request_mantle(collab);
                true
            }
            ClimbPhase::ClimbingUp | ClimbPhase::Dropping => true,
            ClimbPhase::None if !body.grounded => self.ledge.try_start(
                body,
                &mut self.locomotion,
                input.world_direction(),
                collab,
                now,
            ),
            ClimbPhase::None => false,
        }
    }

    /// Apply a notification from the animation layer.
    pub fn notify(
        &mut self,
        event: AnimEvent,
        body: &mut CapsuleBody,
        collab: &mut Collaborators,
        now: f32,
    ) -> bool {
        match event {
            AnimEvent::MantleFinished => {
                self.ledge
                    .finish_mantle(body, &mut self.locomotion, collab, now)
            }
            AnimEvent::DropFinished => {
                self.ledge
                    .finish_drop(body, &mut self.locomotion, collab, now)
            }
            AnimEvent::LadderTopReached => {
                self.ladder
                    .exit_to_top(body, &mut self.locomotion, collab, now)
            }
            AnimEvent::LadderBottomReached => {
                self.ladder
                    .jump_off(false, body, &mut self.locomotion, collab, now)
            }
            AnimEvent::Footstep(strength) => {
                if self.owner() != BodyOwner::Locomotion || !body.grounded {
                    return false;
                }
                let strength = if strength <= 0.0 {
                    DEFAULT_FOOTSTEP_STRENGTH
                } else {
                    strength.clamp(0.0, 1.0)
                };
                collab.emit(NoiseEvent::Footstep { strength });
                true
            }
        }
    }
}
