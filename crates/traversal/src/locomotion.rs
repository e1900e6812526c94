//! Grounded controller: walking, jumping, gravity, stamina and rolls.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::animation::{AnimBool, AnimFloat, AnimSegment, AnimTrigger, RollDirection};
use crate::body::{CapsuleBody, facing_rotation, smoothing_factor};
use crate::context::{Collaborators, Tick};
use crate::input::FrameInput;
use crate::noise::NoiseEvent;
use crate::query::SurfaceLayer;

/// Vertical velocity held while grounded so the body keeps touching uneven floors
const STICK_VELOCITY: f32 = -2.0;
const FALL_TRIGGER_SPEED: f32 = -0.05;
const FACING_DOT: f32 = 0.25;
const DIRECTION_EPSILON_SQUARED: f32 = 0.0001;

#[derive(Reflect, Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct LocomotionConfig {
    pub walk_speed: f32,
    pub run_speed: f32,
    pub rotation_speed: f32,
    pub jump_height: f32,
    pub ascend_gravity: f32,
    pub descend_gravity: f32,
    pub terminal_fall_speed: f32,
    pub jump_cooldown: f32,
    pub landing_cooldown: f32,
    pub coyote_time: f32,
    pub jump_buffer: f32,
    pub ground_probe_radius: f32,
    pub ground_probe_offset: f32,
    pub step_offset: f32,
    pub roll_cooldown: f32,
    pub roll_cost: f32,
    pub stamina_max: f32,
    pub stamina_drain: f32,
    pub stamina_regen: f32,
    pub regen_delay: f32,
    pub roll_regen_delay: f32,
    pub input_deadzone: f32,
    pub blend_damping: f32,
    pub run_blend_boost: f32,
}

impl Default for LocomotionConfig {
    fn default() -> Self {
        Self {
            walk_speed: 5.0,
            run_speed: 8.0,
            rotation_speed: 12.0,
            jump_height: 1.2,
            ascend_gravity: 22.0,
            descend_gravity: 36.0,
            terminal_fall_speed: 55.0,
            jump_cooldown: 0.06,
            landing_cooldown: 0.05,
            coyote_time: 0.12,
            jump_buffer: 0.12,
            ground_probe_radius: 0.22,
            ground_probe_offset: 0.05,
            step_offset: 0.35,
            roll_cooldown: 0.15,
            roll_cost: 20.0,
            stamina_max: 100.0,
            stamina_drain: 25.0,
            stamina_regen: 15.0,
            regen_delay: 0.75,
            roll_regen_delay: 0.5,
            input_deadzone: 0.10,
            blend_damping: 0.08,
            run_blend_boost: 1.4,
        }
    }
}

impl LocomotionConfig {
    pub fn jump_velocity(&self) -> f32 {
        (2.0 * self.ascend_gravity * self.jump_height.max(0.01)).sqrt()
    }
}

/// What happened during one locomotion tick.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LocomotionReport {
    pub jumped: bool,
    pub landed: bool,
    pub rolled: Option<RollDirection>,
}

#[derive(Reflect, Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Locomotion {
    pub config: LocomotionConfig,
    stamina: f32,
    running: bool,
    suspended: bool,
    fall_signalled: bool,
    /// Smoothed strafe/forward blend
    blend: Vec2,
    regen_at: f32,
    jump_ready_at: f32,
    roll_ready_at: f32,
    coyote_until: f32,
    buffer_until: f32,
    pending_impulse: Vec3,
}

impl Default for Locomotion {
    fn default() -> Self {
        Self::new(LocomotionConfig::default())
    }
}

impl Locomotion {
    pub fn new(config: LocomotionConfig) -> Self {
        Self {
            stamina: config.stamina_max,
            config,
            running: false,
            suspended: false,
            fall_signalled: false,
            blend: Vec2::ZERO,
            regen_at: 0.0,
            jump_ready_at: 0.0,
            roll_ready_at: 0.0,
            coyote_until: f32::NEG_INFINITY,
            buffer_until: f32::NEG_INFINITY,
            pending_impulse: Vec3::ZERO,
        }
    }

    pub fn stamina(&self) -> f32 {
        self.stamina
    }

    pub fn stamina_fraction(&self) -> f32 {
        if self.config.stamina_max <= 0.0 {
            1.0
        } else {
            (self.stamina / self.config.stamina_max).clamp(0.0, 1.0)
        }
    }

    pub fn set_stamina(&mut self, value: f32) {
        self.stamina = value.clamp(0.0, self.config.stamina_max);
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    pub fn blend(&self) -> Vec2 {
        self.blend
    }

    pub fn coyote_until(&self) -> f32 {
        self.coyote_until
    }

    /// Queue a planar push consumed by the next displacement.
    pub fn apply_planar_impulse(&mut self, impulse: Vec3) {
        self.pending_impulse += Vec3::new(impulse.x, 0.0, impulse.z);
    }

    pub fn pending_impulse(&self) -> Vec3 {
        self.pending_impulse
    }

    /// Raise vertical velocity to at least `velocity`.
    pub fn add_vertical_velocity(&self, body: &mut CapsuleBody, velocity: f32) {
        body.vertical_velocity = body.vertical_velocity.max(velocity);
    }

    /// Hand the body to another machine, or take it back.
    pub fn suspend(&mut self, suspended: bool, now: f32, collab: &mut Collaborators) {
        self.suspended = suspended;
        if suspended {
            self.running = false;
            self.buffer_until = f32::NEG_INFINITY;
            self.blend = Vec2::ZERO;
            collab.set_bool(AnimBool::Running, false);
            collab.set_float(AnimFloat::MoveX, 0.0);
            collab.set_float(AnimFloat::MoveY, 0.0);
        } else {
            self.coyote_until = now + self.config.coyote_time;
            self.fall_signalled = false;
        }
    }

    pub fn tick(
        &mut self,
        body: &mut CapsuleBody,
        input: &FrameInput,
        tick: Tick,
        collab: &mut Collaborators,
    ) -> LocomotionReport {
        let mut report = LocomotionReport::default();
        if self.suspended {
            return report;
        }
        let Tick { now, dt } = tick;
        let direction = input.world_direction();

        self.update_grounding(body, collab, now);
        self.arbitrate_jump(body, input, collab, now, &mut report);
        self.apply_gravity(body, dt);
        self.update_stamina(body, input, direction, now, dt);
        self.displace(body, direction, collab, dt);
        self.handle_landing(body, collab, now, &mut report);
        self.update_fall_trigger(body, collab, &report);
        if input.roll {
            report.rolled = self.try_roll(body, direction, collab, now);
        }
        self.rotate(body, input, direction, dt);
        self.push_blend(body, direction, collab, dt);

        report
    }

    fn update_grounding(&mut self, body: &mut CapsuleBody, collab: &Collaborators, now: f32) {
        body.grounded_last_frame = body.grounded;

        let probe_center = body.position + Vec3::Y * self.config.ground_probe_offset;
        let probe = collab.query.check_sphere(
            probe_center,
            self.config.ground_probe_radius,
            SurfaceLayer::ground_mask(),
        );
        // An ascending body is never grounded, the probe still reaches the
        // floor for a few ticks after take-off
        body.grounded = (probe || body.last_contacts.below) && body.vertical_velocity <= 0.0;
        body.step_offset = if body.grounded {
            self.config.step_offset
        } else {
            0.0
        };

        if body.grounded {
            if body.vertical_velocity < 0.0 {
                body.vertical_velocity = STICK_VELOCITY;
            }
            self.coyote_until = now + self.config.coyote_time;
        }
        trace!("grounding probe={} grounded={}", probe, body.grounded);
    }

    fn arbitrate_jump(
        &mut self,
        body: &mut CapsuleBody,
        input: &FrameInput,
        collab: &mut Collaborators,
        now: f32,
        report: &mut LocomotionReport,
    ) {
        if input.jump {
            self.buffer_until = now + self.config.jump_buffer;
        }

        let in_buffer = now <= self.buffer_until;
        let in_coyote = now <= self.coyote_until;
        let off_cooldown = now >= self.jump_ready_at;
        if !in_buffer || !in_coyote || !off_cooldown || collab.in_transition() {
            return;
        }

        body.vertical_velocity = self.config.jump_velocity();
        body.grounded = false;
        self.buffer_until = f32::NEG_INFINITY;
        self.coyote_until = f32::NEG_INFINITY;
        self.jump_ready_at = now + self.config.jump_cooldown;
        report.jumped = true;

        collab.fire(AnimTrigger::Jump);
        collab.emit(NoiseEvent::Jump);
        debug!("jump at t={:.3} vy={:.2}", now, body.vertical_velocity);
    }

    fn apply_gravity(&self, body: &mut CapsuleBody, dt: f32) {
        let gravity = if body.vertical_velocity > 0.0 {
            self.config.ascend_gravity
        } else {
            self.config.descend_gravity
        };
        body.vertical_velocity =
            (body.vertical_velocity - gravity * dt).max(-self.config.terminal_fall_speed);
    }

    fn update_stamina(
        &mut self,
        body: &CapsuleBody,
        input: &FrameInput,
        direction: Vec3,
        now: f32,
        dt: f32,
    ) {
        let has_input = direction.length_squared() > DIRECTION_EPSILON_SQUARED;
        self.running = input.run && has_input && self.stamina > 0.0 && body.grounded;

        if self.running {
            self.set_stamina(self.stamina - self.config.stamina_drain * dt);
            self.regen_at = now + self.config.regen_delay;
            if self.stamina <= 0.0 {
                self.running = false;
            }
        } else if now >= self.regen_at {
            self.set_stamina(self.stamina + self.config.stamina_regen * dt);
        }
    }

    fn displace(&mut self, body: &mut CapsuleBody, direction: Vec3, collab: &Collaborators, dt: f32) {
        let speed = if self.running {
            self.config.run_speed
        } else {
            self.config.walk_speed
        };
        let velocity = direction * speed + self.pending_impulse + Vec3::Y * body.vertical_velocity;
        self.pending_impulse = Vec3::ZERO;

        let Some(contacts) = collab.move_body(body, velocity * dt) else {
            return;
        };
        if contacts.below && body.vertical_velocity <= 0.0 {
            body.grounded = true;
        }
        if contacts.above && body.vertical_velocity > 0.0 {
            body.vertical_velocity = 0.0;
        }
    }

    fn handle_landing(
        &mut self,
        body: &CapsuleBody,
        collab: &mut Collaborators,
        now: f32,
        report: &mut LocomotionReport,
    ) {
        if body.grounded_last_frame || !body.grounded || report.jumped {
            return;
        }
        self.jump_ready_at = self
            .jump_ready_at
            .max(now + self.config.landing_cooldown);
        report.landed = true;
        collab.emit(NoiseEvent::Land);
        debug!("landed at t={:.3}", now);
    }

    fn update_fall_trigger(
        &mut self,
        body: &CapsuleBody,
        collab: &mut Collaborators,
        report: &LocomotionReport,
    ) {
        if !body.grounded && body.vertical_velocity < FALL_TRIGGER_SPEED && !report.jumped {
            if !self.fall_signalled {
                self.fall_signalled = true;
                self.running = false;
                collab.fire(AnimTrigger::Fall);
                collab.set_bool(AnimBool::Running, false);
            }
        } else if body.grounded {
            self.fall_signalled = false;
        }
    }

    fn try_roll(
        &mut self,
        body: &CapsuleBody,
        direction: Vec3,
        collab: &mut Collaborators,
        now: f32,
    ) -> Option<RollDirection> {
        let can_roll = now >= self.roll_ready_at
            && !collab.is_playing(AnimSegment::Roll)
            && !collab.in_transition()
            && body.grounded
            && self.stamina >= self.config.roll_cost;
        if !can_roll {
            return None;
        }

        self.set_stamina(self.stamina - self.config.roll_cost);
        let roll = RollDirection::classify(body.to_local_planar(direction));
        collab.set_roll_direction(roll);
        collab.fire(AnimTrigger::Roll);
        collab.emit(NoiseEvent::Roll);

        self.roll_ready_at = now + self.config.roll_cooldown;
        self.regen_at = self.regen_at.max(now + self.config.roll_regen_delay);
        debug!("roll {:?}, stamina left {:.1}", roll, self.stamina);
        Some(roll)
    }

    /// Pure strafing keeps the current facing.
    fn rotate(&self, body: &mut CapsuleBody, input: &FrameInput, direction: Vec3, dt: f32) {
        let dz = self.config.input_deadzone;
        let Vec2 { x, y } = input.move_axis;
        let forward = y > dz;
        let diagonal_back = y < -dz && x.abs() > dz;
        if !forward && !diagonal_back {
            return;
        }
        if let Some(target) = facing_rotation(direction) {
            body.rotation = body
                .rotation
                .slerp(target, smoothing_factor(self.config.rotation_speed, dt));
        }
    }

    fn push_blend(&mut self, body: &CapsuleBody, direction: Vec3, collab: &mut Collaborators, dt: f32) {
        let magnitude = direction.length().min(1.0);
        let has_input = direction.length_squared() > DIRECTION_EPSILON_SQUARED;
        let boost = self.config.run_blend_boost;
        let intensity = if self.running { magnitude * boost } else { magnitude };

        let target = if has_input {
            let local = body.to_local_planar(direction.normalize());
            Vec2::new(local.x, local.z) * intensity
        } else {
            Vec2::ZERO
        };
        let k = if self.config.blend_damping > 0.0 {
            1.0 - (-dt / self.config.blend_damping).exp()
        } else {
            1.0
        };
        self.blend = (self.blend + (target - self.blend) * k).clamp(Vec2::splat(-boost), Vec2::splat(boost));

        let facing = if has_input {
            direction.normalize().dot(body.forward())
        } else {
            0.0
        };
        collab.set_float(AnimFloat::MoveX, self.blend.x);
        collab.set_float(AnimFloat::MoveY, self.blend.y);
        collab.set_bool(AnimBool::MoveForward, has_input && facing > FACING_DOT);
        collab.set_bool(AnimBool::MoveBack, has_input && facing < -FACING_DOT);
        collab.set_bool(AnimBool::Running, self.running);
        collab.set_bool(AnimBool::Grounded, body.grounded);
    }
}
