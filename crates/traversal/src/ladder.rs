//! Ladder attach, climb, shimmy and the two detach flavours.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::animation::{AnimBool, AnimFloat, AnimTrigger};
use crate::body::{CapsuleBody, facing_rotation, smoothing_factor};
use crate::context::{Collaborators, Tick};
use crate::error::{Result, TraversalError};
use crate::input::FrameInput;
use crate::locomotion::Locomotion;
use crate::query::{LadderGeometry, SurfaceLayer};

const EXIT_INPUT: f32 = 0.05;
const MIN_LADDER_HEIGHT: f32 = 0.0001;
const MIN_SNAP_SQUARED: f32 = 0.0000001;
const FLOOR_NORMAL_Y: f32 = 0.7;
/// Gap left between the feet and the floor after a teleport
const FLOOR_CLEARANCE: f32 = 0.01;

#[derive(Reflect, Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct LadderConfig {
    pub probe_radius: f32,
    pub attach_distance: f32,
    pub wall_offset: f32,
    pub align_speed: f32,
    pub climb_speed: f32,
    pub input_deadzone: f32,
    pub shimmy_speed: f32,
    pub side_soft_clamp: f32,
    pub dash_up_velocity: f32,
    pub dash_back_impulse: f32,
    pub dash_cooldown: f32,
    pub air_grab_window: f32,
    pub edge_threshold: f32,
    pub micro_nudge: f32,
    pub push_away: f32,
    pub jump_off_lift: f32,
    pub settle_distance: f32,
    /// How far past the top the body is placed on a top exit
    pub top_exit_forward: f32,
    /// Height above the exit point the ground probe starts from
    pub ground_probe_height: f32,
}

impl Default for LadderConfig {
    fn default() -> Self {
        Self {
            probe_radius: 0.35,
            attach_distance: 0.6,
            wall_offset: 0.25,
            align_speed: 25.0,
            climb_speed: 1.8,
            input_deadzone: 0.10,
            shimmy_speed: 1.8,
            side_soft_clamp: 1.2,
            dash_up_velocity: 3.0,
            dash_back_impulse: 0.25,
            dash_cooldown: 0.35,
            air_grab_window: 0.35,
            edge_threshold: 0.15,
            micro_nudge: 0.02,
            push_away: 0.35,
            jump_off_lift: 0.30,
            settle_distance: 0.05,
            top_exit_forward: 0.45,
            ground_probe_height: 1.0,
        }
    }
}

/// Axes of a ladder, derived from its authored geometry.
#[derive(Reflect, Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct LadderAnchor {
    pub bottom: Vec3,
    pub top: Vec3,
    pub up: Vec3,
    /// Points away from the climbable face, towards the climber
    pub normal: Vec3,
    /// Climber's right while facing the ladder
    pub right: Vec3,
    pub height: f32,
}

impl LadderAnchor {
    pub fn from_geometry(geometry: &LadderGeometry) -> Result<Self> {
        let span = geometry.top - geometry.bottom;
        let height = span.length();
        if height < MIN_LADDER_HEIGHT {
            return Err(TraversalError::LadderGeometry(format!(
                "top and bottom coincide at {:?}",
                geometry.bottom
            )));
        }
        let up = span / height;

        let normal = geometry.facing - up * geometry.facing.dot(up);
        if normal.length_squared() < MIN_SNAP_SQUARED {
            return Err(TraversalError::LadderGeometry(format!(
                "facing {:?} is parallel to the ladder axis",
                geometry.facing
            )));
        }
        let normal = normal.normalize();

        Ok(Self {
            bottom: geometry.bottom,
            top: geometry.top,
            up,
            normal,
            right: up.cross(normal).normalize(),
            height,
        })
    }

    /// Distance of `point` along the ladder axis from the bottom anchor.
    pub fn project(&self, point: Vec3) -> f32 {
        (point - self.bottom).dot(self.up)
    }

    pub fn point_at(&self, along: f32, side: f32, wall_offset: f32) -> Vec3 {
        self.bottom + self.up * along + self.right * side + self.normal * wall_offset
    }

    pub fn closest_point(&self, point: Vec3) -> Vec3 {
        self.bottom + self.up * self.project(point).clamp(0.0, self.height)
    }
}

/// Where on the ladder the climber is.
#[derive(Reflect, Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LadderAttach {
    pub ladder: Entity,
    pub anchor: LadderAnchor,
    /// Position along the up axis, in `0..=height`
    pub cur_dot: f32,
    /// Lateral offset, in `-side_soft_clamp..=side_soft_clamp`
    pub cur_side: f32,
    saved_step_offset: f32,
}

#[derive(Reflect, Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LadderClimber {
    pub config: LadderConfig,
    attach: Option<LadderAttach>,
    air_grab_until: f32,
    /// Ladder just jumped off, skipped by the air grab
    left_ladder: Option<Entity>,
    dash_ready_at: f32,
}

impl Default for LadderClimber {
    fn default() -> Self {
        Self::new(LadderConfig::default())
    }
}

impl LadderClimber {
    pub fn new(config: LadderConfig) -> Self {
        Self {
            config,
            attach: None,
            air_grab_until: f32::NEG_INFINITY,
            left_ladder: None,
            dash_ready_at: 0.0,
        }
    }

    pub fn is_attached(&self) -> bool {
        self.attach.is_some()
    }

    pub fn attached(&self) -> Option<&LadderAttach> {
        self.attach.as_ref()
    }

    pub fn air_grab_open(&self, now: f32) -> bool {
        now <= self.air_grab_until
    }

    pub fn is_at_top(&self) -> bool {
        self.attach
            .as_ref()
            .is_some_and(|a| (a.cur_dot - a.anchor.height).abs() < self.config.edge_threshold)
    }

    pub fn is_at_bottom(&self) -> bool {
        self.attach
            .as_ref()
            .is_some_and(|a| a.cur_dot.abs() < self.config.edge_threshold)
    }

    /// Probe in front of the body for a ladder volume and attach to the nearest.
    pub fn try_attach(
        &mut self,
        body: &mut CapsuleBody,
        locomotion: &mut Locomotion,
        collab: &mut Collaborators,
        now: f32,
    ) -> bool {
        self.try_attach_excluding(body, locomotion, collab, now, None)
    }

    /// Retry an attach while the window after a jump-off is open, skipping
    /// the ladder that was just left.
    pub fn try_air_grab(
        &mut self,
        body: &mut CapsuleBody,
        locomotion: &mut Locomotion,
        collab: &mut Collaborators,
        now: f32,
    ) -> bool {
        if self.attach.is_some() || !self.air_grab_open(now) {
            return false;
        }
        let excluded = self.left_ladder;
        self.try_attach_excluding(body, locomotion, collab, now, excluded)
    }

    fn try_attach_excluding(
        &mut self,
        body: &mut CapsuleBody,
        locomotion: &mut Locomotion,
        collab: &mut Collaborators,
        now: f32,
        excluded: Option<Entity>,
    ) -> bool {
        if self.attach.is_some() {
            return false;
        }

        let origin = body.center() + body.forward() * self.config.attach_distance;
        let feet = body.position;
        let nearest = collab
            .query
            .overlap_sphere(origin, self.config.probe_radius, SurfaceLayer::ladder_mask())
            .into_iter()
            .filter(|entity| Some(*entity) != excluded)
            .filter_map(|entity| {
                let geometry = collab.ladders.resolve(entity)?;
                let anchor = match LadderAnchor::from_geometry(&geometry) {
                    Ok(anchor) => anchor,
                    Err(err) => {
                        debug!("ignoring ladder {:?}: {}", entity, err);
                        return None;
                    }
                };
                Some((entity, anchor))
            })
            .min_by(|(_, a), (_, b)| {
                let da = a.closest_point(feet).distance_squared(feet);
                let db = b.closest_point(feet).distance_squared(feet);
                da.total_cmp(&db)
            });

        let Some((ladder, anchor)) = nearest else {
            return false;
        };
        self.attach_to(ladder, anchor, body, locomotion, collab, now);
        true
    }

    fn attach_to(
        &mut self,
        ladder: Entity,
        anchor: LadderAnchor,
        body: &mut CapsuleBody,
        locomotion: &mut Locomotion,
        collab: &mut Collaborators,
        now: f32,
    ) {
        let cur_dot = anchor.project(body.position).clamp(0.0, anchor.height);
        let saved_step_offset = body.step_offset;
        body.step_offset = 0.0;
        body.vertical_velocity = 0.0;
        body.grounded = false;

        let snap = anchor.point_at(cur_dot, 0.0, self.config.wall_offset);
        let delta = snap - body.position;
        if delta.length_squared() > MIN_SNAP_SQUARED {
            collab.move_body(body, delta);
        }

        locomotion.suspend(true, now, collab);
        collab.set_bool(AnimBool::OnLadder, true);
        collab.set_float(AnimFloat::WallX, 0.0);
        collab.set_float(AnimFloat::WallY, 0.0);
        collab.fire(AnimTrigger::LadderEnter);

        self.attach = Some(LadderAttach {
            ladder,
            anchor,
            cur_dot,
            cur_side: 0.0,
            saved_step_offset,
        });
        self.air_grab_until = f32::NEG_INFINITY;
        self.left_ladder = None;
        debug!(
            "attached to ladder {:?} at {:.2}/{:.2}",
            ladder, cur_dot, anchor.height
        );
    }

    pub fn tick(
        &mut self,
        body: &mut CapsuleBody,
        locomotion: &mut Locomotion,
        input: &FrameInput,
        tick: Tick,
        collab: &mut Collaborators,
    ) {
        let Tick { now, dt } = tick;

        if self.attach.is_none() {
            return;
        }

        let dz = self.config.input_deadzone;
        let y = if input.move_axis.y.abs() < dz { 0.0 } else { input.move_axis.y };
        let x = if input.move_axis.x.abs() < dz { 0.0 } else { input.move_axis.x };
        collab.set_float(AnimFloat::WallY, y);
        collab.set_float(AnimFloat::WallX, x);

        let Some(attach) = self.attach.as_mut() else {
            return;
        };
        if let Some(target) = facing_rotation(-attach.anchor.normal) {
            body.rotation = body
                .rotation
                .slerp(target, smoothing_factor(self.config.align_speed, dt));
        }

        attach.cur_dot = (attach.cur_dot + y * self.config.climb_speed * dt)
            .clamp(0.0, attach.anchor.height);
        let side = self.config.side_soft_clamp;
        attach.cur_side = (attach.cur_side + x * self.config.shimmy_speed * dt).clamp(-side, side);
        let target = attach
            .anchor
            .point_at(attach.cur_dot, attach.cur_side, self.config.wall_offset);

        if self.is_at_top() && y > EXIT_INPUT {
            collab.fire(AnimTrigger::LadderTopExit);
            self.exit_to_top(body, locomotion, collab, now);
            return;
        }
        if self.is_at_bottom() && y < -EXIT_INPUT {
            collab.fire(AnimTrigger::LadderBottomExit);
            self.jump_off(false, body, locomotion, collab, now);
            return;
        }

        let delta = target - body.position;
        if delta.length_squared() > MIN_SNAP_SQUARED {
            collab.move_body(body, delta);
        }
    }

    /// Step off the top: land on ground found ahead, or nudge clear and settle.
    pub fn exit_to_top(
        &mut self,
        body: &mut CapsuleBody,
        locomotion: &mut Locomotion,
        collab: &mut Collaborators,
        now: f32,
    ) -> bool {
        let Some(attach) = self.attach.as_ref() else {
            return false;
        };
        let normal = attach.anchor.normal;

        let exit = body.position - normal * self.config.top_exit_forward;
        let probe_height = self.config.ground_probe_height;
        let ground = collab
            .query
            .ray_cast(
                exit + Vec3::Y * probe_height,
                Vec3::NEG_Y,
                probe_height * 2.0,
                SurfaceLayer::ground_mask(),
            )
            .filter(|hit| hit.normal.y > FLOOR_NORMAL_Y && hit.distance > 0.0);

        match ground {
            Some(hit) => {
                body.teleport(hit.point + Vec3::Y * FLOOR_CLEARANCE);
                body.grounded = true;
                body.grounded_last_frame = true;
                self.detach_common(body, locomotion, collab, now, false);
                debug!("ladder top exit onto ground at {:?}", body.position);
            }
            None => {
                collab.move_body(body, normal * self.config.micro_nudge);
                self.detach_common(body, locomotion, collab, now, true);
                debug!("ladder top exit without ground ahead");
            }
        }
        self.air_grab_until = f32::NEG_INFINITY;
        self.left_ladder = None;
        true
    }

    /// Leave the ladder backwards into a fall, optionally with an upward push.
    pub fn jump_off(
        &mut self,
        apply_up: bool,
        body: &mut CapsuleBody,
        locomotion: &mut Locomotion,
        collab: &mut Collaborators,
        now: f32,
    ) -> bool {
        let Some(attach) = self.attach.as_ref() else {
            return false;
        };
        let normal = attach.anchor.normal;
        self.left_ladder = Some(attach.ladder);

        self.detach_common(body, locomotion, collab, now, true);
        collab.move_body(body, normal * self.config.push_away);
        if apply_up {
            collab.move_body(body, Vec3::Y * self.config.jump_off_lift);
        }

        collab.fire(AnimTrigger::LadderJumpOut);
        collab.fire(AnimTrigger::Fall);
        debug!("jumped off ladder (up push: {})", apply_up);
        true
    }

    /// Jump input while attached: top exit when at the top, otherwise a
    /// jump-off that leaves a window to grab another ladder.
    pub fn jump(
        &mut self,
        body: &mut CapsuleBody,
        locomotion: &mut Locomotion,
        collab: &mut Collaborators,
        now: f32,
    ) -> bool {
        if self.attach.is_none() {
            return false;
        }
        if self.is_at_top() {
            return self.exit_to_top(body, locomotion, collab, now);
        }
        let left = self.jump_off(true, body, locomotion, collab, now);
        self.air_grab_until = now + self.config.air_grab_window;
        left
    }

    /// Upward burst plus a push away from the wall, queued on locomotion.
    pub fn dash(
        &mut self,
        body: &mut CapsuleBody,
        locomotion: &mut Locomotion,
        collab: &mut Collaborators,
        now: f32,
    ) -> bool {
        let Some(attach) = self.attach.as_ref() else {
            return false;
        };
        if now < self.dash_ready_at {
            return false;
        }
        collab.fire(AnimTrigger::WallDash);
        locomotion.add_vertical_velocity(body, self.config.dash_up_velocity);
        locomotion.apply_planar_impulse(attach.anchor.normal * self.config.dash_back_impulse);
        self.dash_ready_at = now + self.config.dash_cooldown;
        true
    }

    fn detach_common(
        &mut self,
        body: &mut CapsuleBody,
        locomotion: &mut Locomotion,
        collab: &mut Collaborators,
        now: f32,
        settle: bool,
    ) {
        let Some(attach) = self.attach.take() else {
            return;
        };
        if settle {
            collab.move_body(body, Vec3::NEG_Y * self.config.settle_distance);
        }
        body.step_offset = attach.saved_step_offset;

        locomotion.suspend(false, now, collab);
        collab.set_bool(AnimBool::OnLadder, false);
        collab.set_float(AnimFloat::WallX, 0.0);
        collab.set_float(AnimFloat::WallY, 0.0);
        collab.reset_trigger(AnimTrigger::LadderEnter);
        debug!("detached from ladder {:?}", attach.ladder);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry(bottom: Vec3, top: Vec3, facing: Vec3) -> LadderGeometry {
        LadderGeometry {
            bottom,
            top,
            facing,
        }
    }

    #[test]
    fn test_anchor_axes() {
        let anchor =
            LadderAnchor::from_geometry(&geometry(Vec3::ZERO, Vec3::Y * 3.0, Vec3::Z)).unwrap();

        assert_eq!(anchor.height, 3.0);
        assert!((anchor.up - Vec3::Y).length() < 1e-5);
        assert!((anchor.normal - Vec3::Z).length() < 1e-5);
        // Facing the ladder means looking down -Z, so right is +X
        assert!((anchor.right - Vec3::X).length() < 1e-5);
    }

    #[test]
    fn test_anchor_facing_is_made_orthogonal() {
        let anchor = LadderAnchor::from_geometry(&geometry(
            Vec3::ZERO,
            Vec3::Y * 2.0,
            Vec3::new(0.0, 0.5, 1.0),
        ))
        .unwrap();
        assert!(anchor.normal.dot(anchor.up).abs() < 1e-5);
        assert!((anchor.normal.length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_anchor_rejects_degenerate_geometry() {
        assert!(matches!(
            LadderAnchor::from_geometry(&geometry(Vec3::ONE, Vec3::ONE, Vec3::Z)),
            Err(TraversalError::LadderGeometry(_))
        ));
        assert!(LadderAnchor::from_geometry(&geometry(Vec3::ZERO, Vec3::Y, Vec3::Y)).is_err());
    }

    #[test]
    fn test_anchor_projection_and_points() {
        let anchor = LadderAnchor::from_geometry(&geometry(
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 4.0, 0.0),
            Vec3::Z,
        ))
        .unwrap();

        assert_eq!(anchor.project(Vec3::new(5.0, 2.5, 9.0)), 2.5);
        assert_eq!(anchor.closest_point(Vec3::new(0.0, 9.0, 0.0)), Vec3::new(1.0, 4.0, 0.0));
        let p = anchor.point_at(1.0, 0.5, 0.25);
        assert!((p - Vec3::new(1.5, 1.0, 0.25)).length() < 1e-5);
    }

    #[test]
    fn test_edge_predicates_without_attachment() {
        let climber = LadderClimber::default();
        assert!(!climber.is_attached());
        assert!(!climber.is_at_top());
        assert!(!climber.is_at_bottom());
    }
}
