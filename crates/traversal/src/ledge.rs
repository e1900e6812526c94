//! Ledge detection and the hang / mantle / drop machine.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::animation::{AnimBool, AnimFloat, AnimTrigger};
use crate::body::{CapsuleBody, facing_rotation};
use crate::context::Collaborators;
use crate::input::FrameInput;
use crate::locomotion::Locomotion;
use crate::query::{SpatialQueryService, SurfaceLayer};

const DIRECTION_EPSILON_SQUARED: f32 = 0.0001;
const SHIMMY_INPUT: f32 = 0.01;
const FLOOR_CLEARANCE: f32 = 0.01;

#[derive(Reflect, Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct LedgeConfig {
    pub wall_check_distance: f32,
    pub chest_height: f32,
    /// Lowest ledge top above the wall hit
    pub ledge_min_height: f32,
    /// Highest ledge top above the wall hit
    pub ledge_max_height: f32,
    pub hang_forward_offset: f32,
    pub hang_down_offset: f32,
    pub stand_forward_offset: f32,
    /// Wall probe radius as a fraction of the capsule radius
    pub probe_radius_scale: f32,
    /// How far into the wall top the downward probe starts
    pub top_probe_inset: f32,
    pub shimmy_speed: f32,
    /// Allowed ledge height change between two shimmy steps
    pub shimmy_height_tolerance: f32,
}

impl Default for LedgeConfig {
    fn default() -> Self {
        Self {
            wall_check_distance: 0.8,
            chest_height: 1.2,
            ledge_min_height: 0.4,
            ledge_max_height: 1.6,
            hang_forward_offset: 0.42,
            hang_down_offset: 0.6,
            stand_forward_offset: 0.3,
            probe_radius_scale: 0.5,
            top_probe_inset: 0.2,
            shimmy_speed: 1.8,
            shimmy_height_tolerance: 0.25,
        }
    }
}

#[derive(Reflect, Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct LedgeInfo {
    pub wall_point: Vec3,
    /// Planar wall normal, pointing out of the wall
    pub normal: Vec3,
    pub top_point: Vec3,
    pub hang_point: Vec3,
    pub stand_point: Vec3,
}

impl LedgeInfo {
    fn from_hits(config: &LedgeConfig, radius: f32, wall_point: Vec3, normal: Vec3, top_point: Vec3) -> Self {
        let hang_point = Vec3::new(wall_point.x, top_point.y - config.hang_down_offset, wall_point.z)
            + normal * (radius + config.hang_forward_offset);
        let stand_point = top_point - normal * config.stand_forward_offset;
        Self {
            wall_point,
            normal,
            top_point,
            hang_point,
            stand_point,
        }
    }

    /// Wall tangent pointing to the climber's right while facing the wall.
    pub fn right(&self) -> Vec3 {
        Vec3::Y.cross(self.normal).normalize_or_zero()
    }
}

fn planar(v: Vec3) -> Option<Vec3> {
    let p = Vec3::new(v.x, 0.0, v.z);
    (p.length_squared() > DIRECTION_EPSILON_SQUARED).then(|| p.normalize())
}

/// Look for a grabbable ledge ahead of a body standing at `position`.
///
/// `hint` is the preferred probe direction; the body's forward is used when
/// it is zero.
pub fn find_ledge(
    query: &dyn SpatialQueryService,
    config: &LedgeConfig,
    body: &CapsuleBody,
    hint: Vec3,
) -> Option<LedgeInfo> {
    let dir = planar(hint).unwrap_or_else(|| body.forward());
    let origin = body.position + Vec3::Y * config.chest_height;

    let wall = query.sphere_cast(
        origin,
        body.radius * config.probe_radius_scale,
        dir,
        config.wall_check_distance,
        SurfaceLayer::climbable_mask(),
    )?;
    let normal = planar(wall.normal).unwrap_or(-dir);

    let over = wall.point + Vec3::Y * config.ledge_max_height - normal * config.top_probe_inset;
    let top = query
        .ray_cast(
            over,
            Vec3::NEG_Y,
            config.ledge_max_height - config.ledge_min_height,
            SurfaceLayer::climbable_mask(),
        )
        // Starting inside the wall means it is taller than the band
        .filter(|hit| hit.distance > 0.0)?;
    trace!("ledge top at {:?} above wall hit {:?}", top.point, wall.point);

    Some(LedgeInfo::from_hits(config, body.radius, wall.point, normal, top.point))
}

#[derive(Reflect, Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ClimbPhase {
    #[default]
    None,
    Hanging,
    ClimbingUp,
    Dropping,
}

#[derive(Reflect, Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct LedgeClimber {
    pub config: LedgeConfig,
    phase: ClimbPhase,
    ledge: Option<LedgeInfo>,
}

impl LedgeClimber {
    pub fn new(config: LedgeConfig) -> Self {
        Self {
            config,
            phase: ClimbPhase::None,
            ledge: None,
        }
    }

    pub fn phase(&self) -> ClimbPhase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        self.phase != ClimbPhase::None
    }

    pub fn ledge(&self) -> Option<&LedgeInfo> {
        self.ledge.as_ref()
    }

    pub fn try_start(
        &mut self,
        body: &mut CapsuleBody,
        locomotion: &mut Locomotion,
        hint: Vec3,
        collab: &mut Collaborators,
        now: f32,
    ) -> bool {
        if self.phase != ClimbPhase::None {
            return false;
        }
        let Some(info) = find_ledge(collab.query, &self.config, body, hint) else {
            return false;
        };
        self.enter_hang(info, body, locomotion, collab, now);
        true
    }

    fn enter_hang(
        &mut self,
        info: LedgeInfo,
        body: &mut CapsuleBody,
        locomotion: &mut Locomotion,
        collab: &mut Collaborators,
        now: f32,
    ) {
        self.phase = ClimbPhase::Hanging;
        self.ledge = Some(info);

        body.collision_enabled = false;
        body.teleport(info.hang_point);
        if let Some(rotation) = facing_rotation(-info.normal) {
            body.rotation = rotation;
        }
        body.vertical_velocity = 0.0;
        body.grounded = false;

        locomotion.suspend(true, now, collab);
        collab.set_bool(AnimBool::Climbing, true);
        collab.set_float(AnimFloat::ClimbX, 0.0);
        debug!("hanging from ledge at {:?}", info.top_point);
    }

    pub fn request_mantle(&mut self, collab: &mut Collaborators) -> bool {
        if self.phase != ClimbPhase::Hanging {
            return false;
        }
        self.phase = ClimbPhase::ClimbingUp;
        collab.reset_trigger(AnimTrigger::Drop);
        collab.fire(AnimTrigger::Mantle);
        true
    }

    pub fn request_drop(&mut self, collab: &mut Collaborators) -> bool {
        if self.phase != ClimbPhase::Hanging {
            return false;
        }
        self.phase = ClimbPhase::Dropping;
        collab.reset_trigger(AnimTrigger::Mantle);
        collab.fire(AnimTrigger::Drop);
        true
    }

    /// Mantle clip finished: stand on top of the ledge.
    pub fn finish_mantle(
        &mut self,
        body: &mut CapsuleBody,
        locomotion: &mut Locomotion,
        collab: &mut Collaborators,
        now: f32,
    ) -> bool {
        if self.phase != ClimbPhase::ClimbingUp {
            return false;
        }
        if let Some(ledge) = self.ledge.take() {
            body.teleport(ledge.stand_point + Vec3::Y * FLOOR_CLEARANCE);
            body.grounded = true;
            body.grounded_last_frame = true;
        }
        self.release(body, locomotion, collab, now);
        debug!("mantle finished at {:?}", body.position);
        true
    }

    /// Drop clip finished: fall from where the body is.
    pub fn finish_drop(
        &mut self,
        body: &mut CapsuleBody,
        locomotion: &mut Locomotion,
        collab: &mut Collaborators,
        now: f32,
    ) -> bool {
        if self.phase != ClimbPhase::Dropping {
            return false;
        }
        self.ledge = None;
        self.release(body, locomotion, collab, now);
        debug!("drop finished");
        true
    }

    fn release(
        &mut self,
        body: &mut CapsuleBody,
        locomotion: &mut Locomotion,
        collab: &mut Collaborators,
        now: f32,
    ) {
        self.phase = ClimbPhase::None;
        body.collision_enabled = true;
        collab.set_bool(AnimBool::Climbing, false);
        collab.set_float(AnimFloat::ClimbX, 0.0);
        locomotion.suspend(false, now, collab);
    }

    /// Shimmy along the wall while hanging.
    pub fn tick(&mut self, body: &mut CapsuleBody, input: &FrameInput, dt: f32, collab: &mut Collaborators) {
        if self.phase != ClimbPhase::Hanging {
            return;
        }
        let Some(ledge) = self.ledge else {
            return;
        };

        let x = input.move_axis.x;
        collab.set_float(AnimFloat::ClimbX, x);
        if x.abs() <= SHIMMY_INPUT {
            // Hold the hang height against drift
            let mut held = body.position;
            held.y = ledge.hang_point.y;
            body.teleport(held);
            return;
        }

        let step = ledge.right() * (x * self.config.shimmy_speed * dt);
        match self.ledge_at(collab.query, body.radius, &ledge, ledge.hang_point + step) {
            Some(next) => {
                body.teleport(next.hang_point);
                self.ledge = Some(next);
            }
            None => trace!("shimmy refused, no ledge at {:?}", ledge.hang_point + step),
        }
    }

    /// Re-probe the ledge top for a body hanging at `hang_point`.
    fn ledge_at(
        &self,
        query: &dyn SpatialQueryService,
        radius: f32,
        current: &LedgeInfo,
        hang_point: Vec3,
    ) -> Option<LedgeInfo> {
        let c = &self.config;
        let wall_point = Vec3::new(hang_point.x, current.wall_point.y, hang_point.z)
            - current.normal * (radius + c.hang_forward_offset);
        let probe_top = current.top_point.y + c.shimmy_height_tolerance;
        let over = Vec3::new(wall_point.x, probe_top, wall_point.z) - current.normal * c.top_probe_inset;

        let top = query
            .ray_cast(
                over,
                Vec3::NEG_Y,
                c.shimmy_height_tolerance * 2.0,
                SurfaceLayer::climbable_mask(),
            )
            .filter(|hit| hit.distance > 0.0)?;
        Some(LedgeInfo::from_hits(c, radius, wall_point, current.normal, top.point))
    }
}
