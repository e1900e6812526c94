//! Capsule displacement resolution.

use avian3d::prelude::LayerMask;
use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::body::CapsuleBody;
use crate::query::{SpatialQueryService, SurfaceLayer};

const SKIN: f32 = 0.01;
const MAX_SLIDES: usize = 4;
const MIN_MOVE: f32 = 1e-5;
/// Hits whose normal is steeper than this count as floor/ceiling
const FLOOR_NORMAL_Y: f32 = 0.7;

/// Which sides of the capsule touched geometry during a move.
#[derive(Reflect, Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Contacts {
    pub below: bool,
    pub sides: bool,
    pub above: bool,
}

impl Contacts {
    fn record(&mut self, normal: Vec3) {
        if normal.y > FLOOR_NORMAL_Y {
            self.below = true;
        } else if normal.y < -FLOOR_NORMAL_Y {
            self.above = true;
        } else {
            self.sides = true;
        }
    }
}

/// Resolves a requested displacement into an actual one.
pub trait CapsuleMover {
    /// Move `body` by as much of `delta` as the scene allows. A body with
    /// collision disabled does not move and reports no contacts.
    fn move_body(&self, body: &mut CapsuleBody, delta: Vec3) -> Contacts;
}

/// Move-and-slide over capsule casts, with step-up while grounded.
pub struct KinematicMover<'a> {
    query: &'a dyn SpatialQueryService,
    mask: LayerMask,
}

impl<'a> KinematicMover<'a> {
    pub fn new(query: &'a dyn SpatialQueryService) -> Self {
        Self {
            query,
            mask: SurfaceLayer::solid_mask(),
        }
    }

    pub fn with_mask(mut self, mask: LayerMask) -> Self {
        self.mask = mask;
        self
    }

    fn cast(&self, body: &CapsuleBody, foot: Vec3, dir: Vec3, distance: f32) -> Option<(f32, Vec3)> {
        self.query
            .capsule_cast(foot, body.radius, body.height, dir, distance + SKIN, self.mask)
            .map(|hit| (hit.distance, hit.normal))
    }

    fn slide(&self, body: &mut CapsuleBody, mut motion: Vec3, contacts: &mut Contacts, allow_step: bool) {
        for _ in 0..MAX_SLIDES {
            let distance = motion.length();
            if distance < MIN_MOVE {
                break;
            }
            let dir = motion / distance;

            let Some((hit_distance, normal)) = self.cast(body, body.position, dir, distance) else {
                body.position += motion;
                break;
            };

            let travel = (hit_distance - SKIN).clamp(0.0, distance);
            body.position += dir * travel;
            contacts.record(normal);

            let remaining = dir * (distance - travel);
            let blocked_by_wall = normal.y.abs() <= FLOOR_NORMAL_Y;
            if allow_step && blocked_by_wall && self.try_step(body, remaining) {
                contacts.below = true;
                break;
            }

            motion = remaining - normal * remaining.dot(normal);
        }
    }

    /// Lift by the step offset, move across, settle back down onto a floor.
    /// Leaves the body untouched when any leg fails.
    fn try_step(&self, body: &mut CapsuleBody, remaining: Vec3) -> bool {
        let planar = Vec3::new(remaining.x, 0.0, remaining.z);
        let across = planar.length();
        if across < MIN_MOVE || body.step_offset <= 0.0 {
            return false;
        }
        let dir = planar / across;
        let start = body.position;

        let lift = match self.cast(body, start, Vec3::Y, body.step_offset) {
            Some((hit_distance, _)) => (hit_distance - SKIN).max(0.0),
            None => body.step_offset,
        };
        if lift < MIN_MOVE {
            return false;
        }
        let raised = start + Vec3::Y * lift;

        if self.cast(body, raised, dir, across).is_some() {
            return false;
        }
        let advanced = raised + planar;

        match self.cast(body, advanced, Vec3::NEG_Y, lift) {
            Some((hit_distance, normal)) if normal.y > FLOOR_NORMAL_Y => {
                body.position = advanced - Vec3::Y * (hit_distance - SKIN).max(0.0);
                trace!("step-up of {:.3} at {:?}", lift, body.position);
                true
            }
            _ => false,
        }
    }
}

impl CapsuleMover for KinematicMover<'_> {
    fn move_body(&self, body: &mut CapsuleBody, delta: Vec3) -> Contacts {
        if !body.collision_enabled {
            return Contacts::default();
        }

        let mut contacts = Contacts::default();
        let allow_step = body.grounded && body.step_offset > 0.0;

        self.slide(body, Vec3::new(delta.x, 0.0, delta.z), &mut contacts, allow_step);
        self.slide(body, Vec3::Y * delta.y, &mut contacts, false);

        body.last_contacts = contacts;
        contacts
    }
}
