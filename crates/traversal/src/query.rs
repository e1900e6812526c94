//! Spatial probes against scene geometry, filtered by surface category.
//!
//! The state machines never talk to the physics engine directly; they go
//! through [`SpatialQueryService`]. [`PipelineProbe`] adapts avian's
//! [`SpatialQueryPipeline`] to it, tests use an in-memory scene.

use std::collections::HashMap;

use avian3d::prelude::*;
use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// Collision categories the traversal code filters on.
#[derive(PhysicsLayer, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SurfaceLayer {
    #[default]
    Default,
    /// Walkable floors, stairs, ledge tops
    Ground,
    /// Walls whose top edge can be grabbed and mantled
    Climbable,
    /// Ladder trigger volumes, never solid for the mover
    Ladder,
    /// Character capsules
    Character,
}

impl SurfaceLayer {
    pub fn ground_mask() -> LayerMask {
        LayerMask::from(SurfaceLayer::Ground)
    }

    pub fn climbable_mask() -> LayerMask {
        LayerMask::from(SurfaceLayer::Climbable)
    }

    pub fn ladder_mask() -> LayerMask {
        LayerMask::from(SurfaceLayer::Ladder)
    }

    /// Everything the capsule collides with while moving.
    pub fn solid_mask() -> LayerMask {
        LayerMask::from([
            SurfaceLayer::Default,
            SurfaceLayer::Ground,
            SurfaceLayer::Climbable,
        ])
    }
}

/// Result of a ray or sphere probe, in world space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProbeHit {
    pub entity: Entity,
    /// Contact point on the hit surface
    pub point: Vec3,
    /// Surface normal at `point`, pointing away from the hit surface
    pub normal: Vec3,
    /// Distance travelled by the probe origin before contact
    pub distance: f32,
}

/// Pure, stateless geometry queries.
pub trait SpatialQueryService {
    fn ray_cast(&self, origin: Vec3, direction: Vec3, max_distance: f32, mask: LayerMask)
    -> Option<ProbeHit>;

    fn sphere_cast(
        &self,
        origin: Vec3,
        radius: f32,
        direction: Vec3,
        max_distance: f32,
        mask: LayerMask,
    ) -> Option<ProbeHit>;

    /// Sweep an upright capsule whose *bottom* sits at `foot`. The hit's
    /// `point` is the capsule bottom at time of impact.
    fn capsule_cast(
        &self,
        foot: Vec3,
        radius: f32,
        height: f32,
        direction: Vec3,
        max_distance: f32,
        mask: LayerMask,
    ) -> Option<ProbeHit>;

    fn overlap_sphere(&self, center: Vec3, radius: f32, mask: LayerMask) -> Vec<Entity>;

    fn check_sphere(&self, center: Vec3, radius: f32, mask: LayerMask) -> bool {
        !self.overlap_sphere(center, radius, mask).is_empty()
    }
}

/// Ladder geometry as authored in the level: two anchor points and the
/// direction the climbable face points to (towards the climber).
#[derive(Clone, Copy, Debug, PartialEq, Reflect, Serialize, Deserialize)]
pub struct LadderGeometry {
    pub bottom: Vec3,
    pub top: Vec3,
    pub facing: Vec3,
}

/// Resolves an overlapped ladder volume to its geometry.
pub trait LadderDirectory {
    fn resolve(&self, volume: Entity) -> Option<LadderGeometry>;
}

impl LadderDirectory for HashMap<Entity, LadderGeometry> {
    fn resolve(&self, volume: Entity) -> Option<LadderGeometry> {
        self.get(&volume).copied()
    }
}

/// [`SpatialQueryService`] over avian's query pipeline.
pub struct PipelineProbe<'a> {
    pipeline: &'a SpatialQueryPipeline,
    excluded: Option<Entity>,
}

impl<'a> PipelineProbe<'a> {
    pub fn new(pipeline: &'a SpatialQueryPipeline) -> Self {
        Self {
            pipeline,
            excluded: None,
        }
    }

    /// Ignore the character's own collider.
    pub fn excluding(mut self, entity: Entity) -> Self {
        self.excluded = Some(entity);
        self
    }

    fn filter(&self, mask: LayerMask) -> SpatialQueryFilter {
        let filter = SpatialQueryFilter::from_mask(mask);
        match self.excluded {
            Some(entity) => filter.with_excluded_entities([entity]),
            None => filter,
        }
    }

    fn shape_cast(
        &self,
        shape: &Collider,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        mask: LayerMask,
    ) -> Option<ShapeHitData> {
        let direction = Dir3::new(direction).ok()?;
        self.pipeline.cast_shape(
            shape,
            origin,
            Quat::IDENTITY,
            direction,
            &ShapeCastConfig::from_max_distance(max_distance),
            &self.filter(mask),
        )
    }
}

impl SpatialQueryService for PipelineProbe<'_> {
    fn ray_cast(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        mask: LayerMask,
    ) -> Option<ProbeHit> {
        let dir = Dir3::new(direction).ok()?;
        let hit = self
            .pipeline
            .cast_ray(origin, dir, max_distance, true, &self.filter(mask))?;
        Some(ProbeHit {
            entity: hit.entity,
            point: origin + dir.as_vec3() * hit.distance,
            normal: hit.normal,
            distance: hit.distance,
        })
    }

    fn sphere_cast(
        &self,
        origin: Vec3,
        radius: f32,
        direction: Vec3,
        max_distance: f32,
        mask: LayerMask,
    ) -> Option<ProbeHit> {
        let hit = self.shape_cast(
            &Collider::sphere(radius),
            origin,
            direction,
            max_distance,
            mask,
        )?;
        let center = origin + direction.normalize_or_zero() * hit.distance;
        Some(ProbeHit {
            entity: hit.entity,
            point: center - hit.normal1 * radius,
            normal: hit.normal1,
            distance: hit.distance,
        })
    }

    fn capsule_cast(
        &self,
        foot: Vec3,
        radius: f32,
        height: f32,
        direction: Vec3,
        max_distance: f32,
        mask: LayerMask,
    ) -> Option<ProbeHit> {
        let segment = (height - 2.0 * radius).max(0.0);
        let center = foot + Vec3::Y * (height * 0.5);
        let hit = self.shape_cast(
            &Collider::capsule(radius, segment),
            center,
            direction,
            max_distance,
            mask,
        )?;
        Some(ProbeHit {
            entity: hit.entity,
            point: foot + direction.normalize_or_zero() * hit.distance,
            normal: hit.normal1,
            distance: hit.distance,
        })
    }

    fn overlap_sphere(&self, center: Vec3, radius: f32, mask: LayerMask) -> Vec<Entity> {
        self.pipeline.shape_intersections(
            &Collider::sphere(radius),
            center,
            Quat::IDENTITY,
            &self.filter(mask),
        )
    }
}
