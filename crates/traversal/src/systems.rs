//! ECS glue: components the level and the character carry, and the systems
//! that drive [`TraversalController`] from the fixed schedule.

use std::collections::HashMap;

use avian3d::prelude::*;
use bevy::prelude::*;
use leafwing_input_manager::prelude::ActionState;
use serde::{Deserialize, Serialize};

use crate::animation::{AnimationNotify, AnimationRig};
use crate::body::CapsuleBody;
use crate::config::TraversalConfig;
use crate::context::{Collaborators, Tick};
use crate::controller::TraversalController;
use crate::input::{CameraYaw, InputLatch, TraversalAction};
use crate::mover::KinematicMover;
use crate::noise::{NoiseEvent, NoiseMessage, NoisePing};
use crate::query::{LadderGeometry, PipelineProbe, SurfaceLayer};

// ============================================================================
// COMPONENTS
// ============================================================================

/// Ladder trigger volume. Its forward axis is the climbable face; the
/// bottom and top anchors are child entities tagged with [`LadderAnchorRole`].
#[derive(Component, Reflect, Clone, Copy, Debug, Default)]
pub struct LadderVolume;

#[derive(Component, Reflect, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LadderAnchorRole {
    Bottom,
    Top,
}

/// Everything a controllable character needs, placed with its feet at `feet`.
pub fn character_bundle(config: &TraversalConfig, feet: Vec3) -> impl Bundle {
    let mut body = CapsuleBody {
        position: feet,
        step_offset: config.locomotion.step_offset,
        grounded: true,
        ..default()
    };
    body.grounded_last_frame = true;
    let center = body.center();
    let segment = (body.height - 2.0 * body.radius).max(0.0);

    (
        Name::new("Character"),
        TraversalController::from_config(config),
        Collider::capsule(body.radius, segment),
        CollisionLayers::new(SurfaceLayer::Character, LayerMask::NONE),
        body,
        AnimationRig::default(),
        InputLatch::default(),
        CameraYaw::default(),
        Transform::from_translation(center),
    )
}

/// Ladder geometry for every volume with both anchors.
pub fn collect_ladders(
    volumes: &Query<(Entity, &GlobalTransform, &Children), With<LadderVolume>>,
    anchors: &Query<(&LadderAnchorRole, &GlobalTransform)>,
) -> HashMap<Entity, LadderGeometry> {
    let mut ladders = HashMap::new();
    for (entity, transform, children) in volumes.iter() {
        let mut bottom = None;
        let mut top = None;
        for child in children.iter() {
            match anchors.get(child) {
                Ok((LadderAnchorRole::Bottom, anchor)) => bottom = Some(anchor.translation()),
                Ok((LadderAnchorRole::Top, anchor)) => top = Some(anchor.translation()),
                Err(_) => {}
            }
        }
        match (bottom, top) {
            (Some(bottom), Some(top)) => {
                ladders.insert(
                    entity,
                    LadderGeometry {
                        bottom,
                        top,
                        facing: transform.forward().as_vec3(),
                    },
                );
            }
            _ => trace!("ladder {:?} is missing an anchor", entity),
        }
    }
    ladders
}

fn publish_noise(
    source: Entity,
    position: Vec3,
    events: Vec<NoiseEvent>,
    config: &TraversalConfig,
    writer: &mut MessageWriter<NoiseMessage>,
) {
    for event in events {
        writer.write(NoiseMessage {
            source,
            ping: NoisePing::from_event(event, position, &config.noise),
        });
    }
}

// ============================================================================
// SYSTEMS
// ============================================================================

/// Latch the current action state for the next fixed tick.
pub fn latch_input(mut players: Query<(&ActionState<TraversalAction>, &mut InputLatch)>) {
    for (actions, mut latch) in players.iter_mut() {
        latch.capture(actions);
    }
}

type CharacterQuery<'w, 's> = Query<
    'w,
    's,
    (
        Entity,
        &'static mut TraversalController,
        &'static mut CapsuleBody,
        &'static mut InputLatch,
        Option<&'static CameraYaw>,
        Option<&'static mut AnimationRig>,
    ),
>;

pub fn tick_traversal(
    time: Res<Time>,
    config: Res<TraversalConfig>,
    spatial: Res<SpatialQueryPipeline>,
    volumes: Query<(Entity, &GlobalTransform, &Children), With<LadderVolume>>,
    anchors: Query<(&LadderAnchorRole, &GlobalTransform)>,
    mut characters: CharacterQuery,
    mut noise_writer: MessageWriter<NoiseMessage>,
) {
    let tick = Tick::new(time.elapsed_secs(), time.delta_secs());
    let ladders = collect_ladders(&volumes, &anchors);

    for (entity, mut controller, mut body, mut latch, yaw, mut rig) in characters.iter_mut() {
        let input = latch.take(yaw.map_or(0.0, |y| y.0));
        let probe = PipelineProbe::new(&spatial).excluding(entity);
        let mover = KinematicMover::new(&probe);
        let mut noises = Vec::new();

        let mut collab = Collaborators::new(&probe, &ladders)
            .with_mover(&mover)
            .with_noise(&mut noises);
        if let Some(rig) = rig.as_deref_mut() {
            collab = collab.with_anim(rig);
        }
        controller.tick(&mut body, &input, tick, &mut collab);

        publish_noise(entity, body.position, noises, &config, &mut noise_writer);
    }
}

pub fn apply_animation_notifies(
    time: Res<Time>,
    config: Res<TraversalConfig>,
    spatial: Res<SpatialQueryPipeline>,
    volumes: Query<(Entity, &GlobalTransform, &Children), With<LadderVolume>>,
    anchors: Query<(&LadderAnchorRole, &GlobalTransform)>,
    mut notifies: MessageReader<AnimationNotify>,
    mut characters: CharacterQuery,
    mut noise_writer: MessageWriter<NoiseMessage>,
) {
    if notifies.is_empty() {
        return;
    }
    let now = time.elapsed_secs();
    let ladders = collect_ladders(&volumes, &anchors);

    for notify in notifies.read() {
        let Ok((entity, mut controller, mut body, _, _, mut rig)) = characters.get_mut(notify.target)
        else {
            continue;
        };
        let probe = PipelineProbe::new(&spatial).excluding(entity);
        let mover = KinematicMover::new(&probe);
        let mut noises = Vec::new();

        let mut collab = Collaborators::new(&probe, &ladders)
            .with_mover(&mover)
            .with_noise(&mut noises);
        if let Some(rig) = rig.as_deref_mut() {
            collab = collab.with_anim(rig);
        }
        if !controller.notify(notify.event, &mut body, &mut collab, now) {
            trace!("{:?} ignored by {:?}", notify.event, entity);
        }

        publish_noise(entity, body.position, noises, &config, &mut noise_writer);
    }
}

/// Mirror the capsule onto the entity transform (collider is centred).
pub fn sync_body_transforms(mut bodies: Query<(&CapsuleBody, &mut Transform), Changed<CapsuleBody>>) {
    for (body, mut transform) in bodies.iter_mut() {
        transform.translation = body.center();
        transform.rotation = body.rotation;
    }
}
