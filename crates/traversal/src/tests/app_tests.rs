use std::time::Duration;

use avian3d::prelude::SpatialQueryPipeline;
use bevy::ecs::system::RunSystemOnce;
use bevy::prelude::*;

use crate::animation::{AnimBool, AnimEvent, AnimationNotify, AnimationRig};
use crate::body::CapsuleBody;
use crate::config::TraversalConfig;
use crate::controller::TraversalController;
use crate::input::InputLatch;
use crate::noise::NoiseMessage;
use crate::systems::{
    LadderAnchorRole, LadderVolume, character_bundle, collect_ladders, sync_body_transforms,
};
use crate::{FIXED_TIMESTEP_HZ, TraversalPlugin};

#[derive(Resource, Default)]
struct Heard(Vec<NoiseMessage>);

fn record_noise(mut reader: MessageReader<NoiseMessage>, mut heard: ResMut<Heard>) {
    heard.0.extend(reader.read().cloned());
}

fn test_app(plugin: TraversalPlugin) -> App {
    let mut app = App::new();
    app.add_plugins(MinimalPlugins);
    app.init_resource::<SpatialQueryPipeline>();
    app.add_plugins(plugin);
    app.init_resource::<Heard>();
    app.add_systems(FixedUpdate, record_noise.after(sync_body_transforms));
    app
}

fn fixed_step(app: &mut App) {
    app.world_mut()
        .resource_mut::<Time>()
        .advance_by(Duration::from_secs_f64(1.0 / FIXED_TIMESTEP_HZ));
    app.world_mut().run_schedule(FixedUpdate);
}

fn spawn_character(app: &mut App, feet: Vec3) -> Entity {
    let config = app.world().resource::<TraversalConfig>().clone();
    app.world_mut().spawn(character_bundle(&config, feet)).id()
}

/// Make the next grounding pass see a floor contact, as if the mover had
/// just resolved a step onto one.
fn stand_on_contact(app: &mut App, entity: Entity) {
    let mut body = app.world_mut().get_mut::<CapsuleBody>(entity).expect("body");
    body.last_contacts.below = true;
    body.vertical_velocity = 0.0;
}

#[test]
fn test_plugin_inserts_default_config() {
    let app = test_app(TraversalPlugin::default());
    assert_eq!(
        app.world().resource::<TraversalConfig>(),
        &TraversalConfig::default()
    );
}

#[test]
fn test_plugin_loads_config_file() {
    let path = std::env::temp_dir().join(format!("traversal_plugin_{}.ron", std::process::id()));
    std::fs::write(&path, "(locomotion: (walk_speed: 3.0), ladder: (climb_speed: 2.5))")
        .expect("temp file");

    let app = test_app(TraversalPlugin::from_file(&path));
    let _ = std::fs::remove_file(&path);

    let config = app.world().resource::<TraversalConfig>();
    assert_eq!(config.locomotion.walk_speed, 3.0);
    assert_eq!(config.ladder.climb_speed, 2.5);
    assert_eq!(config.ledge, TraversalConfig::default().ledge);
}

#[test]
fn test_plugin_falls_back_on_unreadable_config() {
    let app = test_app(TraversalPlugin::from_file("no/such/traversal.ron"));
    assert_eq!(
        app.world().resource::<TraversalConfig>(),
        &TraversalConfig::default()
    );
}

#[test]
fn test_character_falls_and_transform_follows() {
    let mut app = test_app(TraversalPlugin::default());
    let character = spawn_character(&mut app, Vec3::new(0.0, 5.0, 0.0));

    for _ in 0..30 {
        fixed_step(&mut app);
    }

    let body = app.world().get::<CapsuleBody>(character).expect("body");
    let transform = app.world().get::<Transform>(character).expect("transform");
    assert!(body.position.y < 4.0, "y {}", body.position.y);
    assert!(!body.grounded);
    assert_eq!(transform.translation, body.center());
    assert_eq!(transform.rotation, body.rotation);
}

#[test]
fn test_latched_equip_reaches_controller() {
    let mut app = test_app(TraversalPlugin::default());
    let character = spawn_character(&mut app, Vec3::ZERO);
    app.world_mut()
        .get_mut::<InputLatch>(character)
        .expect("latch")
        .equip = true;

    fixed_step(&mut app);

    let world = app.world();
    assert!(world.get::<TraversalController>(character).expect("controller").is_armed());
    assert!(world.get::<AnimationRig>(character).expect("rig").bool(AnimBool::Armed));
    assert!(!world.get::<InputLatch>(character).expect("latch").equip, "edge was consumed");
}

#[test]
fn test_jump_publishes_noise_message() {
    let mut app = test_app(TraversalPlugin::default());
    let character = spawn_character(&mut app, Vec3::ZERO);
    stand_on_contact(&mut app, character);
    app.world_mut()
        .get_mut::<InputLatch>(character)
        .expect("latch")
        .jump = true;

    fixed_step(&mut app);

    let heard = &app.world().resource::<Heard>().0;
    assert_eq!(heard.len(), 1);
    assert_eq!(heard[0].source, character);
    assert_eq!(heard[0].ping.strength, 0.35);
    let body = app.world().get::<CapsuleBody>(character).expect("body");
    assert!(body.vertical_velocity > 0.0);
}

#[test]
fn test_footstep_notify_is_routed_to_its_target() {
    let mut app = test_app(TraversalPlugin::default());
    let walker = spawn_character(&mut app, Vec3::ZERO);
    let other = spawn_character(&mut app, Vec3::new(10.0, 0.0, 0.0));
    stand_on_contact(&mut app, walker);
    stand_on_contact(&mut app, other);

    app.world_mut().write_message(AnimationNotify {
        target: walker,
        event: AnimEvent::Footstep(1.0),
    });
    fixed_step(&mut app);

    let heard = &app.world().resource::<Heard>().0;
    assert_eq!(heard.len(), 1);
    assert_eq!(heard[0].source, walker);
    assert_eq!(heard[0].ping.strength, 1.0);
    assert!((heard[0].ping.effective_radius() - 9.0).abs() < 1e-5);
}

#[test]
fn test_collect_ladders_reads_child_anchors() {
    let mut app = test_app(TraversalPlugin::default());
    let world = app.world_mut();

    let complete = world
        .spawn((
            LadderVolume,
            GlobalTransform::from(
                Transform::from_xyz(5.0, 1.5, 0.0).looking_to(Vec3::Z, Vec3::Y),
            ),
        ))
        .with_children(|ladder| {
            ladder.spawn((
                LadderAnchorRole::Bottom,
                GlobalTransform::from_translation(Vec3::new(5.0, 0.0, 0.0)),
            ));
            ladder.spawn((
                LadderAnchorRole::Top,
                GlobalTransform::from_translation(Vec3::new(5.0, 3.0, 0.0)),
            ));
        })
        .id();
    let missing_top = world
        .spawn((LadderVolume, GlobalTransform::IDENTITY))
        .with_children(|ladder| {
            ladder.spawn((LadderAnchorRole::Bottom, GlobalTransform::IDENTITY));
        })
        .id();

    let ladders = world
        .run_system_once(
            |volumes: Query<(Entity, &GlobalTransform, &Children), With<LadderVolume>>,
             anchors: Query<(&LadderAnchorRole, &GlobalTransform)>| {
                collect_ladders(&volumes, &anchors)
            },
        )
        .expect("system runs");

    assert_eq!(ladders.len(), 1);
    assert!(!ladders.contains_key(&missing_top));
    let geometry = ladders[&complete];
    assert_eq!(geometry.bottom, Vec3::new(5.0, 0.0, 0.0));
    assert_eq!(geometry.top, Vec3::new(5.0, 3.0, 0.0));
    assert!((geometry.facing - Vec3::Z).length() < 1e-5);
}
