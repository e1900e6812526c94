use avian3d::prelude::{Collider, CollisionLayers, LayerMask, RigidBody, Sensor};
use bevy::prelude::*;
use leafwing_input_manager::prelude::ActionState;
use traversal::config::TraversalConfig;
use traversal::input::{TraversalAction, default_input_map};
use traversal::noise::NoiseMessage;
use traversal::query::SurfaceLayer;
use traversal::systems::{LadderAnchorRole, LadderVolume, character_bundle};

use crate::playback::ClipPlayback;

pub const FLOOR_SIZE: f32 = 40.0;
pub const FLOOR_THICKNESS: f32 = 1.0;
pub const SPAWN_POINT: Vec3 = Vec3::new(0.0, 0.01, 0.0);

pub const LADDER_POSITION: Vec3 = Vec3::new(-4.0, 2.0, -6.0);
pub const LADDER_SIZE: Vec3 = Vec3::new(0.8, 4.0, 0.4);

/// Marker for the player-driven character.
#[derive(Component, Reflect, Clone, Copy, Debug, Default)]
pub struct DemoCharacter;

pub struct DemoScenePlugin;

impl Plugin for DemoScenePlugin {
    fn build(&self, app: &mut App) {
        app.register_type::<DemoCharacter>();
        app.add_systems(Startup, (setup_demo_level, spawn_demo_character));
        app.add_systems(Update, log_noise);
    }
}

/// Boxes as `(name, center, size, layer)`.
fn level_boxes() -> [(&'static str, Vec3, Vec3, SurfaceLayer); 5] {
    [
        (
            "Floor",
            Vec3::new(0.0, -FLOOR_THICKNESS / 2.0, 0.0),
            Vec3::new(FLOOR_SIZE, FLOOR_THICKNESS, FLOOR_SIZE),
            SurfaceLayer::Ground,
        ),
        (
            "Step",
            Vec3::new(3.0, 0.125, -3.0),
            Vec3::new(2.0, 0.25, 2.0),
            SurfaceLayer::Ground,
        ),
        // Top sits level with the ladder's top anchor.
        (
            "Ladder Platform",
            Vec3::new(-4.0, 2.0, -8.2),
            Vec3::new(4.0, 4.0, 4.0),
            SurfaceLayer::Ground,
        ),
        (
            "Ledge Wall",
            Vec3::new(5.0, 1.0, -8.0),
            Vec3::new(6.0, 2.0, 1.0),
            SurfaceLayer::Climbable,
        ),
        (
            "Tall Wall",
            Vec3::new(-10.0, 2.5, 0.0),
            Vec3::new(1.0, 5.0, 8.0),
            SurfaceLayer::Default,
        ),
    ]
}

pub fn setup_demo_level(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: Option<ResMut<Assets<StandardMaterial>>>, // no render in headless runs
) {
    for (name, center, size, layer) in level_boxes() {
        let mut entity = commands.spawn((
            Name::new(name),
            Transform::from_translation(center),
            Mesh3d(meshes.add(Cuboid::from_size(size))),
            RigidBody::Static,
            Collider::cuboid(size.x, size.y, size.z),
            CollisionLayers::new(layer, LayerMask::ALL),
        ));
        if let Some(ref mut mats) = materials {
            let color = match layer {
                SurfaceLayer::Climbable => Color::srgb(0.8, 0.55, 0.3),
                _ => Color::srgb(0.5, 0.5, 0.55),
            };
            entity.insert(MeshMaterial3d(mats.add(StandardMaterial {
                base_color: color,
                ..default()
            })));
        }
    }

    let half_height = LADDER_SIZE.y / 2.0;
    let mut ladder = commands.spawn((
        Name::new("Ladder"),
        LadderVolume,
        Transform::from_translation(LADDER_POSITION).looking_to(Vec3::Z, Vec3::Y),
        Mesh3d(meshes.add(Cuboid::from_size(LADDER_SIZE))),
        Sensor,
        Collider::cuboid(LADDER_SIZE.x, LADDER_SIZE.y, LADDER_SIZE.z),
        CollisionLayers::new(SurfaceLayer::Ladder, LayerMask::ALL),
    ));
    if let Some(ref mut mats) = materials {
        ladder.insert(MeshMaterial3d(mats.add(StandardMaterial {
            base_color: Color::srgba(0.9, 0.8, 0.2, 0.6),
            alpha_mode: AlphaMode::Blend,
            ..default()
        })));
    }
    ladder.with_children(|anchors| {
        anchors.spawn((
            Name::new("Ladder Bottom"),
            LadderAnchorRole::Bottom,
            Transform::from_xyz(0.0, -half_height, 0.0),
        ));
        anchors.spawn((
            Name::new("Ladder Top"),
            LadderAnchorRole::Top,
            Transform::from_xyz(0.0, half_height, 0.0),
        ));
    });

    info!("demo level spawned");
}

pub fn spawn_demo_character(mut commands: Commands, config: Res<TraversalConfig>) {
    let character = commands
        .spawn((
            character_bundle(&config, SPAWN_POINT),
            DemoCharacter,
            default_input_map(),
            ActionState::<TraversalAction>::default(),
            ClipPlayback::default(),
        ))
        .id();
    info!("spawned character {:?} at {:?}", character, SPAWN_POINT);
}

/// Stand-in for a hearing system.
fn log_noise(mut reader: MessageReader<NoiseMessage>) {
    for message in reader.read() {
        debug!(
            "{:?} made noise {:.2} at {:?}, radius {:.1}",
            message.source,
            message.ping.strength,
            message.ping.position,
            message.ping.effective_radius()
        );
    }
}
