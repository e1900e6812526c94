use bevy::prelude::*;
use bevy_inspector_egui::{bevy_egui::EguiPlugin, quick::WorldInspectorPlugin};
use traversal::body::CapsuleBody;
use traversal::input::CameraYaw;

use crate::demo::DemoCharacter;

const CAMERA_DISTANCE: f32 = 6.0;
const CAMERA_HEIGHT: f32 = 3.0;
const ORBIT_SPEED: f32 = 2.0;

/// Windowed-only visuals: camera, light, inspector and character meshes.
pub struct RenderPlugin;

impl Plugin for RenderPlugin {
    fn build(&self, app: &mut App) {
        app.register_type::<FollowCamera>();
        app.add_systems(Startup, (spawn_camera_if_none_exists, spawn_sun));
        app.add_systems(Update, (orbit_camera, follow_character).chain());
        app.add_observer(add_character_visuals);
        app.add_plugins((EguiPlugin::default(), WorldInspectorPlugin::default()));
    }
}

#[derive(Component, Reflect, Clone, Copy, Debug, Default)]
pub struct FollowCamera {
    pub yaw: f32,
}

fn spawn_camera_if_none_exists(
    mut commands: Commands,
    existing_cameras: Query<Entity, With<Camera3d>>,
) {
    if existing_cameras.is_empty() {
        commands.spawn((
            Camera3d::default(),
            Camera {
                order: 0,
                ..Default::default()
            },
            FollowCamera::default(),
            Transform::from_xyz(0.0, CAMERA_HEIGHT, CAMERA_DISTANCE).looking_at(Vec3::ZERO, Vec3::Y),
            Name::new("RenderCamera"),
        ));
    }
}

fn spawn_sun(mut commands: Commands) {
    commands.spawn((
        DirectionalLight {
            color: Color::WHITE,
            illuminance: 8000.0,
            shadows_enabled: true,
            ..default()
        },
        Transform::from_xyz(10.0, 20.0, 10.0).looking_at(Vec3::ZERO, Vec3::Y),
        Name::new("Sun"),
    ));
}

fn add_character_visuals(
    trigger: On<Add, DemoCharacter>,
    characters: Query<&CapsuleBody, Without<Mesh3d>>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    mut commands: Commands,
) {
    let Ok(body) = characters.get(trigger.entity) else {
        debug!("no capsule body on {:?}, skipping visuals", trigger.entity);
        return;
    };
    let segment = (body.height - 2.0 * body.radius).max(0.0);
    commands.entity(trigger.entity).insert((
        Mesh3d(meshes.add(Capsule3d::new(body.radius, segment))),
        MeshMaterial3d(materials.add(StandardMaterial {
            base_color: Color::srgb(0.2, 0.5, 0.9),
            ..default()
        })),
    ));
}

/// Z and C orbit the camera around the character.
fn orbit_camera(
    time: Res<Time>,
    keys: Res<ButtonInput<KeyCode>>,
    mut cameras: Query<&mut FollowCamera>,
    mut characters: Query<&mut CameraYaw, With<DemoCharacter>>,
) {
    let mut turn = 0.0;
    if keys.pressed(KeyCode::KeyZ) {
        turn += 1.0;
    }
    if keys.pressed(KeyCode::KeyC) {
        turn -= 1.0;
    }
    for mut camera in cameras.iter_mut() {
        camera.yaw += turn * ORBIT_SPEED * time.delta_secs();
        for mut yaw in characters.iter_mut() {
            yaw.0 = camera.yaw;
        }
    }
}

fn follow_character(
    characters: Query<&CapsuleBody, With<DemoCharacter>>,
    mut cameras: Query<(&FollowCamera, &mut Transform)>,
) {
    let Some(body) = characters.iter().next() else {
        return;
    };
    let target = body.center();
    for (camera, mut transform) in cameras.iter_mut() {
        let behind = Quat::from_rotation_y(camera.yaw) * Vec3::Z * CAMERA_DISTANCE;
        transform.translation = target + behind + Vec3::Y * CAMERA_HEIGHT;
        transform.look_at(target, Vec3::Y);
    }
}
