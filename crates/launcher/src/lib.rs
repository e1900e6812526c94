use std::path::PathBuf;
use std::time::Duration;

use avian3d::prelude::PhysicsPlugins;
use bevy::app::ScheduleRunnerPlugin;
use bevy::input::mouse::{AccumulatedMouseMotion, AccumulatedMouseScroll};
use bevy::log::{Level, LogPlugin};
use bevy::prelude::*;
use bevy::render::{
    RenderPlugin as BevyRenderPlugin,
    settings::{Backends, WgpuSettings},
};
use bevy::window::{PresentMode, WindowFocused};
use leafwing_input_manager::plugin::InputManagerPlugin;
use traversal::input::TraversalAction;
use traversal::{FIXED_TIMESTEP_HZ, TraversalPlugin};

use crate::demo::DemoScenePlugin;
use crate::playback::PlaybackPlugin;
use crate::render::RenderPlugin;

pub mod demo;
pub mod playback;
pub mod render;

const LOG_FILTER: &str = "wgpu=error,naga=warn,avian3d=info";

/// How the demo app is assembled.
#[derive(Clone, Debug)]
pub struct LaunchOptions {
    pub headless: bool,
    /// Install the global logger; tests leave it off since it can only be set once.
    pub log_level: Option<Level>,
    pub config_path: Option<PathBuf>,
    /// Exit after this many frames
    pub frames: Option<u32>,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            headless: false,
            log_level: Some(Level::INFO),
            config_path: None,
            frames: None,
        }
    }
}

/// Remaining frames before the app asks to exit.
#[derive(Resource, Debug)]
pub struct FrameBudget(pub u32);

fn count_down_frames(mut budget: ResMut<FrameBudget>, mut exit: MessageWriter<AppExit>) {
    if budget.0 == 0 {
        info!("frame budget spent, exiting");
        exit.write(AppExit::Success);
        return;
    }
    budget.0 -= 1;
}

pub fn create_app(options: &LaunchOptions) -> App {
    let mut app = App::new();

    if options.headless {
        app.add_plugins(MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(
            Duration::from_secs_f64(1.0 / FIXED_TIMESTEP_HZ),
        )));
        if let Some(level) = options.log_level {
            app.add_plugins(LogPlugin {
                level,
                filter: LOG_FILTER.to_string(),
                ..default()
            });
        }
        app.add_plugins((
            bevy::diagnostic::DiagnosticsPlugin,
            bevy::transform::TransformPlugin,
            bevy::asset::AssetPlugin::default(),
            bevy::mesh::MeshPlugin,
        ));

        // Input resources usually provided by the windowed InputPlugin.
        app.init_resource::<ButtonInput<KeyCode>>();
        app.init_resource::<ButtonInput<MouseButton>>();
        app.init_resource::<AccumulatedMouseMotion>();
        app.init_resource::<AccumulatedMouseScroll>();
        app.add_message::<WindowFocused>();
    } else {
        let plugins = DefaultPlugins
            .set(WindowPlugin {
                primary_window: Some(Window {
                    title: "Traversal Demo".to_string(),
                    resolution: (1280, 720).into(),
                    present_mode: PresentMode::AutoVsync,
                    ..default()
                }),
                ..default()
            })
            .set(BevyRenderPlugin {
                render_creation: WgpuSettings {
                    backends: Some(Backends::VULKAN | Backends::DX12 | Backends::METAL),
                    ..default()
                }
                .into(),
                ..default()
            });
        match options.log_level {
            Some(level) => app.add_plugins(plugins.set(LogPlugin {
                level,
                filter: LOG_FILTER.to_string(),
                ..default()
            })),
            None => app.add_plugins(plugins.disable::<LogPlugin>()),
        };
        app.add_plugins(RenderPlugin);
    }

    app.insert_resource(Time::<Fixed>::from_hz(FIXED_TIMESTEP_HZ));
    app.add_plugins(PhysicsPlugins::default());
    app.add_plugins(InputManagerPlugin::<TraversalAction>::default());
    app.add_plugins(match &options.config_path {
        Some(path) => TraversalPlugin::from_file(path),
        None => TraversalPlugin::default(),
    });
    app.add_plugins((DemoScenePlugin, PlaybackPlugin));

    if let Some(frames) = options.frames {
        app.insert_resource(FrameBudget(frames));
        app.add_systems(Last, count_down_frames);
    }

    app
}
