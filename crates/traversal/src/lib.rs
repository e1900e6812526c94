pub mod animation;
pub mod body;
pub mod config;
pub mod context;
pub mod controller;
pub mod error;
pub mod input;
pub mod ladder;
pub mod ledge;
pub mod locomotion;
pub mod mover;
pub mod noise;
pub mod query;
pub mod systems;

#[cfg(test)]
mod tests;

use std::path::PathBuf;

use bevy::prelude::*;

use crate::animation::{AnimationNotify, AnimationRig, validate_animation_rigs};
use crate::body::CapsuleBody;
use crate::config::{TraversalConfig, load_config};
use crate::controller::TraversalController;
use crate::input::{CameraYaw, InputLatch};
use crate::noise::NoiseMessage;
use crate::systems::{
    LadderAnchorRole, LadderVolume, apply_animation_notifies, latch_input,
    sync_body_transforms, tick_traversal,
};

pub const FIXED_TIMESTEP_HZ: f64 = 60.0;

/// Traversal systems for every entity carrying a [`TraversalController`].
///
/// With a `config_path` the config is read from that RON file, falling back
/// to defaults with a warning when it cannot be loaded. Without one an
/// already inserted [`TraversalConfig`] is kept.
#[derive(Default)]
pub struct TraversalPlugin {
    pub config_path: Option<PathBuf>,
}

impl TraversalPlugin {
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: Some(path.into()),
        }
    }
}

impl Plugin for TraversalPlugin {
    fn build(&self, app: &mut App) {
        match &self.config_path {
            Some(path) => {
                let config = load_config(path).unwrap_or_else(|err| {
                    warn!("using default traversal config: {}", err);
                    TraversalConfig::default()
                });
                app.insert_resource(config);
            }
            None => {
                app.init_resource::<TraversalConfig>();
            }
        }

        app.register_type::<TraversalConfig>()
            .register_type::<TraversalController>()
            .register_type::<CapsuleBody>()
            .register_type::<AnimationRig>()
            .register_type::<InputLatch>()
            .register_type::<CameraYaw>()
            .register_type::<LadderVolume>()
            .register_type::<LadderAnchorRole>()
            .add_message::<AnimationNotify>()
            .add_message::<NoiseMessage>()
            .add_systems(PreUpdate, latch_input)
            .add_systems(Update, validate_animation_rigs)
            .add_systems(
                FixedUpdate,
                (
                    tick_traversal,
                    apply_animation_notifies,
                    sync_body_transforms,
                )
                    .chain(),
            );
    }
}
