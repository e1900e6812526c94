//! Tunables for every traversal machine, loadable from a RON file.

use std::fs;
use std::path::Path;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TraversalError};
use crate::ladder::LadderConfig;
use crate::ledge::LedgeConfig;
use crate::locomotion::LocomotionConfig;
use crate::noise::NoiseRadii;

#[derive(Resource, Reflect, Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct TraversalConfig {
    pub locomotion: LocomotionConfig,
    pub ladder: LadderConfig,
    pub ledge: LedgeConfig,
    pub noise: NoiseRadii,
}

/// Read and validate a config file.
pub fn load_config(path: impl AsRef<Path>) -> Result<TraversalConfig> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| TraversalError::ConfigIo {
        path: path.to_path_buf(),
        source,
    })?;
    let config = parse_config(&text).map_err(|message| TraversalError::ConfigParse {
        path: path.to_path_buf(),
        message,
    })?;
    config.validate()?;
    Ok(config)
}

fn parse_config(text: &str) -> std::result::Result<TraversalConfig, String> {
    ron::from_str(text).map_err(|e| e.to_string())
}

fn positive(field: &'static str, value: f32) -> Result<()> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(TraversalError::InvalidConfig {
            field,
            reason: format!("must be positive, got {value}"),
        })
    }
}

fn non_negative(field: &'static str, value: f32) -> Result<()> {
    if value >= 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(TraversalError::InvalidConfig {
            field,
            reason: format!("must not be negative, got {value}"),
        })
    }
}

impl TraversalConfig {
    pub fn validate(&self) -> Result<()> {
        let l = &self.locomotion;
        positive("locomotion.walk_speed", l.walk_speed)?;
        positive("locomotion.run_speed", l.run_speed)?;
        positive("locomotion.rotation_speed", l.rotation_speed)?;
        positive("locomotion.jump_height", l.jump_height)?;
        positive("locomotion.ascend_gravity", l.ascend_gravity)?;
        positive("locomotion.descend_gravity", l.descend_gravity)?;
        positive("locomotion.terminal_fall_speed", l.terminal_fall_speed)?;
        positive("locomotion.stamina_max", l.stamina_max)?;
        positive("locomotion.ground_probe_radius", l.ground_probe_radius)?;
        non_negative("locomotion.jump_cooldown", l.jump_cooldown)?;
        non_negative("locomotion.landing_cooldown", l.landing_cooldown)?;
        non_negative("locomotion.coyote_time", l.coyote_time)?;
        non_negative("locomotion.jump_buffer", l.jump_buffer)?;
        non_negative("locomotion.roll_cooldown", l.roll_cooldown)?;
        non_negative("locomotion.roll_cost", l.roll_cost)?;
        non_negative("locomotion.stamina_drain", l.stamina_drain)?;
        non_negative("locomotion.stamina_regen", l.stamina_regen)?;
        non_negative("locomotion.regen_delay", l.regen_delay)?;
        non_negative("locomotion.step_offset", l.step_offset)?;

        let d = &self.ladder;
        positive("ladder.probe_radius", d.probe_radius)?;
        positive("ladder.climb_speed", d.climb_speed)?;
        non_negative("ladder.shimmy_speed", d.shimmy_speed)?;
        non_negative("ladder.side_soft_clamp", d.side_soft_clamp)?;
        non_negative("ladder.dash_cooldown", d.dash_cooldown)?;
        non_negative("ladder.air_grab_window", d.air_grab_window)?;
        non_negative("ladder.edge_threshold", d.edge_threshold)?;

        let g = &self.ledge;
        positive("ledge.wall_check_distance", g.wall_check_distance)?;
        non_negative("ledge.shimmy_speed", g.shimmy_speed)?;
        if g.ledge_min_height >= g.ledge_max_height {
            return Err(TraversalError::InvalidConfig {
                field: "ledge.ledge_min_height",
                reason: format!(
                    "must be below ledge_max_height ({} >= {})",
                    g.ledge_min_height, g.ledge_max_height
                ),
            });
        }

        non_negative("noise.global_multiplier", self.noise.global_multiplier)?;
        Ok(())
    }
}
