//! Session configuration
//!
//! Everything the authority needs to run a match is passed in here once, at
//! construction time, and never changes afterwards. Values come from an
//! optional TOML file with per-field defaults; the binary then applies its
//! command-line overrides before calling [`SessionConfig::validate`].

use crate::error::ConfigError;
use crate::timers::Tick;
use crate::world::Aabb;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use shared::{Vec3, MAX_SNAPSHOT_ENTITIES};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Authority ticks per second
    pub tick_rate: u32,
    pub max_clients: usize,
    /// Seconds of silence before a client is dropped
    pub client_timeout_secs: f32,

    pub max_health: f32,
    pub move_speed: f32,
    pub projectile_damage: f32,
    pub shoot_range: f32,
    pub player_radius: f32,
    /// Height of the muzzle above an entity's feet
    pub muzzle_height: f32,
    /// Arena spans [-half_extent, half_extent] on X and Z
    pub arena_half_extent: f32,
    pub obstacles: Vec<Aabb>,

    pub initial_spawn_delay_secs: f32,
    pub respawn_delay_secs: f32,
    /// Wait before a dead entity's remains are destroyed
    pub corpse_grace_secs: f32,
    pub player_spawn_points: Vec<Vec3>,

    pub bots: BotConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub bots_per_wave: u32,
    pub waves: u32,
    pub wave_delay_secs: f32,
    pub spawn_points: Vec<Vec3>,
    pub move_speed: f32,
    pub sight_range: f32,
    pub attack_range: f32,
    pub shoot_cooldown_secs: f32,
    pub forget_after_secs: f32,
    pub aim_tolerance_deg: f32,
    /// Aim blend rate per second
    pub turn_rate: f32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_rate: 30,
            max_clients: 16,
            client_timeout_secs: 5.0,
            max_health: 100.0,
            move_speed: 6.0,
            projectile_damage: 10.0,
            shoot_range: 100.0,
            player_radius: 0.5,
            muzzle_height: 1.1,
            arena_half_extent: 50.0,
            obstacles: Vec::new(),
            initial_spawn_delay_secs: 4.0,
            respawn_delay_secs: 10.0,
            corpse_grace_secs: 5.0,
            player_spawn_points: vec![
                Vec3::new(-20.0, 0.0, -20.0),
                Vec3::new(20.0, 0.0, -20.0),
                Vec3::new(-20.0, 0.0, 20.0),
                Vec3::new(20.0, 0.0, 20.0),
            ],
            bots: BotConfig::default(),
        }
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            bots_per_wave: 3,
            waves: 2,
            wave_delay_secs: 10.0,
            spawn_points: vec![
                Vec3::new(0.0, 0.0, 35.0),
                Vec3::new(0.0, 0.0, -35.0),
                Vec3::new(35.0, 0.0, 0.0),
            ],
            move_speed: 3.5,
            sight_range: 25.0,
            attack_range: 12.0,
            shoot_cooldown_secs: 1.5,
            forget_after_secs: 3.0,
            aim_tolerance_deg: 10.0,
            turn_rate: 6.0,
        }
    }
}

impl BotConfig {
    pub fn enabled(&self) -> bool {
        self.bots_per_wave > 0 && self.waves > 0
    }
}

impl SessionConfig {
    /// Reads a TOML file; missing fields fall back to their defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: SessionConfig = toml::from_str(&text)?;
        info!("Loaded session config from {}", path.display());
        Ok(config)
    }

    /// Rejects configurations a session cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_rate == 0 {
            return Err(ConfigError::InvalidTickRate);
        }
        if self.player_spawn_points.is_empty() {
            return Err(ConfigError::MissingSpawnPoints("player"));
        }
        if self.bots.enabled() && self.bots.spawn_points.is_empty() {
            return Err(ConfigError::MissingSpawnPoints("bot"));
        }
        if self.max_clients == 0 {
            return Err(invalid("max_clients", "must allow at least one client"));
        }

        let positive = [
            ("max_health", self.max_health),
            ("move_speed", self.move_speed),
            ("player_radius", self.player_radius),
            ("arena_half_extent", self.arena_half_extent),
            ("shoot_range", self.shoot_range),
            ("bots.sight_range", self.bots.sight_range),
            ("bots.attack_range", self.bots.attack_range),
        ];
        for (field, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(invalid(field, format!("must be positive, got {}", value)));
            }
        }

        let non_negative = [
            ("projectile_damage", self.projectile_damage),
            ("initial_spawn_delay_secs", self.initial_spawn_delay_secs),
            ("respawn_delay_secs", self.respawn_delay_secs),
            ("corpse_grace_secs", self.corpse_grace_secs),
            ("client_timeout_secs", self.client_timeout_secs),
            ("bots.wave_delay_secs", self.bots.wave_delay_secs),
            ("bots.shoot_cooldown_secs", self.bots.shoot_cooldown_secs),
            ("bots.forget_after_secs", self.bots.forget_after_secs),
            ("bots.aim_tolerance_deg", self.bots.aim_tolerance_deg),
        ];
        for (field, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(invalid(field, format!("must not be negative, got {}", value)));
            }
        }

        let entities = self.max_world_entities();
        if entities > MAX_SNAPSHOT_ENTITIES {
            return Err(invalid(
                "max_clients, bots.bots_per_wave",
                format!(
                    "{} clients and {} bots per wave can reach {} entities, world state fits {}",
                    self.max_clients, self.bots.bots_per_wave, entities, MAX_SNAPSHOT_ENTITIES
                ),
            ));
        }

        if self.bots.attack_range > self.bots.sight_range {
            warn!(
                "Bot attack range {} exceeds sight range {}; bots will only engage within sight",
                self.bots.attack_range, self.bots.sight_range
            );
        }

        Ok(())
    }

    /// Upper bound on entities alive or awaiting destruction at once
    ///
    /// Each client has its live instance plus whatever corpses can pile up
    /// within one grace delay, given a client dies at most once per respawn
    /// delay. A bot wave only follows once the previous one is destroyed.
    pub fn max_world_entities(&self) -> usize {
        let respawn_cycle = self.ticks(self.respawn_delay_secs).max(1);
        let corpses = self.ticks(self.corpse_grace_secs) / respawn_cycle + 1;
        let per_client = 1usize.saturating_add(corpses as usize);
        self.max_clients
            .saturating_mul(per_client)
            .saturating_add(self.bots.bots_per_wave as usize)
    }

    pub fn tick_seconds(&self) -> f32 {
        1.0 / self.tick_rate.max(1) as f32
    }

    /// Converts a duration in seconds to whole ticks, rounding to nearest
    pub fn ticks(&self, secs: f32) -> Tick {
        (secs.max(0.0) * self.tick_rate as f32).round() as Tick
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        reason: reason.into(),
    }
}
