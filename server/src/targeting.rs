//! Target selection and firing for non-player agents
//!
//! Each agent runs a small state machine once per tick:
//!
//! - **Search**: nobody to chase, or the last target has not been seen for
//!   longer than `forget_after`.
//! - **Pursue**: walking towards the closest player, turning the gun once
//!   the player is within sight range.
//! - **Engage**: inside attack range with a clear line of sight and the gun
//!   lined up; the agent stops and fires on cooldown.
//!
//! The closest live player is re-picked every tick. Agents do not move or
//! shoot themselves; they return [`AgentCommand`]s for the session to carry
//! out, and their shots carry the non-player source id.

use crate::config::SessionConfig;
use crate::world::{ColliderTag, LineOfSight, Ray, VisibilityMask};
use log::trace;
use shared::{ClientId, EntityId, Vec3};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    Search,
    Pursue,
    Engage,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AgentCommand {
    MoveTo(Vec3),
    Halt,
    Fire { origin: Vec3, direction: Vec3 },
}

/// A live player the agent may consider
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sighting {
    pub client_id: ClientId,
    pub entity_id: EntityId,
    pub position: Vec3,
}

#[derive(Debug, Clone, Copy)]
pub struct TargetingParams {
    pub sight_range: f32,
    pub attack_range: f32,
    pub shoot_cooldown: f32,
    pub forget_after: f32,
    pub aim_tolerance_deg: f32,
    pub turn_rate: f32,
    pub muzzle_height: f32,
    pub mask: VisibilityMask,
}

impl TargetingParams {
    pub fn from_config(config: &SessionConfig) -> Self {
        let bots = &config.bots;
        Self {
            sight_range: bots.sight_range,
            attack_range: bots.attack_range,
            shoot_cooldown: bots.shoot_cooldown_secs,
            forget_after: bots.forget_after_secs,
            aim_tolerance_deg: bots.aim_tolerance_deg,
            turn_rate: bots.turn_rate,
            muzzle_height: config.muzzle_height,
            mask: VisibilityMask::PLAYERS.union(VisibilityMask::OBSTACLES),
        }
    }
}

impl Default for TargetingParams {
    fn default() -> Self {
        Self::from_config(&SessionConfig::default())
    }
}

#[derive(Debug, Clone)]
pub struct CombatTargeting {
    entity_id: EntityId,
    params: TargetingParams,
    state: AgentState,
    target: Option<ClientId>,
    aim: Vec3,
    last_seen: Option<f32>,
    last_shot: Option<f32>,
    can_see: bool,
    distance: f32,
}

impl CombatTargeting {
    pub fn new(entity_id: EntityId, params: TargetingParams) -> Self {
        Self {
            entity_id,
            params,
            state: AgentState::Search,
            target: None,
            aim: Vec3::FORWARD,
            last_seen: None,
            last_shot: None,
            can_see: false,
            distance: f32::INFINITY,
        }
    }

    /// Runs one decision step
    ///
    /// `now` and `dt` are in seconds. `candidates` are the live, connected
    /// players; `world` answers the line-of-sight query.
    pub fn evaluate(
        &mut self,
        now: f32,
        dt: f32,
        position: Vec3,
        alive: bool,
        candidates: &[Sighting],
        world: &dyn LineOfSight,
    ) -> Vec<AgentCommand> {
        if !alive {
            self.state = AgentState::Search;
            self.target = None;
            return vec![AgentCommand::Halt];
        }

        let Some(target) = closest(position, candidates) else {
            self.state = AgentState::Search;
            self.target = None;
            self.can_see = false;
            return Vec::new();
        };
        self.target = Some(target.client_id);

        let lift = Vec3::UP * self.params.muzzle_height;
        let muzzle = position + lift;
        let direction = (target.position + lift - muzzle).normalized();
        self.distance = position.distance(target.position);

        let ray = Ray {
            origin: muzzle,
            direction,
            max_distance: self.params.sight_range,
            ignore: Some(self.entity_id),
        };
        self.can_see = world
            .ray_test(&ray, self.params.mask)
            .is_some_and(|hit| hit.tag == ColliderTag::Player(target.entity_id));
        if self.can_see {
            self.last_seen = Some(now);
        }
        let recently_seen = self
            .last_seen
            .is_some_and(|seen| now - seen <= self.params.forget_after);

        let mut commands = Vec::new();
        if self.distance > self.params.attack_range || !recently_seen {
            commands.push(AgentCommand::MoveTo(target.position));
        }

        if self.distance < self.params.sight_range {
            let step = (dt * self.params.turn_rate).clamp(0.0, 1.0);
            self.aim = self.aim.rotate_towards(direction, step);
        }

        let aligned = self.aim.angle_deg(direction) <= self.params.aim_tolerance_deg;
        if self.distance < self.params.attack_range && self.can_see && aligned {
            self.state = AgentState::Engage;
            commands.push(AgentCommand::Halt);

            let ready = self
                .last_shot
                .map_or(true, |shot| now - shot > self.params.shoot_cooldown);
            if ready {
                self.last_shot = Some(now);
                commands.push(AgentCommand::Fire {
                    origin: muzzle,
                    direction: self.aim,
                });
                trace!("Agent {} firing at client {}", self.entity_id, target.client_id);
            }
        } else if recently_seen {
            self.state = AgentState::Pursue;
        } else {
            self.state = AgentState::Search;
        }

        commands
    }

    pub fn entity_id(&self) -> EntityId {
        self.entity_id
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    pub fn target(&self) -> Option<ClientId> {
        self.target
    }

    pub fn aim(&self) -> Vec3 {
        self.aim
    }

    pub fn can_see_target(&self) -> bool {
        self.can_see
    }
}

fn closest(position: Vec3, candidates: &[Sighting]) -> Option<Sighting> {
    candidates
        .iter()
        .copied()
        .min_by(|a, b| {
            position
                .distance(a.position)
                .total_cmp(&position.distance(b.position))
        })
}
