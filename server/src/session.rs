//! The authoritative match
//!
//! A [`Session`] owns every authority-side service and is the only thing
//! that mutates them. The network layer feeds it connections and intents
//! and flushes whatever it queued; nothing in here knows about sockets.
//!
//! One call to [`Session::tick`] runs, in order:
//!
//! 1. Apply queued intents (movement, aim, shots) and integrate movement
//! 2. Run non-player agents against the refreshed arena
//! 3. Drain server events into scoring and the respawn queue
//! 4. Pop at most one respawn request into its countdown
//! 5. Fire due timers: respawns, corpse destruction, the initial match
//!    spawn, bot waves (events they raise are drained right after)
//! 6. Broadcast the world state while the match is running

use crate::bots::BotSpawner;
use crate::client_manager::Intent;
use crate::combat::CombatAuthority;
use crate::config::SessionConfig;
use crate::error::ConfigError;
use crate::events::{server_bus, ServerEvent};
use crate::outbox::{Outbox, Outgoing};
use crate::respawn::RespawnScheduler;
use crate::roster::{Approval, RosterSyncService};
use crate::score::ScoreTracker;
use crate::targeting::{AgentCommand, CombatTargeting, Sighting, TargetingParams};
use crate::timers::{Tick, Timers};
use crate::world::{Arena, ColliderTag, LineOfSight, Ray, VisibilityMask};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{ClientId, EntityId, EventBus, Packet, Role, Subscription, Vec3, NON_PLAYER_ID};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Lobby,
    InGame,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MatchTimer {
    SpawnPlayers,
}

pub struct Session {
    config: SessionConfig,
    tick: Tick,
    phase: Phase,
    roster: RosterSyncService,
    combat: CombatAuthority,
    respawns: RespawnScheduler,
    scores: ScoreTracker,
    bots: BotSpawner,
    agents: BTreeMap<EntityId, CombatTargeting>,
    targeting: TargetingParams,
    arena: Arena,
    events: EventBus<ServerEvent>,
    subscription: Subscription<ServerEvent>,
    match_timers: Timers<MatchTimer>,
    /// Held movement direction per client, applied every tick
    movement: HashMap<ClientId, Vec3>,
    outbox: Outbox,
    rng: StdRng,
}

impl Session {
    pub fn new(config: SessionConfig) -> Result<Self, ConfigError> {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Deterministic spawn point selection, for tests and replays
    pub fn with_seed(config: SessionConfig, seed: u64) -> Result<Self, ConfigError> {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: SessionConfig, rng: StdRng) -> Result<Self, ConfigError> {
        config.validate()?;

        let events = server_bus();
        let subscription = events.subscribe();
        let role = Role::Authority;

        let session = Self {
            tick: 0,
            phase: Phase::Lobby,
            roster: RosterSyncService::new(role),
            combat: CombatAuthority::new(
                role,
                config.max_health,
                config.ticks(config.corpse_grace_secs),
                events.clone(),
            ),
            respawns: RespawnScheduler::new(role, config.ticks(config.respawn_delay_secs)),
            scores: ScoreTracker::new(role),
            bots: BotSpawner::new(&config.bots, config.ticks(config.bots.wave_delay_secs)),
            agents: BTreeMap::new(),
            targeting: TargetingParams::from_config(&config),
            arena: Arena::new(
                config.arena_half_extent,
                config.player_radius,
                config.obstacles.clone(),
            ),
            events,
            subscription,
            match_timers: Timers::new(),
            movement: HashMap::new(),
            outbox: Outbox::new(),
            rng,
            config,
        };

        info!(
            "Session created: {} Hz, {} player spawn points, bots {}",
            session.config.tick_rate,
            session.config.player_spawn_points.len(),
            if session.config.bots.enabled() { "on" } else { "off" }
        );
        Ok(session)
    }

    /// Admits a new client into the roster
    ///
    /// A client joining a running match gets the match state and the
    /// scoreboard, then waits in the respawn queue like a dead player.
    pub fn connect(&mut self, client_id: ClientId, payload: &[u8]) -> Approval {
        let approval = self.roster.approve(client_id, payload);
        if !approval.accepted {
            return approval;
        }

        self.outbox.send_to(
            client_id,
            Packet::Connected {
                client_id,
                is_host: self.roster.host() == Some(client_id),
            },
        );
        self.roster.on_join(client_id, &mut self.outbox);

        if self.phase == Phase::InGame {
            self.outbox.send_to(client_id, Packet::MatchStarted);
            self.scores.send_snapshot(client_id, &mut self.outbox);
            self.respawns.enqueue(client_id, self.tick);
        }
        approval
    }

    /// Answers a repeated connect from a client that is already admitted
    ///
    /// Nothing canonical changes. The client is sent its id and host flag
    /// again along with a fresh roster snapshot (and the match state when a
    /// match is running), all of which observers apply idempotently.
    pub fn resend_welcome(&mut self, client_id: ClientId) -> bool {
        if self.roster.is_shutting_down() || !self.roster.contains(client_id) {
            return false;
        }

        self.outbox.send_to(
            client_id,
            Packet::Connected {
                client_id,
                is_host: self.roster.host() == Some(client_id),
            },
        );
        self.outbox.send_to(
            client_id,
            Packet::RosterSnapshot {
                entries: self.roster.snapshot(),
            },
        );
        if self.phase == Phase::InGame {
            self.outbox.send_to(client_id, Packet::MatchStarted);
            self.scores.send_snapshot(client_id, &mut self.outbox);
        }
        debug!("Re-sent welcome to {}", client_id);
        true
    }

    /// Handles a client leaving for any reason
    ///
    /// Returns the clients that must be dropped as a result: just this one,
    /// or everybody when the host leaves and the session tears down.
    pub fn disconnect(&mut self, client_id: ClientId) -> Vec<ClientId> {
        if self.roster.is_shutting_down() {
            debug!("Client {} left during teardown", client_id);
            return vec![client_id];
        }
        if self.roster.host() == Some(client_id) {
            info!("Host {} left, tearing down session", client_id);
            return self.teardown();
        }

        self.roster.on_leave(client_id, &mut self.outbox);
        self.respawns.cancel(client_id);
        self.combat.despawn_owned_by(client_id);
        self.scores.remove(client_id);
        self.movement.remove(&client_id);
        self.events
            .publish(ServerEvent::PlayerDisconnected { client_id });
        vec![client_id]
    }

    /// Moves the lobby into the match; only the host may do this
    pub fn start_match(&mut self, requester: ClientId) -> bool {
        if self.roster.host() != Some(requester) {
            debug!("Client {} is not the host, ignoring start request", requester);
            return false;
        }
        if self.phase != Phase::Lobby {
            debug!("Match already running");
            return false;
        }

        self.phase = Phase::InGame;
        self.outbox.broadcast(Packet::MatchStarted);
        let due = self.tick + self.config.ticks(self.config.initial_spawn_delay_secs);
        self.match_timers.schedule(due, MatchTimer::SpawnPlayers);
        self.bots.start(self.tick);
        info!("Match started by {}, players spawn at tick {}", requester, due);
        true
    }

    /// Shuts the whole session down from the authority side
    ///
    /// Observers get a single teardown message and clear their own state.
    /// Returns every client that was connected.
    pub fn teardown(&mut self) -> Vec<ClientId> {
        let clients = self.roster.begin_teardown(&mut self.outbox);
        self.combat.clear();
        self.respawns.clear();
        self.scores.clear();
        self.bots.stop();
        self.agents.clear();
        self.match_timers.clear();
        self.movement.clear();
        clients
    }

    /// Advances the simulation by one tick and returns what to send
    pub fn tick(&mut self, intents: Vec<(ClientId, Intent)>) -> Vec<Outgoing> {
        if self.roster.is_shutting_down() {
            return self.outbox.drain();
        }

        self.tick += 1;
        let now = self.tick;

        self.sync_arena();
        for (client_id, intent) in intents {
            self.apply_intent(client_id, intent, now);
        }
        self.integrate_movement();

        self.sync_arena();
        self.run_agents(now);

        self.process_events(now);

        self.respawns.drain(now);
        self.fire_timers(now);
        self.process_events(now);

        if self.phase == Phase::InGame {
            self.outbox.broadcast(Packet::WorldState {
                tick: now,
                entities: self.combat.snapshots(),
            });
        }

        self.outbox.drain()
    }

    fn sync_arena(&mut self) {
        let lift = Vec3::UP * self.config.muzzle_height;
        let bodies: Vec<(ColliderTag, Vec3)> = self
            .combat
            .iter()
            .filter(|e| e.is_alive())
            .map(|e| {
                let tag = match e.owner() {
                    Some(_) => ColliderTag::Player(e.id()),
                    None => ColliderTag::NonPlayer(e.id()),
                };
                (tag, e.position() + lift)
            })
            .collect();
        self.arena.sync(bodies);
    }

    fn apply_intent(&mut self, client_id: ClientId, intent: Intent, now: Tick) {
        match intent {
            Intent::Move { direction } => {
                self.movement
                    .insert(client_id, direction.flattened().normalized());
            }
            Intent::Aim { point } => {
                let Some((entity_id, muzzle)) = self.muzzle_of(client_id) else {
                    return;
                };
                let aim = (point - muzzle).normalized();
                if !aim.is_zero() {
                    self.combat.set_aim(entity_id, aim);
                }
            }
            Intent::Shoot { target } => {
                let Some((entity_id, muzzle)) = self.muzzle_of(client_id) else {
                    debug!("Client {} has no live entity, shot rejected", client_id);
                    return;
                };
                let direction = (target - muzzle).normalized();
                if direction.is_zero() {
                    return;
                }
                self.combat.set_aim(entity_id, direction);
                self.fire(muzzle, direction, entity_id, client_id, now);
            }
        }
    }

    fn muzzle_of(&self, client_id: ClientId) -> Option<(EntityId, Vec3)> {
        self.combat
            .live_entity_of(client_id)
            .map(|e| (e.id(), e.position() + Vec3::UP * self.config.muzzle_height))
    }

    fn integrate_movement(&mut self) {
        let step = self.config.move_speed * self.config.tick_seconds();
        let moves: Vec<(EntityId, Vec3)> = self
            .movement
            .iter()
            .filter(|(_, direction)| !direction.is_zero())
            .filter_map(|(client_id, direction)| {
                self.combat
                    .live_entity_of(*client_id)
                    .map(|e| (e.id(), self.arena.clamp(e.position() + *direction * step)))
            })
            .collect();
        for (entity_id, position) in moves {
            self.combat.set_position(entity_id, position);
        }
    }

    /// Hitscan shot; damages whatever body the ray reaches first
    fn fire(&mut self, origin: Vec3, direction: Vec3, shooter: EntityId, source: ClientId, now: Tick) {
        let ray = Ray {
            origin,
            direction,
            max_distance: self.config.shoot_range,
            ignore: Some(shooter),
        };
        let Some(hit) = self.arena.ray_test(&ray, VisibilityMask::ALL) else {
            return;
        };
        if let Some(target) = hit.tag.entity() {
            self.combat.apply_damage(
                target,
                self.config.projectile_damage,
                source,
                now,
                &mut self.outbox,
            );
        }
    }

    fn run_agents(&mut self, now: Tick) {
        if self.agents.is_empty() {
            return;
        }

        let candidates: Vec<Sighting> = self
            .roster
            .ids()
            .filter_map(|client_id| {
                self.combat.live_entity_of(client_id).map(|e| Sighting {
                    client_id,
                    entity_id: e.id(),
                    position: e.position(),
                })
            })
            .collect();

        let dt = self.config.tick_seconds();
        let now_secs = now as f32 * dt;
        let mut orders = Vec::new();
        for (entity_id, agent) in self.agents.iter_mut() {
            let Some(entity) = self.combat.get(*entity_id) else {
                continue;
            };
            let commands = agent.evaluate(
                now_secs,
                dt,
                entity.position(),
                entity.is_alive(),
                &candidates,
                &self.arena,
            );
            orders.push((*entity_id, entity.position(), agent.aim(), commands));
        }

        let step = self.config.bots.move_speed * dt;
        for (entity_id, position, aim, commands) in orders {
            self.combat.set_aim(entity_id, aim);
            for command in commands {
                match command {
                    AgentCommand::MoveTo(destination) => {
                        let next = position.move_towards(destination.flattened(), step);
                        self.combat.set_position(entity_id, self.arena.clamp(next));
                    }
                    AgentCommand::Halt => {}
                    AgentCommand::Fire { origin, direction } => {
                        self.fire(origin, direction, entity_id, NON_PLAYER_ID, now);
                    }
                }
            }
        }
    }

    fn process_events(&mut self, now: Tick) {
        for event in self.subscription.drain() {
            match event {
                ServerEvent::PlayerSpawned { client_id, .. } => {
                    let nickname = self.roster.nickname(client_id);
                    self.scores
                        .register_player(client_id, &nickname, &mut self.outbox);
                }
                ServerEvent::PlayerDied { victim } => {
                    self.respawns.enqueue(victim, now);
                    self.scores.register_death(victim, &mut self.outbox);
                }
                ServerEvent::PlayerKilled { killer } => {
                    self.scores.register_kill(killer, &mut self.outbox);
                }
                ServerEvent::PlayerRespawned { client_id } => {
                    debug!("Client {} respawned", client_id);
                }
                ServerEvent::PlayerDisconnected { client_id } => {
                    debug!("Client {} cleanup finished", client_id);
                }
            }
        }
    }

    fn fire_timers(&mut self, now: Tick) {
        for request in self.respawns.fire_due(now) {
            if !self.roster.contains(request.client_id) {
                debug!("Dropping respawn for departed client {}", request.client_id);
                continue;
            }
            if self.spawn_player(request.client_id).is_some() {
                self.events.publish(ServerEvent::PlayerRespawned {
                    client_id: request.client_id,
                });
            }
        }

        for destroyed in self.combat.destroy_due(now) {
            self.agents.remove(&destroyed);
        }

        for timer in self.match_timers.pop_due(now) {
            match timer {
                MatchTimer::SpawnPlayers => {
                    let waiting: Vec<ClientId> = self
                        .roster
                        .ids()
                        .filter(|id| self.combat.live_entity_of(*id).is_none())
                        .filter(|id| !self.respawns.is_waiting(*id))
                        .collect();
                    info!("Spawning {} players", waiting.len());
                    for client_id in waiting {
                        self.spawn_player(client_id);
                    }
                }
            }
        }

        let combat = &self.combat;
        if let Some(count) = self.bots.update(now, |id| combat.contains(id)) {
            let spawned: Vec<EntityId> = (0..count).filter_map(|i| self.spawn_bot(i)).collect();
            self.bots.wave_spawned(spawned);
        }
    }

    fn random_point(&mut self, points: &[Vec3]) -> Option<Vec3> {
        if points.is_empty() {
            return None;
        }
        Some(points[self.rng.gen_range(0..points.len())])
    }

    fn spawn_player(&mut self, client_id: ClientId) -> Option<EntityId> {
        let points = self.config.player_spawn_points.clone();
        let Some(position) = self.random_point(&points) else {
            warn!("No player spawn points, cannot spawn {}", client_id);
            return None;
        };

        let name = format!("Player | Id: {}", client_id);
        let entity_id = self
            .combat
            .spawn_player(client_id, name, position, &mut self.outbox)?;
        self.movement.remove(&client_id);
        self.outbox
            .send_to(client_id, Packet::RespawnNotice { position });
        Some(entity_id)
    }

    fn spawn_bot(&mut self, index: u32) -> Option<EntityId> {
        let points = self.config.bots.spawn_points.clone();
        let position = self.random_point(&points)?;
        let entity_id = self
            .combat
            .spawn_non_player(format!("BotWalker {}", index + 1), position)?;
        self.agents
            .insert(entity_id, CombatTargeting::new(entity_id, self.targeting));
        Some(entity_id)
    }

    /// Messages queued outside of a tick (connects, disconnects, teardown)
    pub fn drain_outgoing(&mut self) -> Vec<Outgoing> {
        self.outbox.drain()
    }

    pub fn current_tick(&self) -> Tick {
        self.tick
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn roster(&self) -> &RosterSyncService {
        &self.roster
    }

    pub fn combat(&self) -> &CombatAuthority {
        &self.combat
    }

    pub fn scores(&self) -> &ScoreTracker {
        &self.scores
    }

    pub fn respawns(&self) -> &RespawnScheduler {
        &self.respawns
    }

    pub fn bots(&self) -> &BotSpawner {
        &self.bots
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    /// Subscribes to the authority's event topic
    pub fn subscribe(&self) -> Subscription<ServerEvent> {
        self.events.subscribe()
    }

    /// Applies damage outside the normal shot path
    pub fn apply_damage(&mut self, target: EntityId, amount: f32, source: ClientId) {
        let now = self.tick;
        self.combat
            .apply_damage(target, amount, source, now, &mut self.outbox);
    }

    pub fn is_torn_down(&self) -> bool {
        self.roster.is_shutting_down()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outbox::Delivery;

    fn config() -> SessionConfig {
        let mut config = SessionConfig {
            tick_rate: 10,
            initial_spawn_delay_secs: 0.5,
            respawn_delay_secs: 1.0,
            corpse_grace_secs: 0.5,
            player_spawn_points: vec![Vec3::new(0.0, 0.0, 0.0)],
            ..SessionConfig::default()
        };
        config.bots.waves = 0;
        config
    }

    fn run(session: &mut Session, ticks: u32) -> Vec<Outgoing> {
        let mut sent = Vec::new();
        for _ in 0..ticks {
            sent.extend(session.tick(Vec::new()));
        }
        sent
    }

    #[test]
    fn test_invalid_config_prevents_session() {
        let config = SessionConfig {
            player_spawn_points: Vec::new(),
            ..SessionConfig::default()
        };
        assert!(matches!(
            Session::new(config),
            Err(ConfigError::MissingSpawnPoints("player"))
        ));
    }

    #[test]
    fn test_connect_sends_connected_then_roster() {
        let mut session = Session::with_seed(config(), 1).unwrap();
        assert!(session.connect(1, b"Alice").accepted);

        let sent = session.drain_outgoing();
        assert!(matches!(
            sent[0].packet,
            Packet::Connected { client_id: 1, is_host: true }
        ));
        assert!(matches!(sent[1].packet, Packet::RosterSnapshot { .. }));
        assert!(matches!(sent[2].packet, Packet::RosterAppend { .. }));
    }

    #[test]
    fn test_only_host_starts_match() {
        let mut session = Session::with_seed(config(), 1).unwrap();
        session.connect(1, b"Host");
        session.connect(2, b"Guest");

        assert!(!session.start_match(2));
        assert_eq!(session.phase(), Phase::Lobby);
        assert!(session.start_match(1));
        assert!(!session.start_match(1));
        assert_eq!(session.phase(), Phase::InGame);
    }

    #[test]
    fn test_players_spawn_after_initial_delay() {
        let mut session = Session::with_seed(config(), 1).unwrap();
        session.connect(1, b"Host");
        session.start_match(1);

        run(&mut session, 4);
        assert!(session.combat().live_entity_of(1).is_none());

        let sent = run(&mut session, 1);
        assert!(session.combat().live_entity_of(1).is_some());
        assert!(sent
            .iter()
            .any(|o| matches!(o.packet, Packet::RespawnNotice { .. }) && o.delivery == Delivery::To(1)));
        assert!(sent
            .iter()
            .any(|o| matches!(o.packet, Packet::ScoreboardJoin { .. })));
    }

    #[test]
    fn test_dead_player_respawns_after_delay() {
        let mut session = Session::with_seed(config(), 1).unwrap();
        session.connect(1, b"Host");
        session.start_match(1);
        run(&mut session, 5);

        let first = session.combat().live_entity_of(1).unwrap().id();
        session.apply_damage(first, 500.0, NON_PLAYER_ID);
        run(&mut session, 1);
        assert_eq!(session.scores().deaths(1), 1);
        assert!(session.combat().live_entity_of(1).is_none());

        // One tick to leave the queue plus the ten tick countdown
        run(&mut session, 10);
        let second = session.combat().live_entity_of(1).unwrap().id();
        assert_ne!(first, second);
        assert_eq!(session.scores().len(), 1);
    }

    #[test]
    fn test_disconnect_cancels_pending_respawn() {
        let mut session = Session::with_seed(config(), 1).unwrap();
        session.connect(1, b"Host");
        session.connect(2, b"Guest");
        session.start_match(1);
        run(&mut session, 5);

        let guest = session.combat().live_entity_of(2).unwrap().id();
        session.apply_damage(guest, 500.0, 1);
        run(&mut session, 2);
        assert_eq!(session.scores().kills(1), 1);
        assert!(session.respawns().is_waiting(2));

        session.disconnect(2);
        assert!(!session.respawns().is_waiting(2));
        run(&mut session, 20);
        assert!(session.combat().live_entity_of(2).is_none());
        assert!(session.scores().get(2).is_none());
    }

    #[test]
    fn test_resend_welcome_only_reaches_that_client() {
        let mut session = Session::with_seed(config(), 1).unwrap();
        session.connect(1, b"Host");
        session.connect(2, b"Guest");
        session.drain_outgoing();

        assert!(session.resend_welcome(1));
        let sent = session.drain_outgoing();
        assert!(sent.iter().all(|o| o.delivery == Delivery::To(1)));
        assert!(matches!(
            sent[0].packet,
            Packet::Connected { client_id: 1, is_host: true }
        ));
        assert!(matches!(&sent[1].packet, Packet::RosterSnapshot { entries } if entries.len() == 2));
        assert!(!session.is_torn_down());
        assert_eq!(session.roster().len(), 2);

        assert!(!session.resend_welcome(9));
        assert!(session.drain_outgoing().is_empty());
    }

    #[test]
    fn test_host_disconnect_tears_down() {
        let mut session = Session::with_seed(config(), 1).unwrap();
        session.connect(1, b"Host");
        session.connect(2, b"Guest");
        session.drain_outgoing();

        let dropped = session.disconnect(1);
        assert_eq!(dropped, vec![1, 2]);
        assert!(session.is_torn_down());

        let sent = session.drain_outgoing();
        assert_eq!(sent.len(), 1);
        assert!(matches!(sent[0].packet, Packet::SessionTeardown));
        assert!(!session.connect(3, b"Late").accepted);
    }

    #[test]
    fn test_late_joiner_gets_match_state() {
        let mut session = Session::with_seed(config(), 1).unwrap();
        session.connect(1, b"Host");
        session.start_match(1);
        run(&mut session, 5);

        session.connect(2, b"Late");
        let sent = session.drain_outgoing();
        let to_late: Vec<&Packet> = sent
            .iter()
            .filter(|o| o.delivery == Delivery::To(2))
            .map(|o| &o.packet)
            .collect();
        assert!(to_late.iter().any(|p| matches!(p, Packet::MatchStarted)));
        assert!(to_late
            .iter()
            .any(|p| matches!(p, Packet::ScoreboardSnapshot { lines } if lines.len() == 1)));
        assert!(session.respawns().is_waiting(2));

        run(&mut session, 11);
        assert!(session.combat().live_entity_of(2).is_some());
    }

    #[test]
    fn test_movement_is_clamped_to_arena() {
        let mut config = config();
        config.arena_half_extent = 1.0;
        let mut session = Session::with_seed(config, 1).unwrap();
        session.connect(1, b"Host");
        session.start_match(1);
        run(&mut session, 5);

        session.tick(vec![(
            1,
            Intent::Move {
                direction: Vec3::new(1.0, 0.0, 0.0),
            },
        )]);
        run(&mut session, 20);

        let position = session.combat().live_entity_of(1).unwrap().position();
        assert_eq!(position.x, 1.0);
    }

    #[test]
    fn test_shot_damages_player_in_line() {
        let mut config = config();
        config.player_spawn_points = vec![Vec3::new(0.0, 0.0, 0.0)];
        let mut session = Session::with_seed(config, 1).unwrap();
        session.connect(1, b"Host");
        session.connect(2, b"Guest");
        session.start_match(1);
        run(&mut session, 5);

        // Both spawned on the same point; walk the guest away first
        session.tick(vec![(
            2,
            Intent::Move {
                direction: Vec3::new(0.0, 0.0, 1.0),
            },
        )]);
        run(&mut session, 10);
        session.tick(vec![(2, Intent::Move { direction: Vec3::ZERO })]);

        let guest = session.combat().live_entity_of(2).unwrap().position();
        let target = guest + Vec3::UP * 1.1;
        session.tick(vec![(1, Intent::Shoot { target })]);

        let health = session.combat().live_entity_of(2).unwrap().vitals().current_health;
        assert_eq!(health, 90.0);
    }

    #[test]
    fn test_bots_spawn_in_waves() {
        let mut config = config();
        config.bots.waves = 1;
        config.bots.bots_per_wave = 2;
        config.bots.wave_delay_secs = 0.2;
        let mut session = Session::with_seed(config, 1).unwrap();
        session.connect(1, b"Host");
        session.start_match(1);

        run(&mut session, 2);
        assert_eq!(session.agent_count(), 2);
        assert_eq!(session.bots().waves_remaining(), 0);
    }
}
