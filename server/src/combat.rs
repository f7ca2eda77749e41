//! Authoritative health, death and kill attribution
//!
//! Anything that can be hurt implements [`Damageable`]. The authority keeps
//! every live instance in one table keyed by [`EntityId`] and is the only
//! place health ever changes. Health is clamped to `[0, max]` and an entity
//! dies at most once; a respawn is a brand new instance with a new id.
//!
//! Death does two things. Right away the entity turns terminal (tagged dead,
//! name suffixed) and the death/kill events go out on the server bus. The
//! remains are destroyed after a grace delay so observers can still render
//! the corpse.

use crate::events::ServerEvent;
use crate::outbox::Outbox;
use crate::timers::{Tick, Timers};
use log::{debug, info, warn};
use shared::{ClientId, EntityId, EntityKind, EntitySnapshot, EventBus, Packet, Role, Vec3, NON_PLAYER_ID};
use std::collections::{BTreeMap, HashMap};

const DEAD_SUFFIX: &str = " DEAD";

#[derive(Debug, Clone, PartialEq)]
pub struct Vitals {
    pub max_health: f32,
    pub current_health: f32,
    pub alive: bool,
    pub last_attacker: Option<ClientId>,
    pub terminal: bool,
}

impl Vitals {
    pub fn new(max_health: f32) -> Self {
        Self {
            max_health,
            current_health: max_health,
            alive: true,
            last_attacker: None,
            terminal: false,
        }
    }

    fn take_damage(&mut self, amount: f32, source: ClientId) -> DamageOutcome {
        if !self.alive || self.current_health <= 0.0 {
            return DamageOutcome::ignored(self.current_health);
        }

        // f32::max ignores NaN, so NaN becomes 0
        let amount = amount.max(0.0);
        self.current_health = (self.current_health - amount).clamp(0.0, self.max_health);
        // Non-player hits never displace the last credited attacker
        if source != NON_PLAYER_ID {
            self.last_attacker = Some(source);
        }

        let died = self.current_health <= 0.0;
        if died {
            self.alive = false;
            self.terminal = true;
        }

        DamageOutcome {
            applied: true,
            health: self.current_health,
            died,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DamageOutcome {
    pub applied: bool,
    pub health: f32,
    pub died: bool,
}

impl DamageOutcome {
    fn ignored(health: f32) -> Self {
        Self {
            applied: false,
            health,
            died: false,
        }
    }
}

/// Capability to receive damage
pub trait Damageable {
    fn vitals(&self) -> &Vitals;
    fn vitals_mut(&mut self) -> &mut Vitals;

    /// Called once when health first reaches zero
    fn on_death(&mut self) {}

    fn apply_damage(&mut self, amount: f32, source: ClientId) -> DamageOutcome {
        let outcome = self.vitals_mut().take_damage(amount, source);
        if outcome.died {
            self.on_death();
        }
        outcome
    }

    fn is_alive(&self) -> bool {
        self.vitals().alive
    }
}

#[derive(Debug, Clone)]
pub struct PlayerEntity {
    pub id: EntityId,
    pub owner: ClientId,
    pub name: String,
    pub position: Vec3,
    pub aim: Vec3,
    vitals: Vitals,
}

impl Damageable for PlayerEntity {
    fn vitals(&self) -> &Vitals {
        &self.vitals
    }

    fn vitals_mut(&mut self) -> &mut Vitals {
        &mut self.vitals
    }

    fn on_death(&mut self) {
        self.name.push_str(DEAD_SUFFIX);
    }
}

#[derive(Debug, Clone)]
pub struct NonPlayerEntity {
    pub id: EntityId,
    pub name: String,
    pub position: Vec3,
    pub aim: Vec3,
    vitals: Vitals,
}

impl Damageable for NonPlayerEntity {
    fn vitals(&self) -> &Vitals {
        &self.vitals
    }

    fn vitals_mut(&mut self) -> &mut Vitals {
        &mut self.vitals
    }

    fn on_death(&mut self) {
        self.name.push_str(DEAD_SUFFIX);
        info!("[{}] Died", self.name);
    }
}

#[derive(Debug, Clone)]
pub enum Combatant {
    Player(PlayerEntity),
    NonPlayer(NonPlayerEntity),
}

impl Combatant {
    pub fn id(&self) -> EntityId {
        match self {
            Combatant::Player(p) => p.id,
            Combatant::NonPlayer(n) => n.id,
        }
    }

    pub fn owner(&self) -> Option<ClientId> {
        match self {
            Combatant::Player(p) => Some(p.owner),
            Combatant::NonPlayer(_) => None,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Combatant::Player(p) => &p.name,
            Combatant::NonPlayer(n) => &n.name,
        }
    }

    pub fn position(&self) -> Vec3 {
        match self {
            Combatant::Player(p) => p.position,
            Combatant::NonPlayer(n) => n.position,
        }
    }

    pub fn aim(&self) -> Vec3 {
        match self {
            Combatant::Player(p) => p.aim,
            Combatant::NonPlayer(n) => n.aim,
        }
    }

    fn body_mut(&mut self) -> (&mut Vec3, &mut Vec3) {
        match self {
            Combatant::Player(p) => (&mut p.position, &mut p.aim),
            Combatant::NonPlayer(n) => (&mut n.position, &mut n.aim),
        }
    }

    pub fn as_damageable(&self) -> &dyn Damageable {
        match self {
            Combatant::Player(p) => p,
            Combatant::NonPlayer(n) => n,
        }
    }

    pub fn as_damageable_mut(&mut self) -> &mut dyn Damageable {
        match self {
            Combatant::Player(p) => p,
            Combatant::NonPlayer(n) => n,
        }
    }

    pub fn vitals(&self) -> &Vitals {
        self.as_damageable().vitals()
    }

    pub fn is_alive(&self) -> bool {
        self.vitals().alive
    }

    pub fn snapshot(&self) -> EntitySnapshot {
        EntitySnapshot {
            id: self.id(),
            kind: match self.owner() {
                Some(owner) => EntityKind::Player { owner },
                None => EntityKind::NonPlayer,
            },
            position: self.position(),
            aim: self.aim(),
            alive: self.is_alive(),
        }
    }
}

/// Picks who gets credit for a kill
///
/// `supplied` is the source passed with the killing blow. The sentinel never
/// earns credit. A supplied source that disagrees with the recorded last
/// attacker wins, with a warning.
pub fn resolve_killer(supplied: ClientId, last_attacker: Option<ClientId>) -> Option<ClientId> {
    if supplied == NON_PLAYER_ID {
        return None;
    }
    match last_attacker {
        Some(recorded) if recorded != supplied => {
            warn!(
                "Kill attribution mismatch: source {} but last attacker {}, crediting {}",
                supplied, recorded, supplied
            );
            Some(supplied)
        }
        Some(recorded) => Some(recorded),
        None => Some(supplied),
    }
}

pub struct CombatAuthority {
    role: Role,
    max_health: f32,
    corpse_grace: Tick,
    entities: BTreeMap<EntityId, Combatant>,
    /// Most recent instance per owner
    players: HashMap<ClientId, EntityId>,
    next_entity_id: EntityId,
    destructions: Timers<EntityId>,
    events: EventBus<ServerEvent>,
}

impl CombatAuthority {
    pub fn new(role: Role, max_health: f32, corpse_grace: Tick, events: EventBus<ServerEvent>) -> Self {
        Self {
            role,
            max_health,
            corpse_grace,
            entities: BTreeMap::new(),
            players: HashMap::new(),
            next_entity_id: 1,
            destructions: Timers::new(),
            events,
        }
    }

    fn allocate_id(&mut self) -> EntityId {
        let id = self.next_entity_id;
        self.next_entity_id = self.next_entity_id.wrapping_add(1).max(1);
        id
    }

    /// Creates a fresh player instance at full health
    ///
    /// The owner is told its health right away. Any previous instance the
    /// owner still has stays in the table until its own destruction fires.
    pub fn spawn_player(
        &mut self,
        owner: ClientId,
        name: String,
        position: Vec3,
        outbox: &mut Outbox,
    ) -> Option<EntityId> {
        if !self.role.is_authority() {
            debug!("Ignoring player spawn for {} on a non-authority", owner);
            return None;
        }
        if owner == NON_PLAYER_ID {
            warn!("Refusing to spawn a player entity for the non-player id");
            return None;
        }

        let id = self.allocate_id();
        self.entities.insert(
            id,
            Combatant::Player(PlayerEntity {
                id,
                owner,
                name,
                position,
                aim: Vec3::FORWARD,
                vitals: Vitals::new(self.max_health),
            }),
        );
        self.players.insert(owner, id);

        self.restore_full_health(id, outbox);
        self.events.publish(ServerEvent::PlayerSpawned {
            client_id: owner,
            entity_id: id,
        });
        info!("Spawned entity {} for client {} at {:?}", id, owner, position);
        Some(id)
    }

    pub fn spawn_non_player(&mut self, name: String, position: Vec3) -> Option<EntityId> {
        if !self.role.is_authority() {
            return None;
        }

        let id = self.allocate_id();
        self.entities.insert(
            id,
            Combatant::NonPlayer(NonPlayerEntity {
                id,
                name,
                position,
                aim: Vec3::FORWARD,
                vitals: Vitals::new(self.max_health),
            }),
        );
        debug!("Spawned non-player entity {} at {:?}", id, position);
        Some(id)
    }

    /// Applies a hit to `target` on behalf of `source`
    ///
    /// Unknown or already dead targets are left untouched. A killing blow
    /// schedules destruction `corpse_grace` ticks after `now`.
    pub fn apply_damage(
        &mut self,
        target: EntityId,
        amount: f32,
        source: ClientId,
        now: Tick,
        outbox: &mut Outbox,
    ) -> DamageOutcome {
        if !self.role.is_authority() {
            debug!("Ignoring damage to {} on a non-authority", target);
            return DamageOutcome::ignored(0.0);
        }
        let Some(entity) = self.entities.get_mut(&target) else {
            warn!("Damage for unknown entity {}", target);
            return DamageOutcome::ignored(0.0);
        };

        let outcome = entity.as_damageable_mut().apply_damage(amount, source);
        if !outcome.applied {
            debug!("Damage to dead entity {} ignored", target);
            return outcome;
        }

        let owner = entity.owner();
        let last_attacker = entity.vitals().last_attacker;
        if let Some(owner) = owner {
            outbox.send_to(owner, Packet::HealthChanged { health: outcome.health });
        }

        if outcome.died {
            self.destructions.schedule(now + self.corpse_grace, target);
            if let Some(victim) = owner {
                self.events.publish(ServerEvent::PlayerDied { victim });
            }
            if let Some(killer) = resolve_killer(source, last_attacker) {
                self.events.publish(ServerEvent::PlayerKilled { killer });
            }
        }

        outcome
    }

    /// Tops a live entity back up to max health
    ///
    /// A player's owner is sent the new value. Dead entities stay dead; a
    /// respawn goes through [`CombatAuthority::spawn_player`] instead, which
    /// uses this to announce the fresh instance's health.
    pub fn restore_full_health(&mut self, target: EntityId, outbox: &mut Outbox) -> bool {
        if !self.role.is_authority() {
            return false;
        }
        let Some(entity) = self.entities.get_mut(&target) else {
            warn!("Heal for unknown entity {}", target);
            return false;
        };
        if !entity.is_alive() {
            return false;
        }

        let vitals = entity.as_damageable_mut().vitals_mut();
        vitals.current_health = vitals.max_health;
        let health = vitals.current_health;
        if let Some(owner) = entity.owner() {
            outbox.send_to(owner, Packet::HealthChanged { health });
        }
        true
    }

    /// Removes every instance owned by a departing client, with no death event
    pub fn despawn_owned_by(&mut self, owner: ClientId) -> usize {
        let doomed: Vec<EntityId> = self
            .entities
            .values()
            .filter(|e| e.owner() == Some(owner))
            .map(Combatant::id)
            .collect();
        for id in &doomed {
            self.entities.remove(id);
        }
        self.destructions.cancel_where(|id| doomed.contains(id));
        self.players.remove(&owner);
        doomed.len()
    }

    /// Destroys every corpse whose grace delay has passed
    pub fn destroy_due(&mut self, now: Tick) -> Vec<EntityId> {
        let due = self.destructions.pop_due(now);
        for id in &due {
            if let Some(entity) = self.entities.remove(id) {
                debug!("Destroyed {}", entity.name());
                if let Some(owner) = entity.owner() {
                    if self.players.get(&owner) == Some(id) {
                        self.players.remove(&owner);
                    }
                }
            }
        }
        due
    }

    pub fn set_position(&mut self, id: EntityId, position: Vec3) {
        if let Some(entity) = self.entities.get_mut(&id) {
            *entity.body_mut().0 = position;
        }
    }

    pub fn set_aim(&mut self, id: EntityId, aim: Vec3) {
        if let Some(entity) = self.entities.get_mut(&id) {
            *entity.body_mut().1 = aim;
        }
    }

    /// The owner's current instance, if it is alive
    pub fn live_entity_of(&self, owner: ClientId) -> Option<&Combatant> {
        self.players
            .get(&owner)
            .and_then(|id| self.entities.get(id))
            .filter(|e| e.is_alive())
    }

    pub fn get(&self, id: EntityId) -> Option<&Combatant> {
        self.entities.get(&id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Combatant> {
        self.entities.values()
    }

    pub fn snapshots(&self) -> Vec<EntitySnapshot> {
        self.entities.values().map(Combatant::snapshot).collect()
    }

    pub fn clear(&mut self) {
        self.entities.clear();
        self.players.clear();
        self.destructions.clear();
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
