//! # Arena Session Server
//!
//! The authoritative half of a small networked arena shooter. One process
//! hosts the session: it approves connections, keeps the canonical roster,
//! owns every combat entity's health, schedules respawns, keeps score and
//! drives non-player agents. Observers only ever receive projections of this
//! state.
//!
//! ## Replication Model
//!
//! ### Snapshot Plus Deltas
//! A joining client is sent the full roster addressed to it alone, and every
//! client (the joiner included) is sent an append with just the new entry.
//! Observers apply both idempotently, so they converge no matter which
//! arrives first. Removes go to everyone still connected.
//!
//! ### Audiences
//! Every outgoing message names its audience as a [`outbox::Delivery`]:
//! one client (health, HUD kill count, respawn notice, joiner snapshots),
//! everyone (roster deltas, scoreboard, world state), or everyone but one
//! (the remove for a departing client). The network layer resolves
//! audiences to addresses before it forgets any client.
//!
//! ### Teardown
//! When the host leaves, or the server is stopped, the session sends a
//! single `SessionTeardown`. No per-client removes go out; each observer
//! clears its own state.
//!
//! ## Architecture Design
//!
//! ### Single Authority Loop
//! All canonical mutations happen on one loop that owns the [`session::Session`].
//! Network tasks (receiver, sender, timeout checker) talk to it through
//! unbounded channels. Intents are ordered per client by sequence number.
//!
//! ### Services and Events
//! Roster, combat, respawn, score and targeting are plain structs owned by
//! the session. Combat publishes deaths and kills on an event bus; the
//! session drains that bus every tick and routes events into scoring and
//! the respawn queue.
//!
//! ### Deferred Work
//! Delays (respawn countdowns, corpse destruction, bot waves, the initial
//! spawn) are tick-stamped [`timers::Timers`] entries rather than sleeping
//! tasks, so they can be cancelled and always run on the authority loop.
//!
//! ## Module Organization
//!
//! - `config` / `error`: session settings loaded from TOML, startup errors
//! - `client_manager`: connections, addresses, intent queues, timeouts
//! - `roster`: approval gate, host designation, roster replication
//! - `combat`: the `Damageable` capability, health, death, kill attribution
//! - `respawn`: FIFO respawn queue with per-request countdowns
//! - `score`: kill/death records and scoreboard replication
//! - `targeting` / `bots`: agent state machine and wave spawning
//! - `world`: arena bounds and line-of-sight ray tests
//! - `session`: the tick loop tying the services together
//! - `network`: UDP transport and the main event loop
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::SessionConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SessionConfig::default();
//!     let mut server = Server::new("127.0.0.1:8080", config).await?;
//!
//!     // Runs until the host leaves or the process is interrupted
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod bots;
pub mod client_manager;
pub mod combat;
pub mod config;
pub mod error;
pub mod events;
pub mod network;
pub mod outbox;
pub mod respawn;
pub mod roster;
pub mod score;
pub mod session;
pub mod targeting;
pub mod timers;
pub mod world;
