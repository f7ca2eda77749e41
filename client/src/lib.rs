//! # Arena Session Client
//!
//! The observer half of the arena session. A client connects with a
//! nickname, receives projections of the authority's state (roster,
//! scoreboard, its own health and kill count, world snapshots) and sends
//! sequenced intents back. It never decides anything on its own: every
//! value shown comes from the authority.
//!
//! ## Module Organization
//!
//! ### State Module (`state`)
//! Applies authority messages idempotently:
//! - Roster snapshot/append/remove merging
//! - Monotonic scoreboard counters
//! - Stale world snapshot rejection
//! - Local teardown when the session ends
//!
//! ### Roster Module (`roster`)
//! The observer roster on its own, order-tolerant and duplicate-safe.
//!
//! ### Events Module (`events`)
//! Republishes state changes on a local event bus so presentation code can
//! subscribe instead of polling.
//!
//! ### Input Module (`input`)
//! Sequence numbering for intents, movement keep-alives and a random
//! wandering driver for headless play.
//!
//! ### Network Module (`network`)
//! The UDP loop tying the pieces together.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::Client;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = Client::new("127.0.0.1:8080", "Alice".to_string(), true, None, false).await?;
//!     client.run().await?;
//!     Ok(())
//! }
//! ```

pub mod events;
pub mod input;
pub mod network;
pub mod roster;
pub mod state;
