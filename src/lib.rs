//! # Duck Hunt Server
//!
//! Duck hunt game engine for chat networks: ducks spawn in channels, players
//! shoot or befriend them, earn XP, level up and spend XP in a shop.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    DUCK HUNT SERVER                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Primitives                                │
//! │  ├── clock.rs    - Wall clock seam and duration text         │
//! │  ├── key.rs      - Channel keys, nick comparison             │
//! │  └── rng.rs      - Dice seam, Xorshift128+ generator         │
//! │                                                              │
//! │  game/           - Rules (no I/O)                            │
//! │  ├── level.rs    - XP tiers                                  │
//! │  ├── record.rs   - Player channel records                    │
//! │  ├── duck.rs     - Duck population                           │
//! │  ├── schedule.rs - Spawn scheduler                           │
//! │  ├── combat.rs   - Shoot, befriend, reload                   │
//! │  ├── shop.rs     - Shop catalog and purchases                │
//! │  └── loot.rs     - Kill loot                                 │
//! │                                                              │
//! │  persistence/    - Record storage (snapshot, table)          │
//! │  engine/         - Composition root, commands, tick          │
//! │  messaging.rs    - Outbound routing per network              │
//! │  network/        - Transports and per-network runners        │
//! │  config.rs       - TOML configuration                        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency
//!
//! One task per network plus one ticker task share a single
//! [`engine::GameEngine`]. The duck population is the only state touched by
//! more than one path; each read-decide-mutate sequence on it holds one
//! lock. Channels are independent of each other.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod core;
pub mod engine;
pub mod game;
pub mod messaging;
pub mod network;
pub mod persistence;

// Re-export commonly used types
pub use config::GameConfig;
pub use core::key::ChannelKey;
pub use engine::{Actor, GameEngine};
pub use game::record::PlayerChannelRecord;
pub use persistence::Persistence;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
