//! Game Logic Module
//!
//! The duck hunt rules, independent of networks and storage.
//!
//! ## Module Structure
//!
//! - `level`: XP tiers with accuracy, reliability, magazines and penalties
//! - `record`: per-player, per-channel record and field addressing
//! - `duck`: live duck queues per channel
//! - `schedule`: spawn timing, bursts and detector pre-notices
//! - `progression`: XP changes and promotion/demotion settling
//! - `combat`: `!bang`, `!bef` and `!reload` resolution
//! - `shop`: catalog and purchases
//! - `loot`: random drops on a kill
//! - `events`: reply texts

pub mod combat;
pub mod duck;
pub mod events;
pub mod level;
pub mod loot;
pub mod progression;
pub mod record;
pub mod schedule;
pub mod shop;

pub use combat::{ActionOutcome, CombatResolver};
pub use duck::{Duck, DuckPopulation};
pub use events::Reply;
pub use level::{LevelTable, LevelTier};
pub use record::PlayerChannelRecord;
pub use schedule::ChannelSchedule;
pub use shop::{ShopEngine, ShopItem};
