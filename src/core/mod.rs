//! Core primitives
//!
//! Randomness, time and key normalization shared by every game module.
//! Nothing in here knows about ducks.

pub mod clock;
pub mod key;
pub mod rng;

pub use clock::{Clock, SystemClock, Timestamp};
pub use key::ChannelKey;
pub use rng::{Dice, GameRng};
