//! Network Layer
//!
//! Everything that touches a chat network: the [`Transport`] seam, the
//! per-network [`NetworkRunner`] and the engine ticker. Game rules live in
//! `engine/` and `game/`; this layer only moves events in and text out.

pub mod console;
pub mod runner;
pub mod transport;

pub use console::ConsoleTransport;
pub use runner::{run_ticker, NetworkRunner};
pub use transport::{NetworkEvent, Transport, TransportError};
