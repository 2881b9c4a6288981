//! Transport abstraction
//!
//! A transport is one connection to one chat network. It turns the wire
//! protocol into [`NetworkEvent`]s and writes [`Outbound`] messages back.

use std::future::Future;

use thiserror::Error;

use crate::messaging::Outbound;

/// Transport errors. Any error ends the connection and triggers a reconnect.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Socket or stream failure.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection is not open.
    #[error("transport closed")]
    Closed,
}

/// Something the network told us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkEvent {
    /// The server accepted our registration.
    Registered,
    /// A message in a channel.
    Message {
        /// Channel it was said in.
        channel: String,
        /// Sender.
        nick: String,
        /// The network vouches for the sender's identity.
        authenticated: bool,
        /// Message text.
        text: String,
    },
    /// A user joined a channel.
    Join {
        /// Channel.
        channel: String,
        /// Who joined.
        nick: String,
    },
    /// A user left a channel.
    Part {
        /// Channel.
        channel: String,
        /// Who left.
        nick: String,
    },
    /// A user left the network.
    Quit {
        /// Who quit.
        nick: String,
    },
    /// A user changed nick.
    NickChange {
        /// Previous nick.
        old: String,
        /// New nick.
        new: String,
    },
    /// Occupant list of a channel, mode prefixes included.
    Names {
        /// Channel.
        channel: String,
        /// Occupants.
        nicks: Vec<String>,
    },
    /// Any other inbound line.
    Other,
}

/// One connection to a chat network.
pub trait Transport: Send {
    /// Open the connection and start registration.
    fn connect(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Next inbound event; `None` once the server closed the connection.
    /// Must be cancel safe.
    fn next_event(&mut self) -> impl Future<Output = Result<Option<NetworkEvent>, TransportError>> + Send;

    /// Join a channel.
    fn join(&mut self, channel: &str) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Write one message.
    fn send(&mut self, message: Outbound) -> impl Future<Output = Result<(), TransportError>> + Send;
}
