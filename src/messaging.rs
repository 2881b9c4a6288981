//! Outbound messaging
//!
//! The engine speaks through [`Messaging`], which is fire-and-forget. The
//! production implementation, [`OutboundRouter`], queues each message on the
//! per-network channel of the runner that owns the connection; the runner
//! drains it into its transport.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Queue depth per network before messages are dropped.
pub const OUTBOUND_QUEUE_DEPTH: usize = 256;

/// A message waiting to be written to a network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Message to a channel.
    Announce {
        /// Target channel.
        channel: String,
        /// Text.
        text: String,
    },
    /// Private notice to one user.
    Notify {
        /// Target nick.
        user: String,
        /// Text.
        text: String,
    },
}

impl Outbound {
    /// The message text.
    pub fn text(&self) -> &str {
        match self {
            Outbound::Announce { text, .. } | Outbound::Notify { text, .. } => text,
        }
    }
}

/// Sends text to channels and users.
pub trait Messaging: Send + Sync {
    /// Say something in a channel.
    fn announce(&self, network: &str, channel: &str, text: &str);

    /// Send a private notice to a user.
    fn notify(&self, network: &str, user: &str, text: &str);
}

/// Routes messages to per-network queues.
#[derive(Debug, Default)]
pub struct OutboundRouter {
    queues: RwLock<BTreeMap<String, mpsc::Sender<Outbound>>>,
}

impl OutboundRouter {
    /// Router with no networks attached.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a network, replacing any previous queue, and hand back the
    /// receiving end for its runner.
    pub fn attach(&self, network: &str) -> mpsc::Receiver<Outbound> {
        let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE_DEPTH);
        self.queues.write().insert(network.to_string(), tx);
        rx
    }

    /// Detach a network; later messages for it are dropped.
    pub fn detach(&self, network: &str) {
        self.queues.write().remove(network);
    }

    fn route(&self, network: &str, message: Outbound) {
        let queues = self.queues.read();
        let Some(tx) = queues.get(network) else {
            debug!(network, "no runner attached, message dropped");
            return;
        };
        if let Err(e) = tx.try_send(message) {
            warn!(network, error = %e, "outbound queue rejected message");
        }
    }
}

impl Messaging for OutboundRouter {
    fn announce(&self, network: &str, channel: &str, text: &str) {
        self.route(
            network,
            Outbound::Announce {
                channel: channel.to_string(),
                text: text.to_string(),
            },
        );
    }

    fn notify(&self, network: &str, user: &str, text: &str) {
        self.route(
            network,
            Outbound::Notify {
                user: user.to_string(),
                text: text.to_string(),
            },
        );
    }
}

/// Captures every message for assertions.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingMessenger {
    sent: parking_lot::Mutex<Vec<(String, Outbound)>>,
}

#[cfg(test)]
impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything sent so far, in order.
    pub fn sent(&self) -> Vec<(String, Outbound)> {
        self.sent.lock().clone()
    }

    /// Texts sent so far, in order.
    pub fn texts(&self) -> Vec<String> {
        self.sent.lock().iter().map(|(_, m)| m.text().to_string()).collect()
    }

    /// Notices sent to one user.
    pub fn notices_to(&self, user: &str) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter_map(|(_, m)| match m {
                Outbound::Notify { user: u, text } if u == user => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    /// Forget everything recorded.
    pub fn clear(&self) {
        self.sent.lock().clear();
    }
}

#[cfg(test)]
impl Messaging for RecordingMessenger {
    fn announce(&self, network: &str, channel: &str, text: &str) {
        self.sent.lock().push((
            network.to_string(),
            Outbound::Announce {
                channel: channel.to_string(),
                text: text.to_string(),
            },
        ));
    }

    fn notify(&self, network: &str, user: &str, text: &str) {
        self.sent.lock().push((
            network.to_string(),
            Outbound::Notify {
                user: user.to_string(),
                text: text.to_string(),
            },
        ));
    }
}
