//! Channel keys
//!
//! All per-channel state (duck queues, schedules, records) is scoped by the
//! network name plus the normalized channel name.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Normalized `(network, channel)` identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChannelKey {
    network: String,
    channel: String,
}

impl ChannelKey {
    /// Build a key, normalizing the channel name.
    pub fn new(network: &str, channel: &str) -> Self {
        Self {
            network: network.to_string(),
            channel: normalize_channel(channel),
        }
    }

    /// Parse a legacy `"network:#channel"` key.
    pub fn parse_legacy(raw: &str) -> Option<Self> {
        let (network, channel) = raw.split_once(':')?;
        if network.is_empty() || channel.trim().is_empty() {
            return None;
        }
        Some(Self::new(network, channel))
    }

    /// Network name.
    pub fn network(&self) -> &str {
        &self.network
    }

    /// Normalized channel name.
    pub fn channel(&self) -> &str {
        &self.channel
    }
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.network, self.channel)
    }
}

/// Trim and lowercase a channel name.
pub fn normalize_channel(channel: &str) -> String {
    channel.trim().to_lowercase()
}

/// Case-insensitive nick comparison, ignoring surrounding whitespace.
pub fn same_nick(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_normalization() {
        let a = ChannelKey::new("libera", "  #Ducks ");
        let b = ChannelKey::new("libera", "#ducks");
        assert_eq!(a, b);
        assert_eq!(a.channel(), "#ducks");
        assert_eq!(a.to_string(), "libera:#ducks");
    }

    #[test]
    fn test_networks_are_distinct() {
        assert_ne!(ChannelKey::new("a", "#x"), ChannelKey::new("b", "#x"));
    }

    #[test]
    fn test_parse_legacy() {
        let key = ChannelKey::parse_legacy("libera:#Ducks").unwrap();
        assert_eq!(key.network(), "libera");
        assert_eq!(key.channel(), "#ducks");
        assert!(ChannelKey::parse_legacy("nonsense").is_none());
        assert!(ChannelKey::parse_legacy(":#x").is_none());
    }

    #[test]
    fn test_same_nick() {
        assert!(same_nick("Alice", " alice"));
        assert!(!same_nick("alice", "bob"));
    }
}
