//! Game Replies
//!
//! Text produced by resolving an action. The engine routes public replies to
//! the channel and private ones to the acting player.

/// Where a reply goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Visible to the whole channel.
    Public(String),
    /// Notice to the acting player only.
    Private(String),
}

impl Reply {
    /// The reply text.
    pub fn text(&self) -> &str {
        match self {
            Reply::Public(text) | Reply::Private(text) => text,
        }
    }

    /// Public reply prefixed with the player's nick.
    pub fn to_player(nick: &str, text: impl AsRef<str>) -> Self {
        Reply::Public(format!("{} - {}", nick, text.as_ref()))
    }
}

/// Spawn announcement.
pub const DUCK_ART: &str = "-.,.-'`'-.,.-'`' \\_O<   QUACK";

/// Announcement when a duck leaves without being shot or befriended.
pub const FLY_AWAY: &str = "The duck flies away.     '`'-.,.'`";

/// "Ammo: a/c | Magazines: m/M" weapon summary.
pub fn weapon_status(ammo: u32, capacity: u32, magazines: u32, magazines_max: u32) -> String {
    format!(
        "Ammo: {}/{} | Magazines: {}/{}",
        ammo, capacity, magazines, magazines_max
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_player_prefix() {
        let reply = Reply::to_player("alice", "You are not armed.");
        assert_eq!(reply, Reply::Public("alice - You are not armed.".into()));
        assert_eq!(reply.text(), "alice - You are not armed.");
    }

    #[test]
    fn test_weapon_status() {
        assert_eq!(weapon_status(3, 6, 1, 2), "Ammo: 3/6 | Magazines: 1/2");
    }
}
