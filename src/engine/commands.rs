//! Chat command parsing and dispatch.
//!
//! A command is a channel message starting with `!`. The first word picks
//! the command (case-insensitive, with a few aliases); the rest are
//! whitespace-separated arguments. Extra arguments are ignored.

use std::str::FromStr;

use thiserror::Error;
use tracing::{debug, instrument};

use super::{Actor, GameEngine};
use crate::core::key::ChannelKey;

/// Leaderboard ordering for `!topduck`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LeaderboardSort {
    /// Total XP.
    #[default]
    Xp,
    /// Ducks shot plus befriended.
    Ducks,
    /// XP per duck shot or befriended.
    XpRatio,
}

impl LeaderboardSort {
    /// Parse the optional `!topduck` argument; anything unknown sorts by XP.
    pub fn from_arg(arg: Option<&str>) -> Self {
        match arg.map(str::to_ascii_lowercase).as_deref() {
            Some("duck" | "ducks") => Self::Ducks,
            Some("xpratio" | "ratio") => Self::XpRatio,
            _ => Self::Xp,
        }
    }

    /// Label used in the leaderboard header.
    pub fn label(self) -> &'static str {
        match self {
            Self::Xp => "total xp",
            Self::Ducks => "ducks",
            Self::XpRatio => "xp ratio",
        }
    }
}

/// A parsed chat command.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum Command {
    Bang,
    Bef,
    Reload,
    Shop { item: Option<String>, target: Option<String> },
    DuckStats { target: Option<String> },
    TopDuck { sort: LeaderboardSort },
    LastDuck,
    Egg { target: Option<String> },
    NextDuck,
    SpawnDuck { count: Option<u32> },
    SpawnGold,
    Rearm { target: String },
    Disarm { target: String },
    Clear { channel: Option<String> },
    Restore { backup_id: String },
    Backups { channel: Option<String> },
}

/// Why a line is not a runnable command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// The line does not start with `!`.
    #[error("not a command")]
    NotACommand,

    /// The command word is not known.
    #[error("unknown command: {0}")]
    Unknown(String),

    /// A required argument is missing.
    #[error("!{command} needs <{argument}>")]
    MissingArgument {
        /// Command word.
        command: &'static str,
        /// Missing argument name.
        argument: &'static str,
    },
}

impl Command {
    /// Only admins and owners may run this command.
    pub fn is_admin(&self) -> bool {
        matches!(
            self,
            Command::NextDuck
                | Command::SpawnDuck { .. }
                | Command::SpawnGold
                | Command::Rearm { .. }
                | Command::Disarm { .. }
                | Command::Clear { .. }
                | Command::Restore { .. }
                | Command::Backups { .. }
        )
    }
}

fn required(
    arg: Option<&str>,
    command: &'static str,
    argument: &'static str,
) -> Result<String, CommandError> {
    arg.map(str::to_string)
        .ok_or(CommandError::MissingArgument { command, argument })
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let body = line.trim().strip_prefix('!').ok_or(CommandError::NotACommand)?;
        let mut words = body.split_whitespace();
        let word = words.next().ok_or(CommandError::NotACommand)?.to_ascii_lowercase();
        let first = words.next();
        let second = words.next();
        let owned = |arg: Option<&str>| arg.map(str::to_string);

        let command = match word.as_str() {
            "bang" => Command::Bang,
            "bef" => Command::Bef,
            "reload" => Command::Reload,
            "shop" => Command::Shop {
                item: owned(first),
                target: owned(second),
            },
            "duckstats" => Command::DuckStats { target: owned(first) },
            "topduck" => Command::TopDuck {
                sort: LeaderboardSort::from_arg(first),
            },
            "lastduck" => Command::LastDuck,
            "egg" => Command::Egg { target: owned(first) },
            "nextduck" => Command::NextDuck,
            "spawnduck" | "spawduck" | "spawn" | "sd" => Command::SpawnDuck {
                count: first.and_then(|n| n.parse().ok()),
            },
            "spawngold" | "spawng" | "sg" => Command::SpawnGold,
            "rearm" => Command::Rearm {
                target: required(first, "rearm", "nick")?,
            },
            "disarm" => Command::Disarm {
                target: required(first, "disarm", "nick")?,
            },
            "clear" => Command::Clear { channel: owned(first) },
            "restore" => Command::Restore {
                backup_id: required(first, "restore", "backup_id")?,
            },
            "backups" => Command::Backups { channel: owned(first) },
            _ => return Err(CommandError::Unknown(word.clone())),
        };
        Ok(command)
    }
}

impl GameEngine {
    /// Run one channel message. Lines that are not commands are ignored.
    #[instrument(skip(self, line), level = "debug")]
    pub fn handle_line(&self, network: &str, channel: &str, nick: &str, authenticated: bool, line: &str) {
        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(CommandError::NotACommand) => return,
            Err(e) => {
                debug!(error = %e, "command ignored");
                return;
            }
        };
        let key = ChannelKey::new(network, channel);
        let actor = Actor::new(nick, authenticated);
        self.dispatch(&key, &actor, command);
    }

    /// Run a parsed command for `actor` in the channel `key`.
    pub fn dispatch(&self, key: &ChannelKey, actor: &Actor, command: Command) {
        match command {
            Command::Bang => self.on_shoot(key, actor),
            Command::Bef => self.on_befriend(key, actor),
            Command::Reload => self.on_reload(key, actor),
            Command::Shop { item, target } => {
                self.on_shop(key, actor, item.as_deref(), target.as_deref())
            }
            Command::DuckStats { target } => self.on_stats(key, actor, target.as_deref()),
            Command::TopDuck { sort } => self.on_leaderboard(key, sort),
            Command::LastDuck => self.on_lastduck(key, actor),
            Command::Egg { target } => self.on_egg(key, actor, target.as_deref()),
            Command::NextDuck => self.on_nextduck(key, actor),
            Command::SpawnDuck { count } => self.on_admin_spawn(key, actor, count),
            Command::SpawnGold => self.on_admin_spawn_gold(key, actor),
            Command::Rearm { target } => self.on_rearm(key, actor, &target),
            Command::Disarm { target } => self.on_disarm(key, actor, &target),
            Command::Clear { channel } => {
                let scope = channel.map_or_else(|| key.clone(), |c| ChannelKey::new(key.network(), &c));
                self.on_admin_clear(&scope, actor)
            }
            Command::Restore { backup_id } => self.on_admin_restore(key, actor, &backup_id),
            Command::Backups { channel } => self.on_admin_backups(key, actor, channel.as_deref()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::harness::*;
    use super::*;
    use crate::persistence::Persistence;

    #[test]
    fn test_parse_player_commands() {
        assert_eq!("!bang".parse(), Ok(Command::Bang));
        assert_eq!("  !BEF  ".parse(), Ok(Command::Bef));
        assert_eq!(
            "!shop 3 bob extra".parse(),
            Ok(Command::Shop {
                item: Some("3".into()),
                target: Some("bob".into())
            })
        );
        assert_eq!("!duckstats".parse(), Ok(Command::DuckStats { target: None }));
        assert_eq!(
            "!topduck duck".parse(),
            Ok(Command::TopDuck {
                sort: LeaderboardSort::Ducks
            })
        );
        assert_eq!(
            "!topduck whatever".parse(),
            Ok(Command::TopDuck {
                sort: LeaderboardSort::Xp
            })
        );
    }

    #[test]
    fn test_parse_aliases_and_arguments() {
        assert_eq!("!sd 3".parse(), Ok(Command::SpawnDuck { count: Some(3) }));
        assert_eq!("!spawn lots".parse(), Ok(Command::SpawnDuck { count: None }));
        assert_eq!("!sg".parse(), Ok(Command::SpawnGold));
        assert!(Command::SpawnGold.is_admin());
        assert!(!Command::Bang.is_admin());
        assert_eq!(
            "!rearm".parse::<Command>(),
            Err(CommandError::MissingArgument {
                command: "rearm",
                argument: "nick"
            })
        );
    }

    #[test]
    fn test_parse_rejects() {
        assert_eq!("hello".parse::<Command>(), Err(CommandError::NotACommand));
        assert_eq!("!".parse::<Command>(), Err(CommandError::NotACommand));
        assert_eq!("!quack".parse::<Command>(), Err(CommandError::Unknown("quack".into())));
    }

    #[test]
    fn test_handle_line_dispatches() {
        let h = Harness::new();
        h.engine.handle_line(NET, CHAN, "boss", true, "!sg");
        assert_eq!(h.engine.duck_count(&h.key), 1);

        h.engine.handle_line(NET, CHAN, "alice", true, "just chatting");
        h.engine.handle_line(NET, CHAN, "alice", true, "!nosuchthing");
        h.engine.handle_line(NET, "#DUCKS", "alice", true, "!lastduck");
        assert_eq!(h.last_text(), "alice > There is currently a duck in #ducks.");
    }

    #[test]
    fn test_clear_other_channel() {
        let h = Harness::new();
        let other = ChannelKey::new(NET, "#other");
        h.store.get_record("carol", &other).unwrap();
        h.engine.handle_line(NET, CHAN, "boss", true, "!clear #other");
        let notice = h.messenger.notices_to("boss").pop().unwrap();
        assert!(notice.starts_with("Cleared all data for #other (1 players affected)"));
    }
}
