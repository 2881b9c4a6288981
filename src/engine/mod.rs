//! Game Engine
//!
//! Composition root. Wires the duck population, the channel schedules and
//! the rule modules to the three collaborators: [`Persistence`],
//! [`Messaging`] and [`Clock`].
//!
//! Entry points come in two flavors:
//! - command handlers (`on_shoot`, `on_shop`, ...) called by a network runner
//!   for each chat command
//! - [`GameEngine::tick`], called at least once per second
//!
//! ## Locking
//!
//! Three mutexes, always taken in this order and never held across a
//! storage or messaging call:
//!
//! ```text
//! channels ──► ducks ──► dice
//! ```
//!
//! The duck mutex covers every read-decide-mutate sequence on the
//! population (capacity check and append, peek and damage and remove,
//! expiry scan and remove).

mod actions;
mod admin;
pub mod commands;
mod reports;
mod tick;

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, info};

use crate::config::{GameConfig, GameSettings};
use crate::core::clock::{Clock, Timestamp};
use crate::core::key::{same_nick, ChannelKey};
use crate::core::rng::Dice;
use crate::game::combat::{Rewards, VictimLookup};
use crate::game::duck::{Duck, DuckPopulation, SpawnRejected};
use crate::game::events::{Reply, DUCK_ART};
use crate::game::level::LevelTable;
use crate::game::record::{FieldValue, PlayerChannelRecord, RecordField, TimedModifier};
use crate::game::schedule::ChannelSchedule;
use crate::messaging::Messaging;
use crate::persistence::Persistence;

pub use commands::{Command, CommandError, LeaderboardSort};
pub use tick::TickReport;

/// The player issuing a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    /// Nick as seen on the network.
    pub nick: String,
    /// The network vouched for the nick.
    pub authenticated: bool,
}

impl Actor {
    /// An actor with the given authentication state.
    pub fn new(nick: &str, authenticated: bool) -> Self {
        Self {
            nick: nick.to_string(),
            authenticated,
        }
    }
}

/// Per-channel runtime state.
#[derive(Debug, Clone)]
struct ChannelState {
    schedule: ChannelSchedule,
    occupants: Vec<String>,
}

/// The duck hunt game engine.
pub struct GameEngine {
    config: GameConfig,
    levels: LevelTable,
    store: Arc<dyn Persistence>,
    messenger: Arc<dyn Messaging>,
    clock: Arc<dyn Clock>,
    channels: Mutex<BTreeMap<ChannelKey, ChannelState>>,
    ducks: Mutex<DuckPopulation>,
    dice: Mutex<Box<dyn Dice>>,
}

impl std::fmt::Debug for GameEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameEngine")
            .field("bot_nick", &self.config.bot_nick)
            .field("channels", &self.channels.lock().len())
            .finish()
    }
}

impl GameEngine {
    /// Build an engine over its collaborators.
    pub fn new(
        config: GameConfig,
        store: Arc<dyn Persistence>,
        messenger: Arc<dyn Messaging>,
        clock: Arc<dyn Clock>,
        dice: Box<dyn Dice>,
    ) -> Self {
        Self {
            config,
            levels: LevelTable::default(),
            store,
            messenger,
            clock,
            channels: Mutex::new(BTreeMap::new()),
            ducks: Mutex::new(DuckPopulation::new()),
            dice: Mutex::new(dice),
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Channels the bot currently hunts in.
    pub fn channels(&self) -> Vec<ChannelKey> {
        self.channels.lock().keys().cloned().collect()
    }

    /// Live ducks in a channel.
    pub fn duck_count(&self, key: &ChannelKey) -> usize {
        self.ducks.lock().count(key)
    }

    // =========================================================================
    // MEMBERSHIP
    // =========================================================================

    /// The bot joined a channel: start its spawn schedule.
    pub fn on_bot_join(&self, network: &str, channel: &str) {
        let key = ChannelKey::new(network, channel);
        let now = self.clock.now();
        let window = self.settings(&key).spawn_window();

        let mut channels = self.channels.lock();
        if channels.contains_key(&key) {
            return;
        }
        let schedule = {
            let mut dice = self.dice.lock();
            ChannelSchedule::start(now, window, dice.as_mut())
        };
        info!(key = %key, due_in = schedule.next_spawn_due - now, "channel scheduled");
        channels.insert(
            key,
            ChannelState {
                schedule,
                occupants: Vec::new(),
            },
        );
    }

    /// The bot left a channel: drop its schedule and its ducks.
    pub fn on_bot_part(&self, network: &str, channel: &str) {
        let key = ChannelKey::new(network, channel);
        let removed = self.channels.lock().remove(&key).is_some();
        let ducks = self.ducks.lock().clear(&key);
        if removed {
            info!(key = %key, ducks, "channel unscheduled");
        }
    }

    /// A user joined a channel.
    pub fn on_user_join(&self, network: &str, channel: &str, nick: &str) {
        let key = ChannelKey::new(network, channel);
        if let Some(state) = self.channels.lock().get_mut(&key) {
            if !state.occupants.iter().any(|o| same_nick(o, nick)) {
                state.occupants.push(nick.to_string());
            }
        }
    }

    /// A user left a channel.
    pub fn on_user_part(&self, network: &str, channel: &str, nick: &str) {
        let key = ChannelKey::new(network, channel);
        if let Some(state) = self.channels.lock().get_mut(&key) {
            state.occupants.retain(|o| !same_nick(o, nick));
        }
    }

    /// A user left the network.
    pub fn on_user_quit(&self, network: &str, nick: &str) {
        for (key, state) in self.channels.lock().iter_mut() {
            if key.network() == network {
                state.occupants.retain(|o| !same_nick(o, nick));
            }
        }
    }

    /// A user changed nick.
    pub fn on_nick_change(&self, network: &str, old: &str, new: &str) {
        for (key, state) in self.channels.lock().iter_mut() {
            if key.network() == network {
                for occupant in state.occupants.iter_mut().filter(|o| same_nick(o, old)) {
                    *occupant = new.to_string();
                }
            }
        }
    }

    /// Full occupant list of a channel (as sent after a join). Mode
    /// prefixes are stripped.
    pub fn on_names(&self, network: &str, channel: &str, nicks: &[String]) {
        let key = ChannelKey::new(network, channel);
        if let Some(state) = self.channels.lock().get_mut(&key) {
            let mut occupants: Vec<String> = Vec::with_capacity(nicks.len());
            for nick in nicks {
                let bare = nick.trim_start_matches(['@', '+', '%', '&', '~']);
                if !bare.is_empty() && !occupants.iter().any(|o| same_nick(o, bare)) {
                    occupants.push(bare.to_string());
                }
            }
            state.occupants = occupants;
        }
    }

    fn occupants(&self, key: &ChannelKey) -> Vec<String> {
        self.channels
            .lock()
            .get(key)
            .map(|s| s.occupants.clone())
            .unwrap_or_default()
    }

    // =========================================================================
    // SHARED HELPERS
    // =========================================================================

    fn settings(&self, key: &ChannelKey) -> GameSettings {
        self.config.settings_for(key.network())
    }

    fn rewards(settings: &GameSettings) -> Rewards {
        Rewards {
            default_xp: settings.default_xp,
            golden_xp: settings.golden_xp,
        }
    }

    fn authenticated(&self, actor: &Actor) -> bool {
        !self.config.require_auth || actor.authenticated
    }

    fn is_admin(&self, network: &str, nick: &str) -> bool {
        self.config.networks.get(network).is_some_and(|n| {
            n.owners.iter().chain(n.admins.iter()).any(|a| same_nick(a, nick))
        })
    }

    fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Load a record, creating it. Storage failures are logged and end the
    /// command.
    fn load(&self, player: &str, key: &ChannelKey) -> Option<PlayerChannelRecord> {
        match self.store.get_record(player, key) {
            Ok(record) => Some(record),
            Err(e) => {
                error!(player, key = %key, error = %e, "failed to load record");
                None
            }
        }
    }

    /// Load a record only if it exists.
    fn find(&self, player: &str, key: &ChannelKey) -> Option<PlayerChannelRecord> {
        match self.store.find_record(player, key) {
            Ok(record) => record,
            Err(e) => {
                error!(player, key = %key, error = %e, "failed to look up record");
                None
            }
        }
    }

    /// Save what changed between `before` and `after`.
    fn persist(&self, player: &str, key: &ChannelKey, before: &PlayerChannelRecord, after: &PlayerChannelRecord) {
        let changes = after.changes_since(before);
        if changes.is_empty() {
            return;
        }
        if let Err(e) = self.store.save_record(player, key, &changes) {
            error!(player, key = %key, error = %e, "failed to save record");
        }
    }

    fn channel_records(&self, key: &ChannelKey) -> Vec<(String, PlayerChannelRecord)> {
        match self.store.channel_records(key) {
            Ok(records) => records,
            Err(e) => {
                error!(key = %key, error = %e, "failed to list channel records");
                Vec::new()
            }
        }
    }

    fn announce(&self, key: &ChannelKey, text: &str) {
        self.messenger.announce(key.network(), key.channel(), text);
    }

    fn notify(&self, key: &ChannelKey, nick: &str, text: &str) {
        self.messenger.notify(key.network(), nick, text);
    }

    fn deliver(&self, key: &ChannelKey, nick: &str, replies: &[Reply]) {
        for reply in replies {
            match reply {
                Reply::Public(text) => self.announce(key, text),
                Reply::Private(text) => self.notify(key, nick, text),
            }
        }
    }

    /// A duck left the channel: every confiscated gun comes back.
    fn clear_confiscations(&self, key: &ChannelKey) {
        let mut returned = 0;
        for (player, record) in self.channel_records(key) {
            if !record.confiscated {
                continue;
            }
            let update = [(RecordField::Confiscated, FieldValue::Bool(false))];
            match self.store.save_record(&player, key, &update) {
                Ok(()) => returned += 1,
                Err(e) => error!(player, key = %key, error = %e, "failed to return confiscated gun"),
            }
        }
        if returned > 0 {
            debug!(key = %key, returned, "confiscations cleared");
        }
    }

    /// Spawn one duck and announce it. `golden` forces the variant.
    fn spawn_duck(&self, key: &ChannelKey, settings: &GameSettings, golden: Option<bool>) -> Result<Duck, SpawnRejected> {
        let now = self.now();
        let duck = {
            let mut ducks = self.ducks.lock();
            match golden {
                Some(is_golden) => ducks.spawn_variant(key, settings.max_ducks, is_golden, now)?,
                None => {
                    let mut dice = self.dice.lock();
                    ducks.spawn(key, settings.max_ducks, settings.gold_ratio, now, dice.as_mut())?
                }
            }
        };
        info!(key = %key, golden = duck.is_golden, "duck spawned");
        self.announce(key, DUCK_ART);
        Ok(duck)
    }

    /// Seconds to the next spawn if one is scheduled.
    fn next_due(&self, key: &ChannelKey) -> Option<Timestamp> {
        self.channels.lock().get(key).map(|s| s.schedule.earliest_due())
    }

    #[cfg(test)]
    fn set_dice(&self, dice: impl Dice + 'static) {
        *self.dice.lock() = Box::new(dice);
    }
}

/// Players of one channel carrying an active mirror, read before a shot
/// takes the duck lock.
#[derive(Debug, Default)]
struct MirrorHolders(Vec<String>);

impl VictimLookup for MirrorHolders {
    fn mirror_active(&self, victim: &str, _key: &ChannelKey, _now: Timestamp) -> bool {
        self.0.iter().any(|holder| same_nick(holder, victim))
    }
}

impl GameEngine {
    fn mirror_holders(&self, key: &ChannelKey, now: Timestamp) -> MirrorHolders {
        MirrorHolders(
            self.channel_records(key)
                .into_iter()
                .filter(|(_, record)| record.is_active(TimedModifier::Mirror, now))
                .map(|(player, _)| player)
                .collect(),
        )
    }
}

// =============================================================================
// TEST HARNESS
// =============================================================================

#[cfg(test)]
pub(crate) mod harness {
    use super::*;
    use crate::config::NetworkConfig;
    use crate::core::clock::ManualClock;
    use crate::core::rng::GameRng;
    use crate::messaging::RecordingMessenger;
    use crate::persistence::TableStore;

    pub const NET: &str = "net";
    pub const CHAN: &str = "#ducks";
    pub const START: f64 = 1_000_000.0;

    pub struct Harness {
        pub engine: GameEngine,
        pub clock: Arc<ManualClock>,
        pub messenger: Arc<RecordingMessenger>,
        pub store: Arc<TableStore>,
        pub key: ChannelKey,
    }

    impl Harness {
        pub fn new() -> Self {
            Self::with_config(GameConfig::default())
        }

        pub fn with_config(mut config: GameConfig) -> Self {
            config.bot_nick = "DuckBot".into();
            config.networks.entry(NET.into()).or_insert_with(|| NetworkConfig {
                channels: vec![CHAN.into()],
                owners: vec!["boss".into()],
                admins: vec!["mod".into()],
                ..NetworkConfig::default()
            });
            let clock = Arc::new(ManualClock::new(START));
            let messenger = Arc::new(RecordingMessenger::new());
            let store = Arc::new(TableStore::new(LevelTable::default()));
            let engine = GameEngine::new(
                config,
                store.clone(),
                messenger.clone(),
                clock.clone(),
                Box::new(GameRng::new(7)),
            );
            engine.on_bot_join(NET, CHAN);
            engine.on_names(
                NET,
                CHAN,
                &["@DuckBot".into(), "alice".into(), "+bob".into(), "boss".into()],
            );
            Self {
                engine,
                clock,
                messenger,
                store,
                key: ChannelKey::new(NET, CHAN),
            }
        }

        pub fn actor(nick: &str) -> Actor {
            Actor::new(nick, true)
        }

        pub fn record(&self, nick: &str) -> PlayerChannelRecord {
            self.store.get_record(nick, &self.key).unwrap()
        }

        pub fn put(&self, nick: &str, record: &PlayerChannelRecord) {
            let before = self.store.get_record(nick, &self.key).unwrap();
            self.store
                .save_record(nick, &self.key, &record.changes_since(&before))
                .unwrap();
        }

        pub fn spawn(&self, golden: bool) {
            let settings = self.engine.settings(&self.key);
            self.engine.spawn_duck(&self.key, &settings, Some(golden)).unwrap();
        }

        pub fn script(&self, dice: crate::core::rng::ScriptedDice) {
            self.engine.set_dice(dice);
        }

        pub fn last_text(&self) -> String {
            self.messenger.texts().last().cloned().unwrap_or_default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::harness::*;
    use super::*;
    use crate::core::rng::ScriptedDice;
    use crate::messaging::Outbound;

    #[test]
    fn test_join_schedules_channel_once() {
        let h = Harness::new();
        assert_eq!(h.engine.channels(), vec![h.key.clone()]);
        let due = h.engine.next_due(&h.key).unwrap();
        assert!(due >= START + 600.0 && due <= START + 1800.0);

        h.engine.on_bot_join(NET, "#DUCKS");
        assert_eq!(h.engine.next_due(&h.key), Some(due));
    }

    #[test]
    fn test_names_strip_prefixes() {
        let h = Harness::new();
        assert_eq!(
            h.engine.occupants(&h.key),
            vec!["DuckBot".to_string(), "alice".into(), "bob".into(), "boss".into()]
        );

        h.engine.on_user_part(NET, CHAN, "BOB");
        h.engine.on_user_join(NET, CHAN, "carol");
        h.engine.on_nick_change(NET, "alice", "alice_");
        h.engine.on_user_quit(NET, "boss");
        assert_eq!(
            h.engine.occupants(&h.key),
            vec!["DuckBot".to_string(), "alice_".into(), "carol".into()]
        );
    }

    #[test]
    fn test_part_clears_ducks() {
        let h = Harness::new();
        h.spawn(false);
        assert_eq!(h.engine.duck_count(&h.key), 1);
        h.engine.on_bot_part(NET, CHAN);
        assert_eq!(h.engine.duck_count(&h.key), 0);
        assert!(h.engine.channels().is_empty());
    }

    #[test]
    fn test_spawn_announces_art() {
        let h = Harness::new();
        h.spawn(true);
        assert_eq!(
            h.messenger.sent(),
            vec![(
                NET.to_string(),
                Outbound::Announce {
                    channel: CHAN.into(),
                    text: DUCK_ART.into()
                }
            )]
        );
    }

    #[test]
    fn test_admin_lookup() {
        let h = Harness::new();
        assert!(h.engine.is_admin(NET, "Boss"));
        assert!(h.engine.is_admin(NET, "mod"));
        assert!(!h.engine.is_admin(NET, "alice"));
        assert!(!h.engine.is_admin("other", "boss"));
    }

    #[test]
    fn test_clear_confiscations() {
        let h = Harness::new();
        let mut alice = h.record("alice");
        alice.confiscated = true;
        h.put("alice", &alice);
        h.record("bob");

        h.engine.clear_confiscations(&h.key);
        assert!(!h.record("alice").confiscated);
    }

    #[test]
    fn test_mirror_lookup() {
        let h = Harness::new();
        let mut bob = h.record("bob");
        bob.mirror_until = START + 60.0;
        h.put("bob", &bob);
        h.record("alice");
        let holders = h.engine.mirror_holders(&h.key, START);
        assert!(holders.mirror_active("BOB", &h.key, START));
        assert!(!holders.mirror_active("alice", &h.key, START));
        assert!(!holders.mirror_active("nobody", &h.key, START));
        assert!(!h.engine.mirror_holders(&h.key, START + 61.0).mirror_active("bob", &h.key, START + 61.0));
    }

    #[test]
    fn test_scripted_dice_swap() {
        let h = Harness::new();
        h.script(ScriptedDice::new().units(&[0.05]));
        let settings = h.engine.settings(&h.key);
        let duck = h.engine.spawn_duck(&h.key, &settings, None).unwrap();
        assert!(duck.is_golden);
    }
}
