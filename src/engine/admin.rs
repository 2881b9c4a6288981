//! Admin and owner commands.

use tracing::{info, warn};

use super::{Actor, GameEngine};
use crate::core::key::ChannelKey;
use crate::game::schedule::ChannelSchedule;
use crate::persistence::{BackupFilter, BackupSummary};

const NO_PERMISSION: &str = "You don't have permission to use admin commands.";

/// Backups shown for one channel.
const CHANNEL_BACKUPS_SHOWN: usize = 5;

/// Backups shown across every channel.
const ALL_BACKUPS_SHOWN: usize = 10;

fn backup_time(summary: &BackupSummary) -> String {
    let secs = summary.created_at as i64;
    chrono::DateTime::from_timestamp(secs, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| secs.to_string())
}

impl GameEngine {
    fn require_admin(&self, key: &ChannelKey, actor: &Actor) -> bool {
        if self.is_admin(key.network(), &actor.nick) {
            return true;
        }
        self.notify(key, &actor.nick, NO_PERMISSION);
        false
    }

    /// `!spawnduck [n]`: up to `n` ducks, never past the channel limit.
    /// Manual spawns leave the natural schedule alone.
    pub fn on_admin_spawn(&self, key: &ChannelKey, actor: &Actor, count: Option<u32>) {
        if !self.require_admin(key, actor) {
            return;
        }
        let settings = self.settings(key);
        let wanted = (count.unwrap_or(1) as usize).min(settings.max_ducks);

        let mut spawned = 0;
        for _ in 0..wanted {
            if self.spawn_duck(key, &settings, None).is_err() {
                break;
            }
            spawned += 1;
        }

        if spawned > 0 {
            info!(admin = %actor.nick, key = %key, spawned, "manual spawn");
        } else {
            self.notify(
                key,
                &actor.nick,
                &format!(
                    "Cannot spawn ducks in {} - already at maximum ({})",
                    key.channel(),
                    settings.max_ducks
                ),
            );
        }
    }

    /// `!spawngold`
    pub fn on_admin_spawn_gold(&self, key: &ChannelKey, actor: &Actor) {
        if !self.require_admin(key, actor) {
            return;
        }
        let settings = self.settings(key);
        match self.spawn_duck(key, &settings, Some(true)) {
            Ok(_) => info!(admin = %actor.nick, key = %key, "manual golden spawn"),
            Err(_) => self.notify(
                key,
                &actor.nick,
                &format!(
                    "Cannot spawn golden duck in {} - already at maximum ({})",
                    key.channel(),
                    settings.max_ducks
                ),
            ),
        }
    }

    /// `!rearm <nick>`: return the gun with a full load.
    pub fn on_rearm(&self, key: &ChannelKey, actor: &Actor, target: &str) {
        if !self.require_admin(key, actor) {
            return;
        }
        let Some(mut record) = self.find(target, key) else {
            return;
        };
        let before = record.clone();
        record.confiscated = false;
        record.ammo = record.magazine_capacity;
        record.magazines = record.magazines_max;
        self.persist(target, key, &before, &record);
        info!(admin = %actor.nick, target, key = %key, "rearmed");
        self.announce(key, &format!("{} has been rearmed.", target));
    }

    /// `!disarm <nick>`: confiscate the gun and empty it.
    pub fn on_disarm(&self, key: &ChannelKey, actor: &Actor, target: &str) {
        if !self.require_admin(key, actor) {
            return;
        }
        let Some(mut record) = self.find(target, key) else {
            return;
        };
        let before = record.clone();
        record.confiscated = true;
        record.ammo = 0;
        self.persist(target, key, &before, &record);
        info!(admin = %actor.nick, target, key = %key, "disarmed");
        self.announce(key, &format!("{} has been disarmed.", target));
    }

    /// `!clear`: back up and wipe every record of the channel.
    pub fn on_admin_clear(&self, key: &ChannelKey, actor: &Actor) {
        if !self.require_admin(key, actor) {
            return;
        }
        let receipt = match self.store.backup_and_clear(key) {
            Ok(receipt) => receipt,
            Err(e) => {
                warn!(key = %key, error = %e, "clear failed");
                self.notify(key, &actor.nick, &format!("Failed to clear data for {}.", key.channel()));
                return;
            }
        };
        let ducks = self.reset_channel(key);
        info!(admin = %actor.nick, key = %key, cleared = receipt.cleared, ducks, backup = ?receipt.backup_id, "channel cleared");
        let text = match receipt.backup_id {
            Some(id) => format!(
                "Cleared all data for {} ({} players affected). Backup ID: {}",
                key.channel(),
                receipt.cleared,
                id
            ),
            None => format!("Cleared all data for {} ({} players affected)", key.channel(), receipt.cleared),
        };
        self.notify(key, &actor.nick, &text);
    }

    /// Drop a channel's live ducks and restart its schedule. Returns the
    /// ducks removed.
    fn reset_channel(&self, key: &ChannelKey) -> usize {
        let now = self.now();
        let window = self.settings(key).spawn_window();
        let mut channels = self.channels.lock();
        let ducks = self.ducks.lock().clear(key);
        if let Some(state) = channels.get_mut(key) {
            let mut dice = self.dice.lock();
            state.schedule = ChannelSchedule::start(now, window, dice.as_mut());
        }
        ducks
    }

    /// `!restore <backup_id>`
    pub fn on_admin_restore(&self, key: &ChannelKey, actor: &Actor, backup_id: &str) {
        if !self.require_admin(key, actor) {
            return;
        }
        let text = match self.store.restore(backup_id) {
            Ok(0) => format!("Backup {} not found or failed to restore", backup_id),
            Ok(restored) => {
                info!(admin = %actor.nick, backup_id, restored, "backup restored");
                format!("Restored {} player stats from backup {}", restored, backup_id)
            }
            Err(e) => {
                warn!(backup_id, error = %e, "restore failed");
                format!("Backup {} not found or failed to restore", backup_id)
            }
        };
        self.notify(key, &actor.nick, &text);
    }

    /// `!backups [#channel]`: recent backups of one channel of this network,
    /// or of every channel.
    pub fn on_admin_backups(&self, key: &ChannelKey, actor: &Actor, channel: Option<&str>) {
        if !self.require_admin(key, actor) {
            return;
        }
        let nick = actor.nick.as_str();
        let scoped = channel.map(|c| ChannelKey::new(key.network(), c));
        let filter = scoped.as_ref().map(BackupFilter::channel).unwrap_or_default();

        let backups = match self.store.list_backups(&filter) {
            Ok(backups) => backups,
            Err(e) => {
                warn!(error = %e, "listing backups failed");
                Vec::new()
            }
        };

        match scoped {
            Some(scope) => {
                if backups.is_empty() {
                    self.notify(key, nick, &format!("No backups found for {}", scope));
                    return;
                }
                self.notify(key, nick, &format!("Recent backups for {}:", scope));
                for b in backups.iter().take(CHANNEL_BACKUPS_SHOWN) {
                    self.notify(
                        key,
                        nick,
                        &format!("{} ({}, {} players)", b.backup_id, backup_time(b), b.players),
                    );
                }
            }
            None => {
                if backups.is_empty() {
                    self.notify(key, nick, "No backups found");
                    return;
                }
                self.notify(key, nick, "Recent backups:");
                for b in backups.iter().take(ALL_BACKUPS_SHOWN) {
                    self.notify(
                        key,
                        nick,
                        &format!("{} - {} ({}, {} players)", b.key, b.backup_id, backup_time(b), b.players),
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::harness::*;
    use super::NO_PERMISSION;
    use crate::game::events::DUCK_ART;

    #[test]
    fn test_non_admin_refused() {
        let h = Harness::new();
        h.engine.on_admin_spawn(&h.key, &Harness::actor("alice"), Some(2));
        assert_eq!(h.messenger.notices_to("alice"), vec![NO_PERMISSION.to_string()]);
        assert_eq!(h.engine.duck_count(&h.key), 0);
    }

    #[test]
    fn test_spawn_capped_at_max() {
        let h = Harness::new();
        h.engine.on_admin_spawn(&h.key, &Harness::actor("boss"), Some(9));
        assert_eq!(h.engine.duck_count(&h.key), 5);
        assert_eq!(h.messenger.texts().iter().filter(|t| *t == DUCK_ART).count(), 5);

        h.engine.on_admin_spawn(&h.key, &Harness::actor("mod"), None);
        assert_eq!(
            h.messenger.notices_to("mod"),
            vec!["Cannot spawn ducks in #ducks - already at maximum (5)".to_string()]
        );
    }

    #[test]
    fn test_manual_spawn_keeps_schedule() {
        let h = Harness::new();
        let due = h.engine.next_due(&h.key);
        h.engine.on_admin_spawn(&h.key, &Harness::actor("boss"), Some(1));
        assert_eq!(h.engine.next_due(&h.key), due);
    }

    #[test]
    fn test_spawn_gold() {
        let h = Harness::new();
        h.engine.on_admin_spawn_gold(&h.key, &Harness::actor("boss"));
        assert!(h.engine.ducks.lock().front(&h.key).unwrap().is_golden);
    }

    #[test]
    fn test_rearm_and_disarm() {
        let h = Harness::new();
        h.record("alice");
        h.engine.on_disarm(&h.key, &Harness::actor("boss"), "alice");
        let alice = h.record("alice");
        assert!(alice.confiscated);
        assert_eq!(alice.ammo, 0);
        assert_eq!(h.last_text(), "alice has been disarmed.");

        h.engine.on_rearm(&h.key, &Harness::actor("boss"), "alice");
        let alice = h.record("alice");
        assert!(!alice.confiscated);
        assert_eq!(alice.ammo, alice.magazine_capacity);
        assert_eq!(h.last_text(), "alice has been rearmed.");
    }

    #[test]
    fn test_rearm_unknown_player_is_silent() {
        let h = Harness::new();
        h.engine.on_rearm(&h.key, &Harness::actor("boss"), "ghost");
        assert!(h.messenger.sent().is_empty());
    }

    #[test]
    fn test_clear_restore_and_list() {
        let h = Harness::new();
        let mut alice = h.record("alice");
        alice.xp = 321.0;
        h.put("alice", &alice);

        h.engine.on_admin_clear(&h.key, &Harness::actor("boss"));
        let notice = h.messenger.notices_to("boss").pop().unwrap();
        assert!(notice.starts_with("Cleared all data for #ducks (1 players affected). Backup ID: net_#ducks_"));
        let backup_id = notice.rsplit(' ').next().unwrap().to_string();
        assert_eq!(h.record("alice").xp, 0.0);

        h.engine.on_admin_restore(&h.key, &Harness::actor("boss"), &backup_id);
        assert_eq!(
            h.messenger.notices_to("boss").pop().unwrap(),
            format!("Restored 1 player stats from backup {}", backup_id)
        );
        assert_eq!(h.record("alice").xp, 321.0);

        h.messenger.clear();
        h.engine.on_admin_backups(&h.key, &Harness::actor("boss"), Some("#DUCKS"));
        let lines = h.messenger.notices_to("boss");
        assert_eq!(lines[0], "Recent backups for net:#ducks:");
        assert!(lines[1].starts_with(&backup_id));

        h.messenger.clear();
        h.engine.on_admin_backups(&h.key, &Harness::actor("boss"), Some("#other"));
        assert_eq!(h.messenger.notices_to("boss"), vec!["No backups found for net:#other".to_string()]);
    }

    #[test]
    fn test_clear_resets_ducks_and_schedule() {
        let h = Harness::new();
        h.record("alice");
        h.spawn(false);
        h.spawn(true);
        let due = h.engine.next_due(&h.key).unwrap();
        {
            let mut channels = h.engine.channels.lock();
            let schedule = &mut channels.get_mut(&h.key).unwrap().schedule;
            schedule.last_spawn = START - 100.0;
            schedule.pre_notice_sent = true;
            schedule.add_bursts(START, 3);
        }
        h.clock.advance(40.0);

        h.engine.on_admin_clear(&h.key, &Harness::actor("boss"));
        assert_eq!(h.engine.duck_count(&h.key), 0);

        let channels = h.engine.channels.lock();
        let schedule = &channels.get(&h.key).unwrap().schedule;
        assert!(schedule.bursts.is_empty());
        assert_eq!(schedule.last_spawn, 0.0);
        assert!(!schedule.pre_notice_sent);
        assert!(schedule.next_spawn_due > START + 40.0);
        assert_ne!(schedule.next_spawn_due, due);
    }

    #[test]
    fn test_restore_unknown_backup() {
        let h = Harness::new();
        h.engine.on_admin_restore(&h.key, &Harness::actor("boss"), "nope");
        assert_eq!(
            h.messenger.notices_to("boss"),
            vec!["Backup nope not found or failed to restore".to_string()]
        );
    }
}
