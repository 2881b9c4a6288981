//! Periodic engine tick
//!
//! Called at least once per second. For every scheduled channel, in order:
//! 1. ducks past `despawn_time` fly away (and confiscated guns come back)
//! 2. detector holders get the pre-notice once per due time
//! 3. a due natural spawn happens, or is deferred while the channel is full
//! 4. due burst spawns happen, or are retried shortly after
//!
//! The channel lock is never held while spawning or talking to storage.

use tracing::{debug, info, trace};

use super::GameEngine;
use crate::core::clock::Timestamp;
use crate::core::key::ChannelKey;
use crate::game::events::FLY_AWAY;
use crate::game::record::TimedModifier;
use crate::game::schedule::detector_bucket;

/// What one tick did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickReport {
    /// Ducks spawned, natural and burst.
    pub spawned: usize,
    /// Ducks that flew away.
    pub despawned: usize,
    /// Detector notices sent.
    pub notices: usize,
}

impl TickReport {
    fn merge(&mut self, other: TickReport) {
        self.spawned += other.spawned;
        self.despawned += other.despawned;
        self.notices += other.notices;
    }
}

impl GameEngine {
    /// Advance every channel to the current time.
    pub fn tick(&self) -> TickReport {
        let now = self.now();
        let mut report = TickReport::default();
        for key in self.channels() {
            report.merge(self.tick_channel(&key, now));
        }
        if report != TickReport::default() {
            trace!(?report, "tick");
        }
        report
    }

    fn tick_channel(&self, key: &ChannelKey, now: Timestamp) -> TickReport {
        let settings = self.settings(key);
        let mut report = TickReport::default();

        // ===== DESPAWN =====
        let gone = self
            .ducks
            .lock()
            .despawn_expired(key, now, settings.despawn_time as f64);
        if !gone.is_empty() {
            info!(key = %key, ducks = gone.len(), "ducks flew away");
            for _ in &gone {
                self.announce(key, FLY_AWAY);
            }
            self.clear_confiscations(key);
            report.despawned = gone.len();
        }

        // ===== PRE-NOTICE =====
        let pre_notice = self
            .channels
            .lock()
            .get_mut(key)
            .and_then(|state| state.schedule.take_pre_notice(now));
        if let Some(left) = pre_notice {
            report.notices = self.send_detector_notices(key, left, now);
        }

        // ===== NATURAL SPAWN =====
        let due = self
            .channels
            .lock()
            .get(key)
            .is_some_and(|state| state.schedule.is_due(now));
        if due {
            let spawned = self.spawn_duck(key, &settings, None).is_ok();
            let mut channels = self.channels.lock();
            if let Some(state) = channels.get_mut(key) {
                let mut dice = self.dice.lock();
                if spawned {
                    state
                        .schedule
                        .record_natural_spawn(now, settings.spawn_window(), dice.as_mut());
                    report.spawned += 1;
                } else {
                    state.schedule.defer_full(now, dice.as_mut());
                    debug!(key = %key, next = state.schedule.next_spawn_due, "channel full, spawn deferred");
                }
            }
        }

        // ===== BURSTS =====
        let bursts = self
            .channels
            .lock()
            .get_mut(key)
            .map_or(0, |state| state.schedule.take_due_bursts(now));
        for _ in 0..bursts {
            if self.spawn_duck(key, &settings, None).is_ok() {
                report.spawned += 1;
            } else if let Some(state) = self.channels.lock().get_mut(key) {
                state.schedule.retry_burst(now);
                debug!(key = %key, "channel full, burst retried");
            }
        }

        report
    }

    fn send_detector_notices(&self, key: &ChannelKey, left: f64, now: Timestamp) -> usize {
        let text = format!(
            "Your duck detector indicates the next duck will arrive soon... ({})",
            detector_bucket(left)
        );
        let mut sent = 0;
        for (player, record) in self.channel_records(key) {
            if record.is_active(TimedModifier::DucksDetector, now) {
                self.notify(key, &player, &text);
                sent += 1;
            }
        }
        if sent > 0 {
            debug!(key = %key, sent, "detector notices sent");
        }
        sent
    }
}

#[cfg(test)]
mod tests {
    use super::super::harness::*;
    use super::*;
    use crate::game::events::DUCK_ART;

    #[test]
    fn test_natural_spawn_when_due() {
        let h = Harness::new();
        let due = h.engine.next_due(&h.key).unwrap();

        h.clock.set(due - 1.0);
        assert_eq!(h.engine.tick().spawned, 0);

        h.clock.set(due);
        assert_eq!(h.engine.tick().spawned, 1);
        assert_eq!(h.engine.duck_count(&h.key), 1);
        assert!(h.messenger.texts().contains(&DUCK_ART.to_string()));

        let next = h.engine.next_due(&h.key).unwrap();
        assert!(next >= due + 600.0 && next <= due + 1800.0);
    }

    #[test]
    fn test_spawn_gap_never_exceeds_max() {
        let h = Harness::new();
        let mut last = START;
        for _ in 0..20 {
            let due = h.engine.next_due(&h.key).unwrap();
            assert!(due - last <= 1800.0);
            h.clock.set(due);
            h.engine.tick();
            // keep the channel below capacity
            h.engine.ducks.lock().clear(&h.key);
            last = due;
        }
    }

    #[test]
    fn test_full_channel_defers_spawn() {
        let h = Harness::new();
        for _ in 0..5 {
            h.spawn(false);
        }
        let due = h.engine.next_due(&h.key).unwrap();
        h.clock.set(due);
        let report = h.engine.tick();
        assert_eq!(report.spawned, 0);
        let deferred = h.engine.next_due(&h.key).unwrap();
        assert!(deferred >= due + 5.0 && deferred <= due + 15.0);
    }

    #[test]
    fn test_despawn_announces_and_returns_guns() {
        let h = Harness::new();
        h.spawn(false);
        let mut alice = h.record("alice");
        alice.confiscated = true;
        h.put("alice", &alice);
        h.messenger.clear();

        h.clock.advance(719.0);
        assert_eq!(h.engine.tick().despawned, 0);
        h.messenger.clear();
        h.clock.advance(1.0);
        let report = h.engine.tick();
        assert_eq!(report.despawned, 1);
        assert_eq!(h.messenger.texts().first().map(String::as_str), Some(FLY_AWAY));
        assert!(!h.record("alice").confiscated);
    }

    #[test]
    fn test_detector_pre_notice_once() {
        let h = Harness::new();
        let mut alice = h.record("alice");
        alice.ducks_detector_until = START + 86_400.0;
        h.put("alice", &alice);
        h.record("bob");

        let due = h.engine.next_due(&h.key).unwrap();
        h.clock.set(due - 120.0);
        assert_eq!(h.engine.tick().notices, 1);
        assert_eq!(
            h.messenger.notices_to("alice"),
            vec!["Your duck detector indicates the next duck will arrive soon... (approximately 2m remaining)".to_string()]
        );
        assert!(h.messenger.notices_to("bob").is_empty());

        h.clock.advance(30.0);
        assert_eq!(h.engine.tick().notices, 0);
    }

    #[test]
    fn test_bursts_spawn_and_retry() {
        let h = Harness::new();
        if let Some(state) = h.engine.channels.lock().get_mut(&h.key) {
            state.schedule.add_bursts(START, 2);
        }
        h.clock.set(START + 60.0);
        assert_eq!(h.engine.tick().spawned, 1);

        for _ in 0..4 {
            h.spawn(false);
        }
        h.clock.set(START + 120.0);
        assert_eq!(h.engine.tick().spawned, 0);
        let channels = h.engine.channels.lock();
        assert_eq!(channels[&h.key].schedule.bursts, vec![START + 125.0]);
    }
}
