//! Duck Population
//!
//! Per-channel FIFO queues of live ducks. Only the head of a queue can be
//! engaged. A queue that drains is removed entirely so "no duck here" and
//! "tracked but empty" are never confused.
//!
//! The population itself is plain data; the engine keeps it behind a single
//! mutex so every read-decide-mutate sequence below runs as one unit.

use std::collections::{BTreeMap, VecDeque};

use crate::core::clock::Timestamp;
use crate::core::key::ChannelKey;
use crate::core::rng::Dice;

/// Health of a regular duck.
pub const REGULAR_HEALTH: i32 = 1;

/// Health of a golden duck.
pub const GOLDEN_HEALTH: i32 = 5;

/// A live duck.
#[derive(Debug, Clone, PartialEq)]
pub struct Duck {
    /// Golden variant, worth more XP.
    pub is_golden: bool,
    /// Remaining health.
    pub health: i32,
    /// When the duck appeared.
    pub spawn_time: Timestamp,
    /// A golden duck was already announced as golden.
    pub revealed: bool,
    /// The duck refuses to be befriended and flees on the next attempt.
    pub hostile: bool,
}

impl Duck {
    /// New duck of the given variant.
    pub fn new(is_golden: bool, spawn_time: Timestamp) -> Self {
        Self {
            is_golden,
            health: if is_golden { GOLDEN_HEALTH } else { REGULAR_HEALTH },
            spawn_time,
            revealed: false,
            hostile: false,
        }
    }

    /// Seconds since the duck appeared.
    pub fn age(&self, now: Timestamp) -> f64 {
        now - self.spawn_time
    }
}

/// Why a spawn request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SpawnRejected {
    /// The channel already holds `max_ducks` ducks.
    #[error("channel already has {0} ducks")]
    AtCapacity(usize),
}

/// Result of damaging the head duck.
#[derive(Debug, Clone, PartialEq)]
pub struct HitReport {
    /// The duck after the hit (removed from the queue when killed).
    pub duck: Duck,
    /// Health left after the hit.
    pub health_left: i32,
    /// The duck died and left the queue.
    pub killed: bool,
    /// This hit revealed a golden duck for the first time.
    pub revealed_now: bool,
}

/// Live ducks of every channel.
#[derive(Debug, Default)]
pub struct DuckPopulation {
    queues: BTreeMap<ChannelKey, VecDeque<Duck>>,
}

impl DuckPopulation {
    /// Create an empty population.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live ducks in a channel.
    pub fn count(&self, key: &ChannelKey) -> usize {
        self.queues.get(key).map_or(0, VecDeque::len)
    }

    /// The channel has a queue (and therefore at least one duck).
    pub fn is_tracked(&self, key: &ChannelKey) -> bool {
        self.queues.contains_key(key)
    }

    /// Append a duck, rolling golden with probability `gold_ratio`.
    pub fn spawn(
        &mut self,
        key: &ChannelKey,
        max_ducks: usize,
        gold_ratio: f64,
        now: Timestamp,
        dice: &mut dyn Dice,
    ) -> Result<Duck, SpawnRejected> {
        self.ensure_room(key, max_ducks)?;
        let is_golden = dice.chance(gold_ratio);
        Ok(self.push(key, Duck::new(is_golden, now)))
    }

    /// Append a duck of a fixed variant.
    pub fn spawn_variant(
        &mut self,
        key: &ChannelKey,
        max_ducks: usize,
        is_golden: bool,
        now: Timestamp,
    ) -> Result<Duck, SpawnRejected> {
        self.ensure_room(key, max_ducks)?;
        Ok(self.push(key, Duck::new(is_golden, now)))
    }

    fn ensure_room(&self, key: &ChannelKey, max_ducks: usize) -> Result<(), SpawnRejected> {
        let count = self.count(key);
        if count >= max_ducks {
            return Err(SpawnRejected::AtCapacity(count));
        }
        Ok(())
    }

    fn push(&mut self, key: &ChannelKey, duck: Duck) -> Duck {
        self.queues
            .entry(key.clone())
            .or_default()
            .push_back(duck.clone());
        duck
    }

    /// Peek at the head duck.
    pub fn front(&self, key: &ChannelKey) -> Option<&Duck> {
        self.queues.get(key).and_then(VecDeque::front)
    }

    /// Damage the head duck, removing it when its health reaches zero.
    pub fn resolve_hit(&mut self, key: &ChannelKey, damage: i32) -> Option<HitReport> {
        let queue = self.queues.get_mut(key)?;
        let head = queue.front_mut()?;

        head.health -= damage;
        let revealed_now = head.is_golden && !head.revealed;
        if head.is_golden {
            head.revealed = true;
        }

        let health_left = head.health;
        let killed = health_left <= 0;
        let duck = if killed {
            let duck = queue.pop_front()?;
            self.drop_if_drained(key);
            duck
        } else {
            head.clone()
        };

        Some(HitReport {
            duck,
            health_left,
            killed,
            revealed_now,
        })
    }

    /// Turn the head duck hostile.
    pub fn mark_hostile(&mut self, key: &ChannelKey) -> bool {
        match self.queues.get_mut(key).and_then(VecDeque::front_mut) {
            Some(head) => {
                head.hostile = true;
                true
            }
            None => false,
        }
    }

    /// Remove the head duck without killing it (it flew away).
    pub fn remove_head(&mut self, key: &ChannelKey) -> Option<Duck> {
        let duck = self.queues.get_mut(key)?.pop_front();
        self.drop_if_drained(key);
        duck
    }

    /// Remove every duck of the channel that reached `despawn_time` seconds.
    pub fn despawn_expired(
        &mut self,
        key: &ChannelKey,
        now: Timestamp,
        despawn_time: f64,
    ) -> Vec<Duck> {
        let Some(queue) = self.queues.get_mut(key) else {
            return Vec::new();
        };

        let mut gone = Vec::new();
        queue.retain(|duck| {
            if duck.age(now) >= despawn_time {
                gone.push(duck.clone());
                false
            } else {
                true
            }
        });
        self.drop_if_drained(key);
        gone
    }

    /// Channels of one network that currently have ducks.
    pub fn channels_of(&self, network: &str) -> Vec<ChannelKey> {
        self.queues
            .keys()
            .filter(|k| k.network() == network)
            .cloned()
            .collect()
    }

    /// Drop every duck of the channel.
    pub fn clear(&mut self, key: &ChannelKey) -> usize {
        self.queues.remove(key).map_or(0, |q| q.len())
    }

    fn drop_if_drained(&mut self, key: &ChannelKey) {
        if self.queues.get(key).is_some_and(VecDeque::is_empty) {
            self.queues.remove(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rng::ScriptedDice;

    fn key() -> ChannelKey {
        ChannelKey::new("net", "#ducks")
    }

    #[test]
    fn test_spawn_respects_cap() {
        let mut pop = DuckPopulation::new();
        let mut dice = ScriptedDice::new().units(&[0.9, 0.9, 0.9]);

        assert!(pop.spawn(&key(), 2, 0.1, 0.0, &mut dice).is_ok());
        assert!(pop.spawn(&key(), 2, 0.1, 1.0, &mut dice).is_ok());
        assert_eq!(
            pop.spawn(&key(), 2, 0.1, 2.0, &mut dice),
            Err(SpawnRejected::AtCapacity(2))
        );
        assert_eq!(pop.count(&key()), 2);
    }

    #[test]
    fn test_golden_roll() {
        let mut pop = DuckPopulation::new();
        let mut dice = ScriptedDice::new().units(&[0.05, 0.5]);

        let gold = pop.spawn(&key(), 5, 0.1, 0.0, &mut dice).unwrap();
        let plain = pop.spawn(&key(), 5, 0.1, 0.0, &mut dice).unwrap();
        assert!(gold.is_golden);
        assert_eq!(gold.health, GOLDEN_HEALTH);
        assert!(!plain.is_golden);
        assert_eq!(plain.health, REGULAR_HEALTH);
    }

    #[test]
    fn test_kill_removes_head_and_queue() {
        let mut pop = DuckPopulation::new();
        pop.spawn_variant(&key(), 5, false, 10.0).unwrap();

        let report = pop.resolve_hit(&key(), 1).unwrap();
        assert!(report.killed);
        assert_eq!(report.duck.spawn_time, 10.0);
        assert!(!pop.is_tracked(&key()));
        assert!(pop.front(&key()).is_none());
        assert!(pop.resolve_hit(&key(), 1).is_none());
    }

    #[test]
    fn test_golden_takes_three_double_hits() {
        let mut pop = DuckPopulation::new();
        pop.spawn_variant(&key(), 5, true, 0.0).unwrap();

        let first = pop.resolve_hit(&key(), 2).unwrap();
        assert_eq!(first.health_left, 3);
        assert!(!first.killed);
        assert!(first.revealed_now);

        let second = pop.resolve_hit(&key(), 2).unwrap();
        assert_eq!(second.health_left, 1);
        assert!(!second.killed);
        assert!(!second.revealed_now);

        let third = pop.resolve_hit(&key(), 1).unwrap();
        assert_eq!(third.health_left, 0);
        assert!(third.killed);
    }

    #[test]
    fn test_fifo_only_head_is_hit() {
        let mut pop = DuckPopulation::new();
        pop.spawn_variant(&key(), 5, false, 1.0).unwrap();
        pop.spawn_variant(&key(), 5, false, 2.0).unwrap();

        let report = pop.resolve_hit(&key(), 1).unwrap();
        assert_eq!(report.duck.spawn_time, 1.0);
        assert_eq!(pop.front(&key()).unwrap().spawn_time, 2.0);
        assert_eq!(pop.count(&key()), 1);
    }

    #[test]
    fn test_despawn_expired() {
        let mut pop = DuckPopulation::new();
        pop.spawn_variant(&key(), 5, false, 0.0).unwrap();
        pop.spawn_variant(&key(), 5, false, 500.0).unwrap();

        let gone = pop.despawn_expired(&key(), 720.0, 720.0);
        assert_eq!(gone.len(), 1);
        assert_eq!(pop.count(&key()), 1);

        let gone = pop.despawn_expired(&key(), 1220.0, 720.0);
        assert_eq!(gone.len(), 1);
        assert!(!pop.is_tracked(&key()));
    }

    #[test]
    fn test_hostile_and_remove_head() {
        let mut pop = DuckPopulation::new();
        assert!(!pop.mark_hostile(&key()));
        pop.spawn_variant(&key(), 5, false, 0.0).unwrap();
        assert!(pop.mark_hostile(&key()));
        assert!(pop.front(&key()).unwrap().hostile);

        let fled = pop.remove_head(&key()).unwrap();
        assert!(fled.hostile);
        assert!(!pop.is_tracked(&key()));
    }

    #[test]
    fn test_channels_are_independent() {
        let mut pop = DuckPopulation::new();
        let other = ChannelKey::new("net", "#other");
        pop.spawn_variant(&key(), 1, false, 0.0).unwrap();
        pop.spawn_variant(&other, 1, false, 0.0).unwrap();

        assert_eq!(pop.channels_of("net").len(), 2);
        assert_eq!(pop.clear(&key()), 1);
        assert_eq!(pop.count(&other), 1);
    }
}
