//! Spawn Scheduling
//!
//! Per-channel due-time bookkeeping for natural spawns, detector
//! pre-notices and duck-call bursts.
//!
//! ```text
//! no_schedule ──join──► scheduled ──now ≥ due──► due ──spawn──► scheduled(next)
//!                           ▲                      │
//!                           └──── at capacity ─────┘  (deferred 5..15 s)
//! ```
//!
//! The hard guarantee is that two consecutive natural spawns are never more
//! than `max_spawn` apart: every due time computed from a previous spawn is
//! at most `last + max_spawn`, and an overdue channel fires immediately.

use crate::core::clock::Timestamp;
use crate::core::rng::Dice;

/// Seconds before a spawn that detector holders are warned.
pub const PRE_NOTICE_LEAD: f64 = 120.0;

/// Spacing between duck-call burst spawns.
pub const BURST_SPACING: f64 = 60.0;

/// Retry delay for a burst spawn blocked by a full channel.
pub const BURST_RETRY_DELAY: f64 = 5.0;

/// Delay range applied to a natural spawn blocked by a full channel.
pub const CAPACITY_DEFER: (f64, f64) = (5.0, 15.0);

/// Delay range for an overdue channel asked about without firing.
pub const OVERDUE_DEFER: (f64, f64) = (10.0, 30.0);

/// Configured spawn interval bounds, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnWindow {
    /// Minimum gap between natural spawns.
    pub min_spawn: f64,
    /// Maximum gap between natural spawns.
    pub max_spawn: f64,
}

impl SpawnWindow {
    /// Build a window, swapping the bounds if given out of order.
    pub fn new(min_spawn: f64, max_spawn: f64) -> Self {
        if min_spawn <= max_spawn {
            Self { min_spawn, max_spawn }
        } else {
            Self {
                min_spawn: max_spawn,
                max_spawn: min_spawn,
            }
        }
    }
}

/// Compute the next natural due time.
///
/// `last` is the previous natural spawn, or `0` if the channel never had one.
/// With `allow_immediate` unset an overdue channel is pushed a little into
/// the future instead of firing on the spot. The scheduler itself always
/// allows immediate spawns; the unset form is for callers that only ask
/// for the next due time without firing one.
pub fn next_due(
    last: Timestamp,
    now: Timestamp,
    window: SpawnWindow,
    allow_immediate: bool,
    dice: &mut dyn Dice,
) -> Timestamp {
    if last <= 0.0 {
        return now + dice.uniform(window.min_spawn, window.max_spawn);
    }

    let earliest = last + window.min_spawn;
    let latest = last + window.max_spawn;

    if now > latest {
        if allow_immediate {
            now
        } else {
            now + dice.uniform(OVERDUE_DEFER.0, OVERDUE_DEFER.1)
        }
    } else if now >= earliest {
        let remaining = (latest - now).max(1.0);
        (now + dice.uniform(1.0, remaining)).min(latest.max(now))
    } else {
        now + dice.uniform(earliest - now, latest - now)
    }
}

/// Number of ducks a duck call brings: 1 (50%), 2 (25%), 3 (12%),
/// 4 (6%), 5 (3%), otherwise 1.
pub fn burst_size(dice: &mut dyn Dice) -> u32 {
    let roll = dice.unit() * 100.0;
    if roll < 50.0 {
        1
    } else if roll < 75.0 {
        2
    } else if roll < 87.0 {
        3
    } else if roll < 93.0 {
        4
    } else if roll < 96.0 {
        5
    } else {
        1
    }
}

/// Coarse time-to-spawn text for detector notices. Never exact seconds.
pub fn detector_bucket(seconds_left: f64) -> String {
    let secs = seconds_left.max(0.0) as u64;
    if secs > 60 {
        format!("approximately {}m remaining", secs / 60)
    } else {
        "less than 1m remaining".to_string()
    }
}

/// Scheduler state of one channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSchedule {
    /// Next natural spawn.
    pub next_spawn_due: Timestamp,
    /// When detector holders get warned.
    pub pre_notice_due: Timestamp,
    /// The warning for the current due time went out.
    pub pre_notice_sent: bool,
    /// Previous natural spawn, `0` if none.
    pub last_spawn: Timestamp,
    /// Extra due times injected by duck calls.
    pub bursts: Vec<Timestamp>,
}

impl ChannelSchedule {
    /// Schedule a channel that has never spawned.
    pub fn start(now: Timestamp, window: SpawnWindow, dice: &mut dyn Dice) -> Self {
        Self::resume(0.0, now, window, dice)
    }

    /// Schedule a channel whose previous natural spawn is known.
    pub fn resume(last_spawn: Timestamp, now: Timestamp, window: SpawnWindow, dice: &mut dyn Dice) -> Self {
        let mut schedule = Self {
            next_spawn_due: now,
            pre_notice_due: now,
            pre_notice_sent: false,
            last_spawn,
            bursts: Vec::new(),
        };
        schedule.reschedule(now, window, true, dice);
        schedule
    }

    /// Recompute the natural due time and re-arm the pre-notice.
    pub fn reschedule(&mut self, now: Timestamp, window: SpawnWindow, allow_immediate: bool, dice: &mut dyn Dice) {
        self.set_due(now, next_due(self.last_spawn, now, window, allow_immediate, dice));
    }

    fn set_due(&mut self, now: Timestamp, due: Timestamp) {
        self.next_spawn_due = due;
        self.pre_notice_due = now.max(due - PRE_NOTICE_LEAD);
        self.pre_notice_sent = false;
    }

    /// The natural spawn is due.
    pub fn is_due(&self, now: Timestamp) -> bool {
        now >= self.next_spawn_due
    }

    /// A natural spawn happened at `now`.
    pub fn record_natural_spawn(&mut self, now: Timestamp, window: SpawnWindow, dice: &mut dyn Dice) {
        self.last_spawn = now;
        self.reschedule(now, window, true, dice);
    }

    /// Push a due natural spawn back because the channel is full.
    pub fn defer_full(&mut self, now: Timestamp, dice: &mut dyn Dice) {
        self.next_spawn_due = now + dice.uniform(CAPACITY_DEFER.0, CAPACITY_DEFER.1);
    }

    /// Claim the pre-notice if it is due and not yet sent. Returns the
    /// seconds left until the spawn.
    pub fn take_pre_notice(&mut self, now: Timestamp) -> Option<f64> {
        if self.pre_notice_sent || now < self.pre_notice_due {
            return None;
        }
        self.pre_notice_sent = true;
        Some((self.next_spawn_due - now).max(0.0))
    }

    /// Inject `count` burst spawns, 60 s apart starting 60 s out.
    pub fn add_bursts(&mut self, now: Timestamp, count: u32) {
        for i in 0..count {
            self.bursts.push(now + BURST_SPACING + f64::from(i) * BURST_SPACING);
        }
    }

    /// Remove and count bursts due at `now`.
    pub fn take_due_bursts(&mut self, now: Timestamp) -> usize {
        let before = self.bursts.len();
        self.bursts.retain(|due| *due > now);
        before - self.bursts.len()
    }

    /// Requeue a burst that could not spawn.
    pub fn retry_burst(&mut self, now: Timestamp) {
        self.bursts.push(now + BURST_RETRY_DELAY);
    }

    /// Earliest pending due time, natural or burst.
    pub fn earliest_due(&self) -> Timestamp {
        self.bursts
            .iter()
            .copied()
            .fold(self.next_spawn_due, f64::min)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rng::{GameRng, ScriptedDice};
    use proptest::prelude::*;

    fn window() -> SpawnWindow {
        SpawnWindow::new(600.0, 1800.0)
    }

    #[test]
    fn test_first_schedule_within_window() {
        let mut dice = ScriptedDice::new().units(&[0.5]);
        let due = next_due(0.0, 1000.0, window(), true, &mut dice);
        assert_eq!(due, 1000.0 + 1200.0);
    }

    #[test]
    fn test_overdue_fires_immediately() {
        let mut dice = ScriptedDice::new();
        let due = next_due(100.0, 100.0 + 1900.0, window(), true, &mut dice);
        assert_eq!(due, 2000.0);
    }

    #[test]
    fn test_overdue_without_immediate_is_pushed_out() {
        let t0 = 5000.0;
        for u in [0.0, 0.5, 0.999_999] {
            let mut dice = ScriptedDice::new().units(&[u]);
            let due = next_due(t0, t0 + 1900.0, window(), false, &mut dice);
            assert!(due >= t0 + 1910.0 && due < t0 + 1930.0, "due {}", due);
            assert_ne!(due, t0 + 1900.0);
        }
    }

    #[test]
    fn test_in_window_never_passes_latest() {
        let mut dice = ScriptedDice::new().units(&[0.999_999]);
        // 0.5 s before the hard bound
        let due = next_due(0.5, 1800.0, window(), true, &mut dice);
        assert!(due <= 1800.5);
    }

    #[test]
    fn test_before_earliest_waits_for_min() {
        let mut dice = ScriptedDice::new().units(&[0.0]);
        let due = next_due(1000.0, 1100.0, window(), true, &mut dice);
        assert_eq!(due, 1600.0);
    }

    #[test]
    fn test_pre_notice_sent_once() {
        let mut dice = ScriptedDice::new().units(&[0.0]);
        let mut schedule = ChannelSchedule::start(0.0, window(), &mut dice);
        assert_eq!(schedule.next_spawn_due, 600.0);
        assert_eq!(schedule.pre_notice_due, 480.0);

        assert_eq!(schedule.take_pre_notice(400.0), None);
        assert_eq!(schedule.take_pre_notice(500.0), Some(100.0));
        assert_eq!(schedule.take_pre_notice(501.0), None);
    }

    #[test]
    fn test_pre_notice_never_before_now() {
        let mut dice = ScriptedDice::new().units(&[0.0]);
        let schedule = ChannelSchedule::start(0.0, SpawnWindow::new(30.0, 60.0), &mut dice);
        assert_eq!(schedule.pre_notice_due, 0.0);
    }

    #[test]
    fn test_natural_spawn_resets_last() {
        let mut dice = ScriptedDice::new().units(&[0.0, 0.0]);
        let mut schedule = ChannelSchedule::start(0.0, window(), &mut dice);
        schedule.record_natural_spawn(600.0, window(), &mut dice);
        assert_eq!(schedule.last_spawn, 600.0);
        assert_eq!(schedule.next_spawn_due, 1200.0);
        assert!(!schedule.pre_notice_sent);
    }

    #[test]
    fn test_bursts() {
        let mut dice = ScriptedDice::new().units(&[0.5]);
        let mut schedule = ChannelSchedule::start(0.0, window(), &mut dice);
        let natural = schedule.next_spawn_due;

        schedule.add_bursts(100.0, 3);
        assert_eq!(schedule.bursts, vec![160.0, 220.0, 280.0]);
        assert_eq!(schedule.take_due_bursts(159.0), 0);
        assert_eq!(schedule.take_due_bursts(230.0), 2);
        assert_eq!(schedule.bursts, vec![280.0]);
        assert_eq!(schedule.next_spawn_due, natural);

        schedule.retry_burst(230.0);
        assert_eq!(schedule.earliest_due(), 235.0);
    }

    #[test]
    fn test_burst_size_distribution() {
        let cases = [
            (0.0, 1),
            (0.49, 1),
            (0.5, 2),
            (0.74, 2),
            (0.75, 3),
            (0.87, 4),
            (0.93, 5),
            (0.96, 1),
            (0.999, 1),
        ];
        for (u, expected) in cases {
            let mut dice = ScriptedDice::new().units(&[u]);
            assert_eq!(burst_size(&mut dice), expected, "roll {}", u);
        }
    }

    #[test]
    fn test_detector_bucket() {
        assert_eq!(detector_bucket(119.0), "approximately 1m remaining");
        assert_eq!(detector_bucket(61.0), "approximately 1m remaining");
        assert_eq!(detector_bucket(60.0), "less than 1m remaining");
        assert_eq!(detector_bucket(-3.0), "less than 1m remaining");
    }

    proptest! {
        #[test]
        fn test_natural_gap_never_exceeds_max(seed in any::<u64>(), steps in prop::collection::vec(1.0f64..400.0, 1..60)) {
            let w = window();
            let mut dice = GameRng::new(seed);
            let mut now = 0.0;
            let mut schedule = ChannelSchedule::start(now, w, &mut dice);
            prop_assert!(schedule.next_spawn_due - now <= w.max_spawn);

            let mut last_natural: Option<f64> = None;
            for step in steps {
                // Tick at least once per second until the due time passes
                let target = now + step;
                while now < target {
                    now += 1.0;
                    if schedule.is_due(now) {
                        if let Some(prev) = last_natural {
                            prop_assert!(now - prev <= w.max_spawn + 1.0);
                        }
                        last_natural = Some(now);
                        schedule.record_natural_spawn(now, w, &mut dice);
                        prop_assert!(schedule.next_spawn_due <= now + w.max_spawn);
                    }
                }
            }
        }
    }
}
