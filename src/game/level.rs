//! Level Table
//!
//! Static tiers mapping cumulative XP to weapon accuracy, reliability,
//! magazine sizes and penalties. Lookups are total: any XP value, including
//! negative ones, resolves to a tier.

/// One row of the level table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelTier {
    /// Minimum XP for this tier.
    pub min_xp: i64,
    /// Displayed level.
    pub level: u32,
    /// Hit chance in percent.
    pub accuracy_pct: u32,
    /// Chance the gun fires without jamming, in percent.
    pub reliability_pct: u32,
    /// Rounds per magazine before upgrades.
    pub magazine_capacity: u32,
    /// Spare magazines before upgrades.
    pub magazines_max: u32,
    /// Nominal XP for a missed shot.
    pub miss_penalty: i64,
    /// XP applied on a wild shot.
    pub wild_penalty: i64,
    /// XP applied when a player hits another hunter.
    pub accident_penalty: i64,
}

impl LevelTier {
    /// Accuracy as a fraction.
    pub fn accuracy(&self) -> f64 {
        f64::from(self.accuracy_pct) / 100.0
    }

    /// Reliability as a fraction.
    pub fn reliability(&self) -> f64 {
        f64::from(self.reliability_pct) / 100.0
    }
}

#[allow(clippy::too_many_arguments)]
const fn tier(
    min_xp: i64,
    level: u32,
    accuracy_pct: u32,
    reliability_pct: u32,
    magazine_capacity: u32,
    magazines_max: u32,
    miss_penalty: i64,
    wild_penalty: i64,
) -> LevelTier {
    LevelTier {
        min_xp,
        level,
        accuracy_pct,
        reliability_pct,
        magazine_capacity,
        magazines_max,
        miss_penalty,
        wild_penalty,
        accident_penalty: -25,
    }
}

/// Default tiers, ascending by `min_xp`.
pub const DEFAULT_TIERS: [LevelTier; 41] = [
    tier(-5, 0, 55, 85, 6, 1, -1, -1),
    tier(-4, 1, 55, 85, 6, 2, -1, -1),
    tier(20, 2, 56, 86, 6, 2, -1, -1),
    tier(50, 3, 57, 87, 6, 2, -1, -1),
    tier(90, 4, 58, 88, 6, 2, -1, -1),
    tier(140, 5, 59, 89, 6, 2, -1, -1),
    tier(200, 6, 60, 90, 6, 2, -1, -1),
    tier(270, 7, 65, 93, 4, 3, -1, -1),
    tier(350, 8, 67, 93, 4, 3, -1, -1),
    tier(440, 9, 69, 93, 4, 3, -1, -1),
    tier(540, 10, 71, 94, 4, 3, -1, -2),
    tier(650, 11, 73, 94, 4, 3, -1, -2),
    tier(770, 12, 73, 94, 4, 3, -1, -2),
    tier(900, 13, 74, 95, 4, 3, -1, -2),
    tier(1040, 14, 74, 95, 4, 3, -1, -2),
    tier(1190, 15, 75, 95, 4, 3, -1, -2),
    tier(1350, 16, 80, 97, 2, 4, -1, -2),
    tier(1520, 17, 81, 97, 2, 4, -1, -2),
    tier(1700, 18, 81, 97, 2, 4, -1, -2),
    tier(1890, 19, 82, 97, 2, 4, -1, -2),
    tier(2090, 20, 82, 97, 2, 4, -3, -5),
    tier(2300, 21, 83, 98, 2, 4, -3, -5),
    tier(2520, 22, 83, 98, 2, 4, -3, -5),
    tier(2750, 23, 84, 98, 2, 4, -3, -5),
    tier(2990, 24, 84, 98, 2, 4, -3, -5),
    tier(3240, 25, 85, 98, 2, 4, -3, -5),
    tier(3500, 26, 90, 99, 1, 5, -3, -5),
    tier(3770, 27, 91, 99, 1, 5, -3, -5),
    tier(4050, 28, 91, 99, 1, 5, -3, -5),
    tier(4340, 29, 92, 99, 1, 5, -3, -5),
    tier(4640, 30, 92, 99, 1, 5, -5, -8),
    tier(4950, 31, 93, 99, 1, 5, -5, -8),
    tier(5270, 32, 93, 99, 1, 5, -5, -8),
    tier(5600, 33, 94, 99, 1, 5, -5, -8),
    tier(5940, 34, 94, 99, 1, 5, -5, -8),
    tier(6290, 35, 95, 99, 1, 5, -5, -8),
    tier(6650, 36, 95, 99, 1, 5, -5, -8),
    tier(7020, 37, 96, 99, 1, 5, -5, -8),
    tier(7400, 38, 96, 99, 1, 5, -5, -8),
    tier(7790, 39, 97, 99, 1, 5, -5, -8),
    tier(8200, 40, 97, 99, 1, 5, -5, -8),
];

/// Promotion titles, indexed by level and clamped at the last entry.
pub const TITLES: [&str; 10] = [
    "tourist",
    "noob",
    "duck hater",
    "duck hunter",
    "member of the Comitee Against Ducks",
    "duck pest",
    "duck hassler",
    "duck killer",
    "duck demolisher",
    "duck disassembler",
];

/// Ordered tier lookup.
#[derive(Debug, Clone)]
pub struct LevelTable {
    tiers: Vec<LevelTier>,
}

impl Default for LevelTable {
    fn default() -> Self {
        Self {
            tiers: DEFAULT_TIERS.to_vec(),
        }
    }
}

impl LevelTable {
    /// Active tier for `xp`: the highest tier whose `min_xp` is at or below
    /// it, or the lowest tier when none is.
    pub fn tier_for(&self, xp: f64) -> &LevelTier {
        let idx = self.tiers.partition_point(|t| (t.min_xp as f64) <= xp);
        &self.tiers[idx.saturating_sub(1)]
    }

    /// The tier following the one active at `xp`, if any.
    pub fn next_tier(&self, xp: f64) -> Option<&LevelTier> {
        let idx = self.tiers.partition_point(|t| (t.min_xp as f64) <= xp);
        // No tier matched: the lowest tier is active, the next one is index 1
        self.tiers.get(idx.max(1))
    }

    /// XP still missing for the next level, with that level.
    pub fn next_level_requirement(&self, xp: f64) -> Option<(i64, u32)> {
        self.next_tier(xp)
            .map(|t| ((t.min_xp as f64 - xp).ceil() as i64, t.level))
    }

    /// All tiers.
    pub fn tiers(&self) -> &[LevelTier] {
        &self.tiers
    }
}

/// Title for a level.
pub fn title_for(level: u32) -> &'static str {
    let idx = (level.saturating_sub(1) as usize).min(TITLES.len() - 1);
    TITLES[idx]
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_tiers_sorted() {
        let table = LevelTable::default();
        for pair in table.tiers().windows(2) {
            assert!(pair[0].min_xp < pair[1].min_xp);
            assert!(pair[0].level < pair[1].level);
        }
    }

    #[test]
    fn test_tier_boundaries() {
        let table = LevelTable::default();
        assert_eq!(table.tier_for(0.0).level, 1);
        assert_eq!(table.tier_for(19.9).level, 1);
        assert_eq!(table.tier_for(20.0).level, 2);
        assert_eq!(table.tier_for(8200.0).level, 40);
        assert_eq!(table.tier_for(1e9).level, 40);
    }

    #[test]
    fn test_low_xp_clamps_to_lowest() {
        let table = LevelTable::default();
        assert_eq!(table.tier_for(-1000.0).level, 0);
        assert_eq!(table.tier_for(-5.0).level, 0);
    }

    #[test]
    fn test_starting_capacity() {
        let tier = *LevelTable::default().tier_for(0.0);
        assert_eq!(tier.magazine_capacity, 6);
        assert_eq!(tier.magazines_max, 2);
        assert_eq!(tier.accident_penalty, -25);
    }

    #[test]
    fn test_next_level_requirement() {
        let table = LevelTable::default();
        assert_eq!(table.next_level_requirement(0.0), Some((20, 2)));
        assert_eq!(table.next_level_requirement(45.5), Some((5, 3)));
        assert_eq!(table.next_level_requirement(-100.0), Some((96, 1)));
        assert_eq!(table.next_level_requirement(9000.0), None);
    }

    #[test]
    fn test_titles_clamp() {
        assert_eq!(title_for(0), "tourist");
        assert_eq!(title_for(1), "tourist");
        assert_eq!(title_for(4), "duck hunter");
        assert_eq!(title_for(10), "duck disassembler");
        assert_eq!(title_for(40), "duck disassembler");
    }

    proptest! {
        #[test]
        fn test_tier_monotonic(a in -100.0f64..10_000.0, b in -100.0f64..10_000.0) {
            let table = LevelTable::default();
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(table.tier_for(lo).level <= table.tier_for(hi).level);
        }

        #[test]
        fn test_tier_min_xp_at_or_below(x in -5.0f64..20_000.0) {
            let table = LevelTable::default();
            prop_assert!((table.tier_for(x).min_xp as f64) <= x);
        }
    }
}
