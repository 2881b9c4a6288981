//! Promotion and demotion
//!
//! Applied after every XP change. Crossing a tier boundary moves the
//! derived magazine limits. A player who was topped up at the old limit is
//! topped up at the new one and a player above a lowered limit is clamped.

use crate::game::level::{title_for, LevelTable};
use crate::game::record::PlayerChannelRecord;

/// Direction of a level change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelShift {
    /// Moved up at least one level.
    Promoted,
    /// Moved down at least one level.
    Demoted,
}

/// What changed when a record crossed a tier boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelChange {
    /// Up or down.
    pub shift: LevelShift,
    /// Level after the change.
    pub level: u32,
    /// Signed change in spare magazines.
    pub magazines_delta: i64,
    /// Signed change in chambered rounds.
    pub ammo_delta: i64,
    /// XP missing for the following level, with that level.
    pub next: Option<(i64, u32)>,
}

impl LevelChange {
    /// Player-facing announcement.
    pub fn describe(&self, channel: &str) -> String {
        let (tag, verb) = match self.shift {
            LevelShift::Promoted => ("PROMOTION", "promoted"),
            LevelShift::Demoted => ("DEMOTION", "demoted"),
        };
        let mut text = format!(
            "{} You are {} to level {} ({}) in {}.",
            tag,
            verb,
            self.level,
            title_for(self.level),
            channel
        );
        text.push_str(&count_phrase(self.magazines_delta, "magazine", "magazines"));
        text.push_str(&count_phrase(self.ammo_delta, "bullet", "bullets"));
        if let Some((needed, level)) = self.next {
            text.push_str(&format!(" {} XP for lvl {}.", needed, level));
        }
        text
    }
}

fn count_phrase(delta: i64, one: &str, many: &str) -> String {
    let verb = if delta > 0 { "found" } else { "lost" };
    match delta.unsigned_abs() {
        0 => String::new(),
        1 => format!(" You {} a {}.", verb, one),
        n => format!(" You {} {} {}.", verb, n, many),
    }
}

/// Re-derive capacities after an XP change from `prev_xp`, adjusting ammo
/// and magazines when the tier changed.
pub fn settle(levels: &LevelTable, record: &mut PlayerChannelRecord, prev_xp: f64) -> Option<LevelChange> {
    let old = *levels.tier_for(prev_xp);
    let new = *levels.tier_for(record.xp);
    record.refresh_capacity(levels);

    if old.level == new.level {
        return None;
    }

    let old_cap = old.magazine_capacity + record.mag_upgrade_level;
    let old_max = old.magazines_max + record.mag_capacity_level;
    let new_cap = record.magazine_capacity;
    let new_max = record.magazines_max;

    let before_mags = record.magazines;
    let before_ammo = record.ammo;

    let shift = if new.level > old.level {
        if record.magazines >= old_max && new_max > old_max {
            record.magazines = new_max;
        }
        if record.ammo >= old_cap && new_cap > old_cap {
            record.ammo = new_cap;
        }
        LevelShift::Promoted
    } else {
        LevelShift::Demoted
    };
    // Some promotions trade rounds per magazine for more magazines
    record.ammo = record.ammo.min(new_cap);
    record.magazines = record.magazines.min(new_max);

    Some(LevelChange {
        shift,
        level: new.level,
        magazines_delta: i64::from(record.magazines) - i64::from(before_mags),
        ammo_delta: i64::from(record.ammo) - i64::from(before_ammo),
        next: levels.next_level_requirement(record.xp),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_change_within_tier() {
        let levels = LevelTable::default();
        let mut record = PlayerChannelRecord::default();
        record.xp = 15.0;
        assert!(settle(&levels, &mut record, 5.0).is_none());
    }

    #[test]
    fn test_promotion_tops_up_full_player() {
        let levels = LevelTable::default();
        let mut record = PlayerChannelRecord::default();
        record.xp = 250.0;
        record.refresh_capacity(&levels);
        assert_eq!(record.magazines_max, 2);
        record.magazines = 2;
        record.ammo = 6;

        // 250 -> 280 crosses into level 7 (4 rounds, 3 magazines)
        record.xp = 280.0;
        let change = settle(&levels, &mut record, 250.0).unwrap();
        assert_eq!(change.shift, LevelShift::Promoted);
        assert_eq!(change.level, 7);
        assert_eq!(record.magazines, 3);
        assert_eq!(change.magazines_delta, 1);
        // Level 7 magazines hold fewer rounds
        assert_eq!(record.ammo, 4);
        assert_eq!(change.ammo_delta, -2);
        assert_eq!(
            change.describe("#ducks"),
            "PROMOTION You are promoted to level 7 (duck hassler) in #ducks. You found a magazine. You lost 2 bullets. 70 XP for lvl 8."
        );
    }

    #[test]
    fn test_promotion_leaves_partial_player() {
        let levels = LevelTable::default();
        let mut record = PlayerChannelRecord::default();
        record.magazines = 1;
        record.xp = 280.0;
        settle(&levels, &mut record, 250.0).unwrap();
        assert_eq!(record.magazines, 1);
    }

    #[test]
    fn test_demotion_clamps() {
        let levels = LevelTable::default();
        let mut record = PlayerChannelRecord::default();
        record.xp = 280.0;
        record.refresh_capacity(&levels);
        record.magazines = 3;
        record.ammo = 4;

        record.sub_xp(100.0);
        let change = settle(&levels, &mut record, 280.0).unwrap();
        assert_eq!(change.shift, LevelShift::Demoted);
        assert_eq!(change.level, 5);
        assert_eq!(record.magazines, 2);
        assert_eq!(change.magazines_delta, -1);
        assert!(change.describe("#ducks").contains("You lost a magazine."));
    }
}
