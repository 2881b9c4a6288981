//! Loot
//!
//! One in ten kills turns up something in the bushes. A single weighted
//! draw picks the find; items the hunter already has running are converted
//! to their shop price in XP.

use crate::core::clock::Timestamp;
use crate::core::rng::Dice;
use crate::game::record::{PlayerChannelRecord, TimedModifier};
use crate::game::shop::{ShopPrices, AMMO_CHARGES, SAFETY_LOCK_USES};

/// Probability that a kill yields loot.
pub const LOOT_CHANCE: f64 = 0.1;

const DAY: f64 = 24.0 * 3600.0;

const HUNTING_MAG_XP: [i64; 5] = [10, 20, 40, 50, 100];
const CLOVER_BONUSES: [u32; 7] = [1, 3, 5, 7, 8, 9, 10];
const WALLET_XP: i64 = 150;

const JUNK: [&str; 9] = [
    "discarded tire",
    "old shoe",
    "creepy crawly",
    "pile of rubbish",
    "cigarette butt",
    "broken compass",
    "expired hunting license",
    "rusty can",
    "tangled fishing line",
];

/// Something found after a kill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum Loot {
    ExtraBullet,
    SightNext,
    Silencer,
    DucksDetector,
    ExtraMagazine,
    ApAmmo,
    Grease,
    Sunglasses,
    ExplosiveAmmo,
    SafetyLock,
    Wallet,
    HuntingMagazine,
    Clover,
    Junk,
}

/// Weighted outcomes in draw order.
pub const LOOT_TABLE: [(Loot, f64); 14] = [
    (Loot::ExtraBullet, 18.4),
    (Loot::SightNext, 13.0),
    (Loot::Silencer, 12.4),
    (Loot::DucksDetector, 11.9),
    (Loot::ExtraMagazine, 11.1),
    (Loot::ApAmmo, 7.8),
    (Loot::Grease, 7.2),
    (Loot::Sunglasses, 7.0),
    (Loot::ExplosiveAmmo, 6.0),
    (Loot::SafetyLock, 4.4),
    (Loot::Wallet, 0.5),
    (Loot::HuntingMagazine, 3.0),
    (Loot::Clover, 3.2),
    (Loot::Junk, 15.0),
];

/// Pick an outcome with one unit draw.
pub fn draw(dice: &mut dyn Dice) -> Loot {
    let total: f64 = LOOT_TABLE.iter().map(|(_, w)| w).sum();
    let roll = dice.unit() * total;
    let mut acc = 0.0;
    for (loot, weight) in LOOT_TABLE {
        acc += weight;
        if roll <= acc {
            return loot;
        }
    }
    Loot::Junk
}

/// Apply a find to the hunter's record and describe it.
///
/// `wallet_owners` are the channel occupants a lost wallet may belong to.
pub fn apply(
    loot: Loot,
    record: &mut PlayerChannelRecord,
    prices: &ShopPrices,
    wallet_owners: &[String],
    now: Timestamp,
    dice: &mut dyn Dice,
) -> String {
    let refund = |record: &mut PlayerChannelRecord, xp: u32| record.add_xp(f64::from(xp));

    match loot {
        Loot::ExtraBullet => {
            if record.ammo < record.magazine_capacity {
                record.ammo += 1;
                format!(
                    "By searching the bushes, you find an extra bullet! | Ammo: {}/{}",
                    record.ammo, record.magazine_capacity
                )
            } else {
                refund(record, 7);
                "By searching the bushes, you find an extra bullet! Your magazine is full, so you gain 7 XP instead.".to_string()
            }
        }
        Loot::ExtraMagazine => {
            if record.magazines < record.magazines_max {
                record.magazines += 1;
                format!(
                    "By searching the bushes, you find an extra magazine! | Magazines: {}/{}",
                    record.magazines, record.magazines_max
                )
            } else {
                refund(record, 20);
                "By searching the bushes, you find an extra magazine! You already have maximum magazines, so you gain 20 XP instead.".to_string()
            }
        }
        Loot::SightNext => {
            if record.sight_next_shot {
                refund(record, prices.sight);
                format!(
                    "You find a sight, but you already have one mounted for your next shot. [+{} xp]",
                    prices.sight
                )
            } else {
                record.sight_next_shot = true;
                "By searching the bushes, you find a sight for your gun! Your next shot will be more accurate.".to_string()
            }
        }
        Loot::Silencer => {
            if record.is_active(TimedModifier::Silencer, now) {
                refund(record, prices.silencer);
                format!("You find a silencer, but you already have one active. [+{} xp]", prices.silencer)
            } else {
                record.silencer_until = now + DAY;
                "By searching the bushes, you find a silencer! It will prevent frightening ducks for 24h.".to_string()
            }
        }
        Loot::DucksDetector => {
            if record.is_active(TimedModifier::DucksDetector, now) {
                refund(record, prices.ducks_detector);
                format!(
                    "You find a ducks detector, but you already have one active. [+{} xp]",
                    prices.ducks_detector
                )
            } else {
                record.ducks_detector_until = now + 4.0 * 3600.0;
                "By searching the bushes, you find a ducks detector! You'll get a 60s pre-spawn notice for 4h.".to_string()
            }
        }
        Loot::ApAmmo => {
            if record.ap_shots > 0 {
                refund(record, prices.ap_ammo);
                format!("You find AP ammo, but you already have some. [+{} xp]", prices.ap_ammo)
            } else {
                record.explosive_shots = 0;
                record.ap_shots = AMMO_CHARGES;
                "By searching the bushes, you find AP ammo! Next 20 shots deal extra damage to golden ducks.".to_string()
            }
        }
        Loot::ExplosiveAmmo => {
            if record.explosive_shots > 0 {
                refund(record, prices.explosive_ammo);
                format!(
                    "You find explosive ammo, but you already have some. [+{} xp]",
                    prices.explosive_ammo
                )
            } else {
                record.ap_shots = 0;
                record.explosive_shots = AMMO_CHARGES;
                "By searching the bushes, you find explosive ammo! Next 20 shots deal extra damage to golden ducks.".to_string()
            }
        }
        Loot::Grease => {
            if record.is_active(TimedModifier::Grease, now) {
                refund(record, prices.grease);
                format!("You find grease, but you already have some applied. [+{} xp]", prices.grease)
            } else {
                record.grease_until = now + DAY;
                "By searching the bushes, you find grease! Your gun will jam half as often for 24h.".to_string()
            }
        }
        Loot::Sunglasses => {
            if record.is_active(TimedModifier::Sunglasses, now) {
                refund(record, prices.sunglasses);
                format!("You find sunglasses, but you're already wearing some. [+{} xp]", prices.sunglasses)
            } else {
                record.sunglasses_until = now + DAY;
                "By searching the bushes, you find sunglasses! You're protected against bedazzlement for 24h.".to_string()
            }
        }
        Loot::SafetyLock => {
            if record.safety_lock_active(now) {
                refund(record, prices.infrared_detector);
                format!(
                    "You find a Safety Lock, but yours is still active. [+{} xp]",
                    prices.infrared_detector
                )
            } else {
                record.trigger_lock_until = now + DAY;
                record.trigger_lock_uses = record.trigger_lock_uses.max(SAFETY_LOCK_USES);
                "By searching the bushes, you find a Safety Lock! Safety locks when no duck (6 uses, 24h).".to_string()
            }
        }
        Loot::Wallet => {
            record.add_xp(WALLET_XP as f64);
            let owner = if wallet_owners.is_empty() {
                " a".to_string()
            } else {
                format!(" {}'s", wallet_owners[dice.index(wallet_owners.len())])
            };
            format!("By searching the bushes, you find{} lost wallet! [+{} xp]", owner, WALLET_XP)
        }
        Loot::HuntingMagazine => {
            if record.magazines >= record.magazines_max {
                let xp = HUNTING_MAG_XP[dice.index(HUNTING_MAG_XP.len())];
                record.add_xp(xp as f64);
                format!(
                    "By searching the bushes, you find a hunting magazine! You already have maximum magazines, so you gain {} XP instead.",
                    xp
                )
            } else {
                record.magazines += 1;
                format!(
                    "By searching the bushes, you find a hunting magazine! | Magazines: {}/{}",
                    record.magazines, record.magazines_max
                )
            }
        }
        Loot::Clover => {
            if record.is_active(TimedModifier::Clover, now) {
                refund(record, prices.four_leaf_clover);
                format!(
                    "You find a four-leaf clover, but you already have its luck active. [+{} xp]",
                    prices.four_leaf_clover
                )
            } else {
                let bonus = CLOVER_BONUSES[dice.index(CLOVER_BONUSES.len())];
                record.clover_bonus = bonus;
                record.clover_until = record.clover_until.max(now + DAY);
                format!(
                    "By searching the bushes, you find a four-leaf clover! +{} XP per duck for 24h.",
                    bonus
                )
            }
        }
        Loot::Junk => {
            let junk = JUNK[dice.index(JUNK.len())];
            format!("By searching the bushes, you find a {}. It's worthless.", junk)
        }
    }
}

/// Roll for loot after a kill. Returns the find's description, if any.
pub fn roll(
    record: &mut PlayerChannelRecord,
    prices: &ShopPrices,
    wallet_owners: &[String],
    now: Timestamp,
    dice: &mut dyn Dice,
) -> Option<String> {
    if !dice.chance(LOOT_CHANCE) {
        return None;
    }
    let loot = draw(dice);
    Some(apply(loot, record, prices, wallet_owners, now, dice))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rng::ScriptedDice;

    #[test]
    fn test_weights_sum_to_hundred() {
        let total: f64 = LOOT_TABLE.iter().map(|(_, w)| w).sum();
        assert!((total - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_draw_boundaries() {
        let mut dice = ScriptedDice::new().units(&[0.0, 0.18, 0.19, 0.999_999]);
        assert_eq!(draw(&mut dice), Loot::ExtraBullet);
        assert_eq!(draw(&mut dice), Loot::ExtraBullet);
        assert_eq!(draw(&mut dice), Loot::SightNext);
        assert_eq!(draw(&mut dice), Loot::Junk);
    }

    #[test]
    fn test_no_loot_most_kills() {
        let mut record = PlayerChannelRecord::default();
        let before = record.clone();
        let mut dice = ScriptedDice::new().units(&[0.5]);
        assert!(roll(&mut record, &ShopPrices::default(), &[], 0.0, &mut dice).is_none());
        assert_eq!(record, before);
    }

    #[test]
    fn test_full_magazine_bullet_converts() {
        let mut record = PlayerChannelRecord::default();
        let mut dice = ScriptedDice::new();
        let text = apply(Loot::ExtraBullet, &mut record, &ShopPrices::default(), &[], 0.0, &mut dice);
        assert_eq!(record.xp, 7.0);
        assert!(text.ends_with("so you gain 7 XP instead."));
    }

    #[test]
    fn test_active_grease_converts_to_price() {
        let mut record = PlayerChannelRecord::default();
        record.grease_until = 500.0;
        let mut dice = ScriptedDice::new();
        let text = apply(Loot::Grease, &mut record, &ShopPrices::default(), &[], 100.0, &mut dice);
        assert_eq!(record.xp, 8.0);
        assert_eq!(text, "You find grease, but you already have some applied. [+8 xp]");
    }

    #[test]
    fn test_wallet_owner() {
        let mut record = PlayerChannelRecord::default();
        let owners = vec!["bob".to_string(), "carol".to_string()];
        let mut dice = ScriptedDice::new().ints(&[1]);
        let text = apply(Loot::Wallet, &mut record, &ShopPrices::default(), &owners, 0.0, &mut dice);
        assert_eq!(text, "By searching the bushes, you find carol's lost wallet! [+150 xp]");
        assert_eq!(record.xp, 150.0);

        let text = apply(Loot::Wallet, &mut record, &ShopPrices::default(), &[], 0.0, &mut dice);
        assert_eq!(text, "By searching the bushes, you find a lost wallet! [+150 xp]");
    }

    #[test]
    fn test_hunting_magazine_at_cap() {
        let mut record = PlayerChannelRecord::default();
        record.magazines = record.magazines_max;
        let mut dice = ScriptedDice::new().ints(&[4]);
        let text = apply(Loot::HuntingMagazine, &mut record, &ShopPrices::default(), &[], 0.0, &mut dice);
        assert_eq!(record.xp, 100.0);
        assert!(text.contains("so you gain 100 XP instead"));
    }

    #[test]
    fn test_clover_bonus_from_options() {
        let mut record = PlayerChannelRecord::default();
        let mut dice = ScriptedDice::new().ints(&[2]);
        apply(Loot::Clover, &mut record, &ShopPrices::default(), &[], 10.0, &mut dice);
        assert_eq!(record.clover_bonus, 5);
        assert_eq!(record.clover_until, 10.0 + DAY);
    }
}
