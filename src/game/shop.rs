//! Shop
//!
//! A closed catalog of 24 items bought with channel XP. Each item carries a
//! cost, an optional target requirement and a stacking policy; the engine
//! checks the policy before debiting so an already-active item never costs
//! anything. Effects that turn out to be impossible after the debit (full
//! magazine, target wearing sunglasses, ...) refund the exact XP.

use serde::{Deserialize, Serialize};

use crate::core::clock::Timestamp;
use crate::core::rng::Dice;
use crate::game::events::{weapon_status, Reply};
use crate::game::level::LevelTable;
use crate::game::progression;
use crate::game::record::{PlayerChannelRecord, TimedModifier, MAX_UPGRADE_LEVEL};
use crate::game::schedule::burst_size;

const HOUR: f64 = 3600.0;
const DAY: f64 = 24.0 * HOUR;

/// Rounds granted by AP or explosive ammo.
pub const AMMO_CHARGES: u32 = 20;

/// Befriend charges granted by bread.
pub const BREAD_CHARGES: u32 = 20;

/// Uses granted by the safety lock.
pub const SAFETY_LOCK_USES: u32 = 6;

/// Longest chat line the catalog listing produces.
const CATALOG_LINE_LIMIT: usize = 400;

// =============================================================================
// PRICES
// =============================================================================

/// Configurable XP prices. Magazine upgrades are priced by level instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct ShopPrices {
    pub extra_bullet: u32,
    pub extra_magazine: u32,
    pub ap_ammo: u32,
    pub explosive_ammo: u32,
    pub repurchase_gun: u32,
    pub grease: u32,
    pub sight: u32,
    pub infrared_detector: u32,
    pub silencer: u32,
    pub four_leaf_clover: u32,
    pub sunglasses: u32,
    pub spare_clothes: u32,
    pub brush_for_gun: u32,
    pub mirror: u32,
    pub handful_of_sand: u32,
    pub water_bucket: u32,
    pub sabotage: u32,
    pub life_insurance: u32,
    pub liability_insurance: u32,
    pub piece_of_bread: u32,
    pub ducks_detector: u32,
    pub duck_call: u32,
}

impl Default for ShopPrices {
    fn default() -> Self {
        Self {
            extra_bullet: 7,
            extra_magazine: 20,
            ap_ammo: 15,
            explosive_ammo: 25,
            repurchase_gun: 40,
            grease: 8,
            sight: 6,
            infrared_detector: 15,
            silencer: 5,
            four_leaf_clover: 13,
            sunglasses: 5,
            spare_clothes: 7,
            brush_for_gun: 7,
            mirror: 7,
            handful_of_sand: 7,
            water_bucket: 10,
            sabotage: 14,
            life_insurance: 10,
            liability_insurance: 5,
            piece_of_bread: 50,
            ducks_detector: 50,
            duck_call: 15,
        }
    }
}

/// Price of the next magazine upgrade at `level` purchased upgrades.
pub fn upgrade_cost(level: u32) -> u32 {
    (200 * (level.min(MAX_UPGRADE_LEVEL) + 1)).min(1000)
}

// =============================================================================
// CATALOG
// =============================================================================

/// Every purchasable item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[allow(missing_docs)]
pub enum ShopItem {
    ExtraBullet,
    RefillMagazine,
    ApAmmo,
    ExplosiveAmmo,
    RepurchaseGun,
    Grease,
    Sight,
    SafetyLock,
    Silencer,
    FourLeafClover,
    Sunglasses,
    SpareClothes,
    BrushForGun,
    Mirror,
    HandfulOfSand,
    WaterBucket,
    Sabotage,
    LifeInsurance,
    LiabilityInsurance,
    PieceOfBread,
    DucksDetector,
    UpgradeMagazine,
    ExtraMagazine,
    DuckCall,
}

/// Charge counters that block a repeat purchase while non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charge {
    /// AP rounds loaded and no explosive rounds.
    ArmorPiercing,
    /// Explosive rounds loaded and no AP rounds.
    Explosive,
    /// Bread left.
    Bread,
}

/// When a purchase is suppressed because the item is still in effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackingPolicy {
    /// Always purchasable.
    Stackable,
    /// Blocked while the timed modifier runs.
    Duration(TimedModifier),
    /// Blocked while the safety lock runs with uses left.
    DurationWithUses,
    /// Blocked while charges remain.
    Count(Charge),
    /// Blocked while the one-shot sight is mounted.
    OneShot,
}

impl StackingPolicy {
    /// The item is still in effect on `record`.
    pub fn is_active(self, record: &PlayerChannelRecord, now: Timestamp) -> bool {
        match self {
            StackingPolicy::Stackable => false,
            StackingPolicy::Duration(modifier) => record.is_active(modifier, now),
            StackingPolicy::DurationWithUses => record.safety_lock_active(now),
            StackingPolicy::Count(Charge::ArmorPiercing) => {
                record.ap_shots > 0 && record.explosive_shots == 0
            }
            StackingPolicy::Count(Charge::Explosive) => {
                record.explosive_shots > 0 && record.ap_shots == 0
            }
            StackingPolicy::Count(Charge::Bread) => record.bread_uses > 0,
            StackingPolicy::OneShot => record.sight_next_shot,
        }
    }
}

impl ShopItem {
    /// Catalog order.
    pub const ALL: [ShopItem; 24] = [
        ShopItem::ExtraBullet,
        ShopItem::RefillMagazine,
        ShopItem::ApAmmo,
        ShopItem::ExplosiveAmmo,
        ShopItem::RepurchaseGun,
        ShopItem::Grease,
        ShopItem::Sight,
        ShopItem::SafetyLock,
        ShopItem::Silencer,
        ShopItem::FourLeafClover,
        ShopItem::Sunglasses,
        ShopItem::SpareClothes,
        ShopItem::BrushForGun,
        ShopItem::Mirror,
        ShopItem::HandfulOfSand,
        ShopItem::WaterBucket,
        ShopItem::Sabotage,
        ShopItem::LifeInsurance,
        ShopItem::LiabilityInsurance,
        ShopItem::PieceOfBread,
        ShopItem::DucksDetector,
        ShopItem::UpgradeMagazine,
        ShopItem::ExtraMagazine,
        ShopItem::DuckCall,
    ];

    /// Item for a catalog number (1-based).
    pub fn from_id(id: u32) -> Option<Self> {
        let idx = usize::try_from(id).ok()?.checked_sub(1)?;
        Self::ALL.get(idx).copied()
    }

    /// Catalog number (1-based).
    pub fn id(self) -> u32 {
        Self::ALL.iter().position(|i| *i == self).map_or(0, |p| p as u32 + 1)
    }

    /// Display name.
    pub fn name(self) -> &'static str {
        match self {
            ShopItem::ExtraBullet => "Extra bullet",
            ShopItem::RefillMagazine => "Refill magazine",
            ShopItem::ApAmmo => "AP ammo",
            ShopItem::ExplosiveAmmo => "Explosive ammo",
            ShopItem::RepurchaseGun => "Repurchase confiscated gun",
            ShopItem::Grease => "Grease",
            ShopItem::Sight => "Sight",
            ShopItem::SafetyLock => "Safety Lock",
            ShopItem::Silencer => "Silencer",
            ShopItem::FourLeafClover => "Four-leaf clover",
            ShopItem::Sunglasses => "Sunglasses",
            ShopItem::SpareClothes => "Spare clothes",
            ShopItem::BrushForGun => "Brush for gun",
            ShopItem::Mirror => "Mirror",
            ShopItem::HandfulOfSand => "Handful of sand",
            ShopItem::WaterBucket => "Water bucket",
            ShopItem::Sabotage => "Sabotage",
            ShopItem::LifeInsurance => "Life insurance",
            ShopItem::LiabilityInsurance => "Liability insurance",
            ShopItem::PieceOfBread => "Piece of bread",
            ShopItem::DucksDetector => "Ducks detector",
            ShopItem::UpgradeMagazine => "Upgrade Magazine",
            ShopItem::ExtraMagazine => "Extra Magazine",
            ShopItem::DuckCall => "Duck Call",
        }
    }

    /// The item acts on another player.
    pub fn needs_target(self) -> bool {
        matches!(
            self,
            ShopItem::Mirror | ShopItem::HandfulOfSand | ShopItem::WaterBucket | ShopItem::Sabotage
        )
    }

    /// XP cost for this buyer.
    pub fn cost(self, prices: &ShopPrices, buyer: &PlayerChannelRecord) -> u32 {
        match self {
            ShopItem::ExtraBullet => prices.extra_bullet,
            ShopItem::RefillMagazine => prices.extra_magazine,
            ShopItem::ApAmmo => prices.ap_ammo,
            ShopItem::ExplosiveAmmo => prices.explosive_ammo,
            ShopItem::RepurchaseGun => prices.repurchase_gun,
            ShopItem::Grease => prices.grease,
            ShopItem::Sight => prices.sight,
            ShopItem::SafetyLock => prices.infrared_detector,
            ShopItem::Silencer => prices.silencer,
            ShopItem::FourLeafClover => prices.four_leaf_clover,
            ShopItem::Sunglasses => prices.sunglasses,
            ShopItem::SpareClothes => prices.spare_clothes,
            ShopItem::BrushForGun => prices.brush_for_gun,
            ShopItem::Mirror => prices.mirror,
            ShopItem::HandfulOfSand => prices.handful_of_sand,
            ShopItem::WaterBucket => prices.water_bucket,
            ShopItem::Sabotage => prices.sabotage,
            ShopItem::LifeInsurance => prices.life_insurance,
            ShopItem::LiabilityInsurance => prices.liability_insurance,
            ShopItem::PieceOfBread => prices.piece_of_bread,
            ShopItem::DucksDetector => prices.ducks_detector,
            ShopItem::UpgradeMagazine => upgrade_cost(buyer.mag_upgrade_level),
            ShopItem::ExtraMagazine => upgrade_cost(buyer.mag_capacity_level),
            ShopItem::DuckCall => prices.duck_call,
        }
    }

    /// Stacking suppression rule.
    pub fn stacking(self) -> StackingPolicy {
        match self {
            ShopItem::ApAmmo => StackingPolicy::Count(Charge::ArmorPiercing),
            ShopItem::ExplosiveAmmo => StackingPolicy::Count(Charge::Explosive),
            ShopItem::PieceOfBread => StackingPolicy::Count(Charge::Bread),
            ShopItem::Sight => StackingPolicy::OneShot,
            ShopItem::SafetyLock => StackingPolicy::DurationWithUses,
            ShopItem::Grease => StackingPolicy::Duration(TimedModifier::Grease),
            ShopItem::Silencer => StackingPolicy::Duration(TimedModifier::Silencer),
            ShopItem::FourLeafClover => StackingPolicy::Duration(TimedModifier::Clover),
            ShopItem::Sunglasses => StackingPolicy::Duration(TimedModifier::Sunglasses),
            ShopItem::LifeInsurance => StackingPolicy::Duration(TimedModifier::LifeInsurance),
            ShopItem::LiabilityInsurance => {
                StackingPolicy::Duration(TimedModifier::LiabilityInsurance)
            }
            ShopItem::DucksDetector => StackingPolicy::Duration(TimedModifier::DucksDetector),
            _ => StackingPolicy::Stackable,
        }
    }

    fn already_active_notice(self) -> String {
        match self.stacking() {
            StackingPolicy::Count(_) | StackingPolicy::DurationWithUses => {
                format!("{} already active. Use it up before buying more.", self.name())
            }
            StackingPolicy::OneShot => {
                "Sight already mounted for your next shot. Use it before buying more.".to_string()
            }
            StackingPolicy::Duration(TimedModifier::Grease) => {
                "Grease already applied. Wait until it wears off to buy more.".to_string()
            }
            StackingPolicy::Duration(TimedModifier::Sunglasses) => {
                "Sunglasses already active. Wait until they wear off to buy more.".to_string()
            }
            _ => format!("{} already active. Wait until it expires to buy again.", self.name()),
        }
    }
}

// =============================================================================
// PURCHASES
// =============================================================================

/// The record a targeted item acts on.
#[derive(Debug)]
pub enum Target<'a> {
    /// No target was named.
    Missing,
    /// The buyer named themselves.
    Buyer,
    /// Another player's record.
    Other {
        /// Target nick as typed.
        nick: &'a str,
        /// Target record.
        record: &'a mut PlayerChannelRecord,
    },
}

/// Follow-up work for the engine after a purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShopEffect {
    /// Inject burst spawns into the channel schedule.
    DuckCall {
        /// Ducks summoned.
        ducks: u32,
    },
    /// Ducks detector switched on; warn immediately if a spawn is close.
    DetectorActivated,
}

/// Result of one purchase attempt.
#[derive(Debug, Default)]
pub struct Receipt {
    /// Text for the buyer / channel.
    pub replies: Vec<Reply>,
    /// XP was kept (the purchase went through).
    pub charged: bool,
    /// Another player's record changed and must be saved.
    pub target_changed: bool,
    /// Engine follow-up.
    pub effect: Option<ShopEffect>,
}

/// Buyer-side context of a purchase.
#[derive(Debug, Clone, Copy)]
pub struct PurchaseContext<'a> {
    /// Buyer nick.
    pub nick: &'a str,
    /// Channel name for messages.
    pub channel: &'a str,
    /// Current time.
    pub now: Timestamp,
}

struct Applied {
    text: String,
    effect: Option<ShopEffect>,
    target_changed: bool,
}

impl Applied {
    fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            effect: None,
            target_changed: false,
        }
    }
}

/// Applies catalog items to records.
#[derive(Debug, Clone, Copy)]
pub struct ShopEngine<'a> {
    prices: &'a ShopPrices,
    levels: &'a LevelTable,
}

impl<'a> ShopEngine<'a> {
    /// Shop over a price list and level table.
    pub fn new(prices: &'a ShopPrices, levels: &'a LevelTable) -> Self {
        Self { prices, levels }
    }

    /// Catalog listing for a buyer, split into chat-sized lines.
    pub fn catalog(&self, buyer: &PlayerChannelRecord) -> Vec<String> {
        let mut lines = vec![format!(
            "[Duck Hunt] Purchasable items [XP: {}]:",
            buyer.xp as i64
        )];

        let mut current = String::new();
        for item in ShopItem::ALL {
            let entry = format!("{}- {} ({} xp)", item.id(), item.name(), item.cost(self.prices, buyer));
            if !current.is_empty() && current.len() + 3 + entry.len() > CATALOG_LINE_LIMIT {
                lines.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push_str(" | ");
            }
            current.push_str(&entry);
        }
        if !current.is_empty() {
            lines.push(current);
        }
        lines.push("Syntax: !shop [id [target]]".to_string());
        lines
    }

    /// Buy `item` for `buyer`.
    pub fn purchase(
        &self,
        ctx: PurchaseContext<'_>,
        item: ShopItem,
        buyer: &mut PlayerChannelRecord,
        target: Target<'_>,
        dice: &mut dyn Dice,
    ) -> Receipt {
        let mut receipt = Receipt::default();
        let cost = item.cost(self.prices, buyer);

        if buyer.xp < f64::from(cost) {
            receipt.replies.push(Reply::Private(format!(
                "You don't have enough XP in {}. You need {} xp.",
                ctx.channel, cost
            )));
            return receipt;
        }

        if item.stacking().is_active(buyer, ctx.now) {
            receipt.replies.push(Reply::Private(item.already_active_notice()));
            return receipt;
        }

        let prev_xp = buyer.xp;
        buyer.sub_xp(f64::from(cost));

        let result = if item.needs_target() {
            match target {
                Target::Missing => Err(Reply::Private(format!("Usage: !shop {} <nick>", item.id()))),
                Target::Buyer => self.apply_targeted(ctx, item, ctx.nick, buyer),
                Target::Other { nick, record } => self.apply_targeted(ctx, item, nick, record),
            }
        } else {
            self.apply(ctx, item, buyer, dice)
        };

        match result {
            Ok(applied) => {
                let summary = format!("[-{} XP] [XP: {}]", cost, buyer.xp as i64);
                receipt.replies.push(Reply::to_player(
                    ctx.nick,
                    format!("{} {}", applied.text, summary),
                ));
                receipt.charged = true;
                receipt.target_changed = applied.target_changed;
                receipt.effect = applied.effect;
                if let Some(change) = progression::settle(self.levels, buyer, prev_xp) {
                    receipt.replies.push(Reply::to_player(ctx.nick, change.describe(ctx.channel)));
                }
            }
            Err(refusal) => {
                buyer.xp = prev_xp;
                receipt.replies.push(refusal);
            }
        }
        receipt
    }

    fn apply(
        &self,
        ctx: PurchaseContext<'_>,
        item: ShopItem,
        buyer: &mut PlayerChannelRecord,
        dice: &mut dyn Dice,
    ) -> Result<Applied, Reply> {
        let now = ctx.now;
        let refuse = |text: &str| Reply::to_player(ctx.nick, text);

        let applied = match item {
            ShopItem::ExtraBullet => {
                if buyer.ammo >= buyer.magazine_capacity {
                    return Err(refuse("Your magazine is already full."));
                }
                buyer.ammo += 1;
                Applied::new(format!(
                    "You just added an extra bullet. | Ammo: {}/{}",
                    buyer.ammo, buyer.magazine_capacity
                ))
            }
            ShopItem::RefillMagazine => {
                if buyer.magazines >= buyer.magazines_max {
                    return Err(refuse("You already have the maximum magazines."));
                }
                buyer.magazines += 1;
                Applied::new(format!(
                    "You just added an extra magazine. | Magazines: {}/{}",
                    buyer.magazines, buyer.magazines_max
                ))
            }
            ShopItem::ApAmmo => {
                let switched = buyer.explosive_shots > 0;
                buyer.explosive_shots = 0;
                buyer.ap_shots = AMMO_CHARGES;
                Applied::new(if switched {
                    "You switched to AP ammo. Next 20 shots are AP."
                } else {
                    "You purchased AP ammo. Next 20 shots deal extra damage to golden ducks."
                })
            }
            ShopItem::ExplosiveAmmo => {
                let switched = buyer.ap_shots > 0;
                buyer.ap_shots = 0;
                buyer.explosive_shots = AMMO_CHARGES;
                Applied::new(if switched {
                    "You switched to explosive ammo. Next 20 shots are explosive."
                } else {
                    "You purchased explosive ammo. Next 20 shots deal extra damage to golden ducks."
                })
            }
            ShopItem::RepurchaseGun => {
                if !buyer.confiscated {
                    return Err(refuse("Your gun is not confiscated."));
                }
                buyer.confiscated = false;
                buyer.ammo = buyer.magazine_capacity;
                buyer.magazines = buyer.magazines_max;
                Applied::new(format!(
                    "You repurchased your confiscated gun. | {}",
                    weapon_status(buyer.ammo, buyer.magazine_capacity, buyer.magazines, buyer.magazines_max)
                ))
            }
            ShopItem::Grease => {
                buyer.grease_until = now + DAY;
                Applied::new("You purchased grease. Your gun will jam half as often for 24h.")
            }
            ShopItem::Sight => {
                buyer.sight_next_shot = true;
                Applied::new("You purchased a sight. Your next shot will be more accurate.")
            }
            ShopItem::SafetyLock => {
                buyer.trigger_lock_until = now + DAY;
                buyer.trigger_lock_uses = SAFETY_LOCK_USES;
                Applied::new("Safety Lock enabled for 24h00m. Safety lock has 6 uses.")
            }
            ShopItem::Silencer => {
                buyer.silencer_until = now + DAY;
                Applied::new("You purchased a silencer. It will prevent frightening ducks for 24h.")
            }
            ShopItem::FourLeafClover => {
                let bonus = dice.int_inclusive(1, 10) as u32;
                buyer.clover_bonus = bonus;
                buyer.clover_until = now + DAY;
                Applied::new(format!("Four-leaf clover activated for 24h. +{} XP per duck.", bonus))
            }
            ShopItem::Sunglasses => {
                buyer.sunglasses_until = now + DAY;
                Applied::new("You put on sunglasses for 24h. You're protected against mirror glare.")
            }
            ShopItem::SpareClothes => {
                let soaked = buyer.is_active(TimedModifier::Soaked, now);
                let egged = buyer.egged;
                if !soaked && !egged {
                    return Err(Reply::Private(
                        "You're not soaked or covered in egg. Refunding XP.".to_string(),
                    ));
                }
                let mut states = Vec::new();
                if soaked {
                    buyer.soaked_until = 0.0;
                    states.push("soaked");
                }
                if egged {
                    buyer.egged = false;
                    states.push("covered in egg");
                }
                Applied::new(format!(
                    "You change into spare clothes. You're no longer {}.",
                    states.join(" and ")
                ))
            }
            ShopItem::BrushForGun => {
                buyer.jammed = false;
                if buyer.is_active(TimedModifier::Sand, now) {
                    buyer.sand_until = 0.0;
                }
                buyer.brush_until = buyer.brush_until.max(now + DAY);
                Applied::new("You clean your gun and remove sand. It feels smoother for 24h.")
            }
            ShopItem::LifeInsurance => {
                buyer.life_insurance_until = now + DAY;
                Applied::new("You purchase life insurance. Confiscations will be prevented for 24h.")
            }
            ShopItem::LiabilityInsurance => {
                buyer.liability_insurance_until = now + DAY;
                Applied::new("You purchase liability insurance. Penalties reduced by 50% for 24h.")
            }
            ShopItem::PieceOfBread => {
                buyer.bread_uses = BREAD_CHARGES;
                Applied::new("You purchased bread. Next 20 befriends are more effective.")
            }
            ShopItem::DucksDetector => {
                buyer.ducks_detector_until = now + 4.0 * HOUR;
                let mut applied =
                    Applied::new("Ducks detector activated for 4h. You'll get a 60s pre-spawn notice.");
                applied.effect = Some(ShopEffect::DetectorActivated);
                applied
            }
            ShopItem::UpgradeMagazine => {
                if buyer.mag_upgrade_level >= MAX_UPGRADE_LEVEL {
                    return Err(refuse("Your magazine is already fully upgraded."));
                }
                buyer.mag_upgrade_level += 1;
                buyer.refresh_capacity(self.levels);
                Applied::new(format!(
                    "Upgrade applied. Magazine capacity increased to {}.",
                    buyer.magazine_capacity
                ))
            }
            ShopItem::ExtraMagazine => {
                if buyer.mag_capacity_level >= MAX_UPGRADE_LEVEL {
                    return Err(refuse("You already carry the maximum extra magazines."));
                }
                buyer.mag_capacity_level += 1;
                buyer.refresh_capacity(self.levels);
                buyer.magazines = (buyer.magazines + 1).min(buyer.magazines_max);
                Applied::new(format!(
                    "Upgrade applied. You can now carry {} magazines.",
                    buyer.magazines_max
                ))
            }
            ShopItem::DuckCall => {
                let ducks = burst_size(dice);
                let mut applied =
                    Applied::new("You use the duck call. *QUACK* Duck(s) may arrive any minute now.");
                applied.effect = Some(ShopEffect::DuckCall { ducks });
                applied
            }
            ShopItem::Mirror | ShopItem::HandfulOfSand | ShopItem::WaterBucket | ShopItem::Sabotage => {
                return Err(Reply::Private(format!("Usage: !shop {} <nick>", item.id())));
            }
        };
        Ok(applied)
    }

    fn apply_targeted(
        &self,
        ctx: PurchaseContext<'_>,
        item: ShopItem,
        target_nick: &str,
        target: &mut PlayerChannelRecord,
    ) -> Result<Applied, Reply> {
        let now = ctx.now;
        let text = match item {
            ShopItem::Mirror => {
                if target.is_active(TimedModifier::Sunglasses, now) {
                    return Err(Reply::to_player(
                        ctx.nick,
                        format!("{} is wearing sunglasses. The mirror has no effect.", target_nick),
                    ));
                }
                target.mirror_until = target.mirror_until.max(now + DAY);
                format!("You dazzle {} with a mirror for 24h. Their accuracy is reduced.", target_nick)
            }
            ShopItem::HandfulOfSand => {
                target.sand_until = target.sand_until.max(now + HOUR);
                format!("You throw sand into {}'s gun. Their gun will jam more for 1h.", target_nick)
            }
            ShopItem::WaterBucket => {
                if target.is_active(TimedModifier::Soaked, now) {
                    return Err(Reply::Private(format!(
                        "{} is already soaked. Refunding XP.",
                        target_nick
                    )));
                }
                target.soaked_until = now + HOUR;
                format!(
                    "You soak {} with a water bucket. They're out for 1h unless they change clothes.",
                    target_nick
                )
            }
            ShopItem::Sabotage => {
                target.jammed = true;
                format!("You sabotage {}'s weapon. It's jammed.", target_nick)
            }
            other => {
                return Err(Reply::Private(format!("{} cannot be used on another player.", other.name())));
            }
        };
        Ok(Applied {
            text,
            effect: None,
            target_changed: true,
        })
    }
}
