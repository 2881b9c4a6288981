//! Player Channel Records
//!
//! Persistent per-(player, network, channel) hunting state. Records are
//! created lazily with starting-tier defaults and are always complete once
//! loaded; storage backends run [`PlayerChannelRecord::normalize`] on every
//! record they read from disk.
//!
//! Partial updates address fields through the closed [`RecordField`]
//! enumeration so a backend can never be asked to write an unknown column.

use serde::{Deserialize, Serialize};

use crate::core::clock::Timestamp;
use crate::game::level::LevelTable;

/// Highest purchasable magazine upgrade level.
pub const MAX_UPGRADE_LEVEL: u32 = 5;

/// Hunting state of one player in one channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerChannelRecord {
    /// Experience, never negative.
    pub xp: f64,
    /// Rounds in the current magazine.
    pub ammo: u32,
    /// Spare magazines.
    pub magazines: u32,
    /// Rounds per magazine (derived).
    pub magazine_capacity: u32,
    /// Spare magazine limit (derived).
    pub magazines_max: u32,
    /// Purchased magazine size upgrades.
    pub mag_upgrade_level: u32,
    /// Purchased extra magazine slots.
    pub mag_capacity_level: u32,

    /// Gun jammed; `!reload` clears it.
    pub jammed: bool,
    /// Gun taken away until the next duck leaves.
    pub confiscated: bool,
    /// Gun sabotaged; `!reload` fixes it.
    pub sabotaged: bool,
    /// Covered in egg; blocks shooting and befriending.
    pub egged: bool,

    /// Ducks killed.
    pub ducks_shot: u64,
    /// Golden ducks killed.
    pub golden_ducks: u64,
    /// Shots that missed a present duck.
    pub misses: u64,
    /// Hunting accidents caused.
    pub accidents: u64,
    /// Shots fired with no duck around.
    pub wild_fires: u64,
    /// Rounds fired.
    pub shots_fired: u64,
    /// Ducks befriended.
    pub befriended_ducks: u64,

    /// Remaining bread charges (befriend boost).
    pub bread_uses: u32,
    /// Remaining armor piercing rounds.
    pub ap_shots: u32,
    /// Remaining explosive rounds.
    pub explosive_shots: u32,

    /// Greased gun: fewer jams.
    pub grease_until: Timestamp,
    /// Silencer fitted.
    pub silencer_until: Timestamp,
    /// Sunglasses: immune to mirror glare.
    pub sunglasses_until: Timestamp,
    /// Mirror: dazzles whoever shoots this player.
    pub mirror_until: Timestamp,
    /// Sand in the gun: more jams.
    pub sand_until: Timestamp,
    /// Soaked: cannot shoot or befriend.
    pub soaked_until: Timestamp,
    /// Life insurance: no confiscation on accidents.
    pub life_insurance_until: Timestamp,
    /// Liability insurance: halves accident penalties.
    pub liability_insurance_until: Timestamp,
    /// Gun brush: better reliability.
    pub brush_until: Timestamp,
    /// Four-leaf clover: bonus XP per duck.
    pub clover_until: Timestamp,
    /// Duck detector: warned before spawns.
    pub ducks_detector_until: Timestamp,
    /// Trigger lock: blocks wild fire.
    pub trigger_lock_until: Timestamp,
    /// Wild shots the trigger lock still blocks.
    pub trigger_lock_uses: u32,
    /// XP bonus granted by the clover.
    pub clover_bonus: u32,
    /// Sight mounted for the next shot.
    pub sight_next_shot: bool,

    /// Fastest kill in seconds.
    pub best_time: Option<f64>,
    /// Sum of kill reaction times, seconds.
    pub total_reaction_time: f64,
    /// When this player last shot or befriended a duck.
    pub last_duck_time: Timestamp,
    /// When this player last threw an egg.
    pub last_egg_time: Timestamp,
}

impl Default for PlayerChannelRecord {
    fn default() -> Self {
        Self::fresh(&LevelTable::default())
    }
}

impl PlayerChannelRecord {
    /// Starting-tier record for a new player.
    pub fn fresh(levels: &LevelTable) -> Self {
        let tier = levels.tier_for(0.0);
        Self {
            xp: 0.0,
            ammo: tier.magazine_capacity,
            magazines: tier.magazines_max,
            magazine_capacity: tier.magazine_capacity,
            magazines_max: tier.magazines_max,
            mag_upgrade_level: 0,
            mag_capacity_level: 0,
            jammed: false,
            confiscated: false,
            sabotaged: false,
            egged: false,
            ducks_shot: 0,
            golden_ducks: 0,
            misses: 0,
            accidents: 0,
            wild_fires: 0,
            shots_fired: 0,
            befriended_ducks: 0,
            bread_uses: 0,
            ap_shots: 0,
            explosive_shots: 0,
            grease_until: 0.0,
            silencer_until: 0.0,
            sunglasses_until: 0.0,
            mirror_until: 0.0,
            sand_until: 0.0,
            soaked_until: 0.0,
            life_insurance_until: 0.0,
            liability_insurance_until: 0.0,
            brush_until: 0.0,
            clover_until: 0.0,
            ducks_detector_until: 0.0,
            trigger_lock_until: 0.0,
            trigger_lock_uses: 0,
            clover_bonus: 0,
            sight_next_shot: false,
            best_time: None,
            total_reaction_time: 0.0,
            last_duck_time: 0.0,
            last_egg_time: 0.0,
        }
    }

    /// Add (or with a negative delta, remove) XP, flooring at zero.
    pub fn add_xp(&mut self, delta: f64) {
        let next = self.xp + delta;
        self.xp = if next.is_finite() { next.max(0.0) } else { 0.0 };
    }

    /// Remove XP, flooring at zero.
    pub fn sub_xp(&mut self, amount: f64) {
        self.add_xp(-amount);
    }

    /// Recompute the derived capacity fields from the tier and upgrades.
    pub fn refresh_capacity(&mut self, levels: &LevelTable) {
        let tier = levels.tier_for(self.xp);
        self.magazine_capacity = tier.magazine_capacity + self.mag_upgrade_level;
        self.magazines_max = tier.magazines_max + self.mag_capacity_level;
    }

    /// Repair a record read from storage so every invariant holds.
    pub fn normalize(&mut self, levels: &LevelTable) {
        if !self.xp.is_finite() || self.xp < 0.0 {
            self.xp = 0.0;
        }
        self.mag_upgrade_level = self.mag_upgrade_level.min(MAX_UPGRADE_LEVEL);
        self.mag_capacity_level = self.mag_capacity_level.min(MAX_UPGRADE_LEVEL);
        self.refresh_capacity(levels);
        self.ammo = self.ammo.min(self.magazine_capacity);
        self.magazines = self.magazines.min(self.magazines_max);
    }

    /// Whether a timed modifier is running at `now`.
    pub fn is_active(&self, modifier: TimedModifier, now: Timestamp) -> bool {
        modifier.expiry(self) > now
    }

    /// Safety lock is on and still has uses.
    pub fn safety_lock_active(&self, now: Timestamp) -> bool {
        self.trigger_lock_until > now && self.trigger_lock_uses > 0
    }

    /// Mirror glare applies: mirror active and no sunglasses to counter it.
    pub fn dazzled(&self, now: Timestamp) -> bool {
        self.is_active(TimedModifier::Mirror, now) && !self.is_active(TimedModifier::Sunglasses, now)
    }

    /// Every field with its current value.
    pub fn fields(&self) -> Vec<(RecordField, FieldValue)> {
        RecordField::ALL.iter().map(|f| (*f, f.read(self))).collect()
    }

    /// Fields whose value differs from `before`.
    pub fn changes_since(&self, before: &Self) -> Vec<(RecordField, FieldValue)> {
        RecordField::ALL
            .iter()
            .filter_map(|f| {
                let now = f.read(self);
                (now != f.read(before)).then_some((*f, now))
            })
            .collect()
    }

    /// Apply a partial update. Values of the wrong type are skipped and
    /// reported back.
    pub fn apply(&mut self, fields: &[(RecordField, FieldValue)]) -> Vec<RecordField> {
        fields
            .iter()
            .filter(|(field, value)| !field.write(self, *value))
            .map(|(field, _)| *field)
            .collect()
    }
}

// =============================================================================
// TIMED MODIFIERS
// =============================================================================

/// Modifiers stored as an absolute expiry timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimedModifier {
    Grease,
    Silencer,
    Sunglasses,
    Mirror,
    Sand,
    Soaked,
    LifeInsurance,
    LiabilityInsurance,
    Brush,
    Clover,
    DucksDetector,
    TriggerLock,
}

impl TimedModifier {
    /// Expiry timestamp on a record.
    pub fn expiry(self, record: &PlayerChannelRecord) -> Timestamp {
        match self {
            Self::Grease => record.grease_until,
            Self::Silencer => record.silencer_until,
            Self::Sunglasses => record.sunglasses_until,
            Self::Mirror => record.mirror_until,
            Self::Sand => record.sand_until,
            Self::Soaked => record.soaked_until,
            Self::LifeInsurance => record.life_insurance_until,
            Self::LiabilityInsurance => record.liability_insurance_until,
            Self::Brush => record.brush_until,
            Self::Clover => record.clover_until,
            Self::DucksDetector => record.ducks_detector_until,
            Self::TriggerLock => record.trigger_lock_until,
        }
    }

    /// Mutable expiry timestamp on a record.
    pub fn expiry_mut(self, record: &mut PlayerChannelRecord) -> &mut Timestamp {
        match self {
            Self::Grease => &mut record.grease_until,
            Self::Silencer => &mut record.silencer_until,
            Self::Sunglasses => &mut record.sunglasses_until,
            Self::Mirror => &mut record.mirror_until,
            Self::Sand => &mut record.sand_until,
            Self::Soaked => &mut record.soaked_until,
            Self::LifeInsurance => &mut record.life_insurance_until,
            Self::LiabilityInsurance => &mut record.liability_insurance_until,
            Self::Brush => &mut record.brush_until,
            Self::Clover => &mut record.clover_until,
            Self::DucksDetector => &mut record.ducks_detector_until,
            Self::TriggerLock => &mut record.trigger_lock_until,
        }
    }
}

// =============================================================================
// FIELD ADDRESSING
// =============================================================================

/// Typed value of one record field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    /// Flag.
    Bool(bool),
    /// Counter or integer amount.
    Int(i64),
    /// Real number or timestamp.
    Real(f64),
    /// Unset optional value.
    Null,
}

/// Conversion between a record field's Rust type and [`FieldValue`].
trait FieldCodec: Sized {
    fn encode(&self) -> FieldValue;
    fn decode(value: FieldValue) -> Option<Self>;
}

impl FieldCodec for bool {
    fn encode(&self) -> FieldValue {
        FieldValue::Bool(*self)
    }
    fn decode(value: FieldValue) -> Option<Self> {
        match value {
            FieldValue::Bool(b) => Some(b),
            FieldValue::Int(i) => Some(i != 0),
            _ => None,
        }
    }
}

impl FieldCodec for u32 {
    fn encode(&self) -> FieldValue {
        FieldValue::Int(i64::from(*self))
    }
    fn decode(value: FieldValue) -> Option<Self> {
        match value {
            FieldValue::Int(i) => Some(i.clamp(0, i64::from(u32::MAX)) as u32),
            _ => None,
        }
    }
}

impl FieldCodec for u64 {
    fn encode(&self) -> FieldValue {
        FieldValue::Int(*self as i64)
    }
    fn decode(value: FieldValue) -> Option<Self> {
        match value {
            FieldValue::Int(i) => Some(i.max(0) as u64),
            _ => None,
        }
    }
}

impl FieldCodec for f64 {
    fn encode(&self) -> FieldValue {
        FieldValue::Real(*self)
    }
    fn decode(value: FieldValue) -> Option<Self> {
        match value {
            FieldValue::Real(r) => Some(r),
            FieldValue::Int(i) => Some(i as f64),
            _ => None,
        }
    }
}

impl FieldCodec for Option<f64> {
    fn encode(&self) -> FieldValue {
        self.map_or(FieldValue::Null, FieldValue::Real)
    }
    fn decode(value: FieldValue) -> Option<Self> {
        match value {
            FieldValue::Null => Some(None),
            other => f64::decode(other).map(Some),
        }
    }
}

macro_rules! record_fields {
    ($($variant:ident => $field:ident),* $(,)?) => {
        /// Closed set of persisted record fields.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[allow(missing_docs)]
        pub enum RecordField {
            $($variant),*
        }

        impl RecordField {
            /// Every field, in storage order.
            pub const ALL: &'static [RecordField] = &[$(RecordField::$variant),*];

            /// Column / key name.
            pub fn name(self) -> &'static str {
                match self {
                    $(RecordField::$variant => stringify!($field)),*
                }
            }

            /// Look a field up by column name.
            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $(stringify!($field) => Some(RecordField::$variant),)*
                    _ => None,
                }
            }

            /// Read the field from a record.
            pub fn read(self, record: &PlayerChannelRecord) -> FieldValue {
                match self {
                    $(RecordField::$variant => record.$field.encode()),*
                }
            }

            /// Write the field; false when the value has the wrong type.
            pub fn write(self, record: &mut PlayerChannelRecord, value: FieldValue) -> bool {
                match self {
                    $(RecordField::$variant => match FieldCodec::decode(value) {
                        Some(v) => {
                            record.$field = v;
                            true
                        }
                        None => false,
                    }),*
                }
            }
        }
    };
}

record_fields! {
    Xp => xp,
    Ammo => ammo,
    Magazines => magazines,
    MagazineCapacity => magazine_capacity,
    MagazinesMax => magazines_max,
    MagUpgradeLevel => mag_upgrade_level,
    MagCapacityLevel => mag_capacity_level,
    Jammed => jammed,
    Confiscated => confiscated,
    Sabotaged => sabotaged,
    Egged => egged,
    DucksShot => ducks_shot,
    GoldenDucks => golden_ducks,
    Misses => misses,
    Accidents => accidents,
    WildFires => wild_fires,
    ShotsFired => shots_fired,
    BefriendedDucks => befriended_ducks,
    BreadUses => bread_uses,
    ApShots => ap_shots,
    ExplosiveShots => explosive_shots,
    GreaseUntil => grease_until,
    SilencerUntil => silencer_until,
    SunglassesUntil => sunglasses_until,
    MirrorUntil => mirror_until,
    SandUntil => sand_until,
    SoakedUntil => soaked_until,
    LifeInsuranceUntil => life_insurance_until,
    LiabilityInsuranceUntil => liability_insurance_until,
    BrushUntil => brush_until,
    CloverUntil => clover_until,
    DucksDetectorUntil => ducks_detector_until,
    TriggerLockUntil => trigger_lock_until,
    TriggerLockUses => trigger_lock_uses,
    CloverBonus => clover_bonus,
    SightNextShot => sight_next_shot,
    BestTime => best_time,
    TotalReactionTime => total_reaction_time,
    LastDuckTime => last_duck_time,
    LastEggTime => last_egg_time,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_fresh_defaults() {
        let record = PlayerChannelRecord::default();
        assert_eq!(record.xp, 0.0);
        assert_eq!(record.ammo, 6);
        assert_eq!(record.magazines, 2);
        assert_eq!(record.magazine_capacity, 6);
        assert_eq!(record.magazines_max, 2);
        assert!(record.best_time.is_none());
    }

    #[test]
    fn test_xp_floor() {
        let mut record = PlayerChannelRecord::default();
        record.xp = 3.0;
        record.sub_xp(10.0);
        assert_eq!(record.xp, 0.0);
        record.add_xp(-1.0);
        assert_eq!(record.xp, 0.0);
        record.add_xp(12.5);
        assert_eq!(record.xp, 12.5);
    }

    #[test]
    fn test_refresh_capacity_with_upgrades() {
        let levels = LevelTable::default();
        let mut record = PlayerChannelRecord::default();
        record.xp = 300.0; // level 7: 4 rounds, 3 mags
        record.mag_upgrade_level = 2;
        record.mag_capacity_level = 1;
        record.refresh_capacity(&levels);
        assert_eq!(record.magazine_capacity, 6);
        assert_eq!(record.magazines_max, 4);
    }

    #[test]
    fn test_normalize_repairs_invariants() {
        let levels = LevelTable::default();
        let mut record = PlayerChannelRecord::default();
        record.xp = -40.0;
        record.ammo = 999;
        record.magazines = 50;
        record.mag_upgrade_level = 9;
        record.normalize(&levels);

        assert_eq!(record.xp, 0.0);
        assert_eq!(record.mag_upgrade_level, MAX_UPGRADE_LEVEL);
        assert_eq!(record.magazine_capacity, 11);
        assert_eq!(record.ammo, 11);
        assert_eq!(record.magazines, 2);
    }

    #[test]
    fn test_serde_fills_missing_fields() {
        let record: PlayerChannelRecord =
            serde_json::from_str(r#"{"xp": 42.0, "ducks_shot": 3, "unknown_legacy": true}"#).unwrap();
        assert_eq!(record.xp, 42.0);
        assert_eq!(record.ducks_shot, 3);
        assert_eq!(record.ammo, 6);
    }

    #[test]
    fn test_field_names_round_trip() {
        for field in RecordField::ALL {
            assert_eq!(RecordField::from_name(field.name()), Some(*field));
        }
        assert_eq!(RecordField::from_name("password"), None);
    }

    #[test]
    fn test_changes_since_and_apply() {
        let before = PlayerChannelRecord::default();
        let mut after = before.clone();
        after.xp = 10.0;
        after.jammed = true;
        after.best_time = Some(1.25);

        let changes = after.changes_since(&before);
        assert_eq!(changes.len(), 3);

        let mut replay = before.clone();
        let rejected = replay.apply(&changes);
        assert!(rejected.is_empty());
        assert_eq!(replay, after);
    }

    #[test]
    fn test_apply_rejects_mistyped_value() {
        let mut record = PlayerChannelRecord::default();
        let rejected = record.apply(&[
            (RecordField::Jammed, FieldValue::Real(1.5)),
            (RecordField::Ammo, FieldValue::Int(3)),
        ]);
        assert_eq!(rejected, vec![RecordField::Jammed]);
        assert_eq!(record.ammo, 3);
    }

    #[test]
    fn test_dazzled() {
        let mut record = PlayerChannelRecord::default();
        record.mirror_until = 100.0;
        assert!(record.dazzled(50.0));
        record.sunglasses_until = 100.0;
        assert!(!record.dazzled(50.0));
        assert!(!record.dazzled(150.0));
    }

    proptest! {
        #[test]
        fn test_repeated_overdraw_leaves_zero(start in 0.0f64..500.0, extra in 0.1f64..500.0, n in 1usize..5) {
            let mut record = PlayerChannelRecord::default();
            record.xp = start;
            for _ in 0..n {
                record.sub_xp(record.xp + extra);
                prop_assert_eq!(record.xp, 0.0);
            }
        }
    }
}
