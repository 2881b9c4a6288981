//! Combat Resolution
//!
//! Turns `!bang`, `!bef` and `!reload` into outcomes. The resolver works on
//! a record and the duck population the engine already holds locked, so the
//! whole peek, damage and maybe-remove sequence runs without interruption.
//!
//! Random draws happen in a fixed order per pipeline; tests script them.
//!
//! Shoot with a duck present:
//! 1. a round is spent (also on a jam)
//! 2. reliability draw, jam if above the effective reliability
//! 3. accuracy draw, miss if above the effective accuracy
//! 4. on a miss: penalty 1-5, ricochet draw, victim index
//! 5. on a kill: loot draws

use tracing::{debug, info};

use crate::core::clock::Timestamp;
use crate::core::key::{same_nick, ChannelKey};
use crate::core::rng::Dice;
use crate::game::duck::{Duck, DuckPopulation};
use crate::game::events::{weapon_status, Reply, FLY_AWAY};
use crate::game::level::LevelTable;
use crate::game::loot;
use crate::game::progression;
use crate::game::record::{PlayerChannelRecord, TimedModifier};
use crate::game::shop::ShopPrices;

/// Wild fire penalty before insurance.
pub const WILD_FIRE_PENALTY: i64 = -2;

/// Penalty for trying to befriend a hostile duck.
pub const THRASH_PENALTY: f64 = 250.0;

/// Mirror glare penalty before insurance.
pub const MIRROR_GLARE_PENALTY: i64 = -1;

const WILD_FIRE_ACCIDENT_CHANCE: f64 = 0.5;
const RICOCHET_CHANCE: f64 = 0.2;
const HISS_ODDS: i64 = 20;

const MIN_ACCURACY: f64 = 0.10;
const MAX_ACCURACY: f64 = 0.99;

// =============================================================================
// CONTEXT
// =============================================================================

/// Who acts, where and when.
#[derive(Debug, Clone, Copy)]
pub struct ActionContext<'a> {
    /// Acting nick.
    pub nick: &'a str,
    /// Channel the action happens in.
    pub key: &'a ChannelKey,
    /// Current time.
    pub now: Timestamp,
    /// The player passed the authentication check.
    pub authenticated: bool,
    /// Users currently in the channel.
    pub occupants: &'a [String],
    /// The bot's own nick, never an accident victim.
    pub bot_nick: &'a str,
}

impl ActionContext<'_> {
    /// Occupants that can be hit by accident: everyone but the actor and the bot.
    pub fn bystanders(&self) -> Vec<String> {
        self.occupants
            .iter()
            .filter(|u| !same_nick(u, self.nick) && !same_nick(u, self.bot_nick))
            .cloned()
            .collect()
    }
}

/// Read access to other players' records for accident side effects.
pub trait VictimLookup {
    /// The victim carries an active mirror in this channel.
    fn mirror_active(&self, victim: &str, key: &ChannelKey, now: Timestamp) -> bool;
}

/// How a duck left the channel during an action.
#[derive(Debug, Clone, PartialEq)]
pub enum Departure {
    /// Shot down.
    Killed(Duck),
    /// Befriended.
    Befriended(Duck),
    /// Fled after thrashing a player.
    Fled(Duck),
}

impl Departure {
    /// The duck counts as the channel's last duck.
    pub fn counts_as_last_duck(&self) -> bool {
        matches!(self, Departure::Killed(_) | Departure::Befriended(_))
    }
}

/// Result of resolving one action.
#[derive(Debug, Default)]
pub struct ActionOutcome {
    /// Messages in send order.
    pub replies: Vec<Reply>,
    /// The record changed and must be saved.
    pub persist: bool,
    /// The head duck left the channel.
    pub departure: Option<Departure>,
}

impl ActionOutcome {
    fn say(&mut self, nick: &str, text: impl AsRef<str>) {
        self.replies.push(Reply::to_player(nick, text));
    }

    fn rejected(nick: &str, text: &str) -> Self {
        let mut outcome = Self::default();
        outcome.say(nick, text);
        outcome
    }
}

/// XP paid for a kill or a befriend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rewards {
    /// Regular duck.
    pub default_xp: i64,
    /// Golden duck.
    pub golden_xp: i64,
}

impl Default for Rewards {
    fn default() -> Self {
        Self {
            default_xp: 10,
            golden_xp: 50,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Accident {
    WildFire,
    Ricochet,
}

fn halve_down(penalty: i64) -> i64 {
    (penalty as f64 / 2.0).floor() as i64
}

// =============================================================================
// RESOLVER
// =============================================================================

/// Applies the combat rules.
#[derive(Debug, Clone, Copy)]
pub struct CombatResolver<'a> {
    levels: &'a LevelTable,
    prices: &'a ShopPrices,
    rewards: Rewards,
}

impl<'a> CombatResolver<'a> {
    /// Resolver over a level table, the shop prices (for loot conversion)
    /// and the kill rewards.
    pub fn new(levels: &'a LevelTable, prices: &'a ShopPrices, rewards: Rewards) -> Self {
        Self {
            levels,
            prices,
            rewards,
        }
    }

    /// Chance the gun fires after grease, sand and brush.
    pub fn effective_reliability(&self, record: &PlayerChannelRecord, now: Timestamp) -> f64 {
        let mut reliability = self.levels.tier_for(record.xp).reliability();
        if record.is_active(TimedModifier::Grease, now) {
            reliability = 1.0 - (1.0 - reliability) * 0.5;
        }
        if record.is_active(TimedModifier::Sand, now) {
            reliability *= 0.5;
        }
        if record.is_active(TimedModifier::Brush, now) {
            reliability += (1.0 - reliability) * 0.10;
        }
        reliability
    }

    /// Hit chance for a shot. Consumes a mounted sight.
    pub fn shot_accuracy(&self, record: &mut PlayerChannelRecord, now: Timestamp) -> f64 {
        let mut accuracy = self.levels.tier_for(record.xp).accuracy();
        if record.explosive_shots > 0 {
            accuracy += (1.0 - accuracy) * 0.25;
        }
        if record.sight_next_shot {
            accuracy += (1.0 - accuracy) / 3.0;
            record.sight_next_shot = false;
        }
        if record.dazzled(now) {
            accuracy *= 0.75;
        }
        accuracy.clamp(MIN_ACCURACY, MAX_ACCURACY)
    }

    /// Chance a befriend attempt lands.
    pub fn befriend_accuracy(&self, record: &PlayerChannelRecord, now: Timestamp) -> f64 {
        let mut accuracy = self.levels.tier_for(record.xp).accuracy();
        if record.bread_uses > 0 {
            accuracy += 0.10;
        }
        if record.dazzled(now) {
            accuracy *= 0.75;
        }
        accuracy.clamp(MIN_ACCURACY, MAX_ACCURACY)
    }

    fn kill_xp(&self, duck: &Duck, record: &PlayerChannelRecord, now: Timestamp) -> i64 {
        let base = if duck.is_golden {
            self.rewards.golden_xp
        } else {
            self.rewards.default_xp
        };
        if record.is_active(TimedModifier::Clover, now) {
            base + i64::from(record.clover_bonus)
        } else {
            base
        }
    }

    fn settle(&self, ctx: &ActionContext<'_>, record: &mut PlayerChannelRecord, prev_xp: f64, outcome: &mut ActionOutcome) {
        if let Some(change) = progression::settle(self.levels, record, prev_xp) {
            info!(nick = ctx.nick, key = %ctx.key, level = change.level, "level changed");
            outcome.say(ctx.nick, change.describe(ctx.key.channel()));
        }
    }

    fn record_reaction(record: &mut PlayerChannelRecord, reaction: f64, now: Timestamp) {
        record.total_reaction_time += reaction;
        if record.best_time.map_or(true, |best| reaction < best) {
            record.best_time = Some(reaction);
        }
        record.last_duck_time = now;
    }

    // -------------------------------------------------------------------------
    // Shoot
    // -------------------------------------------------------------------------

    /// Resolve `!bang`.
    pub fn shoot(
        &self,
        ctx: &ActionContext<'_>,
        record: &mut PlayerChannelRecord,
        ducks: &mut DuckPopulation,
        victims: &dyn VictimLookup,
        dice: &mut dyn Dice,
    ) -> ActionOutcome {
        let nick = ctx.nick;
        let now = ctx.now;

        if !ctx.authenticated {
            return ActionOutcome::rejected(nick, "You must be authenticated to play.");
        }
        if record.confiscated {
            return ActionOutcome::rejected(nick, "You are not armed.");
        }
        if record.jammed {
            return ActionOutcome::rejected(nick, &self.jam_text(record));
        }
        if record.ammo == 0 {
            return ActionOutcome::rejected(
                nick,
                &format!(
                    "*CLICK* EMPTY MAGAZINE | {}",
                    weapon_status(0, record.magazine_capacity, record.magazines, record.magazines_max)
                ),
            );
        }
        if record.is_active(TimedModifier::Soaked, now) {
            return ActionOutcome::rejected(nick, "You are soaked and cannot shoot. Use spare clothes or wait.");
        }
        if record.egged {
            return ActionOutcome::rejected(
                nick,
                "You are covered in egg and cannot shoot. Use spare clothes to clean up.",
            );
        }

        let mut outcome = ActionOutcome {
            persist: true,
            ..ActionOutcome::default()
        };
        let prev_xp = record.xp;

        let Some(duck) = ducks.front(ctx.key).cloned() else {
            if record.safety_lock_active(now) {
                record.trigger_lock_uses -= 1;
                if record.trigger_lock_uses == 0 {
                    record.trigger_lock_until = 0.0;
                }
                outcome.say(
                    nick,
                    format!("*CLICK* Safety locked. [{} remaining]", record.trigger_lock_uses),
                );
                return outcome;
            }
            self.wild_fire(ctx, record, victims, dice, &mut outcome);
            self.settle(ctx, record, prev_xp, &mut outcome);
            return outcome;
        };

        record.ammo -= 1;
        record.shots_fired += 1;

        if dice.unit() > self.effective_reliability(record, now) {
            record.jammed = true;
            debug!(nick, key = %ctx.key, "gun jammed");
            outcome.say(nick, self.jam_text(record));
            return outcome;
        }

        let accuracy = self.shot_accuracy(record, now);
        if dice.unit() > accuracy {
            record.misses += 1;
            let penalty = -dice.int_inclusive(1, 5);
            record.add_xp(penalty as f64);
            outcome.say(nick, format!("*BANG* You missed. [{} xp]", penalty));

            let bystanders = ctx.bystanders();
            if !bystanders.is_empty() && dice.chance(RICOCHET_CHANCE) {
                let victim = &bystanders[dice.index(bystanders.len())];
                self.accident(ctx, record, victim, Accident::Ricochet, victims, &mut outcome);
            }
            self.settle(ctx, record, prev_xp, &mut outcome);
            return outcome;
        }

        let mut damage = 1;
        if duck.is_golden {
            if record.explosive_shots > 0 {
                damage = 2;
                record.explosive_shots -= 1;
            } else if record.ap_shots > 0 {
                damage = 2;
                record.ap_shots -= 1;
            }
        }

        let Some(hit) = ducks.resolve_hit(ctx.key, damage) else {
            // Head vanished between peek and hit; counts as a miss without penalty.
            outcome.say(nick, "*BANG* You missed.");
            return outcome;
        };

        let remaining = hit.health_left.max(0);
        if hit.revealed_now {
            outcome.say(
                nick,
                format!("*BANG* You hit the duck! [GOLDEN DUCK DETECTED] [\\_0< life {}]", remaining),
            );
        } else if !hit.killed {
            outcome.say(nick, format!("*BANG* The golden duck survived! [\\_O< life {}]", remaining));
        }
        if !hit.killed {
            return outcome;
        }

        let reaction = hit.duck.age(now);
        record.ducks_shot += 1;
        if hit.duck.is_golden {
            record.golden_ducks += 1;
        }
        Self::record_reaction(record, reaction, now);
        let xp = self.kill_xp(&hit.duck, record, now);
        record.add_xp(xp as f64);
        info!(nick, key = %ctx.key, golden = hit.duck.is_golden, reaction, "duck shot");

        outcome.say(
            nick,
            format!(
                "*BANG*  You shot down the duck in {:.3}s, which makes you a total of {} ducks on {}. \\_X< *KWAK* [+{} xp]",
                reaction,
                record.ducks_shot,
                ctx.key.channel(),
                xp
            ),
        );
        self.settle(ctx, record, prev_xp, &mut outcome);

        let before_loot = record.xp;
        let owners = ctx.bystanders();
        if let Some(found) = loot::roll(record, self.prices, &owners, now, dice) {
            outcome.say(nick, found);
            self.settle(ctx, record, before_loot, &mut outcome);
        }

        outcome.departure = Some(Departure::Killed(hit.duck));
        outcome
    }

    fn jam_text(&self, record: &PlayerChannelRecord) -> String {
        format!(
            "*CLACK* Your gun is JAMMED you must reload to unjam it... | {}",
            weapon_status(record.ammo, record.magazine_capacity, record.magazines, record.magazines_max)
        )
    }

    fn wild_fire(
        &self,
        ctx: &ActionContext<'_>,
        record: &mut PlayerChannelRecord,
        victims: &dyn VictimLookup,
        dice: &mut dyn Dice,
        outcome: &mut ActionOutcome,
    ) {
        let miss_penalty = -dice.int_inclusive(1, 5);
        let wild_penalty = if record.is_active(TimedModifier::LiabilityInsurance, ctx.now) {
            halve_down(WILD_FIRE_PENALTY)
        } else {
            WILD_FIRE_PENALTY
        };
        record.confiscated = true;
        record.add_xp((miss_penalty + wild_penalty) as f64);
        record.wild_fires += 1;
        info!(nick = ctx.nick, key = %ctx.key, "wild fire, gun confiscated");
        outcome.say(
            ctx.nick,
            format!(
                "Luckily you missed, but what did you aim at? There is no duck in the area... [missed: {} xp] [wild fire: {} xp] [GUN CONFISCATED: wild fire]",
                miss_penalty, wild_penalty
            ),
        );

        let bystanders = ctx.bystanders();
        if !bystanders.is_empty() && dice.chance(WILD_FIRE_ACCIDENT_CHANCE) {
            let victim = &bystanders[dice.index(bystanders.len())];
            self.accident(ctx, record, victim, Accident::WildFire, victims, outcome);
        }
    }

    fn accident(
        &self,
        ctx: &ActionContext<'_>,
        record: &mut PlayerChannelRecord,
        victim: &str,
        kind: Accident,
        victims: &dyn VictimLookup,
        outcome: &mut ActionOutcome,
    ) {
        let now = ctx.now;
        let liability = record.is_active(TimedModifier::LiabilityInsurance, now);
        let mut penalty = self.levels.tier_for(record.xp).accident_penalty;
        if liability && penalty < 0 {
            penalty = halve_down(penalty);
        }
        record.accidents += 1;
        record.add_xp(penalty as f64);

        let insured = record.is_active(TimedModifier::LifeInsurance, now);
        match kind {
            Accident::WildFire if insured => record.confiscated = false,
            Accident::WildFire => {}
            Accident::Ricochet => record.confiscated = !insured,
        }

        let glare = if victims.mirror_active(victim, ctx.key, now)
            && !record.is_active(TimedModifier::Sunglasses, now)
        {
            let extra = if liability {
                halve_down(MIRROR_GLARE_PENALTY)
            } else {
                MIRROR_GLARE_PENALTY
            };
            record.add_xp(extra as f64);
            Some(extra)
        } else {
            None
        };

        info!(nick = ctx.nick, victim, key = %ctx.key, insured, "hunting accident");

        let text = match kind {
            Accident::WildFire => {
                let mut text = format!("ACCIDENT! You accidentally shot {}! [{} xp]", victim, penalty);
                if let Some(extra) = glare {
                    text.push_str(&format!(" [mirror glare: {} xp]", extra));
                }
                if insured {
                    text.push_str(" [INSURED: no confiscation]");
                }
                text
            }
            Accident::Ricochet => {
                let mut text = format!(
                    "ACCIDENT     Your bullet ricochets into {}! [accident: {} xp]",
                    victim, penalty
                );
                if let Some(extra) = glare {
                    text.push_str(&format!(" [mirror glare: {} xp]", extra));
                }
                text.push_str(if insured {
                    " [INSURED: no confiscation]"
                } else {
                    " [GUN CONFISCATED: accident]"
                });
                text
            }
        };
        outcome.say(ctx.nick, text);
    }

    // -------------------------------------------------------------------------
    // Befriend
    // -------------------------------------------------------------------------

    /// Resolve `!bef`.
    pub fn befriend(
        &self,
        ctx: &ActionContext<'_>,
        record: &mut PlayerChannelRecord,
        ducks: &mut DuckPopulation,
        dice: &mut dyn Dice,
    ) -> ActionOutcome {
        let nick = ctx.nick;
        let now = ctx.now;

        if !ctx.authenticated {
            return ActionOutcome::rejected(nick, "You must be authenticated to play.");
        }
        if record.confiscated {
            return ActionOutcome::rejected(nick, "You are not armed.");
        }
        if record.is_active(TimedModifier::Soaked, now) {
            return ActionOutcome::rejected(nick, "You are soaked and cannot befriend. Use spare clothes or wait.");
        }
        if record.egged {
            return ActionOutcome::rejected(
                nick,
                "You are covered in egg and cannot befriend. Use spare clothes to clean up.",
            );
        }

        let mut outcome = ActionOutcome {
            persist: true,
            ..ActionOutcome::default()
        };
        let prev_xp = record.xp;

        let Some(duck) = ducks.front(ctx.key).cloned() else {
            let penalty = -dice.int_inclusive(1, 10);
            record.add_xp(penalty as f64);
            outcome.say(nick, format!("There are no ducks to befriend. [{} XP]", penalty));
            self.settle(ctx, record, prev_xp, &mut outcome);
            return outcome;
        };

        if duck.hostile {
            record.misses += 1;
            record.sub_xp(THRASH_PENALTY);
            outcome.say(
                nick,
                "*THRASH* The duck gives you a serious thrashing that requires medical attention. <('v')> [-250 XP]",
            );
            if let Some(fled) = ducks.remove_head(ctx.key) {
                outcome.replies.push(Reply::Public(FLY_AWAY.to_string()));
                outcome.departure = Some(Departure::Fled(fled));
            }
            info!(nick, key = %ctx.key, "thrashed by hostile duck");
            self.settle(ctx, record, prev_xp, &mut outcome);
            return outcome;
        }

        if dice.unit() > self.befriend_accuracy(record, now) {
            let penalty = -dice.int_inclusive(1, 10);
            record.misses += 1;
            record.add_xp(penalty as f64);
            if dice.int_inclusive(1, HISS_ODDS) == 1 {
                ducks.mark_hostile(ctx.key);
                outcome.say(
                    nick,
                    format!(
                        "*HISS* The duck hisses at you ferociously. [DO NOT MESS WITH THIS DUCK!] [{} XP]",
                        penalty
                    ),
                );
            } else {
                outcome.say(nick, format!("FRIEND The duck seems distracted. Try again. [{} XP]", penalty));
            }
            self.settle(ctx, record, prev_xp, &mut outcome);
            return outcome;
        }

        let mut strength = 1;
        if duck.is_golden && record.bread_uses > 0 {
            strength = 2;
            record.bread_uses -= 1;
        }

        let Some(hit) = ducks.resolve_hit(ctx.key, strength) else {
            outcome.say(nick, "There are no ducks to befriend.");
            return outcome;
        };
        let remaining = hit.health_left.max(0);

        if hit.revealed_now && !hit.killed {
            outcome.say(
                nick,
                format!("FRIEND You comfort the duck! [GOLDEN DUCK DETECTED] [\\_0< friend {}]", remaining),
            );
            return outcome;
        }
        if !hit.killed {
            outcome.say(nick, format!("FRIEND You comfort the duck. [\\_0< friend {}]", remaining));
            return outcome;
        }

        let reaction = hit.duck.age(now);
        Self::record_reaction(record, reaction, now);
        let xp = self.kill_xp(&hit.duck, record, now);
        record.add_xp(xp as f64);
        record.befriended_ducks += 1;
        info!(nick, key = %ctx.key, golden = hit.duck.is_golden, reaction, "duck befriended");

        outcome.say(
            nick,
            format!(
                "*QUAACK!* The {} was befriended in {:.3}s! \\_0< [BEFRIENDED DUCKS: {}] [+{} xp]",
                if hit.duck.is_golden { "GOLDEN DUCK" } else { "DUCK" },
                reaction,
                record.befriended_ducks,
                xp
            ),
        );
        self.settle(ctx, record, prev_xp, &mut outcome);
        outcome.departure = Some(Departure::Befriended(hit.duck));
        outcome
    }

    // -------------------------------------------------------------------------
    // Reload
    // -------------------------------------------------------------------------

    /// Resolve `!reload`.
    pub fn reload(&self, ctx: &ActionContext<'_>, record: &mut PlayerChannelRecord) -> ActionOutcome {
        let nick = ctx.nick;
        if !ctx.authenticated {
            return ActionOutcome::default();
        }
        if record.confiscated {
            return ActionOutcome::rejected(nick, "You are not armed.");
        }

        let mut outcome = ActionOutcome {
            persist: true,
            ..ActionOutcome::default()
        };
        let text = if record.jammed {
            record.jammed = false;
            format!("*Crr..CLICK* You unjam your gun. | {}", self.status(record))
        } else if record.sabotaged {
            record.sabotaged = false;
            format!("*Crr..CLICK*     You fix the sabotage. | {}", self.status(record))
        } else if record.ammo == 0 {
            if record.magazines == 0 {
                outcome.persist = false;
                "You have no filled magazines to reload your weapon.".to_string()
            } else {
                record.ammo = record.magazine_capacity;
                record.magazines -= 1;
                format!("*CLACK CLACK* You reload. | {}", self.status(record))
            }
        } else {
            outcome.persist = false;
            format!("Your gun doesn't need to be reloaded. | {}", self.status(record))
        };
        outcome.say(nick, text);
        outcome
    }

    fn status(&self, record: &PlayerChannelRecord) -> String {
        weapon_status(record.ammo, record.magazine_capacity, record.magazines, record.magazines_max)
    }
}
