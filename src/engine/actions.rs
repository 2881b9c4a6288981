//! Player actions: shoot, befriend, reload, shop and egg.

use tracing::{debug, info, instrument};

use super::{Actor, GameEngine};
use crate::core::key::{same_nick, ChannelKey};
use crate::game::combat::{ActionContext, ActionOutcome, CombatResolver};
use crate::game::events::Reply;
use crate::game::record::PlayerChannelRecord;
use crate::game::schedule::detector_bucket;
use crate::game::shop::{PurchaseContext, ShopEffect, ShopEngine, ShopItem, Target};

/// Cooldown between two eggs from one player.
pub const EGG_COOLDOWN: f64 = 24.0 * 3600.0;

/// Befriended ducks needed before `!egg` works.
pub const EGG_UNLOCK: u64 = 50;

/// Spawn proximity at which a fresh detector warns right away.
const DETECTOR_IMMEDIATE_WINDOW: f64 = 60.0;

impl GameEngine {
    /// `!bang`
    #[instrument(skip(self, actor), fields(nick = %actor.nick))]
    pub fn on_shoot(&self, key: &ChannelKey, actor: &Actor) {
        self.resolve_combat(key, actor, |resolver, ctx, record, engine| {
            let mirrors = engine.mirror_holders(ctx.key, ctx.now);
            let mut ducks = engine.ducks.lock();
            let mut dice = engine.dice.lock();
            resolver.shoot(ctx, record, &mut ducks, &mirrors, dice.as_mut())
        });
    }

    /// `!bef`
    #[instrument(skip(self, actor), fields(nick = %actor.nick))]
    pub fn on_befriend(&self, key: &ChannelKey, actor: &Actor) {
        self.resolve_combat(key, actor, |resolver, ctx, record, engine| {
            let mut ducks = engine.ducks.lock();
            let mut dice = engine.dice.lock();
            resolver.befriend(ctx, record, &mut ducks, dice.as_mut())
        });
    }

    /// `!reload`
    pub fn on_reload(&self, key: &ChannelKey, actor: &Actor) {
        self.resolve_combat(key, actor, |resolver, ctx, record, _| resolver.reload(ctx, record));
    }

    fn resolve_combat<F>(&self, key: &ChannelKey, actor: &Actor, resolve: F)
    where
        F: FnOnce(&CombatResolver<'_>, &ActionContext<'_>, &mut PlayerChannelRecord, &Self) -> ActionOutcome,
    {
        let Some(mut record) = self.load(&actor.nick, key) else {
            return;
        };
        let before = record.clone();
        let settings = self.settings(key);
        let occupants = self.occupants(key);
        let resolver = CombatResolver::new(&self.levels, &self.config.shop, Self::rewards(&settings));
        let ctx = ActionContext {
            nick: &actor.nick,
            key,
            now: self.now(),
            authenticated: self.authenticated(actor),
            occupants: &occupants,
            bot_nick: &self.config.bot_nick,
        };

        let outcome = resolve(&resolver, &ctx, &mut record, self);

        if outcome.persist {
            self.persist(&actor.nick, key, &before, &record);
        }
        if outcome.departure.is_some() {
            self.clear_confiscations(key);
        }
        self.deliver(key, &actor.nick, &outcome.replies);
    }

    /// `!shop [id [target]]`
    #[instrument(skip(self, actor), fields(nick = %actor.nick))]
    pub fn on_shop(&self, key: &ChannelKey, actor: &Actor, item_id: Option<&str>, target: Option<&str>) {
        if !self.authenticated(actor) {
            return;
        }
        let nick = actor.nick.as_str();
        let Some(mut buyer) = self.load(nick, key) else {
            return;
        };
        let shop = ShopEngine::new(&self.config.shop, &self.levels);

        let Some(raw) = item_id else {
            for line in shop.catalog(&buyer) {
                self.notify(key, nick, &line);
            }
            return;
        };
        let Some(item) = raw.parse::<u32>().ok().and_then(ShopItem::from_id) else {
            self.notify(key, nick, "Invalid item ID.");
            return;
        };

        let before = buyer.clone();
        let now = self.now();
        let ctx = PurchaseContext {
            nick,
            channel: key.channel(),
            now,
        };

        let mut target_record = match target {
            Some(t) if item.needs_target() && !same_nick(t, nick) => match self.load(t, key) {
                Some(record) => Some((t, record)),
                None => return,
            },
            _ => None,
        };
        let target_before = target_record.as_ref().map(|(_, r)| r.clone());

        let receipt = {
            let target_arg = match (&mut target_record, target) {
                (Some((t, record)), _) => Target::Other { nick: *t, record },
                (None, Some(_)) => Target::Buyer,
                (None, None) => Target::Missing,
            };
            let mut dice = self.dice.lock();
            shop.purchase(ctx, item, &mut buyer, target_arg, dice.as_mut())
        };

        if receipt.charged {
            info!(nick, key = %key, item = item.name(), "purchase");
            self.persist(nick, key, &before, &buyer);
            if let (Some((t, after)), Some(before)) = (&target_record, &target_before) {
                if receipt.target_changed {
                    self.persist(t, key, before, after);
                }
            }
        } else {
            debug!(nick, key = %key, item = item.name(), "purchase refused");
        }
        self.deliver(key, nick, &receipt.replies);

        match receipt.effect {
            Some(ShopEffect::DuckCall { ducks }) => {
                if let Some(state) = self.channels.lock().get_mut(key) {
                    state.schedule.add_bursts(now, ducks);
                }
                info!(key = %key, ducks, "duck call bursts scheduled");
            }
            Some(ShopEffect::DetectorActivated) => {
                if let Some(due) = self.next_due(key) {
                    let left = due - now;
                    if left > 0.0 && left <= DETECTOR_IMMEDIATE_WINDOW {
                        self.notify(
                            key,
                            nick,
                            &format!(
                                "Your duck detector indicates the next duck will arrive any minute now... ({})",
                                detector_bucket(left)
                            ),
                        );
                    }
                }
            }
            None => {}
        }
    }

    /// `!egg <nick>`
    pub fn on_egg(&self, key: &ChannelKey, actor: &Actor, target: Option<&str>) {
        let nick = actor.nick.as_str();
        if !self.authenticated(actor) {
            self.deliver(key, nick, &[Reply::to_player(nick, "You must be authenticated to play.")]);
            return;
        }
        let Some(target) = target else {
            self.deliver(key, nick, &[Reply::to_player(nick, "Usage: !egg <player>")]);
            return;
        };
        let Some(mut thrower) = self.load(nick, key) else {
            return;
        };
        if thrower.befriended_ducks < EGG_UNLOCK {
            return;
        }

        let now = self.now();
        if thrower.last_egg_time > 0.0 && now - thrower.last_egg_time < EGG_COOLDOWN {
            let left = (EGG_COOLDOWN - (now - thrower.last_egg_time)) as u64;
            self.deliver(
                key,
                nick,
                &[Reply::to_player(
                    nick,
                    format!(
                        "You can !egg again in {:02}:{:02}:{:02}.",
                        left / 3600,
                        (left % 3600) / 60,
                        left % 60
                    ),
                )],
            );
            return;
        }

        let thrower_before = thrower.clone();
        thrower.last_egg_time = now;
        if same_nick(target, nick) {
            thrower.egged = true;
        } else {
            let Some(mut victim) = self.find(target, key) else {
                self.deliver(key, nick, &[Reply::to_player(nick, format!("Player '{}' not found.", target))]);
                return;
            };
            let victim_before = victim.clone();
            victim.egged = true;
            self.persist(target, key, &victim_before, &victim);
        }
        self.persist(nick, key, &thrower_before, &thrower);

        info!(nick, target, key = %key, "egg thrown");
        self.announce(
            key,
            &format!(
                "{} throws a duck egg at {}! {} is now covered in egg and needs to change clothes!",
                nick, target, target
            ),
        );
    }
}
