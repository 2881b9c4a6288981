//! Read-only reports: `!duckstats`, `!topduck`, `!lastduck`, `!nextduck`.

use super::{Actor, GameEngine, LeaderboardSort};
use crate::core::clock::{format_remaining, humanize_elapsed, Timestamp};
use crate::core::key::{same_nick, ChannelKey};
use crate::game::level::{title_for, LevelTable};
use crate::game::record::{PlayerChannelRecord, TimedModifier};

/// Entries shown by `!topduck`.
const LEADERBOARD_SIZE: usize = 10;

/// Ratio with precision shrinking as the value grows.
fn ratio_text(ratio: f64) -> String {
    if ratio >= 100.0 {
        format!("{:.0}", ratio)
    } else if ratio >= 10.0 {
        format!("{:.1}", ratio)
    } else {
        format!("{:.2}", ratio)
    }
}

fn xp_ratio(record: &PlayerChannelRecord) -> Option<f64> {
    let ducks = record.ducks_shot + record.befriended_ducks;
    (ducks > 0).then(|| record.xp / ducks as f64)
}

/// Notice lines describing one player's record: the main stats line, then
/// status flags and active items when there are any.
pub(crate) fn stats_report(
    target: &str,
    key: &ChannelKey,
    record: &PlayerChannelRecord,
    levels: &LevelTable,
    now: Timestamp,
) -> Vec<String> {
    let level = levels.tier_for(record.xp).level;
    let attempts = record.ducks_shot + record.misses;
    let accuracy = if attempts > 0 {
        record.ducks_shot as f64 / attempts as f64 * 100.0
    } else {
        0.0
    };
    let good = record.ducks_shot + record.befriended_ducks;
    let bad = record.misses + record.accidents + record.wild_fires;
    let karma = if good + bad > 0 {
        good as f64 / (good + bad) as f64 * 100.0
    } else {
        100.0
    };
    let avg_reaction = record.total_reaction_time / record.ducks_shot.max(1) as f64;

    let mut lines = vec![format!(
        "Hunting stats for {t} in {key} : \
         [Weapon] ammo: {a}/{cap} | mag.: {m}/{mmax} \
         [Profile] {xp:.0} xp | lvl {level} ({title}) | accuracy: {acc:.0}% | karma: {karma:.2}% good hunter \
         [Channel Stats] {shot} ducks (incl. {golden} golden) | {bef} befriended | \
         ({xp:.0} xp / ({shot} ducks + {bef} befs))={ratio} xp ratio | \
         best time: {best:.3}s | avg react: {avg:.3}s",
        t = target,
        key = key,
        a = record.ammo,
        cap = record.magazine_capacity,
        m = record.magazines,
        mmax = record.magazines_max,
        xp = record.xp,
        level = level,
        title = title_for(level),
        acc = accuracy,
        karma = karma,
        shot = record.ducks_shot,
        golden = record.golden_ducks,
        bef = record.befriended_ducks,
        ratio = ratio_text(xp_ratio(record).unwrap_or(0.0)),
        best = record.best_time.unwrap_or(0.0),
        avg = avg_reaction,
    )];

    let flags: Vec<&str> = [
        (record.jammed, "[Jammed]"),
        (record.confiscated, "[Confiscated]"),
        (record.egged, "[Egged]"),
    ]
    .into_iter()
    .filter_map(|(on, flag)| on.then_some(flag))
    .collect();
    if !flags.is_empty() {
        lines.push(format!("{} is {}", target, flags.join(" ")));
    }

    let items = item_tokens(record, now);
    if !items.is_empty() {
        lines.push(format!("[Items] {}", items.join(" ")));
    }
    lines
}

fn item_tokens(record: &PlayerChannelRecord, now: Timestamp) -> Vec<String> {
    let mut items = Vec::new();
    let mut counted = |n: u32, label: &str| {
        if n > 0 {
            items.push(format!("[{} {}]", label, n));
        }
    };
    counted(record.ap_shots, "AP Ammo");
    counted(record.explosive_shots, "Explosive Ammo");
    counted(record.bread_uses, "bread");

    let left = |m: TimedModifier| format_remaining(m.expiry(record), now);
    let timed = [
        (TimedModifier::Grease, "grease"),
        (TimedModifier::Silencer, "silencer"),
        (TimedModifier::Sunglasses, "sunglasses"),
    ];
    for (modifier, label) in timed {
        if record.is_active(modifier, now) {
            items.push(format!("[{} {}]", label, left(modifier)));
        }
    }
    if record.is_active(TimedModifier::Clover, now) {
        items.push(format!("[clover +{} {}]", record.clover_bonus, left(TimedModifier::Clover)));
    }
    let timed = [
        (TimedModifier::LifeInsurance, "life insurance"),
        (TimedModifier::LiabilityInsurance, "liability insurance"),
        (TimedModifier::Brush, "brush"),
        (TimedModifier::DucksDetector, "ducks detector"),
    ];
    for (modifier, label) in timed {
        if record.is_active(modifier, now) {
            items.push(format!("[{} {}]", label, left(modifier)));
        }
    }
    if record.safety_lock_active(now) {
        items.push(format!(
            "[safety lock {} ({} uses)]",
            left(TimedModifier::TriggerLock),
            record.trigger_lock_uses
        ));
    }
    if record.sight_next_shot {
        items.push("[sight]".to_string());
    }
    let hindrances = [
        (TimedModifier::Mirror, "mirror"),
        (TimedModifier::Sand, "sand"),
        (TimedModifier::Soaked, "soaked"),
    ];
    for (modifier, label) in hindrances {
        if record.is_active(modifier, now) {
            items.push(format!("[{} {}]", label, left(modifier)));
        }
    }
    items
}

/// Leaderboard text for a channel's records.
pub(crate) fn leaderboard(
    channel: &str,
    records: &[(String, PlayerChannelRecord)],
    sort: LeaderboardSort,
    bot_nick: &str,
) -> String {
    let eligible = records.iter().filter(|(player, r)| {
        !same_nick(player, bot_nick)
            && match sort {
                LeaderboardSort::Ducks => r.xp > 0.0 || r.ducks_shot > 0 || r.befriended_ducks > 0,
                _ => r.xp > 0.0 || r.ducks_shot > 0,
            }
    });

    let mut ranked: Vec<(f64, String)> = match sort {
        LeaderboardSort::Xp => eligible
            .map(|(p, r)| (r.xp, format!("{} with {} total xp", p, r.xp as i64)))
            .collect(),
        LeaderboardSort::Ducks => eligible
            .map(|(p, r)| {
                let total = r.ducks_shot + r.befriended_ducks;
                (
                    total as f64,
                    format!("{} with {} ducks (incl. {} golden)", p, total, r.golden_ducks),
                )
            })
            .collect(),
        LeaderboardSort::XpRatio => eligible
            .filter_map(|(p, r)| {
                xp_ratio(r).map(|ratio| (ratio, format!("{} with {} xp ratio", p, ratio_text(ratio))))
            })
            .collect(),
    };
    if ranked.is_empty() {
        return "The scoreboard is empty. There are no top ducks.".to_string();
    }
    ranked.sort_by(|a, b| b.0.total_cmp(&a.0));

    let entries: Vec<String> = ranked
        .into_iter()
        .take(LEADERBOARD_SIZE)
        .map(|(_, entry)| entry)
        .collect();
    format!(
        "The top duck(s) in {} by {} are: {}",
        channel,
        sort.label(),
        entries.join(" | ")
    )
}

impl GameEngine {
    /// `!duckstats [nick]`
    pub fn on_stats(&self, key: &ChannelKey, actor: &Actor, target: Option<&str>) {
        let target = target.unwrap_or(&actor.nick);
        let Some(record) = self.find(target, key) else {
            let text = if same_nick(target, &actor.nick) {
                format!(
                    "{}: You haven't shot any ducks yet! Wait for a duck to spawn and try !bang",
                    target
                )
            } else {
                format!("{} hasn't shot any ducks yet in {}", target, key.channel())
            };
            self.announce(key, &text);
            return;
        };
        for line in stats_report(target, key, &record, &self.levels, self.now()) {
            self.notify(key, &actor.nick, &line);
        }
    }

    /// `!topduck [xp|duck|xpratio]`
    pub fn on_leaderboard(&self, key: &ChannelKey, sort: LeaderboardSort) {
        let records = self.channel_records(key);
        let text = leaderboard(key.channel(), &records, sort, &self.config.bot_nick);
        self.announce(key, &text);
    }

    /// `!lastduck`
    pub fn on_lastduck(&self, key: &ChannelKey, actor: &Actor) {
        let nick = actor.nick.as_str();
        if !self.authenticated(actor) {
            self.announce(key, &format!("{}: You must be authenticated to play.", nick));
            return;
        }
        let text = if self.duck_count(key) > 0 {
            format!("{} > There is currently a duck in {}.", nick, key.channel())
        } else {
            let last = self
                .channel_records(key)
                .iter()
                .map(|(_, r)| r.last_duck_time)
                .fold(0.0, f64::max);
            if last <= 0.0 {
                format!("{} > No ducks have been killed in {} yet.", nick, key.channel())
            } else {
                format!(
                    "{} > The last duck was seen in {}: {} ago.",
                    nick,
                    key.channel(),
                    humanize_elapsed(self.now() - last)
                )
            }
        };
        self.announce(key, &text);
    }

    /// `!nextduck`: admins only, silent for everyone else.
    pub fn on_nextduck(&self, key: &ChannelKey, actor: &Actor) {
        if !self.is_admin(key.network(), &actor.nick) {
            return;
        }
        let text = match self.next_due(key) {
            None => format!("{} > No spawn scheduled yet for {}.", actor.nick, key.channel()),
            Some(due) => {
                let left = (due - self.now()).max(0.0) as u64;
                format!("{} > Next duck in {}m{:02}s.", actor.nick, left / 60, left % 60)
            }
        };
        self.announce(key, &text);
    }
}

#[cfg(test)]
mod tests {
    use super::super::harness::*;
    use super::*;

    fn scored(xp: f64, shot: u64, bef: u64) -> PlayerChannelRecord {
        let mut record = PlayerChannelRecord::fresh(&LevelTable::default());
        record.xp = xp;
        record.ducks_shot = shot;
        record.befriended_ducks = bef;
        record
    }

    #[test]
    fn test_ratio_text_precision() {
        assert_eq!(ratio_text(123.456), "123");
        assert_eq!(ratio_text(12.345), "12.3");
        assert_eq!(ratio_text(1.2345), "1.23");
    }

    #[test]
    fn test_leaderboard_by_xp_excludes_bot() {
        let records = vec![
            ("alice".to_string(), scored(40.0, 4, 0)),
            ("DuckBot".to_string(), scored(999.0, 99, 0)),
            ("bob".to_string(), scored(75.5, 3, 2)),
            ("idle".to_string(), scored(0.0, 0, 0)),
        ];
        assert_eq!(
            leaderboard("#ducks", &records, LeaderboardSort::Xp, "duckbot"),
            "The top duck(s) in #ducks by total xp are: bob with 75 total xp | alice with 40 total xp"
        );
    }

    #[test]
    fn test_leaderboard_by_ducks_and_ratio() {
        let mut friendly = scored(0.0, 0, 3);
        friendly.golden_ducks = 0;
        let mut hunter = scored(30.0, 2, 0);
        hunter.golden_ducks = 1;
        let records = vec![("carol".to_string(), friendly), ("dave".to_string(), hunter)];

        assert_eq!(
            leaderboard("#ducks", &records, LeaderboardSort::Ducks, "DuckBot"),
            "The top duck(s) in #ducks by ducks are: carol with 3 ducks (incl. 0 golden) | dave with 2 ducks (incl. 1 golden)"
        );
        assert_eq!(
            leaderboard("#ducks", &records, LeaderboardSort::XpRatio, "DuckBot"),
            "The top duck(s) in #ducks by xp ratio are: dave with 15.0 xp ratio"
        );
    }

    #[test]
    fn test_leaderboard_empty() {
        assert_eq!(
            leaderboard("#ducks", &[], LeaderboardSort::Xp, "DuckBot"),
            "The scoreboard is empty. There are no top ducks."
        );
    }

    #[test]
    fn test_stats_report_lines() {
        let levels = LevelTable::default();
        let key = ChannelKey::new("net", "#ducks");
        let mut record = scored(25.0, 3, 1);
        record.misses = 1;
        record.best_time = Some(1.5);
        record.total_reaction_time = 6.0;
        record.egged = true;
        record.ap_shots = 4;
        record.sight_next_shot = true;
        record.grease_until = 100.0 + 3900.0;

        let lines = stats_report("alice", &key, &record, &levels, 100.0);
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Hunting stats for alice in net:#ducks : [Weapon] ammo:"));
        assert!(lines[0].contains("accuracy: 75% | karma: 80.00% good hunter"));
        assert!(lines[0].contains("(25 xp / (3 ducks + 1 befs))=6.25 xp ratio"));
        assert!(lines[0].ends_with("best time: 1.500s | avg react: 2.000s"));
        assert_eq!(lines[1], "alice is [Egged]");
        assert_eq!(lines[2], "[Items] [AP Ammo 4] [grease 1h05m] [sight]");
    }

    #[test]
    fn test_stats_for_unknown_players() {
        let h = Harness::new();
        h.engine.on_stats(&h.key, &Harness::actor("alice"), None);
        assert_eq!(
            h.last_text(),
            "alice: You haven't shot any ducks yet! Wait for a duck to spawn and try !bang"
        );
        h.engine.on_stats(&h.key, &Harness::actor("alice"), Some("ghost"));
        assert_eq!(h.last_text(), "ghost hasn't shot any ducks yet in #ducks");
    }

    #[test]
    fn test_stats_sent_privately() {
        let h = Harness::new();
        h.record("bob");
        h.engine.on_stats(&h.key, &Harness::actor("alice"), Some("bob"));
        let notices = h.messenger.notices_to("alice");
        assert_eq!(notices.len(), 1);
        assert!(notices[0].starts_with("Hunting stats for bob"));
    }

    #[test]
    fn test_lastduck_states() {
        let h = Harness::new();
        h.engine.on_lastduck(&h.key, &Harness::actor("alice"));
        assert_eq!(h.last_text(), "alice > No ducks have been killed in #ducks yet.");

        let mut bob = h.record("bob");
        bob.last_duck_time = START - 3661.0;
        h.put("bob", &bob);
        h.engine.on_lastduck(&h.key, &Harness::actor("alice"));
        assert_eq!(
            h.last_text(),
            "alice > The last duck was seen in #ducks: 1 hour 1 minute 1 second ago."
        );

        h.spawn(false);
        h.engine.on_lastduck(&h.key, &Harness::actor("alice"));
        assert_eq!(h.last_text(), "alice > There is currently a duck in #ducks.");
    }

    #[test]
    fn test_nextduck_admin_only() {
        let h = Harness::new();
        h.engine.on_nextduck(&h.key, &Harness::actor("alice"));
        assert!(h.messenger.sent().is_empty());

        let due = h.engine.next_due(&h.key).unwrap();
        h.clock.set(due - 125.0);
        h.engine.on_nextduck(&h.key, &Harness::actor("boss"));
        assert_eq!(h.last_text(), "boss > Next duck in 2m05s.");
    }
}
