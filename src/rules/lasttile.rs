//! Rules keyed to where the winning tile came from.

use std::sync::Arc;

use super::{RotationView, RuleCode, RuleRegistry};
use crate::analyzer::{ArrangedHand, EvalContext};
use crate::hand::LastSource;
use crate::rule::RuleMeta;
use crate::tile::{Tile, Wind};

pub(super) fn register(reg: &mut RuleRegistry) {
    reg.register("LastTileFromWall", Arc::new(FromSource(LastSource::Wall)));
    reg.register(
        "LastTileFromDeadWall",
        Arc::new(FromSource(LastSource::DeadWall)),
    );
    reg.register(
        "IsLastTileFromWall",
        Arc::new(FromSource(LastSource::WallEnd)),
    );
    reg.register(
        "IsLastTileFromWallDiscarded",
        Arc::new(FromSource(LastSource::WallEndDiscard)),
    );
    reg.register("RobbingKong", Arc::new(FromSource(LastSource::RobbedKong)));
    reg.register(
        "GatheringPlumBlossomFromRoof",
        Arc::new(SourceAndTile(LastSource::DeadWall, "s5")),
    );
    reg.register(
        "PluckingMoonFromBottomOfSea",
        Arc::new(SourceAndTile(LastSource::WallEnd, "s1")),
    );
    reg.register(
        "ScratchingACarryingPole",
        Arc::new(SourceAndTile(LastSource::RobbedKong, "b2")),
    );
    reg.register("BlessingOfHeaven", Arc::new(Blessing(true)));
    reg.register("BlessingOfEarth", Arc::new(Blessing(false)));
    reg.register("NineEastWins", Arc::new(NineEastWins));
}

/// The winning tile came from the given source.
struct FromSource(LastSource);

impl RuleCode for FromSource {
    fn applies_to_hand(&self, _meta: &RuleMeta, hand: &ArrangedHand, _ctx: &mut EvalContext) -> bool {
        hand.base.last_source == self.0
    }
}

/// Source plus a specific winning tile: the picturesque limit hands.
struct SourceAndTile(LastSource, &'static str);

impl RuleCode for SourceAndTile {
    fn applies_to_hand(&self, _meta: &RuleMeta, hand: &ArrangedHand, _ctx: &mut EvalContext) -> bool {
        if hand.base.last_source != self.0 {
            return false;
        }
        let wanted = Tile::parse(self.1).expect("static tile code");
        hand.base.last_tile().map(Tile::exposed) == Some(wanted)
    }
}

/// Winning with the dealt hand. East's own fourteen is the Blessing of
/// Heaven; completing on East's very first discard, before any call, the
/// Blessing of Earth.
struct Blessing(bool);

impl RuleCode for Blessing {
    fn applies_to_hand(&self, _meta: &RuleMeta, hand: &ArrangedHand, _ctx: &mut EvalContext) -> bool {
        if hand.base.last_source != LastSource::Fourteenth {
            return false;
        }
        let is_east = hand.base.own_wind == Wind::East;
        is_east == self.0
    }
}

/// The game ends when the same East has won too many hands in a row.
struct NineEastWins;

impl RuleCode for NineEastWins {
    fn ends_game(&self, meta: &RuleMeta, view: &RotationView) -> bool {
        let needed = meta.option_int("needwins", 9) as u32;
        view.winner_wind == Some(Wind::East) && view.east_streak >= needed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hand::Hand;
    use crate::rule::Ruleset;

    fn check(code: &dyn RuleCode, text: &str) -> bool {
        let rs = Ruleset::new("empty", "");
        let mut ctx = EvalContext::new(&rs);
        let hand = Hand::parse(text).unwrap();
        let arranged = ArrangedHand::declared_only(&hand);
        code.applies_to_hand(&RuleMeta::default(), &arranged, &mut ctx)
    }

    #[test]
    fn sources_distinguished() {
        let base = "RC1C1C1C2C3C4B5B6B7S5S6S7DrDr";
        assert!(check(&FromSource(LastSource::Wall), &format!("{base} Meew LDr")));
        assert!(!check(&FromSource(LastSource::Wall), &format!("{base} Meed LDr")));
        assert!(check(
            &FromSource(LastSource::RobbedKong),
            &format!("{base} Meek LDr")
        ));
        assert!(check(
            &FromSource(LastSource::WallEndDiscard),
            &format!("{base} MeeZ LDr")
        ));
    }

    #[test]
    fn picturesque_limits_need_source_and_tile() {
        let plum = SourceAndTile(LastSource::DeadWall, "s5");
        assert!(check(
            &plum,
            "c1c1c1 c2c3c4 b5b6b7 RS5S5S9S9S9 Meee LS5"
        ));
        // Right tile, wrong source.
        assert!(!check(
            &plum,
            "c1c1c1 c2c3c4 b5b6b7 RS5S5S9S9S9 Meew LS5"
        ));
        // Right source, wrong tile.
        assert!(!check(
            &plum,
            "c1c1c1 c2c3c4 b5b6b7 RS5S5S9S9S9 Meee LS9"
        ));
    }

    #[test]
    fn blessings_split_by_seat() {
        let hand = "RC1C1C1C2C3C4B5B6B7S5S6S7DrDr";
        assert!(check(&Blessing(true), &format!("{hand} Mee1 LDr")));
        assert!(!check(&Blessing(false), &format!("{hand} Mee1 LDr")));
        assert!(check(&Blessing(false), &format!("{hand} Mse1 LDr")));
        assert!(!check(&Blessing(true), &format!("{hand} Meew LDr")));
    }

    #[test]
    fn nine_east_wins_counts_the_streak() {
        let rule = NineEastWins;
        let mut meta = RuleMeta::default();
        meta.options.push(("needwins".to_string(), "9".to_string()));
        let view = |streak, wind| RotationView {
            winner_wind: wind,
            east_streak: streak,
        };
        assert!(!rule.ends_game(&meta, &view(8, Some(Wind::East))));
        assert!(rule.ends_game(&meta, &view(9, Some(Wind::East))));
        assert!(!rule.ends_game(&meta, &view(9, Some(Wind::South))));
        assert!(!rule.ends_game(&meta, &view(9, None)));
        // The option scales the window.
        let mut meta2 = RuleMeta::default();
        meta2.options.push(("needwins".to_string(), "3".to_string()));
        assert!(rule.ends_game(&meta2, &view(3, Some(Wind::East))));
    }
}
