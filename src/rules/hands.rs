//! Hand-wide rule codes: doubling conditions and the structural limit hands
//! that ride on a standard winning arrangement.

use std::sync::Arc;

use super::{
    all_tiles, count_dragon_pungs, count_wind_pungs, fully_concealed, has_pair_of, pung_like,
    RuleCode, RuleRegistry,
};
use crate::analyzer::{ArrangedHand, EvalContext};
use crate::rule::RuleMeta;
use crate::tile::{Tile, TileGroup};

pub(super) fn register(reg: &mut RuleRegistry) {
    reg.register("MahJongg", Arc::new(WonHand));
    reg.register("OwnFlowerOwnSeason", Arc::new(OwnFlowerOwnSeason));
    reg.register("AllFlowers", Arc::new(AllBonus(TileGroup::Flower)));
    reg.register("AllSeasons", Arc::new(AllBonus(TileGroup::Season)));
    reg.register("ThreeConcealedPongs", Arc::new(ThreeConcealedPongs));
    reg.register("LittleThreeDragons", Arc::new(LittleThreeDragons));
    reg.register("BigThreeDragons", Arc::new(BigThreeDragons));
    reg.register("LittleFourJoys", Arc::new(LittleFourJoys));
    reg.register("BigFourJoys", Arc::new(BigFourJoys));
    reg.register("ZeroPointHand", Arc::new(ZeroPointHand));
    reg.register("NoChow", Arc::new(NoChow));
    reg.register("OnlyConcealedMelds", Arc::new(OnlyConcealedMelds));
    reg.register("FalseColorGame", Arc::new(FalseColorGame));
    reg.register("TrueColorGame", Arc::new(TrueColorGame));
    reg.register("ConcealedTrueColorGame", Arc::new(ConcealedTrueColorGame));
    reg.register("OnlyMajors", Arc::new(OnlyMajors));
    reg.register("OnlyHonors", Arc::new(OnlyHonors));
    reg.register("AllTerminals", Arc::new(AllTerminals));
    reg.register("AllGreen", Arc::new(AllGreen));
    reg.register("FourfoldPlenty", Arc::new(FourfoldPlenty));
    reg.register("ThreeGreatScholars", Arc::new(ThreeGreatScholars));
    reg.register("FourBlessingsHoveringOverTheDoor", Arc::new(FourBlessings));
    reg.register("HiddenTreasure", Arc::new(HiddenTreasure));
    reg.register("BuriedTreasure", Arc::new(BuriedTreasure));
    reg.register("MahJonggWithOriginalCall", Arc::new(WithOriginalCall));
    reg.register("TwofoldFortune", Arc::new(TwofoldFortune));
    reg.register("DangerousGame", Arc::new(DangerousGame));
    reg.register("LastTileCompletesPairMinor", Arc::new(CompletesPair(false)));
    reg.register("LastTileCompletesPairMajor", Arc::new(CompletesPair(true)));
    reg.register("LastTileOnlyPossible", Arc::new(LastTileOnlyPossible));
}

/// The base award for going out. Winner rules only run once a Mah Jongg
/// rule accepted the hand, so this can apply unconditionally.
struct WonHand;

impl RuleCode for WonHand {
    fn applies_to_hand(&self, _meta: &RuleMeta, _hand: &ArrangedHand, _ctx: &mut EvalContext) -> bool {
        true
    }
}

struct OwnFlowerOwnSeason;

impl RuleCode for OwnFlowerOwnSeason {
    fn applies_to_hand(&self, _meta: &RuleMeta, hand: &ArrangedHand, _ctx: &mut EvalContext) -> bool {
        let own = hand.base.own_wind;
        let has = |group: TileGroup| {
            hand.base
                .bonus_tiles()
                .iter()
                .any(|t| t.group() == group && t.wind() == Some(own))
        };
        has(TileGroup::Flower) && has(TileGroup::Season)
    }
}

struct AllBonus(TileGroup);

impl RuleCode for AllBonus {
    fn applies_to_hand(&self, _meta: &RuleMeta, hand: &ArrangedHand, _ctx: &mut EvalContext) -> bool {
        hand.base
            .bonus_tiles()
            .iter()
            .filter(|t| t.group() == self.0)
            .count()
            == 4
    }
}

struct ThreeConcealedPongs;

impl RuleCode for ThreeConcealedPongs {
    fn applies_to_hand(&self, _meta: &RuleMeta, hand: &ArrangedHand, _ctx: &mut EvalContext) -> bool {
        pung_like(hand).filter(|m| m.is_concealed()).count() >= 3
    }
}

struct LittleThreeDragons;

impl RuleCode for LittleThreeDragons {
    fn applies_to_hand(&self, _meta: &RuleMeta, hand: &ArrangedHand, _ctx: &mut EvalContext) -> bool {
        count_dragon_pungs(hand) == 2 && has_pair_of(hand, |m| m.is_dragon_meld())
    }
}

struct BigThreeDragons;

impl RuleCode for BigThreeDragons {
    fn applies_to_hand(&self, _meta: &RuleMeta, hand: &ArrangedHand, _ctx: &mut EvalContext) -> bool {
        count_dragon_pungs(hand) == 3
    }
}

struct LittleFourJoys;

impl RuleCode for LittleFourJoys {
    fn applies_to_hand(&self, _meta: &RuleMeta, hand: &ArrangedHand, _ctx: &mut EvalContext) -> bool {
        count_wind_pungs(hand) == 3 && has_pair_of(hand, |m| m.is_wind_meld())
    }
}

struct BigFourJoys;

impl RuleCode for BigFourJoys {
    fn applies_to_hand(&self, _meta: &RuleMeta, hand: &ArrangedHand, _ctx: &mut EvalContext) -> bool {
        count_wind_pungs(hand) == 4
    }
}

struct ZeroPointHand;

impl RuleCode for ZeroPointHand {
    fn applies_to_hand(&self, _meta: &RuleMeta, _hand: &ArrangedHand, ctx: &mut EvalContext) -> bool {
        ctx.meld_points == 0
    }
}

struct NoChow;

impl RuleCode for NoChow {
    fn applies_to_hand(&self, _meta: &RuleMeta, hand: &ArrangedHand, _ctx: &mut EvalContext) -> bool {
        hand.chow_count() == 0
    }
}

struct OnlyConcealedMelds;

impl RuleCode for OnlyConcealedMelds {
    fn applies_to_hand(&self, _meta: &RuleMeta, hand: &ArrangedHand, _ctx: &mut EvalContext) -> bool {
        fully_concealed(hand)
    }
}

/// One suit plus honors; the honors must actually be there, or it would be
/// a true color game.
struct FalseColorGame;

impl RuleCode for FalseColorGame {
    fn applies_to_hand(&self, _meta: &RuleMeta, hand: &ArrangedHand, _ctx: &mut EvalContext) -> bool {
        hand.base.suits().len() == 1 && hand.base.has_honors()
    }
}

struct TrueColorGame;

impl RuleCode for TrueColorGame {
    fn applies_to_hand(&self, _meta: &RuleMeta, hand: &ArrangedHand, _ctx: &mut EvalContext) -> bool {
        hand.base.suits().len() == 1 && !hand.base.has_honors()
    }
}

struct ConcealedTrueColorGame;

impl RuleCode for ConcealedTrueColorGame {
    fn applies_to_hand(&self, _meta: &RuleMeta, hand: &ArrangedHand, _ctx: &mut EvalContext) -> bool {
        hand.base.suits().len() == 1 && !hand.base.has_honors() && fully_concealed(hand)
    }
}

/// Only terminals and honors.
struct OnlyMajors;

impl RuleCode for OnlyMajors {
    fn applies_to_hand(&self, _meta: &RuleMeta, hand: &ArrangedHand, _ctx: &mut EvalContext) -> bool {
        all_tiles(hand, Tile::is_major)
    }
}

struct OnlyHonors;

impl RuleCode for OnlyHonors {
    fn applies_to_hand(&self, _meta: &RuleMeta, hand: &ArrangedHand, _ctx: &mut EvalContext) -> bool {
        all_tiles(hand, Tile::is_honor)
    }
}

struct AllTerminals;

impl RuleCode for AllTerminals {
    fn applies_to_hand(&self, _meta: &RuleMeta, hand: &ArrangedHand, _ctx: &mut EvalContext) -> bool {
        all_tiles(hand, Tile::is_terminal)
    }
}

struct AllGreen;

impl RuleCode for AllGreen {
    fn applies_to_hand(&self, _meta: &RuleMeta, hand: &ArrangedHand, _ctx: &mut EvalContext) -> bool {
        all_tiles(hand, Tile::is_green)
    }
}

/// Four kongs.
struct FourfoldPlenty;

impl RuleCode for FourfoldPlenty {
    fn applies_to_hand(&self, _meta: &RuleMeta, hand: &ArrangedHand, _ctx: &mut EvalContext) -> bool {
        hand.melds().iter().filter(|m| m.is_kong()).count() == 4
    }
}

struct ThreeGreatScholars;

impl RuleCode for ThreeGreatScholars {
    fn applies_to_hand(&self, meta: &RuleMeta, hand: &ArrangedHand, _ctx: &mut EvalContext) -> bool {
        if count_dragon_pungs(hand) != 3 {
            return false;
        }
        // The BMJA reading forbids chows beside the scholars.
        if meta.has_option("nochow") && hand.chow_count() > 0 {
            return false;
        }
        true
    }
}

struct FourBlessings;

impl RuleCode for FourBlessings {
    fn applies_to_hand(&self, _meta: &RuleMeta, hand: &ArrangedHand, _ctx: &mut EvalContext) -> bool {
        count_wind_pungs(hand) == 4
    }
}

/// Concealed pungs throughout, won from the wall.
struct HiddenTreasure;

impl RuleCode for HiddenTreasure {
    fn applies_to_hand(&self, _meta: &RuleMeta, hand: &ArrangedHand, _ctx: &mut EvalContext) -> bool {
        fully_concealed(hand)
            && hand.base.last_source.is_from_wall()
            && hand
                .melds()
                .iter()
                .filter(|m| !m.is_bonus())
                .all(|m| m.is_pung_like() || m.is_pair())
            && hand.chow_count() == 0
    }
}

/// Concealed pungs of one suit or of honors only.
struct BuriedTreasure;

impl RuleCode for BuriedTreasure {
    fn applies_to_hand(&self, _meta: &RuleMeta, hand: &ArrangedHand, _ctx: &mut EvalContext) -> bool {
        if !fully_concealed(hand) || hand.chow_count() > 0 {
            return false;
        }
        if !hand
            .melds()
            .iter()
            .filter(|m| !m.is_bonus())
            .all(|m| m.is_pung_like() || m.is_pair())
        {
            return false;
        }
        hand.base.suits().len() <= 1
    }
}

struct WithOriginalCall;

impl RuleCode for WithOriginalCall {
    fn applies_to_hand(&self, _meta: &RuleMeta, hand: &ArrangedHand, _ctx: &mut EvalContext) -> bool {
        hand.base.announcements.original_call
    }
}

struct TwofoldFortune;

impl RuleCode for TwofoldFortune {
    fn applies_to_hand(&self, _meta: &RuleMeta, hand: &ArrangedHand, _ctx: &mut EvalContext) -> bool {
        hand.base.announcements.twofold_fortune
    }
}

/// Loser-side marker: the discarder of an obviously dangerous tile pays for
/// everybody. Carries no score; the payment step reads the option.
struct DangerousGame;

impl RuleCode for DangerousGame {
    fn applies_to_hand(&self, meta: &RuleMeta, _hand: &ArrangedHand, _ctx: &mut EvalContext) -> bool {
        // Only ever applied explicitly by the state machine via the
        // payforall option; scoring itself never triggers it.
        let _ = meta;
        false
    }
}

/// The winning tile completed the pair.
struct CompletesPair(bool);

impl RuleCode for CompletesPair {
    fn applies_to_hand(&self, _meta: &RuleMeta, hand: &ArrangedHand, _ctx: &mut EvalContext) -> bool {
        let Some(last) = hand.base.last_tile() else {
            return false;
        };
        let Some(meld) = hand.last_meld() else {
            return false;
        };
        if !meld.is_pair() || !meld.has_kind_of(last) {
            return false;
        }
        if self.0 {
            meld.first().is_major()
        } else {
            meld.first().is_minor()
        }
    }
}

/// Exactly one tile kind could have completed this hand. The answer does
/// not depend on the arrangement, so it is memoized per evaluation.
struct LastTileOnlyPossible;

impl RuleCode for LastTileOnlyPossible {
    fn applies_to_hand(&self, meta: &RuleMeta, hand: &ArrangedHand, ctx: &mut EvalContext) -> bool {
        if ctx.shallow {
            // Pruning hypothetical hands must not recurse into more
            // what-if evaluation.
            return false;
        }
        let Some(last) = hand.base.last_tile() else {
            return false;
        };
        let Some(waiting) = hand.base.without(last) else {
            return false;
        };
        ctx.memo_bool(meta.id, 0, |ctx| {
            let winners = crate::ai::winning_tiles(&waiting, ctx.ruleset);
            winners.len() == 1 && winners.contains(&last.exposed())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hand::Hand;
    use crate::rule::Ruleset;

    fn check(code: &dyn RuleCode, text: &str) -> bool {
        let ruleset = Ruleset::new("empty", "");
        let mut ctx = EvalContext::new(&ruleset);
        let hand = Hand::parse(text).unwrap();
        let arranged = ArrangedHand::declared_only(&hand);
        code.applies_to_hand(&RuleMeta::default(), &arranged, &mut ctx)
    }

    /// Like `check`, but with the concealed bag arranged into the given
    /// melds instead of left as singles.
    fn check_arranged(code: &dyn RuleCode, text: &str, bag_melds: &[&str]) -> bool {
        let ruleset = Ruleset::new("empty", "");
        let mut ctx = EvalContext::new(&ruleset);
        let hand = Hand::parse(text).unwrap();
        let arrangement = (
            bag_melds
                .iter()
                .map(|m| crate::meld::Meld::parse(m).unwrap())
                .collect(),
            Vec::new(),
        );
        let arranged = ArrangedHand::new(&hand, &arrangement, true);
        code.applies_to_hand(&RuleMeta::default(), &arranged, &mut ctx)
    }

    #[test]
    fn color_games() {
        assert!(check(
            &FalseColorGame,
            "b1b2b3 b5b5b5 RB7B8B9WeWeDrDrDr mee"
        ));
        assert!(!check(
            &FalseColorGame,
            "b1b2b3 b5b5b5 RB7B8B9C2C2DrDrDr mee"
        ));
        assert!(check(&TrueColorGame, "b1b2b3 b5b5b5 RB7B8B9B2B2B4B5B6 mee"));
        assert!(!check(&TrueColorGame, "b1b2b3 b5b5b5 RB7B8B9B2B2DrDrDr mee"));
        assert!(check(
            &ConcealedTrueColorGame,
            "RB1B2B3B5B5B5B7B8B9B2B2B4B5B6 mee"
        ));
        assert!(!check(
            &ConcealedTrueColorGame,
            "b1b2b3 RB5B5B5B7B8B9B2B2B4B5B6 mee"
        ));
    }

    #[test]
    fn joys_and_scholars() {
        assert!(check(
            &BigFourJoys,
            "wewewe wswsws wwwwww wnwnwn RC5C5 mee"
        ));
        assert!(check_arranged(
            &LittleFourJoys,
            "wewewe wswsws wwwwww RWnWnC5C5C5 mee",
            &["WnWn", "C5C5C5"]
        ));
        assert!(check(
            &BigThreeDragons,
            "drdrdr dgdgdg dbdbdb RC5C5C6C7C8 mee"
        ));
        assert!(check_arranged(
            &LittleThreeDragons,
            "drdrdr dgdgdg RDbDbC5C5C5C6C7C8 mee",
            &["DbDb", "C5C5C5", "C6C7C8"]
        ));
        assert!(!check(
            &LittleThreeDragons,
            "drdrdr dgdgdg dbdbdb RC5C5C6C7C8 mee"
        ));
    }

    #[test]
    fn treasures() {
        let melds = ["C1C1C1", "B5B5B5", "S9S9S9", "WeWeWe", "DrDr"];
        assert!(check_arranged(
            &HiddenTreasure,
            "RC1C1C1B5B5B5S9S9S9WeWeWeDrDr Meew LC1",
            &melds
        ));
        // A claimed pung breaks it.
        assert!(!check_arranged(
            &HiddenTreasure,
            "c1c1c1 RB5B5B5S9S9S9WeWeWeDrDr Meew LB5",
            &["B5B5B5", "S9S9S9", "WeWeWe", "DrDr"]
        ));
        // Won by discard breaks it.
        assert!(!check_arranged(
            &HiddenTreasure,
            "RC1C1C1B5B5B5S9S9S9WeWeWeDrDr Meed LC1",
            &melds
        ));
    }

    #[test]
    fn tile_class_sweeps() {
        assert!(check(&OnlyHonors, "wewewe wnwnwn RDrDrDrWwWwDbDbDb mee"));
        assert!(check(
            &AllTerminals,
            "c1c1c1 c9c9c9 b1b1b1 RS1S1S1S9S9 mee"
        ));
        assert!(check(&OnlyMajors, "c1c1c1 c9c9c9 b1b1b1 RS1S1S1DrDr mee"));
        assert!(!check(&OnlyMajors, "c1c1c1 c9c9c9 b1b1b1 RS1S1S2DrDr mee"));
        assert!(check(&AllGreen, "b2b3b4 b6b6b6 b8b8b8 RDgDgB2B3B4 mee"));
        assert!(!check(&AllGreen, "b2b3b4 b6b6b6 b8b8b8 RDrDrB2B3B4 mee"));
    }

    #[test]
    fn completes_pair() {
        assert!(check(
            &CompletesPair(true),
            "c1c1c1 c2c3c4 b5b6b7 s9s9s9 RDrDr Meed LDrDrDr"
        ));
        assert!(check(
            &CompletesPair(false),
            "c1c1c1 c2c3c4 b5b6b7 s9s9s9 RC5C5 Meed LC5C5C5"
        ));
        assert!(!check(
            &CompletesPair(true),
            "c1c1c1 c2c3c4 b5b6b7 s9s9s9 RC5C5 Meed LC5C5C5"
        ));
    }

    #[test]
    fn announcements_reach_rules() {
        assert!(check(
            &WithOriginalCall,
            "RC1C1C1C2C3C4B5B6B7S5S6S7DrDr Meewa LDr"
        ));
        assert!(check(
            &TwofoldFortune,
            "RC1C1C1C2C3C4B5B6B7S5S6S7DrDr Meewt LDr"
        ));
        assert!(!check(
            &WithOriginalCall,
            "RC1C1C1C2C3C4B5B6B7S5S6S7DrDr Meew LDr"
        ));
    }
}
