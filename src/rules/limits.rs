//! The Mah Jongg rules: hand shapes that can win. Each knows which tiles
//! would complete a one-away hand and, where the generic decomposer cannot
//! find its melds, how to rearrange the bag.

use std::collections::BTreeSet;
use std::sync::Arc;

use smallvec::SmallVec;

use super::{is_complete_arrangement, RuleCode, RuleRegistry};
use crate::analyzer::{Arrangement, ArrangedHand, EvalContext};
use crate::decompose::{counts_of, Counts};
use crate::hand::Hand;
use crate::meld::Meld;
use crate::rule::RuleMeta;
use crate::tile::{Tile, TileGroup};

pub(super) fn register(reg: &mut RuleRegistry) {
    reg.register("StandardMahJongg", Arc::new(StandardMahJongg));
    reg.register("ThirteenOrphans", Arc::new(ThirteenOrphans));
    reg.register("GatesOfHeaven", Arc::new(GatesOfHeaven));
    reg.register("SquirmingSnake", Arc::new(SquirmingSnake));
    reg.register("WrigglingSnake", Arc::new(WrigglingSnake));
    reg.register("TripleKnitting", Arc::new(TripleKnitting));
    reg.register("Knitting", Arc::new(Knitting));
    reg.register("AllPairHonors", Arc::new(AllPairHonors));
}

/// Histogram of every playable tile in the hand, declared melds included.
fn kind_counts(hand: &Hand) -> Counts {
    let tiles: Vec<Tile> = hand.all_tiles().collect();
    counts_of(&tiles)
}

fn kind_tile(kind: usize) -> Tile {
    Tile::playable().nth(kind).expect("playable kind")
}

/// Try every playable kind: does adding one tile of it satisfy `shape`?
fn candidates_by_shape(hand: &Hand, shape: impl Fn(&Counts) -> bool) -> BTreeSet<Tile> {
    let base = kind_counts(hand);
    let mut out = BTreeSet::new();
    for kind in 0..base.len() {
        if base[kind] >= 4 {
            continue;
        }
        let mut counts = base;
        counts[kind] += 1;
        if shape(&counts) {
            out.insert(kind_tile(kind));
        }
    }
    out
}

fn one_suit_only(counts: &Counts, suit: TileGroup) -> bool {
    let start = 9 * suit as usize;
    counts
        .iter()
        .enumerate()
        .all(|(k, &c)| c == 0 || (k >= start && k < start + 9))
}

fn the_single_suit(hand: &Hand) -> Option<TileGroup> {
    match hand.suits().as_slice() {
        [suit] => Some(*suit),
        _ => None,
    }
}

/// What the concealed bag still owes a standard hand, given the declared
/// melds: (sets, pair wanted, chows left). `None` when the declarations
/// already rule a standard win out.
pub(crate) fn standard_requirements(
    hand: &Hand,
    max_chows: usize,
) -> Option<(usize, bool, usize)> {
    let mut sets: usize = 4;
    let mut need_pair = true;
    let mut chow_budget = max_chows;
    for meld in hand.declared_melds() {
        if meld.is_pair() {
            if !need_pair {
                return None;
            }
            need_pair = false;
        } else if meld.is_chow() {
            sets = sets.checked_sub(1)?;
            chow_budget = chow_budget.checked_sub(1)?;
        } else if meld.is_pung_like() {
            sets = sets.checked_sub(1)?;
        } else {
            return None;
        }
    }
    Some((sets, need_pair, chow_budget))
}

/// The ordinary four-sets-and-a-pair structure.
struct StandardMahJongg;

impl RuleCode for StandardMahJongg {
    fn applies_to_hand(&self, _meta: &RuleMeta, hand: &ArrangedHand, ctx: &mut EvalContext) -> bool {
        if !hand.base.is_full() || !is_complete_arrangement(hand) {
            return false;
        }
        let mut sets = 0;
        for meld in hand.melds() {
            if meld.is_bonus() || meld.is_pair() {
                continue;
            }
            if meld.is_knitted() {
                return false;
            }
            sets += 1;
        }
        sets == 4 && hand.chow_count() <= ctx.max_chows()
    }

    /// Pure shape test over the bag histogram; no arrangement enumeration.
    fn wins_hand(&self, _meta: &RuleMeta, hand: &Hand, ctx: &mut EvalContext) -> bool {
        if !hand.is_full() {
            return false;
        }
        let Some((sets, need_pair, chow_budget)) =
            standard_requirements(hand, ctx.max_chows())
        else {
            return false;
        };
        crate::decompose::is_complete_shape(
            &counts_of(hand.concealed_tiles()),
            sets,
            need_pair,
            chow_budget,
        )
    }

    /// A winning tile always joins a meld whose other members sit in the
    /// bag: its own kind, or a suit neighbour one step away.
    fn winning_tile_candidates(
        &self,
        _meta: &RuleMeta,
        hand: &Hand,
        _ctx: &mut EvalContext,
    ) -> BTreeSet<Tile> {
        let mut out = BTreeSet::new();
        for &tile in hand.concealed_tiles() {
            let t = tile.exposed();
            out.insert(t);
            if let Some(p) = t.prev() {
                out.insert(p);
            }
            if let Some(n) = t.next_for_chow() {
                out.insert(n);
            }
        }
        out
    }
}

struct ThirteenOrphans;

impl RuleCode for ThirteenOrphans {
    fn should_try(&self, hand: &Hand) -> bool {
        hand.declared_melds().is_empty() && hand.all_tiles().all(|t| t.is_major())
    }

    fn applies_to_hand(&self, _meta: &RuleMeta, hand: &ArrangedHand, _ctx: &mut EvalContext) -> bool {
        hand.base.is_full()
            && hand.base.declared_melds().is_empty()
            && orphan_shape(&kind_counts(hand.base))
    }

    fn winning_tile_candidates(
        &self,
        _meta: &RuleMeta,
        hand: &Hand,
        _ctx: &mut EvalContext,
    ) -> BTreeSet<Tile> {
        candidates_by_shape(hand, orphan_shape)
    }
}

fn orphan_shape(counts: &Counts) -> bool {
    let mut pairs = 0;
    let mut kinds = 0;
    for kind in 0..counts.len() {
        let c = counts[kind];
        if c == 0 {
            continue;
        }
        if !kind_tile(kind).is_major() || c > 2 {
            return false;
        }
        kinds += 1;
        if c == 2 {
            pairs += 1;
        }
    }
    kinds == 13 && pairs == 1
}

/// The nine gates: 1112345678999 of one suit plus any tile of it.
struct GatesOfHeaven;

impl RuleCode for GatesOfHeaven {
    fn should_try(&self, hand: &Hand) -> bool {
        hand.declared_melds().is_empty()
            && !hand.has_honors()
            && hand.suits().len() == 1
    }

    fn applies_to_hand(&self, _meta: &RuleMeta, hand: &ArrangedHand, _ctx: &mut EvalContext) -> bool {
        let Some(suit) = the_single_suit(hand.base) else {
            return false;
        };
        if !hand.base.is_full() || !hand.base.declared_melds().is_empty() {
            return false;
        }
        let counts = kind_counts(hand.base);
        if !gates_shape(&counts, suit) {
            return false;
        }
        // The nine-sided wait: the winning tile must be the one beyond the
        // 1112345678999 frame. Anything else is a lesser one-suit hand.
        match (gates_extra(&counts, suit), hand.base.last_tile()) {
            (Some(extra), Some(last)) => last.kind() == extra.kind(),
            _ => false,
        }
    }

    fn winning_tile_candidates(
        &self,
        _meta: &RuleMeta,
        hand: &Hand,
        _ctx: &mut EvalContext,
    ) -> BTreeSet<Tile> {
        let Some(suit) = the_single_suit(hand) else {
            return BTreeSet::new();
        };
        candidates_by_shape(hand, |c| gates_shape(c, suit))
    }
}

fn gates_shape(counts: &Counts, suit: TileGroup) -> bool {
    if !one_suit_only(counts, suit) {
        return false;
    }
    let start = 9 * suit as usize;
    let total: u8 = counts[start..start + 9].iter().sum();
    if total != 14 {
        return false;
    }
    counts[start] >= 3
        && counts[start + 8] >= 3
        && counts[start + 1..start + 8].iter().all(|&c| c >= 1)
}

/// The tile beyond the 1112345678999 frame of a full gates hand.
fn gates_extra(counts: &Counts, suit: TileGroup) -> Option<Tile> {
    let start = 9 * suit as usize;
    for v in 0..9 {
        let base = if v == 0 || v == 8 { 3 } else { 1 };
        if counts[start + v] > base {
            return Some(kind_tile(start + v));
        }
    }
    None
}

/// Pungs of 1 and 9 with a run between, the pair on 2, 5 or 8.
struct SquirmingSnake;

impl RuleCode for SquirmingSnake {
    fn should_try(&self, hand: &Hand) -> bool {
        !hand.has_honors() && hand.suits().len() == 1
    }

    fn applies_to_hand(&self, _meta: &RuleMeta, hand: &ArrangedHand, _ctx: &mut EvalContext) -> bool {
        let Some(suit) = the_single_suit(hand.base) else {
            return false;
        };
        hand.base.is_full() && snake_shape(&kind_counts(hand.base), suit)
    }

    fn winning_tile_candidates(
        &self,
        _meta: &RuleMeta,
        hand: &Hand,
        _ctx: &mut EvalContext,
    ) -> BTreeSet<Tile> {
        let Some(suit) = the_single_suit(hand) else {
            return BTreeSet::new();
        };
        candidates_by_shape(hand, |c| snake_shape(c, suit))
    }
}

fn snake_shape(counts: &Counts, suit: TileGroup) -> bool {
    if !one_suit_only(counts, suit) {
        return false;
    }
    let start = 9 * suit as usize;
    if counts[start] != 3 || counts[start + 8] != 3 {
        return false;
    }
    let mut pair_value = None;
    for v in 2..=8usize {
        match counts[start + v - 1] {
            1 => {}
            2 => {
                if pair_value.replace(v).is_some() {
                    return false;
                }
            }
            _ => return false,
        }
    }
    matches!(pair_value, Some(2) | Some(5) | Some(8))
}

/// Pair of 1s, a run 2..9 of the same suit, and one of each wind.
struct WrigglingSnake;

impl RuleCode for WrigglingSnake {
    fn should_try(&self, hand: &Hand) -> bool {
        hand.suits().len() <= 1 && hand.all_tiles().all(|t| !t.is_dragon())
    }

    fn applies_to_hand(&self, _meta: &RuleMeta, hand: &ArrangedHand, _ctx: &mut EvalContext) -> bool {
        let Some(suit) = the_single_suit(hand.base) else {
            return false;
        };
        hand.base.is_full() && wriggling_shape(&kind_counts(hand.base), suit)
    }

    fn winning_tile_candidates(
        &self,
        _meta: &RuleMeta,
        hand: &Hand,
        _ctx: &mut EvalContext,
    ) -> BTreeSet<Tile> {
        let Some(suit) = the_single_suit(hand) else {
            return BTreeSet::new();
        };
        candidates_by_shape(hand, |c| wriggling_shape(c, suit))
    }
}

fn wriggling_shape(counts: &Counts, suit: TileGroup) -> bool {
    let start = 9 * suit as usize;
    for (kind, &c) in counts.iter().enumerate() {
        let ok = if kind >= start && kind < start + 9 {
            true
        } else {
            kind_tile(kind).is_wind()
        };
        if c > 0 && !ok {
            return false;
        }
    }
    if counts[start] != 2 {
        return false;
    }
    if (1..=8).any(|v| counts[start + v] != 1) {
        return false;
    }
    (27..31).all(|k| counts[k] == 1)
}

/// Four same-value triples across all three suits plus a two-suit pair.
struct TripleKnitting;

impl RuleCode for TripleKnitting {
    fn should_try(&self, hand: &Hand) -> bool {
        hand.declared_melds().is_empty() && !hand.has_honors()
    }

    fn applies_to_hand(&self, _meta: &RuleMeta, hand: &ArrangedHand, _ctx: &mut EvalContext) -> bool {
        hand.base.is_full()
            && hand.base.declared_melds().is_empty()
            && triple_knit_shape(&kind_counts(hand.base))
    }

    fn winning_tile_candidates(
        &self,
        _meta: &RuleMeta,
        hand: &Hand,
        _ctx: &mut EvalContext,
    ) -> BTreeSet<Tile> {
        candidates_by_shape(hand, triple_knit_shape)
    }

    fn rearrange(&self, _meta: &RuleMeta, hand: &Hand, _ctx: &mut EvalContext) -> Vec<Arrangement> {
        knitted_arrangement(hand)
    }
}

/// Per value: counts over the three suits. (1,1,1) is a triple, (1,1,0) the
/// pair; the rest must be empty.
fn triple_knit_shape(counts: &Counts) -> bool {
    if counts[27..].iter().any(|&c| c > 0) {
        return false;
    }
    let mut triples = 0;
    let mut pairs = 0;
    for v in 0..9 {
        let mut per = [counts[v], counts[9 + v], counts[18 + v]];
        per.sort_unstable();
        match per {
            [0, 0, 0] => {}
            [1, 1, 1] => triples += 1,
            [0, 1, 1] => pairs += 1,
            [2, 2, 2] => triples += 2,
            _ => return false,
        }
    }
    triples == 4 && pairs == 1
}

/// Seven same-value pairs across exactly two suits.
struct Knitting;

impl RuleCode for Knitting {
    fn should_try(&self, hand: &Hand) -> bool {
        hand.declared_melds().is_empty() && !hand.has_honors() && hand.suits().len() <= 2
    }

    fn applies_to_hand(&self, _meta: &RuleMeta, hand: &ArrangedHand, _ctx: &mut EvalContext) -> bool {
        hand.base.is_full()
            && hand.base.declared_melds().is_empty()
            && knitting_shape(&kind_counts(hand.base))
    }

    fn winning_tile_candidates(
        &self,
        _meta: &RuleMeta,
        hand: &Hand,
        _ctx: &mut EvalContext,
    ) -> BTreeSet<Tile> {
        candidates_by_shape(hand, knitting_shape)
    }

    fn rearrange(&self, _meta: &RuleMeta, hand: &Hand, _ctx: &mut EvalContext) -> Vec<Arrangement> {
        knitted_arrangement(hand)
    }
}

fn knitting_shape(counts: &Counts) -> bool {
    if counts[27..].iter().any(|&c| c > 0) {
        return false;
    }
    let mut used_suits = [false; 3];
    for (kind, &c) in counts[..27].iter().enumerate() {
        if c > 0 {
            used_suits[kind / 9] = true;
        }
    }
    if used_suits.iter().filter(|&&u| u).count() != 2 {
        return false;
    }
    let (a, b) = match used_suits {
        [true, true, false] => (0, 9),
        [true, false, true] => (0, 18),
        _ => (9, 18),
    };
    let mut pairs = 0;
    for v in 0..9 {
        if counts[a + v] != counts[b + v] {
            return false;
        }
        pairs += counts[a + v];
    }
    pairs == 7
}

/// Greedily group same-value tiles across suits into knitted melds; used by
/// both knitting rules to present their arrangements.
fn knitted_arrangement(hand: &Hand) -> Vec<Arrangement> {
    let mut counts = counts_of(hand.concealed_tiles());
    let mut melds: SmallVec<[Meld; 8]> = SmallVec::new();
    let mut leftover: Vec<Tile> = Vec::new();
    for v in 0..9 {
        loop {
            let per = [counts[v], counts[9 + v], counts[18 + v]];
            let suits_with: Vec<usize> = (0..3).filter(|&s| per[s] > 0).collect();
            if suits_with.len() < 2 {
                break;
            }
            let tiles: Vec<Tile> = suits_with
                .iter()
                .map(|&s| kind_tile(9 * s + v).concealed())
                .collect();
            match Meld::new(tiles) {
                Ok(meld) => {
                    for &s in &suits_with {
                        counts[9 * s + v] -= 1;
                    }
                    melds.push(meld);
                }
                Err(_) => break,
            }
        }
    }
    for (kind, &c) in counts.iter().enumerate() {
        for _ in 0..c {
            leftover.push(kind_tile(kind).concealed());
        }
    }
    if melds.is_empty() {
        Vec::new()
    } else {
        vec![(melds, leftover)]
    }
}

/// Seven pairs, terminals and honors only.
struct AllPairHonors;

impl RuleCode for AllPairHonors {
    fn should_try(&self, hand: &Hand) -> bool {
        hand.declared_melds().is_empty() && hand.all_tiles().all(|t| t.is_major())
    }

    fn applies_to_hand(&self, _meta: &RuleMeta, hand: &ArrangedHand, _ctx: &mut EvalContext) -> bool {
        hand.base.is_full()
            && hand.base.declared_melds().is_empty()
            && pair_honors_shape(&kind_counts(hand.base))
    }

    fn winning_tile_candidates(
        &self,
        _meta: &RuleMeta,
        hand: &Hand,
        _ctx: &mut EvalContext,
    ) -> BTreeSet<Tile> {
        candidates_by_shape(hand, pair_honors_shape)
    }
}

fn pair_honors_shape(counts: &Counts) -> bool {
    let mut pairs = 0;
    for kind in 0..counts.len() {
        match counts[kind] {
            0 => {}
            2 if kind_tile(kind).is_major() => pairs += 1,
            _ => return false,
        }
    }
    pairs == 7
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ruleset() -> crate::rule::Ruleset {
        crate::rule::Ruleset::new("empty", "")
    }

    fn applies(code: &dyn RuleCode, text: &str) -> bool {
        let rs = ruleset();
        let mut ctx = EvalContext::new(&rs);
        let hand = Hand::parse(text).unwrap();
        let arranged = ArrangedHand::declared_only(&hand);
        code.applies_to_hand(&RuleMeta::default(), &arranged, &mut ctx)
    }

    fn candidates(code: &dyn RuleCode, text: &str) -> BTreeSet<Tile> {
        let rs = ruleset();
        let mut ctx = EvalContext::new(&rs);
        let hand = Hand::parse(text).unwrap();
        code.winning_tile_candidates(&RuleMeta::default(), &hand, &mut ctx)
    }

    fn tiles(codes: &[&str]) -> BTreeSet<Tile> {
        codes.iter().map(|c| Tile::parse(c).unwrap()).collect()
    }

    #[test]
    fn thirteen_orphans() {
        assert!(applies(
            &ThirteenOrphans,
            "RC1C9B1B9S1S9WeWsWwWnDbDgDrDr mee LDr"
        ));
        assert!(!applies(
            &ThirteenOrphans,
            "RC1C9B1B9S1S9WeWsWwWnDbDgC2C2 mee"
        ));
        // All thirteen present, none doubled: thirteen-sided wait.
        let waits = candidates(&ThirteenOrphans, "RC1C9B1B9S1S9WeWsWwWnDbDgDr mee");
        assert_eq!(waits.len(), 13);
        // One missing, one doubled: single wait on the missing kind.
        let waits = candidates(&ThirteenOrphans, "RC1C9B1B9S1S9WeWsWwWnDbDbDg mee");
        assert_eq!(waits, tiles(&["dr"]));
    }

    #[test]
    fn gates_of_heaven() {
        assert!(applies(
            &GatesOfHeaven,
            "RB1B1B1B2B3B4B5B6B7B8B9B9B9B5 mee LB5"
        ));
        assert!(!applies(
            &GatesOfHeaven,
            "RB1B1B1B2B3B4B5B6B7B8B9B9C1C1 mee"
        ));
        let waits = candidates(&GatesOfHeaven, "RB1B1B1B2B3B4B5B6B7B8B9B9B9 mee");
        assert_eq!(waits.len(), 9);
    }

    #[test]
    fn squirming_snake() {
        assert!(applies(
            &SquirmingSnake,
            "RS1S1S1S2S2S3S4S5S6S7S8S9S9S9 mee"
        ));
        // Pair on 3 does not count.
        assert!(!applies(
            &SquirmingSnake,
            "RS1S1S1S2S3S3S4S5S6S7S8S9S9S9 mee"
        ));
        let waits = candidates(&SquirmingSnake, "RS1S1S1S2S3S4S5S6S7S8S9S9S9 mee");
        assert_eq!(waits, tiles(&["s2", "s5", "s8"]));
    }

    #[test]
    fn wriggling_snake() {
        assert!(applies(
            &WrigglingSnake,
            "RC1C1C2C3C4C5C6C7C8C9WeWsWwWn mee"
        ));
        let waits = candidates(&WrigglingSnake, "RC1C2C3C4C5C6C7C8C9WeWsWwWn mee");
        assert_eq!(waits, tiles(&["c1"]));
    }

    #[test]
    fn triple_knitting() {
        assert!(applies(
            &TripleKnitting,
            "RS2B2C2S4B4C4S6B6C6S8B8C8S9B9 mee"
        ));
        let waits = candidates(&TripleKnitting, "RS2B2C2S4B4C4S6B6C6S8B8C8S9 mee");
        assert_eq!(waits, tiles(&["b9", "c9"]));
    }

    #[test]
    fn knitting() {
        assert!(applies(
            &Knitting,
            "RS1B1S3B3S5B5S7B7S9B9S2B2S4B4 mee"
        ));
        let waits = candidates(&Knitting, "RS1B1S3B3S5B5S7B7S9B9S2B2S4 mee");
        assert_eq!(waits, tiles(&["b4"]));
    }

    #[test]
    fn all_pair_honors() {
        assert!(applies(
            &AllPairHonors,
            "RC1C1C9C9B1B1S9S9WeWeDrDrDbDb mee"
        ));
        assert!(!applies(
            &AllPairHonors,
            "RC2C2C9C9B1B1S9S9WeWeDrDrDbDb mee"
        ));
        let waits = candidates(&AllPairHonors, "RC1C1C9C9B1B1S9S9WeWeDrDrDb mee");
        assert_eq!(waits, tiles(&["db"]));
    }

    #[test]
    fn standard_candidates_are_a_superset() {
        let rs = ruleset();
        let mut ctx = EvalContext::new(&rs);
        let hand = Hand::parse("c1c1c1 b5b6b7 s9s9s9 RDbDbC5C6 mee").unwrap();
        let waits = StandardMahJongg.winning_tile_candidates(&RuleMeta::default(), &hand, &mut ctx);
        assert!(waits.contains(&Tile::parse("c4").unwrap()));
        assert!(waits.contains(&Tile::parse("c7").unwrap()));
        assert!(waits.contains(&Tile::parse("db").unwrap()));
    }

    #[test]
    fn knitted_rearrangement_builds_melds() {
        let hand = Hand::parse("RS2B2C2S4B4C4S6B6C6S8B8C8S9B9 mee").unwrap();
        let rs = ruleset();
        let mut ctx = EvalContext::new(&rs);
        let arrangements = TripleKnitting.rearrange(&RuleMeta::default(), &hand, &mut ctx);
        assert_eq!(arrangements.len(), 1);
        let (melds, leftover) = &arrangements[0];
        assert_eq!(melds.iter().filter(|m| m.is_knitted()).count(), 5);
        assert!(leftover.is_empty());
    }
}
