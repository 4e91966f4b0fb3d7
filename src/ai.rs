//! Robot-player decisions: which tile would win, what to discard, whether
//! to claim a discard.
//!
//! Weights are keep-values: a high weight marks a tile the hand wants to
//! hold on to, and the discard picker takes a minimum-weight candidate.

use std::collections::BTreeSet;

use rand::prelude::*;

use crate::analyzer::{self, EvalContext};
use crate::hand::{Hand, LastSource};
use crate::rule::Ruleset;
use crate::tile::Tile;

/// Per-answer bias a rule can add to the claim decision. Negative values
/// veto, positive values encourage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Claimness {
    pub mah_jongg: i32,
    pub original_call: i32,
    pub kong: i32,
    pub pung: i32,
    pub chow: i32,
    pub discard: i32,
}

impl Claimness {
    pub fn add(&mut self, other: Claimness) {
        self.mah_jongg += other.mah_jongg;
        self.original_call += other.original_call;
        self.kong += other.kong;
        self.pung += other.pung;
        self.chow += other.chow;
        self.discard += other.discard;
    }
}

/// One distinct concealed tile with its keep-value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscardCandidate {
    pub tile: Tile,
    /// Copies of this kind in the concealed bag.
    pub count: usize,
    pub weight: i32,
}

/// Extra table knowledge the discard AI may use. All optional; the empty
/// context weighs a hand on its own merits.
#[derive(Debug, Clone, Default)]
pub struct DiscardContext {
    /// Tile kinds known dangerous to feed right now.
    pub dangerous: BTreeSet<Tile>,
    /// Tiles visible elsewhere (discards and exposed melds), for chance
    /// estimates.
    pub visible: Vec<Tile>,
}

impl DiscardContext {
    fn visible_count(&self, tile: Tile) -> usize {
        self.visible.iter().filter(|t| t.kind() == tile.kind()).count()
    }
}

/// The tiles that would complete a one-away hand: union of every Mah Jongg
/// rule's candidates, pruned to those that really evaluate as a win.
pub fn winning_tiles(hand: &Hand, ruleset: &Ruleset) -> BTreeSet<Tile> {
    if hand.len_offset() != 0 {
        return BTreeSet::new();
    }
    let mut ctx = EvalContext::new(ruleset);
    let mut candidates: BTreeSet<Tile> = BTreeSet::new();
    for rule in ruleset.mj_rules().iter() {
        if !rule.code.should_try(hand) {
            continue;
        }
        candidates.extend(
            rule.code
                .winning_tile_candidates(&rule.meta, hand, &mut ctx)
                .into_iter()
                .map(Tile::exposed),
        );
    }
    candidates
        .into_iter()
        .filter(|&t| hand.count_of(t) < 4)
        .filter(|&t| {
            let full = hand.with(t, LastSource::Discard);
            analyzer::quick_won(&full, ruleset)
        })
        .collect()
}

/// The hypothetical completed hands, one per winning tile, each of which
/// scores as a win.
pub fn calling_hands(hand: &Hand, ruleset: &Ruleset) -> Vec<Hand> {
    winning_tiles(hand, ruleset)
        .into_iter()
        .map(|t| hand.with(t, LastSource::Discard))
        .collect()
}

/// Rough count of live winning tiles: four of each kind minus what this
/// hand and the table already show.
pub fn chances_to_win(hand: &Hand, ruleset: &Ruleset, context: &DiscardContext) -> usize {
    winning_tiles(hand, ruleset)
        .iter()
        .map(|&t| 4usize.saturating_sub(hand.count_of(t) + context.visible_count(t)))
        .sum()
}

/// Build and weigh discard candidates: one per distinct concealed tile.
pub fn discard_candidates(
    hand: &Hand,
    ruleset: &Ruleset,
    context: &DiscardContext,
) -> Vec<DiscardCandidate> {
    let mut candidates: Vec<DiscardCandidate> = Vec::new();
    for &tile in hand.concealed_tiles() {
        if candidates.iter().any(|c| c.tile.kind() == tile.kind()) {
            continue;
        }
        let count = hand
            .concealed_tiles()
            .iter()
            .filter(|t| t.kind() == tile.kind())
            .count();
        candidates.push(DiscardCandidate {
            tile: tile.exposed(),
            count,
            weight: 0,
        });
    }

    weigh_basics(hand, context, &mut candidates);
    weigh_same_colors(hand, &mut candidates);
    weigh_special_games(hand, &mut candidates);
    for rule in ruleset
        .meld_rules()
        .iter()
        .chain(ruleset.hand_rules().iter())
        .chain(ruleset.mj_rules().iter())
        .chain(ruleset.winner_rules().iter())
    {
        rule.code.weigh(&rule.meta, hand, &mut candidates);
    }
    weigh_original_call(hand, ruleset, &mut candidates);
    weigh_calling_hand(hand, ruleset, context, &mut candidates);
    candidates
}

/// Pick a discard: uniformly random among the minimum-weight candidates.
pub fn choose_discard(hand: &Hand, ruleset: &Ruleset, context: &DiscardContext, rng: &mut impl Rng) -> Option<Tile> {
    let candidates = discard_candidates(hand, ruleset, context);
    let min = candidates.iter().map(|c| c.weight).min()?;
    let lowest: Vec<&DiscardCandidate> =
        candidates.iter().filter(|c| c.weight == min).collect();
    lowest.choose(rng).map(|c| c.tile)
}

/// Keep pairs and triples, give honors a light push out the door early,
/// and hold anything the table marks dangerous.
fn weigh_basics(hand: &Hand, context: &DiscardContext, candidates: &mut [DiscardCandidate]) {
    for c in candidates.iter_mut() {
        if c.count >= 2 {
            c.weight += 40 * (c.count as i32 - 1);
        }
        if c.tile.is_honor() && c.count == 1 {
            c.weight -= 8;
        } else if c.tile.is_terminal() && c.count == 1 {
            c.weight -= 4;
        }
        if c.tile.is_suit() {
            for other in hand.concealed_tiles() {
                if other.kind() == c.tile.concealed().kind() || !other.is_suit() {
                    continue;
                }
                if other.group() == c.tile.group() {
                    let gap = (i16::from(other.value()) - i16::from(c.tile.value())).abs();
                    if gap == 1 {
                        c.weight += 10;
                    } else if gap == 2 {
                        c.weight += 5;
                    }
                }
            }
        }
        if context.dangerous.iter().any(|d| d.kind() == c.tile.kind()) {
            c.weight += 60;
        }
    }
}

/// Reward company in a color.
fn weigh_same_colors(hand: &Hand, candidates: &mut [DiscardCandidate]) {
    for c in candidates.iter_mut() {
        if !c.tile.is_suit() {
            continue;
        }
        let same = hand
            .concealed_tiles()
            .iter()
            .filter(|t| t.is_suit() && t.group() == c.tile.group())
            .count();
        c.weight += (same.saturating_sub(1)) as i32;
    }
}

/// Push toward color and honor games once the shape leans that way.
fn weigh_special_games(hand: &Hand, candidates: &mut [DiscardCandidate]) {
    let total = hand.concealed_tiles().len() + 3 * hand.declared_melds().len();
    if total == 0 {
        return;
    }
    let mut per_suit = [0usize; 3];
    let mut honors = 0usize;
    for t in hand.all_tiles() {
        if t.is_honor() {
            honors += 1;
        } else if t.is_suit() {
            per_suit[t.group() as usize] += 1;
        }
    }
    let (best_suit, best_count) = per_suit
        .iter()
        .enumerate()
        .max_by_key(|(_, &c)| c)
        .map(|(i, &c)| (i, c))
        .unwrap_or((0, 0));
    // Only lean in once a single color clearly dominates.
    if best_count + honors >= total * 2 / 3 {
        for c in candidates.iter_mut() {
            if c.tile.is_honor() {
                c.weight += 15;
            } else if c.tile.group() as usize == best_suit {
                c.weight += 10;
            } else {
                c.weight -= 15;
            }
        }
    }
}

/// An original call pins the hand: everything except the fresh tile stays.
fn weigh_original_call(hand: &Hand, ruleset: &Ruleset, candidates: &mut [DiscardCandidate]) {
    if !hand.announcements.original_call {
        return;
    }
    if let Some(last) = hand.last_tile() {
        let winners = winning_tiles(&hand.without(last).unwrap_or_else(|| hand.clone()), ruleset);
        for c in candidates.iter_mut() {
            if c.tile.kind() != last.kind() || winners.contains(&c.tile.exposed()) {
                c.weight += 1000;
            }
        }
    }
}

/// Prefer discards that leave the hand calling, scaled by how many tiles
/// can still win and what they would score.
fn weigh_calling_hand(
    hand: &Hand,
    ruleset: &Ruleset,
    context: &DiscardContext,
    candidates: &mut [DiscardCandidate],
) {
    if hand.len_offset() != 1 {
        return;
    }
    for c in candidates.iter_mut() {
        let Some(reduced) = hand.without(c.tile) else {
            continue;
        };
        let winners = winning_tiles(&reduced, ruleset);
        if winners.is_empty() {
            continue;
        }
        let mut live = 0usize;
        let mut best_total = 0i32;
        for &t in &winners {
            live += 4usize.saturating_sub(reduced.count_of(t) + context.visible_count(t));
            let result = analyzer::evaluate_shallow(&reduced.with(t, LastSource::Discard), ruleset);
            best_total = best_total.max(result.total);
        }
        c.weight -= 50 + 4 * live as i32 + best_total / 10;
    }
}

/// What a player answers to a discard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ClaimAnswer {
    NoClaim,
    Chow,
    Pung,
    Kong,
    MahJongg,
}

/// Decide a claim on `discard` for the player holding `hand` (13 tiles).
///
/// Answers are tried in fixed priority order; a rule claimness sum below
/// zero vetoes an answer whose prerequisites would otherwise hold.
pub fn claim_for(
    hand: &Hand,
    discard: Tile,
    ruleset: &Ruleset,
    next_to_discarder: bool,
) -> ClaimAnswer {
    let mut claimness = Claimness::default();
    for rule in ruleset
        .meld_rules()
        .iter()
        .chain(ruleset.hand_rules().iter())
        .chain(ruleset.mj_rules().iter())
        .chain(ruleset.winner_rules().iter())
        .chain(ruleset.loser_rules().iter())
    {
        claimness.add(rule.code.claimness(&rule.meta, hand, discard));
    }

    let held = hand
        .concealed_tiles()
        .iter()
        .filter(|t| t.kind() == discard.kind())
        .count();

    if claimness.mah_jongg >= 0 && hand.len_offset() == 0 {
        let full = hand.with(discard, LastSource::Discard);
        if analyzer::quick_won(&full, ruleset) {
            return ClaimAnswer::MahJongg;
        }
    }
    if claimness.kong >= 0 && held >= 3 {
        return ClaimAnswer::Kong;
    }
    if claimness.pung >= 0 && held >= 2 {
        return ClaimAnswer::Pung;
    }
    if next_to_discarder && claimness.chow >= 0 && discard.is_suit() {
        let has = |t: Option<Tile>| {
            t.is_some_and(|t| hand.concealed_tiles().iter().any(|h| h.kind() == t.kind()))
        };
        let completes_chow = (has(discard.prev2()) && has(discard.prev()))
            || (has(discard.prev()) && has(discard.next_for_chow()))
            || (has(discard.next_for_chow()) && has(discard.next2()));
        if completes_chow {
            // A chow is only worth a claim while chows are still allowed.
            let chows_declared = hand
                .declared_melds()
                .iter()
                .filter(|m| m.is_chow())
                .count();
            if chows_declared < ruleset.max_chows() {
                return ClaimAnswer::Chow;
            }
        }
    }
    ClaimAnswer::NoClaim
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presets;
    use crate::rules::RuleRegistry;

    fn dmjl() -> Ruleset {
        presets::classical_chinese_dmjl(&RuleRegistry::standard())
    }

    #[test]
    fn winning_tiles_for_simple_wait() {
        let rs = dmjl();
        // Waiting on the pair: 4 complete melds plus a lone white dragon.
        let hand =
            Hand::parse("c1c1c1 c2c3c4 b5b6b7 s9s9s9 RDb mee").unwrap();
        let tiles = winning_tiles(&hand, &rs);
        assert_eq!(tiles, BTreeSet::from([Tile::parse("db").unwrap()]));
    }

    #[test]
    fn winning_tiles_two_sided_wait() {
        let rs = dmjl();
        let hand = Hand::parse("c1c1c1 b5b6b7 s9s9s9 RDbDbC5C6 mee").unwrap();
        let tiles = winning_tiles(&hand, &rs);
        assert_eq!(
            tiles,
            BTreeSet::from([Tile::parse("c4").unwrap(), Tile::parse("c7").unwrap()])
        );
    }

    #[test]
    fn full_hand_is_not_calling() {
        let rs = dmjl();
        let hand = Hand::parse("c1c1c1 c2c3c4 b5b6b7 s9s9s9 RDbDb mee").unwrap();
        assert_eq!(hand.len_offset(), 1);
        assert!(winning_tiles(&hand, &rs).is_empty());
    }

    #[test]
    fn discard_prefers_the_loner() {
        let rs = dmjl();
        // A pair-heavy hand with one stray tile: the stray should fall.
        let hand = Hand::parse("c1c1c1 c2c3c4 b5b6b7 RS9S9DbDbWe mee").unwrap();
        let candidates = discard_candidates(&hand, &rs, &DiscardContext::default());
        let we = candidates
            .iter()
            .find(|c| c.tile == Tile::parse("we").unwrap())
            .unwrap();
        for c in &candidates {
            if c.tile != we.tile {
                assert!(we.weight <= c.weight, "{:?} kept less than {:?}", we, c);
            }
        }
        let mut rng = StdRng::seed_from_u64(5);
        let pick = choose_discard(&hand, &rs, &DiscardContext::default(), &mut rng).unwrap();
        assert_eq!(pick, Tile::parse("we").unwrap());
    }

    #[test]
    fn claim_priorities() {
        let rs = dmjl();
        // Completing the pair wins: Mah Jongg outranks the pung.
        let hand = Hand::parse("c1c1c1 c2c3c4 b5b6b7 s9s9s9 RDb mee").unwrap();
        assert_eq!(
            claim_for(&hand, Tile::parse("db").unwrap(), &rs, false),
            ClaimAnswer::MahJongg
        );
        // Two held copies make a pung.
        let hand = Hand::parse("c2c3c4 b5b6b7 RS9S9DbDbWeWnC9 mee").unwrap();
        assert_eq!(
            claim_for(&hand, Tile::parse("s9").unwrap(), &rs, false),
            ClaimAnswer::Pung
        );
        // A chow claim needs the seat next to the discarder.
        let hand = Hand::parse("c2c3c4 b5b6b7 RS9S9DbDbC5C6C9 mee").unwrap();
        assert_eq!(
            claim_for(&hand, Tile::parse("c7").unwrap(), &rs, false),
            ClaimAnswer::NoClaim
        );
        assert_eq!(
            claim_for(&hand, Tile::parse("c7").unwrap(), &rs, true),
            ClaimAnswer::Chow
        );
    }
}
