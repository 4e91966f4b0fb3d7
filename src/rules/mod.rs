//! The rule code library.
//!
//! Every scoring condition a ruleset can reference is a [`RuleCode`]: a named
//! behavior registered under the key its definition string uses. Rulesets
//! resolve keys at load time against an explicit [`RuleRegistry`]; an
//! unresolvable key makes the ruleset unusable.

use std::collections::BTreeSet;
use std::sync::Arc;

use ahash::AHashMap;

use crate::ai::{Claimness, DiscardCandidate};
use crate::analyzer::{Arrangement, ArrangedHand, EvalContext};
use crate::hand::Hand;
use crate::meld::Meld;
use crate::rule::RuleMeta;
use crate::tile::{Tile, Wind};

mod hands;
mod lasttile;
mod limits;
mod melds;

pub(crate) use limits::standard_requirements;

/// What the rotation-influencing rules see of the game.
#[derive(Debug, Clone, Copy)]
pub struct RotationView {
    pub winner_wind: Option<Wind>,
    /// Consecutive wins of the current East, this seat arrangement.
    pub east_streak: u32,
}

/// One rule behavior. Every method has a no-effect default; a code
/// implements the subset that matters for it.
pub trait RuleCode: Send + Sync {
    /// Hand-wide condition over a concrete arrangement.
    fn applies_to_hand(&self, meta: &RuleMeta, hand: &ArrangedHand, ctx: &mut EvalContext) -> bool {
        let _ = (meta, hand, ctx);
        false
    }

    /// Per-meld condition. `hand` gives context such as the seat winds.
    fn applies_to_meld(&self, meta: &RuleMeta, hand: Option<&ArrangedHand>, meld: &Meld) -> bool {
        let _ = (meta, hand, meld);
        false
    }

    /// Context-free prefilter; a `false` skips [`RuleCode::applies_to_meld`].
    fn may_apply_to_meld(&self, meld: &Meld) -> bool {
        let _ = meld;
        true
    }

    /// For Mah Jongg rules: tiles that would complete a one-away hand.
    /// Callers prune the result by full evaluation, so supersets are fine.
    fn winning_tile_candidates(
        &self,
        meta: &RuleMeta,
        hand: &Hand,
        ctx: &mut EvalContext,
    ) -> BTreeSet<Tile> {
        let _ = (meta, hand, ctx);
        BTreeSet::new()
    }

    /// For Mah Jongg rules: propose partitionings of the concealed bag.
    fn rearrange(&self, meta: &RuleMeta, hand: &Hand, ctx: &mut EvalContext) -> Vec<Arrangement> {
        let _ = (meta, hand, ctx);
        Vec::new()
    }

    /// Structural win test without committing to an arrangement. The
    /// default asks [`RuleCode::applies_to_hand`] on the trivial
    /// arrangement, which fits every shape rule that inspects the raw
    /// tiles; rules that need a complete arrangement override it.
    fn wins_hand(&self, meta: &RuleMeta, hand: &Hand, ctx: &mut EvalContext) -> bool {
        let arranged = ArrangedHand::declared_only(hand);
        self.applies_to_hand(meta, &arranged, ctx)
    }

    /// Cheap shape test: is this hand worth running the full check on?
    fn should_try(&self, hand: &Hand) -> bool {
        let _ = hand;
        true
    }

    /// AI hook: adjust discard candidate weights.
    fn weigh(&self, meta: &RuleMeta, hand: &Hand, candidates: &mut [DiscardCandidate]) {
        let _ = (meta, hand, candidates);
    }

    /// AI hook: bias the desirability of claiming `discard`.
    fn claimness(&self, meta: &RuleMeta, hand: &Hand, discard: Tile) -> Claimness {
        let _ = (meta, hand, discard);
        Claimness::default()
    }

    /// Game-over hook for rotation rules such as nine East wins in a row.
    fn ends_game(&self, meta: &RuleMeta, view: &RotationView) -> bool {
        let _ = (meta, view);
        false
    }

    /// The melds the last tile could have completed, for rules that score
    /// by what the winning tile finished.
    fn compute_last_melds(&self, meta: &RuleMeta, hand: &ArrangedHand) -> Vec<Meld> {
        let _ = (meta, hand);
        Vec::new()
    }

    /// Whether a human scorer may select this rule manually for `hand`.
    fn selectable(&self, hand: &Hand) -> bool {
        let _ = hand;
        true
    }
}

/// Placeholder code for parameter rules, which have behavior nowhere.
struct NoCode;

impl RuleCode for NoCode {}

pub fn no_code() -> Arc<dyn RuleCode> {
    Arc::new(NoCode)
}

/// Explicit name → code registry. Populated once at engine init.
pub struct RuleRegistry {
    map: AHashMap<&'static str, Arc<dyn RuleCode>>,
}

impl RuleRegistry {
    pub fn empty() -> RuleRegistry {
        RuleRegistry {
            map: AHashMap::new(),
        }
    }

    /// The full built-in library.
    pub fn standard() -> RuleRegistry {
        let mut reg = RuleRegistry::empty();
        melds::register(&mut reg);
        hands::register(&mut reg);
        limits::register(&mut reg);
        lasttile::register(&mut reg);
        reg.register("Penalty", Arc::new(NoCode));
        reg
    }

    pub fn register(&mut self, key: &'static str, code: Arc<dyn RuleCode>) {
        self.map.insert(key, code);
    }

    pub fn get(&self, key: &str) -> Option<Arc<dyn RuleCode>> {
        self.map.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

// ---- helpers shared across the library ----

/// Pungs and kongs of the arrangement, declared and arranged alike.
pub(crate) fn pung_like<'a>(hand: &'a ArrangedHand) -> impl Iterator<Item = &'a Meld> {
    hand.melds().iter().filter(|m| m.is_pung_like())
}

pub(crate) fn count_wind_pungs(hand: &ArrangedHand) -> usize {
    pung_like(hand).filter(|m| m.is_wind_meld()).count()
}

pub(crate) fn count_dragon_pungs(hand: &ArrangedHand) -> usize {
    pung_like(hand).filter(|m| m.is_dragon_meld()).count()
}

pub(crate) fn has_pair_of(hand: &ArrangedHand, pred: impl Fn(&Meld) -> bool) -> bool {
    hand.melds().iter().any(|m| m.is_pair() && pred(m))
}

/// All playable tiles of the base hand satisfy the predicate.
pub(crate) fn all_tiles(hand: &ArrangedHand, pred: impl Fn(Tile) -> bool) -> bool {
    hand.base.all_tiles().all(pred)
}

/// True when the hand shows no claimed meld: everything still counts as
/// concealed (concealed kongs included).
pub(crate) fn fully_concealed(hand: &ArrangedHand) -> bool {
    hand.melds()
        .iter()
        .filter(|m| !m.is_bonus())
        .all(|m| m.is_concealed())
}

/// Complete melds only: no leftover singles besides the pair structure.
pub(crate) fn is_complete_arrangement(hand: &ArrangedHand) -> bool {
    let mut pairs = 0;
    for meld in hand.melds() {
        match meld.len() {
            2 if meld.is_pair() => pairs += 1,
            3 | 4 if !meld.is_single() => {}
            _ if meld.is_bonus() => {}
            _ => return false,
        }
    }
    pairs == 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_resolves_known_keys() {
        let reg = RuleRegistry::standard();
        for key in [
            "DragonPungKong",
            "OwnWindPungKong",
            "RoundWindPungKong",
            "DragonPair",
            "ExposedMinorPung",
            "ConcealedHonorsKong",
            "Bonus",
            "NoChow",
            "TrueColorGame",
            "StandardMahJongg",
            "ThirteenOrphans",
            "GatesOfHeaven",
            "SquirmingSnake",
            "TripleKnitting",
            "LastTileFromWall",
            "RobbingKong",
            "BlessingOfHeaven",
            "NineEastWins",
            "Penalty",
        ] {
            assert!(reg.get(key).is_some(), "missing rule code {key}");
        }
        assert!(reg.get("DoesNotExist").is_none());
        assert!(reg.len() > 50);
    }
}
