//! The hand analyzer: arranges the concealed bag into melds, evaluates every
//! candidate arrangement against a ruleset and keeps the best one.

use ahash::AHashMap;
use smallvec::SmallVec;

use crate::decompose::{Decomposer, MeldList};
use crate::hand::Hand;
use crate::meld::Meld;
use crate::rule::Ruleset;
use crate::score::Score;
use crate::tile::Tile;

/// A proposed partitioning of the concealed bag: complete melds plus the
/// tiles left over.
pub type Arrangement = (MeldList, Vec<Tile>);

/// Hard cap on fallback partitions per evaluation. The decomposer is lazy;
/// pathological bags stop here instead of running away.
const MAX_PARTITIONS: usize = 1000;

/// A hand with one concrete meld structure: the declared melds plus one
/// partitioning of the concealed bag, leftovers carried as singles.
pub struct ArrangedHand<'a> {
    pub base: &'a Hand,
    melds: MeldList,
}

impl<'a> ArrangedHand<'a> {
    /// The trivial arrangement: declared melds plus the bag as singles.
    pub fn declared_only(base: &'a Hand) -> ArrangedHand<'a> {
        ArrangedHand::new(base, &raw_arrangement(base), true)
    }

    pub(crate) fn new(
        base: &'a Hand,
        arrangement: &Arrangement,
        with_bonus: bool,
    ) -> ArrangedHand<'a> {
        let mut melds: MeldList = SmallVec::new();
        melds.extend(base.declared_melds().iter().cloned());
        melds.extend(arrangement.0.iter().cloned());
        for &tile in &arrangement.1 {
            melds.push(Meld::single(tile));
        }
        if with_bonus {
            for &tile in base.bonus_tiles() {
                melds.push(Meld::single(tile));
            }
        }
        melds.sort_by_key(Meld::key);
        ArrangedHand { base, melds }
    }

    /// Every meld of the arrangement, bonus melds included.
    pub fn melds(&self) -> &[Meld] {
        &self.melds
    }

    pub fn chow_count(&self) -> usize {
        self.melds.iter().filter(|m| m.is_chow()).count()
    }

    /// The meld the last tile completed: the declared one if the hand says,
    /// otherwise the smallest arranged meld containing the last tile.
    pub fn last_meld(&self) -> Option<Meld> {
        if let Some(m) = self.base.last_meld() {
            return Some(m.clone());
        }
        let last = self.base.last_tile()?;
        self.melds
            .iter()
            .filter(|m| !m.is_bonus() && m.has_kind_of(last))
            .min_by_key(|m| m.len())
            .cloned()
    }

    fn sort_key(&self) -> String {
        self.melds.iter().map(Meld::key).collect::<Vec<_>>().join("/")
    }
}

/// Per-evaluation scratch state. Rule code methods memoize here instead of
/// mutating the hand; the context dies with the evaluation.
pub struct EvalContext<'r> {
    pub ruleset: &'r Ruleset,
    /// Set while pruning hypothetical calling hands: rules that would
    /// recurse into further what-if evaluation must answer cheaply.
    pub shallow: bool,
    /// Sum of meld points of the arrangement under evaluation; filled by
    /// the analyzer before hand rules run.
    pub meld_points: i32,
    memo: AHashMap<(u32, u8), bool>,
}

impl<'r> EvalContext<'r> {
    pub fn new(ruleset: &'r Ruleset) -> EvalContext<'r> {
        EvalContext {
            ruleset,
            shallow: false,
            meld_points: 0,
            memo: AHashMap::new(),
        }
    }

    /// Memoize a boolean rule function by (rule id, function tag).
    pub fn memo_bool(
        &mut self,
        rule_id: u32,
        func: u8,
        compute: impl FnOnce(&mut EvalContext<'r>) -> bool,
    ) -> bool {
        let key = (rule_id, func);
        if let Some(&v) = self.memo.get(&key) {
            return v;
        }
        let v = compute(self);
        self.memo.insert(key, v);
        v
    }

    pub fn max_chows(&self) -> usize {
        self.ruleset.max_chows()
    }
}

/// One rule application recorded in the result.
#[derive(Debug, Clone, PartialEq)]
pub struct UsedRule {
    pub name: String,
    pub score: Score,
    /// The meld that triggered it, for per-meld rules.
    pub meld: Option<String>,
}

/// The authoritative answer for one hand under one ruleset.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HandResult {
    pub won: bool,
    pub score: Score,
    pub total: i32,
    pub used_rules: Vec<UsedRule>,
    /// The chosen arrangement, as meld code strings.
    pub arrangement: Vec<String>,
    /// Name of the Mah Jongg rule that fired, if any.
    pub mj_rule: Option<String>,
}

/// Evaluate a hand: arrange the bag, score every candidate, pick the best.
pub fn evaluate(hand: &Hand, ruleset: &Ruleset) -> HandResult {
    evaluate_inner(hand, ruleset, false)
}

/// Shallow evaluation used while pruning hypothetical hands; winner rules
/// that would recurse answer conservatively.
pub(crate) fn evaluate_shallow(hand: &Hand, ruleset: &Ruleset) -> HandResult {
    evaluate_inner(hand, ruleset, true)
}

/// Does some Mah Jongg rule accept this hand structurally? No scoring, no
/// arrangement enumeration.
pub(crate) fn wins_structurally(hand: &Hand, ruleset: &Ruleset) -> bool {
    if !hand.is_full() {
        return false;
    }
    let mut ctx = EvalContext::new(ruleset);
    ctx.shallow = true;
    ruleset
        .mj_rules()
        .iter()
        .any(|rule| rule.code.should_try(hand) && rule.code.wins_hand(&rule.meta, hand, &mut ctx))
}

/// Fast win test: structural when the ruleset has no score minimums (the
/// winner rules alone clear a zero bar), the full evaluation otherwise.
pub(crate) fn quick_won(hand: &Hand, ruleset: &Ruleset) -> bool {
    if ruleset.min_mj_points() <= 0 && ruleset.min_mj_doubles() == 0 {
        wins_structurally(hand, ruleset)
    } else {
        evaluate_shallow(hand, ruleset).won
    }
}

fn evaluate_inner(hand: &Hand, ruleset: &Ruleset, shallow: bool) -> HandResult {
    let mut ctx = EvalContext::new(ruleset);
    ctx.shallow = shallow;

    let arrangements = arrangements_for(hand, &mut ctx);
    let with_bonus = ruleset.with_bonus_tiles();

    let mut best: Option<(CandidateKey, HandResult)> = None;
    for arrangement in &arrangements {
        let arranged = ArrangedHand::new(hand, arrangement, with_bonus);
        let candidate = evaluate_arrangement(&arranged, &mut ctx);
        let key = CandidateKey {
            total: candidate.total,
            won: candidate.won,
            doubles: candidate.score.doubles,
            order: arranged.sort_key(),
        };
        let better = match &best {
            None => true,
            Some((best_key, _)) => key.beats(best_key),
        };
        if better {
            best = Some((key, candidate));
        }
    }
    best.map(|(_, r)| r).unwrap_or_default()
}

struct CandidateKey {
    total: i32,
    won: bool,
    doubles: u16,
    order: String,
}

impl CandidateKey {
    /// Highest total wins; ties prefer a won hand, then fewer doubles,
    /// then the canonical meld order.
    fn beats(&self, other: &CandidateKey) -> bool {
        (self.total, self.won, std::cmp::Reverse(self.doubles), std::cmp::Reverse(self.order.clone()))
            > (
                other.total,
                other.won,
                std::cmp::Reverse(other.doubles),
                std::cmp::Reverse(other.order.clone()),
            )
    }
}

/// Collect candidate arrangements: Mah Jongg rules propose theirs first,
/// the generic decomposer fills in the rest.
fn arrangements_for<'r>(hand: &Hand, ctx: &mut EvalContext<'r>) -> Vec<Arrangement> {
    let mut arrangements: Vec<Arrangement> = Vec::new();

    let ruleset = ctx.ruleset;
    for rule in ruleset.mj_rules().iter() {
        if !rule.code.should_try(hand) {
            continue;
        }
        arrangements.extend(rule.code.rearrange(&rule.meta, hand, ctx));
    }

    // Guarantee that a fully-decomposable bag contributes its complete
    // partition even when the lazy enumeration below is cut short.
    if let Some((sets, need_pair, chow_budget)) =
        crate::rules::standard_requirements(hand, ctx.max_chows())
    {
        let counts = crate::decompose::counts_of(hand.concealed_tiles());
        if let Some(melds) = crate::decompose::first_complete(&counts, sets, need_pair, chow_budget)
        {
            arrangements.push((melds, Vec::new()));
        }
    }

    let max_chows = ctx.max_chows();
    for partition in Decomposer::new(hand.concealed_tiles(), max_chows).take(MAX_PARTITIONS) {
        let mut melds: MeldList = SmallVec::new();
        let mut leftover = Vec::new();
        for meld in partition {
            if meld.is_single() {
                leftover.push(meld.first());
            } else {
                melds.push(meld);
            }
        }
        arrangements.push((melds, leftover));
    }

    if arrangements.is_empty() {
        arrangements.push((SmallVec::new(), hand.concealed_tiles().to_vec()));
    }
    arrangements
}

/// Score one concrete arrangement against every rule list.
fn evaluate_arrangement<'r>(arranged: &ArrangedHand, ctx: &mut EvalContext<'r>) -> HandResult {
    let ruleset = ctx.ruleset;
    let mut used: Vec<UsedRule> = Vec::new();
    let mut score = Score::ZERO;

    // Per-meld rules, static and dynamic alike.
    let mut meld_points = 0;
    for rule in ruleset.meld_rules().iter() {
        for meld in arranged.melds() {
            if !rule.code.may_apply_to_meld(meld) {
                continue;
            }
            if rule.code.applies_to_meld(&rule.meta, Some(arranged), meld) {
                score += rule.score;
                if !meld.is_bonus() {
                    meld_points += rule.score.points;
                }
                used.push(UsedRule {
                    name: rule.name.clone(),
                    score: rule.score,
                    meld: Some(meld.key()),
                });
            }
        }
    }
    ctx.meld_points = meld_points;

    // Hand-wide rules.
    for rule in ruleset.hand_rules().iter() {
        if rule.code.applies_to_hand(&rule.meta, arranged, ctx) {
            score += rule.score;
            used.push(UsedRule {
                name: rule.name.clone(),
                score: rule.score,
                meld: None,
            });
        }
    }

    let limit = ruleset.limit();
    let roof_off = ruleset.roof_off();

    // The winner path: some Mah Jongg rule must accept the arrangement and
    // the result must clear the ruleset minimums.
    let mut best_won: Option<HandResult> = None;
    if arranged.base.is_full() {
        for mj_rule in ruleset.mj_rules().iter() {
            if !mj_rule.code.should_try(arranged.base) {
                continue;
            }
            if !mj_rule
                .code
                .applies_to_hand(&mj_rule.meta, arranged, ctx)
            {
                continue;
            }
            let mut won_score = score + mj_rule.score;
            let mut won_used = used.clone();
            won_used.push(UsedRule {
                name: mj_rule.name.clone(),
                score: mj_rule.score,
                meld: None,
            });
            for rule in ruleset.winner_rules().iter() {
                if rule.code.applies_to_hand(&rule.meta, arranged, ctx) {
                    won_score += rule.score;
                    won_used.push(UsedRule {
                        name: rule.name.clone(),
                        score: rule.score,
                        meld: None,
                    });
                }
            }
            let total = won_score.total(limit, roof_off);
            if total < ruleset.min_mj_points()
                || won_score.doubles < ruleset.min_mj_doubles()
            {
                continue;
            }
            let candidate = HandResult {
                won: true,
                score: won_score,
                total,
                used_rules: won_used,
                arrangement: arranged.melds().iter().map(Meld::key).collect(),
                mj_rule: Some(mj_rule.name.clone()),
            };
            let better = match &best_won {
                None => true,
                Some(b) => (candidate.total, std::cmp::Reverse(candidate.score.doubles))
                    > (b.total, std::cmp::Reverse(b.score.doubles)),
            };
            if better {
                best_won = Some(candidate);
            }
        }
    }
    if let Some(result) = best_won {
        return result;
    }

    // The loser path.
    for rule in ruleset.loser_rules().iter() {
        if rule.code.applies_to_hand(&rule.meta, arranged, ctx) {
            score += rule.score;
            used.push(UsedRule {
                name: rule.name.clone(),
                score: rule.score,
                meld: None,
            });
        }
    }
    HandResult {
        won: false,
        score,
        total: score.total(limit, roof_off),
        used_rules: used,
        arrangement: arranged.melds().iter().map(Meld::key).collect(),
        mj_rule: None,
    }
}

/// Build the trivial arrangement of a hand (used by rules that inspect the
/// raw tile multiset rather than meld structure).
pub fn raw_arrangement(hand: &Hand) -> Arrangement {
    (SmallVec::new(), hand.concealed_tiles().to_vec())
}
