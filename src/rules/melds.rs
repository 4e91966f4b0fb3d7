//! Per-meld rule codes: the static scoring table of pungs, kongs, pairs and
//! bonus tiles.

use std::sync::Arc;

use super::{RuleCode, RuleRegistry};
use crate::ai::DiscardCandidate;
use crate::analyzer::ArrangedHand;
use crate::hand::Hand;
use crate::meld::{KongStyle, Meld, MeldKind};
use crate::rule::RuleMeta;
use crate::tile::Tile;

pub(super) fn register(reg: &mut RuleRegistry) {
    reg.register("DragonPungKong", Arc::new(DragonPungKong));
    reg.register("RoundWindPungKong", Arc::new(RoundWindPungKong));
    reg.register("OwnWindPungKong", Arc::new(OwnWindPungKong));
    reg.register("DragonPair", Arc::new(DragonPair));
    reg.register("RoundWindPair", Arc::new(RoundWindPair));
    reg.register("OwnWindPair", Arc::new(OwnWindPair));
    reg.register("Bonus", Arc::new(Bonus));
    reg.register(
        "ExposedMinorPung",
        Arc::new(PungTable::new(false, Class::Minor, false)),
    );
    reg.register(
        "ExposedTerminalsPung",
        Arc::new(PungTable::new(false, Class::Terminal, false)),
    );
    reg.register(
        "ExposedHonorsPung",
        Arc::new(PungTable::new(false, Class::Honor, false)),
    );
    reg.register(
        "ConcealedMinorPung",
        Arc::new(PungTable::new(true, Class::Minor, false)),
    );
    reg.register(
        "ConcealedTerminalsPung",
        Arc::new(PungTable::new(true, Class::Terminal, false)),
    );
    reg.register(
        "ConcealedHonorsPung",
        Arc::new(PungTable::new(true, Class::Honor, false)),
    );
    reg.register(
        "ExposedMinorKong",
        Arc::new(PungTable::new(false, Class::Minor, true)),
    );
    reg.register(
        "ExposedTerminalsKong",
        Arc::new(PungTable::new(false, Class::Terminal, true)),
    );
    reg.register(
        "ExposedHonorsKong",
        Arc::new(PungTable::new(false, Class::Honor, true)),
    );
    reg.register(
        "ConcealedMinorKong",
        Arc::new(PungTable::new(true, Class::Minor, true)),
    );
    reg.register(
        "ConcealedTerminalsKong",
        Arc::new(PungTable::new(true, Class::Terminal, true)),
    );
    reg.register(
        "ConcealedHonorsKong",
        Arc::new(PungTable::new(true, Class::Honor, true)),
    );
}

/// Raise the keep-weight of every candidate matching the predicate when at
/// least two copies are already held.
fn keep_toward_pung(
    hand: &Hand,
    candidates: &mut [DiscardCandidate],
    wanted: impl Fn(Tile) -> bool,
) {
    for c in candidates.iter_mut() {
        if wanted(c.tile) && hand.count_of(c.tile) >= 2 {
            c.weight += 15;
        }
    }
}

struct DragonPungKong;

impl RuleCode for DragonPungKong {
    fn may_apply_to_meld(&self, meld: &Meld) -> bool {
        meld.is_pung_like()
    }

    fn applies_to_meld(&self, _meta: &RuleMeta, _hand: Option<&ArrangedHand>, meld: &Meld) -> bool {
        meld.is_pung_like() && meld.is_dragon_meld()
    }

    fn weigh(&self, _meta: &RuleMeta, hand: &Hand, candidates: &mut [DiscardCandidate]) {
        keep_toward_pung(hand, candidates, Tile::is_dragon);
    }
}

struct RoundWindPungKong;

impl RuleCode for RoundWindPungKong {
    fn may_apply_to_meld(&self, meld: &Meld) -> bool {
        meld.is_pung_like() && meld.is_wind_meld()
    }

    fn applies_to_meld(&self, _meta: &RuleMeta, hand: Option<&ArrangedHand>, meld: &Meld) -> bool {
        let Some(hand) = hand else { return false };
        meld.is_pung_like() && meld.first().wind() == Some(hand.base.round_wind)
    }

    fn weigh(&self, _meta: &RuleMeta, hand: &Hand, candidates: &mut [DiscardCandidate]) {
        let round = hand.round_wind;
        keep_toward_pung(hand, candidates, |t| t.is_wind() && t.wind() == Some(round));
    }
}

struct OwnWindPungKong;

impl RuleCode for OwnWindPungKong {
    fn may_apply_to_meld(&self, meld: &Meld) -> bool {
        meld.is_pung_like() && meld.is_wind_meld()
    }

    fn applies_to_meld(&self, _meta: &RuleMeta, hand: Option<&ArrangedHand>, meld: &Meld) -> bool {
        let Some(hand) = hand else { return false };
        meld.is_pung_like() && meld.first().wind() == Some(hand.base.own_wind)
    }

    fn weigh(&self, _meta: &RuleMeta, hand: &Hand, candidates: &mut [DiscardCandidate]) {
        let own = hand.own_wind;
        keep_toward_pung(hand, candidates, |t| t.is_wind() && t.wind() == Some(own));
    }
}

struct DragonPair;

impl RuleCode for DragonPair {
    fn may_apply_to_meld(&self, meld: &Meld) -> bool {
        meld.is_pair()
    }

    fn applies_to_meld(&self, _meta: &RuleMeta, _hand: Option<&ArrangedHand>, meld: &Meld) -> bool {
        meld.is_pair() && meld.is_dragon_meld()
    }
}

struct RoundWindPair;

impl RuleCode for RoundWindPair {
    fn may_apply_to_meld(&self, meld: &Meld) -> bool {
        meld.is_pair() && meld.is_wind_meld()
    }

    fn applies_to_meld(&self, _meta: &RuleMeta, hand: Option<&ArrangedHand>, meld: &Meld) -> bool {
        let Some(hand) = hand else { return false };
        meld.is_pair() && meld.first().wind() == Some(hand.base.round_wind)
    }
}

struct OwnWindPair;

impl RuleCode for OwnWindPair {
    fn may_apply_to_meld(&self, meld: &Meld) -> bool {
        meld.is_pair() && meld.is_wind_meld()
    }

    fn applies_to_meld(&self, _meta: &RuleMeta, hand: Option<&ArrangedHand>, meld: &Meld) -> bool {
        let Some(hand) = hand else { return false };
        meld.is_pair() && meld.first().wind() == Some(hand.base.own_wind)
    }
}

/// Fires once per bonus tile; the `group` option narrows it to flowers or
/// seasons so each can score as its own rule.
struct Bonus;

impl RuleCode for Bonus {
    fn may_apply_to_meld(&self, meld: &Meld) -> bool {
        meld.is_bonus()
    }

    fn applies_to_meld(&self, meta: &RuleMeta, _hand: Option<&ArrangedHand>, meld: &Meld) -> bool {
        if !meld.is_bonus() {
            return false;
        }
        match meta.option("group") {
            Some("flower") => meld.group() == crate::tile::TileGroup::Flower,
            Some("season") => meld.group() == crate::tile::TileGroup::Season,
            _ => true,
        }
    }
}

/// Tile class a pung/kong rule scores.
#[derive(Clone, Copy, PartialEq)]
enum Class {
    Minor,
    Terminal,
    Honor,
}

/// The twelve exposure × class × kong combinations share one code.
struct PungTable {
    concealed: bool,
    class: Class,
    kong: bool,
}

impl PungTable {
    fn new(concealed: bool, class: Class, kong: bool) -> PungTable {
        PungTable {
            concealed,
            class,
            kong,
        }
    }
}

impl RuleCode for PungTable {
    fn may_apply_to_meld(&self, meld: &Meld) -> bool {
        if self.kong {
            meld.is_kong()
        } else {
            meld.is_pung()
        }
    }

    fn applies_to_meld(&self, _meta: &RuleMeta, _hand: Option<&ArrangedHand>, meld: &Meld) -> bool {
        let shape_ok = match (self.kong, meld.kind()) {
            (true, MeldKind::Kong(style)) => {
                (style == KongStyle::Concealed) == self.concealed
            }
            (false, MeldKind::Pung) => meld.is_concealed() == self.concealed,
            _ => false,
        };
        if !shape_ok {
            return false;
        }
        match self.class {
            Class::Minor => meld.is_minor_meld(),
            Class::Terminal => meld.is_terminal_meld(),
            Class::Honor => meld.is_honor_meld(),
        }
    }
}
