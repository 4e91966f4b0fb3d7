use std::fmt;

use thiserror::Error;

use crate::meld::{Meld, MeldError};
use crate::tile::{Tile, TileGroup, Wind};

/// Where the winning (or last drawn) tile came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LastSource {
    /// Ordinary draw from the living wall.
    Wall,
    /// The very last tile of the living wall.
    WallEnd,
    /// The discard made after drawing the last wall tile.
    WallEndDiscard,
    /// Replacement tile from the dead wall after a kong.
    DeadWall,
    /// Robbed from another player's declared kong.
    RobbedKong,
    /// East's original fourteenth tile.
    Fourteenth,
    /// A claimed discard.
    Discard,
    #[default]
    Unknown,
}

impl LastSource {
    pub fn code(self) -> Option<char> {
        match self {
            LastSource::Wall => Some('w'),
            LastSource::WallEnd => Some('z'),
            LastSource::WallEndDiscard => Some('Z'),
            LastSource::DeadWall => Some('e'),
            LastSource::RobbedKong => Some('k'),
            LastSource::Fourteenth => Some('1'),
            LastSource::Discard => Some('d'),
            LastSource::Unknown => None,
        }
    }

    pub fn from_code(c: char) -> Option<LastSource> {
        match c {
            'w' => Some(LastSource::Wall),
            'z' => Some(LastSource::WallEnd),
            'Z' => Some(LastSource::WallEndDiscard),
            'e' => Some(LastSource::DeadWall),
            'k' => Some(LastSource::RobbedKong),
            '1' => Some(LastSource::Fourteenth),
            'd' => Some(LastSource::Discard),
            _ => None,
        }
    }

    /// Any flavor of wall draw, dead wall included.
    pub fn is_from_wall(self) -> bool {
        matches!(
            self,
            LastSource::Wall | LastSource::WallEnd | LastSource::DeadWall | LastSource::Fourteenth
        )
    }
}

/// Declared announcements, encoded as trailing chars of the context token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Announcements {
    /// 'a': original call, declared right after the deal.
    pub original_call: bool,
    /// 't': twofold fortune, a kong-replacement chain.
    pub twofold_fortune: bool,
}

impl Announcements {
    fn from_code(c: char) -> Option<fn(&mut Announcements)> {
        match c {
            'a' => Some(|a| a.original_call = true),
            't' => Some(|a| a.twofold_fortune = true),
            _ => None,
        }
    }

    fn encode(&self, out: &mut String) {
        if self.original_call {
            out.push('a');
        }
        if self.twofold_fortune {
            out.push('t');
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HandError {
    #[error("empty hand string")]
    Empty,
    #[error("bad token {0:?}")]
    BadToken(String),
    #[error("bad meld: {0}")]
    BadMeld(#[from] MeldError),
    #[error("more than one context token")]
    DuplicateContext,
    #[error("missing context token (m.. or M..)")]
    MissingContext,
    #[error("{count} tiles with {kongs} kongs is not a playable hand size")]
    BadCount { count: usize, kongs: usize },
    #[error("more than four {0} in the hand")]
    TooMany(Tile),
    #[error("last tile {0} does not occur in the hand")]
    LastTileMissing(Tile),
}

/// One player's tiles plus everything scoring needs to know about the
/// moment: declared melds, the concealed bag, bonus tiles, the last tile
/// and its source, announcements, and both winds.
///
/// Hands are immutable snapshots; [`Hand::with`] and [`Hand::without`]
/// derive neighbouring hands for what-if analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct Hand {
    declared: Vec<Meld>,
    concealed: Vec<Tile>,
    bonus: Vec<Tile>,
    last_tile: Option<Tile>,
    last_meld: Option<Meld>,
    pub last_source: LastSource,
    pub announcements: Announcements,
    pub own_wind: Wind,
    pub round_wind: Wind,
    /// True for `M` context tokens: the player claims this hand wins.
    pub declared_mahjongg: bool,
}

impl Hand {
    /// Parse the single-line hand grammar.
    ///
    /// Tokens: declared melds (`c1c1c1`), the concealed bag (`R` prefix),
    /// bonus tiles (`fe`, `ys`), the context token (`M`/`m` + own wind +
    /// round wind + optional source + announcements) and the last tile
    /// (`L` + tile + optional completed meld).
    pub fn parse(text: &str) -> Result<Hand, HandError> {
        let mut declared: Vec<Meld> = Vec::new();
        let mut concealed: Vec<Tile> = Vec::new();
        let mut bonus: Vec<Tile> = Vec::new();
        let mut last_tile = None;
        let mut last_meld = None;
        let mut context: Option<(Wind, Wind, LastSource, Announcements, bool)> = None;

        let mut tokens = text.split_whitespace().peekable();
        if tokens.peek().is_none() {
            return Err(HandError::Empty);
        }

        for token in tokens {
            let first = token.chars().next().unwrap();
            match first {
                'R' | 'r' => {
                    for tile in parse_tiles(&token[1..]).ok_or_else(bad(token))? {
                        concealed.push(tile.concealed());
                    }
                }
                'L' => {
                    let rest = &token[1..];
                    let tile = rest
                        .get(..2)
                        .and_then(Tile::parse)
                        .ok_or_else(bad(token))?;
                    last_tile = Some(tile);
                    if let Some(meld_part) = rest.get(2..).filter(|m| !m.is_empty()) {
                        last_meld = Some(Meld::parse(meld_part)?);
                    }
                }
                'm' | 'M' => {
                    if context.is_some() {
                        return Err(HandError::DuplicateContext);
                    }
                    context = Some(parse_context(token).ok_or_else(bad(token))?);
                }
                'f' | 'y' if token.len() == 2 => {
                    let tile = Tile::parse(token).ok_or_else(bad(token))?;
                    if !tile.is_bonus() {
                        return Err(bad(token)());
                    }
                    bonus.push(tile);
                }
                _ => {
                    let meld = Meld::parse(token)?;
                    if meld.is_bonus() {
                        bonus.push(meld.first().exposed());
                    } else {
                        declared.push(meld);
                    }
                }
            }
        }

        let (own_wind, round_wind, last_source, announcements, declared_mahjongg) =
            context.ok_or(HandError::MissingContext)?;

        concealed.sort();
        bonus.sort();
        declared.sort_by_key(Meld::key);

        let hand = Hand {
            declared,
            concealed,
            bonus,
            last_tile,
            last_meld,
            last_source,
            announcements,
            own_wind,
            round_wind,
            declared_mahjongg,
        };
        hand.validate()?;
        Ok(hand)
    }

    fn validate(&self) -> Result<(), HandError> {
        let count = self.tile_count();
        let kongs = self.kong_count();
        let expected = 13 + kongs;
        if count != expected && count != expected + 1 {
            return Err(HandError::BadCount { count, kongs });
        }
        let mut per_kind = [0u8; Tile::ALL_KINDS];
        for t in self.all_tiles().chain(self.bonus.iter().copied()) {
            let k = t.kind() as usize;
            if k < Tile::ALL_KINDS {
                per_kind[k] += 1;
                let cap = if t.is_bonus() { 1 } else { 4 };
                if per_kind[k] > cap {
                    return Err(HandError::TooMany(t.exposed()));
                }
            }
        }
        if let Some(last) = self.last_tile {
            let known = self
                .all_tiles()
                .any(|t| t.kind() == last.kind());
            if !known {
                return Err(HandError::LastTileMissing(last));
            }
        }
        Ok(())
    }

    /// Canonical string form; `parse(format(h)) == h`.
    pub fn format(&self) -> String {
        let mut parts: Vec<String> = self.declared.iter().map(Meld::key).collect();
        if !self.concealed.is_empty() {
            let mut bag = String::from("R");
            for t in &self.concealed {
                bag.push_str(&t.name());
            }
            parts.push(bag);
        }
        for b in &self.bonus {
            parts.push(b.name());
        }
        let mut ctx = String::new();
        ctx.push(if self.declared_mahjongg { 'M' } else { 'm' });
        ctx.push(self.own_wind.letter());
        ctx.push(self.round_wind.letter());
        if let Some(c) = self.last_source.code() {
            ctx.push(c);
        }
        self.announcements.encode(&mut ctx);
        parts.push(ctx);
        if let Some(last) = self.last_tile {
            let mut l = String::from("L");
            l.push_str(&last.name());
            if let Some(meld) = &self.last_meld {
                l.push_str(&meld.key());
            }
            parts.push(l);
        }
        parts.join(" ")
    }

    pub fn declared_melds(&self) -> &[Meld] {
        &self.declared
    }

    pub fn concealed_tiles(&self) -> &[Tile] {
        &self.concealed
    }

    pub fn bonus_tiles(&self) -> &[Tile] {
        &self.bonus
    }

    pub fn last_tile(&self) -> Option<Tile> {
        self.last_tile
    }

    pub fn last_meld(&self) -> Option<&Meld> {
        self.last_meld.as_ref()
    }

    /// All playable tiles: declared meld tiles plus the concealed bag.
    pub fn all_tiles(&self) -> impl Iterator<Item = Tile> + '_ {
        self.declared
            .iter()
            .flat_map(|m| m.tiles().iter().copied())
            .chain(self.concealed.iter().copied())
    }

    pub fn tile_count(&self) -> usize {
        self.declared.iter().map(Meld::len).sum::<usize>() + self.concealed.len()
    }

    pub fn kong_count(&self) -> usize {
        self.declared.iter().filter(|m| m.is_kong()).count()
    }

    /// 0 for a waiting hand, 1 for a full one; kongs carry a spare tile.
    pub fn len_offset(&self) -> isize {
        self.tile_count() as isize - 13 - self.kong_count() as isize
    }

    /// True when the hand holds the full fourteenth tile.
    pub fn is_full(&self) -> bool {
        self.len_offset() == 1
    }

    /// The suit groups present among playable tiles.
    pub fn suits(&self) -> Vec<TileGroup> {
        let mut suits: Vec<TileGroup> = self
            .all_tiles()
            .filter(|t| t.is_suit())
            .map(|t| t.group())
            .collect();
        suits.sort();
        suits.dedup();
        suits
    }

    pub fn has_honors(&self) -> bool {
        self.all_tiles().any(|t| t.is_honor())
    }

    pub fn honor_count(&self) -> usize {
        self.all_tiles().filter(|t| t.is_honor()).count()
    }

    /// How many tiles of `tile`'s kind the whole hand holds.
    pub fn count_of(&self, tile: Tile) -> usize {
        self.all_tiles().filter(|t| t.kind() == tile.kind()).count()
    }

    /// A new hand with `tile` added to the concealed bag (and recorded as
    /// the last tile, from the given source).
    pub fn with(&self, tile: Tile, source: LastSource) -> Hand {
        let mut concealed = self.concealed.clone();
        concealed.push(tile.concealed());
        concealed.sort();
        Hand {
            concealed,
            last_tile: Some(tile.concealed()),
            last_meld: None,
            last_source: source,
            ..self.clone()
        }
    }

    /// A new hand with one tile of `tile`'s kind removed from the bag.
    pub fn without(&self, tile: Tile) -> Option<Hand> {
        let idx = self
            .concealed
            .iter()
            .position(|t| t.kind() == tile.kind())?;
        let mut concealed = self.concealed.clone();
        concealed.remove(idx);
        let last_tile = self.last_tile.filter(|l| {
            concealed.iter().any(|t| t.kind() == l.kind())
                || self.declared.iter().any(|m| m.has_kind_of(*l))
        });
        Some(Hand {
            concealed,
            last_tile,
            last_meld: if last_tile.is_none() { None } else { self.last_meld.clone() },
            ..self.clone()
        })
    }
}

impl fmt::Display for Hand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format())
    }
}

fn bad(token: &str) -> impl Fn() -> HandError + '_ {
    move || HandError::BadToken(token.to_string())
}

fn parse_tiles(text: &str) -> Option<Vec<Tile>> {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() % 2 != 0 {
        return None;
    }
    chars
        .chunks(2)
        .map(|p| Tile::from_chars(p[0], p[1]))
        .collect()
}

fn parse_context(token: &str) -> Option<(Wind, Wind, LastSource, Announcements, bool)> {
    let declared = token.starts_with('M');
    let mut chars = token.chars().skip(1);
    let own = Wind::from_letter(chars.next()?)?;
    let round = Wind::from_letter(chars.next()?)?;
    let mut source = LastSource::Unknown;
    let mut announcements = Announcements::default();
    let mut rest = chars.peekable();
    if let Some(&c) = rest.peek() {
        if let Some(s) = LastSource::from_code(c) {
            source = s;
            rest.next();
        }
    }
    for c in rest {
        let apply = Announcements::from_code(c)?;
        apply(&mut announcements);
    }
    Some((own, round, source, announcements, declared))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_declared_and_bag() {
        let h = Hand::parse("c1c1c1 b2b3b4 RS5S5S5WeWeS7S8S9 Mee LWe").unwrap();
        assert_eq!(h.declared_melds().len(), 2);
        assert_eq!(h.concealed_tiles().len(), 8);
        assert_eq!(h.tile_count(), 14);
        assert!(h.declared_mahjongg);
        assert_eq!(h.own_wind, Wind::East);
        assert_eq!(h.round_wind, Wind::East);
        // 11 tiles: not a playable size
        assert!(matches!(
            Hand::parse("c1c1c1 b2b3b4 RS5S5S5WeWe Mee"),
            Err(HandError::BadCount { .. })
        ));
    }

    #[test]
    fn round_trip() {
        let texts = [
            "c1c1c1 c9c9c9 b9b9b9b9 s1s1s1 RS9S9 fe Meew LS9S9S9",
            "RB1B1B1B2B3B4B5B6B7B8B9DrDrDr fe ys Mee LDrDrDrDr",
            "wewewe wswsws RWnWnWnC3C3C3B8B8 mse",
            "s1s2s3 DgDgDgDg RC4C4C4B2B2B7B8 fn Mwnka LB2",
        ];
        for text in texts {
            let h = Hand::parse(text).unwrap();
            let again = Hand::parse(&h.format()).unwrap();
            assert_eq!(h, again, "round trip failed for {text}");
        }
    }

    #[test]
    fn context_token_parses_fully() {
        let h = Hand::parse("RC1C1C1C2C3C4B5B6B7S5S6S7DrDr fe Meszat LDr").unwrap();
        assert_eq!(h.own_wind, Wind::East);
        assert_eq!(h.round_wind, Wind::South);
        assert_eq!(h.last_source, LastSource::WallEnd);
        assert!(h.announcements.original_call);
        assert!(h.announcements.twofold_fortune);
        assert!(Hand::parse("RC1C1 mq").is_err());
        assert!(Hand::parse("RC1C1").is_err());
    }

    #[test]
    fn len_offset_counts_kongs() {
        let h = Hand::parse("c1c1c1c1 b5b5b5 RS2S3S4S7S7S7DbDb mee").unwrap();
        assert_eq!(h.tile_count(), 15);
        assert_eq!(h.kong_count(), 1);
        assert_eq!(h.len_offset(), 1);
        assert!(h.is_full());
    }

    #[test]
    fn with_and_without() {
        let h = Hand::parse("RC1C1C1C2C3C4B5B6B7S5S6S7Dr mee").unwrap();
        assert_eq!(h.len_offset(), 0);
        let full = h.with(Tile::parse("Dr").unwrap(), LastSource::Wall);
        assert_eq!(full.len_offset(), 1);
        assert_eq!(full.last_tile(), Tile::parse("Dr").map(Tile::concealed));
        let back = full.without(Tile::parse("dr").unwrap()).unwrap();
        assert_eq!(back.len_offset(), 0);
        assert!(back.without(Tile::parse("we").unwrap()).is_none());
    }

    #[test]
    fn too_many_of_a_kind_rejected() {
        assert!(matches!(
            Hand::parse("c1c1c1 RC1C1C2C3C4B5B6B7S5S6S7 mee"),
            Err(HandError::TooMany(_))
        ));
    }

    #[test]
    fn suits_and_honors() {
        let h = Hand::parse("RB1B2B3B4B5B6B7B8B9WeWeDrDrDr mee").unwrap();
        assert_eq!(h.suits(), vec![TileGroup::Bamboo]);
        assert!(h.has_honors());
        assert_eq!(h.honor_count(), 5);
    }
}
