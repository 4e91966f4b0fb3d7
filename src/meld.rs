use std::fmt;

use smallvec::SmallVec;
use thiserror::Error;

use crate::tile::{Tile, TileGroup};

/// How a kong was formed. Affects both exposure and scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KongStyle {
    /// Four from the hand, never shown: written `aAAa`.
    Concealed,
    /// A claimed discard completing three from the hand: written `aaaA`.
    Claimed,
    /// Fully exposed: written `aaaa`.
    Exposed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MeldKind {
    Single,
    Pair,
    Chow,
    Pung,
    Kong(KongStyle),
    /// Two tiles of the same value in two different suits.
    KnittedPair,
    /// Three tiles of the same value, one per suit.
    KnittedTriple,
    /// A lone flower or season.
    Bonus,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MeldError {
    #[error("a meld needs 1 to 4 tiles, got {0}")]
    BadLength(usize),
    #[error("tiles {0} do not form a meld")]
    Inconsistent(String),
    #[error("mixed exposure {0} is not a valid meld pattern")]
    MixedExposure(String),
}

/// An ordered, immutable group of 1–4 tiles with a derived classification.
///
/// The classification is fully determined by the tile sequence and its
/// exposure pattern; construction rejects anything else.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Meld {
    tiles: SmallVec<[Tile; 4]>,
    kind: MeldKind,
}

impl Meld {
    /// Classify an ordered tile sequence in one pass.
    pub fn new(tiles: impl IntoIterator<Item = Tile>) -> Result<Meld, MeldError> {
        let tiles: SmallVec<[Tile; 4]> = tiles.into_iter().collect();
        let kind = classify(&tiles)?;
        Ok(Meld { tiles, kind })
    }

    /// Parse a joined tile-code string such as `c1c2c3` or `DrDr`.
    pub fn parse(code: &str) -> Result<Meld, MeldError> {
        let chars: Vec<char> = code.chars().collect();
        if chars.len() % 2 != 0 {
            return Err(MeldError::Inconsistent(code.to_string()));
        }
        let mut tiles = SmallVec::<[Tile; 4]>::new();
        for pair in chars.chunks(2) {
            let tile = Tile::from_chars(pair[0], pair[1])
                .ok_or_else(|| MeldError::Inconsistent(code.to_string()))?;
            tiles.push(tile);
        }
        Meld::new(tiles)
    }

    pub fn single(tile: Tile) -> Meld {
        Meld {
            kind: if tile.is_bonus() {
                MeldKind::Bonus
            } else {
                MeldKind::Single
            },
            tiles: SmallVec::from_slice(&[tile]),
        }
    }

    pub fn pair_of(tile: Tile) -> Meld {
        Meld {
            tiles: SmallVec::from_slice(&[tile, tile]),
            kind: MeldKind::Pair,
        }
    }

    pub fn pung_of(tile: Tile) -> Meld {
        Meld {
            tiles: SmallVec::from_slice(&[tile, tile, tile]),
            kind: MeldKind::Pung,
        }
    }

    pub fn kong_of(tile: Tile, style: KongStyle) -> Meld {
        let tiles: SmallVec<[Tile; 4]> = match style {
            KongStyle::Concealed => SmallVec::from_slice(&[
                tile.exposed(),
                tile.concealed(),
                tile.concealed(),
                tile.exposed(),
            ]),
            KongStyle::Claimed => SmallVec::from_slice(&[
                tile.exposed(),
                tile.exposed(),
                tile.exposed(),
                tile.concealed(),
            ]),
            KongStyle::Exposed => SmallVec::from_elem(tile.exposed(), 4),
        };
        Meld {
            tiles,
            kind: MeldKind::Kong(style),
        }
    }

    /// The chow starting at `tile`, if its suit continues far enough.
    pub fn chow_from(tile: Tile) -> Option<Meld> {
        let second = tile.next_for_chow()?;
        let third = second.next_for_chow()?;
        Some(Meld {
            tiles: SmallVec::from_slice(&[tile, second, third]),
            kind: MeldKind::Chow,
        })
    }

    /// Knitted triple carrying `tile`'s value across all three suits.
    pub fn knitted3(tile: Tile) -> Option<Meld> {
        let (a, b) = tile.knitted_peers()?;
        let mut tiles = SmallVec::from_slice(&[tile, a, b]);
        tiles.sort();
        Some(Meld {
            tiles,
            kind: MeldKind::KnittedTriple,
        })
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn kind(&self) -> MeldKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn first(&self) -> Tile {
        self.tiles[0]
    }

    pub fn is_chow(&self) -> bool {
        self.kind == MeldKind::Chow
    }

    pub fn is_pair(&self) -> bool {
        self.kind == MeldKind::Pair
    }

    pub fn is_pung(&self) -> bool {
        self.kind == MeldKind::Pung
    }

    pub fn is_kong(&self) -> bool {
        matches!(self.kind, MeldKind::Kong(_))
    }

    /// Pung or kong.
    pub fn is_pung_like(&self) -> bool {
        self.is_pung() || self.is_kong()
    }

    pub fn is_single(&self) -> bool {
        self.kind == MeldKind::Single
    }

    pub fn is_bonus(&self) -> bool {
        self.kind == MeldKind::Bonus
    }

    pub fn is_knitted(&self) -> bool {
        matches!(self.kind, MeldKind::KnittedPair | MeldKind::KnittedTriple)
    }

    /// A meld counts as concealed when no tile of it was ever shown by a
    /// claim. The concealed kong keeps that status.
    pub fn is_concealed(&self) -> bool {
        match self.kind {
            MeldKind::Kong(style) => style == KongStyle::Concealed,
            _ => self.tiles.iter().all(|t| t.is_concealed()),
        }
    }

    pub fn is_exposed(&self) -> bool {
        !self.is_concealed()
    }

    pub fn is_dragon_meld(&self) -> bool {
        self.first().is_dragon()
    }

    pub fn is_wind_meld(&self) -> bool {
        self.first().is_wind()
    }

    pub fn is_honor_meld(&self) -> bool {
        self.first().is_honor()
    }

    /// Every tile a terminal (chows never qualify).
    pub fn is_terminal_meld(&self) -> bool {
        !self.is_chow() && self.first().is_terminal()
    }

    pub fn is_major_meld(&self) -> bool {
        self.is_honor_meld() || self.is_terminal_meld()
    }

    pub fn is_minor_meld(&self) -> bool {
        !self.is_chow() && self.first().is_minor()
    }

    pub fn group(&self) -> TileGroup {
        self.first().group()
    }

    /// True when this meld contains `tile` in either exposure form.
    pub fn has_kind_of(&self, tile: Tile) -> bool {
        self.tiles.iter().any(|t| t.kind() == tile.kind())
    }

    /// Canonical key: the joined tile codes. Two melds are interchangeable
    /// exactly when their keys match.
    pub fn key(&self) -> String {
        crate::tile::tiles_to_string(&self.tiles)
    }

    /// The same meld with every tile concealed (used when hypothesizing
    /// arrangements of the concealed bag).
    pub fn concealed_form(&self) -> Meld {
        if let MeldKind::Kong(_) = self.kind {
            return self.clone();
        }
        let tiles: SmallVec<[Tile; 4]> = self.tiles.iter().map(|t| t.concealed()).collect();
        Meld {
            tiles,
            kind: self.kind,
        }
    }
}

impl fmt::Display for Meld {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

impl fmt::Debug for Meld {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Meld({} {:?})", self.key(), self.kind)
    }
}

fn classify(tiles: &[Tile]) -> Result<MeldKind, MeldError> {
    if tiles.is_empty() || tiles.len() > 4 {
        return Err(MeldError::BadLength(tiles.len()));
    }
    let joined = || crate::tile::tiles_to_string(tiles);
    if tiles.iter().any(|t| !t.is_known()) {
        // An unknown tile can only stand alone (an opponent's hidden tile).
        return if tiles.len() == 1 {
            Ok(MeldKind::Single)
        } else {
            Err(MeldError::Inconsistent(joined()))
        };
    }
    if tiles.iter().any(|t| t.is_bonus()) {
        return if tiles.len() == 1 {
            Ok(MeldKind::Bonus)
        } else {
            Err(MeldError::Inconsistent(joined()))
        };
    }

    let same_kind = tiles.iter().all(|t| t.kind() == tiles[0].kind());
    let uniform_exposure = tiles.iter().all(|t| t.is_concealed() == tiles[0].is_concealed());

    match tiles.len() {
        1 => Ok(MeldKind::Single),
        2 => {
            if !uniform_exposure {
                return Err(MeldError::MixedExposure(joined()));
            }
            if same_kind {
                Ok(MeldKind::Pair)
            } else if knitted_values(tiles) {
                Ok(MeldKind::KnittedPair)
            } else {
                Err(MeldError::Inconsistent(joined()))
            }
        }
        3 => {
            if !uniform_exposure {
                return Err(MeldError::MixedExposure(joined()));
            }
            if same_kind {
                Ok(MeldKind::Pung)
            } else if is_run(tiles) {
                Ok(MeldKind::Chow)
            } else if knitted_values(tiles) {
                Ok(MeldKind::KnittedTriple)
            } else {
                Err(MeldError::Inconsistent(joined()))
            }
        }
        _ => {
            if !same_kind {
                return Err(MeldError::Inconsistent(joined()));
            }
            let concealed: SmallVec<[bool; 4]> =
                tiles.iter().map(|t| t.is_concealed()).collect();
            match concealed.as_slice() {
                [false, false, false, false] => Ok(MeldKind::Kong(KongStyle::Exposed)),
                [false, false, false, true] => Ok(MeldKind::Kong(KongStyle::Claimed)),
                [false, true, true, false] => Ok(MeldKind::Kong(KongStyle::Concealed)),
                _ => Err(MeldError::MixedExposure(joined())),
            }
        }
    }
}

/// Three consecutive values of one suit group.
fn is_run(tiles: &[Tile]) -> bool {
    let first = tiles[0];
    if !first.is_suit() {
        return false;
    }
    tiles.windows(2).all(|w| {
        w[0].group() == w[1].group() && w[1].value() == w[0].value() + 1
    })
}

/// Same value, pairwise distinct suit groups.
fn knitted_values(tiles: &[Tile]) -> bool {
    if !tiles.iter().all(|t| t.is_suit() && t.value() == tiles[0].value()) {
        return false;
    }
    let mut groups: SmallVec<[TileGroup; 4]> = tiles.iter().map(|t| t.group()).collect();
    groups.sort();
    groups.windows(2).all(|w| w[0] != w[1])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meld(code: &str) -> Meld {
        Meld::parse(code).unwrap()
    }

    #[test]
    fn classify_basic_shapes() {
        assert_eq!(meld("c1").kind(), MeldKind::Single);
        assert_eq!(meld("c1c1").kind(), MeldKind::Pair);
        assert_eq!(meld("c1c2c3").kind(), MeldKind::Chow);
        assert_eq!(meld("c1c1c1").kind(), MeldKind::Pung);
        assert_eq!(meld("fe").kind(), MeldKind::Bonus);
        assert_eq!(meld("s4b4c4").kind(), MeldKind::KnittedTriple);
        assert_eq!(meld("s4b4").kind(), MeldKind::KnittedPair);
    }

    #[test]
    fn classify_kong_flavors() {
        assert_eq!(meld("c1c1c1c1").kind(), MeldKind::Kong(KongStyle::Exposed));
        assert_eq!(meld("c1c1c1C1").kind(), MeldKind::Kong(KongStyle::Claimed));
        assert_eq!(meld("c1C1C1c1").kind(), MeldKind::Kong(KongStyle::Concealed));
        assert!(Meld::parse("c1C1c1C1").is_err());
        assert!(meld("c1C1C1c1").is_concealed());
        assert!(meld("c1c1c1C1").is_exposed());
    }

    #[test]
    fn rejects_inconsistent_combinations() {
        assert!(Meld::parse("c1c3c5").is_err());
        assert!(Meld::parse("c1b2s3").is_err());
        assert!(Meld::parse("wewswwwn").is_err());
        assert!(Meld::parse("fefe").is_err());
        assert!(Meld::parse("c1C2c3").is_err());
        assert!(Meld::parse("wewe we").is_err());
    }

    #[test]
    fn exposure_of_melds() {
        assert!(meld("C1C2C3").is_concealed());
        assert!(meld("c1c2c3").is_exposed());
        assert!(meld("DrDr").is_concealed());
    }

    #[test]
    fn predicates() {
        assert!(meld("drdrdr").is_dragon_meld());
        assert!(meld("wewewe").is_wind_meld());
        assert!(meld("s9s9s9").is_terminal_meld());
        assert!(!meld("s7s8s9").is_terminal_meld());
        assert!(meld("s5s5s5").is_minor_meld());
        assert!(meld("b1b1b1b1").is_major_meld());
        assert!(meld("c2c2c2").is_pung_like());
        assert!(meld("c2c2c2c2").is_pung_like());
    }

    #[test]
    fn shortcut_constructors_match_parse() {
        let t = Tile::parse("b3").unwrap();
        assert_eq!(Meld::pung_of(t), meld("b3b3b3"));
        assert_eq!(Meld::chow_from(t).unwrap(), meld("b3b4b5"));
        assert_eq!(
            Meld::kong_of(t, KongStyle::Concealed),
            meld("b3B3B3b3")
        );
        assert_eq!(Meld::knitted3(t).unwrap().kind(), MeldKind::KnittedTriple);
        assert_eq!(Meld::chow_from(Tile::parse("b8").unwrap()), None);
    }
}
