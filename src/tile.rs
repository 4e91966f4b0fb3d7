use std::fmt;

/// Tile group. Three suits, two honor groups, two bonus groups.
///
/// Groups order Stone < Bamboo < Character < Wind < Dragon < Flower < Season;
/// tiles order by group first, so a sorted hand keeps suits together and
/// bonus tiles at the end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TileGroup {
    Stone,
    Bamboo,
    Character,
    Wind,
    Dragon,
    Flower,
    Season,
}

impl TileGroup {
    pub const ALL: [TileGroup; 7] = [
        TileGroup::Stone,
        TileGroup::Bamboo,
        TileGroup::Character,
        TileGroup::Wind,
        TileGroup::Dragon,
        TileGroup::Flower,
        TileGroup::Season,
    ];

    pub const SUITS: [TileGroup; 3] = [TileGroup::Stone, TileGroup::Bamboo, TileGroup::Character];

    /// Lowercase group letter as used in hand strings.
    pub fn letter(self) -> char {
        match self {
            TileGroup::Stone => 's',
            TileGroup::Bamboo => 'b',
            TileGroup::Character => 'c',
            TileGroup::Wind => 'w',
            TileGroup::Dragon => 'd',
            TileGroup::Flower => 'f',
            TileGroup::Season => 'y',
        }
    }

    pub fn from_letter(c: char) -> Option<TileGroup> {
        match c.to_ascii_lowercase() {
            's' => Some(TileGroup::Stone),
            'b' => Some(TileGroup::Bamboo),
            'c' => Some(TileGroup::Character),
            'w' => Some(TileGroup::Wind),
            'd' => Some(TileGroup::Dragon),
            'f' => Some(TileGroup::Flower),
            'y' => Some(TileGroup::Season),
            _ => None,
        }
    }

    /// Number of distinct values in this group.
    pub fn size(self) -> u8 {
        match self {
            TileGroup::Stone | TileGroup::Bamboo | TileGroup::Character => 9,
            TileGroup::Wind | TileGroup::Flower | TileGroup::Season => 4,
            TileGroup::Dragon => 3,
        }
    }

    pub fn is_suit(self) -> bool {
        matches!(self, TileGroup::Stone | TileGroup::Bamboo | TileGroup::Character)
    }

    pub fn is_honor(self) -> bool {
        matches!(self, TileGroup::Wind | TileGroup::Dragon)
    }

    pub fn is_bonus(self) -> bool {
        matches!(self, TileGroup::Flower | TileGroup::Season)
    }
}

/// Seat and round winds, in rotation order East, South, West, North.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub enum Wind {
    East = 0,
    South = 1,
    West = 2,
    North = 3,
}

impl Wind {
    pub const ALL: [Wind; 4] = [Wind::East, Wind::South, Wind::West, Wind::North];

    pub fn from_index(idx: u8) -> Wind {
        Wind::ALL[(idx & 3) as usize]
    }

    pub fn index(self) -> u8 {
        self as u8
    }

    /// The wind that prevails after this one.
    pub fn next(self) -> Wind {
        Wind::from_index(self.index() + 1)
    }

    pub fn letter(self) -> char {
        match self {
            Wind::East => 'e',
            Wind::South => 's',
            Wind::West => 'w',
            Wind::North => 'n',
        }
    }

    pub fn from_letter(c: char) -> Option<Wind> {
        match c.to_ascii_lowercase() {
            'e' => Some(Wind::East),
            's' => Some(Wind::South),
            'w' => Some(Wind::West),
            'n' => Some(Wind::North),
            _ => None,
        }
    }

    /// The wind tile for this seat, concealed form.
    pub fn tile(self) -> Tile {
        Tile::new(TileGroup::Wind, self.index() + 1).concealed()
    }
}

impl fmt::Display for Wind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter().to_ascii_uppercase())
    }
}

/// One tile. 34 playable kinds, 8 bonus kinds and an unknown sentinel, each
/// in an exposed and a concealed form.
///
/// Packed into one byte: bits 0..=6 hold the kind (group and value), bit 7 is
/// set for the concealed form. Identity includes exposure: `b1 != B1`.
/// Ordering is group, then value, then exposure.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tile(u8);

const KIND_STONE: u8 = 0;
const KIND_BAMBOO: u8 = 9;
const KIND_CHARACTER: u8 = 18;
const KIND_WIND: u8 = 27;
const KIND_DRAGON: u8 = 31;
const KIND_FLOWER: u8 = 34;
const KIND_SEASON: u8 = 38;
const KIND_UNKNOWN: u8 = 42;
const CONCEALED_BIT: u8 = 0x80;

/// Value chars for dragons: white, green, red.
const DRAGON_LETTERS: [char; 3] = ['b', 'g', 'r'];
const WIND_LETTERS: [char; 4] = ['e', 's', 'w', 'n'];

impl Tile {
    /// The unknown sentinel (a face-down or unresolved tile). Compares
    /// greater than every known tile.
    pub const UNKNOWN: Tile = Tile(KIND_UNKNOWN);

    /// Count of distinct playable kinds (suits + honors, no bonus).
    pub const PLAYABLE_KINDS: usize = 34;
    /// Count of distinct kinds including bonus tiles.
    pub const ALL_KINDS: usize = 42;

    /// Build an exposed tile from group and 1-based value.
    ///
    /// Panics on an out-of-range value; use [`Tile::try_new`] at parse
    /// boundaries.
    pub fn new(group: TileGroup, value: u8) -> Tile {
        Tile::try_new(group, value).expect("tile value out of range for group")
    }

    pub fn try_new(group: TileGroup, value: u8) -> Option<Tile> {
        if value < 1 || value > group.size() {
            return None;
        }
        let base = match group {
            TileGroup::Stone => KIND_STONE,
            TileGroup::Bamboo => KIND_BAMBOO,
            TileGroup::Character => KIND_CHARACTER,
            TileGroup::Wind => KIND_WIND,
            TileGroup::Dragon => KIND_DRAGON,
            TileGroup::Flower => KIND_FLOWER,
            TileGroup::Season => KIND_SEASON,
        };
        Some(Tile(base + value - 1))
    }

    /// Parse a two-char tile code such as `c1`, `we`, `Dg`. An uppercase
    /// group letter yields the concealed form.
    pub fn parse(code: &str) -> Option<Tile> {
        let mut chars = code.chars();
        let g = chars.next()?;
        let v = chars.next()?;
        if chars.next().is_some() {
            return None;
        }
        Tile::from_chars(g, v)
    }

    pub fn from_chars(group_char: char, value_char: char) -> Option<Tile> {
        if group_char.to_ascii_lowercase() == 'x' {
            return Some(if group_char.is_ascii_uppercase() {
                Tile::UNKNOWN.concealed()
            } else {
                Tile::UNKNOWN
            });
        }
        let group = TileGroup::from_letter(group_char)?;
        let value = match group {
            TileGroup::Stone | TileGroup::Bamboo | TileGroup::Character => {
                let d = value_char.to_digit(10)? as u8;
                if d == 0 {
                    return None;
                }
                d
            }
            TileGroup::Wind | TileGroup::Flower | TileGroup::Season => {
                Wind::from_letter(value_char)?.index() + 1
            }
            TileGroup::Dragon => {
                (DRAGON_LETTERS.iter().position(|&c| c == value_char.to_ascii_lowercase())?
                    as u8)
                    + 1
            }
        };
        let tile = Tile::try_new(group, value)?;
        Some(if group_char.is_ascii_uppercase() {
            tile.concealed()
        } else {
            tile
        })
    }

    /// Kind index 0..=42, exposure stripped. Stable across both forms.
    pub fn kind(self) -> u8 {
        self.0 & !CONCEALED_BIT
    }

    pub fn group(self) -> TileGroup {
        match self.kind() {
            k if k < KIND_BAMBOO => TileGroup::Stone,
            k if k < KIND_CHARACTER => TileGroup::Bamboo,
            k if k < KIND_WIND => TileGroup::Character,
            k if k < KIND_DRAGON => TileGroup::Wind,
            k if k < KIND_FLOWER => TileGroup::Dragon,
            k if k < KIND_SEASON => TileGroup::Flower,
            _ => TileGroup::Season,
        }
    }

    /// 1-based value within the group.
    pub fn value(self) -> u8 {
        let k = self.kind();
        let base = match self.group() {
            TileGroup::Stone => KIND_STONE,
            TileGroup::Bamboo => KIND_BAMBOO,
            TileGroup::Character => KIND_CHARACTER,
            TileGroup::Wind => KIND_WIND,
            TileGroup::Dragon => KIND_DRAGON,
            TileGroup::Flower => KIND_FLOWER,
            TileGroup::Season => KIND_SEASON,
        };
        k - base + 1
    }

    pub fn value_char(self) -> char {
        if !self.is_known() {
            return 'x';
        }
        match self.group() {
            TileGroup::Stone | TileGroup::Bamboo | TileGroup::Character => {
                char::from_digit(self.value() as u32, 10).unwrap_or('?')
            }
            TileGroup::Wind | TileGroup::Flower | TileGroup::Season => {
                WIND_LETTERS[(self.value() - 1) as usize]
            }
            TileGroup::Dragon => DRAGON_LETTERS[(self.value() - 1) as usize],
        }
    }

    pub fn is_concealed(self) -> bool {
        self.0 & CONCEALED_BIT != 0
    }

    pub fn is_exposed(self) -> bool {
        !self.is_concealed()
    }

    /// The concealed form. Involutive with [`Tile::exposed`].
    pub fn concealed(self) -> Tile {
        Tile(self.0 | CONCEALED_BIT)
    }

    pub fn exposed(self) -> Tile {
        Tile(self.0 & !CONCEALED_BIT)
    }

    /// Two-char code; uppercase group letter for the concealed form.
    pub fn name(self) -> String {
        let g = if !self.is_known() {
            'x'
        } else {
            self.group().letter()
        };
        let g = if self.is_concealed() {
            g.to_ascii_uppercase()
        } else {
            g
        };
        let mut s = String::with_capacity(2);
        s.push(g);
        s.push(self.value_char());
        s
    }

    pub fn is_known(self) -> bool {
        self.kind() < KIND_UNKNOWN
    }

    pub fn is_bonus(self) -> bool {
        self.is_known() && self.group().is_bonus()
    }

    pub fn is_honor(self) -> bool {
        self.is_known() && self.group().is_honor()
    }

    pub fn is_wind(self) -> bool {
        self.group() == TileGroup::Wind && self.is_known()
    }

    pub fn is_dragon(self) -> bool {
        self.group() == TileGroup::Dragon && self.is_known()
    }

    pub fn is_suit(self) -> bool {
        self.is_known() && self.group().is_suit()
    }

    /// 1 or 9 of a suit.
    pub fn is_terminal(self) -> bool {
        self.is_suit() && (self.value() == 1 || self.value() == 9)
    }

    /// Honor or terminal.
    pub fn is_major(self) -> bool {
        self.is_honor() || self.is_terminal()
    }

    /// 2..8 of a suit.
    pub fn is_minor(self) -> bool {
        self.is_suit() && !self.is_terminal()
    }

    /// Part of the All Green tile set: bamboo 2,3,4,6,8 and the green dragon.
    pub fn is_green(self) -> bool {
        match self.group() {
            TileGroup::Bamboo => matches!(self.value(), 2 | 3 | 4 | 6 | 8),
            TileGroup::Dragon => self.value() == 2,
            _ => false,
        }
    }

    /// Seat wind this tile names, for winds, flowers and seasons.
    pub fn wind(self) -> Option<Wind> {
        match self.group() {
            TileGroup::Wind | TileGroup::Flower | TileGroup::Season if self.is_known() => {
                Some(Wind::from_index(self.value() - 1))
            }
            _ => None,
        }
    }

    /// Numeric successor within the same suit; `None` past 9 or off-suit.
    /// Exposure is preserved.
    pub fn next_for_chow(self) -> Option<Tile> {
        if !self.is_suit() || self.value() >= 9 {
            return None;
        }
        Some(Tile(self.0 + 1))
    }

    /// Cyclic successor within the same group, honors included. Used for
    /// wind rotation checks and snake-shaped hands.
    pub fn next_in_group(self) -> Tile {
        if !self.is_known() {
            return self;
        }
        let group = self.group();
        let v = if self.value() >= group.size() {
            1
        } else {
            self.value() + 1
        };
        let t = Tile::new(group, v);
        if self.is_concealed() {
            t.concealed()
        } else {
            t
        }
    }

    pub fn prev(self) -> Option<Tile> {
        if !self.is_suit() || self.value() <= 1 {
            return None;
        }
        Some(Tile(self.0 - 1))
    }

    pub fn prev2(self) -> Option<Tile> {
        self.prev().and_then(Tile::prev)
    }

    pub fn next2(self) -> Option<Tile> {
        self.next_for_chow().and_then(Tile::next_for_chow)
    }

    /// The same value in the other two suits, for knitted melds.
    pub fn knitted_peers(self) -> Option<(Tile, Tile)> {
        if !self.is_suit() {
            return None;
        }
        let v = self.value();
        let mut others = TileGroup::SUITS
            .iter()
            .filter(|&&g| g != self.group())
            .map(|&g| {
                let t = Tile::new(g, v);
                if self.is_concealed() {
                    t.concealed()
                } else {
                    t
                }
            });
        Some((others.next().unwrap(), others.next().unwrap()))
    }

    /// All 34 playable kinds, exposed form.
    pub fn playable() -> impl Iterator<Item = Tile> {
        (0..KIND_FLOWER).map(Tile)
    }

    /// The 8 bonus kinds, exposed form.
    pub fn bonus_kinds() -> impl Iterator<Item = Tile> {
        (KIND_FLOWER..KIND_UNKNOWN).map(Tile)
    }

    /// The 13 major kinds (terminals of each suit plus every honor).
    pub fn major_kinds() -> impl Iterator<Item = Tile> {
        Tile::playable().filter(|t| t.is_major())
    }
}

impl fmt::Display for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl fmt::Debug for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tile({})", self.name())
    }
}

/// Render a tile sequence as a joined code string, `c1c2c3`.
pub fn tiles_to_string(tiles: &[Tile]) -> String {
    let mut s = String::with_capacity(tiles.len() * 2);
    for t in tiles {
        s.push_str(&t.name());
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_name_round_trip() {
        for code in ["s1", "b9", "c5", "we", "wn", "db", "dg", "dr", "fe", "ys"] {
            let t = Tile::parse(code).unwrap();
            assert_eq!(t.name(), code);
            let up = code.to_uppercase();
            let concealed = Tile::parse(&up).unwrap();
            assert_eq!(concealed, t.concealed());
            assert_eq!(concealed.name(), format!("{}{}", up.chars().next().unwrap(), code.chars().nth(1).unwrap()));
        }
    }

    #[test]
    fn exposure_is_involutive() {
        let t = Tile::parse("c3").unwrap();
        assert_eq!(t.concealed().exposed(), t);
        assert_eq!(t.concealed().concealed(), t.concealed());
        assert_ne!(t, t.concealed());
        assert_eq!(t.kind(), t.concealed().kind());
    }

    #[test]
    fn ordering_is_group_value_exposure() {
        let s9 = Tile::parse("s9").unwrap();
        let b1 = Tile::parse("b1").unwrap();
        let c1 = Tile::parse("c1").unwrap();
        assert!(s9 < b1);
        assert!(b1 < c1);
        assert!(c1 < c1.concealed());
        assert!(Tile::parse("we").unwrap() < Tile::parse("db").unwrap());
        assert!(Tile::parse("dr").unwrap() < Tile::parse("fe").unwrap());
    }

    #[test]
    fn derived_predicates() {
        assert!(Tile::parse("s1").unwrap().is_terminal());
        assert!(Tile::parse("s5").unwrap().is_minor());
        assert!(Tile::parse("we").unwrap().is_honor());
        assert!(Tile::parse("dg").unwrap().is_major());
        assert!(Tile::parse("fe").unwrap().is_bonus());
        assert!(!Tile::parse("fe").unwrap().is_honor());
        assert!(Tile::parse("b6").unwrap().is_green());
        assert!(!Tile::parse("b5").unwrap().is_green());
        assert!(Tile::parse("dg").unwrap().is_green());
    }

    #[test]
    fn chow_successors() {
        let c1 = Tile::parse("c1").unwrap();
        assert_eq!(c1.next_for_chow(), Tile::parse("c2"));
        assert_eq!(c1.next2(), Tile::parse("c3"));
        assert_eq!(Tile::parse("c9").unwrap().next_for_chow(), None);
        assert_eq!(Tile::parse("we").unwrap().next_for_chow(), None);
        assert_eq!(Tile::parse("c5").unwrap().prev2(), Tile::parse("c3"));
    }

    #[test]
    fn wind_rotation_order() {
        assert_eq!(Wind::East.next(), Wind::South);
        assert_eq!(Wind::North.next(), Wind::East);
        assert_eq!(Wind::West.tile(), Tile::parse("Ww").unwrap());
    }

    #[test]
    fn knitted_peers_cover_other_suits() {
        let (a, b) = Tile::parse("s4").unwrap().knitted_peers().unwrap();
        let mut groups = [a.group(), b.group()];
        groups.sort();
        assert_eq!(groups, [TileGroup::Bamboo, TileGroup::Character]);
        assert_eq!(a.value(), 4);
        assert_eq!(b.value(), 4);
    }

    #[test]
    fn kind_counts() {
        assert_eq!(Tile::playable().count(), Tile::PLAYABLE_KINDS);
        assert_eq!(Tile::bonus_kinds().count(), 8);
        assert_eq!(Tile::major_kinds().count(), 13);
    }
}
