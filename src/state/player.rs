use crate::hand::{Announcements, Hand, HandError, LastSource};
use crate::meld::Meld;
use crate::tile::{tiles_to_string, Tile, Wind};

/// One seat at the table: identity, balance, and the tiles of the current
/// hand.
#[derive(Debug, Clone)]
pub struct Player {
    pub id: i64,
    pub name: String,
    pub wind: Wind,
    /// Points accumulated over the whole game.
    pub balance: i32,
    /// This hand's delta, reset when a new hand starts.
    pub payment: i32,
    pub concealed: Vec<Tile>,
    pub melds: Vec<Meld>,
    pub bonus: Vec<Tile>,
    pub discards: Vec<Tile>,
    pub last_tile: Option<Tile>,
    pub last_source: LastSource,
    pub announcements: Announcements,
    pub may_win: bool,
    pub won: bool,
}

impl Player {
    pub fn new(id: i64, name: &str, wind: Wind) -> Player {
        Player {
            id,
            name: name.to_string(),
            wind,
            balance: 0,
            payment: 0,
            concealed: Vec::new(),
            melds: Vec::new(),
            bonus: Vec::new(),
            discards: Vec::new(),
            last_tile: None,
            last_source: LastSource::Unknown,
            announcements: Announcements::default(),
            may_win: true,
            won: false,
        }
    }

    pub fn clear_hand(&mut self) {
        self.payment = 0;
        self.concealed.clear();
        self.melds.clear();
        self.bonus.clear();
        self.discards.clear();
        self.last_tile = None;
        self.last_source = LastSource::Unknown;
        self.announcements = Announcements::default();
        self.may_win = true;
        self.won = false;
    }

    pub fn take_tile(&mut self, tile: Tile, source: LastSource) {
        self.concealed.push(tile.concealed());
        self.concealed.sort();
        self.last_tile = Some(tile.concealed());
        self.last_source = source;
    }

    /// Remove one tile of this kind from the concealed bag.
    pub fn give_tile(&mut self, tile: Tile) -> Option<Tile> {
        let idx = self
            .concealed
            .iter()
            .position(|t| t.kind() == tile.kind())?;
        Some(self.concealed.remove(idx))
    }

    pub fn holds(&self, tile: Tile) -> usize {
        self.concealed
            .iter()
            .filter(|t| t.kind() == tile.kind())
            .count()
    }

    /// The canonical hand string for the current state of this seat;
    /// `declared` marks a Mah Jongg declaration.
    pub fn hand_string(&self, round_wind: Wind, declared: bool) -> String {
        let mut parts: Vec<String> = self.melds.iter().map(Meld::key).collect();
        if !self.concealed.is_empty() {
            parts.push(format!("R{}", tiles_to_string(&self.concealed)));
        }
        for b in &self.bonus {
            parts.push(b.name());
        }
        let mut ctx = String::new();
        ctx.push(if declared { 'M' } else { 'm' });
        ctx.push(self.wind.letter());
        ctx.push(round_wind.letter());
        if let Some(code) = self.last_source.code() {
            ctx.push(code);
        }
        if self.announcements.original_call {
            ctx.push('a');
        }
        if self.announcements.twofold_fortune {
            ctx.push('t');
        }
        parts.push(ctx);
        if let Some(last) = self.last_tile {
            parts.push(format!("L{}", last.name()));
        }
        parts.join(" ")
    }

    /// Build the scoring [`Hand`] for this seat.
    pub fn hand(&self, round_wind: Wind, declared: bool) -> Result<Hand, HandError> {
        Hand::parse(&self.hand_string(round_wind, declared))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hand_string_round_trips_through_parser() {
        let mut p = Player::new(1, "east", Wind::East);
        for code in [
            "C1", "C1", "C1", "C2", "C3", "C4", "B5", "B6", "B7", "S5", "S6", "S7", "Dr",
        ] {
            p.concealed.push(Tile::parse(code).unwrap());
        }
        p.concealed.sort();
        p.bonus.push(Tile::parse("fe").unwrap());
        p.take_tile(Tile::parse("Dr").unwrap(), LastSource::Wall);
        let hand = p.hand(Wind::East, true).unwrap();
        assert!(hand.is_full());
        assert_eq!(hand.last_source, LastSource::Wall);
        assert!(hand.declared_mahjongg);
        assert_eq!(hand.bonus_tiles().len(), 1);
    }

    #[test]
    fn give_and_hold() {
        let mut p = Player::new(2, "south", Wind::South);
        p.take_tile(Tile::parse("c5").unwrap(), LastSource::Wall);
        p.take_tile(Tile::parse("c5").unwrap(), LastSource::Wall);
        assert_eq!(p.holds(Tile::parse("c5").unwrap()), 2);
        assert!(p.give_tile(Tile::parse("c5").unwrap()).is_some());
        assert_eq!(p.holds(Tile::parse("c5").unwrap()), 1);
        assert!(p.give_tile(Tile::parse("we").unwrap()).is_none());
    }
}
