use rand::prelude::*;
use rand::rngs::StdRng;
use sha2::{Digest, Sha256};

use crate::tile::Tile;

/// Tiles reserved at the wall's end for kong replacements.
const DEAD_WALL: usize = 16;

/// The shuffled wall of one hand: a living part drawn from the front and a
/// dead part feeding kong replacements from the back.
///
/// Each hand reseeds deterministically from the game seed and the hand
/// index, and keeps a salted SHA-256 digest of the shuffled order so a
/// finished game can be audited.
#[derive(Debug, Clone)]
pub struct Wall {
    tiles: Vec<Tile>,
    dead_drawn: usize,
    pub digest: String,
    pub salt: String,
}

impl Wall {
    /// Build and shuffle the wall for one hand. Four copies of each
    /// playable tile; the eight bonus tiles once each when the ruleset
    /// plays with them.
    pub fn build(seed: u64, hand_index: u32, with_bonus: bool) -> Wall {
        let mut tiles: Vec<Tile> = Vec::with_capacity(144);
        for tile in Tile::playable() {
            for _ in 0..4 {
                tiles.push(tile.concealed());
            }
        }
        if with_bonus {
            tiles.extend(Tile::bonus_kinds().map(Tile::concealed));
        }

        let mut rng = StdRng::seed_from_u64(splitmix64(
            seed.wrapping_add(u64::from(hand_index)),
        ));
        tiles.shuffle(&mut rng);
        let salt = format!("{:016x}", rng.next_u64());

        let mut hasher = Sha256::new();
        hasher.update(salt.as_bytes());
        for t in &tiles {
            hasher.update(t.name().as_bytes());
        }
        let digest = format!("{:x}", hasher.finalize());

        Wall {
            tiles,
            dead_drawn: 0,
            digest,
            salt,
        }
    }

    /// Living tiles still available for ordinary draws. Replacement draws
    /// shorten the dead wall, not the living one.
    pub fn remaining(&self) -> usize {
        (self.tiles.len() + self.dead_drawn).saturating_sub(DEAD_WALL)
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    /// Draw from the living wall; `None` once only the dead wall is left.
    pub fn draw(&mut self) -> Option<Tile> {
        if self.is_exhausted() {
            return None;
        }
        self.tiles.pop()
    }

    /// True when the next ordinary draw takes the very last living tile.
    pub fn next_is_last(&self) -> bool {
        self.remaining() == 1
    }

    /// Kong replacement from the dead wall.
    pub fn draw_dead(&mut self) -> Option<Tile> {
        if self.dead_drawn >= DEAD_WALL || self.tiles.is_empty() {
            return None;
        }
        self.dead_drawn += 1;
        // The dead wall sits at the front; replacements come off it.
        Some(self.tiles.remove(0))
    }
}

fn splitmix64(x: u64) -> u64 {
    let mut z = x.wrapping_add(0x9E3779B97F4A7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wall_sizes() {
        let wall = Wall::build(7, 0, true);
        assert_eq!(wall.tiles.len(), 144);
        assert_eq!(wall.remaining(), 144 - DEAD_WALL);
        let bare = Wall::build(7, 0, false);
        assert_eq!(bare.tiles.len(), 136);
    }

    #[test]
    fn same_seed_same_wall() {
        let a = Wall::build(42, 3, true);
        let b = Wall::build(42, 3, true);
        assert_eq!(a.tiles, b.tiles);
        assert_eq!(a.digest, b.digest);
        let c = Wall::build(42, 4, true);
        assert_ne!(a.tiles, c.tiles);
    }

    #[test]
    fn draws_respect_the_dead_wall() {
        let mut wall = Wall::build(1, 0, false);
        let mut drawn = 0;
        while wall.draw().is_some() {
            drawn += 1;
        }
        assert_eq!(drawn, 136 - DEAD_WALL);
        // The dead wall still serves replacements.
        assert!(wall.draw_dead().is_some());
    }

    #[test]
    fn dead_wall_is_bounded() {
        let mut wall = Wall::build(1, 0, false);
        for _ in 0..DEAD_WALL {
            assert!(wall.draw_dead().is_some());
        }
        assert!(wall.draw_dead().is_none());
        assert!(wall.draw().is_some());
    }

    #[test]
    fn last_tile_flagged() {
        let mut wall = Wall::build(1, 0, false);
        while wall.remaining() > 1 {
            wall.draw();
        }
        assert!(wall.next_is_last());
        wall.draw();
        assert!(wall.is_exhausted());
    }
}
