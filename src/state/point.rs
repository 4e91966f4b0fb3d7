use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tile::Wind;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PointError {
    #[error("bad point string {0:?}")]
    Bad(String),
}

/// The temporal coordinate of a game: everything needed to say "this exact
/// moment of this exact game".
///
/// String form is `<seed>/<wind><rotated><notRotated a..z>` with the move
/// count appended as digits, e.g. `1234/E0a` or `1234/S2ab17`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub seed: u64,
    pub prevailing: Wind,
    /// Wind rotations within the current round, 0..=3.
    pub rotated: u8,
    /// Consecutive hands without rotation (East kept winning).
    pub not_rotated: u32,
    /// Moves within the current hand.
    pub move_count: u32,
    /// Hands played since the game started.
    pub hand_count: u32,
}

impl Point {
    pub fn new(seed: u64) -> Point {
        Point {
            seed,
            prevailing: Wind::East,
            rotated: 0,
            not_rotated: 0,
            move_count: 0,
            hand_count: 0,
        }
    }

    /// Ordering key: prevailing wind, then rotation, then the non-rotating
    /// streak, then the move within the hand.
    fn key(&self) -> (u8, u8, u32, u32) {
        (
            self.prevailing.index(),
            self.rotated,
            self.not_rotated,
            self.move_count,
        )
    }
}

impl PartialOrd for Point {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Point {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}{}{}",
            self.seed,
            self.prevailing,
            self.rotated,
            encode_a26(self.not_rotated)
        )?;
        if self.move_count > 0 {
            write!(f, "{}", self.move_count)?;
        }
        Ok(())
    }
}

impl FromStr for Point {
    type Err = PointError;

    fn from_str(s: &str) -> Result<Point, PointError> {
        let bad = || PointError::Bad(s.to_string());
        let (seed, rest) = s.split_once('/').ok_or_else(bad)?;
        let seed: u64 = seed.parse().map_err(|_| bad())?;
        let mut chars = rest.chars();
        let prevailing = chars
            .next()
            .and_then(Wind::from_letter)
            .ok_or_else(bad)?;
        let rotated = chars
            .next()
            .and_then(|c| c.to_digit(10))
            .filter(|&d| d < 4)
            .ok_or_else(bad)? as u8;
        let tail: String = chars.collect();
        let letters: String = tail.chars().take_while(|c| c.is_ascii_lowercase()).collect();
        let digits = &tail[letters.len()..];
        if letters.is_empty() {
            return Err(bad());
        }
        let not_rotated = decode_a26(&letters).ok_or_else(bad)?;
        let move_count = if digits.is_empty() {
            0
        } else {
            digits.parse().map_err(|_| bad())?
        };
        Ok(Point {
            seed,
            prevailing,
            rotated,
            not_rotated,
            move_count,
            hand_count: 0,
        })
    }
}

/// An inclusive replay interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointRange {
    pub first: Point,
    pub last: Point,
}

impl PointRange {
    pub fn new(first: Point, last: Point) -> PointRange {
        PointRange { first, last }
    }

    pub fn contains(&self, point: &Point) -> bool {
        self.first <= *point && *point <= self.last
    }
}

fn encode_a26(mut n: u32) -> String {
    let mut out = Vec::new();
    loop {
        out.push(b'a' + (n % 26) as u8);
        n /= 26;
        if n == 0 {
            break;
        }
    }
    out.reverse();
    String::from_utf8(out).expect("ascii letters")
}

fn decode_a26(s: &str) -> Option<u32> {
    let mut n: u32 = 0;
    for c in s.chars() {
        if !c.is_ascii_lowercase() {
            return None;
        }
        n = n.checked_mul(26)?.checked_add((c as u8 - b'a') as u32)?;
    }
    Some(n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_parse_round_trip() {
        let mut p = Point::new(9001);
        assert_eq!(p.to_string(), "9001/E0a");
        assert_eq!("9001/E0a".parse::<Point>().unwrap(), p);

        p.prevailing = Wind::South;
        p.rotated = 2;
        p.not_rotated = 27;
        assert_eq!(p.to_string(), "9001/S2bb");
        assert_eq!("9001/S2bb".parse::<Point>().unwrap(), p);

        p.move_count = 17;
        assert_eq!(p.to_string(), "9001/S2bb17");
        assert_eq!("9001/S2bb17".parse::<Point>().unwrap(), p);
    }

    #[test]
    fn parse_rejects_garbage() {
        for bad in ["", "abc", "12/", "12/X0a", "12/E4a", "12/E0", "12/E0A"] {
            assert!(bad.parse::<Point>().is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn ordering_follows_round_progress() {
        let base = Point::new(1);
        let mut later = base;
        later.not_rotated = 1;
        assert!(base < later);
        let mut rotated = base;
        rotated.rotated = 1;
        assert!(later < rotated);
        let mut next_round = base;
        next_round.prevailing = Wind::South;
        assert!(rotated < next_round);
        // The seed does not participate in ordering.
        let other_seed = Point::new(2);
        assert_eq!(base.cmp(&other_seed), Ordering::Equal);
    }

    #[test]
    fn range_contains() {
        let a: Point = "5/E0a".parse().unwrap();
        let b: Point = "5/W1c".parse().unwrap();
        let range = PointRange::new(a, b);
        let mid: Point = "5/S3z".parse().unwrap();
        assert!(range.contains(&mid));
        let after: Point = "5/N0a".parse().unwrap();
        assert!(!range.contains(&after));
    }
}
