use std::fmt;
use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};

/// Score contribution: base points, doubling count and limit fraction.
///
/// Totals as `points * 2^doubles`, capped by the ruleset limit unless the
/// roof is off. A positive `limits` short-circuits everything: the hand is
/// worth that fraction of the limit, full stop.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Score {
    pub points: i32,
    pub doubles: u16,
    pub limits: f64,
}

impl Score {
    pub const ZERO: Score = Score {
        points: 0,
        doubles: 0,
        limits: 0.0,
    };

    pub fn points(points: i32) -> Score {
        Score {
            points,
            ..Score::ZERO
        }
    }

    pub fn doubles(doubles: u16) -> Score {
        Score {
            doubles,
            ..Score::ZERO
        }
    }

    pub fn limits(limits: f64) -> Score {
        Score {
            limits,
            ..Score::ZERO
        }
    }

    pub fn is_zero(&self) -> bool {
        self.points == 0 && self.doubles == 0 && self.limits == 0.0
    }

    /// How many of the three units this score uses. Rules may use one.
    pub fn unit_count(&self) -> usize {
        [self.points != 0, self.doubles != 0, self.limits != 0.0]
            .iter()
            .filter(|&&u| u)
            .count()
    }

    /// Collapse to a number under the given ruleset limit.
    pub fn total(&self, limit: i32, roof_off: bool) -> i32 {
        if self.limits > 0.0 {
            return (self.limits * f64::from(limit)).round() as i32;
        }
        let doubled = i64::from(self.points) << self.doubles.min(30);
        if roof_off {
            doubled.min(i64::from(i32::MAX)) as i32
        } else {
            doubled.min(i64::from(limit)) as i32
        }
    }
}

impl Add for Score {
    type Output = Score;

    /// Component-wise; `limits` keeps the maximum since limit hands do not
    /// stack.
    fn add(self, rhs: Score) -> Score {
        Score {
            points: self.points + rhs.points,
            doubles: self.doubles + rhs.doubles,
            limits: self.limits.max(rhs.limits),
        }
    }
}

impl AddAssign for Score {
    fn add_assign(&mut self, rhs: Score) {
        *self = *self + rhs;
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.limits > 0.0 {
            write!(f, "{} limits", self.limits)
        } else if self.doubles > 0 {
            write!(f, "{}/{}", self.points, self.doubles)
        } else {
            write!(f, "{}", self.points)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn totals_double_and_cap() {
        assert_eq!(Score::points(20).total(500, false), 20);
        let s = Score {
            points: 30,
            doubles: 3,
            limits: 0.0,
        };
        assert_eq!(s.total(500, false), 240);
        let s = Score {
            points: 30,
            doubles: 6,
            limits: 0.0,
        };
        assert_eq!(s.total(500, false), 500);
        assert_eq!(s.total(500, true), 1920);
    }

    #[test]
    fn limits_override() {
        assert_eq!(Score::limits(1.0).total(500, false), 500);
        assert_eq!(Score::limits(0.5).total(500, false), 250);
        let mixed = Score::points(64) + Score::limits(1.0);
        assert_eq!(mixed.total(500, false), 500);
    }

    #[test]
    fn addition_is_component_wise() {
        let a = Score::points(4) + Score::doubles(1) + Score::points(2);
        assert_eq!(a.points, 6);
        assert_eq!(a.doubles, 1);
        let l = Score::limits(0.5) + Score::limits(1.0);
        assert_eq!(l.limits, 1.0);
    }

    #[test]
    fn unit_counts() {
        assert_eq!(Score::ZERO.unit_count(), 0);
        assert_eq!(Score::points(8).unit_count(), 1);
        assert_eq!((Score::points(8) + Score::doubles(1)).unit_count(), 2);
    }
}
