use ahash::AHashSet;
use smallvec::SmallVec;

use crate::meld::Meld;
use crate::tile::Tile;

/// A partitioning of a concealed-tile multiset. Complete melds come first;
/// tiles no meld wanted are carried as singles.
pub type MeldList = SmallVec<[Meld; 8]>;

/// Histogram over the 34 playable kinds.
pub type Counts = [u8; Tile::PLAYABLE_KINDS];

pub fn counts_of(tiles: &[Tile]) -> Counts {
    let mut counts = [0u8; Tile::PLAYABLE_KINDS];
    for t in tiles {
        if t.is_known() && !t.is_bonus() {
            counts[t.kind() as usize] += 1;
        }
    }
    counts
}

fn tile_of_kind(kind: usize) -> Tile {
    // Safe: kind < PLAYABLE_KINDS by construction. Bag tiles are concealed.
    Tile::playable()
        .nth(kind)
        .expect("kind within playable range")
        .concealed()
}

/// Lazily enumerates every way to partition a tile multiset into pairs,
/// pungs, chows and leftover singles.
///
/// At each step the smallest remaining tile picks the meld it belongs to and
/// the search backtracks over the alternatives; branches with more than
/// `max_chows` chows are pruned. Partitions reachable along several paths
/// are deduplicated by their canonical key.
pub struct Decomposer {
    stack: Vec<Frame>,
    seen: AHashSet<String>,
    max_chows: usize,
}

struct Frame {
    counts: Counts,
    melds: MeldList,
    chows: usize,
}

impl Decomposer {
    pub fn new(tiles: &[Tile], max_chows: usize) -> Decomposer {
        let frame = Frame {
            counts: counts_of(tiles),
            melds: MeldList::new(),
            chows: 0,
        };
        Decomposer {
            stack: vec![frame],
            seen: AHashSet::new(),
            max_chows,
        }
    }
}

impl Iterator for Decomposer {
    type Item = MeldList;

    fn next(&mut self) -> Option<MeldList> {
        while let Some(frame) = self.stack.pop() {
            let lowest = match frame.counts.iter().position(|&c| c > 0) {
                Some(k) => k,
                None => {
                    let mut melds = frame.melds;
                    melds.sort_by_key(Meld::key);
                    let key = melds.iter().map(Meld::key).collect::<Vec<_>>().join("/");
                    if self.seen.insert(key) {
                        return Some(melds);
                    }
                    continue;
                }
            };

            let tile = tile_of_kind(lowest);
            let count = frame.counts[lowest];

            // Pushed in reverse preference order so that complete melds are
            // explored before lone tiles.
            self.push_variant(&frame, lowest, 1, Meld::single(tile));
            if let Some(chow) = Meld::chow_from(tile) {
                if frame.chows < self.max_chows {
                    let k1 = lowest + 1;
                    let k2 = lowest + 2;
                    if frame.counts[k1] > 0 && frame.counts[k2] > 0 {
                        let mut counts = frame.counts;
                        counts[lowest] -= 1;
                        counts[k1] -= 1;
                        counts[k2] -= 1;
                        let mut melds = frame.melds.clone();
                        melds.push(chow.concealed_form());
                        self.stack.push(Frame {
                            counts,
                            melds,
                            chows: frame.chows + 1,
                        });
                    }
                }
            }
            if count >= 2 {
                self.push_variant(&frame, lowest, 2, Meld::pair_of(tile));
            }
            if count >= 3 {
                self.push_variant(&frame, lowest, 3, Meld::pung_of(tile));
            }
        }
        None
    }
}

impl Decomposer {
    fn push_variant(&mut self, frame: &Frame, kind: usize, take: u8, meld: Meld) {
        let mut counts = frame.counts;
        counts[kind] -= take;
        let mut melds = frame.melds.clone();
        melds.push(meld);
        self.stack.push(Frame {
            counts,
            melds,
            chows: frame.chows,
        });
    }
}

/// Fast check: can `counts` decompose into exactly `sets` complete
/// chows/pungs (at most `max_chows` chows) plus, when asked, one pair? The
/// workhorse behind win detection; the full [`Decomposer`] is only walked
/// when the arrangement itself is wanted.
pub fn is_complete_shape(counts: &Counts, sets: usize, need_pair: bool, max_chows: usize) -> bool {
    first_complete(counts, sets, need_pair, max_chows).is_some()
}

/// Like [`is_complete_shape`], but hands back the first complete
/// partitioning found.
pub fn first_complete(
    counts: &Counts,
    sets: usize,
    need_pair: bool,
    max_chows: usize,
) -> Option<MeldList> {
    let total: usize = counts.iter().map(|&c| c as usize).sum();
    if total != sets * 3 + if need_pair { 2 } else { 0 } {
        return None;
    }
    let mut counts = *counts;
    if !need_pair {
        let mut melds = MeldList::new();
        return if decompose_complete(&mut counts, 0, max_chows, &mut melds) {
            Some(melds)
        } else {
            None
        };
    }
    for kind in 0..counts.len() {
        if counts[kind] >= 2 {
            counts[kind] -= 2;
            let mut melds = MeldList::new();
            if decompose_complete(&mut counts, 0, max_chows, &mut melds) {
                melds.push(Meld::pair_of(tile_of_kind(kind)));
                return Some(melds);
            }
            counts[kind] += 2;
        }
    }
    None
}

fn decompose_complete(
    counts: &mut Counts,
    start: usize,
    chow_budget: usize,
    melds: &mut MeldList,
) -> bool {
    let mut i = start;
    while i < counts.len() && counts[i] == 0 {
        i += 1;
    }
    if i == counts.len() {
        return true;
    }

    if counts[i] >= 3 {
        counts[i] -= 3;
        melds.push(Meld::pung_of(tile_of_kind(i)));
        if decompose_complete(counts, i, chow_budget, melds) {
            counts[i] += 3;
            return true;
        }
        melds.pop();
        counts[i] += 3;
    }

    // Chows stay inside one suit: kind i may start one only when i+2 does
    // not cross a group boundary.
    let in_suit = i < 27 && i % 9 <= 6;
    if chow_budget > 0 && in_suit && counts[i + 1] > 0 && counts[i + 2] > 0 {
        counts[i] -= 1;
        counts[i + 1] -= 1;
        counts[i + 2] -= 1;
        if let Some(chow) = Meld::chow_from(tile_of_kind(i)) {
            melds.push(chow);
            if decompose_complete(counts, i, chow_budget - 1, melds) {
                counts[i] += 1;
                counts[i + 1] += 1;
                counts[i + 2] += 1;
                return true;
            }
            melds.pop();
        }
        counts[i] += 1;
        counts[i + 1] += 1;
        counts[i + 2] += 1;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bag(codes: &str) -> Vec<Tile> {
        codes
            .split_whitespace()
            .map(|c| Tile::parse(c).unwrap().concealed())
            .collect()
    }

    #[test]
    fn complete_partition_found() {
        let tiles = bag("c1 c1 c1 c2 c3 c4 dr dr");
        let parts: Vec<_> = Decomposer::new(&tiles, 4).collect();
        assert!(parts.iter().any(|p| {
            p.iter().filter(|m| m.is_pung()).count() == 1
                && p.iter().filter(|m| m.is_chow()).count() == 1
                && p.iter().filter(|m| m.is_pair()).count() == 1
        }));
    }

    #[test]
    fn partitions_are_unique() {
        let tiles = bag("c1 c1 c1 c2 c2 c2");
        let parts: Vec<_> = Decomposer::new(&tiles, 4).collect();
        let mut keys: Vec<String> = parts
            .iter()
            .map(|p| p.iter().map(Meld::key).collect::<Vec<_>>().join("/"))
            .collect();
        keys.sort();
        let before = keys.len();
        keys.dedup();
        assert_eq!(before, keys.len());
    }

    #[test]
    fn max_chows_prunes() {
        let tiles = bag("c1 c2 c3 c4 c5 c6");
        let without_chows: Vec<_> = Decomposer::new(&tiles, 0).collect();
        assert!(without_chows.iter().all(|p| p.iter().all(|m| !m.is_chow())));
        let with_chows: Vec<_> = Decomposer::new(&tiles, 4).collect();
        assert!(with_chows
            .iter()
            .any(|p| p.iter().filter(|m| m.is_chow()).count() == 2));
    }

    #[test]
    fn complete_shape_detection() {
        let win = bag("c1 c1 c1 c2 c3 c4 b5 b6 b7 s9 s9 s9 dr dr");
        assert!(is_complete_shape(&counts_of(&win), 4, true, 4));
        let not_win = bag("c1 c1 c1 c2 c3 c4 b5 b6 b7 s9 s9 s8 dr dr");
        assert!(!is_complete_shape(&counts_of(&not_win), 4, true, 4));
        // Two declared melds: the bag only needs two more plus the pair.
        let partial = bag("c1 c2 c3 b5 b5 b5 dr dr");
        assert!(is_complete_shape(&counts_of(&partial), 2, true, 4));
        // A declared pair leaves the bag without one.
        let no_pair = bag("c1 c2 c3 b5 b5 b5");
        assert!(is_complete_shape(&counts_of(&no_pair), 2, false, 4));
    }

    #[test]
    fn chow_budget_limits_the_shape() {
        let two_chows = bag("c1 c2 c3 c4 c5 c6 b5 b5 b5 s9 s9 s9 dr dr");
        assert!(is_complete_shape(&counts_of(&two_chows), 4, true, 4));
        assert!(!is_complete_shape(&counts_of(&two_chows), 4, true, 1));
    }

    #[test]
    fn first_complete_returns_the_melds() {
        let win = bag("c1 c1 c1 c2 c3 c4 b5 b6 b7 s9 s9 s9 dr dr");
        let melds = first_complete(&counts_of(&win), 4, true, 4).unwrap();
        assert_eq!(melds.len(), 5);
        assert_eq!(melds.iter().filter(|m| m.is_pair()).count(), 1);
        assert_eq!(melds.iter().filter(|m| m.is_chow()).count(), 2);
        assert!(first_complete(&counts_of(&win), 4, true, 1).is_none());
    }

    #[test]
    fn chow_does_not_cross_suits() {
        let tiles = bag("c8 c9 b1");
        let parts: Vec<_> = Decomposer::new(&tiles, 4).collect();
        assert!(parts.iter().all(|p| p.iter().all(|m| !m.is_chow())));
        assert!(!is_complete_shape(
            &counts_of(&bag("c8 c9 b1 b1 b1 b2 b2 b2 s1 s2 s3 s4 s5 s6")),
            4,
            true,
            4
        ));
    }
}
