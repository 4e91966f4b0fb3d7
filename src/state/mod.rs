//! The game state machine: four seats, a wall, wind rotation, payments and
//! the claim arbitration around each discard.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::prelude::*;
use rand::rngs::StdRng;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::ai::{self, ClaimAnswer, DiscardContext};
use crate::analyzer;
use crate::hand::LastSource;
use crate::meld::{KongStyle, Meld};
use crate::rule::{RuleListKind, Ruleset};
use crate::rules::RotationView;
use crate::store::ScoreRow;
use crate::tile::{Tile, Wind};

pub mod player;
pub mod point;
pub mod wall;

pub use player::Player;
pub use point::{Point, PointError, PointRange};
pub use wall::Wall;

#[derive(Debug, Error)]
pub enum GameError {
    #[error("game is already over")]
    GameOver,
    #[error("bad player index {0}")]
    BadPlayer(usize),
    #[error("penalty rule {0} not in ruleset")]
    UnknownPenalty(String),
    #[error("penalty {rule} expects {expected} payers and {expected_payees} payees")]
    PenaltyCounts {
        rule: String,
        expected: usize,
        expected_payees: usize,
    },
    #[error(transparent)]
    Hand(#[from] crate::hand::HandError),
}

/// What ended a hand.
#[derive(Debug, Clone, PartialEq)]
pub enum HandOutcome {
    /// Somebody declared Mah Jongg.
    Won { winner: usize, total: i32 },
    /// The living wall ran dry.
    Drawn,
}

/// A running game: the ruleset, four players, the temporal coordinate and
/// everything the orchestrator needs to drive hands to completion.
pub struct Game {
    pub ruleset: Ruleset,
    pub players: [Player; 4],
    pub point: Point,
    pub wall: Wall,
    pub winner: Option<usize>,
    pub finished: bool,
    /// Consecutive wins by the sitting East, reset on rotation.
    pub east_streak: u32,
    /// One JSON object per recorded move.
    events: Vec<Value>,
    /// Score rows accumulated over the game, one per player per hand.
    pub score_rows: Vec<ScoreRow>,
    /// Persistence id once saved.
    pub game_id: Option<i64>,
    rng: StdRng,
}

impl Game {
    pub fn new(ruleset: Ruleset, seed: u64, names: [&str; 4]) -> Game {
        let players = [
            Player::new(0, names[0], Wind::East),
            Player::new(1, names[1], Wind::South),
            Player::new(2, names[2], Wind::West),
            Player::new(3, names[3], Wind::North),
        ];
        let wall = Wall::build(seed, 0, ruleset.with_bonus_tiles());
        Game {
            ruleset,
            players,
            point: Point::new(seed),
            wall,
            winner: None,
            finished: false,
            east_streak: 0,
            events: Vec::new(),
            score_rows: Vec::new(),
            game_id: None,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn events(&self) -> &[Value] {
        &self.events
    }

    pub fn prevailing(&self) -> Wind {
        self.point.prevailing
    }

    fn seat_of(&self, wind: Wind) -> usize {
        self.players
            .iter()
            .position(|p| p.wind == wind)
            .expect("every wind has a seat")
    }

    fn push_event(&mut self, kind: &str, fields: &[(&str, Value)]) {
        let mut map = Map::new();
        map.insert("type".to_string(), Value::String(kind.to_string()));
        map.insert(
            "point".to_string(),
            Value::String(self.point.to_string()),
        );
        for (k, v) in fields {
            map.insert((*k).to_string(), v.clone());
        }
        self.events.push(Value::Object(map));
    }

    /// Deal a fresh wall and thirteen tiles to every seat, bonus tiles
    /// exposed and replaced from the dead wall.
    fn prepare_hand(&mut self) {
        self.wall = Wall::build(
            self.point.seed,
            self.point.hand_count,
            self.ruleset.with_bonus_tiles(),
        );
        self.point.move_count = 0;
        self.winner = None;
        for p in &mut self.players {
            p.clear_hand();
        }
        for _ in 0..13 {
            for seat in 0..4 {
                if let Some(tile) = self.wall.draw() {
                    self.players[seat].concealed.push(tile);
                }
            }
        }
        for seat in 0..4 {
            self.players[seat].concealed.sort();
            self.expose_bonus(seat);
        }
        self.push_event("deal", &[("wall", Value::String(self.wall.digest.clone()))]);
    }

    /// Move bonus tiles out of the bag, drawing replacements until none is
    /// left concealed.
    fn expose_bonus(&mut self, seat: usize) {
        loop {
            let p = &mut self.players[seat];
            let Some(idx) = p.concealed.iter().position(|t| t.is_bonus()) else {
                return;
            };
            let bonus = p.concealed.remove(idx);
            p.bonus.push(bonus.exposed());
            p.bonus.sort();
            if let Some(replacement) = self.wall.draw_dead() {
                self.players[seat].concealed.push(replacement);
                self.players[seat].concealed.sort();
            }
        }
    }

    /// Play one hand with robot decisions: returns how it ended. Payments
    /// and rotation are applied before returning.
    pub fn play_hand(&mut self) -> Result<HandOutcome, GameError> {
        if self.finished {
            return Err(GameError::GameOver);
        }
        self.prepare_hand();

        let mut current = self.seat_of(Wind::East);
        let mut needs_draw = true;
        let mut first_discard = true;
        let mut last_discard_from_wall_end = false;
        let outcome;

        'hand: loop {
            if needs_draw {
                let from_wall_end = self.wall.next_is_last();
                let Some(tile) = self.wall.draw() else {
                    outcome = HandOutcome::Drawn;
                    break 'hand;
                };
                let source = if self.point.move_count == 0 {
                    LastSource::Fourteenth
                } else if from_wall_end {
                    LastSource::WallEnd
                } else {
                    LastSource::Wall
                };
                self.point.move_count += 1;
                self.players[current].take_tile(tile, source);
                self.expose_bonus(current);
                last_discard_from_wall_end = from_wall_end;
            }
            needs_draw = true;

            // Declare Mah Jongg on a self-drawn completion.
            if self.robot_wins(current)? {
                outcome = self.finish_won_hand(current)?;
                break 'hand;
            }

            // Discard.
            let hand = self.players[current].hand(self.prevailing(), false)?;
            let context = self.discard_context(current);
            let Some(tile) = ai::choose_discard(&hand, &self.ruleset, &context, &mut self.rng)
            else {
                outcome = HandOutcome::Drawn;
                break 'hand;
            };
            self.players[current].give_tile(tile);
            self.players[current].discards.push(tile.exposed());
            self.players[current].last_tile = None;
            self.point.move_count += 1;
            self.push_event(
                "discard",
                &[
                    ("seat", Value::from(current)),
                    ("tile", Value::String(tile.name())),
                ],
            );

            // Claims, in priority order; Mah Jongg ties go clockwise from
            // the discarder.
            let claim_source = if first_discard && self.players[current].wind == Wind::East {
                LastSource::Fourteenth
            } else if last_discard_from_wall_end {
                LastSource::WallEndDiscard
            } else {
                LastSource::Discard
            };
            first_discard = false;

            match self.resolve_claims(current, tile)? {
                Some((claimer, ClaimAnswer::MahJongg)) => {
                    self.players[current].discards.pop();
                    self.players[claimer].take_tile(tile, claim_source);
                    self.point.move_count += 1;
                    outcome = self.finish_won_hand(claimer)?;
                    break 'hand;
                }
                Some((claimer, ClaimAnswer::Kong)) => {
                    self.players[current].discards.pop();
                    for _ in 0..3 {
                        self.players[claimer].give_tile(tile);
                    }
                    self.players[claimer]
                        .melds
                        .push(Meld::kong_of(tile.exposed(), KongStyle::Claimed));
                    self.point.move_count += 1;
                    self.push_event(
                        "claim",
                        &[
                            ("seat", Value::from(claimer)),
                            ("claim", Value::String("kong".to_string())),
                            ("tile", Value::String(tile.name())),
                        ],
                    );
                    // Replacement tile from the dead wall, then discard.
                    if let Some(replacement) = self.wall.draw_dead() {
                        self.players[claimer].take_tile(replacement, LastSource::DeadWall);
                        self.expose_bonus(claimer);
                    }
                    current = claimer;
                    needs_draw = false;
                }
                Some((claimer, answer)) => {
                    self.players[current].discards.pop();
                    let meld = match answer {
                        ClaimAnswer::Pung => {
                            for _ in 0..2 {
                                self.players[claimer].give_tile(tile);
                            }
                            Meld::pung_of(tile.exposed())
                        }
                        _ => self.claimed_chow(claimer, tile),
                    };
                    self.players[claimer].melds.push(meld);
                    self.players[claimer].last_tile = None;
                    self.point.move_count += 1;
                    self.push_event(
                        "claim",
                        &[
                            ("seat", Value::from(claimer)),
                            ("claim", Value::String(format!("{answer:?}").to_lowercase())),
                            ("tile", Value::String(tile.name())),
                        ],
                    );
                    current = claimer;
                    needs_draw = false;
                }
                None => {
                    current = (current + 1) % 4;
                }
            }
        }

        self.settle_hand(&outcome)?;
        Ok(outcome)
    }

    fn discard_context(&self, seat: usize) -> DiscardContext {
        let mut visible = Vec::new();
        let mut dangerous = std::collections::BTreeSet::new();
        for (i, p) in self.players.iter().enumerate() {
            visible.extend(p.discards.iter().copied());
            if i == seat {
                continue;
            }
            for meld in &p.melds {
                if meld.is_exposed() {
                    visible.extend(meld.tiles().iter().map(|t| t.exposed()));
                }
            }
            // A seat showing three exposed melds of one color threatens a
            // color game: its suit and every honor turn dangerous.
            let exposed: Vec<&Meld> = p.melds.iter().filter(|m| m.is_exposed()).collect();
            if exposed.len() >= 3 {
                let suits: Vec<_> = exposed
                    .iter()
                    .filter(|m| m.first().is_suit())
                    .map(|m| m.group())
                    .collect();
                if let Some(&suit) = suits.first() {
                    if suits.iter().all(|&g| g == suit) {
                        dangerous.extend(
                            Tile::playable().filter(|t| t.group() == suit || t.is_honor()),
                        );
                    }
                }
            }
        }
        DiscardContext { dangerous, visible }
    }

    fn robot_wins(&mut self, seat: usize) -> Result<bool, GameError> {
        let hand = self.players[seat].hand(self.prevailing(), true)?;
        if !hand.is_full() || !self.players[seat].may_win {
            return Ok(false);
        }
        Ok(analyzer::quick_won(&hand, &self.ruleset))
    }

    fn claimed_chow(&mut self, claimer: usize, tile: Tile) -> Meld {
        let holds = |g: &Game, t: Option<Tile>| t.is_some_and(|t| g.players[claimer].holds(t) > 0);
        let variants = [
            (tile.prev2(), tile.prev()),
            (tile.prev(), tile.next_for_chow()),
            (tile.next_for_chow(), tile.next2()),
        ];
        for (a, b) in variants {
            if holds(self, a) && holds(self, b) {
                let (a, b) = (a.expect("checked"), b.expect("checked"));
                self.players[claimer].give_tile(a);
                self.players[claimer].give_tile(b);
                let mut tiles = [a.exposed(), b.exposed(), tile.exposed()];
                tiles.sort();
                return Meld::new(tiles).expect("consecutive run");
            }
        }
        // Claim arbitration only grants a chow when one exists.
        unreachable!("chow claim without matching tiles")
    }

    fn resolve_claims(
        &mut self,
        discarder: usize,
        tile: Tile,
    ) -> Result<Option<(usize, ClaimAnswer)>, GameError> {
        let mut best: Option<(usize, ClaimAnswer)> = None;
        for step in 1..4 {
            let seat = (discarder + step) % 4;
            let hand = self.players[seat].hand(self.prevailing(), false)?;
            let answer = ai::claim_for(&hand, tile, &self.ruleset, step == 1);
            if answer == ClaimAnswer::NoClaim {
                continue;
            }
            if answer == ClaimAnswer::MahJongg {
                // Clockwise from the discarder: the first call stands.
                return Ok(Some((seat, answer)));
            }
            let better = match best {
                None => true,
                Some((_, b)) => answer > b,
            };
            if better {
                best = Some((seat, answer));
            }
        }
        Ok(best)
    }

    fn finish_won_hand(&mut self, winner: usize) -> Result<HandOutcome, GameError> {
        self.winner = Some(winner);
        self.players[winner].won = true;
        let hand = self.players[winner].hand(self.prevailing(), true)?;
        let result = analyzer::evaluate(&hand, &self.ruleset);
        self.push_event(
            "mahjongg",
            &[
                ("seat", Value::from(winner)),
                ("hand", Value::String(hand.format())),
                ("total", Value::from(result.total)),
            ],
        );
        Ok(HandOutcome::Won {
            winner,
            total: result.total,
        })
    }

    /// Score all four hands, transfer payments, record rows, rotate winds.
    fn settle_hand(&mut self, outcome: &HandOutcome) -> Result<(), GameError> {
        let mut totals = [0i32; 4];
        let mut used: [Vec<String>; 4] = Default::default();
        for seat in 0..4 {
            let declared = self.winner == Some(seat);
            let hand = self.players[seat].hand(self.prevailing(), declared)?;
            let result = analyzer::evaluate(&hand, &self.ruleset);
            totals[seat] = result.total;
            used[seat] = result
                .used_rules
                .iter()
                .map(|u| u.name.clone())
                .collect();
        }
        if matches!(outcome, HandOutcome::Won { .. }) {
            self.pay_hand(&totals);
        }
        self.record_rows(&totals, &used);
        self.end_hand();
        Ok(())
    }

    /// Settle every ordered pair of seats: East doubles the transfer, the
    /// winner never pays.
    fn pay_hand(&mut self, totals: &[i32; 4]) {
        let winner = self.winner;
        let mut payments = [0i32; 4];
        for p1 in 0..4 {
            for p2 in 0..4 {
                if p1 == p2 {
                    continue;
                }
                let factor = if self.players[p1].wind == Wind::East
                    || self.players[p2].wind == Wind::East
                {
                    2
                } else {
                    1
                };
                if winner != Some(p2) {
                    payments[p1] += totals[p1] * factor;
                }
                if winner != Some(p1) {
                    payments[p1] -= totals[p2] * factor;
                }
            }
        }
        for seat in 0..4 {
            self.players[seat].payment = payments[seat];
            self.players[seat].balance += payments[seat];
        }
        self.push_event(
            "payments",
            &[(
                "amounts",
                Value::from(payments.to_vec()),
            )],
        );
    }

    fn record_rows(&mut self, totals: &[i32; 4], used: &[Vec<String>; 4]) {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        for seat in 0..4 {
            let p = &self.players[seat];
            self.score_rows.push(ScoreRow {
                game: self.game_id.unwrap_or(0),
                hand: self.point.hand_count,
                rotated: self.point.rotated,
                notrotated: self.point.not_rotated,
                player: p.id,
                scoretime: now,
                won: self.winner == Some(seat),
                prevailing: self.prevailing().letter(),
                wind: p.wind.letter(),
                points: totals[seat],
                payments: p.payment,
                balance: p.balance,
                manualrules: used[seat].join(","),
            });
        }
    }

    /// Wind rotation, prevailing advance, seat exchange and game-over
    /// detection.
    fn end_hand(&mut self) {
        let winner_wind = self.winner.map(|w| self.players[w].wind);
        self.point.hand_count += 1;

        match winner_wind {
            Some(Wind::East) => {
                self.east_streak += 1;
                self.point.not_rotated += 1;
            }
            Some(_) => self.rotate(),
            // A drawn hand is replayed with unchanged winds.
            None => {}
        }

        let view = RotationView {
            winner_wind,
            east_streak: self.east_streak,
        };
        let enders: Vec<String> = self
            .ruleset
            .all_rules()
            .filter(|(_, rule)| rule.code.ends_game(&rule.meta, &view))
            .map(|(_, rule)| rule.name.clone())
            .collect();
        for name in enders {
            self.finished = true;
            self.push_event("game_over", &[("reason", Value::String(name))]);
        }
    }

    fn rotate(&mut self) {
        self.east_streak = 0;
        self.point.not_rotated = 0;
        for p in &mut self.players {
            p.wind = Wind::from_index(p.wind.index() + 3);
        }
        self.point.rotated += 1;
        if self.point.rotated == 4 {
            self.point.rotated = 0;
            let next_round = self.prevailing().index() + 1;
            if u32::from(next_round) >= self.ruleset.min_rounds() {
                self.finished = true;
                self.push_event(
                    "game_over",
                    &[("reason", Value::String("rounds complete".to_string()))],
                );
                return;
            }
            self.point.prevailing = self.prevailing().next();
            self.exchange_seats();
        }
    }

    /// Apply the ruleset's seat-exchange encoding when a new round begins.
    /// `"SWEN,SE,WE"` names the wind pairs whose occupants swap in rounds
    /// two, three and four.
    fn exchange_seats(&mut self) {
        let encoding = self.ruleset.seat_exchange();
        let parts: Vec<&str> = encoding.split(',').collect();
        let round = self.prevailing().index() as usize;
        if round == 0 || round > parts.len() {
            return;
        }
        let part = parts[round - 1];
        let letters: Vec<Wind> = part
            .chars()
            .filter_map(|c| Wind::from_letter(c.to_ascii_lowercase()))
            .collect();
        for pair in letters.chunks(2) {
            let [a, b] = pair else { continue };
            let seat_a = self.seat_of(*a);
            let seat_b = self.seat_of(*b);
            self.players[seat_a].wind = *b;
            self.players[seat_b].wind = *a;
            self.push_event(
                "seat_exchange",
                &[
                    ("winds", Value::String(format!("{a}{b}"))),
                    (
                        "players",
                        Value::from(vec![seat_a as i64, seat_b as i64]),
                    ),
                ],
            );
        }
    }

    /// Apply a penalty outside the regular payment flow. Mismatched payer
    /// and payee counts split the amount per side; remainders go to the
    /// earliest seat in wind order.
    pub fn apply_penalty(
        &mut self,
        rule_name: &str,
        payers: &[usize],
        payees: &[usize],
    ) -> Result<(), GameError> {
        let rule = self
            .ruleset
            .list(RuleListKind::Penalty)
            .get(rule_name)
            .ok_or_else(|| GameError::UnknownPenalty(rule_name.to_string()))?;
        let expected_payers = rule.meta.option_int("payers", 1) as usize;
        let expected_payees = rule.meta.option_int("payees", 1) as usize;
        if payers.len() != expected_payers || payees.len() != expected_payees {
            return Err(GameError::PenaltyCounts {
                rule: rule_name.to_string(),
                expected: expected_payers,
                expected_payees,
            });
        }
        for &seat in payers.iter().chain(payees) {
            if seat > 3 {
                return Err(GameError::BadPlayer(seat));
            }
        }
        let amount = rule.score.points.abs();
        let per_payer = amount / payers.len() as i32;
        let payer_rest = amount % payers.len() as i32;
        let per_payee = amount / payees.len() as i32;
        let payee_rest = amount % payees.len() as i32;
        for (i, &seat) in payers.iter().enumerate() {
            let extra = if i == 0 { payer_rest } else { 0 };
            self.players[seat].balance -= per_payer + extra;
        }
        for (i, &seat) in payees.iter().enumerate() {
            let extra = if i == 0 { payee_rest } else { 0 };
            self.players[seat].balance += per_payee + extra;
        }
        self.push_event(
            "penalty",
            &[
                ("rule", Value::String(rule_name.to_string())),
                ("payers", Value::from(payers.iter().map(|&s| s as i64).collect::<Vec<_>>())),
                ("payees", Value::from(payees.iter().map(|&s| s as i64).collect::<Vec<_>>())),
            ],
        );
        Ok(())
    }

    /// Run hands until the game ends. The hand cap is a backstop against a
    /// pathological run of drawn hands.
    pub fn play_to_end(&mut self) -> Result<(), GameError> {
        const MAX_HANDS: u32 = 512;
        while !self.finished {
            self.play_hand()?;
            if self.point.hand_count >= MAX_HANDS {
                self.finished = true;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presets;
    use crate::rules::RuleRegistry;

    fn game(seed: u64) -> Game {
        let reg = RuleRegistry::standard();
        let ruleset = presets::classical_chinese_dmjl(&reg);
        Game::new(ruleset, seed, ["east", "south", "west", "north"])
    }

    #[test]
    fn deal_gives_thirteen_each() {
        let mut g = game(11);
        g.prepare_hand();
        for p in &g.players {
            assert_eq!(p.concealed.len(), 13);
            assert!(p.concealed.iter().all(|t| !t.is_bonus()));
        }
    }

    #[test]
    fn payments_sum_to_zero() {
        let mut g = game(23);
        g.winner = Some(1);
        g.pay_hand(&[10, 64, 2, 8]);
        let sum: i32 = g.players.iter().map(|p| p.payment).sum();
        assert_eq!(sum, 0);
        // The winner never pays.
        assert!(g.players[1].payment > 0);
    }

    #[test]
    fn east_doubles_transfers() {
        let mut g = game(29);
        g.winner = Some(1);
        // Only the winner scores; everyone pays 64, East twice over.
        g.pay_hand(&[0, 64, 0, 0]);
        assert_eq!(g.players[0].payment, -128);
        assert_eq!(g.players[2].payment, -64);
        assert_eq!(g.players[3].payment, -64);
        assert_eq!(g.players[1].payment, 256);
    }

    #[test]
    fn rotation_advances_winds_and_round() {
        let mut g = game(31);
        assert_eq!(g.players[0].wind, Wind::East);
        g.winner = Some(1);
        g.end_hand();
        // South seat became East.
        assert_eq!(g.players[1].wind, Wind::East);
        assert_eq!(g.point.rotated, 1);
        assert_eq!(g.point.not_rotated, 0);
        // Three more rotations advance the prevailing wind.
        for _ in 0..3 {
            let non_east = (0..4).find(|&s| g.players[s].wind != Wind::East).unwrap();
            g.winner = Some(non_east);
            g.end_hand();
        }
        assert_eq!(g.prevailing(), Wind::South);
        assert_eq!(g.point.rotated, 0);
    }

    #[test]
    fn east_win_does_not_rotate() {
        let mut g = game(37);
        g.winner = Some(0);
        g.end_hand();
        assert_eq!(g.players[0].wind, Wind::East);
        assert_eq!(g.point.rotated, 0);
        assert_eq!(g.point.not_rotated, 1);
        assert_eq!(g.east_streak, 1);
    }

    #[test]
    fn nine_east_wins_end_the_game() {
        let mut g = game(41);
        for _ in 0..9 {
            g.winner = Some(0);
            g.end_hand();
        }
        assert!(g.finished);
        assert_eq!(g.east_streak, 9);
    }

    #[test]
    fn penalties_split_with_remainder() {
        let mut g = game(43);
        g.apply_penalty(
            "False Declaration of Mah Jongg by One Player",
            &[0],
            &[1, 2, 3],
        )
        .unwrap();
        assert_eq!(g.players[0].balance, -300);
        assert_eq!(g.players[1].balance, 100);
        let sum: i32 = g.players.iter().map(|p| p.balance).sum();
        assert_eq!(sum, 0);
        // Wrong counts are rejected.
        assert!(g
            .apply_penalty("False Declaration of Mah Jongg by One Player", &[0, 1], &[2])
            .is_err());
    }

    #[test]
    fn seat_exchange_swaps_occupants() {
        let mut g = game(47);
        // Force the end of round one: rotate four times.
        for _ in 0..4 {
            let non_east = (0..4).find(|&s| g.players[s].wind != Wind::East).unwrap();
            g.winner = Some(non_east);
            g.end_hand();
        }
        assert_eq!(g.prevailing(), Wind::South);
        // After four rotations everyone is back at the start wind, then
        // "SWEN" swaps South/West and East/North.
        assert_eq!(g.players[0].wind, Wind::North);
        assert_eq!(g.players[1].wind, Wind::West);
        assert_eq!(g.players[2].wind, Wind::South);
        assert_eq!(g.players[3].wind, Wind::East);
    }

    #[test]
    fn autoplay_finishes_deterministically() {
        let mut g = game(5);
        let outcome = g.play_hand().unwrap();
        let mut g2 = game(5);
        let outcome2 = g2.play_hand().unwrap();
        assert_eq!(outcome, outcome2);
        assert_eq!(g.events().len(), g2.events().len());
        let balance_sum: i32 = g.players.iter().map(|p| p.balance).sum();
        assert_eq!(balance_sum, 0);
    }
}
