//! Persistence: the five tables of the score book, kept as serde rows in a
//! JSON file (gzip-compressed when the path ends in `.gz`).
//!
//! Writes are transactional: rows are staged on a copy and the file is
//! replaced before the in-memory state moves, so a failed write leaves the
//! store untouched.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::rule::{RuleError, RuleRow, Ruleset};
use crate::rules::RuleRegistry;
use crate::state::{Game, Point};
use crate::tile::Wind;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error("store format: {0}")]
    Format(#[from] serde_json::Error),
    #[error("no such game {0}")]
    NoSuchGame(i64),
    #[error("no score rows for game {0}")]
    NoScores(i64),
    #[error("no such ruleset {0}")]
    NoSuchRuleset(i64),
    #[error(transparent)]
    Rule(#[from] RuleError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRow {
    pub id: i64,
    pub name: String,
}

/// Saved ruleset header. Negative ids are editable templates, positive ids
/// are frozen copies attached to games.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RulesetRow {
    pub id: i64,
    pub name: String,
    pub hash: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRow {
    pub id: i64,
    pub starttime: i64,
    pub endtime: Option<i64>,
    pub seed: u64,
    pub p0: i64,
    pub p1: i64,
    pub p2: i64,
    pub p3: i64,
    pub ruleset: i64,
    pub autoplay: bool,
}

/// One row per player per hand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRow {
    pub game: i64,
    pub hand: u32,
    pub rotated: u8,
    pub notrotated: u32,
    pub player: i64,
    pub scoretime: i64,
    pub won: bool,
    pub prevailing: char,
    pub wind: char,
    pub points: i32,
    pub payments: i32,
    pub balance: i32,
    pub manualrules: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Database {
    players: Vec<PlayerRow>,
    rulesets: Vec<RulesetRow>,
    rules: Vec<RuleRow>,
    games: Vec<GameRow>,
    scores: Vec<ScoreRow>,
}

/// File-backed store for games and scoring rows.
pub struct Store {
    path: PathBuf,
    db: Database,
}

impl Store {
    /// Open a store, loading the file if it exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Store, StoreError> {
        let path = path.as_ref().to_path_buf();
        let db = if path.exists() {
            let file = File::open(&path)?;
            let mut text = String::new();
            if path.extension().is_some_and(|e| e == "gz") {
                GzDecoder::new(BufReader::new(file)).read_to_string(&mut text)?;
            } else {
                BufReader::new(file).read_to_string(&mut text)?;
            }
            serde_json::from_str(&text)?
        } else {
            Database::default()
        };
        Ok(Store { path, db })
    }

    fn persist(&self, db: &Database) -> Result<(), StoreError> {
        let text = serde_json::to_string(db)?;
        let tmp = self.path.with_extension("tmp");
        {
            let file = File::create(&tmp)?;
            if self.path.extension().is_some_and(|e| e == "gz") {
                let mut enc = GzEncoder::new(BufWriter::new(file), Compression::default());
                enc.write_all(text.as_bytes())?;
                enc.finish()?;
            } else {
                let mut out = BufWriter::new(file);
                out.write_all(text.as_bytes())?;
                out.flush()?;
            }
        }
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Stage a mutation, write it out, and only then adopt it.
    fn commit(
        &mut self,
        mutate: impl FnOnce(&mut Database),
    ) -> Result<(), StoreError> {
        let mut staged = self.db.clone();
        mutate(&mut staged);
        self.persist(&staged)?;
        self.db = staged;
        Ok(())
    }

    /// Find or create the player id for a name.
    pub fn player_id(&mut self, name: &str) -> Result<i64, StoreError> {
        if let Some(p) = self.db.players.iter().find(|p| p.name == name) {
            return Ok(p.id);
        }
        let id = self.db.players.iter().map(|p| p.id).max().unwrap_or(0) + 1;
        self.commit(|db| {
            db.players.push(PlayerRow {
                id,
                name: name.to_string(),
            })
        })?;
        Ok(id)
    }

    /// Save a ruleset. An existing ruleset with the identical hash is
    /// reused; otherwise the rows are copied under a fresh id. Templates
    /// get negative ids, game rulesets positive ones.
    pub fn save_ruleset(&mut self, ruleset: &Ruleset, template: bool) -> Result<i64, StoreError> {
        let hash = ruleset.hash();
        if let Some(existing) = self
            .db
            .rulesets
            .iter()
            .find(|r| r.hash == hash && (r.id < 0) == template)
        {
            return Ok(existing.id);
        }
        let magnitude = self
            .db
            .rulesets
            .iter()
            .map(|r| r.id.abs())
            .max()
            .unwrap_or(0)
            + 1;
        let id = if template { -magnitude } else { magnitude };
        let rows = ruleset.rows(id);
        let header = RulesetRow {
            id,
            name: ruleset.name.clone(),
            hash,
            description: ruleset.description.clone(),
        };
        self.commit(|db| {
            db.rulesets.push(header);
            db.rules.extend(rows);
        })?;
        Ok(id)
    }

    pub fn load_ruleset(
        &self,
        id: i64,
        registry: &RuleRegistry,
    ) -> Result<Ruleset, StoreError> {
        let header = self
            .db
            .rulesets
            .iter()
            .find(|r| r.id == id)
            .ok_or(StoreError::NoSuchRuleset(id))?;
        let rows: Vec<RuleRow> = self
            .db
            .rules
            .iter()
            .filter(|r| r.ruleset == id)
            .cloned()
            .collect();
        Ok(Ruleset::from_rows(
            &header.name,
            &header.description,
            &rows,
            registry,
        )?)
    }

    /// Save a game header (and its ruleset) and stamp the game with its id.
    pub fn save_game(&mut self, game: &mut Game, autoplay: bool) -> Result<i64, StoreError> {
        if let Some(id) = game.game_id {
            return Ok(id);
        }
        let ruleset_id = self.save_ruleset(&game.ruleset, false)?;
        let mut player_ids = [0i64; 4];
        for (i, p) in game.players.iter().enumerate() {
            player_ids[i] = self.player_id(&p.name)?;
        }
        for (p, &id) in game.players.iter_mut().zip(player_ids.iter()) {
            p.id = id;
        }
        let id = self.db.games.iter().map(|g| g.id).max().unwrap_or(0) + 1;
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        let row = GameRow {
            id,
            starttime: now,
            endtime: None,
            seed: game.point.seed,
            p0: player_ids[0],
            p1: player_ids[1],
            p2: player_ids[2],
            p3: player_ids[3],
            ruleset: ruleset_id,
            autoplay,
        };
        self.commit(|db| db.games.push(row))?;
        game.game_id = Some(id);
        Ok(id)
    }

    /// Append a game's new score rows (those not yet written).
    pub fn save_scores(&mut self, game: &Game) -> Result<(), StoreError> {
        let id = game.game_id.unwrap_or(0);
        let already = self
            .db
            .scores
            .iter()
            .filter(|s| s.game == id)
            .count();
        let fresh: Vec<ScoreRow> = game
            .score_rows
            .iter()
            .skip(already)
            .map(|r| ScoreRow {
                game: id,
                ..r.clone()
            })
            .collect();
        if fresh.is_empty() {
            return Ok(());
        }
        self.commit(|db| db.scores.extend(fresh))
    }

    /// Close a game header.
    pub fn finish_game(&mut self, game: &Game) -> Result<(), StoreError> {
        let Some(id) = game.game_id else {
            return Ok(());
        };
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        self.commit(|db| {
            if let Some(row) = db.games.iter_mut().find(|g| g.id == id) {
                row.endtime = Some(now);
            }
        })
    }

    /// Rebuild the Point a saved game stopped at from its newest score row.
    pub fn load_point(&self, game_id: i64) -> Result<Point, StoreError> {
        let game = self
            .db
            .games
            .iter()
            .find(|g| g.id == game_id)
            .ok_or(StoreError::NoSuchGame(game_id))?;
        let newest = self
            .db
            .scores
            .iter()
            .filter(|s| s.game == game_id)
            .max_by_key(|s| s.hand)
            .ok_or(StoreError::NoScores(game_id))?;
        let mut point = Point::new(game.seed);
        point.prevailing = Wind::from_letter(newest.prevailing).unwrap_or(Wind::East);
        point.rotated = newest.rotated;
        point.not_rotated = newest.notrotated;
        point.hand_count = newest.hand + 1;
        Ok(point)
    }

    pub fn games(&self) -> &[GameRow] {
        &self.db.games
    }

    pub fn scores_for(&self, game_id: i64) -> Vec<&ScoreRow> {
        self.db.scores.iter().filter(|s| s.game == game_id).collect()
    }
}
