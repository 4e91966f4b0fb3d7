//! Scoring engine and game state machine for four-player classical Chinese
//! Mah Jongg.
//!
//! The library core is UI-free: a front-end feeds hand strings or drives
//! [`state::Game`] and reads back scores, winning tiles and robot
//! decisions. The optional `python` feature exposes the same entry points
//! as a Python extension module.

use thiserror::Error;

pub mod ai;
pub mod analyzer;
pub mod decompose;
pub mod hand;
pub mod meld;
pub mod presets;
pub mod rule;
pub mod rules;
pub mod score;
pub mod state;
pub mod store;
pub mod tile;

#[cfg(feature = "python")]
pub mod python;

#[cfg(test)]
mod tests;

pub use analyzer::{evaluate, HandResult};
pub use hand::{Hand, LastSource};
pub use meld::{KongStyle, Meld, MeldKind};
pub use rule::{Rule, RuleListKind, Ruleset};
pub use score::Score;
pub use state::{Game, Player, Point, PointRange, Wall};
pub use store::Store;
pub use tile::{Tile, TileGroup, Wind};

/// Everything that can go wrong across the engine, one level up from the
/// per-module error types.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Hand(#[from] hand::HandError),
    #[error(transparent)]
    Meld(#[from] meld::MeldError),
    #[error(transparent)]
    Rule(#[from] rule::RuleError),
    #[error(transparent)]
    Game(#[from] state::GameError),
    #[error(transparent)]
    Point(#[from] state::PointError),
    #[error(transparent)]
    Store(#[from] store::StoreError),
}

/// The engine context: the rule code registry and the shipped ruleset
/// templates. All shared state lives here; there are no process globals.
pub struct Engine {
    registry: rules::RuleRegistry,
    templates: Vec<Ruleset>,
}

impl Engine {
    pub fn new() -> Engine {
        let registry = rules::RuleRegistry::standard();
        let templates = vec![
            presets::classical_chinese_dmjl(&registry),
            presets::classical_chinese_bmja(&registry),
            presets::classical_chinese_bmja_roof_off(&registry),
        ];
        Engine {
            registry,
            templates,
        }
    }

    pub fn registry(&self) -> &rules::RuleRegistry {
        &self.registry
    }

    pub fn templates(&self) -> impl Iterator<Item = &Ruleset> {
        self.templates.iter()
    }

    /// Look a template up by name, exact first, then case-insensitive
    /// prefix.
    pub fn template(&self, name: &str) -> Option<&Ruleset> {
        self.templates
            .iter()
            .find(|r| r.name == name)
            .or_else(|| {
                let lower = name.to_lowercase();
                self.templates
                    .iter()
                    .find(|r| r.name.to_lowercase().starts_with(&lower))
            })
    }

    /// Score a hand string under a ruleset.
    pub fn score_hand(&self, text: &str, ruleset: &Ruleset) -> Result<HandResult, EngineError> {
        let hand = Hand::parse(text)?;
        Ok(analyzer::evaluate(&hand, ruleset))
    }

    /// The tiles completing a one-away hand, in tile order.
    pub fn winning_tiles(
        &self,
        text: &str,
        ruleset: &Ruleset,
    ) -> Result<Vec<Tile>, EngineError> {
        let hand = Hand::parse(text)?;
        Ok(ai::winning_tiles(&hand, ruleset).into_iter().collect())
    }
}

impl Default for Engine {
    fn default() -> Self {
        Engine::new()
    }
}
