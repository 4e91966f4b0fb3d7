//! Python bindings, kept behind the `python` feature so the core library
//! never links the interpreter. A Python front-end drives the engine
//! through hand strings and plain data.

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use crate::{ai, analyzer, Engine, Game, Hand, Store};

fn ruleset_or_err<'e>(
    engine: &'e Engine,
    name: Option<&str>,
) -> PyResult<&'e crate::Ruleset> {
    let wanted = name.unwrap_or("Classical Chinese DMJL");
    engine
        .template(wanted)
        .ok_or_else(|| PyValueError::new_err(format!("unknown ruleset {wanted:?}")))
}

/// Score a hand string: returns (won, total, applied rule names).
#[pyfunction]
#[pyo3(signature = (hand, ruleset=None))]
fn score_hand(hand: &str, ruleset: Option<&str>) -> PyResult<(bool, i32, Vec<String>)> {
    let engine = Engine::new();
    let ruleset = ruleset_or_err(&engine, ruleset)?;
    let hand = Hand::parse(hand).map_err(|e| PyValueError::new_err(e.to_string()))?;
    let result = analyzer::evaluate(&hand, ruleset);
    Ok((
        result.won,
        result.total,
        result.used_rules.into_iter().map(|u| u.name).collect(),
    ))
}

/// The tiles that would complete a one-away hand, as two-char codes.
#[pyfunction]
#[pyo3(signature = (hand, ruleset=None))]
fn winning_tiles(hand: &str, ruleset: Option<&str>) -> PyResult<Vec<String>> {
    let engine = Engine::new();
    let ruleset = ruleset_or_err(&engine, ruleset)?;
    let hand = Hand::parse(hand).map_err(|e| PyValueError::new_err(e.to_string()))?;
    Ok(ai::winning_tiles(&hand, ruleset)
        .into_iter()
        .map(|t| t.name())
        .collect())
}

/// Autoplay a seeded game; returns the four final balances. When `store`
/// names a file the score rows are written there.
#[pyfunction]
#[pyo3(signature = (seed, ruleset=None, store=None))]
fn autoplay(seed: u64, ruleset: Option<&str>, store: Option<&str>) -> PyResult<Vec<i32>> {
    let engine = Engine::new();
    let ruleset = ruleset_or_err(&engine, ruleset)?.clone();
    let mut game = Game::new(ruleset, seed, ["ROBOT 1", "ROBOT 2", "ROBOT 3", "ROBOT 4"]);
    let mut book = match store {
        Some(path) => {
            let mut book =
                Store::open(path).map_err(|e| PyValueError::new_err(e.to_string()))?;
            book.save_game(&mut game, true)
                .map_err(|e| PyValueError::new_err(e.to_string()))?;
            Some(book)
        }
        None => None,
    };
    while !game.finished {
        game.play_hand()
            .map_err(|e| PyValueError::new_err(e.to_string()))?;
        if let Some(book) = book.as_mut() {
            book.save_scores(&game)
                .map_err(|e| PyValueError::new_err(e.to_string()))?;
        }
    }
    if let Some(book) = book.as_mut() {
        book.finish_game(&game)
            .map_err(|e| PyValueError::new_err(e.to_string()))?;
    }
    Ok(game.players.iter().map(|p| p.balance).collect())
}

/// List the shipped ruleset names.
#[pyfunction]
fn rulesets() -> Vec<String> {
    Engine::new()
        .templates()
        .map(|r| r.name.clone())
        .collect()
}

#[pymodule]
fn mjclassic(_py: Python<'_>, m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(score_hand, m)?)?;
    m.add_function(wrap_pyfunction!(winning_tiles, m)?)?;
    m.add_function(wrap_pyfunction!(autoplay, m)?)?;
    m.add_function(wrap_pyfunction!(rulesets, m)?)?;
    Ok(())
}
