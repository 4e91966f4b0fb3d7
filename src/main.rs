//! Command-line harness around the engine: score a hand, list its winning
//! tiles, or autoplay a seeded game into a score file.
//!
//! Exit codes: 0 success, 2 bad input, 3 missing dependency (unknown
//! ruleset or unusable store).

use std::process::ExitCode;

use anyhow::{anyhow, Context, Result};

use mjclassic::{ai, Engine, Game, Hand, Store};

const USAGE: &str = "usage: mjclassic <command> [args]

commands:
  score <hand-string> [ruleset]   print total score and applied rules
  call  <hand-string> [ruleset]   print the tiles that would win
  play  <seed> [ruleset] [file]   autoplay a game, write score rows
  rulesets                        list the shipped rulesets
";

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("mjclassic: {err:#}");
            ExitCode::from(err.exit_code)
        }
    }
}

struct CliError {
    inner: anyhow::Error,
    exit_code: u8,
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.inner.fmt(f)
    }
}

impl std::fmt::Debug for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.inner.fmt(f)
    }
}

trait ExitCoded<T> {
    fn or_bad_input(self) -> Result<T, CliError>;
    fn or_missing(self) -> Result<T, CliError>;
}

impl<T, E: Into<anyhow::Error>> ExitCoded<T> for Result<T, E> {
    fn or_bad_input(self) -> Result<T, CliError> {
        self.map_err(|e| CliError {
            inner: e.into(),
            exit_code: 2,
        })
    }

    fn or_missing(self) -> Result<T, CliError> {
        self.map_err(|e| CliError {
            inner: e.into(),
            exit_code: 3,
        })
    }
}

fn run(args: &[String]) -> Result<(), CliError> {
    let engine = Engine::new();
    let command = args.first().map(String::as_str).unwrap_or("");
    match command {
        "score" => {
            let text = args.get(1).ok_or_else(usage).or_bad_input()?;
            let ruleset = pick_ruleset(&engine, args.get(2))?;
            let hand = Hand::parse(text)
                .context("cannot parse hand")
                .or_bad_input()?;
            let result = mjclassic::evaluate(&hand, ruleset);
            println!(
                "{} {} ({})",
                if result.won { "won" } else { "not won" },
                result.total,
                result.score
            );
            for used in &result.used_rules {
                match &used.meld {
                    Some(meld) => println!("  {} [{}] {}", used.name, meld, used.score),
                    None => println!("  {} {}", used.name, used.score),
                }
            }
            Ok(())
        }
        "call" => {
            let text = args.get(1).ok_or_else(usage).or_bad_input()?;
            let ruleset = pick_ruleset(&engine, args.get(2))?;
            let hand = Hand::parse(text)
                .context("cannot parse hand")
                .or_bad_input()?;
            for tile in ai::winning_tiles(&hand, ruleset) {
                println!("{tile}");
            }
            Ok(())
        }
        "play" => {
            let seed: u64 = args
                .get(1)
                .ok_or_else(usage)
                .or_bad_input()?
                .parse()
                .context("seed must be a number")
                .or_bad_input()?;
            let ruleset = pick_ruleset(&engine, args.get(2))?.clone();
            let path = args
                .get(3)
                .cloned()
                .unwrap_or_else(|| "mjclassic-scores.json".to_string());
            let mut store = Store::open(&path)
                .with_context(|| format!("cannot open store {path}"))
                .or_missing()?;
            let mut game = Game::new(ruleset, seed, ["ROBOT 1", "ROBOT 2", "ROBOT 3", "ROBOT 4"]);
            store.save_game(&mut game, true).or_missing()?;
            while !game.finished {
                game.play_hand().or_bad_input()?;
                store.save_scores(&game).or_missing()?;
            }
            store.finish_game(&game).or_missing()?;
            println!("game {} over after {} hands", game.point, game.point.hand_count);
            for p in &game.players {
                println!("  {:>8}: {}", p.name, p.balance);
            }
            Ok(())
        }
        "rulesets" => {
            for ruleset in engine.templates() {
                println!("{} ({})", ruleset.name, ruleset.hash());
            }
            Ok(())
        }
        _ => Err(usage()).or_bad_input(),
    }
}

fn usage() -> anyhow::Error {
    anyhow!("{USAGE}")
}

fn pick_ruleset<'e>(
    engine: &'e Engine,
    name: Option<&String>,
) -> Result<&'e mjclassic::Ruleset, CliError> {
    match name {
        None => engine
            .template("Classical Chinese DMJL")
            .ok_or_else(|| anyhow!("default ruleset missing"))
            .or_missing(),
        Some(n) => engine
            .template(n)
            .ok_or_else(|| anyhow!("unknown ruleset {n:?}"))
            .or_missing(),
    }
}
