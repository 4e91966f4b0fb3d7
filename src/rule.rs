use std::fmt;
use std::sync::Arc;

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::rules::{RuleCode, RuleRegistry};
use crate::score::Score;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuleError {
    #[error("rule {rule}: unknown rule code {key}")]
    UnknownCode { rule: String, key: String },
    #[error("rule {rule}: empty definition")]
    EmptyDefinition { rule: String },
    #[error("rule {rule}: bad option {option}")]
    BadOption { rule: String, option: String },
    #[error("rule {0}: a rule may use points, doubles or limits, not several")]
    MultipleUnits(String),
    #[error("rule {rule}: bad parameter {value:?} for type {ty}")]
    BadParameter {
        rule: String,
        ty: String,
        value: String,
    },
    #[error("penalty rule {rule}: {payers} payers and {payees} payees do not fit four seats")]
    BadPenalty {
        rule: String,
        payers: usize,
        payees: usize,
    },
    #[error("unknown ruleset {0}")]
    UnknownRuleset(String),
}

/// Typed value of a parameter rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    Int(i64),
    Bool(bool),
    Text(String),
}

impl ParamValue {
    pub fn as_int(&self) -> i64 {
        match self {
            ParamValue::Int(v) => *v,
            ParamValue::Bool(b) => i64::from(*b),
            ParamValue::Text(s) => s.parse().unwrap_or(0),
        }
    }

    pub fn as_bool(&self) -> bool {
        match self {
            ParamValue::Bool(b) => *b,
            ParamValue::Int(v) => *v != 0,
            ParamValue::Text(s) => s == "true" || s == "1",
        }
    }

    pub fn as_text(&self) -> String {
        match self {
            ParamValue::Text(s) => s.clone(),
            ParamValue::Int(v) => v.to_string(),
            ParamValue::Bool(b) => b.to_string(),
        }
    }

    fn parse(ty: &str, value: &str) -> Option<ParamValue> {
        match ty {
            "int" => value.parse().ok().map(ParamValue::Int),
            "bool" => match value {
                "true" | "True" | "1" => Some(ParamValue::Bool(true)),
                "false" | "False" | "0" | "" => Some(ParamValue::Bool(false)),
                _ => None,
            },
            "str" => Some(ParamValue::Text(value.to_string())),
            _ => None,
        }
    }
}

/// Everything about a rule except its resolved code: rule code methods get
/// their options, parameter and cache id through this.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RuleMeta {
    pub name: String,
    pub options: Vec<(String, String)>,
    pub parameter: Option<ParamValue>,
    /// Small integer identity within the ruleset; rule codes key their
    /// evaluation-context memos on it.
    pub id: u32,
}

impl RuleMeta {
    pub fn option(&self, key: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn option_int(&self, key: &str, default: i64) -> i64 {
        self.option(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    pub fn has_option(&self, key: &str) -> bool {
        self.option(key).is_some()
    }
}

/// One scoring condition: name, encoded definition, score contribution and
/// the resolved rule code.
#[derive(Clone)]
pub struct Rule {
    pub name: String,
    pub definition: String,
    pub score: Score,
    pub meta: RuleMeta,
    pub code: Arc<dyn RuleCode>,
    /// Small integer identity within its ruleset, stable per load. Cache key.
    pub id: u32,
}

impl Rule {
    /// Resolve a definition string against the registry.
    ///
    /// Grammar: variants separated by `||`; the first must be `F<key>`
    /// naming a registered rule code, later ones may be `O<k>=<v> <k>=<v>…`
    /// option lists.
    pub fn resolve(
        name: &str,
        definition: &str,
        score: Score,
        parameter: Option<ParamValue>,
        registry: &RuleRegistry,
    ) -> Result<Rule, RuleError> {
        if score.unit_count() > 1 {
            return Err(RuleError::MultipleUnits(name.to_string()));
        }
        let mut variants = definition.split("||");
        let head = variants.next().unwrap_or("");
        let key = head
            .strip_prefix('F')
            .filter(|k| !k.is_empty())
            .ok_or_else(|| RuleError::EmptyDefinition {
                rule: name.to_string(),
            })?;
        let code = registry.get(key).ok_or_else(|| RuleError::UnknownCode {
            rule: name.to_string(),
            key: key.to_string(),
        })?;

        let mut options = Vec::new();
        for variant in variants {
            if let Some(opts) = variant.strip_prefix('O') {
                for item in opts.split_whitespace() {
                    match item.split_once('=') {
                        Some((k, v)) => options.push((k.to_string(), v.to_string())),
                        None => options.push((item.to_string(), String::new())),
                    }
                }
            } else {
                return Err(RuleError::BadOption {
                    rule: name.to_string(),
                    option: variant.to_string(),
                });
            }
        }

        Ok(Rule {
            name: name.to_string(),
            definition: definition.to_string(),
            score,
            meta: RuleMeta {
                name: name.to_string(),
                options,
                parameter,
                id: 0,
            },
            code,
            id: 0,
        })
    }

    /// A parameter rule: no code, just a typed value. The definition is the
    /// type tag `int` / `bool` / `str`.
    pub fn parameter(name: &str, ty: &str, value: &str) -> Result<Rule, RuleError> {
        let parameter =
            ParamValue::parse(ty, value).ok_or_else(|| RuleError::BadParameter {
                rule: name.to_string(),
                ty: ty.to_string(),
                value: value.to_string(),
            })?;
        Ok(Rule {
            name: name.to_string(),
            definition: ty.to_string(),
            score: Score::ZERO,
            meta: RuleMeta {
                name: name.to_string(),
                options: Vec::new(),
                parameter: Some(parameter),
                id: 0,
            },
            code: crate::rules::no_code(),
            id: 0,
        })
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rule({} {} {})", self.name, self.definition, self.score)
    }
}

/// The seven rule lists of a ruleset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RuleListKind {
    Meld,
    Hand,
    MahJongg,
    Winner,
    Loser,
    Parameter,
    Penalty,
}

impl RuleListKind {
    pub const ALL: [RuleListKind; 7] = [
        RuleListKind::Meld,
        RuleListKind::Hand,
        RuleListKind::MahJongg,
        RuleListKind::Winner,
        RuleListKind::Loser,
        RuleListKind::Parameter,
        RuleListKind::Penalty,
    ];

    pub fn table_name(self) -> &'static str {
        match self {
            RuleListKind::Meld => "meld",
            RuleListKind::Hand => "hand",
            RuleListKind::MahJongg => "mahjongg",
            RuleListKind::Winner => "winner",
            RuleListKind::Loser => "loser",
            RuleListKind::Parameter => "parameter",
            RuleListKind::Penalty => "penalty",
        }
    }

    pub fn from_table_name(name: &str) -> Option<RuleListKind> {
        RuleListKind::ALL
            .into_iter()
            .find(|k| k.table_name() == name)
    }
}

/// Ordered rule list; adding a rule under an existing name replaces it in
/// place.
#[derive(Debug, Clone, Default)]
pub struct RuleList {
    rules: Vec<Rule>,
}

impl RuleList {
    pub fn add(&mut self, rule: Rule) {
        match self.rules.iter_mut().find(|r| r.name == rule.name) {
            Some(slot) => *slot = rule,
            None => self.rules.push(rule),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Rule> {
        let idx = self.rules.iter().position(|r| r.name == name)?;
        Some(self.rules.remove(idx))
    }

    pub fn get(&self, name: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Persistence row for one rule (composite key ruleset/list/position).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleRow {
    pub ruleset: i64,
    pub list: String,
    pub position: usize,
    pub name: String,
    pub definition: String,
    pub points: i32,
    pub doubles: u16,
    pub limits: f64,
    pub parameter: Option<String>,
}

/// A named, hashed collection of rules.
///
/// The MD5 hash over the sorted (name, definition, score) rows is the
/// ruleset's identity: two rulesets with equal hash are interchangeable, and
/// persistence reuses stored rulesets by hash.
#[derive(Debug, Clone)]
pub struct Ruleset {
    pub name: String,
    pub description: String,
    lists: [RuleList; 7],
    next_id: u32,
}

impl Ruleset {
    pub fn new(name: &str, description: &str) -> Ruleset {
        Ruleset {
            name: name.to_string(),
            description: description.to_string(),
            lists: Default::default(),
            next_id: 0,
        }
    }

    pub fn list(&self, kind: RuleListKind) -> &RuleList {
        &self.lists[kind as usize]
    }

    pub fn meld_rules(&self) -> &RuleList {
        self.list(RuleListKind::Meld)
    }

    pub fn hand_rules(&self) -> &RuleList {
        self.list(RuleListKind::Hand)
    }

    pub fn mj_rules(&self) -> &RuleList {
        self.list(RuleListKind::MahJongg)
    }

    pub fn winner_rules(&self) -> &RuleList {
        self.list(RuleListKind::Winner)
    }

    pub fn loser_rules(&self) -> &RuleList {
        self.list(RuleListKind::Loser)
    }

    pub fn parameter_rules(&self) -> &RuleList {
        self.list(RuleListKind::Parameter)
    }

    pub fn penalty_rules(&self) -> &RuleList {
        self.list(RuleListKind::Penalty)
    }

    pub fn add(&mut self, kind: RuleListKind, mut rule: Rule) -> Result<(), RuleError> {
        if kind == RuleListKind::Penalty {
            let payers = rule.meta.option_int("payers", 1) as usize;
            let payees = rule.meta.option_int("payees", 1) as usize;
            if payers == 0 || payees == 0 || payers + payees > 4 {
                return Err(RuleError::BadPenalty {
                    rule: rule.name.clone(),
                    payers,
                    payees,
                });
            }
        }
        rule.id = self.next_id;
        rule.meta.id = rule.id;
        self.next_id += 1;
        self.lists[kind as usize].add(rule);
        Ok(())
    }

    pub fn remove(&mut self, kind: RuleListKind, name: &str) -> Option<Rule> {
        self.lists[kind as usize].remove(name)
    }

    /// Every rule of every list, list-major in declaration order.
    pub fn all_rules(&self) -> impl Iterator<Item = (RuleListKind, &Rule)> {
        RuleListKind::ALL
            .into_iter()
            .flat_map(move |kind| self.list(kind).iter().map(move |r| (kind, r)))
    }

    /// MD5 over the sorted rule identities. Stable across rule order within
    /// lists, sensitive to every name, definition, score and parameter value.
    pub fn hash(&self) -> String {
        let mut rows: Vec<String> = self
            .all_rules()
            .map(|(_, r)| {
                format!(
                    "{}\x1f{}\x1f{}\x1f{}\x1f{}\x1f{}",
                    r.name,
                    r.definition,
                    r.score.points,
                    r.score.doubles,
                    r.score.limits,
                    r.meta
                        .parameter
                        .as_ref()
                        .map(ParamValue::as_text)
                        .unwrap_or_default()
                )
            })
            .collect();
        rows.sort();
        let mut hasher = Md5::new();
        for row in rows {
            hasher.update(row.as_bytes());
            hasher.update(b"\n");
        }
        format!("{:x}", hasher.finalize())
    }

    fn parameter(&self, name: &str) -> Option<&ParamValue> {
        self.parameter_rules()
            .get(name)?
            .meta
            .parameter
            .as_ref()
    }

    fn param_int(&self, name: &str, default: i64) -> i64 {
        self.parameter(name).map(ParamValue::as_int).unwrap_or(default)
    }

    fn param_bool(&self, name: &str, default: bool) -> bool {
        self.parameter(name).map(ParamValue::as_bool).unwrap_or(default)
    }

    pub fn limit(&self) -> i32 {
        self.param_int("Points for a Limit Hand", 500) as i32
    }

    pub fn roof_off(&self) -> bool {
        self.param_bool("Play with the Roof off", false)
    }

    pub fn min_mj_points(&self) -> i32 {
        self.param_int("Points Needed for Mah Jongg", 0) as i32
    }

    pub fn min_mj_doubles(&self) -> u16 {
        self.param_int("Minimum Doubles Needed for Mah Jongg", 0) as u16
    }

    pub fn max_chows(&self) -> usize {
        self.param_int("Maximum Number of Chows", 4).clamp(0, 4) as usize
    }

    pub fn min_rounds(&self) -> u32 {
        self.param_int("Minimum Number of Rounds in Game", 4).clamp(1, 4) as u32
    }

    pub fn with_bonus_tiles(&self) -> bool {
        self.param_bool("Play with Bonus Tiles", true)
    }

    pub fn must_declare_calling_hand(&self) -> bool {
        self.param_bool("Must Declare a Calling Hand", false)
    }

    /// Seconds a claim may stay unanswered in interactive play.
    pub fn claim_timeout(&self) -> u32 {
        self.param_int("Claim Timeout", 10) as u32
    }

    pub fn discard_tiles_ordered(&self) -> bool {
        self.param_bool("Arrange Discarded Tiles in Rows", false)
    }

    pub fn discard_tiles_leave_hole(&self) -> bool {
        self.param_bool("Leave Holes for Claimed Discards", false)
    }

    /// Seat-exchange encoding for rounds 2..4, e.g. `"SWEN,SE,WE"`: each
    /// comma-separated part names pairs of winds whose occupants swap.
    pub fn seat_exchange(&self) -> String {
        self.parameter("Seat Exchange")
            .map(ParamValue::as_text)
            .unwrap_or_else(|| "SWEN,SE,WE".to_string())
    }

    /// Flatten to persistence rows under the given ruleset id.
    pub fn rows(&self, ruleset_id: i64) -> Vec<RuleRow> {
        let mut rows = Vec::new();
        for kind in RuleListKind::ALL {
            for (position, rule) in self.list(kind).iter().enumerate() {
                rows.push(RuleRow {
                    ruleset: ruleset_id,
                    list: kind.table_name().to_string(),
                    position,
                    name: rule.name.clone(),
                    definition: rule.definition.clone(),
                    points: rule.score.points,
                    doubles: rule.score.doubles,
                    limits: rule.score.limits,
                    parameter: rule.meta.parameter.as_ref().map(ParamValue::as_text),
                });
            }
        }
        rows
    }

    /// Rebuild a ruleset from persistence rows, resolving every rule code.
    pub fn from_rows(
        name: &str,
        description: &str,
        rows: &[RuleRow],
        registry: &RuleRegistry,
    ) -> Result<Ruleset, RuleError> {
        let mut ruleset = Ruleset::new(name, description);
        let mut sorted: Vec<&RuleRow> = rows.iter().collect();
        sorted.sort_by_key(|r| (r.list.clone(), r.position));
        for row in sorted {
            let kind = RuleListKind::from_table_name(&row.list)
                .ok_or_else(|| RuleError::UnknownRuleset(row.list.clone()))?;
            let score = Score {
                points: row.points,
                doubles: row.doubles,
                limits: row.limits,
            };
            let rule = if kind == RuleListKind::Parameter {
                Rule::parameter(
                    &row.name,
                    &row.definition,
                    row.parameter.as_deref().unwrap_or(""),
                )?
            } else {
                let parameter = row
                    .parameter
                    .as_deref()
                    .map(|v| ParamValue::Text(v.to_string()));
                Rule::resolve(&row.name, &row.definition, score, parameter, registry)?
            };
            ruleset.add(kind, rule)?;
        }
        Ok(ruleset)
    }
}

impl PartialEq for Ruleset {
    fn eq(&self, other: &Self) -> bool {
        self.hash() == other.hash()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::RuleRegistry;

    fn registry() -> RuleRegistry {
        RuleRegistry::standard()
    }

    #[test]
    fn resolve_definition_with_options() {
        let reg = registry();
        let rule = Rule::resolve(
            "Nine Consecutive East Wins",
            "FNineEastWins||Oneedwins=9",
            Score::ZERO,
            None,
            &reg,
        )
        .unwrap();
        assert_eq!(rule.meta.option_int("needwins", 0), 9);
        assert!(Rule::resolve("x", "FNoSuchCode", Score::ZERO, None, &reg).is_err());
        assert!(Rule::resolve("x", "", Score::ZERO, None, &reg).is_err());
    }

    #[test]
    fn one_score_unit_only() {
        let reg = registry();
        let both = Score {
            points: 2,
            doubles: 1,
            limits: 0.0,
        };
        assert!(matches!(
            Rule::resolve("x", "FDragonPungKong", both, None, &reg),
            Err(RuleError::MultipleUnits(_))
        ));
    }

    #[test]
    fn list_add_replaces_by_name() {
        let reg = registry();
        let mut list = RuleList::default();
        let a = Rule::resolve("Dragon Pung", "FDragonPungKong", Score::doubles(1), None, &reg)
            .unwrap();
        let b = Rule::resolve("Dragon Pung", "FDragonPungKong", Score::doubles(2), None, &reg)
            .unwrap();
        list.add(a);
        list.add(b);
        assert_eq!(list.len(), 1);
        assert_eq!(list.get("Dragon Pung").unwrap().score.doubles, 2);
    }

    #[test]
    fn hash_invariant_under_add_then_remove() {
        let reg = registry();
        let mut rs = Ruleset::new("test", "");
        rs.add(
            RuleListKind::Meld,
            Rule::resolve("Dragon Pung", "FDragonPungKong", Score::doubles(1), None, &reg)
                .unwrap(),
        )
        .unwrap();
        let before = rs.hash();
        rs.add(
            RuleListKind::Hand,
            Rule::resolve("No Chow", "FNoChow", Score::doubles(1), None, &reg).unwrap(),
        )
        .unwrap();
        assert_ne!(before, rs.hash());
        rs.remove(RuleListKind::Hand, "No Chow");
        assert_eq!(before, rs.hash());
    }

    #[test]
    fn penalty_counts_validated() {
        let reg = registry();
        let mut rs = Ruleset::new("test", "");
        let bad = Rule::resolve(
            "False Naming of Discard",
            "FPenalty||Opayers=3 payees=2",
            Score::points(-300),
            None,
            &reg,
        )
        .unwrap();
        assert!(matches!(
            rs.add(RuleListKind::Penalty, bad),
            Err(RuleError::BadPenalty { .. })
        ));
    }

    #[test]
    fn parameter_rules_typed() {
        let limit = Rule::parameter("Points for a Limit Hand", "int", "500").unwrap();
        assert_eq!(limit.meta.parameter.as_ref().unwrap().as_int(), 500);
        assert!(Rule::parameter("x", "int", "abc").is_err());
        let mut rs = Ruleset::new("test", "");
        rs.add(RuleListKind::Parameter, limit).unwrap();
        assert_eq!(rs.limit(), 500);
        assert!(!rs.roof_off());
        assert_eq!(rs.max_chows(), 4);
    }

    #[test]
    fn rows_round_trip() {
        let reg = registry();
        let mut rs = Ruleset::new("round", "trip");
        rs.add(
            RuleListKind::Meld,
            Rule::resolve("Pair of Dragons", "FDragonPair", Score::points(2), None, &reg)
                .unwrap(),
        )
        .unwrap();
        rs.add(
            RuleListKind::Parameter,
            Rule::parameter("Points for a Limit Hand", "int", "1000").unwrap(),
        )
        .unwrap();
        let rows = rs.rows(7);
        let back = Ruleset::from_rows("round", "trip", &rows, &reg).unwrap();
        assert_eq!(rs.hash(), back.hash());
        assert_eq!(back.limit(), 1000);
    }
}
