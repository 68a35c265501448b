//! Registry of leucine-rich repeat (LRR) motif expressions.
//!
//! The built-in table holds one entry per [`LrrClass`]. It is built once, on first use, and only
//! read afterwards. Callers that need extra or replacement expressions derive a new
//! [`PatternTable`] from it with [`PatternTable::with_overrides`].

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::bytes::Regex;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::check_valid_name;
use crate::errors::*;

lazy_static! {
    static ref BUILTIN: PatternTable = PatternTable::from_specs(
        LrrClass::ALL
            .iter()
            .map(|&class| PatternSpec::from_class(class))
            .collect::<Result<Vec<_>>>()
            .unwrap_or_else(|e| panic!("{e}")),
    )
    .unwrap_or_else(|e| panic!("{e}"));
}

/// The closed set of LRR classes known to the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LrrClass {
    TpLrr,
    TpLrrRevised,
    RiLike,
    Sds22Like,
    CysteineContaining,
    Bacterial,
    Typical,
    PlantSpecific,
}

impl LrrClass {
    pub const ALL: [LrrClass; 8] = [
        LrrClass::TpLrr,
        LrrClass::TpLrrRevised,
        LrrClass::RiLike,
        LrrClass::Sds22Like,
        LrrClass::CysteineContaining,
        LrrClass::Bacterial,
        LrrClass::Typical,
        LrrClass::PlantSpecific,
    ];

    pub fn name(self) -> &'static str {
        use LrrClass::*;
        match self {
            TpLrr => "TpLRR",
            TpLrrRevised => "TpLRR-revised",
            RiLike => "RI-like",
            Sds22Like => "SDS22-like",
            CysteineContaining => "Cysteine-containing",
            Bacterial => "Bacterial",
            Typical => "Typical",
            PlantSpecific => "Plant-specific",
        }
    }

    fn expression(self) -> &'static str {
        use LrrClass::*;
        match self {
            TpLrr => r"(?:C|N).{2}L.{2}I.{1}L.{3}L.{2}I.{3}AF",
            // conserved hydrophobic positions accept any of L, V, I
            TpLrrRevised => r"[CN].{2}[LVI].{2}[LVI].{1}[LVI].{3}[LVI].{2}[LVI].{3}AF",
            RiLike => r".{3}L.{2}L.{1}L.{2}[NC].{1}L.{3}G[GAIVLMFPWC].{2}L.{2}[GAIVLMFPWC]L.{2}",
            Sds22Like => r"L.{2}L.{2}L.{1}L.{2}N.{1}I.{2}I.{2}L.{2}",
            CysteineContaining => r"C.{2}L.{2}L.{1}L.{2}C.{2}ITD.{2}[GAIVLMFPWC].{2}LA.{2}",
            Bacterial => r"P.{2}L.{2}L.{1}V.{2}N.{1}L.{2}LP.{1}L",
            Typical => r"L.{2}L.{2}L.{1}L.{2}N.{1}L.{2}LP.{2}[GAIVLMFPWC]F.{2}",
            PlantSpecific => r"L.{2}L.{2}L.{1}L.{2}N.{1}L.{3}IP.{2}LG.{1}",
        }
    }

    /// Expected repeat period in residues. Informational only.
    pub fn repeat_length(self) -> usize {
        use LrrClass::*;
        match self {
            TpLrr | TpLrrRevised => 21,
            RiLike => 28,
            Sds22Like | CysteineContaining | PlantSpecific => 22,
            Bacterial => 20,
            Typical => 24,
        }
    }

    fn description(self) -> &'static str {
        use LrrClass::*;
        match self {
            TpLrr => "TpLRR pattern (21 AA)",
            TpLrrRevised => "TpLRR pattern with L/V/I substitutions (21 AA)",
            RiLike => "RI-like pattern (28 AA)",
            Sds22Like => "SDS22-like pattern (22 AA)",
            CysteineContaining => "Cysteine-containing pattern (22 AA)",
            Bacterial => "Bacterial pattern (20 AA)",
            Typical => "Typical LRR pattern (24 AA)",
            PlantSpecific => "Plant-specific pattern (22 AA)",
        }
    }
}

impl fmt::Display for LrrClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LrrClass {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        LrrClass::ALL
            .iter()
            .find(|c| c.name() == s)
            .or_else(|| LrrClass::ALL.iter().find(|c| c.name().eq_ignore_ascii_case(s)))
            .copied()
            .ok_or_else(|| Error::UnknownPattern {
                name: s.to_owned(),
                known: known_names(LrrClass::ALL.iter().map(|c| c.name())),
            })
    }
}

/// A named, compiled motif expression.
///
/// Expressions are matched against upper-case residues, so lowercase literals in a custom
/// expression never match.
#[derive(Debug, Clone)]
pub struct PatternSpec {
    name: String,
    class: Option<LrrClass>,
    expression: String,
    repeat_length: usize,
    description: String,
    regex: Regex,
}

impl PatternSpec {
    /// Compile a caller-declared expression.
    pub fn new(
        name: impl AsRef<str>,
        expression: impl AsRef<str>,
        repeat_length: usize,
        description: impl AsRef<str>,
    ) -> Result<Self> {
        let name = name.as_ref();
        check_valid_name(name.as_bytes()).ok_or_else(|| {
            Error::Config(format!(
                "pattern name \"{name}\" must be non-empty and use only letters, digits, '-' or '_'"
            ))
        })?;

        let regex = Regex::new(expression.as_ref()).map_err(|e| Error::InvalidPattern {
            name: name.to_owned(),
            source: e,
        })?;

        Ok(Self {
            name: name.to_owned(),
            class: LrrClass::ALL.iter().find(|c| c.name() == name).copied(),
            expression: expression.as_ref().to_owned(),
            repeat_length,
            description: description.as_ref().to_owned(),
            regex,
        })
    }

    pub fn from_class(class: LrrClass) -> Result<Self> {
        Self::new(
            class.name(),
            class.expression(),
            class.repeat_length(),
            class.description(),
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The built-in class this entry is registered under, if any.
    pub fn class(&self) -> Option<LrrClass> {
        self.class
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn repeat_length(&self) -> usize {
        self.repeat_length
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    fn to_entry(&self) -> PatternEntry {
        PatternEntry {
            pattern: self.expression.clone(),
            length: self.repeat_length,
            description: self.description.clone(),
        }
    }
}

/// Serialized form of one table entry, keyed by name in a pattern file.
///
/// Pattern files are YAML mappings (JSON also parses):
/// ```text
/// Typical:
///   pattern: L.{2}L.{2}L.{1}L.{2}N.{1}L.{2}LP.{2}[GAIVLMFPWC]F.{2}
///   length: 24
///   description: Typical LRR pattern
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternEntry {
    pub pattern: String,
    pub length: usize,
    #[serde(default)]
    pub description: String,
}

/// An ordered set of uniquely named patterns.
#[derive(Debug, Clone)]
pub struct PatternTable {
    patterns: Vec<PatternSpec>,
}

impl PatternTable {
    /// The process-wide table of built-in LRR classes.
    pub fn builtin() -> &'static PatternTable {
        &BUILTIN
    }

    pub fn from_specs(patterns: impl IntoIterator<Item = PatternSpec>) -> Result<Self> {
        let patterns = patterns.into_iter().collect::<Vec<_>>();
        let mut seen = FxHashSet::default();

        for p in &patterns {
            if !seen.insert(p.name()) {
                return Err(Error::DuplicatePattern(p.name().to_owned()));
            }
        }

        Ok(Self { patterns })
    }

    pub fn lookup(&self, name: &str) -> Result<&PatternSpec> {
        self.patterns
            .iter()
            .find(|p| p.name() == name)
            .or_else(|| {
                self.patterns
                    .iter()
                    .find(|p| p.name().eq_ignore_ascii_case(name))
            })
            .ok_or_else(|| Error::UnknownPattern {
                name: name.to_owned(),
                known: known_names(self.names()),
            })
    }

    pub fn all(&self) -> &[PatternSpec] {
        &self.patterns
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(|p| p.name())
    }

    /// Resolve requested names to patterns, in request order.
    ///
    /// An empty request, or the single name `all`, selects the whole table.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<PatternSpec>> {
        if names.is_empty() || names.iter().any(|n| n.as_ref().eq_ignore_ascii_case("all")) {
            if names.len() > 1 {
                return Err(Error::Config(
                    "\"all\" cannot be combined with other pattern names".to_owned(),
                ));
            }
            return Ok(self.patterns.clone());
        }

        let mut seen = FxHashSet::default();
        let mut res = Vec::with_capacity(names.len());

        for name in names {
            let p = self.lookup(name.as_ref())?;
            if seen.insert(p.name().to_owned()) {
                res.push(p.clone());
            }
        }

        Ok(res)
    }

    /// Derive a table where `overrides` replace same-named entries and new names are appended.
    pub fn with_overrides(&self, overrides: impl IntoIterator<Item = PatternSpec>) -> Result<Self> {
        let mut patterns = self.patterns.clone();
        let mut added = FxHashSet::default();

        for o in overrides {
            if !added.insert(o.name().to_owned()) {
                return Err(Error::DuplicatePattern(o.name().to_owned()));
            }

            match patterns.iter_mut().find(|p| p.name() == o.name()) {
                Some(p) => *p = o,
                None => patterns.push(o),
            }
        }

        Self::from_specs(patterns)
    }

    /// Read pattern entries from a YAML (or JSON) mapping of name to entry.
    pub fn load_entries(file: impl AsRef<Path>) -> Result<Vec<PatternSpec>> {
        let file = file.as_ref();
        let pattern_file_err = |e: Box<dyn std::error::Error + Send + Sync>| Error::PatternFile {
            file: file.to_owned(),
            source: e,
        };

        let text = std::fs::read_to_string(file).map_err(|e| pattern_file_err(Box::new(e)))?;
        let mapping: serde_yaml::Mapping =
            serde_yaml::from_str(&text).map_err(|e| pattern_file_err(Box::new(e)))?;

        let mut res = Vec::with_capacity(mapping.len());
        for (k, v) in mapping {
            let name = k
                .as_str()
                .ok_or_else(|| pattern_file_err("pattern names must be strings".into()))?
                .to_owned();
            let entry: PatternEntry =
                serde_yaml::from_value(v).map_err(|e| pattern_file_err(Box::new(e)))?;
            res.push(PatternSpec::new(
                name,
                entry.pattern,
                entry.length,
                entry.description,
            )?);
        }

        Ok(res)
    }

    /// Render the table in the same layout [`PatternTable::load_entries`] reads.
    pub fn to_yaml(&self) -> Result<String> {
        let mut mapping = serde_yaml::Mapping::new();

        for p in &self.patterns {
            let v = serde_yaml::to_value(p.to_entry())
                .map_err(|e| Error::Config(format!("cannot render pattern table: {e}")))?;
            mapping.insert(p.name().into(), v);
        }

        serde_yaml::to_string(&mapping)
            .map_err(|e| Error::Config(format!("cannot render pattern table: {e}")))
    }
}

fn known_names<'a>(names: impl Iterator<Item = &'a str>) -> String {
    names.collect::<Vec<_>>().join(", ")
}
