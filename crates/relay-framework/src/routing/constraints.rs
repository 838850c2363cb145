//! Parameter constraints.
//!
//! A constraint is a regular expression a captured parameter must match in
//! full. Constraints live at three levels, most specific first: the route, its
//! enclosing groups, and the registrar-wide table held by [`Constraints`].

use std::collections::BTreeMap;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::PatternError;

/// Digits only.
pub const NUMERIC: &str = "[0-9]+";
/// ASCII letters only.
pub const ALPHA: &str = "[a-zA-Z]+";
/// ASCII letters and digits.
pub const ALPHA_NUMERIC: &str = "[a-zA-Z0-9]+";
/// A hyphenated UUID.
pub const UUID: &str =
    "[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}";

/// Builds a constraint accepting exactly one of `values`.
pub fn one_of<I, S>(values: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    values
        .into_iter()
        .map(|v| regex::escape(v.as_ref()))
        .collect::<Vec<_>>()
        .join("|")
}

/// Compiles `regex` anchored on both ends, as used for a single parameter.
///
/// The constraint is also embedded in the whole-pattern regex, so anchors and
/// named capture groups are rejected here.
pub(crate) fn compile_anchored(param: &str, regex: &str) -> Result<Regex, PatternError> {
    let invalid = |reason: String| PatternError::InvalidConstraintRegex {
        param: param.to_string(),
        regex: regex.to_string(),
        reason,
    };
    let compiled = Regex::new(&format!("^(?:{regex})$")).map_err(|e| invalid(e.to_string()))?;
    if compiled.capture_names().flatten().next().is_some() {
        return Err(invalid("named capture groups are not allowed".to_string()));
    }
    if has_anchor(regex) {
        return Err(invalid(
            r"constraints are anchored already; remove `^`, `$`, `\A` or `\z`".to_string(),
        ));
    }
    Ok(compiled)
}

/// Finds `^`, `$`, `\A` or `\z` outside a character class.
fn has_anchor(regex: &str) -> bool {
    let mut chars = regex.chars();
    let mut class_depth = 0usize;
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                let escaped = chars.next();
                if class_depth == 0 && matches!(escaped, Some('A' | 'z')) {
                    return true;
                }
            }
            '[' => {
                class_depth += 1;
                // `[^` negates and a leading `]` is literal
                if chars.clone().next() == Some('^') {
                    chars.next();
                }
                if chars.clone().next() == Some(']') {
                    chars.next();
                }
            }
            ']' if class_depth > 0 => class_depth -= 1,
            '^' | '$' if class_depth == 0 => return true,
            _ => {}
        }
    }
    false
}

/// A validated `parameter name → regex` table.
///
/// Used both as the registrar-wide table and as the per-route and per-group
/// maps. Iteration order is stable, which keeps cache artifacts deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Constraints {
    map: BTreeMap<String, String>,
}

impl Constraints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the constraint for `param`.
    ///
    /// The regex is compiled once here so that a bad constraint fails at
    /// registration rather than when the first route using it is compiled.
    pub fn insert(
        &mut self,
        param: impl Into<String>,
        regex: impl Into<String>,
    ) -> Result<(), PatternError> {
        let param = param.into();
        let regex = regex.into();
        compile_anchored(&param, &regex)?;
        self.map.insert(param, regex);
        Ok(())
    }

    /// Inserts without validation. Callers validate when the pattern compiles.
    pub(crate) fn insert_unchecked(&mut self, param: String, regex: String) {
        self.map.insert(param, regex);
    }

    pub fn get(&self, param: &str) -> Option<&str> {
        self.map.get(param).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Shallow merge: entries in `other` override entries in `self`.
    pub fn merged_with(&self, other: &Constraints) -> Constraints {
        let mut map = self.map.clone();
        map.extend(other.map.iter().map(|(k, v)| (k.clone(), v.clone())));
        Constraints { map }
    }
}

impl<K, V> FromIterator<(K, V)> for Constraints
where
    K: Into<String>,
    V: Into<String>,
{
    /// Collects without validation; compile the pattern to validate.
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            map: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
