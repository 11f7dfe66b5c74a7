//! Rule data model.
//!
//! A [`Rule`] substitutes the leading host-label letter of an image URL.
//! A [`RuleSet`] is the ordered list persisted under the `rules` key.
//!
//! # Wire Format
//!
//! ```json
//! [{ "from": "k", "to": "n", "active": true }]
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ============================================================================
// RuleLetter
// ============================================================================

/// A single lowercase ASCII letter `a`-`z`.
///
/// This is the only guard between user input and matcher construction,
/// so every `Rule` is built from validated letters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RuleLetter(char);

impl RuleLetter {
    /// Validates a character.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRuleInput`] unless `c` is in `a..=z`.
    pub fn new(c: char) -> Result<Self> {
        if c.is_ascii_lowercase() {
            Ok(Self(c))
        } else {
            Err(Error::invalid_rule_input(c.to_string(), ""))
        }
    }

    /// Returns the letter.
    #[inline]
    #[must_use]
    pub const fn as_char(&self) -> char {
        self.0
    }
}

impl FromStr for RuleLetter {
    type Err = Error;

    /// Parses exactly one character `a`-`z`, no normalization.
    fn from_str(s: &str) -> Result<Self> {
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Self::new(c).map_err(|_| Error::invalid_rule_input(s, "")),
            _ => Err(Error::invalid_rule_input(s, "")),
        }
    }
}

impl TryFrom<String> for RuleLetter {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<RuleLetter> for String {
    fn from(letter: RuleLetter) -> Self {
        letter.0.to_string()
    }
}

impl fmt::Display for RuleLetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Rule
// ============================================================================

/// One letter-to-letter substitution, independently activatable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Letter the host label must start with.
    pub from: RuleLetter,
    /// Replacement letter.
    pub to: RuleLetter,
    /// Whether the engine applies this rule.
    pub active: bool,
}

impl Rule {
    /// Creates an active rule.
    #[inline]
    #[must_use]
    pub const fn new(from: RuleLetter, to: RuleLetter) -> Self {
        Self {
            from,
            to,
            active: true,
        }
    }

    /// Parses an active rule from two raw inputs.
    ///
    /// Inputs are trimmed and lowercased first, matching what the control
    /// surface accepts from its text fields.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRuleInput`] if either side is not one letter.
    pub fn parse(from: &str, to: &str) -> Result<Self> {
        let from_norm = from.trim().to_lowercase();
        let to_norm = to.trim().to_lowercase();

        match (from_norm.parse(), to_norm.parse()) {
            (Ok(from), Ok(to)) => Ok(Self::new(from, to)),
            _ => Err(Error::invalid_rule_input(from, to)),
        }
    }

    /// Returns the display label, e.g. `k → n`.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{} \u{2192} {}", self.from, self.to)
    }
}

// ============================================================================
// RuleSet
// ============================================================================

/// Ordered rule list. Order is application precedence.
///
/// `from` uniqueness is enforced by the control surface at add time,
/// not by this type: a deserialized list is accepted as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleSet(Vec<Rule>);

impl Default for RuleSet {
    /// The bootstrap set: a single active `k → n` rule.
    fn default() -> Self {
        Self(vec![Rule::new(RuleLetter('k'), RuleLetter('n'))])
    }
}

impl RuleSet {
    /// Creates an empty set.
    #[inline]
    #[must_use]
    pub const fn empty() -> Self {
        Self(Vec::new())
    }

    /// Returns the number of rules.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if there are no rules.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates rules in precedence order.
    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.0.iter()
    }

    /// Iterates active rules in precedence order.
    pub fn active(&self) -> impl Iterator<Item = &Rule> {
        self.0.iter().filter(|rule| rule.active)
    }

    /// Returns the rule at `index`.
    #[inline]
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Rule> {
        self.0.get(index)
    }

    /// Returns `true` if any rule starts from `letter`.
    #[must_use]
    pub fn contains_from(&self, letter: RuleLetter) -> bool {
        self.0.iter().any(|rule| rule.from == letter)
    }

    /// Appends a rule at lowest precedence.
    #[inline]
    pub fn push(&mut self, rule: Rule) {
        self.0.push(rule);
    }

    /// Removes the rule at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RuleIndexOutOfRange`] for a missing position.
    pub fn remove(&mut self, index: usize) -> Result<Rule> {
        if index >= self.0.len() {
            return Err(Error::rule_index_out_of_range(index, self.0.len()));
        }
        Ok(self.0.remove(index))
    }

    /// Sets the active flag of the rule at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RuleIndexOutOfRange`] for a missing position.
    pub fn set_active(&mut self, index: usize, active: bool) -> Result<()> {
        let len = self.0.len();
        let rule = self
            .0
            .get_mut(index)
            .ok_or_else(|| Error::rule_index_out_of_range(index, len))?;
        rule.active = active;
        Ok(())
    }

    /// Finds cyclic chains among active rules.
    ///
    /// Each cycle is reported once, starting from its smallest letter,
    /// e.g. `[k, n]` for active `k → n` and `n → k`. A rule mapping a
    /// letter to itself is a cycle of length one.
    #[must_use]
    pub fn cycles(&self) -> Vec<Vec<RuleLetter>> {
        let mut edges: FxHashMap<RuleLetter, RuleLetter> = FxHashMap::default();
        for rule in self.active() {
            edges.entry(rule.from).or_insert(rule.to);
        }

        let mut starts: Vec<RuleLetter> = edges.keys().copied().collect();
        starts.sort_unstable();

        let mut cycles = Vec::new();
        for start in starts {
            let mut chain = vec![start];
            let mut current = start;

            while let Some(&next) = edges.get(&current) {
                if next == start {
                    // Only report from the smallest member to dedupe rotations.
                    if chain.iter().all(|letter| *letter >= start) {
                        cycles.push(chain);
                    }
                    break;
                }
                if chain.contains(&next) {
                    break;
                }
                chain.push(next);
                current = next;
            }
        }

        cycles
    }
}

impl From<Vec<Rule>> for RuleSet {
    fn from(rules: Vec<Rule>) -> Self {
        Self(rules)
    }
}

impl<'a> IntoIterator for &'a RuleSet {
    type Item = &'a Rule;
    type IntoIter = std::slice::Iter<'a, Rule>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// ============================================================================
// Tests
// ============================================================================
