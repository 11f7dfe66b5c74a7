//! URL matchers built from rules.
//!
//! A rule `from → to` becomes the pattern
//! `https://{from}(\d+)\.({host_suffix})` rewritten to
//! `https://{to}$digits.$host`. Only the first occurrence in the string is
//! replaced and anything around the match is left untouched.
//!
//! The host suffix defaults to [`DEFAULT_HOST_SUFFIX`] (`mb\w+\.org`).
//! Character classes are ASCII so matching agrees byte-for-byte with the
//! pages' own URL scheme.

// ============================================================================
// Imports
// ============================================================================

use std::borrow::Cow;

use regex::Regex;

use crate::error::{Error, Result};

use super::rule::{Rule, RuleLetter, RuleSet};

// ============================================================================
// Constants
// ============================================================================

/// Host suffix of the alternate image subdomains: `mb` + word chars + `.org`.
pub const DEFAULT_HOST_SUFFIX: &str = r"mb[A-Za-z0-9_]+\.org";

// ============================================================================
// RuleMatcher
// ============================================================================

/// Compiled matcher for one rule.
#[derive(Debug, Clone)]
pub struct RuleMatcher {
    from: RuleLetter,
    to: RuleLetter,
    regex: Regex,
    replacement: String,
}

impl RuleMatcher {
    /// Builds a matcher for `rule` against the given host suffix fragment.
    ///
    /// The letters are interpolated without escaping; [`RuleLetter`]
    /// guarantees they are `a`-`z`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Regex`] if `host_suffix` is not a valid fragment.
    pub fn new(rule: &Rule, host_suffix: &str) -> Result<Self> {
        let pattern = format!(
            r"https://{}(?P<digits>[0-9]+)\.(?P<host>{})",
            rule.from, host_suffix
        );
        let regex = Regex::new(&pattern)?;

        Ok(Self {
            from: rule.from,
            to: rule.to,
            regex,
            replacement: format!("https://{}${{digits}}.${{host}}", rule.to),
        })
    }

    /// Returns the source letter.
    #[inline]
    #[must_use]
    pub fn from(&self) -> RuleLetter {
        self.from
    }

    /// Returns the replacement letter.
    #[inline]
    #[must_use]
    pub fn to(&self) -> RuleLetter {
        self.to
    }

    /// Returns `true` if `url` contains a match.
    #[inline]
    #[must_use]
    pub fn is_match(&self, url: &str) -> bool {
        self.regex.is_match(url)
    }

    /// Rewrites the first match in `url`; borrows when nothing matched.
    #[inline]
    pub fn rewrite<'a>(&self, url: &'a str) -> Cow<'a, str> {
        self.regex.replacen(url, 1, self.replacement.as_str())
    }
}

// ============================================================================
// RuleSnapshot
// ============================================================================

/// Matchers for the active rules of a [`RuleSet`], in precedence order.
///
/// Taken once at engine startup; later edits to the stored set do not
/// reach an existing snapshot.
#[derive(Debug, Clone, Default)]
pub struct RuleSnapshot {
    matchers: Vec<RuleMatcher>,
}

impl RuleSnapshot {
    /// Compiles every active rule of `rules`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`] if a matcher fails to build.
    pub fn compile(rules: &RuleSet, host_suffix: &str) -> Result<Self> {
        let matchers = rules
            .active()
            .map(|rule| {
                RuleMatcher::new(rule, host_suffix).map_err(|e| {
                    Error::invalid_pattern(format!("rule {}: {e}", rule.label()))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { matchers })
    }

    /// Returns the number of active matchers.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.matchers.len()
    }

    /// Returns `true` if no rule is active.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }

    /// Applies every matcher in order, each to the output of the previous.
    ///
    /// Rules compound: `a → b` followed by `b → c` turns an `a` host into `c`.
    #[must_use]
    pub fn rewrite(&self, url: &str) -> String {
        let mut current = url.to_string();
        for matcher in &self.matchers {
            if let Cow::Owned(next) = matcher.rewrite(&current) {
                current = next;
            }
        }
        current
    }
}

// ============================================================================
// Tests
// ============================================================================
