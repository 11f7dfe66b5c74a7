//! Rewrite rules and their compiled matchers.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`RuleLetter`] | Validated `a`-`z` letter |
//! | [`Rule`] | `from → to` substitution with an active flag |
//! | [`RuleSet`] | Ordered, persisted rule list |
//! | [`RuleMatcher`] | Regex built from one rule |
//! | [`RuleSnapshot`] | Active matchers frozen for one page lifetime |

// ============================================================================
// Submodules
// ============================================================================

/// URL matchers built from rules.
pub mod matcher;

/// Rule data model.
pub mod rule;

// ============================================================================
// Re-exports
// ============================================================================

pub use matcher::{DEFAULT_HOST_SUFFIX, RuleMatcher, RuleSnapshot};
pub use rule::{Rule, RuleLetter, RuleSet};
