//! Error types for the image host fixer.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use bato_fixer::{Result, Settings};
//!
//! async fn example(store: &MemoryStore) -> Result<()> {
//!     let settings = Settings::load(store, &RuleSet::default()).await?;
//!     settings.save(store).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Validation | [`Error::InvalidRuleInput`], [`Error::DuplicateRule`], [`Error::RuleIndexOutOfRange`] |
//! | Configuration | [`Error::InvalidOptions`], [`Error::InvalidPattern`] |
//! | Collaborators | [`Error::Store`], [`Error::Notification`] |
//! | Document | [`Error::UnknownNode`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::Regex`], [`Error::Url`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;

use crate::identifiers::NodeId;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Validation variants render the exact text the control surface shows
/// inline, so `to_string()` is user-facing for them.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Validation Errors
    // ========================================================================
    /// Rule input is not a single letter `a`-`z`.
    #[error("Please enter single letters (a-z) only.")]
    InvalidRuleInput {
        /// Raw `from` input.
        from: String,
        /// Raw `to` input.
        to: String,
    },

    /// A rule with the same `from` letter is already persisted.
    #[error("A rule for \"{from}\" already exists.")]
    DuplicateRule {
        /// The conflicting `from` letter.
        from: char,
    },

    /// Rule position does not exist in the current list.
    #[error("Rule index {index} out of range (len {len})")]
    RuleIndexOutOfRange {
        /// Requested position.
        index: usize,
        /// Current list length.
        len: usize,
    },

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Engine options are invalid.
    #[error("Invalid options: {message}")]
    InvalidOptions {
        /// Description of the problem.
        message: String,
    },

    /// A matcher pattern failed to build.
    #[error("Invalid pattern: {message}")]
    InvalidPattern {
        /// Description of the problem.
        message: String,
    },

    // ========================================================================
    // Collaborator Errors
    // ========================================================================
    /// The key-value store rejected a read or write.
    #[error("Store error: {message}")]
    Store {
        /// Description of the store failure.
        message: String,
    },

    /// Badge notification could not be delivered.
    #[error("Notification failed: {message}")]
    Notification {
        /// Description of the delivery failure.
        message: String,
    },

    // ========================================================================
    // Document Errors
    // ========================================================================
    /// Node does not exist in the document.
    #[error("Unknown node: {node_id}")]
    UnknownNode {
        /// The missing node.
        node_id: NodeId,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Regex compilation error.
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// URL parse error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates an invalid rule input error.
    #[inline]
    pub fn invalid_rule_input(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::InvalidRuleInput {
            from: from.into(),
            to: to.into(),
        }
    }

    /// Creates a duplicate rule error.
    #[inline]
    pub fn duplicate_rule(from: char) -> Self {
        Self::DuplicateRule { from }
    }

    /// Creates a rule index error.
    #[inline]
    pub fn rule_index_out_of_range(index: usize, len: usize) -> Self {
        Self::RuleIndexOutOfRange { index, len }
    }

    /// Creates an invalid options error.
    #[inline]
    pub fn invalid_options(message: impl Into<String>) -> Self {
        Self::InvalidOptions {
            message: message.into(),
        }
    }

    /// Creates an invalid pattern error.
    #[inline]
    pub fn invalid_pattern(message: impl Into<String>) -> Self {
        Self::InvalidPattern {
            message: message.into(),
        }
    }

    /// Creates a store error.
    #[inline]
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    /// Creates a notification error.
    #[inline]
    pub fn notification(message: impl Into<String>) -> Self {
        Self::Notification {
            message: message.into(),
        }
    }

    /// Creates an unknown node error.
    #[inline]
    pub fn unknown_node(node_id: NodeId) -> Self {
        Self::UnknownNode { node_id }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this error was caused by user input.
    ///
    /// Validation errors are shown inline and never mutate state.
    #[inline]
    #[must_use]
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidRuleInput { .. }
                | Self::DuplicateRule { .. }
                | Self::RuleIndexOutOfRange { .. }
        )
    }

    /// Returns `true` if this error came from the persistence layer.
    #[inline]
    #[must_use]
    pub fn is_store_error(&self) -> bool {
        matches!(self, Self::Store { .. } | Self::Io(_) | Self::Json(_))
    }
}

// ============================================================================
// Tests
// ============================================================================
