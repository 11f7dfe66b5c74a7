//! Rewrite engine configuration.
//!
//! Provides a type-safe interface for the page-side constants: which
//! container holds the images, which elements are rewritten, and what the
//! alternate host suffix looks like.
//!
//! # Example
//!
//! ```ignore
//! use bato_fixer::{EngineOptions, Selector};
//!
//! let options = EngineOptions::new()
//!     .with_container(Selector::id("gallery"))
//!     .with_host_suffix(r"cdn[0-9]+\.net");
//!
//! options.validate()?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use regex::Regex;

use crate::dom::Selector;
use crate::error::{Error, Result};
use crate::rules::{DEFAULT_HOST_SUFFIX, RuleSet};

// ============================================================================
// Constants
// ============================================================================

/// Tag of the elements whose `src` is rewritten.
pub const DEFAULT_IMAGE_TAG: &str = "img";

// ============================================================================
// EngineOptions
// ============================================================================

/// Page-side engine settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    /// Designated container; images outside it are never touched.
    pub container: Selector,

    /// Tag of the rewritten elements.
    pub image_tag: String,

    /// Regex fragment for the host suffix, captured verbatim.
    pub host_suffix: String,

    /// Rules used when the store holds none.
    pub default_rules: RuleSet,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl EngineOptions {
    /// Creates options with the stock constants.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            container: Selector::default(),
            image_tag: DEFAULT_IMAGE_TAG.to_string(),
            host_suffix: DEFAULT_HOST_SUFFIX.to_string(),
            default_rules: RuleSet::default(),
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl EngineOptions {
    /// Sets the designated container.
    #[inline]
    #[must_use]
    pub fn with_container(mut self, container: Selector) -> Self {
        self.container = container;
        self
    }

    /// Sets the rewritten element tag.
    #[inline]
    #[must_use]
    pub fn with_image_tag(mut self, tag: impl Into<String>) -> Self {
        self.image_tag = tag.into();
        self
    }

    /// Sets the host suffix regex fragment.
    #[inline]
    #[must_use]
    pub fn with_host_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.host_suffix = suffix.into();
        self
    }

    /// Sets the first-run rule set.
    #[inline]
    #[must_use]
    pub fn with_default_rules(mut self, rules: RuleSet) -> Self {
        self.default_rules = rules;
        self
    }
}

// ============================================================================
// Validation
// ============================================================================

impl EngineOptions {
    /// Validates the options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOptions`] for an empty tag or a host suffix
    /// that is empty or does not compile.
    pub fn validate(&self) -> Result<()> {
        if self.image_tag.trim().is_empty() {
            return Err(Error::invalid_options("image tag must not be empty"));
        }

        if self.host_suffix.is_empty() {
            return Err(Error::invalid_options("host suffix must not be empty"));
        }

        Regex::new(&self.host_suffix)
            .map_err(|e| Error::invalid_options(format!("host suffix: {e}")))?;

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
