//! Element selectors.
//!
//! A small subset of CSS: enough to name the designated container and
//! the elements inside it.
//!
//! # Example
//!
//! ```ignore
//! use bato_fixer::dom::Selector;
//!
//! // Attribute match on a tag (the default image container)
//! let list: Selector = r#"div[name="image-items"]"#.parse()?;
//!
//! // By ID
//! let gallery = Selector::id("gallery");
//!
//! // By tag name
//! let images = Selector::tag("img");
//! ```

use std::fmt;
use std::str::FromStr;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ============================================================================
// Selector Enum
// ============================================================================

/// Element locator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", content = "value")]
pub enum Selector {
    /// Element ID (`#id`).
    #[serde(rename = "id")]
    Id(String),

    /// Tag name (`div`).
    #[serde(rename = "tag")]
    Tag(String),

    /// Class name, single class (`.gallery`).
    #[serde(rename = "class")]
    Class(String),

    /// Exact attribute value, optionally restricted to a tag
    /// (`div[name="image-items"]`).
    #[serde(rename = "attribute")]
    Attribute {
        /// Required tag, if any.
        tag: Option<String>,
        /// Attribute name.
        name: String,
        /// Required attribute value.
        value: String,
    },
}

impl Default for Selector {
    /// The image list container: `div[name="image-items"]`.
    fn default() -> Self {
        Self::attribute(Some("div"), "name", "image-items")
    }
}

impl Selector {
    /// Creates an ID selector.
    #[inline]
    pub fn id(id: impl Into<String>) -> Self {
        Self::Id(id.into())
    }

    /// Creates a tag name selector.
    #[inline]
    pub fn tag(tag: impl Into<String>) -> Self {
        Self::Tag(tag.into())
    }

    /// Creates a class name selector.
    #[inline]
    pub fn class(class: impl Into<String>) -> Self {
        Self::Class(class.into())
    }

    /// Creates an attribute selector.
    #[inline]
    pub fn attribute(
        tag: Option<&str>,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::Attribute {
            tag: tag.map(str::to_string),
            name: name.into(),
            value: value.into(),
        }
    }

    /// Returns `true` if an element with this tag and attributes matches.
    ///
    /// Tag comparison is ASCII case-insensitive, like HTML.
    #[must_use]
    pub fn matches(&self, tag: &str, attributes: &FxHashMap<String, String>) -> bool {
        match self {
            Self::Id(id) => attributes.get("id").is_some_and(|v| v == id),
            Self::Tag(expected) => expected.eq_ignore_ascii_case(tag),
            Self::Class(class) => attributes
                .get("class")
                .is_some_and(|v| v.split_ascii_whitespace().any(|c| c == class)),
            Self::Attribute {
                tag: expected_tag,
                name,
                value,
            } => {
                expected_tag
                    .as_deref()
                    .is_none_or(|t| t.eq_ignore_ascii_case(tag))
                    && attributes.get(name).is_some_and(|v| v == value)
            }
        }
    }
}

// ============================================================================
// Parsing
// ============================================================================

impl FromStr for Selector {
    type Err = Error;

    /// Parses `#id`, `.class`, `tag`, `[name="value"]` or `tag[name="value"]`.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let invalid = || Error::invalid_options(format!("unsupported selector: {s:?}"));

        if let Some(id) = s.strip_prefix('#') {
            return is_ident(id).then(|| Self::id(id)).ok_or_else(invalid);
        }

        if let Some(class) = s.strip_prefix('.') {
            return is_ident(class).then(|| Self::class(class)).ok_or_else(invalid);
        }

        let Some(open) = s.find('[') else {
            return is_ident(s).then(|| Self::tag(s)).ok_or_else(invalid);
        };

        let tag = &s[..open];
        let inner = s[open + 1..].strip_suffix(']').ok_or_else(invalid)?;
        let (name, raw_value) = inner.split_once('=').ok_or_else(invalid)?;
        let value = unquote(raw_value.trim()).ok_or_else(invalid)?;
        let name = name.trim();

        if !is_ident(name) || (!tag.is_empty() && !is_ident(tag)) {
            return Err(invalid());
        }

        Ok(Self::attribute(
            (!tag.is_empty()).then_some(tag),
            name,
            value,
        ))
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "#{id}"),
            Self::Tag(tag) => write!(f, "{tag}"),
            Self::Class(class) => write!(f, ".{class}"),
            Self::Attribute { tag, name, value } => {
                write!(f, "{}[{name}=\"{value}\"]", tag.as_deref().unwrap_or(""))
            }
        }
    }
}

fn is_ident(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn unquote(s: &str) -> Option<&str> {
    s.strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .or_else(|| s.strip_prefix('\'').and_then(|rest| rest.strip_suffix('\'')))
        .or_else(|| is_ident(s).then_some(s))
}

// ============================================================================
// Tests
// ============================================================================
