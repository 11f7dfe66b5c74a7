//! Runtime message types.
//!
//! The page context never calls into the badge owner directly; it posts
//! a message on the extension runtime channel and moves on.
//!
//! | Message | Direction | Purpose |
//! |---------|-----------|---------|
//! | `updateBadge` | Page → Background | Cumulative fix count since page load |
//!
//! # Format
//!
//! ```json
//! { "type": "updateBadge", "count": 3 }
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

// ============================================================================
// RuntimeMessage
// ============================================================================

/// A message sent over the runtime channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RuntimeMessage {
    /// Fixes applied since page load.
    UpdateBadge {
        /// Cumulative count, never decreasing within one page load.
        count: u64,
    },
}

impl RuntimeMessage {
    /// Creates a badge update.
    #[inline]
    #[must_use]
    pub const fn update_badge(count: u64) -> Self {
        Self::UpdateBadge { count }
    }

    /// Returns the message type as it appears on the wire.
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::UpdateBadge { .. } => "updateBadge",
        }
    }

    /// Serializes to a JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Json`] if serialization fails.
    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Parses a received JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Json`] for unknown types or bad fields.
    pub fn from_value(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }
}

// ============================================================================
// Tests
// ============================================================================
