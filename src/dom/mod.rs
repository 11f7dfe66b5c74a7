//! Host page model.
//!
//! The engine never touches a concrete DOM. It talks to a [`Page`], which
//! exposes exactly what a scan pass and a mutation watch need.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Page`] | Query, read/write `src`, observe subtree changes |
//! | [`Selector`] | Element locator |
//! | [`MutationRecord`] | One change delivered to observers |
//! | [`ObserveOptions`] | What a watch listens to |
//! | [`MemoryDocument`] | In-process document implementing [`Page`] |
//!
//! # Delivery Model
//!
//! Mutation callbacks are serialized: records produced while a callback is
//! running are queued and delivered after it returns, never re-entrantly.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use crate::error::Result;
use crate::identifiers::{NodeId, ObserverId};

// ============================================================================
// Submodules
// ============================================================================

/// In-process document.
pub mod document;

/// Element selectors.
pub mod selector;

// ============================================================================
// Re-exports
// ============================================================================

pub use document::MemoryDocument;
pub use selector::Selector;

// ============================================================================
// Mutation Types
// ============================================================================

/// What changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationKind {
    /// Children were inserted into or removed from the target.
    ChildList {
        /// Inserted nodes.
        added: Vec<NodeId>,
        /// Removed nodes.
        removed: Vec<NodeId>,
    },
    /// An attribute of the target changed.
    Attributes {
        /// Attribute name.
        name: String,
    },
}

/// One mutation, reported against the node whose children or attributes
/// changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    /// Node that changed.
    pub target: NodeId,
    /// Kind of change.
    pub kind: MutationKind,
}

impl MutationRecord {
    /// Returns `true` for child list changes.
    #[inline]
    #[must_use]
    pub fn is_child_list(&self) -> bool {
        matches!(self.kind, MutationKind::ChildList { .. })
    }
}

/// What a mutation watch listens to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObserveOptions {
    /// Report child insertions and removals.
    pub child_list: bool,
    /// Report attribute changes.
    pub attributes: bool,
    /// Include every descendant of the target, not just the target.
    pub subtree: bool,
}

impl ObserveOptions {
    /// Structural changes at any depth; attribute writes are ignored.
    #[inline]
    #[must_use]
    pub const fn child_list_subtree() -> Self {
        Self {
            child_list: true,
            attributes: false,
            subtree: true,
        }
    }

    /// Returns `true` if a record of this kind is wanted.
    #[inline]
    #[must_use]
    pub fn accepts(&self, record: &MutationRecord) -> bool {
        match record.kind {
            MutationKind::ChildList { .. } => self.child_list,
            MutationKind::Attributes { .. } => self.attributes,
        }
    }
}

/// Callback invoked with each batch of records.
pub type MutationCallback = Arc<dyn Fn(&[MutationRecord]) + Send + Sync>;

// ============================================================================
// Page
// ============================================================================

/// A live document the engine can scan, rewrite and watch.
///
/// All operations are synchronous; a scan pass runs to completion without
/// yielding.
pub trait Page: Send + Sync {
    /// Returns the `<body>` element.
    fn body(&self) -> NodeId;

    /// Returns the first element in document order matching `selector`.
    fn query(&self, selector: &Selector) -> Option<NodeId>;

    /// Returns every descendant of `root` with tag `tag`, in document order.
    fn descendants_by_tag(&self, root: NodeId, tag: &str) -> Vec<NodeId>;

    /// Returns the element's `src`, resolved against the document URL.
    ///
    /// `None` if the node is unknown or has no `src`.
    fn image_src(&self, node: NodeId) -> Option<String>;

    /// Sets an attribute.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::UnknownNode`] if `node` does not exist.
    fn set_attribute(&self, node: NodeId, name: &str, value: &str) -> Result<()>;

    /// Starts a mutation watch on `target`.
    fn observe(
        &self,
        target: NodeId,
        options: ObserveOptions,
        callback: MutationCallback,
    ) -> ObserverId;

    /// Stops a watch. Returns `false` if it was not registered.
    fn disconnect(&self, observer: ObserverId) -> bool;
}

impl<P: Page + ?Sized> Page for Arc<P> {
    fn body(&self) -> NodeId {
        (**self).body()
    }

    fn query(&self, selector: &Selector) -> Option<NodeId> {
        (**self).query(selector)
    }

    fn descendants_by_tag(&self, root: NodeId, tag: &str) -> Vec<NodeId> {
        (**self).descendants_by_tag(root, tag)
    }

    fn image_src(&self, node: NodeId) -> Option<String> {
        (**self).image_src(node)
    }

    fn set_attribute(&self, node: NodeId, name: &str, value: &str) -> Result<()> {
        (**self).set_attribute(node, name, value)
    }

    fn observe(
        &self,
        target: NodeId,
        options: ObserveOptions,
        callback: MutationCallback,
    ) -> ObserverId {
        (**self).observe(target, options, callback)
    }

    fn disconnect(&self, observer: ObserverId) -> bool {
        (**self).disconnect(observer)
    }
}

// ============================================================================
// Tests
// ============================================================================
