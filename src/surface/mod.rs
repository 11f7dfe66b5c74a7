//! Control surface: the rule editor shown from the toolbar.
//!
//! Edits are persisted immediately and in full (both keys, whole list).
//! A running page engine never sees them until the page reloads, so every
//! edit raises [`SurfaceView::reload_required`].
//!
//! # Module Structure
//!
//! | Module | Description |
//! |--------|-------------|
//! | `core` | [`ControlSurface`] and its operations |
//! | `view` | [`SurfaceView`] and [`RuleRow`] |
//!
//! # Example
//!
//! ```ignore
//! let mut surface = ControlSurface::new(store, tabs);
//! surface.initialize().await?;
//!
//! surface.add_rule("a", "b").await?;
//! surface.toggle_rule(0, false).await?;
//! assert!(surface.view().reload_required);
//!
//! surface.reload().await;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::identifiers::TabId;

// ============================================================================
// Submodules
// ============================================================================

mod core;
mod view;

// ============================================================================
// Re-exports
// ============================================================================

pub use core::ControlSurface;
pub use view::{RuleRow, SurfaceView};

// ============================================================================
// TabController
// ============================================================================

/// Browser tab operations the control surface needs.
#[async_trait]
pub trait TabController: Send + Sync {
    /// Returns the active tab of the current window, if any.
    async fn active_tab(&self) -> Result<Option<TabId>>;

    /// Requests a reload of `tab`. Completion of the reload is not awaited.
    async fn reload(&self, tab: TabId) -> Result<()>;

    /// Closes the control surface window.
    fn close_surface(&self);
}

#[async_trait]
impl<T: TabController + ?Sized> TabController for Arc<T> {
    async fn active_tab(&self) -> Result<Option<TabId>> {
        (**self).active_tab().await
    }

    async fn reload(&self, tab: TabId) -> Result<()> {
        (**self).reload(tab).await
    }

    fn close_surface(&self) {
        (**self).close_surface();
    }
}
