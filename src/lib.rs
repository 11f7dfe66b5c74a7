//! Bato Fixer - image URL rewriting for manga reader pages.
//!
//! Image hosts of the form `https://k00.mbXXXX.org/...` frequently fail to
//! load. This library rewrites the leading letter of such hosts according
//! to a user-editable list of letter rules (`k → n` by default) and keeps
//! doing so as the reader page mutates.
//!
//! # Architecture
//!
//! The system is split the same way a browser extension is:
//!
//! - **Page engine** ([`RewriteEngine`]): runs once per page load, reads the
//!   settings, rewrites every image inside the reader container and watches
//!   the page for changes
//! - **Control surface** ([`ControlSurface`]): edits the rule list and the
//!   global switch, persisting every change immediately
//! - **Store** ([`Store`]): the only shared state between the two
//!
//! A running engine never picks up edits. The surface signals that a page
//! reload is needed instead.
//!
//! # Quick Start
//!
//! ```no_run
//! use bato_fixer::{EngineOptions, MemoryDocument, MemoryStore, Result, RewriteEngine, notify};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let store = MemoryStore::new();
//!     let page = MemoryDocument::new("https://bato.to/title/1/ch_1")?;
//!     let (notifier, mut badge) = notify::channel();
//!
//!     let handle = RewriteEngine::start(&store, page, notifier, EngineOptions::new()).await?;
//!     println!("fixed {} images", handle.fix_count());
//!
//!     if let Some(message) = badge.try_recv() {
//!         println!("badge: {message:?}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`dom`] | Page abstraction and an in-memory document |
//! | [`engine`] | Page-side rewrite engine |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`notify`] | Badge count notification channel |
//! | [`protocol`] | Runtime message types |
//! | [`rules`] | Rule model and URL matchers |
//! | [`store`] | Settings persistence |
//! | [`surface`] | Rule editor control surface |

// ============================================================================
// Modules
// ============================================================================

/// Page abstraction: element queries, attribute writes, mutation watches.
pub mod dom;

/// Page-side rewrite engine.
///
/// Use [`RewriteEngine::start`] once per page load.
pub mod engine;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers for tabs, nodes and observers.
pub mod identifiers;

/// Badge count notifications from the engine to the background context.
pub mod notify;

/// Runtime message types.
pub mod protocol;

/// Rewrite rules, rule sets and compiled matchers.
pub mod rules;

/// Key-value settings storage.
pub mod store;

/// Control surface for editing rules.
pub mod surface;

// ============================================================================
// Re-exports
// ============================================================================

// DOM types
pub use dom::{
    MemoryDocument, MutationKind, MutationRecord, ObserveOptions, Page, Selector,
};

// Engine types
pub use engine::{EngineHandle, EngineOptions, PassReport, RewriteEngine};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{NodeId, ObserverId, TabId};

// Notification types
pub use notify::{BadgeNotifier, BadgeReceiver, ChannelNotifier, NullNotifier};

// Protocol types
pub use protocol::RuntimeMessage;

// Rule types
pub use rules::{Rule, RuleLetter, RuleMatcher, RuleSet, RuleSnapshot};

// Store types
pub use store::{JsonFileStore, MemoryStore, Settings, StorageMap, Store};

// Surface types
pub use surface::{ControlSurface, RuleRow, SurfaceView, TabController};
