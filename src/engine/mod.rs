//! Page-side rewrite engine.
//!
//! The engine reads settings once per page load, takes a snapshot of the
//! active rules and keeps the designated container's images rewritten as
//! the page mutates.
//!
//! # Lifecycle
//!
//! ```text
//! start ─► Settings::load ─► globalEnabled == false ─► Inert (no pass, no watch)
//!                        └─► snapshot ─► scan_and_fix ─► watch(body, childList+subtree)
//!                                                              │
//!                                              every mutation ─┴─► scan_and_fix
//! ```
//!
//! # Example
//!
//! ```ignore
//! let (notifier, badge) = bato_fixer::notify::channel();
//! let handle = RewriteEngine::start(&store, page, notifier, EngineOptions::new()).await?;
//! println!("fixed so far: {}", handle.fix_count());
//! ```

// ============================================================================
// Submodules
// ============================================================================

mod core;
mod options;

// ============================================================================
// Re-exports
// ============================================================================

pub use core::{EngineHandle, PassReport, RewriteEngine};
pub use options::{DEFAULT_IMAGE_TAG, EngineOptions};
