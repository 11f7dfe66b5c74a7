//! Key-value persistence contract.
//!
//! Both execution contexts (the page running the engine and the control
//! surface) share state only through a [`Store`]. The store is an opaque
//! async `get`/`set` mapping; it may be empty on first run.
//!
//! # Keys
//!
//! | Key | Value | Absent means |
//! |-----|-------|--------------|
//! | [`RULES_KEY`] | `[{from, to, active}]` | `[{k, n, true}]` |
//! | [`GLOBAL_ENABLED_KEY`] | `bool` | `true` |
//!
//! # Backends
//!
//! | Type | Description |
//! |------|-------------|
//! | [`MemoryStore`] | In-process map |
//! | [`JsonFileStore`] | Single JSON object file |

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::error::Result;

// ============================================================================
// Submodules
// ============================================================================

/// JSON file backend.
pub mod file;

/// In-memory backend.
pub mod memory;

/// Typed view over the two persisted keys.
pub mod settings;

// ============================================================================
// Re-exports
// ============================================================================

pub use file::JsonFileStore;
pub use memory::MemoryStore;
pub use settings::Settings;

// ============================================================================
// Constants
// ============================================================================

/// Key holding the ordered rule list.
pub const RULES_KEY: &str = "rules";

/// Key holding the global enable switch.
pub const GLOBAL_ENABLED_KEY: &str = "globalEnabled";

// ============================================================================
// Store
// ============================================================================

/// Mapping of key to stored value. Missing keys are simply absent.
pub type StorageMap = FxHashMap<String, Value>;

/// Async key-value store.
///
/// Writes are last-writer-wins per key; there are no transactions.
#[async_trait]
pub trait Store: Send + Sync {
    /// Reads the given keys. Keys with no stored value are omitted.
    async fn get(&self, keys: &[&str]) -> Result<StorageMap>;

    /// Writes every entry of `items`, leaving other keys untouched.
    async fn set(&self, items: StorageMap) -> Result<()>;
}

#[async_trait]
impl<S: Store + ?Sized> Store for Arc<S> {
    async fn get(&self, keys: &[&str]) -> Result<StorageMap> {
        (**self).get(keys).await
    }

    async fn set(&self, items: StorageMap) -> Result<()> {
        (**self).set(items).await
    }
}
