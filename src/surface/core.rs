//! Control surface operations.

use std::fmt;

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::identifiers::TabId;
use crate::rules::{Rule, RuleSet};
use crate::store::{Settings, Store};

use super::{SurfaceView, TabController};

// ============================================================================
// ControlSurface
// ============================================================================

/// Rule editor bound to a store and the browser's tabs.
///
/// The in-memory list is a render cache. Conflict-sensitive checks (the
/// duplicate `from` check on add) re-read the store first.
pub struct ControlSurface<S, T> {
    store: S,
    tabs: T,
    default_rules: RuleSet,
    rules: RuleSet,
    view: SurfaceView,
}

impl<S, T> fmt::Debug for ControlSurface<S, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlSurface")
            .field("rules", &self.rules)
            .field("view", &self.view)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// ControlSurface - Constructor & Accessors
// ============================================================================

impl<S: Store, T: TabController> ControlSurface<S, T> {
    /// Creates an uninitialized surface.
    #[must_use]
    pub fn new(store: S, tabs: T) -> Self {
        let default_rules = RuleSet::default();
        Self {
            store,
            tabs,
            rules: default_rules.clone(),
            default_rules,
            view: SurfaceView::default(),
        }
    }

    /// Overrides the rules assumed when the store holds none.
    #[must_use]
    pub fn with_default_rules(mut self, rules: RuleSet) -> Self {
        self.rules = rules.clone();
        self.default_rules = rules;
        self
    }

    /// Returns what is currently displayed.
    #[inline]
    #[must_use]
    pub fn view(&self) -> &SurfaceView {
        &self.view
    }

    /// Returns the cached rule list.
    #[inline]
    #[must_use]
    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }
}

// ============================================================================
// ControlSurface - Operations
// ============================================================================

impl<S: Store, T: TabController> ControlSurface<S, T> {
    /// Loads settings and renders the switch and rule list.
    ///
    /// # Errors
    ///
    /// Returns store read failures; the view is left as it was.
    pub async fn initialize(&mut self) -> Result<()> {
        let settings = Settings::load(&self.store, &self.default_rules)
            .await
            .inspect_err(|e| warn!(error = %e, "Failed to load settings"))?;

        self.view.render_switch(settings.global_enabled);
        self.view.render_rules(&settings.rules);
        self.rules = settings.rules;

        info!(
            rules = self.rules.len(),
            global_enabled = self.view.global_enabled,
            "Control surface initialized"
        );
        Ok(())
    }

    /// Flips the global switch.
    ///
    /// # Errors
    ///
    /// Returns store write failures; the switch keeps its old position.
    pub async fn toggle_global(&mut self, enabled: bool) -> Result<()> {
        debug!(enabled, "Toggling global switch");
        self.persist(self.rules.clone(), enabled).await
    }

    /// Sets the active flag of the rule at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RuleIndexOutOfRange`] or store write failures.
    pub async fn toggle_rule(&mut self, index: usize, active: bool) -> Result<()> {
        debug!(index, active, "Toggling rule");

        let mut next = self.rules.clone();
        next.set_active(index, active)?;
        self.persist(next, self.view.global_enabled).await
    }

    /// Removes the rule at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RuleIndexOutOfRange`] or store write failures.
    pub async fn delete_rule(&mut self, index: usize) -> Result<()> {
        debug!(index, "Deleting rule");

        let mut next = self.rules.clone();
        next.remove(index)?;
        self.persist(next, self.view.global_enabled).await
    }

    /// Replaces the contents of the two input fields.
    pub fn set_inputs(&mut self, from: impl Into<String>, to: impl Into<String>) {
        self.view.input_from = from.into();
        self.view.input_to = to.into();
    }

    /// Validates the input fields and appends an active rule.
    ///
    /// The duplicate check runs against a fresh read of the store (and the
    /// cached list), and the new list is built on that fresh read so edits
    /// made elsewhere are kept.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidRuleInput`] unless both fields are one letter
    /// - [`Error::DuplicateRule`] if the `from` letter is taken
    /// - store read/write failures
    ///
    /// Validation errors are also shown in [`SurfaceView::error`].
    pub async fn submit_rule(&mut self) -> Result<()> {
        self.view.error = None;

        let rule = match Rule::parse(&self.view.input_from, &self.view.input_to) {
            Ok(rule) => rule,
            Err(e) => return Err(self.show_error(e)),
        };

        let stored = Settings::load_rules(&self.store, &self.default_rules)
            .await
            .inspect_err(|e| warn!(error = %e, "Failed to re-read rules before add"))?;

        if stored.contains_from(rule.from) || self.rules.contains_from(rule.from) {
            return Err(self.show_error(Error::duplicate_rule(rule.from.as_char())));
        }

        let mut next = stored;
        next.push(rule);
        self.persist(next, self.view.global_enabled).await?;

        self.view.input_from.clear();
        self.view.input_to.clear();

        info!(rule = %rule.label(), "Rule added");
        Ok(())
    }

    /// Fills the input fields and submits them.
    ///
    /// # Errors
    ///
    /// See [`Self::submit_rule`].
    pub async fn add_rule(&mut self, from: &str, to: &str) -> Result<()> {
        self.set_inputs(from, to);
        self.submit_rule().await
    }

    /// Reloads the active tab and closes the surface.
    ///
    /// The surface closes even when there is no active tab or the reload
    /// request fails. Returns the tab a reload was requested for.
    pub async fn reload(&mut self) -> Option<TabId> {
        let tab = match self.tabs.active_tab().await {
            Ok(tab) => tab,
            Err(e) => {
                warn!(error = %e, "Failed to query active tab");
                None
            }
        };

        if let Some(tab) = tab
            && let Err(e) = self.tabs.reload(tab).await
        {
            warn!(tab_id = %tab, error = %e, "Tab reload request failed");
        }

        self.tabs.close_surface();
        self.view.closed = true;

        debug!(tab_id = ?tab.map(|t| t.as_u32()), "Control surface closed");
        tab
    }
}

// ============================================================================
// ControlSurface - Internal
// ============================================================================

impl<S: Store, T: TabController> ControlSurface<S, T> {
    /// Writes the whole list and the switch, then re-renders.
    ///
    /// On failure nothing in memory or on screen changes.
    async fn persist(&mut self, rules: RuleSet, global_enabled: bool) -> Result<()> {
        let settings = Settings {
            rules,
            global_enabled,
        };

        if let Err(e) = settings.save(&self.store).await {
            warn!(error = %e, "Failed to persist settings, keeping last state");
            return Err(e);
        }

        self.view.render_switch(settings.global_enabled);
        self.view.render_rules(&settings.rules);
        self.view.reload_required = true;
        self.rules = settings.rules;
        Ok(())
    }

    fn show_error(&mut self, error: Error) -> Error {
        debug!(error = %error, "Rejected rule input");
        self.view.error = Some(error.to_string());
        error
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;

    use crate::store::{GLOBAL_ENABLED_KEY, MemoryStore, RULES_KEY, StorageMap};

    #[derive(Default)]
    struct FakeTabs {
        active: Option<TabId>,
        fail_reload: bool,
        reloaded: Mutex<Vec<TabId>>,
        closed: AtomicBool,
    }

    #[async_trait]
    impl TabController for FakeTabs {
        async fn active_tab(&self) -> Result<Option<TabId>> {
            Ok(self.active)
        }

        async fn reload(&self, tab: TabId) -> Result<()> {
            if self.fail_reload {
                return Err(std::io::Error::other("tab closed").into());
            }
            self.reloaded.lock().push(tab);
            Ok(())
        }

        fn close_surface(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    /// Memory store whose writes can be switched off.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        fail_reads: AtomicBool,
        fail_writes: AtomicBool,
    }

    #[async_trait]
    impl Store for FlakyStore {
        async fn get(&self, keys: &[&str]) -> Result<StorageMap> {
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(Error::store("read rejected"));
            }
            self.inner.get(keys).await
        }

        async fn set(&self, items: StorageMap) -> Result<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(Error::store("write rejected"));
            }
            self.inner.set(items).await
        }
    }

    fn surface(store: &Arc<MemoryStore>) -> ControlSurface<Arc<MemoryStore>, Arc<FakeTabs>> {
        ControlSurface::new(Arc::clone(store), Arc::new(FakeTabs::default()))
    }

    fn labels(view: &SurfaceView) -> Vec<&str> {
        view.rows.iter().map(|row| row.label.as_str()).collect()
    }

    #[tokio::test]
    async fn test_initialize_first_run() {
        let store = Arc::new(MemoryStore::new());
        let mut surface = surface(&store);
        surface.initialize().await.unwrap();

        let view = surface.view();
        assert!(view.global_enabled);
        assert!(!view.editing_dimmed);
        assert!(!view.reload_required);
        assert_eq!(labels(view), vec!["k → n"]);
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_initialize_globally_off_dims_editor() {
        let store = Arc::new(MemoryStore::with_entries([(GLOBAL_ENABLED_KEY, json!(false))]));
        let mut surface = surface(&store);
        surface.initialize().await.unwrap();

        assert!(!surface.view().global_enabled);
        assert!(surface.view().editing_dimmed);
    }

    #[tokio::test]
    async fn test_toggle_global_writes_both_keys() {
        let store = Arc::new(MemoryStore::new());
        let mut surface = surface(&store);
        surface.initialize().await.unwrap();

        surface.toggle_global(false).await.unwrap();

        assert_eq!(store.peek(GLOBAL_ENABLED_KEY), Some(json!(false)));
        assert_eq!(
            store.peek(RULES_KEY),
            Some(json!([{ "from": "k", "to": "n", "active": true }]))
        );
        assert!(surface.view().editing_dimmed);
        assert!(surface.view().reload_required);
    }

    #[tokio::test]
    async fn test_toggle_rule_persists_full_list() {
        let store = Arc::new(MemoryStore::new());
        let mut surface = surface(&store);
        surface.initialize().await.unwrap();
        surface.add_rule("a", "b").await.unwrap();

        surface.toggle_rule(0, false).await.unwrap();

        assert_eq!(
            store.peek(RULES_KEY),
            Some(json!([
                { "from": "k", "to": "n", "active": false },
                { "from": "a", "to": "b", "active": true }
            ]))
        );
        assert!(!surface.view().rows[0].active);
        assert!(surface.view().reload_required);
    }

    #[tokio::test]
    async fn test_delete_rule_rerenders() {
        let store = Arc::new(MemoryStore::new());
        let mut surface = surface(&store);
        surface.initialize().await.unwrap();
        surface.add_rule("a", "b").await.unwrap();

        surface.delete_rule(0).await.unwrap();

        assert_eq!(labels(surface.view()), vec!["a → b"]);
        assert_eq!(surface.view().rows[0].index, 0);
        assert_eq!(
            store.peek(RULES_KEY),
            Some(json!([{ "from": "a", "to": "b", "active": true }]))
        );
    }

    #[tokio::test]
    async fn test_delete_out_of_range_writes_nothing() {
        let store = Arc::new(MemoryStore::new());
        let mut surface = surface(&store);
        surface.initialize().await.unwrap();

        let err = surface.delete_rule(5).await.unwrap_err();

        assert!(matches!(err, Error::RuleIndexOutOfRange { index: 5, len: 1 }));
        assert_eq!(store.write_count(), 0);
        assert!(!surface.view().reload_required);
    }

    #[tokio::test]
    async fn test_add_rule_appends_active_and_clears_inputs() {
        let store = Arc::new(MemoryStore::new());
        let mut surface = surface(&store);
        surface.initialize().await.unwrap();

        surface.add_rule(" A", "b ").await.unwrap();

        let view = surface.view();
        assert_eq!(labels(view), vec!["k → n", "a → b"]);
        assert!(view.rows[1].active);
        assert!(view.input_from.is_empty());
        assert!(view.input_to.is_empty());
        assert!(view.reload_required);
        assert_eq!(view.error, None);
        assert_eq!(store.peek(GLOBAL_ENABLED_KEY), Some(json!(true)));
    }

    #[tokio::test]
    async fn test_add_multi_char_rejected_without_write() {
        let store = Arc::new(MemoryStore::new());
        let mut surface = surface(&store);
        surface.initialize().await.unwrap();

        let err = surface.add_rule("ab", "n").await.unwrap_err();

        assert!(matches!(err, Error::InvalidRuleInput { .. }));
        assert_eq!(
            surface.view().error.as_deref(),
            Some("Please enter single letters (a-z) only.")
        );
        assert_eq!(store.write_count(), 0);
        assert_eq!(surface.view().input_from, "ab");
    }

    #[tokio::test]
    async fn test_add_non_letter_rejected() {
        let store = Arc::new(MemoryStore::new());
        let mut surface = surface(&store);
        surface.initialize().await.unwrap();

        for (from, to) in [("1", "n"), ("k", ""), ("", ""), ("é", "n")] {
            assert!(surface.add_rule(from, to).await.is_err());
        }
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_add_duplicate_rejected() {
        let store = Arc::new(MemoryStore::new());
        let mut surface = surface(&store);
        surface.initialize().await.unwrap();
        surface.toggle_global(true).await.unwrap();
        let before = store.peek(RULES_KEY);
        let writes = store.write_count();

        let err = surface.add_rule("K", "x").await.unwrap_err();

        assert!(matches!(err, Error::DuplicateRule { from: 'k' }));
        assert_eq!(
            surface.view().error.as_deref(),
            Some("A rule for \"k\" already exists.")
        );
        assert_eq!(store.peek(RULES_KEY), before);
        assert_eq!(store.write_count(), writes);
    }

    #[tokio::test]
    async fn test_add_checks_fresh_store_state() {
        let store = Arc::new(MemoryStore::new());
        let mut first = surface(&store);
        let mut second = surface(&store);
        first.initialize().await.unwrap();
        second.initialize().await.unwrap();

        first.add_rule("a", "b").await.unwrap();

        // `second` still renders the stale list but must see `a` in the store.
        let err = second.add_rule("a", "c").await.unwrap_err();
        assert!(matches!(err, Error::DuplicateRule { from: 'a' }));

        // And a different add keeps the rule `first` wrote.
        second.add_rule("q", "r").await.unwrap();
        assert_eq!(
            store.peek(RULES_KEY),
            Some(json!([
                { "from": "k", "to": "n", "active": true },
                { "from": "a", "to": "b", "active": true },
                { "from": "q", "to": "r", "active": true }
            ]))
        );
    }

    #[tokio::test]
    async fn test_error_cleared_on_next_submit() {
        let store = Arc::new(MemoryStore::new());
        let mut surface = surface(&store);
        surface.initialize().await.unwrap();

        assert!(surface.add_rule("kk", "n").await.is_err());
        assert!(surface.view().error.is_some());

        surface.add_rule("z", "y").await.unwrap();
        assert_eq!(surface.view().error, None);
    }

    #[tokio::test]
    async fn test_editing_allowed_while_globally_off() {
        let store = Arc::new(MemoryStore::with_entries([(GLOBAL_ENABLED_KEY, json!(false))]));
        let mut surface = surface(&store);
        surface.initialize().await.unwrap();

        surface.add_rule("a", "b").await.unwrap();

        assert_eq!(surface.view().rows.len(), 2);
        assert_eq!(store.peek(GLOBAL_ENABLED_KEY), Some(json!(false)));
        assert!(surface.view().editing_dimmed);
    }

    #[tokio::test]
    async fn test_edit_after_bad_entry_keeps_valid_rules() {
        let store = Arc::new(MemoryStore::with_entries([(
            RULES_KEY,
            json!([
                { "from": "a", "to": "b", "active": true },
                { "from": "K", "to": "n", "active": true }
            ]),
        )]));
        let mut surface = surface(&store);
        surface.initialize().await.unwrap();

        surface.add_rule("q", "r").await.unwrap();

        assert_eq!(
            store.peek(RULES_KEY),
            Some(json!([
                { "from": "a", "to": "b", "active": true },
                { "from": "q", "to": "r", "active": true }
            ]))
        );
    }

    #[tokio::test]
    async fn test_write_failure_keeps_last_state() {
        let store = Arc::new(FlakyStore::default());
        let mut surface = ControlSurface::new(Arc::clone(&store), FakeTabs::default());
        surface.initialize().await.unwrap();
        let before = surface.view().clone();

        store.fail_writes.store(true, Ordering::SeqCst);

        assert!(surface.toggle_global(false).await.unwrap_err().is_store_error());
        assert!(surface.delete_rule(0).await.is_err());
        assert!(surface.add_rule("a", "b").await.is_err());

        assert_eq!(surface.view().rows, before.rows);
        assert_eq!(surface.view().global_enabled, before.global_enabled);
        assert!(!surface.view().reload_required);
        assert_eq!(surface.rules(), &RuleSet::default());
    }

    #[tokio::test]
    async fn test_read_failure_on_initialize_keeps_view() {
        let store = Arc::new(FlakyStore::default());
        store.fail_reads.store(true, Ordering::SeqCst);
        let mut surface = ControlSurface::new(Arc::clone(&store), FakeTabs::default());

        assert!(surface.initialize().await.is_err());
        assert_eq!(surface.view(), &SurfaceView::default());
    }

    #[tokio::test]
    async fn test_reload_active_tab_and_close() {
        let tabs = Arc::new(FakeTabs {
            active: Some(TabId::new(9)),
            ..Default::default()
        });
        let mut surface = ControlSurface::new(MemoryStore::new(), Arc::clone(&tabs));

        assert_eq!(surface.reload().await, Some(TabId::new(9)));
        assert_eq!(*tabs.reloaded.lock(), vec![TabId::new(9)]);
        assert!(tabs.closed.load(Ordering::SeqCst));
        assert!(surface.view().closed);
    }

    #[tokio::test]
    async fn test_reload_without_tab_still_closes() {
        let tabs = Arc::new(FakeTabs::default());
        let mut surface = ControlSurface::new(MemoryStore::new(), Arc::clone(&tabs));

        assert_eq!(surface.reload().await, None);
        assert!(tabs.reloaded.lock().is_empty());
        assert!(tabs.closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_reload_failure_still_closes() {
        let tabs = Arc::new(FakeTabs {
            active: Some(TabId::new(2)),
            fail_reload: true,
            ..Default::default()
        });
        let mut surface = ControlSurface::new(MemoryStore::new(), Arc::clone(&tabs));

        assert_eq!(surface.reload().await, Some(TabId::new(2)));
        assert!(tabs.closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_cycle_warning_after_add() {
        let store = Arc::new(MemoryStore::new());
        let mut surface = surface(&store);
        surface.initialize().await.unwrap();

        surface.add_rule("n", "k").await.unwrap();

        assert!(surface.view().cycle_warning.is_some());
        surface.toggle_rule(1, false).await.unwrap();
        assert!(surface.view().cycle_warning.is_none());
    }
}
