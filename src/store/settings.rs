//! Typed view over the persisted keys.
//!
//! Reads normalize first-run and malformed state to the documented
//! defaults. Writes always carry both keys and the whole rule list.

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::Result;
use crate::rules::{Rule, RuleSet};

use super::{GLOBAL_ENABLED_KEY, RULES_KEY, StorageMap, Store};

// ============================================================================
// Settings
// ============================================================================

/// Rule list plus global switch, as read from or written to a [`Store`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Ordered rule list.
    pub rules: RuleSet,
    /// Global enable switch.
    pub global_enabled: bool,
}

impl Settings {
    /// Reads both keys in one `get` and applies defaults.
    ///
    /// # Errors
    ///
    /// Propagates store read failures.
    pub async fn load<S: Store + ?Sized>(store: &S, default_rules: &RuleSet) -> Result<Self> {
        let mut data = store.get(&[RULES_KEY, GLOBAL_ENABLED_KEY]).await?;

        let global_enabled = global_enabled_from(data.get(GLOBAL_ENABLED_KEY));
        let rules = rules_from(data.remove(RULES_KEY), default_rules);

        debug!(rules = rules.len(), global_enabled, "Loaded settings");

        Ok(Self {
            rules,
            global_enabled,
        })
    }

    /// Reads only the rule list, applying the default when absent.
    ///
    /// # Errors
    ///
    /// Propagates store read failures.
    pub async fn load_rules<S: Store + ?Sized>(
        store: &S,
        default_rules: &RuleSet,
    ) -> Result<RuleSet> {
        let mut data = store.get(&[RULES_KEY]).await?;
        Ok(rules_from(data.remove(RULES_KEY), default_rules))
    }

    /// Writes the full rule list and the switch in one `set`.
    ///
    /// # Errors
    ///
    /// Propagates serialization and store write failures.
    pub async fn save<S: Store + ?Sized>(&self, store: &S) -> Result<()> {
        let mut items = StorageMap::default();
        items.insert(RULES_KEY.to_string(), serde_json::to_value(&self.rules)?);
        items.insert(
            GLOBAL_ENABLED_KEY.to_string(),
            Value::Bool(self.global_enabled),
        );

        store.set(items).await?;

        debug!(
            rules = self.rules.len(),
            global_enabled = self.global_enabled,
            "Saved settings"
        );
        Ok(())
    }
}

// ============================================================================
// Normalization
// ============================================================================

/// Only an explicit `false` disables; absent or anything else is enabled.
fn global_enabled_from(value: Option<&Value>) -> bool {
    !matches!(value, Some(Value::Bool(false)))
}

/// Absent or `null` falls back to defaults. An empty list is kept as-is.
///
/// Malformed entries are skipped one by one so a single bad rule does not
/// cost the user the rest of the list. A value that is not a list at all
/// falls back to defaults.
fn rules_from(value: Option<Value>, default_rules: &RuleSet) -> RuleSet {
    let entries = match value {
        None | Some(Value::Null) => return default_rules.clone(),
        Some(Value::Array(entries)) => entries,
        Some(other) => {
            warn!(value = %other, "Stored rules are not a list, using defaults");
            return default_rules.clone();
        }
    };

    let rules: Vec<Rule> = entries
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            serde_json::from_value::<Rule>(entry.clone())
                .inspect_err(|e| warn!(index, entry = %entry, error = %e, "Skipping malformed rule"))
                .ok()
        })
        .collect();

    RuleSet::from(rules)
}

// ============================================================================
// Tests
// ============================================================================
