//! Rendered control surface state.

use crate::rules::{RuleLetter, RuleSet};

// ============================================================================
// RuleRow
// ============================================================================

/// One rendered rule line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleRow {
    /// Position in the list; the handle for toggle and delete.
    pub index: usize,
    /// Source letter.
    pub from: RuleLetter,
    /// Replacement letter.
    pub to: RuleLetter,
    /// Switch state.
    pub active: bool,
    /// Text shown for the rule, e.g. `k → n`.
    pub label: String,
}

// ============================================================================
// SurfaceView
// ============================================================================

/// Everything the control surface displays.
///
/// Rebuilt from the full rule list after every successful write; never
/// patched row by row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceView {
    /// Global switch position.
    pub global_enabled: bool,
    /// Rule editing region is greyed out (still editable).
    pub editing_dimmed: bool,
    /// Rule list.
    pub rows: Vec<RuleRow>,
    /// A page reload is needed for edits to take effect.
    pub reload_required: bool,
    /// Inline validation message.
    pub error: Option<String>,
    /// Warning about active rules that undo each other.
    pub cycle_warning: Option<String>,
    /// `from` text field.
    pub input_from: String,
    /// `to` text field.
    pub input_to: String,
    /// The surface has been closed.
    pub closed: bool,
}

impl Default for SurfaceView {
    fn default() -> Self {
        Self {
            global_enabled: true,
            editing_dimmed: false,
            rows: Vec::new(),
            reload_required: false,
            error: None,
            cycle_warning: None,
            input_from: String::new(),
            input_to: String::new(),
            closed: false,
        }
    }
}

impl SurfaceView {
    /// Sets the switch and the matching dimmed state.
    pub(crate) fn render_switch(&mut self, enabled: bool) {
        self.global_enabled = enabled;
        self.editing_dimmed = !enabled;
    }

    /// Replaces every row from `rules`.
    pub(crate) fn render_rules(&mut self, rules: &RuleSet) {
        self.rows = rules
            .iter()
            .enumerate()
            .map(|(index, rule)| RuleRow {
                index,
                from: rule.from,
                to: rule.to,
                active: rule.active,
                label: rule.label(),
            })
            .collect();

        self.cycle_warning = cycle_warning(rules);
    }
}

fn cycle_warning(rules: &RuleSet) -> Option<String> {
    let cycles = rules.cycles();
    if cycles.is_empty() {
        return None;
    }

    let described: Vec<String> = cycles
        .iter()
        .map(|cycle| {
            let mut letters: Vec<String> = cycle.iter().map(ToString::to_string).collect();
            if let Some(first) = cycle.first() {
                letters.push(first.to_string());
            }
            letters.join(" \u{2192} ")
        })
        .collect();

    Some(format!(
        "Active rules loop back on themselves: {}",
        described.join(", ")
    ))
}

// ============================================================================
// Tests
// ============================================================================
