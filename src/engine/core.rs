//! Core rewrite engine.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, info, trace, warn};

use crate::dom::{MutationCallback, MutationRecord, ObserveOptions, Page};
use crate::error::Result;
use crate::identifiers::ObserverId;
use crate::notify::BadgeNotifier;
use crate::protocol::RuntimeMessage;
use crate::rules::{RuleSet, RuleSnapshot};
use crate::store::{Settings, Store};

use super::EngineOptions;

// ============================================================================
// Types
// ============================================================================

/// Outcome of one scan-and-fix pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Whether the designated container was present.
    pub container_found: bool,
    /// Images inspected.
    pub images: usize,
    /// Images whose source changed in this pass.
    pub fixed: u64,
    /// Fix counter after this pass.
    pub total_fixed: u64,
}

// ============================================================================
// RewriteEngine
// ============================================================================

/// Page-side engine: holds the rule snapshot and the fix counter.
///
/// One instance lives for one page load. The counter is a field of the
/// instance, so a new page load means a new engine and a fresh count.
pub struct RewriteEngine<P, N> {
    page: P,
    notifier: N,
    options: EngineOptions,
    snapshot: RuleSnapshot,
    fix_count: AtomicU64,
}

impl<P, N> fmt::Debug for RewriteEngine<P, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RewriteEngine")
            .field("container", &self.options.container)
            .field("active_rules", &self.snapshot.len())
            .field("fix_count", &self.fix_count.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl<P: Page, N: BadgeNotifier> RewriteEngine<P, N> {
    /// Creates an engine with a snapshot of `rules`.
    ///
    /// No scan runs and no watch is installed; see [`Self::start`].
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidOptions`] or
    /// [`crate::Error::InvalidPattern`] if the matchers cannot be built.
    pub fn new(page: P, notifier: N, options: EngineOptions, rules: &RuleSet) -> Result<Self> {
        options.validate()?;
        let snapshot = RuleSnapshot::compile(rules, &options.host_suffix)?;

        Ok(Self {
            page,
            notifier,
            options,
            snapshot,
            fix_count: AtomicU64::new(0),
        })
    }

    /// Returns the cumulative number of fixed images since creation.
    #[inline]
    #[must_use]
    pub fn fix_count(&self) -> u64 {
        self.fix_count.load(Ordering::Acquire)
    }

    /// Returns the page this engine works on.
    #[inline]
    #[must_use]
    pub fn page(&self) -> &P {
        &self.page
    }

    /// Returns the number of active rules in the snapshot.
    #[inline]
    #[must_use]
    pub fn active_rules(&self) -> usize {
        self.snapshot.len()
    }

    /// Applies the snapshot to one URL.
    #[inline]
    #[must_use]
    pub fn rewrite(&self, url: &str) -> String {
        self.snapshot.rewrite(url)
    }

    /// Runs one scan-and-fix pass over the designated container.
    ///
    /// A missing container is a no-op. When at least one image changed,
    /// the new cumulative count is posted to the badge; a failed post is
    /// logged and otherwise ignored.
    pub fn scan_and_fix(&self) -> PassReport {
        let Some(container) = self.page.query(&self.options.container) else {
            trace!(container = %self.options.container, "Container absent, skipping pass");
            return PassReport {
                total_fixed: self.fix_count(),
                ..PassReport::default()
            };
        };

        let images = self
            .page
            .descendants_by_tag(container, &self.options.image_tag);
        let mut fixed = 0u64;

        for &image in &images {
            let Some(current) = self.page.image_src(image) else {
                continue;
            };

            let rewritten = self.snapshot.rewrite(&current);
            if rewritten == current {
                continue;
            }

            match self.page.set_attribute(image, "src", &rewritten) {
                Ok(()) => {
                    fixed += 1;
                    debug!(%image, from = %current, to = %rewritten, "Fixed image source");
                }
                Err(e) => warn!(%image, error = %e, "Failed to update image source"),
            }
        }

        let total_fixed = if fixed > 0 {
            let total = self.fix_count.fetch_add(fixed, Ordering::AcqRel) + fixed;
            if let Err(e) = self.notifier.notify(RuntimeMessage::update_badge(total)) {
                warn!(error = %e, total, "Badge update not delivered");
            }
            total
        } else {
            self.fix_count()
        };

        debug!(images = images.len(), fixed, total_fixed, "Scan pass complete");

        PassReport {
            container_found: true,
            images: images.len(),
            fixed,
            total_fixed,
        }
    }
}

impl<P, N> RewriteEngine<P, N>
where
    P: Page + 'static,
    N: BadgeNotifier + 'static,
{
    /// Runs the startup contract against `store` and `page`.
    ///
    /// Reads settings once. When globally disabled, returns
    /// [`EngineHandle::Inert`] without touching the page. Otherwise takes
    /// the rule snapshot, runs a pass immediately and installs a
    /// child-list/subtree watch on `<body>` that re-runs the pass.
    ///
    /// # Errors
    ///
    /// Returns store read failures and option/pattern errors. The page is
    /// untouched on error.
    pub async fn start<S: Store + ?Sized>(
        store: &S,
        page: P,
        notifier: N,
        options: EngineOptions,
    ) -> Result<EngineHandle<P, N>> {
        options.validate()?;
        let settings = Settings::load(store, &options.default_rules).await?;

        if !settings.global_enabled {
            info!("Globally disabled, engine stays inert for this page");
            return Ok(EngineHandle::Inert);
        }

        for cycle in settings.rules.cycles() {
            let chain: Vec<String> = cycle.iter().map(ToString::to_string).collect();
            warn!(
                cycle = %chain.join(" -> "),
                "Active rules form a cycle; applying in list order"
            );
        }

        let engine = Arc::new(Self::new(page, notifier, options, &settings.rules)?);
        let report = engine.scan_and_fix();
        let observer = engine.watch();

        info!(
            active_rules = engine.active_rules(),
            fixed = report.fixed,
            %observer,
            "Rewrite engine started"
        );

        Ok(EngineHandle::Running { engine, observer })
    }

    /// Installs the mutation watch on `<body>`.
    ///
    /// Only child-list changes are watched, so the engine's own `src`
    /// writes never trigger another pass.
    pub fn watch(self: &Arc<Self>) -> ObserverId {
        let engine = Arc::clone(self);
        let callback: MutationCallback = Arc::new(move |records: &[MutationRecord]| {
            trace!(records = records.len(), "Subtree changed, rescanning");
            engine.scan_and_fix();
        });

        self.page.observe(
            self.page.body(),
            ObserveOptions::child_list_subtree(),
            callback,
        )
    }
}

// ============================================================================
// EngineHandle
// ============================================================================

/// Result of [`RewriteEngine::start`].
///
/// A running engine is kept alive by its watch until the page unloads or
/// [`EngineHandle::stop`] is called.
pub enum EngineHandle<P, N> {
    /// Globally disabled at startup: no pass ran and no watch exists.
    Inert,
    /// Snapshot taken and watch installed.
    Running {
        /// The engine instance.
        engine: Arc<RewriteEngine<P, N>>,
        /// The installed watch.
        observer: ObserverId,
    },
}

impl<P, N> fmt::Debug for EngineHandle<P, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inert => f.write_str("EngineHandle::Inert"),
            Self::Running { engine, observer } => f
                .debug_struct("EngineHandle::Running")
                .field("engine", engine)
                .field("observer", observer)
                .finish(),
        }
    }
}

impl<P: Page, N: BadgeNotifier> EngineHandle<P, N> {
    /// Returns `true` if the engine is running.
    #[inline]
    #[must_use]
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running { .. })
    }

    /// Returns the engine, if running.
    #[inline]
    #[must_use]
    pub fn engine(&self) -> Option<&Arc<RewriteEngine<P, N>>> {
        match self {
            Self::Inert => None,
            Self::Running { engine, .. } => Some(engine),
        }
    }

    /// Returns the fix counter; zero when inert.
    #[inline]
    #[must_use]
    pub fn fix_count(&self) -> u64 {
        self.engine().map_or(0, |engine| engine.fix_count())
    }

    /// Disconnects the watch.
    pub fn stop(self) {
        if let Self::Running { engine, observer } = self {
            let removed = engine.page.disconnect(observer);
            debug!(%observer, removed, "Rewrite engine stopped");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
