//! In-process document implementing [`Page`].
//!
//! Holds an element tree (`html > body > ...`), a base URL for resolving
//! `src`, and a mutation observer registry.
//!
//! # Example
//!
//! ```ignore
//! let doc = MemoryDocument::new("https://example.org/series/1")?;
//! let list = doc.create_element("div");
//! doc.set_attribute(list, "name", "image-items")?;
//! doc.append_child(doc.body(), list)?;
//!
//! let img = doc.create_element("img");
//! doc.set_attribute(img, "src", "https://k01.mbxyz.org/1.webp")?;
//! doc.append_child(list, img)?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use tracing::{debug, trace};
use url::Url;

use crate::error::{Error, Result};
use crate::identifiers::{NodeId, ObserverId};

use super::{MutationCallback, MutationKind, MutationRecord, ObserveOptions, Page, Selector};

// ============================================================================
// Types
// ============================================================================

/// One element.
#[derive(Debug, Clone)]
struct Node {
    tag: String,
    attributes: FxHashMap<String, String>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attributes: FxHashMap::default(),
            parent: None,
            children: Vec::new(),
        }
    }
}

/// Element storage.
struct Tree {
    nodes: FxHashMap<NodeId, Node>,
    root: NodeId,
    body: NodeId,
}

impl Tree {
    fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes.get(&id).ok_or_else(|| Error::unknown_node(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes.get_mut(&id).ok_or_else(|| Error::unknown_node(id))
    }

    /// Pre-order walk below `root`, excluding `root`.
    fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self
            .nodes
            .get(&root)
            .map(|n| n.children.iter().rev().copied().collect())
            .unwrap_or_default();

        while let Some(id) = stack.pop() {
            out.push(id);
            if let Some(node) = self.nodes.get(&id) {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        out
    }

    fn is_inclusive_ancestor(&self, ancestor: NodeId, mut node: NodeId) -> bool {
        loop {
            if node == ancestor {
                return true;
            }
            match self.nodes.get(&node).and_then(|n| n.parent) {
                Some(parent) => node = parent,
                None => return false,
            }
        }
    }
}

/// A registered mutation watch.
#[derive(Clone)]
struct Registration {
    id: ObserverId,
    target: NodeId,
    options: ObserveOptions,
    callback: MutationCallback,
}

// ============================================================================
// MemoryDocument
// ============================================================================

/// Document held in memory, safe to share across tasks.
pub struct MemoryDocument {
    base_url: Url,
    tree: RwLock<Tree>,
    observers: Mutex<Vec<Registration>>,
    pending: Mutex<VecDeque<MutationRecord>>,
    delivering: AtomicBool,
    next_node: AtomicU64,
}

impl fmt::Debug for MemoryDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryDocument")
            .field("base_url", &self.base_url.as_str())
            .field("nodes", &self.tree.read().nodes.len())
            .field("observers", &self.observers.lock().len())
            .finish_non_exhaustive()
    }
}

impl MemoryDocument {
    /// Creates an empty `html > body` document at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Url`] if `base_url` is not an absolute URL.
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)?;

        let root = NodeId::new(1);
        let body = NodeId::new(2);
        let mut html = Node::new("html");
        html.children.push(body);
        let mut body_node = Node::new("body");
        body_node.parent = Some(root);

        let mut nodes = FxHashMap::default();
        nodes.insert(root, html);
        nodes.insert(body, body_node);

        Ok(Self {
            base_url,
            tree: RwLock::new(Tree { nodes, root, body }),
            observers: Mutex::new(Vec::new()),
            pending: Mutex::new(VecDeque::new()),
            delivering: AtomicBool::new(false),
            next_node: AtomicU64::new(3),
        })
    }

    /// Returns the document URL.
    #[inline]
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.base_url
    }

    /// Creates a detached element.
    pub fn create_element(&self, tag: &str) -> NodeId {
        let id = NodeId::new(self.next_node.fetch_add(1, Ordering::Relaxed));
        self.tree.write().nodes.insert(id, Node::new(tag));
        id
    }

    /// Returns an attribute value as written (not resolved).
    #[must_use]
    pub fn get_attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.tree
            .read()
            .nodes
            .get(&node)
            .and_then(|n| n.attributes.get(name).cloned())
    }

    /// Inserts `child` as the last child of `parent`, moving it if attached.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownNode`] for a missing node and
    /// [`Error::InvalidOptions`] if `child` is an ancestor of `parent`.
    pub fn append_child(&self, parent: NodeId, child: NodeId) -> Result<()> {
        {
            let mut tree = self.tree.write();
            tree.node(parent)?;
            let old_parent = tree.node(child)?.parent;

            if tree.is_inclusive_ancestor(child, parent) {
                return Err(Error::invalid_options(format!(
                    "cannot append {child} inside itself"
                )));
            }

            if let Some(old) = old_parent {
                tree.node_mut(old)?.children.retain(|c| *c != child);
                self.queue(MutationRecord {
                    target: old,
                    kind: MutationKind::ChildList {
                        added: vec![],
                        removed: vec![child],
                    },
                });
            }

            tree.node_mut(parent)?.children.push(child);
            tree.node_mut(child)?.parent = Some(parent);
        }

        self.queue(MutationRecord {
            target: parent,
            kind: MutationKind::ChildList {
                added: vec![child],
                removed: vec![],
            },
        });
        self.deliver();
        Ok(())
    }

    /// Detaches `child` from its parent. The node stays valid.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownNode`] for a missing node.
    pub fn remove(&self, child: NodeId) -> Result<()> {
        let parent = {
            let mut tree = self.tree.write();
            let Some(parent) = tree.node(child)?.parent else {
                return Ok(());
            };
            tree.node_mut(parent)?.children.retain(|c| *c != child);
            tree.node_mut(child)?.parent = None;
            parent
        };

        self.queue(MutationRecord {
            target: parent,
            kind: MutationKind::ChildList {
                added: vec![],
                removed: vec![child],
            },
        });
        self.deliver();
        Ok(())
    }

    /// Returns the number of active watches.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.observers.lock().len()
    }

    /// Drops every watch and pending record, as navigating away does.
    pub fn unload(&self) {
        let dropped = {
            let mut observers = self.observers.lock();
            let count = observers.len();
            observers.clear();
            count
        };
        self.pending.lock().clear();
        debug!(url = %self.base_url, observers = dropped, "Document unloaded");
    }
}

// ============================================================================
// MemoryDocument - Delivery
// ============================================================================

impl MemoryDocument {
    fn queue(&self, record: MutationRecord) {
        self.pending.lock().push_back(record);
    }

    /// Drains the queue into observers.
    ///
    /// Only one caller drains at a time; a mutation made from inside a
    /// callback or from another thread just queues. Whoever holds the flag
    /// re-checks the queue after releasing it, so no record is left behind.
    fn deliver(&self) {
        while let Some(guard) = DeliveryGuard::acquire(&self.delivering) {
            self.drain();
            if !self.release(guard) {
                break;
            }
        }
    }

    /// Releases the delivery flag. Returns `true` if records are waiting.
    fn release(&self, guard: DeliveryGuard<'_>) -> bool {
        drop(guard);
        !self.pending.lock().is_empty()
    }

    fn drain(&self) {
        loop {
            let batch: Vec<MutationRecord> = self.pending.lock().drain(..).collect();
            if batch.is_empty() {
                break;
            }

            let registrations = self.observers.lock().clone();
            for registration in registrations {
                let records: Vec<MutationRecord> = {
                    let tree = self.tree.read();
                    batch
                        .iter()
                        .filter(|record| registration.options.accepts(record))
                        .filter(|record| {
                            record.target == registration.target
                                || (registration.options.subtree
                                    && tree.is_inclusive_ancestor(
                                        registration.target,
                                        record.target,
                                    ))
                        })
                        .cloned()
                        .collect()
                };

                // A callback earlier in this round may have disconnected it.
                let still_registered = self
                    .observers
                    .lock()
                    .iter()
                    .any(|r| r.id == registration.id);

                if !records.is_empty() && still_registered {
                    trace!(observer = %registration.id, records = records.len(), "Delivering mutations");
                    (registration.callback)(&records);
                }
            }
        }
    }
}

/// Holds the delivery flag; clears it on drop, including during unwinding
/// from a panicking callback.
struct DeliveryGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> DeliveryGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        if flag.swap(true, Ordering::SeqCst) {
            None
        } else {
            Some(Self { flag })
        }
    }
}

impl Drop for DeliveryGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

// ============================================================================
// MemoryDocument - Page
// ============================================================================

impl Page for MemoryDocument {
    fn body(&self) -> NodeId {
        self.tree.read().body
    }

    fn query(&self, selector: &Selector) -> Option<NodeId> {
        let tree = self.tree.read();
        tree.descendants(tree.root).into_iter().find(|id| {
            tree.nodes
                .get(id)
                .is_some_and(|n| selector.matches(&n.tag, &n.attributes))
        })
    }

    fn descendants_by_tag(&self, root: NodeId, tag: &str) -> Vec<NodeId> {
        let tree = self.tree.read();
        tree.descendants(root)
            .into_iter()
            .filter(|id| {
                tree.nodes
                    .get(id)
                    .is_some_and(|n| n.tag.eq_ignore_ascii_case(tag))
            })
            .collect()
    }

    fn image_src(&self, node: NodeId) -> Option<String> {
        let raw = self.get_attribute(node, "src")?;
        // Unresolvable values come back verbatim, like the `src` IDL attribute.
        Some(
            self.base_url
                .join(&raw)
                .map(String::from)
                .unwrap_or(raw),
        )
    }

    fn set_attribute(&self, node: NodeId, name: &str, value: &str) -> Result<()> {
        self.tree
            .write()
            .node_mut(node)?
            .attributes
            .insert(name.to_string(), value.to_string());

        self.queue(MutationRecord {
            target: node,
            kind: MutationKind::Attributes {
                name: name.to_string(),
            },
        });
        self.deliver();
        Ok(())
    }

    fn observe(
        &self,
        target: NodeId,
        options: ObserveOptions,
        callback: MutationCallback,
    ) -> ObserverId {
        let id = ObserverId::generate();
        self.observers.lock().push(Registration {
            id,
            target,
            options,
            callback,
        });
        debug!(observer = %id, %target, "Mutation watch installed");
        id
    }

    fn disconnect(&self, observer: ObserverId) -> bool {
        let mut observers = self.observers.lock();
        let before = observers.len();
        observers.retain(|r| r.id != observer);
        before != observers.len()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use parking_lot::Mutex as ParkingMutex;

    fn doc() -> MemoryDocument {
        MemoryDocument::new("https://example.org/title/1").unwrap()
    }

    fn recorder() -> (Arc<ParkingMutex<Vec<MutationRecord>>>, MutationCallback) {
        let seen = Arc::new(ParkingMutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let callback: MutationCallback = Arc::new(move |records: &[MutationRecord]| {
            seen_clone.lock().extend_from_slice(records);
        });
        (seen, callback)
    }

    #[test]
    fn test_rejects_relative_base() {
        assert!(matches!(
            MemoryDocument::new("/relative"),
            Err(Error::Url(_))
        ));
    }

    #[test]
    fn test_query_in_document_order() {
        let doc = doc();
        let first = doc.create_element("div");
        let second = doc.create_element("div");
        doc.set_attribute(first, "name", "image-items").unwrap();
        doc.set_attribute(second, "name", "image-items").unwrap();
        doc.append_child(doc.body(), first).unwrap();
        doc.append_child(doc.body(), second).unwrap();

        assert_eq!(doc.query(&Selector::default()), Some(first));
    }

    #[test]
    fn test_query_ignores_detached() {
        let doc = doc();
        let detached = doc.create_element("div");
        doc.set_attribute(detached, "name", "image-items").unwrap();
        assert_eq!(doc.query(&Selector::default()), None);
    }

    #[test]
    fn test_descendants_by_tag_any_depth() {
        let doc = doc();
        let list = doc.create_element("div");
        let wrap = doc.create_element("a");
        let img1 = doc.create_element("IMG");
        let img2 = doc.create_element("img");
        doc.append_child(doc.body(), list).unwrap();
        doc.append_child(list, img1).unwrap();
        doc.append_child(list, wrap).unwrap();
        doc.append_child(wrap, img2).unwrap();

        assert_eq!(doc.descendants_by_tag(list, "img"), vec![img1, img2]);
    }

    #[test]
    fn test_image_src_resolves() {
        let doc = doc();
        let img = doc.create_element("img");
        doc.set_attribute(img, "src", "/static/a.png").unwrap();
        assert_eq!(
            doc.image_src(img).as_deref(),
            Some("https://example.org/static/a.png")
        );

        doc.set_attribute(img, "src", "https://k1.mbx.org/b.png").unwrap();
        assert_eq!(
            doc.image_src(img).as_deref(),
            Some("https://k1.mbx.org/b.png")
        );
    }

    #[test]
    fn test_image_src_missing() {
        let doc = doc();
        let img = doc.create_element("img");
        assert_eq!(doc.image_src(img), None);
    }

    #[test]
    fn test_subtree_observer_sees_deep_insert() {
        let doc = doc();
        let list = doc.create_element("div");
        doc.append_child(doc.body(), list).unwrap();

        let (seen, callback) = recorder();
        doc.observe(doc.body(), ObserveOptions::child_list_subtree(), callback);

        let img = doc.create_element("img");
        doc.append_child(list, img).unwrap();

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].target, list);
    }

    #[test]
    fn test_child_list_observer_ignores_attributes() {
        let doc = doc();
        let img = doc.create_element("img");
        doc.append_child(doc.body(), img).unwrap();

        let (seen, callback) = recorder();
        doc.observe(doc.body(), ObserveOptions::child_list_subtree(), callback);
        doc.set_attribute(img, "src", "x.png").unwrap();

        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_non_subtree_observer_only_sees_target() {
        let doc = doc();
        let list = doc.create_element("div");
        doc.append_child(doc.body(), list).unwrap();

        let options = ObserveOptions {
            child_list: true,
            ..Default::default()
        };
        let (seen, callback) = recorder();
        doc.observe(doc.body(), options, callback);

        doc.append_child(list, doc.create_element("img")).unwrap();
        assert!(seen.lock().is_empty());

        doc.append_child(doc.body(), doc.create_element("p")).unwrap();
        assert_eq!(seen.lock().len(), 1);
    }

    #[test]
    fn test_move_reports_removal_and_insertion() {
        let doc = doc();
        let a = doc.create_element("div");
        let b = doc.create_element("div");
        let img = doc.create_element("img");
        doc.append_child(doc.body(), a).unwrap();
        doc.append_child(doc.body(), b).unwrap();
        doc.append_child(a, img).unwrap();

        let (seen, callback) = recorder();
        doc.observe(doc.body(), ObserveOptions::child_list_subtree(), callback);
        doc.append_child(b, img).unwrap();

        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].target, a);
        assert_eq!(seen[1].target, b);
    }

    #[test]
    fn test_append_into_itself_rejected() {
        let doc = doc();
        let a = doc.create_element("div");
        let b = doc.create_element("div");
        doc.append_child(a, b).unwrap();
        assert!(doc.append_child(b, a).is_err());
    }

    #[test]
    fn test_mutation_inside_callback_is_not_reentrant() {
        let doc = Arc::new(doc());
        let depth = Arc::new(AtomicU64::new(0));
        let calls = Arc::new(AtomicU64::new(0));

        let doc_clone = Arc::clone(&doc);
        let depth_clone = Arc::clone(&depth);
        let calls_clone = Arc::clone(&calls);
        let callback: MutationCallback = Arc::new(move |_records: &[MutationRecord]| {
            assert_eq!(depth_clone.fetch_add(1, Ordering::SeqCst), 0);
            if calls_clone.fetch_add(1, Ordering::SeqCst) == 0 {
                let p = doc_clone.create_element("p");
                doc_clone.append_child(doc_clone.body(), p).unwrap();
            }
            depth_clone.fetch_sub(1, Ordering::SeqCst);
        });
        doc.observe(doc.body(), ObserveOptions::child_list_subtree(), callback);

        doc.append_child(doc.body(), doc.create_element("div")).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unload_drops_observers() {
        let doc = doc();
        let (seen, callback) = recorder();
        doc.observe(doc.body(), ObserveOptions::child_list_subtree(), callback);
        assert_eq!(doc.observer_count(), 1);

        doc.unload();
        doc.append_child(doc.body(), doc.create_element("img")).unwrap();

        assert_eq!(doc.observer_count(), 0);
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_disconnect() {
        let doc = doc();
        let (_seen, callback) = recorder();
        let id = doc.observe(doc.body(), ObserveOptions::child_list_subtree(), callback);
        assert!(doc.disconnect(id));
        assert!(!doc.disconnect(id));
    }

    #[test]
    fn test_delivery_survives_panicking_observer() {
        let doc = doc();
        let list = doc.create_element("div");
        doc.append_child(doc.body(), list).unwrap();

        let panicked = Arc::new(AtomicBool::new(false));
        let panicked_clone = Arc::clone(&panicked);
        let faulty: MutationCallback = Arc::new(move |_: &[MutationRecord]| {
            if !panicked_clone.swap(true, Ordering::SeqCst) {
                panic!("observer failure");
            }
        });
        doc.observe(doc.body(), ObserveOptions::child_list_subtree(), faulty);

        let first = doc.create_element("img");
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            doc.append_child(list, first)
        }));
        assert!(outcome.is_err());
        assert!(!doc.delivering.load(Ordering::SeqCst));

        let (seen, callback) = recorder();
        doc.observe(doc.body(), ObserveOptions::child_list_subtree(), callback);

        let second = doc.create_element("img");
        doc.append_child(list, second).unwrap();

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].target, list);
    }

    #[test]
    fn test_record_queued_while_draining_is_delivered() {
        let doc = doc();
        let (seen, callback) = recorder();
        doc.observe(doc.body(), ObserveOptions::child_list_subtree(), callback);

        // Another caller holds the flag and has just found the queue empty.
        let guard = DeliveryGuard::acquire(&doc.delivering).unwrap();

        let img = doc.create_element("img");
        doc.append_child(doc.body(), img).unwrap();
        assert!(seen.lock().is_empty());

        // Releasing reports the waiting record; the holder loops again.
        assert!(doc.release(guard));
        doc.deliver();

        assert_eq!(seen.lock().len(), 1);
        assert!(doc.pending.lock().is_empty());
    }

    #[test]
    fn test_concurrent_mutations_all_delivered() {
        let doc = Arc::new(doc());
        let (seen, callback) = recorder();
        doc.observe(doc.body(), ObserveOptions::child_list_subtree(), callback);

        let workers: Vec<_> = (0..4)
            .map(|_| {
                let doc = Arc::clone(&doc);
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        let node = doc.create_element("img");
                        doc.append_child(doc.body(), node).unwrap();
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(seen.lock().len(), 200);
        assert!(doc.pending.lock().is_empty());
        assert!(!doc.delivering.load(Ordering::SeqCst));
    }
}
