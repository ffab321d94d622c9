/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Authoritative per-topology graph store.
//!
//! Core structures:
//! - `GraphStore`: one immutable `TopologySnapshot` per topology
//! - `TopologySnapshot`: node table plus outgoing adjacency, shared by `Arc`
//! - `DeltaOutcome`: what one delta application changed
//!
//! A delta is merged into a private copy of the current snapshot and the copy
//! replaces the old one in a single assignment. Readers holding an earlier
//! `Arc<TopologySnapshot>` keep seeing exactly what they were given.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;

use topoview_model::{Delta, Node, NodeId, TopologyId};

use crate::runtime::diagnostics::{self, CHANNEL_DELTA_APPLIED};

pub mod view;

pub use view::PresentationGraph;

/// Immutable state of one topology at one revision.
#[derive(Debug, Clone, PartialEq)]
pub struct TopologySnapshot {
    topology_id: TopologyId,
    revision: u64,
    nodes: BTreeMap<NodeId, Arc<Node>>,
    adjacency: BTreeMap<NodeId, BTreeSet<NodeId>>,
}

impl TopologySnapshot {
    pub fn empty(topology_id: impl Into<TopologyId>) -> Self {
        Self {
            topology_id: topology_id.into(),
            revision: 0,
            nodes: BTreeMap::new(),
            adjacency: BTreeMap::new(),
        }
    }

    pub fn topology_id(&self) -> &str {
        &self.topology_id
    }

    /// Incremented only when node or adjacency content changes.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id).map(Arc::as_ref)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values().map(Arc::as_ref)
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Outgoing neighbours of `id`, including forward references to ids that
    /// have not arrived yet.
    pub fn adjacency(&self, id: &str) -> Option<&BTreeSet<NodeId>> {
        self.adjacency.get(id)
    }

    pub fn adjacency_rows(&self) -> impl Iterator<Item = (&str, &BTreeSet<NodeId>)> {
        self.adjacency.iter().map(|(id, row)| (id.as_str(), row))
    }

    /// Same nodes and adjacency, ignoring revision.
    pub fn same_content(&self, other: &TopologySnapshot) -> bool {
        self.nodes == other.nodes && self.adjacency == other.adjacency
    }
}

/// Summary of one `apply_delta` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeltaOutcome {
    pub topology_id: TopologyId,
    /// Distinct ids written by `add`/`update`.
    pub merged: usize,
    /// Ids actually removed. Unknown ids are not counted.
    pub removed: usize,
    /// Adjacency references stripped because their target was removed.
    pub pruned_edges: usize,
    pub changed: bool,
    pub created_topology: bool,
    pub revision: u64,
}

#[derive(Debug, Clone, Default)]
pub struct GraphStore {
    topologies: BTreeMap<TopologyId, Arc<TopologySnapshot>>,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty topology if it does not exist. Returns `true` if created.
    pub fn ensure_topology(&mut self, topology_id: &str) -> bool {
        if self.topologies.contains_key(topology_id) {
            return false;
        }
        self.topologies.insert(
            topology_id.to_string(),
            Arc::new(TopologySnapshot::empty(topology_id)),
        );
        true
    }

    pub fn contains(&self, topology_id: &str) -> bool {
        self.topologies.contains_key(topology_id)
    }

    pub fn snapshot(&self, topology_id: &str) -> Option<Arc<TopologySnapshot>> {
        self.topologies.get(topology_id).cloned()
    }

    pub fn topology_ids(&self) -> impl Iterator<Item = &str> {
        self.topologies.keys().map(String::as_str)
    }

    pub fn node_count(&self, topology_id: &str) -> usize {
        self.topologies
            .get(topology_id)
            .map(|snapshot| snapshot.node_count())
            .unwrap_or(0)
    }

    /// Merge `delta` into `topology_id`, creating the topology if needed.
    ///
    /// `add` and `update` entries replace nodes by id in order (last write
    /// wins) together with their adjacency rows. `remove` runs afterwards and
    /// strips the removed ids from every remaining adjacency row.
    pub fn apply_delta(&mut self, topology_id: &str, delta: Delta) -> DeltaOutcome {
        let started = Instant::now();
        let created_topology = self.ensure_topology(topology_id);
        let Some(current) = self.topologies.get(topology_id).cloned() else {
            return DeltaOutcome::default();
        };

        let mut next = TopologySnapshot::clone(&current);
        let mut changed = false;
        let mut merged_ids = BTreeSet::new();

        for entry in delta.add.into_iter().chain(delta.update) {
            let id = entry.node.id.clone();
            let node_changed = next
                .nodes
                .get(&id)
                .is_none_or(|existing| **existing != entry.node);
            let adjacency_changed = next.adjacency.get(&id) != Some(&entry.adjacency);
            if node_changed {
                next.nodes.insert(id.clone(), Arc::new(entry.node));
            }
            if adjacency_changed {
                next.adjacency.insert(id.clone(), entry.adjacency);
            }
            changed |= node_changed || adjacency_changed;
            merged_ids.insert(id);
        }

        let mut removed = 0;
        let mut pruned_edges = 0;
        for id in &delta.remove {
            if next.nodes.remove(id).is_none() {
                continue;
            }
            next.adjacency.remove(id);
            removed += 1;
            for row in next.adjacency.values_mut() {
                if row.remove(id) {
                    pruned_edges += 1;
                }
            }
        }
        changed |= removed > 0;

        if changed {
            next.revision = current.revision + 1;
            self.topologies
                .insert(topology_id.to_string(), Arc::new(next));
        }

        let outcome = DeltaOutcome {
            topology_id: topology_id.to_string(),
            merged: merged_ids.len(),
            removed,
            pruned_edges,
            changed,
            created_topology,
            revision: if changed {
                current.revision + 1
            } else {
                current.revision
            },
        };

        log::debug!(
            "graph: applied delta to '{}' (merged {}, removed {}, pruned {}, changed {}, rev {})",
            outcome.topology_id,
            outcome.merged,
            outcome.removed,
            outcome.pruned_edges,
            outcome.changed,
            outcome.revision,
        );
        diagnostics::emit_message_sent(
            CHANNEL_DELTA_APPLIED,
            outcome.merged + outcome.removed,
        );
        diagnostics::emit_span_duration(
            "graph.apply_delta",
            started.elapsed().as_micros() as u64,
        );

        outcome
    }

    /// Drop every topology. Used on engine teardown.
    pub fn clear(&mut self) {
        self.topologies.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use topoview_model::DeltaNode;

    fn entry(id: &str, adjacency: &[&str]) -> DeltaNode {
        DeltaNode::new(Node::new(id).with_labels(id, "weave-1")).with_adjacency(adjacency.iter().copied())
    }

    #[test]
    fn test_apply_delta_creates_unknown_topology() {
        let mut store = GraphStore::new();
        let outcome = store.apply_delta("hosts", Delta::adding([entry("a", &[])]));

        assert!(outcome.created_topology);
        assert!(outcome.changed);
        assert_eq!(outcome.revision, 1);
        assert_eq!(store.node_count("hosts"), 1);
    }

    #[test]
    fn test_repeated_add_is_idempotent() {
        let mut store = GraphStore::new();
        store.apply_delta("containers", Delta::adding([entry("a", &["b"])]));
        let before = store.snapshot("containers").unwrap();

        let outcome = store.apply_delta("containers", Delta::adding([entry("a", &["b"])]));
        let after = store.snapshot("containers").unwrap();

        assert!(!outcome.changed);
        assert_eq!(after.revision(), before.revision());
        assert!(Arc::ptr_eq(&before, &after));
    }

    #[test]
    fn test_update_replaces_adjacency_wholesale() {
        let mut store = GraphStore::new();
        store.apply_delta("containers", Delta::adding([entry("a", &["b", "c"])]));
        store.apply_delta("containers", Delta::updating([entry("a", &["d"])]));

        let snapshot = store.snapshot("containers").unwrap();
        let row: Vec<&str> = snapshot.adjacency("a").unwrap().iter().map(String::as_str).collect();
        assert_eq!(row, vec!["d"]);
    }

    #[test]
    fn test_last_write_wins_within_one_delta() {
        let mut store = GraphStore::new();
        let delta = Delta {
            add: vec![DeltaNode::new(Node::new("a").with_labels("first", ""))],
            update: vec![DeltaNode::new(Node::new("a").with_labels("second", ""))],
            remove: vec![],
        };
        let outcome = store.apply_delta("containers", delta);

        assert_eq!(outcome.merged, 1);
        let snapshot = store.snapshot("containers").unwrap();
        assert_eq!(snapshot.node("a").unwrap().label_major, "second");
    }

    #[test]
    fn test_remove_prunes_in_same_application() {
        let mut store = GraphStore::new();
        store.apply_delta("containers", Delta::adding([entry("a", &[]), entry("b", &["a"])]));
        let before = store.snapshot("containers").unwrap();

        let outcome = store.apply_delta("containers", Delta::removing(["a"]));
        let after = store.snapshot("containers").unwrap();

        assert_eq!(outcome.removed, 1);
        assert_eq!(outcome.pruned_edges, 1);
        assert!(!after.contains("a"));
        assert!(after.adjacency("a").is_none());
        assert!(after.adjacency("b").unwrap().is_empty());
        // Earlier snapshot untouched.
        assert!(before.contains("a"));
        assert!(before.adjacency("b").unwrap().contains("a"));
    }

    #[test]
    fn test_remove_unknown_id_is_noop() {
        let mut store = GraphStore::new();
        store.apply_delta("containers", Delta::adding([entry("a", &["ghost"])]));
        let before = store.snapshot("containers").unwrap();

        let outcome = store.apply_delta("containers", Delta::removing(["ghost"]));

        assert!(!outcome.changed);
        assert_eq!(outcome.removed, 0);
        assert!(Arc::ptr_eq(&before, &store.snapshot("containers").unwrap()));
    }

    #[test]
    fn test_resurrection_carries_only_new_fields() {
        let mut store = GraphStore::new();
        store.apply_delta(
            "containers",
            Delta::adding([DeltaNode::new(
                Node::new("a").with_metadata("image", "old").with_metric("cpu", 3.0),
            )
            .with_adjacency(["b"])]),
        );
        store.apply_delta("containers", Delta::removing(["a"]));
        store.apply_delta(
            "containers",
            Delta::adding([DeltaNode::new(Node::new("a").with_metadata("pid", "9"))]),
        );

        let snapshot = store.snapshot("containers").unwrap();
        let node = snapshot.node("a").unwrap();
        assert_eq!(node.metadata.get("image"), None);
        assert_eq!(node.metadata.get("pid"), Some("9"));
        assert!(node.latest.is_empty());
        assert!(snapshot.adjacency("a").unwrap().is_empty());
    }

    #[test]
    fn test_add_then_remove_in_same_delta() {
        let mut store = GraphStore::new();
        let delta = Delta {
            add: vec![entry("a", &[]), entry("b", &["a"])],
            update: vec![],
            remove: vec!["a".into()],
        };
        store.apply_delta("containers", delta);

        let snapshot = store.snapshot("containers").unwrap();
        assert_eq!(snapshot.node_ids().collect::<Vec<_>>(), vec!["b"]);
        assert!(snapshot.adjacency("b").unwrap().is_empty());
    }

    #[test]
    fn test_clear_drops_all_topologies() {
        let mut store = GraphStore::new();
        store.apply_delta("hosts", Delta::adding([entry("h", &[])]));
        store.ensure_topology("pods");
        store.clear();

        assert_eq!(store.topology_ids().count(), 0);
        assert!(store.snapshot("hosts").is_none());
    }
}
