/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! petgraph projection of a snapshot for presentation layers.
//!
//! Only resolved edges are materialized: an adjacency entry whose target has
//! not arrived yet stays in the snapshot but is left out here.

use std::collections::HashMap;

use petgraph::Directed;
use petgraph::stable_graph::{NodeIndex, StableGraph};
use petgraph::visit::EdgeRef;

use topoview_model::NodeId;

use super::TopologySnapshot;

pub type ViewNodeKey = NodeIndex;

#[derive(Debug, Clone)]
pub struct PresentationGraph {
    revision: u64,
    inner: StableGraph<NodeId, (), Directed>,
    index_by_id: HashMap<NodeId, ViewNodeKey>,
}

impl PresentationGraph {
    pub fn from_snapshot(snapshot: &TopologySnapshot) -> Self {
        let mut inner = StableGraph::with_capacity(snapshot.node_count(), 0);
        let mut index_by_id = HashMap::with_capacity(snapshot.node_count());
        for id in snapshot.node_ids() {
            let key = inner.add_node(id.to_string());
            index_by_id.insert(id.to_string(), key);
        }
        for (source, row) in snapshot.adjacency_rows() {
            let Some(&from) = index_by_id.get(source) else {
                continue;
            };
            for target in row {
                if let Some(&to) = index_by_id.get(target) {
                    inner.add_edge(from, to, ());
                }
            }
        }
        Self {
            revision: snapshot.revision(),
            inner,
            index_by_id,
        }
    }

    /// Revision of the snapshot this view was built from.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    pub fn key_of(&self, id: &str) -> Option<ViewNodeKey> {
        self.index_by_id.get(id).copied()
    }

    pub fn id_of(&self, key: ViewNodeKey) -> Option<&str> {
        self.inner.node_weight(key).map(String::as_str)
    }

    /// Outgoing neighbours, sorted by id.
    pub fn neighbors(&self, id: &str) -> Vec<&str> {
        let Some(key) = self.key_of(id) else {
            return Vec::new();
        };
        let mut ids: Vec<&str> = self
            .inner
            .edges(key)
            .filter_map(|edge| self.id_of(edge.target()))
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn contains_edge(&self, from: &str, to: &str) -> bool {
        match (self.key_of(from), self.key_of(to)) {
            (Some(a), Some(b)) => self.inner.contains_edge(a, b),
            _ => false,
        }
    }

    /// Edges as `(source, target)` id pairs, sorted.
    pub fn edges(&self) -> Vec<(&str, &str)> {
        let mut edges: Vec<(&str, &str)> = self
            .inner
            .edge_indices()
            .filter_map(|edge| {
                let (a, b) = self.inner.edge_endpoints(edge)?;
                Some((self.id_of(a)?, self.id_of(b)?))
            })
            .collect();
        edges.sort_unstable();
        edges
    }
}
