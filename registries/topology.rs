/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use topoview_model::TopologyId;

use crate::error::EngineError;
use crate::graph::GraphStore;
use crate::runtime::diagnostics::{
    self, CHANNEL_TOPOLOGY_AUTO_REGISTERED, CHANNEL_TOPOLOGY_UNKNOWN,
};

pub const DEFAULT_TOPOLOGY: &str = "containers";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct TopologyEntry {
    options: BTreeSet<String>,
}

/// One row of `list_available`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopologySummary {
    pub id: TopologyId,
    pub has_nodes: bool,
    pub node_count: usize,
    pub active: bool,
    pub options: Vec<String>,
}

/// Named topologies, the active one, and each topology's filter options.
#[derive(Debug, Clone)]
pub struct TopologyRegistry {
    entries: BTreeMap<TopologyId, TopologyEntry>,
    active: TopologyId,
}

impl TopologyRegistry {
    /// Registry with `default_topology` registered and active.
    pub fn new(default_topology: &str) -> Self {
        let mut registry = Self {
            entries: BTreeMap::new(),
            active: default_topology.to_string(),
        };
        registry.register(default_topology);
        registry
    }

    /// Idempotent. Returns `true` when the id was new. Blank ids are never
    /// registered.
    pub fn register(&mut self, id: &str) -> bool {
        if id.trim().is_empty() {
            log::debug!("registry: ignoring blank topology id");
            return false;
        }
        if self.entries.contains_key(id) {
            return false;
        }
        self.entries.insert(id.to_string(), TopologyEntry::default());
        true
    }

    /// Register a topology first referenced by something other than an
    /// explicit registration (a delta, an option change).
    pub(crate) fn auto_register(&mut self, id: &str) {
        if self.register(id) {
            log::debug!("registry: auto-registered topology '{id}'");
            diagnostics::emit_report(CHANNEL_TOPOLOGY_AUTO_REGISTERED, id);
        }
    }

    pub fn is_registered(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn active(&self) -> &str {
        &self.active
    }

    /// Switch the active topology. Returns whether the active id changed.
    pub fn set_active(&mut self, id: &str) -> Result<bool, EngineError> {
        if !self.is_registered(id) {
            log::warn!("registry: refused switch to unknown topology '{id}'");
            diagnostics::emit_report(CHANNEL_TOPOLOGY_UNKNOWN, id);
            return Err(EngineError::UnknownTopology(id.to_string()));
        }
        if self.active == id {
            return Ok(false);
        }
        self.active = id.to_string();
        Ok(true)
    }

    pub fn list_available(&self, store: &GraphStore) -> Vec<TopologySummary> {
        self.entries
            .iter()
            .map(|(id, entry)| {
                let node_count = store.node_count(id);
                TopologySummary {
                    id: id.clone(),
                    has_nodes: node_count > 0,
                    node_count,
                    active: *id == self.active,
                    options: entry.options.iter().cloned().collect(),
                }
            })
            .collect()
    }

    pub fn options(&self, id: &str) -> Option<&BTreeSet<String>> {
        self.entries.get(id).map(|entry| &entry.options)
    }

    /// Enable or disable one filter option. Returns whether the set changed.
    pub fn set_option(&mut self, id: &str, option: &str, enabled: bool) -> Result<bool, EngineError> {
        let entry = self
            .entries
            .get_mut(id)
            .ok_or_else(|| EngineError::UnknownTopology(id.to_string()))?;
        Ok(if enabled {
            entry.options.insert(option.to_string())
        } else {
            entry.options.remove(option)
        })
    }

    /// Replace the whole option set of a registered topology.
    pub fn replace_options(&mut self, id: &str, options: BTreeSet<String>) -> Result<bool, EngineError> {
        let entry = self
            .entries
            .get_mut(id)
            .ok_or_else(|| EngineError::UnknownTopology(id.to_string()))?;
        if entry.options == options {
            return Ok(false);
        }
        entry.options = options;
        Ok(true)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for TopologyRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_TOPOLOGY)
    }
}
