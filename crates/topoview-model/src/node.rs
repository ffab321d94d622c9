/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Topology node as reported by host agents.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::NodeId;
use crate::metadata::Metadata;

/// Describes an action a node exposes (restart, attach, exec...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlDescriptor {
    #[serde(default)]
    pub human: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub rank: i32,
}

/// A single node of one topology.
///
/// Everything except `id` is optional on the wire. A node replaces its
/// previous version wholesale; fields are never merged across versions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    #[serde(default)]
    pub label_major: String,
    #[serde(default)]
    pub label_minor: String,
    #[serde(default)]
    pub rank: String,
    #[serde(default)]
    pub metadata: Metadata,
    /// Most recent sample per metric name.
    #[serde(default)]
    pub latest: BTreeMap<String, f64>,
    #[serde(default)]
    pub controls: BTreeMap<String, ControlDescriptor>,
    /// Ids of lower-level nodes this node aggregates.
    #[serde(default)]
    pub origins: Vec<NodeId>,
}

impl Node {
    pub fn new(id: impl Into<NodeId>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn with_labels(mut self, major: impl Into<String>, minor: impl Into<String>) -> Self {
        self.label_major = major.into();
        self.label_minor = minor.into();
        self
    }

    pub fn with_rank(mut self, rank: impl Into<String>) -> Self {
        self.rank = rank.into();
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key, value);
        self
    }

    pub fn with_metric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.latest.insert(name.into(), value);
        self
    }

    /// Metric names in the fixed order used for cycling.
    pub fn metric_names(&self) -> impl Iterator<Item = &str> {
        self.latest.keys().map(String::as_str)
    }

    pub fn has_metrics(&self) -> bool {
        !self.latest.is_empty()
    }
}
