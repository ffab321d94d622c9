/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Incremental topology updates.
//!
//! A [`Delta`] carries `add`, `update` and `remove` sections. `add` and
//! `update` share replace-or-insert semantics; the split only reflects what
//! the reporter believed about prior existence.
//!
//! [`Delta::decode_json`] is tolerant: an entry without a usable id is
//! reported in [`DecodedDelta::malformed`] and skipped, while the rest of the
//! batch still decodes. Structural failures (not JSON, not an object, a
//! section that is not a list) reject the whole message.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::node::Node;
use crate::{NodeId, TopologyId};

/// A node entry of an `add` or `update` section, with its outgoing edges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeltaNode {
    #[serde(flatten)]
    pub node: Node,
    #[serde(default)]
    pub adjacency: BTreeSet<NodeId>,
}

impl DeltaNode {
    pub fn new(node: Node) -> Self {
        Self {
            node,
            adjacency: BTreeSet::new(),
        }
    }

    pub fn with_adjacency<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<NodeId>,
    {
        self.adjacency = targets.into_iter().map(Into::into).collect();
        self
    }

    pub fn id(&self) -> &str {
        &self.node.id
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Delta {
    #[serde(default)]
    pub add: Vec<DeltaNode>,
    #[serde(default)]
    pub update: Vec<DeltaNode>,
    #[serde(default)]
    pub remove: Vec<NodeId>,
}

impl Delta {
    pub fn adding(nodes: impl IntoIterator<Item = DeltaNode>) -> Self {
        Self {
            add: nodes.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn updating(nodes: impl IntoIterator<Item = DeltaNode>) -> Self {
        Self {
            update: nodes.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn removing<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<NodeId>,
    {
        Self {
            remove: ids.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.update.is_empty() && self.remove.is_empty()
    }

    pub fn entry_count(&self) -> usize {
        self.add.len() + self.update.len() + self.remove.len()
    }

    pub fn decode_json(raw: &str) -> Result<DecodedDelta, DeltaDecodeError> {
        let value: Value =
            serde_json::from_str(raw).map_err(|err| DeltaDecodeError::Json(err.to_string()))?;
        Self::decode_value(value)
    }

    pub fn decode_value(value: Value) -> Result<DecodedDelta, DeltaDecodeError> {
        let mut object = match value {
            Value::Object(object) => object,
            Value::Null => return Ok(DecodedDelta::default()),
            _ => return Err(DeltaDecodeError::NotAnObject),
        };

        let mut decoded = DecodedDelta::default();
        for section in [DeltaSection::Add, DeltaSection::Update] {
            for (index, entry) in take_section(&mut object, section)?.into_iter().enumerate() {
                match decode_node_entry(entry) {
                    Ok(node) if section == DeltaSection::Add => decoded.delta.add.push(node),
                    Ok(node) => decoded.delta.update.push(node),
                    Err(reason) => decoded.malformed.push(MalformedEntry {
                        section,
                        index,
                        reason,
                    }),
                }
            }
        }
        for (index, entry) in take_section(&mut object, DeltaSection::Remove)?
            .into_iter()
            .enumerate()
        {
            match entry {
                Value::String(id) if !id.trim().is_empty() => decoded.delta.remove.push(id),
                Value::String(_) => decoded.malformed.push(MalformedEntry {
                    section: DeltaSection::Remove,
                    index,
                    reason: "empty id".to_string(),
                }),
                other => decoded.malformed.push(MalformedEntry {
                    section: DeltaSection::Remove,
                    index,
                    reason: format!("expected id string, found {}", json_kind(&other)),
                }),
            }
        }
        Ok(decoded)
    }
}

fn take_section(
    object: &mut serde_json::Map<String, Value>,
    section: DeltaSection,
) -> Result<Vec<Value>, DeltaDecodeError> {
    match object.remove(section.as_str()) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(entries)) => Ok(entries),
        Some(_) => Err(DeltaDecodeError::SectionNotAList(section)),
    }
}

fn decode_node_entry(entry: Value) -> Result<DeltaNode, String> {
    match entry.get("id") {
        Some(Value::String(id)) if !id.trim().is_empty() => {},
        Some(Value::String(_)) => return Err("empty id".to_string()),
        Some(other) => return Err(format!("id must be a string, found {}", json_kind(other))),
        None => return Err("missing id".to_string()),
    }
    serde_json::from_value::<DeltaNode>(entry).map_err(|err| err.to_string())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeltaSection {
    Add,
    Update,
    Remove,
}

impl DeltaSection {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Update => "update",
            Self::Remove => "remove",
        }
    }
}

/// A skipped entry and why it was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedEntry {
    pub section: DeltaSection,
    pub index: usize,
    pub reason: String,
}

impl fmt::Display for MalformedEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]: {}", self.section.as_str(), self.index, self.reason)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedDelta {
    pub delta: Delta,
    pub malformed: Vec<MalformedEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeltaDecodeError {
    Json(String),
    NotAnObject,
    SectionNotAList(DeltaSection),
    MissingTopology,
}

impl fmt::Display for DeltaDecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json(message) => write!(f, "invalid delta json: {message}"),
            Self::NotAnObject => f.write_str("delta must be a json object"),
            Self::SectionNotAList(section) => {
                write!(f, "delta section '{}' must be a list", section.as_str())
            },
            Self::MissingTopology => f.write_str("delta message has no topology id"),
        }
    }
}

impl std::error::Error for DeltaDecodeError {}

/// One ingress message: a delta addressed to a named topology.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologyDelta {
    pub topology: TopologyId,
    pub delta: Delta,
}

impl TopologyDelta {
    pub fn new(topology: impl Into<TopologyId>, delta: Delta) -> Self {
        Self {
            topology: topology.into(),
            delta,
        }
    }

    /// Decode a `{"topology": "...", "delta": {...}}` line.
    pub fn decode_json(raw: &str) -> Result<(Self, Vec<MalformedEntry>), DeltaDecodeError> {
        let value: Value =
            serde_json::from_str(raw).map_err(|err| DeltaDecodeError::Json(err.to_string()))?;
        let Value::Object(mut object) = value else {
            return Err(DeltaDecodeError::NotAnObject);
        };
        let topology = match object.remove("topology") {
            Some(Value::String(id)) if !id.trim().is_empty() => id,
            _ => return Err(DeltaDecodeError::MissingTopology),
        };
        let decoded = Delta::decode_value(object.remove("delta").unwrap_or(Value::Null))?;
        Ok((Self::new(topology, decoded.delta), decoded.malformed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_keeps_valid_entries_and_reports_missing_ids() {
        let decoded = Delta::decode_json(
            r#"{
                "add": [{"id": "a"}, {"label_major": "no id"}, {"id": "b", "adjacency": ["a"]}],
                "update": [{"id": ""}],
                "remove": ["c", 7]
            }"#,
        )
        .unwrap();

        let added: Vec<&str> = decoded.delta.add.iter().map(DeltaNode::id).collect();
        assert_eq!(added, vec!["a", "b"]);
        assert!(decoded.delta.update.is_empty());
        assert_eq!(decoded.delta.remove, vec!["c".to_string()]);
        assert_eq!(decoded.malformed.len(), 3);
        assert_eq!(decoded.malformed[0].section, DeltaSection::Add);
        assert_eq!(decoded.malformed[0].index, 1);
        assert_eq!(decoded.malformed[1].section, DeltaSection::Update);
        assert_eq!(decoded.malformed[2].section, DeltaSection::Remove);
        assert_eq!(decoded.malformed[2].index, 1);
    }

    #[test]
    fn decode_reports_badly_typed_fields_as_malformed() {
        let decoded =
            Delta::decode_json(r#"{"add": [{"id": "a", "latest": {"cpu": "high"}}, {"id": "b"}]}"#)
                .unwrap();
        assert_eq!(decoded.delta.add.len(), 1);
        assert_eq!(decoded.delta.add[0].id(), "b");
        assert_eq!(decoded.malformed.len(), 1);
    }

    #[test]
    fn decode_rejects_structural_errors() {
        assert_eq!(Delta::decode_json("[]"), Err(DeltaDecodeError::NotAnObject));
        assert_eq!(
            Delta::decode_json(r#"{"add": {}}"#),
            Err(DeltaDecodeError::SectionNotAList(DeltaSection::Add))
        );
        assert!(matches!(
            Delta::decode_json("{"),
            Err(DeltaDecodeError::Json(_))
        ));
    }

    #[test]
    fn null_sections_are_empty() {
        let decoded = Delta::decode_json(r#"{"add": null, "remove": null}"#).unwrap();
        assert!(decoded.delta.is_empty());
        assert!(decoded.malformed.is_empty());
    }

    #[test]
    fn adjacency_flattens_alongside_node_fields() {
        let decoded = Delta::decode_json(
            r#"{"add": [{"id": "b", "label_minor": "weave-1", "adjacency": ["a", "a"]}]}"#,
        )
        .unwrap();
        let entry = &decoded.delta.add[0];
        assert_eq!(entry.node.label_minor, "weave-1");
        assert_eq!(entry.adjacency.len(), 1);
    }

    #[test]
    fn topology_delta_requires_topology() {
        let (message, malformed) =
            TopologyDelta::decode_json(r#"{"topology": "hosts", "delta": {"remove": ["x"]}}"#)
                .unwrap();
        assert_eq!(message.topology, "hosts");
        assert_eq!(message.delta.remove, vec!["x".to_string()]);
        assert!(malformed.is_empty());

        assert_eq!(
            TopologyDelta::decode_json(r#"{"delta": {}}"#),
            Err(DeltaDecodeError::MissingTopology)
        );
    }

    #[test]
    fn topology_delta_without_delta_is_empty() {
        let (message, _) = TopologyDelta::decode_json(r#"{"topology": "pods"}"#).unwrap();
        assert!(message.delta.is_empty());
    }
}
