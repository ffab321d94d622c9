/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Search query compilation and evaluation.
//!
//! Query grammar (whitespace-separated terms, all must match):
//! - `text`: case-insensitive substring of `label_major`, `label_minor` or
//!   any metadata value
//! - `field:text`: substring of the named metadata field only
//! - `metric>N` / `metric<N`: numeric comparison against `latest[metric]`
//!
//! Malformed terms (`:x`, `x:`, `a:b:c`, `cpu>abc`) are reported as
//! `InvalidSearchSyntax` and then matched as plain text. A query of several
//! terms also matches a node containing the whole query as one substring.

use std::collections::BTreeSet;
use std::sync::Arc;

use topoview_model::{Node, NodeId};

use crate::error::EngineError;
use crate::graph::TopologySnapshot;
use crate::runtime::diagnostics::{self, CHANNEL_SEARCH_INVALID_SYNTAX};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Above,
    Below,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SearchTerm {
    Text(String),
    Field { field: String, needle: String },
    Metric {
        metric: String,
        comparison: Comparison,
        threshold: f64,
    },
}

impl SearchTerm {
    fn matches(&self, node: &Node) -> bool {
        match self {
            Self::Text(needle) => text_matches(node, needle),
            Self::Field { field, needle } => node
                .metadata
                .iter()
                .filter(|(key, _)| key.eq_ignore_ascii_case(field))
                .any(|(_, value)| contains_folded(value, needle)),
            Self::Metric {
                metric,
                comparison,
                threshold,
            } => node.latest.get(metric).is_some_and(|value| match comparison {
                Comparison::Above => value > threshold,
                Comparison::Below => value < threshold,
            }),
        }
    }
}

fn text_matches(node: &Node, needle: &str) -> bool {
    contains_folded(&node.label_major, needle)
        || contains_folded(&node.label_minor, needle)
        || node.metadata.values().any(|value| contains_folded(value, needle))
}

/// `needle` is already lowercased.
fn contains_folded(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchPredicate {
    query: String,
    terms: Vec<SearchTerm>,
    /// Whole trimmed query, lowercased; only set for multi-term queries.
    phrase: Option<String>,
    syntax_errors: Vec<EngineError>,
}

impl SearchPredicate {
    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn terms(&self) -> &[SearchTerm] {
        &self.terms
    }

    pub fn matches_everything(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn syntax_errors(&self) -> &[EngineError] {
        &self.syntax_errors
    }

    pub fn matches(&self, node: &Node) -> bool {
        self.terms.iter().all(|term| term.matches(node))
            || self
                .phrase
                .as_deref()
                .is_some_and(|phrase| text_matches(node, phrase))
    }
}

/// Compile `query` into a predicate. Never fails; malformed terms degrade to
/// literal text and are listed in [`SearchPredicate::syntax_errors`].
pub fn compile(query: &str) -> SearchPredicate {
    let mut terms = Vec::new();
    let mut syntax_errors = Vec::new();
    for raw in query.split_whitespace() {
        match parse_term(raw) {
            Ok(term) => terms.push(term),
            Err(reason) => {
                syntax_errors.push(EngineError::InvalidSearchSyntax {
                    term: raw.to_string(),
                    reason,
                });
                terms.push(SearchTerm::Text(raw.to_lowercase()));
            },
        }
    }
    let phrase = (terms.len() > 1).then(|| query.trim().to_lowercase());
    SearchPredicate {
        query: query.to_string(),
        terms,
        phrase,
        syntax_errors,
    }
}

fn parse_term(raw: &str) -> Result<SearchTerm, &'static str> {
    if raw.contains(':') {
        let mut parts = raw.split(':');
        let (Some(field), Some(needle), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err("more than one ':' separator");
        };
        if field.is_empty() {
            return Err("missing field name before ':'");
        }
        if needle.is_empty() {
            return Err("missing value after ':'");
        }
        return Ok(SearchTerm::Field {
            field: field.to_string(),
            needle: needle.to_lowercase(),
        });
    }

    let Some(split) = raw.find(['>', '<']) else {
        return Ok(SearchTerm::Text(raw.to_lowercase()));
    };
    let comparison = if raw[split..].starts_with('>') {
        Comparison::Above
    } else {
        Comparison::Below
    };
    let metric = &raw[..split];
    let number = &raw[split + 1..];
    if metric.is_empty() {
        return Err("missing metric name before comparison");
    }
    let threshold = number
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or("comparison value is not a number")?;
    Ok(SearchTerm::Metric {
        metric: metric.to_string(),
        comparison,
        threshold,
    })
}

/// Ids of every node in `snapshot` matched by `predicate`.
pub fn evaluate(predicate: &SearchPredicate, snapshot: &TopologySnapshot) -> BTreeSet<NodeId> {
    snapshot
        .nodes()
        .filter(|node| predicate.matches(node))
        .map(|node| node.id.clone())
        .collect()
}

/// Caches compiled predicates for the live query and the pinned searches.
///
/// A query string is compiled once; syntax diagnostics are emitted only at
/// compile time, so re-evaluating after every delta stays quiet.
#[derive(Debug, Clone)]
pub struct SearchCompiler {
    live: Arc<SearchPredicate>,
    pinned: Vec<Arc<SearchPredicate>>,
    compilations: u64,
}

impl Default for SearchCompiler {
    fn default() -> Self {
        Self {
            live: Arc::new(compile("")),
            pinned: Vec::new(),
            compilations: 0,
        }
    }
}

impl SearchCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bring the cache in line with `query` and `pinned`, recompiling only
    /// strings that changed. Returns syntax errors from new compilations.
    pub fn sync(&mut self, query: &str, pinned: &[String]) -> Vec<EngineError> {
        let mut errors = Vec::new();
        if self.live.query() != query {
            self.live = Arc::new(self.compile_reporting(query, &mut errors));
        }

        let unchanged = self.pinned.len() == pinned.len()
            && self
                .pinned
                .iter()
                .zip(pinned)
                .all(|(compiled, raw)| compiled.query() == raw);
        if !unchanged {
            let mut next = Vec::with_capacity(pinned.len());
            for raw in pinned {
                let existing = self
                    .pinned
                    .iter()
                    .find(|compiled| compiled.query() == raw)
                    .cloned();
                let predicate = match existing {
                    Some(existing) => existing,
                    None => Arc::new(self.compile_reporting(raw, &mut errors)),
                };
                next.push(predicate);
            }
            self.pinned = next;
        }
        errors
    }

    fn compile_reporting(&mut self, query: &str, errors: &mut Vec<EngineError>) -> SearchPredicate {
        self.compilations += 1;
        let predicate = compile(query);
        for error in predicate.syntax_errors() {
            log::debug!("search: {error}");
            diagnostics::emit_report(CHANNEL_SEARCH_INVALID_SYNTAX, error.to_string());
        }
        errors.extend(predicate.syntax_errors().iter().cloned());
        predicate
    }

    pub fn live(&self) -> &SearchPredicate {
        &self.live
    }

    pub fn compilations(&self) -> u64 {
        self.compilations
    }

    /// Live query intersected with every pinned search.
    pub fn evaluate(&self, snapshot: &TopologySnapshot) -> BTreeSet<NodeId> {
        snapshot
            .nodes()
            .filter(|node| {
                self.live.matches(node) && self.pinned.iter().all(|pinned| pinned.matches(node))
            })
            .map(|node| node.id.clone())
            .collect()
    }
}
