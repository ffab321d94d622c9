/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Engine state ⇄ address-bar route.
//!
//! A route is a flat, ordered list of key/value pairs rendered as a URL
//! query string:
//!
//! ```text
//! topology=hosts&mode=table&search=db&node=h1&metric=cpu&pinned=web&option=stopped%3Dhide
//! ```
//!
//! Keys equal to their default are omitted, so the default state is the
//! empty route. Only the routed projection of `EngineState` survives a
//! round trip; hover, focus and overlay flags are transient.

use std::collections::BTreeSet;
use std::fmt;

use topoview_model::TopologyId;
use url::form_urlencoded;

use crate::app::{EngineState, ViewMode};
use crate::error::EngineError;
use crate::registries::DEFAULT_TOPOLOGY;

pub const KEY_TOPOLOGY: &str = "topology";
pub const KEY_MODE: &str = "mode";
pub const KEY_SEARCH: &str = "search";
pub const KEY_NODE: &str = "node";
pub const KEY_METRIC: &str = "metric";
pub const KEY_PINNED: &str = "pinned";
pub const KEY_OPTION: &str = "option";

/// Route prefixes accepted from an address bar, longest first.
const ROUTE_PREFIXES: [&str; 4] = ["#!/", "#/", "#", "?"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewRoute {
    pairs: Vec<(String, String)>,
}

impl ViewRoute {
    /// Parse a query string, optionally prefixed with `#`, `#!/` or `?`.
    /// Never fails; validation happens in [`deserialize`].
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let body = ROUTE_PREFIXES
            .iter()
            .find_map(|prefix| trimmed.strip_prefix(prefix))
            .unwrap_or(trimmed);
        Self {
            pairs: form_urlencoded::parse(body.as_bytes())
                .map(|(key, value)| (key.into_owned(), value.into_owned()))
                .collect(),
        }
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            pairs: pairs
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }

    fn push(&mut self, key: &str, value: impl Into<String>) {
        self.pairs.push((key.to_string(), value.into()));
    }

    /// First value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.pairs
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn to_query_string(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.pairs.iter())
            .finish()
    }
}

impl fmt::Display for ViewRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_query_string())
    }
}

/// Values a route omits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDefaults {
    pub topology: TopologyId,
    pub view_mode: ViewMode,
}

impl Default for RouteDefaults {
    fn default() -> Self {
        Self {
            topology: DEFAULT_TOPOLOGY.to_string(),
            view_mode: ViewMode::Graph,
        }
    }
}

/// Project the routed fields of `state` into a canonical route.
pub fn serialize(state: &EngineState, defaults: &RouteDefaults) -> ViewRoute {
    let mut route = ViewRoute::default();
    if state.active_topology != defaults.topology {
        route.push(KEY_TOPOLOGY, state.active_topology.as_str());
    }
    if state.view_mode != defaults.view_mode {
        route.push(KEY_MODE, state.view_mode.as_persisted_str());
    }
    if !state.search_query.is_empty() {
        route.push(KEY_SEARCH, state.search_query.as_str());
    }
    if let Some(node) = &state.selected_node {
        route.push(KEY_NODE, node.as_str());
    }
    if let Some(metric) = &state.pinned_metric {
        route.push(KEY_METRIC, metric.as_str());
    }
    for pinned in &state.pinned_searches {
        route.push(KEY_PINNED, pinned.as_str());
    }
    for option in &state.active_options {
        route.push(KEY_OPTION, option.as_str());
    }
    route
}

/// Build a fresh `EngineState` from a route. Absent keys take defaults;
/// transient fields start cleared.
pub fn deserialize(route: &ViewRoute, defaults: &RouteDefaults) -> Result<EngineState, EngineError> {
    let topology = match route.get(KEY_TOPOLOGY) {
        None => defaults.topology.clone(),
        Some(id) if id.trim().is_empty() => {
            return Err(EngineError::InvalidRoute("empty topology".to_string()));
        },
        Some(id) => id.to_string(),
    };
    let view_mode = match route.get(KEY_MODE) {
        None => defaults.view_mode,
        Some(raw) => ViewMode::from_persisted_str(raw)
            .ok_or_else(|| EngineError::InvalidRoute(format!("unknown view mode '{raw}'")))?,
    };

    let mut state = EngineState::new(topology, view_mode);
    state.search_query = route.get(KEY_SEARCH).unwrap_or_default().to_string();
    if let Some(node) = route.get(KEY_NODE).filter(|node| !node.trim().is_empty()) {
        state.selected_node = Some(node.to_string());
        state.details.push(node.to_string());
    }
    if let Some(metric) = route.get(KEY_METRIC).filter(|metric| !metric.trim().is_empty()) {
        state.pinned_metric = Some(metric.to_string());
        state.selected_metric = Some(metric.to_string());
    }
    for pinned in route.get_all(KEY_PINNED) {
        let pinned = pinned.trim();
        if !pinned.is_empty() && !state.pinned_searches.iter().any(|p| p == pinned) {
            state.pinned_searches.push(pinned.to_string());
        }
    }
    state.active_options = route
        .get_all(KEY_OPTION)
        .filter(|option| !option.trim().is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>();

    for (key, _) in route.pairs() {
        if ![
            KEY_TOPOLOGY,
            KEY_MODE,
            KEY_SEARCH,
            KEY_NODE,
            KEY_METRIC,
            KEY_PINNED,
            KEY_OPTION,
        ]
        .contains(&key)
        {
            log::debug!("route: ignoring unknown key '{key}'");
        }
    }
    Ok(state)
}

/// Coalesces route publication.
///
/// Mutations call [`RouteSync::schedule`]; the owner later asks for the
/// current route and gets it back only if it differs from what was last
/// published.
#[derive(Debug, Clone, Default)]
pub struct RouteSync {
    last_published: Option<ViewRoute>,
    pending: bool,
}

impl RouteSync {
    pub fn schedule(&mut self) {
        self.pending = true;
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Record `route` as already visible in the address bar.
    pub fn acknowledge(&mut self, route: ViewRoute) {
        self.last_published = Some(route);
        self.pending = false;
    }

    pub fn take_update(&mut self, current: ViewRoute) -> Option<ViewRoute> {
        if !std::mem::take(&mut self.pending) {
            return None;
        }
        if self.last_published.as_ref() == Some(&current) {
            return None;
        }
        self.last_published = Some(current.clone());
        Some(current)
    }
}
