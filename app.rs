/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Engine state and the intent reducer.
//!
//! `ViewEngine` owns the graph store, the topology registry, the search cache
//! and the user-facing `EngineState`. Every state change goes through
//! [`ViewEngine::apply_intents`]; deltas go through
//! [`ViewEngine::handle_message`] or [`ViewEngine::apply_delta`].
//!
//! Derived views (search matches) are recomputed after each delta for the
//! active topology. Inside a mailbox drain the recompute is deferred until
//! the next message, and dropped if that message switches topology.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use topoview_model::{Delta, MalformedEntry, NodeId, TopologyDelta, TopologyId};

use crate::error::EngineError;
use crate::graph::{DeltaOutcome, GraphStore, PresentationGraph, TopologySnapshot};
use crate::input::{CommandDispatcher, DispatchOutcome, InputFocus, RawInputEvent};
use crate::prefs::EngineConfig;
use crate::registries::{TopologyRegistry, TopologySummary};
use crate::route::{self, RouteDefaults, RouteSync, ViewRoute};
use crate::runtime::diagnostics::{
    self, CHANNEL_DELTA_ENTRY_MALFORMED, CHANNEL_RECOMPUTE_CANCELLED,
    CHANNEL_RECOMPUTE_COMPLETED, CHANNEL_ROUTE_INVALID, DiagnosticEvent,
};
use crate::search::SearchCompiler;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Graph,
    Table,
    Resource,
}

impl ViewMode {
    pub fn as_persisted_str(self) -> &'static str {
        match self {
            Self::Graph => "graph",
            Self::Table => "table",
            Self::Resource => "resource",
        }
    }

    pub fn from_persisted_str(raw: &str) -> Option<Self> {
        match raw {
            "graph" => Some(Self::Graph),
            "table" => Some(Self::Table),
            "resource" => Some(Self::Resource),
            _ => None,
        }
    }

    /// graph → table → resource → graph
    pub fn next(self) -> Self {
        match self {
            Self::Graph => Self::Table,
            Self::Table => Self::Resource,
            Self::Resource => Self::Graph,
        }
    }

    /// graph ⇄ table; resource falls back to table.
    pub fn toggled_grid(self) -> Self {
        match self {
            Self::Graph | Self::Resource => Self::Table,
            Self::Table => Self::Graph,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleDirection {
    Forward,
    Backward,
}

/// User-facing view state. Mutated only by intents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineState {
    pub active_topology: TopologyId,
    /// Filter options of the active topology, mirrored from the registry.
    pub active_options: BTreeSet<String>,
    pub selected_node: Option<NodeId>,
    pub hovered_node: Option<NodeId>,
    pub pinned_metric: Option<String>,
    /// Transient metric highlight; not routed.
    pub selected_metric: Option<String>,
    pub search_query: String,
    pub pinned_searches: Vec<String>,
    pub search_focused: bool,
    pub view_mode: ViewMode,
    pub show_help: bool,
    pub show_troubleshooting_menu: bool,
    /// Id of the open raw-pipe terminal, if any.
    pub raw_pipe: Option<String>,
    pub show_diagnostics_panel: bool,
    /// Open detail panels, bottom to top.
    pub details: Vec<NodeId>,
    pub option_key_down: bool,
}

impl EngineState {
    pub fn new(topology: impl Into<TopologyId>, view_mode: ViewMode) -> Self {
        Self {
            active_topology: topology.into(),
            active_options: BTreeSet::new(),
            selected_node: None,
            hovered_node: None,
            pinned_metric: None,
            selected_metric: None,
            search_query: String::new(),
            pinned_searches: Vec::new(),
            search_focused: false,
            view_mode,
            show_help: false,
            show_troubleshooting_menu: false,
            raw_pipe: None,
            show_diagnostics_panel: false,
            details: Vec::new(),
            option_key_down: false,
        }
    }

    pub fn raw_pipe_open(&self) -> bool {
        self.raw_pipe.is_some()
    }
}

/// Closed set of semantic commands accepted by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineIntent {
    RegisterTopology {
        id: TopologyId,
    },
    SetActiveTopology {
        id: TopologyId,
    },
    SetTopologyOption {
        topology: TopologyId,
        option: String,
        enabled: bool,
    },
    SelectNode {
        id: NodeId,
    },
    ClearSelection,
    HoverNode {
        id: NodeId,
    },
    UnhoverNode,
    SelectMetric {
        metric: Option<String>,
    },
    PinMetric {
        metric: String,
    },
    UnpinMetric,
    PinNextMetric {
        direction: CycleDirection,
    },
    SetSearchQuery {
        query: String,
    },
    FocusSearch,
    BlurSearch,
    PinSearch,
    UnpinSearch {
        query: String,
    },
    HitEsc,
    HitEnter,
    HitBackspace,
    ToggleHelp,
    ToggleTroubleshootingMenu,
    OpenRawPipe {
        pipe_id: String,
    },
    CloseRawPipe,
    ToggleDiagnosticsPanel,
    ToggleViewMode,
    ToggleGridMode,
    SetViewMode {
        mode: ViewMode,
    },
    SetOptionKeyDown {
        down: bool,
    },
    NavigateToRoute {
        route: ViewRoute,
    },
    Shutdown,
}

/// One mailbox item, processed strictly in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineMessage {
    Delta(TopologyDelta),
    Input(RawInputEvent),
    Intent(EngineIntent),
}

pub struct ViewEngine {
    store: GraphStore,
    registry: TopologyRegistry,
    state: EngineState,
    defaults: RouteDefaults,
    search: SearchCompiler,
    matches: BTreeSet<NodeId>,
    dispatcher: CommandDispatcher,
    route_sync: RouteSync,
    pending_recompute: Option<TopologyId>,
    pending_topology_fetch: Option<TopologyId>,
    startup_errors: Vec<EngineError>,
    recompute_cycles: u64,
    cancelled_recomputes: u64,
    shut_down: bool,
}

impl ViewEngine {
    /// Start with defaults and request the initial topology fetch.
    pub fn new(config: &EngineConfig) -> Self {
        Self::start(config, None)
    }

    /// Start from an optional external route.
    ///
    /// A usable route seeds the state before anything else runs. A missing
    /// or invalid route leaves defaults in place and requests a topology
    /// fetch; an invalid one is also recorded in [`Self::take_startup_errors`].
    pub fn start(config: &EngineConfig, external_route: Option<&str>) -> Self {
        let defaults = config.route_defaults();
        let mut engine = Self {
            store: GraphStore::new(),
            registry: TopologyRegistry::new(&defaults.topology),
            state: EngineState::new(defaults.topology.clone(), defaults.view_mode),
            defaults,
            search: SearchCompiler::new(),
            matches: BTreeSet::new(),
            dispatcher: CommandDispatcher::default(),
            route_sync: RouteSync::default(),
            pending_recompute: None,
            pending_topology_fetch: None,
            startup_errors: Vec::new(),
            recompute_cycles: 0,
            cancelled_recomputes: 0,
            shut_down: false,
        };
        engine.store.ensure_topology(&engine.defaults.topology);

        let route = external_route
            .map(ViewRoute::parse)
            .filter(|route| !route.is_empty());
        match route {
            Some(route) => match route::deserialize(&route, &engine.defaults) {
                Ok(seeded) => {
                    engine.seed_from_state(seeded);
                    engine.route_sync.acknowledge(engine.current_route());
                },
                Err(error) => {
                    log::warn!("view: ignoring startup route: {error}");
                    diagnostics::emit_report(CHANNEL_ROUTE_INVALID, route.to_string());
                    engine.startup_errors.push(error);
                    engine.pending_topology_fetch = Some(engine.state.active_topology.clone());
                    engine.route_sync.schedule();
                },
            },
            None => {
                engine.pending_topology_fetch = Some(engine.state.active_topology.clone());
                engine.route_sync.acknowledge(engine.current_route());
            },
        }
        engine.refresh_search();
        engine
    }

    #[cfg(any(test, feature = "test-utils"))]
    pub fn new_for_testing() -> Self {
        Self::new(&EngineConfig::default())
    }

    fn seed_from_state(&mut self, seeded: EngineState) {
        let topology = seeded.active_topology.clone();
        self.registry.register(&topology);
        self.store.ensure_topology(&topology);
        if let Err(error) = self.registry.set_active(&topology) {
            log::warn!("view: cannot activate seeded topology: {error}");
            return;
        }
        if let Err(error) = self
            .registry
            .replace_options(&topology, seeded.active_options.clone())
        {
            log::warn!("view: cannot restore topology options: {error}");
        }
        self.state = seeded;
    }

    // Read-only surface

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn registry(&self) -> &TopologyRegistry {
        &self.registry
    }

    pub fn snapshot(&self, topology_id: &str) -> Option<Arc<TopologySnapshot>> {
        self.store.snapshot(topology_id)
    }

    pub fn active_snapshot(&self) -> Arc<TopologySnapshot> {
        self.store
            .snapshot(&self.state.active_topology)
            .unwrap_or_else(|| Arc::new(TopologySnapshot::empty(self.state.active_topology.clone())))
    }

    /// Ids matched by the live query and every pinned search, as of the last
    /// recompute.
    pub fn search_matches(&self) -> &BTreeSet<NodeId> {
        &self.matches
    }

    pub fn list_topologies(&self) -> Vec<TopologySummary> {
        self.registry.list_available(&self.store)
    }

    pub fn presentation_graph(&self) -> PresentationGraph {
        PresentationGraph::from_snapshot(&self.active_snapshot())
    }

    pub fn recompute_cycles(&self) -> u64 {
        self.recompute_cycles
    }

    pub fn cancelled_recomputes(&self) -> u64 {
        self.cancelled_recomputes
    }

    pub fn has_pending_recompute(&self) -> bool {
        self.pending_recompute.is_some()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    pub fn current_route(&self) -> ViewRoute {
        route::serialize(&self.state, &self.defaults)
    }

    /// The route to publish, if it changed since the last publish. Several
    /// mutations between calls coalesce into one update.
    pub fn take_route_update(&mut self) -> Option<ViewRoute> {
        if !self.route_sync.is_pending() {
            return None;
        }
        let current = self.current_route();
        self.route_sync.take_update(current)
    }

    /// Topology the transport should (re)fetch, if one was requested.
    pub fn take_pending_topology_fetch(&mut self) -> Option<TopologyId> {
        self.pending_topology_fetch.take()
    }

    pub fn take_startup_errors(&mut self) -> Vec<EngineError> {
        std::mem::take(&mut self.startup_errors)
    }

    // Mailbox

    /// Process one mailbox message.
    pub fn handle_message(&mut self, message: EngineMessage) -> Vec<EngineError> {
        if self.shut_down {
            log::debug!("view: dropping message after shutdown");
            return Vec::new();
        }
        if !self.switches_topology(&message) {
            self.flush_pending_recompute();
        }
        match message {
            EngineMessage::Delta(message) => {
                self.ingest_delta(message);
                Vec::new()
            },
            EngineMessage::Input(event) => {
                self.handle_input(&event);
                Vec::new()
            },
            EngineMessage::Intent(intent) => self.apply_intents([intent]),
        }
    }

    /// Process a batch in order, then settle any deferred recompute.
    pub fn drain<I>(&mut self, messages: I) -> Vec<EngineError>
    where
        I: IntoIterator<Item = EngineMessage>,
    {
        let mut errors = Vec::new();
        for message in messages {
            errors.extend(self.handle_message(message));
        }
        self.flush_pending_recompute();
        errors
    }

    fn switches_topology(&self, message: &EngineMessage) -> bool {
        let target = match message {
            EngineMessage::Intent(EngineIntent::SetActiveTopology { id }) => {
                if !self.registry.is_registered(id) {
                    return false;
                }
                id.as_str()
            },
            EngineMessage::Intent(EngineIntent::NavigateToRoute { route }) => route
                .get(route::KEY_TOPOLOGY)
                .unwrap_or(self.defaults.topology.as_str()),
            _ => return false,
        };
        target != self.state.active_topology
    }

    // Deltas

    /// Merge a delta without settling derived views. Used by the mailbox.
    pub fn ingest_delta(&mut self, message: TopologyDelta) -> DeltaOutcome {
        let TopologyDelta { topology, delta } = message;
        self.registry.auto_register(&topology);
        let outcome = self.store.apply_delta(&topology, delta);
        if topology == self.state.active_topology {
            self.pending_recompute = Some(topology);
        }
        outcome
    }

    /// Merge a delta and settle derived views immediately.
    pub fn apply_delta(&mut self, topology: &str, delta: Delta) -> DeltaOutcome {
        let outcome = self.ingest_delta(TopologyDelta::new(topology, delta));
        self.flush_pending_recompute();
        outcome
    }

    /// Decode and apply a JSON delta. Entries without a usable id are
    /// dropped and returned as errors; the rest of the batch applies.
    pub fn apply_delta_json(
        &mut self,
        topology: &str,
        raw: &str,
    ) -> Result<(DeltaOutcome, Vec<EngineError>), EngineError> {
        let decoded = Delta::decode_json(raw)?;
        let errors = report_malformed_entries(topology, decoded.malformed);
        Ok((self.apply_delta(topology, decoded.delta), errors))
    }

    fn flush_pending_recompute(&mut self) {
        let Some(topology) = self.pending_recompute.take() else {
            return;
        };
        if topology == self.state.active_topology {
            self.recompute();
        }
    }

    fn cancel_pending_recompute(&mut self) {
        if let Some(topology) = self.pending_recompute.take() {
            self.cancelled_recomputes += 1;
            log::debug!("view: dropped pending recompute for '{topology}' after topology switch");
            diagnostics::emit_report(CHANNEL_RECOMPUTE_CANCELLED, topology);
        }
    }

    fn recompute(&mut self) {
        let snapshot = self.active_snapshot();
        self.matches = self.search.evaluate(&snapshot);
        self.recompute_cycles += 1;
        diagnostics::emit_message_sent(CHANNEL_RECOMPUTE_COMPLETED, self.matches.len());
    }

    fn refresh_search(&mut self) {
        // Syntax problems are already reported by the compiler; the query
        // still applies as literal text.
        let _ = self
            .search
            .sync(&self.state.search_query, &self.state.pinned_searches);
        self.recompute();
    }

    // Input

    /// Map a raw key event through the focus-gated dispatcher and apply the
    /// resulting intents.
    pub fn handle_input(&mut self, event: &RawInputEvent) -> DispatchOutcome {
        let focus = InputFocus::from_state(&self.state);
        let outcome = self.dispatcher.dispatch(event, focus);
        for error in self.apply_intents(outcome.intents.iter().cloned()) {
            log::warn!("input: {error}");
        }
        outcome
    }

    // Intents

    /// Apply intents in order. Refused intents leave state untouched and are
    /// returned as errors; later intents still apply.
    pub fn apply_intents<I>(&mut self, intents: I) -> Vec<EngineError>
    where
        I: IntoIterator<Item = EngineIntent>,
    {
        let intents: Vec<EngineIntent> = intents.into_iter().collect();
        if intents.is_empty() {
            return Vec::new();
        }
        diagnostics::emit_event(DiagnosticEvent::IntentBatch(intents.clone()));

        let mut errors = Vec::new();
        for intent in intents {
            if let Err(error) = self.apply_intent(intent) {
                errors.push(error);
            }
        }
        errors
    }

    fn apply_intent(&mut self, intent: EngineIntent) -> Result<(), EngineError> {
        if self.shut_down {
            return Ok(());
        }
        if !matches!(
            intent,
            EngineIntent::NavigateToRoute { .. } | EngineIntent::Shutdown
        ) {
            self.route_sync.schedule();
        }

        match intent {
            EngineIntent::RegisterTopology { id } => {
                if self.registry.register(&id) {
                    self.store.ensure_topology(&id);
                }
            },
            EngineIntent::SetActiveTopology { id } => self.switch_topology(&id)?,
            EngineIntent::SetTopologyOption {
                topology,
                option,
                enabled,
            } => {
                if is_blank(&topology) || is_blank(&option) {
                    log::debug!("view: ignoring blank topology option");
                    return Ok(());
                }
                self.registry.auto_register(&topology);
                self.store.ensure_topology(&topology);
                let changed = self.registry.set_option(&topology, &option, enabled)?;
                if changed && topology == self.state.active_topology {
                    self.sync_active_options();
                    self.pending_topology_fetch = Some(topology);
                }
            },
            EngineIntent::SelectNode { id } if is_blank(&id) => {},
            EngineIntent::SelectNode { id } => self.select_node(id),
            EngineIntent::ClearSelection => {
                self.state.selected_node = None;
                self.state.details.clear();
            },
            EngineIntent::HoverNode { id } if is_blank(&id) => {},
            EngineIntent::HoverNode { id } => self.state.hovered_node = Some(id),
            EngineIntent::UnhoverNode => self.state.hovered_node = None,
            EngineIntent::SelectMetric { metric } => self.state.selected_metric = metric,
            EngineIntent::PinMetric { metric } if is_blank(&metric) => {},
            EngineIntent::PinMetric { metric } => {
                self.state.pinned_metric = Some(metric.clone());
                self.state.selected_metric = Some(metric);
            },
            EngineIntent::UnpinMetric => self.state.pinned_metric = None,
            EngineIntent::PinNextMetric { direction } => self.cycle_metric(direction),
            EngineIntent::SetSearchQuery { query } => {
                if self.state.search_query != query {
                    self.state.search_query = query;
                    self.refresh_search();
                }
            },
            EngineIntent::FocusSearch => self.state.search_focused = true,
            EngineIntent::BlurSearch => self.state.search_focused = false,
            EngineIntent::PinSearch => self.pin_search(),
            EngineIntent::UnpinSearch { query } => {
                let before = self.state.pinned_searches.len();
                self.state.pinned_searches.retain(|pinned| *pinned != query);
                if self.state.pinned_searches.len() != before {
                    self.refresh_search();
                }
            },
            EngineIntent::HitEsc => self.hit_esc(),
            EngineIntent::HitEnter => {
                if self.state.search_focused {
                    self.pin_search();
                }
            },
            EngineIntent::HitBackspace => {
                if self.state.search_focused
                    && self.state.search_query.is_empty()
                    && self.state.pinned_searches.pop().is_some()
                {
                    self.refresh_search();
                }
            },
            EngineIntent::ToggleHelp => self.state.show_help = !self.state.show_help,
            EngineIntent::ToggleTroubleshootingMenu => {
                self.state.show_troubleshooting_menu = !self.state.show_troubleshooting_menu;
            },
            EngineIntent::OpenRawPipe { pipe_id } => self.state.raw_pipe = Some(pipe_id),
            EngineIntent::CloseRawPipe => self.state.raw_pipe = None,
            EngineIntent::ToggleDiagnosticsPanel => {
                self.state.show_diagnostics_panel = !self.state.show_diagnostics_panel;
            },
            EngineIntent::ToggleViewMode => self.state.view_mode = self.state.view_mode.next(),
            EngineIntent::ToggleGridMode => {
                self.state.view_mode = self.state.view_mode.toggled_grid();
            },
            EngineIntent::SetViewMode { mode } => self.state.view_mode = mode,
            EngineIntent::SetOptionKeyDown { down } => self.state.option_key_down = down,
            EngineIntent::NavigateToRoute { route } => self.navigate(&route)?,
            EngineIntent::Shutdown => self.shutdown(),
        }
        Ok(())
    }

    fn switch_topology(&mut self, id: &str) -> Result<(), EngineError> {
        if !self.registry.set_active(id)? {
            return Ok(());
        }
        self.cancel_pending_recompute();
        self.store.ensure_topology(id);
        self.state.active_topology = id.to_string();
        self.state.selected_node = None;
        self.state.hovered_node = None;
        self.state.details.clear();
        self.sync_active_options();
        self.pending_topology_fetch = Some(id.to_string());
        log::debug!("view: active topology is now '{id}'");
        self.recompute();
        Ok(())
    }

    fn sync_active_options(&mut self) {
        self.state.active_options = self
            .registry
            .options(&self.state.active_topology)
            .cloned()
            .unwrap_or_default();
    }

    /// Select a node and raise (or open) its detail panel.
    fn select_node(&mut self, id: NodeId) {
        self.state.details.retain(|open| *open != id);
        self.state.details.push(id.clone());
        self.state.selected_node = Some(id);
    }

    fn pin_search(&mut self) {
        let query = self.state.search_query.trim().to_string();
        if query.is_empty() {
            return;
        }
        if !self.state.pinned_searches.contains(&query) {
            self.state.pinned_searches.push(query);
        }
        self.state.search_query.clear();
        self.refresh_search();
    }

    /// Close the topmost open overlay.
    fn hit_esc(&mut self) {
        if self.state.raw_pipe.take().is_some() {
            return;
        }
        if self.state.show_help {
            self.state.show_help = false;
            return;
        }
        if self.state.show_troubleshooting_menu {
            self.state.show_troubleshooting_menu = false;
            return;
        }
        if let Some(closed) = self.state.details.pop() {
            if self.state.selected_node.as_ref() == Some(&closed) {
                self.state.selected_node = self.state.details.last().cloned();
            }
            return;
        }
        self.state.search_focused = false;
    }

    /// Step through the hovered (else selected) node's metrics in name order.
    fn cycle_metric(&mut self, direction: CycleDirection) {
        let snapshot = self.active_snapshot();
        let source = [&self.state.hovered_node, &self.state.selected_node]
            .into_iter()
            .flatten()
            .filter_map(|id| snapshot.node(id))
            .find(|node| node.has_metrics());
        let Some(node) = source else {
            return;
        };
        let names: Vec<&str> = node.metric_names().filter(|name| !is_blank(name)).collect();
        if names.is_empty() {
            return;
        }
        let current = self
            .state
            .pinned_metric
            .as_deref()
            .or(self.state.selected_metric.as_deref())
            .and_then(|metric| names.iter().position(|name| *name == metric));
        let count = names.len();
        let next = match (current, direction) {
            (Some(index), CycleDirection::Forward) => (index + 1) % count,
            (Some(index), CycleDirection::Backward) => (index + count - 1) % count,
            (None, CycleDirection::Forward) => 0,
            (None, CycleDirection::Backward) => count - 1,
        };
        let metric = names[next].to_string();
        self.state.pinned_metric = Some(metric.clone());
        self.state.selected_metric = Some(metric);
    }

    fn navigate(&mut self, route: &ViewRoute) -> Result<(), EngineError> {
        let mut next = match route::deserialize(route, &self.defaults) {
            Ok(next) => next,
            Err(error) => {
                log::warn!("view: ignoring navigation: {error}");
                diagnostics::emit_report(CHANNEL_ROUTE_INVALID, route.to_string());
                return Err(error);
            },
        };
        let topology_changed = next.active_topology != self.state.active_topology;
        let options_changed = next.active_options != self.state.active_options;

        // Transient UI flags are not routed; keep what the user has open.
        if !topology_changed {
            next.hovered_node = self.state.hovered_node.clone();
        }
        if next.selected_metric.is_none() {
            next.selected_metric = self.state.selected_metric.clone();
        }
        next.search_focused = self.state.search_focused;
        next.show_help = self.state.show_help;
        next.show_troubleshooting_menu = self.state.show_troubleshooting_menu;
        next.raw_pipe = self.state.raw_pipe.clone();
        next.show_diagnostics_panel = self.state.show_diagnostics_panel;
        next.option_key_down = self.state.option_key_down;

        if topology_changed {
            self.cancel_pending_recompute();
        }
        if topology_changed || options_changed {
            self.pending_topology_fetch = Some(next.active_topology.clone());
        }
        self.seed_from_state(next);
        self.route_sync.acknowledge(self.current_route());
        self.refresh_search();
        Ok(())
    }

    /// Tear down every topology. The engine ignores further input.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        self.pending_recompute = None;
        self.pending_topology_fetch = None;
        self.matches.clear();
        self.store.clear();
        self.registry.clear();
        log::info!("view: engine shut down");
    }
}

/// Ids, metric names and options that are empty or whitespace cannot be
/// routed and are ignored by the reducer.
fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Log and emit one diagnostic per dropped entry.
pub(crate) fn report_malformed_entries(
    topology: &str,
    entries: Vec<MalformedEntry>,
) -> Vec<EngineError> {
    entries
        .into_iter()
        .map(|entry| {
            let error = EngineError::MalformedDeltaEntry {
                topology: topology.to_string(),
                entry,
            };
            log::warn!("graph: {error}");
            diagnostics::emit_report(CHANNEL_DELTA_ENTRY_MALFORMED, error.to_string());
            error
        })
        .collect()
}
