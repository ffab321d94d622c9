/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::time::Duration;

use futures_util::stream;
use keyboard_types::{Code, NamedKey};
use topoview::VERSION;
use topoview::app::{EngineIntent, EngineMessage, ViewEngine, ViewMode};
use topoview::input::RawInputEvent;
use topoview::model::{Delta, DeltaNode, Node, TopologyDelta};
use topoview::prefs::EngineConfig;
use topoview::runtime::{EngineRuntime, MessageSource, SharedEngine};

fn add(id: &str, adjacency: &[&str]) -> Delta {
    Delta::adding([DeltaNode::new(Node::new(id).with_labels(id, "weave-1"))
        .with_adjacency(adjacency.iter().copied())])
}

#[test]
fn scenarios_binary_smoke_runs() {
    assert!(!VERSION.is_empty());
}

#[test]
fn removal_prunes_forward_edges_in_the_same_application() {
    let mut engine = ViewEngine::new_for_testing();
    engine.apply_delta("containers", add("a", &[]));
    engine.apply_delta("containers", add("b", &["a"]));
    engine.apply_delta("containers", Delta::removing(["a"]));

    let snapshot = engine.active_snapshot();
    assert_eq!(snapshot.node_ids().collect::<Vec<_>>(), vec!["b"]);
    assert!(snapshot.adjacency("b").is_none_or(|row| row.is_empty()));
    assert_eq!(engine.presentation_graph().edge_count(), 0);
}

#[test]
fn grid_shortcut_is_gated_by_search_focus() {
    let mut engine = ViewEngine::new_for_testing();
    engine.apply_intents([EngineIntent::FocusSearch]);
    engine.handle_input(&RawInputEvent::character("g"));
    assert_eq!(engine.state().view_mode, ViewMode::Graph);

    engine.apply_intents([EngineIntent::BlurSearch]);
    engine.handle_input(&RawInputEvent::character("g"));
    assert_ne!(engine.state().view_mode, ViewMode::Graph);
}

#[test]
fn search_tracks_graph_updates() {
    let mut engine = ViewEngine::new_for_testing();
    engine.apply_intents([EngineIntent::SetSearchQuery {
        query: "weave-1".into(),
    }]);
    engine.apply_delta("containers", add("a", &[]));
    engine.apply_delta(
        "containers",
        Delta::adding([DeltaNode::new(Node::new("b").with_labels("b", "other"))]),
    );
    assert_eq!(engine.search_matches().iter().collect::<Vec<_>>(), vec!["a"]);

    engine.apply_delta("containers", Delta::removing(["a"]));
    assert!(engine.search_matches().is_empty());
}

#[test]
fn route_restores_view_in_a_new_engine() {
    let mut first = ViewEngine::new_for_testing();
    first.apply_intents([
        EngineIntent::RegisterTopology { id: "hosts".into() },
        EngineIntent::SetActiveTopology { id: "hosts".into() },
        EngineIntent::FocusSearch,
        EngineIntent::SetSearchQuery {
            query: "web".into(),
        },
        EngineIntent::HitEnter,
        EngineIntent::ToggleGridMode,
    ]);
    let route = first.take_route_update().expect("mutations publish a route");

    let second = ViewEngine::start(&EngineConfig::default(), Some(&format!("#!/{route}")));
    assert_eq!(second.state().active_topology, "hosts");
    assert_eq!(second.state().view_mode, ViewMode::Table);
    assert_eq!(second.state().pinned_searches, vec!["web".to_string()]);
    assert_eq!(second.current_route(), first.current_route());
}

#[tokio::test]
async fn runtime_interleaves_deltas_and_input() {
    let mut runtime = EngineRuntime::new(4);
    let mut engine = ViewEngine::new_for_testing();

    let deltas = runtime.subscribe_deltas(stream::iter([
        TopologyDelta::new("containers", add("a", &[])),
        TopologyDelta::new("hosts", add("h1", &[])),
    ]));
    let input = runtime.subscribe_input(stream::iter([
        RawInputEvent::character("?"),
        RawInputEvent::named_up(NamedKey::Escape, Code::Escape),
    ]));

    let errors = tokio::time::timeout(Duration::from_secs(2), runtime.pump_until_idle(&mut engine))
        .await
        .expect("subscriptions should finish");
    assert!(errors.is_empty());
    drop((deltas, input));

    assert!(engine.registry().is_registered("hosts"));
    assert_eq!(engine.active_snapshot().node_count(), 1);
    assert!(!engine.state().show_help);
    runtime.shutdown().await;
}

#[test]
fn shared_engine_serves_readers_between_batches() {
    let mut runtime = EngineRuntime::default();
    let shared = SharedEngine::new(ViewEngine::new_for_testing());
    let reader = shared.clone();

    runtime.try_submit(
        EngineMessage::Delta(TopologyDelta::new("containers", add("a", &[]))),
        MessageSource::Local,
    );
    runtime.pump_shared(&shared);

    let handle = std::thread::spawn(move || reader.read().active_snapshot().node_count());
    assert_eq!(handle.join().unwrap(), 1);
}

#[test]
fn shutdown_tears_down_all_topologies() {
    let mut engine = ViewEngine::new_for_testing();
    engine.apply_delta("containers", add("a", &[]));
    engine.apply_delta("hosts", add("h1", &[]));
    engine.apply_intents([EngineIntent::Shutdown]);

    assert!(engine.is_shut_down());
    assert!(engine.list_topologies().is_empty());
    assert!(engine.snapshot("hosts").is_none());
}
