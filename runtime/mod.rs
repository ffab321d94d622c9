/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Async ingress for the view engine.
//!
//! The engine itself is synchronous. Producers (delta sources, input
//! sources, other threads) push [`QueuedMessage`]s into a bounded channel
//! owned by [`EngineRuntime`]; the owner drains it in arrival order and feeds
//! the messages to [`ViewEngine::drain`]. Stream subscriptions run as
//! supervised workers in a [`JoinSet`] and stop when their
//! [`SubscriptionHandle`] is released or the runtime shuts down.

pub mod diagnostics;

use std::sync::Arc;
use std::time::Instant;

use futures_util::{Stream, StreamExt};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use topoview_model::TopologyDelta;
use uuid::Uuid;

use self::diagnostics::{CHANNEL_DELTA_MESSAGE_DROPPED, CHANNEL_INGRESS_CLOSED};
use crate::app::{EngineMessage, ViewEngine, report_malformed_entries};
use crate::error::EngineError;
use crate::input::RawInputEvent;
use crate::prefs::EngineConfig;

/// Where a queued message came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MessageSource {
    /// A subscribed delta stream.
    DeltaStream,
    /// A subscribed key-event stream.
    InputStream,
    /// Submitted directly by the embedding application.
    Local,
}

#[derive(Debug, Clone)]
pub struct QueuedMessage {
    pub message: EngineMessage,
    pub queued_at: Instant,
    pub source: MessageSource,
}

impl QueuedMessage {
    pub fn new(message: EngineMessage, source: MessageSource) -> Self {
        Self {
            message,
            queued_at: Instant::now(),
            source,
        }
    }
}

/// Owns one stream subscription. Dropping the handle stops the worker.
#[derive(Debug)]
pub struct SubscriptionHandle {
    id: Uuid,
    token: CancellationToken,
}

impl SubscriptionHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_released(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Stop the worker now.
    pub fn release(self) {}
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        if !self.token.is_cancelled() {
            log::debug!("runtime: releasing subscription {}", self.id);
            self.token.cancel();
        }
    }
}

/// Bounded mailbox plus supervised stream workers.
pub struct EngineRuntime {
    message_tx: mpsc::Sender<QueuedMessage>,
    message_rx: mpsc::Receiver<QueuedMessage>,
    cancel: CancellationToken,
    workers: JoinSet<()>,
}

impl EngineRuntime {
    pub fn new(capacity: usize) -> Self {
        let (message_tx, message_rx) = mpsc::channel(capacity.max(1));
        Self {
            message_tx,
            message_rx,
            cancel: CancellationToken::new(),
            workers: JoinSet::new(),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.ingress_capacity)
    }

    /// A producer handle for other tasks or threads.
    pub fn sender(&self) -> mpsc::Sender<QueuedMessage> {
        self.message_tx.clone()
    }

    /// Queue without waiting. A full mailbox drops the message and reports it.
    pub fn try_submit(&self, message: EngineMessage, source: MessageSource) -> bool {
        match self.message_tx.try_send(QueuedMessage::new(message, source)) {
            Ok(()) => true,
            Err(error) => {
                log::warn!("runtime: dropped {source:?} message ({error})");
                diagnostics::emit_report(CHANNEL_DELTA_MESSAGE_DROPPED, format!("{source:?}: {error}"));
                false
            },
        }
    }

    /// Queue, waiting for room in the mailbox.
    pub async fn submit(&self, message: EngineMessage, source: MessageSource) -> bool {
        self.message_tx
            .send(QueuedMessage::new(message, source))
            .await
            .is_ok()
    }

    pub fn subscribe_deltas<S>(&mut self, stream: S) -> SubscriptionHandle
    where
        S: Stream<Item = TopologyDelta> + Send + 'static,
    {
        self.spawn_forwarder(stream, MessageSource::DeltaStream, EngineMessage::Delta)
    }

    pub fn subscribe_input<S>(&mut self, stream: S) -> SubscriptionHandle
    where
        S: Stream<Item = RawInputEvent> + Send + 'static,
    {
        self.spawn_forwarder(stream, MessageSource::InputStream, EngineMessage::Input)
    }

    fn spawn_forwarder<S, T>(
        &mut self,
        stream: S,
        source: MessageSource,
        wrap: fn(T) -> EngineMessage,
    ) -> SubscriptionHandle
    where
        S: Stream<Item = T> + Send + 'static,
        T: Send + 'static,
    {
        let id = Uuid::new_v4();
        let token = self.cancel.child_token();
        let worker_token = token.clone();
        let tx = self.message_tx.clone();

        self.workers.spawn(async move {
            let mut stream = std::pin::pin!(stream);
            loop {
                let item = tokio::select! {
                    _ = worker_token.cancelled() => {
                        log::debug!("runtime: subscription {id} cancelled");
                        break;
                    }
                    item = stream.next() => item,
                };
                let Some(item) = item else {
                    log::debug!("runtime: {source:?} subscription {id} ended");
                    break;
                };
                let queued = QueuedMessage::new(wrap(item), source);
                tokio::select! {
                    _ = worker_token.cancelled() => break,
                    sent = tx.send(queued) => {
                        if sent.is_err() {
                            log::debug!("runtime: mailbox closed under subscription {id}");
                            diagnostics::emit_report(CHANNEL_INGRESS_CLOSED, id.to_string());
                            break;
                        }
                    }
                }
            }
        });
        log::debug!("runtime: {source:?} subscription {id} spawned");

        SubscriptionHandle { id, token }
    }

    /// Take everything currently queued (non-blocking).
    pub fn drain_pending(&mut self) -> Vec<EngineMessage> {
        let mut messages = Vec::new();
        while let Ok(queued) = self.message_rx.try_recv() {
            messages.push(queued.message);
        }
        messages
    }

    /// Feed everything currently queued to `engine`.
    pub fn pump(&mut self, engine: &mut ViewEngine) -> Vec<EngineError> {
        let messages = self.drain_pending();
        if messages.is_empty() {
            return Vec::new();
        }
        engine.drain(messages)
    }

    /// Feed queued messages to a shared engine. The write lock is held for
    /// the whole batch, so readers never see a half-processed message.
    pub fn pump_shared(&mut self, engine: &SharedEngine) -> Vec<EngineError> {
        let messages = self.drain_pending();
        if messages.is_empty() {
            return Vec::new();
        }
        engine.write().drain(messages)
    }

    /// Process messages as they arrive until every subscription has ended
    /// and the mailbox is empty.
    pub async fn pump_until_idle(&mut self, engine: &mut ViewEngine) -> Vec<EngineError> {
        let mut errors = Vec::new();
        while !self.workers.is_empty() {
            tokio::select! {
                Some(queued) = self.message_rx.recv() => {
                    errors.extend(engine.handle_message(queued.message));
                }
                joined = self.workers.join_next() => {
                    if let Some(Err(error)) = joined {
                        log::warn!("runtime: subscription worker failed: {error}");
                    }
                }
            }
        }
        let remaining = self.drain_pending();
        errors.extend(engine.drain(remaining));
        errors
    }

    /// Cancel every subscription and wait for the workers to finish.
    pub async fn shutdown(&mut self) {
        log::debug!("runtime: shutdown requested, cancelling {} workers", self.workers.len());
        self.cancel.cancel();
        while self.workers.join_next().await.is_some() {}
        log::debug!("runtime: all workers joined");
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }
}

impl Default for EngineRuntime {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

/// A view engine shared between threads.
#[derive(Clone)]
pub struct SharedEngine(Arc<RwLock<ViewEngine>>);

impl SharedEngine {
    pub fn new(engine: ViewEngine) -> Self {
        Self(Arc::new(RwLock::new(engine)))
    }

    pub fn read(&self) -> RwLockReadGuard<'_, ViewEngine> {
        self.0.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, ViewEngine> {
        self.0.write()
    }
}

/// Decode one `{"topology": ..., "delta": {...}}` ingress record.
///
/// A record that cannot be decoded at all is dropped and reported. Entries
/// without a usable id are dropped individually; they come back as errors
/// next to the decoded message.
pub fn decode_ingress_line(raw: &str) -> Result<(TopologyDelta, Vec<EngineError>), EngineError> {
    match TopologyDelta::decode_json(raw) {
        Ok((message, malformed)) => {
            let errors = report_malformed_entries(&message.topology, malformed);
            Ok((message, errors))
        },
        Err(error) => {
            log::warn!("runtime: dropped ingress record: {error}");
            diagnostics::emit_report(CHANNEL_DELTA_MESSAGE_DROPPED, error.to_string());
            Err(EngineError::MalformedDelta(error))
        },
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures_util::stream;
    use keyboard_types::{Code, NamedKey};
    use topoview_model::{Delta, DeltaNode, Node};

    use super::*;
    use crate::app::{EngineIntent, ViewMode};
    use crate::runtime::diagnostics::{DiagnosticsState, install_test_sender};

    fn add(topology: &str, id: &str, adjacency: &[&str]) -> TopologyDelta {
        TopologyDelta::new(
            topology,
            Delta::adding([DeltaNode::new(Node::new(id)).with_adjacency(adjacency.iter().copied())]),
        )
    }

    #[tokio::test]
    async fn new_runtime_has_open_mailbox() {
        let runtime = EngineRuntime::new(0);
        assert!(!runtime.sender().is_closed());
        assert_eq!(runtime.worker_count(), 0);
    }

    #[tokio::test]
    async fn drain_pending_returns_messages_in_order() {
        let mut runtime = EngineRuntime::new(4);
        assert!(runtime.drain_pending().is_empty());
        assert!(runtime.try_submit(
            EngineMessage::Intent(EngineIntent::ToggleHelp),
            MessageSource::Local
        ));
        assert!(runtime.try_submit(EngineMessage::Delta(add("containers", "a", &[])), MessageSource::Local));

        let drained = runtime.drain_pending();
        assert_eq!(drained.len(), 2);
        assert!(matches!(drained[0], EngineMessage::Intent(EngineIntent::ToggleHelp)));
        assert!(matches!(drained[1], EngineMessage::Delta(_)));
    }

    #[tokio::test]
    async fn full_mailbox_drops_and_reports() {
        let mut state = DiagnosticsState::new();
        install_test_sender(state.event_tx.clone());
        let runtime = EngineRuntime::new(1);

        assert!(runtime.try_submit(EngineMessage::Intent(EngineIntent::ToggleHelp), MessageSource::Local));
        assert!(!runtime.try_submit(EngineMessage::Intent(EngineIntent::ToggleHelp), MessageSource::Local));

        state.drain();
        assert_eq!(state.count(CHANNEL_DELTA_MESSAGE_DROPPED), 1);
    }

    #[tokio::test]
    async fn delta_subscription_applies_in_arrival_order() {
        let mut runtime = EngineRuntime::new(2);
        let mut engine = ViewEngine::new_for_testing();
        let removal = TopologyDelta::new("containers", Delta::removing(["a"]));
        let _handle = runtime.subscribe_deltas(stream::iter([
            add("containers", "a", &[]),
            add("containers", "b", &["a"]),
            removal,
        ]));

        let errors = tokio::time::timeout(Duration::from_secs(2), runtime.pump_until_idle(&mut engine))
            .await
            .expect("subscription should finish");
        assert!(errors.is_empty());

        let snapshot = engine.active_snapshot();
        assert_eq!(snapshot.node_ids().collect::<Vec<_>>(), vec!["b"]);
        assert!(snapshot.adjacency("b").is_none_or(|row| row.is_empty()));
    }

    #[tokio::test]
    async fn input_subscription_reaches_dispatcher() {
        let mut runtime = EngineRuntime::default();
        let mut engine = ViewEngine::new_for_testing();
        let _handle = runtime.subscribe_input(stream::iter([
            RawInputEvent::character("g"),
            RawInputEvent::character("?"),
            RawInputEvent::named_up(NamedKey::Escape, Code::Escape),
        ]));

        tokio::time::timeout(Duration::from_secs(2), runtime.pump_until_idle(&mut engine))
            .await
            .expect("subscription should finish");

        assert_eq!(engine.state().view_mode, ViewMode::Table);
        assert!(!engine.state().show_help);
    }

    #[tokio::test]
    async fn releasing_handle_stops_worker() {
        let mut runtime = EngineRuntime::default();
        let mut engine = ViewEngine::new_for_testing();
        let handle = runtime.subscribe_deltas(stream::pending());
        tokio::task::yield_now().await;
        assert_eq!(runtime.worker_count(), 1);

        handle.release();
        tokio::time::timeout(Duration::from_secs(2), runtime.pump_until_idle(&mut engine))
            .await
            .expect("released worker should stop");
        assert_eq!(runtime.worker_count(), 0);
    }

    #[tokio::test]
    async fn shutdown_cancels_and_joins_all_workers() {
        let mut runtime = EngineRuntime::default();
        let first = runtime.subscribe_deltas(stream::pending());
        let second = runtime.subscribe_input(stream::pending());

        runtime.shutdown().await;
        assert_eq!(runtime.worker_count(), 0);
        assert!(first.is_released());
        assert!(second.is_released());
        assert_ne!(first.id(), second.id());
    }

    #[test]
    fn shared_engine_pump_settles_batch_under_one_lock() {
        let mut runtime = EngineRuntime::default();
        let shared = SharedEngine::new(ViewEngine::new_for_testing());

        runtime.try_submit(EngineMessage::Delta(add("containers", "a", &[])), MessageSource::Local);
        runtime.try_submit(
            EngineMessage::Intent(EngineIntent::SetSearchQuery { query: "a".into() }),
            MessageSource::Local,
        );
        assert!(runtime.pump_shared(&shared).is_empty());

        let reader = shared.clone();
        assert!(reader.read().search_matches().contains("a"));
        assert!(!reader.read().has_pending_recompute());
    }

    #[test]
    fn decode_ingress_line_reports_bad_records() {
        let mut state = DiagnosticsState::new();
        install_test_sender(state.event_tx.clone());

        let (message, errors) = decode_ingress_line(
            r#"{"topology": "hosts", "delta": {"add": [{"id": "h1"}, {"id": ""}]}}"#,
        )
        .unwrap();
        assert_eq!(message.topology, "hosts");
        assert_eq!(message.delta.add.len(), 1);
        assert_eq!(errors.len(), 1);

        assert!(matches!(decode_ingress_line("not json"), Err(EngineError::MalformedDelta(_))));
        state.drain();
        assert_eq!(state.count(CHANNEL_DELTA_MESSAGE_DROPPED), 1);
    }
}
