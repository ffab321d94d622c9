/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Engine diagnostics channel.
//!
//! Components call [`emit_event`] from wherever the interesting thing
//! happens; the process installs one global receiver with
//! [`install_global_sender`]. With no sender installed, events are dropped.
//! Unit tests install a thread-local sender so parallel tests never see
//! each other's events.

use std::collections::{BTreeMap, VecDeque};
use std::sync::OnceLock;

use crossbeam_channel::{Receiver, Sender, unbounded};
use serde_json::{Value, json};

use crate::app::EngineIntent;

pub const CHANNEL_DELTA_APPLIED: &str = "graph.delta.applied";
pub const CHANNEL_DELTA_ENTRY_MALFORMED: &str = "graph.delta.entry_malformed";
pub const CHANNEL_DELTA_MESSAGE_DROPPED: &str = "graph.delta.message_dropped";
pub const CHANNEL_TOPOLOGY_AUTO_REGISTERED: &str = "registry.topology.auto_registered";
pub const CHANNEL_TOPOLOGY_UNKNOWN: &str = "registry.topology.unknown";
pub const CHANNEL_RECOMPUTE_COMPLETED: &str = "view.recompute.completed";
pub const CHANNEL_RECOMPUTE_CANCELLED: &str = "view.recompute.cancelled";
pub const CHANNEL_SEARCH_INVALID_SYNTAX: &str = "search.syntax.invalid";
pub const CHANNEL_ROUTE_INVALID: &str = "route.invalid";
pub const CHANNEL_INGRESS_CLOSED: &str = "runtime.ingress.closed";

static GLOBAL_DIAGNOSTICS_TX: OnceLock<Sender<DiagnosticEvent>> = OnceLock::new();

#[cfg(test)]
thread_local! {
    static TEST_DIAGNOSTICS_TX: std::cell::RefCell<Option<Sender<DiagnosticEvent>>> =
        std::cell::RefCell::new(None);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanPhase {
    Enter,
    Exit,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DiagnosticEvent {
    Span {
        name: &'static str,
        phase: SpanPhase,
        duration_us: Option<u64>,
    },
    MessageSent {
        channel_id: &'static str,
        byte_len: usize,
    },
    Reported {
        channel_id: &'static str,
        detail: String,
    },
    IntentBatch(Vec<EngineIntent>),
}

impl DiagnosticEvent {
    pub fn channel_id(&self) -> Option<&'static str> {
        match self {
            Self::MessageSent { channel_id, .. } | Self::Reported { channel_id, .. } => {
                Some(channel_id)
            },
            Self::Span { .. } | Self::IntentBatch(_) => None,
        }
    }
}

/// Install the process-wide receiver. Only the first call takes effect.
pub fn install_global_sender(sender: Sender<DiagnosticEvent>) {
    let _ = GLOBAL_DIAGNOSTICS_TX.set(sender.clone());

    #[cfg(test)]
    {
        install_test_sender(sender);
    }
}

#[cfg(test)]
pub(crate) fn install_test_sender(sender: Sender<DiagnosticEvent>) {
    TEST_DIAGNOSTICS_TX.with(|slot| {
        *slot.borrow_mut() = Some(sender);
    });
}

pub(crate) fn emit_event(event: DiagnosticEvent) {
    #[cfg(test)]
    {
        TEST_DIAGNOSTICS_TX.with(|slot| {
            if let Some(tx) = slot.borrow().as_ref() {
                let _ = tx.send(event);
            }
        });
    }

    #[cfg(not(test))]
    {
        if let Some(tx) = GLOBAL_DIAGNOSTICS_TX.get() {
            let _ = tx.send(event);
        }
    }
}

pub(crate) fn emit_report(channel_id: &'static str, detail: impl Into<String>) {
    emit_event(DiagnosticEvent::Reported {
        channel_id,
        detail: detail.into(),
    });
}

pub(crate) fn emit_message_sent(channel_id: &'static str, byte_len: usize) {
    emit_event(DiagnosticEvent::MessageSent {
        channel_id,
        byte_len,
    });
}

pub(crate) fn emit_span_duration(name: &'static str, duration_us: u64) {
    emit_event(DiagnosticEvent::Span {
        name,
        phase: SpanPhase::Exit,
        duration_us: Some(duration_us),
    });
}

const RECENT_REPORT_LIMIT: usize = 64;

/// Aggregated view over received diagnostic events.
pub struct DiagnosticsState {
    pub event_tx: Sender<DiagnosticEvent>,
    event_rx: Receiver<DiagnosticEvent>,
    message_counts: BTreeMap<&'static str, u64>,
    message_bytes: BTreeMap<&'static str, u64>,
    span_durations_us: BTreeMap<&'static str, u64>,
    intent_count: u64,
    recent_reports: VecDeque<(&'static str, String)>,
}

impl Default for DiagnosticsState {
    fn default() -> Self {
        Self::new()
    }
}

impl DiagnosticsState {
    pub fn new() -> Self {
        let (event_tx, event_rx) = unbounded();
        Self {
            event_tx,
            event_rx,
            message_counts: BTreeMap::new(),
            message_bytes: BTreeMap::new(),
            span_durations_us: BTreeMap::new(),
            intent_count: 0,
            recent_reports: VecDeque::new(),
        }
    }

    /// Route the global channel into this state.
    pub fn install_global(&self) {
        install_global_sender(self.event_tx.clone());
    }

    /// Fold every queued event into the aggregates. Returns how many were read.
    pub fn drain(&mut self) -> usize {
        let mut drained = 0;
        while let Ok(event) = self.event_rx.try_recv() {
            self.record(event);
            drained += 1;
        }
        drained
    }

    fn record(&mut self, event: DiagnosticEvent) {
        match event {
            DiagnosticEvent::Span {
                name, duration_us, ..
            } => {
                *self.span_durations_us.entry(name).or_default() += duration_us.unwrap_or(0);
            },
            DiagnosticEvent::MessageSent {
                channel_id,
                byte_len,
            } => {
                *self.message_counts.entry(channel_id).or_default() += 1;
                *self.message_bytes.entry(channel_id).or_default() += byte_len as u64;
            },
            DiagnosticEvent::Reported { channel_id, detail } => {
                *self.message_counts.entry(channel_id).or_default() += 1;
                if self.recent_reports.len() == RECENT_REPORT_LIMIT {
                    self.recent_reports.pop_front();
                }
                self.recent_reports.push_back((channel_id, detail));
            },
            DiagnosticEvent::IntentBatch(intents) => {
                self.intent_count += intents.len() as u64;
            },
        }
    }

    pub fn count(&self, channel_id: &str) -> u64 {
        self.message_counts.get(channel_id).copied().unwrap_or(0)
    }

    pub fn intent_count(&self) -> u64 {
        self.intent_count
    }

    pub fn recent_reports(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.recent_reports
            .iter()
            .map(|(channel, detail)| (*channel, detail.as_str()))
    }

    pub fn snapshot_json(&self) -> Value {
        json!({
            "channels": self.message_counts,
            "bytes": self.message_bytes,
            "span_us": self.span_durations_us,
            "intents": self.intent_count,
            "recent": self
                .recent_reports
                .iter()
                .map(|(channel, detail)| json!({"channel": channel, "detail": detail}))
                .collect::<Vec<_>>(),
        })
    }
}
