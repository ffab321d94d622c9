/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Topology delta reconciliation and derived-view engine.
//!
//! [`app::ViewEngine`] owns every named topology, merges incoming deltas,
//! and keeps search matches, metric pins and the URL route in step with the
//! graph. [`runtime::EngineRuntime`] feeds it from async streams.

pub mod app;
pub mod cli;
pub mod error;
pub mod graph;
pub mod input;
pub mod prefs;
pub mod registries;
pub mod route;
pub mod runtime;
pub mod search;

pub use topoview_model as model;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Install the stderr subscriber. Records sent through `log` are bridged.
#[cfg(feature = "tracing")]
pub fn init_tracing(filter: &str) {
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::try_new(filter).unwrap_or_else(|error| {
        eprintln!("topoview: ignoring log filter {filter:?}: {error}");
        EnvFilter::new(prefs::DEFAULT_LOG_FILTER)
    });
    if let Err(error) = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init()
    {
        eprintln!("topoview: tracing already initialized: {error}");
        return;
    }
    tracing::debug!(filter, "tracing initialized");
}

#[cfg(not(feature = "tracing"))]
pub fn init_tracing(_filter: &str) {}
