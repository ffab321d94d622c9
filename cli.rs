/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! `topoview` command line: replay a JSON-lines delta log through the
//! runtime and print the resulting view as JSON.

use std::path::PathBuf;
use std::process::ExitCode;
use std::{env, fs};

use bpaf::Bpaf;
use futures_util::stream;
use serde::Serialize;

use crate::app::{EngineIntent, ViewEngine};
use crate::error::{EngineError, EngineResult};
use crate::prefs::EngineConfig;
use crate::registries::TopologySummary;
use crate::runtime::diagnostics::DiagnosticsState;
use crate::runtime::{EngineRuntime, decode_ingress_line};

#[derive(Debug, Clone, Bpaf)]
#[bpaf(options, version)]
/// Replay topology deltas and print the derived view
pub struct CliOptions {
    /// TOML engine configuration
    #[bpaf(short, long, argument("PATH"))]
    pub config: Option<PathBuf>,
    /// Log filter directive, overrides RUST_LOG and the config file
    #[bpaf(long("log-filter"), argument("FILTER"))]
    pub log_filter: Option<String>,
    /// Starting route, e.g. "#!/topology=hosts&mode=table"
    #[bpaf(long, argument("ROUTE"))]
    pub route: Option<String>,
    /// Search query applied before replay
    #[bpaf(long, argument("QUERY"))]
    pub search: Option<String>,
    /// JSON-lines file of {"topology": ..., "delta": {...}} records
    #[bpaf(positional("DELTAS"))]
    pub deltas: PathBuf,
}

/// What the replay prints.
#[derive(Debug, Clone, Serialize)]
pub struct ReplaySummary {
    pub records_applied: usize,
    pub records_dropped: usize,
    pub topologies: Vec<TopologySummary>,
    pub active_topology: String,
    pub active_node_count: usize,
    pub resolved_edges: Vec<(String, String)>,
    pub search_matches: Vec<String>,
    pub route: String,
    pub errors: Vec<String>,
    /// Per-channel diagnostic counts gathered during the replay.
    pub diagnostics: serde_json::Value,
}

pub fn main() -> ExitCode {
    let options = cli_options().run();

    let config = match &options.config {
        Some(path) => match EngineConfig::load(path) {
            Ok(config) => config,
            Err(error) => {
                eprintln!("topoview: {error}");
                return ExitCode::FAILURE;
            },
        },
        None => EngineConfig::default(),
    };

    let filter = options
        .log_filter
        .clone()
        .or_else(|| env::var("RUST_LOG").ok())
        .unwrap_or_else(|| config.log_filter.clone());
    crate::init_tracing(&filter);

    let mut diagnostics = DiagnosticsState::new();
    diagnostics.install_global();

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(error) => {
            log::error!("failed to start async runtime: {error}");
            return ExitCode::FAILURE;
        },
    };

    let summary = match runtime.block_on(replay(&options, &config, &mut diagnostics)) {
        Ok(summary) => summary,
        Err(error) => {
            log::error!("replay failed: {error}");
            return ExitCode::FAILURE;
        },
    };
    match serde_json::to_string_pretty(&summary) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        },
        Err(error) => {
            log::error!("failed to encode summary: {error}");
            ExitCode::FAILURE
        },
    }
}

/// Replay `options.deltas` through a fresh engine.
///
/// Undecodable records are dropped and listed in the summary; they never
/// abort the replay. Only an unreadable input file is an error.
/// Events reaching `diagnostics` are drained into the summary.
pub async fn replay(
    options: &CliOptions,
    config: &EngineConfig,
    diagnostics: &mut DiagnosticsState,
) -> EngineResult<ReplaySummary> {
    let raw = fs::read_to_string(&options.deltas).map_err(|error| {
        EngineError::Io(format!("reading {}: {error}", options.deltas.display()))
    })?;

    let mut errors = Vec::new();
    let mut messages = Vec::new();
    let mut records_dropped = 0;
    for line in raw.lines().map(str::trim).filter(|line| !line.is_empty()) {
        match decode_ingress_line(line) {
            Ok((message, malformed)) => {
                messages.push(message);
                errors.extend(malformed);
            },
            Err(error) => {
                records_dropped += 1;
                errors.push(error);
            },
        }
    }
    let records_applied = messages.len();

    let mut engine = ViewEngine::start(config, options.route.as_deref());
    errors.extend(engine.take_startup_errors());
    if let Some(query) = &options.search {
        errors.extend(engine.apply_intents([EngineIntent::SetSearchQuery {
            query: query.clone(),
        }]));
    }

    let mut runtime = EngineRuntime::from_config(config);
    let subscription = runtime.subscribe_deltas(stream::iter(messages));
    errors.extend(runtime.pump_until_idle(&mut engine).await);
    subscription.release();
    runtime.shutdown().await;
    let events = diagnostics.drain();
    log::info!(
        "replayed {records_applied} records ({records_dropped} dropped, {events} diagnostic events)"
    );

    Ok(summarize(
        &engine,
        records_applied,
        records_dropped,
        errors,
        diagnostics,
    ))
}

fn summarize(
    engine: &ViewEngine,
    records_applied: usize,
    records_dropped: usize,
    errors: Vec<EngineError>,
    diagnostics: &DiagnosticsState,
) -> ReplaySummary {
    let snapshot = engine.active_snapshot();
    let graph = engine.presentation_graph();
    ReplaySummary {
        records_applied,
        records_dropped,
        topologies: engine.list_topologies(),
        active_topology: engine.state().active_topology.clone(),
        active_node_count: snapshot.node_count(),
        resolved_edges: graph
            .edges()
            .into_iter()
            .map(|(from, to)| (from.to_string(), to.to_string()))
            .collect(),
        search_matches: engine.search_matches().iter().cloned().collect(),
        route: engine.current_route().to_string(),
        errors: errors.iter().map(ToString::to_string).collect(),
        diagnostics: diagnostics.snapshot_json(),
    }
}
