// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The pieces every backend is assembled from: one worker's event loop, and
//! the merging side's import, terminate and finalize sequence.

use std::path::Path;
use std::sync::Arc;

use crate::backends::{BackendKind, EventSource, RunSummary};
use crate::engine::{MergeCoordinator, OutputFinalizer, Propagator, RunContext, WrapperSet};
use crate::errors::{BackendError, ExecutionError, MergeError};
use crate::graph::Graph;
use crate::observability::messages::engine::{EventLoopCompleted, WorkerCompleted, WorkerStarted};
use crate::observability::messages::StructuredLog;

/// Builds a fresh copy of the graph; called once per worker and once for the
/// merging side.
pub type GraphFactory = Arc<dyn Fn() -> anyhow::Result<Graph> + Send + Sync>;

/// Opens the event stream of worker `worker` out of `workers`.
pub type SourceFactory = Arc<dyn Fn(usize, usize) -> Box<dyn EventSource> + Send + Sync>;

/// Validate `graph` unless that already happened.
pub(crate) fn prepare(graph: &mut Graph) -> Result<(), BackendError> {
    if !graph.is_validated() {
        graph.validate()?;
    }
    Ok(())
}

/// Feed `source` through the graph until it runs dry or `max_events` were read.
pub(crate) fn drive_events(
    graph: &mut Graph,
    run: &mut RunContext,
    propagator: &mut Propagator,
    source: &mut dyn EventSource,
    max_events: Option<u64>,
) -> Result<(), ExecutionError> {
    while max_events.map_or(true, |max| run.counters().consumed < max) {
        let Some(event) = source.next_event() else {
            break;
        };
        run.counters_mut().consumed += 1;
        propagator.process_event(graph, run, event)?;
    }
    Ok(())
}

/// Everything one worker does, from an empty graph to its packed outputs:
/// validate, create outputs, run its share of the stream, finish, export and
/// mark its own directory valid. A failed worker leaves its directory unmarked.
pub(crate) fn run_worker(
    worker: usize,
    workers: usize,
    parent: &Path,
    graphs: &GraphFactory,
    sources: &SourceFactory,
    finalizer: &OutputFinalizer,
    max_events: Option<u64>,
) -> Result<WrapperSet, BackendError> {
    let started = WorkerStarted { worker, workers };
    let _span = started.span("run_worker").entered();
    started.log();
    let mut run = RunContext::for_worker(parent, worker);
    let mut source = sources(worker, workers);
    let result = worker_loop(worker, &mut run, graphs, source.as_mut(), finalizer, max_events);
    if let Err(e) = &result {
        finalizer.withhold(run.output_dir(), &e.to_string())?;
    }
    result
}

fn worker_loop(
    worker: usize,
    run: &mut RunContext,
    graphs: &GraphFactory,
    source: &mut dyn EventSource,
    finalizer: &OutputFinalizer,
    max_events: Option<u64>,
) -> Result<WrapperSet, BackendError> {
    let mut graph = graphs().map_err(|e| BackendError::Worker {
        worker,
        reason: format!("cannot build graph: {e:#}"),
    })?;
    prepare(&mut graph)?;

    graph.create_outputs(run)?;
    drive_events(&mut graph, run, &mut Propagator::new(), source, max_events)?;
    graph.finish(run)?;

    let set = MergeCoordinator::new().export(&graph, run)?;
    finalizer.finalize(&graph, run)?;

    WorkerCompleted {
        worker,
        processed: run.counters().processed,
        wrappers: set.wrappers.len(),
    }
    .log();
    Ok(set)
}

/// Remove any sentinel left in the directory of `worker` below `parent`.
/// Used for workers that died without reaching their own error handling.
pub(crate) fn withhold_worker(
    finalizer: &OutputFinalizer,
    parent: &Path,
    worker: usize,
    reason: &str,
) -> Result<(), BackendError> {
    finalizer.withhold(RunContext::for_worker(parent, worker).output_dir(), reason)
}

/// The end of a single-process run: export the graph's outputs, import
/// them back into the same graph so the post-loop tasks run, terminate and
/// finalize.
pub(crate) fn merge_in_process(
    backend: BackendKind,
    graph: &mut Graph,
    run: &mut RunContext,
    finalizer: &OutputFinalizer,
) -> Result<RunSummary, BackendError> {
    let mut coordinator = MergeCoordinator::new();
    let set = coordinator.export(graph, run)?;
    let report = coordinator.merge(graph, run, &[set])?;
    graph.terminate(run)?;
    let finalized = finalizer.finalize(graph, run)?;

    let counters = *run.counters();
    EventLoopCompleted {
        backend: backend.as_str(),
        consumed: counters.consumed,
        processed: counters.processed,
        accepted: counters.accepted,
    }
    .log();

    Ok(RunSummary {
        backend,
        counters,
        mismatches: mismatched_slots(&report.import.mismatches),
        post_loop_executed: report.post_loop_executed,
        failed_workers: Vec::new(),
        finalized,
    })
}

/// The merging side: import every set into a fresh graph, run the post-loop
/// tasks, terminate, and finalize. The sentinel is withheld when any worker
/// is missing.
pub(crate) fn merge_on_client(
    backend: BackendKind,
    graphs: &GraphFactory,
    run: &mut RunContext,
    sets: &[WrapperSet],
    failed_workers: Vec<usize>,
    finalizer: &OutputFinalizer,
) -> Result<RunSummary, BackendError> {
    let mut client = graphs().map_err(BackendError::GraphFactory)?;
    prepare(&mut client)?;

    let report = MergeCoordinator::new().merge(&mut client, run, sets)?;
    run.counters_mut().add(&report.import.counters);
    client.terminate(run)?;

    let finalized = if failed_workers.is_empty() {
        finalizer.finalize(&client, run)?
    } else {
        let reason = format!("{} worker(s) failed: {:?}", failed_workers.len(), failed_workers);
        finalizer.finalize_withheld(&client, run, &reason)?
    };

    Ok(RunSummary {
        backend,
        counters: *run.counters(),
        mismatches: mismatched_slots(&report.import.mismatches),
        post_loop_executed: report.post_loop_executed,
        failed_workers,
        finalized,
    })
}

pub(crate) fn mismatched_slots(mismatches: &[MergeError]) -> Vec<String> {
    mismatches
        .iter()
        .filter_map(|e| match e {
            MergeError::Mismatch { slot } => Some(slot.clone()),
            _ => None,
        })
        .collect()
}
