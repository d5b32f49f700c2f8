// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! A pool of in-process workers, each running its own copy of the graph on
//! its share of the stream.
//!
//! Workers hand their outputs back as encoded [`WrapperSet`] bytes, the same
//! message a remote worker would send. The merging side imports them into a
//! fresh graph and runs the post-loop tasks there. A worker that fails is
//! left out of the merge and the outputs are not marked valid.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::task::JoinSet;

use crate::backends::worker::{merge_on_client, run_worker, withhold_worker};
use crate::backends::{BackendKind, GraphFactory, RunSummary, SourceFactory};
use crate::engine::{OutputFinalizer, RunContext, WrapperSet};
use crate::errors::BackendError;
use crate::observability::messages::engine::{EventLoopCompleted, WorkerFailed};
use crate::observability::messages::StructuredLog;
use crate::traits::Backend;

pub struct DistributedBackend {
    graph_factory: GraphFactory,
    source_factory: SourceFactory,
    workers: usize,
    max_events: Option<u64>,
    finalizer: OutputFinalizer,
}

impl DistributedBackend {
    pub fn new(graph_factory: GraphFactory, source_factory: SourceFactory, workers: usize) -> Self {
        Self {
            graph_factory,
            source_factory,
            workers: workers.max(1),
            max_events: None,
            finalizer: OutputFinalizer::default(),
        }
    }

    /// Event limit per worker.
    pub fn with_max_events(mut self, max_events: Option<u64>) -> Self {
        self.max_events = max_events;
        self
    }

    pub fn with_finalizer(mut self, finalizer: OutputFinalizer) -> Self {
        self.finalizer = finalizer;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run every worker to completion. Returns the decoded sets of the
    /// workers that succeeded, in worker order, and the indices of those that
    /// did not. A worker that panics counts as failed like any other.
    async fn run_workers(&self, parent: PathBuf) -> Result<(Vec<WrapperSet>, Vec<usize>), BackendError> {
        let mut pool = JoinSet::new();
        let mut workers_by_task = HashMap::new();
        for worker in 0..self.workers {
            let graphs = self.graph_factory.clone();
            let sources = self.source_factory.clone();
            let finalizer = self.finalizer.clone();
            let parent = parent.clone();
            let workers = self.workers;
            let max_events = self.max_events;
            let handle = pool.spawn_blocking(move || {
                run_worker(worker, workers, &parent, &graphs, &sources, &finalizer, max_events)
                    .and_then(|set| set.to_bytes().map_err(BackendError::from))
            });
            workers_by_task.insert(handle.id(), worker);
        }

        let mut encoded: Vec<(usize, Vec<u8>)> = Vec::new();
        let mut failed = Vec::new();
        while let Some(joined) = pool.join_next_with_id().await {
            let (id, result) = match joined {
                Ok((id, result)) => (id, result),
                Err(e) => (e.id(), Err(BackendError::Join(e))),
            };
            let Some(worker) = workers_by_task.remove(&id) else {
                continue;
            };
            match result {
                Ok(bytes) => encoded.push((worker, bytes)),
                Err(e) => {
                    WorkerFailed { worker, error: &e }.log();
                    if matches!(e, BackendError::Join(_)) {
                        withhold_worker(&self.finalizer, &parent, worker, &e.to_string())?;
                    }
                    failed.push(worker);
                }
            }
        }
        encoded.sort_by_key(|(worker, _)| *worker);
        failed.sort_unstable();

        let sets = encoded
            .iter()
            .map(|(_, bytes)| WrapperSet::from_bytes(bytes))
            .collect::<Result<Vec<_>, _>>()?;
        Ok((sets, failed))
    }
}

#[async_trait]
impl Backend for DistributedBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Distributed
    }

    async fn run(&mut self, run: &mut RunContext) -> Result<RunSummary, BackendError> {
        let result = match self.run_workers(run.output_dir().to_path_buf()).await {
            Ok((sets, failed)) => merge_on_client(
                BackendKind::Distributed,
                &self.graph_factory,
                run,
                &sets,
                failed,
                &self.finalizer,
            ),
            Err(e) => Err(e),
        };
        let summary = match result {
            Ok(summary) => summary,
            Err(e) => {
                self.finalizer.withhold(run.output_dir(), &e.to_string())?;
                return Err(e);
            }
        };

        EventLoopCompleted {
            backend: BackendKind::Distributed.as_str(),
            consumed: summary.counters.consumed,
            processed: summary.counters.processed,
            accepted: summary.counters.accepted,
        }
        .log();
        Ok(summary)
    }
}
