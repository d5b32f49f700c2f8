// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;

use crate::backends::worker::{drive_events, merge_in_process, prepare};
use crate::backends::{BackendKind, EventSource, RunSummary};
use crate::engine::{OutputFinalizer, Propagator, RunContext};
use crate::errors::BackendError;
use crate::graph::Graph;
use crate::observability::messages::engine::EventLoopStarted;
use crate::observability::messages::StructuredLog;
use crate::traits::Backend;

/// Sequential event loop over one in-process graph.
///
/// The end of the run goes through the same export and import path as the
/// distributed backend, with this process as its only worker.
pub struct LocalBackend {
    graph: Graph,
    source: Box<dyn EventSource>,
    max_events: Option<u64>,
    finalizer: OutputFinalizer,
}

impl LocalBackend {
    pub fn new(graph: Graph, source: Box<dyn EventSource>) -> Self {
        Self {
            graph,
            source,
            max_events: None,
            finalizer: OutputFinalizer::default(),
        }
    }

    pub fn with_max_events(mut self, max_events: Option<u64>) -> Self {
        self.max_events = max_events;
        self
    }

    pub fn with_finalizer(mut self, finalizer: OutputFinalizer) -> Self {
        self.finalizer = finalizer;
        self
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    fn run_inner(&mut self, run: &mut RunContext) -> Result<RunSummary, BackendError> {
        prepare(&mut self.graph)?;
        EventLoopStarted {
            backend: BackendKind::Local.as_str(),
            entry_count: self.graph.entry_nodes().len(),
        }
        .log();

        self.graph.create_outputs(run)?;
        drive_events(
            &mut self.graph,
            run,
            &mut Propagator::new(),
            self.source.as_mut(),
            self.max_events,
        )?;
        self.graph.finish(run)?;

        merge_in_process(BackendKind::Local, &mut self.graph, run, &self.finalizer)
    }
}

#[async_trait]
impl Backend for LocalBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    async fn run(&mut self, run: &mut RunContext) -> Result<RunSummary, BackendError> {
        let result = self.run_inner(run);
        if let Err(e) = &result {
            self.finalizer.withhold(run.output_dir(), &e.to_string())?;
        }
        result
    }
}
