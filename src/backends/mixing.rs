// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;

use crate::backends::worker::{drive_events, merge_in_process, prepare};
use crate::backends::{BackendKind, EventPool, RunSummary, VecSource};
use crate::engine::{OutputFinalizer, Propagator, RunContext};
use crate::errors::BackendError;
use crate::graph::Graph;
use crate::observability::messages::engine::{EventLoopStarted, MixingBinChanged};
use crate::observability::messages::StructuredLog;
use crate::traits::Backend;

/// Event loop over chains of events drawn from a mixing pool.
///
/// Every live per-event task is told when the bin changes, between chains.
/// Otherwise this is the local backend.
pub struct MixingBackend {
    graph: Graph,
    pool: Box<dyn EventPool>,
    max_events: Option<u64>,
    finalizer: OutputFinalizer,
}

impl MixingBackend {
    pub fn new(graph: Graph, pool: Box<dyn EventPool>) -> Self {
        Self {
            graph,
            pool,
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
            backend: BackendKind::Mixing.as_str(),
            entry_count: self.graph.entry_nodes().len(),
        }
        .log();

        self.graph.create_outputs(run)?;
        let mut propagator = Propagator::new();
        let mut first = true;
        while let Some(bin) = self.pool.next_bin() {
            if self.max_events.is_some_and(|max| run.counters().consumed >= max) {
                break;
            }
            MixingBinChanged {
                bin: bin.index,
                events: bin.events.len(),
            }
            .log();
            if !first {
                self.graph.notify_bin_changed(bin.index);
            }
            first = false;
            run.set_bin(Some(bin.index));

            let mut chain = VecSource::new(bin.events);
            drive_events(&mut self.graph, run, &mut propagator, &mut chain, self.max_events)?;
        }
        run.set_bin(None);
        self.graph.finish(run)?;

        merge_in_process(BackendKind::Mixing, &mut self.graph, run, &self.finalizer)
    }
}

#[async_trait]
impl Backend for MixingBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Mixing
    }

    async fn run(&mut self, run: &mut RunContext) -> Result<RunSummary, BackendError> {
        let result = self.run_inner(run);
        if let Err(e) = &result {
            self.finalizer.withhold(run.output_dir(), &e.to_string())?;
        }
        result
    }
}
