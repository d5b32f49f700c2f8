// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Backends: the strategies that drive a graph over an event stream.
//!
//! Every backend implements the [`Backend`](crate::traits::Backend) trait and
//! ends the run the same way: outputs are exported as wrapper sets, imported
//! on the merging side, post-loop tasks run once, the graph is terminated and
//! the outputs are finalized.
//!
//! # Available Backends
//!
//! ## Local
//! One graph, one sequential event loop in this process. The merge step
//! still runs, with this process as the only worker.
//!
//! ## Mixing
//! Like local, but events arrive in chains from a mixing pool. Live tasks
//! are told every time the bin changes.
//!
//! ## Distributed
//! A pool of in-process workers, each with its own graph copy and its share
//! of the stream. Results travel back as encoded wrapper sets and are merged
//! into a fresh graph.
//!
//! ## Batch
//! Jobs are handed to a [`JobSubmitter`]; the merging side collects the
//! wrapper files they leave behind. A `terminate` selector skips submission
//! and only merges.
//!
//! # Architecture
//!
//! ```text
//! Configuration → BackendFactory → Backend → RunSummary
//! ```
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use the_slotgraph::backends::{BackendFactory, Collaborators, EventSource, VecSource};
//! use the_slotgraph::config::RunConfig;
//! use the_slotgraph::engine::RunContext;
//! use the_slotgraph::tasks::demo;
//! use the_slotgraph::traits::Backend;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let cfg = RunConfig::default();
//! let collaborators = Collaborators::default()
//!     .with_graph_factory(Arc::new(|| Ok(demo::build_graph()?)))
//!     .with_source_factory(Arc::new(|worker, workers| -> Box<dyn EventSource> {
//!         Box::new(VecSource::partition(&demo::events(100), worker, workers))
//!     }));
//!
//! let mut backend = BackendFactory::from_config(&cfg, collaborators)?;
//! let mut run = RunContext::new(&cfg.output_dir);
//! let summary = backend.run(&mut run).await?;
//! println!("processed {} events", summary.counters.processed);
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod distributed;
pub mod factory;
pub mod local;
pub mod mixing;
pub mod selector;
pub mod source;
pub(crate) mod worker;


use crate::engine::{EventCounters, FinalizeReport};

pub use batch::{BatchBackend, InProcessSubmitter, JobSubmitter, WRAPPERS_FILE};
pub use distributed::DistributedBackend;
pub use factory::{BackendFactory, Collaborators};
pub use local::LocalBackend;
pub use mixing::MixingBackend;
pub use selector::{BackendKind, BackendSelection};
pub use source::{EventPool, EventSource, MixingBin, VecPool, VecSource};
pub use worker::{GraphFactory, SourceFactory};

/// What a finished run reports back.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub backend: BackendKind,
    /// Counters of the whole run, summed over workers.
    pub counters: EventCounters,
    /// Output slots no worker produced.
    pub mismatches: Vec<String>,
    pub post_loop_executed: usize,
    pub failed_workers: Vec<usize>,
    pub finalized: FinalizeReport,
}

impl RunSummary {
    /// Whether the outputs were marked valid.
    pub fn is_valid(&self) -> bool {
        self.finalized.sentinel.is_some()
    }
}
