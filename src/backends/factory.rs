// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::Arc;

use crate::backends::{
    BackendKind, BackendSelection, BatchBackend, DistributedBackend, EventPool, GraphFactory, InProcessSubmitter,
    JobSubmitter, LocalBackend, MixingBackend, SourceFactory,
};
use crate::config::RunConfig;
use crate::engine::OutputFinalizer;
use crate::errors::BackendError;
use crate::observability::messages::engine::BackendSelected;
use crate::observability::messages::StructuredLog;
use crate::traits::Backend;

/// What the application hands over for the backend to run: how to build the
/// graph and where events come from. Which pieces are needed depends on the
/// selected backend.
#[derive(Default)]
pub struct Collaborators {
    pub graph_factory: Option<GraphFactory>,
    pub source_factory: Option<SourceFactory>,
    pub event_pool: Option<Box<dyn EventPool>>,
    /// Without one, batch jobs run in this process.
    pub submitter: Option<Arc<dyn JobSubmitter>>,
}

impl Collaborators {
    pub fn with_graph_factory(mut self, factory: GraphFactory) -> Self {
        self.graph_factory = Some(factory);
        self
    }

    pub fn with_source_factory(mut self, factory: SourceFactory) -> Self {
        self.source_factory = Some(factory);
        self
    }

    pub fn with_event_pool(mut self, pool: Box<dyn EventPool>) -> Self {
        self.event_pool = Some(pool);
        self
    }

    pub fn with_submitter(mut self, submitter: Arc<dyn JobSubmitter>) -> Self {
        self.submitter = Some(submitter);
        self
    }
}

/// Creates the backend named by the configured selector.
///
/// | selector contains     | backend       |
/// |-----------------------|---------------|
/// | `proof`/`distributed` | distributed   |
/// | `grid`/`batch`        | batch         |
/// | `mix`                 | mixing        |
/// | `local`               | local         |
pub struct BackendFactory;

impl BackendFactory {
    pub fn from_config(
        cfg: &RunConfig,
        collaborators: Collaborators,
    ) -> Result<Box<dyn Backend>, BackendError> {
        let selection = BackendSelection::parse(&cfg.backend)?;
        let kind = selection.kind;
        let finalizer = OutputFinalizer::from_config(cfg);
        let Collaborators {
            graph_factory,
            source_factory,
            event_pool,
            submitter,
        } = collaborators;

        let graph_factory = graph_factory.ok_or(BackendError::MissingCollaborator {
            backend: kind,
            collaborator: "graph factory",
        })?;
        let missing_sources = || BackendError::MissingCollaborator {
            backend: kind,
            collaborator: "event source factory",
        };

        let workers = match kind {
            BackendKind::Local | BackendKind::Mixing => 1,
            BackendKind::Distributed | BackendKind::Batch => cfg.workers,
        };
        BackendSelected {
            selector: &cfg.backend,
            backend: kind.as_str(),
            workers,
        }
        .log();

        let backend: Box<dyn Backend> = match kind {
            BackendKind::Local => {
                let sources = source_factory.ok_or_else(missing_sources)?;
                let graph = graph_factory().map_err(BackendError::GraphFactory)?;
                Box::new(
                    LocalBackend::new(graph, sources(0, 1))
                        .with_max_events(cfg.max_events)
                        .with_finalizer(finalizer),
                )
            }
            BackendKind::Mixing => {
                let pool = event_pool.ok_or(BackendError::MissingCollaborator {
                    backend: kind,
                    collaborator: "event pool",
                })?;
                let graph = graph_factory().map_err(BackendError::GraphFactory)?;
                Box::new(
                    MixingBackend::new(graph, pool)
                        .with_max_events(cfg.max_events)
                        .with_finalizer(finalizer),
                )
            }
            BackendKind::Distributed => {
                let sources = source_factory.ok_or_else(missing_sources)?;
                Box::new(
                    DistributedBackend::new(graph_factory, sources, cfg.workers)
                        .with_max_events(cfg.max_events)
                        .with_finalizer(finalizer),
                )
            }
            BackendKind::Batch => {
                let submitter: Arc<dyn JobSubmitter> = match submitter {
                    Some(submitter) => submitter,
                    None => {
                        let sources = source_factory.ok_or_else(missing_sources)?;
                        Arc::new(
                            InProcessSubmitter::new(graph_factory.clone(), sources)
                                .with_max_events(cfg.max_events)
                                .with_finalizer(finalizer.clone()),
                        )
                    }
                };
                Box::new(
                    BatchBackend::new(submitter, graph_factory, cfg.workers)
                        .terminate_only(selection.terminate_only)
                        .with_finalizer(finalizer),
                )
            }
        };
        Ok(backend)
    }
}
