// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use thiserror::Error;

use super::{ExecutionError, GraphError, MergeError, OutputValidationError};
use crate::backends::BackendKind;

/// Errors that fail a whole run (or a whole worker, for the distributed pool).
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Unknown backend selector '{0}' (expected local, mix, proof or grid)")]
    UnknownSelector(String),

    #[error("The {backend:?} backend needs a {collaborator}")]
    MissingCollaborator {
        backend: BackendKind,
        collaborator: &'static str,
    },

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("Cannot build the graph: {0:#}")]
    GraphFactory(#[source] anyhow::Error),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    Merge(#[from] MergeError),

    #[error(transparent)]
    OutputValidation(#[from] OutputValidationError),

    #[error("Worker {worker} failed: {reason}")]
    Worker { worker: usize, reason: String },

    #[error("Batch submission failed: {0}")]
    Submission(#[source] anyhow::Error),

    #[error("Worker task could not be joined: {0}")]
    Join(#[from] tokio::task::JoinError),
}
