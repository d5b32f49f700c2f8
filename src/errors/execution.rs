// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use thiserror::Error;

use super::SlotError;

/// Errors surfaced while propagating an event or running post-loop tasks.
///
/// Task failures are never swallowed by the scheduler; they bubble up to the
/// backend, which fails the whole worker run.
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Graph must be validated before execution")]
    NotValidated,

    #[error("Task '{task}' failed: {source}")]
    TaskFailed {
        task: String,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Slot(#[from] SlotError),
}
