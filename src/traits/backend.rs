// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;

use crate::backends::{BackendKind, RunSummary};
use crate::engine::RunContext;
use crate::errors::BackendError;

/// An execution backend: drives one or more copies of the graph over an event
/// stream and leaves merged, finalized outputs in the run's output directory.
///
/// The backend is chosen once, before any event, and does not change for the
/// rest of the run.
#[async_trait]
pub trait Backend: Send {
    fn kind(&self) -> BackendKind;

    /// Run to completion. On error the run's output directory is left
    /// without a sentinel.
    async fn run(&mut self, run: &mut RunContext) -> Result<RunSummary, BackendError>;
}
