// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for the event loop and backend lifecycle.
//!
//! This module contains message types for logging events related to:
//! * Backend selection
//! * Event loop start and completion
//! * Worker lifecycle in the distributed and batch backends
//! * Per-event breaks and task failures

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// A backend was chosen from the configured selector.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use the_slotgraph::observability::messages::engine::BackendSelected;
///
/// let msg = BackendSelected {
///     selector: "PROOF-lite",
///     backend: "distributed",
///     workers: 4,
/// };
///
/// tracing::info!("{}", msg);
/// ```
pub struct BackendSelected<'a> {
    pub selector: &'a str,
    pub backend: &'a str,
    pub workers: usize,
}

impl Display for BackendSelected<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Selector '{}' resolved to the {} backend with {} workers",
            self.selector, self.backend, self.workers
        )
    }
}

impl StructuredLog for BackendSelected<'_> {
    fn log(&self) {
        tracing::info!(
            selector = self.selector,
            backend = self.backend,
            workers = self.workers,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "backend_selected",
            span_name = name,
            selector = self.selector,
            backend = self.backend,
            workers = self.workers,
        )
    }
}

/// Event loop started.
///
/// # Log Level
/// `info!` - Important operational event
pub struct EventLoopStarted<'a> {
    pub backend: &'a str,
    pub entry_count: usize,
}

impl Display for EventLoopStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Starting {} event loop with {} entry tasks",
            self.backend, self.entry_count
        )
    }
}

impl StructuredLog for EventLoopStarted<'_> {
    fn log(&self) {
        tracing::info!(backend = self.backend, entry_count = self.entry_count, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "event_loop",
            span_name = name,
            backend = self.backend,
            entry_count = self.entry_count,
        )
    }
}

/// Event loop completed.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use the_slotgraph::observability::messages::engine::EventLoopCompleted;
///
/// let msg = EventLoopCompleted {
///     backend: "local",
///     consumed: 10,
///     processed: 10,
///     accepted: 4,
/// };
///
/// assert_eq!(
///     msg.to_string(),
///     "local event loop completed: consumed=10, processed=10, accepted=4"
/// );
/// ```
pub struct EventLoopCompleted<'a> {
    pub backend: &'a str,
    pub consumed: u64,
    pub processed: u64,
    pub accepted: u64,
}

impl Display for EventLoopCompleted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} event loop completed: consumed={}, processed={}, accepted={}",
            self.backend, self.consumed, self.processed, self.accepted
        )
    }
}

impl StructuredLog for EventLoopCompleted<'_> {
    fn log(&self) {
        tracing::info!(
            backend = self.backend,
            consumed = self.consumed,
            processed = self.processed,
            accepted = self.accepted,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "event_loop_completed",
            span_name = name,
            backend = self.backend,
            consumed = self.consumed,
            processed = self.processed,
        )
    }
}

/// A task asked to stop propagating the current event.
///
/// # Log Level
/// `debug!` - Detailed diagnostic information
pub struct EventBreakRequested<'a> {
    pub task: &'a str,
    pub event: u64,
}

impl Display for EventBreakRequested<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Task '{}' stopped event {}", self.task, self.event)
    }
}

impl StructuredLog for EventBreakRequested<'_> {
    fn log(&self) {
        tracing::debug!(task = self.task, event = self.event, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "event_break",
            span_name = name,
            task = self.task,
            event = self.event,
        )
    }
}

/// The mixing pool moved to another bin.
///
/// # Log Level
/// `debug!` - Detailed diagnostic information
pub struct MixingBinChanged {
    pub bin: usize,
    pub events: usize,
}

impl Display for MixingBinChanged {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Switching to mixing bin {} with {} events", self.bin, self.events)
    }
}

impl StructuredLog for MixingBinChanged {
    fn log(&self) {
        tracing::debug!(bin = self.bin, events = self.events, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("mixing_bin", span_name = name, bin = self.bin, events = self.events)
    }
}

/// A worker started on its share of the events.
///
/// # Log Level
/// `info!` - Important operational event
pub struct WorkerStarted {
    pub worker: usize,
    pub workers: usize,
}

impl Display for WorkerStarted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Worker {}/{} started", self.worker + 1, self.workers)
    }
}

impl StructuredLog for WorkerStarted {
    fn log(&self) {
        tracing::info!(worker = self.worker, workers = self.workers, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("worker", span_name = name, worker = self.worker)
    }
}

/// A worker finished and returned its wrappers.
///
/// # Log Level
/// `info!` - Important operational event
pub struct WorkerCompleted {
    pub worker: usize,
    pub processed: u64,
    pub wrappers: usize,
}

impl Display for WorkerCompleted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Worker {} completed: processed={} events, wrappers={}",
            self.worker, self.processed, self.wrappers
        )
    }
}

impl StructuredLog for WorkerCompleted {
    fn log(&self) {
        tracing::info!(
            worker = self.worker,
            processed = self.processed,
            wrappers = self.wrappers,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("worker_completed", span_name = name, worker = self.worker)
    }
}

/// A worker failed; its outputs are missing from the merge.
///
/// # Log Level
/// `error!` - Failure requiring attention
///
/// # Example
/// ```
/// use the_slotgraph::observability::messages::engine::WorkerFailed;
///
/// let error = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
/// let msg = WorkerFailed {
///     worker: 3,
///     error: &error,
/// };
///
/// tracing::error!("{}", msg);
/// ```
pub struct WorkerFailed<'a> {
    pub worker: usize,
    pub error: &'a dyn std::error::Error,
}

impl Display for WorkerFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Worker {} failed: {}", self.worker, self.error)
    }
}

impl StructuredLog for WorkerFailed<'_> {
    fn log(&self) {
        tracing::error!(worker = self.worker, error = %self.error, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "worker_failed",
            span_name = name,
            worker = self.worker,
            error = %self.error,
        )
    }
}

/// Batch jobs were handed to the submitter.
///
/// # Log Level
/// `info!` - Important operational event
pub struct JobsSubmitted {
    pub jobs: usize,
}

impl Display for JobsSubmitted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Submitted {} batch jobs", self.jobs)
    }
}

impl StructuredLog for JobsSubmitted {
    fn log(&self) {
        tracing::info!(jobs = self.jobs, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("jobs_submitted", span_name = name, jobs = self.jobs)
    }
}
