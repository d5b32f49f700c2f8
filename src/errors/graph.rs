// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Errors raised while registering, validating and accessing the slot graph.

use thiserror::Error;

use crate::graph::PayloadKind;

/// Findings of the graph validator.
///
/// `NoEntryNodes`, `CyclicDependency` and `MissingFileLocator` are fatal: the run
/// never starts. `ZombieNode` and `OrphanNode` are only ever reported through the
/// validation report and the log.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// No live task depends exclusively on declared input slots.
    #[error("No entry task: every live task depends on at least one produced slot")]
    NoEntryNodes,

    /// A task transitively consumes a slot it produces itself.
    #[error("Cyclic dependency detected: {}", .cycle.join(" -> "))]
    CyclicDependency {
        /// Task names along the cycle, first name repeated at the end.
        cycle: Vec<String>,
    },

    /// A file-resident slot was declared without a file to live in.
    #[error("Special slot '{slot}' has no file locator (expected 'file#folder')")]
    MissingFileLocator { slot: String },

    /// A task input could not be resolved; the task is excluded from execution.
    #[error("Task '{task}' is a zombie: input '{input}' cannot be resolved")]
    ZombieNode { task: String, input: String },

    /// A live task that no entry task can reach.
    #[error("Task '{task}' is not reachable from any entry task")]
    OrphanNode { task: String },
}

impl ValidationError {
    /// Whether this finding prevents the run from starting.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ValidationError::NoEntryNodes
                | ValidationError::CyclicDependency { .. }
                | ValidationError::MissingFileLocator { .. }
        )
    }
}

/// Errors raised while building a graph or when validation fails.
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Duplicate slot name: '{0}'")]
    DuplicateSlot(String),

    #[error("Duplicate task name: '{0}'")]
    DuplicateTask(String),

    #[error("Task '{task}' writes to unknown slot '{slot}'")]
    UnknownOutputSlot { task: String, slot: String },

    #[error("Slot '{slot}' already produced by '{existing}', cannot also be produced by '{task}'")]
    MultipleProducers {
        slot: String,
        existing: String,
        task: String,
    },

    #[error("Task '{task}' cannot produce into input slot '{slot}'")]
    ProducesInputSlot { task: String, slot: String },

    #[error("Graph has already been validated")]
    AlreadyValidated,

    #[error("Graph validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors raised by individual slot operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SlotError {
    /// `GetData` before the producer posted anything.
    #[error("Slot '{0}' has no data")]
    NotReady(String),

    #[error("Slot '{slot}' holds {expected:?} payloads, got {actual:?}")]
    KindMismatch {
        slot: String,
        expected: PayloadKind,
        actual: PayloadKind,
    },

    #[error("Slot '{0}' cannot be evicted: it does not own its data or a consumer has not run")]
    EvictionRefused(String),

    #[error("Task '{task}' has no input '{input}'")]
    NoSuchInput { task: String, input: String },

    #[error("Task '{task}' has no output '{output}'")]
    NoSuchOutput { task: String, output: String },
}
