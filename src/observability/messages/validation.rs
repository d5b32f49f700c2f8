// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for graph validation warnings and errors.
//!
//! This module contains message types for logging events related to:
//! * Unresolvable task inputs (zombie tasks)
//! * Tasks unreachable from the entry tasks (orphans)
//! * Cyclic dependency detection
//! * Promotion of slots into the kept-for-merge output set

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// Cyclic dependency detected between tasks.
///
/// # Log Level
/// `error!` - Failure requiring attention
///
/// # Example
/// ```
/// use the_slotgraph::observability::messages::validation::CyclicDependencyDetected;
///
/// let cycle = vec!["a", "b", "c", "a"];
/// let msg = CyclicDependencyDetected {
///     cycle: &cycle,
/// };
///
/// assert_eq!(msg.to_string(), "Cyclic dependency detected: a -> b -> c -> a");
/// ```
pub struct CyclicDependencyDetected<'a> {
    pub cycle: &'a [&'a str],
}

impl Display for CyclicDependencyDetected<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Cyclic dependency detected: {}", self.cycle.join(" -> "))
    }
}

impl StructuredLog for CyclicDependencyDetected<'_> {
    fn log(&self) {
        tracing::error!(
            cycle = self.cycle.join(" -> "),
            cycle_length = self.cycle.len(),
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "graph_validation",
            span_name = name,
            cycle = self.cycle.join(" -> "),
            cycle_length = self.cycle.len(),
        )
    }
}

/// A task reads a slot that nothing can fill and will never run.
///
/// # Log Level
/// `warn!` - The run continues without the task
///
/// # Example
/// ```
/// use the_slotgraph::observability::messages::validation::ZombieTaskDetected;
///
/// let msg = ZombieTaskDetected {
///     task: "histogram",
///     input: "tracks",
/// };
///
/// tracing::warn!("{}", msg);
/// ```
pub struct ZombieTaskDetected<'a> {
    pub task: &'a str,
    pub input: &'a str,
}

impl Display for ZombieTaskDetected<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Task '{}' cannot resolve input '{}' and is disabled",
            self.task, self.input
        )
    }
}

impl StructuredLog for ZombieTaskDetected<'_> {
    fn log(&self) {
        tracing::warn!(task = self.task, input = self.input, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "graph_validation",
            span_name = name,
            task = self.task,
            input = self.input,
        )
    }
}

/// A live task that no entry task leads to.
///
/// # Log Level
/// `warn!` - Probably a wiring mistake, but not fatal
///
/// # Example
/// ```
/// use the_slotgraph::observability::messages::validation::OrphanTaskDetected;
///
/// let msg = OrphanTaskDetected { task: "summary" };
///
/// tracing::warn!("{}", msg);
/// ```
pub struct OrphanTaskDetected<'a> {
    pub task: &'a str,
}

impl Display for OrphanTaskDetected<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Task '{}' is not reachable from any entry task", self.task)
    }
}

impl StructuredLog for OrphanTaskDetected<'_> {
    fn log(&self) {
        tracing::warn!(task = self.task, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("graph_validation", span_name = name, task = self.task)
    }
}

/// No live task reads only declared inputs.
///
/// # Log Level
/// `error!` - Validation fails
pub struct NoEntryTasks {
    pub task_count: usize,
    pub zombie_count: usize,
}

impl Display for NoEntryTasks {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "No entry tasks among {} tasks ({} disabled)",
            self.task_count, self.zombie_count
        )
    }
}

impl StructuredLog for NoEntryTasks {
    fn log(&self) {
        tracing::error!(
            task_count = self.task_count,
            zombie_count = self.zombie_count,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "graph_validation",
            span_name = name,
            task_count = self.task_count,
            zombie_count = self.zombie_count,
        )
    }
}

/// A slot read by a post-loop task joined the output set.
///
/// # Log Level
/// `debug!` - Detailed diagnostic information
pub struct SlotPromoted<'a> {
    pub slot: &'a str,
}

impl Display for SlotPromoted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Slot '{}' is read after the event loop; kept for merge", self.slot)
    }
}

impl StructuredLog for SlotPromoted<'_> {
    fn log(&self) {
        tracing::debug!(slot = self.slot, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("graph_validation", span_name = name, slot = self.slot)
    }
}

/// Graph validation completed successfully.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use the_slotgraph::observability::messages::validation::GraphValidated;
///
/// let msg = GraphValidated {
///     task_count: 5,
///     slot_count: 7,
///     entry_count: 2,
///     zombie_count: 1,
///     orphan_count: 0,
/// };
///
/// tracing::info!("{}", msg);
/// ```
pub struct GraphValidated {
    pub task_count: usize,
    pub slot_count: usize,
    pub entry_count: usize,
    pub zombie_count: usize,
    pub orphan_count: usize,
}

impl Display for GraphValidated {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        let warnings = self.zombie_count + self.orphan_count;
        if warnings > 0 {
            write!(
                f,
                "Graph validated: {} tasks, {} slots, {} entry tasks, {} warnings",
                self.task_count, self.slot_count, self.entry_count, warnings
            )
        } else {
            write!(
                f,
                "Graph validated: {} tasks, {} slots, {} entry tasks",
                self.task_count, self.slot_count, self.entry_count
            )
        }
    }
}

impl StructuredLog for GraphValidated {
    fn log(&self) {
        tracing::info!(
            task_count = self.task_count,
            slot_count = self.slot_count,
            entry_count = self.entry_count,
            zombie_count = self.zombie_count,
            orphan_count = self.orphan_count,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "graph_validation",
            span_name = name,
            task_count = self.task_count,
            slot_count = self.slot_count,
            entry_count = self.entry_count,
        )
    }
}
