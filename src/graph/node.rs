// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fmt;

use crate::graph::SlotId;
use crate::traits::Task;

/// Stable arena key of a task node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub u32);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TaskId({})", self.0)
    }
}

/// Per-event lifecycle of a task node.
///
/// ```text
/// Idle --(inputs ready)--> Active --(exec returns)--> Executed
///   ^                                                    |
///   +------------- next event (not post-loop) -----------+
///
/// Idle --(input unresolved, validation only)--> Zombie
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Idle,
    Active,
    Executed,
    Zombie,
}

/// Graph bookkeeping for one task. The computation itself lives next to it in
/// the graph arena.
#[derive(Debug)]
pub struct TaskNode {
    pub(crate) id: TaskId,
    pub(crate) name: String,
    pub(crate) input_names: Vec<String>,
    pub(crate) inputs: Vec<SlotId>,
    pub(crate) outputs: Vec<SlotId>,
    pub(crate) post_loop: bool,
    pub(crate) used: bool,
    pub(crate) state: TaskState,
}

impl TaskNode {
    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Input slot names as declared at registration.
    pub fn input_names(&self) -> &[String] {
        &self.input_names
    }

    /// Resolved input slots (empty until validation).
    pub fn inputs(&self) -> &[SlotId] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[SlotId] {
        &self.outputs
    }

    pub fn is_post_loop(&self) -> bool {
        self.post_loop
    }

    /// Reachable from some entry task.
    pub fn is_used(&self) -> bool {
        self.used
    }

    pub fn is_active(&self) -> bool {
        self.state == TaskState::Active
    }

    pub fn is_zombie(&self) -> bool {
        self.state == TaskState::Zombie
    }

    pub fn state(&self) -> TaskState {
        self.state
    }
}

/// Declaration of a task, handed to [`Graph::add_task`](crate::graph::Graph::add_task).
///
/// ```
/// use the_slotgraph::graph::TaskSpec;
/// use the_slotgraph::tasks::EventCounter;
///
/// let spec = TaskSpec::new("counter", EventCounter::new())
///     .input("events")
///     .output("n_events");
/// assert_eq!(spec.name(), "counter");
/// ```
pub struct TaskSpec {
    pub(crate) name: String,
    pub(crate) task: Box<dyn Task>,
    pub(crate) inputs: Vec<String>,
    pub(crate) outputs: Vec<String>,
    pub(crate) post_loop: bool,
}

impl TaskSpec {
    pub fn new(name: impl Into<String>, task: impl Task + 'static) -> Self {
        Self {
            name: name.into(),
            task: Box::new(task),
            inputs: Vec::new(),
            outputs: Vec::new(),
            post_loop: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn input(mut self, slot: impl Into<String>) -> Self {
        self.inputs.push(slot.into());
        self
    }

    pub fn output(mut self, slot: impl Into<String>) -> Self {
        self.outputs.push(slot.into());
        self
    }

    /// Run once after the event loop, on merged data, instead of per event.
    pub fn post_loop(mut self) -> Self {
        self.post_loop = true;
        self
    }
}
