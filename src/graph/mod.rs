// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The slot graph: tasks, the data slots they exchange, and the edges between them.
//!
//! The graph is a flat arena. Slots and task nodes are addressed by
//! [`SlotId`] / [`TaskId`] and all edges are stored as those keys, so there is
//! no ownership between records and no destruction order to reason about.
//! Task computations are kept in a parallel vector so that one task can run
//! mutably while the slots are borrowed by its [`TaskContext`].
//!
//! ```text
//!   [events] --> count_all --> [n_events] ------------------------------\
//!       |                                                                +--> efficiency (post-loop)
//!       +------> select --> [selected] --> count_selected --> [n_selected]
//! ```
//!
//! # Example
//!
//! ```
//! use the_slotgraph::graph::{Graph, PayloadKind, SlotSpec, TaskSpec};
//! use the_slotgraph::tasks::{EventCounter, EventSelection, RatioSummary};
//!
//! let mut graph = Graph::new();
//! graph.add_slot(SlotSpec::input("events", PayloadKind::Object))?;
//! graph.add_slot(SlotSpec::exchange("selected", PayloadKind::Collection))?;
//! graph.add_slot(SlotSpec::output("n_events", PayloadKind::Object))?;
//! graph.add_slot(SlotSpec::output("n_selected", PayloadKind::Object))?;
//! graph.add_slot(SlotSpec::output("efficiency", PayloadKind::Object))?;
//! graph.add_task(TaskSpec::new("count_all", EventCounter::new()).input("events").output("n_events"))?;
//! graph.add_task(TaskSpec::new("select", EventSelection::new("pt", 20.0)).input("events").output("selected"))?;
//! graph.add_task(
//!     TaskSpec::new("count_selected", EventCounter::new())
//!         .input("selected")
//!         .output("n_selected"),
//! )?;
//! graph.add_task(
//!     TaskSpec::new("efficiency", RatioSummary::new())
//!         .input("n_selected")
//!         .input("n_events")
//!         .output("efficiency")
//!         .post_loop(),
//! )?;
//!
//! let report = graph.validate()?;
//! assert_eq!(report.entry_nodes, vec!["count_all".to_string(), "select".to_string()]);
//! # Ok::<(), the_slotgraph::errors::GraphError>(())
//! ```

mod node;
mod slot;
pub mod validation;

#[cfg(test)]
mod tests;

pub use node::{TaskId, TaskNode, TaskSpec, TaskState};
pub use slot::{DataSlot, FileLocator, Payload, PayloadKind, SlotId, SlotSpec, SlotStorage};
pub use validation::{GraphValidator, ValidationReport};

use std::collections::HashMap;

use crate::engine::RunContext;
use crate::errors::{ExecutionError, GraphError};
use crate::traits::{Task, TaskContext};

/// Arena of all task nodes and data slots of one worker.
#[derive(Default)]
pub struct Graph {
    pub(crate) slots: Vec<DataSlot>,
    pub(crate) nodes: Vec<TaskNode>,
    pub(crate) tasks: Vec<Box<dyn Task>>,
    slot_index: HashMap<String, SlotId>,
    node_index: HashMap<String, TaskId>,
    pub(crate) entry_nodes: Vec<TaskId>,
    pub(crate) validated: bool,
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("slots", &self.slots.iter().map(|s| s.name()).collect::<Vec<_>>())
            .field("tasks", &self.nodes.iter().map(|n| n.name()).collect::<Vec<_>>())
            .field("validated", &self.validated)
            .finish()
    }
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a slot. Names are unique across the graph.
    pub fn add_slot(&mut self, spec: SlotSpec) -> Result<SlotId, GraphError> {
        self.ensure_mutable()?;
        if self.slot_index.contains_key(&spec.name) {
            return Err(GraphError::DuplicateSlot(spec.name));
        }
        let id = SlotId(self.slots.len() as u32);
        self.slot_index.insert(spec.name.clone(), id);
        self.slots.push(DataSlot::from_spec(id, spec));
        Ok(id)
    }

    /// Register a task.
    ///
    /// Output slots must already exist and gain this task as their single
    /// producer. Input slots are only recorded by name here; they are resolved
    /// (or the task turned into a zombie) during validation.
    pub fn add_task(&mut self, spec: TaskSpec) -> Result<TaskId, GraphError> {
        self.ensure_mutable()?;
        if self.node_index.contains_key(&spec.name) {
            return Err(GraphError::DuplicateTask(spec.name));
        }
        let id = TaskId(self.nodes.len() as u32);

        let mut outputs = Vec::with_capacity(spec.outputs.len());
        for slot_name in &spec.outputs {
            let slot_id = *self.slot_index.get(slot_name).ok_or_else(|| {
                GraphError::UnknownOutputSlot {
                    task: spec.name.clone(),
                    slot: slot_name.clone(),
                }
            })?;
            let slot = &self.slots[slot_id.0 as usize];
            if slot.is_input() {
                return Err(GraphError::ProducesInputSlot {
                    task: spec.name.clone(),
                    slot: slot_name.clone(),
                });
            }
            if let Some(existing) = slot.producer() {
                return Err(GraphError::MultipleProducers {
                    slot: slot_name.clone(),
                    existing: self.nodes[existing.0 as usize].name.clone(),
                    task: spec.name.clone(),
                });
            }
            if outputs.contains(&slot_id) {
                continue;
            }
            outputs.push(slot_id);
        }
        for slot_id in &outputs {
            self.slots[slot_id.0 as usize].producer = Some(id);
        }

        self.node_index.insert(spec.name.clone(), id);
        self.nodes.push(TaskNode {
            id,
            name: spec.name,
            input_names: spec.inputs,
            inputs: Vec::new(),
            outputs,
            post_loop: spec.post_loop,
            used: false,
            state: TaskState::Idle,
        });
        self.tasks.push(spec.task);
        Ok(id)
    }

    /// Validate the graph. Must be called exactly once before any event.
    pub fn validate(&mut self) -> Result<ValidationReport, GraphError> {
        self.ensure_mutable()?;
        GraphValidator::validate(self).map_err(GraphError::Validation)
    }

    pub fn is_validated(&self) -> bool {
        self.validated
    }

    pub fn slot(&self, id: SlotId) -> &DataSlot {
        &self.slots[id.0 as usize]
    }

    pub fn slot_mut(&mut self, id: SlotId) -> &mut DataSlot {
        &mut self.slots[id.0 as usize]
    }

    pub fn slot_id(&self, name: &str) -> Option<SlotId> {
        self.slot_index.get(name).copied()
    }

    pub fn slot_by_name(&self, name: &str) -> Option<&DataSlot> {
        self.slot_id(name).map(|id| self.slot(id))
    }

    pub fn node(&self, id: TaskId) -> &TaskNode {
        &self.nodes[id.0 as usize]
    }

    pub fn task_id(&self, name: &str) -> Option<TaskId> {
        self.node_index.get(name).copied()
    }

    pub fn node_by_name(&self, name: &str) -> Option<&TaskNode> {
        self.task_id(name).map(|id| self.node(id))
    }

    pub fn slots(&self) -> impl Iterator<Item = &DataSlot> {
        self.slots.iter()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &TaskNode> {
        self.nodes.iter()
    }

    /// Entry ("top") tasks in registration order; empty before validation.
    pub fn entry_nodes(&self) -> &[TaskId] {
        &self.entry_nodes
    }

    /// Declared input slots in registration order.
    pub fn input_slots(&self) -> impl Iterator<Item = &DataSlot> {
        self.slots.iter().filter(|s| s.is_input())
    }

    /// The kept-for-merge output set in registration order.
    pub fn output_slots(&self) -> impl Iterator<Item = &DataSlot> {
        self.slots.iter().filter(|s| s.is_output())
    }

    /// Whether `slot` is packed at the end of a worker's stream: a declared
    /// output whose producer runs inside the event loop.
    pub fn is_exported(&self, slot: SlotId) -> bool {
        let slot = self.slot(slot);
        slot.is_output()
            && slot
                .producer()
                .is_some_and(|p| !self.node(p).is_post_loop())
    }

    /// Live tasks: everything that is not a zombie.
    pub(crate) fn live_nodes(&self) -> impl Iterator<Item = &TaskNode> {
        self.nodes.iter().filter(|n| !n.is_zombie())
    }

    pub(crate) fn inputs_ready(&self, id: TaskId) -> bool {
        self.node(id)
            .inputs
            .iter()
            .all(|slot| self.slots[slot.0 as usize].is_ready())
    }

    /// Run one lifecycle hook of one task against a context borrowing the slots.
    pub(crate) fn call_task<F>(
        &mut self,
        id: TaskId,
        run: &mut RunContext,
        hook: F,
    ) -> Result<(), ExecutionError>
    where
        F: FnOnce(&mut dyn Task, &mut TaskContext<'_>) -> anyhow::Result<()>,
    {
        let index = id.0 as usize;
        let node = &self.nodes[index];
        let task = &mut self.tasks[index];
        let mut ctx = TaskContext::new(node, &mut self.slots, run);
        hook(task.as_mut(), &mut ctx).map_err(|source| ExecutionError::TaskFailed {
            task: node.name.clone(),
            source,
        })
    }

    /// Call `create_outputs` on every live task, in registration order.
    pub fn create_outputs(&mut self, run: &mut RunContext) -> Result<(), ExecutionError> {
        self.for_each_live_task(run, |task, ctx| task.create_outputs(ctx))
    }

    /// Call `finish` on every live task at the end of a worker's event stream.
    pub fn finish(&mut self, run: &mut RunContext) -> Result<(), ExecutionError> {
        self.for_each_live_task(run, |task, ctx| task.finish(ctx))
    }

    /// Call `terminate` on every live task on the merging side.
    pub fn terminate(&mut self, run: &mut RunContext) -> Result<(), ExecutionError> {
        self.for_each_live_task(run, |task, ctx| task.terminate(ctx))
    }

    /// Tell every live per-event task that the mixing bin changed.
    pub fn notify_bin_changed(&mut self, bin: usize) {
        for index in 0..self.nodes.len() {
            let node = &self.nodes[index];
            if node.is_zombie() || node.is_post_loop() {
                continue;
            }
            self.tasks[index].bin_changed(bin);
        }
    }

    fn for_each_live_task<F>(&mut self, run: &mut RunContext, mut hook: F) -> Result<(), ExecutionError>
    where
        F: FnMut(&mut dyn Task, &mut TaskContext<'_>) -> anyhow::Result<()>,
    {
        if !self.validated {
            return Err(ExecutionError::NotValidated);
        }
        for index in 0..self.nodes.len() {
            if self.nodes[index].is_zombie() {
                continue;
            }
            self.call_task(TaskId(index as u32), run, &mut hook)?;
        }
        Ok(())
    }

    fn ensure_mutable(&self) -> Result<(), GraphError> {
        if self.validated {
            Err(GraphError::AlreadyValidated)
        } else {
            Ok(())
        }
    }
}
