// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::path::Path;

use crate::engine::{EventCounters, RunContext};
use crate::errors::SlotError;
use crate::graph::{DataSlot, Payload, TaskNode};

/// A unit of per-event (or once-only, post-loop) computation.
///
/// Tasks run synchronously and to completion on the thread that owns the graph.
/// They only see the graph through the [`TaskContext`] they are handed.
///
/// Only `exec` is required. The other hooks follow the life of a worker:
/// `create_outputs` before the first event, `bin_changed` between mixing chains,
/// `finish` after the last event, and `terminate` once on the merging side.
pub trait Task: Send {
    /// Called once per worker after validation; a good place to post the
    /// initial (empty) output objects.
    fn create_outputs(&mut self, _ctx: &mut TaskContext<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    fn exec(&mut self, ctx: &mut TaskContext<'_>) -> anyhow::Result<()>;

    fn bin_changed(&mut self, _bin: usize) {}

    fn finish(&mut self, _ctx: &mut TaskContext<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    fn terminate(&mut self, _ctx: &mut TaskContext<'_>) -> anyhow::Result<()> {
        Ok(())
    }
}

/// The view of the graph and the run that a task gets while it executes.
pub struct TaskContext<'a> {
    node: &'a TaskNode,
    slots: &'a mut [DataSlot],
    run: &'a mut RunContext,
}

impl<'a> TaskContext<'a> {
    pub(crate) fn new(node: &'a TaskNode, slots: &'a mut [DataSlot], run: &'a mut RunContext) -> Self {
        Self { node, slots, run }
    }

    pub fn task_name(&self) -> &str {
        self.node.name()
    }

    /// Read input `index` (declaration order).
    pub fn input(&self, index: usize) -> Result<&Payload, SlotError> {
        let id = self
            .node
            .inputs()
            .get(index)
            .ok_or_else(|| self.no_such_input(index.to_string()))?;
        self.slots[id.0 as usize].data()
    }

    pub fn input_named(&self, name: &str) -> Result<&Payload, SlotError> {
        let id = self
            .node
            .inputs()
            .iter()
            .find(|id| self.slots[id.0 as usize].name() == name)
            .ok_or_else(|| self.no_such_input(name.to_string()))?;
        self.slots[id.0 as usize].data()
    }

    /// Post a payload to output `index`, making it ready for this event's consumers.
    pub fn post(&mut self, index: usize, payload: Payload) -> Result<(), SlotError> {
        let slot = self.output_slot(index)?;
        slot.set_data(payload)
    }

    pub fn output(&self, index: usize) -> Result<&Payload, SlotError> {
        let id = self.node.outputs().get(index).ok_or_else(|| SlotError::NoSuchOutput {
            task: self.node.name().to_string(),
            output: index.to_string(),
        })?;
        self.slots[id.0 as usize].data()
    }

    /// Modify output `index` in place. This counts as a post.
    pub fn output_mut(&mut self, index: usize) -> Result<&mut Payload, SlotError> {
        self.output_slot(index)?.data_mut()
    }

    /// Stop propagating the current event once this task returns.
    pub fn request_break(&mut self) {
        self.run.request_break();
    }

    pub fn counters(&mut self) -> &mut EventCounters {
        self.run.counters_mut()
    }

    /// Register out-of-band files (space-separated) to be carried along with
    /// this worker's outputs.
    pub fn register_extra_files(&mut self, names: &str) {
        self.run.register_extra_files(names);
    }

    pub fn event_number(&self) -> u64 {
        self.run.event_number()
    }

    /// The current mixing bin, if events come from an event pool.
    pub fn bin(&self) -> Option<usize> {
        self.run.bin()
    }

    pub fn output_dir(&self) -> &Path {
        self.run.output_dir()
    }

    fn output_slot(&mut self, index: usize) -> Result<&mut DataSlot, SlotError> {
        let id = *self.node.outputs().get(index).ok_or_else(|| SlotError::NoSuchOutput {
            task: self.node.name().to_string(),
            output: index.to_string(),
        })?;
        Ok(&mut self.slots[id.0 as usize])
    }

    fn no_such_input(&self, input: String) -> SlotError {
        SlotError::NoSuchInput {
            task: self.node.name().to_string(),
            input,
        }
    }
}
