// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Per-event propagation over a validated slot graph.
//!
//! The propagator pushes one event through the graph: the event is bound into
//! every declared input slot, then tasks run in data-availability order,
//! starting from the entry tasks. A task runs as soon as every one of its
//! inputs was posted during the current event, and at most once per event.
//!
//! # Execution Flow
//!
//! 1. **Reset**: per-event tasks go back to `Idle`, every slot starts a new
//!    generation, the break flag is cleared.
//! 2. **Bind**: the event payload is posted into every input slot.
//! 3. **Propagate**: for each entry task, an explicit LIFO worklist. A popped
//!    task is skipped unless it is `Idle` with all inputs ready; otherwise it
//!    runs and the consumers of each output it made ready are pushed, in slot
//!    and consumer registration order.
//! 4. **Break**: a task may end the event early through its context; the flag
//!    is checked after every task returns.
//! 5. **Sweep**: owned slots whose consumers all ran are evicted. After a
//!    break, every owned slot is emptied.
//!
//! ```text
//!   [in] --> A --> [h] --> C
//!     \                   ^
//!      +---> B --> [g] ---+        C waits until both h and g were posted
//! ```
//!
//! Post-loop tasks never take part in events. They run once, through
//! [`Propagator::run_post_loop`], after the merged outputs were imported.
//!
//! # Examples
//!
//! ```rust
//! use serde_json::json;
//! use the_slotgraph::engine::{Propagator, RunContext};
//! use the_slotgraph::graph::{Graph, Payload, PayloadKind, SlotSpec, TaskSpec};
//! use the_slotgraph::tasks::EventCounter;
//!
//! let mut graph = Graph::new();
//! graph.add_slot(SlotSpec::input("events", PayloadKind::Object))?;
//! graph.add_slot(SlotSpec::output("n_events", PayloadKind::Object))?;
//! graph.add_task(TaskSpec::new("counter", EventCounter::new()).input("events").output("n_events"))?;
//! graph.validate()?;
//!
//! let mut run = RunContext::new("output");
//! graph.create_outputs(&mut run)?;
//!
//! let mut propagator = Propagator::new();
//! for value in 0..3 {
//!     propagator.process_event(&mut graph, &mut run, Payload::Object(json!({ "x": value })))?;
//! }
//!
//! let counted = graph.slot_by_name("n_events").unwrap().data()?;
//! assert_eq!(counted, &Payload::Object(json!({ "entries": 3 })));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::engine::RunContext;
use crate::errors::ExecutionError;
use crate::graph::{Graph, Payload, SlotId, TaskId, TaskState};
use crate::observability::messages::engine::EventBreakRequested;
use crate::observability::messages::StructuredLog;

/// What happened to one event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventOutcome {
    /// Number of tasks that ran.
    pub executed: usize,
    /// A task ended the event early.
    pub broken: bool,
}

/// Drives events through a graph. Holds only a reusable worklist, so one
/// propagator can serve any number of events (and graphs).
#[derive(Debug, Default)]
pub struct Propagator {
    worklist: Vec<TaskId>,
}

impl Propagator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push one event through the graph.
    ///
    /// Task errors are returned as they are; the caller decides the fate of
    /// the worker.
    pub fn process_event(
        &mut self,
        graph: &mut Graph,
        run: &mut RunContext,
        event: Payload,
    ) -> Result<EventOutcome, ExecutionError> {
        if !graph.is_validated() {
            return Err(ExecutionError::NotValidated);
        }

        for node in &mut graph.nodes {
            if !node.post_loop && !node.is_zombie() {
                node.state = TaskState::Idle;
            }
        }
        for slot in &mut graph.slots {
            slot.begin_generation();
        }
        run.begin_event();

        let inputs: Vec<SlotId> = graph.input_slots().map(|slot| slot.id()).collect();
        for id in inputs {
            graph.slot_mut(id).set_data(event.clone())?;
        }

        let mut outcome = EventOutcome::default();
        let entries = graph.entry_nodes().to_vec();
        'entries: for entry in entries {
            self.worklist.clear();
            self.worklist.push(entry);
            while let Some(id) = self.worklist.pop() {
                if !Self::try_run(graph, run, id)? {
                    continue;
                }
                outcome.executed += 1;
                if run.break_requested() {
                    EventBreakRequested {
                        task: graph.node(id).name(),
                        event: run.event_number(),
                    }
                    .log();
                    outcome.broken = true;
                    break 'entries;
                }
                self.push_consumers(graph, id, false);
            }
        }
        self.worklist.clear();

        Self::sweep(graph, outcome.broken);
        run.counters_mut().processed += 1;
        Ok(outcome)
    }

    /// Run the post-loop tasks whose inputs are ready, then whatever post-loop
    /// tasks they make ready in turn. Tasks that already ran are never rerun,
    /// so calling this again after a second import is harmless.
    ///
    /// Returns the number of tasks that ran.
    pub fn run_post_loop(
        &mut self,
        graph: &mut Graph,
        run: &mut RunContext,
    ) -> Result<usize, ExecutionError> {
        if !graph.is_validated() {
            return Err(ExecutionError::NotValidated);
        }

        let seeds: Vec<TaskId> = graph
            .live_nodes()
            .filter(|node| node.post_loop && node.state != TaskState::Executed)
            .map(|node| node.id)
            .filter(|id| graph.inputs_ready(*id))
            .collect();

        let mut executed = 0;
        for seed in seeds {
            self.worklist.clear();
            self.worklist.push(seed);
            while let Some(id) = self.worklist.pop() {
                if !Self::try_run(graph, run, id)? {
                    continue;
                }
                executed += 1;
                self.push_consumers(graph, id, true);
            }
        }
        self.worklist.clear();
        Ok(executed)
    }

    /// Run `id` if it is idle and every input was posted this generation.
    fn try_run(graph: &mut Graph, run: &mut RunContext, id: TaskId) -> Result<bool, ExecutionError> {
        if graph.node(id).state() != TaskState::Idle || !graph.inputs_ready(id) {
            return Ok(false);
        }

        let index = id.0 as usize;
        graph.nodes[index].state = TaskState::Active;
        graph.call_task(id, run, |task, ctx| task.exec(ctx))?;
        graph.nodes[index].state = TaskState::Executed;

        let inputs = graph.nodes[index].inputs.clone();
        for slot in inputs {
            graph.slot_mut(slot).mark_consumed(id);
        }
        Ok(true)
    }

    /// Push the consumers of every ready output of `id`, so that the first
    /// registered consumer of the first output is popped first.
    fn push_consumers(&mut self, graph: &Graph, id: TaskId, post_loop: bool) {
        let start = self.worklist.len();
        for slot in graph.node(id).outputs() {
            let slot = graph.slot(*slot);
            if !slot.is_ready() {
                continue;
            }
            for consumer in slot.consumers() {
                let node = graph.node(*consumer);
                if node.is_post_loop() == post_loop && node.state() == TaskState::Idle {
                    self.worklist.push(*consumer);
                }
            }
        }
        self.worklist[start..].reverse();
    }

    /// Evict every owned slot that was posted this event and fully consumed.
    /// After a break no consumer runs again this event, so every owned
    /// payload goes, stale or not.
    fn sweep(graph: &mut Graph, broken: bool) {
        for slot in &mut graph.slots {
            if broken {
                slot.discard();
            } else if slot.owns_data() && slot.is_ready() && slot.all_consumers_ran() {
                // Cannot be refused: both conditions were just checked.
                let _ = slot.evict();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{PayloadKind, SlotSpec, TaskSpec};
    use crate::traits::{Task, TaskContext};
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    type Trace = Arc<Mutex<Vec<String>>>;

    /// Records its name on every run and posts the event number to each output.
    struct Recorder {
        name: &'static str,
        trace: Trace,
        outputs: usize,
        break_on: Option<u64>,
    }

    impl Recorder {
        fn new(name: &'static str, trace: &Trace, outputs: usize) -> Self {
            Self {
                name,
                trace: Arc::clone(trace),
                outputs,
                break_on: None,
            }
        }
    }

    impl Task for Recorder {
        fn exec(&mut self, ctx: &mut TaskContext<'_>) -> anyhow::Result<()> {
            self.trace.lock().unwrap().push(self.name.to_string());
            for index in 0..self.outputs {
                ctx.post(index, Payload::Object(json!({ "event": ctx.event_number() })))?;
            }
            if self.break_on == Some(ctx.event_number()) {
                ctx.request_break();
            }
            Ok(())
        }
    }

    struct Failing;

    impl Task for Failing {
        fn exec(&mut self, _ctx: &mut TaskContext<'_>) -> anyhow::Result<()> {
            anyhow::bail!("detector map missing")
        }
    }

    fn event(value: i64) -> Payload {
        Payload::Object(json!({ "x": value }))
    }

    fn taken(trace: &Trace) -> Vec<String> {
        std::mem::take(&mut *trace.lock().unwrap())
    }

    /// in -> a -> [h] -> c ; in -> b -> [g] -> c
    fn diamond(trace: &Trace, order: [&'static str; 2]) -> Graph {
        let mut graph = Graph::new();
        graph.add_slot(SlotSpec::input("in", PayloadKind::Object)).unwrap();
        graph.add_slot(SlotSpec::exchange("h", PayloadKind::Object)).unwrap();
        graph.add_slot(SlotSpec::exchange("g", PayloadKind::Object)).unwrap();
        graph.add_slot(SlotSpec::output("out", PayloadKind::Object)).unwrap();
        for name in order {
            let output = if name == "a" { "h" } else { "g" };
            graph
                .add_task(TaskSpec::new(name, Recorder::new(name, trace, 1)).input("in").output(output))
                .unwrap();
        }
        graph
            .add_task(
                TaskSpec::new("c", Recorder::new("c", trace, 1))
                    .input("h")
                    .input("g")
                    .output("out"),
            )
            .unwrap();
        graph.validate().unwrap();
        graph
    }

    #[test]
    fn test_consumer_waits_for_all_producers_in_every_order() {
        for order in [["a", "b"], ["b", "a"]] {
            let trace = Trace::default();
            let mut graph = diamond(&trace, order);
            let mut run = RunContext::new("out");
            let mut propagator = Propagator::new();

            for n in 0..3 {
                let outcome = propagator.process_event(&mut graph, &mut run, event(n)).unwrap();
                assert_eq!(outcome.executed, 3, "order {order:?}");
                let ran = taken(&trace);
                assert_eq!(ran.len(), 3);
                assert_eq!(ran.last().map(String::as_str), Some("c"), "order {order:?}");
                assert_eq!(ran.iter().filter(|t| t.as_str() == "c").count(), 1);
            }
            assert_eq!(run.counters().processed, 3);
        }
    }

    #[test]
    fn test_exchange_slots_are_evicted_output_slots_kept() {
        let trace = Trace::default();
        let mut graph = diamond(&trace, ["a", "b"]);
        let mut run = RunContext::new("out");
        Propagator::new()
            .process_event(&mut graph, &mut run, event(1))
            .unwrap();

        assert!(!graph.slot_by_name("in").unwrap().has_data());
        assert!(!graph.slot_by_name("h").unwrap().has_data());
        assert!(!graph.slot_by_name("g").unwrap().has_data());
        assert!(graph.slot_by_name("out").unwrap().has_data());
    }

    #[test]
    fn test_stale_input_does_not_trigger_consumer() {
        // b posts only on odd events; c must not run on even ones.
        struct Sometimes(Trace);
        impl Task for Sometimes {
            fn exec(&mut self, ctx: &mut TaskContext<'_>) -> anyhow::Result<()> {
                self.0.lock().unwrap().push("b".to_string());
                if ctx.event_number() % 2 == 1 {
                    ctx.post(0, Payload::Object(json!({})))?;
                }
                Ok(())
            }
        }

        let trace = Trace::default();
        let mut graph = Graph::new();
        graph.add_slot(SlotSpec::input("in", PayloadKind::Object)).unwrap();
        graph.add_slot(SlotSpec::output("h", PayloadKind::Object)).unwrap();
        graph.add_slot(SlotSpec::output("out", PayloadKind::Object)).unwrap();
        graph
            .add_task(TaskSpec::new("b", Sometimes(Arc::clone(&trace))).input("in").output("h"))
            .unwrap();
        graph
            .add_task(TaskSpec::new("c", Recorder::new("c", &trace, 1)).input("h").output("out"))
            .unwrap();
        graph.validate().unwrap();

        let mut run = RunContext::new("out");
        let mut propagator = Propagator::new();
        propagator.process_event(&mut graph, &mut run, event(1)).unwrap();
        assert_eq!(taken(&trace), ["b", "c"]);
        propagator.process_event(&mut graph, &mut run, event(2)).unwrap();
        assert_eq!(taken(&trace), ["b"]);
    }

    #[test]
    fn test_break_stops_the_current_event_only() {
        let trace = Trace::default();
        let mut graph = Graph::new();
        graph.add_slot(SlotSpec::input("in", PayloadKind::Object)).unwrap();
        graph.add_slot(SlotSpec::exchange("h", PayloadKind::Object)).unwrap();
        graph.add_slot(SlotSpec::output("out", PayloadKind::Object)).unwrap();
        let mut selector = Recorder::new("select", &trace, 1);
        selector.break_on = Some(1);
        graph
            .add_task(TaskSpec::new("select", selector).input("in").output("h"))
            .unwrap();
        graph
            .add_task(TaskSpec::new("fill", Recorder::new("fill", &trace, 1)).input("h").output("out"))
            .unwrap();
        graph
            .add_task(TaskSpec::new("other", Recorder::new("other", &trace, 0)).input("in"))
            .unwrap();
        graph.validate().unwrap();

        let mut run = RunContext::new("out");
        let mut propagator = Propagator::new();

        let outcome = propagator.process_event(&mut graph, &mut run, event(1)).unwrap();
        assert!(outcome.broken);
        assert_eq!(taken(&trace), ["select"]);
        // "h" was posted but its consumer never ran
        assert!(!graph.slot_by_name("h").unwrap().has_data());
        assert!(!graph.slot_by_name("in").unwrap().has_data());

        let outcome = propagator.process_event(&mut graph, &mut run, event(2)).unwrap();
        assert!(!outcome.broken);
        assert_eq!(taken(&trace), ["select", "fill", "other"]);
        assert_eq!(run.counters().processed, 2);
    }

    #[test]
    fn test_task_failure_is_returned_with_task_name() {
        let mut graph = Graph::new();
        graph.add_slot(SlotSpec::input("in", PayloadKind::Object)).unwrap();
        graph.add_task(TaskSpec::new("calib", Failing).input("in")).unwrap();
        graph.validate().unwrap();

        let mut run = RunContext::new("out");
        let err = Propagator::new()
            .process_event(&mut graph, &mut run, event(1))
            .unwrap_err();
        match err {
            ExecutionError::TaskFailed { task, source } => {
                assert_eq!(task, "calib");
                assert_eq!(source.to_string(), "detector map missing");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_unvalidated_graph_is_rejected() {
        let mut graph = Graph::new();
        let mut run = RunContext::new("out");
        assert!(matches!(
            Propagator::new().process_event(&mut graph, &mut run, event(1)),
            Err(ExecutionError::NotValidated)
        ));
    }

    #[test]
    fn test_event_of_wrong_kind_is_a_slot_error() {
        let mut graph = Graph::new();
        graph.add_slot(SlotSpec::input("in", PayloadKind::Collection)).unwrap();
        graph
            .add_task(TaskSpec::new("t", Recorder::new("t", &Trace::default(), 0)).input("in"))
            .unwrap();
        graph.validate().unwrap();

        let mut run = RunContext::new("out");
        assert!(matches!(
            Propagator::new().process_event(&mut graph, &mut run, event(1)),
            Err(ExecutionError::Slot(_))
        ));
    }

    #[test]
    fn test_post_loop_tasks_run_once_and_chain() {
        let trace = Trace::default();
        let mut graph = Graph::new();
        graph.add_slot(SlotSpec::input("in", PayloadKind::Object)).unwrap();
        graph.add_slot(SlotSpec::output("h", PayloadKind::Object)).unwrap();
        graph.add_slot(SlotSpec::output("fit", PayloadKind::Object)).unwrap();
        graph.add_slot(SlotSpec::output("report", PayloadKind::Object)).unwrap();
        graph
            .add_task(TaskSpec::new("a", Recorder::new("a", &trace, 1)).input("in").output("h"))
            .unwrap();
        graph
            .add_task(
                TaskSpec::new("fit", Recorder::new("fit", &trace, 1))
                    .input("h")
                    .output("fit")
                    .post_loop(),
            )
            .unwrap();
        graph
            .add_task(
                TaskSpec::new("report", Recorder::new("report", &trace, 1))
                    .input("fit")
                    .output("report")
                    .post_loop(),
            )
            .unwrap();
        graph.validate().unwrap();

        let mut run = RunContext::new("out");
        let mut propagator = Propagator::new();
        propagator.process_event(&mut graph, &mut run, event(1)).unwrap();
        assert_eq!(taken(&trace), ["a"]);

        assert_eq!(propagator.run_post_loop(&mut graph, &mut run).unwrap(), 2);
        assert_eq!(taken(&trace), ["fit", "report"]);

        assert_eq!(propagator.run_post_loop(&mut graph, &mut run).unwrap(), 0);
        assert!(taken(&trace).is_empty());
    }
}
