// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! One-shot graph validation, run before the first event.
//!
//! # Validation Pipeline
//!
//! 1. **Input resolution**: every declared input name must name a registered
//!    slot that is either a declared input or has a live producer. A task that
//!    fails is marked [`TaskState::Zombie`]; this repeats until nothing changes,
//!    so tasks fed only by zombies become zombies too.
//! 2. **Consumer registration**: live tasks are registered on their input slots.
//! 3. **Entry detection**: live per-event tasks reading only declared inputs.
//!    None at all is fatal.
//! 4. **Reachability**: DFS from the entry tasks marks tasks as used; the rest
//!    are reported as orphans (warning only).
//! 5. **Cycle detection**: three-colour DFS with a recursion stack, started from
//!    the entry tasks and then from every remaining live task.
//! 6. **Post-loop promotion**: every slot feeding a post-loop task joins the
//!    kept-for-merge output set.
//! 7. **Locators**: file-resident slots need a non-empty `file#folder`.
//!
//! Fatal findings are accumulated and returned together, like the other
//! configuration checks in this crate.

use std::collections::HashSet;

use crate::errors::ValidationError;
use crate::graph::{Graph, SlotId, SlotStorage, TaskId, TaskState};
use crate::observability::messages::validation::{
    CyclicDependencyDetected, GraphValidated, NoEntryTasks, OrphanTaskDetected, SlotPromoted,
    ZombieTaskDetected,
};
use crate::observability::messages::StructuredLog;

/// What validation found on a graph that is fit to run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    /// Entry tasks in registration order.
    pub entry_nodes: Vec<String>,
    pub zombies: Vec<String>,
    pub orphans: Vec<String>,
    /// Slots added to the output set because a post-loop task reads them.
    pub promoted_slots: Vec<String>,
    /// Non-fatal findings (zombie and orphan tasks).
    pub warnings: Vec<ValidationError>,
}

pub struct GraphValidator;

impl GraphValidator {
    /// Validate `graph` in place.
    ///
    /// On success the graph is frozen, its entry tasks are known and zombie
    /// tasks are excluded from execution for good.
    pub fn validate(graph: &mut Graph) -> Result<ValidationReport, Vec<ValidationError>> {
        let mut report = ValidationReport::default();
        let mut errors = Vec::new();

        Self::reset(graph);
        Self::resolve_inputs(graph, &mut report);
        Self::register_consumers(graph);

        let entries = Self::entry_nodes(graph);
        if entries.is_empty() {
            NoEntryTasks {
                task_count: graph.nodes.len(),
                zombie_count: report.zombies.len(),
            }
            .log();
            errors.push(ValidationError::NoEntryNodes);
        }

        Self::mark_reachable(graph, &entries);
        for node in graph.live_nodes() {
            if !node.used {
                OrphanTaskDetected { task: &node.name }.log();
                report.orphans.push(node.name.clone());
                report.warnings.push(ValidationError::OrphanNode {
                    task: node.name.clone(),
                });
            }
        }

        if let Some(cycle) = Self::find_cycle(graph, &entries) {
            let names: Vec<&str> = cycle.iter().map(|s| s.as_str()).collect();
            CyclicDependencyDetected { cycle: &names }.log();
            errors.push(ValidationError::CyclicDependency { cycle });
        }

        Self::promote_post_loop_inputs(graph, &mut report);

        for slot in &graph.slots {
            if let SlotStorage::File(locator) = &slot.storage {
                if locator.is_empty() {
                    errors.push(ValidationError::MissingFileLocator {
                        slot: slot.name.clone(),
                    });
                }
            }
        }

        if !errors.is_empty() {
            Self::demote(graph);
            return Err(errors);
        }

        report.entry_nodes = entries
            .iter()
            .map(|id| graph.node(*id).name.clone())
            .collect();
        graph.entry_nodes = entries;
        graph.validated = true;

        GraphValidated {
            task_count: graph.nodes.len(),
            slot_count: graph.slots.len(),
            entry_count: report.entry_nodes.len(),
            zombie_count: report.zombies.len(),
            orphan_count: report.orphans.len(),
        }
        .log();
        Ok(report)
    }

    fn reset(graph: &mut Graph) {
        for node in &mut graph.nodes {
            node.state = TaskState::Idle;
            node.used = false;
            node.inputs.clear();
        }
        for slot in &mut graph.slots {
            slot.consumers.clear();
            slot.post_loop = false;
        }
        Self::demote(graph);
    }

    /// Undo post-loop promotion, back to the slots as declared.
    fn demote(graph: &mut Graph) {
        for slot in graph.slots.iter_mut().filter(|slot| slot.promoted) {
            slot.output = false;
            slot.owns_data = true;
            slot.promoted = false;
        }
    }

    /// Mark tasks whose inputs cannot be resolved as zombies, to a fixpoint.
    fn resolve_inputs(graph: &mut Graph, report: &mut ValidationReport) {
        loop {
            let mut changed = false;
            for index in 0..graph.nodes.len() {
                if graph.nodes[index].is_zombie() {
                    continue;
                }
                let unresolved = graph.nodes[index]
                    .input_names
                    .iter()
                    .find(|name| !Self::resolves(graph, name))
                    .cloned();
                if let Some(input) = unresolved {
                    let node = &mut graph.nodes[index];
                    node.state = TaskState::Zombie;
                    ZombieTaskDetected {
                        task: &node.name,
                        input: &input,
                    }
                    .log();
                    report.zombies.push(node.name.clone());
                    report.warnings.push(ValidationError::ZombieNode {
                        task: node.name.clone(),
                        input,
                    });
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }

        for index in 0..graph.nodes.len() {
            if graph.nodes[index].is_zombie() {
                continue;
            }
            let inputs: Vec<SlotId> = graph.nodes[index]
                .input_names
                .iter()
                .filter_map(|name| graph.slot_index.get(name).copied())
                .collect();
            graph.nodes[index].inputs = inputs;
        }
    }

    fn resolves(graph: &Graph, name: &str) -> bool {
        let Some(id) = graph.slot_index.get(name) else {
            return false;
        };
        let slot = graph.slot(*id);
        slot.input || slot.producer.is_some_and(|p| !graph.node(p).is_zombie())
    }

    fn register_consumers(graph: &mut Graph) {
        for index in 0..graph.nodes.len() {
            let node = &graph.nodes[index];
            if node.is_zombie() {
                continue;
            }
            for slot in &node.inputs {
                let consumers = &mut graph.slots[slot.0 as usize].consumers;
                if !consumers.contains(&node.id) {
                    consumers.push(node.id);
                }
            }
        }
    }

    fn entry_nodes(graph: &Graph) -> Vec<TaskId> {
        graph
            .live_nodes()
            .filter(|node| !node.post_loop)
            .filter(|node| node.inputs.iter().all(|slot| graph.slot(*slot).input))
            .map(|node| node.id)
            .collect()
    }

    /// Downstream tasks of `id`: the consumers of each of its outputs, in order.
    fn dependents(graph: &Graph, id: TaskId) -> impl Iterator<Item = TaskId> + '_ {
        graph
            .node(id)
            .outputs
            .iter()
            .flat_map(move |slot| graph.slot(*slot).consumers.iter().copied())
    }

    fn mark_reachable(graph: &mut Graph, entries: &[TaskId]) {
        let mut stack: Vec<TaskId> = entries.to_vec();
        let mut seen: HashSet<TaskId> = HashSet::new();
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            stack.extend(Self::dependents(graph, id).filter(|d| !seen.contains(d)));
        }
        for id in seen {
            graph.nodes[id.0 as usize].used = true;
        }
    }

    /// Returns the task names along the first cycle found, closed on its start.
    fn find_cycle(graph: &Graph, entries: &[TaskId]) -> Option<Vec<String>> {
        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();
        let mut path = Vec::new();

        let roots = entries
            .iter()
            .copied()
            .chain(graph.live_nodes().map(|n| n.id));
        for root in roots {
            if visited.contains(&root) {
                continue;
            }
            if let Some(cycle) = Self::dfs_cycle(graph, root, &mut visited, &mut rec_stack, &mut path) {
                return Some(
                    cycle
                        .into_iter()
                        .map(|id| graph.node(id).name.clone())
                        .collect(),
                );
            }
        }
        None
    }

    fn dfs_cycle(
        graph: &Graph,
        node: TaskId,
        visited: &mut HashSet<TaskId>,
        rec_stack: &mut HashSet<TaskId>,
        path: &mut Vec<TaskId>,
    ) -> Option<Vec<TaskId>> {
        visited.insert(node);
        rec_stack.insert(node);
        path.push(node);

        for next in Self::dependents(graph, node) {
            if !visited.contains(&next) {
                if let Some(cycle) = Self::dfs_cycle(graph, next, visited, rec_stack, path) {
                    return Some(cycle);
                }
            } else if rec_stack.contains(&next) {
                let start = path.iter().position(|id| *id == next).unwrap_or(0);
                let mut cycle = path[start..].to_vec();
                cycle.push(next);
                return Some(cycle);
            }
        }

        rec_stack.remove(&node);
        path.pop();
        None
    }

    fn promote_post_loop_inputs(graph: &mut Graph, report: &mut ValidationReport) {
        let post_loop_inputs: Vec<_> = graph
            .live_nodes()
            .filter(|node| node.post_loop)
            .flat_map(|node| node.inputs.iter().copied())
            .collect();

        for id in post_loop_inputs {
            let slot = &mut graph.slots[id.0 as usize];
            if slot.input || slot.output {
                continue;
            }
            slot.output = true;
            slot.owns_data = false;
            slot.promoted = true;
            SlotPromoted { slot: &slot.name }.log();
            report.promoted_slots.push(slot.name.clone());
        }

        for index in 0..graph.slots.len() {
            let slot = &graph.slots[index];
            let post_loop = !slot.consumers.is_empty()
                && slot.consumers.iter().all(|c| graph.node(*c).post_loop);
            graph.slots[index].post_loop = post_loop;
        }
    }
}
