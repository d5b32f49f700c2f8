// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use super::*;
use crate::engine::Propagator;
use crate::errors::ValidationError;
use serde_json::json;
use tempfile::TempDir;

/// Posts `{"n": <event number>}` to its first output, if it has one.
struct Post {
    outputs: bool,
}

impl Task for Post {
    fn exec(&mut self, ctx: &mut TaskContext<'_>) -> anyhow::Result<()> {
        if self.outputs {
            ctx.post(0, Payload::Object(json!({ "n": ctx.event_number() })))?;
        }
        Ok(())
    }
}

fn task(name: &str) -> TaskSpec {
    TaskSpec::new(name, Post { outputs: true })
}

fn sink(name: &str) -> TaskSpec {
    TaskSpec::new(name, Post { outputs: false })
}

fn graph_with(slots: &[SlotSpec]) -> Graph {
    let mut graph = Graph::new();
    for spec in slots {
        graph.add_slot(spec.clone()).unwrap();
    }
    graph
}

fn input(name: &str) -> SlotSpec {
    SlotSpec::input(name, PayloadKind::Object)
}

fn exchange(name: &str) -> SlotSpec {
    SlotSpec::exchange(name, PayloadKind::Object)
}

fn output(name: &str) -> SlotSpec {
    SlotSpec::output(name, PayloadKind::Object)
}

fn validation_errors(result: Result<ValidationReport, GraphError>) -> Vec<ValidationError> {
    match result {
        Err(GraphError::Validation(errors)) => errors,
        other => panic!("expected validation failure, got {other:?}"),
    }
}

#[test]
fn test_entry_tasks_read_only_declared_inputs() {
    let mut graph = graph_with(&[input("in"), input("calib"), exchange("h"), output("out")]);
    graph.add_task(task("a").input("in").input("calib").output("h")).unwrap();
    graph.add_task(task("b").input("h").input("in").output("out")).unwrap();

    let report = graph.validate().unwrap();

    assert_eq!(report.entry_nodes, ["a"]);
    assert_eq!(graph.entry_nodes(), &[graph.task_id("a").unwrap()]);
    assert!(report.orphans.is_empty());
    assert!(graph.node_by_name("b").unwrap().is_used());
    assert_eq!(
        graph.slot_by_name("h").unwrap().consumers(),
        &[graph.task_id("b").unwrap()]
    );
}

#[test]
fn test_zombies_cascade_to_their_consumers() {
    let mut graph = graph_with(&[input("in"), exchange("x"), exchange("y"), output("out")]);
    graph.add_task(task("reader").input("missing").output("x")).unwrap();
    graph.add_task(task("downstream").input("x").output("y")).unwrap();
    graph.add_task(task("healthy").input("in").output("out")).unwrap();

    let report = graph.validate().unwrap();

    assert_eq!(report.zombies, ["reader", "downstream"]);
    assert_eq!(report.entry_nodes, ["healthy"]);
    assert!(graph.node_by_name("downstream").unwrap().is_zombie());
    assert!(report.warnings.contains(&ValidationError::ZombieNode {
        task: "downstream".to_string(),
        input: "x".to_string(),
    }));
    assert!(report.warnings.iter().all(|w| !w.is_fatal()));
}

#[test]
fn test_unreachable_task_is_reported_as_orphan() {
    let mut graph = graph_with(&[input("in"), output("out"), output("late")]);
    graph.add_task(task("a").input("in").output("out")).unwrap();
    // post-loop tasks are never entries, and nothing upstream produces "in"
    graph.add_task(task("stray").input("in").output("late").post_loop()).unwrap();

    let report = graph.validate().unwrap();

    assert_eq!(report.orphans, ["stray"]);
    assert_eq!(
        report.warnings,
        vec![ValidationError::OrphanNode {
            task: "stray".to_string()
        }]
    );
}

#[test]
fn test_cycle_is_fatal_and_names_the_path() {
    let mut graph = graph_with(&[input("in"), exchange("x"), exchange("y"), output("out")]);
    graph.add_task(task("entry").input("in").output("out")).unwrap();
    graph.add_task(task("a").input("in").input("y").output("x")).unwrap();
    graph.add_task(task("b").input("x").output("y")).unwrap();

    let errors = validation_errors(graph.validate());

    assert!(errors.contains(&ValidationError::CyclicDependency {
        cycle: vec!["a".to_string(), "b".to_string(), "a".to_string()],
    }));
    assert!(!graph.is_validated());
}

#[test]
fn test_graph_without_entry_task_is_rejected() {
    let mut graph = graph_with(&[input("in"), output("out")]);
    graph.add_task(task("a").input("nowhere").output("out")).unwrap();

    let errors = validation_errors(graph.validate());
    assert_eq!(errors, vec![ValidationError::NoEntryNodes]);
}

#[test]
fn test_slots_read_by_post_loop_tasks_are_promoted() {
    let mut graph = graph_with(&[input("in"), exchange("h"), output("summary")]);
    graph.add_task(task("a").input("in").output("h")).unwrap();
    graph.add_task(task("b").input("h").output("summary").post_loop()).unwrap();

    let report = graph.validate().unwrap();

    assert_eq!(report.promoted_slots, ["h"]);
    let h = graph.slot_by_name("h").unwrap();
    assert!(h.is_output());
    assert!(h.is_post_loop());
    assert!(!h.owns_data());
    assert!(graph.is_exported(h.id()));
    // produced after the event loop, so never packed by a worker
    assert!(!graph.is_exported(graph.slot_id("summary").unwrap()));
}

#[test]
fn test_failed_validation_rolls_back_promotion() {
    let mut graph = graph_with(&[
        input("in"),
        exchange("h"),
        output("summary"),
        output("hist").with_locator("#histograms"),
    ]);
    graph.add_task(task("a").input("in").output("h").output("hist")).unwrap();
    graph.add_task(task("b").input("h").output("summary").post_loop()).unwrap();

    let errors = validation_errors(graph.validate());
    assert_eq!(
        errors,
        vec![ValidationError::MissingFileLocator {
            slot: "hist".to_string()
        }]
    );

    let h = graph.slot_by_name("h").unwrap();
    assert!(!h.is_output());
    assert!(h.owns_data());
}

#[test]
fn test_file_slot_without_file_is_rejected() {
    let mut graph = graph_with(&[
        input("in"),
        output("h").with_locator("#histograms"),
    ]);
    graph.add_task(task("a").input("in").output("h")).unwrap();

    let errors = validation_errors(graph.validate());
    assert_eq!(
        errors,
        vec![ValidationError::MissingFileLocator {
            slot: "h".to_string()
        }]
    );
}

#[test]
fn test_default_locator_is_handler_owned() {
    let graph = graph_with(&[
        output("tree").with_locator("default"),
        output("h").with_locator("hist.json#pt"),
    ]);
    assert_eq!(graph.slot_by_name("tree").unwrap().storage(), &SlotStorage::Handler);
    assert!(!graph.slot_by_name("tree").unwrap().is_special());
    assert_eq!(
        graph.slot_by_name("h").unwrap().storage().file_locator(),
        Some(&FileLocator {
            file: "hist.json".to_string(),
            folder: "pt".to_string(),
        })
    );
}

#[test]
fn test_registration_errors() {
    let mut graph = graph_with(&[input("in"), output("out")]);

    assert!(matches!(
        graph.add_slot(output("out")),
        Err(GraphError::DuplicateSlot(name)) if name == "out"
    ));
    assert!(matches!(
        graph.add_task(task("a").input("in").output("nowhere")),
        Err(GraphError::UnknownOutputSlot { .. })
    ));
    assert!(matches!(
        graph.add_task(task("a").output("in")),
        Err(GraphError::ProducesInputSlot { .. })
    ));

    graph.add_task(task("a").input("in").output("out")).unwrap();
    assert!(matches!(
        graph.add_task(sink("a").input("in")),
        Err(GraphError::DuplicateTask(name)) if name == "a"
    ));
    assert!(matches!(
        graph.add_task(task("b").input("in").output("out")),
        Err(GraphError::MultipleProducers { existing, .. }) if existing == "a"
    ));

    graph.validate().unwrap();
    assert!(matches!(graph.add_slot(output("late")), Err(GraphError::AlreadyValidated)));
    assert!(matches!(graph.validate(), Err(GraphError::AlreadyValidated)));
}

#[test]
fn test_hooks_refuse_an_unvalidated_graph() {
    let dir = TempDir::new().unwrap();
    let mut graph = graph_with(&[input("in"), output("out")]);
    graph.add_task(task("a").input("in").output("out")).unwrap();

    let mut run = RunContext::new(dir.path());
    assert!(matches!(
        graph.create_outputs(&mut run),
        Err(ExecutionError::NotValidated)
    ));
}

/// in -> a -> [h] -> b (post-loop) -> [s]
#[test]
fn test_post_loop_consumer_waits_for_the_end_of_the_run() {
    let dir = TempDir::new().unwrap();
    let mut graph = graph_with(&[input("in"), exchange("h"), output("s")]);
    graph.add_task(task("a").input("in").output("h")).unwrap();
    graph.add_task(task("b").input("h").output("s").post_loop()).unwrap();
    graph.validate().unwrap();

    let mut run = RunContext::new(dir.path());
    let mut propagator = Propagator::new();
    for _ in 0..3 {
        let outcome = propagator
            .process_event(&mut graph, &mut run, Payload::Object(json!({})))
            .unwrap();
        assert_eq!(outcome.executed, 1);
    }
    assert!(!graph.slot_by_name("s").unwrap().has_data());
    // h is kept for the merge, not evicted after the event
    assert!(graph.slot_by_name("h").unwrap().has_data());

    assert_eq!(propagator.run_post_loop(&mut graph, &mut run).unwrap(), 1);
    assert_eq!(
        graph.slot_by_name("s").unwrap().data().unwrap(),
        &Payload::Object(json!({ "n": 3 }))
    );
}
