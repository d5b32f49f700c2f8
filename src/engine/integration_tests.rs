// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::json;

use crate::engine::{
    MergeCoordinator, OutputFinalizer, Propagator, RunContext, Wrapper, WrapperContent, WrapperSet,
};
use crate::errors::MergeError;
use crate::graph::{Graph, Payload, PayloadKind, SlotSpec, TaskSpec};
use crate::tasks::{entries, EventCounter};
use crate::traits::{Task, TaskContext};

/// Post-loop task counting how often it ran; posts what it saw on input 0.
struct Summarize {
    runs: Arc<AtomicUsize>,
}

impl Task for Summarize {
    fn exec(&mut self, ctx: &mut TaskContext<'_>) -> anyhow::Result<()> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        let seen = entries(ctx.input(0)?)?;
        ctx.post(0, Payload::Object(json!({ "seen": seen })))?;
        Ok(())
    }
}

/// in -> count -> [h] -> summarize (post-loop) -> [s]
fn worker_graph(runs: &Arc<AtomicUsize>, h_locator: Option<&str>) -> Graph {
    let mut graph = Graph::new();
    graph.add_slot(SlotSpec::input("in", PayloadKind::Object)).unwrap();
    let h = SlotSpec::output("h", PayloadKind::Object);
    let h = match h_locator {
        Some(locator) => h.with_locator(locator),
        None => h,
    };
    graph.add_slot(h).unwrap();
    graph.add_slot(SlotSpec::output("s", PayloadKind::Object)).unwrap();
    graph
        .add_task(TaskSpec::new("count", EventCounter::new()).input("in").output("h"))
        .unwrap();
    graph
        .add_task(
            TaskSpec::new(
                "summarize",
                Summarize {
                    runs: Arc::clone(runs),
                },
            )
            .input("h")
            .output("s")
            .post_loop(),
        )
        .unwrap();
    graph.validate().unwrap();
    graph
}

/// Run worker `index` over `events` empty events and pack its outputs.
fn run_worker(graph: &mut Graph, parent: &Path, index: usize, events: usize) -> WrapperSet {
    let mut run = RunContext::for_worker(parent, index);
    graph.create_outputs(&mut run).unwrap();
    let mut propagator = Propagator::new();
    for _ in 0..events {
        run.counters_mut().consumed += 1;
        propagator
            .process_event(graph, &mut run, Payload::Object(json!({})))
            .unwrap();
    }
    graph.finish(&mut run).unwrap();
    MergeCoordinator::new().export(graph, &run).unwrap()
}

fn slot_entries(graph: &Graph, name: &str) -> u64 {
    entries(graph.slot_by_name(name).unwrap().data().unwrap()).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_workers_merge_into_client_and_post_loop_runs_once() {
        let dir = TempDir::new().unwrap();
        let worker_runs = Arc::new(AtomicUsize::new(0));
        let sets = vec![
            run_worker(&mut worker_graph(&worker_runs, None), dir.path(), 0, 4),
            run_worker(&mut worker_graph(&worker_runs, None), dir.path(), 1, 3),
        ];
        assert_eq!(worker_runs.load(Ordering::SeqCst), 0);
        assert!(sets.iter().all(|set| set.get("s").is_none()));

        let runs = Arc::new(AtomicUsize::new(0));
        let mut client = worker_graph(&runs, None);
        let mut run = RunContext::new(dir.path());
        let report = MergeCoordinator::new().merge(&mut client, &mut run, &sets).unwrap();

        assert_eq!(report.import.imported, ["h"]);
        assert!(report.import.mismatches.is_empty());
        assert_eq!(report.import.counters.consumed, 7);
        assert_eq!(report.import.counters.processed, 7);
        // the caller decides whether imported counters count
        assert_eq!(run.counters().consumed, 0);
        assert_eq!(report.post_loop_executed, 1);
        assert_eq!(slot_entries(&client, "h"), 7);
        assert_eq!(
            client.slot_by_name("s").unwrap().data().unwrap(),
            &Payload::Object(json!({ "seen": 7 }))
        );
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_merging_the_same_sets_twice_changes_nothing() {
        let dir = TempDir::new().unwrap();
        let runs = Arc::new(AtomicUsize::new(0));
        let sets = vec![
            run_worker(&mut worker_graph(&runs, Some("hist.json#counts")), dir.path(), 0, 2),
            run_worker(&mut worker_graph(&runs, Some("hist.json#counts")), dir.path(), 1, 5),
        ];

        let mut client = worker_graph(&runs, None);
        let mut run = RunContext::new(dir.path());
        let mut coordinator = MergeCoordinator::new();

        let first = coordinator.merge(&mut client, &mut run, &sets).unwrap();
        let after_first = client.slot_by_name("h").unwrap().data().unwrap().clone();
        let second = coordinator.merge(&mut client, &mut run, &sets).unwrap();

        assert_eq!(first.post_loop_executed, 1);
        assert_eq!(second.post_loop_executed, 0);
        assert_eq!(client.slot_by_name("h").unwrap().data().unwrap(), &after_first);
        assert_eq!(slot_entries(&client, "h"), 7);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_sequential_imports_do_not_rerun_post_loop_task() {
        let dir = TempDir::new().unwrap();
        let runs = Arc::new(AtomicUsize::new(0));
        let first = run_worker(&mut worker_graph(&runs, None), dir.path(), 0, 2);
        let second = run_worker(&mut worker_graph(&runs, None), dir.path(), 1, 3);

        let mut client = worker_graph(&runs, None);
        let mut run = RunContext::new(dir.path());
        let mut coordinator = MergeCoordinator::new();

        let report = coordinator.merge(&mut client, &mut run, &[first]).unwrap();
        assert_eq!(report.post_loop_executed, 1);
        let report = coordinator.merge(&mut client, &mut run, &[second]).unwrap();
        assert_eq!(report.post_loop_executed, 0);

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(slot_entries(&client, "h"), 3);
    }

    #[test]
    fn test_missing_wrapper_is_reported_and_import_continues() {
        let dir = TempDir::new().unwrap();
        let mut graph = Graph::new();
        graph.add_slot(SlotSpec::input("in", PayloadKind::Object)).unwrap();
        graph.add_slot(SlotSpec::output("h", PayloadKind::Object)).unwrap();
        graph.add_slot(SlotSpec::output("g", PayloadKind::Object)).unwrap();
        graph
            .add_task(TaskSpec::new("count_h", EventCounter::new()).input("in").output("h"))
            .unwrap();
        graph
            .add_task(TaskSpec::new("count_g", EventCounter::new()).input("in").output("g"))
            .unwrap();
        graph.validate().unwrap();

        let set = WrapperSet {
            worker: Some(0),
            wrappers: vec![Wrapper {
                name: "g".to_string(),
                kind: PayloadKind::Object,
                content: WrapperContent::Inline {
                    payload: Payload::Object(json!({ "entries": 4 })),
                },
            }],
            ..WrapperSet::default()
        };

        let run = RunContext::new(dir.path());
        let report = MergeCoordinator::new().import(&mut graph, &run, &[set]).unwrap();

        assert_eq!(report.imported, ["g"]);
        assert!(matches!(
            report.mismatches.as_slice(),
            [MergeError::Mismatch { slot }] if slot == "h"
        ));
        assert!(!graph.slot_by_name("h").unwrap().has_data());
        assert_eq!(slot_entries(&graph, "g"), 4);
    }

    #[test]
    fn test_wrong_kind_on_import_is_an_error() {
        let dir = TempDir::new().unwrap();
        let runs = Arc::new(AtomicUsize::new(0));
        let mut client = worker_graph(&runs, None);
        let set = WrapperSet {
            wrappers: vec![Wrapper {
                name: "h".to_string(),
                kind: PayloadKind::Collection,
                content: WrapperContent::Inline {
                    payload: Payload::Collection(vec![]),
                },
            }],
            ..WrapperSet::default()
        };

        let run = RunContext::new(dir.path());
        let err = MergeCoordinator::new().import(&mut client, &run, &[set]).unwrap_err();
        assert!(matches!(err, MergeError::KindMismatch { slot, .. } if slot == "h"));
    }

    #[test]
    fn test_remote_file_wrappers_are_staged_and_cleaned_up() {
        let remote = TempDir::new().unwrap();
        let local = TempDir::new().unwrap();
        let runs = Arc::new(AtomicUsize::new(0));
        let set = run_worker(&mut worker_graph(&runs, Some("hist.json#counts")), remote.path(), 0, 6);
        assert!(matches!(
            &set.get("h").unwrap().content,
            WrapperContent::File { path, folder } if path.starts_with(remote.path()) && folder == "counts"
        ));

        let mut client = worker_graph(&runs, Some("hist.json#counts"));
        let mut run = RunContext::new(local.path());
        MergeCoordinator::new().merge(&mut client, &mut run, &[set]).unwrap();

        assert_eq!(slot_entries(&client, "h"), 6);
        assert!(!local.path().join(".merge").exists());
    }

    #[test]
    fn test_extra_files_are_recreated_then_appended_once() {
        let dir = TempDir::new().unwrap();
        let mut sets = Vec::new();
        for worker in 0..2 {
            let worker_dir = dir.path().join(format!("worker-{worker}"));
            std::fs::create_dir_all(&worker_dir).unwrap();
            let log = worker_dir.join("qa.log");
            std::fs::write(&log, format!("worker {worker}\n")).unwrap();
            sets.push(WrapperSet {
                worker: Some(worker),
                extra_files: vec![log],
                ..WrapperSet::default()
            });
        }
        std::fs::write(dir.path().join("qa.log"), "stale\n").unwrap();

        let runs = Arc::new(AtomicUsize::new(0));
        let mut client = worker_graph(&runs, None);
        let run = RunContext::new(dir.path());
        let mut coordinator = MergeCoordinator::new();
        let report = coordinator.import(&mut client, &run, &sets).unwrap();
        coordinator.import(&mut client, &run, &sets).unwrap();

        assert_eq!(report.extra_files, [dir.path().join("qa.log")]);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("qa.log")).unwrap(),
            "worker 0\nworker 1\n"
        );
    }

    #[test]
    fn test_shared_output_file_holds_every_folder() {
        let dir = TempDir::new().unwrap();
        let mut graph = Graph::new();
        graph.add_slot(SlotSpec::input("in", PayloadKind::Object)).unwrap();
        graph
            .add_slot(SlotSpec::output("n_all", PayloadKind::Object).with_locator("counts.json#all"))
            .unwrap();
        graph
            .add_slot(SlotSpec::output("n_again", PayloadKind::Object).with_locator("counts.json#again"))
            .unwrap();
        graph
            .add_task(TaskSpec::new("all", EventCounter::new()).input("in").output("n_all"))
            .unwrap();
        graph
            .add_task(TaskSpec::new("again", EventCounter::new()).input("in").output("n_again"))
            .unwrap();
        graph.validate().unwrap();

        let worker_dir = dir.path().join("worker-0");
        std::fs::create_dir_all(&worker_dir).unwrap();
        std::fs::write(worker_dir.join("counts.json"), "left over").unwrap();

        let set = run_worker(&mut graph, dir.path(), 0, 2);
        let store = crate::engine::ObjectStore::open(worker_dir.join("counts.json")).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.get("all", "n_all"), Some(&Payload::Object(json!({ "entries": 2 }))));
        assert_eq!(set.wrappers.len(), 2);
    }

    #[test]
    fn test_client_finalize_after_merge() {
        let dir = TempDir::new().unwrap();
        let runs = Arc::new(AtomicUsize::new(0));
        let sets = vec![
            run_worker(&mut worker_graph(&runs, Some("hist.json#counts")), dir.path(), 0, 3),
            run_worker(&mut worker_graph(&runs, Some("hist.json#counts")), dir.path(), 1, 3),
        ];

        let mut client = worker_graph(&runs, Some("hist.json#counts"));
        let mut run = RunContext::new(dir.path());
        let report = MergeCoordinator::new().merge(&mut client, &mut run, &sets).unwrap();
        run.counters_mut().add(&report.import.counters);
        client.terminate(&mut run).unwrap();

        let finalized = OutputFinalizer::default().finalize(&client, &run).unwrap();
        assert_eq!(
            finalized.files,
            [dir.path().join("hist.json"), dir.path().join("results.json")]
        );
        assert_eq!(finalized.stat_file, dir.path().join("6_6_0_0.stat"));
        assert!(dir.path().join("outputs_valid").is_file());
    }
}
