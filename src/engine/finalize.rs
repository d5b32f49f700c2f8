// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! End-of-run output handling: result files, the `.stat` summary and the
//! run-completion sentinel.
//!
//! The sentinel is a zero-byte file written only after every output file was
//! written and read back successfully. Its absence is the authoritative
//! failure signal for whoever collects the run.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::RunConfig;
use crate::engine::{RunContext, WrittenFiles};
use crate::engine::store::ObjectStore;
use crate::errors::{BackendError, MergeError, OutputValidationError};
use crate::graph::{Graph, SlotStorage};
use crate::observability::messages::merge::{OutputsFinalized, SentinelWithheld};
use crate::observability::messages::StructuredLog;

/// Files produced by a successful finalization.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalizeReport {
    pub files: Vec<PathBuf>,
    pub stat_file: PathBuf,
    /// Present when the outputs were marked valid.
    pub sentinel: Option<PathBuf>,
}

/// One object the finalizer wrote and must find again.
struct Written {
    path: PathBuf,
    folder: String,
    name: String,
}

#[derive(Debug, Clone)]
pub struct OutputFinalizer {
    results_file: String,
    sentinel: String,
}

impl OutputFinalizer {
    pub fn new(results_file: impl Into<String>, sentinel: impl Into<String>) -> Self {
        Self {
            results_file: results_file.into(),
            sentinel: sentinel.into(),
        }
    }

    pub fn from_config(cfg: &RunConfig) -> Self {
        Self::new(cfg.results_file.clone(), cfg.sentinel.clone())
    }

    pub fn sentinel_path(&self, output_dir: &Path) -> PathBuf {
        output_dir.join(&self.sentinel)
    }

    /// Write every output slot that holds a payload, the `.stat` file, check
    /// the result and touch the sentinel.
    ///
    /// A stale sentinel from an earlier run is removed before anything is
    /// written, so a failure anywhere leaves the directory unmarked.
    pub fn finalize(&self, graph: &Graph, run: &RunContext) -> Result<FinalizeReport, BackendError> {
        let mut report = self.write_and_check(graph, run)?;
        let sentinel = self.sentinel_path(run.output_dir());
        fs::File::create(&sentinel).map_err(|e| MergeError::io(&sentinel, e))?;
        report.sentinel = Some(sentinel);
        OutputsFinalized {
            output_dir: run.output_dir(),
            files: report.files.len(),
        }
        .log();
        Ok(report)
    }

    /// Like [`finalize`](Self::finalize), but leave the directory unmarked:
    /// the outputs are known to be incomplete.
    pub fn finalize_withheld(
        &self,
        graph: &Graph,
        run: &RunContext,
        reason: &str,
    ) -> Result<FinalizeReport, BackendError> {
        let report = self.write_and_check(graph, run)?;
        SentinelWithheld {
            output_dir: run.output_dir(),
            reason,
        }
        .log();
        Ok(report)
    }

    fn write_and_check(&self, graph: &Graph, run: &RunContext) -> Result<FinalizeReport, BackendError> {
        let output_dir = run.output_dir();
        fs::create_dir_all(output_dir).map_err(|e| MergeError::io(output_dir, e))?;
        self.remove_sentinel(output_dir)?;

        let written = self.write_outputs(graph, run)?;
        let stat_file = self.write_stat_file(run)?;
        Self::validate_outputs(&written)?;
        if !stat_file.is_file() {
            return Err(OutputValidationError::Missing(stat_file).into());
        }

        let mut files: Vec<PathBuf> = Vec::new();
        for object in &written {
            if !files.contains(&object.path) {
                files.push(object.path.clone());
            }
        }
        Ok(FinalizeReport {
            files,
            stat_file,
            sentinel: None,
        })
    }

    /// Make sure `output_dir` is not marked valid, and say why.
    pub fn withhold(&self, output_dir: &Path, reason: &str) -> Result<(), BackendError> {
        self.remove_sentinel(output_dir)?;
        SentinelWithheld { output_dir, reason }.log();
        Ok(())
    }

    fn remove_sentinel(&self, output_dir: &Path) -> Result<(), MergeError> {
        let sentinel = self.sentinel_path(output_dir);
        match fs::remove_file(&sentinel) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(MergeError::io(&sentinel, e)),
        }
    }

    /// File-resident slots go to their own file; in-memory and handler-owned
    /// slots all go to the common results file.
    fn write_outputs(&self, graph: &Graph, run: &RunContext) -> Result<Vec<Written>, MergeError> {
        let mut files = WrittenFiles::new();
        let mut written = Vec::new();
        for slot in graph.output_slots() {
            if !slot.has_data() {
                continue;
            }
            let (file, folder) = match slot.storage() {
                SlotStorage::File(locator) => (locator.file.as_str(), locator.folder.as_str()),
                SlotStorage::Memory | SlotStorage::Handler => (self.results_file.as_str(), ""),
            };
            let path = run.output_dir().join(file);
            files.put_object(&path, folder, slot.name(), slot.data()?.clone())?;
            written.push(Written {
                path,
                folder: folder.to_string(),
                name: slot.name().to_string(),
            });
        }
        Ok(written)
    }

    fn write_stat_file(&self, run: &RunContext) -> Result<PathBuf, MergeError> {
        let counters = run.counters();
        let path = run.output_dir().join(counters.stat_file_name());
        let body = serde_json::to_vec_pretty(counters).map_err(|source| MergeError::Store {
            file: path.clone(),
            source,
        })?;
        fs::write(&path, body).map_err(|e| MergeError::io(&path, e))?;
        Ok(path)
    }

    fn validate_outputs(written: &[Written]) -> Result<(), OutputValidationError> {
        for object in written {
            if !object.path.is_file() {
                return Err(OutputValidationError::Missing(object.path.clone()));
            }
            let store = ObjectStore::open(&object.path).map_err(|e| OutputValidationError::Corrupt {
                file: object.path.clone(),
                reason: e.to_string(),
            })?;
            if store.get(&object.folder, &object.name).is_none() {
                return Err(OutputValidationError::MissingObject {
                    file: object.path.clone(),
                    folder: object.folder.clone(),
                    name: object.name.clone(),
                });
            }
        }
        Ok(())
    }
}

impl Default for OutputFinalizer {
    fn default() -> Self {
        Self::from_config(&RunConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Payload, PayloadKind, SlotSpec, TaskSpec};
    use crate::traits::{Task, TaskContext};
    use serde_json::json;
    use tempfile::TempDir;

    struct Fill;

    impl Task for Fill {
        fn exec(&mut self, ctx: &mut TaskContext<'_>) -> anyhow::Result<()> {
            ctx.post(0, Payload::Object(json!({ "entries": 1 })))?;
            ctx.post(1, Payload::Object(json!({ "counts": [0, 1] })))?;
            Ok(())
        }
    }

    fn graph_with_outputs() -> Graph {
        let mut graph = Graph::new();
        graph.add_slot(SlotSpec::input("in", PayloadKind::Object)).unwrap();
        graph.add_slot(SlotSpec::output("n_events", PayloadKind::Object)).unwrap();
        graph
            .add_slot(SlotSpec::output("h_pt", PayloadKind::Object).with_locator("hist.json#histograms"))
            .unwrap();
        graph
            .add_task(
                TaskSpec::new("fill", Fill)
                    .input("in")
                    .output("n_events")
                    .output("h_pt"),
            )
            .unwrap();
        graph.validate().unwrap();
        graph
    }

    #[test]
    fn test_finalize_writes_files_stat_and_sentinel() {
        let dir = TempDir::new().unwrap();
        let mut graph = graph_with_outputs();
        let mut run = RunContext::new(dir.path());
        crate::engine::Propagator::new()
            .process_event(&mut graph, &mut run, Payload::Object(json!({})))
            .unwrap();
        run.counters_mut().consumed = 1;

        let report = OutputFinalizer::default().finalize(&graph, &run).unwrap();

        assert_eq!(
            report.files,
            vec![dir.path().join("results.json"), dir.path().join("hist.json")]
        );
        assert_eq!(report.stat_file, dir.path().join("1_1_0_0.stat"));
        let sentinel = report.sentinel.unwrap();
        assert_eq!(sentinel, dir.path().join("outputs_valid"));
        assert_eq!(std::fs::metadata(&sentinel).unwrap().len(), 0);

        let hist = ObjectStore::open(dir.path().join("hist.json")).unwrap();
        assert_eq!(
            hist.get("histograms", "h_pt"),
            Some(&Payload::Object(json!({ "counts": [0, 1] })))
        );
    }

    #[test]
    fn test_finalize_withheld_writes_outputs_without_sentinel() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("outputs_valid"), "").unwrap();
        let mut graph = graph_with_outputs();
        let mut run = RunContext::new(dir.path());
        crate::engine::Propagator::new()
            .process_event(&mut graph, &mut run, Payload::Object(json!({})))
            .unwrap();

        let report = OutputFinalizer::default()
            .finalize_withheld(&graph, &run, "worker 1 failed")
            .unwrap();

        assert!(report.sentinel.is_none());
        assert!(!dir.path().join("outputs_valid").exists());
        assert!(dir.path().join("results.json").is_file());
    }

    #[test]
    fn test_withhold_removes_stale_sentinel() {
        let dir = TempDir::new().unwrap();
        let finalizer = OutputFinalizer::new("results.json", "done");
        std::fs::write(dir.path().join("done"), "").unwrap();

        finalizer.withhold(dir.path(), "worker 1 failed").unwrap();
        assert!(!dir.path().join("done").exists());
    }

    #[test]
    fn test_validation_catches_missing_object() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("results.json");
        ObjectStore::create(&path).save().unwrap();

        let err = OutputFinalizer::validate_outputs(&[Written {
            path: path.clone(),
            folder: String::new(),
            name: "n_events".to_string(),
        }])
        .unwrap_err();
        assert!(matches!(err, OutputValidationError::MissingObject { .. }));
    }

    #[test]
    fn test_validation_catches_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("results.json");
        std::fs::write(&path, "not json").unwrap();

        let err = OutputFinalizer::validate_outputs(&[Written {
            path,
            folder: String::new(),
            name: "n_events".to_string(),
        }])
        .unwrap_err();
        assert!(matches!(err, OutputValidationError::Corrupt { .. }));
    }
}
