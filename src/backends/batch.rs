// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Grid-style batch backend: jobs are handed to an external scheduler, and
//! the merging side picks up whatever wrapper files they left behind.
//!
//! In terminate-only mode nothing is submitted; the outputs of an earlier
//! submission are collected and merged.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::backends::worker::{merge_on_client, run_worker, withhold_worker};
use crate::backends::{BackendKind, GraphFactory, RunSummary, SourceFactory};
use crate::config::consts::WORKER_DIR_PREFIX;
use crate::engine::{OutputFinalizer, RunContext, WrapperSet};
use crate::errors::{BackendError, MergeError};
use crate::observability::messages::engine::{EventLoopCompleted, JobsSubmitted, WorkerFailed};
use crate::observability::messages::StructuredLog;
use crate::traits::Backend;

/// File each batch job leaves in its worker directory.
pub const WRAPPERS_FILE: &str = "wrappers.pb";

/// The batch system seen from the merging side.
#[async_trait]
pub trait JobSubmitter: Send + Sync {
    /// Start `workers` jobs writing below `output_dir`. Returns one job id
    /// per worker, in worker order.
    async fn submit(&self, workers: usize, output_dir: &Path) -> anyhow::Result<Vec<String>>;

    /// Block until every job in `jobs` ended. Returns the ids of the jobs
    /// that completed successfully.
    async fn wait_for_completion(&self, jobs: &[String]) -> anyhow::Result<Vec<String>>;

    /// Every wrapper set the jobs left below `output_dir`.
    async fn collect(&self, output_dir: &Path) -> anyhow::Result<Vec<WrapperSet>>;
}

pub struct BatchBackend {
    submitter: Arc<dyn JobSubmitter>,
    graph_factory: GraphFactory,
    workers: usize,
    terminate_only: bool,
    finalizer: OutputFinalizer,
}

impl BatchBackend {
    pub fn new(submitter: Arc<dyn JobSubmitter>, graph_factory: GraphFactory, workers: usize) -> Self {
        Self {
            submitter,
            graph_factory,
            workers: workers.max(1),
            terminate_only: false,
            finalizer: OutputFinalizer::default(),
        }
    }

    pub fn terminate_only(mut self, terminate_only: bool) -> Self {
        self.terminate_only = terminate_only;
        self
    }

    pub fn with_finalizer(mut self, finalizer: OutputFinalizer) -> Self {
        self.finalizer = finalizer;
        self
    }

    pub fn is_terminate_only(&self) -> bool {
        self.terminate_only
    }

    async fn run_inner(&mut self, run: &mut RunContext) -> Result<RunSummary, BackendError> {
        let output_dir = run.output_dir().to_path_buf();
        let mut succeeded: Option<Vec<usize>> = None;
        if !self.terminate_only {
            let jobs = self
                .submitter
                .submit(self.workers, &output_dir)
                .await
                .map_err(BackendError::Submission)?;
            JobsSubmitted { jobs: jobs.len() }.log();
            let completed = self
                .submitter
                .wait_for_completion(&jobs)
                .await
                .map_err(BackendError::Submission)?;
            succeeded = Some(
                jobs.iter()
                    .enumerate()
                    .filter(|(_, id)| completed.contains(*id))
                    .map(|(worker, _)| worker)
                    .collect(),
            );
        }

        let mut sets = self
            .submitter
            .collect(&output_dir)
            .await
            .map_err(BackendError::Submission)?;
        // only this round's jobs count once something was submitted
        if let Some(succeeded) = &succeeded {
            sets.retain(|set| set.worker.is_some_and(|worker| succeeded.contains(&worker)));
        }
        sets.sort_by_key(|set| set.worker);

        let failed: Vec<usize> = (0..self.workers)
            .filter(|worker| !sets.iter().any(|set| set.worker == Some(*worker)))
            .collect();

        merge_on_client(
            BackendKind::Batch,
            &self.graph_factory,
            run,
            &sets,
            failed,
            &self.finalizer,
        )
    }
}

#[async_trait]
impl Backend for BatchBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Batch
    }

    async fn run(&mut self, run: &mut RunContext) -> Result<RunSummary, BackendError> {
        let summary = match self.run_inner(run).await {
            Ok(summary) => summary,
            Err(e) => {
                self.finalizer.withhold(run.output_dir(), &e.to_string())?;
                return Err(e);
            }
        };
        EventLoopCompleted {
            backend: BackendKind::Batch.as_str(),
            consumed: summary.counters.consumed,
            processed: summary.counters.processed,
            accepted: summary.counters.accepted,
        }
        .log();
        Ok(summary)
    }
}

struct Job {
    id: String,
    worker: usize,
    parent: PathBuf,
    handle: JoinHandle<Result<(), BackendError>>,
}

/// Runs every batch job on the blocking thread pool of this process and
/// leaves its encoded wrapper set in `worker-<i>/wrappers.pb`, the way a
/// grid job would. A job that fails leaves no wrapper file behind.
pub struct InProcessSubmitter {
    graph_factory: GraphFactory,
    source_factory: SourceFactory,
    max_events: Option<u64>,
    finalizer: OutputFinalizer,
    running: Mutex<Vec<Job>>,
}

impl InProcessSubmitter {
    pub fn new(graph_factory: GraphFactory, source_factory: SourceFactory) -> Self {
        Self {
            graph_factory,
            source_factory,
            max_events: None,
            finalizer: OutputFinalizer::default(),
            running: Mutex::new(Vec::new()),
        }
    }

    pub fn with_max_events(mut self, max_events: Option<u64>) -> Self {
        self.max_events = max_events;
        self
    }

    pub fn with_finalizer(mut self, finalizer: OutputFinalizer) -> Self {
        self.finalizer = finalizer;
        self
    }

    fn wrappers_path(output_dir: &Path, worker: usize) -> PathBuf {
        output_dir
            .join(format!("{WORKER_DIR_PREFIX}{worker}"))
            .join(WRAPPERS_FILE)
    }

    fn remove_wrappers(path: &Path) -> Result<(), MergeError> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(MergeError::io(path, e)),
        }
    }

    fn write_wrappers(path: &Path, set: &WrapperSet, worker: usize) -> Result<(), BackendError> {
        fs::write(path, set.to_bytes()?).map_err(|e| BackendError::Worker {
            worker,
            reason: format!("cannot write {}: {e}", path.display()),
        })
    }
}

#[async_trait]
impl JobSubmitter for InProcessSubmitter {
    async fn submit(&self, workers: usize, output_dir: &Path) -> anyhow::Result<Vec<String>> {
        let mut running = self.running.lock().await;
        let mut jobs = Vec::with_capacity(workers);
        for worker in 0..workers {
            let path = Self::wrappers_path(output_dir, worker);
            Self::remove_wrappers(&path)?;

            let graphs = self.graph_factory.clone();
            let sources = self.source_factory.clone();
            let finalizer = self.finalizer.clone();
            let max_events = self.max_events;
            let parent = output_dir.to_path_buf();
            let handle = tokio::task::spawn_blocking(move || -> Result<(), BackendError> {
                let result = run_worker(worker, workers, &parent, &graphs, &sources, &finalizer, max_events)
                    .and_then(|set| Self::write_wrappers(&path, &set, worker));
                if result.is_err() {
                    Self::remove_wrappers(&path)?;
                }
                result
            });
            let id = format!("{WORKER_DIR_PREFIX}{worker}");
            jobs.push(id.clone());
            running.push(Job {
                id,
                worker,
                parent: output_dir.to_path_buf(),
                handle,
            });
        }
        Ok(jobs)
    }

    async fn wait_for_completion(&self, jobs: &[String]) -> anyhow::Result<Vec<String>> {
        let mut running = self.running.lock().await;
        let (waiting, rest): (Vec<Job>, Vec<Job>) =
            running.drain(..).partition(|job| jobs.contains(&job.id));
        *running = rest;
        drop(running);

        let mut completed = Vec::with_capacity(waiting.len());
        for job in waiting {
            let error = match job.handle.await {
                Ok(Ok(())) => {
                    completed.push(job.id);
                    continue;
                }
                Ok(Err(e)) => e,
                Err(e) => {
                    let e = BackendError::Join(e);
                    withhold_worker(&self.finalizer, &job.parent, job.worker, &e.to_string())?;
                    e
                }
            };
            WorkerFailed {
                worker: job.worker,
                error: &error,
            }
            .log();
        }
        Ok(completed)
    }

    async fn collect(&self, output_dir: &Path) -> anyhow::Result<Vec<WrapperSet>> {
        let mut sets = Vec::new();
        let entries = fs::read_dir(output_dir)
            .with_context(|| format!("cannot list {}", output_dir.display()))?;
        for entry in entries {
            let path = entry?.path().join(WRAPPERS_FILE);
            if !path.is_file() {
                continue;
            }
            let bytes = fs::read(&path).with_context(|| format!("cannot read {}", path.display()))?;
            let set = WrapperSet::from_bytes(&bytes)
                .with_context(|| format!("cannot decode {}", path.display()))?;
            sets.push(set);
        }
        Ok(sets)
    }
}
