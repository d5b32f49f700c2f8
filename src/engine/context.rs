// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The explicit run context handed to every component that needs run-wide state.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::consts::WORKER_DIR_PREFIX;

/// Process-wide event bookkeeping, exported as a `.stat` summary file.
///
/// The scheduler only bumps `consumed` and `processed`; `accepted` and `failed`
/// belong to the tasks (event selection is their business).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventCounters {
    pub consumed: u64,
    pub processed: u64,
    pub failed: u64,
    pub accepted: u64,
}

impl EventCounters {
    pub fn accept(&mut self) {
        self.accepted += 1;
    }

    pub fn fail(&mut self) {
        self.failed += 1;
    }

    pub fn add(&mut self, other: &EventCounters) {
        self.consumed += other.consumed;
        self.processed += other.processed;
        self.failed += other.failed;
        self.accepted += other.accepted;
    }

    /// `<consumed>_<processed>_<failed>_<accepted>.stat`
    pub fn stat_file_name(&self) -> String {
        format!(
            "{}_{}_{}_{}.stat",
            self.consumed, self.processed, self.failed, self.accepted
        )
    }
}

/// Run-wide state owned by whoever drives the graph.
#[derive(Debug)]
pub struct RunContext {
    output_dir: PathBuf,
    worker: Option<usize>,
    counters: EventCounters,
    extra_files: Vec<String>,
    break_requested: bool,
    event_number: u64,
    bin: Option<usize>,
}

impl RunContext {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            worker: None,
            counters: EventCounters::default(),
            extra_files: Vec::new(),
            break_requested: false,
            event_number: 0,
            bin: None,
        }
    }

    /// Context of worker `index`, writing into its own sub-directory.
    pub fn for_worker(parent: &Path, index: usize) -> Self {
        let mut ctx = Self::new(parent.join(format!("{WORKER_DIR_PREFIX}{index}")));
        ctx.worker = Some(index);
        ctx
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn worker(&self) -> Option<usize> {
        self.worker
    }

    pub fn counters(&self) -> &EventCounters {
        &self.counters
    }

    pub fn counters_mut(&mut self) -> &mut EventCounters {
        &mut self.counters
    }

    pub fn extra_files(&self) -> &[String] {
        &self.extra_files
    }

    pub fn register_extra_files(&mut self, names: &str) {
        for name in names.split_whitespace() {
            if !self.extra_files.iter().any(|f| f == name) {
                self.extra_files.push(name.to_string());
            }
        }
    }

    pub fn request_break(&mut self) {
        self.break_requested = true;
    }

    pub fn break_requested(&self) -> bool {
        self.break_requested
    }

    pub fn event_number(&self) -> u64 {
        self.event_number
    }

    pub fn bin(&self) -> Option<usize> {
        self.bin
    }

    pub(crate) fn set_bin(&mut self, bin: Option<usize>) {
        self.bin = bin;
    }

    /// Called by the propagator at the start of every event.
    pub(crate) fn begin_event(&mut self) {
        self.break_requested = false;
        self.event_number += 1;
    }
}
