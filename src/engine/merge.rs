// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Packing a worker's outputs and merging packed outputs back into a graph.
//!
//! Every worker runs its own copy of the graph. At the end of its event
//! stream the worker *exports*: each output slot produced inside the event
//! loop is wrapped under the slot name, either inline or, for file-resident
//! slots, as a reference to the file the payload was written to. The merging
//! side *imports* every worker's [`WrapperSet`], reconciles the payloads per
//! slot and posts the result, then runs the post-loop tasks once.
//!
//! ```text
//!   worker 0: [h] --export--> WrapperSet --\
//!   worker 1: [h] --export--> WrapperSet ---+--import--> [h] --> post-loop tasks
//!   worker 2: [h] --export--> WrapperSet --/
//! ```
//!
//! Slot names are the only identifiers shared between the graph copies.

use prost::Message;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::engine::{EventCounters, Propagator, RunContext, WrittenFiles};
use crate::engine::store::ObjectStore;
use crate::errors::MergeError;
use crate::graph::{Graph, Payload, PayloadKind, SlotId, SlotStorage};
use crate::observability::messages::merge::{
    FileCopied, OutputsExported, WrapperMissing, WrappersMerged,
};
use crate::observability::messages::StructuredLog;
use crate::proto::{wrapper_message, CountersMessage, FileRefMessage, WrapperMessage, WrapperSetMessage};

/// Directory under the output directory that receives remote files during import.
const STAGING_DIR: &str = ".merge";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WrapperContent {
    Inline { payload: Payload },
    /// The payload lives in an object store file, under `folder` and the slot name.
    File { path: PathBuf, folder: String },
}

/// One packed output slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wrapper {
    pub name: String,
    pub kind: PayloadKind,
    pub content: WrapperContent,
}

/// Everything one worker hands back to the merging side.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WrapperSet {
    pub worker: Option<usize>,
    pub wrappers: Vec<Wrapper>,
    pub extra_files: Vec<PathBuf>,
    pub counters: EventCounters,
}

impl WrapperSet {
    pub fn get(&self, name: &str) -> Option<&Wrapper> {
        self.wrappers.iter().find(|w| w.name == name)
    }

    pub fn to_message(&self) -> Result<WrapperSetMessage, MergeError> {
        let wrappers = self
            .wrappers
            .iter()
            .map(|wrapper| {
                let content = match &wrapper.content {
                    WrapperContent::Inline { payload } => wrapper_message::Content::Inline(
                        serde_json::to_vec(payload)
                            .map_err(|e| MergeError::Transport(e.to_string()))?,
                    ),
                    WrapperContent::File { path, folder } => {
                        wrapper_message::Content::File(FileRefMessage {
                            path: path.to_string_lossy().into_owned(),
                            folder: folder.clone(),
                        })
                    }
                };
                Ok(WrapperMessage {
                    name: wrapper.name.clone(),
                    kind: wrapper.kind.as_str().to_string(),
                    content: Some(content),
                })
            })
            .collect::<Result<Vec<_>, MergeError>>()?;

        Ok(WrapperSetMessage {
            worker: self.worker.map(|w| w as u64),
            wrappers,
            extra_files: self
                .extra_files
                .iter()
                .map(|p| p.to_string_lossy().into_owned())
                .collect(),
            counters: Some(CountersMessage {
                consumed: self.counters.consumed,
                processed: self.counters.processed,
                failed: self.counters.failed,
                accepted: self.counters.accepted,
            }),
        })
    }

    pub fn from_message(message: WrapperSetMessage) -> Result<Self, MergeError> {
        let wrappers = message
            .wrappers
            .into_iter()
            .map(|wrapper| {
                let kind = PayloadKind::parse(&wrapper.kind).ok_or_else(|| {
                    MergeError::Transport(format!(
                        "wrapper '{}' has unknown kind '{}'",
                        wrapper.name, wrapper.kind
                    ))
                })?;
                let content = match wrapper.content {
                    Some(wrapper_message::Content::Inline(bytes)) => WrapperContent::Inline {
                        payload: serde_json::from_slice(&bytes)
                            .map_err(|e| MergeError::Transport(e.to_string()))?,
                    },
                    Some(wrapper_message::Content::File(file)) => WrapperContent::File {
                        path: PathBuf::from(file.path),
                        folder: file.folder,
                    },
                    None => {
                        return Err(MergeError::Transport(format!(
                            "wrapper '{}' has no content",
                            wrapper.name
                        )))
                    }
                };
                Ok(Wrapper {
                    name: wrapper.name,
                    kind,
                    content,
                })
            })
            .collect::<Result<Vec<_>, MergeError>>()?;

        let counters = message
            .counters
            .map(|c| EventCounters {
                consumed: c.consumed,
                processed: c.processed,
                failed: c.failed,
                accepted: c.accepted,
            })
            .unwrap_or_default();

        Ok(Self {
            worker: message.worker.map(|w| w as usize),
            wrappers,
            extra_files: message.extra_files.into_iter().map(PathBuf::from).collect(),
            counters,
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, MergeError> {
        Ok(self.to_message()?.encode_to_vec())
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MergeError> {
        let message =
            WrapperSetMessage::decode(bytes).map_err(|e| MergeError::Transport(e.to_string()))?;
        Self::from_message(message)
    }
}

/// What an import did.
#[derive(Debug, Default)]
pub struct ImportReport {
    /// Slots that received a merged payload.
    pub imported: Vec<String>,
    /// One [`MergeError::Mismatch`] per output slot no set had a wrapper for.
    pub mismatches: Vec<MergeError>,
    /// Extra files now present in the local output directory.
    pub extra_files: Vec<PathBuf>,
    /// Sum of the counters of every imported set.
    pub counters: EventCounters,
}

#[derive(Debug, Default)]
pub struct MergeReport {
    pub import: ImportReport,
    /// Post-loop tasks that ran after this import.
    pub post_loop_executed: usize,
}

/// Moves outputs between graph copies. One coordinator per run and side; it
/// remembers which files it already wrote so that shared files are recreated
/// once and updated afterwards.
#[derive(Debug, Default)]
pub struct MergeCoordinator {
    written: WrittenFiles,
    copied: HashSet<(PathBuf, PathBuf)>,
    propagator: Propagator,
}

impl MergeCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pack the outputs of a worker that reached the end of its event stream.
    ///
    /// File-resident slots are written to their file under the run's output
    /// directory first. Slots that never received a payload are left out.
    pub fn export(&mut self, graph: &Graph, run: &RunContext) -> Result<WrapperSet, MergeError> {
        let mut wrappers = Vec::new();
        for slot in graph.output_slots() {
            if !graph.is_exported(slot.id()) || !slot.has_data() {
                continue;
            }
            let payload = slot.data()?.clone();
            let content = match slot.storage() {
                SlotStorage::File(locator) => {
                    let path = run.output_dir().join(&locator.file);
                    self.written
                        .put_object(&path, &locator.folder, slot.name(), payload)?;
                    WrapperContent::File {
                        path,
                        folder: locator.folder.clone(),
                    }
                }
                SlotStorage::Memory | SlotStorage::Handler => WrapperContent::Inline { payload },
            };
            wrappers.push(Wrapper {
                name: slot.name().to_string(),
                kind: slot.kind(),
                content,
            });
        }

        let set = WrapperSet {
            worker: run.worker(),
            wrappers,
            extra_files: run
                .extra_files()
                .iter()
                .map(|name| run.output_dir().join(name))
                .collect(),
            counters: *run.counters(),
        };
        OutputsExported {
            worker: set.worker,
            wrappers: set.wrappers.len(),
            extra_files: set.extra_files.len(),
        }
        .log();
        Ok(set)
    }

    /// Merge the received wrapper sets into the output slots of `graph`.
    ///
    /// Only slots produced inside the event loop are imported. A slot with
    /// no wrapper anywhere is reported in [`ImportReport::mismatches`] and
    /// left unset; the import carries on with the next slot.
    pub fn import(
        &mut self,
        graph: &mut Graph,
        run: &RunContext,
        sets: &[WrapperSet],
    ) -> Result<ImportReport, MergeError> {
        let mut report = ImportReport::default();
        let output_dir = run.output_dir();

        let targets: Vec<SlotId> = graph
            .output_slots()
            .map(|slot| slot.id())
            .filter(|id| graph.is_exported(*id))
            .collect();

        for id in targets {
            let name = graph.slot(id).name().to_string();
            let kind = graph.slot(id).kind();

            let found: Vec<(usize, &Wrapper)> = sets
                .iter()
                .enumerate()
                .filter_map(|(index, set)| set.get(&name).map(|w| (index, w)))
                .collect();
            if found.is_empty() {
                WrapperMissing { slot: &name }.log();
                report.mismatches.push(MergeError::Mismatch { slot: name });
                continue;
            }

            let count = found.len();
            let mut merged: Option<Payload> = None;
            for (index, wrapper) in found {
                let payload = Self::load(output_dir, index, wrapper)?;
                if wrapper.kind != kind || payload.kind() != kind {
                    return Err(MergeError::KindMismatch {
                        slot: name,
                        expected: kind,
                        actual: payload.kind(),
                    });
                }
                merged = Some(match merged.take() {
                    None => payload,
                    Some(mut acc) => {
                        acc.merge(payload).map_err(|e| at_slot(&name, e))?;
                        acc
                    }
                });
            }

            if let Some(payload) = merged {
                graph.slot_mut(id).set_data(payload)?;
                WrappersMerged {
                    slot: &name,
                    wrappers: count,
                }
                .log();
                report.imported.push(name);
            }
        }

        let staging = output_dir.join(STAGING_DIR);
        if staging.exists() {
            fs::remove_dir_all(&staging).map_err(|e| MergeError::io(&staging, e))?;
        }

        for set in sets {
            report.counters.add(&set.counters);
            for from in &set.extra_files {
                let Some(file_name) = from.file_name() else {
                    continue;
                };
                let to = output_dir.join(file_name);
                if *from != to && self.copied.insert((from.clone(), to.clone())) {
                    let appended = self.written.copy_file(from, &to)?;
                    FileCopied {
                        from,
                        to: &to,
                        appended,
                    }
                    .log();
                }
                if !report.extra_files.contains(&to) {
                    report.extra_files.push(to);
                }
            }
        }

        Ok(report)
    }

    /// Import, then run the post-loop tasks that became ready.
    ///
    /// Calling this again with the same sets leaves the slots as they were
    /// and runs no post-loop task twice.
    pub fn merge(
        &mut self,
        graph: &mut Graph,
        run: &mut RunContext,
        sets: &[WrapperSet],
    ) -> Result<MergeReport, MergeError> {
        let import = self.import(graph, run, sets)?;
        let post_loop_executed = self.propagator.run_post_loop(graph, run)?;
        Ok(MergeReport {
            import,
            post_loop_executed,
        })
    }

    /// Fetch the payload a wrapper refers to. Files outside the local output
    /// directory are copied into a staging area first.
    fn load(output_dir: &Path, set_index: usize, wrapper: &Wrapper) -> Result<Payload, MergeError> {
        match &wrapper.content {
            WrapperContent::Inline { payload } => Ok(payload.clone()),
            WrapperContent::File { path, folder } => {
                if path.starts_with(output_dir) {
                    return ObjectStore::read_object(path, folder, &wrapper.name);
                }
                let file_name = path.file_name().ok_or_else(|| MergeError::Incompatible {
                    path: wrapper.name.clone(),
                    reason: format!("file reference {} has no file name", path.display()),
                })?;
                let local = output_dir
                    .join(STAGING_DIR)
                    .join(set_index.to_string())
                    .join(file_name);
                if let Some(parent) = local.parent() {
                    fs::create_dir_all(parent).map_err(|e| MergeError::io(parent, e))?;
                }
                fs::copy(path, &local).map_err(|e| MergeError::io(path, e))?;
                FileCopied {
                    from: path,
                    to: &local,
                    appended: false,
                }
                .log();
                ObjectStore::read_object(&local, folder, &wrapper.name)
            }
        }
    }
}

fn at_slot(slot: &str, error: MergeError) -> MergeError {
    match error {
        MergeError::Incompatible { path, reason } => MergeError::Incompatible {
            path: format!("{slot}{path}"),
            reason,
        },
        other => other,
    }
}
