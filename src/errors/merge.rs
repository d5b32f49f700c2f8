// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::path::PathBuf;
use thiserror::Error;

use super::{ExecutionError, SlotError};
use crate::graph::PayloadKind;

/// Errors raised while packing, transporting or importing worker outputs.
#[derive(Error, Debug)]
pub enum MergeError {
    /// A declared output slot had no wrapper in any received set.
    ///
    /// Reported per slot through the import report; the import carries on.
    #[error("No wrapper named '{slot}' in any received wrapper set")]
    Mismatch { slot: String },

    #[error("Wrapper '{slot}' carries {actual:?} but the slot holds {expected:?}")]
    KindMismatch {
        slot: String,
        expected: PayloadKind,
        actual: PayloadKind,
    },

    #[error("Cannot reconcile payloads at '{path}': {reason}")]
    Incompatible { path: String, reason: String },

    #[error("Object '{folder}/{name}' not found in {}", .file.display())]
    ObjectNotFound {
        file: PathBuf,
        folder: String,
        name: String,
    },

    #[error("Malformed object store {}: {source}", .file.display())]
    Store {
        file: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot decode wrapper set: {0}")]
    Transport(String),

    #[error(transparent)]
    Slot(#[from] SlotError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

impl MergeError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MergeError::Io {
            path: path.into(),
            source,
        }
    }
}

/// A finalized output that failed the end-of-run check.
///
/// Any of these withholds the run-completion sentinel.
#[derive(Error, Debug)]
pub enum OutputValidationError {
    #[error("Output file {} is missing", .0.display())]
    Missing(PathBuf),

    #[error("Output file {} is corrupt: {reason}", .file.display())]
    Corrupt { file: PathBuf, reason: String },

    #[error("Output file {} lacks object '{folder}/{name}'", .file.display())]
    MissingObject {
        file: PathBuf,
        folder: String,
        name: String,
    },
}
