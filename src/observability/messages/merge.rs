// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for moving outputs between workers and the merging side.
//!
//! This module contains message types for logging events related to:
//! * Packing a worker's outputs into wrappers
//! * Importing and merging wrappers
//! * Writing output files and the validity sentinel

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use std::path::Path;
use tracing::Span;

/// A worker's outputs were packed for transport.
///
/// # Log Level
/// `info!` - Important operational event
pub struct OutputsExported {
    pub worker: Option<usize>,
    pub wrappers: usize,
    pub extra_files: usize,
}

impl Display for OutputsExported {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self.worker {
            Some(worker) => write!(
                f,
                "Worker {} exported {} wrappers and {} extra files",
                worker, self.wrappers, self.extra_files
            ),
            None => write!(
                f,
                "Exported {} wrappers and {} extra files",
                self.wrappers, self.extra_files
            ),
        }
    }
}

impl StructuredLog for OutputsExported {
    fn log(&self) {
        tracing::info!(
            worker = ?self.worker,
            wrappers = self.wrappers,
            extra_files = self.extra_files,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "outputs_exported",
            span_name = name,
            worker = ?self.worker,
            wrappers = self.wrappers,
        )
    }
}

/// No worker returned a wrapper for an output slot.
///
/// # Log Level
/// `warn!` - The slot stays empty; the merge continues
///
/// # Example
/// ```
/// use the_slotgraph::observability::messages::merge::WrapperMissing;
///
/// let msg = WrapperMissing { slot: "n_selected" };
///
/// assert_eq!(msg.to_string(), "No wrapper returned for output slot 'n_selected'");
/// ```
pub struct WrapperMissing<'a> {
    pub slot: &'a str,
}

impl Display for WrapperMissing<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "No wrapper returned for output slot '{}'", self.slot)
    }
}

impl StructuredLog for WrapperMissing<'_> {
    fn log(&self) {
        tracing::warn!(slot = self.slot, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("wrapper_missing", span_name = name, slot = self.slot)
    }
}

/// Wrappers for one slot were merged into the local graph.
///
/// # Log Level
/// `debug!` - Detailed diagnostic information
pub struct WrappersMerged<'a> {
    pub slot: &'a str,
    pub wrappers: usize,
}

impl Display for WrappersMerged<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Merged {} wrappers into slot '{}'", self.wrappers, self.slot)
    }
}

impl StructuredLog for WrappersMerged<'_> {
    fn log(&self) {
        tracing::debug!(slot = self.slot, wrappers = self.wrappers, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "wrappers_merged",
            span_name = name,
            slot = self.slot,
            wrappers = self.wrappers,
        )
    }
}

/// A file was copied into the output directory.
///
/// # Log Level
/// `debug!` - Detailed diagnostic information
pub struct FileCopied<'a> {
    pub from: &'a Path,
    pub to: &'a Path,
    pub appended: bool,
}

impl Display for FileCopied<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        let verb = if self.appended { "Appended" } else { "Copied" };
        write!(f, "{} {} to {}", verb, self.from.display(), self.to.display())
    }
}

impl StructuredLog for FileCopied<'_> {
    fn log(&self) {
        tracing::debug!(
            from = %self.from.display(),
            to = %self.to.display(),
            appended = self.appended,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "file_copied",
            span_name = name,
            from = %self.from.display(),
            to = %self.to.display(),
        )
    }
}

/// Output files were written and validated; the sentinel exists.
///
/// # Log Level
/// `info!` - Important operational event
pub struct OutputsFinalized<'a> {
    pub output_dir: &'a Path,
    pub files: usize,
}

impl Display for OutputsFinalized<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Wrote and validated {} output files in {}",
            self.files,
            self.output_dir.display()
        )
    }
}

impl StructuredLog for OutputsFinalized<'_> {
    fn log(&self) {
        tracing::info!(
            output_dir = %self.output_dir.display(),
            files = self.files,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "outputs_finalized",
            span_name = name,
            output_dir = %self.output_dir.display(),
        )
    }
}

/// The validity sentinel was not written.
///
/// # Log Level
/// `error!` - Failure requiring attention
///
/// # Example
/// ```
/// use the_slotgraph::observability::messages::merge::SentinelWithheld;
///
/// let msg = SentinelWithheld {
///     output_dir: std::path::Path::new("output"),
///     reason: "1 worker failed",
/// };
///
/// tracing::error!("{}", msg);
/// ```
pub struct SentinelWithheld<'a> {
    pub output_dir: &'a Path,
    pub reason: &'a str,
}

impl Display for SentinelWithheld<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Outputs in {} are not marked valid: {}",
            self.output_dir.display(),
            self.reason
        )
    }
}

impl StructuredLog for SentinelWithheld<'_> {
    fn log(&self) {
        tracing::error!(
            output_dir = %self.output_dir.display(),
            reason = self.reason,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "sentinel_withheld",
            span_name = name,
            output_dir = %self.output_dir.display(),
            reason = self.reason,
        )
    }
}
