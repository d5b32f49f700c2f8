// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fmt;

use crate::errors::BackendError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Sequential event loop in this process.
    Local,
    /// Sequential loop over event chains from a mixing pool.
    Mixing,
    /// Pool of in-process workers, one graph copy each.
    Distributed,
    /// Jobs handed to an external batch system.
    Batch,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Local => "local",
            BackendKind::Mixing => "mixing",
            BackendKind::Distributed => "distributed",
            BackendKind::Batch => "batch",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved backend selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendSelection {
    pub kind: BackendKind,
    /// Batch only: skip submission and go straight to merge and terminate.
    pub terminate_only: bool,
}

impl BackendSelection {
    /// Resolve a selector string by case-insensitive substring match:
    /// `proof`/`distributed`, then `grid`/`batch` (optionally ending in
    /// `terminate`), then `mix`, then `local`.
    pub fn parse(selector: &str) -> Result<Self, BackendError> {
        let lowered = selector.trim().to_ascii_lowercase();
        let kind = if lowered.contains("proof") || lowered.contains("distributed") {
            BackendKind::Distributed
        } else if lowered.contains("grid") || lowered.contains("batch") {
            BackendKind::Batch
        } else if lowered.contains("mix") {
            BackendKind::Mixing
        } else if lowered.contains("local") {
            BackendKind::Local
        } else {
            return Err(BackendError::UnknownSelector(selector.to_string()));
        };
        Ok(Self {
            kind,
            terminate_only: kind == BackendKind::Batch && lowered.ends_with("terminate"),
        })
    }
}
