// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Centralized message types for structured logging.
//!
//! # Organization
//!
//! * `validation` - graph validation warnings and errors
//! * `engine` - event loop, worker and backend events
//! * `merge` - wrapper export and import, output files and sentinels
//!
//! # Usage Pattern
//!
//! ```rust
//! use the_slotgraph::observability::messages::validation::OrphanTaskDetected;
//!
//! let msg = OrphanTaskDetected { task: "histogram" };
//!
//! tracing::warn!("{}", msg);
//! ```

use std::fmt::Display;
use tracing::Span;

pub mod engine;
pub mod merge;
pub mod validation;

/// A message that logs itself at its own level with its fields attached.
pub trait StructuredLog: Display {
    /// Emit the message as a tracing event.
    fn log(&self);

    /// Open a span carrying the same fields.
    fn span(&self, name: &str) -> Span;
}
