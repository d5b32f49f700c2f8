// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod backend;
mod config;
mod execution;
mod graph;
mod merge;

pub use backend::BackendError;
pub use config::ConfigError;
pub use execution::ExecutionError;
pub use graph::{GraphError, SlotError, ValidationError};
pub use merge::{MergeError, OutputValidationError};
