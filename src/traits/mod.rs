// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod backend;
pub mod task;

pub use backend::Backend;
pub use task::{Task, TaskContext};
