// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod backends;   // event loop strategies
pub mod config;     // run configuration
pub mod engine;     // propagation, merge, finalize
pub mod errors;     // error handling
pub mod graph;      // slots, tasks, validation
pub mod observability;
pub mod proto;      // wire messages for packed outputs
pub mod tasks;      // reusable tasks and the demo analysis
pub mod traits;     // Task and Backend
