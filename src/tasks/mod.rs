// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Built-in tasks, used by the demo analysis the binary runs and by the tests.

pub mod demo;
pub mod event_counter;
pub mod event_selection;
pub mod ratio_summary;
pub mod tree_writer;
pub mod value_histogram;

pub use event_counter::*;
pub use event_selection::*;
pub use ratio_summary::*;
pub use tree_writer::*;
pub use value_histogram::*;
