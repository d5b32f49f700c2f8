// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

// Wire messages for shipping packed worker outputs to the merging side
#[path = "slotgraph.v1.rs"]
pub mod slotgraph_v1;

// Re-export the types for easier access
pub use slotgraph_v1::{
    wrapper_message, CountersMessage, FileRefMessage, WrapperMessage, WrapperSetMessage,
};
