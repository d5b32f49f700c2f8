// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Observability module for structured logging and tracing.
//!
//! All diagnostic and operational logging in the slot graph goes through
//! message structs with a `Display` implementation instead of format strings
//! scattered through the scheduler. Each message also knows its log level and
//! its structured fields via [`messages::StructuredLog`].
//!
//! # Architecture
//!
//! Messages are organized by subsystem:
//! * `messages::validation` - graph validation findings
//! * `messages::engine` - event propagation and backend lifecycle
//! * `messages::merge` - export, import and output finalization
//!
//! # Usage
//!
//! ```rust
//! use the_slotgraph::observability::messages::engine::EventLoopCompleted;
//! use the_slotgraph::observability::messages::StructuredLog;
//!
//! let msg = EventLoopCompleted {
//!     backend: "local",
//!     consumed: 100,
//!     processed: 100,
//!     accepted: 42,
//! };
//!
//! msg.log();
//! ```

pub mod messages;
