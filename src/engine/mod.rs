// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod context;
pub mod finalize;
pub mod merge;
pub mod propagator;
pub mod store;
#[cfg(test)]
pub mod integration_tests;

pub use context::{EventCounters, RunContext};
pub use finalize::{FinalizeReport, OutputFinalizer};
pub use merge::{ImportReport, MergeCoordinator, MergeReport, Wrapper, WrapperContent, WrapperSet};
pub use propagator::{EventOutcome, Propagator};
pub use store::{ObjectStore, WrittenFiles};
