// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

/// Reserved file locator: the slot's file belongs to the results finalizer.
pub const DEFAULT_LOCATOR: &str = "default";
/// Separator between the file and folder parts of a special-slot locator.
pub const LOCATOR_SEPARATOR: char = '#';
/// Backend selector used when the configuration does not name one.
pub const DEFAULT_BACKEND: &str = "local";
pub const DEFAULT_OUTPUT_DIR: &str = "output";
/// Common file receiving every in-memory and handler-owned output slot.
pub const DEFAULT_RESULTS_FILE: &str = "results.json";
/// Zero-byte file marking a directory of validated outputs.
pub const DEFAULT_SENTINEL: &str = "outputs_valid";
/// Size of the synthetic event stream driven by the binary.
pub const DEFAULT_EVENTS: usize = 1_000;
/// Worker directory prefix inside the run's output directory.
pub const WORKER_DIR_PREFIX: &str = "worker-";
