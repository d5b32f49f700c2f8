// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The demo analysis run by the binary.
//!
//! ```text
//!   [events] --> count_all ------> [n_events] -------------------\
//!       |                                                          +--> efficiency (post-loop)
//!       +-----> select --> [selected] --> count_selected --> [n_selected]
//!       |                      |
//!       |                      +--------> candidates ----> [candidates]   (handler-owned tree)
//!       +-----> pt_hist -----> [h_pt]                                     (histograms.json#pt)
//! ```

use serde_json::json;

use crate::errors::GraphError;
use crate::graph::{Graph, Payload, PayloadKind, SlotSpec, TaskSpec};
use crate::tasks::{EventCounter, EventSelection, RatioSummary, TreeWriter, ValueHistogram};

pub const PT_CUT: f64 = 20.0;
pub const SELECTION_LOG: &str = "selection.log";
/// Every this many events, one is generated without a `pt` field.
pub const MALFORMED_EVERY: usize = 97;

/// Build (but do not validate) the demo graph.
pub fn build_graph() -> Result<Graph, GraphError> {
    let mut graph = Graph::new();
    graph.add_slot(SlotSpec::input("events", PayloadKind::Object))?;
    graph.add_slot(SlotSpec::exchange("selected", PayloadKind::Collection))?;
    graph.add_slot(SlotSpec::output("n_events", PayloadKind::Object))?;
    graph.add_slot(SlotSpec::output("n_selected", PayloadKind::Object))?;
    graph.add_slot(SlotSpec::output("h_pt", PayloadKind::Object).with_locator("histograms.json#pt"))?;
    graph.add_slot(SlotSpec::output("candidates", PayloadKind::Tree).with_locator("default"))?;
    graph.add_slot(SlotSpec::output("efficiency", PayloadKind::Object))?;

    graph.add_task(
        TaskSpec::new("count_all", EventCounter::new())
            .input("events")
            .output("n_events"),
    )?;
    graph.add_task(
        TaskSpec::new("select", EventSelection::new("pt", PT_CUT).with_log(SELECTION_LOG))
            .input("events")
            .output("selected"),
    )?;
    graph.add_task(
        TaskSpec::new("count_selected", EventCounter::new())
            .input("selected")
            .output("n_selected"),
    )?;
    graph.add_task(
        TaskSpec::new("pt_hist", ValueHistogram::new("pt", 10, 0.0, 100.0))
            .input("events")
            .output("h_pt"),
    )?;
    graph.add_task(
        TaskSpec::new("candidates", TreeWriter::new(["id", "pt", "eta"]))
            .input("selected")
            .output("candidates"),
    )?;
    graph.add_task(
        TaskSpec::new("efficiency", RatioSummary::new())
            .input("n_selected")
            .input("n_events")
            .output("efficiency")
            .post_loop(),
    )?;
    Ok(graph)
}

/// Event `id` of the deterministic synthetic stream.
pub fn event(id: usize) -> Payload {
    if id % MALFORMED_EVERY == MALFORMED_EVERY - 1 {
        return Payload::Object(json!({ "id": id }));
    }
    let pt = ((id * 37) % 100) as f64 + 0.5;
    let eta = ((id * 13) % 50) as f64 / 10.0 - 2.5;
    Payload::Object(json!({ "id": id, "pt": pt, "eta": eta }))
}

/// The first `count` events of the synthetic stream.
pub fn events(count: usize) -> Vec<Payload> {
    (0..count).map(event).collect()
}
