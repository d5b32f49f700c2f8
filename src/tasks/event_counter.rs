// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use anyhow::Context;
use serde_json::json;

use crate::graph::Payload;
use crate::traits::{Task, TaskContext};

/// Counts the events that reach it: `{"entries": n}` on output 0.
///
/// Counters from several workers merge by summing.
#[derive(Debug, Default)]
pub struct EventCounter;

impl EventCounter {
    pub fn new() -> Self {
        Self
    }
}

impl Task for EventCounter {
    fn create_outputs(&mut self, ctx: &mut TaskContext<'_>) -> anyhow::Result<()> {
        ctx.post(0, Payload::Object(json!({ "entries": 0 })))?;
        Ok(())
    }

    fn exec(&mut self, ctx: &mut TaskContext<'_>) -> anyhow::Result<()> {
        let Payload::Object(value) = ctx.output_mut(0)? else {
            anyhow::bail!("counter output is not an object");
        };
        let entries = value
            .get("entries")
            .and_then(|v| v.as_u64())
            .context("counter output has no 'entries'")?;
        value["entries"] = json!(entries + 1);
        Ok(())
    }
}

/// Read the `entries` field of a counter payload.
pub fn entries(payload: &Payload) -> anyhow::Result<u64> {
    payload
        .as_object()
        .and_then(|v| v.get("entries"))
        .and_then(|v| v.as_u64())
        .context("payload is not an event count")
}
