// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fs;

use serde_json::Value;

use crate::graph::Payload;
use crate::traits::{Task, TaskContext};

/// Passes on events whose `field` is at least `min`.
///
/// A selected event is posted to output 0 as a one-entry collection and
/// counted as accepted. An event without a numeric `field` is counted as
/// failed and ends the event. Rejected events are simply not posted, so
/// nothing downstream of the selection runs for them.
#[derive(Debug, Clone)]
pub struct EventSelection {
    field: String,
    min: f64,
    log_file: Option<String>,
    selected: u64,
    seen: u64,
}

impl EventSelection {
    pub fn new(field: impl Into<String>, min: f64) -> Self {
        Self {
            field: field.into(),
            min,
            log_file: None,
            selected: 0,
            seen: 0,
        }
    }

    /// Write a one-line summary to `name` in the output directory at the end
    /// of the worker's stream, and carry it along with the outputs.
    pub fn with_log(mut self, name: impl Into<String>) -> Self {
        self.log_file = Some(name.into());
        self
    }
}

impl Task for EventSelection {
    fn create_outputs(&mut self, ctx: &mut TaskContext<'_>) -> anyhow::Result<()> {
        if let Some(name) = &self.log_file {
            ctx.register_extra_files(name);
        }
        Ok(())
    }

    fn exec(&mut self, ctx: &mut TaskContext<'_>) -> anyhow::Result<()> {
        self.seen += 1;
        let event = match ctx.input(0)? {
            Payload::Object(event) => event.clone(),
            other => anyhow::bail!("selection expects single events, got {:?}", other.kind()),
        };

        let Some(value) = event.get(&self.field).and_then(Value::as_f64) else {
            ctx.counters().fail();
            ctx.request_break();
            return Ok(());
        };
        if value >= self.min {
            self.selected += 1;
            ctx.counters().accept();
            ctx.post(0, Payload::Collection(vec![event]))?;
        }
        Ok(())
    }

    fn finish(&mut self, ctx: &mut TaskContext<'_>) -> anyhow::Result<()> {
        let Some(name) = &self.log_file else {
            return Ok(());
        };
        fs::create_dir_all(ctx.output_dir())?;
        let line = format!(
            "{}: {} of {} events with {} >= {}\n",
            ctx.task_name(),
            self.selected,
            self.seen,
            self.field,
            self.min
        );
        fs::write(ctx.output_dir().join(name), line)?;
        Ok(())
    }
}
