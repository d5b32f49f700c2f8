// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde_json::{Map, Value};

use crate::graph::Payload;
use crate::traits::{Task, TaskContext};

/// Appends one row per input event to a tree, keeping only `columns`.
///
/// Missing columns are written as `null` so every row has the same shape.
#[derive(Debug, Clone)]
pub struct TreeWriter {
    columns: Vec<String>,
}

impl TreeWriter {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    fn row(&self, event: &Value) -> Map<String, Value> {
        self.columns
            .iter()
            .map(|column| {
                let value = event.get(column).cloned().unwrap_or(Value::Null);
                (column.clone(), value)
            })
            .collect()
    }
}

impl Task for TreeWriter {
    fn create_outputs(&mut self, ctx: &mut TaskContext<'_>) -> anyhow::Result<()> {
        ctx.post(0, Payload::Tree(Vec::new()))?;
        Ok(())
    }

    fn exec(&mut self, ctx: &mut TaskContext<'_>) -> anyhow::Result<()> {
        let rows: Vec<Map<String, Value>> = match ctx.input(0)? {
            Payload::Object(event) => vec![self.row(event)],
            Payload::Collection(events) => events.iter().map(|e| self.row(e)).collect(),
            Payload::Tree(_) => anyhow::bail!("tree writer reads events, not trees"),
        };
        let Payload::Tree(tree) = ctx.output_mut(0)? else {
            anyhow::bail!("tree writer output is not a tree");
        };
        tree.extend(rows);
        Ok(())
    }
}
