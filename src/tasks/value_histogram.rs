// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::graph::Payload;
use crate::traits::{Task, TaskContext};

/// Fixed-width histogram of one numeric field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    pub counts: Vec<u64>,
    pub underflow: u64,
    pub overflow: u64,
}

/// Fills a [`Histogram`] of `field` over `[min, max)` from its input.
///
/// The input may be a single event (object) or a collection of them; events
/// without a numeric `field` are skipped.
#[derive(Debug, Clone)]
pub struct ValueHistogram {
    field: String,
    bins: usize,
    min: f64,
    max: f64,
}

impl ValueHistogram {
    pub fn new(field: impl Into<String>, bins: usize, min: f64, max: f64) -> Self {
        Self {
            field: field.into(),
            bins: bins.max(1),
            min,
            max,
        }
    }

    fn fill(&self, hist: &mut Histogram, event: &Value) {
        let Some(x) = event.get(&self.field).and_then(Value::as_f64) else {
            return;
        };
        if x < self.min {
            hist.underflow += 1;
        } else if x >= self.max {
            hist.overflow += 1;
        } else {
            let width = (self.max - self.min) / self.bins as f64;
            let bin = (((x - self.min) / width) as usize).min(self.bins - 1);
            hist.counts[bin] += 1;
        }
    }
}

impl Task for ValueHistogram {
    fn create_outputs(&mut self, ctx: &mut TaskContext<'_>) -> anyhow::Result<()> {
        let empty = Histogram {
            counts: vec![0; self.bins],
            underflow: 0,
            overflow: 0,
        };
        ctx.post(0, Payload::Object(serde_json::to_value(empty)?))?;
        Ok(())
    }

    fn exec(&mut self, ctx: &mut TaskContext<'_>) -> anyhow::Result<()> {
        let events: Vec<Value> = match ctx.input(0)? {
            Payload::Object(event) => vec![event.clone()],
            Payload::Collection(events) => events.clone(),
            Payload::Tree(_) => anyhow::bail!("cannot histogram a tree input"),
        };

        let Payload::Object(current) = ctx.output(0)? else {
            anyhow::bail!("histogram output is not an object");
        };
        let mut hist: Histogram = serde_json::from_value(current.clone())?;
        for event in &events {
            self.fill(&mut hist, event);
        }
        *ctx.output_mut(0)? = Payload::Object(serde_json::to_value(hist)?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fill_puts_values_in_their_bins() {
        let h = ValueHistogram::new("pt", 4, 0.0, 4.0);
        let mut hist = Histogram {
            counts: vec![0; 4],
            underflow: 0,
            overflow: 0,
        };
        for x in [-1.0, 0.0, 0.5, 1.5, 3.99, 4.0, 7.0] {
            h.fill(&mut hist, &json!({ "pt": x }));
        }
        h.fill(&mut hist, &json!({ "eta": 1.0 }));

        assert_eq!(hist.counts, vec![2, 1, 0, 1]);
        assert_eq!(hist.underflow, 1);
        assert_eq!(hist.overflow, 2);
    }
}
