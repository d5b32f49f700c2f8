// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde_json::json;

use super::entries;
use crate::graph::Payload;
use crate::traits::{Task, TaskContext};

/// Post-loop summary of two event counts: input 0 over input 1.
///
/// Runs once on the merged counts, so the ratio covers every worker.
#[derive(Debug, Default)]
pub struct RatioSummary;

impl RatioSummary {
    pub fn new() -> Self {
        Self
    }
}

impl Task for RatioSummary {
    fn exec(&mut self, ctx: &mut TaskContext<'_>) -> anyhow::Result<()> {
        let numerator = entries(ctx.input(0)?)?;
        let denominator = entries(ctx.input(1)?)?;
        let ratio = if denominator == 0 {
            0.0
        } else {
            numerator as f64 / denominator as f64
        };
        ctx.post(
            0,
            Payload::Object(json!({
                "numerator": numerator,
                "denominator": denominator,
                "ratio": ratio,
            })),
        )?;
        Ok(())
    }
}
