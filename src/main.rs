// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::env;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use the_slotgraph::backends::{BackendFactory, Collaborators, EventSource, RunSummary, VecPool, VecSource};
use the_slotgraph::config::{load_and_validate_config, RunConfig};
use the_slotgraph::engine::RunContext;
use the_slotgraph::tasks::demo;
use the_slotgraph::traits::Backend;

/// Events per mixing bin of the demo pool.
const EVENTS_PER_BIN: usize = 250;

fn collaborators(cfg: &RunConfig) -> Collaborators {
    let events = Arc::new(demo::events(cfg.events));
    let pool = VecPool::binned(demo::events(cfg.events), |event| {
        let id = event
            .as_object()
            .and_then(|v| v.get("id"))
            .and_then(|v| v.as_u64())
            .unwrap_or_default();
        id as usize / EVENTS_PER_BIN
    });

    Collaborators::default()
        .with_graph_factory(Arc::new(|| Ok(demo::build_graph()?)))
        .with_source_factory(Arc::new(move |worker, workers| -> Box<dyn EventSource> {
            Box::new(VecSource::partition(&events, worker, workers))
        }))
        .with_event_pool(Box::new(pool))
}

fn print_summary(summary: &RunSummary, elapsed: std::time::Duration) {
    println!("🚀 SlotGraph run ({} backend)", summary.backend);
    println!("═══════════════════════════════════");
    println!("Consumed:  {}", summary.counters.consumed);
    println!("Processed: {}", summary.counters.processed);
    println!("Accepted:  {}", summary.counters.accepted);
    println!("Failed:    {}", summary.counters.failed);
    println!("Post-loop tasks run: {}", summary.post_loop_executed);
    for file in &summary.finalized.files {
        println!("  📄 {}", file.display());
    }
    println!("  📊 {}", summary.finalized.stat_file.display());
    if !summary.mismatches.is_empty() {
        println!("⚠️  Outputs no worker produced: {:?}", summary.mismatches);
    }
    if !summary.failed_workers.is_empty() {
        println!("❌ Failed workers: {:?}", summary.failed_workers);
    }
    match &summary.finalized.sentinel {
        Some(sentinel) => println!("✅ Outputs valid ({})", sentinel.display()),
        None => println!("❌ Outputs not marked valid"),
    }
    println!("⏱️  {:.2?}", elapsed);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = env::args().collect();
    let mut cfg = match args.get(1) {
        Some(path) => load_and_validate_config(path)
            .with_context(|| format!("cannot load config {path}"))?,
        None => RunConfig::default(),
    };
    if let Some(selector) = args.get(2) {
        cfg.backend = selector.clone();
    }

    let mut backend = BackendFactory::from_config(&cfg, collaborators(&cfg))?;
    let mut run = RunContext::new(&cfg.output_dir);

    let start = Instant::now();
    let summary = backend.run(&mut run).await?;
    print_summary(&summary, start.elapsed());
    Ok(())
}
