//! RetainForge: customer retention pipeline CLI
//!
//! This is the main entrypoint that loads configuration and the pre-fit
//! churn model, wires the stage sequence, runs the pipeline, and emits the
//! final report.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use serde::Serialize;

use retainforge::{
    Args, ChurnModel, ChurnScorer, EngagementComposer, FeedbackRecorder, IngestStage, OfferMap,
    OfferSelector, OpenAiGenerator, PersonaSegmenter, Pipeline, Record, SimulatedFeedback,
};

/// Final pipeline output: the full record collection plus run metadata.
#[derive(Serialize)]
struct PipelineReport {
    generated_at: DateTime<Utc>,
    customer_count: usize,
    customers: Vec<Record>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if args.verbose {
        println!("RetainForge - Customer Retention Pipeline");
        println!("=========================================\n");
    }

    // Startup configuration: all of this must be in place before any stage
    // runs, so failures here never leave a partial run behind.
    let api_key = std::env::var("OPENAI_API_KEY")
        .map_err(|_| anyhow!("OPENAI_API_KEY must be set in the environment"))?;

    let offer_map = OfferMap::load(Path::new(&args.offers))
        .with_context(|| format!("failed to load offer map from {}", args.offers))?;
    if args.verbose {
        println!("Loaded offer map: {} entries", offer_map.len());
    }

    let model = Arc::new(ChurnModel::load(Path::new(&args.model))?);
    if args.verbose {
        println!(
            "Loaded churn model: {} features ({})",
            model.feature_cols.len(),
            model.feature_cols.join(", ")
        );
    }

    let generator = OpenAiGenerator::new(&api_key, &args.llm_model)
        .context("failed to build the text-generation client")?;

    let start_time = Instant::now();

    let mut pipeline = Pipeline::new(vec![
        Box::new(IngestStage::new(&args.customers)),
        Box::new(ChurnScorer::new(model)),
        Box::new(PersonaSegmenter::new(
            args.clusters,
            args.seed,
            args.max_iters,
            args.tolerance,
        )),
        Box::new(OfferSelector::new(offer_map)),
        Box::new(EngagementComposer::new(Box::new(generator))),
        Box::new(FeedbackRecorder::new(Box::new(SimulatedFeedback))),
    ]);

    let customers = pipeline
        .run()
        .map_err(|e| anyhow!("pipeline failed in stage `{}`: {}", e.stage(), e))?;

    let elapsed = start_time.elapsed();
    println!("✓ Pipeline complete: {} customers", customers.len());
    if args.verbose {
        println!("  Processing time: {:.2}s", elapsed.as_secs_f64());
        for (stage, took) in pipeline.timings() {
            println!("  {}: {:.2}s", stage, took.as_secs_f64());
        }
    }

    print_summary(&customers);

    let report = PipelineReport {
        generated_at: Utc::now(),
        customer_count: customers.len(),
        customers,
    };
    let json = serde_json::to_string_pretty(&report)?;

    match &args.output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("failed to write report to {}", path))?;
            println!("\nReport saved to: {}", path);
        }
        None => println!("\n{}", json),
    }

    Ok(())
}

/// Print risk-tier and persona distributions for the finished run.
fn print_summary(customers: &[Record]) {
    if customers.is_empty() {
        return;
    }

    let mut by_risk: BTreeMap<&str, usize> = BTreeMap::new();
    let mut by_persona: BTreeMap<String, usize> = BTreeMap::new();
    for record in customers {
        if let Some(risk) = record.churn_risk {
            *by_risk.entry(risk.as_str()).or_insert(0) += 1;
        }
        if let Some(label) = &record.persona_label {
            *by_persona.entry(label.clone()).or_insert(0) += 1;
        }
    }

    println!("\n=== Churn Risk ===");
    for (tier, count) in &by_risk {
        let percentage = (*count as f64 / customers.len() as f64) * 100.0;
        println!("{}: {} customers ({:.1}%)", tier, count, percentage);
    }

    println!("\n=== Personas ===");
    for (label, count) in &by_persona {
        let percentage = (*count as f64 / customers.len() as f64) * 100.0;
        println!("{}: {} customers ({:.1}%)", label, count, percentage);
    }
}
