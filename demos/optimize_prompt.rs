//! Prompt Optimization Example
//!
//! Optimizes a toy arithmetic task against an in-process simulated model:
//! the simulated model answers correctly more often at low temperature and
//! when the prompt asks it to show its work.
//!
//! Run with: RUST_LOG=llmtrace_optimizer=info cargo run --example optimize_prompt

use std::sync::Arc;

use anyhow::Context;
use llmtrace_optimizer::config::OptimizerConfig;
use llmtrace_optimizer::evaluation::{
    GraderError, GraderRunner, GraderScore, Invocation, Oracle, OracleError,
};
use llmtrace_optimizer::generator::PerturbationGenerator;
use llmtrace_optimizer::optimizer::{OptimizationRequest, Optimizer};
use llmtrace_optimizer::task::{
    GraderKind, GraderSpec, Implementation, MemoryTaskStore, ModelConfig, MutableField, Task,
    TestCase,
};
use llmtrace_optimizer::telemetry::init_tracing;

/// Deterministic stand-in for an LLM provider.
struct SimulatedModel;

impl Oracle for SimulatedModel {
    async fn invoke(
        &self,
        implementation: &Implementation,
        input: &str,
    ) -> Result<Invocation, OracleError> {
        let config = implementation.config();
        let (a, b) = input
            .split_once('+')
            .and_then(|(a, b)| Some((a.trim().parse::<i64>().ok()?, b.trim().parse::<i64>().ok()?)))
            .ok_or_else(|| OracleError::Transient(format!("cannot parse {input:?}")))?;

        // each case has its own difficulty in [0, 1)
        let difficulty = ((a * 31 + b * 17).rem_euclid(100)) as f64 / 100.0;
        let mut skill = 1.0 - config.temperature / 2.0;
        if config.prompt.contains("step by step") {
            skill += 0.25;
        }
        if config.model == "large" {
            skill += 0.15;
        }

        let answer = if skill > difficulty { a + b } else { a + b + 1 };
        let tokens = config.max_output_tokens.min(64);
        Ok(Invocation::new(
            answer.to_string(),
            f64::from(tokens) * if config.model == "large" { 0.00003 } else { 0.00001 },
            80.0 + f64::from(tokens) * 2.5,
        ))
    }
}

struct Graders;

impl GraderRunner for Graders {
    async fn score(
        &self,
        grader: &GraderSpec,
        output: &str,
        expected_output: &str,
    ) -> Result<Option<GraderScore>, GraderError> {
        match grader.kind {
            GraderKind::Boolean => Ok(Some(GraderScore::boolean(output == expected_output))),
            GraderKind::Continuous => {
                let (Ok(got), Ok(want)) = (output.parse::<f64>(), expected_output.parse::<f64>())
                else {
                    return Ok(None);
                };
                let closeness = 1.0 / (1.0 + (got - want).abs());
                Ok(Some(
                    GraderScore::continuous(closeness).with_reasoning(format!("off by {}", got - want)),
                ))
            }
        }
    }
}

fn arithmetic_task() -> Task {
    let mut builder = Task::builder(
        "arith-1",
        ModelConfig::new("Answer with a number.", "small", 1.2, 128),
    )
    .project_id("demo")
    .grader(GraderSpec::new("exact", "Exact match", GraderKind::Boolean))
    .grader(GraderSpec::new("close", "Numeric closeness", GraderKind::Continuous));

    for i in 0..12_i64 {
        let (a, b) = (i * 7 + 3, i * 13 + 5);
        builder = builder.test_case(TestCase::new(
            format!("case-{i}"),
            format!("{a} + {b}"),
            (a + b).to_string(),
        ));
    }
    builder.build()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("llmtrace_optimizer=info");

    println!("=== llmtrace-optimizer: prompt optimization ===\n");

    let store = MemoryTaskStore::new();
    store.insert(arithmetic_task());

    let generator = PerturbationGenerator::builder()
        .seed(2024)
        .temperature_step(0.4)
        .prompts([
            "Answer with a number.",
            "Think step by step, then answer with a number.",
        ])
        .models(["small", "large"])
        .build();

    let config = OptimizerConfig::builder()
        .fan_out_limit(4)
        .candidate_timeout_ms(5_000)
        .build()?;

    let optimizer = Optimizer::new(
        Arc::new(store),
        Arc::new(SimulatedModel),
        Arc::new(Graders),
        Arc::new(generator),
        config,
    )?;

    let request = OptimizationRequest::new(
        "arith-1",
        8,
        [
            MutableField::Prompt,
            MutableField::Temperature,
            MutableField::Model,
        ],
        3,
    )?
    .with_variants_per_iter(3)
    .with_improvement_threshold(0.01);

    let result = optimizer.run(&request).await?;

    println!("Baseline score: {:?}", result.baseline_score);
    for it in &result.iterations {
        println!(
            "  iter {:>2}: candidates={} score={:?} improved={} best={:?}",
            it.iteration,
            it.candidates.len(),
            it.evaluation.as_ref().and_then(|e| e.final_score),
            it.improved,
            it.best_score_after,
        );
    }
    println!(
        "\nStopped ({:?}) after {} iterations; total cost ${:.5}",
        result.stop_reason, result.iterations_run, result.total_cost
    );

    match result.best_implementation_id.as_deref() {
        Some(best_id) => {
            let best = optimizer
                .registry()
                .get(best_id)
                .context("best implementation missing from registry")?;
            println!("Best score: {:?}", result.best_score);
            println!("Best config: {}", serde_json::to_string_pretty(best.config())?);
        }
        None => println!("No candidate beat the baseline."),
    }

    if let Some(latency) = &result.latency_summary {
        println!(
            "Latency p50={:?} ms p95={:?} ms",
            latency.percentile(50.0),
            latency.percentile(95.0)
        );
    }

    Ok(())
}
