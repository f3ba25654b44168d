//! Evaluation fan-out and score roll-up

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use super::{
    EvaluationResult, GraderEvaluation, GraderRunner, GraderScore, Invocation, Oracle,
    OracleError,
};
use crate::config::OptimizerConfig;
use crate::stats::{DistributionSummary, Observation};
use crate::task::{GraderSpec, Implementation, TestCase};
use crate::{Error, Result};

/// Everything observed for one test case of one evaluation.
#[derive(Debug, Clone)]
pub struct CaseOutcome {
    /// Position of the test case in the suite
    pub case_index: usize,
    /// Oracle result for the case
    pub invocation: std::result::Result<Invocation, OracleError>,
    /// When the oracle call finished
    pub observed_at: DateTime<Utc>,
    /// One entry per grader, in grader order; `None` = missing
    pub scores: Vec<Option<GraderScore>>,
}

/// How cost/latency distributions are summarized.
#[derive(Debug, Clone)]
pub struct SummarySettings {
    /// Time the recency weights are computed against
    pub reference_time: DateTime<Utc>,
    /// Recency half life
    pub half_life: Duration,
    /// Percentiles to report
    pub percentiles: Vec<f64>,
}

impl SummarySettings {
    /// Settings from an engine configuration, referenced at `now`.
    #[must_use]
    pub fn from_config(config: &OptimizerConfig, now: DateTime<Utc>) -> Self {
        Self {
            reference_time: now,
            half_life: config.decay_half_life(),
            percentiles: config.summary_percentiles.clone(),
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Roll per-case verdicts up into an [`EvaluationResult`].
///
/// `outcomes` should be ordered by `case_index`; `total_cases` counts cases
/// that produced no outcome at all as failed invocations.
///
/// # Errors
///
/// Returns `Error::InvalidInput` if `settings` carries an invalid half life
/// or percentile.
pub fn aggregate(
    implementation_id: &str,
    graders: &[GraderSpec],
    outcomes: &[CaseOutcome],
    total_cases: usize,
    settings: &SummarySettings,
) -> Result<EvaluationResult> {
    let grader_scores: Vec<GraderEvaluation> = graders
        .iter()
        .enumerate()
        .map(|(g, spec)| {
            let available: Vec<&GraderScore> = outcomes
                .iter()
                .filter_map(|o| o.scores.get(g).and_then(Option::as_ref))
                .collect();
            let values: Vec<f64> = available.iter().map(|s| s.value()).collect();

            GraderEvaluation {
                grader_id: spec.id.clone(),
                grader_name: spec.name.clone(),
                score: mean(&values),
                scored_cases: values.len(),
                missing_cases: total_cases.saturating_sub(values.len()),
                reasonings: available
                    .iter()
                    .flat_map(|s| s.reasonings().iter().cloned())
                    .collect(),
            }
        })
        .collect();

    let graded: Vec<f64> = grader_scores.iter().filter_map(|g| g.score).collect();
    let final_score = mean(&graded);

    let mut cost_observations = Vec::new();
    let mut latency_observations = Vec::new();
    for outcome in outcomes {
        if let Ok(invocation) = &outcome.invocation {
            cost_observations.push(
                Observation::builder(invocation.cost)
                    .observed_at(outcome.observed_at)
                    .build(),
            );
            latency_observations.push(
                Observation::builder(invocation.latency_ms)
                    .observed_at(outcome.observed_at)
                    .build(),
            );
        }
    }

    let cost_summary = DistributionSummary::from_observations(
        &cost_observations,
        settings.reference_time,
        settings.half_life,
        &settings.percentiles,
    )?;
    let latency_summary = DistributionSummary::from_observations(
        &latency_observations,
        settings.reference_time,
        settings.half_life,
        &settings.percentiles,
    )?;

    Ok(EvaluationResult {
        implementation_id: implementation_id.to_string(),
        grader_scores,
        average_cost: cost_summary.as_ref().map(|s| s.mean),
        average_latency_ms: latency_summary.as_ref().map(|s| s.mean),
        cost_summary,
        latency_summary,
        total_cost: cost_observations
            .iter()
            .map(Observation::value)
            .filter(|c| c.is_finite())
            .sum(),
        test_cases: total_cases,
        failed_invocations: total_cases.saturating_sub(cost_observations.len()),
        final_score,
        created_at: settings.reference_time,
        cost_observations,
        latency_observations,
    })
}

async fn grade<G: GraderRunner>(
    runner: &G,
    grader: &GraderSpec,
    case: &TestCase,
    output: &str,
) -> Option<GraderScore> {
    match runner.score(grader, output, &case.expected_output).await {
        Ok(Some(score)) if score.is_valid() => Some(score),
        Ok(Some(score)) => {
            warn!(
                grader = %grader.id,
                case = %case.id,
                value = score.value(),
                "grader returned a score outside [0, 1]; treating as missing"
            );
            None
        }
        Ok(None) => {
            debug!(grader = %grader.id, case = %case.id, "grader abstained");
            None
        }
        Err(err) => {
            warn!(grader = %grader.id, case = %case.id, error = %err, "grader failed");
            None
        }
    }
}

async fn run_case<O: Oracle, G: GraderRunner>(
    case_index: usize,
    oracle: &O,
    runner: &G,
    implementation: &Implementation,
    case: &TestCase,
    graders: &[GraderSpec],
) -> CaseOutcome {
    let invocation = oracle.invoke(implementation, &case.input).await;
    let observed_at = Utc::now();

    let scores = match &invocation {
        Ok(done) => {
            let mut scores = Vec::with_capacity(graders.len());
            for grader in graders {
                scores.push(grade(runner, grader, case, &done.output).await);
            }
            scores
        }
        Err(err) => {
            warn!(
                implementation = %implementation.id(),
                case = %case.id,
                error = %err,
                "oracle invocation failed; scores for this case are missing"
            );
            vec![None; graders.len()]
        }
    };

    CaseOutcome {
        case_index,
        invocation,
        observed_at,
        scores,
    }
}

/// Scores implementations against a test suite.
///
/// Test cases of one evaluation run concurrently, at most `fan_out_limit`
/// at a time.
pub struct Evaluator<O, G> {
    oracle: Arc<O>,
    graders: Arc<G>,
    config: Arc<OptimizerConfig>,
}

impl<O, G> Clone for Evaluator<O, G> {
    fn clone(&self) -> Self {
        Self {
            oracle: Arc::clone(&self.oracle),
            graders: Arc::clone(&self.graders),
            config: Arc::clone(&self.config),
        }
    }
}

impl<O, G> Evaluator<O, G>
where
    O: Oracle + 'static,
    G: GraderRunner + 'static,
{
    /// Create an evaluator.
    #[must_use]
    pub fn new(oracle: Arc<O>, graders: Arc<G>, config: Arc<OptimizerConfig>) -> Self {
        Self {
            oracle,
            graders,
            config,
        }
    }

    /// Get the engine configuration.
    #[must_use]
    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Evaluate `implementation` on every test case with every grader.
    ///
    /// Transient oracle failures and grader failures become missing scores.
    ///
    /// # Errors
    ///
    /// Returns `Error::FatalOracle` as soon as any oracle call fails fatally;
    /// outstanding calls of this evaluation are cancelled.
    #[tracing::instrument(skip_all, fields(implementation = %implementation.id()))]
    pub async fn evaluate(
        &self,
        implementation: Arc<Implementation>,
        test_cases: Arc<[TestCase]>,
        graders: Arc<[GraderSpec]>,
    ) -> Result<EvaluationResult> {
        let limit = self.config.fan_out_limit.clamp(1, Semaphore::MAX_PERMITS);
        let permits = Arc::new(Semaphore::new(limit));
        let mut pending = JoinSet::new();

        for case_index in 0..test_cases.len() {
            let oracle = Arc::clone(&self.oracle);
            let runner = Arc::clone(&self.graders);
            let implementation = Arc::clone(&implementation);
            let test_cases = Arc::clone(&test_cases);
            let graders = Arc::clone(&graders);
            let permits = Arc::clone(&permits);

            pending.spawn(async move {
                let _permit = permits.acquire_owned().await;
                run_case(
                    case_index,
                    oracle.as_ref(),
                    runner.as_ref(),
                    &implementation,
                    &test_cases[case_index],
                    &graders,
                )
                .await
            });
        }

        let mut outcomes = Vec::with_capacity(test_cases.len());
        while let Some(joined) = pending.join_next().await {
            match joined {
                Ok(outcome) => {
                    if let Err(OracleError::Fatal(message)) = &outcome.invocation {
                        return Err(Error::FatalOracle(message.clone()));
                    }
                    outcomes.push(outcome);
                }
                Err(err) => warn!(error = %err, "test case task did not complete"),
            }
        }

        // completion order varies; aggregate in suite order
        outcomes.sort_by_key(|o| o.case_index);

        let settings = SummarySettings::from_config(&self.config, Utc::now());
        let result = aggregate(
            implementation.id(),
            &graders,
            &outcomes,
            test_cases.len(),
            &settings,
        )?;

        debug!(
            final_score = ?result.final_score,
            failed_invocations = result.failed_invocations,
            "evaluation finished"
        );
        Ok(result)
    }
}
