//! Optimization controller
//!
//! Drives the search for a better configuration of a task:
//!
//! ```text
//! baseline ─► evaluate ─► best
//!                          │
//!   ┌──────────────────────┘
//!   ▼
//! generate ─► [candidates] ─► evaluate (concurrently) ─► select ─► improved?
//!   ▲                                                              │
//!   └──────────── until max_iterations or patience exhausted ◄─────┘
//! ```
//!
//! Iterations run strictly one after another; the candidates of one
//! iteration are evaluated concurrently, each bounded by the candidate
//! timeout. Only structural problems and fatal oracle failures abort a run;
//! every other failure is recorded in the iteration log as a missing value.

mod record;
mod request;
mod run;

pub use record::{
    CandidateFailure, CandidateRecord, IterationRecord, OptimizationResult, StopReason,
};
pub use request::OptimizationRequest;
pub use run::{is_improvement, IMPROVEMENT_TOLERANCE};

use std::cmp::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::config::OptimizerConfig;
use crate::evaluation::{
    EvaluationResult, Evaluator, GraderRunner, Oracle, SummarySettings,
};
use crate::generator::{CandidateGenerator, GenerationContext, GenerationError};
use crate::task::{
    FieldOverrides, GraderSpec, Implementation, ImplementationRegistry, MutableField,
    MutableFieldSet, Task, TaskStore, TestCase,
};
use crate::{Error, Result};
use run::OptimizationRun;

type CandidateOutcome = std::result::Result<EvaluationResult, CandidateFailure>;

/// Test cases and graders shared by every evaluation of a run.
struct Suite {
    test_cases: Arc<[TestCase]>,
    graders: Arc<[GraderSpec]>,
}

async fn evaluate_bounded<O, G>(
    evaluator: &Evaluator<O, G>,
    timeout: Duration,
    implementation: Arc<Implementation>,
    test_cases: Arc<[TestCase]>,
    graders: Arc<[GraderSpec]>,
) -> Result<CandidateOutcome>
where
    O: Oracle + 'static,
    G: GraderRunner + 'static,
{
    match tokio::time::timeout(timeout, evaluator.evaluate(implementation, test_cases, graders))
        .await
    {
        Ok(Ok(evaluation)) => Ok(Ok(evaluation)),
        Ok(Err(err @ Error::FatalOracle(_))) => Err(err),
        Ok(Err(err)) => Ok(Err(CandidateFailure::Aborted(err.to_string()))),
        Err(_) => Ok(Err(CandidateFailure::TimedOut)),
    }
}

fn rejection_reason(overrides: &FieldOverrides, allowed: &MutableFieldSet) -> Option<String> {
    let outside = overrides.fields_outside(allowed);
    if !outside.is_empty() {
        let names: Vec<String> = outside.iter().map(|f| format!("'{f}'")).collect();
        return Some(format!("not changeable in this run: {}", names.join(", ")));
    }
    overrides.validate().err().map(|err| err.to_string())
}

/// Highest-scoring candidate; ties go to the earliest generated.
fn select_best(candidates: &[CandidateRecord]) -> Option<(usize, f64)> {
    candidates
        .iter()
        .enumerate()
        .filter_map(|(pos, c)| c.score().map(|score| (pos, score)))
        .fold(None, |best, (pos, score)| match best {
            None => Some((pos, score)),
            Some((best_pos, best_score)) => match score.total_cmp(&best_score) {
                Ordering::Greater => Some((pos, score)),
                Ordering::Equal
                    if candidates[pos].generation_index
                        < candidates[best_pos].generation_index =>
                {
                    Some((pos, score))
                }
                _ => Some((best_pos, best_score)),
            },
        })
}

/// Earliest-generated candidate that became an implementation.
fn earliest_created(candidates: &[CandidateRecord]) -> Option<usize> {
    candidates
        .iter()
        .enumerate()
        .filter(|(_, c)| c.implementation_id.is_some())
        .min_by_key(|(_, c)| c.generation_index)
        .map(|(pos, _)| pos)
}

/// Iterative implementation optimizer.
///
/// # Example
///
/// ```rust,no_run
/// # use std::sync::Arc;
/// # use llmtrace_optimizer::config::OptimizerConfig;
/// # use llmtrace_optimizer::evaluation::{GraderRunner, Oracle};
/// # use llmtrace_optimizer::generator::PerturbationGenerator;
/// # use llmtrace_optimizer::optimizer::{OptimizationRequest, Optimizer};
/// # use llmtrace_optimizer::task::{MemoryTaskStore, MutableField};
/// # async fn example<O: Oracle + 'static, G: GraderRunner + 'static>(
/// #     oracle: Arc<O>, graders: Arc<G>,
/// # ) -> llmtrace_optimizer::Result<()> {
/// let optimizer = Optimizer::new(
///     Arc::new(MemoryTaskStore::new()),
///     oracle,
///     graders,
///     Arc::new(PerturbationGenerator::builder().seed(7).build()),
///     OptimizerConfig::default(),
/// )?;
///
/// let request = OptimizationRequest::new("task-1", 10, [MutableField::Temperature], 3)?
///     .with_variants_per_iter(4)
///     .with_improvement_threshold(0.01);
/// let result = optimizer.run(&request).await?;
/// println!("best: {:?} ({:?})", result.best_implementation_id, result.best_score);
/// # Ok(())
/// # }
/// ```
pub struct Optimizer<S, O, G, C> {
    store: Arc<S>,
    evaluator: Evaluator<O, G>,
    generator: Arc<C>,
    registry: Arc<ImplementationRegistry>,
    config: Arc<OptimizerConfig>,
}

impl<S, O, G, C> Optimizer<S, O, G, C>
where
    S: TaskStore,
    O: Oracle + 'static,
    G: GraderRunner + 'static,
    C: CandidateGenerator,
{
    /// Create an optimizer with its own implementation registry.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfig` if `config` fails validation.
    pub fn new(
        store: Arc<S>,
        oracle: Arc<O>,
        graders: Arc<G>,
        generator: Arc<C>,
        config: OptimizerConfig,
    ) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config);
        Ok(Self {
            store,
            evaluator: Evaluator::new(oracle, graders, Arc::clone(&config)),
            generator,
            registry: Arc::new(ImplementationRegistry::new()),
            config,
        })
    }

    /// Record implementations into a shared registry instead.
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<ImplementationRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Every implementation this optimizer has created.
    #[must_use]
    pub const fn registry(&self) -> &Arc<ImplementationRegistry> {
        &self.registry
    }

    /// Get the engine configuration.
    #[must_use]
    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Positional form of [`Optimizer::run`] with engine defaults for the
    /// optional parameters.
    ///
    /// # Errors
    ///
    /// As [`Optimizer::run`].
    pub async fn run_task(
        &self,
        task_id: &str,
        max_iterations: u32,
        changeable_fields: impl IntoIterator<Item = MutableField>,
        patience: u32,
    ) -> Result<OptimizationResult> {
        let request =
            OptimizationRequest::new(task_id, max_iterations, changeable_fields, patience)?;
        self.run(&request).await
    }

    /// Search for a configuration of the task that scores better than its
    /// baseline.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidInput` if the request fails validation
    /// - `Error::TaskNotFound`, `Error::NoTestCases`, `Error::NoGraders` if
    ///   the task cannot be evaluated at all
    /// - `Error::FatalOracle` if the oracle fails fatally
    #[tracing::instrument(skip_all, fields(task_id = %request.task_id))]
    pub async fn run(&self, request: &OptimizationRequest) -> Result<OptimizationResult> {
        request.validate()?;

        let task = self.store.get_task(&request.task_id).await?;
        if task.test_cases().is_empty() {
            return Err(Error::NoTestCases(task.id().to_string()));
        }
        if task.graders().is_empty() {
            return Err(Error::NoGraders(task.id().to_string()));
        }

        let variants = request
            .variants_per_iter
            .unwrap_or(self.config.default_variants_per_iter);
        let suite = Suite {
            test_cases: task.test_cases().into(),
            graders: task.graders().into(),
        };
        let started = Instant::now();

        let baseline = Arc::new(Implementation::baseline(&task));
        self.registry.register(Arc::clone(&baseline))?;
        let baseline_evaluation = match evaluate_bounded(
            &self.evaluator,
            self.config.candidate_timeout(),
            Arc::clone(&baseline),
            Arc::clone(&suite.test_cases),
            Arc::clone(&suite.graders),
        )
        .await?
        {
            Ok(evaluation) => Some(evaluation),
            Err(failure) => {
                warn!(?failure, "baseline evaluation failed; any scored candidate will improve on it");
                None
            }
        };

        let mut run = OptimizationRun::new(baseline, baseline_evaluation);
        info!(
            baseline_score = ?run.best_score(),
            max_iterations = request.max_iterations,
            patience = request.patience,
            variants,
            "baseline evaluated"
        );

        let mut stop_reason = StopReason::MaxIterations;
        for iteration in 1..=request.max_iterations {
            if self
                .config
                .run_timeout()
                .is_some_and(|budget| started.elapsed() >= budget)
            {
                info!(iteration, "run budget exhausted");
                stop_reason = StopReason::Deadline;
                break;
            }

            let record = self
                .run_iteration(&task, request, iteration, variants, &mut run, &suite)
                .await?;
            info!(
                iteration,
                candidates = record.candidates.len(),
                iteration_score = ?record.evaluation.as_ref().and_then(|e| e.final_score),
                improved = record.improved,
                best_score = ?record.best_score_after,
                streak = record.non_improving_streak,
                "iteration finished"
            );
            run.record_iteration(record);

            if run.streak() >= request.patience {
                info!(iteration, "no improvement within patience; stopping");
                stop_reason = StopReason::Converged;
                break;
            }
        }

        run.finish(
            stop_reason,
            &SummarySettings::from_config(&self.config, Utc::now()),
        )
    }

    async fn run_iteration(
        &self,
        task: &Task,
        request: &OptimizationRequest,
        iteration: u32,
        variants: usize,
        run: &mut OptimizationRun,
        suite: &Suite,
    ) -> Result<IterationRecord> {
        let ctx = GenerationContext {
            task,
            current_best: run.best(),
            best_score: run.best_score(),
            allowed_fields: &request.changeable_fields,
            iteration,
            variants,
        };
        let generated =
            match tokio::time::timeout(self.config.generation_timeout(), self.generator.propose(ctx))
                .await
            {
                Ok(generated) => generated,
                Err(_) => Err(GenerationError::TimedOut(self.config.generation_timeout_ms)),
            };

        let mut proposals = match generated {
            Ok(proposals) => proposals,
            Err(err) => {
                warn!(iteration, error = %err, "candidate generation failed");
                let streak = run.mark_not_improved();
                return Ok(IterationRecord {
                    iteration,
                    proposed_changes: None,
                    candidate_id: None,
                    evaluation: None,
                    improved: false,
                    best_score_after: run.best_score(),
                    non_improving_streak: streak,
                    generation_failure: Some(err.to_string()),
                    candidates: Vec::new(),
                });
            }
        };
        if proposals.len() > variants {
            warn!(
                iteration,
                proposed = proposals.len(),
                variants,
                "generator returned more proposals than requested; extra dropped"
            );
            proposals.truncate(variants);
        }

        let mut candidates = Vec::with_capacity(proposals.len());
        let mut created: Vec<(usize, Arc<Implementation>)> = Vec::with_capacity(proposals.len());
        let mut pending = JoinSet::new();

        for (generation_index, overrides) in proposals.into_iter().enumerate() {
            if let Some(reason) = rejection_reason(&overrides, &request.changeable_fields) {
                warn!(iteration, generation_index, %reason, "proposal rejected");
                candidates.push(CandidateRecord {
                    generation_index,
                    implementation_id: None,
                    overrides,
                    evaluation: None,
                    failure: Some(CandidateFailure::Rejected(reason)),
                });
                continue;
            }

            let implementation = Arc::new(Implementation::candidate(task, overrides, iteration));
            self.registry.register(Arc::clone(&implementation))?;
            created.push((generation_index, Arc::clone(&implementation)));

            let evaluator = self.evaluator.clone();
            let timeout = self.config.candidate_timeout();
            let test_cases = Arc::clone(&suite.test_cases);
            let graders = Arc::clone(&suite.graders);
            pending.spawn(async move {
                let outcome = evaluate_bounded(
                    &evaluator,
                    timeout,
                    Arc::clone(&implementation),
                    test_cases,
                    graders,
                )
                .await;
                (generation_index, implementation, outcome)
            });
        }

        // one record per finished candidate, in completion order
        while let Some(joined) = pending.join_next().await {
            let (generation_index, implementation, outcome) = match joined {
                Ok(done) => done,
                Err(err) => {
                    warn!(iteration, error = %err, "candidate evaluation task did not complete");
                    continue;
                }
            };
            let (evaluation, failure) = match outcome? {
                Ok(evaluation) => (Some(evaluation), None),
                Err(failure) => {
                    warn!(
                        iteration,
                        implementation = %implementation.id(),
                        ?failure,
                        "candidate evaluation failed"
                    );
                    (None, Some(failure))
                }
            };
            candidates.push(CandidateRecord {
                generation_index,
                implementation_id: Some(implementation.id().to_string()),
                overrides: implementation.overrides().clone(),
                evaluation,
                failure,
            });
        }
        for (generation_index, implementation) in &created {
            if !candidates
                .iter()
                .any(|c| c.generation_index == *generation_index)
            {
                candidates.push(CandidateRecord {
                    generation_index: *generation_index,
                    implementation_id: Some(implementation.id().to_string()),
                    overrides: implementation.overrides().clone(),
                    evaluation: None,
                    failure: Some(CandidateFailure::Aborted(
                        "evaluation task panicked or was cancelled".to_string(),
                    )),
                });
            }
        }

        for evaluation in candidates.iter().filter_map(|c| c.evaluation.as_ref()) {
            run.absorb(evaluation);
        }

        let (selected, improved) = match select_best(&candidates) {
            Some((pos, score)) if run.improves(score, request.improvement_threshold) => {
                let generation_index = candidates[pos].generation_index;
                let implementation = created
                    .iter()
                    .find(|(index, _)| *index == generation_index)
                    .map(|(_, implementation)| Arc::clone(implementation))
                    .ok_or_else(|| {
                        Error::Other(format!(
                            "scored candidate {generation_index} has no implementation"
                        ))
                    })?;
                run.promote(implementation, score);
                (Some(pos), true)
            }
            Some((pos, _)) => {
                run.mark_not_improved();
                (Some(pos), false)
            }
            None => {
                run.mark_not_improved();
                (earliest_created(&candidates), false)
            }
        };

        let headline = selected.map(|pos| &candidates[pos]);
        let proposed_changes = headline.map(|c| c.overrides.clone());
        let candidate_id = headline.and_then(|c| c.implementation_id.clone());
        let evaluation = headline.and_then(|c| c.evaluation.clone());

        Ok(IterationRecord {
            iteration,
            proposed_changes,
            candidate_id,
            evaluation,
            improved,
            best_score_after: run.best_score(),
            non_improving_streak: run.streak(),
            generation_failure: None,
            candidates,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(generation_index: usize, score: Option<f64>) -> CandidateRecord {
        CandidateRecord {
            generation_index,
            implementation_id: Some(format!("impl-{generation_index}")),
            overrides: FieldOverrides::default(),
            evaluation: score.map(|s| EvaluationResult {
                implementation_id: format!("impl-{generation_index}"),
                grader_scores: Vec::new(),
                average_cost: None,
                average_latency_ms: None,
                cost_summary: None,
                latency_summary: None,
                total_cost: 0.0,
                test_cases: 1,
                failed_invocations: 0,
                final_score: Some(s),
                created_at: Utc::now(),
                cost_observations: Vec::new(),
                latency_observations: Vec::new(),
            }),
            failure: None,
        }
    }

    #[test]
    fn test_select_best_highest_score() {
        let candidates = vec![record(0, Some(0.2)), record(1, Some(0.9)), record(2, None)];
        assert_eq!(select_best(&candidates), Some((1, 0.9)));
    }

    #[test]
    fn test_select_best_tie_goes_to_earliest_generated() {
        // completion order differs from generation order
        let candidates = vec![record(2, Some(0.5)), record(0, Some(0.5)), record(1, Some(0.1))];
        assert_eq!(select_best(&candidates), Some((1, 0.5)));
    }

    #[test]
    fn test_select_best_none_scored() {
        let candidates = vec![record(0, None), record(1, None)];
        assert_eq!(select_best(&candidates), None);
        assert_eq!(earliest_created(&candidates), Some(0));
    }

    #[test]
    fn test_rejection_reason() {
        let allowed = MutableFieldSet::new([MutableField::Temperature]).unwrap();
        assert!(rejection_reason(&FieldOverrides::default().with_temperature(0.3), &allowed).is_none());
        assert!(rejection_reason(&FieldOverrides::default().with_model("x"), &allowed)
            .unwrap()
            .contains("model"));
        assert!(rejection_reason(&FieldOverrides::default().with_temperature(-1.0), &allowed).is_some());

        // an allowed field does not mask a disallowed one
        let mixed = FieldOverrides::default()
            .with_temperature(0.3)
            .with_model("x")
            .with_prompt("p");
        let reason = rejection_reason(&mixed, &allowed).unwrap();
        assert!(reason.contains("'model'") && reason.contains("'prompt'"));
        assert!(!reason.contains("temperature"));
        assert_eq!(
            rejection_reason(&mixed, &allowed).is_some(),
            !mixed.is_confined_to(&allowed)
        );
    }
}
