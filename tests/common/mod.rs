//! Scripted collaborators shared by the integration tests.
//!
//! The oracle echoes the implementation's prompt as its output, so graders
//! can key their verdicts on the prompt a candidate uses.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use llmtrace_optimizer::config::OptimizerConfig;
use llmtrace_optimizer::evaluation::{
    GraderError, GraderRunner, GraderScore, Invocation, Oracle, OracleError,
};
use llmtrace_optimizer::generator::{CandidateGenerator, GenerationContext, GenerationError};
use llmtrace_optimizer::optimizer::Optimizer;
use llmtrace_optimizer::task::{
    FieldOverrides, GraderKind, GraderSpec, Implementation, MemoryTaskStore, ModelConfig, Task,
    TestCase,
};

pub const TASK_ID: &str = "task-1";
pub const BASE_PROMPT: &str = "base";

// =============================================================================
// Oracle
// =============================================================================

#[derive(Default)]
pub struct ScriptedOracle {
    transient_inputs: HashSet<String>,
    fatal_prompts: HashSet<String>,
    delays: HashMap<String, Duration>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls with this input fail transiently.
    pub fn transient_on_input(mut self, input: &str) -> Self {
        self.transient_inputs.insert(input.to_string());
        self
    }

    /// Calls for implementations using this prompt fail fatally.
    pub fn fatal_on_prompt(mut self, prompt: &str) -> Self {
        self.fatal_prompts.insert(prompt.to_string());
        self
    }

    /// Calls for implementations using this prompt sleep first.
    pub fn delay_prompt(mut self, prompt: &str, delay: Duration) -> Self {
        self.delays.insert(prompt.to_string(), delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl Oracle for ScriptedOracle {
    async fn invoke(
        &self,
        implementation: &Implementation,
        input: &str,
    ) -> Result<Invocation, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let prompt = implementation.config().prompt.clone();
        if let Some(delay) = self.delays.get(&prompt) {
            tokio::time::sleep(*delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fatal_prompts.contains(&prompt) {
            return Err(OracleError::Fatal("invalid api key".to_string()));
        }
        if self.transient_inputs.contains(input) {
            return Err(OracleError::Transient("rate limited".to_string()));
        }

        let cost = f64::from(implementation.config().max_output_tokens) * 0.0001;
        Ok(Invocation::new(prompt, cost, 100.0))
    }
}

// =============================================================================
// Graders
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    Score(f64),
    Abstain,
    Fail,
}

/// Looks verdicts up by (grader id, output), then by output alone.
pub struct TableGrader {
    by_output: HashMap<String, Verdict>,
    by_grader: HashMap<(String, String), Verdict>,
    fallback: Verdict,
}

impl TableGrader {
    pub fn new() -> Self {
        Self {
            by_output: HashMap::new(),
            by_grader: HashMap::new(),
            fallback: Verdict::Score(0.0),
        }
    }

    pub fn score(mut self, output: &str, value: f64) -> Self {
        self.by_output.insert(output.to_string(), Verdict::Score(value));
        self
    }

    pub fn verdict(mut self, output: &str, verdict: Verdict) -> Self {
        self.by_output.insert(output.to_string(), verdict);
        self
    }

    pub fn grader_verdict(mut self, grader_id: &str, output: &str, verdict: Verdict) -> Self {
        self.by_grader
            .insert((grader_id.to_string(), output.to_string()), verdict);
        self
    }
}

impl GraderRunner for TableGrader {
    async fn score(
        &self,
        grader: &GraderSpec,
        output: &str,
        _expected_output: &str,
    ) -> Result<Option<GraderScore>, GraderError> {
        let verdict = self
            .by_grader
            .get(&(grader.id.clone(), output.to_string()))
            .or_else(|| self.by_output.get(output))
            .copied()
            .unwrap_or(self.fallback);

        match verdict {
            Verdict::Score(value) => Ok(Some(
                GraderScore::continuous(value).with_reasoning(format!("{output} scored {value}")),
            )),
            Verdict::Abstain => Ok(None),
            Verdict::Fail => Err(GraderError("judge unavailable".to_string())),
        }
    }
}

// =============================================================================
// Generator
// =============================================================================

#[derive(Debug, Clone)]
pub enum Step {
    Propose(Vec<FieldOverrides>),
    Fail,
    Stall(Duration),
}

/// Plays back one step per iteration; proposes nothing once exhausted.
#[derive(Default)]
pub struct ScriptedGenerator {
    steps: Mutex<VecDeque<Step>>,
    seen_best_prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into_iter().collect()),
            seen_best_prompts: Mutex::new(Vec::new()),
        }
    }

    /// One single-prompt proposal per iteration.
    pub fn prompts(prompts: &[&str]) -> Self {
        Self::new(
            prompts
                .iter()
                .map(|p| Step::Propose(vec![FieldOverrides::default().with_prompt(*p)])),
        )
    }

    /// Prompt of the current best implementation at each call.
    pub fn seen_best_prompts(&self) -> Vec<String> {
        self.seen_best_prompts.lock().unwrap().clone()
    }
}

impl CandidateGenerator for ScriptedGenerator {
    async fn propose(
        &self,
        ctx: GenerationContext<'_>,
    ) -> Result<Vec<FieldOverrides>, GenerationError> {
        self.seen_best_prompts
            .lock()
            .unwrap()
            .push(ctx.current_best.config().prompt.clone());

        let step = self.steps.lock().unwrap().pop_front();
        match step {
            Some(Step::Propose(proposals)) => Ok(proposals),
            Some(Step::Fail) => Err(GenerationError::Failed("rewriter offline".to_string())),
            Some(Step::Stall(delay)) => {
                tokio::time::sleep(delay).await;
                Ok(Vec::new())
            }
            None => Ok(Vec::new()),
        }
    }
}

// =============================================================================
// Fixtures
// =============================================================================

pub fn task(cases: usize, graders: usize) -> Task {
    let mut builder = Task::builder(TASK_ID, ModelConfig::new(BASE_PROMPT, "small", 0.7, 100))
        .project_id("project-1");
    for i in 0..cases {
        builder = builder.test_case(TestCase::new(format!("tc-{i}"), format!("input-{i}"), "expected"));
    }
    for i in 0..graders {
        builder = builder.grader(GraderSpec::new(
            format!("g-{i}"),
            format!("grader {i}"),
            GraderKind::Continuous,
        ));
    }
    builder.build()
}

pub fn store_with(task: Task) -> Arc<MemoryTaskStore> {
    let store = MemoryTaskStore::new();
    store.insert(task);
    Arc::new(store)
}

pub type TestOptimizer = Optimizer<MemoryTaskStore, ScriptedOracle, TableGrader, ScriptedGenerator>;

pub struct Harness {
    pub optimizer: TestOptimizer,
    pub oracle: Arc<ScriptedOracle>,
    pub generator: Arc<ScriptedGenerator>,
}

pub fn harness(
    task: Task,
    oracle: ScriptedOracle,
    grader: TableGrader,
    generator: ScriptedGenerator,
    config: OptimizerConfig,
) -> Harness {
    let oracle = Arc::new(oracle);
    let generator = Arc::new(generator);
    let optimizer = Optimizer::new(
        store_with(task),
        Arc::clone(&oracle),
        Arc::new(grader),
        Arc::clone(&generator),
        config,
    )
    .expect("valid config");
    Harness {
        optimizer,
        oracle,
        generator,
    }
}

pub fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}
