//! Task and Implementation schema
//!
//! ## Schema Overview
//!
//! ```text
//! Task (1) ──< TestCase (N)
//!   │     └──< GraderSpec (N)
//!   │
//!   └──< Implementation (N)   [baseline at iteration 0, candidates after]
//!            └── FieldOverrides (⊆ MutableFieldSet)
//! ```
//!
//! A `Task` is read-only to the engine. Every candidate the engine tries is a
//! new, immutable `Implementation` derived from the task by overriding some
//! of its mutable fields.
//!
//! ## Usage
//!
//! ```rust
//! use llmtrace_optimizer::task::{
//!     FieldOverrides, Implementation, ModelConfig, MutableField, MutableFieldSet, Task,
//! };
//!
//! let task = Task::builder("task-1", ModelConfig::new("Summarize:", "gpt-4o-mini", 0.7, 256))
//!     .build();
//!
//! let fields = MutableFieldSet::new([MutableField::Temperature])?;
//! let overrides = FieldOverrides::default().with_temperature(0.2);
//! assert!(overrides.is_confined_to(&fields));
//!
//! let candidate = Implementation::candidate(&task, overrides, 1);
//! assert!((candidate.config().temperature - 0.2).abs() < f64::EPSILON);
//! # Ok::<(), llmtrace_optimizer::Error>(())
//! ```

mod field;
mod implementation;
mod registry;
mod store;

pub use field::{FieldOverrides, MutableField, MutableFieldSet};
pub use implementation::{Implementation, ImplementationBuilder};
pub use registry::ImplementationRegistry;
pub use store::{MemoryTaskStore, TaskStore};

use serde::{Deserialize, Serialize};

/// Fully resolved configuration an oracle executes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelConfig {
    /// Prompt text
    pub prompt: String,
    /// Model identifier
    pub model: String,
    /// Sampling temperature
    pub temperature: f64,
    /// Maximum output tokens
    pub max_output_tokens: u32,
}

impl ModelConfig {
    /// Create a model configuration.
    #[must_use]
    pub fn new(
        prompt: impl Into<String>,
        model: impl Into<String>,
        temperature: f64,
        max_output_tokens: u32,
    ) -> Self {
        Self {
            prompt: prompt.into(),
            model: model.into(),
            temperature,
            max_output_tokens,
        }
    }
}

/// One held-out example the task is scored on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TestCase {
    /// Test case ID
    pub id: String,
    /// Input handed to the oracle
    pub input: String,
    /// Reference output handed to graders
    pub expected_output: String,
}

impl TestCase {
    /// Create a test case.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        input: impl Into<String>,
        expected_output: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            input: input.into(),
            expected_output: expected_output.into(),
        }
    }
}

/// How a grader expresses its verdict.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GraderKind {
    /// Scalar in `[0, 1]`
    Continuous,
    /// Pass/fail, coerced to `{0, 1}`
    Boolean,
}

/// A configured scoring function.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GraderSpec {
    /// Grader ID
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Verdict kind
    pub kind: GraderKind,
}

impl GraderSpec {
    /// Create a grader specification.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: GraderKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
        }
    }
}

/// Baseline configuration under optimization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    id: String,
    project_id: Option<String>,
    config: ModelConfig,
    test_cases: Vec<TestCase>,
    graders: Vec<GraderSpec>,
}

impl Task {
    /// Create a builder for a task.
    #[must_use]
    pub fn builder(id: impl Into<String>, config: ModelConfig) -> TaskBuilder {
        TaskBuilder::new(id, config)
    }

    /// Get the task ID.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get the owning project ID, if known.
    #[must_use]
    pub fn project_id(&self) -> Option<&str> {
        self.project_id.as_deref()
    }

    /// Get the baseline configuration.
    #[must_use]
    pub const fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Get the test cases.
    #[must_use]
    pub fn test_cases(&self) -> &[TestCase] {
        &self.test_cases
    }

    /// Get the graders.
    #[must_use]
    pub fn graders(&self) -> &[GraderSpec] {
        &self.graders
    }
}

/// Builder for `Task`.
#[derive(Debug)]
pub struct TaskBuilder {
    id: String,
    project_id: Option<String>,
    config: ModelConfig,
    test_cases: Vec<TestCase>,
    graders: Vec<GraderSpec>,
}

impl TaskBuilder {
    /// Create a new builder with required fields.
    #[must_use]
    pub fn new(id: impl Into<String>, config: ModelConfig) -> Self {
        Self {
            id: id.into(),
            project_id: None,
            config,
            test_cases: Vec::new(),
            graders: Vec::new(),
        }
    }

    /// Set the owning project.
    #[must_use]
    pub fn project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    /// Add a test case.
    #[must_use]
    pub fn test_case(mut self, test_case: TestCase) -> Self {
        self.test_cases.push(test_case);
        self
    }

    /// Add a grader.
    #[must_use]
    pub fn grader(mut self, grader: GraderSpec) -> Self {
        self.graders.push(grader);
        self
    }

    /// Build the `Task`.
    #[must_use]
    pub fn build(self) -> Task {
        Task {
            id: self.id,
            project_id: self.project_id,
            config: self.config,
            test_cases: self.test_cases,
            graders: self.graders,
        }
    }
}
