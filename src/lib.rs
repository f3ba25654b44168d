//! # llmtrace-optimizer: Iterative Implementation Optimization for LLM Tasks
//!
//! Given a task (prompt + model + generation parameters), its test cases and
//! its graders, the engine searches for a modified configuration that scores
//! better on the test suite, within an iteration budget and an early-stopping
//! (patience) rule.
//!
//! ## Design Principles
//!
//! - **Write-once history**: every candidate is a new immutable
//!   `Implementation`; "best" is a pointer into the iteration log
//! - **Missing is not zero**: failed or abstaining graders never count as a
//!   failing score
//! - **Bounded concurrency**: candidates of one iteration are evaluated in
//!   parallel, test cases fan out under a permit limit, iterations stay
//!   sequential
//! - **Capabilities, not hierarchies**: oracle, grader runner, candidate
//!   generator and task store are single-operation traits
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use llmtrace_optimizer::config::OptimizerConfig;
//! use llmtrace_optimizer::evaluation::{
//!     GraderError, GraderRunner, GraderScore, Invocation, Oracle, OracleError,
//! };
//! use llmtrace_optimizer::generator::PerturbationGenerator;
//! use llmtrace_optimizer::optimizer::Optimizer;
//! use llmtrace_optimizer::task::{GraderSpec, Implementation, MemoryTaskStore, MutableField};
//!
//! struct Echo;
//! impl Oracle for Echo {
//!     async fn invoke(&self, imp: &Implementation, input: &str) -> Result<Invocation, OracleError> {
//!         Ok(Invocation::new(format!("{} {input}", imp.config().prompt), 0.001, 120.0))
//!     }
//! }
//!
//! struct Exact;
//! impl GraderRunner for Exact {
//!     async fn score(&self, _: &GraderSpec, output: &str, expected: &str)
//!         -> Result<Option<GraderScore>, GraderError> {
//!         Ok(Some(GraderScore::boolean(output == expected)))
//!     }
//! }
//!
//! # async fn example() -> llmtrace_optimizer::Result<()> {
//! let optimizer = Optimizer::new(
//!     Arc::new(MemoryTaskStore::new()),
//!     Arc::new(Echo),
//!     Arc::new(Exact),
//!     Arc::new(PerturbationGenerator::builder().seed(1).build()),
//!     OptimizerConfig::default(),
//! )?;
//! let result = optimizer.run_task("task-1", 10, [MutableField::Temperature], 3).await?;
//! println!("{} iterations, best {:?}", result.iterations_run, result.best_score);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod config;
pub mod error;
pub mod evaluation;
pub mod generator;
pub mod optimizer;
pub mod stats;
pub mod task;
pub mod telemetry;

pub use error::{Error, Result};
pub use optimizer::{OptimizationRequest, OptimizationResult, Optimizer};
