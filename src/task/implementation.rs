//! Implementation - one immutable candidate configuration of a task

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{FieldOverrides, ModelConfig, Task};

/// A full configuration derived from a task by overriding zero or more of
/// its mutable fields.
///
/// Implementations are never edited after creation; every iteration of an
/// optimization run creates new ones, so the run history stays auditable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Implementation {
    id: String,
    task_id: String,
    overrides: FieldOverrides,
    config: ModelConfig,
    iteration: u32,
    created_at: DateTime<Utc>,
}

impl Implementation {
    /// The task's own configuration, as iteration 0.
    #[must_use]
    pub fn baseline(task: &Task) -> Self {
        Self::builder(task, FieldOverrides::default()).build()
    }

    /// A candidate created during `iteration`, with a fresh ID.
    #[must_use]
    pub fn candidate(task: &Task, overrides: FieldOverrides, iteration: u32) -> Self {
        Self::builder(task, overrides).iteration(iteration).build()
    }

    /// Create a builder for an implementation of `task`.
    #[must_use]
    pub fn builder(task: &Task, overrides: FieldOverrides) -> ImplementationBuilder {
        ImplementationBuilder::new(task, overrides)
    }

    /// Get the implementation ID.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get the parent task ID.
    #[must_use]
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// Get the overridden fields.
    #[must_use]
    pub const fn overrides(&self) -> &FieldOverrides {
        &self.overrides
    }

    /// Get the resolved configuration.
    #[must_use]
    pub const fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Get the iteration that created this implementation (0 = baseline).
    #[must_use]
    pub const fn iteration(&self) -> u32 {
        self.iteration
    }

    /// Whether this is the unmodified task configuration.
    #[must_use]
    pub fn is_baseline(&self) -> bool {
        self.iteration == 0 && self.overrides.is_empty()
    }

    /// Get the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Builder for `Implementation`.
#[derive(Debug)]
pub struct ImplementationBuilder {
    id: Option<String>,
    task_id: String,
    overrides: FieldOverrides,
    config: ModelConfig,
    iteration: u32,
    created_at: DateTime<Utc>,
}

impl ImplementationBuilder {
    /// Create a new builder; the configuration is resolved immediately.
    #[must_use]
    pub fn new(task: &Task, overrides: FieldOverrides) -> Self {
        let config = overrides.apply(task.config());
        Self {
            id: None,
            task_id: task.id().to_string(),
            overrides,
            config,
            iteration: 0,
            created_at: Utc::now(),
        }
    }

    /// Use a fixed ID instead of a generated one.
    #[must_use]
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the creating iteration.
    #[must_use]
    pub const fn iteration(mut self, iteration: u32) -> Self {
        self.iteration = iteration;
        self
    }

    /// Set a custom creation timestamp.
    #[must_use]
    pub const fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Build the `Implementation`.
    #[must_use]
    pub fn build(self) -> Implementation {
        Implementation {
            id: self.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            task_id: self.task_id,
            overrides: self.overrides,
            config: self.config,
            iteration: self.iteration,
            created_at: self.created_at,
        }
    }
}
