//! Implementation Registry - write-once record of every configuration tried
//!
//! The registry keeps each `Implementation` the engine creates, so that a
//! past candidate can be inspected or rolled back to after a run ends.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::Implementation;
use crate::{Error, Result};

/// Concurrent, insert-only store of implementations keyed by ID.
#[derive(Debug, Default)]
pub struct ImplementationRegistry {
    implementations: DashMap<String, Arc<Implementation>>,
}

impl ImplementationRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an implementation.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if an implementation with the same ID
    /// was already registered; records are never overwritten.
    pub fn register(&self, implementation: Arc<Implementation>) -> Result<()> {
        match self.implementations.entry(implementation.id().to_string()) {
            Entry::Occupied(existing) => Err(Error::InvalidInput(format!(
                "implementation {} is already registered",
                existing.key()
            ))),
            Entry::Vacant(slot) => {
                slot.insert(implementation);
                Ok(())
            }
        }
    }

    /// Get an implementation by ID.
    #[must_use]
    pub fn get(&self, implementation_id: &str) -> Option<Arc<Implementation>> {
        self.implementations
            .get(implementation_id)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// All implementations of a task, ordered by iteration then creation time.
    #[must_use]
    pub fn for_task(&self, task_id: &str) -> Vec<Arc<Implementation>> {
        let mut found: Vec<Arc<Implementation>> = self
            .implementations
            .iter()
            .filter(|entry| entry.value().task_id() == task_id)
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        found.sort_by_key(|imp| (imp.iteration(), imp.created_at()));
        found
    }

    /// Get the number of registered implementations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.implementations.len()
    }

    /// Check if the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.implementations.is_empty()
    }
}
