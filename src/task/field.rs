//! Mutable fields and field overrides

use serde::{Deserialize, Serialize};

use super::ModelConfig;
use crate::{Error, Result};

/// A field of a task configuration the engine may change.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum MutableField {
    /// Prompt text
    Prompt,
    /// Model identifier
    Model,
    /// Sampling temperature
    Temperature,
    /// Maximum output tokens
    MaxOutputTokens,
}

impl MutableField {
    /// All mutable fields, in declaration order.
    pub const ALL: [Self; 4] = [
        Self::Prompt,
        Self::Model,
        Self::Temperature,
        Self::MaxOutputTokens,
    ];
}

impl std::fmt::Display for MutableField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Prompt => "prompt",
            Self::Model => "model",
            Self::Temperature => "temperature",
            Self::MaxOutputTokens => "max_output_tokens",
        };
        f.write_str(name)
    }
}

/// Non-empty, duplicate-free set of fields an optimization run may change.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct MutableFieldSet {
    fields: Vec<MutableField>,
}

impl MutableFieldSet {
    /// Build a field set, preserving the given order.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if `fields` is empty or repeats a field.
    pub fn new(fields: impl IntoIterator<Item = MutableField>) -> Result<Self> {
        let mut unique: Vec<MutableField> = Vec::with_capacity(MutableField::ALL.len());
        for field in fields {
            if unique.contains(&field) {
                return Err(Error::InvalidInput(format!(
                    "changeable field '{field}' listed more than once"
                )));
            }
            unique.push(field);
        }
        if unique.is_empty() {
            return Err(Error::InvalidInput(
                "at least one changeable field is required".to_string(),
            ));
        }
        Ok(Self { fields: unique })
    }

    /// Whether `field` may be changed.
    #[must_use]
    pub fn contains(&self, field: MutableField) -> bool {
        self.fields.contains(&field)
    }

    /// Iterate the fields in the order given at construction.
    pub fn iter(&self) -> impl Iterator<Item = MutableField> + '_ {
        self.fields.iter().copied()
    }

    /// Number of fields in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the set is empty; never true for a constructed set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<'de> Deserialize<'de> for MutableFieldSet {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let fields = Vec::<MutableField>::deserialize(deserializer)?;
        Self::new(fields).map_err(serde::de::Error::custom)
    }
}

/// Values a candidate overrides on top of the task's baseline configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FieldOverrides {
    /// Replacement prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Replacement model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Replacement temperature
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Replacement output token limit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
}

impl FieldOverrides {
    /// Override the prompt.
    #[must_use]
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    /// Override the model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Override the temperature.
    #[must_use]
    pub const fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Override the output token limit.
    #[must_use]
    pub const fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = Some(max_output_tokens);
        self
    }

    /// Fields this override set touches.
    #[must_use]
    pub fn fields(&self) -> Vec<MutableField> {
        let mut fields = Vec::new();
        if self.prompt.is_some() {
            fields.push(MutableField::Prompt);
        }
        if self.model.is_some() {
            fields.push(MutableField::Model);
        }
        if self.temperature.is_some() {
            fields.push(MutableField::Temperature);
        }
        if self.max_output_tokens.is_some() {
            fields.push(MutableField::MaxOutputTokens);
        }
        fields
    }

    /// True when nothing is overridden.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields().is_empty()
    }

    /// Overridden fields that are not in `allowed`.
    #[must_use]
    pub fn fields_outside(&self, allowed: &MutableFieldSet) -> Vec<MutableField> {
        self.fields()
            .into_iter()
            .filter(|f| !allowed.contains(*f))
            .collect()
    }

    /// Whether every overridden field is in `allowed`.
    #[must_use]
    pub fn is_confined_to(&self, allowed: &MutableFieldSet) -> bool {
        self.fields_outside(allowed).is_empty()
    }

    /// Check that overridden values are usable.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` for a non-finite or negative temperature,
    /// a zero token limit, or a blank prompt/model.
    pub fn validate(&self) -> Result<()> {
        if let Some(t) = self.temperature {
            if !t.is_finite() || t < 0.0 {
                return Err(Error::InvalidInput(format!("invalid temperature override {t}")));
            }
        }
        if self.max_output_tokens == Some(0) {
            return Err(Error::InvalidInput(
                "max_output_tokens override must be positive".to_string(),
            ));
        }
        if self.prompt.as_deref().is_some_and(|p| p.trim().is_empty()) {
            return Err(Error::InvalidInput("prompt override is blank".to_string()));
        }
        if self.model.as_deref().is_some_and(|m| m.trim().is_empty()) {
            return Err(Error::InvalidInput("model override is blank".to_string()));
        }
        Ok(())
    }

    /// Resolve these overrides against a base configuration.
    #[must_use]
    pub fn apply(&self, base: &ModelConfig) -> ModelConfig {
        ModelConfig {
            prompt: self.prompt.clone().unwrap_or_else(|| base.prompt.clone()),
            model: self.model.clone().unwrap_or_else(|| base.model.clone()),
            temperature: self.temperature.unwrap_or(base.temperature),
            max_output_tokens: self.max_output_tokens.unwrap_or(base.max_output_tokens),
        }
    }
}
