//! Random perturbation strategy
//!
//! Jitters numeric fields around the current best value and draws textual
//! fields (prompt, model) from configured alternatives. Proposals keep the
//! current best's other overrides. Seeded, so a run is reproducible for a
//! given seed.

use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use super::{CandidateGenerator, GenerationContext, GenerationError};
use crate::task::{FieldOverrides, ModelConfig, MutableField};

/// Upper bound for perturbed temperatures
pub const MAX_TEMPERATURE: f64 = 2.0;

/// Random perturbation candidate generator.
///
/// # Example
///
/// ```rust
/// use llmtrace_optimizer::generator::PerturbationGenerator;
///
/// let generator = PerturbationGenerator::builder()
///     .seed(7)
///     .temperature_step(0.2)
///     .models(["gpt-4o-mini", "gpt-4o"])
///     .build();
/// # let _ = generator;
/// ```
#[derive(Debug)]
pub struct PerturbationGenerator {
    rng: Mutex<StdRng>,
    temperature_step: f64,
    prompts: Vec<String>,
    models: Vec<String>,
}

impl PerturbationGenerator {
    /// Create a builder with defaults (seed 0, temperature step 0.3).
    #[must_use]
    pub fn builder() -> PerturbationGeneratorBuilder {
        PerturbationGeneratorBuilder::default()
    }

    fn perturb(
        &self,
        rng: &mut StdRng,
        base: &ModelConfig,
        field: MutableField,
        out: &mut FieldOverrides,
    ) {
        match field {
            MutableField::Temperature => {
                let delta = rng.gen_range(-self.temperature_step..=self.temperature_step);
                let t = (base.temperature + delta).clamp(0.0, MAX_TEMPERATURE);
                out.temperature = Some((t * 100.0).round() / 100.0);
            }
            MutableField::MaxOutputTokens => {
                let factor: f64 = rng.gen_range(0.5..=1.5);
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let scaled = (f64::from(base.max_output_tokens) * factor).round() as u32;
                out.max_output_tokens = Some(scaled.max(1));
            }
            MutableField::Model => {
                if let Some(model) = pick_other(rng, &self.models, &base.model) {
                    out.model = Some(model);
                }
            }
            MutableField::Prompt => {
                if let Some(prompt) = pick_other(rng, &self.prompts, &base.prompt) {
                    out.prompt = Some(prompt);
                }
            }
        }
    }
}

fn pick_other(rng: &mut StdRng, choices: &[String], current: &str) -> Option<String> {
    let others: Vec<&String> = choices.iter().filter(|c| c.as_str() != current).collect();
    others.choose(rng).map(|c| (*c).clone())
}

impl CandidateGenerator for PerturbationGenerator {
    async fn propose(
        &self,
        ctx: GenerationContext<'_>,
    ) -> Result<Vec<FieldOverrides>, GenerationError> {
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| GenerationError::Failed("random state poisoned".to_string()))?;

        let base = ctx.current_best.config();
        let mut proposals = Vec::with_capacity(ctx.variants);
        for _ in 0..ctx.variants {
            let mut overrides = ctx.current_best.overrides().clone();
            for field in ctx.allowed_fields.iter() {
                self.perturb(&mut rng, base, field, &mut overrides);
            }
            if !overrides.is_empty() {
                proposals.push(overrides);
            }
        }
        Ok(proposals)
    }
}

/// Builder for `PerturbationGenerator`.
#[derive(Debug)]
pub struct PerturbationGeneratorBuilder {
    seed: u64,
    temperature_step: f64,
    prompts: Vec<String>,
    models: Vec<String>,
}

impl Default for PerturbationGeneratorBuilder {
    fn default() -> Self {
        Self {
            seed: 0,
            temperature_step: 0.3,
            prompts: Vec::new(),
            models: Vec::new(),
        }
    }
}

impl PerturbationGeneratorBuilder {
    /// Set the random seed.
    #[must_use]
    pub const fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the maximum absolute temperature change per proposal.
    ///
    /// The sign is ignored and the step is capped at [`MAX_TEMPERATURE`]; a
    /// non-finite step leaves the temperature unchanged.
    #[must_use]
    pub const fn temperature_step(mut self, step: f64) -> Self {
        self.temperature_step = step;
        self
    }

    /// Set alternative prompts to draw from.
    #[must_use]
    pub fn prompts<I, S>(mut self, prompts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prompts = prompts.into_iter().map(Into::into).collect();
        self
    }

    /// Set alternative models to draw from.
    #[must_use]
    pub fn models<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.models = models.into_iter().map(Into::into).collect();
        self
    }

    /// Build the generator.
    #[must_use]
    pub fn build(self) -> PerturbationGenerator {
        PerturbationGenerator {
            rng: Mutex::new(StdRng::seed_from_u64(self.seed)),
            temperature_step: if self.temperature_step.is_finite() {
                self.temperature_step.abs().min(MAX_TEMPERATURE)
            } else {
                0.0
            },
            prompts: self.prompts,
            models: self.models,
        }
    }
}
