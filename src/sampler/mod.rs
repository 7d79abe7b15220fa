//! Few-shot example selection.
//!
//! A sampler draws the examples shown to the model before the real
//! question. All draw from the train split only and are seeded from the
//! run configuration, so a given config reproduces its prompts exactly.

mod equal;
mod occurrence;
mod strict;

pub use equal::EqualSampler;
pub use occurrence::OccurrenceSampler;
pub use strict::StrictSampler;

use crate::models::{Config, ConfigError, DatasetEntry, Example, Result};

/// Selects few-shot examples for one test item.
pub trait Sampler: Send {
    fn name(&self) -> &'static str;

    /// Pick examples from the train pool for a target class.
    fn sample(&mut self, train: &[DatasetEntry], target_class: &str) -> Result<Vec<Example>>;
}

/// Build the sampler named in the configuration.
pub fn build_sampler(config: &Config) -> Result<Box<dyn Sampler>> {
    match config.sampler.as_str() {
        "strict" => Ok(Box::new(StrictSampler::new(config.n_for_train, config.seed))),
        "occurrence" => Ok(Box::new(OccurrenceSampler::new(
            config.n_for_train,
            config.seed,
        ))),
        "equal" => Ok(Box::new(EqualSampler::new(config.n_for_train, config.seed))),
        other => Err(ConfigError::UnknownSampler(other.to_string()).into()),
    }
}

#[cfg(test)]
pub(crate) fn entry(input: &str, output: &str) -> DatasetEntry {
    DatasetEntry {
        input_text: input.to_string(),
        output_text: output.to_string(),
        split: None,
    }
}
