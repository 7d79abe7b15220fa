//! Occurrence sampler: one guaranteed example of the target class plus
//! random context.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::models::{DatasetEntry, Example, FewshotError, Result};
use crate::sampler::Sampler;

/// Takes the first train entry carrying the target class, then fills up
/// to `max_length` with draws from the remaining pool, with
/// replacement. The target class must occur in the train split.
pub struct OccurrenceSampler {
    max_length: usize,
    rng: StdRng,
}

impl OccurrenceSampler {
    pub fn new(max_length: usize, seed: u64) -> Self {
        Self {
            max_length,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Sampler for OccurrenceSampler {
    fn name(&self) -> &'static str {
        "occurrence"
    }

    fn sample(&mut self, train: &[DatasetEntry], target_class: &str) -> Result<Vec<Example>> {
        let anchor = train
            .iter()
            .position(|e| e.classes().contains(&target_class))
            .ok_or_else(|| {
                FewshotError::Sampling(format!(
                    "class \"{target_class}\" does not occur in the train split"
                ))
            })?;

        let mut items = vec![train[anchor].to_example()];
        let rest: Vec<&DatasetEntry> = train
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != anchor)
            .map(|(_, e)| e)
            .collect();

        if !rest.is_empty() {
            for _ in 0..self.max_length.saturating_sub(1) {
                let pick = rest[self.rng.gen_range(0..rest.len())];
                items.push(pick.to_example());
            }
        }

        Ok(items)
    }
}
