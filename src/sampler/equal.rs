//! Equal sampler: a fixed prompt shared by every test item.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::models::{DatasetEntry, Example, FewshotError, Result};
use crate::sampler::Sampler;

/// Leads with two entries whose class sets differ, fills up to
/// `max_length` with random draws, and memoizes the selection: every
/// item in the run sees the same examples.
pub struct EqualSampler {
    max_length: usize,
    seed: u64,
    chosen: Option<Vec<Example>>,
}

impl EqualSampler {
    pub fn new(max_length: usize, seed: u64) -> Self {
        Self {
            max_length,
            seed,
            chosen: None,
        }
    }
}

impl Sampler for EqualSampler {
    fn name(&self) -> &'static str {
        "equal"
    }

    fn sample(&mut self, train: &[DatasetEntry], _target_class: &str) -> Result<Vec<Example>> {
        if let Some(chosen) = &self.chosen {
            return Ok(chosen.clone());
        }
        if train.is_empty() {
            return Err(FewshotError::Sampling("train split is empty".to_string()));
        }

        let mut taken = vec![0];
        if let Some(contrast) = train
            .iter()
            .position(|e| e.classes() != train[0].classes())
        {
            taken.push(contrast);
        }
        let mut items: Vec<Example> = taken.iter().map(|&i| train[i].to_example()).collect();

        let rest: Vec<&DatasetEntry> = train
            .iter()
            .enumerate()
            .filter(|(i, _)| !taken.contains(i))
            .map(|(_, e)| e)
            .collect();

        if !rest.is_empty() {
            let mut rng = StdRng::seed_from_u64(self.seed);
            for _ in 0..self.max_length.saturating_sub(items.len()) {
                items.push(rest[rng.gen_range(0..rest.len())].to_example());
            }
        }

        self.chosen = Some(items.clone());
        Ok(items)
    }
}
