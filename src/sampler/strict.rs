//! Strict sampler: only entries carrying the target class.

use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::models::{DatasetEntry, Example, Result};
use crate::sampler::Sampler;

/// Shuffles the train pool and keeps up to `max_length` entries whose
/// classes include the target. Reseeds per call, so the same target
/// class yields the same examples across both experiment passes.
pub struct StrictSampler {
    max_length: usize,
    seed: u64,
}

impl StrictSampler {
    pub fn new(max_length: usize, seed: u64) -> Self {
        Self { max_length, seed }
    }
}

impl Sampler for StrictSampler {
    fn name(&self) -> &'static str {
        "strict"
    }

    fn sample(&mut self, train: &[DatasetEntry], target_class: &str) -> Result<Vec<Example>> {
        let mut pool: Vec<&DatasetEntry> = train.iter().collect();
        let mut rng = rand::rngs::StdRng::seed_from_u64(self.seed);
        pool.shuffle(&mut rng);

        Ok(pool
            .into_iter()
            .filter(|e| e.classes().contains(&target_class))
            .take(self.max_length)
            .map(DatasetEntry::to_example)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::entry;

    #[test]
    fn test_only_matching_entries_up_to_limit() {
        let train = vec![
            entry("a: 1", "high"),
            entry("a: 2", "low"),
            entry("a: 3", "high, low"),
            entry("a: 4", "high"),
            entry("a: 5", "low"),
        ];

        let mut sampler = StrictSampler::new(2, 7);
        let samples = sampler.sample(&train, "high").unwrap();

        assert_eq!(samples.len(), 2);
        assert!(samples.iter().all(|s| s.output_text.split(", ").any(|c| c == "high")));
    }

    #[test]
    fn test_deterministic_across_calls() {
        let train = vec![
            entry("a: 1", "high"),
            entry("a: 2", "high"),
            entry("a: 3", "high"),
        ];

        let mut sampler = StrictSampler::new(2, 42);
        let first = sampler.sample(&train, "high").unwrap();
        let second = sampler.sample(&train, "high").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_absent_class_yields_empty() {
        let train = vec![entry("a: 1", "high")];
        let mut sampler = StrictSampler::new(3, 0);
        assert!(sampler.sample(&train, "sphere").unwrap().is_empty());
    }
}
