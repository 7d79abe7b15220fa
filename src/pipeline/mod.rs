//! Experiment orchestration.

mod experiment;

pub use experiment::{ExperimentPipeline, ExperimentStats, Gate, ItemResult, RunOutcome};
