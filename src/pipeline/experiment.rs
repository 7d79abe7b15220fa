//! Experiment driver: the two-pass loop over the test split.
//!
//! Pass one is a dry run across every item to accumulate the estimated
//! cost; the operator gate sits between the passes and is the only
//! cancellation point. Pass two issues the real calls, skipping items
//! whose retries exhausted (connectivity is the one locally recovered
//! failure) and aborting on anything else.

use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::time::Instant;
use tracing::{debug, error, info};

use crate::client::{BackendAdapter, RemoteEngine, Transport};
use crate::models::{CompletionRequest, DatasetEntry, Result};
use crate::sampler::Sampler;

/// One successfully classified test item.
#[derive(Debug, Clone, Serialize)]
pub struct ItemResult {
    pub input: String,
    pub target_classes: Vec<String>,
    pub predicted_classes: Vec<String>,
}

/// Aggregate numbers for a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct ExperimentStats {
    pub total_items: usize,
    pub completed: usize,
    pub skipped: usize,
    /// Cumulative dry-run estimate over the whole test split
    pub estimated_cost: f64,
    /// Cost accumulated from successful calls only
    pub actual_cost: f64,
    pub runtime_secs: f64,
    pub finished_at: DateTime<Utc>,
}

/// How a run ended.
#[derive(Debug)]
pub enum RunOutcome {
    Completed {
        results: Vec<ItemResult>,
        stats: ExperimentStats,
    },
    /// The operator declined at the gate. Deliberate, not an error.
    Cancelled { estimated_cost: f64 },
}

/// The operator gate between the estimate and the real pass.
pub trait Gate {
    fn confirm(&self, estimated_cost: f64) -> bool;
}

/// Drives one experiment over a train/test split.
pub struct ExperimentPipeline<T: Transport> {
    adapter: Box<dyn BackendAdapter>,
    engine: RemoteEngine<T>,
    sampler: Box<dyn Sampler>,
    engine_name: String,
}

impl<T: Transport> ExperimentPipeline<T> {
    pub fn new(
        adapter: Box<dyn BackendAdapter>,
        engine: RemoteEngine<T>,
        sampler: Box<dyn Sampler>,
        engine_name: String,
    ) -> Self {
        Self {
            adapter,
            engine,
            sampler,
            engine_name,
        }
    }

    /// Build the request for one test item: examples for its leading
    /// class, in sampler order.
    fn build_request(
        &mut self,
        train: &[DatasetEntry],
        item: &DatasetEntry,
    ) -> Result<CompletionRequest> {
        let target_class = item
            .classes()
            .first()
            .map(|c| c.to_string())
            .unwrap_or_default();
        let samples = self.sampler.sample(train, &target_class)?;

        Ok(CompletionRequest::new(
            samples,
            item.input_text.clone(),
            self.engine_name.clone(),
        ))
    }

    /// Dry pass: cumulative cost estimate over the test split.
    ///
    /// Performs no network I/O, so connectivity errors cannot occur
    /// here.
    pub async fn estimate(
        &mut self,
        train: &[DatasetEntry],
        test: &[DatasetEntry],
    ) -> Result<f64> {
        let mut total = 0.0;
        for item in test {
            let request = self.build_request(train, item)?;
            let completion = self
                .engine
                .get_completion(self.adapter.as_ref(), &request, true)
                .await?;
            total += completion.cost;
        }
        Ok(total)
    }

    /// Full experiment: dry pass, operator gate, real pass.
    pub async fn run(
        &mut self,
        train: &[DatasetEntry],
        test: &[DatasetEntry],
        gate: &dyn Gate,
    ) -> Result<RunOutcome> {
        let start = Instant::now();

        let estimated_cost = self.estimate(train, test).await?;
        info!(
            items = test.len(),
            estimated_cost = format!("{estimated_cost:.2}$"),
            "Dry pass complete"
        );

        if !gate.confirm(estimated_cost) {
            return Ok(RunOutcome::Cancelled { estimated_cost });
        }

        let pb = ProgressBar::new(test.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} ({percent}%) {msg}")
                .unwrap()
                .progress_chars("##-"),
        );

        let mut results = Vec::new();
        let mut actual_cost = 0.0;
        let mut skipped = 0usize;

        for item in test {
            let request = self.build_request(train, item)?;
            debug!(input = %item.input_text, "Trying to get completion");

            let completion = match self
                .engine
                .get_completion(self.adapter.as_ref(), &request, false)
                .await
            {
                Ok(completion) => completion,
                Err(e) if e.is_connectivity() => {
                    error!(error = %e, "Connection error during completion generation");
                    error!(input = %item.input_text, "Item skipped");
                    skipped += 1;
                    pb.inc(1);
                    continue;
                }
                Err(e) => {
                    // Anything but connectivity means a broken contract;
                    // surface the offending item and stop the run.
                    error!(error = %e, input = %item.input_text, "Aborting run");
                    return Err(e);
                }
            };

            let predicted_classes = completion.classes()?;
            debug!(classes = ?predicted_classes, "Successfully retrieved completion");

            actual_cost += completion.cost;
            results.push(ItemResult {
                input: item.input_text.clone(),
                target_classes: item.classes().iter().map(|c| c.to_string()).collect(),
                predicted_classes,
            });

            pb.set_message(format!("cost: {actual_cost:.2}$"));
            pb.inc(1);
        }

        pb.finish_with_message(format!(
            "Done! {} classified, {} skipped",
            results.len(),
            skipped
        ));

        let stats = ExperimentStats {
            total_items: test.len(),
            completed: results.len(),
            skipped,
            estimated_cost,
            actual_cost,
            runtime_secs: start.elapsed().as_secs_f64(),
            finished_at: Utc::now(),
        };

        info!(
            completed = stats.completed,
            skipped = stats.skipped,
            cost = format!("{:.2}$", stats.actual_cost),
            "Experiment complete"
        );

        Ok(RunOutcome::Completed { results, stats })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{OpenAiAdapter, RetryPolicy};
    use crate::models::{AdapterConfig, DatasetEntry, TransportError};
    use crate::sampler::StrictSampler;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Scripted transport: pops one outcome per call.
    struct ScriptedTransport {
        script: Mutex<VecDeque<std::result::Result<String, ()>>>,
        calls: AtomicU32,
    }

    impl ScriptedTransport {
        fn new(script: Vec<std::result::Result<&str, ()>>) -> Self {
            Self {
                script: Mutex::new(
                    script
                        .into_iter()
                        .map(|r| r.map(str::to_string))
                        .collect(),
                ),
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn post(
            &self,
            _url: &str,
            _body: &str,
        ) -> std::result::Result<String, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.script.lock().unwrap().pop_front() {
                Some(Ok(body)) => Ok(body),
                _ => Err(TransportError::Timeout(Duration::from_secs(1))),
            }
        }
    }

    struct AutoGate(bool);

    impl Gate for AutoGate {
        fn confirm(&self, _estimated_cost: f64) -> bool {
            self.0
        }
    }

    const REPLY: &str = r#"{
        "choices": [{"message": {"content": "high, flat"}}],
        "usage": {"prompt_tokens": 50, "completion_tokens": 5}
    }"#;

    fn entry(input: &str, output: &str) -> DatasetEntry {
        DatasetEntry {
            input_text: input.to_string(),
            output_text: output.to_string(),
            split: None,
        }
    }

    fn pipeline(
        script: Vec<std::result::Result<&str, ()>>,
        attempts: u32,
    ) -> ExperimentPipeline<ScriptedTransport> {
        let config = AdapterConfig {
            api_url: "http://localhost:8000/".to_string(),
            engine: "gpt-4".to_string(),
            template: "chemistry".to_string(),
            name: Some("chemistry_doctor".to_string()),
            catalog: None,
            vision: false,
            retry_number: attempts,
            timeout_secs: 180,
        };
        ExperimentPipeline::new(
            Box::new(OpenAiAdapter::new(&config).unwrap()),
            RemoteEngine::new(
                ScriptedTransport::new(script),
                RetryPolicy::without_backoff(attempts),
            ),
            Box::new(StrictSampler::new(2, 42)),
            "gpt-4".to_string(),
        )
    }

    fn train() -> Vec<DatasetEntry> {
        vec![
            entry("a: 1", "high"),
            entry("a: 2", "low"),
            entry("a: 3", "high"),
        ]
    }

    fn test_items() -> Vec<DatasetEntry> {
        vec![entry("a: 4", "high"), entry("a: 5", "low")]
    }

    #[tokio::test]
    async fn test_declined_gate_cancels_without_network() {
        let mut pipeline = pipeline(vec![], 5);

        match pipeline.run(&train(), &test_items(), &AutoGate(false)).await.unwrap() {
            RunOutcome::Cancelled { estimated_cost } => assert!(estimated_cost > 0.0),
            other => panic!("expected Cancelled, got {other:?}"),
        }
        assert_eq!(pipeline.engine.transport().calls(), 0);
    }

    #[tokio::test]
    async fn test_full_run_accumulates_actual_cost() {
        let mut pipeline = pipeline(vec![Ok(REPLY), Ok(REPLY)], 5);

        match pipeline.run(&train(), &test_items(), &AutoGate(true)).await.unwrap() {
            RunOutcome::Completed { results, stats } => {
                assert_eq!(results.len(), 2);
                assert_eq!(results[0].input, "a: 4");
                assert_eq!(results[0].target_classes, vec!["high"]);
                assert_eq!(results[0].predicted_classes, vec!["high", "flat"]);

                let per_call = 50.0 / 1_000_000.0 * 30.0 + 5.0 / 1_000_000.0 * 60.0;
                assert!((stats.actual_cost - 2.0 * per_call).abs() < 1e-12);
                assert!(stats.estimated_cost > 0.0);
                assert_eq!(stats.total_items, 2);
                assert_eq!(stats.skipped, 0);
            }
            other => panic!("expected Completed, got {other:?}"),
        }
        assert_eq!(pipeline.engine.transport().calls(), 2);
    }

    #[tokio::test]
    async fn test_connectivity_failure_skips_item_with_zero_cost() {
        // First item exhausts two attempts, second succeeds.
        let mut pipeline = pipeline(vec![Err(()), Err(()), Ok(REPLY)], 2);

        match pipeline.run(&train(), &test_items(), &AutoGate(true)).await.unwrap() {
            RunOutcome::Completed { results, stats } => {
                assert_eq!(results.len(), 1);
                assert_eq!(results[0].input, "a: 5");
                assert_eq!(stats.skipped, 1);

                let per_call = 50.0 / 1_000_000.0 * 30.0 + 5.0 / 1_000_000.0 * 60.0;
                assert!((stats.actual_cost - per_call).abs() < 1e-12);
            }
            other => panic!("expected Completed, got {other:?}"),
        }
        assert_eq!(pipeline.engine.transport().calls(), 3);
    }

    #[tokio::test]
    async fn test_invalid_response_aborts_the_run() {
        let empty = r#"{
            "choices": [{"message": {"content": ""}}],
            "usage": {"prompt_tokens": 1, "completion_tokens": 1}
        }"#;
        let mut pipeline = pipeline(vec![Ok(empty)], 5);

        assert!(pipeline
            .run(&train(), &test_items(), &AutoGate(true))
            .await
            .is_err());
        // The run stopped at the first item.
        assert_eq!(pipeline.engine.transport().calls(), 1);
    }
}
