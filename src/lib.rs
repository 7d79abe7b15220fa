//! fewshot - Few-shot LLM classification experiments with multi-backend
//! cost accounting.
//!
//! ## Architecture
//!
//! - **models**: transcript value types, configuration, dataset, errors
//! - **client**: one [`client::BackendAdapter`] per provider family, the
//!   pricing tables, and the [`client::RemoteEngine`] retry/dry-run
//!   wrapper they all share
//! - **sampler**: few-shot example selection strategies
//! - **pipeline**: the two-pass experiment driver (estimate → operator
//!   gate → real pass)
//! - **metrics**: accuracy/precision/recall/F1 over the result list
//!
//! Every experiment runs its test split twice: a dry pass that prices
//! the prompts without touching the network, then, after the operator
//! confirms the estimate, the real pass with per-item retries.

pub mod client;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod sampler;

// Re-exports for convenience
pub use client::{
    AdapterRegistry, BackendAdapter, HttpTransport, ImageConverter, RemoteEngine, RetryPolicy,
    Transport,
};
pub use models::{
    CompletionRequest, CompletionResponse, Config, ConfigError, Dataset, DatasetEntry, Example,
    FewshotError, Result,
};
pub use pipeline::{ExperimentPipeline, ExperimentStats, Gate, ItemResult, RunOutcome};
pub use sampler::{build_sampler, Sampler};
