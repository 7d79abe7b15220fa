//! Data models for fewshot.

mod config;
mod dataset;
mod error;
mod transcript;

pub use config::{expand_env_vars, AdapterConfig, Config, ConfigError, OutputConfig};
pub use dataset::{Dataset, DatasetEntry, Split};
pub use error::{FewshotError, Result, TransportError};
pub use transcript::{CompletionRequest, CompletionResponse, Example, TokenUsage, CLASS_DELIMITER};
