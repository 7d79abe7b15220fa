//! Backend adapter contract and pricing tables.
//!
//! Every provider family implements [`BackendAdapter`]: translate the
//! transcript model to its wire payload and back, and price tokens from
//! its compiled-in table. The [`AdapterRegistry`] resolves a provider
//! name to an adapter once at configuration time; nothing downstream
//! branches on provider strings.

use std::path::PathBuf;
use std::sync::Arc;

use crate::client::tokens;
use crate::client::{AnthropicAdapter, MistralAdapter, OpenAiAdapter, SberAdapter, YandexAdapter};
use crate::models::{
    AdapterConfig, CompletionRequest, CompletionResponse, ConfigError, FewshotError, Result,
    TokenUsage,
};

/// Per-token prices for one engine, in currency units per million tokens.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnginePricing {
    pub prompt_per_million: f64,
    pub completion_per_million: f64,
}

/// Immutable per-adapter pricing table, keyed by exact engine string.
///
/// An unrecognized engine is an error, never a fallback to a default
/// price.
#[derive(Debug)]
pub struct PricingTable {
    adapter: &'static str,
    engines: &'static [(&'static str, EnginePricing)],
}

impl PricingTable {
    pub const fn new(
        adapter: &'static str,
        engines: &'static [(&'static str, EnginePricing)],
    ) -> Self {
        Self { adapter, engines }
    }

    /// Exact-match pricing lookup.
    pub fn lookup(&self, engine: &str) -> Result<EnginePricing> {
        self.engines
            .iter()
            .find(|(name, _)| *name == engine)
            .map(|(_, pricing)| *pricing)
            .ok_or_else(|| FewshotError::UnsupportedEngine {
                engine: engine.to_string(),
                adapter: self.adapter,
            })
    }

    /// Price `tokens` prompt tokens for `engine`.
    pub fn prompt_cost(&self, engine: &str, tokens: u64) -> Result<f64> {
        Ok((tokens as f64 / 1_000_000.0) * self.lookup(engine)?.prompt_per_million)
    }

    /// Price `tokens` completion tokens for `engine`.
    pub fn completion_cost(&self, engine: &str, tokens: u64) -> Result<f64> {
        Ok((tokens as f64 / 1_000_000.0) * self.lookup(engine)?.completion_per_million)
    }

    /// Actual cost of a completed call from provider-reported usage.
    pub fn actual_cost(&self, engine: &str, usage: TokenUsage) -> Result<f64> {
        Ok(self.prompt_cost(engine, usage.prompt_tokens as u64)?
            + self.completion_cost(engine, usage.completion_tokens as u64)?)
    }
}

/// Converts a sample input into a rendered image on disk.
///
/// Injected into vision-capable adapters at configuration time; the core
/// never performs the conversion itself.
pub trait ImageConverter: Send + Sync {
    fn convert(&self, input: &str) -> std::io::Result<PathBuf>;
}

/// The capability set every backend must satisfy.
pub trait BackendAdapter: Send + Sync {
    /// Short provider-family name, used in errors and logs.
    fn name(&self) -> &'static str;

    /// Normalized endpoint base URL the engine posts to.
    fn endpoint(&self) -> &str;

    /// This provider's pricing table.
    fn pricing(&self) -> &PricingTable;

    /// Build the provider wire payload for a request.
    ///
    /// Deterministic and pure in the request and the adapter's
    /// configuration.
    fn build_payload(&self, request: &CompletionRequest) -> Result<serde_json::Value>;

    /// Parse the provider response into the normalized form, recomputing
    /// the *actual* cost from the reported token usage (never the
    /// pre-flight estimate).
    fn parse_response(
        &self,
        request: &CompletionRequest,
        raw: &serde_json::Value,
    ) -> Result<CompletionResponse>;

    /// Pre-flight cost estimate for a request, rounded up to the cent.
    ///
    /// Prices the serialized conversation as prompt tokens only:
    /// completion tokens are unknown before the call, so the estimate is
    /// a lower bound on the true cost.
    fn estimate_cost(&self, request: &CompletionRequest) -> Result<f64>;
}

/// Shared estimate path: serialize the conversation turns (with the
/// trailing question turn), count byte-pair tokens, price as prompt
/// tokens, round up to the cent.
pub(crate) fn prompt_estimate(
    pricing: &PricingTable,
    engine: &str,
    turns_with_question: &[serde_json::Value],
) -> Result<f64> {
    let serialized = serde_json::to_string(turns_with_question)
        .map_err(|e| FewshotError::Internal(format!("Failed to serialize transcript: {e}")))?;
    let count = tokens::count_tokens(&serialized) as u64;
    Ok(tokens::ceil_to_cent(pricing.prompt_cost(engine, count)?))
}

/// Resolves a provider family name to a configured adapter.
///
/// Resolution happens once per run, right after the configuration is
/// validated; per-call code only ever sees the trait object.
pub struct AdapterRegistry;

impl AdapterRegistry {
    /// Provider families this build knows about.
    pub fn provider_names() -> &'static [&'static str] {
        &["openai", "anthropic", "mistral", "yandex", "sber"]
    }

    /// Construct the adapter for `provider`.
    ///
    /// `converter` is required only when the configuration enables
    /// vision mode on an adapter that supports it.
    pub fn resolve(
        provider: &str,
        config: &AdapterConfig,
        converter: Option<Arc<dyn ImageConverter>>,
    ) -> Result<Box<dyn BackendAdapter>> {
        match provider {
            "openai" => Ok(Box::new(OpenAiAdapter::new(config)?)),
            "anthropic" => Ok(Box::new(AnthropicAdapter::new(config, converter)?)),
            "mistral" => Ok(Box::new(MistralAdapter::new(config)?)),
            "yandex" => Ok(Box::new(YandexAdapter::new(config)?)),
            "sber" => Ok(Box::new(SberAdapter::new(config)?)),
            other => Err(ConfigError::UnknownProvider(other.to_string()).into()),
        }
    }
}
