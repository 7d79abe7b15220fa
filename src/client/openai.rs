//! OpenAI-style backend adapter.
//!
//! Chat-completion wire format: a system turn carrying the subject
//! template, then user/assistant turn pairs for the few-shot examples.
//! User turns carry the configured identity name.

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::client::adapter::{prompt_estimate, BackendAdapter, EnginePricing, PricingTable};
use crate::client::templates::zero_shot_template;
use crate::models::{
    AdapterConfig, CompletionRequest, CompletionResponse, ConfigError, FewshotError, Result,
    TokenUsage,
};

/// USD per million tokens.
static PRICING: PricingTable = PricingTable::new(
    "openai",
    &[
        (
            "gpt-4-turbo-preview",
            EnginePricing {
                prompt_per_million: 10.0,
                completion_per_million: 30.0,
            },
        ),
        (
            "gpt-4",
            EnginePricing {
                prompt_per_million: 30.0,
                completion_per_million: 60.0,
            },
        ),
        (
            "gpt-3.5-turbo-1106",
            EnginePricing {
                prompt_per_million: 0.5,
                completion_per_million: 1.5,
            },
        ),
        (
            "gpt-3.5-turbo",
            EnginePricing {
                prompt_per_million: 0.5,
                completion_per_million: 1.5,
            },
        ),
    ],
);

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    usage: ChatUsage,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

/// Adapter for OpenAI-style completion backends.
pub struct OpenAiAdapter {
    endpoint: String,
    name: String,
    template: &'static str,
}

impl OpenAiAdapter {
    pub fn new(config: &AdapterConfig) -> Result<Self> {
        let name = config
            .name
            .clone()
            .ok_or_else(|| ConfigError::MissingFields(vec!["name".to_string()]))?;
        let template = zero_shot_template(&config.template)?;
        PRICING.lookup(&config.engine)?;

        Ok(Self {
            endpoint: config.api_url.clone(),
            name,
            template,
        })
    }

    /// Conversation turns, few-shot examples in request order.
    fn turns(&self, request: &CompletionRequest) -> Vec<Value> {
        let mut content = vec![json!({"role": "system", "content": self.template})];
        for entry in &request.samples {
            content.push(json!({
                "role": "user",
                "name": self.name,
                "content": entry.input_text,
            }));
            content.push(json!({"role": "assistant", "content": entry.output_text}));
        }
        content
    }

    fn question_turn(&self, request: &CompletionRequest) -> Value {
        json!({"role": "user", "name": self.name, "content": request.question})
    }
}

impl BackendAdapter for OpenAiAdapter {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn pricing(&self) -> &PricingTable {
        &PRICING
    }

    fn build_payload(&self, request: &CompletionRequest) -> Result<Value> {
        Ok(json!({
            "question": request.question,
            "name": self.name,
            "request": self.turns(request),
            "engine": request.engine,
        }))
    }

    fn parse_response(
        &self,
        request: &CompletionRequest,
        raw: &Value,
    ) -> Result<CompletionResponse> {
        let parsed: ChatCompletionResponse = serde_json::from_value(raw.clone())
            .map_err(|e| FewshotError::InvalidResponse(format!("malformed completion: {e}")))?;

        let content = parsed
            .choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| {
                FewshotError::InvalidResponse("Model returned an invalid response".to_string())
            })?;

        let usage = TokenUsage {
            prompt_tokens: parsed.usage.prompt_tokens,
            completion_tokens: parsed.usage.completion_tokens,
        };
        let cost = PRICING.actual_cost(&request.engine, usage)?;

        if let Ok(estimate) = self.estimate_cost(request) {
            debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                cost = format!("{cost:.4}$"),
                estimate = format!("{estimate:.4}$"),
                "OpenAI reported usage"
            );
        }

        Ok(CompletionResponse {
            text: Some(content.to_string()),
            cost,
        })
    }

    fn estimate_cost(&self, request: &CompletionRequest) -> Result<f64> {
        let mut turns = self.turns(request);
        turns.push(self.question_turn(request));
        prompt_estimate(&PRICING, &request.engine, &turns)
    }
}
