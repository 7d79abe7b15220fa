//! Sber-style backend adapter.
//!
//! Chat body with the engine named inline and a fixed near-zero
//! temperature. The provider's billing is not token-metered on the plans
//! this targets, so the pricing table is explicitly zero for every
//! engine and both the estimate and the actual cost come out as 0.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::client::adapter::{prompt_estimate, BackendAdapter, EnginePricing, PricingTable};
use crate::client::templates::zero_shot_template;
use crate::models::{
    AdapterConfig, CompletionRequest, CompletionResponse, FewshotError, Result, TokenUsage,
};

const FREE: EnginePricing = EnginePricing {
    prompt_per_million: 0.0,
    completion_per_million: 0.0,
};

static PRICING: PricingTable = PricingTable::new(
    "sber",
    &[
        ("GigaChat-preview", FREE),
        ("GigaChat-Plus-preview", FREE),
        ("GigaChat-Pro", FREE),
    ],
);

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
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

/// Adapter for Sber-style completion backends.
pub struct SberAdapter {
    endpoint: String,
    template: &'static str,
}

impl SberAdapter {
    pub fn new(config: &AdapterConfig) -> Result<Self> {
        let template = zero_shot_template(&config.template)?;
        PRICING.lookup(&config.engine)?;

        Ok(Self {
            endpoint: config.api_url.clone(),
            template,
        })
    }

    fn messages(&self, request: &CompletionRequest) -> Vec<Value> {
        let mut messages = vec![json!({"role": "system", "content": self.template})];
        for entry in &request.samples {
            messages.push(json!({"role": "user", "content": entry.input_text}));
            messages.push(json!({"role": "assistant", "content": entry.output_text}));
        }
        messages.push(json!({"role": "user", "content": request.question}));
        messages
    }
}

impl BackendAdapter for SberAdapter {
    fn name(&self) -> &'static str {
        "sber"
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn pricing(&self) -> &PricingTable {
        &PRICING
    }

    fn build_payload(&self, request: &CompletionRequest) -> Result<Value> {
        Ok(json!({
            "model": request.engine,
            "messages": self.messages(request),
            "temperature": 0.01,
            "stream": false,
        }))
    }

    fn parse_response(
        &self,
        request: &CompletionRequest,
        raw: &Value,
    ) -> Result<CompletionResponse> {
        let parsed: ChatResponse = serde_json::from_value(raw.clone())
            .map_err(|e| FewshotError::InvalidResponse(format!("malformed completion: {e}")))?;

        let content = parsed
            .choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| {
                FewshotError::InvalidResponse("Model returned an invalid response".to_string())
            })?;

        let usage = parsed.usage.map_or(
            TokenUsage {
                prompt_tokens: 0,
                completion_tokens: 0,
            },
            |u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
            },
        );

        Ok(CompletionResponse {
            text: Some(content.to_string()),
            cost: PRICING.actual_cost(&request.engine, usage)?,
        })
    }

    fn estimate_cost(&self, request: &CompletionRequest) -> Result<f64> {
        prompt_estimate(&PRICING, &request.engine, &self.messages(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Example;

    fn adapter() -> SberAdapter {
        let config = AdapterConfig {
            api_url: "http://localhost:8000/".to_string(),
            engine: "GigaChat-Pro".to_string(),
            template: "chemistry".to_string(),
            name: None,
            catalog: None,
            vision: false,
            retry_number: 5,
            timeout_secs: 180,
        };
        SberAdapter::new(&config).unwrap()
    }

    fn request() -> CompletionRequest {
        CompletionRequest::new(vec![Example::new("a: 1", "high")], "a: 2", "GigaChat-Pro")
    }

    #[test]
    fn test_payload_names_engine_inline() {
        let payload = adapter().build_payload(&request()).unwrap();
        assert_eq!(payload["model"], "GigaChat-Pro");
        assert_eq!(payload["temperature"], 0.01);
        assert_eq!(payload["stream"], false);

        let messages = payload["messages"].as_array().unwrap();
        assert_eq!(messages.last().unwrap()["content"], "a: 2");
    }

    #[test]
    fn test_cost_is_zero_with_or_without_usage() {
        let with_usage = serde_json::json!({
            "choices": [{"message": {"content": "high"}}],
            "usage": {"prompt_tokens": 100, "completion_tokens": 10},
        });
        let response = adapter().parse_response(&request(), &with_usage).unwrap();
        assert_eq!(response.cost, 0.0);

        let without_usage = serde_json::json!({
            "choices": [{"message": {"content": "high"}}],
        });
        let response = adapter().parse_response(&request(), &without_usage).unwrap();
        assert_eq!(response.text.as_deref(), Some("high"));
        assert_eq!(response.cost, 0.0);
    }

    #[test]
    fn test_estimate_is_zero() {
        assert_eq!(adapter().estimate_cost(&request()).unwrap(), 0.0);
    }
}
