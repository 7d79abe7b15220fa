//! Mistral-style backend adapter.
//!
//! Same chat-completion reply shape as the OpenAI family, but the
//! subject template rides in a leading user turn (the backend rejects a
//! system role) and turns carry no identity name.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::client::adapter::{prompt_estimate, BackendAdapter, EnginePricing, PricingTable};
use crate::client::templates::zero_shot_template;
use crate::models::{
    AdapterConfig, CompletionRequest, CompletionResponse, FewshotError, Result, TokenUsage,
};

/// USD per million tokens.
static PRICING: PricingTable = PricingTable::new(
    "mistral",
    &[
        (
            "mistral-medium-latest",
            EnginePricing {
                prompt_per_million: 2.7,
                completion_per_million: 8.1,
            },
        ),
        (
            "mistral-small-latest",
            EnginePricing {
                prompt_per_million: 2.0,
                completion_per_million: 6.0,
            },
        ),
        (
            "mistral-large-latest",
            EnginePricing {
                prompt_per_million: 8.0,
                completion_per_million: 24.0,
            },
        ),
    ],
);

#[derive(Debug, Deserialize)]
struct ChatResponse {
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

/// Adapter for Mistral-style completion backends.
pub struct MistralAdapter {
    endpoint: String,
    template: &'static str,
}

impl MistralAdapter {
    pub fn new(config: &AdapterConfig) -> Result<Self> {
        let template = zero_shot_template(&config.template)?;
        PRICING.lookup(&config.engine)?;

        Ok(Self {
            endpoint: config.api_url.clone(),
            template,
        })
    }

    fn turns(&self, request: &CompletionRequest) -> Vec<Value> {
        let mut content = vec![json!({"role": "user", "content": self.template})];
        for entry in &request.samples {
            content.push(json!({"role": "user", "content": entry.input_text}));
            content.push(json!({"role": "assistant", "content": entry.output_text}));
        }
        content
    }
}

impl BackendAdapter for MistralAdapter {
    fn name(&self) -> &'static str {
        "mistral"
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
            "name": "",
            "request": self.turns(request),
            "engine": request.engine,
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

        let usage = TokenUsage {
            prompt_tokens: parsed.usage.prompt_tokens,
            completion_tokens: parsed.usage.completion_tokens,
        };

        Ok(CompletionResponse {
            text: Some(content.to_string()),
            cost: PRICING.actual_cost(&request.engine, usage)?,
        })
    }

    fn estimate_cost(&self, request: &CompletionRequest) -> Result<f64> {
        let mut turns = self.turns(request);
        turns.push(json!({"role": "user", "content": request.question}));
        prompt_estimate(&PRICING, &request.engine, &turns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Example;

    fn adapter() -> MistralAdapter {
        let config = AdapterConfig {
            api_url: "http://localhost:8000/".to_string(),
            engine: "mistral-small-latest".to_string(),
            template: "chemistry".to_string(),
            name: None,
            catalog: None,
            vision: false,
            retry_number: 5,
            timeout_secs: 180,
        };
        MistralAdapter::new(&config).unwrap()
    }

    #[test]
    fn test_template_is_a_user_turn() {
        let request = CompletionRequest::new(
            vec![Example::new("a: 1", "high")],
            "a: 2",
            "mistral-small-latest",
        );
        let payload = adapter().build_payload(&request).unwrap();

        let turns = payload["request"].as_array().unwrap();
        assert_eq!(turns[0]["role"], "user");
        assert!(turns[0]["content"].as_str().unwrap().contains("nanomaterials"));
        assert!(turns[0].get("name").is_none());
    }

    #[test]
    fn test_parse_prices_both_token_kinds() {
        let request = CompletionRequest::new(vec![], "a: 1", "mistral-small-latest");
        let raw = serde_json::json!({
            "choices": [{"message": {"content": "high"}}],
            "usage": {"prompt_tokens": 1_000_000, "completion_tokens": 1_000_000},
        });

        let response = adapter().parse_response(&request, &raw).unwrap();
        // Exactly the listed per-million rates, no drift.
        assert_eq!(response.cost, 2.0 + 6.0);
    }

    #[test]
    fn test_unknown_template_rejected() {
        let config = AdapterConfig {
            api_url: "http://localhost:8000/".to_string(),
            engine: "mistral-small-latest".to_string(),
            template: "gastronomy".to_string(),
            name: None,
            catalog: None,
            vision: false,
            retry_number: 5,
            timeout_secs: 180,
        };
        assert!(matches!(
            MistralAdapter::new(&config),
            Err(FewshotError::Template { .. })
        ));
    }
}
