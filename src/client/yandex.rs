//! Yandex-style backend adapter.
//!
//! The wire body is the foundation-models shape: a `modelUri` built from
//! the cloud folder identifier, fixed completion options, and messages
//! whose text rides in a `text` field. The question is the final user
//! message rather than a separate envelope field. Usage counters arrive
//! as strings and both sides are billed at one flat per-token rate.

use serde_json::{json, Value};

use crate::client::adapter::{prompt_estimate, BackendAdapter, EnginePricing, PricingTable};
use crate::client::templates::zero_shot_template;
use crate::models::{
    AdapterConfig, CompletionRequest, CompletionResponse, ConfigError, FewshotError, Result,
    TokenUsage,
};

/// Flat 1.2 currency units per 1000 tokens, both directions.
const FLAT_RATE: EnginePricing = EnginePricing {
    prompt_per_million: 1200.0,
    completion_per_million: 1200.0,
};

static PRICING: PricingTable = PricingTable::new(
    "yandex",
    &[("yandexgpt", FLAT_RATE), ("yandexgpt-lite", FLAT_RATE)],
);

/// Adapter for Yandex-style completion backends.
pub struct YandexAdapter {
    endpoint: String,
    template: &'static str,
    catalog: String,
}

impl YandexAdapter {
    pub fn new(config: &AdapterConfig) -> Result<Self> {
        let catalog = config
            .catalog
            .clone()
            .ok_or_else(|| ConfigError::MissingFields(vec!["catalog".to_string()]))?;
        let template = zero_shot_template(&config.template)?;
        PRICING.lookup(&config.engine)?;

        Ok(Self {
            endpoint: config.api_url.clone(),
            template,
            catalog,
        })
    }

    fn messages(&self, request: &CompletionRequest) -> Vec<Value> {
        let mut messages = vec![json!({"role": "system", "text": self.template})];
        for entry in &request.samples {
            messages.push(json!({"role": "user", "text": entry.input_text}));
            messages.push(json!({"role": "assistant", "text": entry.output_text}));
        }
        messages.push(json!({"role": "user", "text": request.question}));
        messages
    }
}

/// Usage counters may arrive as JSON strings; accept either form.
fn usage_count(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().map(|n| n as u32),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

impl BackendAdapter for YandexAdapter {
    fn name(&self) -> &'static str {
        "yandex"
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn pricing(&self) -> &PricingTable {
        &PRICING
    }

    fn build_payload(&self, request: &CompletionRequest) -> Result<Value> {
        Ok(json!({
            "modelUri": format!("gpt://{}/{}", self.catalog, request.engine),
            "completionOptions": {
                "stream": false,
                "temperature": 0.3,
                "maxTokens": 8192,
            },
            "messages": self.messages(request),
        }))
    }

    fn parse_response(
        &self,
        request: &CompletionRequest,
        raw: &Value,
    ) -> Result<CompletionResponse> {
        let response = raw
            .get("response")
            .ok_or_else(|| FewshotError::InvalidResponse("missing response field".to_string()))?;

        let text = response
            .pointer("/alternatives/0/message/text")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                FewshotError::InvalidResponse("Model returned an invalid response".to_string())
            })?;

        let usage = response
            .get("usage")
            .ok_or_else(|| FewshotError::InvalidResponse("missing usage field".to_string()))?;
        let prompt_tokens = usage
            .get("inputTextTokens")
            .and_then(usage_count)
            .ok_or_else(|| FewshotError::InvalidResponse("missing inputTextTokens".to_string()))?;
        let completion_tokens = usage
            .get("completionTokens")
            .and_then(usage_count)
            .ok_or_else(|| FewshotError::InvalidResponse("missing completionTokens".to_string()))?;

        let cost = PRICING.actual_cost(
            &request.engine,
            TokenUsage {
                prompt_tokens,
                completion_tokens,
            },
        )?;

        Ok(CompletionResponse {
            text: Some(text.to_lowercase()),
            cost,
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

    fn adapter() -> YandexAdapter {
        let config = AdapterConfig {
            api_url: "http://localhost:8000/".to_string(),
            engine: "yandexgpt".to_string(),
            template: "chemistry".to_string(),
            name: None,
            catalog: Some("b1g7example".to_string()),
            vision: false,
            retry_number: 5,
            timeout_secs: 180,
        };
        YandexAdapter::new(&config).unwrap()
    }

    fn request() -> CompletionRequest {
        CompletionRequest::new(vec![Example::new("a: 1", "high")], "a: 2", "yandexgpt")
    }

    #[test]
    fn test_payload_builds_model_uri_and_inlines_question() {
        let payload = adapter().build_payload(&request()).unwrap();

        assert_eq!(payload["modelUri"], "gpt://b1g7example/yandexgpt");
        assert_eq!(payload["completionOptions"]["stream"], false);

        let messages = payload["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[3], json!({"role": "user", "text": "a: 2"}));
    }

    #[test]
    fn test_parse_lowercases_text_and_accepts_string_counters() {
        let raw = serde_json::json!({
            "response": {
                "alternatives": [{"message": {"role": "assistant", "text": "Sphere, Flat"}}],
                "usage": {"inputTextTokens": "500", "completionTokens": 10},
            },
        });

        let response = adapter().parse_response(&request(), &raw).unwrap();
        assert_eq!(response.text.as_deref(), Some("sphere, flat"));

        // 510 tokens at 1.2 per 1000.
        let expected = 510.0 * 1.2 / 1000.0;
        assert!((response.cost - expected).abs() < 1e-12);
    }

    #[test]
    fn test_missing_catalog_reported() {
        let config = AdapterConfig {
            api_url: "http://localhost:8000/".to_string(),
            engine: "yandexgpt".to_string(),
            template: "chemistry".to_string(),
            name: None,
            catalog: None,
            vision: false,
            retry_number: 5,
            timeout_secs: 180,
        };
        assert!(matches!(
            YandexAdapter::new(&config),
            Err(FewshotError::Config(ConfigError::MissingFields(fields))) if fields == ["catalog"]
        ));
    }

    #[test]
    fn test_missing_usage_is_invalid() {
        let raw = serde_json::json!({
            "response": {
                "alternatives": [{"message": {"text": "sphere"}}],
            },
        });
        assert!(matches!(
            adapter().parse_response(&request(), &raw),
            Err(FewshotError::InvalidResponse(_))
        ));
    }
}
