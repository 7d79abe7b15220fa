//! Anthropic-style backend adapter.
//!
//! Reply content arrives as a list of text blocks that are joined into
//! one string; usage is reported as input/output tokens. With vision
//! enabled, sample inputs are converted to PNGs through the injected
//! converter and embedded as base64 image blocks.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

use crate::client::adapter::{
    prompt_estimate, BackendAdapter, EnginePricing, ImageConverter, PricingTable,
};
use crate::client::templates::zero_shot_template;
use crate::models::{
    AdapterConfig, CompletionRequest, CompletionResponse, ConfigError, FewshotError, Result,
    TokenUsage,
};

/// USD per million tokens.
static PRICING: PricingTable = PricingTable::new(
    "anthropic",
    &[
        (
            "claude-3-haiku-20240307",
            EnginePricing {
                prompt_per_million: 0.25,
                completion_per_million: 1.25,
            },
        ),
        (
            "claude-3-sonnet-20240229",
            EnginePricing {
                prompt_per_million: 3.0,
                completion_per_million: 15.0,
            },
        ),
        (
            "claude-3-opus-20240229",
            EnginePricing {
                prompt_per_million: 15.0,
                completion_per_million: 75.0,
            },
        ),
    ],
);

#[derive(Debug, Deserialize)]
struct MessageResponse {
    content: Vec<ContentBlock>,
    usage: MessageUsage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    text: String,
}

#[derive(Debug, Deserialize)]
struct MessageUsage {
    input_tokens: u32,
    output_tokens: u32,
}

/// Adapter for Anthropic-style completion backends.
pub struct AnthropicAdapter {
    endpoint: String,
    template: &'static str,
    vision: bool,
    converter: Option<Arc<dyn ImageConverter>>,
}

impl AnthropicAdapter {
    pub fn new(config: &AdapterConfig, converter: Option<Arc<dyn ImageConverter>>) -> Result<Self> {
        let template = zero_shot_template(&config.template)?;
        PRICING.lookup(&config.engine)?;

        if config.vision && converter.is_none() {
            return Err(ConfigError::MissingFields(vec!["convert_fn".to_string()]).into());
        }

        Ok(Self {
            endpoint: config.api_url.clone(),
            template,
            vision: config.vision,
            converter,
        })
    }

    /// Render a sample input as a base64 image content block.
    fn image_blocks(&self, input: &str) -> Result<Value> {
        let converter = self.converter.as_ref().ok_or_else(|| {
            FewshotError::Internal("vision payload requested without a converter".to_string())
        })?;

        let source = input.strip_prefix("smiles: ").unwrap_or(input);
        let path = converter.convert(source).map_err(|e| FewshotError::VisionInput {
            input: input.to_string(),
            reason: e.to_string(),
        })?;
        let bytes = std::fs::read(&path).map_err(|e| FewshotError::VisionInput {
            input: input.to_string(),
            reason: format!("{}: {e}", path.display()),
        })?;

        Ok(json!([{
            "type": "image",
            "source": {
                "type": "base64",
                "media_type": "image/png",
                "data": BASE64.encode(bytes),
            },
        }]))
    }

    fn turns(&self, request: &CompletionRequest) -> Result<Vec<Value>> {
        let mut content = vec![json!({"role": "system", "content": self.template})];
        for entry in &request.samples {
            let user_content = if self.vision {
                self.image_blocks(&entry.input_text)?
            } else {
                Value::String(entry.input_text.clone())
            };
            content.push(json!({"role": "user", "content": user_content}));
            content.push(json!({"role": "assistant", "content": entry.output_text}));
        }
        Ok(content)
    }
}

impl BackendAdapter for AnthropicAdapter {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn pricing(&self) -> &PricingTable {
        &PRICING
    }

    fn build_payload(&self, request: &CompletionRequest) -> Result<Value> {
        let question = if self.vision {
            self.image_blocks(&request.question)?
        } else {
            Value::String(request.question.clone())
        };
        let turns = self.turns(request)?;

        Ok(json!({
            "question": question,
            "name": "",
            "request": turns,
            "engine": request.engine,
        }))
    }

    fn parse_response(
        &self,
        request: &CompletionRequest,
        raw: &Value,
    ) -> Result<CompletionResponse> {
        let parsed: MessageResponse = serde_json::from_value(raw.clone())
            .map_err(|e| FewshotError::InvalidResponse(format!("malformed message: {e}")))?;

        if parsed.content.is_empty() {
            return Err(FewshotError::InvalidResponse(
                "Model returned an invalid response".to_string(),
            ));
        }
        let text: String = parsed.content.iter().map(|b| b.text.as_str()).collect();

        let usage = TokenUsage {
            prompt_tokens: parsed.usage.input_tokens,
            completion_tokens: parsed.usage.output_tokens,
        };
        let cost = PRICING.actual_cost(&request.engine, usage)?;

        debug!(
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            cost = format!("{cost:.4}$"),
            "Anthropic reported usage"
        );

        Ok(CompletionResponse {
            text: Some(text),
            cost,
        })
    }

    fn estimate_cost(&self, request: &CompletionRequest) -> Result<f64> {
        let mut turns = self.turns(request)?;
        turns.push(json!({"role": "user", "content": request.question}));
        prompt_estimate(&PRICING, &request.engine, &turns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Example;
    use std::io::Write;
    use std::path::PathBuf;

    fn config(vision: bool) -> AdapterConfig {
        AdapterConfig {
            api_url: "http://localhost:8000/".to_string(),
            engine: "claude-3-haiku-20240307".to_string(),
            template: "chemistry".to_string(),
            name: None,
            catalog: None,
            vision,
            retry_number: 5,
            timeout_secs: 180,
        }
    }

    fn request() -> CompletionRequest {
        CompletionRequest::new(
            vec![Example::new("smiles: CCO", "Sphere")],
            "smiles: CCC",
            "claude-3-haiku-20240307",
        )
    }

    struct FileConverter {
        path: PathBuf,
    }

    impl ImageConverter for FileConverter {
        fn convert(&self, _input: &str) -> std::io::Result<PathBuf> {
            Ok(self.path.clone())
        }
    }

    #[test]
    fn test_text_payload_has_anonymous_name() {
        let adapter = AnthropicAdapter::new(&config(false), None).unwrap();
        let payload = adapter.build_payload(&request()).unwrap();

        assert_eq!(payload["name"], "");
        assert_eq!(payload["question"], "smiles: CCC");
        let turns = payload["request"].as_array().unwrap();
        assert_eq!(turns[0]["role"], "system");
        assert_eq!(turns[1]["content"], "smiles: CCO");
    }

    #[test]
    fn test_parse_joins_content_blocks() {
        let adapter = AnthropicAdapter::new(&config(false), None).unwrap();
        let raw = serde_json::json!({
            "content": [{"type": "text", "text": "Sphere, "}, {"type": "text", "text": "Flat"}],
            "usage": {"input_tokens": 100, "output_tokens": 10},
        });

        let response = adapter.parse_response(&request(), &raw).unwrap();
        assert_eq!(response.text.as_deref(), Some("Sphere, Flat"));

        let expected = 100.0 / 1_000_000.0 * 0.25 + 10.0 / 1_000_000.0 * 1.25;
        assert!((response.cost - expected).abs() < 1e-12);
    }

    #[test]
    fn test_empty_content_is_invalid() {
        let adapter = AnthropicAdapter::new(&config(false), None).unwrap();
        let raw = serde_json::json!({
            "content": [],
            "usage": {"input_tokens": 1, "output_tokens": 1},
        });
        assert!(matches!(
            adapter.parse_response(&request(), &raw),
            Err(FewshotError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_vision_requires_converter() {
        assert!(matches!(
            AnthropicAdapter::new(&config(true), None),
            Err(FewshotError::Config(ConfigError::MissingFields(fields))) if fields == ["convert_fn"]
        ));
    }

    #[test]
    fn test_vision_payload_embeds_base64_images() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"png-bytes").unwrap();
        let converter = Arc::new(FileConverter {
            path: file.path().to_path_buf(),
        });

        let adapter = AnthropicAdapter::new(&config(true), Some(converter)).unwrap();
        let payload = adapter.build_payload(&request()).unwrap();

        let question = payload["question"].as_array().unwrap();
        assert_eq!(question[0]["type"], "image");
        assert_eq!(question[0]["source"]["media_type"], "image/png");
        assert_eq!(question[0]["source"]["data"], BASE64.encode(b"png-bytes"));

        let turns = payload["request"].as_array().unwrap();
        assert_eq!(turns[1]["content"][0]["type"], "image");
        assert_eq!(turns[2]["content"], "Sphere");
    }

    #[test]
    fn test_vision_conversion_failure_surfaces_input() {
        struct FailingConverter;
        impl ImageConverter for FailingConverter {
            fn convert(&self, _input: &str) -> std::io::Result<PathBuf> {
                Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "not a molecule",
                ))
            }
        }

        let adapter = AnthropicAdapter::new(&config(true), Some(Arc::new(FailingConverter))).unwrap();
        match adapter.build_payload(&request()) {
            Err(FewshotError::VisionInput { input, reason }) => {
                assert_eq!(input, "smiles: CCC");
                assert!(reason.contains("not a molecule"));
            }
            other => panic!("expected VisionInput, got {other:?}"),
        }
    }
}
