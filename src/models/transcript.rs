//! Completion transcript model.
//!
//! The value types passed between the experiment loop and the backend
//! adapters: an ordered few-shot request and the normalized response.
//! Pure data; the only derived behavior is [`CompletionResponse::classes`].

use serde::{Deserialize, Serialize};

use crate::models::{FewshotError, Result};

/// Delimiter between class labels in model output.
pub const CLASS_DELIMITER: &str = ", ";

/// A single few-shot example: an input shown to the model and the output
/// it is expected to mirror.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Example {
    pub input_text: String,
    pub output_text: String,
}

impl Example {
    pub fn new(input_text: impl Into<String>, output_text: impl Into<String>) -> Self {
        Self {
            input_text: input_text.into(),
            output_text: output_text.into(),
        }
    }
}

/// One completion request.
///
/// Example order matters: it becomes the order of conversation turns.
/// Immutable once constructed; built fresh for every test item.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Ordered few-shot examples
    pub samples: Vec<Example>,
    /// The question the model should classify
    pub question: String,
    /// Exact model-version string (e.g. "gpt-4", "claude-3-opus-20240229")
    pub engine: String,
}

impl CompletionRequest {
    pub fn new(samples: Vec<Example>, question: impl Into<String>, engine: impl Into<String>) -> Self {
        Self {
            samples,
            question: question.into(),
            engine: engine.into(),
        }
    }
}

/// Token usage reported by a provider for one completed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// The normalized completion result.
///
/// `text` is absent for dry runs; `cost` is always present (for a dry run
/// it is the pre-flight estimate rounded up to the cent).
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionResponse {
    pub text: Option<String>,
    pub cost: f64,
}

impl CompletionResponse {
    /// Predicted class labels: the response text split on `", "`.
    ///
    /// A derived view, not separate state. Fails on a dry-run response,
    /// which has no text to split.
    pub fn classes(&self) -> Result<Vec<String>> {
        let text = self.text.as_deref().ok_or_else(|| {
            FewshotError::InvalidResponse(
                "cannot derive classes: response has no text (dry run?)".to_string(),
            )
        })?;
        Ok(text.split(CLASS_DELIMITER).map(str::to_string).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classes_splits_on_delimiter() {
        let response = CompletionResponse {
            text: Some("high, flat".to_string()),
            cost: 0.01,
        };
        assert_eq!(response.classes().unwrap(), vec!["high", "flat"]);
    }

    #[test]
    fn test_classes_single_label() {
        let response = CompletionResponse {
            text: Some("Sphere".to_string()),
            cost: 0.0,
        };
        assert_eq!(response.classes().unwrap(), vec!["Sphere"]);
    }

    #[test]
    fn test_classes_absent_text_is_an_error() {
        let response = CompletionResponse {
            text: None,
            cost: 0.42,
        };
        assert!(matches!(
            response.classes(),
            Err(FewshotError::InvalidResponse(_))
        ));
    }
}
