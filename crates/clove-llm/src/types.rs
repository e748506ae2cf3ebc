//! The worker wire contract.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Requested thinking effort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThinkingLevel {
    /// Small thinking budget.
    Low,
    /// Default thinking budget.
    Medium,
    /// Large thinking budget.
    High,
}

/// Inline image attachment, base64-encoded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagePayload {
    /// Base64 image bytes.
    pub data: String,
    /// MIME type, e.g. `image/jpeg`.
    #[serde(default = "default_mime")]
    pub mime_type: String,
}

fn default_mime() -> String {
    "image/jpeg".to_string()
}

/// One request line written to the worker's stdin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThinkRequest {
    /// The prompt text.
    pub prompt: String,
    /// Model override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Sampling temperature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Output token cap.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u64>,
    /// Thinking effort.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking_level: Option<ThinkingLevel>,
    /// System instruction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<String>,
    /// Inline image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImagePayload>,
    /// Tool declarations, passed through opaquely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Value>,
}

/// One response line read from the worker's stdout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThinkResponse {
    /// Whether generation succeeded.
    pub success: bool,
    /// Generated text.
    #[serde(default)]
    pub content: String,
    /// Total token count, if the worker reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<u64>,
    /// Tool invocations requested by the model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_calls: Option<Value>,
    /// Failure message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ThinkResponse {
    /// The response handed out when the worker is unhealthy.
    #[must_use]
    pub fn unavailable() -> Self {
        Self {
            success: false,
            content: String::new(),
            tokens: None,
            function_calls: None,
            error: Some("llm worker unavailable".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_minimal() {
        let req: ThinkRequest = serde_json::from_str(r#"{"prompt":"hi"}"#).unwrap();
        assert_eq!(req.prompt, "hi");
        let line = serde_json::to_string(&req).unwrap();
        assert_eq!(line, r#"{"prompt":"hi"}"#);
    }

    #[test]
    fn test_request_full_options() {
        let req: ThinkRequest = serde_json::from_str(
            r#"{"prompt":"p","model":"m","temperature":0.2,"max_tokens":64,
                "thinking_level":"high","system_instruction":"s",
                "image":{"data":"aGk=","mime_type":"image/png"}}"#,
        )
        .unwrap();
        assert_eq!(req.thinking_level, Some(ThinkingLevel::High));
        assert_eq!(req.image.as_ref().map(|i| i.mime_type.as_str()), Some("image/png"));
    }

    #[test]
    fn test_image_mime_defaults() {
        let image: ImagePayload = serde_json::from_str(r#"{"data":"aGk="}"#).unwrap();
        assert_eq!(image.mime_type, "image/jpeg");
    }

    #[test]
    fn test_response_lenient_parse() {
        let resp: ThinkResponse =
            serde_json::from_str(r#"{"success":true,"content":"hello","tokens":12}"#).unwrap();
        assert!(resp.success);
        assert_eq!(resp.tokens, Some(12));

        let resp: ThinkResponse = serde_json::from_str(r#"{"success":false}"#).unwrap();
        assert_eq!(resp.content, "");
    }
}
