//! Tolerant parsing of service responses into explicit outcomes.

use serde_json::{Map, Value};

/// Result of a generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    Success { image_url: String },
    Pending { status_url: String },
    Failure { message: String },
}

impl GenerationOutcome {
    /// Maps a generation payload. Shapes without an image or status URL fail closed.
    pub fn from_value(data: &Value) -> Self {
        if let Some(image_url) = image_url(data) {
            return GenerationOutcome::Success { image_url };
        }
        if let Some(status_url) = non_empty_str(&data["status_url"]) {
            return GenerationOutcome::Pending { status_url };
        }
        let message = error_message(data)
            .unwrap_or_else(|| "response contained neither an image URL nor a status URL".to_string());
        GenerationOutcome::Failure { message }
    }
}

/// State of one status poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Ready { image_url: String },
    Failed { state: Option<String> },
    Pending { state: Option<String> },
}

impl PollOutcome {
    /// An image URL wins over everything else; then a failed state or an
    /// HTTP error status ends polling.
    pub fn from_response(status: u16, data: &Value) -> Self {
        if let Some(image_url) = image_url(data) {
            return PollOutcome::Ready { image_url };
        }
        let state = non_empty_str(&data["result"]["state"]).or_else(|| non_empty_str(&data["state"]));
        let failed = matches!(
            state.as_deref().map(str::to_ascii_lowercase).as_deref(),
            Some("failed") | Some("error")
        );
        if failed || status >= 400 {
            PollOutcome::Failed { state }
        } else {
            PollOutcome::Pending { state }
        }
    }
}

/// Parses a body, treating an empty one as an empty object.
pub fn parse_body(text: &str) -> Result<Value, serde_json::Error> {
    if text.trim().is_empty() {
        return Ok(empty());
    }
    serde_json::from_str(text)
}

pub fn empty() -> Value {
    Value::Object(Map::new())
}

/// `result.image_url` or `image_url`.
pub fn image_url(data: &Value) -> Option<String> {
    non_empty_str(&data["result"]["image_url"]).or_else(|| non_empty_str(&data["image_url"]))
}

/// `error` as a string, or `error.message`.
pub fn error_message(data: &Value) -> Option<String> {
    non_empty_str(&data["error"]).or_else(|| non_empty_str(&data["error"]["message"]))
}

/// `choices[0].message.content`, trimmed. Content given as text parts is joined.
pub fn rewrite_text(data: &Value) -> Option<String> {
    let content = &data["choices"][0]["message"]["content"];
    let text = match content {
        Value::String(s) => s.trim().to_string(),
        Value::Array(parts) => parts
            .iter()
            .filter_map(|p| p["text"].as_str())
            .collect::<Vec<_>>()
            .join("")
            .trim()
            .to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn non_empty_str(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_generation_outcomes() {
        assert_eq!(
            GenerationOutcome::from_value(&json!({"result": {"image_url": "https://img/1.png"}})),
            GenerationOutcome::Success {
                image_url: "https://img/1.png".into()
            }
        );
        assert_eq!(
            GenerationOutcome::from_value(&json!({"image_url": "https://img/2.png"})),
            GenerationOutcome::Success {
                image_url: "https://img/2.png".into()
            }
        );
        assert_eq!(
            GenerationOutcome::from_value(&json!({"status_url": "https://status/1", "request_id": "r"})),
            GenerationOutcome::Pending {
                status_url: "https://status/1".into()
            }
        );
        assert_eq!(
            GenerationOutcome::from_value(&json!({"error": {"message": "bad prompt"}})),
            GenerationOutcome::Failure {
                message: "bad prompt".into()
            }
        );
        assert!(matches!(
            GenerationOutcome::from_value(&json!({"unexpected": true})),
            GenerationOutcome::Failure { .. }
        ));
    }

    #[test]
    fn test_poll_outcomes() {
        assert_eq!(
            PollOutcome::from_response(200, &json!({"result": {"state": "IN_PROGRESS"}})),
            PollOutcome::Pending {
                state: Some("IN_PROGRESS".into())
            }
        );
        assert!(matches!(
            PollOutcome::from_response(200, &json!({"state": "FAILED"})),
            PollOutcome::Failed { .. }
        ));
        assert!(matches!(
            PollOutcome::from_response(500, &json!({})),
            PollOutcome::Failed { state: None }
        ));
        assert!(matches!(
            PollOutcome::from_response(200, &json!({"result": {"image_url": "https://img/3.png"}})),
            PollOutcome::Ready { .. }
        ));
    }

    #[test]
    fn test_rewrite_text() {
        assert_eq!(
            rewrite_text(&json!({"choices": [{"message": {"content": "  A chef.  "}}]})),
            Some("A chef.".into())
        );
        assert_eq!(
            rewrite_text(&json!({"choices": [{"message": {"content": [{"type": "text", "text": "A dog"}]}}]})),
            Some("A dog".into())
        );
        assert_eq!(rewrite_text(&json!({"choices": [{"message": {"content": "   "}}]})), None);
        assert_eq!(rewrite_text(&empty()), None);
    }

    #[test]
    fn test_parse_body() {
        assert_eq!(parse_body("").unwrap(), empty());
        assert!(parse_body("<html>").is_err());
        assert_eq!(error_message(&json!({"error": "quota"})), Some("quota".into()));
    }
}
