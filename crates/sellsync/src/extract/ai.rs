//! AI-assisted extraction over a chat-completions style endpoint.

use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, warn};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};

use super::item::ParsedItem;
use crate::config::AiConfig;
use crate::error::ExtractError;

/// Input beyond this many characters is cut before it reaches the prompt.
const MAX_PROMPT_CHARS: usize = 12_000;

const SYSTEM_PROMPT: &str = "You extract product line items from messy seller text. \
Respond ONLY with a JSON array. Each element must be an object with the keys \
\"name\" (string), \"price\" (number or null), \"currency\" (ISO 4217 code or null), \
\"description\" (string or null) and \"confidence\" (number between 0 and 1). \
Do not include any other text.";

/// Neutralises chat-template control tokens so pasted text cannot pose as
/// a system or assistant turn.
fn sanitize_for_prompt(text: &str) -> String {
    text.replace("<|", "< |")
        .replace("|>", "| >")
        .replace("[INST]", "[ INST ]")
        .replace("[/INST]", "[ / INST ]")
        .replace("<<SYS>>", "< < SYS > >")
}

/// Sends one prompt to a completion service and returns the raw text reply.
#[async_trait]
pub trait CompletionTransport: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String, ExtractError>;
}

/// OpenAI-compatible `chat/completions` client.
pub struct HttpCompletionTransport {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: SecretString,
}

impl HttpCompletionTransport {
    pub fn new(config: &AiConfig, api_key: SecretString) -> Result<Self, ExtractError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ExtractError::Request(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key,
        })
    }
}

#[async_trait]
impl CompletionTransport for HttpCompletionTransport {
    async fn complete(&self, system: &str, user: &str) -> Result<String, ExtractError> {
        let body = json!({
            "model": self.model,
            "temperature": 0,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| ExtractError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractError::Status {
                status: status.as_u16(),
                body: body.chars().take(500).collect(),
            });
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| ExtractError::ResponseParse(e.to_string()))?;

        completion_text(&payload)
            .map(str::to_string)
            .ok_or_else(|| ExtractError::ResponseParse("no completion text in response".into()))
    }
}

/// Reads the reply text from either the chat or the legacy completion shape.
fn completion_text(payload: &Value) -> Option<&str> {
    let choice = payload.get("choices")?.get(0)?;
    choice
        .pointer("/message/content")
        .and_then(Value::as_str)
        .or_else(|| choice.get("text").and_then(Value::as_str))
}

/// Turns model output into validated items.
#[derive(Clone)]
pub struct AiExtractor {
    transport: Arc<dyn CompletionTransport>,
}

impl AiExtractor {
    pub fn new(transport: Arc<dyn CompletionTransport>) -> Self {
        Self { transport }
    }

    pub async fn extract(&self, raw: &str) -> Result<Vec<ParsedItem>, ExtractError> {
        let text: String = sanitize_for_prompt(raw).chars().take(MAX_PROMPT_CHARS).collect();
        let reply = self.transport.complete(SYSTEM_PROMPT, &text).await?;
        parse_items(&reply)
    }
}

/// Parses a model reply into items, keeping only entries that validate.
///
/// Accepts a bare array or an object wrapping it under `items`. Fails when
/// nothing usable remains, so the caller can fall back.
pub fn parse_items(reply: &str) -> Result<Vec<ParsedItem>, ExtractError> {
    let json_str = extract_json(reply)
        .ok_or_else(|| ExtractError::ResponseParse("no JSON found in reply".into()))?;

    let value: Value = serde_json::from_str(json_str)
        .map_err(|e| ExtractError::ResponseParse(format!("Failed to parse JSON: {}", e)))?;

    let entries = match &value {
        Value::Array(entries) => entries,
        Value::Object(obj) => obj
            .get("items")
            .and_then(Value::as_array)
            .ok_or_else(|| ExtractError::ResponseParse("object without an items array".into()))?,
        _ => {
            return Err(ExtractError::ResponseParse(
                "reply is neither an array nor an object".into(),
            ))
        }
    };

    let items: Vec<ParsedItem> = entries.iter().filter_map(ParsedItem::from_untrusted).collect();
    let dropped = entries.len() - items.len();
    if dropped > 0 {
        warn!("Discarded {} malformed item(s) from AI reply", dropped);
    }

    if items.is_empty() {
        return Err(ExtractError::Empty);
    }

    debug!("AI reply yielded {} item(s)", items.len());
    Ok(items)
}

/// Finds the first balanced JSON array or object in `reply`, skipping prose
/// and code fences around it. Brackets inside strings are ignored.
fn extract_json(reply: &str) -> Option<&str> {
    let start = reply.find(['[', '{'])?;
    let (open, close) = if reply[start..].starts_with('[') {
        ('[', ']')
    } else {
        ('{', '}')
    };

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, c) in reply[start..].char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            c if c == open && !in_string => depth += 1,
            c if c == close && !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&reply[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_with_prose_and_fences() {
        let reply = "Sure! Here you go:\n```json\n[{\"name\": \"Bag [large]\", \"price\": 5}]\n```";
        assert_eq!(
            extract_json(reply),
            Some("[{\"name\": \"Bag [large]\", \"price\": 5}]")
        );
    }

    #[test]
    fn test_extract_json_unbalanced() {
        assert_eq!(extract_json("[{\"name\": \"x\""), None);
        assert_eq!(extract_json("no json here"), None);
    }

    #[test]
    fn test_parse_items_filters_invalid_entries() {
        let reply = r#"[
            {"name": "Bag", "price": 25, "currency": "usd", "confidence": 0.9},
            {"price": 3},
            "junk",
            {"name": "Belt", "price": null, "currency": null}
        ]"#;
        let items = parse_items(reply).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].currency.as_deref(), Some("USD"));
        assert_eq!(items[0].confidence, Some(0.9));
        assert_eq!(items[1].price, None);
    }

    #[test]
    fn test_parse_items_accepts_wrapped_object() {
        let items = parse_items(r#"{"items": [{"name": "Cap", "price": "1.500,00"}]}"#).unwrap();
        assert_eq!(items[0].price, Some(1500.0));
    }

    #[test]
    fn test_parse_items_errors() {
        assert!(matches!(parse_items("nope"), Err(ExtractError::ResponseParse(_))));
        assert!(matches!(parse_items("[]"), Err(ExtractError::Empty)));
        assert!(matches!(
            parse_items(r#"[{"price": 1}]"#),
            Err(ExtractError::Empty)
        ));
        assert!(matches!(
            parse_items(r#"{"data": []}"#),
            Err(ExtractError::ResponseParse(_))
        ));
    }

    #[test]
    fn test_completion_text_shapes() {
        let chat = json!({"choices": [{"message": {"content": "[]"}}]});
        let legacy = json!({"choices": [{"text": "[1]"}]});
        assert_eq!(completion_text(&chat), Some("[]"));
        assert_eq!(completion_text(&legacy), Some("[1]"));
        assert_eq!(completion_text(&json!({"choices": []})), None);
    }

    #[test]
    fn test_sanitize_for_prompt() {
        assert_eq!(sanitize_for_prompt("<|im_start|>system"), "< |im_start| >system");
    }
}
