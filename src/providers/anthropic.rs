use serde_json::{json, Value};

use crate::forum::TokenUsage;

use super::http::join_url;
use super::{
    join_text_parts, u64_at, BackendSpec, JsonClient, ProviderError, TranslationBackend,
    TranslationOutput,
};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 1000;

pub struct AnthropicBackend {
    spec: BackendSpec,
    client: JsonClient,
}

impl AnthropicBackend {
    pub fn new(spec: BackendSpec, client: JsonClient) -> Self {
        Self { spec, client }
    }
}

impl TranslationBackend for AnthropicBackend {
    fn name(&self) -> &str {
        &self.spec.name
    }

    fn translate(
        &self,
        system_prompt: &str,
        text: &str,
    ) -> Result<TranslationOutput, ProviderError> {
        let url = join_url(&self.spec.base_url, "messages");
        let body = build_request(&self.spec.model, self.spec.max_tokens, system_prompt, text);
        let headers = [
            ("x-api-key", self.spec.api_key.clone()),
            ("anthropic-version", ANTHROPIC_VERSION.to_string()),
        ];
        let resp = self.client.post_json(&url, &[], &headers, &body)?;
        parse_response(&resp, &self.spec.name)
    }
}

pub(crate) fn build_request(
    model: &str,
    max_tokens: Option<u32>,
    system_prompt: &str,
    text: &str,
) -> Value {
    json!({
        "model": model,
        "max_tokens": max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        "system": system_prompt,
        "messages": [{"role": "user", "content": text}],
    })
}

pub(crate) fn parse_response(resp: &Value, backend: &str) -> Result<TranslationOutput, ProviderError> {
    let blocks = resp
        .get("content")
        .and_then(|c| c.as_array())
        .map(|a| a.as_slice())
        .unwrap_or(&[]);
    let text = join_text_parts(
        blocks
            .iter()
            .filter(|b| b.get("type").and_then(|t| t.as_str()).unwrap_or("text") == "text"),
    );
    let text = text.trim().to_string();
    if text.is_empty() {
        return Err(ProviderError::EmptyResponse(backend.to_string()));
    }

    let input = u64_at(resp, "/usage/input_tokens");
    let output = u64_at(resp, "/usage/output_tokens");
    let tokens = match (input, output) {
        (Some(i), Some(o)) => TokenUsage::new(i, o, i + o),
        _ => TokenUsage {
            prompt_tokens: input,
            completion_tokens: output,
            total_tokens: None,
        },
    };
    Ok(TranslationOutput { text, tokens })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_puts_prompt_in_system_field() {
        let body = build_request("claude-3-7-sonnet-latest", None, "Translate.", "Hej");
        assert_eq!(body["system"], "Translate.");
        assert_eq!(body["max_tokens"], 1000);
        assert_eq!(body["messages"].as_array().map(Vec::len), Some(1));
        assert_eq!(body["messages"][0]["content"], "Hej");
    }

    #[test]
    fn sums_input_and_output_tokens() {
        let resp = json!({
            "content": [
                {"type": "text", "text": "Hello "},
                {"type": "tool_use", "id": "x"},
                {"type": "text", "text": "there"}
            ],
            "usage": {"input_tokens": 40, "output_tokens": 2}
        });
        let out = parse_response(&resp, "claude").expect("parse");
        assert_eq!(out.text, "Hello there");
        assert_eq!(out.tokens, TokenUsage::new(40, 2, 42));
    }

    #[test]
    fn empty_content_is_error() {
        let resp = json!({"content": [], "usage": {"input_tokens": 1, "output_tokens": 0}});
        assert!(matches!(
            parse_response(&resp, "claude"),
            Err(ProviderError::EmptyResponse(_))
        ));
    }
}
