use serde_json::{json, Value};

use crate::forum::TokenUsage;

use super::http::join_url;
use super::{u64_at, BackendSpec, JsonClient, ProviderError, TranslationBackend, TranslationOutput};

/// OpenAI chat completions, also used for OpenAI-compatible vendors such as DeepSeek.
pub struct OpenAiBackend {
    spec: BackendSpec,
    client: JsonClient,
}

impl OpenAiBackend {
    pub fn new(spec: BackendSpec, client: JsonClient) -> Self {
        Self { spec, client }
    }
}

impl TranslationBackend for OpenAiBackend {
    fn name(&self) -> &str {
        &self.spec.name
    }

    fn translate(
        &self,
        system_prompt: &str,
        text: &str,
    ) -> Result<TranslationOutput, ProviderError> {
        let url = join_url(&self.spec.base_url, "chat/completions");
        let body = build_request(&self.spec.model, self.spec.max_tokens, system_prompt, text);
        let headers = [("Authorization", format!("Bearer {}", self.spec.api_key))];
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
    let mut body = json!({
        "model": model,
        "messages": [
            {"role": "system", "content": system_prompt},
            {"role": "user", "content": text},
        ],
    });
    if let Some(n) = max_tokens {
        body["max_tokens"] = json!(n);
    }
    body
}

pub(crate) fn parse_response(resp: &Value, backend: &str) -> Result<TranslationOutput, ProviderError> {
    let text = resp
        .pointer("/choices/0/message/content")
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ProviderError::EmptyResponse(backend.to_string()))?;
    let tokens = TokenUsage {
        prompt_tokens: u64_at(resp, "/usage/prompt_tokens"),
        completion_tokens: u64_at(resp, "/usage/completion_tokens"),
        total_tokens: u64_at(resp, "/usage/total_tokens"),
    };
    Ok(TranslationOutput { text, tokens })
}
