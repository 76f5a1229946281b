use serde_json::{json, Value};

use crate::forum::TokenUsage;

use super::http::join_url;
use super::{
    join_text_parts, u64_at, BackendSpec, JsonClient, ProviderError, TranslationBackend,
    TranslationOutput,
};

/// Google Generative Language API. Gemini gets the prompt and the text as a
/// single user turn.
pub struct GeminiBackend {
    spec: BackendSpec,
    client: JsonClient,
}

impl GeminiBackend {
    pub fn new(spec: BackendSpec, client: JsonClient) -> Self {
        Self { spec, client }
    }
}

impl TranslationBackend for GeminiBackend {
    fn name(&self) -> &str {
        &self.spec.name
    }

    fn translate(
        &self,
        system_prompt: &str,
        text: &str,
    ) -> Result<TranslationOutput, ProviderError> {
        let url = join_url(
            &self.spec.base_url,
            &format!("models/{}:generateContent", self.spec.model),
        );
        let query = [("key", self.spec.api_key.clone())];
        let body = build_request(self.spec.max_tokens, system_prompt, text);
        let resp = self.client.post_json(&url, &query, &[], &body)?;
        parse_response(&resp, &self.spec.name)
    }
}

pub(crate) fn build_request(max_tokens: Option<u32>, system_prompt: &str, text: &str) -> Value {
    let mut body = json!({
        "contents": [{"parts": [{"text": format!("{system_prompt}\n\n{text}")}]}],
    });
    if let Some(n) = max_tokens {
        body["generationConfig"] = json!({"maxOutputTokens": n});
    }
    body
}

pub(crate) fn parse_response(resp: &Value, backend: &str) -> Result<TranslationOutput, ProviderError> {
    let parts = resp
        .pointer("/candidates/0/content/parts")
        .and_then(|p| p.as_array())
        .map(|a| a.as_slice())
        .unwrap_or(&[]);
    let text = join_text_parts(parts.iter()).trim().to_string();
    if text.is_empty() {
        return Err(ProviderError::EmptyResponse(backend.to_string()));
    }
    let tokens = TokenUsage {
        prompt_tokens: u64_at(resp, "/usageMetadata/promptTokenCount"),
        completion_tokens: u64_at(resp, "/usageMetadata/candidatesTokenCount"),
        total_tokens: u64_at(resp, "/usageMetadata/totalTokenCount"),
    };
    Ok(TranslationOutput { text, tokens })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::forum::Translation;
    use crate::providers::http::test_server::{refused_base, serve};
    use crate::providers::{HttpSettings, ProviderKind};

    #[test]
    fn prompt_and_text_share_one_turn() {
        let body = build_request(None, "Translate.", "Hej");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "Translate.\n\nHej");
        assert!(body.get("generationConfig").is_none());
    }

    #[test]
    fn parses_candidate_parts_and_usage_metadata() {
        let resp = json!({
            "candidates": [{"content": {"parts": [{"text": "Hello"}, {"text": " world"}]}}],
            "usageMetadata": {"promptTokenCount": 20, "candidatesTokenCount": 2, "totalTokenCount": 22}
        });
        let out = parse_response(&resp, "gemini-2.0-flash-exp").expect("parse");
        assert_eq!(out.text, "Hello world");
        assert_eq!(out.tokens, TokenUsage::new(20, 2, 22));
    }

    fn backend(base_url: String, api_key: &str) -> GeminiBackend {
        let client = JsonClient::new(HttpSettings {
            timeout: Duration::from_secs(10),
            max_attempts: 1,
            backoff: Duration::ZERO,
        })
        .expect("client");
        GeminiBackend::new(
            BackendSpec {
                name: "gemini-2.0-flash-exp".to_string(),
                kind: ProviderKind::Gemini,
                model: "gemini-2.0-flash-exp".to_string(),
                base_url,
                api_key: api_key.to_string(),
                max_tokens: None,
            },
            client,
        )
    }

    #[test]
    fn key_is_url_encoded_and_kept_out_of_status_errors() {
        let (base, server) = serve(vec![(400, r#"{"error": "bad"}"#.to_string())]);
        let err = backend(base, "SECRET key&1")
            .translate("Translate.", "Hej")
            .unwrap_err();
        assert!(matches!(err, ProviderError::Status { status: 400, .. }));
        assert!(!err.to_string().contains("SECRET"));

        let heads = server.join().expect("server");
        assert!(heads[0].starts_with(
            "POST /models/gemini-2.0-flash-exp:generateContent?key=SECRET+key%261 HTTP/1.1"
        ));
    }

    #[test]
    fn transport_errors_do_not_expose_key() {
        let err = backend(refused_base(), "SECRET-KEY-123")
            .translate("Translate.", "Hej")
            .unwrap_err();
        assert!(matches!(err, ProviderError::Http(_)));

        let stored = serde_json::to_string(&Translation::failed(err.to_string())).expect("json");
        assert!(!stored.contains("SECRET-KEY-123"), "{stored}");
    }

    #[test]
    fn blocked_prompt_without_candidates_is_error() {
        let resp = json!({"promptFeedback": {"blockReason": "SAFETY"}});
        assert!(matches!(
            parse_response(&resp, "gemini"),
            Err(ProviderError::EmptyResponse(_))
        ));
    }
}
