//! Remote translation backends.
//!
//! Every backend turns `(system prompt, text)` into translated text plus the
//! token usage the vendor reported. DeepSeek speaks the OpenAI chat protocol and
//! is configured as an `openai` provider with its own base URL.

mod anthropic;
mod error;
mod gemini;
pub mod http;
mod openai;

use std::fmt;

use crate::forum::TokenUsage;

pub use anthropic::AnthropicBackend;
pub use error::ProviderError;
pub use gemini::GeminiBackend;
pub use http::{HttpSettings, JsonClient};
pub use openai::OpenAiBackend;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TranslationOutput {
    pub text: String,
    pub tokens: TokenUsage,
}

pub trait TranslationBackend {
    /// Key under which translations from this backend are stored.
    fn name(&self) -> &str;

    fn translate(&self, system_prompt: &str, text: &str)
        -> Result<TranslationOutput, ProviderError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
    Gemini,
}

impl ProviderKind {
    pub fn parse(s: &str) -> Result<Self, ProviderError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" | "openai-compatible" | "deepseek" => Ok(Self::OpenAi),
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "gemini" | "google" => Ok(Self::Gemini),
            other => Err(ProviderError::UnknownProvider(other.to_string())),
        }
    }

    pub fn default_base_url(self) -> &'static str {
        match self {
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Anthropic => "https://api.anthropic.com/v1",
            Self::Gemini => "https://generativelanguage.googleapis.com/v1beta",
        }
    }

    pub fn default_api_key_env(self) -> &'static str {
        match self {
            Self::OpenAi => "OPENAI_API_KEY",
            Self::Anthropic => "ANTHROPIC_API_KEY",
            Self::Gemini => "GOOGLE_API_KEY",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Gemini => "gemini",
        })
    }
}

/// A backend with its key already resolved.
#[derive(Clone, Debug)]
pub struct BackendSpec {
    pub name: String,
    pub kind: ProviderKind,
    pub model: String,
    pub base_url: String,
    pub api_key: String,
    pub max_tokens: Option<u32>,
}

pub fn build_backend(
    spec: &BackendSpec,
    client: &JsonClient,
) -> Box<dyn TranslationBackend> {
    match spec.kind {
        ProviderKind::OpenAi => Box::new(OpenAiBackend::new(spec.clone(), client.clone())),
        ProviderKind::Anthropic => Box::new(AnthropicBackend::new(spec.clone(), client.clone())),
        ProviderKind::Gemini => Box::new(GeminiBackend::new(spec.clone(), client.clone())),
    }
}

/// Joins the `text` fields of content parts, skipping anything else.
fn join_text_parts<'a>(parts: impl Iterator<Item = &'a serde_json::Value>) -> String {
    parts
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect::<Vec<_>>()
        .join("")
}

fn u64_at(value: &serde_json::Value, pointer: &str) -> Option<u64> {
    value.pointer(pointer).and_then(|v| v.as_u64())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_kind_aliases() {
        assert_eq!(ProviderKind::parse("DeepSeek").expect("kind"), ProviderKind::OpenAi);
        assert_eq!(ProviderKind::parse("claude").expect("kind"), ProviderKind::Anthropic);
        assert_eq!(ProviderKind::parse(" gemini ").expect("kind"), ProviderKind::Gemini);
        assert!(matches!(
            ProviderKind::parse("llama"),
            Err(ProviderError::UnknownProvider(k)) if k == "llama"
        ));
    }
}
