use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use serde::Deserialize;

use crate::providers::{BackendSpec, ProviderKind};

pub const CONFIG_FILENAME: &str = "thread-translations.toml";
pub const CONFIG_ENV: &str = "THREAD_TRANSLATIONS_CONFIG";

pub const DEFAULT_MODELS: [&str; 4] = [
    "gpt-4o",
    "claude-3-7-sonnet-latest",
    "gemini-2.0-flash-exp",
    "deepseek-chat",
];

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub pipeline: PipelineSection,
    #[serde(default)]
    pub prompts: PromptsSection,
    #[serde(default)]
    pub models: ModelsSection,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct PipelineSection {
    /// Forum dump files (`{"threads": [...]}`).
    #[serde(default)]
    pub inputs: Option<Vec<String>>,
    /// Translations JSON, read for resuming and rewritten after each thread.
    #[serde(default)]
    pub output: Option<String>,
    /// Backend names from `[models.backends]` (or built-ins) to translate with.
    #[serde(default)]
    pub models: Option<Vec<String>>,

    #[serde(default)]
    pub sample_size: Option<usize>,
    #[serde(default)]
    pub min_posts: Option<usize>,
    #[serde(default)]
    pub max_posts: Option<usize>,
    #[serde(default)]
    pub seed: Option<u64>,

    #[serde(default)]
    pub source_lang: Option<String>,
    #[serde(default)]
    pub target_lang: Option<String>,

    #[serde(default)]
    pub cache_file: Option<String>,
    #[serde(default)]
    pub trace_dir: Option<String>,
    #[serde(default)]
    pub trace_prompts: Option<bool>,
    #[serde(default)]
    pub log_max_chars: Option<usize>,

    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    #[serde(default)]
    pub max_attempts: Option<usize>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct PromptsSection {
    #[serde(default)]
    pub translate: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct ModelsSection {
    #[serde(default)]
    pub backends: BTreeMap<String, BackendSection>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct BackendSection {
    /// "openai" (also DeepSeek), "anthropic" or "gemini".
    #[serde(default)]
    pub provider: Option<String>,
    /// Vendor model id; defaults to the backend name.
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

/// Backends usable without any config file.
pub fn builtin_backend(name: &str) -> Option<BackendSection> {
    let (provider, api_key_env, base_url, max_tokens) = match name {
        "gpt-4o" => ("openai", "OPENAI_API_KEY", None, None),
        "claude-3-7-sonnet-latest" => ("anthropic", "ANTHROPIC_API_KEY", None, Some(1000)),
        "gemini-2.0-flash-exp" => ("gemini", "GOOGLE_API_KEY", None, None),
        "deepseek-chat" => (
            "openai",
            "DEEPSEEK_API_KEY",
            Some("https://api.deepseek.com"),
            None,
        ),
        _ => return None,
    };
    Some(BackendSection {
        provider: Some(provider.to_string()),
        model: Some(name.to_string()),
        api_key_env: Some(api_key_env.to_string()),
        base_url: base_url.map(str::to_string),
        max_tokens,
    })
}

pub fn find_file_upwards(start_dir: &Path, filename: &str, max_levels: usize) -> Option<PathBuf> {
    let mut dir = start_dir;
    for _ in 0..=max_levels {
        let candidate = dir.join(filename);
        if candidate.exists() {
            return Some(candidate);
        }
        dir = dir.parent()?;
    }
    None
}

pub fn find_default_config(filename: &str) -> Option<PathBuf> {
    if let Ok(cwd) = std::env::current_dir() {
        if let Some(p) = find_file_upwards(&cwd, filename, 8) {
            return Some(p);
        }
    }
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            if let Some(p) = find_file_upwards(dir, filename, 10) {
                return Some(p);
            }
        }
    }
    None
}

pub fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read config: {}", path.display()))?;
    let cfg: AppConfig = toml::from_str(&text)
        .with_context(|| format!("parse config toml: {}", path.display()))?;
    Ok(cfg)
}

/// Resolves a backend by name: config entries override built-ins field by field.
/// The API key is read through `env` so tests need not touch the process environment.
pub fn resolve_backend(
    cfg: &AppConfig,
    name: &str,
    env: &dyn Fn(&str) -> Option<String>,
) -> anyhow::Result<BackendSpec> {
    let builtin = builtin_backend(name);
    let configured = cfg.models.backends.get(name);
    if builtin.is_none() && configured.is_none() {
        return Err(anyhow!(
            "backend not configured: {name} (add [models.backends.\"{name}\"] to {CONFIG_FILENAME})"
        ));
    }
    let base = builtin.unwrap_or_default();
    let pick = |f: fn(&BackendSection) -> Option<String>| {
        configured.and_then(f).or_else(|| f(&base))
    };

    let provider = pick(|b| b.provider.clone())
        .ok_or_else(|| anyhow!("backend {name}: missing `provider`"))?;
    let kind = ProviderKind::parse(&provider).with_context(|| format!("backend {name}"))?;
    let model = pick(|b| b.model.clone()).unwrap_or_else(|| name.to_string());
    let base_url = pick(|b| b.base_url.clone())
        .unwrap_or_else(|| kind.default_base_url().to_string());
    let api_key_env = pick(|b| b.api_key_env.clone())
        .unwrap_or_else(|| kind.default_api_key_env().to_string());
    let max_tokens = configured.and_then(|b| b.max_tokens).or(base.max_tokens);

    let api_key = env(&api_key_env)
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .ok_or_else(|| crate::providers::ProviderError::MissingApiKey {
            backend: name.to_string(),
            env: api_key_env.clone(),
        })?;

    Ok(BackendSpec {
        name: name.to_string(),
        kind,
        model,
        base_url,
        api_key,
        max_tokens,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env_with(key: &'static str, value: &'static str) -> impl Fn(&str) -> Option<String> {
        move |k: &str| (k == key).then(|| value.to_string())
    }

    #[test]
    fn builtin_deepseek_uses_openai_protocol() {
        let cfg = AppConfig::default();
        let spec = resolve_backend(&cfg, "deepseek-chat", &env_with("DEEPSEEK_API_KEY", "sk-1"))
            .expect("resolve");
        assert_eq!(spec.kind, ProviderKind::OpenAi);
        assert_eq!(spec.base_url, "https://api.deepseek.com");
        assert_eq!(spec.model, "deepseek-chat");
        assert_eq!(spec.api_key, "sk-1");
    }

    #[test]
    fn config_overrides_builtin_fields() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [models.backends."claude-3-7-sonnet-latest"]
            max_tokens = 4000
            api_key_env = "MY_CLAUDE_KEY"
            "#,
        )
        .expect("toml");
        let spec = resolve_backend(
            &cfg,
            "claude-3-7-sonnet-latest",
            &env_with("MY_CLAUDE_KEY", "k"),
        )
        .expect("resolve");
        assert_eq!(spec.kind, ProviderKind::Anthropic);
        assert_eq!(spec.max_tokens, Some(4000));
        assert_eq!(spec.base_url, "https://api.anthropic.com/v1");
    }

    #[test]
    fn custom_backend_needs_provider_and_key() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [models.backends.mistral]
            provider = "openai"
            model = "mistral-large-latest"
            base_url = "https://api.mistral.ai/v1"
            api_key_env = "MISTRAL_API_KEY"
            "#,
        )
        .expect("toml");
        let spec = resolve_backend(&cfg, "mistral", &env_with("MISTRAL_API_KEY", "m"))
            .expect("resolve");
        assert_eq!(spec.model, "mistral-large-latest");

        let err = resolve_backend(&cfg, "mistral", &|_: &str| None::<String>).unwrap_err();
        assert!(format!("{err:#}").contains("MISTRAL_API_KEY"));

        assert!(resolve_backend(&cfg, "unknown", &|_: &str| Some("k".to_string())).is_err());
    }

    #[test]
    fn finds_config_in_parent_dirs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).expect("mkdir");
        std::fs::write(dir.path().join(CONFIG_FILENAME), "").expect("write");
        assert_eq!(
            find_file_upwards(&nested, CONFIG_FILENAME, 8),
            Some(dir.path().join(CONFIG_FILENAME))
        );
        assert_eq!(find_file_upwards(&nested, CONFIG_FILENAME, 1), None);
    }
}
