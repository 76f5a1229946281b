use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};

use crate::config::AppConfig;

pub const DEFAULT_PROMPTS_DIR: &str = "prompts";
pub const DEFAULT_TRANSLATE: &str = "translate.txt";

pub const DEFAULT_TRANSLATE_TEXT: &str = r#"Translate the text from {{source_lang}} to {{target_lang}}.

- Reply with the translated text only, no comments or explanations.
- Keep links, BB-code, emojis and quotes exactly as they are.
- If a {{source_lang}} word has no good {{target_lang}} translation, leave it unchanged.
"#;

/// Loads the translate prompt named in config. Without a config file (or when
/// the config names no prompt and the default file is absent) the built-in
/// prompt is used.
pub fn load_translate_prompt(config_path: Option<&Path>, cfg: &AppConfig) -> anyhow::Result<String> {
    let config_dir = config_path
        .and_then(|p| p.parent())
        .unwrap_or_else(|| Path::new("."));
    let explicit = cfg.prompts.translate.clone();
    let rel = explicit
        .clone()
        .unwrap_or_else(|| format!("{DEFAULT_PROMPTS_DIR}/{DEFAULT_TRANSLATE}"));
    let mut path = PathBuf::from(rel);
    if path.is_relative() {
        path = config_dir.join(&path);
    }
    if !path.exists() {
        if explicit.is_some() {
            return Err(anyhow!(
                "prompt file not found: {} (run: thread-translations init-config)",
                path.display()
            ));
        }
        return Ok(DEFAULT_TRANSLATE_TEXT.to_string());
    }
    std::fs::read_to_string(&path).with_context(|| format!("read prompt: {}", path.display()))
}

pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (k, v) in vars {
        let pat = format!("{{{{{k}}}}}");
        out = out.replace(&pat, v);
    }
    out
}

pub fn default_prompt_files() -> Vec<(&'static str, &'static str)> {
    vec![(DEFAULT_TRANSLATE, DEFAULT_TRANSLATE_TEXT)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_language_pair() {
        let out = render_template(
            DEFAULT_TRANSLATE_TEXT,
            &[("source_lang", "Swedish"), ("target_lang", "English")],
        );
        assert!(out.starts_with("Translate the text from Swedish to English."));
        assert!(out.contains("If a Swedish word has no good English translation"));
        assert!(!out.contains("{{"));
    }

    #[test]
    fn missing_default_prompt_falls_back_but_explicit_one_errors() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg_path = dir.path().join("thread-translations.toml");

        let cfg = AppConfig::default();
        let text = load_translate_prompt(Some(&cfg_path), &cfg).expect("fallback");
        assert_eq!(text, DEFAULT_TRANSLATE_TEXT);

        let mut cfg = AppConfig::default();
        cfg.prompts.translate = Some("prompts/custom.txt".to_string());
        assert!(load_translate_prompt(Some(&cfg_path), &cfg).is_err());

        std::fs::create_dir_all(dir.path().join("prompts")).expect("mkdir");
        std::fs::write(dir.path().join("prompts/custom.txt"), "Be brief.").expect("write");
        assert_eq!(
            load_translate_prompt(Some(&cfg_path), &cfg).expect("custom"),
            "Be brief."
        );
    }
}
