use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context};

use crate::config::{
    find_default_config, load_config, resolve_backend, AppConfig, CONFIG_ENV, CONFIG_FILENAME,
    DEFAULT_MODELS,
};
use crate::pipeline::prompts::{
    default_prompt_files, load_translate_prompt, render_template, DEFAULT_PROMPTS_DIR,
};
use crate::providers::{BackendSpec, HttpSettings};

pub const DEFAULT_INPUTS: [&str; 3] = [
    "data/threads-random-a.json",
    "data/threads-random-b.json",
    "data/threads-random-c.json",
];
pub const DEFAULT_OUTPUT: &str = "translated_threads.json";

/// Command-line values that win over the config file.
#[derive(Clone, Debug, Default)]
pub struct TranslateOverrides {
    pub config: Option<PathBuf>,
    pub inputs: Vec<PathBuf>,
    pub output: Option<PathBuf>,
    pub models: Vec<String>,
    pub sample_size: Option<usize>,
    pub seed: Option<u64>,
    pub min_posts: Option<usize>,
    pub max_posts: Option<usize>,
    pub retry_failed: bool,
    pub no_cache: bool,
}

#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub config_path: Option<PathBuf>,
    pub app: AppConfig,

    pub inputs: Vec<PathBuf>,
    pub output: PathBuf,
    pub models: Vec<String>,

    pub sample_size: usize,
    pub min_posts: usize,
    pub max_posts: usize,
    pub seed: Option<u64>,
    pub retry_failed: bool,

    pub source_lang: String,
    pub target_lang: String,
    /// Translate prompt with the language pair filled in.
    pub system_prompt: String,

    pub cache_file: Option<PathBuf>,
    pub trace_dir: PathBuf,
    pub trace_prompts: bool,
    pub log_max_chars: usize,
    pub http: HttpSettings,
}

impl PipelineConfig {
    pub fn from_args(args: TranslateOverrides) -> anyhow::Result<Self> {
        let cfg_file = locate_config(args.config.clone());
        let app = match cfg_file.as_ref() {
            Some(p) if p.exists() => load_config(p)?,
            Some(p) if args.config.is_some() => {
                return Err(anyhow!("config not found: {}", p.display()));
            }
            _ => AppConfig::default(),
        };
        let cfg_file = cfg_file.filter(|p| p.exists());
        Self::resolve(cfg_file, app, args)
    }

    pub fn resolve(
        config_path: Option<PathBuf>,
        app: AppConfig,
        args: TranslateOverrides,
    ) -> anyhow::Result<Self> {
        let base_dir = config_path
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let relative_to_config = |s: &str| -> PathBuf {
            let p = PathBuf::from(s);
            if p.is_relative() {
                base_dir.join(p)
            } else {
                p
            }
        };
        let p = &app.pipeline;

        let inputs: Vec<PathBuf> = if !args.inputs.is_empty() {
            args.inputs.clone()
        } else {
            match p.inputs.as_ref() {
                Some(list) => list.iter().map(|s| relative_to_config(s)).collect(),
                None => DEFAULT_INPUTS.iter().map(|s| relative_to_config(s)).collect(),
            }
        };
        let output = args
            .output
            .clone()
            .unwrap_or_else(|| relative_to_config(p.output.as_deref().unwrap_or(DEFAULT_OUTPUT)));

        let mut models: Vec<String> = if !args.models.is_empty() {
            args.models.clone()
        } else {
            p.models
                .clone()
                .unwrap_or_else(|| DEFAULT_MODELS.iter().map(|s| s.to_string()).collect())
        };
        models.retain(|m| !m.trim().is_empty());
        let mut seen = std::collections::HashSet::new();
        models.retain(|m| seen.insert(m.clone()));
        if models.is_empty() {
            return Err(anyhow!("no translation models configured"));
        }

        let min_posts = args.min_posts.or(p.min_posts).unwrap_or(5);
        let max_posts = args.max_posts.or(p.max_posts).unwrap_or(20);
        if min_posts > max_posts {
            return Err(anyhow!(
                "min_posts ({min_posts}) must not exceed max_posts ({max_posts})"
            ));
        }

        let source_lang = p.source_lang.clone().unwrap_or_else(|| "Swedish".to_string());
        let target_lang = p.target_lang.clone().unwrap_or_else(|| "English".to_string());
        let template = load_translate_prompt(config_path.as_deref(), &app).context("load prompt")?;
        let system_prompt = render_template(
            &template,
            &[("source_lang", &source_lang), ("target_lang", &target_lang)],
        )
        .trim()
        .to_string();

        let cache_file = if args.no_cache {
            None
        } else {
            p.cache_file
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| relative_to_config(s))
        };
        let trace_dir = relative_to_config(p.trace_dir.as_deref().unwrap_or("_trace"));

        let http = HttpSettings {
            timeout: Duration::from_secs(p.request_timeout_secs.unwrap_or(120).max(1)),
            max_attempts: p.max_attempts.unwrap_or(3).max(1),
            ..HttpSettings::default()
        };

        Ok(Self {
            config_path,
            inputs,
            output,
            models,
            sample_size: args.sample_size.or(p.sample_size).unwrap_or(10),
            min_posts,
            max_posts,
            seed: args.seed.or(p.seed),
            retry_failed: args.retry_failed,
            source_lang,
            target_lang,
            system_prompt,
            cache_file,
            trace_dir,
            trace_prompts: p.trace_prompts.unwrap_or(false),
            log_max_chars: p.log_max_chars.unwrap_or(240).max(16),
            http,
            app,
        })
    }

    /// Resolves every selected backend, failing on the first missing key.
    pub fn backend_specs(
        &self,
        env: &dyn Fn(&str) -> Option<String>,
    ) -> anyhow::Result<Vec<BackendSpec>> {
        self.models
            .iter()
            .map(|name| resolve_backend(&self.app, name, env))
            .collect()
    }
}

/// `--config`, then `$THREAD_TRANSLATIONS_CONFIG`, then an upward search.
pub fn locate_config(explicit: Option<PathBuf>) -> Option<PathBuf> {
    explicit
        .or_else(|| std::env::var(CONFIG_ENV).ok().map(PathBuf::from))
        .or_else(|| find_default_config(CONFIG_FILENAME))
}

/// Translations file for the viewer commands: explicit path, else the
/// configured `output`, else the default name in the working directory.
pub fn translations_path(explicit: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    if let Some(p) = explicit {
        return Ok(p);
    }
    let Some(cfg_path) = locate_config(None).filter(|p| p.exists()) else {
        return Ok(PathBuf::from(DEFAULT_OUTPUT));
    };
    let app = load_config(&cfg_path)?;
    let output = PathBuf::from(app.pipeline.output.as_deref().unwrap_or(DEFAULT_OUTPUT));
    if output.is_relative() {
        let base = cfg_path.parent().map(Path::to_path_buf).unwrap_or_default();
        return Ok(base.join(output));
    }
    Ok(output)
}

pub fn init_default_config(dir: &Path, force: bool) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("create config dir: {}", dir.display()))?;
    let cfg_path = dir.join(CONFIG_FILENAME);

    let prompts_dir = dir.join(DEFAULT_PROMPTS_DIR);
    std::fs::create_dir_all(&prompts_dir)
        .with_context(|| format!("create prompts dir: {}", prompts_dir.display()))?;

    for (fname, body) in default_prompt_files() {
        let p = prompts_dir.join(fname);
        if p.exists() && !force {
            continue;
        }
        std::fs::write(&p, body).with_context(|| format!("write prompt: {}", p.display()))?;
    }

    if cfg_path.exists() && !force {
        return Ok(cfg_path);
    }
    std::fs::write(&cfg_path, DEFAULT_CONFIG_TOML)
        .with_context(|| format!("write config: {}", cfg_path.display()))?;
    Ok(cfg_path)
}

const DEFAULT_CONFIG_TOML: &str = r#"[pipeline]
inputs = [
  "data/threads-random-a.json",
  "data/threads-random-b.json",
  "data/threads-random-c.json",
]
output = "translated_threads.json"
models = ["gpt-4o", "claude-3-7-sonnet-latest", "gemini-2.0-flash-exp", "deepseek-chat"]

# Only threads with min_posts..=max_posts posts are eligible; sample_size of them
# are drawn per run, skipping threads already in `output`.
sample_size = 10
min_posts = 5
max_posts = 20
# seed = 42

source_lang = "Swedish"
target_lang = "English"

cache_file = ".translation-cache.json"
trace_dir = "_trace"
trace_prompts = false
log_max_chars = 240

request_timeout_secs = 120
max_attempts = 3

[prompts]
translate = "prompts/translate.txt"

# API keys are read from the environment (or a .env file next to where you run).
[models.backends."gpt-4o"]
provider = "openai"
api_key_env = "OPENAI_API_KEY"

[models.backends."claude-3-7-sonnet-latest"]
provider = "anthropic"
api_key_env = "ANTHROPIC_API_KEY"
max_tokens = 1000

[models.backends."gemini-2.0-flash-exp"]
provider = "gemini"
api_key_env = "GOOGLE_API_KEY"

# DeepSeek speaks the OpenAI protocol.
[models.backends."deepseek-chat"]
provider = "openai"
base_url = "https://api.deepseek.com"
api_key_env = "DEEPSEEK_API_KEY"
"#;
