mod cache;
mod config;
mod prompts;
mod select;
mod trace;
mod translator;

pub use cache::TranslationCache;
pub use config::{
    init_default_config, locate_config, translations_path, PipelineConfig, TranslateOverrides,
    DEFAULT_OUTPUT,
};
pub use select::{filter_by_post_count, sample_threads};
pub use translator::{RunSummary, ThreadTranslator};
