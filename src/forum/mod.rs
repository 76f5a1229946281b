pub mod model;
pub mod store;

pub use model::{
    ForumId, SourcePost, SourceThread, Timestamp, TokenUsage, TranslatedPost, TranslatedThread,
    Translation, TranslationMap,
};
pub use store::{load_source_threads, load_translations, read_json_text, save_translations};
