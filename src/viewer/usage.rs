use std::collections::BTreeMap;

use crate::forum::TranslatedThread;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ModelUsage {
    pub model: String,
    pub translations: usize,
    pub failures: usize,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    /// Entries answered from the cache, which spent no tokens.
    pub cached: usize,
    /// Fresh entries whose provider reported no token counts.
    pub without_usage: usize,
}

/// Per-model totals, sorted by model name.
pub fn summarize_usage(threads: &[TranslatedThread]) -> Vec<ModelUsage> {
    let mut by_model: BTreeMap<&str, ModelUsage> = BTreeMap::new();
    for (model, t) in threads.iter().flat_map(|t| t.translations()) {
        let row = by_model.entry(model.as_str()).or_insert_with(|| ModelUsage {
            model: model.clone(),
            ..ModelUsage::default()
        });
        if t.is_failed() {
            row.failures += 1;
            continue;
        }
        row.translations += 1;
        if t.cached {
            row.cached += 1;
            continue;
        }
        if t.tokens.is_empty() {
            row.without_usage += 1;
        }
        row.prompt_tokens += t.tokens.prompt_tokens.unwrap_or(0);
        row.completion_tokens += t.tokens.completion_tokens.unwrap_or(0);
        row.total_tokens += t.tokens.total_tokens.unwrap_or(0);
    }
    by_model.into_values().collect()
}

pub fn render_usage_table(rows: &[ModelUsage]) -> String {
    if rows.is_empty() {
        return "No translations found.\n".to_string();
    }
    let name_width = rows
        .iter()
        .map(|r| r.model.chars().count())
        .max()
        .unwrap_or(0)
        .max("Model".len());
    let mut out = format!(
        "{:<name_width$}  {:>12}  {:>8}  {:>6}  {:>13}  {:>17}  {:>12}  {:>8}\n",
        "Model",
        "Translations",
        "Failures",
        "Cached",
        "Prompt tokens",
        "Completion tokens",
        "Total tokens",
        "No usage"
    );
    for r in rows {
        out.push_str(&format!(
            "{:<name_width$}  {:>12}  {:>8}  {:>6}  {:>13}  {:>17}  {:>12}  {:>8}\n",
            r.model,
            r.translations,
            r.failures,
            r.cached,
            r.prompt_tokens,
            r.completion_tokens,
            r.total_tokens,
            r.without_usage
        ));
    }
    out
}
