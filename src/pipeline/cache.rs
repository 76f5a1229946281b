use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::forum::{read_json_text, TokenUsage};
use crate::providers::TranslationOutput;

#[derive(Clone, Debug, Serialize, Deserialize)]
struct CacheEntry {
    model: String,
    text: String,
    #[serde(default)]
    tokens: TokenUsage,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheFile {
    #[serde(default)]
    entries: BTreeMap<String, CacheEntry>,
}

/// Successful translations keyed by (backend, prompt, source text), persisted
/// as JSON so reruns do not pay twice for the same input.
pub struct TranslationCache {
    path: Option<PathBuf>,
    file: CacheFile,
    dirty: bool,
}

impl TranslationCache {
    pub fn disabled() -> Self {
        Self {
            path: None,
            file: CacheFile::default(),
            dirty: false,
        }
    }

    /// An unreadable cache is treated as empty; it is only an optimisation.
    pub fn open(path: &Path) -> Self {
        let file = if path.exists() {
            read_json_text(path)
                .ok()
                .and_then(|text| serde_json::from_str(&text).ok())
                .unwrap_or_default()
        } else {
            CacheFile::default()
        };
        Self {
            path: Some(path.to_path_buf()),
            file,
            dirty: false,
        }
    }

    pub fn len(&self) -> usize {
        self.file.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.file.entries.is_empty()
    }

    pub fn get(&self, model: &str, prompt: &str, source: &str) -> Option<TranslationOutput> {
        self.path.as_ref()?;
        self.file
            .entries
            .get(&cache_key(model, prompt, source))
            .map(|e| TranslationOutput {
                text: e.text.clone(),
                tokens: e.tokens,
            })
    }

    pub fn insert(&mut self, model: &str, prompt: &str, source: &str, out: &TranslationOutput) {
        if self.path.is_none() || out.text.trim().is_empty() {
            return;
        }
        self.file.entries.insert(
            cache_key(model, prompt, source),
            CacheEntry {
                model: model.to_string(),
                text: out.text.clone(),
                tokens: out.tokens,
            },
        );
        self.dirty = true;
    }

    pub fn flush(&mut self) -> anyhow::Result<()> {
        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };
        if !self.dirty {
            return Ok(());
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create cache dir: {}", parent.display()))?;
        }
        let json = serde_json::to_string(&self.file).context("serialize cache")?;
        std::fs::write(path, json).with_context(|| format!("write cache: {}", path.display()))?;
        self.dirty = false;
        Ok(())
    }
}

pub fn cache_key(model: &str, prompt: &str, source: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(model.as_bytes());
    hasher.update([0u8]);
    hasher.update(prompt.as_bytes());
    hasher.update([0u8]);
    hasher.update(source.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(text: &str) -> TranslationOutput {
        TranslationOutput {
            text: text.to_string(),
            tokens: TokenUsage::new(1, 2, 3),
        }
    }

    #[test]
    fn key_separates_fields() {
        assert_ne!(cache_key("ab", "c", "d"), cache_key("a", "bc", "d"));
        assert_eq!(cache_key("m", "p", "s").len(), 64);
    }

    #[test]
    fn persists_successful_entries_only() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("cache.json");

        let mut cache = TranslationCache::open(&path);
        cache.insert("gpt-4o", "P", "Hej", &output("Hi"));
        cache.insert("gpt-4o", "P", "Tom", &output("  "));
        cache.flush().expect("flush");

        let reopened = TranslationCache::open(&path);
        assert_eq!(reopened.len(), 1);
        assert_eq!(reopened.get("gpt-4o", "P", "Hej"), Some(output("Hi")));
        assert_eq!(reopened.get("gpt-4o", "other prompt", "Hej"), None);
    }

    #[test]
    fn corrupt_cache_opens_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("cache.json");
        std::fs::write(&path, "not json").expect("write");
        assert!(TranslationCache::open(&path).is_empty());
    }

    #[test]
    fn disabled_cache_never_hits() {
        let mut cache = TranslationCache::disabled();
        cache.insert("m", "p", "s", &output("x"));
        assert_eq!(cache.get("m", "p", "s"), None);
        cache.flush().expect("noop");
    }
}
