use std::collections::HashSet;

use anyhow::Context;

use crate::forum::{
    load_source_threads, load_translations, save_translations, ForumId, SourceThread,
    TranslatedThread, Translation, TranslationMap,
};
use crate::progress::ConsoleProgress;
use crate::providers::{build_backend, JsonClient, TranslationBackend};
use crate::quality::preservation_flags;
use crate::textutil::clip_for_log;

use super::cache::TranslationCache;
use super::select::{filter_by_post_count, sample_threads};
use super::trace::TraceWriter;
use super::PipelineConfig;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub selected: usize,
    pub translated_threads: usize,
    pub calls: usize,
    pub failures: usize,
    pub cache_hits: usize,
}

pub struct ThreadTranslator {
    cfg: PipelineConfig,
    backends: Vec<Box<dyn TranslationBackend>>,
    progress: ConsoleProgress,
    trace: TraceWriter,
    cache: TranslationCache,
    summary: RunSummary,
}

impl ThreadTranslator {
    /// Builds HTTP backends for every configured model, reading API keys from
    /// the process environment.
    pub fn from_config(cfg: PipelineConfig, progress: ConsoleProgress) -> anyhow::Result<Self> {
        let specs = cfg.backend_specs(&|k: &str| std::env::var(k).ok())?;
        let client = JsonClient::new(cfg.http).context("build HTTP client")?;
        let backends = specs
            .iter()
            .map(|spec| {
                progress.info(format!(
                    "Backend {}: {} model={} ({})",
                    spec.name, spec.kind, spec.model, spec.base_url
                ));
                build_backend(spec, &client)
            })
            .collect();
        Self::new(cfg, backends, progress)
    }

    pub fn new(
        cfg: PipelineConfig,
        backends: Vec<Box<dyn TranslationBackend>>,
        progress: ConsoleProgress,
    ) -> anyhow::Result<Self> {
        let trace = if cfg.trace_prompts {
            TraceWriter::new(cfg.trace_dir.clone(), true)?
        } else {
            TraceWriter::disabled()
        };
        let cache = match cfg.cache_file.as_ref() {
            Some(p) => {
                let cache = TranslationCache::open(p);
                progress.info(format!("Cache: {} ({} entries)", p.display(), cache.len()));
                cache
            }
            None => TranslationCache::disabled(),
        };
        Ok(Self {
            cfg,
            backends,
            progress,
            trace,
            cache,
            summary: RunSummary::default(),
        })
    }

    pub fn run(&mut self) -> anyhow::Result<RunSummary> {
        let existing = self.load_existing()?;
        if self.cfg.retry_failed {
            return self.retry_failed(existing);
        }
        let sources = load_source_threads(&self.cfg.inputs, &self.progress);
        self.run_with_sources(existing, sources)
    }

    fn load_existing(&self) -> anyhow::Result<Vec<TranslatedThread>> {
        let existing = load_translations(&self.cfg.output).with_context(|| {
            format!(
                "existing translations are unreadable; fix or move {} before resuming",
                self.cfg.output.display()
            )
        })?;
        if existing.is_empty() {
            self.progress
                .info("No existing translations file found, starting fresh");
        } else {
            self.progress.info(format!(
                "Loaded {} translated threads from {}",
                existing.len(),
                self.cfg.output.display()
            ));
        }
        Ok(existing)
    }

    /// Samples untranslated threads from `sources` and appends their
    /// translations to `existing`, saving after every thread.
    pub fn run_with_sources(
        &mut self,
        mut existing: Vec<TranslatedThread>,
        sources: Vec<SourceThread>,
    ) -> anyhow::Result<RunSummary> {
        let pool = filter_by_post_count(sources, self.cfg.min_posts, self.cfg.max_posts);
        if pool.is_empty() {
            self.progress.warn("No valid threads found in the data files!");
            return Ok(self.summary.clone());
        }
        self.progress.info(format!(
            "Found {} threads with {}-{} posts",
            pool.len(),
            self.cfg.min_posts,
            self.cfg.max_posts
        ));

        let done: HashSet<ForumId> = existing.iter().map(|t| t.id.clone()).collect();
        let selected = sample_threads(pool, &done, self.cfg.sample_size, self.cfg.seed);
        self.summary.selected = selected.len();
        if selected.is_empty() {
            self.progress
                .info("Every eligible thread is already translated");
            return Ok(self.summary.clone());
        }

        let total = selected.len();
        for (i, source) in selected.iter().enumerate() {
            self.progress.info(format!(
                "Processing thread {} of {} (Thread ID: {}, Posts: {})",
                i + 1,
                total,
                source.id,
                source.posts.len()
            ));
            if let Some(date) = source.last_post_date.as_ref() {
                self.progress.info(format!("Thread date: {date}"));
            }
            let mut thread = TranslatedThread::from_source(source);
            self.fill_thread(&mut thread, false);
            existing.push(thread);
            self.summary.translated_threads += 1;
            self.save(&existing)?;
        }
        Ok(self.summary.clone())
    }

    /// Re-translates failed or missing entries (including models never run on
    /// a thread) in place. No new threads are sampled.
    pub fn retry_failed(&mut self, mut existing: Vec<TranslatedThread>) -> anyhow::Result<RunSummary> {
        let models: Vec<String> = self.backends.iter().map(|b| b.name().to_string()).collect();
        let pending: Vec<usize> = existing
            .iter()
            .enumerate()
            .filter(|(_, t)| thread_needs_work(t, &models))
            .map(|(i, _)| i)
            .collect();
        self.summary.selected = pending.len();
        if pending.is_empty() {
            self.progress.info("Nothing to retry");
            return Ok(self.summary.clone());
        }
        let total = pending.len();
        for (n, idx) in pending.into_iter().enumerate() {
            self.progress.info(format!(
                "Retrying thread {} of {} (Thread ID: {})",
                n + 1,
                total,
                existing[idx].id
            ));
            self.fill_thread(&mut existing[idx], true);
            self.summary.translated_threads += 1;
            self.save(&existing)?;
        }
        Ok(self.summary.clone())
    }

    /// Translates the title and every post with every backend. With
    /// `only_gaps`, entries that already hold a good translation are kept.
    fn fill_thread(&mut self, thread: &mut TranslatedThread, only_gaps: bool) {
        let thread_id = thread.id.to_string();

        self.progress.info("Translating thread title...");
        let title = thread.title.clone();
        self.fill_map(&mut thread.title_translations, &thread_id, "title", &title, only_gaps);

        let total = thread.posts.len();
        for (j, post) in thread.posts.iter_mut().enumerate() {
            self.progress.progress("Post", j + 1, total);
            let unit = format!("post_{}", post.position);
            let message = post.message.clone();
            self.fill_map(&mut post.message_translations, &thread_id, &unit, &message, only_gaps);
        }
    }

    fn fill_map(
        &mut self,
        map: &mut TranslationMap,
        thread_id: &str,
        unit: &str,
        source: &str,
        only_gaps: bool,
    ) {
        for idx in 0..self.backends.len() {
            let name = self.backends[idx].name().to_string();
            if only_gaps && !entry_needs_work(map.get(&name), source) {
                continue;
            }
            let translation = self.translate_with(idx, thread_id, unit, source);
            map.insert(name, translation);
        }
    }

    /// Never fails: provider errors are recorded on the returned translation.
    fn translate_with(&mut self, idx: usize, thread_id: &str, unit: &str, source: &str) -> Translation {
        if source.trim().is_empty() {
            return Translation::default();
        }
        let backend = &self.backends[idx];
        let name = backend.name();
        let prompt = self.cfg.system_prompt.as_str();

        if let Some(hit) = self.cache.get(name, prompt, source) {
            self.summary.cache_hits += 1;
            return Translation {
                flags: preservation_flags(source, &hit.text),
                text: hit.text,
                cached: true,
                ..Translation::default()
            };
        }

        self.summary.calls += 1;
        let result = backend.translate(prompt, source);
        let traced = match &result {
            Ok(out) => out.text.clone(),
            Err(err) => format!("ERROR: {err}"),
        };
        if let Err(err) = self
            .trace
            .write_call(thread_id, unit, name, prompt, source, &traced)
        {
            self.progress.warn(format!("trace: {err:#}"));
        }

        match result {
            Ok(out) => {
                if out.tokens.is_empty() {
                    self.progress
                        .warn(format!("Could not extract token usage from {name}"));
                }
                let flags = preservation_flags(source, &out.text);
                if !flags.is_empty() {
                    self.progress.warn(format!(
                        "{name} {unit}: {} ({})",
                        flags.join(", "),
                        clip_for_log(&out.text, self.cfg.log_max_chars)
                    ));
                }
                self.cache.insert(name, prompt, source, &out);
                Translation {
                    text: out.text,
                    tokens: out.tokens,
                    flags,
                    ..Translation::default()
                }
            }
            Err(err) => {
                self.summary.failures += 1;
                self.progress
                    .warn(format!("Error translating with {name}: {err}"));
                Translation::failed(err.to_string())
            }
        }
    }

    fn save(&mut self, threads: &[TranslatedThread]) -> anyhow::Result<()> {
        save_translations(&self.cfg.output, threads)?;
        self.progress.info(format!(
            "Progress saved to {}",
            self.cfg.output.display()
        ));
        if let Err(err) = self.cache.flush() {
            self.progress.warn(format!("cache: {err:#}"));
        }
        Ok(())
    }
}

fn entry_needs_work(entry: Option<&Translation>, source: &str) -> bool {
    match entry {
        None => true,
        Some(t) => t.needs_retry() && (t.is_failed() || !source.trim().is_empty()),
    }
}

fn thread_needs_work(thread: &TranslatedThread, models: &[String]) -> bool {
    models.iter().any(|m| {
        entry_needs_work(thread.title_translations.get(m), &thread.title)
            || thread
                .posts
                .iter()
                .any(|p| entry_needs_work(p.message_translations.get(m), &p.message))
    })
}
