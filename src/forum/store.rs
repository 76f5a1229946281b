use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use encoding_rs::{Encoding, UTF_8};

use crate::progress::ConsoleProgress;

use super::model::{ForumId, SourceDump, SourceThread, TranslatedThread};

/// Reads a text file, honouring a UTF-8/UTF-16 BOM when present.
pub fn read_json_text(path: &Path) -> anyhow::Result<String> {
    let bytes = std::fs::read(path).with_context(|| format!("read: {}", path.display()))?;
    let (encoding, bom_len) = Encoding::for_bom(&bytes).unwrap_or((UTF_8, 0));
    let (text, had_errors) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
    if had_errors {
        return Err(anyhow!(
            "invalid {} text: {}",
            encoding.name(),
            path.display()
        ));
    }
    Ok(text.into_owned())
}

/// Loads every dump; unreadable files are skipped with a warning. The first
/// occurrence of a thread id wins.
pub fn load_source_threads(paths: &[PathBuf], progress: &ConsoleProgress) -> Vec<SourceThread> {
    let mut seen: HashSet<ForumId> = HashSet::new();
    let mut threads: Vec<SourceThread> = Vec::new();
    for path in paths {
        let dump = match read_source_dump(path) {
            Ok(d) => d,
            Err(err) => {
                progress.warn(format!("Skipping {}: {err:#}", path.display()));
                continue;
            }
        };
        let total = dump.threads.len();
        let mut dupes = 0usize;
        for thread in dump.threads {
            if seen.insert(thread.id.clone()) {
                threads.push(thread);
            } else {
                dupes += 1;
            }
        }
        progress.info(format!(
            "Read {} threads from {} ({} duplicates)",
            total,
            path.display(),
            dupes
        ));
    }
    threads
}

fn read_source_dump(path: &Path) -> anyhow::Result<SourceDump> {
    let text = read_json_text(path)?;
    serde_json::from_str(&text).with_context(|| format!("parse dump: {}", path.display()))
}

/// A missing file is an empty list; a file that exists but does not parse is an error.
pub fn load_translations(path: &Path) -> anyhow::Result<Vec<TranslatedThread>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let text = read_json_text(path)?;
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(&text)
        .with_context(|| format!("parse translations: {}", path.display()))
}

pub fn save_translations(path: &Path, threads: &[TranslatedThread]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir: {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(threads).context("serialize translations")?;
    let tmp = tmp_path_for(path);
    std::fs::write(&tmp, json).with_context(|| format!("write: {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("rename {} -> {}", tmp.display(), path.display()))?;
    Ok(())
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("translations.json");
    path.with_file_name(format!(".{name}.tmp"))
}
