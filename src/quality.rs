use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

static DIGIT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("digit regex"));
static URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"https?://[^\s<>()\[\]"]+"#).expect("url regex"));
static BBCODE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[(/?)([A-Za-z][A-Za-z0-9*]{0,15})(?:=[^\]\r\n]{0,256})?\]").expect("bbcode regex")
});
static LETTER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\p{L}").expect("letter regex"));

const IDENTICAL_MIN_LETTERS: usize = 20;

/// Checks that a translation kept the parts of a forum post that must survive
/// verbatim: links, BB-code, emojis and numbers.
///
/// Returns an empty list for a clean translation.
#[must_use]
pub fn preservation_flags(source: &str, translated: &str) -> Vec<String> {
    if translated.trim().is_empty() {
        return vec!["empty_output".to_string()];
    }

    let mut flags: Vec<String> = Vec::new();

    let src_urls = counter(URL_RE.find_iter(source).map(|m| trim_url(m.as_str())));
    let tgt_urls = counter(URL_RE.find_iter(translated).map(|m| trim_url(m.as_str())));
    let mut missing: Vec<&String> = src_urls
        .iter()
        .filter(|(url, cnt)| tgt_urls.get(*url).copied().unwrap_or(0) < **cnt)
        .map(|(url, _)| url)
        .collect();
    missing.sort();
    for url in missing {
        flags.push(format!("url_missing:{url}"));
    }

    if bbcode_tags(source) != bbcode_tags(translated) {
        flags.push("bbcode_mismatch".to_string());
    }
    if emoji_count(source) != emoji_count(translated) {
        flags.push("emoji_count_mismatch".to_string());
    }
    if counter(DIGIT_RE.find_iter(source).map(|m| m.as_str().to_string()))
        != counter(DIGIT_RE.find_iter(translated).map(|m| m.as_str().to_string()))
    {
        flags.push("digits_mismatch".to_string());
    }
    if LETTER_RE.find_iter(source).count() >= IDENTICAL_MIN_LETTERS
        && source.trim() == translated.trim()
    {
        flags.push("output_identical_to_source".to_string());
    }
    flags
}

fn trim_url(url: &str) -> String {
    url.trim_end_matches(['.', ',', ';', ':', '!', '?'])
        .to_string()
}

fn bbcode_tags(text: &str) -> HashMap<String, usize> {
    counter(BBCODE_RE.captures_iter(text).map(|caps| {
        let close = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        let name = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        format!("{close}{}", name.to_ascii_lowercase())
    }))
}

fn emoji_count(text: &str) -> usize {
    text.chars().filter(|&ch| is_emoji(ch)).count()
}

fn is_emoji(ch: char) -> bool {
    matches!(ch as u32,
        0x1F300..=0x1F5FF
        | 0x1F600..=0x1F64F
        | 0x1F680..=0x1F6FF
        | 0x1F900..=0x1F9FF
        | 0x1FA70..=0x1FAFF
        | 0x2600..=0x26FF
        | 0x2700..=0x27BF)
}

fn counter(items: impl IntoIterator<Item = String>) -> HashMap<String, usize> {
    let mut map: HashMap<String, usize> = HashMap::new();
    for item in items {
        *map.entry(item).or_insert(0) += 1;
    }
    map
}
