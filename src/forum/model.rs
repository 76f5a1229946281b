use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Forum identifiers show up as numbers in some dumps and as strings in others.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ForumId {
    Num(i64),
    Text(String),
}

impl ForumId {
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        match s.parse::<i64>() {
            Ok(n) => Self::Num(n),
            Err(_) => Self::Text(s.to_string()),
        }
    }
}

impl fmt::Display for ForumId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Num(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Timestamp {
    Unix(i64),
    Text(String),
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unix(secs) => match chrono::DateTime::from_timestamp(*secs, 0) {
                Some(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M")),
                None => write!(f, "{secs}"),
            },
            Self::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct SourceDump {
    #[serde(default)]
    pub threads: Vec<SourceThread>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SourceThread {
    pub id: ForumId,
    pub title: String,
    #[serde(default)]
    pub post_date: Option<Timestamp>,
    #[serde(default)]
    pub last_post_date: Option<Timestamp>,
    #[serde(default)]
    pub forum_id: Option<ForumId>,
    #[serde(default)]
    pub forum_title: Option<String>,
    #[serde(default)]
    pub posts: Vec<SourcePost>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SourcePost {
    pub id: ForumId,
    pub position: u32,
    #[serde(default)]
    pub post_date: Option<Timestamp>,
    #[serde(default)]
    pub user_id: Option<ForumId>,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub message: String,
}

/// Token counts as reported by the provider. Providers that report nothing
/// serialize as `{}`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
}

impl TokenUsage {
    pub fn new(prompt: u64, completion: u64, total: u64) -> Self {
        Self {
            prompt_tokens: Some(prompt),
            completion_tokens: Some(completion),
            total_tokens: Some(total),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.prompt_tokens.is_none() && self.completion_tokens.is_none() && self.total_tokens.is_none()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Translation {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub tokens: TokenUsage,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Text came from the local cache; `tokens` is left empty since nothing was spent.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub cached: bool,
}

impl Translation {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn is_missing(&self) -> bool {
        self.text.trim().is_empty()
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    pub fn needs_retry(&self) -> bool {
        self.is_failed() || self.is_missing()
    }
}

/// Model name -> translation.
pub type TranslationMap = BTreeMap<String, Translation>;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TranslatedThread {
    pub id: ForumId,
    pub title: String,
    #[serde(rename = "title_english", default)]
    pub title_translations: TranslationMap,
    #[serde(default)]
    pub post_date: Option<Timestamp>,
    #[serde(default)]
    pub last_post_date: Option<Timestamp>,
    #[serde(default)]
    pub forum_id: Option<ForumId>,
    #[serde(default)]
    pub forum_title: Option<String>,
    #[serde(default)]
    pub posts: Vec<TranslatedPost>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TranslatedPost {
    pub id: ForumId,
    pub position: u32,
    #[serde(default)]
    pub post_date: Option<Timestamp>,
    #[serde(default)]
    pub user_id: Option<ForumId>,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub message: String,
    #[serde(rename = "message_english", default)]
    pub message_translations: TranslationMap,
}

impl TranslatedPost {
    pub fn from_source(post: &SourcePost) -> Self {
        Self {
            id: post.id.clone(),
            position: post.position,
            post_date: post.post_date.clone(),
            user_id: post.user_id.clone(),
            username: post.username.clone(),
            message: post.message.clone(),
            message_translations: TranslationMap::new(),
        }
    }
}

impl TranslatedThread {
    /// Copies metadata only; posts start with no translations.
    pub fn from_source(thread: &SourceThread) -> Self {
        Self {
            id: thread.id.clone(),
            title: thread.title.clone(),
            title_translations: TranslationMap::new(),
            post_date: thread.post_date.clone(),
            last_post_date: thread.last_post_date.clone(),
            forum_id: thread.forum_id.clone(),
            forum_title: thread.forum_title.clone(),
            posts: thread.posts.iter().map(TranslatedPost::from_source).collect(),
        }
    }

    /// Sorted union of every model that translated the title or any post.
    pub fn models(&self) -> Vec<String> {
        let mut models: BTreeSet<&str> = self.title_translations.keys().map(String::as_str).collect();
        for post in &self.posts {
            models.extend(post.message_translations.keys().map(String::as_str));
        }
        models.into_iter().map(str::to_string).collect()
    }

    pub fn translations(&self) -> impl Iterator<Item = (&String, &Translation)> {
        self.title_translations
            .iter()
            .chain(self.posts.iter().flat_map(|p| p.message_translations.iter()))
    }

    pub fn has_failures(&self) -> bool {
        self.translations().any(|(_, t)| t.is_failed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_numeric_and_string_ids() {
        let json = r#"{
            "id": 42, "title": "Hej", "post_date": 1700000000, "last_post_date": "2024-01-02",
            "forum_id": "f7", "forum_title": "Allmänt",
            "posts": [{"id": "p1", "position": 0, "post_date": 1700000000, "user_id": null,
                       "username": "anna", "message": "Hej alla"}]
        }"#;
        let thread: SourceThread = serde_json::from_str(json).expect("parse thread");
        assert_eq!(thread.id, ForumId::Num(42));
        assert_eq!(thread.forum_id, Some(ForumId::Text("f7".to_string())));
        assert_eq!(thread.posts[0].user_id, None);
        assert_eq!(
            thread.last_post_date.as_ref().map(ToString::to_string).as_deref(),
            Some("2024-01-02")
        );
        assert_eq!(
            thread.post_date.as_ref().map(ToString::to_string).as_deref(),
            Some("2023-11-14 22:13")
        );
    }

    #[test]
    fn translation_keeps_on_disk_field_names() {
        let mut thread = TranslatedThread::from_source(&SourceThread {
            id: ForumId::Num(1),
            title: "Titel".to_string(),
            post_date: None,
            last_post_date: None,
            forum_id: None,
            forum_title: None,
            posts: vec![SourcePost {
                id: ForumId::Num(10),
                position: 0,
                post_date: None,
                user_id: Some(ForumId::Num(5)),
                username: "bo".to_string(),
                message: "Text".to_string(),
            }],
        });
        thread.title_translations.insert(
            "gpt-4o".to_string(),
            Translation {
                text: "Title".to_string(),
                tokens: TokenUsage::new(3, 1, 4),
                ..Translation::default()
            },
        );
        thread.posts[0]
            .message_translations
            .insert("deepseek-chat".to_string(), Translation::failed("boom"));

        let value = serde_json::to_value(&thread).expect("serialize");
        assert_eq!(value["title_english"]["gpt-4o"]["text"], "Title");
        assert_eq!(value["title_english"]["gpt-4o"]["tokens"]["total_tokens"], 4);
        assert!(value["title_english"]["gpt-4o"].get("flags").is_none());
        let failed = &value["posts"][0]["message_english"]["deepseek-chat"];
        assert_eq!(failed["text"], "");
        assert_eq!(failed["tokens"], serde_json::json!({}));
        assert_eq!(failed["error"], "boom");
        assert!(failed.get("cached").is_none());
    }

    #[test]
    fn models_include_post_only_models_sorted() {
        let json = r#"{
            "id": 1, "title": "t", "title_english": {"gpt-4o": {"text": "T", "tokens": {}}},
            "posts": [
                {"id": 1, "position": 0, "username": "u", "message": "m",
                 "message_english": {"deepseek-chat": {"text": "M", "tokens": {}},
                                     "claude-3-7-sonnet-latest": {"text": "M", "tokens": {}}}}
            ]
        }"#;
        let thread: TranslatedThread = serde_json::from_str(json).expect("parse");
        assert_eq!(
            thread.models(),
            vec!["claude-3-7-sonnet-latest", "deepseek-chat", "gpt-4o"]
        );
        assert!(!thread.has_failures());
    }

    #[test]
    fn forum_id_parse_prefers_numbers() {
        assert_eq!(ForumId::parse(" 17 "), ForumId::Num(17));
        assert_eq!(ForumId::parse("t-17"), ForumId::Text("t-17".to_string()));
    }
}
