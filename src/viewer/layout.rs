use crate::forum::{TranslatedThread, Translation, TranslationMap};

use super::labels::ModelLabels;

pub const ORIGINAL_HEADER: &str = "Original";
pub const MISSING_TEXT: &str = "No translation available";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CellContent {
    Text(String),
    Missing,
    Failed(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cell {
    pub content: CellContent,
    pub flags: Vec<String>,
}

impl Cell {
    fn from_entry(entry: Option<&Translation>) -> Self {
        match entry {
            None => Self {
                content: CellContent::Missing,
                flags: Vec::new(),
            },
            Some(t) => {
                let content = if let Some(err) = t.error.as_ref() {
                    CellContent::Failed(err.clone())
                } else if t.is_missing() {
                    CellContent::Missing
                } else {
                    CellContent::Text(t.text.clone())
                };
                Self {
                    content,
                    flags: t.flags.clone(),
                }
            }
        }
    }

    /// Text shown to the reader.
    pub fn display_text(&self) -> String {
        match &self.content {
            CellContent::Text(t) => t.clone(),
            CellContent::Missing => MISSING_TEXT.to_string(),
            CellContent::Failed(err) => format!("Translation failed: {err}"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct PostView {
    pub heading: String,
    pub username: String,
    pub original: String,
    pub cells: Vec<Cell>,
}

/// One thread laid out as a grid: original text first, then one column per model.
#[derive(Clone, Debug)]
pub struct ThreadView {
    pub id: String,
    pub date: Option<String>,
    pub columns: Vec<String>,
    pub title: String,
    pub title_cells: Vec<Cell>,
    pub posts: Vec<PostView>,
}

impl ThreadView {
    pub fn build(thread: &TranslatedThread, reveal: bool) -> Self {
        let models = thread.models();
        let mut labels = ModelLabels::new(reveal);
        let mut columns = vec![ORIGINAL_HEADER.to_string()];
        columns.extend(models.iter().map(|m| labels.label(m)));

        let cells = |map: &TranslationMap| -> Vec<Cell> {
            models.iter().map(|m| Cell::from_entry(map.get(m))).collect()
        };

        let posts = thread
            .posts
            .iter()
            .map(|p| PostView {
                heading: post_heading(p.position),
                username: p.username.clone(),
                original: p.message.clone(),
                cells: cells(&p.message_translations),
            })
            .collect();

        Self {
            id: thread.id.to_string(),
            date: thread
                .last_post_date
                .as_ref()
                .or(thread.post_date.as_ref())
                .map(ToString::to_string),
            title: thread.title.clone(),
            title_cells: cells(&thread.title_translations),
            posts,
            columns,
        }
    }
}

pub fn post_heading(position: u32) -> String {
    if position == 0 {
        "Fråga".to_string()
    } else {
        format!("Svar {position}")
    }
}

pub fn thread_option_label(thread: &TranslatedThread) -> String {
    format!("{} - {}", thread.id, thread.title)
}
