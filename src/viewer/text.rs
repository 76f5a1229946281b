use crate::forum::TranslatedThread;

use super::layout::ThreadView;

pub const DEFAULT_WIDTH: usize = 160;
const GUTTER: &str = " | ";

#[derive(Clone, Debug)]
pub struct TextOptions {
    pub width: usize,
    pub reveal_models: bool,
}

impl Default for TextOptions {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            reveal_models: false,
        }
    }
}

pub fn render_text(thread: &TranslatedThread, options: &TextOptions) -> String {
    let view = ThreadView::build(thread, options.reveal_models);
    let ncols = view.columns.len().max(1);
    let gutters = GUTTER.chars().count() * (ncols - 1);
    let col_width = (options.width.saturating_sub(gutters) / ncols).max(8);
    let rule = "-".repeat(col_width * ncols + gutters);

    let mut out = String::new();
    out.push_str(&format!("Thread {}\n", view.id));
    if let Some(date) = view.date.as_ref() {
        out.push_str(&format!("Thread date: {date}\n"));
    }
    out.push('\n');

    push_row(&mut out, &view.columns, col_width);
    out.push_str(&rule);
    out.push('\n');

    let mut title_row = vec![view.title.clone()];
    title_row.extend(view.title_cells.iter().map(|c| c.display_text()));
    push_row(&mut out, &title_row, col_width);
    out.push_str(&rule);
    out.push('\n');

    for post in &view.posts {
        out.push('\n');
        out.push_str(&format!("{} ({})\n", post.heading, post.username));
        let mut row = vec![post.original.clone()];
        row.extend(post.cells.iter().map(|c| {
            if c.flags.is_empty() {
                c.display_text()
            } else {
                format!("{}\n[{}]", c.display_text(), c.flags.join(", "))
            }
        }));
        push_row(&mut out, &row, col_width);
    }
    out
}

fn push_row(out: &mut String, cells: &[String], width: usize) {
    let wrapped: Vec<Vec<String>> = cells.iter().map(|c| wrap_chars(c, width)).collect();
    let height = wrapped.iter().map(Vec::len).max().unwrap_or(0);
    for line in 0..height {
        let parts: Vec<String> = wrapped
            .iter()
            .map(|lines| {
                let text = lines.get(line).map(String::as_str).unwrap_or("");
                let pad = width.saturating_sub(text.chars().count());
                format!("{text}{}", " ".repeat(pad))
            })
            .collect();
        out.push_str(parts.join(GUTTER).trim_end());
        out.push('\n');
    }
}

/// Hard-wraps at `width` characters; embedded newlines start new lines.
pub fn wrap_chars(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    for raw in text.split('\n') {
        let chars: Vec<char> = raw.trim_end_matches('\r').chars().collect();
        if chars.is_empty() {
            lines.push(String::new());
            continue;
        }
        for chunk in chars.chunks(width) {
            lines.push(chunk.iter().collect());
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_by_chars_and_keeps_newlines() {
        assert_eq!(wrap_chars("abcdef", 4), vec!["abcd", "ef"]);
        assert_eq!(wrap_chars("åäö\n\nx", 2), vec!["åä", "ö", "", "x"]);
    }

    #[test]
    fn renders_side_by_side() {
        let thread: TranslatedThread = serde_json::from_str(
            r#"{
            "id": 3, "title": "Hej",
            "title_english": {"gpt-4o": {"text": "Hi", "tokens": {}}},
            "posts": [
              {"id": 1, "position": 0, "username": "anna", "message": "Rad ett\nRad två",
               "message_english": {"gpt-4o": {"text": "Line one\nLine two", "tokens": {}}}},
              {"id": 2, "position": 1, "username": "bo", "message": "Tack", "message_english": {}}
            ]}"#,
        )
        .expect("thread json");
        let text = render_text(
            &thread,
            &TextOptions {
                width: 63,
                reveal_models: false,
            },
        );
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Thread 3");
        assert!(lines.contains(&"Original                       | Model A"));
        assert!(lines.contains(&"Hej                            | Hi"));
        assert!(lines.contains(&"Fråga (anna)"));
        assert!(lines.contains(&"Rad två                        | Line two"));
        assert!(lines.contains(&"Tack                           | No translation available"));
    }
}
