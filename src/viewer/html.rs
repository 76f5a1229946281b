use std::fmt::Write as _;

use crate::forum::TranslatedThread;

use super::layout::{thread_option_label, Cell, CellContent, ThreadView};

pub const PAGE_TITLE: &str = "Forum Thread Translations";

#[derive(Clone, Debug, Default)]
pub struct HtmlOptions {
    pub reveal_models: bool,
}

const STYLE: &str = r#"
body { font-family: sans-serif; margin: 2rem; }
.grid { display: grid; gap: 1rem; margin-bottom: 1rem; }
.cell { white-space: pre-wrap; }
.col-header { font-weight: bold; }
.missing { color: #888; font-style: italic; }
.failed { color: #b00; }
.flags { color: #a60; font-size: 0.8rem; }
.meta { color: #666; font-size: 0.9rem; }
"#;

const SCRIPT: &str = r#"
(function () {
  var select = document.getElementById("thread-select");
  var sections = document.querySelectorAll("section.thread");
  function show() {
    sections.forEach(function (s) { s.hidden = s.dataset.thread !== select.value; });
  }
  select.addEventListener("change", show);
  show();
})();
"#;

/// Renders every thread into one self-contained page with a thread selector.
pub fn render_html(threads: &[TranslatedThread], options: &HtmlOptions) -> String {
    let mut out = String::new();
    out.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    let _ = writeln!(out, "<title>{PAGE_TITLE}</title>");
    let _ = writeln!(out, "<style>{STYLE}</style>\n</head>\n<body>");
    let _ = writeln!(out, "<h1>{PAGE_TITLE}</h1>");

    if threads.is_empty() {
        out.push_str("<p>No translated threads to show.</p>\n</body>\n</html>\n");
        return out;
    }

    out.push_str("<label for=\"thread-select\">Select a thread to view:</label>\n");
    out.push_str("<select id=\"thread-select\">\n");
    for (i, thread) in threads.iter().enumerate() {
        let _ = writeln!(
            out,
            "<option value=\"{i}\">{}</option>",
            escape_html(&thread_option_label(thread))
        );
    }
    out.push_str("</select>\n");

    for (i, thread) in threads.iter().enumerate() {
        let view = ThreadView::build(thread, options.reveal_models);
        write_thread(&mut out, i, &view);
    }

    let _ = writeln!(out, "<script>{SCRIPT}</script>\n</body>\n</html>");
    out
}

fn write_thread(out: &mut String, index: usize, view: &ThreadView) {
    let _ = writeln!(out, "<section class=\"thread\" data-thread=\"{index}\">");
    let _ = writeln!(out, "<h2>Thread {}</h2>", escape_html(&view.id));
    if let Some(date) = view.date.as_ref() {
        let _ = writeln!(out, "<p class=\"meta\">Thread date: {}</p>", escape_html(date));
    }

    let grid = format!(
        "<div class=\"grid\" style=\"grid-template-columns: repeat({}, 1fr)\">",
        view.columns.len()
    );
    out.push_str(&grid);
    out.push('\n');
    for col in &view.columns {
        let _ = writeln!(out, "<div class=\"col-header\">{}</div>", escape_html(col));
    }
    let _ = writeln!(out, "<div class=\"cell\"><strong>{}</strong></div>", escape_html(&view.title));
    for cell in &view.title_cells {
        write_cell(out, cell, true);
    }
    out.push_str("</div>\n<hr>\n");

    for post in &view.posts {
        let _ = writeln!(out, "<h3>{}</h3>", escape_html(&post.heading));
        let _ = writeln!(out, "<p class=\"meta\">{}</p>", escape_html(&post.username));
        out.push_str(&grid);
        out.push('\n');
        let _ = writeln!(out, "<div class=\"cell\">{}</div>", escape_html(&post.original));
        for cell in &post.cells {
            write_cell(out, cell, false);
        }
        out.push_str("</div>\n");
    }
    out.push_str("</section>\n");
}

fn write_cell(out: &mut String, cell: &Cell, strong: bool) {
    let class = match cell.content {
        CellContent::Text(_) => "cell",
        CellContent::Missing => "cell missing",
        CellContent::Failed(_) => "cell failed",
    };
    let text = escape_html(&cell.display_text());
    if strong && matches!(cell.content, CellContent::Text(_)) {
        let _ = write!(out, "<div class=\"{class}\"><strong>{text}</strong>");
    } else {
        let _ = write!(out, "<div class=\"{class}\">{text}");
    }
    if !cell.flags.is_empty() {
        let _ = write!(out, "<div class=\"flags\">{}</div>", escape_html(&cell.flags.join(", ")));
    }
    out.push_str("</div>\n");
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}
