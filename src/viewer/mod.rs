//! Read-only presentation of a translations file.

mod html;
mod labels;
mod layout;
mod text;
mod usage;

pub use html::{escape_html, render_html, HtmlOptions, PAGE_TITLE};
pub use labels::{column_letters, ModelLabels};
pub use layout::{post_heading, thread_option_label, Cell, CellContent, PostView, ThreadView};
pub use text::{render_text, wrap_chars, TextOptions, DEFAULT_WIDTH};
pub use usage::{render_usage_table, summarize_usage, ModelUsage};
