//! Normalization of one exported document.

use std::path::Path;

use scraper::{Html, Selector};

/// Export of a pad that was created and never edited, after line breaks are
/// collapsed.
pub const EMPTY_DOCUMENT_TEMPLATE: &str = concat!(
    "<!DOCTYPE HTML PUBLIC \"-//W3C//DTD HTML 4.01 Transitional//EN\" ",
    "\"http://www.w3.org/TR/html4/loose.dtd\">",
    "<html><head><meta http-equiv=\"Content-type\" content=\"text/html; charset=utf-8\"/></head>",
    "<body><h1>Untitled</h1><p>This pad text is synchronized as you type, so that everyone ",
    "viewing this page sees the same text. This allows you to collaborate seamlessly on ",
    "documents!</p></body></html>",
);

/// Outcome of preparing one HTML export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prepared {
    /// Untouched default document; never sent to the API.
    Empty,
    Document { title: String, body: String },
}

/// Remove every line break so exports compare and embed as one line.
pub fn collapse_line_breaks(raw: &str) -> String {
    raw.chars().filter(|c| *c != '\n' && *c != '\r').collect()
}

pub fn is_empty_document(normalized: &str) -> bool {
    normalized.trim() == EMPTY_DOCUMENT_TEMPLATE
}

/// Drop the document envelope: everything up to and including the opening
/// `<body>` tag, and the closing `</body>` onwards.
pub fn strip_envelope(markup: &str) -> &str {
    let lower = markup.to_ascii_lowercase();
    let start = lower
        .find("<body")
        .and_then(|open| lower[open..].find('>').map(|close| open + close + 1))
        .unwrap_or(0);
    let end = lower
        .rfind("</body>")
        .filter(|&end| end >= start)
        .unwrap_or(markup.len());
    markup[start..end].trim()
}

/// Title of a document: text of the first `<h1>`, else the file name.
pub fn derive_title(body: &str, file_name: &str) -> String {
    let fragment = Html::parse_fragment(body);
    if let Ok(selector) = Selector::parse("h1") {
        if let Some(heading) = fragment.select(&selector).next() {
            let text = heading.text().collect::<String>();
            let text = text.trim();
            if !text.is_empty() {
                return text.to_string();
            }
        }
    }
    title_from_file_name(file_name)
}

/// `notes/my-notes.html` → `my notes`.
pub fn title_from_file_name(file_name: &str) -> String {
    let base = Path::new(file_name)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(file_name);
    let stem = base.strip_suffix(".html").unwrap_or(base);
    stem.replace('-', " ").trim().to_string()
}

/// Run the whole normalization for one export.
pub fn prepare(file_name: &str, raw: &str) -> Prepared {
    let normalized = collapse_line_breaks(raw);
    if is_empty_document(&normalized) {
        return Prepared::Empty;
    }
    let body = strip_envelope(&normalized);
    Prepared::Document {
        title: derive_title(body, file_name),
        body: body.to_string(),
    }
}
