//! Markdown rendering for annotation notes.
use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::{AnnotatedEntry, ArticleMeta};

static FORBIDDEN: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[*"/\\<>:|?]"#).unwrap());

/// Strip the characters that are not allowed in note file names.
pub fn sanitize_title(title: &str) -> String {
    FORBIDDEN.replace_all(title, "").into_owned()
}

/// Most file systems cap a single path component at 255 bytes.
const MAX_FILE_NAME_BYTES: usize = 255;
const NOTE_EXTENSION: &str = ".md";
const UNTITLED: &str = "Untitled";

/// Vault-relative path of the note for `title` inside `folder`.
pub fn note_path(folder: &str, title: &str) -> String {
    let folder = folder.trim_end_matches('/');
    format!("{}/{}{}", folder, note_stem(title), NOTE_EXTENSION)
}

/// Sanitized title cut at a char boundary so the file name fits, or
/// `Untitled` when nothing is left.
fn note_stem(title: &str) -> String {
    let sanitized = sanitize_title(title);
    let limit = MAX_FILE_NAME_BYTES - NOTE_EXTENSION.len();
    let mut end = sanitized.len().min(limit);
    while !sanitized.is_char_boundary(end) {
        end -= 1;
    }
    // A leading dot would hide the note.
    let stem = sanitized[..end].trim().trim_start_matches('.').trim_start();
    if stem.is_empty() {
        UNTITLED.to_string()
    } else {
        stem.to_string()
    }
}

/// Initial content of a new note: YAML frontmatter describing the article.
pub fn frontmatter(article: &ArticleMeta) -> String {
    let mut out = String::from("---\n");
    push_field(&mut out, "title", &article.title);
    push_field(&mut out, "author", &article.author);
    if let Some(publisher) = &article.publisher {
        push_field(&mut out, "publisher", publisher);
    }
    if let Some(url) = &article.canonical_url {
        push_field(&mut out, "url", url);
    }
    push_field(&mut out, "feedly", &permalink(&article.id));
    push_field(
        &mut out,
        "published",
        &article.display_date().format("%Y-%m-%d").to_string(),
    );
    out.push_str("tags: [feedly]\n");
    out.push_str("---\n");
    out
}

/// Rendered annotation, or `None` when the entry has neither highlight nor
/// comment. A highlight wins over a comment.
pub fn render_annotation(annotation: &AnnotatedEntry) -> Option<String> {
    if let Some(text) = annotation.highlight.as_deref().filter(|t| !t.trim().is_empty()) {
        return Some(blockquote(text));
    }
    annotation
        .comment
        .as_deref()
        .filter(|c| !c.trim().is_empty())
        .map(|comment| format!("\n{}\n", comment.trim_end()))
}

/// Every line of `text` quoted, so embedded line breaks stay in the quote.
pub fn blockquote(text: &str) -> String {
    let mut out = String::from("\n");
    for line in text.trim_end().lines() {
        if line.is_empty() {
            out.push_str(">\n");
        } else {
            out.push_str("> ");
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

/// Link to the entry on feedly.com.
pub fn permalink(entry_id: &str) -> String {
    format!("https://feedly.com/i/entry/{entry_id}")
}

fn push_field(out: &mut String, key: &str, value: &str) {
    out.push_str(key);
    out.push_str(": ");
    out.push_str(&yaml_string(value));
    out.push('\n');
}

fn yaml_string(value: &str) -> String {
    let escaped = value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', " ");
    format!("\"{escaped}\"")
}
