use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::feedly::model::{AnnotationRecord, Entry};

/// Article metadata shared by annotation notes and export sections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArticleMeta {
    pub id: String,
    pub title: String,
    pub author: String,
    pub canonical_url: Option<String>,
    pub published: Option<DateTime<Utc>>,
    pub crawled: DateTime<Utc>,
    pub publisher: Option<String>,
}

/// A highlight or a comment, with the article it was made on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnnotatedEntry {
    pub article: ArticleMeta,
    pub highlight: Option<String>,
    pub comment: Option<String>,
    pub created: DateTime<Utc>,
}

/// An article that made it into the export, with its resolved body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportArticle {
    pub article: ArticleMeta,
    pub body: String,
}

impl ArticleMeta {
    /// Best date to show for the article: publication, else crawl time.
    pub fn display_date(&self) -> DateTime<Utc> {
        self.published.unwrap_or(self.crawled)
    }
}

impl TryFrom<&Entry> for ArticleMeta {
    type Error = Error;

    fn try_from(entry: &Entry) -> Result<Self> {
        Ok(Self {
            id: entry.id.clone(),
            title: entry.title.clone(),
            author: entry.author.clone().unwrap_or_default(),
            canonical_url: entry.canonical_url.clone().filter(|u| !u.is_empty()),
            published: entry
                .published
                .map(|ms| from_millis(ms, "published"))
                .transpose()?,
            crawled: from_millis(entry.crawled, "crawled")?,
            publisher: entry
                .origin
                .as_ref()
                .and_then(|o| o.title.clone())
                .filter(|t| !t.is_empty()),
        })
    }
}

impl TryFrom<AnnotationRecord> for AnnotatedEntry {
    type Error = Error;

    fn try_from(record: AnnotationRecord) -> Result<Self> {
        Ok(Self {
            article: ArticleMeta::try_from(&record.entry)?,
            highlight: record.highlight.map(|h| h.text),
            comment: record.comment,
            created: from_millis(record.created, "created")?,
        })
    }
}

impl ExportArticle {
    /// `None` when the entry carries no usable body.
    pub fn from_entry(entry: &Entry) -> Result<Option<Self>> {
        let Some(body) = resolve_content(entry) else {
            return Ok(None);
        };
        Ok(Some(Self {
            article: ArticleMeta::try_from(entry)?,
            body: body.to_string(),
        }))
    }
}

/// Rendered content, then summary, then full content: first non-empty wins.
pub fn resolve_content(entry: &Entry) -> Option<&str> {
    let rendered = entry.content.as_ref().map(|c| c.content.as_str());
    let summary = entry.summary.as_ref().map(|c| c.content.as_str());
    let full = entry.full_content.as_deref();
    [rendered, summary, full]
        .into_iter()
        .flatten()
        .find(|body| !body.trim().is_empty())
}

fn from_millis(ms: i64, field: &str) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| Error::Decode(format!("{field} timestamp out of range: {ms}")))
}
