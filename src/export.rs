//! Article export: unread and saved articles bundled into one EPUB.
//!
//! Nothing is persisted between runs. A failed export leaves no artifact and
//! the next run starts from scratch.
use chrono::{DateTime, Utc};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::config::Config;
use crate::epub::xhtml::{escape_attr, escape_text};
use crate::epub::{Book, BookMetadata, Section};
use crate::error::{Error, Result};
use crate::feedly::{Entry, FeedlyService, STREAM_PAGE_SIZE};
use crate::markdown::permalink;
use crate::model::ExportArticle;
use crate::store::DocumentStore;

pub const ARTIFACT_PREFIX: &str = "feedly-export-";
pub const ARTIFACT_EXTENSION: &str = ".epub";
/// Substring identifying Feedly's built-in "saved for later" tag.
pub const SAVED_TAG: &str = "global.saved";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
    pub articles: usize,
    /// Vault-relative path of the written archive, if any.
    pub path: Option<String>,
}

impl ExportReport {
    pub fn notice(&self) -> String {
        match &self.path {
            Some(path) => format!("Exported {} articles to {}", self.articles, path),
            None => "No unread or saved articles to export".to_string(),
        }
    }
}

pub fn unread_stream_id(user_id: &str) -> String {
    format!("user/{user_id}/category/global.all")
}

pub fn artifact_name(now: DateTime<Utc>) -> String {
    format!(
        "{ARTIFACT_PREFIX}{}{ARTIFACT_EXTENSION}",
        now.format("%Y%m%d-%H%M%S")
    )
}

pub fn is_artifact(path: &str) -> bool {
    !path.contains('/') && path.starts_with(ARTIFACT_PREFIX) && path.ends_with(ARTIFACT_EXTENSION)
}

#[instrument(skip_all)]
pub async fn export_articles(
    cfg: &Config,
    feedly: &dyn FeedlyService,
    documents: &dyn DocumentStore,
    now: DateTime<Utc>,
) -> Result<ExportReport> {
    if !cfg.has_credentials() {
        return Err(Error::ConfigMissing);
    }

    let unread = fetch_unread(feedly, &unread_stream_id(&cfg.feedly.user_id)).await?;
    let saved = fetch_saved(feedly).await?;
    info!(unread = unread.len(), saved = saved.len(), "fetched export candidates");

    let articles = collect_articles(unread.iter().chain(saved.iter()))?;
    if articles.is_empty() {
        return Ok(ExportReport {
            articles: 0,
            path: None,
        });
    }

    let book = Book {
        metadata: BookMetadata {
            id: format!("urn:uuid:{}", Uuid::new_v4()),
            title: format!("Feedly {}", now.format("%Y-%m-%d %H:%M")),
            publisher: "Feedly".to_string(),
            author: "Feedly".to_string(),
            modified: now,
            cover: None,
        },
        stylesheet: DEFAULT_STYLE.to_string(),
        sections: articles.iter().map(build_section).collect(),
    };
    let bytes = book.assemble()?;

    let path = artifact_name(now);
    documents.write_binary(&path, &bytes).await?;
    info!(articles = articles.len(), %path, bytes = bytes.len(), "wrote export");

    Ok(ExportReport {
        articles: articles.len(),
        path: Some(path),
    })
}

/// Move every previously exported archive to the trash. Returns how many.
#[instrument(skip_all)]
pub async fn clean_archives(documents: &dyn DocumentStore) -> Result<usize> {
    let mut removed = 0;
    for path in documents.list_files().await? {
        if is_artifact(&path) {
            documents.trash(&path).await?;
            removed += 1;
        }
    }
    info!(removed, "cleaned exported archives");
    Ok(removed)
}

async fn fetch_unread(feedly: &dyn FeedlyService, stream_id: &str) -> Result<Vec<Entry>> {
    let mut items = Vec::new();
    let mut continuation: Option<String> = None;
    loop {
        let page = feedly
            .stream_contents(stream_id, continuation.as_deref())
            .await?;
        let count = page.items.len();
        items.extend(page.items);
        match page.continuation {
            Some(token) if count >= STREAM_PAGE_SIZE => continuation = Some(token),
            _ => break,
        }
    }
    Ok(items)
}

async fn fetch_saved(feedly: &dyn FeedlyService) -> Result<Vec<Entry>> {
    let markers = feedly.tag_markers().await?;
    let Some((tag, ids)) = markers.entries_for(SAVED_TAG) else {
        return Ok(Vec::new());
    };
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    info!(%tag, count = ids.len(), "fetching saved entries");
    feedly.entries(ids).await
}

fn collect_articles<'a>(entries: impl Iterator<Item = &'a Entry>) -> Result<Vec<ExportArticle>> {
    let mut out = Vec::new();
    for entry in entries {
        if let Some(article) = ExportArticle::from_entry(entry)? {
            out.push(article);
        }
    }
    Ok(out)
}

/// Metadata block followed by the article body.
pub fn build_section(article: &ExportArticle) -> Section {
    let meta = &article.article;
    let mut html = String::from("<div class=\"feedly-meta\">\n<p class=\"links\">");
    if let Some(url) = &meta.canonical_url {
        html.push_str(&format!(
            "<a href=\"{}\">{}</a> | ",
            escape_attr(url),
            escape_text(url)
        ));
    }
    html.push_str(&format!(
        "<a href=\"{}\">Open in Feedly</a></p>\n",
        escape_attr(&permalink(&meta.id))
    ));
    html.push_str(&format!("<h1>{}</h1>\n", escape_text(&meta.title)));

    let mut byline = vec![meta.display_date().format("%Y-%m-%d").to_string()];
    if !meta.author.is_empty() {
        byline.push(meta.author.clone());
    }
    if let Some(publisher) = &meta.publisher {
        byline.push(publisher.clone());
    }
    html.push_str(&format!(
        "<p class=\"byline\">{}</p>\n</div>\n",
        escape_text(&byline.join(" · "))
    ));

    html.push_str("<div class=\"feedly-body\">\n");
    html.push_str(&article.body);
    html.push_str("\n</div>\n");

    Section {
        title: meta.title.clone(),
        html_body: html,
    }
}

/// Images are kept in the markup but never downloaded; they collapse to
/// nothing instead of showing broken placeholders.
const DEFAULT_STYLE: &str = r#"
body {
  margin: 0 4%;
  font-family: serif;
  line-height: 1.5;
}

.feedly-meta {
  margin-bottom: 1.5em;
  padding-bottom: 0.5em;
  border-bottom: 1px solid #999;
}

.feedly-meta .links,
.feedly-meta .byline {
  font-size: 0.8em;
  color: #555;
  word-break: break-all;
}

.feedly-meta h1 {
  font-size: 1.4em;
  margin: 0.4em 0;
}

img,
picture,
svg,
video,
figure img {
  width: 0 !important;
  height: 0 !important;
  max-width: 0 !important;
  max-height: 0 !important;
  border: 0;
  margin: 0;
  padding: 0;
}

pre,
code {
  white-space: pre-wrap;
}
"#;
