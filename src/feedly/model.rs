//! Wire records for the Feedly endpoints this crate talks to.
//!
//! Field names follow Feedly's camelCase JSON. Required fields are plain
//! types so that a record missing them fails to decode instead of
//! surfacing later as an empty value.
use serde::Deserialize;
use std::collections::BTreeMap;

/// `GET annotations/journal`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalPage {
    #[serde(default)]
    pub entries: Vec<AnnotationRecord>,
    pub continuation: Option<String>,
}

/// One annotation together with the entry it was made on.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationRecord {
    /// Milliseconds since the epoch.
    pub created: i64,
    pub entry: Entry,
    #[serde(default)]
    pub highlight: Option<Highlight>,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Highlight {
    pub text: String,
}

/// A Feedly entry, as returned by the journal, stream and `.mget` endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub canonical_url: Option<String>,
    #[serde(default)]
    pub published: Option<i64>,
    pub crawled: i64,
    #[serde(default)]
    pub origin: Option<Origin>,
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default)]
    pub summary: Option<Content>,
    #[serde(default)]
    pub full_content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Origin {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub content: String,
}

/// `GET streams/contents`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamPage {
    #[serde(default)]
    pub items: Vec<Entry>,
    pub continuation: Option<String>,
}

/// `GET markers/tags`: entry ids grouped by tag id.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagMarkers {
    #[serde(default)]
    pub tagged_entries: BTreeMap<String, Vec<String>>,
}

impl TagMarkers {
    /// Entry ids of the first tag (in id order) whose id contains `needle`.
    pub fn entries_for(&self, needle: &str) -> Option<(&str, &[String])> {
        self.tagged_entries
            .iter()
            .find(|(tag, _)| tag.contains(needle))
            .map(|(tag, ids)| (tag.as_str(), ids.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn journal_page_decodes_highlight_and_comment() {
        let page: JournalPage = serde_json::from_value(json!({
            "entries": [
                {
                    "created": 1_700_000_000_000i64,
                    "highlight": { "text": "quoted" },
                    "entry": {
                        "id": "e1",
                        "title": "AI & Chips",
                        "crawled": 1_600_000_000_000i64,
                        "origin": { "title": "The Register" }
                    }
                },
                {
                    "created": 1_700_000_000_001i64,
                    "comment": "worth a look",
                    "entry": { "id": "e2", "title": "Other", "crawled": 1 }
                }
            ],
            "continuation": "c1"
        }))
        .unwrap();
        assert_eq!(page.entries.len(), 2);
        assert_eq!(page.continuation.as_deref(), Some("c1"));
        assert_eq!(page.entries[0].highlight.as_ref().unwrap().text, "quoted");
        assert_eq!(
            page.entries[0].entry.origin.as_ref().unwrap().title.as_deref(),
            Some("The Register")
        );
        assert_eq!(page.entries[1].comment.as_deref(), Some("worth a look"));
    }

    #[test]
    fn entry_without_crawled_is_rejected() {
        let res: Result<Entry, _> = serde_json::from_value(json!({ "id": "e1", "title": "t" }));
        assert!(res.is_err());
    }

    #[test]
    fn saved_tag_lookup_uses_first_match() {
        let markers: TagMarkers = serde_json::from_value(json!({
            "taggedEntries": {
                "user/u/tag/global.saved": ["a", "b"],
                "user/u/tag/reading": ["c"]
            }
        }))
        .unwrap();
        let (tag, ids) = markers.entries_for("global.saved").unwrap();
        assert_eq!(tag, "user/u/tag/global.saved");
        assert_eq!(ids, ["a".to_string(), "b".to_string()]);
        assert!(markers.entries_for("missing").is_none());
    }
}
