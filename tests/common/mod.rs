#![allow(dead_code)]

use async_trait::async_trait;
use feedly_sync::checkpoint::{Checkpoint, CheckpointStore};
use feedly_sync::config::{self, Config};
use feedly_sync::feedly::{Entry, FeedlyService, JournalPage, StreamPage, TagMarkers};
use feedly_sync::{Error, Result};
use serde_json::{json, Value};
use std::collections::{BTreeMap, VecDeque};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

pub fn test_config(vault: &Path) -> Config {
    let mut cfg: Config = serde_yaml::from_str(config::example()).unwrap();
    cfg.app.vault_dir = vault.to_string_lossy().to_string();
    cfg.app.data_dir = vault.join(".data").to_string_lossy().to_string();
    cfg.feedly.user_id = "user-1".into();
    cfg.feedly.access_token = "token".into();
    cfg
}

/// Raw entry JSON as Feedly returns it.
pub fn entry_json(id: &str, title: &str) -> Value {
    json!({
        "id": id,
        "title": title,
        "author": "Ada",
        "canonicalUrl": format!("https://example.com/{id}"),
        "published": 1_700_000_000_000i64,
        "crawled": 1_700_000_100_000i64,
        "origin": { "title": "Example Weekly" }
    })
}

pub fn highlight(id: &str, title: &str, text: &str) -> Value {
    json!({ "created": 1_700_000_200_000i64, "highlight": { "text": text }, "entry": entry_json(id, title) })
}

pub fn comment(id: &str, title: &str, text: &str) -> Value {
    json!({ "created": 1_700_000_200_000i64, "comment": text, "entry": entry_json(id, title) })
}

pub fn bare(id: &str, title: &str) -> Value {
    json!({ "created": 1_700_000_200_000i64, "entry": entry_json(id, title) })
}

pub fn journal_page(records: Vec<Value>, continuation: Option<&str>) -> JournalPage {
    serde_json::from_value(json!({ "entries": records, "continuation": continuation })).unwrap()
}

/// `count` highlights on distinct articles, numbered from `start`.
pub fn highlight_page(start: usize, count: usize, continuation: Option<&str>) -> JournalPage {
    let records = (start..start + count)
        .map(|i| highlight(&format!("e{i}"), &format!("Article {i}"), &format!("quote {i}")))
        .collect();
    journal_page(records, continuation)
}

pub fn entry(value: Value) -> Entry {
    serde_json::from_value(value).unwrap()
}

pub fn entry_with_body(id: &str, title: &str, body: &str) -> Entry {
    let mut value = entry_json(id, title);
    value["content"] = json!({ "content": body });
    entry(value)
}

pub fn stream_page(items: Vec<Entry>, continuation: Option<&str>) -> StreamPage {
    StreamPage {
        items,
        continuation: continuation.map(str::to_string),
    }
}

/// Feedly fake answering from scripted queues and recording every call.
#[derive(Clone, Default)]
pub struct ScriptedFeedly {
    journal: Arc<Mutex<VecDeque<Result<JournalPage>>>>,
    journal_calls: Arc<Mutex<Vec<(i64, Option<String>)>>>,
    streams: Arc<Mutex<VecDeque<Result<StreamPage>>>>,
    stream_calls: Arc<Mutex<Vec<(String, Option<String>)>>>,
    markers: Arc<Mutex<Option<Result<TagMarkers>>>>,
    saved: Arc<Mutex<Option<Result<Vec<Entry>>>>>,
    mget_calls: Arc<Mutex<Vec<Vec<String>>>>,
}

impl ScriptedFeedly {
    pub fn with_journal(pages: Vec<Result<JournalPage>>) -> Self {
        Self {
            journal: Arc::new(Mutex::new(VecDeque::from(pages))),
            ..Default::default()
        }
    }

    pub fn with_export(
        streams: Vec<Result<StreamPage>>,
        markers: Result<TagMarkers>,
        saved: Result<Vec<Entry>>,
    ) -> Self {
        Self {
            streams: Arc::new(Mutex::new(VecDeque::from(streams))),
            markers: Arc::new(Mutex::new(Some(markers))),
            saved: Arc::new(Mutex::new(Some(saved))),
            ..Default::default()
        }
    }

    pub async fn journal_calls(&self) -> Vec<(i64, Option<String>)> {
        self.journal_calls.lock().await.clone()
    }

    pub async fn stream_calls(&self) -> Vec<(String, Option<String>)> {
        self.stream_calls.lock().await.clone()
    }

    pub async fn mget_calls(&self) -> Vec<Vec<String>> {
        self.mget_calls.lock().await.clone()
    }
}

fn unexpected(what: &str) -> Error {
    Error::Api {
        status: 0,
        message: format!("unexpected {what} call"),
    }
}

#[async_trait]
impl FeedlyService for ScriptedFeedly {
    async fn annotations_journal(
        &self,
        newer_than: i64,
        continuation: Option<&str>,
    ) -> Result<JournalPage> {
        self.journal_calls
            .lock()
            .await
            .push((newer_than, continuation.map(str::to_string)));
        self.journal
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Err(unexpected("journal")))
    }

    async fn stream_contents(
        &self,
        stream_id: &str,
        continuation: Option<&str>,
    ) -> Result<StreamPage> {
        self.stream_calls
            .lock()
            .await
            .push((stream_id.to_string(), continuation.map(str::to_string)));
        self.streams
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Err(unexpected("stream")))
    }

    async fn tag_markers(&self) -> Result<TagMarkers> {
        self.markers
            .lock()
            .await
            .take()
            .unwrap_or_else(|| Err(unexpected("markers")))
    }

    async fn entries(&self, ids: &[String]) -> Result<Vec<Entry>> {
        self.mget_calls.lock().await.push(ids.to_vec());
        self.saved
            .lock()
            .await
            .take()
            .unwrap_or_else(|| Err(unexpected("mget")))
    }
}

/// Checkpoint store keeping every saved version.
#[derive(Clone, Default)]
pub struct RecordingCheckpoints {
    current: Arc<Mutex<Checkpoint>>,
    history: Arc<Mutex<Vec<Checkpoint>>>,
}

impl RecordingCheckpoints {
    pub fn starting_at(checkpoint: Checkpoint) -> Self {
        Self {
            current: Arc::new(Mutex::new(checkpoint)),
            ..Default::default()
        }
    }

    pub async fn current(&self) -> Checkpoint {
        self.current.lock().await.clone()
    }

    pub async fn history(&self) -> Vec<Checkpoint> {
        self.history.lock().await.clone()
    }
}

#[async_trait]
impl CheckpointStore for RecordingCheckpoints {
    async fn load(&self) -> Result<Checkpoint> {
        Ok(self.current.lock().await.clone())
    }

    async fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        *self.current.lock().await = checkpoint.clone();
        self.history.lock().await.push(checkpoint.clone());
        Ok(())
    }
}

/// Every file under `root` (relative path -> content), skipping hidden dirs.
pub fn read_tree(root: &Path) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in std::fs::read_dir(&dir).unwrap() {
            let entry = entry.unwrap();
            let path = entry.path();
            if entry.file_name().to_string_lossy().starts_with('.') {
                continue;
            }
            if path.is_dir() {
                pending.push(path);
            } else {
                let rel = path.strip_prefix(root).unwrap().to_string_lossy().to_string();
                out.insert(rel, std::fs::read_to_string(&path).unwrap());
            }
        }
    }
    out
}
