//! Document store: the vault that receives notes and exported archives.
//!
//! Paths are vault-relative and use `/` as separator regardless of platform.
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};

use crate::error::Result;

/// Folder (under the vault root) that receives trashed files.
pub const TRASH_FOLDER: &str = ".trash";

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn folder_exists(&self, folder: &str) -> Result<bool>;
    async fn create_folder(&self, folder: &str) -> Result<()>;
    async fn exists(&self, path: &str) -> Result<bool>;
    /// Create a new file. Fails if the file already exists.
    async fn create(&self, path: &str, text: &str) -> Result<()>;
    /// Append to an existing file. Fails if the file does not exist.
    async fn append(&self, path: &str, text: &str) -> Result<()>;
    async fn write_binary(&self, path: &str, bytes: &[u8]) -> Result<()>;
    /// Every file in the vault, excluding the trash, sorted.
    async fn list_files(&self) -> Result<Vec<String>>;
    async fn trash(&self, path: &str) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct FsDocumentStore {
    root: PathBuf,
}

impl FsDocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, rel: &str) -> PathBuf {
        rel.split('/')
            .filter(|part| !part.is_empty())
            .fold(self.root.clone(), |acc, part| acc.join(part))
    }
}

#[async_trait]
impl DocumentStore for FsDocumentStore {
    async fn folder_exists(&self, folder: &str) -> Result<bool> {
        Ok(fs::metadata(self.resolve(folder))
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false))
    }

    async fn create_folder(&self, folder: &str) -> Result<()> {
        fs::create_dir_all(self.resolve(folder)).await?;
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(fs::try_exists(self.resolve(path)).await?)
    }

    #[instrument(skip(self, text))]
    async fn create(&self, path: &str, text: &str) -> Result<()> {
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.resolve(path))
            .await?;
        file.write_all(text.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    async fn append(&self, path: &str, text: &str) -> Result<()> {
        let mut file = fs::OpenOptions::new()
            .append(true)
            .open(self.resolve(path))
            .await?;
        file.write_all(text.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    #[instrument(skip(self, bytes), fields(len = bytes.len()))]
    async fn write_binary(&self, path: &str, bytes: &[u8]) -> Result<()> {
        let target = self.resolve(path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(target, bytes).await?;
        Ok(())
    }

    async fn list_files(&self) -> Result<Vec<String>> {
        let mut out = Vec::new();
        let mut pending = vec![(self.root.clone(), String::new())];
        while let Some((dir, prefix)) = pending.pop() {
            let mut entries = fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let name = entry.file_name().to_string_lossy().to_string();
                let rel = if prefix.is_empty() {
                    name.clone()
                } else {
                    format!("{prefix}/{name}")
                };
                let kind = entry.file_type().await?;
                if kind.is_dir() {
                    if rel != TRASH_FOLDER {
                        pending.push((entry.path(), rel));
                    }
                } else if kind.is_file() {
                    out.push(rel);
                }
            }
        }
        out.sort();
        Ok(out)
    }

    #[instrument(skip(self))]
    async fn trash(&self, path: &str) -> Result<()> {
        let source = self.resolve(path);
        let mut target = self.resolve(&format!("{TRASH_FOLDER}/{path}"));
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }
        if fs::try_exists(&target).await? {
            let stamp = chrono::Utc::now().timestamp_millis();
            let name = target
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            target.set_file_name(format!("{stamp}-{name}"));
        }
        debug!(from = %source.display(), to = %target.display(), "moving to trash");
        fs::rename(source, target).await?;
        Ok(())
    }
}
