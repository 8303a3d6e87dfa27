//! Annotation sync: pulls the annotations journal page by page and merges
//! every annotation into the note of its article.
//!
//! The run is an explicit state machine:
//!
//! ```text
//! Idle -> FetchingPage -> Merging -> FetchingPage   (full page, cursor persisted)
//!                                 -> Completing     (short page, window closed)
//! any  -> Paused(reason)
//! ```
//!
//! The checkpoint is saved when a fresh run starts, after every full page,
//! and once at completion. Nothing else writes it.
use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::feedly::{FeedlyService, JournalPage, JOURNAL_PAGE_SIZE};
use crate::markdown;
use crate::model::AnnotatedEntry;
use crate::store::DocumentStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PauseReason {
    AuthExpired,
    RateLimited,
    Failed(String),
}

impl From<&Error> for PauseReason {
    fn from(err: &Error) -> Self {
        match err {
            Error::AuthExpired => PauseReason::AuthExpired,
            Error::RateLimited => PauseReason::RateLimited,
            other => PauseReason::Failed(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Completed,
    Paused(PauseReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub entries_processed: usize,
    pub pages: usize,
    pub documents_created: usize,
    pub outcome: SyncOutcome,
}

impl SyncReport {
    /// One line for the user describing how the run ended.
    pub fn notice(&self) -> String {
        match &self.outcome {
            SyncOutcome::Completed if self.entries_processed == 0 => {
                "No new Feedly annotations".to_string()
            }
            SyncOutcome::Completed => {
                format!("Synced {} Feedly annotations", self.entries_processed)
            }
            SyncOutcome::Paused(PauseReason::AuthExpired) => format!(
                "Feedly access token expired after {} annotations. Update feedly.access_token and run sync again to resume.",
                self.entries_processed
            ),
            SyncOutcome::Paused(PauseReason::RateLimited) => format!(
                "Feedly rate limit reached after {} annotations. Try again later; the sync resumes where it stopped.",
                self.entries_processed
            ),
            SyncOutcome::Paused(PauseReason::Failed(message)) => {
                format!("Annotation sync stopped: {message}")
            }
        }
    }

    pub fn is_complete(&self) -> bool {
        self.outcome == SyncOutcome::Completed
    }
}

#[derive(Debug)]
enum SyncState {
    Idle,
    FetchingPage,
    Merging(JournalPage),
    Completing,
    Paused(PauseReason),
    Done,
}

enum PageKind {
    Full(String),
    Short,
}

struct AnnotationSync<'a> {
    feedly: &'a dyn FeedlyService,
    checkpoints: &'a dyn CheckpointStore,
    documents: &'a dyn DocumentStore,
    folder: &'a str,
    checkpoint: Checkpoint,
    entries_processed: usize,
    pages: usize,
    documents_created: usize,
}

/// Run one annotation sync to completion or to the first interruption.
///
/// Returns `Err` only for [`Error::ConfigMissing`] and for failing to read
/// the checkpoint; every other failure ends the run with a paused outcome.
#[instrument(skip_all)]
pub async fn sync_annotations(
    cfg: &Config,
    feedly: &dyn FeedlyService,
    checkpoints: &dyn CheckpointStore,
    documents: &dyn DocumentStore,
    now: DateTime<Utc>,
) -> Result<SyncReport> {
    if !cfg.has_credentials() {
        return Err(Error::ConfigMissing);
    }

    let checkpoint = checkpoints.load().await?;
    let mut run = AnnotationSync {
        feedly,
        checkpoints,
        documents,
        folder: &cfg.app.annotations_folder,
        checkpoint,
        entries_processed: 0,
        pages: 0,
        documents_created: 0,
    };

    let mut state = SyncState::Idle;
    let outcome = loop {
        state = match state {
            SyncState::Done => break SyncOutcome::Completed,
            SyncState::Paused(reason) => break SyncOutcome::Paused(reason),
            other => run.step(other, now).await,
        };
    };

    Ok(SyncReport {
        entries_processed: run.entries_processed,
        pages: run.pages,
        documents_created: run.documents_created,
        outcome,
    })
}

impl AnnotationSync<'_> {
    async fn step(&mut self, state: SyncState, now: DateTime<Utc>) -> SyncState {
        let next = match state {
            SyncState::Idle => self.start(now).await.map(|_| SyncState::FetchingPage),
            SyncState::FetchingPage => self.fetch().await.map(SyncState::Merging),
            SyncState::Merging(page) => match self.merge(page).await {
                Ok(PageKind::Full(token)) => self
                    .persist(|cp| cp.advance(token))
                    .await
                    .map(|_| SyncState::FetchingPage),
                Ok(PageKind::Short) => Ok(SyncState::Completing),
                Err(err) => Err(err),
            },
            SyncState::Completing => self
                .persist(Checkpoint::complete)
                .await
                .map(|_| SyncState::Done),
            terminal => Ok(terminal),
        };
        next.unwrap_or_else(|err| {
            warn!(error = %err, pages = self.pages, "annotation sync paused");
            SyncState::Paused(PauseReason::from(&err))
        })
    }

    async fn start(&mut self, now: DateTime<Utc>) -> Result<()> {
        if self.checkpoint.is_resuming() {
            info!(
                since = self.checkpoint.newer_than_millis(),
                "resuming interrupted annotation sync"
            );
            if self.checkpoint.continuation_time.is_none() {
                self.persist(|cp| cp.continuation_time = Some(now)).await?;
            }
        } else {
            info!(
                since = self.checkpoint.newer_than_millis(),
                "starting annotation sync"
            );
            self.persist(|cp| cp.begin(now)).await?;
        }

        if !self.documents.folder_exists(self.folder).await? {
            self.documents.create_folder(self.folder).await?;
        }
        Ok(())
    }

    async fn fetch(&mut self) -> Result<JournalPage> {
        let page = self
            .feedly
            .annotations_journal(
                self.checkpoint.newer_than_millis(),
                self.checkpoint.continuation_token.as_deref(),
            )
            .await?;
        self.pages += 1;
        debug!(page = self.pages, entries = page.entries.len(), "fetched journal page");
        Ok(page)
    }

    async fn merge(&mut self, page: JournalPage) -> Result<PageKind> {
        let count = page.entries.len();
        // A page that cannot be fully converted writes nothing.
        let annotations = page
            .entries
            .into_iter()
            .map(AnnotatedEntry::try_from)
            .collect::<Result<Vec<_>>>()?;
        for annotation in &annotations {
            self.merge_one(annotation).await?;
            self.entries_processed += 1;
        }

        match page.continuation {
            Some(token) if count >= JOURNAL_PAGE_SIZE => Ok(PageKind::Full(token)),
            None if count >= JOURNAL_PAGE_SIZE => {
                warn!(entries = count, "full journal page without continuation; finishing");
                Ok(PageKind::Short)
            }
            _ => Ok(PageKind::Short),
        }
    }

    async fn merge_one(&mut self, annotation: &AnnotatedEntry) -> Result<()> {
        let path = markdown::note_path(self.folder, &annotation.article.title);
        if !self.documents.exists(&path).await? {
            self.documents
                .create(&path, &markdown::frontmatter(&annotation.article))
                .await?;
            self.documents_created += 1;
            debug!(%path, "created note");
        }
        if let Some(text) = markdown::render_annotation(annotation) {
            self.documents.append(&path, &text).await?;
        }
        Ok(())
    }

    /// Apply `change` to a copy of the checkpoint and keep it only once saved.
    async fn persist(&mut self, change: impl FnOnce(&mut Checkpoint)) -> Result<()> {
        let mut next = self.checkpoint.clone();
        change(&mut next);
        self.checkpoints.save(&next).await?;
        self.checkpoint = next;
        Ok(())
    }
}
