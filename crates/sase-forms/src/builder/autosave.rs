//! Debounced autosave
//!
//! A single background task owns the save pipeline. The pending slot holds at
//! most one request (the newest), so bursts of edits coalesce into one save.
//! While a save is in flight nothing else is dispatched; once it resolves the
//! newest pending request, if any, goes out immediately.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::application::editing::{FormEditor, SaveFormRequest};
use crate::domain::value_objects::{FormId, OwnerId};
use crate::FormsError;

#[derive(Debug, Error)]
pub enum SaveError {
    #[error(transparent)]
    Forms(#[from] FormsError),
    #[error("save failed: {0}")]
    Transport(String),
}

/// Where autosaved drafts go.
#[async_trait]
pub trait SaveSink: Send + Sync {
    async fn save(&self, request: SaveFormRequest) -> Result<(), SaveError>;
}

/// Saves straight through a `FormEditor`, for in-process callers.
pub struct EditorSink {
    editor: Arc<FormEditor>,
    owner_id: OwnerId,
    form_id: FormId,
}

impl EditorSink {
    pub fn new(editor: Arc<FormEditor>, owner_id: OwnerId, form_id: FormId) -> Self {
        Self { editor, owner_id, form_id }
    }
}

#[async_trait]
impl SaveSink for EditorSink {
    async fn save(&self, request: SaveFormRequest) -> Result<(), SaveError> {
        self.editor.save(&self.owner_id, &self.form_id, request).await?;
        Ok(())
    }
}

#[derive(Clone, Copy, Debug)]
pub struct AutoSaveConfig {
    /// How long edits must stop before a save is dispatched.
    pub quiet_period: Duration,
}

impl Default for AutoSaveConfig {
    fn default() -> Self {
        Self { quiet_period: Duration::from_secs(3) }
    }
}

#[derive(Clone)]
struct Pending {
    revision: u64,
    request: SaveFormRequest,
}

pub struct AutoSaver {
    pending: watch::Sender<Option<Pending>>,
    saved: watch::Receiver<Option<u64>>,
    worker: JoinHandle<()>,
}

impl AutoSaver {
    pub fn spawn(sink: Arc<dyn SaveSink>, config: AutoSaveConfig) -> Self {
        let (pending, rx) = watch::channel(None);
        let (saved_tx, saved) = watch::channel(None);
        let worker = tokio::spawn(run(sink, rx, saved_tx, config.quiet_period));
        Self { pending, saved, worker }
    }

    /// Queues `request` as the state at `revision`, replacing anything not yet
    /// dispatched.
    pub fn schedule(&self, revision: u64, request: SaveFormRequest) {
        self.pending.send_replace(Some(Pending { revision, request }));
    }

    /// Newest revision confirmed by the sink.
    pub fn last_saved_revision(&self) -> Option<u64> {
        *self.saved.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<u64>> {
        self.saved.clone()
    }

    /// Stops the worker, first flushing any unsaved request without waiting
    /// for the quiet period.
    pub async fn shutdown(self) -> Option<u64> {
        let Self { pending, saved, worker } = self;
        drop(pending);
        if let Err(e) = worker.await {
            warn!(error = %e, "autosave worker ended abnormally");
        }
        let last = *saved.borrow();
        last
    }
}

async fn run(
    sink: Arc<dyn SaveSink>,
    mut rx: watch::Receiver<Option<Pending>>,
    saved: watch::Sender<Option<u64>>,
    quiet_period: Duration,
) {
    let mut last_saved: Option<u64> = None;

    while rx.changed().await.is_ok() {
        // restart the quiet period on every new edit
        loop {
            tokio::select! {
                changed = rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = tokio::time::sleep(quiet_period) => break,
            }
        }

        loop {
            let Some(next) = rx.borrow_and_update().clone() else {
                break;
            };
            if !flush(sink.as_ref(), next, &mut last_saved, &saved).await {
                break;
            }
            if !rx.has_changed().unwrap_or(false) {
                break;
            }
        }
    }

    // sender gone: flush whatever is left
    let leftover = rx.borrow().clone();
    if let Some(next) = leftover {
        flush(sink.as_ref(), next, &mut last_saved, &saved).await;
    }
}

/// Saves `next` unless it is already saved. Returns `false` on failure.
async fn flush(
    sink: &dyn SaveSink,
    next: Pending,
    last_saved: &mut Option<u64>,
    saved: &watch::Sender<Option<u64>>,
) -> bool {
    if last_saved.is_some_and(|rev| rev >= next.revision) {
        return true;
    }
    match sink.save(next.request).await {
        Ok(()) => {
            debug!(revision = next.revision, "autosave complete");
            *last_saved = Some(next.revision);
            saved.send_replace(*last_saved);
            true
        }
        Err(e) => {
            // left dirty; the next edit or shutdown tries again
            warn!(revision = next.revision, error = %e, "autosave failed");
            false
        }
    }
}
