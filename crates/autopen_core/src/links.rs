//! crates/autopen_core/src/links.rs
//!
//! Link classification for brain-dump attachments and the `TranscriptHub`,
//! the in-flight registry for transcript-extraction tasks.
//!
//! The hub is keyed by a content identifier (YouTube video id, or the
//! normalized URL for other pages) so that the same link submitted twice in
//! quick succession starts exactly one fetch. Fetch tasks are bounded by a
//! timeout and can be cancelled when the owning link is removed.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::domain::LinkKind;
use crate::ports::{IngestError, IngestionService, TranscriptFetch};

//=========================================================================================
// Link classification
//=========================================================================================

/// What the orchestrator knows about a URL before any fetch happens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedLink {
    pub kind: LinkKind,
    /// Registry key: `yt:<video id>` for YouTube, the trimmed URL otherwise.
    pub content_key: String,
    /// Display title derived from the URL; the real page title is the
    /// ingestion helper's concern.
    pub title: String,
    pub thumbnail: Option<String>,
}

/// Classify a URL. Never fails: anything that is not recognizably YouTube
/// is treated as a webpage.
pub fn detect_link(url: &str) -> DetectedLink {
    let trimmed = url.trim().trim_end_matches('/');
    if let Some(video_id) = youtube_video_id(trimmed) {
        return DetectedLink {
            kind: LinkKind::Youtube,
            content_key: format!("yt:{video_id}"),
            title: format!("YouTube video {video_id}"),
            thumbnail: Some(format!("https://img.youtube.com/vi/{video_id}/hqdefault.jpg")),
        };
    }
    DetectedLink {
        kind: LinkKind::Webpage,
        content_key: trimmed.to_string(),
        title: host_of(trimmed).unwrap_or(trimmed).to_string(),
        thumbnail: None,
    }
}

/// Extract a YouTube video id from the common URL shapes:
/// `youtu.be/<id>`, `youtube.com/watch?v=<id>`, `/shorts/<id>`,
/// `/embed/<id>`.
pub fn youtube_video_id(url: &str) -> Option<String> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);
    let rest = rest.strip_prefix("www.").unwrap_or(rest);

    let id = if let Some(path) = rest.strip_prefix("youtu.be/") {
        path.split(['?', '&', '/']).next()
    } else if let Some(after) = rest.strip_prefix("youtube.com/") {
        if let Some(query) = after.strip_prefix("watch?") {
            query
                .split('&')
                .find_map(|pair| pair.strip_prefix("v="))
        } else if let Some(path) = after
            .strip_prefix("shorts/")
            .or_else(|| after.strip_prefix("embed/"))
        {
            path.split(['?', '&', '/']).next()
        } else {
            None
        }
    } else {
        None
    };

    id.filter(|id| !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'))
        .map(str::to_string)
}

fn host_of(url: &str) -> Option<&str> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))?;
    let host = rest.split('/').next()?;
    if host.is_empty() {
        None
    } else {
        Some(host)
    }
}

//=========================================================================================
// TranscriptHub
//=========================================================================================

struct FetchEntry {
    handle: JoinHandle<Result<TranscriptFetch, IngestError>>,
    token: CancellationToken,
}

/// In-flight registry for transcript fetches, shared across requests.
pub struct TranscriptHub {
    ingestion: Arc<dyn IngestionService>,
    fetch_timeout: Duration,
    inner: Mutex<HashMap<String, FetchEntry>>,
}

impl TranscriptHub {
    pub fn new(ingestion: Arc<dyn IngestionService>, fetch_timeout: Duration) -> Self {
        Self {
            ingestion,
            fetch_timeout,
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Start a transcript fetch for `content_key` unless one is already in
    /// flight. Returns `true` when a new fetch was started.
    pub async fn begin_fetch(&self, content_key: &str, url: &str) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.contains_key(content_key) {
            info!(content_key, "transcript fetch already in flight; not duplicating");
            return false;
        }

        let token = CancellationToken::new();
        let task_token = token.clone();
        let ingestion = self.ingestion.clone();
        let url = url.to_string();
        let timeout = self.fetch_timeout;
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = task_token.cancelled() => {
                    Err(IngestError::Unavailable("fetch cancelled".to_string()))
                }
                result = tokio::time::timeout(timeout, ingestion.extract_link_transcript(&url)) => {
                    match result {
                        Ok(outcome) => outcome,
                        Err(_) => Err(IngestError::TimedOut),
                    }
                }
            }
        });

        inner.insert(content_key.to_string(), FetchEntry { handle, token });
        true
    }

    pub async fn is_in_flight(&self, content_key: &str) -> bool {
        self.inner.lock().await.contains_key(content_key)
    }

    /// Cancel and forget the fetch for `content_key`, if any.
    pub async fn cancel(&self, content_key: &str) {
        let entry = self.inner.lock().await.remove(content_key);
        if let Some(entry) = entry {
            entry.token.cancel();
            entry.handle.abort();
        }
    }

    /// Like [`join`](Self::join), but only when the fetch has already
    /// finished; a still-running fetch is left in the registry.
    pub async fn try_join(
        &self,
        content_key: &str,
    ) -> Option<Result<TranscriptFetch, IngestError>> {
        {
            let inner = self.inner.lock().await;
            let finished = inner
                .get(content_key)
                .map(|entry| entry.handle.is_finished())?;
            if !finished {
                return None;
            }
        }
        self.join(content_key).await
    }

    /// Await the fetch for `content_key` and remove it from the registry.
    /// Returns `None` when no fetch is registered under the key.
    pub async fn join(&self, content_key: &str) -> Option<Result<TranscriptFetch, IngestError>> {
        let entry = self.inner.lock().await.remove(content_key)?;
        let outcome = match entry.handle.await {
            Ok(outcome) => outcome,
            Err(join_err) => {
                warn!(content_key, error = %join_err, "transcript fetch task did not complete");
                Err(IngestError::Unavailable(join_err.to_string()))
            }
        };
        Some(outcome)
    }

    /// Await every named fetch concurrently. The per-task timeout bounds
    /// the total wait.
    pub async fn join_all(
        &self,
        content_keys: &[String],
    ) -> HashMap<String, Result<TranscriptFetch, IngestError>> {
        let mut entries = Vec::new();
        {
            let mut inner = self.inner.lock().await;
            for key in content_keys {
                if let Some(entry) = inner.remove(key) {
                    entries.push((key.clone(), entry));
                }
            }
        }
        let joined = futures::future::join_all(entries.into_iter().map(|(key, entry)| async move {
            let outcome = match entry.handle.await {
                Ok(outcome) => outcome,
                Err(join_err) => {
                    warn!(content_key = %key, error = %join_err, "transcript fetch task did not complete");
                    Err(IngestError::Unavailable(join_err.to_string()))
                }
            };
            (key, outcome)
        }))
        .await;
        joined.into_iter().collect()
    }
}
