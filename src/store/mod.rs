//! Document store backends.
//!
//! A store holds JSON object documents addressed by [`DocumentPath`]. Writes
//! replace the whole document; there are no partial updates, transactions, or
//! version checks. Sub-modules provide the backends:
//!
//! - [`memory`] – shared in-process store (tests, local mode)
//! - [`fs`] – one JSON file per document under a root directory
//! - [`firestore`] – Firestore-compatible REST API

pub mod firestore;
pub mod fs;
pub mod memory;

pub use firestore::FirestoreStore;
pub use fs::FsStore;
pub use memory::MemoryStore;

use std::future::Future;
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::StoreError;

/// A stored document: a JSON object.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// One observation of a watched document: its contents (`None` when absent)
/// or the error raised while reading it.
pub type WatchEvent = Result<Option<Document>, StoreError>;

/// Address of one document: a slash-separated collection path plus an id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentPath {
    pub collection: String,
    pub document: String,
}

impl DocumentPath {
    pub fn new(collection: impl Into<String>, document: impl Into<String>) -> Self {
        Self {
            collection: collection.into().trim_matches('/').to_string(),
            document: document.into(),
        }
    }
}

impl std::fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.collection, self.document)
    }
}

/// Trait for abstracting document storage (memory vs. files vs. remote).
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read a document; `Ok(None)` when it does not exist.
    async fn get(&self, path: &DocumentPath) -> Result<Option<Document>, StoreError>;

    /// Overwrite a document entirely, creating it when absent.
    async fn set(&self, path: &DocumentPath, document: Document) -> Result<(), StoreError>;

    /// Observe a document. The first event carries the current contents;
    /// later events follow every committed write, in commit order.
    async fn watch(&self, path: &DocumentPath) -> Result<DocumentWatch, StoreError>;
}

// ────────────────────────────────────────────────────────────────────────────
// DocumentWatch
// ────────────────────────────────────────────────────────────────────────────

/// Receiving end of a document watch.
///
/// Dropping or closing the watch stops delivery and, for polling backends,
/// aborts the background poller.
#[derive(Debug)]
pub struct DocumentWatch {
    rx: mpsc::UnboundedReceiver<WatchEvent>,
    poller: Option<JoinHandle<()>>,
}

impl DocumentWatch {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<WatchEvent>) -> Self {
        Self { rx, poller: None }
    }

    pub async fn recv(&mut self) -> Option<WatchEvent> {
        self.rx.recv().await
    }

    /// Next already-delivered event, without waiting.
    pub fn try_recv(&mut self) -> Option<WatchEvent> {
        self.rx.try_recv().ok()
    }

    pub fn poll_recv(&mut self, cx: &mut Context<'_>) -> Poll<Option<WatchEvent>> {
        self.rx.poll_recv(cx)
    }

    pub fn close(&mut self) {
        self.rx.close();
        if let Some(poller) = self.poller.take() {
            poller.abort();
        }
    }
}

impl Drop for DocumentWatch {
    fn drop(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.abort();
        }
    }
}

/// A polled reading: the document plus a revision marker that changes
/// whenever the stored contents change.
pub(crate) struct Polled {
    pub document: Option<Document>,
    pub revision: Option<String>,
}

/// Poll `fetch` every `interval`, emitting an event whenever the revision
/// changes. A run of failures is reported once until a read succeeds again.
pub(crate) fn spawn_poller<F, Fut>(interval: Duration, mut fetch: F) -> DocumentWatch
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Polled, StoreError>> + Send,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut last_revision: Option<Option<String>> = None;
        let mut failing = false;
        loop {
            ticker.tick().await;
            if tx.is_closed() {
                break;
            }
            match fetch().await {
                Ok(polled) => {
                    failing = false;
                    if last_revision.as_ref() == Some(&polled.revision) {
                        continue;
                    }
                    last_revision = Some(polled.revision);
                    if tx.send(Ok(polled.document)).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    if failing {
                        tracing::debug!(error = %err, "document poll still failing");
                        continue;
                    }
                    failing = true;
                    if tx.send(Err(err)).is_err() {
                        break;
                    }
                }
            }
        }
    });
    DocumentWatch {
        rx,
        poller: Some(handle),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn doc(v: serde_json::Value) -> Document {
        v.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_document_path_display() {
        let p = DocumentPath::new("/artifacts/app/public/data/block_diagrams/", "main_flow");
        assert_eq!(p.to_string(), "artifacts/app/public/data/block_diagrams/main_flow");
    }

    #[tokio::test(start_paused = true)]
    async fn test_poller_emits_only_on_revision_change() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut watch = spawn_poller(Duration::from_millis(100), move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                let revision = if n < 2 { "a" } else { "b" };
                Ok(Polled {
                    document: Some(doc(json!({ "rev": revision }))),
                    revision: Some(revision.to_string()),
                })
            }
        });

        let first = watch.recv().await.unwrap().unwrap().unwrap();
        assert_eq!(first["rev"], "a");
        let second = watch.recv().await.unwrap().unwrap().unwrap();
        assert_eq!(second["rev"], "b");
        assert!(calls.load(Ordering::SeqCst) >= 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poller_reports_failure_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut watch = spawn_poller(Duration::from_millis(100), move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 3 {
                    Err(StoreError::Unavailable("down".into()))
                } else {
                    Ok(Polled {
                        document: None,
                        revision: None,
                    })
                }
            }
        });

        assert!(watch.recv().await.unwrap().is_err());
        let recovered = watch.recv().await.unwrap().unwrap();
        assert!(recovered.is_none());
    }
}
