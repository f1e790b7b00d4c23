//! In-process document store.
//!
//! Clones share the same underlying documents, so two handles behave like two
//! sessions talking to one backend. Watchers are notified synchronously inside
//! `set`, which gives strict commit-order delivery.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{Document, DocumentPath, DocumentStore, DocumentWatch, WatchEvent};
use crate::error::StoreError;

#[derive(Default)]
struct Slot {
    document: Option<Document>,
    watchers: Vec<mpsc::UnboundedSender<WatchEvent>>,
}

#[derive(Default)]
struct Inner {
    slots: HashMap<DocumentPath, Slot>,
    offline: Option<String>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate losing the backend: every call fails with
    /// [`StoreError::Unavailable`] until `None` is passed back in.
    pub fn set_offline(&self, reason: Option<&str>) {
        self.lock().offline = reason.map(str::to_string);
    }

    /// Number of live watchers on a path.
    pub fn watcher_count(&self, path: &DocumentPath) -> usize {
        let mut inner = self.lock();
        match inner.slots.get_mut(path) {
            Some(slot) => {
                slot.watchers.retain(|w| !w.is_closed());
                slot.watchers.len()
            }
            None => 0,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_online(inner: &Inner) -> Result<(), StoreError> {
        match &inner.offline {
            Some(reason) => Err(StoreError::Unavailable(reason.clone())),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("MemoryStore")
            .field("documents", &inner.slots.len())
            .field("offline", &inner.offline)
            .finish()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, path: &DocumentPath) -> Result<Option<Document>, StoreError> {
        let inner = self.lock();
        Self::check_online(&inner)?;
        Ok(inner.slots.get(path).and_then(|s| s.document.clone()))
    }

    async fn set(&self, path: &DocumentPath, document: Document) -> Result<(), StoreError> {
        let mut inner = self.lock();
        Self::check_online(&inner)?;
        let slot = inner.slots.entry(path.clone()).or_default();
        slot.document = Some(document);
        let current = slot.document.clone();
        slot.watchers.retain(|w| w.send(Ok(current.clone())).is_ok());
        Ok(())
    }

    async fn watch(&self, path: &DocumentPath) -> Result<DocumentWatch, StoreError> {
        let mut inner = self.lock();
        Self::check_online(&inner)?;
        let (tx, rx) = mpsc::unbounded_channel();
        let slot = inner.slots.entry(path.clone()).or_default();
        // Receiver is held locally, so this send cannot fail.
        let _ = tx.send(Ok(slot.document.clone()));
        slot.watchers.push(tx);
        Ok(DocumentWatch::new(rx))
    }
}
