//! Persistence gateway: one diagram document in a [`DocumentStore`].
//!
//! The gateway serializes the canvas into a [`DiagramDocument`] and overwrites
//! the stored record on every save. Reads decode the `blocks` string back into
//! instances. Payloads that fail to decode are logged and skipped by
//! subscriptions so the canvas keeps its last good state.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use serde_json::Value;

use crate::error::{GatewayError, StoreError};
use crate::identity::Principal;
use crate::model::{BlockInstance, DiagramDocument};
use crate::store::{Document, DocumentPath, DocumentStore, DocumentWatch, WatchEvent};

/// Id of the single diagram document per application.
pub const DIAGRAM_DOCUMENT_ID: &str = "main_flow";

/// `artifacts/{app_id}/public/data/block_diagrams/main_flow`
pub fn diagram_path(app_id: &str) -> DocumentPath {
    DocumentPath::new(
        format!("artifacts/{}/public/data/block_diagrams", app_id),
        DIAGRAM_DOCUMENT_ID,
    )
}

/// Decode a stored document into block instances.
///
/// An absent document is an empty canvas. A document without a string
/// `blocks` field, or whose `blocks` does not parse, is an error.
pub fn decode_document(
    path: &DocumentPath,
    document: Option<&Document>,
) -> Result<Vec<BlockInstance>, GatewayError> {
    let Some(document) = document else {
        return Ok(Vec::new());
    };
    let blocks = match document.get("blocks") {
        Some(Value::String(blocks)) => blocks,
        Some(_) => {
            return Err(GatewayError::Decode(format!(
                "{}: `blocks` is not a string",
                path
            )));
        }
        None => {
            return Err(GatewayError::Decode(format!(
                "{}: missing `blocks` field",
                path
            )));
        }
    };
    serde_json::from_str(blocks).map_err(|e| GatewayError::Decode(format!("{}: {}", path, e)))
}

#[derive(Clone)]
pub struct PersistenceGateway {
    store: Arc<dyn DocumentStore>,
    path: DocumentPath,
}

impl std::fmt::Debug for PersistenceGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceGateway")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl PersistenceGateway {
    /// Gateway for the diagram of `app_id`.
    pub fn new(store: Arc<dyn DocumentStore>, app_id: &str) -> Self {
        Self::with_path(store, diagram_path(app_id))
    }

    pub fn with_path(store: Arc<dyn DocumentStore>, path: DocumentPath) -> Self {
        Self { store, path }
    }

    pub fn path(&self) -> &DocumentPath {
        &self.path
    }

    /// Overwrite the stored diagram with `instances`, stamped with the current
    /// time and `principal`. Returns the record that was written.
    pub async fn save(
        &self,
        instances: &[BlockInstance],
        principal: &Principal,
    ) -> Result<DiagramDocument, GatewayError> {
        let now = chrono::Utc::now().timestamp_millis();
        self.save_at(instances, principal, now).await
    }

    /// Like [`save`](Self::save) with an explicit `updatedAt` in epoch ms.
    pub async fn save_at(
        &self,
        instances: &[BlockInstance],
        principal: &Principal,
        updated_at: i64,
    ) -> Result<DiagramDocument, GatewayError> {
        let record = DiagramDocument::encode(instances, principal.id(), updated_at)
            .map_err(GatewayError::Encode)?;
        let document = match serde_json::to_value(&record).map_err(GatewayError::Encode)? {
            Value::Object(map) => map,
            _ => return Err(GatewayError::Decode("diagram did not encode as an object".into())),
        };
        self.store.set(&self.path, document).await?;
        tracing::info!(
            path = %self.path,
            blocks = instances.len(),
            principal = %principal,
            "Saved block diagram"
        );
        Ok(record)
    }

    /// One-shot read of the stored diagram.
    pub async fn load(&self) -> Result<Vec<BlockInstance>, GatewayError> {
        let document = self.store.get(&self.path).await?;
        let blocks = decode_document(&self.path, document.as_ref())?;
        if document.is_none() {
            tracing::info!(path = %self.path, "No existing block diagram found");
        }
        Ok(blocks)
    }

    /// Start observing the stored diagram.
    pub async fn subscribe(&self) -> Result<DiagramSubscription, GatewayError> {
        let watch = self.store.watch(&self.path).await?;
        tracing::debug!(path = %self.path, "Subscribed to block diagram");
        Ok(DiagramSubscription {
            path: self.path.clone(),
            watch: Some(watch),
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// DiagramSubscription
// ────────────────────────────────────────────────────────────────────────────

/// A live, cancellable stream of decoded diagram snapshots.
///
/// The first snapshot is the current contents (empty when the document does
/// not exist), then one per committed write. Snapshots that fail to decode and
/// store errors are logged and skipped. The stream ends after
/// [`unsubscribe`](Self::unsubscribe); dropping it unsubscribes as well.
#[derive(Debug)]
pub struct DiagramSubscription {
    path: DocumentPath,
    watch: Option<DocumentWatch>,
}

impl DiagramSubscription {
    pub fn path(&self) -> &DocumentPath {
        &self.path
    }

    pub fn is_active(&self) -> bool {
        self.watch.is_some()
    }

    /// Wait for the next valid snapshot. `None` once unsubscribed or when the
    /// store side has gone away.
    pub async fn next(&mut self) -> Option<Vec<BlockInstance>> {
        std::future::poll_fn(|cx| self.poll_snapshot(cx)).await
    }

    /// Next valid snapshot that has already been delivered, without waiting.
    pub fn try_next(&mut self) -> Option<Vec<BlockInstance>> {
        loop {
            let event = self.watch.as_mut()?.try_recv()?;
            if let Some(blocks) = self.accept(event) {
                return Some(blocks);
            }
        }
    }

    /// Stop receiving updates. Idempotent.
    pub fn unsubscribe(&mut self) {
        if let Some(mut watch) = self.watch.take() {
            watch.close();
            tracing::debug!(path = %self.path, "Unsubscribed from block diagram");
        }
    }

    fn poll_snapshot(&mut self, cx: &mut Context<'_>) -> Poll<Option<Vec<BlockInstance>>> {
        loop {
            let Some(watch) = self.watch.as_mut() else {
                return Poll::Ready(None);
            };
            match watch.poll_recv(cx) {
                Poll::Ready(Some(event)) => {
                    if let Some(blocks) = self.accept(event) {
                        return Poll::Ready(Some(blocks));
                    }
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }

    fn accept(&self, event: WatchEvent) -> Option<Vec<BlockInstance>> {
        match event {
            Ok(document) => match decode_document(&self.path, document.as_ref()) {
                Ok(blocks) => {
                    tracing::info!(
                        path = %self.path,
                        blocks = blocks.len(),
                        "Loaded block diagram"
                    );
                    Some(blocks)
                }
                Err(error) => {
                    tracing::warn!(path = %self.path, error = %error, "Skipping malformed diagram");
                    None
                }
            },
            Err(StoreError::Malformed { message, .. }) => {
                tracing::warn!(path = %self.path, error = %message, "Skipping malformed diagram");
                None
            }
            Err(error) => {
                tracing::error!(path = %self.path, error = %error, "Error listening to diagram");
                None
            }
        }
    }
}

impl Stream for DiagramSubscription {
    type Item = Vec<BlockInstance>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.poll_snapshot(cx)
    }
}

impl Drop for DiagramSubscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
