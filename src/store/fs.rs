//! Local filesystem store: one pretty-printed JSON file per document.

use std::time::Duration;

use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};

use super::{Document, DocumentPath, DocumentStore, DocumentWatch, Polled, spawn_poller};
use crate::error::StoreError;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Stores `collection/document` at `<root>/<collection>/<document>.json`.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: Utf8PathBuf,
    poll_interval: Duration,
}

impl FsStore {
    pub fn new(root: impl AsRef<Utf8Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn file_path(&self, path: &DocumentPath) -> Utf8PathBuf {
        let mut file = self.root.clone();
        for segment in path.collection.split('/').filter(|s| !s.is_empty()) {
            file.push(segment);
        }
        file.push(format!("{}.json", path.document));
        file
    }

    async fn read_raw(file: &Utf8Path) -> Result<Option<String>, StoreError> {
        match tokio::fs::read_to_string(file).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io {
                path: file.to_path_buf(),
                source,
            }),
        }
    }

    fn parse(file: &Utf8Path, text: &str) -> Result<Document, StoreError> {
        let value: serde_json::Value =
            serde_json::from_str(text).map_err(|e| StoreError::Malformed {
                path: file.to_string(),
                message: e.to_string(),
            })?;
        match value {
            serde_json::Value::Object(map) => Ok(map),
            _ => Err(StoreError::Malformed {
                path: file.to_string(),
                message: "top-level value is not an object".to_string(),
            }),
        }
    }
}

#[async_trait]
impl DocumentStore for FsStore {
    async fn get(&self, path: &DocumentPath) -> Result<Option<Document>, StoreError> {
        let file = self.file_path(path);
        match Self::read_raw(&file).await? {
            Some(text) => Self::parse(&file, &text).map(Some),
            None => Ok(None),
        }
    }

    async fn set(&self, path: &DocumentPath, document: Document) -> Result<(), StoreError> {
        let file = self.file_path(path);
        let io_err = |source| StoreError::Io {
            path: file.clone(),
            source,
        };
        if let Some(parent) = file.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        let text = serde_json::to_string_pretty(&serde_json::Value::Object(document)).map_err(
            |e| StoreError::Malformed {
                path: file.to_string(),
                message: e.to_string(),
            },
        )?;
        // Write beside the target and rename so watchers never see a torn file.
        // Each write gets its own temp file; the last rename wins.
        let tmp = file.with_extension(format!("json.{}.tmp", uuid::Uuid::new_v4().simple()));
        tokio::fs::write(&tmp, text).await.map_err(io_err)?;
        if let Err(source) = tokio::fs::rename(&tmp, &file).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(io_err(source));
        }
        tracing::debug!(file = %file, "wrote document");
        Ok(())
    }

    async fn watch(&self, path: &DocumentPath) -> Result<DocumentWatch, StoreError> {
        let file = self.file_path(path);
        Ok(spawn_poller(self.poll_interval, move || {
            let file = file.clone();
            async move {
                let text = Self::read_raw(&file).await?;
                let document = match &text {
                    Some(t) => Some(Self::parse(&file, t)?),
                    None => None,
                };
                Ok(Polled {
                    document,
                    revision: text,
                })
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path() -> DocumentPath {
        DocumentPath::new("artifacts/app/public/data/block_diagrams", "main_flow")
    }

    #[test]
    fn test_file_path_layout() {
        let store = FsStore::new("/var/blockflow");
        assert_eq!(
            store.file_path(&path()),
            Utf8PathBuf::from("/var/blockflow/artifacts/app/public/data/block_diagrams/main_flow.json")
        );
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let store = FsStore::new(&root);

        assert!(store.get(&path()).await.unwrap().is_none());
        let doc = json!({"blocks": "[]", "updatedAt": 1, "updatedBy": "u"});
        store
            .set(&path(), doc.as_object().cloned().unwrap())
            .await
            .unwrap();
        let got = store.get(&path()).await.unwrap().unwrap();
        assert_eq!(serde_json::Value::Object(got), doc);
        let leftovers: Vec<_> = std::fs::read_dir(store.file_path(&path()).parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(leftovers, vec!["main_flow.json"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writers_never_fail() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let alice = FsStore::new(&root);
        let bob = FsStore::new(&root);

        for round in 0..50 {
            let a_doc = json!({"blocks": "[]", "updatedAt": round, "updatedBy": "alice"});
            let b_doc = json!({"blocks": "[]", "updatedAt": round, "updatedBy": "bob"});
            let a = {
                let store = alice.clone();
                tokio::spawn(async move {
                    store
                        .set(&path(), a_doc.as_object().cloned().unwrap())
                        .await
                })
            };
            let b = {
                let store = bob.clone();
                tokio::spawn(async move {
                    store
                        .set(&path(), b_doc.as_object().cloned().unwrap())
                        .await
                })
            };
            a.await.unwrap().unwrap();
            b.await.unwrap().unwrap();

            let stored = alice.get(&path()).await.unwrap().unwrap();
            assert_eq!(stored["updatedAt"], round);
            let writer = stored["updatedBy"].as_str().unwrap();
            assert!(writer == "alice" || writer == "bob");
        }
    }

    #[tokio::test]
    async fn test_non_object_file_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let store = FsStore::new(&root);
        let file = store.file_path(&path());
        std::fs::create_dir_all(file.parent().unwrap()).unwrap();
        std::fs::write(&file, "[1, 2, 3]").unwrap();

        let err = store.get(&path()).await.unwrap_err();
        assert!(matches!(err, StoreError::Malformed { .. }));
    }
}
