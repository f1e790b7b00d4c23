//! Application context and the canvas view session.
//!
//! [`AppContext`] is built once from [`Config`] and passed explicitly to
//! whatever needs the store or the signed-in principal. [`CanvasSession`]
//! covers the lifetime of one open canvas: it owns the editor state, keeps the
//! diagram subscription alive, and performs saves.

use std::sync::Arc;

use anyhow::Result;

use crate::config::{BackendConfig, Config, IdentityConfig};
use crate::editor::{EditorState, StatusLevel};
use crate::error::{GatewayError, SaveError};
use crate::gateway::{DiagramSubscription, PersistenceGateway};
use crate::identity::{
    FirebaseIdentity, IdentityProvider, LocalIdentity, Principal, Session, establish_session,
};
use crate::model::DiagramDocument;
use crate::store::{DocumentStore, FirestoreStore, FsStore, MemoryStore};

pub const SAVING_MESSAGE: &str = "Saving diagram...";
pub const SAVED_MESSAGE: &str = "Diagram saved successfully!";

pub struct AppContext {
    config: Config,
    store: Option<Arc<dyn DocumentStore>>,
    session: Option<Session>,
    auth_ready: bool,
    status: String,
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("app_id", &self.config.app_id)
            .field("principal", &self.principal())
            .field("auth_ready", &self.auth_ready)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

impl AppContext {
    /// Sign in and open the configured store.
    ///
    /// A failed sign-in is not fatal: the context comes up in local mode with
    /// no principal, so diagrams can be viewed but not saved.
    pub async fn initialize(config: Config) -> Result<Self> {
        let provider = identity_provider(&config.identity);
        let session = match establish_session(provider.as_ref(), config.auth_token.as_deref()).await
        {
            Ok(session) => Some(session),
            Err(error) => {
                tracing::error!(error = %error, "Sign-in failed, running in local mode");
                None
            }
        };
        let id_token = session.as_ref().and_then(|s| s.id_token.clone());
        let store = build_store(&config, id_token);
        Ok(Self::with_parts(config, store, session))
    }

    /// Assemble a context from an already-built store and session.
    pub fn with_parts(
        config: Config,
        store: Arc<dyn DocumentStore>,
        session: Option<Session>,
    ) -> Self {
        let status = match &session {
            Some(_) => "Application Ready.",
            None => "Sign-in unavailable. Running in local mode.",
        };
        tracing::info!(
            app_id = %config.app_id,
            principal = ?session.as_ref().map(|s| s.principal.id()),
            "{}",
            status
        );
        Self {
            config,
            store: Some(store),
            session,
            auth_ready: true,
            status: status.to_string(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.session.as_ref().map(|s| &s.principal)
    }

    /// Whether the sign-in attempt has finished, successfully or not.
    pub fn is_ready(&self) -> bool {
        self.auth_ready
    }

    /// Human-readable startup state.
    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn store(&self) -> Option<Arc<dyn DocumentStore>> {
        self.store.clone()
    }

    /// Gateway to this application's diagram, if the context is still open.
    pub fn gateway(&self) -> Option<PersistenceGateway> {
        self.store
            .clone()
            .map(|store| PersistenceGateway::new(store, &self.config.app_id))
    }

    /// Open the canvas view: fresh editor state plus a live subscription.
    pub async fn open_canvas(&self) -> Result<CanvasSession, GatewayError> {
        let mut session = CanvasSession::new(
            EditorState::new(self.config.grid_size),
            self.gateway(),
            self.principal().cloned(),
        );
        if let Some(gateway) = &session.gateway {
            session.subscription = Some(gateway.subscribe().await?);
        }
        Ok(session)
    }

    /// Drop the store and the session. Later canvases cannot load or save.
    pub fn shutdown(&mut self) {
        self.store = None;
        self.session = None;
        self.auth_ready = false;
        self.status = "Shut down.".to_string();
        tracing::debug!(app_id = %self.config.app_id, "Application context shut down");
    }
}

fn identity_provider(config: &IdentityConfig) -> Box<dyn IdentityProvider> {
    match config {
        IdentityConfig::Local => Box::new(LocalIdentity),
        IdentityConfig::Firebase { api_key, base_url } => {
            let mut provider = FirebaseIdentity::new(api_key.clone());
            if let Some(url) = base_url {
                provider = provider.with_base_url(url.clone());
            }
            Box::new(provider)
        }
    }
}

fn build_store(config: &Config, id_token: Option<String>) -> Arc<dyn DocumentStore> {
    match &config.backend {
        BackendConfig::Memory => Arc::new(MemoryStore::new()),
        BackendConfig::Local { root } => {
            let mut store = FsStore::new(root);
            if let Some(interval) = config.poll_interval() {
                store = store.with_poll_interval(interval);
            }
            Arc::new(store)
        }
        BackendConfig::Firestore {
            project_id,
            base_url,
        } => {
            let mut store = FirestoreStore::new(project_id.clone()).with_bearer_token(id_token);
            if let Some(url) = base_url {
                store = store.with_base_url(url.clone());
            }
            if let Some(interval) = config.poll_interval() {
                store = store.with_poll_interval(interval);
            }
            Arc::new(store)
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// CanvasSession
// ────────────────────────────────────────────────────────────────────────────

/// One open canvas view.
#[derive(Debug)]
pub struct CanvasSession {
    editor: EditorState,
    gateway: Option<PersistenceGateway>,
    principal: Option<Principal>,
    subscription: Option<DiagramSubscription>,
}

impl CanvasSession {
    pub fn new(
        editor: EditorState,
        gateway: Option<PersistenceGateway>,
        principal: Option<Principal>,
    ) -> Self {
        Self {
            editor,
            gateway,
            principal,
            subscription: None,
        }
    }

    pub fn editor(&self) -> &EditorState {
        &self.editor
    }

    pub fn editor_mut(&mut self) -> &mut EditorState {
        &mut self.editor
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.as_ref().is_some_and(|s| s.is_active())
    }

    /// Apply every snapshot delivered so far. Returns how many were applied.
    pub fn pump_updates(&mut self) -> usize {
        let Some(subscription) = self.subscription.as_mut() else {
            return 0;
        };
        let mut applied = 0;
        while let Some(blocks) = subscription.try_next() {
            self.editor.canvas.replace_all(blocks);
            applied += 1;
        }
        applied
    }

    /// Wait for the next snapshot and apply it. `false` when the subscription
    /// has ended.
    pub async fn wait_for_update(&mut self) -> bool {
        let Some(subscription) = self.subscription.as_mut() else {
            return false;
        };
        match subscription.next().await {
            Some(blocks) => {
                self.editor.canvas.replace_all(blocks);
                true
            }
            None => false,
        }
    }

    /// Persist the current canvas.
    ///
    /// The outcome is also reported through the editor's status line.
    pub async fn save(&mut self) -> Result<DiagramDocument, SaveError> {
        let (Some(gateway), Some(principal)) = (&self.gateway, &self.principal) else {
            let err = SaveError::NotReady;
            tracing::warn!("{}", err);
            self.editor.set_status(StatusLevel::Error, err.to_string());
            return Err(err);
        };
        self.editor.set_status(StatusLevel::Pending, SAVING_MESSAGE);
        match gateway.save(self.editor.canvas.current(), principal).await {
            Ok(record) => {
                self.editor.set_status(StatusLevel::Success, SAVED_MESSAGE);
                Ok(record)
            }
            Err(error) => {
                let err = SaveError::from(error);
                tracing::error!(error = %err, "Save failed");
                self.editor.set_status(StatusLevel::Error, err.to_string());
                Err(err)
            }
        }
    }

    /// Leave the canvas view, ending the subscription.
    pub fn close(&mut self) {
        if let Some(mut subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
    }
}

impl Drop for CanvasSession {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::RawPoint;
    use crate::model::BlockKind;
    use std::time::Instant;

    fn memory_context(session: Option<Session>) -> (AppContext, MemoryStore) {
        let store = MemoryStore::new();
        let ctx = AppContext::with_parts(Config::default(), Arc::new(store.clone()), session);
        (ctx, store)
    }

    fn signed_in(id: &str) -> Option<Session> {
        Some(Session {
            principal: Principal::new(id),
            id_token: None,
            anonymous: true,
        })
    }

    #[tokio::test]
    async fn test_save_without_principal_is_refused() {
        let (ctx, _store) = memory_context(None);
        assert!(ctx.is_ready());
        let mut canvas = ctx.open_canvas().await.unwrap();
        canvas.editor_mut().begin_drag(BlockKind::User);
        canvas.editor_mut().drop_at(RawPoint::new(10.0, 10.0));

        let err = canvas.save().await.unwrap_err();
        assert!(matches!(err, SaveError::NotReady));
        let status = canvas.editor().status_at(Instant::now()).unwrap();
        assert_eq!(status.text, "Authentication or database not ready. Cannot save.");
        assert!(ctx.gateway().unwrap().load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_sets_success_status() {
        let (ctx, _store) = memory_context(signed_in("u1"));
        let mut canvas = ctx.open_canvas().await.unwrap();
        canvas.editor_mut().begin_drag(BlockKind::Camera);
        canvas.editor_mut().drop_at(RawPoint::new(103.0, 77.0));

        let record = canvas.save().await.unwrap();
        assert_eq!(record.updated_by, "u1");
        let status = canvas.editor().status_at(Instant::now()).unwrap();
        assert_eq!(status.level, StatusLevel::Success);
        assert_eq!(status.text, SAVED_MESSAGE);
    }

    #[tokio::test]
    async fn test_failed_save_reports_error_status() {
        let (ctx, store) = memory_context(signed_in("u1"));
        let mut canvas = ctx.open_canvas().await.unwrap();
        store.set_offline(Some("network down"));

        assert!(canvas.save().await.is_err());
        let status = canvas.editor().status_at(Instant::now()).unwrap();
        assert_eq!(status.level, StatusLevel::Error);
        assert!(status.text.starts_with("Error saving diagram: "));
        assert!(status.text.contains("network down"));
    }

    #[tokio::test]
    async fn test_close_drops_watch() {
        let (ctx, store) = memory_context(signed_in("u1"));
        let path = ctx.gateway().unwrap().path().clone();
        let mut canvas = ctx.open_canvas().await.unwrap();
        assert!(canvas.is_subscribed());
        assert_eq!(store.watcher_count(&path), 1);
        canvas.close();
        assert!(!canvas.is_subscribed());
        assert_eq!(store.watcher_count(&path), 0);
    }

    #[tokio::test]
    async fn test_malformed_remote_write_keeps_canvas() {
        let (ctx, store) = memory_context(signed_in("u1"));
        let gateway = ctx.gateway().unwrap();
        let mut seed = EditorState::default();
        let drops = [
            (BlockKind::User, 0.0),
            (BlockKind::Esp32, 80.0),
            (BlockKind::Camera, 160.0),
        ];
        for (kind, x) in drops {
            seed.begin_drag(kind);
            seed.drop_at(RawPoint::new(x, 0.0));
        }
        gateway
            .save(seed.canvas.current(), &Principal::new("other"))
            .await
            .unwrap();

        let mut canvas = ctx.open_canvas().await.unwrap();
        assert_eq!(canvas.pump_updates(), 1);
        assert_eq!(canvas.editor().canvas.current(), seed.canvas.current());

        let unparseable = serde_json::json!({"blocks": "[{", "updatedAt": 1, "updatedBy": "x"});
        store
            .set(gateway.path(), unparseable.as_object().cloned().unwrap())
            .await
            .unwrap();
        let missing_blocks = serde_json::json!({"updatedAt": 2, "updatedBy": "x"});
        store
            .set(gateway.path(), missing_blocks.as_object().cloned().unwrap())
            .await
            .unwrap();

        assert_eq!(canvas.pump_updates(), 0);
        assert_eq!(canvas.editor().canvas.current(), seed.canvas.current());

        gateway
            .save(&seed.canvas.current()[..1], &Principal::new("other"))
            .await
            .unwrap();
        assert_eq!(canvas.pump_updates(), 1);
        assert_eq!(canvas.editor().canvas.len(), 1);
    }

    #[tokio::test]
    async fn test_wait_for_update_hydrates_canvas() {
        let (ctx, _store) = memory_context(signed_in("u1"));
        let mut canvas = ctx.open_canvas().await.unwrap();
        assert!(canvas.wait_for_update().await);
        assert!(canvas.editor().canvas.is_empty());

        canvas.close();
        assert!(!canvas.wait_for_update().await);
    }

    #[tokio::test]
    async fn test_shutdown_leaves_canvas_unbacked() {
        let (mut ctx, _store) = memory_context(signed_in("u1"));
        ctx.shutdown();
        assert!(!ctx.is_ready());
        assert!(ctx.gateway().is_none());
        let mut canvas = ctx.open_canvas().await.unwrap();
        assert!(!canvas.is_subscribed());
        assert!(matches!(canvas.save().await, Err(SaveError::NotReady)));
    }

    #[tokio::test]
    async fn test_initialize_with_memory_backend() {
        let mut config = Config::default();
        config.backend = BackendConfig::Memory;
        config.auth_token = Some("alice".into());
        let ctx = AppContext::initialize(config).await.unwrap();
        assert_eq!(ctx.principal().map(Principal::id), Some("alice"));
        assert_eq!(ctx.status(), "Application Ready.");
    }
}
