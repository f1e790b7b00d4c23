//! Block diagram editor core for visual IoT flows.
//!
//! This crate provides the block catalog, grid-snapped placement, and canvas
//! state of the diagram editor, plus a `PersistenceGateway` that saves and
//! watches the diagram in a document store (in memory, local files, or a
//! Firestore-compatible REST API).
//!
//! The surrounding page models live here too: signup/login/create-repository
//! forms, the dashboard, the repository task board and view switcher, and the
//! AI chat client.
//!
//! The binary `blockflow` drives all of it from a terminal.

pub mod chat;
pub mod config;
pub mod context;
pub mod dashboard;
pub mod editor;
pub mod error;
pub mod forms;
pub mod gateway;
pub mod identity;
pub mod logging;
pub mod model;
pub mod store;
pub mod tasks;
pub mod views;

pub use context::{AppContext, CanvasSession};
pub use gateway::{DiagramSubscription, PersistenceGateway};
pub use model::{BlockInstance, BlockKind, BlockTemplate, DiagramDocument, Position};
