//! Block diagram editor core.
//!
//! This module holds everything the canvas view needs between a pointer event
//! and a persisted diagram:
//!
//! - **Block catalog**: the fixed, ordered set of placeable templates
//! - **Placement**: grid snapping and unique instance ids for drops
//! - **State**: the ordered canvas plus drag, selection, and status state

pub mod block_catalog;
pub mod placement;
pub mod state;

pub use block_catalog::{
    BlockCatalogCategory, list_templates, matches_query, template, templates_by_category,
};
pub use placement::{
    DEFAULT_GRID_SIZE, GridSize, InstanceIdGenerator, RawPoint, place_at, snap_axis, snap_to_grid,
};
pub use state::{
    CanvasState, DetailMode, DragMode, EditorState, STATUS_TTL, StatusLevel, StatusMessage,
};
