//! Editor state management.
//!
//! [`CanvasState`] is the ordered list of placed blocks. [`EditorState`] wraps
//! it with the interactive state of the canvas view: the template being
//! dragged, the grid, the selected block, the detail panel mode, and the
//! status line under the save button.

use std::time::{Duration, Instant};

use crate::model::{BlockInstance, BlockKind};

use super::block_catalog;
use super::placement::{GridSize, InstanceIdGenerator, RawPoint, place_at};

/// How long a finished status message stays visible.
pub const STATUS_TTL: Duration = Duration::from_secs(3);

// ────────────────────────────────────────────────────────────────────────────
// CanvasState
// ────────────────────────────────────────────────────────────────────────────

/// The live, ordered list of blocks in the open diagram.
///
/// Insertion order is display order. Only two mutations exist: `append` for
/// interactive drops and `replace_all` for hydration from storage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CanvasState {
    blocks: Vec<BlockInstance>,
}

impl CanvasState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, instance: BlockInstance) {
        self.blocks.push(instance);
    }

    pub fn replace_all(&mut self, instances: Vec<BlockInstance>) {
        self.blocks = instances;
    }

    pub fn current(&self) -> &[BlockInstance] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn find(&self, instance_id: &str) -> Option<&BlockInstance> {
        self.blocks.iter().find(|b| b.instance_id == instance_id)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Drag state
// ────────────────────────────────────────────────────────────────────────────

/// What the user is currently dragging onto the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum DragMode {
    #[default]
    None,
    /// A template picked up from the sidebar, with the last pointer position
    /// reported while hovering over the canvas.
    Template { kind: BlockKind, pointer: RawPoint },
}

// ────────────────────────────────────────────────────────────────────────────
// Detail panel and status line
// ────────────────────────────────────────────────────────────────────────────

/// Tab shown in the right-hand block details panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetailMode {
    #[default]
    Properties,
    Logic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    /// An operation is in flight; never expires on its own.
    Pending,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusMessage {
    pub level: StatusLevel,
    pub text: String,
    pub shown_at: Instant,
}

impl StatusMessage {
    pub fn is_visible_at(&self, now: Instant) -> bool {
        self.level == StatusLevel::Pending || now.duration_since(self.shown_at) < STATUS_TTL
    }
}

// ────────────────────────────────────────────────────────────────────────────
// EditorState
// ────────────────────────────────────────────────────────────────────────────

/// The complete interactive state of the canvas view.
#[derive(Debug, Clone)]
pub struct EditorState {
    pub canvas: CanvasState,
    pub grid_size: GridSize,
    pub drag_mode: DragMode,
    pub detail_mode: DetailMode,
    selected: Option<String>,
    status: Option<StatusMessage>,
    ids: InstanceIdGenerator,
}

impl EditorState {
    pub fn new(grid_size: GridSize) -> Self {
        Self {
            canvas: CanvasState::new(),
            grid_size,
            drag_mode: DragMode::None,
            detail_mode: DetailMode::Properties,
            selected: None,
            status: None,
            ids: InstanceIdGenerator::new(),
        }
    }

    /// Pick up a template from the sidebar.
    pub fn begin_drag(&mut self, kind: BlockKind) {
        self.drag_mode = DragMode::Template {
            kind,
            pointer: RawPoint::default(),
        };
    }

    /// Track the pointer while a template hovers over the canvas.
    pub fn drag_over(&mut self, point: RawPoint) {
        if let DragMode::Template { pointer, .. } = &mut self.drag_mode {
            *pointer = point;
        }
    }

    /// Drop the dragged template at `point`, appending the snapped instance.
    ///
    /// Dropping with nothing in hand does nothing and returns `None`.
    pub fn drop_at(&mut self, point: RawPoint) -> Option<&BlockInstance> {
        let dragged = match self.drag_mode {
            DragMode::Template { kind, .. } => block_catalog::template(kind),
            DragMode::None => None,
        };
        let placed = place_at(dragged, point, self.grid_size, &mut self.ids)?;
        self.drag_mode = DragMode::None;
        self.canvas.append(placed);
        self.canvas.current().last()
    }

    /// Select a block by instance id. Unknown ids clear the selection.
    pub fn select(&mut self, instance_id: &str) -> bool {
        if self.canvas.find(instance_id).is_some() {
            self.selected = Some(instance_id.to_string());
            true
        } else {
            self.selected = None;
            false
        }
    }

    pub fn selected(&self) -> Option<&BlockInstance> {
        self.selected.as_deref().and_then(|id| self.canvas.find(id))
    }

    pub fn set_status(&mut self, level: StatusLevel, text: impl Into<String>) {
        self.status = Some(StatusMessage {
            level,
            text: text.into(),
            shown_at: Instant::now(),
        });
    }

    /// The status line as it should appear at `now`.
    pub fn status_at(&self, now: Instant) -> Option<&StatusMessage> {
        self.status.as_ref().filter(|s| s.is_visible_at(now))
    }

    /// Whether a save is currently in flight.
    pub fn is_saving(&self) -> bool {
        matches!(&self.status, Some(s) if s.level == StatusLevel::Pending)
    }
}

impl Default for EditorState {
    fn default() -> Self {
        Self::new(GridSize::default())
    }
}
