//! Drop placement: turns a raw pointer location into a grid-aligned block.

use std::num::NonZeroU32;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::model::{BlockInstance, BlockTemplate, Position};

/// Default spacing of the canvas grid in pixels.
pub const DEFAULT_GRID_SIZE: u32 = 40;

/// Spacing of the canvas grid. Always strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct GridSize(NonZeroU32);

impl GridSize {
    pub fn new(size: u32) -> Option<Self> {
        NonZeroU32::new(size).map(Self)
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl Default for GridSize {
    fn default() -> Self {
        const DEFAULT: NonZeroU32 = match NonZeroU32::new(DEFAULT_GRID_SIZE) {
            Some(size) => size,
            None => panic!("DEFAULT_GRID_SIZE must be non-zero"),
        };
        Self(DEFAULT)
    }
}

impl TryFrom<u32> for GridSize {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        GridSize::new(value).ok_or_else(|| "grid size must be greater than zero".to_string())
    }
}

impl From<GridSize> for u32 {
    fn from(value: GridSize) -> Self {
        value.get()
    }
}

/// A drop location in canvas pixels, before snapping.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RawPoint {
    pub x: f64,
    pub y: f64,
}

impl RawPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Snap one axis to the nearest grid line. Halves round toward positive
/// infinity, so `-20` on a 40px grid lands on `0`.
///
/// The result is always a multiple of the grid size: points beyond the `i64`
/// range clamp to the outermost grid line and NaN lands on `0`.
pub fn snap_axis(raw: f64, grid: GridSize) -> i64 {
    let g = i64::from(grid.get());
    // `as` saturates out-of-range floats and maps NaN to 0.
    let cell = (raw / g as f64 + 0.5).floor() as i64;
    cell.clamp(i64::MIN / g, i64::MAX / g) * g
}

pub fn snap_to_grid(point: RawPoint, grid: GridSize) -> Position {
    Position::new(snap_axis(point.x, grid), snap_axis(point.y, grid))
}

/// Generates instance ids from the wall clock in milliseconds, bumping past
/// the previous id whenever two drops land in the same millisecond.
#[derive(Debug, Clone, Default)]
pub struct InstanceIdGenerator {
    last: i64,
}

impl InstanceIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> String {
        self.next_at(chrono::Utc::now().timestamp_millis())
    }

    /// Same as [`next_id`](Self::next_id) with an explicit clock reading.
    pub fn next_at(&mut self, now_ms: i64) -> String {
        let id = now_ms.max(self.last + 1);
        self.last = id;
        id.to_string()
    }
}

/// Place a template at a raw drop point.
///
/// Returns `None` when no template is being dragged; the drop is then ignored.
pub fn place_at(
    template: Option<&BlockTemplate>,
    raw: RawPoint,
    grid: GridSize,
    ids: &mut InstanceIdGenerator,
) -> Option<BlockInstance> {
    let template = template?;
    let position = snap_to_grid(raw, grid);
    let instance = BlockInstance {
        template: template.clone(),
        instance_id: ids.next_id(),
        position,
        properties: IndexMap::new(),
    };
    tracing::debug!(
        kind = %template.id,
        x = position.x,
        y = position.y,
        instance_id = %instance.instance_id,
        "placed block"
    );
    Some(instance)
}
