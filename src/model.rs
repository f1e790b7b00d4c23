use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

// ────────────────────────────────────────────────────────────────────────────
// Block kinds and categories
// ────────────────────────────────────────────────────────────────────────────

/// The fixed set of placeable block kinds.
///
/// Serialized as the lowercase identifiers used in stored diagrams
/// (`"esp32"`, `"user"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    User,
    Environment,
    Tangible,
    Intangible,
    Connector,
    Camera,
    Esp32,
}

impl BlockKind {
    pub const ALL: [BlockKind; 7] = [
        BlockKind::User,
        BlockKind::Environment,
        BlockKind::Tangible,
        BlockKind::Intangible,
        BlockKind::Connector,
        BlockKind::Camera,
        BlockKind::Esp32,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BlockKind::User => "user",
            BlockKind::Environment => "environment",
            BlockKind::Tangible => "tangible",
            BlockKind::Intangible => "intangible",
            BlockKind::Connector => "connector",
            BlockKind::Camera => "camera",
            BlockKind::Esp32 => "esp32",
        }
    }
}

impl std::fmt::Display for BlockKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BlockKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        BlockKind::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Unknown block kind '{}'. Valid values: {}",
                    s,
                    BlockKind::ALL.map(BlockKind::as_str).join(", ")
                )
            })
    }
}

/// Catalog category of a block template.
///
/// The set is the union of every catalog revision; the serialized form is the
/// label shown under the block name in the library sidebar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockCategory {
    #[serde(rename = "Device Block")]
    Device,
    #[serde(rename = "Logic Block")]
    Logic,
    #[serde(rename = "System Block")]
    System,
    #[serde(rename = "User Block")]
    User,
    #[serde(rename = "Abstract Block")]
    Abstract,
    #[serde(rename = "Physical Block")]
    Physical,
    #[serde(rename = "Required Block")]
    Required,
    #[serde(rename = "Custom Block")]
    Custom,
}

impl BlockCategory {
    pub fn label(self) -> &'static str {
        match self {
            BlockCategory::Device => "Device Block",
            BlockCategory::Logic => "Logic Block",
            BlockCategory::System => "System Block",
            BlockCategory::User => "User Block",
            BlockCategory::Abstract => "Abstract Block",
            BlockCategory::Physical => "Physical Block",
            BlockCategory::Required => "Required Block",
            BlockCategory::Custom => "Custom Block",
        }
    }
}

impl std::fmt::Display for BlockCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Templates and instances
// ────────────────────────────────────────────────────────────────────────────

/// A catalog definition of a placeable block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockTemplate {
    pub id: BlockKind,
    #[serde(rename = "type")]
    pub category: BlockCategory,
    #[serde(rename = "name")]
    pub display_name: String,
    /// Glyph shown in the sidebar and on the canvas.
    pub icon: String,
}

/// A point on the canvas in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: i64,
    pub y: i64,
}

impl Position {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

/// A primitive property value. Nested lists and maps are not representable,
/// so a stored diagram carrying them fails to decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl std::fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PropertyValue::Bool(v) => write!(f, "{}", v),
            PropertyValue::Int(v) => write!(f, "{}", v),
            PropertyValue::Float(v) => write!(f, "{}", v),
            PropertyValue::Text(v) => f.write_str(v),
        }
    }
}

/// A placed copy of a template within one diagram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockInstance {
    #[serde(flatten)]
    pub template: BlockTemplate,
    pub instance_id: String,
    pub position: Position,
    /// Free-form presentation properties, kept in insertion order.
    #[serde(default)]
    pub properties: IndexMap<String, PropertyValue>,
}

impl BlockInstance {
    pub fn kind(&self) -> BlockKind {
        self.template.id
    }

    pub fn name(&self) -> &str {
        &self.template.display_name
    }
}

// ────────────────────────────────────────────────────────────────────────────
// DiagramDocument – the persisted record
// ────────────────────────────────────────────────────────────────────────────

/// The single stored record holding a serialized canvas.
///
/// `blocks` is a JSON string rather than a nested array so the document stays
/// a flat record of primitives in every store backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramDocument {
    pub blocks: String,
    /// Milliseconds since the Unix epoch.
    pub updated_at: i64,
    pub updated_by: String,
}

impl DiagramDocument {
    pub fn encode(
        instances: &[BlockInstance],
        principal: &str,
        updated_at: i64,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            blocks: serde_json::to_string(instances)?,
            updated_at,
            updated_by: principal.to_string(),
        })
    }

    pub fn decode_blocks(&self) -> Result<Vec<BlockInstance>, serde_json::Error> {
        serde_json::from_str(&self.blocks)
    }
}
