//! Block catalog: the static library of templates shown in the sidebar.
//!
//! The catalog is built once on first access and never mutated afterwards.
//! Order is significant: it is the order the sidebar lists templates in.
//!
//! # Usage
//!
//! ```rust
//! use blockflow::editor::block_catalog::{list_templates, template};
//! use blockflow::model::BlockKind;
//!
//! assert_eq!(list_templates().len(), 7);
//! assert_eq!(template(BlockKind::Esp32).unwrap().display_name, "ESP32");
//! ```

use once_cell::sync::Lazy;

use crate::model::{BlockCategory, BlockKind, BlockTemplate};

/// A category of templates, in catalog order.
#[derive(Debug, Clone)]
pub struct BlockCatalogCategory {
    pub category: BlockCategory,
    pub templates: Vec<BlockTemplate>,
}

fn entry(id: BlockKind, category: BlockCategory, display_name: &str, icon: &str) -> BlockTemplate {
    BlockTemplate {
        id,
        category,
        display_name: display_name.to_string(),
        icon: icon.to_string(),
    }
}

fn build_catalog() -> Vec<BlockTemplate> {
    use BlockCategory::*;
    vec![
        entry(BlockKind::User, Required, "User", "👤"),
        entry(BlockKind::Environment, Required, "Environment", "🌍"),
        entry(BlockKind::Tangible, Physical, "Tangible", "◼"),
        entry(BlockKind::Intangible, Abstract, "Intangible", "💡"),
        entry(BlockKind::Connector, Physical, "Connector", "🔗"),
        entry(BlockKind::Camera, Custom, "Camera", "📷"),
        entry(BlockKind::Esp32, Custom, "ESP32", "📱"),
    ]
}

/// Returns every template in sidebar order.
pub fn list_templates() -> &'static [BlockTemplate] {
    static CATALOG: Lazy<Vec<BlockTemplate>> = Lazy::new(build_catalog);
    &CATALOG
}

/// Looks up the template for a block kind.
pub fn template(kind: BlockKind) -> Option<&'static BlockTemplate> {
    list_templates().iter().find(|t| t.id == kind)
}

/// Returns the catalog grouped by category, categories in order of first
/// appearance.
pub fn templates_by_category() -> &'static [BlockCatalogCategory] {
    static CATEGORIES: Lazy<Vec<BlockCatalogCategory>> = Lazy::new(|| {
        let mut by_cat: indexmap::IndexMap<BlockCategory, Vec<BlockTemplate>> =
            indexmap::IndexMap::new();
        for t in list_templates() {
            by_cat.entry(t.category).or_default().push(t.clone());
        }
        by_cat
            .into_iter()
            .map(|(category, templates)| BlockCatalogCategory { category, templates })
            .collect()
    });
    &CATEGORIES
}

/// Case-insensitive substring match on id, display name, or category label.
/// An empty query matches everything.
pub fn matches_query(template: &BlockTemplate, query: &str) -> bool {
    let q = query.trim().to_lowercase();
    if q.is_empty() {
        return true;
    }
    template.id.as_str().contains(&q)
        || template.display_name.to_lowercase().contains(&q)
        || template.category.label().to_lowercase().contains(&q)
}
