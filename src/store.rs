use std::path::Path;

use indexmap::IndexMap;

use crate::drawing::Drawing;
use crate::error::Result;

/// Loads and persists template drawings.
///
/// Every `load` must hand back an independent drawing; callers rely on that
/// to keep fills of different rows from seeing each other's edits.
pub trait DocumentStore: Send + Sync {
    /// Fails with `NotFound` for a missing path and `Corrupt` for unreadable content.
    fn load(&self, path: &Path) -> Result<Drawing>;

    /// Fails with `Io` when the drawing cannot be written.
    fn save(&self, drawing: &Drawing, path: &Path) -> Result<()>;

    /// Tag -> names of the blocks that carry it.
    fn list_field_tags(&self, drawing: &Drawing) -> IndexMap<String, Vec<String>> {
        drawing.field_tags()
    }
}
