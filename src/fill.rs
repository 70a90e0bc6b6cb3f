use serde::Serialize;
use tracing::{debug, trace};

use crate::drawing::{BBox, Drawing};
use crate::logging::FILL;
use crate::mapping::FieldMapping;
use crate::table::Row;

/// One field rewritten by [`fill`], with the region to highlight.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangedField {
    pub tag: String,
    /// Id of the owning block instance.
    pub instance: String,
    pub block_name: String,
    /// Entity handle of the field, when the document has one.
    pub handle: Option<String>,
    pub new_value: String,
    pub bbox: BBox,
}

/// Writes the row's values into every model-space instance that carries a
/// mapped tag.
///
/// Columns missing from the row and blank values are skipped, as are fields
/// whose trimmed text already equals the trimmed new value. Never fails.
pub fn fill(drawing: &mut Drawing, mapping: &FieldMapping, row: &Row) -> Vec<ChangedField> {
    let mut changed = Vec::new();

    for instance in drawing.model_space_mut() {
        for (column, tag) in mapping.iter() {
            let Some(value) = row.filled(column) else {
                continue;
            };
            let Some(field) = instance.fields.iter_mut().find(|f| f.tag == tag) else {
                continue;
            };

            let new_text = value.to_string();
            if field.text().trim() == new_text.trim() {
                trace!(target: FILL, instance = %instance.id, tag, "value unchanged");
                continue;
            }

            field.set_text(new_text.clone());
            changed.push(ChangedField {
                tag: tag.to_string(),
                instance: instance.id.clone(),
                block_name: instance.block_name.clone(),
                handle: field.handle.clone(),
                new_value: new_text,
                bbox: field.bbox(),
            });
        }
    }

    debug!(target: FILL, changed = changed.len(), "filled drawing");
    changed
}
