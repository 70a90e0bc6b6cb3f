pub mod batch;
pub mod drawing;
pub mod dxf;
pub mod error;
pub mod export;
pub mod fill;
pub mod logging;
pub mod mapping;
pub mod matcher;
pub mod normalize;
pub mod store;
pub mod table;

use std::path::Path;

use tracing::info;

pub use crate::batch::{BatchOptions, BatchReport, BatchRunner, RowResult, RowStatus};
pub use crate::drawing::{AttributeField, BBox, BlockInstance, Drawing, HAlign, Point2, Space, VAlign};
pub use crate::dxf::DxfStore;
pub use crate::error::{Error, Result};
pub use crate::fill::{fill, ChangedField};
pub use crate::mapping::FieldMapping;
pub use crate::matcher::{ColumnMatch, FieldMatcher, MatchKind};
pub use crate::normalize::{normalize, NameNormalizer};
pub use crate::store::DocumentStore;
pub use crate::table::{CellValue, Row, Table, TableReader};

use logging::FILL;

/// Fill a fresh copy of `template` with one row, without saving it
///
/// # Arguments
/// * `store` - Where the template is loaded from
/// * `template` - Path of the template document
/// * `mapping` - Column to tag bindings
/// * `row` - The data row to substitute
///
/// # Returns
/// * `Result<(Drawing, Vec<ChangedField>)>` - The filled drawing and the fields that changed
pub fn preview<S: DocumentStore + ?Sized>(
    store: &S,
    template: &Path,
    mapping: &FieldMapping,
    row: &Row,
) -> Result<(Drawing, Vec<ChangedField>)> {
    let mut drawing = store.load(template)?;
    let changed = fill(&mut drawing, mapping, row);
    info!(target: FILL, template = %template.display(), changed = changed.len(), "preview ready");
    Ok((drawing, changed))
}

/// Proposes a mapping from `columns` to the tags `template` carries.
pub fn suggest_mapping<S, C>(
    store: &S,
    template: &Path,
    columns: &[C],
    matcher: &FieldMatcher,
) -> Result<FieldMapping>
where
    S: DocumentStore + ?Sized,
    C: AsRef<str>,
{
    let drawing = store.load(template)?;
    let tags: Vec<String> = store.list_field_tags(&drawing).into_keys().collect();
    Ok(matcher.auto_map(columns, &tags))
}
