use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::logging::MATCHER;

/// Data column -> template field tag.
///
/// Keys are unique; several columns may point at the same tag; see
/// [`FieldMapping::ambiguous_tags`]. Persisted as a flat JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldMapping(IndexMap<String, String>);

impl FieldMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `column` to `tag`, replacing any earlier binding of that column.
    pub fn insert(&mut self, column: impl Into<String>, tag: impl Into<String>) -> Option<String> {
        self.0.insert(column.into(), tag.into())
    }

    /// Removes a binding, keeping the order of the rest.
    pub fn remove(&mut self, column: &str) -> Option<String> {
        self.0.shift_remove(column)
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.0.get(column).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(c, t)| (c.as_str(), t.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Tags bound to more than one column, with those columns.
    pub fn ambiguous_tags(&self) -> IndexMap<&str, Vec<&str>> {
        let mut by_tag: IndexMap<&str, Vec<&str>> = IndexMap::new();
        for (column, tag) in self.iter() {
            by_tag.entry(tag).or_default().push(column);
        }
        by_tag.retain(|_, columns| columns.len() > 1);
        by_tag
    }

    pub fn to_json(&self) -> String {
        // a map of strings always serializes
        serde_json::to_string_pretty(&self.0).unwrap_or_default()
    }

    pub fn from_json(text: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(target: MATCHER, path = %path.display(), entries = self.len(), "saved mapping");
        Ok(())
    }

    /// Loads a saved mapping. A missing file is an empty mapping.
    pub fn load(path: &Path) -> Result<Self> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::new()),
            Err(e) => return Err(Error::from_io(path, e)),
        };
        Self::from_json(&text).map_err(|source| Error::Mapping {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl<C: Into<String>, T: Into<String>> FromIterator<(C, T)> for FieldMapping {
    fn from_iter<I: IntoIterator<Item = (C, T)>>(iter: I) -> Self {
        FieldMapping(iter.into_iter().map(|(c, t)| (c.into(), t.into())).collect())
    }
}
