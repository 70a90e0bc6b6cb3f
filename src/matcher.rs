use serde::Serialize;
use rapidfuzz::fuzz;
use tracing::{debug, event, Level};

use crate::logging::MATCHER;
use crate::mapping::FieldMapping;
use crate::normalize::NameNormalizer;

pub const DEFAULT_THRESHOLD: u8 = 70;

/// How one column fared against the template's tags.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchKind {
    /// Normalized names are equal.
    Exact { tag: String },
    /// Best similarity reached the threshold.
    Fuzzy { tag: String, score: f64 },
    /// Nothing reached the threshold; `best` is the closest tag, if any.
    Unmatched { best: Option<(String, f64)> },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnMatch {
    pub column: String,
    pub normalized: String,
    #[serde(flatten)]
    pub kind: MatchKind,
}

impl ColumnMatch {
    pub fn tag(&self) -> Option<&str> {
        match &self.kind {
            MatchKind::Exact { tag } | MatchKind::Fuzzy { tag, .. } => Some(tag),
            MatchKind::Unmatched { .. } => None,
        }
    }
}

/// Indel similarity of two normalized names on a 0..=100 scale:
/// `2 * lcs / (len(a) + len(b))`.
pub fn similarity(a: &str, b: &str) -> f64 {
    fuzz::ratio(a.chars(), b.chars()) * 100.0
}

/// Binds data columns to template tags by normalized name, falling back to
/// indel similarity.
#[derive(Debug, Clone)]
pub struct FieldMatcher {
    threshold: u8,
    normalizer: NameNormalizer,
}

impl Default for FieldMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

impl FieldMatcher {
    /// `threshold` is clamped to 100.
    pub fn new(threshold: u8) -> Self {
        FieldMatcher {
            threshold: threshold.min(100),
            normalizer: NameNormalizer::default(),
        }
    }

    pub fn with_normalizer(mut self, normalizer: NameNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    pub fn normalizer(&self) -> &NameNormalizer {
        &self.normalizer
    }

    /// Maps each column to at most one tag. Unmatched columns are left out.
    pub fn auto_map<C, T>(&self, columns: &[C], tags: &[T]) -> FieldMapping
    where
        C: AsRef<str>,
        T: AsRef<str>,
    {
        let mapping: FieldMapping = self
            .explain(columns, tags)
            .into_iter()
            .filter_map(|m| {
                let tag = m.tag()?.to_string();
                Some((m.column, tag))
            })
            .collect();
        debug!(
            target: MATCHER,
            columns = columns.len(),
            tags = tags.len(),
            mapped = mapping.len(),
            "auto-mapped columns"
        );
        mapping
    }

    /// One [`ColumnMatch`] per column, in column order.
    ///
    /// An exact normalized match always wins. Otherwise the highest scoring
    /// tag is taken if it reaches the threshold; among equal scores the tag
    /// listed first wins. Names that normalize to nothing never match.
    pub fn explain<C, T>(&self, columns: &[C], tags: &[T]) -> Vec<ColumnMatch>
    where
        C: AsRef<str>,
        T: AsRef<str>,
    {
        let normalized_tags: Vec<(String, &str)> = tags
            .iter()
            .map(|t| (self.normalizer.normalize(t.as_ref()), t.as_ref()))
            .filter(|(norm, _)| !norm.is_empty())
            .collect();

        columns
            .iter()
            .map(|column| self.match_column(column.as_ref(), &normalized_tags))
            .collect()
    }

    fn match_column(&self, column: &str, tags: &[(String, &str)]) -> ColumnMatch {
        let normalized = self.normalizer.normalize(column);
        let kind = if normalized.is_empty() {
            MatchKind::Unmatched { best: None }
        } else if let Some((_, tag)) = tags.iter().find(|(norm, _)| *norm == normalized) {
            MatchKind::Exact {
                tag: tag.to_string(),
            }
        } else {
            let mut best: Option<(&str, f64)> = None;
            for (norm, tag) in tags {
                let score = similarity(&normalized, norm);
                if best.map_or(true, |(_, top)| score > top) {
                    best = Some((*tag, score));
                }
            }
            match best {
                Some((tag, score)) if score >= f64::from(self.threshold) => MatchKind::Fuzzy {
                    tag: tag.to_string(),
                    score,
                },
                other => MatchKind::Unmatched {
                    best: other.map(|(tag, score)| (tag.to_string(), score)),
                },
            }
        };

        event!(
            target: MATCHER,
            Level::TRACE,
            column,
            normalized = %normalized,
            outcome = ?kind,
            "matched column"
        );
        ColumnMatch {
            column: column.to_string(),
            normalized,
            kind,
        }
    }
}
